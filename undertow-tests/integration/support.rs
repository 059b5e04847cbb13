//! Shared fixtures for integration tests

use std::sync::Arc;

use undertow_core::{Swarm, SwarmSource, SwarmVfs, VfsConfig};
use undertow_sim::{SimulatedSwarm, SimulatedTorrent, StreamProfile};

/// Deterministic, non-repeating-looking file contents.
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + 7) % 251) as u8).collect()
}

/// Stream profile resembling a real download: small irregular chunks with latency.
pub fn download_like_profile() -> StreamProfile {
    StreamProfile::default()
        .with_chunk_size(97)
        .with_irregular_chunks(1234)
        .with_chunk_latency(std::time::Duration::from_millis(2))
}

/// Torrent holding a main database and a journal.
pub fn database_torrent(main_len: usize) -> SimulatedTorrent {
    SimulatedTorrent::new()
        .file("main.db", patterned(main_len))
        .file("main.db-journal", patterned(64))
        .profile(download_like_profile())
}

/// Wraps an existing session the test keeps ownership of.
pub async fn borrowed_vfs(swarm: &Arc<SimulatedSwarm>, config: VfsConfig) -> SwarmVfs {
    SwarmVfs::new(
        SwarmSource::Existing(Arc::clone(swarm) as Arc<dyn Swarm>),
        config,
    )
    .await
    .unwrap()
}
