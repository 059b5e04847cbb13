//! The synchronous surface a storage engine calls from its own threads

use std::sync::Arc;
use std::time::{Duration, Instant};

use undertow_core::{
    AccessMode, BlockingVfs, FileId, GateState, OpenFlags, ResultCode, Swarm, SwarmClient,
    SwarmSource, TorrentSpecifier, VfsConfig,
};
use undertow_sim::{SimulatedSwarmClient, SimulatedTorrent, StreamProfile, seed_directory};

use crate::support::{database_torrent, patterned};

fn existing(torrent: &SimulatedTorrent, config: VfsConfig) -> BlockingVfs {
    let swarm = torrent.start_session();
    BlockingVfs::connect(SwarmSource::Existing(swarm as Arc<dyn Swarm>), config).unwrap()
}

#[test]
fn test_engine_style_page_reads() {
    let data = patterned(10_000);
    let torrent = SimulatedTorrent::new().file("main.db", data.clone()).profile(
        StreamProfile::default()
            .with_chunk_size(700)
            .with_irregular_chunks(99),
    );
    let vfs = existing(&torrent, VfsConfig::default());
    let id = FileId::new(1);

    assert_eq!(
        vfs.open(None, id, OpenFlags::READONLY | OpenFlags::MAIN_DB),
        Ok(OpenFlags::READONLY | OpenFlags::MAIN_DB)
    );
    assert_eq!(vfs.file_size(id), Ok(10_000));
    assert_eq!(vfs.device_characteristics().bits(), 0x2000);

    let mut header = [0u8; 100];
    assert_eq!(vfs.read(id, &mut header, 0), Ok(()));
    assert_eq!(&header[..], &data[..100]);

    let mut last_page = vec![0u8; 4096];
    assert_eq!(vfs.read(id, &mut last_page, 8192), Err(ResultCode::IoErrShortRead));
    assert_eq!(&last_page[..1808], &data[8192..]);
    assert!(last_page[1808..].iter().all(|&b| b == 0));

    assert_eq!(vfs.close(id), ResultCode::Ok);
    vfs.shutdown();
}

#[test]
fn test_metadata_delay_outside_any_runtime() {
    let torrent = database_torrent(1000).metadata_delay(Duration::from_millis(30));
    let vfs = existing(&torrent, VfsConfig::default());

    assert!(vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY).is_ok());
    assert_eq!(vfs.gate_state(), GateState::Ready);
}

#[test]
fn test_never_ready_swarm_fails_within_timeout() {
    let torrent = database_torrent(1000).without_metadata();
    let config = VfsConfig::default().with_ready_timeout(Duration::from_millis(50));
    let vfs = existing(&torrent, config);

    let started = Instant::now();
    assert_eq!(
        vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY),
        Err(ResultCode::CantOpen)
    );
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(vfs.access(Some("main.db"), AccessMode::Exists), Ok(false));

    let mut buf = [0u8; 8];
    assert_eq!(vfs.read(FileId::new(1), &mut buf, 0), Err(ResultCode::IoErrRead));
}

#[test]
fn test_owned_session_through_blocking_bridge() {
    let client = Arc::new(SimulatedSwarmClient::new());
    let info_hash = client.publish(database_torrent(2048));
    let source = SwarmSource::New {
        client: Arc::clone(&client) as Arc<dyn SwarmClient>,
        torrent: TorrentSpecifier::InfoHash(info_hash),
    };
    let vfs = BlockingVfs::connect(source, VfsConfig::default().with_prefetch(true)).unwrap();

    vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY)
        .unwrap();
    let main = client
        .session(&info_hash)
        .and_then(|session| session.simulated_file("main.db"))
        .unwrap();
    assert!(main.is_selected());

    vfs.shutdown();
    assert!(!main.is_selected());
    assert_eq!(client.removed(), vec![info_hash]);
}

#[test]
fn test_unknown_magnet_never_becomes_ready() {
    let client = Arc::new(SimulatedSwarmClient::new());
    let magnet = "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567&dn=missing";
    let source = SwarmSource::New {
        client: client as Arc<dyn SwarmClient>,
        torrent: magnet.parse().unwrap(),
    };
    let config = VfsConfig::default().with_ready_timeout(Duration::from_millis(40));
    let vfs = BlockingVfs::connect(source, config).unwrap();

    assert_eq!(
        vfs.open(None, FileId::new(1), OpenFlags::READONLY),
        Err(ResultCode::CantOpen)
    );
    assert!(matches!(vfs.gate_state(), GateState::Failed(_)));
}

#[test]
fn test_seeded_directory_serves_on_disk_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let data = patterned(5000);
    std::fs::write(dir.path().join("catalog.db"), &data).unwrap();
    std::fs::write(dir.path().join("catalog.db-wal"), b"wal").unwrap();

    let torrent = seed_directory(dir.path()).unwrap();
    let config = VfsConfig::default().with_main_file("catalog.db");
    let vfs = existing(&torrent, config);
    let id = FileId::new(3);

    assert!(vfs.open(None, id, OpenFlags::READONLY).is_ok());
    assert_eq!(vfs.file_size(id), Ok(5000));

    let mut page = vec![0u8; 1024];
    assert_eq!(vfs.read(id, &mut page, 2048), Ok(()));
    assert_eq!(&page[..], &data[2048..3072]);
    assert_eq!(vfs.access(Some("catalog.db-wal"), AccessMode::Exists), Ok(true));
}
