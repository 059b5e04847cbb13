//! In-memory swarm files with download-like stream behavior.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use undertow_core::swarm::{ByteStream, SwarmError, SwarmFile};

/// How streams over a simulated file deliver their bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamProfile {
    /// Largest chunk a stream yields
    pub chunk_size: usize,
    /// Draw every chunk size uniformly from `1..=chunk_size`
    pub irregular_chunks: bool,
    /// Delay before each chunk
    pub chunk_latency: Duration,
    /// File offset at which every stream fails
    pub fault_at: Option<u64>,
    /// Seed for chunk size draws
    pub seed: u64,
}

impl Default for StreamProfile {
    fn default() -> Self {
        Self {
            chunk_size: 16 * 1024, // one BitTorrent block
            irregular_chunks: false,
            chunk_latency: Duration::ZERO,
            fault_at: None,
            seed: 42,
        }
    }
}

impl StreamProfile {
    /// Sets the largest chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Draws chunk sizes from a seeded generator.
    pub fn with_irregular_chunks(mut self, seed: u64) -> Self {
        self.irregular_chunks = true;
        self.seed = seed;
        self
    }

    /// Delays every chunk.
    pub fn with_chunk_latency(mut self, latency: Duration) -> Self {
        self.chunk_latency = latency;
        self
    }

    /// Fails streams when they reach `offset`.
    pub fn with_fault_at(mut self, offset: u64) -> Self {
        self.fault_at = Some(offset);
        self
    }
}

/// A file inside a simulated torrent.
pub struct SimulatedFile {
    path: String,
    data: Bytes,
    profile: StreamProfile,
    streams_opened: AtomicUsize,
    select_calls: AtomicUsize,
    deselect_calls: AtomicUsize,
}

impl SimulatedFile {
    /// Creates a file serving `data` according to `profile`.
    pub fn new(path: impl Into<String>, data: impl Into<Bytes>, profile: StreamProfile) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
            profile,
            streams_opened: AtomicUsize::new(0),
            select_calls: AtomicUsize::new(0),
            deselect_calls: AtomicUsize::new(0),
        }
    }

    /// Full contents, for comparing reads against.
    pub fn contents(&self) -> &Bytes {
        &self.data
    }

    /// Number of streams opened so far.
    pub fn streams_opened(&self) -> usize {
        self.streams_opened.load(Ordering::SeqCst)
    }

    /// Number of select calls received.
    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    /// Number of deselect calls received.
    pub fn deselect_calls(&self) -> usize {
        self.deselect_calls.load(Ordering::SeqCst)
    }

    /// Whether the file is currently selected for download.
    pub fn is_selected(&self) -> bool {
        self.select_calls() > self.deselect_calls()
    }
}

struct StreamState {
    data: Bytes,
    path: String,
    position: usize,
    end: usize,
    profile: StreamProfile,
    rng: ChaCha8Rng,
    failed: bool,
}

impl StreamState {
    fn next_chunk_len(&mut self) -> usize {
        let max = self.profile.chunk_size.max(1);
        if self.profile.irregular_chunks {
            self.rng.random_range(1..=max)
        } else {
            max
        }
    }
}

impl SwarmFile for SimulatedFile {
    fn path(&self) -> &str {
        &self.path
    }

    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    fn create_read_stream(&self, range: RangeInclusive<u64>) -> ByteStream {
        let stream_index = self.streams_opened.fetch_add(1, Ordering::SeqCst);

        let len = self.data.len();
        let start = (*range.start()).min(len as u64) as usize;
        let end = range.end().saturating_add(1).min(len as u64) as usize;

        tracing::trace!(
            path = %self.path,
            start,
            end,
            stream_index,
            "SimulatedFile: opening stream"
        );

        let state = StreamState {
            data: self.data.clone(),
            path: self.path.clone(),
            position: start,
            end: end.max(start),
            rng: ChaCha8Rng::seed_from_u64(self.profile.seed.wrapping_add(stream_index as u64)),
            profile: self.profile.clone(),
            failed: false,
        };

        Box::pin(futures::stream::unfold(state, |mut state| async move {
            if state.failed || state.position >= state.end {
                return None;
            }

            if !state.profile.chunk_latency.is_zero() {
                tokio::time::sleep(state.profile.chunk_latency).await;
            }

            let mut chunk_end = (state.position + state.next_chunk_len()).min(state.end);
            if let Some(fault_at) = state.profile.fault_at {
                let fault_at = fault_at as usize;
                if state.position >= fault_at {
                    state.failed = true;
                    let error = SwarmError::StreamFailed {
                        path: state.path.clone(),
                        reason: format!("simulated peer loss at offset {fault_at}"),
                    };
                    return Some((Err(error), state));
                }
                chunk_end = chunk_end.min(fault_at);
            }

            let chunk = state.data.slice(state.position..chunk_end);
            state.position = chunk_end;
            Some((Ok(chunk), state))
        }))
    }

    fn select(&self) {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(path = %self.path, "SimulatedFile: selected");
    }

    fn deselect(&self) {
        self.deselect_calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(path = %self.path, "SimulatedFile: deselected");
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn collect(stream: ByteStream) -> (Vec<u8>, Vec<usize>, bool) {
        let mut bytes = Vec::new();
        let mut sizes = Vec::new();
        let mut failed = false;
        let mut stream = stream;
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => {
                    sizes.push(chunk.len());
                    bytes.extend_from_slice(&chunk);
                }
                Err(_) => failed = true,
            }
        }
        (bytes, sizes, failed)
    }

    #[tokio::test]
    async fn test_stream_covers_inclusive_range() {
        let data = patterned(1000);
        let file = SimulatedFile::new(
            "main.db",
            data.clone(),
            StreamProfile::default().with_chunk_size(300),
        );

        let (bytes, sizes, failed) = collect(file.create_read_stream(100..=899)).await;
        assert!(!failed);
        assert_eq!(bytes, &data[100..900]);
        assert_eq!(sizes, vec![300, 300, 200]);
    }

    #[tokio::test]
    async fn test_stream_past_end_stops_at_length() {
        let data = patterned(1000);
        let file = SimulatedFile::new("main.db", data.clone(), StreamProfile::default());

        let (bytes, _, failed) = collect(file.create_read_stream(900..=1099)).await;
        assert!(!failed);
        assert_eq!(bytes, &data[900..]);
    }

    #[tokio::test]
    async fn test_irregular_chunks_are_deterministic() {
        let data = patterned(5000);
        let profile = StreamProfile::default()
            .with_chunk_size(256)
            .with_irregular_chunks(7);
        let first = SimulatedFile::new("a.db", data.clone(), profile.clone());
        let second = SimulatedFile::new("a.db", data.clone(), profile);

        let (bytes_a, sizes_a, _) = collect(first.create_read_stream(0..=4999)).await;
        let (bytes_b, sizes_b, _) = collect(second.create_read_stream(0..=4999)).await;

        assert_eq!(bytes_a, data);
        assert_eq!(bytes_a, bytes_b);
        assert_eq!(sizes_a, sizes_b);
        assert!(sizes_a.iter().all(|&size| (1..=256).contains(&size)));
    }

    #[tokio::test]
    async fn test_fault_interrupts_stream() {
        let data = patterned(1000);
        let file = SimulatedFile::new(
            "main.db",
            data.clone(),
            StreamProfile::default().with_chunk_size(100).with_fault_at(450),
        );

        let (bytes, _, failed) = collect(file.create_read_stream(0..=999)).await;
        assert!(failed);
        assert_eq!(bytes, &data[..450]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_chunks() {
        let file = SimulatedFile::new(
            "main.db",
            patterned(300),
            StreamProfile::default()
                .with_chunk_size(100)
                .with_chunk_latency(Duration::from_millis(10)),
        );

        let started = tokio::time::Instant::now();
        let (bytes, _, _) = collect(file.create_read_stream(0..=299)).await;
        assert_eq!(bytes.len(), 300);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_selection_tracking() {
        let file = SimulatedFile::new("main.db", patterned(10), StreamProfile::default());
        assert!(!file.is_selected());

        file.select();
        assert!(file.is_selected());

        file.deselect();
        assert!(!file.is_selected());
        assert_eq!(file.select_calls(), 1);
        assert_eq!(file.deselect_calls(), 1);
    }
}
