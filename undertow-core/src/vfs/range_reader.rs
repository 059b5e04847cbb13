//! Range reads assembled from a swarm byte stream
//!
//! Fills a caller buffer from a sequential stream over exactly the requested
//! window, tolerating any chunking. A stream that ends early is a short read:
//! the unfilled suffix is zeroed and reported as such, never as a fault.

use futures::StreamExt;
use tracing::{debug, trace, warn};

use super::{VfsError, VfsResult};
use crate::swarm::SwarmFile;

/// Successful completion of a range read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The whole buffer was filled from the file
    Complete,
    /// The file ended first; bytes past `bytes_read` are zero
    Short { bytes_read: usize },
}

impl ReadOutcome {
    /// Number of buffer bytes that came from the file.
    pub fn bytes_read(&self, requested: usize) -> usize {
        match self {
            ReadOutcome::Complete => requested,
            ReadOutcome::Short { bytes_read } => *bytes_read,
        }
    }
}

/// Reads `buf.len()` bytes of `file` starting at `offset`.
///
/// Only bytes below `file_length` are requested from the swarm; a window
/// starting at or past the end opens no stream at all. Chunks are copied in
/// stream order and anything past the window is discarded.
///
/// On a stream fault the bytes already copied stay in the buffer and the rest
/// is left untouched.
///
/// # Errors
/// - `VfsError::Stream` - The stream failed before ending
pub async fn read_exact_at(
    file: &dyn SwarmFile,
    file_length: u64,
    offset: u64,
    buf: &mut [u8],
) -> VfsResult<ReadOutcome> {
    let requested = buf.len();
    let window_end = offset.saturating_add(requested as u64).min(file_length);

    let mut filled = 0usize;
    if offset < window_end {
        let mut stream = file.create_read_stream(offset..=window_end - 1);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                warn!(
                    path = file.path(),
                    offset,
                    filled,
                    error = %e,
                    "Stream failed during range read"
                );
                VfsError::Stream {
                    path: file.path().to_string(),
                    offset: offset + filled as u64,
                    reason: e.to_string(),
                }
            })?;

            let room = requested - filled;
            if chunk.len() > room {
                debug!(
                    path = file.path(),
                    extra = chunk.len() - room,
                    "Discarding bytes past requested window"
                );
            }
            let take = chunk.len().min(room);
            buf[filled..filled + take].copy_from_slice(&chunk[..take]);
            filled += take;
            trace!(path = file.path(), offset, filled, "Received chunk");

            if filled == requested {
                break;
            }
        }
    }

    if filled == requested {
        return Ok(ReadOutcome::Complete);
    }

    buf[filled..].fill(0);
    debug!(
        path = file.path(),
        offset,
        requested,
        bytes_read = filled,
        "Short read, zero-filled tail"
    );
    Ok(ReadOutcome::Short { bytes_read: filled })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::test_mocks::MockFile;

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_full_file_read() {
        let data = patterned(1000);
        let file = MockFile::new("main.db", data.clone()).with_chunk_size(64);

        let mut buf = vec![0xAA; 1000];
        let outcome = read_exact_at(&file, 1000, 0, &mut buf).await.unwrap();

        assert_eq!(outcome, ReadOutcome::Complete);
        assert_eq!(buf, data);
    }

    #[tokio::test]
    async fn test_read_past_end_is_short_and_zero_filled() {
        let data = patterned(1000);
        let file = MockFile::new("main.db", data.clone()).with_chunk_size(37);

        let mut buf = vec![0xAA; 200];
        let outcome = read_exact_at(&file, 1000, 900, &mut buf).await.unwrap();

        assert_eq!(outcome, ReadOutcome::Short { bytes_read: 100 });
        assert_eq!(&buf[..100], &data[900..1000]);
        assert!(buf[100..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_window_beyond_end_opens_no_stream() {
        let file = MockFile::new("main.db", patterned(1000));

        let mut buf = vec![0xAA; 512];
        let outcome = read_exact_at(&file, 1000, 4096, &mut buf).await.unwrap();

        assert_eq!(outcome, ReadOutcome::Short { bytes_read: 0 });
        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(file.streams_opened(), 0);
    }

    #[tokio::test]
    async fn test_empty_buffer_completes() {
        let file = MockFile::new("main.db", patterned(10));
        let mut buf: [u8; 0] = [];

        let outcome = read_exact_at(&file, 10, 3, &mut buf).await.unwrap();
        assert_eq!(outcome, ReadOutcome::Complete);
        assert_eq!(file.streams_opened(), 0);
    }

    #[tokio::test]
    async fn test_stream_fault_keeps_partial_prefix() {
        let data = patterned(1000);
        let file = MockFile::new("main.db", data.clone())
            .with_chunk_size(100)
            .failing_after(250);

        let mut buf = vec![0xAA; 500];
        let result = read_exact_at(&file, 1000, 0, &mut buf).await;

        match result {
            Err(VfsError::Stream { offset, .. }) => assert_eq!(offset, 250),
            other => panic!("expected stream fault, got {other:?}"),
        }
        assert_eq!(&buf[..250], &data[..250]);
        assert!(buf[250..].iter().all(|&b| b == 0xAA));
    }

    #[tokio::test]
    async fn test_truncated_stream_is_short_read() {
        // Swarm reports a larger length than it can actually stream
        let data = patterned(300);
        let file = MockFile::new("main.db", data.clone()).with_chunk_size(128);

        let mut buf = vec![0xAA; 400];
        let outcome = read_exact_at(&file, 1000, 0, &mut buf).await.unwrap();

        assert_eq!(outcome, ReadOutcome::Short { bytes_read: 300 });
        assert_eq!(&buf[..300], &data[..]);
        assert!(buf[300..].iter().all(|&b| b == 0));
    }

    proptest! {
        #[test]
        fn prop_any_chunking_assembles_source_bytes(
            len in 1usize..2048,
            chunk in 1usize..512,
            offset in 0usize..2048,
            want in 0usize..1024,
        ) {
            let data = patterned(len);
            let file = MockFile::new("main.db", data.clone()).with_chunk_size(chunk);
            let mut buf = vec![0xAA; want];

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let outcome = runtime
                .block_on(read_exact_at(&file, len as u64, offset as u64, &mut buf))
                .unwrap();

            let available = len.saturating_sub(offset).min(want);
            prop_assert_eq!(outcome.bytes_read(want), available);
            if available < want {
                prop_assert_eq!(outcome, ReadOutcome::Short { bytes_read: available });
            } else {
                prop_assert_eq!(outcome, ReadOutcome::Complete);
            }
            prop_assert_eq!(&buf[..available], &data[offset.min(len)..offset.min(len) + available]);
            prop_assert!(buf[available..].iter().all(|&b| b == 0));
        }
    }
}
