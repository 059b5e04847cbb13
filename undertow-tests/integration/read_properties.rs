//! Property tests: any window over any chunking reads the same bytes

use std::sync::Arc;

use proptest::prelude::*;
use undertow_core::{FileId, OpenFlags, ReadOutcome, Swarm, SwarmSource, SwarmVfs, VfsConfig};
use undertow_sim::{SimulatedTorrent, StreamProfile};

use crate::support::patterned;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_reads_match_file_contents(
        file_len in 0usize..6000,
        offset in 0u64..7000,
        len in 0usize..3000,
        chunk_size in 1usize..1500,
        seed in any::<u64>(),
    ) {
        let data = patterned(file_len);
        let torrent = SimulatedTorrent::new()
            .file("main.db", data.clone())
            .profile(StreamProfile::default().with_chunk_size(chunk_size).with_irregular_chunks(seed));

        let (outcome, buf) = runtime().block_on(async {
            let swarm = torrent.start_session();
            let vfs = SwarmVfs::new(SwarmSource::Existing(swarm as Arc<dyn Swarm>), VfsConfig::default())
                .await
                .unwrap();
            let id = FileId::new(1);
            vfs.open(Some("main.db"), id, OpenFlags::READONLY).await.unwrap();

            let mut buf = vec![0xFFu8; len];
            let outcome = vfs.read_at(id, offset, &mut buf).await.unwrap();
            (outcome, buf)
        });

        let start = (offset as usize).min(file_len);
        let end = (offset as usize).saturating_add(len).min(file_len);
        let available = end - start;

        prop_assert_eq!(&buf[..available], &data[start..end]);
        prop_assert!(buf[available..].iter().all(|&b| b == 0));
        if available == len {
            prop_assert_eq!(outcome, ReadOutcome::Complete);
        } else {
            prop_assert_eq!(outcome, ReadOutcome::Short { bytes_read: available });
        }
    }
}
