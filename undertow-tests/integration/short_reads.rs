//! Range reads that cross the end of a file or hit a failing stream

use undertow_core::{FileId, OpenFlags, ReadOutcome, ResultCode, VfsConfig};
use undertow_sim::{SimulatedTorrent, StreamProfile};

use crate::support::{borrowed_vfs, database_torrent, patterned};

#[tokio::test(start_paused = true)]
async fn test_read_crossing_eof_is_short_and_zero_filled() {
    let swarm = database_torrent(1000).start_session();
    let vfs = borrowed_vfs(&swarm, VfsConfig::default()).await;
    let id = FileId::new(1);
    let data = patterned(1000);

    assert!(vfs.open(Some("main.db"), id, OpenFlags::READONLY).await.is_ok());

    let mut buf = vec![0xAAu8; 200];
    assert_eq!(vfs.read(id, &mut buf, 900).await, Err(ResultCode::IoErrShortRead));
    assert_eq!(&buf[..100], &data[900..]);
    assert!(buf[100..].iter().all(|&b| b == 0));
}

#[tokio::test(start_paused = true)]
async fn test_full_file_round_trip_in_pages() {
    let swarm = database_torrent(4096 * 3 + 17).start_session();
    let vfs = borrowed_vfs(&swarm, VfsConfig::default()).await;
    let id = FileId::new(1);
    let data = patterned(4096 * 3 + 17);

    vfs.open(Some("main.db"), id, OpenFlags::READONLY).await.unwrap();
    let size = vfs.file_size(id).unwrap();
    assert_eq!(size, data.len() as u64);

    let mut assembled = Vec::new();
    let mut offset = 0u64;
    while offset < size {
        let mut page = vec![0u8; 4096];
        let outcome = vfs.read_at(id, offset, &mut page).await.unwrap();
        let got = outcome.bytes_read(page.len());
        assembled.extend_from_slice(&page[..got]);
        offset += 4096;
    }
    assert_eq!(assembled, data);
}

#[tokio::test(start_paused = true)]
async fn test_read_at_eof_opens_no_stream() {
    let swarm = database_torrent(1000).start_session();
    let vfs = borrowed_vfs(&swarm, VfsConfig::default()).await;
    let id = FileId::new(1);
    vfs.open(Some("main.db"), id, OpenFlags::READONLY).await.unwrap();

    let mut buf = vec![1u8; 10];
    let outcome = vfs.read_at(id, 1000, &mut buf).await.unwrap();
    assert_eq!(outcome, ReadOutcome::Short { bytes_read: 0 });
    assert!(buf.iter().all(|&b| b == 0));
    assert_eq!(swarm.simulated_file("main.db").unwrap().streams_opened(), 0);
}

#[tokio::test]
async fn test_stream_fault_is_read_error() {
    let swarm = SimulatedTorrent::new()
        .file("main.db", patterned(1000))
        .profile(StreamProfile::default().with_chunk_size(64).with_fault_at(300))
        .start_session();
    let vfs = borrowed_vfs(&swarm, VfsConfig::default()).await;
    let id = FileId::new(1);
    vfs.open(Some("main.db"), id, OpenFlags::READONLY).await.unwrap();

    let mut head = vec![0u8; 200];
    assert_eq!(vfs.read(id, &mut head, 0).await, Ok(()));

    let mut across = vec![0u8; 200];
    assert_eq!(vfs.read(id, &mut across, 200).await, Err(ResultCode::IoErrRead));
}

#[tokio::test]
async fn test_unopened_file_id_is_io_error() {
    let swarm = database_torrent(100).start_session();
    let vfs = borrowed_vfs(&swarm, VfsConfig::default()).await;
    let id = FileId::new(99);

    let mut buf = vec![0u8; 10];
    assert_eq!(vfs.read(id, &mut buf, 0).await, Err(ResultCode::IoErrRead));
    assert_eq!(vfs.file_size(id), Err(ResultCode::IoErrFstat));
}

#[tokio::test]
async fn test_size_after_close_is_io_error() {
    let swarm = database_torrent(100).start_session();
    let vfs = borrowed_vfs(&swarm, VfsConfig::default()).await;
    let id = FileId::new(5);

    vfs.open(Some("main.db"), id, OpenFlags::READONLY).await.unwrap();
    assert_eq!(vfs.close(id), ResultCode::Ok);
    assert_eq!(vfs.file_size(id), Err(ResultCode::IoErrFstat));
    assert_eq!(vfs.close(id), ResultCode::Ok);
}
