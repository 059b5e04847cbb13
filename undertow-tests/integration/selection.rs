//! Download selection and session ownership

use std::sync::Arc;

use undertow_core::{
    FileId, OpenFlags, ResultCode, Swarm, SwarmClient, SwarmSource, SwarmVfs, TorrentSpecifier,
    VfsConfig,
};
use undertow_sim::SimulatedSwarmClient;

use crate::support::{borrowed_vfs, database_torrent};

async fn owned_vfs(client: &Arc<SimulatedSwarmClient>, prefetch: bool) -> SwarmVfs {
    let info_hash = client.publish(database_torrent(2048));
    let source = SwarmSource::New {
        client: Arc::clone(client) as Arc<dyn SwarmClient>,
        torrent: TorrentSpecifier::InfoHash(info_hash),
    };
    SwarmVfs::new(source, VfsConfig::default().with_prefetch(prefetch))
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_prefetch_selects_once_per_open_and_deselects_on_close() {
    let client = Arc::new(SimulatedSwarmClient::new());
    let vfs = owned_vfs(&client, true).await;
    assert!(vfs.owns_session());

    let session = client.session(&vfs.info_hash()).unwrap();
    let main = session.simulated_file("main.db").unwrap();

    vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY)
        .await
        .unwrap();
    assert_eq!(main.select_calls(), 1);
    assert!(main.is_selected());

    assert_eq!(vfs.close(FileId::new(1)), ResultCode::Ok);
    assert_eq!(main.deselect_calls(), 1);
    assert!(!main.is_selected());

    vfs.open(Some("main.db"), FileId::new(2), OpenFlags::READONLY)
        .await
        .unwrap();
    assert_eq!(main.select_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_no_prefetch_leaves_selection_alone() {
    let client = Arc::new(SimulatedSwarmClient::new());
    let vfs = owned_vfs(&client, false).await;
    let session = client.session(&vfs.info_hash()).unwrap();
    let main = session.simulated_file("main.db").unwrap();

    vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY)
        .await
        .unwrap();
    vfs.close(FileId::new(1));

    assert_eq!(main.select_calls(), 0);
    assert_eq!(main.deselect_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_borrowed_session_is_never_deselected() {
    let swarm = database_torrent(2048).start_session();
    let vfs = borrowed_vfs(&swarm, VfsConfig::default().with_prefetch(true)).await;
    assert!(!vfs.owns_session());

    vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY)
        .await
        .unwrap();
    vfs.close(FileId::new(1));
    vfs.shutdown().await;

    let main = swarm.simulated_file("main.db").unwrap();
    assert_eq!(main.select_calls(), 1);
    assert_eq!(main.deselect_calls(), 0);
    assert!(swarm.is_ready());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_owned_session() {
    let client = Arc::new(SimulatedSwarmClient::new());
    let vfs = owned_vfs(&client, true).await;
    let info_hash = vfs.info_hash();
    let session = client.session(&info_hash).unwrap();

    vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY)
        .await
        .unwrap();
    vfs.open(Some("main.db-journal"), FileId::new(2), OpenFlags::READONLY)
        .await
        .unwrap();
    assert_eq!(vfs.open_file_count(), 2);

    vfs.shutdown().await;

    assert_eq!(vfs.open_file_count(), 0);
    assert_eq!(session.simulated_file("main.db").unwrap().deselect_calls(), 1);
    assert_eq!(
        session
            .simulated_file("main.db-journal")
            .unwrap()
            .deselect_calls(),
        1
    );
    assert_eq!(client.removed(), vec![info_hash]);
    assert!(client.session(&info_hash).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_reused_file_id_cannot_open() {
    let swarm = database_torrent(2048).start_session();
    let vfs = borrowed_vfs(&swarm, VfsConfig::default()).await;

    assert!(vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY).await.is_ok());
    assert_eq!(
        vfs.open(Some("main.db-journal"), FileId::new(1), OpenFlags::READONLY).await,
        Err(ResultCode::CantOpen)
    );
    assert_eq!(vfs.file_size(FileId::new(1)), Ok(2048));
}
