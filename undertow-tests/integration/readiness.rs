//! Readiness gate behavior against sessions whose metadata arrives late or never

use std::time::Duration;

use tokio::time::Instant;
use undertow_core::{
    AccessMode, FileId, GateError, GateState, OpenFlags, ResultCode, UndertowConfig, VfsConfig,
};
use undertow_sim::SimulatedTorrent;

use crate::support::{borrowed_vfs, database_torrent, patterned};

#[tokio::test(start_paused = true)]
async fn test_missing_path_cannot_open_and_does_not_exist() {
    let swarm = database_torrent(1000).start_session();
    let vfs = borrowed_vfs(&swarm, VfsConfig::default()).await;

    assert_eq!(
        vfs.open(Some("absent.db"), FileId::new(1), OpenFlags::READONLY).await,
        Err(ResultCode::CantOpen)
    );
    assert_eq!(vfs.access(Some("absent.db"), AccessMode::Exists).await, Ok(false));
    assert_eq!(vfs.access(Some("main.db"), AccessMode::Exists).await, Ok(true));
    assert_eq!(vfs.open_file_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fails_open_promptly() {
    let swarm = database_torrent(1000).without_metadata().start_session();
    let config = VfsConfig::default().with_ready_timeout(Duration::from_millis(50));
    let vfs = borrowed_vfs(&swarm, config).await;

    let started = Instant::now();
    assert_eq!(
        vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY).await,
        Err(ResultCode::CantOpen)
    );
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_millis(100));

    assert_eq!(
        vfs.gate_state(),
        GateState::Failed(GateError::TimedOut { timeout_ms: 50 })
    );
    assert_eq!(vfs.access(Some("main.db"), AccessMode::Exists).await, Ok(false));
}

#[tokio::test(start_paused = true)]
async fn test_late_metadata_within_timeout_is_served() {
    let swarm = SimulatedTorrent::new()
        .file("main.db", patterned(512))
        .metadata_delay(Duration::from_millis(300))
        .start_session();
    let vfs = borrowed_vfs(&swarm, VfsConfig::default()).await;
    assert_eq!(vfs.gate_state(), GateState::Pending);

    let id = FileId::new(1);
    assert!(vfs.open(Some("main.db"), id, OpenFlags::READONLY).await.is_ok());
    assert_eq!(vfs.gate_state(), GateState::Ready);
    assert_eq!(vfs.file_size(id), Ok(512));
}

#[tokio::test(start_paused = true)]
async fn test_metadata_after_timeout_is_ignored() {
    let swarm = SimulatedTorrent::new()
        .file("main.db", patterned(512))
        .metadata_delay(Duration::from_millis(200))
        .start_session();
    let config = UndertowConfig::for_testing().vfs;
    assert_eq!(config.ready_timeout, Duration::from_millis(100));
    let vfs = borrowed_vfs(&swarm, config).await;

    assert!(vfs.await_ready().await.is_err());
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(matches!(vfs.gate_state(), GateState::Failed(_)));
    assert_eq!(
        vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY).await,
        Err(ResultCode::CantOpen)
    );
}

#[tokio::test(start_paused = true)]
async fn test_gate_registers_once_for_many_operations() {
    let swarm = SimulatedTorrent::new()
        .file("main.db", patterned(256))
        .metadata_delay(Duration::from_millis(50))
        .start_session();
    let vfs = borrowed_vfs(&swarm, VfsConfig::default()).await;

    let (a, b, c) = tokio::join!(
        vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY),
        vfs.open(Some("main.db"), FileId::new(2), OpenFlags::READONLY),
        vfs.access(Some("main.db"), AccessMode::Read),
    );
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(c, Ok(true));
    assert_eq!(swarm.ready_registrations(), 1);

    assert!(vfs.await_ready().await.is_ok());
    assert_eq!(swarm.ready_registrations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_tears_down_pending_gate() {
    let swarm = database_torrent(100).without_metadata().start_session();
    let vfs = borrowed_vfs(&swarm, VfsConfig::default()).await;

    vfs.shutdown().await;
    assert_eq!(vfs.gate_state(), GateState::Failed(GateError::TornDown));
    assert_eq!(
        vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY).await,
        Err(ResultCode::CantOpen)
    );
}
