//! Storage-engine facing adapter over one swarm session
//!
//! Every operation settles to an explicit `ResultCode`; internal errors are
//! logged and translated here and never reach the engine as-is.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::gate::{GateState, ReadinessGate};
use super::range_reader::{ReadOutcome, read_exact_at};
use super::registry::{OpenFileRegistry, SelectionPolicy};
use super::resolver::PathResolver;
use super::types::{AccessMode, DeviceCharacteristics, FileId, OpenFlags, ResultCode};
use super::{VfsError, VfsOp, VfsResult};
use crate::config::VfsConfig;
use crate::swarm::{InfoHash, Swarm, SwarmClient, SwarmSource};

/// Read-only file system over a swarm session.
///
/// Created from a [`SwarmSource`]. When the source is `New`, the adapter owns
/// the session: opened files it prefetches are deselected on close, and
/// `shutdown` removes the session from its client.
pub struct SwarmVfs {
    swarm: Arc<dyn Swarm>,
    gate: Arc<ReadinessGate>,
    registry: OpenFileRegistry,
    owner: Option<Arc<dyn SwarmClient>>,
    config: VfsConfig,
}

impl SwarmVfs {
    /// Engages the swarm session and starts the readiness timeout.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// - `VfsError::Config` - Configuration values are unusable
    /// - `VfsError::Swarm` - The client could not create the session
    pub async fn new(source: SwarmSource, config: VfsConfig) -> VfsResult<Self> {
        config.validate()?;

        let (swarm, owner) = match source {
            SwarmSource::Existing(swarm) => (swarm, None),
            SwarmSource::New { client, torrent } => {
                let swarm = client.add(torrent).await?;
                (swarm, Some(client))
            }
        };

        let gate = Arc::new(ReadinessGate::engage(&*swarm, config.ready_timeout));
        let resolver = PathResolver::new(
            Arc::clone(&swarm),
            Arc::clone(&gate),
            config.main_file.clone(),
        );
        let registry = OpenFileRegistry::new(
            resolver,
            SelectionPolicy {
                prefetch: config.prefetch,
                owns_session: owner.is_some(),
            },
        );

        info!(
            info_hash = %swarm.info_hash(),
            owned = owner.is_some(),
            prefetch = config.prefetch,
            timeout_ms = config.ready_timeout.as_millis() as u64,
            "Swarm file system engaged"
        );

        Ok(Self {
            swarm,
            gate,
            registry,
            owner,
            config,
        })
    }

    /// Opens `name` (or the main file when `None`) under `file_id`.
    ///
    /// Returns the flags to echo back to the engine.
    ///
    /// # Errors
    /// - `ResultCode::CantOpen` - Unknown name, unavailable swarm, or identifier in use
    pub async fn open(
        &self,
        name: Option<&str>,
        file_id: FileId,
        flags: OpenFlags,
    ) -> Result<OpenFlags, ResultCode> {
        match self.registry.open(file_id, name).await {
            Ok(_) => Ok(flags),
            Err(e) => {
                let name = name.unwrap_or("<main>");
                if e.is_unavailable() {
                    info!(%file_id, name, error = %e, "File unavailable");
                } else {
                    warn!(%file_id, name, error = %e, "Open failed");
                }
                Err(e.result_code(VfsOp::Open))
            }
        }
    }

    /// Closes `file_id`. Always succeeds.
    pub fn close(&self, file_id: FileId) -> ResultCode {
        if !self.registry.close(file_id) {
            debug!(%file_id, "Close of unopened file ignored");
        }
        ResultCode::Ok
    }

    /// Fills `buf` with the bytes of `file_id` starting at `offset`.
    ///
    /// # Errors
    /// - `ResultCode::IoErrShortRead` - File ended first; the tail of `buf` is zeroed
    /// - `ResultCode::IoErrRead` - File not open or stream fault
    pub async fn read(&self, file_id: FileId, buf: &mut [u8], offset: u64) -> Result<(), ResultCode> {
        match self.read_at(file_id, offset, buf).await {
            Ok(ReadOutcome::Complete) => Ok(()),
            Ok(ReadOutcome::Short { .. }) => Err(ResultCode::IoErrShortRead),
            Err(e) => {
                warn!(%file_id, offset, len = buf.len(), error = %e, "Read failed");
                Err(e.result_code(VfsOp::Read))
            }
        }
    }

    /// Range read with the typed outcome.
    ///
    /// # Errors
    /// - `VfsError::FileNotOpen` - No entry for `file_id`
    /// - `VfsError::Stream` - The stream failed mid-read
    pub async fn read_at(
        &self,
        file_id: FileId,
        offset: u64,
        buf: &mut [u8],
    ) -> VfsResult<ReadOutcome> {
        let entry = self.registry.get(file_id)?;
        read_exact_at(&*entry.file, entry.length, offset, buf).await
    }

    /// Total length of `file_id`.
    ///
    /// # Errors
    /// - `ResultCode::IoErrFstat` - File not open
    pub fn file_size(&self, file_id: FileId) -> Result<u64, ResultCode> {
        self.registry.size(file_id).map_err(|e| {
            debug!(%file_id, error = %e, "Size query failed");
            e.result_code(VfsOp::FileSize)
        })
    }

    /// Whether `name` exists and satisfies `mode`. Never fails.
    pub async fn access(&self, name: Option<&str>, mode: AccessMode) -> Result<bool, ResultCode> {
        Ok(self.registry.access_check(name, mode).await)
    }

    /// Capability bits for every file: the backing store is immutable.
    pub fn device_characteristics(&self) -> DeviceCharacteristics {
        DeviceCharacteristics::IMMUTABLE
    }

    /// Current readiness gate state.
    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// Waits for the readiness gate to settle.
    ///
    /// # Errors
    /// - `VfsError::NotReady` - Gate timed out or was torn down
    pub async fn await_ready(&self) -> VfsResult<()> {
        self.gate.await_ready().await.map_err(VfsError::from)
    }

    /// Number of currently open files.
    pub fn open_file_count(&self) -> usize {
        self.registry.len()
    }

    /// Info hash of the underlying session.
    pub fn info_hash(&self) -> InfoHash {
        self.swarm.info_hash()
    }

    /// Whether the adapter created, and therefore owns, the session.
    pub fn owns_session(&self) -> bool {
        self.owner.is_some()
    }

    /// Configuration the adapter was built with.
    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    /// Tears the adapter down.
    ///
    /// A pending gate fails with `TornDown`, every open file is closed, and an
    /// owned session is removed from its client.
    pub async fn shutdown(&self) {
        self.gate.close();
        let closed = self.registry.close_all();

        if let Some(client) = &self.owner {
            client.remove(self.swarm.info_hash()).await;
        }

        info!(
            info_hash = %self.swarm.info_hash(),
            closed,
            "Swarm file system shut down"
        );
    }
}
