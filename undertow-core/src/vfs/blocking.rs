//! Blocking bridge for storage engines with synchronous I/O callbacks
//!
//! Storage engines call their file layer synchronously. `BlockingVfs` owns a
//! current-thread tokio runtime and drives each adapter operation to
//! completion on the calling thread, so no extra worker threads are started.
//! Methods must not be called from inside an async context.

use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use super::adapter::SwarmVfs;
use super::gate::GateState;
use super::types::{AccessMode, DeviceCharacteristics, FileId, OpenFlags, ResultCode};
use super::VfsResult;
use crate::config::VfsConfig;
use crate::swarm::SwarmSource;

/// Synchronous facade over [`SwarmVfs`].
pub struct BlockingVfs {
    runtime: Runtime,
    vfs: SwarmVfs,
}

impl BlockingVfs {
    /// Builds a private runtime and engages the swarm on it.
    ///
    /// # Errors
    /// - `VfsError::Io` - Runtime could not be created
    /// - `VfsError::Config` - Configuration values are unusable
    /// - `VfsError::Swarm` - The client could not create the session
    pub fn connect(source: SwarmSource, config: VfsConfig) -> VfsResult<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let vfs = runtime.block_on(SwarmVfs::new(source, config))?;
        Ok(Self { runtime, vfs })
    }

    /// Opens `name` under `file_id`, returning the flags to echo.
    ///
    /// # Errors
    /// - `ResultCode::CantOpen` - Unknown name, unavailable swarm, or identifier in use
    pub fn open(
        &self,
        name: Option<&str>,
        file_id: FileId,
        flags: OpenFlags,
    ) -> Result<OpenFlags, ResultCode> {
        self.runtime.block_on(self.vfs.open(name, file_id, flags))
    }

    /// Closes `file_id`.
    pub fn close(&self, file_id: FileId) -> ResultCode {
        self.vfs.close(file_id)
    }

    /// Fills `buf` from `file_id` at `offset`.
    ///
    /// # Errors
    /// - `ResultCode::IoErrShortRead` - File ended first; the tail of `buf` is zeroed
    /// - `ResultCode::IoErrRead` - File not open or stream fault
    pub fn read(&self, file_id: FileId, buf: &mut [u8], offset: u64) -> Result<(), ResultCode> {
        self.runtime.block_on(self.vfs.read(file_id, buf, offset))
    }

    /// Total length of `file_id`.
    ///
    /// # Errors
    /// - `ResultCode::IoErrFstat` - File not open
    pub fn file_size(&self, file_id: FileId) -> Result<u64, ResultCode> {
        self.vfs.file_size(file_id)
    }

    /// Whether `name` exists and satisfies `mode`.
    ///
    /// # Errors
    /// Never fails; the result type matches the engine contract.
    pub fn access(&self, name: Option<&str>, mode: AccessMode) -> Result<bool, ResultCode> {
        self.runtime.block_on(self.vfs.access(name, mode))
    }

    /// Capability bits for every file.
    pub fn device_characteristics(&self) -> DeviceCharacteristics {
        self.vfs.device_characteristics()
    }

    /// Current readiness gate state.
    pub fn gate_state(&self) -> GateState {
        self.vfs.gate_state()
    }

    /// Lets pending swarm work, such as the readiness timer, make progress.
    pub fn idle(&self, duration: Duration) {
        self.runtime.block_on(tokio::time::sleep(duration));
    }

    /// Async adapter driven by this bridge.
    pub fn inner(&self) -> &SwarmVfs {
        &self.vfs
    }

    /// Shuts the adapter down and drops the runtime.
    pub fn shutdown(self) {
        self.runtime.block_on(self.vfs.shutdown());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;
    use crate::swarm::Swarm;
    use crate::vfs::gate::GateError;
    use crate::test_mocks::{MockFile, MockSwarm};

    fn connect(swarm: &Arc<MockSwarm>, config: VfsConfig) -> BlockingVfs {
        BlockingVfs::connect(
            SwarmSource::Existing(Arc::clone(swarm) as Arc<dyn Swarm>),
            config,
        )
        .unwrap()
    }

    #[test]
    fn test_blocking_open_read_close() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 256) as u8).collect();
        let swarm = MockSwarm::builder()
            .ready()
            .file(MockFile::new("main.db", data.clone()).with_chunk_size(1000))
            .build();
        let vfs = connect(&swarm, VfsConfig::default());
        let id = FileId::new(7);

        assert!(vfs.open(Some("main.db"), id, OpenFlags::READONLY).is_ok());
        assert_eq!(vfs.file_size(id), Ok(4096));

        let mut page = vec![0u8; 1024];
        assert_eq!(vfs.read(id, &mut page, 1024), Ok(()));
        assert_eq!(&page[..], &data[1024..2048]);

        assert_eq!(vfs.read(id, &mut page, 3584), Err(ResultCode::IoErrShortRead));
        assert_eq!(&page[..512], &data[3584..]);
        assert!(page[512..].iter().all(|&b| b == 0));

        assert_eq!(vfs.close(id), ResultCode::Ok);
        assert_eq!(vfs.file_size(id), Err(ResultCode::IoErrFstat));
        vfs.shutdown();
    }

    #[test]
    fn test_blocking_readiness_signalled_from_another_thread() {
        let swarm = MockSwarm::builder()
            .file(MockFile::new("main.db", vec![1u8; 64]))
            .build();
        let vfs = connect(&swarm, VfsConfig::default());

        let signaller = {
            let swarm = Arc::clone(&swarm);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                swarm.mark_ready();
            })
        };

        assert!(vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY).is_ok());
        assert_eq!(vfs.gate_state(), GateState::Ready);
        signaller.join().unwrap();
    }

    #[test]
    fn test_blocking_timeout_does_not_hang() {
        let swarm = MockSwarm::builder()
            .file(MockFile::new("main.db", vec![1u8; 64]))
            .build();
        let config = VfsConfig::default().with_ready_timeout(Duration::from_millis(50));
        let vfs = connect(&swarm, config);

        let started = Instant::now();
        assert_eq!(
            vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY),
            Err(ResultCode::CantOpen)
        );
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(vfs.access(Some("main.db"), AccessMode::Exists), Ok(false));
    }

    #[test]
    fn test_blocking_deadline_counts_while_idle() {
        let swarm = MockSwarm::builder()
            .file(MockFile::new("main.db", vec![1u8; 64]))
            .build();
        let config = VfsConfig::default().with_ready_timeout(Duration::from_millis(200));
        let vfs = connect(&swarm, config);

        // Runtime is not driven while the caller sleeps
        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(
            vfs.gate_state(),
            GateState::Failed(GateError::TimedOut { timeout_ms: 200 })
        );

        let started = Instant::now();
        assert_eq!(
            vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY),
            Err(ResultCode::CantOpen)
        );
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_blocking_signal_delivered_while_idle_wins() {
        let swarm = MockSwarm::builder()
            .file(MockFile::new("main.db", vec![1u8; 64]))
            .build();
        let config = VfsConfig::default().with_ready_timeout(Duration::from_millis(100));
        let vfs = connect(&swarm, config);

        swarm.mark_ready();
        std::thread::sleep(Duration::from_millis(150));

        assert_eq!(vfs.gate_state(), GateState::Ready);
        assert!(vfs.open(Some("main.db"), FileId::new(1), OpenFlags::READONLY).is_ok());
    }
}
