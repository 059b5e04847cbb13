//! Read-only file system adapter over a swarm session
//!
//! Composes the readiness gate, path resolver, open-file registry and
//! range-read engine into the operations an embedded database engine issues
//! against its storage layer.

pub mod adapter;
pub mod blocking;
pub mod gate;
pub mod range_reader;
pub mod registry;
pub mod resolver;
pub mod types;

pub use adapter::SwarmVfs;
pub use blocking::BlockingVfs;
pub use gate::{GateError, GateState, ReadinessGate};
pub use range_reader::{ReadOutcome, read_exact_at};
pub use registry::{OpenFile, OpenFileRegistry, SelectionPolicy};
pub use resolver::PathResolver;
pub use types::{AccessMode, DeviceCharacteristics, FileId, OpenFlags, ResultCode};

use crate::config::ConfigError;
use crate::swarm::SwarmError;

/// Unified error type for file access operations.
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    /// Swarm metadata never became available, or the adapter shut down
    #[error("Swarm not ready: {source}")]
    NotReady {
        #[from]
        source: GateError,
    },

    /// Path is absent from the swarm's file list
    #[error("File not found: {path}")]
    NotFound { path: String },

    /// File identifier has no open entry
    #[error("File {file_id} is not open")]
    FileNotOpen { file_id: FileId },

    /// File identifier already has an open entry
    #[error("File {file_id} is already open")]
    FileIdInUse { file_id: FileId },

    /// Byte stream failed while a read was in progress
    #[error("Stream fault reading {path} at offset {offset}: {reason}")]
    Stream {
        path: String,
        offset: u64,
        reason: String,
    },

    #[error("Swarm error: {0}")]
    Swarm(#[from] SwarmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for file access operations
pub type VfsResult<T> = Result<T, VfsError>;

impl VfsError {
    /// Whether the error means the requested file is unavailable rather than broken.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, VfsError::NotReady { .. } | VfsError::NotFound { .. })
    }
}

/// Engine operation a failure is reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfsOp {
    Open,
    Read,
    FileSize,
}

impl VfsError {
    /// Status code the engine sees when `op` fails with this error.
    ///
    /// Open failures of every kind collapse to `CantOpen` so an unavailable
    /// swarm looks like a missing file; read and size failures use the
    /// operation-specific I/O error.
    pub fn result_code(&self, op: VfsOp) -> ResultCode {
        match op {
            VfsOp::Open => ResultCode::CantOpen,
            VfsOp::Read => ResultCode::IoErrRead,
            VfsOp::FileSize => ResultCode::IoErrFstat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_result_code_mapping() {
        let not_found = VfsError::NotFound {
            path: "main.db".to_string(),
        };
        assert_eq!(not_found.result_code(VfsOp::Open), ResultCode::CantOpen);
        assert!(not_found.is_unavailable());

        let timed_out = VfsError::from(GateError::TimedOut { timeout_ms: 50 });
        assert_eq!(timed_out.result_code(VfsOp::Open), ResultCode::CantOpen);
        assert!(timed_out.is_unavailable());
        assert_eq!(
            timed_out.to_string(),
            "Swarm not ready: swarm metadata not ready after 50 ms"
        );

        let in_use = VfsError::FileIdInUse {
            file_id: FileId::new(3),
        };
        assert_eq!(in_use.result_code(VfsOp::Open), ResultCode::CantOpen);
        assert!(!in_use.is_unavailable());

        let fault = VfsError::Stream {
            path: "main.db".to_string(),
            offset: 4096,
            reason: "peer reset".to_string(),
        };
        assert_eq!(fault.result_code(VfsOp::Read), ResultCode::IoErrRead);
        assert!(!fault.is_unavailable());

        let not_open = VfsError::FileNotOpen {
            file_id: FileId::new(3),
        };
        assert_eq!(not_open.result_code(VfsOp::Read), ResultCode::IoErrRead);
        assert_eq!(not_open.result_code(VfsOp::FileSize), ResultCode::IoErrFstat);
    }
}
