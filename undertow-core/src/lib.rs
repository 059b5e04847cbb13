//! Undertow Core - Swarm-backed file access for embedded database engines
//!
//! This crate lets a synchronous, offset-addressable file API be served by files
//! whose bytes arrive incrementally from a BitTorrent swarm. It provides the
//! readiness gate, path resolution, open-file registry, range-read engine and
//! the adapter surfaces that tie them together.

pub mod config;
pub mod swarm;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_mocks;
pub mod tracing_setup;
pub mod vfs;

// Re-export main types for convenient access
pub use config::{ConfigError, UndertowConfig, VfsConfig};
pub use swarm::{
    ByteStream, InfoHash, MagnetLink, Swarm, SwarmClient, SwarmError, SwarmFile, SwarmSource,
    TorrentSpecifier,
};
pub use vfs::{
    AccessMode, BlockingVfs, FileId, GateError, GateState, OpenFlags, ReadOutcome, ResultCode,
    SwarmVfs, VfsError,
};

/// Core errors that can bubble up from any Undertow subsystem.
///
/// High-level error types representing failures in core functionality.
#[derive(Debug, thiserror::Error)]
pub enum UndertowError {
    #[error("Swarm error: {0}")]
    Swarm(#[from] SwarmError),

    #[error("File system error: {0}")]
    Vfs(#[from] VfsError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UndertowError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            UndertowError::Swarm(e) => match e {
                SwarmError::InvalidSpecifier { reason } => {
                    format!("Invalid torrent identifier: {reason}")
                }
                SwarmError::TorrentNotFound { info_hash } => {
                    format!("Torrent {info_hash} not found")
                }
                _ => "Swarm error occurred".to_string(),
            },
            UndertowError::Vfs(e) => match e {
                VfsError::NotReady { .. } => {
                    "Torrent metadata is not available; the file is unavailable".to_string()
                }
                VfsError::NotFound { path } => format!("File not found in torrent: {path}"),
                _ => "File access error occurred".to_string(),
            },
            UndertowError::Configuration(e) => format!("Configuration error: {e}"),
            UndertowError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            UndertowError::Configuration(_)
                | UndertowError::Swarm(SwarmError::InvalidSpecifier { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, UndertowError>;
