//! Boundary to the peer-to-peer swarm that supplies file bytes
//!
//! The swarm layer owns peer discovery, piece selection and download scheduling.
//! This module only describes what the file access adapter consumes from it:
//! a published file list, per-file byte-range streams, download selection, and
//! a single "metadata ready" notification.

pub mod specifier;

use std::fmt;
use std::ops::RangeInclusive;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use tokio::sync::oneshot;

pub use specifier::{MagnetLink, TorrentSpecifier};

/// SHA-1 hash identifying a unique torrent.
///
/// 20-byte SHA-1 hash of the info dictionary from a torrent file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parses a 40 character hex string.
    ///
    /// # Errors
    /// - `SwarmError::InvalidSpecifier` - Wrong length or non-hex characters
    pub fn from_hex(hash_str: &str) -> Result<Self, SwarmError> {
        if hash_str.len() != 40 {
            return Err(SwarmError::InvalidSpecifier {
                reason: format!("Invalid hash length: {} (expected 40)", hash_str.len()),
            });
        }

        let mut hash = [0u8; 20];
        hex::decode_to_slice(hash_str, &mut hash).map_err(|e| SwarmError::InvalidSpecifier {
            reason: format!("Invalid hex in hash {hash_str}: {e}"),
        })?;
        Ok(Self(hash))
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Failures reported by the swarm collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SwarmError {
    #[error("Invalid torrent specifier: {reason}")]
    InvalidSpecifier { reason: String },

    #[error("Torrent {info_hash} not found")]
    TorrentNotFound { info_hash: InfoHash },

    #[error("Stream for {path} failed: {reason}")]
    StreamFailed { path: String, reason: String },

    #[error("Swarm client has shut down")]
    ClientShutdown,
}

/// Chunked byte stream over a file range, in file order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, SwarmError>> + Send>>;

/// One file inside a swarm session.
///
/// Handles are owned by the swarm layer; the adapter keeps shared references
/// for as long as a file is open.
pub trait SwarmFile: Send + Sync {
    /// Path of the file inside the torrent, stable for the session lifetime.
    fn path(&self) -> &str;

    /// Total size in bytes. Only meaningful once the session is ready.
    fn length(&self) -> u64;

    /// Opens a sequential stream over the inclusive byte range.
    ///
    /// Chunks may have any size. A range reaching past the end of the file
    /// yields the bytes that exist and then ends.
    fn create_read_stream(&self, range: RangeInclusive<u64>) -> ByteStream;

    /// Asks the swarm to start fetching this file's pieces.
    fn select(&self);

    /// Asks the swarm to stop fetching this file's pieces. Best-effort.
    fn deselect(&self);
}

/// A single torrent session inside the swarm.
pub trait Swarm: Send + Sync {
    /// Identifier of the torrent this session downloads.
    fn info_hash(&self) -> InfoHash;

    /// Whether the file list and lengths are already known.
    fn is_ready(&self) -> bool;

    /// Registers the one-shot notification fired when metadata becomes known.
    ///
    /// Implementations fire the sender at most once. A dropped receiver must be
    /// tolerated.
    fn notify_ready(&self, notifier: oneshot::Sender<()>);

    /// Published file list in torrent order. Empty until ready.
    fn files(&self) -> Vec<Arc<dyn SwarmFile>>;
}

/// Client able to create new torrent sessions.
#[async_trait]
pub trait SwarmClient: Send + Sync {
    /// Adds a torrent and returns its session.
    ///
    /// The returned session need not be ready yet.
    ///
    /// # Errors
    /// - `SwarmError::InvalidSpecifier` - Torrent cannot be identified
    /// - `SwarmError::ClientShutdown` - Client no longer accepts torrents
    async fn add(&self, torrent: TorrentSpecifier) -> Result<Arc<dyn Swarm>, SwarmError>;

    /// Removes a session previously created through `add`.
    async fn remove(&self, info_hash: InfoHash);
}

/// Where the adapter obtains its swarm session from.
///
/// Only `New` makes the adapter the owner of the session, which is what allows
/// it to deselect files and remove the session on shutdown.
pub enum SwarmSource {
    /// Wrap a session someone else created and keeps ownership of.
    Existing(Arc<dyn Swarm>),
    /// Create a session through the client and own it.
    New {
        client: Arc<dyn SwarmClient>,
        torrent: TorrentSpecifier,
    },
}

impl fmt::Debug for SwarmSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwarmSource::Existing(swarm) => f
                .debug_tuple("Existing")
                .field(&swarm.info_hash())
                .finish(),
            SwarmSource::New { torrent, .. } => {
                f.debug_struct("New").field("torrent", torrent).finish()
            }
        }
    }
}
