//! Undertow Simulation - Deterministic in-memory swarm for testing.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
//!
//! Provides swarm sessions whose files live in memory but behave like a real
//! download: metadata arrives after a delay, bytes are delivered in
//! irregular chunks with latency, and streams can be made to fail at a chosen
//! offset. Same seed, same chunk boundaries.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use undertow_core::{SwarmSource, SwarmVfs, VfsConfig};
//! use undertow_sim::{SimulatedTorrent, StreamProfile};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let torrent = SimulatedTorrent::new()
//!     .file("catalog.db", vec![0u8; 8192])
//!     .profile(StreamProfile::default().with_chunk_size(512))
//!     .metadata_delay(Duration::from_millis(20));
//!
//! let swarm = torrent.start_session();
//! let vfs = SwarmVfs::new(SwarmSource::Existing(swarm), VfsConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod file;
pub mod seed;
pub mod swarm;

pub use client::SimulatedSwarmClient;
pub use file::{SimulatedFile, StreamProfile};
pub use seed::{SeedError, seed_directory};
pub use swarm::{SimulatedSwarm, SimulatedTorrent};
