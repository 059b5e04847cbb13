//! Simulated swarm client serving a fixed catalog of torrents.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use undertow_core::swarm::{InfoHash, Swarm, SwarmClient, SwarmError, TorrentSpecifier};

use crate::swarm::{SimulatedSwarm, SimulatedTorrent};

/// Client that creates sessions for torrents registered in its catalog.
///
/// Adding an info hash that is not in the catalog still creates a session,
/// but its metadata never arrives, like a magnet link nobody seeds.
#[derive(Default)]
pub struct SimulatedSwarmClient {
    catalog: Mutex<HashMap<InfoHash, SimulatedTorrent>>,
    sessions: Mutex<HashMap<InfoHash, Arc<SimulatedSwarm>>>,
    added: Mutex<Vec<InfoHash>>,
    removed: Mutex<Vec<InfoHash>>,
    shut_down: AtomicBool,
}

impl SimulatedSwarmClient {
    /// Creates a client with an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `torrent` available, returning the info hash to add it by.
    pub fn publish(&self, torrent: SimulatedTorrent) -> InfoHash {
        let info_hash = torrent.info_hash();
        self.catalog.lock().insert(info_hash, torrent);
        info_hash
    }

    /// Live session for `info_hash`, if one was added and not removed.
    pub fn session(&self, info_hash: &InfoHash) -> Option<Arc<SimulatedSwarm>> {
        self.sessions.lock().get(info_hash).cloned()
    }

    /// Info hashes passed to `add`, in order.
    pub fn added(&self) -> Vec<InfoHash> {
        self.added.lock().clone()
    }

    /// Info hashes passed to `remove`, in order.
    pub fn removed(&self) -> Vec<InfoHash> {
        self.removed.lock().clone()
    }

    /// Rejects every later `add`.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.sessions.lock().clear();
    }
}

#[async_trait]
impl SwarmClient for SimulatedSwarmClient {
    async fn add(&self, torrent: TorrentSpecifier) -> Result<Arc<dyn Swarm>, SwarmError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SwarmError::ClientShutdown);
        }

        let info_hash = torrent.info_hash();
        self.added.lock().push(info_hash);

        let blueprint = self.catalog.lock().get(&info_hash).cloned();
        let swarm = match blueprint {
            Some(blueprint) => blueprint.start_session(),
            None => {
                tracing::warn!(%info_hash, "SimulatedSwarmClient: torrent not in catalog, metadata will never arrive");
                SimulatedTorrent::new().without_metadata().start_session()
            }
        };

        self.sessions.lock().insert(info_hash, Arc::clone(&swarm));
        Ok(swarm as Arc<dyn Swarm>)
    }

    async fn remove(&self, info_hash: InfoHash) {
        self.removed.lock().push(info_hash);
        if self.sessions.lock().remove(&info_hash).is_some() {
            tracing::debug!(%info_hash, "SimulatedSwarmClient: session removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn torrent() -> SimulatedTorrent {
        SimulatedTorrent::new().file("main.db", vec![7u8; 100])
    }

    #[tokio::test]
    async fn test_add_published_torrent() {
        let client = SimulatedSwarmClient::new();
        let info_hash = client.publish(torrent());

        let swarm = client.add(TorrentSpecifier::InfoHash(info_hash)).await.unwrap();
        assert!(swarm.is_ready());
        assert_eq!(swarm.files().len(), 1);
        assert_eq!(client.added(), vec![info_hash]);
        assert!(client.session(&info_hash).is_some());
    }

    #[tokio::test]
    async fn test_add_by_magnet_link() {
        let client = SimulatedSwarmClient::new();
        let info_hash = client.publish(torrent());
        let magnet = format!("magnet:?xt=urn:btih:{info_hash}&dn=catalog");

        let specifier: TorrentSpecifier = magnet.parse().unwrap();
        let swarm = client.add(specifier).await.unwrap();
        assert!(swarm.is_ready());
    }

    #[tokio::test]
    async fn test_unknown_torrent_never_ready() {
        let client = SimulatedSwarmClient::new();
        let info_hash = InfoHash::new([9u8; 20]);

        let swarm = client.add(TorrentSpecifier::InfoHash(info_hash)).await.unwrap();
        assert!(!swarm.is_ready());
        assert!(swarm.files().is_empty());
    }

    #[tokio::test]
    async fn test_remove_drops_session() {
        let client = SimulatedSwarmClient::new();
        let info_hash = client.publish(torrent());

        client.add(TorrentSpecifier::InfoHash(info_hash)).await.unwrap();
        client.remove(info_hash).await;

        assert!(client.session(&info_hash).is_none());
        assert_eq!(client.removed(), vec![info_hash]);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_add() {
        let client = SimulatedSwarmClient::new();
        let info_hash = client.publish(torrent());
        client.shutdown();

        let result = client.add(TorrentSpecifier::InfoHash(info_hash)).await;
        assert!(matches!(result, Err(SwarmError::ClientShutdown)));
    }
}
