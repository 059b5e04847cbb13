//! Simulated torrent sessions with delayed metadata.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use sha1::{Digest, Sha1};
use tokio::sync::oneshot;
use undertow_core::swarm::{InfoHash, Swarm, SwarmFile};

use crate::file::{SimulatedFile, StreamProfile};

/// Blueprint of a torrent the simulated network can serve.
///
/// Each call to [`SimulatedTorrent::start_session`] produces an independent
/// session with fresh counters and its own metadata timer.
#[derive(Debug, Clone)]
pub struct SimulatedTorrent {
    files: Vec<(String, Bytes)>,
    profile: StreamProfile,
    metadata_delay: Option<Duration>,
    metadata_available: bool,
}

impl Default for SimulatedTorrent {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTorrent {
    /// Creates an empty torrent whose metadata is available immediately.
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            profile: StreamProfile::default(),
            metadata_delay: None,
            metadata_available: true,
        }
    }

    /// Appends a file in torrent order.
    pub fn file(mut self, path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.files.push((path.into(), data.into()));
        self
    }

    /// Sets how every file streams its bytes.
    pub fn profile(mut self, profile: StreamProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Makes metadata arrive `delay` after a session starts.
    pub fn metadata_delay(mut self, delay: Duration) -> Self {
        self.metadata_delay = Some(delay);
        self
    }

    /// Makes metadata never arrive, as for a torrent without peers.
    pub fn without_metadata(mut self) -> Self {
        self.metadata_available = false;
        self
    }

    /// Info hash derived from the file list and contents.
    pub fn info_hash(&self) -> InfoHash {
        let mut hasher = Sha1::new();
        for (path, data) in &self.files {
            hasher.update(path.as_bytes());
            hasher.update((data.len() as u64).to_be_bytes());
            hasher.update(data);
        }
        InfoHash::new(hasher.finalize().into())
    }

    /// Total size of all files in bytes.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|(_, data)| data.len() as u64).sum()
    }

    /// Starts a new session for this torrent.
    ///
    /// With a metadata delay, readiness is scheduled on the current tokio
    /// runtime when there is one, otherwise on a helper thread.
    pub fn start_session(&self) -> Arc<SimulatedSwarm> {
        let files = self
            .files
            .iter()
            .map(|(path, data)| {
                Arc::new(SimulatedFile::new(
                    path.clone(),
                    data.clone(),
                    self.profile.clone(),
                ))
            })
            .collect();

        let swarm = Arc::new(SimulatedSwarm {
            info_hash: self.info_hash(),
            files,
            ready: AtomicBool::new(false),
            notifiers: Mutex::new(Vec::new()),
            ready_registrations: AtomicUsize::new(0),
        });

        if self.metadata_available {
            match self.metadata_delay {
                None => swarm.mark_ready(),
                Some(delay) => swarm.ready_after(delay),
            }
        }

        tracing::debug!(
            info_hash = %swarm.info_hash,
            files = self.files.len(),
            "SimulatedTorrent: session started"
        );
        swarm
    }
}

/// A running session of a [`SimulatedTorrent`].
pub struct SimulatedSwarm {
    info_hash: InfoHash,
    files: Vec<Arc<SimulatedFile>>,
    ready: AtomicBool,
    notifiers: Mutex<Vec<oneshot::Sender<()>>>,
    ready_registrations: AtomicUsize,
}

impl SimulatedSwarm {
    /// Publishes metadata and fires every registered notification.
    pub fn mark_ready(&self) {
        let mut notifiers = self.notifiers.lock();
        if self.ready.swap(true, Ordering::SeqCst) {
            return;
        }
        for notifier in notifiers.drain(..) {
            let _ = notifier.send(());
        }
        tracing::debug!(info_hash = %self.info_hash, "SimulatedSwarm: metadata ready");
    }

    /// Schedules `mark_ready` after `delay`.
    pub fn ready_after(self: &Arc<Self>, delay: Duration) {
        let swarm = Arc::clone(self);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    swarm.mark_ready();
                });
            }
            Err(_) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    swarm.mark_ready();
                });
            }
        }
    }

    /// Number of readiness notifications registered.
    pub fn ready_registrations(&self) -> usize {
        self.ready_registrations.load(Ordering::SeqCst)
    }

    /// Concrete file handle, available even before metadata.
    pub fn simulated_file(&self, path: &str) -> Option<Arc<SimulatedFile>> {
        self.files.iter().find(|file| file.path() == path).cloned()
    }
}

impl Swarm for SimulatedSwarm {
    fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn notify_ready(&self, notifier: oneshot::Sender<()>) {
        self.ready_registrations.fetch_add(1, Ordering::SeqCst);
        let mut notifiers = self.notifiers.lock();
        if self.is_ready() {
            let _ = notifier.send(());
        } else {
            notifiers.push(notifier);
        }
    }

    fn files(&self) -> Vec<Arc<dyn SwarmFile>> {
        if !self.is_ready() {
            return Vec::new();
        }
        self.files
            .iter()
            .map(|file| Arc::clone(file) as Arc<dyn SwarmFile>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_hash_is_content_derived() {
        let a = SimulatedTorrent::new().file("main.db", vec![1u8; 10]);
        let b = SimulatedTorrent::new().file("main.db", vec![1u8; 10]);
        let c = SimulatedTorrent::new().file("main.db", vec![2u8; 10]);

        assert_eq!(a.info_hash(), b.info_hash());
        assert_ne!(a.info_hash(), c.info_hash());
        assert_eq!(a.total_size(), 10);
    }

    #[test]
    fn test_immediate_metadata() {
        let swarm = SimulatedTorrent::new()
            .file("main.db", vec![0u8; 10])
            .start_session();

        assert!(swarm.is_ready());
        assert_eq!(swarm.files().len(), 1);
    }

    #[test]
    fn test_files_hidden_until_ready() {
        let swarm = SimulatedTorrent::new()
            .file("main.db", vec![0u8; 10])
            .without_metadata()
            .start_session();

        assert!(!swarm.is_ready());
        assert!(swarm.files().is_empty());
        assert!(swarm.simulated_file("main.db").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_metadata_fires_notification() {
        let swarm = SimulatedTorrent::new()
            .file("main.db", vec![0u8; 10])
            .metadata_delay(Duration::from_millis(100))
            .start_session();

        let (notifier, signal) = oneshot::channel();
        swarm.notify_ready(notifier);
        assert!(!swarm.is_ready());

        signal.await.unwrap();
        assert!(swarm.is_ready());
        assert_eq!(swarm.ready_registrations(), 1);
    }

    #[test]
    fn test_mark_ready_is_idempotent() {
        let swarm = SimulatedTorrent::new().without_metadata().start_session();
        let (notifier, signal) = oneshot::channel();
        swarm.notify_ready(notifier);

        swarm.mark_ready();
        swarm.mark_ready();
        assert!(tokio_test::block_on(signal).is_ok());
    }
}
