//! Mock swarm implementations for testing the file access adapter.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::swarm::{
    ByteStream, InfoHash, Swarm, SwarmClient, SwarmError, SwarmFile, TorrentSpecifier,
};

/// Mock file serving fixed-size chunks from an in-memory buffer.
pub struct MockFile {
    path: String,
    data: Bytes,
    chunk_size: usize,
    fail_after: Option<usize>,
    streams_opened: AtomicUsize,
    select_calls: AtomicUsize,
    deselect_calls: AtomicUsize,
}

impl MockFile {
    /// Creates a mock file delivering its bytes in 4 KiB chunks.
    pub fn new(path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
            chunk_size: 4096,
            fail_after: None,
            streams_opened: AtomicUsize::new(0),
            select_calls: AtomicUsize::new(0),
            deselect_calls: AtomicUsize::new(0),
        }
    }

    /// Sets the size of every chunk a stream yields.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Makes every stream fail once it has delivered `bytes` bytes.
    pub fn failing_after(mut self, bytes: usize) -> Self {
        self.fail_after = Some(bytes);
        self
    }

    /// Number of streams opened so far.
    pub fn streams_opened(&self) -> usize {
        self.streams_opened.load(Ordering::SeqCst)
    }

    /// Number of select calls received.
    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    /// Number of deselect calls received.
    pub fn deselect_calls(&self) -> usize {
        self.deselect_calls.load(Ordering::SeqCst)
    }
}

impl SwarmFile for MockFile {
    fn path(&self) -> &str {
        &self.path
    }

    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    fn create_read_stream(&self, range: RangeInclusive<u64>) -> ByteStream {
        self.streams_opened.fetch_add(1, Ordering::SeqCst);

        let len = self.data.len();
        let start = (*range.start() as usize).min(len);
        let end = (*range.end() as usize).saturating_add(1).min(len);
        let window = self.data.slice(start..end.max(start));

        let mut items: Vec<Result<Bytes, SwarmError>> = Vec::new();
        let mut delivered = 0usize;
        for chunk in window.chunks(self.chunk_size) {
            let limit = self.fail_after.unwrap_or(usize::MAX);
            if delivered + chunk.len() > limit {
                let partial = limit - delivered;
                if partial > 0 {
                    items.push(Ok(Bytes::copy_from_slice(&chunk[..partial])));
                }
                items.push(Err(SwarmError::StreamFailed {
                    path: self.path.clone(),
                    reason: "mock peer disconnected".to_string(),
                }));
                break;
            }
            delivered += chunk.len();
            items.push(Ok(Bytes::copy_from_slice(chunk)));
        }

        Box::pin(futures::stream::iter(items))
    }

    fn select(&self) {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn deselect(&self) {
        self.deselect_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Mock swarm session with manually triggered readiness.
pub struct MockSwarm {
    info_hash: InfoHash,
    ready: AtomicBool,
    notifiers: Mutex<Vec<oneshot::Sender<()>>>,
    ready_registrations: AtomicUsize,
    files: Vec<Arc<MockFile>>,
}

impl MockSwarm {
    /// Starts building a mock swarm.
    pub fn builder() -> MockSwarmBuilder {
        MockSwarmBuilder::default()
    }

    /// Publishes metadata and fires every registered notification.
    pub fn mark_ready(&self) {
        let mut notifiers = self.notifiers.lock();
        self.ready.store(true, Ordering::SeqCst);
        for notifier in notifiers.drain(..) {
            let _ = notifier.send(());
        }
    }

    /// Number of times a readiness notification was registered.
    pub fn ready_registrations(&self) -> usize {
        self.ready_registrations.load(Ordering::SeqCst)
    }

    /// Concrete handle for a file, for inspecting call counters.
    pub fn mock_file(&self, path: &str) -> Option<Arc<MockFile>> {
        self.files.iter().find(|file| file.path == path).cloned()
    }
}

impl Swarm for MockSwarm {
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

/// Builder for [`MockSwarm`].
#[derive(Default)]
pub struct MockSwarmBuilder {
    info_hash: Option<InfoHash>,
    ready: bool,
    files: Vec<MockFile>,
}

impl MockSwarmBuilder {
    /// Sets the torrent info hash.
    pub fn info_hash(mut self, info_hash: InfoHash) -> Self {
        self.info_hash = Some(info_hash);
        self
    }

    /// Makes the swarm ready from the start.
    pub fn ready(mut self) -> Self {
        self.ready = true;
        self
    }

    /// Adds a file in torrent order.
    pub fn file(mut self, file: MockFile) -> Self {
        self.files.push(file);
        self
    }

    /// Builds the mock swarm.
    pub fn build(self) -> Arc<MockSwarm> {
        Arc::new(MockSwarm {
            info_hash: self.info_hash.unwrap_or(InfoHash::new([7u8; 20])),
            ready: AtomicBool::new(self.ready),
            notifiers: Mutex::new(Vec::new()),
            ready_registrations: AtomicUsize::new(0),
            files: self.files.into_iter().map(Arc::new).collect(),
        })
    }
}

/// Mock swarm client handing out pre-registered sessions.
#[derive(Default)]
pub struct MockSwarmClient {
    catalog: Mutex<HashMap<InfoHash, Arc<MockSwarm>>>,
    added: Mutex<Vec<InfoHash>>,
    removed: Mutex<Vec<InfoHash>>,
}

impl MockSwarmClient {
    /// Creates an empty client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a session available for `add`.
    pub fn register(&self, swarm: Arc<MockSwarm>) {
        self.catalog.lock().insert(swarm.info_hash(), swarm);
    }

    /// Info hashes passed to `add`.
    pub fn added(&self) -> Vec<InfoHash> {
        self.added.lock().clone()
    }

    /// Info hashes passed to `remove`.
    pub fn removed(&self) -> Vec<InfoHash> {
        self.removed.lock().clone()
    }
}

#[async_trait]
impl SwarmClient for MockSwarmClient {
    async fn add(&self, torrent: TorrentSpecifier) -> Result<Arc<dyn Swarm>, SwarmError> {
        let info_hash = torrent.info_hash();
        self.added.lock().push(info_hash);

        let swarm = self
            .catalog
            .lock()
            .get(&info_hash)
            .cloned()
            .ok_or(SwarmError::TorrentNotFound { info_hash })?;
        Ok(swarm as Arc<dyn Swarm>)
    }

    async fn remove(&self, info_hash: InfoHash) {
        self.removed.lock().push(info_hash);
    }
}
