//! Logical filename to swarm file resolution

use std::sync::Arc;

use tracing::debug;

use super::gate::ReadinessGate;
use super::{VfsError, VfsResult};
use crate::swarm::{Swarm, SwarmFile};

/// Resolves names against the swarm's published file list.
///
/// Matching is exact and case-sensitive with no normalization; the first
/// file in torrent order with an identical path wins. A missing name refers
/// to the main database file: the configured `main_file` if set, otherwise
/// the only file of a single-file torrent.
pub struct PathResolver {
    swarm: Arc<dyn Swarm>,
    gate: Arc<ReadinessGate>,
    main_file: Option<String>,
}

impl PathResolver {
    /// Creates a resolver over the given session and its readiness gate.
    pub fn new(swarm: Arc<dyn Swarm>, gate: Arc<ReadinessGate>, main_file: Option<String>) -> Self {
        Self {
            swarm,
            gate,
            main_file,
        }
    }

    /// Waits for readiness, then finds the file named `path`.
    ///
    /// A failed gate yields `NotReady` rather than `NotFound` so callers and
    /// logs can tell an unavailable swarm from a missing file. The adapter maps
    /// both to `CantOpen` on open and to `exists = false` on access checks.
    ///
    /// # Errors
    /// - `VfsError::NotReady` - Readiness gate failed or was torn down
    /// - `VfsError::NotFound` - No file matches
    pub async fn resolve(&self, path: Option<&str>) -> VfsResult<Arc<dyn SwarmFile>> {
        self.gate.await_ready().await?;

        let files = self.swarm.files();
        let found = match path.or(self.main_file.as_deref()) {
            Some(name) => files.into_iter().find(|file| file.path() == name),
            None if files.len() == 1 => files.into_iter().next(),
            None => None,
        };

        match found {
            Some(file) => {
                debug!(path = file.path(), length = file.length(), "Resolved swarm file");
                Ok(file)
            }
            None => Err(VfsError::NotFound {
                path: path.unwrap_or("<main>").to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_mocks::{MockFile, MockSwarm};
    use crate::vfs::GateError;

    fn resolver_for(swarm: Arc<MockSwarm>, main_file: Option<&str>) -> PathResolver {
        let gate = Arc::new(ReadinessGate::engage(&*swarm, Duration::from_millis(50)));
        PathResolver::new(swarm, gate, main_file.map(str::to_string))
    }

    #[tokio::test]
    async fn test_exact_match_first_wins() {
        let swarm = MockSwarm::builder()
            .ready()
            .file(MockFile::new("data/main.db", vec![1u8; 10]))
            .file(MockFile::new("data/main.db", vec![2u8; 20]))
            .build();
        let resolver = resolver_for(swarm, None);

        let file = resolver.resolve(Some("data/main.db")).await.unwrap();
        assert_eq!(file.length(), 10);
    }

    #[tokio::test]
    async fn test_match_is_case_sensitive_without_normalization() {
        let swarm = MockSwarm::builder()
            .ready()
            .file(MockFile::new("data/main.db", vec![0u8; 10]))
            .build();
        let resolver = resolver_for(swarm, None);

        for name in ["Data/main.db", "data/main.db/", "data//main.db", "/data/main.db"] {
            assert!(matches!(
                resolver.resolve(Some(name)).await,
                Err(VfsError::NotFound { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_unnamed_open_uses_single_file() {
        let swarm = MockSwarm::builder()
            .ready()
            .file(MockFile::new("only.db", vec![0u8; 10]))
            .build();
        let resolver = resolver_for(swarm, None);

        assert_eq!(resolver.resolve(None).await.unwrap().path(), "only.db");
    }

    #[tokio::test]
    async fn test_unnamed_open_in_multi_file_torrent() {
        let swarm = MockSwarm::builder()
            .ready()
            .file(MockFile::new("a.db", vec![0u8; 10]))
            .file(MockFile::new("b.db", vec![0u8; 10]))
            .build();

        let without_main = resolver_for(Arc::clone(&swarm), None);
        assert!(matches!(
            without_main.resolve(None).await,
            Err(VfsError::NotFound { .. })
        ));

        let with_main = resolver_for(swarm, Some("b.db"));
        assert_eq!(with_main.resolve(None).await.unwrap().path(), "b.db");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_gate_reports_not_ready() {
        let swarm = MockSwarm::builder()
            .file(MockFile::new("main.db", vec![0u8; 10]))
            .build();
        let resolver = resolver_for(swarm, None);

        let result = resolver.resolve(Some("main.db")).await;
        assert!(matches!(
            result,
            Err(VfsError::NotReady {
                source: GateError::TimedOut { timeout_ms: 50 }
            })
        ));
    }
}
