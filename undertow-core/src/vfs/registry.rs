//! Open-file registry keyed by caller-assigned file identifiers
//!
//! Owns the only mutable shared state of the adapter. Insertions and removals
//! are atomic per identifier; operations on different identifiers never
//! interfere.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::resolver::PathResolver;
use super::types::{AccessMode, FileId};
use super::{VfsError, VfsResult};
use crate::swarm::SwarmFile;

/// Download selection behavior for opened files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// Select every opened file for download immediately
    pub prefetch: bool,
    /// Whether the adapter created the swarm session and may deselect
    pub owns_session: bool,
}

/// A file opened by the storage engine.
pub struct OpenFile {
    pub file_id: FileId,
    pub file: Arc<dyn SwarmFile>,
    /// Length captured at resolution time, after readiness
    pub length: u64,
    /// Whether closing this entry must deselect the file
    pub selected: bool,
}

impl std::fmt::Debug for OpenFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenFile")
            .field("file_id", &self.file_id)
            .field("path", &self.file.path())
            .field("length", &self.length)
            .field("selected", &self.selected)
            .finish()
    }
}

/// Maps file identifiers to resolved swarm files.
///
/// Reusing a live identifier is rejected with `FileIdInUse`; the existing
/// entry stays untouched.
pub struct OpenFileRegistry {
    resolver: PathResolver,
    policy: SelectionPolicy,
    entries: Mutex<HashMap<FileId, Arc<OpenFile>>>,
}

impl OpenFileRegistry {
    /// Creates an empty registry resolving names through `resolver`.
    pub fn new(resolver: PathResolver, policy: SelectionPolicy) -> Self {
        Self {
            resolver,
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves `path` and registers it under `file_id`.
    ///
    /// With prefetch enabled the file is selected for download once the entry
    /// is in place. The entry is marked selected only when the adapter owns
    /// the session.
    ///
    /// # Errors
    /// - `VfsError::FileIdInUse` - Identifier already open
    /// - `VfsError::NotReady` - Swarm metadata unavailable
    /// - `VfsError::NotFound` - No file matches `path`
    pub async fn open(&self, file_id: FileId, path: Option<&str>) -> VfsResult<Arc<OpenFile>> {
        if self.entries.lock().contains_key(&file_id) {
            return Err(VfsError::FileIdInUse { file_id });
        }

        let file = self.resolver.resolve(path).await?;
        let entry = Arc::new(OpenFile {
            file_id,
            length: file.length(),
            selected: self.policy.prefetch && self.policy.owns_session,
            file,
        });

        match self.entries.lock().entry(file_id) {
            Entry::Occupied(_) => return Err(VfsError::FileIdInUse { file_id }),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&entry));
            }
        }

        if self.policy.prefetch {
            entry.file.select();
        }

        info!(
            %file_id,
            path = entry.file.path(),
            length = entry.length,
            selected = entry.selected,
            "Opened swarm file"
        );
        Ok(entry)
    }

    /// Removes the entry for `file_id`, deselecting it if it was selected.
    ///
    /// Closing an unknown identifier is not an error. Returns whether an
    /// entry was removed.
    pub fn close(&self, file_id: FileId) -> bool {
        let removed = self.entries.lock().remove(&file_id);
        match removed {
            Some(entry) => {
                release(&entry);
                debug!(%file_id, path = entry.file.path(), "Closed swarm file");
                true
            }
            None => false,
        }
    }

    /// Looks up an open entry.
    ///
    /// # Errors
    /// - `VfsError::FileNotOpen` - No entry for `file_id`
    pub fn get(&self, file_id: FileId) -> VfsResult<Arc<OpenFile>> {
        self.entries
            .lock()
            .get(&file_id)
            .cloned()
            .ok_or(VfsError::FileNotOpen { file_id })
    }

    /// Total length of an open file.
    ///
    /// # Errors
    /// - `VfsError::FileNotOpen` - No entry for `file_id`
    pub fn size(&self, file_id: FileId) -> VfsResult<u64> {
        self.get(file_id).map(|entry| entry.length)
    }

    /// Whether `path` exists in the swarm and satisfies `mode`.
    ///
    /// Absence, unknown modes and an unavailable swarm all report `false`.
    pub async fn access_check(&self, path: Option<&str>, mode: AccessMode) -> bool {
        match self.resolver.resolve(path).await {
            Ok(_) => mode.satisfied_by_existing(),
            Err(e) => {
                debug!(path = path.unwrap_or("<main>"), error = %e, "Access check found nothing");
                false
            }
        }
    }

    /// Closes every entry. Returns how many were open.
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = self.entries.lock().drain().map(|(_, entry)| entry).collect();
        for entry in &drained {
            release(entry);
        }
        drained.len()
    }

    /// Number of open entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no file is open.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

fn release(entry: &OpenFile) {
    if entry.selected {
        entry.file.deselect();
    }
}
