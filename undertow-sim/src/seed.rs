//! Builds simulated torrents from directories on disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::swarm::SimulatedTorrent;

/// Errors from seeding a torrent out of a directory.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    /// Filesystem access failed
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        /// Path being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Nothing to seed
    #[error("No files found under {}", .path.display())]
    Empty {
        /// Path that was searched
        path: PathBuf,
    },
}

/// Creates a torrent containing every regular file under `root`.
///
/// Paths are relative to `root`, use `/` separators and are sorted, so the
/// same tree always yields the same info hash. A single file may also be
/// passed, in which case the torrent holds just its file name.
///
/// # Errors
/// - `SeedError::Io` - A directory or file could not be read
/// - `SeedError::Empty` - `root` contains no regular files
pub fn seed_directory(root: &Path) -> Result<SimulatedTorrent, SeedError> {
    let io_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| SeedError::Io { path, source }
    };

    let metadata = fs::metadata(root).map_err(io_error(root))?;
    let mut files = Vec::new();
    if metadata.is_file() {
        let name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data".to_string());
        files.push((name, root.to_path_buf()));
    } else {
        collect_files(root, root, &mut files)?;
    }

    if files.is_empty() {
        return Err(SeedError::Empty {
            path: root.to_path_buf(),
        });
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut torrent = SimulatedTorrent::new();
    for (name, path) in files {
        let data = fs::read(&path).map_err(io_error(&path))?;
        tracing::debug!(name = %name, bytes = data.len(), "Seeded file");
        torrent = torrent.file(name, data);
    }
    Ok(torrent)
}

fn collect_files(
    root: &Path,
    dir: &Path,
    files: &mut Vec<(String, PathBuf)>,
) -> Result<(), SeedError> {
    let entries = fs::read_dir(dir).map_err(|source| SeedError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| SeedError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, files)?;
        } else if path.is_file() {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            let name = relative
                .components()
                .map(|part| part.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push((name, path));
        }
    }
    Ok(())
}
