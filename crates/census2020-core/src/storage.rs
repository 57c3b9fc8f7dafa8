//! Filesystem primitives used by the table store and the reader.
//!
//! Everything here works relative to a [`StorageLocation`] root:
//!
//! - [`write_atomic`] writes through a temporary sibling file and renames it
//!   into place, so readers never observe a half-written table;
//! - [`read_all_bytes`] reads a whole file, mapping a missing file to
//!   [`StorageError::NotFound`];
//! - [`list_files`] enumerates the files with a given extension directly
//!   under the root, in file-name order;
//! - [`output::open_output_sink`] streams bytes into a file with the same
//!   commit-on-finish semantics as [`write_atomic`].
//!
//! Only the local filesystem is supported.

mod error;
pub mod output;

use std::{
    io,
    path::{Path, PathBuf},
};

use snafu::prelude::*;
use tokio::{fs, io::AsyncWriteExt};

pub use error::{BackendError, StorageError};
pub(crate) use error::{NotFoundSnafu, OtherIoSnafu};

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Directory that relative storage paths resolve against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageLocation {
    root: PathBuf,
}

impl StorageLocation {
    /// Location rooted at `root`.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `rel` resolved against the root.
    pub(crate) fn join(&self, rel: &Path) -> PathBuf {
        self.root.join(rel)
    }
}

pub(crate) async fn create_parent_dir(abs: &Path) -> StorageResult<()> {
    if let Some(parent) = abs.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: parent.display().to_string(),
            })?;
    }
    Ok(())
}

/// Temporary path next to `abs`, e.g. `wy.parquet` -> `wy.parquet.tmp`.
pub(crate) fn temp_sibling(abs: &Path) -> PathBuf {
    let mut name = abs.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    abs.with_file_name(name)
}

/// Removes a temporary file on drop unless disarmed.
pub(crate) struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Keep the file; call after a successful rename.
    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best effort; the caller is already returning another error.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Write `contents` to `rel_path` inside `location` atomically.
///
/// The payload is written to a temporary sibling, synced, and renamed over
/// the target. Parent directories are created as needed. On failure the
/// temporary file is removed and any previous file at `rel_path` is left
/// untouched.
pub async fn write_atomic(
    location: &StorageLocation,
    rel_path: &Path,
    contents: &[u8],
) -> StorageResult<()> {
    let abs = location.join(rel_path);
    create_parent_dir(&abs).await?;

    let tmp_path = temp_sibling(&abs);
    let mut guard = TempFileGuard::new(tmp_path.clone());

    {
        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: tmp_path.display().to_string(),
            })?;

        file.write_all(contents)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: tmp_path.display().to_string(),
            })?;

        file.sync_all()
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: tmp_path.display().to_string(),
            })?;
    }

    fs::rename(&tmp_path, &abs)
        .await
        .map_err(BackendError::Local)
        .context(OtherIoSnafu {
            path: abs.display().to_string(),
        })?;

    guard.disarm();
    Ok(())
}

/// Read the full contents of the file at `rel_path` within `location`.
///
/// A missing file is [`StorageError::NotFound`]; any other failure is
/// [`StorageError::OtherIo`].
pub async fn read_all_bytes(location: &StorageLocation, rel_path: &Path) -> StorageResult<Vec<u8>> {
    let abs = location.join(rel_path);
    let path_str = abs.display().to_string();

    match fs::read(&abs).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(BackendError::Local(e)).context(NotFoundSnafu { path: path_str })
        }
        Err(e) => Err(BackendError::Local(e)).context(OtherIoSnafu { path: path_str }),
    }
}

/// List regular files directly under `location` whose extension is
/// `extension`, as relative paths sorted by file name.
///
/// A missing root is [`StorageError::NotFound`].
pub async fn list_files(location: &StorageLocation, extension: &str) -> StorageResult<Vec<PathBuf>> {
    let root = location.root();
    let path_str = root.display().to_string();
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(BackendError::Local(e)).context(NotFoundSnafu { path: path_str });
        }
        Err(e) => {
            return Err(BackendError::Local(e)).context(OtherIoSnafu { path: path_str });
        }
    };

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(BackendError::Local)
        .context(OtherIoSnafu {
            path: path_str.clone(),
        })?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: entry.path().display().to_string(),
            })?;
        let rel = PathBuf::from(entry.file_name());
        if file_type.is_file() && rel.extension().is_some_and(|ext| ext == extension) {
            files.push(rel);
        }
    }

    files.sort();
    Ok(files)
}
