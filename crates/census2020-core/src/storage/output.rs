//! Streaming output sinks for writers that need `std::io::Write`.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use snafu::{IntoError, ResultExt};
use tokio::fs;

use crate::storage::{
    BackendError, OtherIoSnafu, StorageLocation, StorageResult, TempFileGuard, create_parent_dir,
    temp_sibling,
};

/// A byte sink committed explicitly with [`OutputSink::finish`].
///
/// Bytes go to a temporary sibling that is renamed over the target on
/// finish. Dropping a sink without finishing discards everything written
/// to it.
pub struct OutputSink {
    tmp_path: PathBuf,
    final_path: PathBuf,
    writer: io::BufWriter<std::fs::File>,
    guard: TempFileGuard,
}

impl OutputSink {
    async fn open(location: &StorageLocation, rel_path: &Path) -> StorageResult<Self> {
        let final_path = location.join(rel_path);
        create_parent_dir(&final_path).await?;

        let tmp_path = temp_sibling(&final_path);

        // Arrow and Parquet writers want std::io::Write.
        let file = std::fs::File::create(&tmp_path)
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: tmp_path.display().to_string(),
            })?;

        let guard = TempFileGuard::new(tmp_path.clone());
        Ok(Self {
            tmp_path,
            final_path,
            writer: io::BufWriter::new(file),
            guard,
        })
    }

    /// Mutable `Write` handle for streaming bytes.
    pub fn writer(&mut self) -> &mut dyn Write {
        &mut self.writer
    }

    /// Flush, fsync, and commit to the final location.
    pub async fn finish(mut self) -> StorageResult<()> {
        self.writer
            .flush()
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: self.tmp_path.display().to_string(),
            })?;

        self.writer
            .get_ref()
            .sync_all()
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: self.tmp_path.display().to_string(),
            })?;

        fs::rename(&self.tmp_path, &self.final_path)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: self.final_path.display().to_string(),
            })?;

        self.guard.disarm();
        Ok(())
    }
}

/// Open a sink at `location` + `rel_path`.
pub async fn open_output_sink(
    location: &StorageLocation,
    rel_path: &Path,
) -> StorageResult<OutputSink> {
    OutputSink::open(location, rel_path).await
}

/// Output target split into a directory root and a file name under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation {
    /// Directory root the file is written under.
    pub storage: StorageLocation,
    /// File path relative to `storage`.
    pub rel_path: PathBuf,
}

impl OutputLocation {
    /// Split a user-supplied file path into a parent directory root and a
    /// file name.
    pub fn from_path(path: impl AsRef<Path>) -> StorageResult<OutputLocation> {
        let path = path.as_ref();
        let Some(file_name) = path.file_name() else {
            return Err(OtherIoSnafu {
                path: path.display().to_string(),
            }
            .into_error(BackendError::Local(io::Error::new(
                io::ErrorKind::InvalidInput,
                "output path has no file name",
            ))));
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(OutputLocation {
            storage: StorageLocation::local(parent),
            rel_path: PathBuf::from(file_name),
        })
    }

    /// Open a sink for this location.
    pub async fn open(&self) -> StorageResult<OutputSink> {
        open_output_sink(&self.storage, &self.rel_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[tokio::test]
    async fn sink_commits_on_finish() -> TestResult {
        let tmp = TempDir::new()?;
        let target = OutputLocation::from_path(tmp.path().join("out/rows.csv"))?;

        let mut sink = target.open().await?;
        sink.writer().write_all(b"GEOID\n")?;
        assert!(!tmp.path().join("out/rows.csv").exists());
        sink.finish().await?;

        let written = tokio::fs::read(tmp.path().join("out/rows.csv")).await?;
        assert_eq!(written, b"GEOID\n");
        assert!(!tmp.path().join("out/rows.csv.tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn dropped_sink_leaves_nothing_behind() -> TestResult {
        let tmp = TempDir::new()?;
        let location = StorageLocation::local(tmp.path());

        {
            let mut sink = open_output_sink(&location, Path::new("rows.jsonl")).await?;
            sink.writer().write_all(b"{}\n")?;
        }

        assert!(!tmp.path().join("rows.jsonl").exists());
        assert!(!tmp.path().join("rows.jsonl.tmp").exists());
        Ok(())
    }

    #[test]
    fn bare_file_name_resolves_against_current_dir() -> TestResult {
        let target = OutputLocation::from_path("rows.csv")?;
        assert_eq!(target.storage, StorageLocation::local("."));
        assert_eq!(target.rel_path, PathBuf::from("rows.csv"));
        Ok(())
    }
}
