use std::path::PathBuf;

use arrow::error::ArrowError;
use census2020_core::{
    IngestError, QueryError, fetch::FetchError, storage::StorageError, store::StoreError,
};
use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("{source}"))]
    Resolve {
        #[snafu(source(from(IngestError, Box::new)))]
        source: Box<IngestError>,
    },

    #[snafu(display("Failed to ingest {jurisdiction}: {source}"))]
    Ingest {
        jurisdiction: String,
        #[snafu(source(from(IngestError, Box::new)))]
        source: Box<IngestError>,
    },

    #[snafu(display("Could not set up archive download: {source}"))]
    ArchiveSource { source: FetchError },

    #[snafu(display("Archive not found or not readable: {}", path.display()))]
    ReadArchive {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display(
        "Cannot tell which jurisdiction {} belongs to. Pass --state.",
        path.display()
    ))]
    UnknownArchiveJurisdiction { path: PathBuf },

    #[snafu(display("Failed to write table: {source}"))]
    Store {
        #[snafu(source(from(StoreError, Box::new)))]
        source: Box<StoreError>,
    },

    #[snafu(display("Query against {dataset} failed: {source}"))]
    Query {
        dataset: String,
        #[snafu(source(from(QueryError, Box::new)))]
        source: Box<QueryError>,
    },

    #[snafu(display("Storage error: {source}"))]
    Storage {
        #[snafu(source(from(StorageError, Box::new)))]
        source: Box<StorageError>,
    },

    #[snafu(display("Arrow error: {source}"))]
    Arrow { source: ArrowError },

    #[snafu(display("Failed to write output: {source}"))]
    WriteOutput { source: std::io::Error },

    #[snafu(display("{failed} of {total} jurisdiction(s) failed: {}", names.join(", ")))]
    PullFailed {
        failed: usize,
        total: usize,
        names: Vec<String>,
    },

    #[snafu(display("Interrupted after {completed} of {total} jurisdiction(s)"))]
    Interrupted { completed: usize, total: usize },
}
