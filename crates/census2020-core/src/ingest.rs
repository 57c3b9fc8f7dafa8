//! Ingestion pipeline: archive bytes in, one combined jurisdiction table out.
//!
//! [`ingest_archive_bytes`] is the synchronous core (unpack, parse the four
//! fragments, combine). [`ingest_jurisdiction`] adds retrieval in front of
//! it, and [`ingest_many`] runs many jurisdictions through a bounded pool,
//! reporting each outcome independently.

use arrow::record_batch::RecordBatch;
use futures::{StreamExt, stream::BoxStream};
use snafu::prelude::*;
use tracing::{info, instrument, warn};

use crate::{
    archive::{ArchiveError, unpack_archive},
    combine::{CombineError, combine},
    fetch::{ArchiveSource, FetchError, RetryPolicy, fetch_with_retry},
    jurisdiction::Jurisdiction,
    parse::{ParseError, parse_fragment},
    schema::FragmentKind,
};

/// Errors that abort ingestion of one jurisdiction.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum IngestError {
    /// The code does not name a known jurisdiction.
    #[snafu(display("Unknown jurisdiction: {code}"))]
    UnknownJurisdiction {
        /// Code as given by the caller.
        code: String,
    },

    /// The archive could not be retrieved.
    #[snafu(transparent)]
    Fetch {
        /// Underlying retrieval error.
        source: FetchError,
    },

    /// The archive could not be unpacked.
    #[snafu(transparent)]
    Archive {
        /// Underlying archive error.
        source: ArchiveError,
    },

    /// A fragment failed to parse.
    #[snafu(transparent)]
    Parse {
        /// Underlying parse error.
        source: ParseError,
    },

    /// The fragments could not be combined.
    #[snafu(transparent)]
    Combine {
        /// Underlying combine error.
        source: CombineError,
    },

    /// The blocking parse task panicked or was cancelled.
    #[snafu(display("Ingestion task for {jurisdiction} did not complete: {source}"))]
    TaskFailed {
        /// Jurisdiction being ingested.
        jurisdiction: String,
        /// Join error from the blocking pool.
        source: tokio::task::JoinError,
    },
}

/// Result alias for ingestion.
pub type IngestResult<T> = Result<T, IngestError>;

/// Knobs for retrieval and bulk ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Per-jurisdiction retry policy.
    pub retry: RetryPolicy,
    /// Maximum number of jurisdictions in flight. Treated as at least 1.
    pub concurrency: usize,
}

impl IngestOptions {
    /// Default number of jurisdictions processed at once.
    pub const DEFAULT_CONCURRENCY: usize = 4;
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            concurrency: Self::DEFAULT_CONCURRENCY,
        }
    }
}

/// Unpack, parse and combine one jurisdiction's archive.
///
/// CPU-bound; async callers should run it on the blocking pool.
pub fn ingest_archive_bytes(bytes: &[u8]) -> IngestResult<RecordBatch> {
    let files = unpack_archive(bytes)?;

    let geo = parse_fragment(FragmentKind::Geo, &files.geo)?;
    let part1 = parse_fragment(FragmentKind::Part1, &files.part1)?;
    let part2 = parse_fragment(FragmentKind::Part2, &files.part2)?;
    let part3 = parse_fragment(FragmentKind::Part3, &files.part3)?;

    Ok(combine(&geo, &part1, &part2, &part3)?)
}

/// Resolve a single postal code, name or numeric code.
pub fn resolve_jurisdiction(code: &str) -> IngestResult<&'static Jurisdiction> {
    Jurisdiction::lookup(code).context(UnknownJurisdictionSnafu { code })
}

/// Resolve a list of codes, failing on the first unknown one.
///
/// Duplicates (including different spellings of the same jurisdiction) are
/// dropped, keeping first-occurrence order.
pub fn resolve_jurisdictions<I, S>(codes: I) -> IngestResult<Vec<&'static Jurisdiction>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut resolved: Vec<&'static Jurisdiction> = Vec::new();
    for code in codes {
        let jurisdiction = resolve_jurisdiction(code.as_ref())?;
        if !resolved.iter().any(|j| j.abbr == jurisdiction.abbr) {
            resolved.push(jurisdiction);
        }
    }
    Ok(resolved)
}

/// Retrieve and ingest an already resolved jurisdiction.
#[instrument(skip(source, retry), fields(jurisdiction = %jurisdiction))]
pub async fn ingest_resolved(
    source: &dyn ArchiveSource,
    jurisdiction: &'static Jurisdiction,
    retry: RetryPolicy,
) -> IngestResult<RecordBatch> {
    let bytes = fetch_with_retry(source, jurisdiction, retry).await?;

    let table = tokio::task::spawn_blocking(move || ingest_archive_bytes(&bytes))
        .await
        .context(TaskFailedSnafu {
            jurisdiction: jurisdiction.abbr,
        })??;

    info!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        "ingested jurisdiction"
    );
    Ok(table)
}

/// Retrieve and ingest the jurisdiction named by `code`.
pub async fn ingest_jurisdiction(
    source: &dyn ArchiveSource,
    code: &str,
    retry: RetryPolicy,
) -> IngestResult<RecordBatch> {
    let jurisdiction = resolve_jurisdiction(code)?;
    ingest_resolved(source, jurisdiction, retry).await
}

/// Result of ingesting one jurisdiction in a bulk run.
#[derive(Debug)]
pub struct JurisdictionOutcome {
    /// Jurisdiction this outcome belongs to.
    pub jurisdiction: &'static Jurisdiction,
    /// The combined table, or why ingestion failed.
    pub result: IngestResult<RecordBatch>,
}

/// Ingest many jurisdictions, at most `options.concurrency` at a time.
///
/// Outcomes are yielded in completion order. A failure is reported in its
/// outcome and never stops the others. Dropping the stream stops scheduling
/// further jurisdictions.
pub fn ingest_many<'a, I>(
    source: &'a dyn ArchiveSource,
    jurisdictions: I,
    options: IngestOptions,
) -> BoxStream<'a, JurisdictionOutcome>
where
    I: IntoIterator<Item = &'static Jurisdiction>,
    I::IntoIter: Send + 'a,
{
    let retry = options.retry;
    futures::stream::iter(jurisdictions)
        .map(move |jurisdiction| async move {
            let result = ingest_resolved(source, jurisdiction, retry).await;
            if let Err(err) = &result {
                warn!(%jurisdiction, error = %err, "jurisdiction failed");
            }
            JurisdictionOutcome {
                jurisdiction,
                result,
            }
        })
        .buffer_unordered(options.concurrency.max(1))
        .boxed()
}
