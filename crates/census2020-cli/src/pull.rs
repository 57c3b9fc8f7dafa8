use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use arrow::array::{AsArray, RecordBatch};
use census2020_core::{
    DatasetLocation, IngestOptions, Jurisdiction, JurisdictionOutcome,
    fetch::{ArchiveSource, DEFAULT_BASE_URL, DirArchiveSource, HttpArchiveSource, RetryPolicy},
    ingest::{ingest_resolved, resolve_jurisdiction, resolve_jurisdictions},
    ingest_archive_bytes, ingest_many,
    schema::STUSAB_COLUMN,
    store::{table_rel_path, write_table_file},
    write_jurisdiction_table,
};
use clap::Args;
use futures::StreamExt;
use snafu::{OptionExt, ResultExt, ensure};
use tracing::info;

use crate::error::{
    ArchiveSourceSnafu, CliError, CliResult, IngestSnafu, InterruptedSnafu, PullFailedSnafu,
    ReadArchiveSnafu, ResolveSnafu, StoreSnafu, UnknownArchiveJurisdictionSnafu,
};

/// Where archives come from and how hard to try.
#[derive(Debug, Clone, Args)]
pub struct FetchArgs {
    /// Base URL of the published redistricting files
    #[arg(long, env = "CENSUS2020_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Read `<abbr>2020.pl.zip` archives from this directory instead of downloading
    #[arg(long, env = "CENSUS2020_ARCHIVE_DIR")]
    pub archive_dir: Option<PathBuf>,

    /// Attempts per jurisdiction before giving up
    #[arg(long, env = "CENSUS2020_MAX_ATTEMPTS", default_value_t = RetryPolicy::DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Seconds to wait between attempts
    #[arg(long, env = "CENSUS2020_RETRY_DELAY_SECS", default_value_t = RetryPolicy::DEFAULT_DELAY.as_secs())]
    pub retry_delay_secs: u64,

    /// Seconds one attempt may take, download included, before it is abandoned
    #[arg(long, env = "CENSUS2020_ATTEMPT_TIMEOUT_SECS", default_value_t = RetryPolicy::DEFAULT_ATTEMPT_TIMEOUT.as_secs())]
    pub attempt_timeout_secs: u64,

    /// Jurisdictions processed at once by pull-all
    #[arg(long, env = "CENSUS2020_CONCURRENCY", default_value_t = IngestOptions::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

impl FetchArgs {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_secs(self.retry_delay_secs),
        )
        .with_attempt_timeout(Duration::from_secs(self.attempt_timeout_secs))
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            retry: self.retry_policy(),
            concurrency: self.concurrency,
        }
    }

    pub fn archive_source(&self) -> CliResult<Box<dyn ArchiveSource>> {
        match &self.archive_dir {
            Some(dir) => Ok(Box::new(DirArchiveSource::new(dir))),
            None => {
                let source =
                    HttpArchiveSource::new(self.base_url.as_str()).context(ArchiveSourceSnafu)?;
                Ok(Box::new(source))
            }
        }
    }
}

/// An existing directory receives `<dir>/<abbr>.parquet`; anything else is
/// taken as the file path.
fn table_path(output: &Path, jurisdiction: &Jurisdiction) -> PathBuf {
    if output.is_dir() {
        output.join(table_rel_path(jurisdiction))
    } else {
        output.to_path_buf()
    }
}

async fn persist(output: &Path, jurisdiction: &Jurisdiction, table: &RecordBatch) -> CliResult<()> {
    let path = table_path(output, jurisdiction);
    write_table_file(&path, jurisdiction, table)
        .await
        .context(StoreSnafu)?;
    println!(
        "{jurisdiction}: {} rows -> {}",
        table.num_rows(),
        path.display()
    );
    Ok(())
}

pub async fn cmd_pull(state: &str, output: &Path, fetch: &FetchArgs) -> CliResult<()> {
    let jurisdiction = resolve_jurisdiction(state).context(ResolveSnafu)?;
    let source = fetch.archive_source()?;

    let table = ingest_resolved(source.as_ref(), jurisdiction, fetch.retry_policy())
        .await
        .context(IngestSnafu {
            jurisdiction: jurisdiction.abbr,
        })?;

    persist(output, jurisdiction, &table).await
}

async fn persist_outcome(
    location: &DatasetLocation,
    outcome: JurisdictionOutcome,
) -> CliResult<()> {
    let jurisdiction = outcome.jurisdiction;
    let table = outcome.result.context(IngestSnafu {
        jurisdiction: jurisdiction.abbr,
    })?;
    let rel_path = write_jurisdiction_table(location, jurisdiction, &table)
        .await
        .context(StoreSnafu)?;
    println!(
        "{jurisdiction}: {} rows -> {}",
        table.num_rows(),
        location.storage().root().join(rel_path).display()
    );
    Ok(())
}

pub async fn cmd_pull_all(states: &[String], output: &Path, fetch: &FetchArgs) -> CliResult<()> {
    let jurisdictions: Vec<&'static Jurisdiction> = if states.is_empty() {
        Jurisdiction::states_and_district().collect()
    } else {
        resolve_jurisdictions(states).context(ResolveSnafu)?
    };
    let total = jurisdictions.len();
    let source = fetch.archive_source()?;
    let location = DatasetLocation::local(output);

    info!(total, concurrency = fetch.concurrency, "starting bulk pull");

    let mut outcomes = ingest_many(source.as_ref(), jurisdictions, fetch.ingest_options());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut completed: usize = 0;
    let mut failed: Vec<String> = Vec::new();
    loop {
        tokio::select! {
            next = outcomes.next() => {
                let Some(outcome) = next else { break };
                completed += 1;
                let abbr = outcome.jurisdiction.abbr;
                if let Err(e) = persist_outcome(&location, outcome).await {
                    eprintln!("{e}");
                    failed.push(abbr.to_string());
                }
            }
            _ = &mut ctrl_c => {
                return InterruptedSnafu { completed, total }.fail();
            }
        }
    }

    failed.sort();
    ensure!(
        failed.is_empty(),
        PullFailedSnafu {
            failed: failed.len(),
            total,
            names: failed,
        }
    );
    Ok(())
}

fn jurisdiction_of(table: &RecordBatch) -> Option<&'static Jurisdiction> {
    let stusab = table.column_by_name(STUSAB_COLUMN)?.as_string_opt::<i32>()?;
    stusab.iter().flatten().next().and_then(Jurisdiction::lookup)
}

pub async fn cmd_ingest_archive(
    zip: &Path,
    output: &Path,
    state: Option<&str>,
) -> CliResult<()> {
    let named = state
        .map(resolve_jurisdiction)
        .transpose()
        .context(ResolveSnafu)?;

    let bytes = tokio::fs::read(zip)
        .await
        .context(ReadArchiveSnafu { path: zip })?;

    let table = ingest_archive_bytes(&bytes).map_err(|e| CliError::Ingest {
        jurisdiction: named.map_or_else(|| zip.display().to_string(), |j| j.abbr.to_string()),
        source: Box::new(e),
    })?;

    let jurisdiction = match named {
        Some(j) => j,
        None => jurisdiction_of(&table).context(UnknownArchiveJurisdictionSnafu { path: zip })?,
    };

    persist(output, jurisdiction, &table).await
}
