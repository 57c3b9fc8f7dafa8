//! Archive retrieval.
//!
//! An [`ArchiveSource`] turns a [`Jurisdiction`] into the raw bytes of its
//! `<abbr>2020.pl.zip` archive. Two sources ship with the crate:
//!
//! - [`HttpArchiveSource`] downloads from the Census Bureau publication tree
//!   (or any mirror with the same layout);
//! - [`DirArchiveSource`] reads archives that were already downloaded into a
//!   local directory.
//!
//! [`fetch_with_retry`] wraps a source with a fixed-delay [`RetryPolicy`].
//! Each attempt is bounded by the policy's attempt timeout, so a server that
//! stalls mid-body costs one attempt rather than the whole pull. Retries are
//! local to one jurisdiction; nothing here is shared between concurrent
//! fetches.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use snafu::prelude::*;
use tracing::{debug, warn};

use crate::jurisdiction::Jurisdiction;

/// Publication root of the 2020 redistricting extract.
pub const DEFAULT_BASE_URL: &str = "https://www2.census.gov/programs-surveys/decennial/2020/data/01-Redistricting_File--PL_94-171/";

/// File name of a jurisdiction's archive, e.g. `wy2020.pl.zip`.
pub fn archive_file_name(jurisdiction: &Jurisdiction) -> String {
    format!("{}2020.pl.zip", jurisdiction.file_stem())
}

/// Why a single retrieval attempt failed.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AttemptError {
    /// The HTTP request could not be sent or its body could not be read.
    #[snafu(display("Request to {url} failed: {source}"))]
    Request {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[snafu(display("GET {url} returned HTTP {status}"))]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// The attempt did not finish within the policy's attempt timeout.
    #[snafu(display("Retrieval of {jurisdiction} timed out after {}s", after.as_secs_f64()))]
    TimedOut {
        /// Postal code of the jurisdiction.
        jurisdiction: String,
        /// Configured attempt timeout.
        after: Duration,
    },

    /// A local archive could not be read.
    #[snafu(display("Failed to read archive {}: {source}", path.display()))]
    ReadArchive {
        /// Archive path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors surfaced by retrieval.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FetchError {
    /// Every attempt failed.
    #[snafu(display("Retrieval of {jurisdiction} failed after {attempts} attempt(s): {source}"))]
    RetrievalExhausted {
        /// Postal code of the jurisdiction.
        jurisdiction: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error of the last attempt.
        source: AttemptError,
    },

    /// The HTTP client could not be constructed.
    #[snafu(display("Failed to build HTTP client: {source}"))]
    HttpClient {
        /// Underlying client error.
        source: reqwest::Error,
    },
}

/// Something that can produce a jurisdiction's archive bytes.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Make one attempt at retrieving the archive.
    async fn fetch(&self, jurisdiction: &Jurisdiction) -> Result<Vec<u8>, AttemptError>;
}

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least 1.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
    /// Upper bound on a single attempt, body included.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Default number of attempts.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    /// Default pause between attempts.
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);
    /// Default bound on one attempt. The largest archives are a few hundred
    /// megabytes.
    pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(600);

    /// Build a policy with the default attempt timeout.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            attempt_timeout: Self::DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    /// Replace the attempt timeout.
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

async fn attempt_fetch(
    source: &dyn ArchiveSource,
    jurisdiction: &Jurisdiction,
    timeout: Duration,
) -> Result<Vec<u8>, AttemptError> {
    match tokio::time::timeout(timeout, source.fetch(jurisdiction)).await {
        Ok(result) => result,
        Err(_elapsed) => TimedOutSnafu {
            jurisdiction: jurisdiction.abbr,
            after: timeout,
        }
        .fail(),
    }
}

/// Fetch with retries, sleeping `policy.delay` between failed attempts.
///
/// An attempt that runs past `policy.attempt_timeout` is abandoned and
/// counts as a failure.
pub async fn fetch_with_retry(
    source: &dyn ArchiveSource,
    jurisdiction: &Jurisdiction,
    policy: RetryPolicy,
) -> Result<Vec<u8>, FetchError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match attempt_fetch(source, jurisdiction, policy.attempt_timeout).await {
            Ok(bytes) => {
                debug!(%jurisdiction, attempt, bytes = bytes.len(), "archive retrieved");
                return Ok(bytes);
            }
            Err(err) if attempt < max_attempts => {
                warn!(%jurisdiction, attempt, max_attempts, error = %err, "retrieval attempt failed, retrying");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(err).context(RetrievalExhaustedSnafu {
                    jurisdiction: jurisdiction.abbr,
                    attempts: attempt,
                });
            }
        }
    }
}

/// Downloads archives over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpArchiveSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpArchiveSource {
    /// Create a source rooted at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("census2020/", env!("CARGO_PKG_VERSION")))
            .build()
            .context(HttpClientSnafu)?;

        Ok(Self::with_client(client, base_url))
    }

    /// Create a source that sends requests through `client`.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Create a source rooted at [`DEFAULT_BASE_URL`].
    pub fn census_bureau() -> Result<Self, FetchError> {
        Self::new(DEFAULT_BASE_URL)
    }

    /// URL of a jurisdiction's archive.
    pub fn archive_url(&self, jurisdiction: &Jurisdiction) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            jurisdiction.publication_dir(),
            archive_file_name(jurisdiction)
        )
    }
}

#[async_trait]
impl ArchiveSource for HttpArchiveSource {
    async fn fetch(&self, jurisdiction: &Jurisdiction) -> Result<Vec<u8>, AttemptError> {
        let url = self.archive_url(jurisdiction);
        debug!(%url, "downloading archive");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context(RequestSnafu { url: url.clone() })?;

        let status = response.status();
        ensure!(
            status.is_success(),
            StatusSnafu {
                url,
                status: status.as_u16(),
            }
        );

        let body = response.bytes().await.context(RequestSnafu { url })?;
        Ok(body.to_vec())
    }
}

/// Reads archives from a local directory laid out as `<dir>/<abbr>2020.pl.zip`.
#[derive(Debug, Clone)]
pub struct DirArchiveSource {
    dir: PathBuf,
}

impl DirArchiveSource {
    /// Create a source reading from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory archives are read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArchiveSource for DirArchiveSource {
    async fn fetch(&self, jurisdiction: &Jurisdiction) -> Result<Vec<u8>, AttemptError> {
        let path = self.dir.join(archive_file_name(jurisdiction));
        tokio::fs::read(&path)
            .await
            .context(ReadArchiveSnafu { path })
    }
}
