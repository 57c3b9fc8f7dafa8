//! Core library for the 2020 Census P.L. 94-171 redistricting extract.
//!
//! Each jurisdiction is published as a zip archive holding four pipe-delimited
//! fragments that share a logical record number (`LOGRECNO`). This crate
//! turns those archives into one wide Arrow table per jurisdiction, persists
//! the tables as Parquet, and reads them back with filters:
//!
//! - Static registries for fragment layouts (`schema`), jurisdictions
//!   (`jurisdiction`) and geographic summary levels (`summary_level`).
//! - A byte-level fragment parser (`parse`) and archive unpacker (`archive`).
//! - A combiner that aligns the four fragments on `LOGRECNO` after checking
//!   that their key sets agree (`combine`).
//! - Retrieval with retries over HTTP or a local directory (`fetch`) and the
//!   ingestion pipeline built on it, including bounded bulk runs (`ingest`).
//! - Atomic local storage and the Parquet table store (`storage`, `store`).
//! - A filtered, projected reader over a directory of tables (`reader`).
//!
//! The `census2020` command-line tool in the sibling crate is a thin layer
//! over these modules.
#![deny(missing_docs)]
pub mod archive;
pub mod combine;
pub mod fetch;
pub mod ingest;
pub mod jurisdiction;
pub mod parse;
pub mod reader;
pub mod schema;
pub mod storage;
pub mod store;
pub mod summary_level;

#[cfg(test)]
pub(crate) mod test_util;

pub use ingest::{
    IngestError, IngestOptions, JurisdictionOutcome, ingest_archive_bytes, ingest_jurisdiction,
    ingest_many,
};
pub use jurisdiction::Jurisdiction;
pub use reader::{QueryError, QueryRequest, read_filtered};
pub use store::{DatasetLocation, write_jurisdiction_table};
pub use summary_level::SummaryLevel;
