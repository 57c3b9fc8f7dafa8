//! Filtered, projected reads over a dataset of persisted jurisdiction tables.
//!
//! [`read_filtered`] resolves everything in the [`QueryRequest`] (jurisdiction
//! codes, summary levels, column list) before opening any file, so a bad
//! request never produces a partial result. Each selected table is then read
//! with:
//!
//! - a [`ProjectionMask`] limited to the requested columns, and
//! - a [`RowFilter`] on `SUMLEV` membership, evaluated with Arrow's scalar
//!   comparison kernels so no full-length comparison arrays are built.
//!
//! The Parquet reader yields projected columns in file order; batches are
//! re-projected into request order (with `GEOID` first when the request
//! omitted it) before all tables are concatenated in table order.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::{
    array::{Array, BooleanArray, RecordBatch, RecordBatchReader, StringArray},
    compute::{
        concat_batches,
        kernels::{boolean as boolean_kernels, cmp as cmp_kernels},
    },
    datatypes::{Schema, SchemaRef},
    error::ArrowError,
};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use parquet::{
    arrow::{
        ProjectionMask,
        arrow_reader::{ArrowPredicateFn, ParquetRecordBatchReaderBuilder, RowFilter},
    },
    errors::ParquetError,
};
use snafu::prelude::*;
use tracing::debug;

use crate::{
    jurisdiction::Jurisdiction,
    schema::{GEO_ID_COLUMN, SUMMARY_LEVEL_COLUMN},
    storage::{self, StorageError},
    store::{DatasetLocation, TABLE_EXTENSION, table_rel_path},
    summary_level::SummaryLevel,
};

/// Tables decoded at once.
const READ_CONCURRENCY: usize = 4;

/// Errors raised by [`read_filtered`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum QueryError {
    /// A requested jurisdiction code is not in the registry.
    #[snafu(display("Unknown jurisdiction: {code}"))]
    UnknownJurisdiction {
        /// Code as given by the caller.
        code: String,
    },

    /// A requested summary level is neither a known code nor a known name.
    #[snafu(display("Unknown summary level: {level}"))]
    UnknownSummaryLevel {
        /// Level as given by the caller.
        level: String,
    },

    /// A column the query needs is missing from a table.
    #[snafu(display("Column {column} not found in {}", path.display()))]
    UnknownColumn {
        /// Missing column.
        column: String,
        /// Table file lacking it.
        path: PathBuf,
    },

    /// Reading a table file or listing the dataset failed.
    #[snafu(display("Storage error: {source}"))]
    Storage {
        /// Underlying storage error.
        #[snafu(source(from(StorageError, Box::new)))]
        source: Box<StorageError>,
    },

    /// A table file is not readable Parquet.
    #[snafu(display("Failed to read Parquet table {}: {source}", path.display()))]
    ParquetRead {
        /// Table file.
        path: PathBuf,
        /// Underlying Parquet error.
        source: ParquetError,
    },

    /// Arrow failed while filtering or assembling the result.
    #[snafu(display("Arrow error while reading tables: {source}"))]
    Arrow {
        /// Underlying Arrow error.
        source: ArrowError,
    },
}

/// Result alias for queries.
pub type QueryResult<T> = Result<T, QueryError>;

/// What to read from a dataset.
///
/// Every list is optional; an empty list means "no restriction". A single
/// value is a one-element list.
///
/// ```
/// use census2020_core::reader::QueryRequest;
///
/// let request = QueryRequest::new()
///     .jurisdictions(["RI", "WY"])
///     .summary_levels(["state-county"])
///     .columns(["NAME", "P0010001"]);
/// assert_eq!(request.jurisdiction_codes(), ["RI", "WY"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    jurisdictions: Vec<String>,
    summary_levels: Vec<String>,
    columns: Vec<String>,
}

impl QueryRequest {
    /// A request for every row and column of every table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only read the tables of these jurisdictions, in this order.
    pub fn jurisdictions<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.jurisdictions = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Only return rows whose `SUMLEV` is one of these levels (codes or names).
    pub fn summary_levels<I, S>(mut self, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.summary_levels = levels.into_iter().map(Into::into).collect();
        self
    }

    /// Only return these columns, in this order. `GEOID` is always included.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Requested jurisdiction codes, as given.
    pub fn jurisdiction_codes(&self) -> &[String] {
        &self.jurisdictions
    }

    /// Requested summary levels, as given.
    pub fn summary_level_values(&self) -> &[String] {
        &self.summary_levels
    }

    /// Requested columns, as given.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }
}

/// A request with every name checked against the registries.
#[derive(Debug)]
struct ResolvedQuery {
    jurisdictions: Vec<&'static Jurisdiction>,
    levels: Vec<&'static str>,
    columns: Option<Vec<String>>,
}

fn resolve(request: &QueryRequest) -> QueryResult<ResolvedQuery> {
    let mut jurisdictions: Vec<&'static Jurisdiction> = Vec::new();
    for code in &request.jurisdictions {
        let j = Jurisdiction::lookup(code).context(UnknownJurisdictionSnafu { code })?;
        if !jurisdictions.iter().any(|seen| seen.abbr == j.abbr) {
            jurisdictions.push(j);
        }
    }

    let mut levels: Vec<&'static str> = Vec::new();
    for level in &request.summary_levels {
        let resolved = SummaryLevel::lookup(level).context(UnknownSummaryLevelSnafu { level })?;
        if !levels.contains(&resolved.code) {
            levels.push(resolved.code);
        }
    }

    let columns = if request.columns.is_empty() {
        None
    } else {
        let mut columns: Vec<String> = Vec::with_capacity(request.columns.len() + 1);
        if !request.columns.iter().any(|c| c == GEO_ID_COLUMN) {
            columns.push(GEO_ID_COLUMN.to_string());
        }
        for column in &request.columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        Some(columns)
    };

    Ok(ResolvedQuery {
        jurisdictions,
        levels,
        columns,
    })
}

/// Keep rows whose level column equals any of `levels`.
fn level_mask(column: &dyn Array, levels: &[&'static str]) -> Result<BooleanArray, ArrowError> {
    let mut mask: Option<BooleanArray> = None;
    for level in levels {
        let hit = cmp_kernels::eq(&column, &StringArray::new_scalar(*level))?;
        mask = Some(match mask {
            None => hit,
            Some(acc) => boolean_kernels::or(&acc, &hit)?,
        });
    }
    // Null SUMLEV compares to null, which the row filter treats as "drop".
    Ok(mask.unwrap_or_else(|| BooleanArray::from(vec![true; column.len()])))
}

async fn read_table(
    location: &DatasetLocation,
    rel_path: &Path,
    query: &ResolvedQuery,
) -> QueryResult<(SchemaRef, Vec<RecordBatch>)> {
    let path = location.storage().root().join(rel_path);

    let bytes = storage::read_all_bytes(location.storage(), rel_path)
        .await
        .context(StorageSnafu)?;

    let mut builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))
        .context(ParquetReadSnafu { path: path.clone() })?;

    let file_schema = builder.schema().clone();
    let index_of = |column: &str| {
        file_schema.index_of(column).map_err(|_| QueryError::UnknownColumn {
            column: column.to_string(),
            path: path.clone(),
        })
    };

    // Root indices in output order.
    let wanted: Vec<usize> = match &query.columns {
        Some(columns) => columns
            .iter()
            .map(|c| index_of(c))
            .collect::<QueryResult<_>>()?,
        None => (0..file_schema.fields().len()).collect(),
    };

    if !query.levels.is_empty() {
        let level_idx = index_of(SUMMARY_LEVEL_COLUMN)?;
        let levels = query.levels.clone();
        let predicate = ArrowPredicateFn::new(
            ProjectionMask::roots(builder.parquet_schema(), [level_idx]),
            move |batch: RecordBatch| level_mask(batch.column(0).as_ref(), &levels),
        );
        builder = builder.with_row_filter(RowFilter::new(vec![Box::new(predicate)]));
    }

    let mask = ProjectionMask::roots(builder.parquet_schema(), wanted.iter().copied());
    let reader = builder
        .with_projection(mask)
        .build()
        .context(ParquetReadSnafu { path: path.clone() })?;

    // The reader emits projected columns in file order; map each wanted
    // index to its position in that order.
    let mut file_order = wanted.clone();
    file_order.sort_unstable();
    let positions: Vec<usize> = wanted
        .iter()
        .map(|idx| file_order.binary_search(idx).unwrap_or_default())
        .collect();

    let schema = Arc::new(reader.schema().project(&positions).context(ArrowSnafu)?);

    let mut batches = Vec::new();
    for batch in reader {
        let batch = batch.context(ArrowSnafu)?;
        if batch.num_rows() > 0 {
            batches.push(batch.project(&positions).context(ArrowSnafu)?);
        }
    }

    debug!(
        path = %path.display(),
        rows = batches.iter().map(RecordBatch::num_rows).sum::<usize>(),
        "read table"
    );
    Ok((schema, batches))
}

/// Read matching rows from a dataset.
///
/// - Jurisdictions: when given, only their tables are read, in request order
///   (a missing table file is a storage `NotFound` error); otherwise every
///   table in the dataset is read in file-name order.
/// - Summary levels: when given, only rows whose `SUMLEV` matches one of them.
/// - Columns: when given, exactly these columns in this order, preceded by
///   `GEOID` if it was not requested; otherwise every column.
///
/// An empty dataset yields an empty batch with an empty schema.
pub async fn read_filtered(
    location: &DatasetLocation,
    request: &QueryRequest,
) -> QueryResult<RecordBatch> {
    let query = resolve(request)?;

    let paths: Vec<PathBuf> = if query.jurisdictions.is_empty() {
        storage::list_files(location.storage(), TABLE_EXTENSION)
            .await
            .context(StorageSnafu)?
    } else {
        query.jurisdictions.iter().map(|j| table_rel_path(j)).collect()
    };

    let tables: Vec<(SchemaRef, Vec<RecordBatch>)> = futures::stream::iter(&paths)
        .map(|rel_path| read_table(location, rel_path, &query))
        .buffered(READ_CONCURRENCY)
        .try_collect()
        .await?;

    let Some((schema, _)) = tables.first() else {
        return Ok(RecordBatch::new_empty(Arc::new(Schema::empty())));
    };
    let schema = Arc::clone(schema);

    let combined = concat_batches(&schema, tables.iter().flat_map(|(_, batches)| batches))
        .context(ArrowSnafu)?;

    debug!(
        tables = tables.len(),
        rows = combined.num_rows(),
        columns = combined.num_columns(),
        "query complete"
    );
    Ok(combined)
}
