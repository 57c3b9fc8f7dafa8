//! Persisted jurisdiction tables.
//!
//! A dataset is a directory holding one Parquet file per jurisdiction, named
//! `<lower-cased postal code>.parquet`. Tables are encoded in memory and
//! handed to [`storage::write_atomic`], so a table file is either the complete
//! previous version or the complete new one.

use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, ZstdLevel},
    errors::ParquetError,
    file::properties::WriterProperties,
};
use snafu::prelude::*;
use tracing::info;

use crate::{
    jurisdiction::Jurisdiction,
    storage::{self, StorageError, StorageLocation, output::OutputLocation},
};

/// File extension of persisted tables.
pub const TABLE_EXTENSION: &str = "parquet";

/// Errors raised while persisting a table.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    /// Parquet encoding failed.
    #[snafu(display("Failed to encode {jurisdiction} table as Parquet: {source}"))]
    Encode {
        /// Jurisdiction whose table was being encoded.
        jurisdiction: String,
        /// Underlying Parquet error.
        source: ParquetError,
    },

    /// Writing the encoded table failed.
    #[snafu(display("Failed to write {jurisdiction} table: {source}"))]
    Write {
        /// Jurisdiction whose table was being written.
        jurisdiction: String,
        /// Underlying storage error.
        #[snafu(source(from(StorageError, Box::new)))]
        source: Box<StorageError>,
    },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Directory holding one persisted table per jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLocation(StorageLocation);

impl DatasetLocation {
    /// Dataset rooted at a local directory.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        DatasetLocation(StorageLocation::local(root))
    }

    /// Underlying storage location.
    pub fn storage(&self) -> &StorageLocation {
        &self.0
    }
}

impl AsRef<StorageLocation> for DatasetLocation {
    fn as_ref(&self) -> &StorageLocation {
        &self.0
    }
}

/// Relative path of a jurisdiction's table inside a dataset.
pub fn table_rel_path(jurisdiction: &Jurisdiction) -> PathBuf {
    PathBuf::from(format!("{}.{TABLE_EXTENSION}", jurisdiction.file_stem()))
}

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .build()
}

/// Encode a table as a single Parquet file image.
pub fn encode_parquet(jurisdiction: &Jurisdiction, batch: &RecordBatch) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(writer_properties()))
        .context(EncodeSnafu {
            jurisdiction: jurisdiction.abbr,
        })?;
    writer.write(batch).context(EncodeSnafu {
        jurisdiction: jurisdiction.abbr,
    })?;
    writer.close().context(EncodeSnafu {
        jurisdiction: jurisdiction.abbr,
    })?;
    Ok(buf)
}

/// Persist a jurisdiction's table into a dataset, replacing any previous
/// version. Returns the table's relative path.
pub async fn write_jurisdiction_table(
    location: &DatasetLocation,
    jurisdiction: &Jurisdiction,
    batch: &RecordBatch,
) -> StoreResult<PathBuf> {
    let rel_path = table_rel_path(jurisdiction);
    write_table(location.storage(), &rel_path, jurisdiction, batch).await?;
    Ok(rel_path)
}

/// Persist a jurisdiction's table at an explicit file path.
pub async fn write_table_file(
    path: &Path,
    jurisdiction: &Jurisdiction,
    batch: &RecordBatch,
) -> StoreResult<()> {
    let target = OutputLocation::from_path(path).context(WriteSnafu {
        jurisdiction: jurisdiction.abbr,
    })?;
    write_table(&target.storage, &target.rel_path, jurisdiction, batch).await
}

async fn write_table(
    storage: &StorageLocation,
    rel_path: &Path,
    jurisdiction: &Jurisdiction,
    batch: &RecordBatch,
) -> StoreResult<()> {
    let bytes = encode_parquet(jurisdiction, batch)?;
    storage::write_atomic(storage, rel_path, &bytes)
        .await
        .context(WriteSnafu {
            jurisdiction: jurisdiction.abbr,
        })?;

    info!(
        %jurisdiction,
        path = %storage.root().join(rel_path).display(),
        rows = batch.num_rows(),
        bytes = bytes.len(),
        "wrote jurisdiction table"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use bytes::Bytes;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::TempDir;

    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn small_table() -> Result<RecordBatch, Box<dyn std::error::Error>> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("GEOID", DataType::Utf8, true),
            Field::new("POP100", DataType::Int64, true),
        ]));
        Ok(RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["0500000US56001", "0500000US56003"])) as ArrayRef,
                Arc::new(Int64Array::from(vec![Some(37066), None])) as ArrayRef,
            ],
        )?)
    }

    fn wyoming() -> &'static Jurisdiction {
        Jurisdiction::lookup("WY").expect("WY is in the registry")
    }

    #[test]
    fn table_files_are_named_by_lower_case_code() {
        assert_eq!(table_rel_path(wyoming()), PathBuf::from("wy.parquet"));
    }

    #[tokio::test]
    async fn written_table_reads_back_with_nulls_intact() -> TestResult {
        let tmp = TempDir::new()?;
        let location = DatasetLocation::local(tmp.path());
        let table = small_table()?;

        let rel = write_jurisdiction_table(&location, wyoming(), &table).await?;
        let bytes = tokio::fs::read(tmp.path().join(rel)).await?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))?.build()?;
        let batches = reader.collect::<Result<Vec<_>, _>>()?;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], table);
        Ok(())
    }

    #[tokio::test]
    async fn explicit_file_path_creates_parents() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("out/wyoming.parquet");

        write_table_file(&path, wyoming(), &small_table()?).await?;

        let bytes = tokio::fs::read(&path).await?;
        assert_eq!(&bytes[..4], b"PAR1");
        Ok(())
    }
}
