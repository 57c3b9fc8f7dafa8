use std::{io::Write, path::Path};

use arrow::array::RecordBatch;
use census2020_core::storage::output::{OutputLocation, OutputSink};
use snafu::ResultExt;

use crate::error::{ArrowSnafu, CliResult, StorageSnafu};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Jsonl,
}

pub struct SinkWriter {
    sink: OutputSink,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.sink.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.sink.writer().flush()
    }
}

impl SinkWriter {
    async fn finish(self) -> CliResult<()> {
        self.sink.finish().await.context(StorageSnafu)
    }
}

/// Streams query results to a file; nothing is visible at the target path
/// until `finish` succeeds.
pub enum OutputWriter {
    Csv(Box<arrow_csv::Writer<SinkWriter>>),
    Jsonl(Box<arrow_json::LineDelimitedWriter<SinkWriter>>),
}

impl OutputWriter {
    pub async fn create(path: &Path, format: OutputFormat) -> CliResult<Self> {
        let target = OutputLocation::from_path(path).context(StorageSnafu)?;
        let sink = target.open().await.context(StorageSnafu)?;
        let writer = SinkWriter { sink };

        Ok(match format {
            OutputFormat::Csv => OutputWriter::Csv(Box::new(
                arrow_csv::WriterBuilder::new().with_header(true).build(writer),
            )),
            OutputFormat::Jsonl => {
                OutputWriter::Jsonl(Box::new(arrow_json::LineDelimitedWriter::new(writer)))
            }
        })
    }

    pub fn write_batch(&mut self, batch: &RecordBatch) -> CliResult<()> {
        match self {
            OutputWriter::Csv(w) => w.write(batch).context(ArrowSnafu),
            OutputWriter::Jsonl(w) => w.write_batches(&[batch]).context(ArrowSnafu),
        }
    }

    pub async fn finish(self) -> CliResult<()> {
        match self {
            OutputWriter::Csv(w) => w.into_inner().finish().await,
            OutputWriter::Jsonl(mut w) => {
                w.finish().context(ArrowSnafu)?;
                w.into_inner().finish().await
            }
        }
    }
}
