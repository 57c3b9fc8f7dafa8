use std::{
    io::Write,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use arrow::{
    array::RecordBatch,
    error::ArrowError,
    util::display::{ArrayFormatter, FormatOptions},
};
use census2020_core::{DatasetLocation, QueryRequest, read_filtered};
use snafu::ResultExt;
use tabled::{builder::Builder, settings::Style};

use crate::{
    error::{ArrowSnafu, CliResult, QuerySnafu, WriteOutputSnafu},
    output::{OutputFormat, OutputWriter},
};

#[derive(Debug, Clone)]
pub struct QueryOpts {
    pub timing: bool,
    pub max_rows: usize,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
}

#[derive(Debug, Clone)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub preview_rows: Vec<Vec<String>>,
    pub total_rows: u64,
    pub elapsed: Option<Duration>,
}

/// Run a filtered read, optionally export the full result, and keep the first
/// `max_rows` rows as display strings.
pub async fn run_query(
    dataset: &Path,
    request: &QueryRequest,
    opts: &QueryOpts,
) -> CliResult<QueryOutput> {
    let started = Instant::now();
    let location = DatasetLocation::local(dataset);

    let batch = read_filtered(&location, request)
        .await
        .context(QuerySnafu {
            dataset: dataset.display().to_string(),
        })?;

    if let Some(path) = &opts.output {
        let mut writer = OutputWriter::create(path, opts.format).await?;
        if batch.num_columns() > 0 {
            writer.write_batch(&batch)?;
        }
        writer.finish().await?;
    }

    let columns = batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();

    Ok(QueryOutput {
        columns,
        preview_rows: preview_rows(&batch, opts.max_rows)?,
        total_rows: batch.num_rows() as u64,
        elapsed: opts.timing.then(|| started.elapsed()),
    })
}

fn preview_rows(batch: &RecordBatch, max_rows: usize) -> CliResult<Vec<Vec<String>>> {
    let options = FormatOptions::default();
    let formatters = batch
        .columns()
        .iter()
        .map(|col| ArrayFormatter::try_new(col.as_ref(), &options))
        .collect::<Result<Vec<_>, ArrowError>>()
        .context(ArrowSnafu)?;

    let rows_to_take = max_rows.min(batch.num_rows());
    let mut rows = Vec::with_capacity(rows_to_take);
    for row_idx in 0..rows_to_take {
        rows.push(
            formatters
                .iter()
                .map(|f| f.value(row_idx).to_string())
                .collect(),
        );
    }
    Ok(rows)
}

fn render_table(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut builder = Builder::default();
    builder.push_record(columns);
    for row in rows {
        builder.push_record(row);
    }
    builder.build().with(Style::rounded()).to_string()
}

/// Preview (or a note in its place) followed by the summary lines.
pub fn write_query_output<W: Write>(
    res: &QueryOutput,
    opts: &QueryOpts,
    out: &mut W,
) -> CliResult<()> {
    let shown = res.preview_rows.len() as u64;
    if res.total_rows == 0 {
        writeln!(out, "(no rows)").context(WriteOutputSnafu)?;
    } else if shown == 0 {
        writeln!(out, "(preview suppressed; use --max-rows > 0)").context(WriteOutputSnafu)?;
    } else {
        writeln!(out, "{}", render_table(&res.columns, &res.preview_rows))
            .context(WriteOutputSnafu)?;
        if shown < res.total_rows {
            writeln!(out, "(showing first {shown} of {} rows)", res.total_rows)
                .context(WriteOutputSnafu)?;
        }
    }

    writeln!(out, "total_rows: {}", res.total_rows).context(WriteOutputSnafu)?;
    if let Some(d) = res.elapsed {
        writeln!(out, "elapsed_ms: {}", d.as_millis()).context(WriteOutputSnafu)?;
    }
    if let Some(path) = &opts.output {
        writeln!(out, "wrote: {} ({:?})", path.display(), opts.format)
            .context(WriteOutputSnafu)?;
    }
    Ok(())
}

pub fn print_query_output(res: &QueryOutput, opts: &QueryOpts) -> CliResult<()> {
    let mut stdout = std::io::stdout().lock();
    write_query_output(res, opts, &mut stdout)
}
