//! CLI tool for pulling and querying 2020 Census redistricting data.

mod error;
mod output;
mod pull;
mod query;

use std::path::PathBuf;

use census2020_core::QueryRequest;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    error::CliResult,
    pull::{FetchArgs, cmd_ingest_archive, cmd_pull, cmd_pull_all},
    query::{QueryOpts, print_query_output, run_query},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    Csv,
    Jsonl,
}

impl From<OutputFormatArg> for output::OutputFormat {
    fn from(v: OutputFormatArg) -> Self {
        match v {
            OutputFormatArg::Csv => output::OutputFormat::Csv,
            OutputFormatArg::Jsonl => output::OutputFormat::Jsonl,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download and ingest one jurisdiction, writing a Parquet table
    Pull {
        /// Postal code, name or numeric code (e.g. WY, Wyoming, 56)
        state: String,

        /// Output file, or an existing directory to write `<abbr>.parquet` into
        output: PathBuf,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Ingest many jurisdictions into a dataset directory (default: 50 states + DC)
    PullAll {
        #[arg(long, default_value = ".")]
        output: PathBuf,

        /// Repeatable; restricts the pull to these jurisdictions
        #[arg(long = "state")]
        states: Vec<String>,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Ingest an archive that was already downloaded
    IngestArchive {
        zip: PathBuf,

        #[arg(long)]
        output: PathBuf,

        /// Jurisdiction of the archive (default: read from the data)
        #[arg(long)]
        state: Option<String>,
    },

    /// Read rows from a dataset directory
    Query {
        #[arg(long)]
        dataset: PathBuf,

        /// Repeatable jurisdiction filter
        #[arg(long = "state")]
        states: Vec<String>,

        /// Repeatable summary level filter, by name (state-county) or code (050)
        #[arg(long = "level")]
        levels: Vec<String>,

        /// Repeatable column projection; GEOID is always included
        #[arg(long = "column")]
        columns: Vec<String>,

        #[arg(long, default_value_t = false)]
        timing: bool,

        #[arg(long, default_value_t = 10)]
        max_rows: usize,

        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormatArg::Csv)]
        format: OutputFormatArg,
    },
}

#[derive(Debug, Parser)]
#[command(name = "census2020", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

struct QueryArgs {
    dataset: PathBuf,
    states: Vec<String>,
    levels: Vec<String>,
    columns: Vec<String>,
    timing: bool,
    max_rows: usize,
    output: Option<PathBuf>,
    format: OutputFormatArg,
}

async fn cmd_query(args: QueryArgs) -> CliResult<()> {
    let request = QueryRequest::new()
        .jurisdictions(args.states)
        .summary_levels(args.levels)
        .columns(args.columns);

    let opts = QueryOpts {
        timing: args.timing,
        max_rows: args.max_rows,
        output: args.output,
        format: args.format.into(),
    };

    let res = run_query(&args.dataset, &request, &opts).await?;
    print_query_output(&res, &opts)
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Pull {
            state,
            output,
            fetch,
        } => cmd_pull(&state, &output, &fetch).await,

        Command::PullAll {
            output,
            states,
            fetch,
        } => cmd_pull_all(&states, &output, &fetch).await,

        Command::IngestArchive { zip, output, state } => {
            cmd_ingest_archive(&zip, &output, state.as_deref()).await
        }

        Command::Query {
            dataset,
            states,
            levels,
            columns,
            timing,
            max_rows,
            output,
            format,
        } => {
            cmd_query(QueryArgs {
                dataset,
                states,
                levels,
                columns,
                timing,
                max_rows,
                output,
                format,
            })
            .await
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
