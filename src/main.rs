// src/main.rs
mod extractors;
mod filings;
mod pipeline;
mod storage;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use extractors::MatchMode;
use filings::FilingTextSource;
use pipeline::{ExtractionPipeline, PipelineConfig};
use storage::{CsvResultSink, EpsFormat};
use utils::AppError;

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum MatchModeArg {
    /// First hit of every pattern
    First,
    /// Every hit of every pattern
    All,
}

impl From<MatchModeArg> for MatchMode {
    fn from(arg: MatchModeArg) -> Self {
        match arg {
            MatchModeArg::First => MatchMode::First,
            MatchModeArg::All => MatchMode::All,
        }
    }
}

/// Command Line Interface for the 8-K EPS extractor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing the 8-K filings (HTML or plain text)
    #[arg(short, long)]
    input_dir: PathBuf,

    /// CSV file the resolved EPS figures are written to (overwritten)
    #[arg(short, long, default_value = "./output.csv")]
    output: PathBuf,

    /// Number format for the EPS column
    #[arg(short, long, value_enum, default_value_t = EpsFormat::Plain)]
    format: EpsFormat,

    /// Whether each pattern contributes its first hit or all of them
    #[arg(long, value_enum, default_value_t = MatchModeArg::First)]
    match_mode: MatchModeArg,

    /// File extensions treated as filings
    #[arg(long, value_delimiter = ',', default_value = "html,htm,txt")]
    extensions: Vec<String>,

    /// Maximum number of documents processed concurrently
    #[arg(short, long, default_value = "4")]
    jobs: usize,

    /// Optional path for a JSON run summary
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Debug mode - save highlighted match views per document into this directory
    #[arg(short, long)]
    debug_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);

    if args.jobs == 0 {
        return Err(AppError::Config("--jobs must be at least 1".to_string()));
    }

    // 3. Build the pipeline
    let mut config = PipelineConfig::new(&args.input_dir);
    if !args.extensions.is_empty() {
        config.extensions = args.extensions.iter().map(|e| e.trim_start_matches('.').to_string()).collect();
    }
    config.match_mode = args.match_mode.into();
    config.jobs = args.jobs;
    config.debug_dir = args.debug_dir.clone();
    let sink = CsvResultSink::new(&args.output, args.format);
    let pipeline = ExtractionPipeline::new(config, Arc::new(FilingTextSource::new()), Box::new(sink));

    // 4. Run it
    let outcome = pipeline.run().await?;

    // 5. Optional run summary
    if let Some(summary_path) = &args.summary {
        storage::save_run_summary(&outcome.summary, summary_path)?;
    }

    tracing::info!(
        "Wrote {} EPS figures to {}",
        outcome.results.len(),
        outcome.summary.output_path.display()
    );
    Ok(())
}
