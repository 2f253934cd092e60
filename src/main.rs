use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use url_downloader::utils::validate_input_path;
use url_downloader::{Config, Error, Pipeline, PipelineReport, Result, ShutdownContext, logging};

/// Download every URL listed in a CSV file.
#[derive(Debug, Parser)]
#[command(name = "url-downloader", version)]
#[command(about = "Concurrently download the URLs listed in a CSV file", long_about = None)]
struct Cli {
    /// Input CSV file: a header row, then one URL per row.
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    file: Option<PathBuf>,

    /// Input CSV file, when `--file` is not given.
    #[arg(value_name = "FILE")]
    positional: Option<PathBuf>,

    /// Maximum number of downloads in flight at once.
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Seconds after which the run stops, finished or not.
    #[arg(short = 'd', long, value_name = "SECS")]
    deadline: Option<u64>,

    /// Directory downloaded files are written to.
    #[arg(short = 'o', long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// JSON configuration file; flags override its values.
    #[arg(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn input(&self) -> Option<&Path> {
        self.file.as_deref().or(self.positional.as_deref())
    }

    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(workers) = self.workers {
            config.max_workers = workers;
        }
        if let Some(secs) = self.deadline {
            config.shutdown_deadline = Duration::from_secs(secs);
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = Some(dir.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(report) => println!("{}", report.summary),
        Err(err) => {
            eprintln!("url-downloader: {err}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: &Cli) -> Result<PipelineReport> {
    let input = cli
        .input()
        .ok_or_else(|| Error::config("file", "csv filepath is mandatory"))?;
    validate_input_path(input)?;
    let config = cli.load_config()?;

    if let Err(err) = logging::init_logging(input) {
        logging::init_logging_stderr();
        tracing::warn!(error = %err, "Log file unavailable, logging to stderr only");
    }

    let pipeline = Pipeline::new(config)?;
    let shutdown = ShutdownContext::with_timeout(pipeline.config().shutdown_deadline);
    let signals = shutdown.cancel_on_signal();

    let report = pipeline.run_with_shutdown(input, shutdown).await;
    signals.abort();
    report
}
