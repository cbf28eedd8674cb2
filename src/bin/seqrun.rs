//! A binary that processes finished sequencing runs.
//!
//! ```shell
//! cargo run --release --bin=seqrun --features=binaries -- --config seqrun.toml
//! ```
//!
//! Each invocation scans every configured instrument root once, processes
//! every eligible run one after the other, and exits. It is meant to be
//! scheduled periodically (for example, by `cron`). Concurrent invocations
//! are safe: a run is only ever processed by the invocation that claims it.
//!
//! A single run directory can be processed with `--run <DIR>`, whether or not
//! its instrument has signalled completion.

use std::path::PathBuf;

use anyhow::Context as _;
use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use clap_verbosity_flag::Verbosity;
use seqrun::config::Config;
use seqrun::pipeline;
use seqrun::pipeline::Context;
use seqrun::pipeline::Outcome;
use seqrun::pipeline::Summary;
use seqrun::tools::Toolbox;
use tracing::info;
use tracing::warn;
use tracing_log::AsTrace as _;
use tracing_subscriber::EnvFilter;

////////////////////////////////////////////////////////////////////////////////////////
// Arguments
////////////////////////////////////////////////////////////////////////////////////////

/// Demultiplexes, checks, and distributes finished sequencing runs.
#[derive(Parser)]
struct Args {
    /// The configuration file.
    #[arg(short, long, default_value = "seqrun.toml")]
    config: PathBuf,

    /// Processes only this run directory instead of scanning the instrument
    /// roots.
    #[arg(short, long, value_name = "DIR")]
    run: Option<PathBuf>,

    #[command(flatten)]
    verbose: Verbosity,
}

////////////////////////////////////////////////////////////////////////////////////////
// Main
////////////////////////////////////////////////////////////////////////////////////////

/// Processes the runs selected by the arguments.
fn process(args: &Args) -> Result<Summary> {
    let config = Config::from_path(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    let tools = Toolbox::from_config(&config).context("building the external tools")?;
    let context = Context::new(config, tools);

    match &args.run {
        Some(dir) => {
            if !dir.is_dir() {
                bail!("run directory does not exist: {}", dir.display());
            }

            info!("processing {}", dir.display());

            let outcome = pipeline::process_path(&context, dir)
                .with_context(|| format!("opening run {}", dir.display()))?;

            let mut summary = Summary::default();
            match outcome {
                Outcome::Done => summary.done.push(dir.display().to_string()),
                Outcome::Failed => summary.failed.push(dir.display().to_string()),
                Outcome::Skipped => {
                    warn!("{} is already claimed", dir.display());
                    summary.skipped += 1;
                }
            }

            Ok(summary)
        }
        None => Ok(pipeline::run_once(&context)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    match std::env::var("RUST_LOG") {
        Ok(_) => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init(),
        Err(_) => tracing_subscriber::fmt()
            .with_max_level(args.verbose.log_level_filter().as_trace())
            .init(),
    };

    let summary = process(&args)?;
    println!("{summary}");

    for run in &summary.failed {
        warn!("{run} failed; remove its `failed` marker to retry");
    }

    if !summary.failed.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
