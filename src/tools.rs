//! Narrow interfaces to the external tools and services the pipeline drives.
//!
//! Every collaborator sits behind a trait so that the orchestrator deals in
//! typed requests and exit codes rather than command lines. The
//! process-backed implementations live in [`process`], [`lims`], and
//! [`notify`]; [`Toolbox::from_config()`] wires them together.

pub mod lims;
pub mod notify;
pub mod process;

#[cfg(test)]
pub(crate) mod fake;

use std::io;
use std::path::Path;
use std::path::PathBuf;

pub use lims::Lims;
pub use notify::Notification;
pub use notify::Notifier;

use crate::config::Config;

/// The exit code of an external tool.
///
/// A process terminated by a signal is reported as `-1`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// The exit code of a successful tool.
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Creates an exit code.
    pub fn new(code: i32) -> Self {
        Self(code)
    }

    /// Gets the numeric code.
    pub fn code(&self) -> i32 {
        self.0
    }

    /// Whether or not the tool succeeded.
    pub fn success(&self) -> bool {
        self.0 == 0
    }
}

impl From<std::process::ExitStatus> for ExitCode {
    fn from(status: std::process::ExitStatus) -> Self {
        Self(status.code().unwrap_or(-1))
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request to demultiplex a run.
#[derive(Clone, Debug)]
pub struct ConvertRequest<'a> {
    /// The run directory.
    pub input: &'a Path,
    /// The output directory.
    pub output: &'a Path,
    /// The sample sheet.
    pub sample_sheet: &'a Path,
    /// Whether only the first tile should be demultiplexed.
    pub first_tile_only: bool,
}

/// A demultiplexing tool.
pub trait Demultiplexer {
    /// Demultiplexes a run, blocking until the tool exits.
    fn convert(&self, request: &ConvertRequest<'_>) -> io::Result<ExitCode>;
}

/// A report produced by a statistics tool.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StatsReport {
    /// The name of the command that produced the report.
    pub name: String,
    /// The report file.
    pub path: PathBuf,
    /// The exit code of the command.
    pub exit: ExitCode,
}

/// A set of statistics tools.
pub trait StatsTool {
    /// Generates every report for a run into `output_dir`.
    ///
    /// Each command runs even if an earlier one failed; callers inspect the
    /// exit code of every report.
    fn generate(&self, run_dir: &Path, output_dir: &Path) -> io::Result<Vec<StatsReport>>;
}

/// A request to copy local paths to a remote destination.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CopyRequest {
    /// The local sources.
    pub sources: Vec<PathBuf>,
    /// The remote destination.
    pub destination: String,
    /// Glob patterns excluded from the copy.
    pub excludes: Vec<String>,
}

/// A remote copy primitive.
pub trait Transfer {
    /// Copies the sources to the destination, blocking until done.
    fn copy(&self, request: &CopyRequest) -> io::Result<ExitCode>;
}

/// Every external collaborator used by the pipeline.
#[allow(missing_debug_implementations)]
pub struct Toolbox {
    /// The demultiplexing tool.
    pub demultiplexer: Box<dyn Demultiplexer>,
    /// The statistics tools.
    pub stats: Box<dyn StatsTool>,
    /// The cloud-share copy primitive.
    pub cloud: Box<dyn Transfer>,
    /// The HPC copy primitive.
    pub hpc: Box<dyn Transfer>,
    /// The archive copy primitive.
    pub archive: Box<dyn Transfer>,
    /// The LIMS.
    pub lims: Box<dyn Lims>,
    /// The notification channel.
    pub notifier: Box<dyn Notifier>,
}

impl Toolbox {
    /// Builds the process-backed toolbox described by a configuration.
    pub fn from_config(config: &Config) -> Result<Self, lims::Error> {
        let lims: Box<dyn Lims> = match &config.lims.url {
            Some(url) => Box::new(lims::HttpLims::new(url, config.lims.timeout_secs)?),
            None => Box::new(lims::NoLims),
        };

        Ok(Self {
            demultiplexer: Box::new(process::BclConvert::new(
                &config.conversion.program,
                &config.conversion.args,
            )),
            stats: Box::new(process::InterOp::new(config.stats.commands.clone())),
            cloud: Box::new(process::CommandTransfer::new(
                &config.cloud.program,
                &config.cloud.args,
            )),
            hpc: Box::new(process::CommandTransfer::new(
                &config.hpc.program,
                &config.hpc.args,
            )),
            archive: Box::new(process::CommandTransfer::new(
                &config.archive.program,
                &config.archive.args,
            )),
            lims,
            notifier: Box::new(notify::CommandNotifier::new(config.notify.clone())),
        })
    }
}
