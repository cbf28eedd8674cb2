//! Append-only, human-readable logs kept inside each run directory.
//!
//! Every line is also emitted as a [`tracing`] event carrying the run name.

use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use chrono::Local;
use tracing::error;
use tracing::info;

use crate::config::LoggingConfig;
use crate::run::Run;

/// The timestamp format used for log lines.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The log and error files of a run.
#[derive(Clone, Debug)]
pub struct RunLog {
    /// The run name.
    run: String,
    /// The log file.
    log_path: PathBuf,
    /// The error file.
    error_path: PathBuf,
}

impl RunLog {
    /// Creates the log for a run.
    pub fn new(run: &Run, config: &LoggingConfig) -> Self {
        Self {
            run: run.to_string(),
            log_path: run.path(&config.log_file),
            error_path: run.path(&config.error_file),
        }
    }

    /// Gets the path of the log file.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Gets the path of the error file.
    pub fn error_path(&self) -> &Path {
        &self.error_path
    }

    /// Appends a line to the log file.
    pub fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!(run = %self.run, "{message}");
        self.append(&self.log_path, message);
    }

    /// Appends a line to both the log and the error file.
    pub fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        error!(run = %self.run, "{message}");
        self.append(&self.log_path, message);
        self.append(&self.error_path, message);
    }

    /// Gets the last `n` lines of the log file.
    pub fn log_tail(&self, n: usize) -> String {
        tail(&self.log_path, n)
    }

    /// Gets the last `n` lines of the error file.
    pub fn error_tail(&self, n: usize) -> String {
        tail(&self.error_path, n)
    }

    /// Appends a timestamped line to a file.
    ///
    /// Failing to write the log must not fail the pipeline, so errors are
    /// only reported through `tracing`.
    fn append(&self, path: &Path, message: &str) {
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| {
                writeln!(
                    file,
                    "{} {}",
                    Local::now().format(TIMESTAMP_FORMAT),
                    message
                )
            });

        if let Err(err) = result {
            error!(run = %self.run, "unable to write to {}: {err}", path.display());
        }
    }
}

/// Reads the last `n` lines of a file (empty if the file does not exist).
fn tail(path: &Path, n: usize) -> String {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let lines = contents.lines().collect::<Vec<_>>();
            let start = lines.len().saturating_sub(n);
            lines[start..].join("\n")
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
        Err(err) => format!("<unable to read {}: {err}>", path.display()),
    }
}
