//! Marker files that encode the run-level state.
//!
//! The mere presence of a marker at the root of the run directory is the
//! state: `running` while a daemon owns the run, then exactly one of `done`
//! or `failed` once it is retired. A run is only claimed through an
//! exclusive create of the `running` marker, so two daemons racing for the
//! same run cannot both succeed.

use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use tracing::error;
use tracing::warn;

/// A marker file at the root of a run directory.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Marker {
    /// The run is being processed.
    Running,
    /// The run failed and awaits an operator.
    Failed,
    /// The run has been fully processed.
    Done,
}

impl Marker {
    /// All markers that exclude a run from processing.
    pub const ALL: [Marker; 3] = [Marker::Running, Marker::Failed, Marker::Done];

    /// Gets the file name of the marker.
    pub fn file_name(&self) -> &'static str {
        match self {
            Marker::Running => "running",
            Marker::Failed => "failed",
            Marker::Done => "done",
        }
    }

    /// Gets the path of the marker within a run directory.
    pub fn path(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(self.file_name())
    }

    /// Whether or not the marker is present within a run directory.
    pub fn is_present(&self, run_dir: &Path) -> bool {
        self.path(run_dir).exists()
    }

    /// Creates the marker, failing with [`io::ErrorKind::AlreadyExists`] if it
    /// is already present.
    pub fn create_exclusive(&self, run_dir: &Path) -> io::Result<()> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path(run_dir))
            .map(|_| ())
    }
}

impl std::fmt::Display for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// An exclusive claim on a run directory.
///
/// A claim is released by [`Claim::retire`]. If a claim is dropped without
/// being retired (for example, while unwinding), the run is retired as
/// [`Marker::Failed`] so that the `running` marker never outlives the claim.
#[derive(Debug)]
pub struct Claim {
    /// The run directory.
    run_dir: PathBuf,
    /// Whether or not the claim has been retired.
    retired: bool,
}

impl Claim {
    /// Attempts to claim a run directory.
    ///
    /// Returns `Ok(None)` when another process holds (or has retired) the
    /// run.
    pub fn acquire(run_dir: &Path) -> io::Result<Option<Claim>> {
        for marker in [Marker::Failed, Marker::Done] {
            if marker.is_present(run_dir) {
                return Ok(None);
            }
        }

        match Marker::Running.create_exclusive(run_dir) {
            Ok(()) => Ok(Some(Claim {
                run_dir: run_dir.to_path_buf(),
                retired: false,
            })),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Gets the claimed run directory.
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Retires the run with a terminal marker and removes the `running`
    /// marker.
    pub fn retire(mut self, marker: Marker) -> io::Result<()> {
        self.retired = true;
        retire(&self.run_dir, marker)
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if self.retired {
            return;
        }

        warn!(
            run = %self.run_dir.display(),
            "claim dropped without being retired: marking run as failed"
        );

        if let Err(err) = retire(&self.run_dir, Marker::Failed) {
            error!(run = %self.run_dir.display(), "unable to retire run: {err}");
        }
    }
}

/// Writes the terminal marker, then removes the `running` marker.
fn retire(run_dir: &Path, marker: Marker) -> io::Result<()> {
    debug_assert!(marker != Marker::Running, "`running` is not a terminal marker");

    fs::write(marker.path(run_dir), b"")?;

    match fs::remove_file(Marker::Running.path(run_dir)) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
