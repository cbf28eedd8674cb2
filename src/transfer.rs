//! Distribution of a processed run to its three destinations.
//!
//! * [`cloud`] shares each destination project's data with its owner.
//! * [`hpc`] mirrors a curated subset of the run to the compute cluster.
//! * [`archive`] mirrors the whole run, minus derived reads, to long-term
//!   storage.
//!
//! Each destination is attempted independently by the pipeline and its
//! outcome persisted separately.

pub mod archive;
pub mod cloud;
pub mod hpc;

use std::io;

use crate::tools::CopyRequest;
use crate::tools::ExitCode;
use crate::tools::Transfer;
use crate::tools::lims;

/// An error related to a transfer.
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(io::Error),
    /// The copy primitive exited with a non-zero code.
    Copy(String, ExitCode),
    /// The LIMS could not be consulted.
    Lims(lims::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::Copy(destination, exit) => {
                write!(f, "copy to `{destination}` exited with code {exit}")
            }
            Error::Lims(err) => write!(f, "LIMS error: {err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// What a run has to offer its destinations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    /// The run was converted into per-sample read files.
    Converted,
    /// The run could not be demultiplexed and only its raw data is shared.
    Raw,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Converted => write!(f, "converted"),
            Mode::Raw => write!(f, "raw"),
        }
    }
}

/// Joins a remote root and a directory name into a directory destination.
pub(crate) fn remote_dir(root: &str, name: &str) -> String {
    format!("{}/{}/", root.trim_end_matches('/'), name)
}

/// Runs a copy, failing on a non-zero exit code.
pub(crate) fn copy(transfer: &dyn Transfer, request: CopyRequest) -> Result<()> {
    let exit = transfer.copy(&request)?;

    if !exit.success() {
        return Err(Error::Copy(request.destination, exit));
    }

    Ok(())
}
