//! The demultiplexing feasibility probe.
//!
//! Before committing to a full conversion, the run is demultiplexed over a
//! small subset of its data with the sample sheet as submitted and, if that
//! assigns too few reads, with the last index read of every sample reverse
//! complemented. The first orientation whose undetermined ratio falls below
//! the configured threshold is accepted. A reverse complemented sheet becomes
//! the canonical sample sheet; a forward one leaves it as submitted.
//!
//! Both attempts use the [normalized](SampleSheet::normalize) index reads. A
//! single-sample sheet is only ever probed forward, since with one sample
//! there is nothing for the index to disambiguate.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;

use crate::config::ProbeConfig;
use crate::reports;
use crate::reports::ReadCounts;
use crate::run::Run;
use crate::run_log::RunLog;
use crate::sample_sheet;
use crate::sample_sheet::Orientation;
use crate::sample_sheet::SampleSheet;
use crate::tools::ConvertRequest;
use crate::tools::Demultiplexer;
use crate::tools::ExitCode;

/// The name of each probe's sample sheet within its scratch directory.
const PROBE_SHEET: &str = "SampleSheet.csv";

/// The name of each probe's output within its scratch directory.
const PROBE_OUTPUT: &str = "output";

/// The name under which the submitted sample sheet is kept when another
/// orientation replaces it.
pub const SUBMITTED_SHEET: &str = "SampleSheet.submitted.csv";

/// An error related to probing.
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(io::Error),
    /// The sample sheet could not be read or written.
    SampleSheet(sample_sheet::Error),
    /// The demultiplexer exited with a non-zero code.
    Failed(Orientation, ExitCode),
    /// The probe's report could not be read.
    Report(Orientation, reports::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::SampleSheet(err) => write!(f, "sample sheet error: {err}"),
            Error::Failed(orientation, exit) => write!(
                f,
                "probe execution failed: {orientation} probe exited with code {exit}"
            ),
            Error::Report(orientation, err) => {
                write!(f, "unreadable {orientation} probe report: {err}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<sample_sheet::Error> for Error {
    fn from(err: sample_sheet::Error) -> Self {
        Error::SampleSheet(err)
    }
}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The outcome of a probe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Outcome {
    /// The run can be demultiplexed with the sheet in this orientation, which
    /// is now the canonical sample sheet.
    Accepted(Orientation, f64),
    /// No orientation assigned enough reads.
    Rejected,
}

impl Outcome {
    /// Whether or not an orientation was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(..))
    }
}

/// Probes a run, returning which orientation (if any) demultiplexes it.
///
/// `sheet_path` is the canonical sample sheet. It is left untouched unless
/// the reverse orientation is accepted, in which case the reverse sheet
/// replaces it and the submitted sheet is kept alongside it.
pub fn probe(
    run: &Run,
    sheet_path: &Path,
    config: &ProbeConfig,
    demultiplexer: &dyn Demultiplexer,
    log: &RunLog,
) -> Result<Outcome> {
    let scratch = run.path(&config.scratch_dir);
    let mut forward = SampleSheet::from_path(sheet_path)?;
    let single = forward.samples().len() == 1;

    if forward.normalize() {
        if single {
            log.info("Note : Single sample, replaced unknown bases in index reads");
        } else {
            log.info("Note : Removed unknown bases from index reads");
        }
    }

    let prober = Prober {
        run,
        scratch: &scratch,
        config,
        demultiplexer,
        log,
    };

    let ratio = prober.attempt(Orientation::Forward, &forward)?;
    if ratio < config.undetermined_threshold {
        return Ok(Outcome::Accepted(Orientation::Forward, ratio));
    }

    if single {
        log.info("Single sample sheet: not probing reverse complemented indexes");
        return Ok(Outcome::Rejected);
    }

    let reverse = forward.reverse_complemented();
    if reverse == forward {
        log.info("Reverse complementing leaves the index reads unchanged: not probing");
        return Ok(Outcome::Rejected);
    }

    let ratio = prober.attempt(Orientation::ReverseComplemented, &reverse)?;
    if ratio < config.undetermined_threshold {
        promote(&reverse, sheet_path)?;
        log.info(format!(
            "Note : Reverse complemented {}",
            reverse.reversed_index_name()
        ));

        return Ok(Outcome::Accepted(Orientation::ReverseComplemented, ratio));
    }

    Ok(Outcome::Rejected)
}

/// Replaces the canonical sample sheet, keeping the submitted one next to
/// it.
fn promote(sheet: &SampleSheet, sheet_path: &Path) -> Result<()> {
    let submitted = sheet_path.with_file_name(SUBMITTED_SHEET);
    if !submitted.exists() {
        fs::copy(sheet_path, &submitted)?;
    }

    sheet.write_to(sheet_path)?;
    Ok(())
}

/// Runs individual probe attempts.
struct Prober<'a> {
    /// The run.
    run: &'a Run,
    /// The scratch directory.
    scratch: &'a Path,
    /// The probe configuration.
    config: &'a ProbeConfig,
    /// The demultiplexer.
    demultiplexer: &'a dyn Demultiplexer,
    /// The run log.
    log: &'a RunLog,
}

impl Prober<'_> {
    /// The scratch directory of one orientation.
    fn dir(&self, orientation: Orientation) -> PathBuf {
        self.scratch.join(orientation.to_string())
    }

    /// Demultiplexes a subset of the run with a sheet, returning the
    /// undetermined ratio.
    fn attempt(&self, orientation: Orientation, sheet: &SampleSheet) -> Result<f64> {
        let dir = self.dir(orientation);

        // Any leftovers from an interrupted attempt are stale.
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(Error::Io(err)),
        }
        fs::create_dir_all(&dir)?;

        let sheet_path = dir.join(PROBE_SHEET);
        sheet.write_to(&sheet_path)?;

        let output = dir.join(PROBE_OUTPUT);
        debug!(run = %self.run, %orientation, "probing into {}", output.display());

        let exit = self.demultiplexer.convert(&ConvertRequest {
            input: self.run.dir(),
            output: &output,
            sample_sheet: &sheet_path,
            first_tile_only: self.config.first_tile_only,
        })?;

        if !exit.success() {
            return Err(Error::Failed(orientation, exit));
        }

        let report = fs::read_to_string(output.join(reports::DEMULTIPLEX_STATS))?;
        let counts =
            ReadCounts::parse(&report).map_err(|err| Error::Report(orientation, err))?;
        let ratio = counts.undetermined_ratio();

        self.log.info(format!(
            "Probe ({orientation}): {} of {} reads undetermined ({:.1}%)",
            counts.undetermined,
            counts.total,
            ratio * 100.0
        ));

        Ok(ratio)
    }
}
