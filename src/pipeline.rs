//! The per-run state machine.
//!
//! A run moves through its stages in a fixed order:
//!
//! ```text
//! DemuxCheck ─┬─ accepted ─▶ Conversion ─▶ TransferCloud (converted) ─▶ TransferHPC ─┬─▶ Archive ─▶ Cleanup ─▶ done
//!             └─ rejected ─▶ statistics ─▶ TransferCloud (raw) ───────▶ TransferHPC ─┘
//! ```
//!
//! Each stage's outcome is persisted in the run's [status
//! record](crate::status), so a run that failed and was released by an
//! operator resumes at the first stage that has not completed. Any stage
//! failure raises a single [`Error`], caught once in [`process()`], which
//! notifies the operators and parks the run as `failed`.

pub mod error;

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

pub use error::Error;
pub use error::Kind;
use error::Result;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::checksum;
use crate::config::Config;
use crate::conversion;
use crate::conversion::fastq::FASTQ_SUFFIX;
use crate::probe;
use crate::run;
use crate::run::Claim;
use crate::run::Marker;
use crate::run::Run;
use crate::run::scanner;
use crate::run_log::RunLog;
use crate::sample_sheet;
use crate::sample_sheet::ProjectSet;
use crate::sample_sheet::SampleSheet;
use crate::status::Stage;
use crate::status::StatusStore;
use crate::tools::Notification;
use crate::tools::Toolbox;
use crate::transfer;
use crate::transfer::Mode;
use crate::transfer::archive;
use crate::transfer::cloud;
use crate::transfer::hpc;

/// Everything a pipeline invocation needs: the configuration and the tools.
#[allow(missing_debug_implementations)]
pub struct Context {
    /// The configuration.
    config: Config,
    /// The external tools.
    tools: Toolbox,
}

impl Context {
    /// Creates a context.
    pub fn new(config: Config, tools: Toolbox) -> Self {
        Self { config, tools }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gets the external tools.
    pub fn tools(&self) -> &Toolbox {
        &self.tools
    }
}

/// What happened to a run during an invocation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Every stage completed and the run was retired as `done`.
    Done,
    /// A stage failed and the run was retired as `failed`.
    Failed,
    /// The run could not be claimed.
    Skipped,
}

/// The outcomes of one invocation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Summary {
    /// The runs retired as `done`.
    pub done: Vec<String>,
    /// The runs retired as `failed`.
    pub failed: Vec<String>,
    /// The number of runs that could not be claimed.
    pub skipped: usize,
}

impl Summary {
    /// Records the outcome of a run.
    pub fn record(&mut self, run: &Run, outcome: Outcome) {
        match outcome {
            Outcome::Done => self.done.push(run.to_string()),
            Outcome::Failed => self.failed.push(run.to_string()),
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} done, {} failed, {} skipped",
            self.done.len(),
            self.failed.len(),
            self.skipped
        )
    }
}

/// Processes every eligible run under every configured instrument root, one
/// after the other.
///
/// A root that cannot be scanned is reported and skipped.
pub fn run_once(context: &Context) -> Summary {
    let mut summary = Summary::default();

    for instrument in &context.config.instruments {
        let runs = match scanner::eligible_runs(instrument) {
            Ok(runs) => runs,
            Err(err) => {
                error!("unable to scan {}: {err}", instrument.root.display());
                continue;
            }
        };

        info!(
            "{} eligible run(s) under {}",
            runs.len(),
            instrument.root.display()
        );

        for run in runs {
            let outcome = process(context, &run);
            summary.record(&run, outcome);
        }
    }

    summary
}

/// Processes the run in a directory, whether or not its instrument has
/// signalled completion.
pub fn process_path(
    context: &Context,
    dir: impl Into<PathBuf>,
) -> std::result::Result<Outcome, run::Error> {
    let run = Run::open(dir)?;
    Ok(process(context, &run))
}

/// Claims a run, drives it through its remaining stages, and retires it.
pub fn process(context: &Context, run: &Run) -> Outcome {
    let claim = match Claim::acquire(run.dir()) {
        Ok(Some(claim)) => claim,
        Ok(None) => {
            debug!("{run} is claimed by another invocation");
            return Outcome::Skipped;
        }
        Err(err) => {
            error!(run = %run, "unable to claim run: {err}");
            return Outcome::Skipped;
        }
    };

    let log = RunLog::new(run, &context.config.logging);
    log.info("Processing started");

    let mut driver = Driver {
        context,
        run,
        log: &log,
        projects: ProjectSet::new(),
    };

    let (marker, notification, outcome) = match driver.drive() {
        Ok(mode) => {
            if let Err(err) = cleanup(run, &context.config, &log) {
                log.error(format!("Cleanup failed: {err}"));
            }

            log.info("Processing complete");
            (
                Marker::Done,
                driver.success_notification(mode),
                Outcome::Done,
            )
        }
        Err(err) => {
            log.error(format!("Processing failed: {err}"));
            (
                Marker::Failed,
                driver.failure_notification(&err),
                Outcome::Failed,
            )
        }
    };

    if let Err(err) = context.tools.notifier.notify(&notification) {
        log.error(format!("Unable to send notification: {err}"));
    }

    if let Err(err) = claim.retire(marker) {
        error!(run = %run, "unable to retire run as `{marker}`: {err}");
    }

    outcome
}

/// Removes the large derived files of a finished run.
fn cleanup(run: &Run, config: &Config, log: &RunLog) -> io::Result<()> {
    let output = run.path(&config.conversion.output_dir);
    let mut removed = 0;

    if output.is_dir() {
        for path in checksum::find_files(&output, FASTQ_SUFFIX)? {
            fs::remove_file(path)?;
            removed += 1;
        }
    }

    conversion::remove_dir(&run.path(&config.probe.scratch_dir))?;
    conversion::remove_dir(&run.path(&config.cloud.staging_dir))?;

    log.info(format!("Cleanup removed {removed} read file(s)"));
    Ok(())
}

/// Joins project ids for display.
fn list_projects(projects: &ProjectSet) -> String {
    if projects.is_empty() {
        return String::from("none");
    }

    projects.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// The error kind of a probe error.
fn probe_kind(err: &probe::Error) -> Kind {
    match err {
        probe::Error::Failed(..) | probe::Error::Report(..) => Kind::ToolFailure,
        probe::Error::SampleSheet(sample_sheet::Error::Io(_)) | probe::Error::Io(_) => Kind::Io,
        probe::Error::SampleSheet(_) => Kind::InvalidInput,
    }
}

/// The error kind of a conversion error.
fn conversion_kind(err: &conversion::Error) -> Kind {
    match err {
        conversion::Error::Demultiplex(_) => Kind::ToolFailure,
        conversion::Error::Statistics(_) => Kind::StatisticsFailure,
        conversion::Error::Io(_) | conversion::Error::SampleSheet(sample_sheet::Error::Io(_)) => {
            Kind::Io
        }
        conversion::Error::SampleSheet(_) => Kind::InvalidInput,
    }
}

/// The error kind of a transfer error.
fn transfer_kind(err: &transfer::Error) -> Kind {
    match err {
        transfer::Error::Copy(..) | transfer::Error::Lims(_) => Kind::TransferFailure,
        transfer::Error::Io(_) => Kind::Io,
    }
}

/// Drives a single claimed run.
struct Driver<'a> {
    /// The pipeline context.
    context: &'a Context,
    /// The run.
    run: &'a Run,
    /// The run log.
    log: &'a RunLog,
    /// The destination projects, once the sample sheet has been read.
    projects: ProjectSet,
}

impl Driver<'_> {
    /// Creates an error for this run.
    fn fail(&self, kind: Kind, message: impl std::fmt::Display) -> Error {
        Error::new(kind, message.to_string(), self.run, &self.projects)
    }

    /// Runs every stage that has not completed yet, returning the branch
    /// taken.
    fn drive(&mut self) -> Result<Mode> {
        let context = self.context;
        let config = &context.config;
        let tools = &context.tools;

        let sheet_path = self.locate_sample_sheet()?;
        let sheet = self.read_sample_sheet(&sheet_path)?;
        self.projects = sheet.projects();
        self.log.info(format!(
            "Sample sheet lists {} sample(s) for project(s): {}",
            sheet.samples().len(),
            list_projects(&self.projects)
        ));

        let mut status = StatusStore::load(self.run.dir())
            .map_err(|err| self.fail(Kind::Io, format!("unable to load status: {err}")))?;

        if status.record().is_probed() {
            self.skip(Stage::DemuxCheck);
        } else {
            self.log.info(format!("Stage {}: started", Stage::DemuxCheck));

            let outcome = probe::probe(
                self.run,
                &sheet_path,
                &config.probe,
                tools.demultiplexer.as_ref(),
                self.log,
            )
            .map_err(|err| self.fail(probe_kind(&err), err))?;

            self.save(&mut status, Stage::DemuxCheck, outcome.is_accepted())?;

            match outcome {
                probe::Outcome::Accepted(orientation, ratio) => self.log.info(format!(
                    "Stage {}: accepted {orientation} indexes ({:.1}% undetermined)",
                    Stage::DemuxCheck,
                    ratio * 100.0
                )),
                probe::Outcome::Rejected => self.log.info(format!(
                    "Stage {}: no orientation demultiplexes the run; sharing raw data",
                    Stage::DemuxCheck
                )),
            }
        }

        let mode = if status.get(Stage::DemuxCheck) {
            Mode::Converted
        } else {
            Mode::Raw
        };

        // The probe may have promoted another orientation.
        let sheet = if mode == Mode::Converted {
            self.read_sample_sheet(&sheet_path)?
        } else {
            sheet
        };

        match mode {
            Mode::Converted if status.get(Stage::Conversion) => self.skip(Stage::Conversion),
            Mode::Converted => {
                self.log.info(format!("Stage {}: started", Stage::Conversion));

                conversion::convert(
                    self.run,
                    &sheet_path,
                    config,
                    tools.demultiplexer.as_ref(),
                    tools.stats.as_ref(),
                    self.log,
                )
                .map_err(|err| self.fail(conversion_kind(&err), err))?;

                self.save(&mut status, Stage::Conversion, true)?;
                self.log.info(format!("Stage {}: complete", Stage::Conversion));
            }
            Mode::Raw if status.get(Stage::TransferCloud) && status.get(Stage::TransferHpc) => {
                debug!(run = %self.run, "raw statistics are no longer needed");
            }
            Mode::Raw => {
                self.log.info("Generating statistics from the raw data");

                conversion::generate_statistics(self.run, config, tools.stats.as_ref(), self.log)
                    .map_err(|err| self.fail(conversion_kind(&err), err))?;
            }
        }

        self.transfer(&mut status, Stage::TransferCloud, || {
            cloud::share(
                self.run,
                &sheet,
                mode,
                config,
                tools.cloud.as_ref(),
                self.log,
            )
        })?;

        self.transfer(&mut status, Stage::TransferHpc, || {
            hpc::mirror(
                self.run,
                &self.projects,
                mode,
                config,
                tools.lims.as_ref(),
                tools.hpc.as_ref(),
                self.log,
            )
        })?;

        self.transfer(&mut status, Stage::Archive, || {
            archive::mirror(self.run, config, tools.archive.as_ref(), self.log)
        })?;

        Ok(mode)
    }

    /// Finds the sample sheet, recovering it from an alternate file name or
    /// the LIMS into the canonical location if needed.
    fn locate_sample_sheet(&self) -> Result<PathBuf> {
        let config = &self.context.config.sample_sheet;
        let canonical = self.run.path(&config.canonical);

        if canonical.is_file() {
            return Ok(canonical);
        }

        let io_error = |err: io::Error| {
            self.fail(
                Kind::Io,
                format!("unable to write {}: {err}", canonical.display()),
            )
        };

        for alternate in &config.alternates {
            let path = self.run.path(alternate);

            if path.is_file() {
                fs::copy(&path, &canonical).map_err(io_error)?;
                self.log
                    .info(format!("Note : Using alternate sample sheet {alternate}"));
                return Ok(canonical);
            }
        }

        match self
            .context
            .tools
            .lims
            .sample_sheet(self.run.flowcell())
        {
            Ok(Some(contents)) => {
                fs::write(&canonical, contents).map_err(io_error)?;
                self.log.info(format!(
                    "Note : Sample sheet for {} retrieved from the LIMS",
                    self.run.flowcell()
                ));
                return Ok(canonical);
            }
            Ok(None) => {}
            Err(err) => self.log.error(format!("Sample sheet lookup failed: {err}")),
        }

        Err(self.fail(
            Kind::MissingInput,
            format!(
                "no sample sheet found in {} (tried `{}` and {} alternate name(s)) or in the LIMS",
                self.run.dir().display(),
                config.canonical,
                config.alternates.len()
            ),
        ))
    }

    /// Reads the sample sheet.
    fn read_sample_sheet(&self, path: &Path) -> Result<SampleSheet> {
        SampleSheet::from_path(path).map_err(|err| {
            let kind = match err {
                sample_sheet::Error::Io(_) => Kind::Io,
                _ => Kind::InvalidInput,
            };

            self.fail(kind, format!("unable to read {}: {err}", path.display()))
        })
    }

    /// Persists a stage flag.
    fn save(&self, status: &mut StatusStore, stage: Stage, value: bool) -> Result<()> {
        status
            .save(stage, value)
            .map_err(|err| self.fail(Kind::Io, format!("unable to save status: {err}")))
    }

    /// Logs that a completed stage is skipped.
    fn skip(&self, stage: Stage) {
        self.log
            .info(format!("Stage {stage}: already complete, skipping"));
    }

    /// Runs a transfer stage unless it has completed, persisting its
    /// outcome either way.
    fn transfer(
        &self,
        status: &mut StatusStore,
        stage: Stage,
        copy: impl FnOnce() -> transfer::Result<()>,
    ) -> Result<()> {
        if status.get(stage) {
            self.skip(stage);
            return Ok(());
        }

        self.log.info(format!("Stage {stage}: started"));

        match copy() {
            Ok(()) => {
                self.save(status, stage, true)?;
                self.log.info(format!("Stage {stage}: complete"));
                Ok(())
            }
            Err(err) => {
                self.save(status, stage, false)?;
                Err(self.fail(transfer_kind(&err), format!("{stage}: {err}")))
            }
        }
    }

    /// The notification sent when a run completes.
    fn success_notification(&self, mode: Mode) -> Notification {
        Notification {
            subject: format!("{}: processing complete", self.run),
            body: format!(
                "Run {} was processed and distributed ({mode} data).\n\nProjects: {}\n",
                self.run,
                list_projects(&self.projects)
            ),
            attachments: vec![self.log.log_path().to_path_buf()],
        }
    }

    /// The notification sent when a run fails.
    fn failure_notification(&self, err: &Error) -> Notification {
        let tail = self.context.config.logging.tail_lines;

        if err.kind() == Kind::StatisticsFailure {
            warn!(
                run = %self.run,
                "statistics failed after a successful demultiplex: output may be unusable"
            );
        }

        Notification {
            subject: format!("{}: processing failed ({})", self.run, err.kind()),
            body: format!(
                "{}\n\nProjects: {}\n\nLast lines of the log:\n{}\n\nLast lines of the error \
                 log:\n{}\n",
                err.message(),
                list_projects(err.projects()),
                self.log.log_tail(tail),
                self.log.error_tail(tail)
            ),
            attachments: vec![
                self.log.log_path().to_path_buf(),
                self.log.error_path().to_path_buf(),
            ],
        }
    }
}
