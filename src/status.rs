//! Persisted per-run stage completion.
//!
//! The status record lives at [`STATUS_FILE`] within the run directory and
//! is rewritten in full after every stage transition. Writes go to a
//! temporary sibling file that is then renamed over the record, so a crash
//! can never leave a partially written record behind.
//!
//! Stage flags only ever move from `false` to `true`. A stage that crashed
//! midway is simply still `false`, and is retried from the start on the next
//! invocation.

use std::fs;
use std::io;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

/// The name of the status record within a run directory.
pub const STATUS_FILE: &str = "pipeline_status.json";

/// An error related to the status record.
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(io::Error),
    /// The record could not be (de)serialized.
    Json(serde_json::Error),
    /// An attempt was made to reset a completed stage.
    Regression(Stage),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::Json(err) => write!(f, "json error: {err}"),
            Error::Regression(stage) => {
                write!(f, "stage `{stage}` is complete and cannot be reset")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A pipeline stage with a persisted completion flag.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Stage {
    /// The demultiplexing feasibility probe accepted an orientation.
    DemuxCheck,
    /// Reads were converted and statistics generated.
    Conversion,
    /// Results were shared with every project via the cloud.
    TransferCloud,
    /// Results were mirrored to the HPC cluster.
    TransferHpc,
    /// The run was mirrored to the archive.
    Archive,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 5] = [
        Stage::DemuxCheck,
        Stage::Conversion,
        Stage::TransferCloud,
        Stage::TransferHpc,
        Stage::Archive,
    ];
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::DemuxCheck => write!(f, "DemuxCheck"),
            Stage::Conversion => write!(f, "Conversion"),
            Stage::TransferCloud => write!(f, "TransferCloud"),
            Stage::TransferHpc => write!(f, "TransferHPC"),
            Stage::Archive => write!(f, "Archive"),
        }
    }
}

/// The completion flags for a run.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct StatusRecord {
    /// Whether the feasibility probe accepted an orientation.
    #[serde(rename = "DemuxCheck", default)]
    demux_check: bool,
    /// Whether the feasibility probe has been run at all.
    ///
    /// This distinguishes "not yet probed" from "probed and rejected" so that
    /// a rejected run keeps taking the raw branch on resume.
    #[serde(rename = "DemuxProbed", default)]
    demux_probed: bool,
    /// Whether conversion completed.
    #[serde(rename = "Conversion", default)]
    conversion: bool,
    /// Whether the cloud transfer completed.
    #[serde(rename = "TransferCloud", default)]
    transfer_cloud: bool,
    /// Whether the HPC transfer completed.
    #[serde(rename = "TransferHPC", default)]
    transfer_hpc: bool,
    /// Whether archiving completed.
    #[serde(rename = "Archive", default)]
    archive: bool,
}

impl StatusRecord {
    /// Gets the flag for a stage.
    pub fn get(&self, stage: Stage) -> bool {
        match stage {
            Stage::DemuxCheck => self.demux_check,
            Stage::Conversion => self.conversion,
            Stage::TransferCloud => self.transfer_cloud,
            Stage::TransferHpc => self.transfer_hpc,
            Stage::Archive => self.archive,
        }
    }

    /// Whether the feasibility probe has already been run.
    pub fn is_probed(&self) -> bool {
        self.demux_probed || self.demux_check
    }

    /// Gets a mutable reference to the flag for a stage.
    fn flag_mut(&mut self, stage: Stage) -> &mut bool {
        match stage {
            Stage::DemuxCheck => &mut self.demux_check,
            Stage::Conversion => &mut self.conversion,
            Stage::TransferCloud => &mut self.transfer_cloud,
            Stage::TransferHpc => &mut self.transfer_hpc,
            Stage::Archive => &mut self.archive,
        }
    }
}

/// The persisted status record of one run.
#[derive(Debug)]
pub struct StatusStore {
    /// The path to the record.
    path: PathBuf,
    /// The in-memory copy of the record.
    record: StatusRecord,
}

impl StatusStore {
    /// Loads the record for a run, or a fresh record with every stage
    /// incomplete if none has been persisted.
    pub fn load(run_dir: &Path) -> Result<Self> {
        let path = run_dir.join(STATUS_FILE);

        let record = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(Error::Json)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => StatusRecord::default(),
            Err(err) => return Err(Error::Io(err)),
        };

        Ok(Self { path, record })
    }

    /// Gets the current record.
    pub fn record(&self) -> &StatusRecord {
        &self.record
    }

    /// Gets the flag for a stage.
    pub fn get(&self, stage: Stage) -> bool {
        self.record.get(stage)
    }

    /// Sets the flag for a stage and persists the whole record.
    ///
    /// Setting a flag to `false` persists an explicit failure; it is an error
    /// to reset a stage that is already complete.
    pub fn save(&mut self, stage: Stage, value: bool) -> Result<()> {
        if self.record.get(stage) && !value {
            return Err(Error::Regression(stage));
        }

        *self.record.flag_mut(stage) = value;

        // Accepting an orientation implies the probe ran.
        if stage == Stage::DemuxCheck {
            self.record.demux_probed = true;
        }

        debug!(path = %self.path.display(), %stage, value, "saving status record");
        self.persist()
    }

    /// Writes the record to a temporary file and renames it into place.
    fn persist(&self) -> Result<()> {
        let contents = serde_json::to_vec_pretty(&self.record).map_err(Error::Json)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = fs::File::create(&tmp).map_err(Error::Io)?;
        file.write_all(&contents).map_err(Error::Io)?;
        file.sync_all().map_err(Error::Io)?;

        fs::rename(&tmp, &self.path).map_err(Error::Io)
    }
}
