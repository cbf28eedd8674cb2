//! Daemon configuration via `seqrun.toml`.
//!
//! Every field has a default, so an empty file (or [`Config::default()`]) is
//! a valid configuration apart from the instrument roots.
//!
//! ```toml
//! [[instruments]]
//! root = "/data/novaseq"
//! complete_marker = "CopyComplete.txt"
//!
//! [probe]
//! undetermined_threshold = 0.40
//! first_tile_only = true
//!
//! [cloud]
//! destination = "share:"
//!
//! [hpc]
//! destination = "hpc.example.org:/seq/runs"
//!
//! [archive]
//! destination = "archive.example.org:/runs"
//! ```

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// An error related to loading a configuration.
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(io::Error),
    /// The document could not be deserialized.
    Parse(toml::de::Error),
    /// The configuration is well-formed but not usable.
    Invalid(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::Parse(err) => write!(f, "parse error: {err}"),
            Error::Invalid(reason) => write!(f, "invalid configuration: {reason}"),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// An instrument output root that is scanned for runs.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Instrument {
    /// The directory containing one subdirectory per run.
    pub root: PathBuf,
    /// The file the instrument writes once primary analysis is complete.
    #[serde(default = "default_complete_marker")]
    pub complete_marker: String,
}

/// The marker written by most instruments.
fn default_complete_marker() -> String {
    String::from("CopyComplete.txt")
}

/// Where sample sheets are found within a run.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SampleSheetConfig {
    /// The canonical sample sheet file name.
    pub canonical: String,
    /// Alternate file names tried (in order) when the canonical file is
    /// missing.
    pub alternates: Vec<String>,
}

impl Default for SampleSheetConfig {
    fn default() -> Self {
        Self {
            canonical: String::from("SampleSheet.csv"),
            alternates: vec![
                String::from("SampleSheet.txt"),
                String::from("samplesheet.csv"),
                String::from("Samplesheet.csv"),
                String::from("sample_sheet.csv"),
            ],
        }
    }
}

/// The demultiplexing feasibility probe.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    /// The undetermined read ratio below which an orientation is accepted.
    pub undetermined_threshold: f64,
    /// Whether the probe only demultiplexes the first tile.
    pub first_tile_only: bool,
    /// The scratch directory (relative to the run) used by the probe.
    pub scratch_dir: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            undetermined_threshold: 0.40,
            first_tile_only: true,
            scratch_dir: String::from("DemuxCheck"),
        }
    }
}

/// The demultiplexing tool and the conversion outputs.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ConversionConfig {
    /// The demultiplexing program.
    pub program: String,
    /// Extra arguments appended to every invocation.
    pub args: Vec<String>,
    /// The output directory (relative to the run).
    pub output_dir: String,
    /// The statistics directory (relative to the run).
    pub stats_dir: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            program: String::from("bcl-convert"),
            args: vec![String::from("--force")],
            output_dir: String::from("Unaligned"),
            stats_dir: String::from("Stats"),
        }
    }
}

/// A single statistics command.
///
/// The run directory is appended as the last argument and standard output is
/// written to `output` within the statistics directory.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct StatsCommand {
    /// A short name for the command.
    pub name: String,
    /// The program.
    pub program: String,
    /// Arguments preceding the run directory.
    #[serde(default)]
    pub args: Vec<String>,
    /// The output file name.
    pub output: String,
}

impl StatsCommand {
    /// Creates a statistics command.
    fn new(name: &str, args: &[&str], output: &str) -> Self {
        Self {
            name: name.to_string(),
            program: name.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            output: output.to_string(),
        }
    }
}

/// The statistics tools run after conversion.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StatsConfig {
    /// The commands, run in order.
    pub commands: Vec<StatsCommand>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            commands: vec![
                StatsCommand::new("summary", &["--csv=1"], "summary.csv"),
                StatsCommand::new("index-summary", &["--csv=1"], "index-summary.csv"),
                StatsCommand::new("plot_by_cycle", &[], "by_cycle.gnuplot"),
                StatsCommand::new("plot_by_lane", &[], "by_lane.gnuplot"),
                StatsCommand::new("plot_flowcell", &[], "flowcell.gnuplot"),
                StatsCommand::new("plot_qscore_histogram", &[], "qscore_histogram.gnuplot"),
                StatsCommand::new("plot_qscore_heatmap", &[], "qscore_heatmap.gnuplot"),
            ],
        }
    }
}

/// The cloud-share destination.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CloudConfig {
    /// The copy program.
    pub program: String,
    /// Arguments preceding the filters, sources, and destination.
    pub args: Vec<String>,
    /// The remote destination root.
    pub destination: String,
    /// The local staging directory (relative to the run).
    pub staging_dir: String,
    /// Report files (relative to the conversion output) filtered per
    /// project before sharing.
    pub shared_reports: Vec<String>,
    /// The sentinel file written remotely once a project is complete.
    pub sentinel: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            program: String::from("rclone"),
            args: vec![String::from("copy")],
            destination: String::new(),
            staging_dir: String::from("Transfer"),
            shared_reports: vec![
                String::from("Reports/Demultiplex_Stats.csv"),
                String::from("Reports/Quality_Metrics.csv"),
            ],
            sentinel: String::from("transfer_complete.txt"),
        }
    }
}

/// The HPC destination.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HpcConfig {
    /// The copy program.
    pub program: String,
    /// Arguments preceding the filters, sources, and destination.
    pub args: Vec<String>,
    /// The remote destination root.
    pub destination: String,
    /// Run metadata files (relative to the run) always mirrored.
    pub metadata: Vec<String>,
    /// Analysis plans that mean "raw reads only" (matched case
    /// insensitively).
    pub raw_only_plans: Vec<String>,
}

impl Default for HpcConfig {
    fn default() -> Self {
        Self {
            program: String::from("rsync"),
            args: vec![
                String::from("-rLt"),
                String::from("--relative"),
                String::from("--ignore-existing"),
            ],
            destination: String::new(),
            metadata: vec![
                String::from("RunInfo.xml"),
                String::from("RunParameters.xml"),
            ],
            raw_only_plans: vec![String::from("Raw data (FASTQ)"), String::from("Raw data")],
        }
    }
}

/// The long-term archive destination.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ArchiveConfig {
    /// The copy program.
    pub program: String,
    /// Arguments preceding the filters, sources, and destination.
    pub args: Vec<String>,
    /// The remote destination root.
    pub destination: String,
    /// Glob patterns excluded from the archive.
    pub excludes: Vec<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            program: String::from("rsync"),
            args: vec![String::from("-rLt")],
            destination: String::new(),
            excludes: vec![String::from("*.fastq.gz")],
        }
    }
}

/// The laboratory information management system.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LimsConfig {
    /// The base URL of the LIMS API. No LIMS is consulted when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// The request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LimsConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 30,
        }
    }
}

/// The notification channel.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NotifyConfig {
    /// The mail program; the body is written to its standard input.
    pub program: String,
    /// Arguments; `{subject}` is replaced with the subject.
    pub args: Vec<String>,
    /// The flag preceding each attachment path.
    pub attachment_flag: String,
    /// The recipients, appended after all other arguments.
    pub recipients: Vec<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            program: String::from("mail"),
            args: vec![String::from("-s"), String::from("{subject}")],
            attachment_flag: String::from("-A"),
            recipients: Vec::new(),
        }
    }
}

/// The per-run log files.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// The per-run log file name.
    pub log_file: String,
    /// The per-run error file name.
    pub error_file: String,
    /// The number of trailing lines included in failure notifications.
    pub tail_lines: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: String::from("pipeline.log"),
            error_file: String::from("pipeline.err"),
            tail_lines: 20,
        }
    }
}

/// The daemon configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// The instrument roots to scan.
    pub instruments: Vec<Instrument>,
    /// Sample sheet discovery.
    pub sample_sheet: SampleSheetConfig,
    /// The feasibility probe.
    pub probe: ProbeConfig,
    /// Conversion.
    pub conversion: ConversionConfig,
    /// Statistics.
    pub stats: StatsConfig,
    /// The cloud-share destination.
    pub cloud: CloudConfig,
    /// The HPC destination.
    pub hpc: HpcConfig,
    /// The archive destination.
    pub archive: ArchiveConfig,
    /// The LIMS.
    pub lims: LimsConfig,
    /// Notifications.
    pub notify: NotifyConfig,
    /// Per-run logs.
    pub logging: LoggingConfig,
}

impl Config {
    /// Reads and validates a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(Error::Io)?;
        let config = toml::from_str::<Config>(&contents).map_err(Error::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.probe.undetermined_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::Invalid(format!(
                "`probe.undetermined_threshold` must be within (0, 1], found {threshold}"
            )));
        }

        if self.instruments.is_empty() {
            return Err(Error::Invalid(String::from(
                "at least one `[[instruments]]` root is required",
            )));
        }

        if let Some(instrument) = self
            .instruments
            .iter()
            .find(|instrument| instrument.root.as_os_str().is_empty())
        {
            return Err(Error::Invalid(format!(
                "instrument root is empty (marker `{}`)",
                instrument.complete_marker
            )));
        }

        for (name, destination) in [
            ("cloud", &self.cloud.destination),
            ("hpc", &self.hpc.destination),
            ("archive", &self.archive.destination),
        ] {
            if destination.is_empty() {
                return Err(Error::Invalid(format!(
                    "`{name}.destination` must not be empty"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    const CONFIG: &str = r#"
[[instruments]]
root = "/data/novaseq"

[[instruments]]
root = "/data/miseq"
complete_marker = "RTAComplete.txt"

[probe]
undetermined_threshold = 0.25

[cloud]
destination = "share:"

[hpc]
destination = "hpc:/seq"
raw_only_plans = ["Raw"]

[archive]
program = "rsync"
args = ["-a"]
destination = "archive:/runs"
"#;

    #[test]
    fn test_parse_config() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let config = toml::from_str::<Config>(CONFIG)?;
        config.validate()?;

        assert_eq!(config.instruments.len(), 2);
        assert_eq!(config.instruments[0].complete_marker, "CopyComplete.txt");
        assert_eq!(config.instruments[1].complete_marker, "RTAComplete.txt");
        assert_eq!(config.probe.undetermined_threshold, 0.25);
        assert!(config.probe.first_tile_only);
        assert_eq!(config.cloud.program, "rclone");
        assert_eq!(config.hpc.raw_only_plans, vec![String::from("Raw")]);
        assert_eq!(config.archive.args, vec![String::from("-a")]);
        assert_eq!(config.archive.excludes, vec![String::from("*.fastq.gz")]);
        assert_eq!(config.lims.url, None);
        assert_eq!(config.stats.commands.len(), 7);

        Ok(())
    }

    #[test]
    fn test_invalid_threshold() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut config = toml::from_str::<Config>(CONFIG)?;
        config.probe.undetermined_threshold = 1.5;

        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: `probe.undetermined_threshold` must be within (0, 1], found \
             1.5"
        );

        Ok(())
    }

    #[test]
    fn test_missing_destination() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut config = toml::from_str::<Config>(CONFIG)?;
        config.hpc.destination.clear();

        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: `hpc.destination` must not be empty"
        );

        Ok(())
    }
}
