//! Full conversion of a run and its quality control statistics.

pub mod fastq;

use std::fs;
use std::fs::File;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::checksum;
use crate::config::Config;
use crate::run::Run;
use crate::run_log::RunLog;
use crate::sample_sheet;
use crate::sample_sheet::SampleSheet;
use crate::tools::ConvertRequest;
use crate::tools::Demultiplexer;
use crate::tools::ExitCode;
use crate::tools::StatsReport;
use crate::tools::StatsTool;

/// The name of the read file checksum manifest within the output directory.
pub const CHECKSUM_MANIFEST: &str = "checksums.sha256";

/// The name of the packaged reports within the statistics directory.
pub const REPORTS_ARCHIVE: &str = "Reports.tar.gz";

/// The report directory within the output directory.
const REPORTS_DIR: &str = "Reports";

/// The normalized sample sheet handed to the demultiplexer, within the probe
/// scratch directory.
const CONVERSION_SHEET: &str = "SampleSheet.conversion.csv";

/// An error related to conversion.
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(io::Error),
    /// The sample sheet could not be read or written.
    SampleSheet(sample_sheet::Error),
    /// The demultiplexer exited with a non-zero code.
    Demultiplex(ExitCode),
    /// One or more statistics commands exited with a non-zero code.
    Statistics(Vec<StatsReport>),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::SampleSheet(err) => write!(f, "sample sheet error: {err}"),
            Error::Demultiplex(exit) => write!(f, "demultiplexing exited with code {exit}"),
            Error::Statistics(failed) => {
                let failed = failed
                    .iter()
                    .map(|report| format!("{} ({})", report.name, report.exit))
                    .collect::<Vec<_>>()
                    .join(", ");

                write!(
                    f,
                    "statistics generation failed, so the demultiplexed output is likely \
                     unusable: {failed}"
                )
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

/// Demultiplexes a whole run with its canonical sample sheet, then
/// post-processes the output and generates statistics.
///
/// The demultiplexer is given the [normalized](SampleSheet::normalize)
/// sheet; the canonical sheet itself is never rewritten here. Any previous
/// output is removed first, so an interrupted conversion is simply started
/// over.
pub fn convert(
    run: &Run,
    sheet_path: &Path,
    config: &Config,
    demultiplexer: &dyn Demultiplexer,
    stats: &dyn StatsTool,
    log: &RunLog,
) -> Result<()> {
    let sheet_path = normalized_sheet(run, sheet_path, config)?;

    let output = run.path(&config.conversion.output_dir);
    remove_dir(&output)?;

    log.info(format!("Demultiplexing into {}", output.display()));
    let exit = demultiplexer.convert(&ConvertRequest {
        input: run.dir(),
        output: &output,
        sample_sheet: &sheet_path,
        first_tile_only: false,
    })?;

    if !exit.success() {
        return Err(Error::Demultiplex(exit));
    }

    let renamed = fastq::inject_flowcell(&output, run.flowcell())?;
    log.info(format!("Added the flow cell id to {renamed} read file(s)"));

    let reads = checksum::find_files(&output, fastq::FASTQ_SUFFIX)?;
    checksum::write_manifest(&output.join(CHECKSUM_MANIFEST), &output, &reads)?;
    log.info(format!("Wrote checksums for {} read file(s)", reads.len()));

    let stats_dir = run.path(&config.conversion.stats_dir);
    fs::create_dir_all(&stats_dir)?;

    let reports = output.join(REPORTS_DIR);
    if reports.is_dir() {
        package(&reports, REPORTS_DIR, &stats_dir.join(REPORTS_ARCHIVE))?;
    }

    generate_statistics(run, config, stats, log)?;
    Ok(())
}

/// Gets the sheet to demultiplex with: the canonical sheet when it needs no
/// cleanup, otherwise a normalized copy in the scratch directory.
fn normalized_sheet(run: &Run, sheet_path: &Path, config: &Config) -> Result<PathBuf> {
    let mut sheet = SampleSheet::from_path(sheet_path)?;
    if !sheet.normalize() {
        return Ok(sheet_path.to_path_buf());
    }

    let scratch = run.path(&config.probe.scratch_dir);
    fs::create_dir_all(&scratch)?;

    let normalized = scratch.join(CONVERSION_SHEET);
    sheet.write_to(&normalized)?;
    Ok(normalized)
}

/// Generates the statistics of a run into its statistics directory.
///
/// Every command runs; if any of them exited with a non-zero code, the
/// failing reports are returned as an error.
pub fn generate_statistics(
    run: &Run,
    config: &Config,
    stats: &dyn StatsTool,
    log: &RunLog,
) -> Result<Vec<StatsReport>> {
    let stats_dir = run.path(&config.conversion.stats_dir);
    fs::create_dir_all(&stats_dir)?;

    let reports = stats.generate(run.dir(), &stats_dir)?;

    let failed = reports
        .iter()
        .filter(|report| !report.exit.success())
        .cloned()
        .collect::<Vec<_>>();

    for report in &reports {
        log.info(format!("Statistics `{}`: exit code {}", report.name, report.exit));
    }

    if !failed.is_empty() {
        return Err(Error::Statistics(failed));
    }

    Ok(reports)
}

/// Packages a directory into a gzipped tarball, rooted at `name`.
pub fn package(dir: &Path, name: &str, archive: &Path) -> io::Result<()> {
    let encoder = GzEncoder::new(File::create(archive)?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(name, dir)?;

    let file = builder.into_inner()?.finish()?;
    file.sync_all()
}

/// Removes a directory tree if it exists.
pub(crate) fn remove_dir(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

#[cfg(test)]
pub mod tests {
    use flate2::read::GzDecoder;
    use tempdir::TempDir;

    use super::*;
    use crate::config::LoggingConfig;
    use crate::tools::fake::FakeDemux;
    use crate::tools::fake::FakeStats;

    const SHEET: &str = "[Data]\nSample_ID,index,index2,Sample_Project\n\
                         S1,ACGT,AACC,P1\n\
                         S2,TTGA,GGTT,P2\n";

    fn setup() -> std::result::Result<(TempDir, Run, RunLog), Box<dyn std::error::Error>> {
        let root = TempDir::new("conversion")?;
        let dir = root.path().join("RUNX_2024-01-01_0001_AFLOWCELL1");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("SampleSheet.csv"), SHEET)?;

        let run = Run::open(&dir)?;
        let log = RunLog::new(&run, &LoggingConfig::default());
        Ok((root, run, log))
    }

    #[test]
    fn test_convert() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let (_root, run, log) = setup()?;
        let config = Config::default();
        let demux = FakeDemux::default();
        let stats = FakeStats::default();

        convert(
            &run,
            &run.path("SampleSheet.csv"),
            &config,
            &demux,
            &stats,
            &log,
        )?;

        let calls = demux.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].first_tile_only);

        let output = run.path("Unaligned");
        assert!(
            output
                .join("P1/S1_AFLOWCELL1_S1_L001_R1_001.fastq.gz")
                .exists()
        );

        let manifest = fs::read_to_string(output.join(CHECKSUM_MANIFEST))?;
        assert_eq!(manifest.lines().count(), 3);
        assert!(manifest.contains("  P2/S2_AFLOWCELL1_S2_L001_R1_001.fastq.gz\n"));

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(
            run.path("Stats").join(REPORTS_ARCHIVE),
        )?));
        let mut names = Vec::new();
        for entry in archive.entries()? {
            names.push(entry?.path()?.display().to_string());
        }
        assert!(names.contains(&String::from("Reports/Demultiplex_Stats.csv")));

        assert_eq!(stats.calls.get(), 1);
        assert!(run.path("Stats/summary.txt").exists());

        Ok(())
    }

    #[test]
    fn test_unknown_bases_are_stripped_for_demultiplexing()
    -> std::result::Result<(), Box<dyn std::error::Error>> {
        let (_root, run, log) = setup()?;
        let submitted = "[Data]\nSample_ID,index,index2,Sample_Project\n\
                         S1,ACGTN,AACC,P1\n\
                         S2,TTGA,GGTT,P2\n";
        fs::write(run.path("SampleSheet.csv"), submitted)?;
        let demux = FakeDemux::default();

        convert(
            &run,
            &run.path("SampleSheet.csv"),
            &Config::default(),
            &demux,
            &FakeStats::default(),
            &log,
        )?;

        assert_eq!(demux.calls.borrow()[0].sheet, SHEET);
        assert_eq!(fs::read_to_string(run.path("SampleSheet.csv"))?, submitted);

        Ok(())
    }

    #[test]
    fn test_demultiplex_failure() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let (_root, run, log) = setup()?;
        let demux = FakeDemux::default();
        demux.full_exit.set(ExitCode::new(1));
        let stats = FakeStats::default();

        let err = convert(
            &run,
            &run.path("SampleSheet.csv"),
            &Config::default(),
            &demux,
            &stats,
            &log,
        )
        .unwrap_err();

        assert!(matches!(err, Error::Demultiplex(exit) if exit == ExitCode::new(1)));
        assert_eq!(stats.calls.get(), 0);
        Ok(())
    }

    #[test]
    fn test_statistics_failure() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let (_root, run, log) = setup()?;
        let demux = FakeDemux::default();
        let stats = FakeStats::failing("plot_qscore_heatmap", 1);

        let err = convert(
            &run,
            &run.path("SampleSheet.csv"),
            &Config::default(),
            &demux,
            &stats,
            &log,
        )
        .unwrap_err();

        match err {
            Error::Statistics(failed) => {
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].name, "plot_qscore_heatmap");
            }
            err => panic!("unexpected error: {err}"),
        }

        // The other reports were still generated.
        assert!(run.path("Stats/plot_by_lane.txt").exists());
        Ok(())
    }

    #[test]
    fn test_stale_output_is_removed() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let (_root, run, log) = setup()?;
        let stale = run.path("Unaligned/P9/old_S1_L001_R1_001.fastq.gz");
        fs::create_dir_all(stale.parent().ok_or("no parent")?)?;
        fs::write(&stale, b"")?;

        convert(
            &run,
            &run.path("SampleSheet.csv"),
            &Config::default(),
            &FakeDemux::default(),
            &FakeStats::default(),
            &log,
        )?;

        assert!(!stale.exists());
        Ok(())
    }
}
