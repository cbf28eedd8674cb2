//! Sharing project data with its owners.
//!
//! Every destination project gets its own staging directory, packaged,
//! checksummed, and copied to `<destination>/<project>/`. A sentinel file is
//! copied last, so the owner can tell a complete share from one in progress.
//!
//! Shared reports are cut down to the rows of the project's own samples
//! before they leave the building. A raw share holds the run without its
//! demultiplexing output, statistics, sample sheets, or logs; each project
//! gets its own sample sheet and statistics next to it instead.

use std::collections::HashSet;
use std::fs;
use std::fs::File;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;

use crate::checksum;
use crate::config::Config;
use crate::conversion;
use crate::conversion::fastq::FASTQ_SUFFIX;
use crate::probe::SUBMITTED_SHEET;
use crate::reports;
use crate::run::Run;
use crate::run_log::RunLog;
use crate::sample_sheet::SampleSheet;
use crate::tools::CopyRequest;
use crate::tools::Transfer;
use crate::transfer::Mode;
use crate::transfer::Result;
use crate::transfer::copy;
use crate::transfer::remote_dir;

/// The directory, within the staging directory, holding per-project
/// sentinels.
const SENTINELS_DIR: &str = ".sentinels";

/// The directory, within a raw share, holding the project's statistics.
const SHARED_STATS_DIR: &str = "Stats";

/// Shares every destination project of a run.
///
/// Projects are handled one after the other; the first failure stops the
/// share.
pub fn share(
    run: &Run,
    sheet: &SampleSheet,
    mode: Mode,
    config: &Config,
    transfer: &dyn Transfer,
    log: &RunLog,
) -> Result<()> {
    let projects = sheet.projects();
    if projects.is_empty() {
        log.info("No destination projects in the sample sheet: nothing to share");
        return Ok(());
    }

    let staging_root = run.path(&config.cloud.staging_dir);
    fs::create_dir_all(&staging_root)?;

    let run_archive = match mode {
        Mode::Raw => Some(package_run(run, config, &staging_root)?),
        Mode::Converted => None,
    };

    for project in &projects {
        let staging = staging_root.join(project);
        conversion::remove_dir(&staging)?;
        fs::create_dir_all(&staging)?;

        match &run_archive {
            Some(archive) => {
                link_or_copy(archive, &staging)?;
                share_run_metadata(run, sheet, project, config, &staging)?;
            }
            None => package_samples(run, sheet, project, config, &staging, log)?,
        }

        share_reports(run, sheet, project, config, &staging)?;

        let files = checksum::walk_files(&staging, |_| false, |_| true)?;
        checksum::write_manifest(&staging.join(format!("{project}.sha256")), &staging, &files)?;

        let destination = remote_dir(&config.cloud.destination, project);
        copy(
            transfer,
            CopyRequest {
                sources: vec![staging.clone()],
                destination: destination.clone(),
                excludes: Vec::new(),
            },
        )?;

        let sentinel = write_sentinel(run, &staging_root, project, &config.cloud.sentinel)?;
        copy(
            transfer,
            CopyRequest {
                sources: vec![sentinel],
                destination: destination.clone(),
                excludes: Vec::new(),
            },
        )?;

        log.info(format!(
            "Shared {} file(s) of project {project} ({mode}) to {destination}",
            files.len()
        ));
    }

    Ok(())
}

/// Packages the read files of every sample of a project, one uncompressed
/// tarball per sample.
fn package_samples(
    run: &Run,
    sheet: &SampleSheet,
    project: &str,
    config: &Config,
    staging: &Path,
    log: &RunLog,
) -> io::Result<()> {
    let reads = checksum::find_files(&run.path(&config.conversion.output_dir), FASTQ_SUFFIX)?;

    for sample in sheet.samples_for_project(project) {
        let prefix = format!("{sample}_{}_", run.flowcell());
        let files = reads
            .iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix))
            })
            .collect::<Vec<_>>();

        if files.is_empty() {
            log.error(format!("No read files found for sample {sample} of project {project}"));
            continue;
        }

        let mut builder = tar::Builder::new(File::create(staging.join(format!("{sample}.tar")))?);
        for file in &files {
            let name = Path::new(sample).join(file.file_name().unwrap_or_default());
            builder.append_path_with_name(file, name)?;
        }
        builder.into_inner()?.sync_all()?;

        debug!("packaged {} read file(s) of {sample}", files.len());
    }

    Ok(())
}

/// Packages the whole run into one uncompressed tarball within the staging
/// directory.
///
/// Everything the pipeline produced is left out: the scratch, output, and
/// statistics directories hold every project's per-sample metrics, and the
/// sample sheets and run logs name every project's samples. Read files and
/// prior archives are left out too.
fn package_run(run: &Run, config: &Config, staging_root: &Path) -> io::Result<PathBuf> {
    let pruned = [
        staging_root.to_path_buf(),
        run.path(&config.probe.scratch_dir),
        run.path(&config.conversion.output_dir),
        run.path(&config.conversion.stats_dir),
    ];

    let mut withheld = vec![
        run.path(&config.sample_sheet.canonical),
        run.path(SUBMITTED_SHEET),
        run.path(&config.logging.log_file),
        run.path(&config.logging.error_file),
    ];
    withheld.extend(config.sample_sheet.alternates.iter().map(|name| run.path(name)));

    let files = checksum::walk_files(
        run.dir(),
        |dir| pruned.iter().any(|path| path == dir),
        |file| {
            !withheld.iter().any(|path| path == file)
                && !checksum::has_suffix(file, FASTQ_SUFFIX)
                && !checksum::has_suffix(file, ".tar")
                && !checksum::has_suffix(file, ".tar.gz")
        },
    )?;

    let archive = staging_root.join(format!("{run}.tar"));
    let mut builder = tar::Builder::new(File::create(&archive)?);

    for file in &files {
        let relative = file.strip_prefix(run.dir()).unwrap_or(file);
        builder.append_path_with_name(file, Path::new(&run.to_string()).join(relative))?;
    }

    builder.into_inner()?.sync_all()?;
    debug!("packaged {} file(s) of {run}", files.len());

    Ok(archive)
}

/// Writes what a raw share withholds from the run tarball, cut down to one
/// project: the project's own sample sheet and its statistics.
fn share_run_metadata(
    run: &Run,
    sheet: &SampleSheet,
    project: &str,
    config: &Config,
    staging: &Path,
) -> io::Result<()> {
    if let Some(own) = sheet.for_project(project) {
        fs::write(staging.join(&config.sample_sheet.canonical), own.to_string())?;
    }

    let stats_dir = run.path(&config.conversion.stats_dir);
    if !stats_dir.is_dir() {
        return Ok(());
    }

    let samples = sheet.samples_for_project(project).collect::<HashSet<_>>();
    let files = checksum::walk_files(&stats_dir, |_| false, |file| {
        !checksum::has_suffix(file, ".tar.gz")
    })?;

    for file in &files {
        let relative = file.strip_prefix(&stats_dir).unwrap_or(file);
        let target = staging.join(SHARED_STATS_DIR).join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        if checksum::has_suffix(file, ".csv") {
            let report = fs::read_to_string(file)?;
            fs::write(&target, reports::filter_by_samples(&report, &samples))?;
        } else {
            fs::copy(file, &target)?;
        }
    }

    Ok(())
}

/// Places a file within a directory, hard linking when possible.
fn link_or_copy(file: &Path, dir: &Path) -> io::Result<()> {
    let target = dir.join(file.file_name().unwrap_or_default());

    if fs::hard_link(file, &target).is_err() {
        fs::copy(file, &target)?;
    }

    Ok(())
}

/// Writes the configured shared reports, filtered to a project's samples.
fn share_reports(
    run: &Run,
    sheet: &SampleSheet,
    project: &str,
    config: &Config,
    staging: &Path,
) -> io::Result<()> {
    let samples = sheet.samples_for_project(project).collect::<HashSet<_>>();
    let output = run.path(&config.conversion.output_dir);

    for relative in &config.cloud.shared_reports {
        let path = output.join(relative);
        if !path.is_file() {
            continue;
        }

        let report = fs::read_to_string(&path)?;
        let name = path.file_name().unwrap_or_default();
        fs::write(staging.join(name), reports::filter_by_samples(&report, &samples))?;
    }

    Ok(())
}

/// Writes the sentinel of a project outside of its staging directory.
fn write_sentinel(run: &Run, staging_root: &Path, project: &str, name: &str) -> io::Result<PathBuf> {
    let dir = staging_root.join(SENTINELS_DIR).join(project);
    fs::create_dir_all(&dir)?;

    let sentinel = dir.join(name);
    fs::write(
        &sentinel,
        format!("{run}\n{}\n", chrono::Local::now().to_rfc3339()),
    )?;

    Ok(sentinel)
}
