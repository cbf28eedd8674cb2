//! Mirroring a curated subset of a run to the compute cluster.

use std::path::Path;
use std::path::PathBuf;

use crate::config::Config;
use crate::conversion::CHECKSUM_MANIFEST;
use crate::run::Run;
use crate::run_log::RunLog;
use crate::sample_sheet::ProjectSet;
use crate::tools::CopyRequest;
use crate::tools::Lims;
use crate::tools::Transfer;
use crate::transfer::Error;
use crate::transfer::Mode;
use crate::transfer::Result;
use crate::transfer::copy;
use crate::transfer::remote_dir;

/// The report directory within the conversion output.
const REPORTS_DIR: &str = "Reports";

/// Whether or not an analysis plan asks for raw reads only.
fn is_raw_only(plan: &str, raw_only_plans: &[String]) -> bool {
    raw_only_plans
        .iter()
        .any(|raw| raw.eq_ignore_ascii_case(plan.trim()))
}

/// Lists the paths, relative to the run directory, mirrored for a run.
///
/// Read files are mirrored for every project unless the LIMS says its
/// analysis plan is raw reads only. Paths that do not exist are skipped.
pub fn curate(
    run: &Run,
    projects: &ProjectSet,
    mode: Mode,
    config: &Config,
    lims: &dyn Lims,
    log: &RunLog,
) -> Result<Vec<PathBuf>> {
    let output = Path::new(&config.conversion.output_dir);

    let mut paths = vec![PathBuf::from(&config.sample_sheet.canonical)];
    paths.extend(config.hpc.metadata.iter().map(PathBuf::from));
    paths.push(PathBuf::from(&config.conversion.stats_dir));

    if mode == Mode::Converted {
        paths.push(output.join(REPORTS_DIR));
        paths.push(output.join(CHECKSUM_MANIFEST));

        for project in projects {
            match lims.analysis_plan(project).map_err(Error::Lims)? {
                Some(plan) if is_raw_only(&plan, &config.hpc.raw_only_plans) => {
                    log.info(format!(
                        "Project {project} has analysis plan `{plan}`: not mirroring its reads"
                    ));
                }
                _ => paths.push(output.join(project)),
            }
        }
    }

    paths.retain(|path| run.path(path).exists());
    Ok(paths)
}

/// Mirrors the curated subset of a run to `<destination>/<run>/`.
///
/// Sources are passed as `<run>/./<path>`, so a copy program that honors
/// relative paths recreates them under the destination.
pub fn mirror(
    run: &Run,
    projects: &ProjectSet,
    mode: Mode,
    config: &Config,
    lims: &dyn Lims,
    transfer: &dyn Transfer,
    log: &RunLog,
) -> Result<()> {
    let paths = curate(run, projects, mode, config, lims, log)?;
    let destination = remote_dir(&config.hpc.destination, &run.to_string());

    let sources = paths
        .iter()
        .map(|path| run.dir().join(".").join(path))
        .collect::<Vec<_>>();

    copy(
        transfer,
        CopyRequest {
            sources,
            destination: destination.clone(),
            excludes: Vec::new(),
        },
    )?;

    log.info(format!(
        "Mirrored {} path(s) ({mode}) to {destination}",
        paths.len()
    ));

    Ok(())
}
