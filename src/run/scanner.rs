//! Discovery of runs that are ready to be processed.

use std::fs;
use std::io;

use tracing::debug;
use tracing::trace;

use crate::config::Instrument;
use crate::run::Run;

/// Lists the runs under an instrument root that are eligible for processing.
///
/// A directory is eligible when its name is a valid run name, the
/// instrument's "primary analysis complete" marker is present, and none of
/// the run-level markers are. Runs are returned sorted by name.
pub fn eligible_runs(instrument: &Instrument) -> io::Result<Vec<Run>> {
    let mut runs = Vec::new();

    for entry in fs::read_dir(&instrument.root)? {
        let path = entry?.path();

        if !path.is_dir() {
            continue;
        }

        let run = match Run::open(&path) {
            Ok(run) => run,
            Err(err) => {
                trace!("skipping {}: {err}", path.display());
                continue;
            }
        };

        if !run.path(&instrument.complete_marker).exists() {
            trace!("skipping {run}: primary analysis is not complete");
            continue;
        }

        if run.has_marker() {
            trace!("skipping {run}: already claimed or retired");
            continue;
        }

        debug!("{run} is eligible for processing");
        runs.push(run);
    }

    runs.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(runs)
}
