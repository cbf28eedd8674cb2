//! Mirroring a whole run to long-term storage.

use crate::config::Config;
use crate::run::Run;
use crate::run_log::RunLog;
use crate::tools::CopyRequest;
use crate::tools::Transfer;
use crate::transfer::Result;
use crate::transfer::copy;

/// Builds the archive request for a run.
///
/// The run directory is copied as a whole into the destination, minus the
/// configured exclusions and the cloud-share staging directory.
pub fn request(run: &Run, config: &Config) -> CopyRequest {
    let mut excludes = config.archive.excludes.clone();
    excludes.push(format!("/{run}/{}/", config.cloud.staging_dir));

    CopyRequest {
        sources: vec![run.dir().to_path_buf()],
        destination: format!("{}/", config.archive.destination.trim_end_matches('/')),
        excludes,
    }
}

/// Mirrors a run to the archive.
pub fn mirror(run: &Run, config: &Config, transfer: &dyn Transfer, log: &RunLog) -> Result<()> {
    let request = request(run, config);
    let destination = request.destination.clone();

    copy(transfer, request)?;
    log.info(format!("Archived to {destination}"));

    Ok(())
}

#[cfg(test)]
pub mod tests {
    use std::fs;

    use tempdir::TempDir;

    use super::*;
    use crate::config::ArchiveConfig;

    #[test]
    fn test_request() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let root = TempDir::new("archive")?;
        let dir = root.path().join("RUNX_2024-01-01_0001_AFLOWCELL1");
        fs::create_dir_all(&dir)?;
        let run = Run::open(&dir)?;

        let config = Config {
            archive: ArchiveConfig {
                destination: String::from("archive:/sequencing/"),
                ..Default::default()
            },
            ..Default::default()
        };

        let request = request(&run, &config);
        assert_eq!(request.sources, vec![dir]);
        assert_eq!(request.destination, "archive:/sequencing/");
        assert_eq!(
            request.excludes,
            vec![
                "*.fastq.gz",
                "/RUNX_2024-01-01_0001_AFLOWCELL1/Transfer/"
            ]
        );

        Ok(())
    }
}
