//! Read file naming.

use std::fs;
use std::io;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::checksum;

/// The suffix of read files.
pub const FASTQ_SUFFIX: &str = ".fastq.gz";

/// The demultiplexer's read file naming scheme:
/// `<sample>_S<n>_L<lane>_<R|I><n>_001.fastq.gz`.
static READ_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?<sample>.+?)_(?<rest>S\d+_L\d{3}_[RI]\d_001\.fastq\.gz)$")
        .expect("read file pattern is valid")
});

/// Gets the name a read file should have once it carries the flow cell id,
/// or [`None`] if it already does.
///
/// Names following the demultiplexer's scheme get the flow cell inserted
/// after the sample name; anything else is prefixed with it.
///
/// ```
/// use seqrun::conversion::fastq::with_flowcell;
///
/// assert_eq!(
///     with_flowcell("S1_S1_L001_R1_001.fastq.gz", "AFLOWCELL1").as_deref(),
///     Some("S1_AFLOWCELL1_S1_L001_R1_001.fastq.gz")
/// );
/// assert_eq!(with_flowcell("S1_AFLOWCELL1_S1_L001_R1_001.fastq.gz", "AFLOWCELL1"), None);
/// ```
pub fn with_flowcell(name: &str, flowcell: &str) -> Option<String> {
    if name.contains(flowcell) {
        return None;
    }

    match READ_FILE.captures(name) {
        Some(captures) => Some(format!(
            "{}_{flowcell}_{}",
            &captures["sample"], &captures["rest"]
        )),
        None => Some(format!("{flowcell}_{name}")),
    }
}

/// Renames every read file under `dir` to carry the flow cell id. Returns the
/// number of files renamed.
pub fn inject_flowcell(dir: &Path, flowcell: &str) -> io::Result<usize> {
    let mut renamed = 0;

    for path in checksum::find_files(dir, FASTQ_SUFFIX)? {
        let name = match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => name,
            None => continue,
        };

        if let Some(new_name) = with_flowcell(name, flowcell) {
            trace!("renaming {name} to {new_name}");
            fs::rename(&path, path.with_file_name(new_name))?;
            renamed += 1;
        }
    }

    Ok(renamed)
}

#[cfg(test)]
pub mod tests {
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn test_with_flowcell() {
        assert_eq!(
            with_flowcell("Tumor_A_S12_L002_I1_001.fastq.gz", "HFLOW").as_deref(),
            Some("Tumor_A_HFLOW_S12_L002_I1_001.fastq.gz")
        );
        assert_eq!(
            with_flowcell("reads.fastq.gz", "HFLOW").as_deref(),
            Some("HFLOW_reads.fastq.gz")
        );
        assert_eq!(with_flowcell("HFLOW_reads.fastq.gz", "HFLOW"), None);
    }

    #[test]
    fn test_inject_flowcell() -> io::Result<()> {
        let dir = TempDir::new("fastq")?;
        fs::create_dir_all(dir.path().join("P1"))?;
        fs::write(dir.path().join("P1/S1_S1_L001_R1_001.fastq.gz"), b"")?;
        fs::write(dir.path().join("Undetermined_S0_L001_R1_001.fastq.gz"), b"")?;
        fs::write(dir.path().join("P1/notes.txt"), b"")?;

        assert_eq!(inject_flowcell(dir.path(), "AFLOWCELL1")?, 2);
        assert!(dir.path().join("P1/S1_AFLOWCELL1_S1_L001_R1_001.fastq.gz").exists());
        assert!(
            dir.path()
                .join("Undetermined_AFLOWCELL1_S0_L001_R1_001.fastq.gz")
                .exists()
        );
        assert!(dir.path().join("P1/notes.txt").exists());

        // Renaming is idempotent.
        assert_eq!(inject_flowcell(dir.path(), "AFLOWCELL1")?, 0);

        Ok(())
    }
}
