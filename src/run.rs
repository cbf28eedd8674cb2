//! Sequencing runs.
//!
//! A run is a directory written by a sequencer whose name is a valid
//! [`RunName`]. The run-level state is encoded by [`Marker`] files at its
//! root, and the stage-level state by the [status
//! record](crate::status::StatusStore).

pub mod marker;
pub mod name;
pub mod scanner;

use std::path::Path;
use std::path::PathBuf;

pub use marker::Claim;
pub use marker::Marker;
pub use name::RunName;

/// An error related to opening a run.
#[derive(Debug)]
pub enum Error {
    /// The path is not a directory.
    NotADirectory(PathBuf),
    /// The directory has no usable file name.
    MissingName(PathBuf),
    /// The directory name is not a valid run name.
    InvalidName(name::ParseError, String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotADirectory(path) => write!(f, "not a directory: {}", path.display()),
            Error::MissingName(path) => {
                write!(f, "directory has no usable name: {}", path.display())
            }
            Error::InvalidName(err, name) => write!(f, "invalid run name `{name}`: {err}"),
        }
    }
}

impl std::error::Error for Error {}

/// A sequencing run directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Run {
    /// The run directory.
    dir: PathBuf,
    /// The parsed directory name.
    name: RunName,
}

impl Run {
    /// Opens a run directory, validating its name.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use seqrun::Run;
    ///
    /// let run = Run::open("/data/novaseq/RUNX_2024-01-01_0001_AFLOWCELL1")?;
    /// assert_eq!(run.flowcell(), "AFLOWCELL1");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();

        if !dir.is_dir() {
            return Err(Error::NotADirectory(dir));
        }

        let name = match dir.file_name().and_then(|name| name.to_str()) {
            Some(name) => name.to_string(),
            None => return Err(Error::MissingName(dir)),
        };

        let name = name
            .parse::<RunName>()
            .map_err(|err| Error::InvalidName(err, name))?;

        Ok(Self { dir, name })
    }

    /// Gets the run directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Gets the parsed run name.
    pub fn name(&self) -> &RunName {
        &self.name
    }

    /// Gets the flow cell id.
    pub fn flowcell(&self) -> &str {
        self.name.flowcell()
    }

    /// Resolves a path relative to the run directory.
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.dir.join(relative)
    }

    /// Whether or not any of the run-level markers is present.
    pub fn has_marker(&self) -> bool {
        Marker::ALL.iter().any(|marker| marker.is_present(&self.dir))
    }
}

impl std::fmt::Display for Run {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
pub mod tests {
    use std::fs;

    use tempdir::TempDir;

    use super::*;

    #[test]
    fn test_open() -> Result<(), Box<dyn std::error::Error>> {
        let root = TempDir::new("run")?;
        let dir = root.path().join("RUNX_2024-01-01_0001_AFLOWCELL1");
        fs::create_dir(&dir)?;

        let run = Run::open(&dir)?;
        assert_eq!(run.to_string(), "RUNX_2024-01-01_0001_AFLOWCELL1");
        assert_eq!(run.flowcell(), "AFLOWCELL1");
        assert_eq!(run.path("SampleSheet.csv"), dir.join("SampleSheet.csv"));
        assert!(!run.has_marker());

        fs::write(dir.join("done"), b"")?;
        assert!(run.has_marker());

        Ok(())
    }

    #[test]
    fn test_open_invalid() -> Result<(), Box<dyn std::error::Error>> {
        let root = TempDir::new("run")?;

        let dir = root.path().join("RUNX_2024-01-01_AFLOWCELL1");
        fs::create_dir(&dir)?;
        let err = Run::open(&dir).unwrap_err();
        assert!(matches!(err, Error::InvalidName(_, _)));

        let file = root.path().join("RUNX_2024-01-01_0001_AFLOWCELL1");
        fs::write(&file, b"")?;
        let err = Run::open(&file).unwrap_err();
        assert!(matches!(err, Error::NotADirectory(_)));

        Ok(())
    }
}
