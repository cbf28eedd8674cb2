//! The single error raised by any stage of the pipeline.

use crate::run::Run;
use crate::sample_sheet::ProjectSet;

/// The kind of a pipeline error.
///
/// Every kind is fatal for the run it was raised for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    /// An external tool exited with a non-zero code.
    ToolFailure,
    /// Statistics generation exited with a non-zero code after a successful
    /// demultiplex.
    StatisticsFailure,
    /// The sample sheet could not be found or derived.
    MissingInput,
    /// A destination could not be reached or rejected a copy.
    TransferFailure,
    /// A local filesystem operation failed.
    Io,
    /// An input (such as the sample sheet) is malformed.
    InvalidInput,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::ToolFailure => write!(f, "tool failure"),
            Kind::StatisticsFailure => write!(f, "statistics failure"),
            Kind::MissingInput => write!(f, "missing input"),
            Kind::TransferFailure => write!(f, "transfer failure"),
            Kind::Io => write!(f, "i/o failure"),
            Kind::InvalidInput => write!(f, "invalid input"),
        }
    }
}

/// A fatal pipeline error, carrying what is known about the run it was
/// raised for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Error {
    /// The kind of error.
    kind: Kind,
    /// A human-readable message.
    message: String,
    /// The run name.
    run: String,
    /// The destination projects known when the error was raised.
    projects: ProjectSet,
}

impl Error {
    /// Creates a pipeline error.
    pub fn new(kind: Kind, message: impl Into<String>, run: &Run, projects: &ProjectSet) -> Self {
        Self {
            kind,
            message: message.into(),
            run: run.to_string(),
            projects: projects.clone(),
        }
    }

    /// Gets the kind of error.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Gets the message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Gets the run name.
    pub fn run(&self) -> &str {
        &self.run
    }

    /// Gets the destination projects known when the error was raised.
    pub fn projects(&self) -> &ProjectSet {
        &self.projects
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.run, self.kind, self.message)?;

        if !self.projects.is_empty() {
            let projects = self.projects.iter().cloned().collect::<Vec<_>>();
            write!(f, " [projects: {}]", projects.join(", "))?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
