//! Run directory names.

use std::str::FromStr;

/// The delimiter between fields of a run name.
pub const NAME_DELIMITER: char = '_';

/// The number of expected fields in a run name.
pub const NUM_NAME_FIELDS: usize = 4;

/// An error associated with parsing a run name.
#[derive(Debug)]
pub enum ParseError {
    /// An incorrect number of fields in the run name.
    IncorrectNumberOfFields(usize),
    /// A field was empty.
    EmptyField(usize),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::IncorrectNumberOfFields(n) => write!(
                f,
                "invalid number of fields in run name: expected {NUM_NAME_FIELDS} fields, found \
                 {n} fields"
            ),
            ParseError::EmptyField(i) => write!(f, "field {} of run name is empty", i + 1),
        }
    }
}

impl std::error::Error for ParseError {}

/// The name of a run directory.
///
/// A run name is made of four `_`-delimited fields: the instrument, the
/// date, the run number, and the flow cell id.
///
/// # Examples
///
/// ```
/// use seqrun::run::RunName;
///
/// let name = "RUNX_2024-01-01_0001_AFLOWCELL1".parse::<RunName>()?;
///
/// assert_eq!(name.instrument(), "RUNX");
/// assert_eq!(name.date(), "2024-01-01");
/// assert_eq!(name.number(), "0001");
/// assert_eq!(name.flowcell(), "AFLOWCELL1");
/// assert_eq!(name.to_string(), "RUNX_2024-01-01_0001_AFLOWCELL1");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RunName {
    /// The instrument.
    instrument: String,
    /// The run date.
    date: String,
    /// The run number.
    number: String,
    /// The flow cell id.
    flowcell: String,
}

impl RunName {
    /// Gets the instrument.
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Gets the run date (as written in the name).
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Gets the run number.
    pub fn number(&self) -> &str {
        &self.number
    }

    /// Gets the flow cell id.
    pub fn flowcell(&self) -> &str {
        &self.flowcell
    }
}

impl FromStr for RunName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.split(NAME_DELIMITER).collect::<Vec<_>>();
        if parts.len() != NUM_NAME_FIELDS {
            return Err(ParseError::IncorrectNumberOfFields(parts.len()));
        }

        if let Some(i) = parts.iter().position(|part| part.is_empty()) {
            return Err(ParseError::EmptyField(i));
        }

        Ok(RunName {
            instrument: parts[0].to_string(),
            date: parts[1].to_string(),
            number: parts[2].to_string(),
            flowcell: parts[3].to_string(),
        })
    }
}

impl std::fmt::Display for RunName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts = [
            self.instrument.as_str(),
            self.date.as_str(),
            self.number.as_str(),
            self.flowcell.as_str(),
        ];

        write!(f, "{}", parts.join(NAME_DELIMITER.to_string().as_str()))
    }
}
