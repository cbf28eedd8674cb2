//! Index sequences within a sample sheet.

use std::str::FromStr;

/// The placeholder base used for unknown or UMI positions.
pub const UNKNOWN_BASE: char = 'N';

/// The base that unknown positions are replaced with for single-sample runs.
pub const SUBSTITUTE_BASE: char = 'A';

/// An error related to parsing an index sequence.
#[derive(Debug)]
pub enum ParseError {
    /// An invalid base was encountered.
    InvalidBase(char, String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidBase(base, sequence) => {
                write!(f, "invalid base `{base}` in index sequence `{sequence}`")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// A base within an index sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Base {
    /// Adenine.
    A,
    /// Cytosine.
    C,
    /// Guanine.
    G,
    /// Thymine.
    T,
    /// An unknown base (`N`).
    N,
}

impl Base {
    /// Gets the complement of the base.
    fn complement(self) -> Base {
        match self {
            Base::A => Base::T,
            Base::C => Base::G,
            Base::G => Base::C,
            Base::T => Base::A,
            Base::N => Base::N,
        }
    }

    /// Whether or not this is a called base.
    fn is_called(self) -> bool {
        !matches!(self, Base::N)
    }
}

impl TryFrom<char> for Base {
    type Error = char;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value.to_ascii_uppercase() {
            'A' => Ok(Base::A),
            'C' => Ok(Base::C),
            'G' => Ok(Base::G),
            'T' => Ok(Base::T),
            'N' => Ok(Base::N),
            c => Err(c),
        }
    }
}

impl From<Base> for char {
    fn from(value: Base) -> Self {
        match value {
            Base::A => 'A',
            Base::C => 'C',
            Base::G => 'G',
            Base::T => 'T',
            Base::N => UNKNOWN_BASE,
        }
    }
}

/// An index sequence (either `index` or `index2`) for a sample.
///
/// Index sequences are normalized to uppercase on parsing.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Index(Vec<Base>);

impl Index {
    /// Whether or not the index is empty (the column was left blank).
    ///
    /// # Examples
    ///
    /// ```
    /// use seqrun::sample_sheet::Index;
    ///
    /// assert!("".parse::<Index>()?.is_empty());
    /// assert!(!"ACGT".parse::<Index>()?.is_empty());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Gets the number of bases in the index.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the reverse complement of the index.
    ///
    /// # Examples
    ///
    /// ```
    /// use seqrun::sample_sheet::Index;
    ///
    /// let index = "AACGTN".parse::<Index>()?;
    /// assert_eq!(index.reverse_complement().to_string(), "NACGTT");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn reverse_complement(&self) -> Index {
        Index(self.0.iter().rev().map(|base| base.complement()).collect())
    }

    /// Removes stray unknown bases from an index that also contains called
    /// bases.
    ///
    /// An index made entirely of unknown bases is left as is. Returns whether
    /// the index was changed.
    ///
    /// # Examples
    ///
    /// ```
    /// use seqrun::sample_sheet::Index;
    ///
    /// let mut index = "ACGTNNNN".parse::<Index>()?;
    /// assert!(index.strip_unknown());
    /// assert_eq!(index.to_string(), "ACGT");
    ///
    /// let mut index = "NNNN".parse::<Index>()?;
    /// assert!(!index.strip_unknown());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn strip_unknown(&mut self) -> bool {
        let has_unknown = self.0.iter().any(|base| !base.is_called());
        let has_called = self.0.iter().any(|base| base.is_called());

        if !(has_unknown && has_called) {
            return false;
        }

        self.0.retain(|base| base.is_called());
        true
    }

    /// Replaces every unknown base with [`SUBSTITUTE_BASE`]. Returns whether
    /// the index was changed.
    pub fn substitute_unknown(&mut self) -> bool {
        let mut changed = false;

        for base in self.0.iter_mut() {
            if !base.is_called() {
                *base = Base::A;
                changed = true;
            }
        }

        changed
    }
}

impl FromStr for Index {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .chars()
            .map(|c| Base::try_from(c).map_err(|c| ParseError::InvalidBase(c, s.to_string())))
            .collect::<Result<Vec<_>, _>>()
            .map(Index)
    }
}

impl std::fmt::Display for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for base in &self.0 {
            write!(f, "{}", char::from(*base))?;
        }

        Ok(())
    }
}
