//! Sample sheets.
//!
//! A sample sheet is a text document made of an arbitrary preamble (for
//! example, the `[Header]`, `[Reads]`, and `[Settings]` sections of an
//! Illumina sheet), a header line naming the data columns, one row per
//! sample, and anything that follows the data section. Everything except the
//! sample rows is preserved byte-for-byte when a sheet is rewritten.
//!
//! ```
//! use seqrun::SampleSheet;
//!
//! let data = "[Header]\nDate,2024-01-01\n\n[Data]\nSample_ID,index,index2,Sample_Project\nS1,ACGT,AACC,P1\nS2,TTGA,GGTT,P2\n";
//! let sheet = data.parse::<SampleSheet>()?;
//!
//! assert_eq!(sheet.samples().len(), 2);
//! assert_eq!(sheet.projects().len(), 2);
//!
//! let reverse = sheet.reverse_complemented();
//! assert_eq!(reverse.samples().first().index2().to_string(), "GGTT");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod index;
pub mod sample;

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

pub use index::Index;
use nonempty::NonEmpty;
pub use sample::Layout;
pub use sample::Sample;

/// An error related to a sample sheet.
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(io::Error),
    /// No data header line was found.
    MissingHeader,
    /// The data header is invalid.
    InvalidHeader(sample::LayoutError),
    /// A sample record is invalid.
    InvalidSample(sample::ParseError, String),
    /// The data section contains no samples.
    NoSamples,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::MissingHeader => write!(f, "no sample data header line found"),
            Error::InvalidHeader(err) => write!(f, "invalid header: {err}"),
            Error::InvalidSample(err, line) => {
                write!(f, "invalid sample record: {err}\n\nline: {line}")
            }
            Error::NoSamples => write!(f, "sample sheet contains no samples"),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The set of destination project ids referenced by a sample sheet.
pub type ProjectSet = BTreeSet<String>;

/// The orientation of the index reads within a sample sheet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Orientation {
    /// The indexes as submitted.
    Forward,
    /// The last index read of every sample reverse complemented.
    ReverseComplemented,
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Forward => write!(f, "forward"),
            Orientation::ReverseComplemented => write!(f, "reverse"),
        }
    }
}

/// A parsed sample sheet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SampleSheet {
    /// Everything before the data header line, verbatim.
    preamble: String,
    /// The data header.
    layout: Layout,
    /// The line ending used by the data section.
    line_ending: &'static str,
    /// The samples in sheet order.
    samples: NonEmpty<Sample>,
    /// Everything after the last sample row, verbatim.
    epilogue: String,
}

impl SampleSheet {
    /// Reads a sample sheet from a path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        fs::read_to_string(path).map_err(Error::Io)?.parse()
    }

    /// Writes the sample sheet to a path, replacing any existing file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_string()).map_err(Error::Io)
    }

    /// Gets the verbatim preamble.
    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    /// Gets the data section layout.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Gets the samples.
    pub fn samples(&self) -> &NonEmpty<Sample> {
        &self.samples
    }

    /// Whether or not any sample in the sheet is dual-indexed.
    pub fn is_dual_indexed(&self) -> bool {
        self.samples.iter().any(Sample::is_dual_indexed)
    }

    /// Gets the distinct destination project ids.
    ///
    /// Samples without a project are not counted.
    pub fn projects(&self) -> ProjectSet {
        self.samples
            .iter()
            .map(|sample| sample.project())
            .filter(|project| !project.is_empty())
            .map(String::from)
            .collect()
    }

    /// Gets the sample ids that belong to a project.
    pub fn samples_for_project<'a>(&'a self, project: &'a str) -> impl Iterator<Item = &'a str> {
        self.samples
            .iter()
            .filter(move |sample| sample.project() == project)
            .map(Sample::id)
    }

    /// Strips stray unknown bases from index reads that also contain called
    /// bases. Returns whether any sample changed.
    pub fn strip_unknown_bases(&mut self) -> bool {
        let mut changed = false;

        for sample in self.samples.iter_mut() {
            for index in sample.indexes_mut() {
                changed |= index.strip_unknown();
            }
        }

        changed
    }

    /// Replaces unknown bases in every index read with a called base. Returns
    /// whether any sample changed.
    pub fn substitute_unknown_bases(&mut self) -> bool {
        let mut changed = false;

        for sample in self.samples.iter_mut() {
            for index in sample.indexes_mut() {
                changed |= index.substitute_unknown();
            }
        }

        changed
    }

    /// Cleans up the index reads for demultiplexing. Returns whether any
    /// sample changed.
    ///
    /// Stray unknown bases are stripped when the sheet has more than one
    /// sample. A single sample has every unknown base replaced instead.
    pub fn normalize(&mut self) -> bool {
        if self.samples.len() > 1 {
            self.strip_unknown_bases()
        } else {
            self.substitute_unknown_bases()
        }
    }

    /// Returns a copy of the sheet holding only the samples of a project, or
    /// [`None`] if the project has no samples.
    pub fn for_project(&self, project: &str) -> Option<SampleSheet> {
        let samples = self
            .samples
            .iter()
            .filter(|sample| sample.project() == project)
            .cloned()
            .collect::<Vec<_>>();

        Some(SampleSheet {
            samples: NonEmpty::from_vec(samples)?,
            ..self.clone()
        })
    }

    /// Returns a copy of the sheet where the last index read of every sample
    /// is reverse complemented.
    pub fn reverse_complemented(&self) -> SampleSheet {
        let mut sheet = self.clone();

        for sample in sheet.samples.iter_mut() {
            let index = sample.last_index_mut();
            *index = index.reverse_complement();
        }

        sheet
    }

    /// The name of the index read that [`SampleSheet::reverse_complemented`]
    /// alters for this sheet.
    pub fn reversed_index_name(&self) -> &'static str {
        if self.is_dual_indexed() {
            sample::INDEX2_COLUMN
        } else {
            sample::INDEX_COLUMN
        }
    }
}

impl FromStr for SampleSheet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut offset = 0;
        let mut lines = s.split_inclusive('\n');

        let (header, preamble) = loop {
            match lines.next() {
                Some(line) if Layout::is_header(line) => break (line, &s[..offset]),
                Some(line) => offset += line.len(),
                None => return Err(Error::MissingHeader),
            }
        };
        offset += header.len();

        let line_ending = if header.ends_with("\r\n") { "\r\n" } else { "\n" };
        let layout = header.parse::<Layout>().map_err(Error::InvalidHeader)?;

        let mut samples = Vec::new();
        for line in lines {
            let fields = sample::split_fields(line);
            if line.trim_start().starts_with('[') || fields.iter().all(|field| field.is_empty()) {
                break;
            }

            let sample = Sample::parse(line, &layout)
                .map_err(|err| Error::InvalidSample(err, line.trim_end().to_string()))?;
            samples.push(sample);
            offset += line.len();
        }

        let samples = NonEmpty::from_vec(samples).ok_or(Error::NoSamples)?;

        Ok(SampleSheet {
            preamble: preamble.to_string(),
            layout,
            line_ending,
            samples,
            epilogue: s[offset..].to_string(),
        })
    }
}

impl std::fmt::Display for SampleSheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.preamble, self.layout, self.line_ending)?;

        for sample in self.samples.iter() {
            write!(f, "{}{}", sample.render(&self.layout), self.line_ending)?;
        }

        write!(f, "{}", self.epilogue)
    }
}
