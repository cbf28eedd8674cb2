//! Sample records and the column layout that describes them.

use std::str::FromStr;

use crate::sample_sheet::index;
use crate::sample_sheet::Index;

/// The delimiter between fields.
pub const DELIMITER: char = ',';

/// The name of the sample id column.
pub const SAMPLE_ID_COLUMN: &str = "Sample_ID";

/// The name of the lane column (which may precede the sample id column).
pub const LANE_COLUMN: &str = "Lane";

/// The name of the first index column.
pub const INDEX_COLUMN: &str = "index";

/// The name of the second index column.
pub const INDEX2_COLUMN: &str = "index2";

/// The name of the destination project column.
pub const PROJECT_COLUMN: &str = "Sample_Project";

/// An error related to the column layout.
#[derive(Debug)]
pub enum LayoutError {
    /// The header does not name a sample id column.
    MissingSampleId,
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutError::MissingSampleId => {
                write!(f, "header does not contain a `{SAMPLE_ID_COLUMN}` column")
            }
        }
    }
}

impl std::error::Error for LayoutError {}

/// An error related to parsing a sample record.
#[derive(Debug)]
pub enum ParseError {
    /// The record has more fields than the header.
    TooManyFields(usize, usize),
    /// The sample id is empty.
    EmptySampleId,
    /// The first index is invalid.
    InvalidIndex(index::ParseError),
    /// The second index is invalid.
    InvalidIndex2(index::ParseError),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::TooManyFields(expected, found) => write!(
                f,
                "invalid number of fields in sample record: expected at most {expected} fields, \
                 found {found} fields"
            ),
            ParseError::EmptySampleId => write!(f, "sample id is empty"),
            ParseError::InvalidIndex(err) => write!(f, "invalid index: {err}"),
            ParseError::InvalidIndex2(err) => write!(f, "invalid index2: {err}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Whether or not a header field names a column, ignoring ASCII case (newer
/// sheets spell the index columns `Index` and `Index2`).
fn is_column(field: &str, name: &str) -> bool {
    field.eq_ignore_ascii_case(name)
}

/// Splits a line into trimmed fields.
pub(crate) fn split_fields(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\r', '\n'])
        .split(DELIMITER)
        .map(str::trim)
        .collect()
}

/// The positions of the columns we care about within the data section.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Layout {
    /// The header fields, verbatim.
    columns: Vec<String>,
    /// The position of the sample id column.
    sample_id: usize,
    /// The position of the first index column.
    index: Option<usize>,
    /// The position of the second index column.
    index2: Option<usize>,
    /// The position of the project column.
    project: Option<usize>,
}

impl Layout {
    /// Whether or not a line looks like the header of the data section.
    pub fn is_header(line: &str) -> bool {
        let fields = split_fields(line);
        match fields.first() {
            Some(first) if is_column(first, SAMPLE_ID_COLUMN) => true,
            Some(first) if is_column(first, LANE_COLUMN) => fields
                .iter()
                .any(|field| is_column(field, SAMPLE_ID_COLUMN)),
            _ => false,
        }
    }

    /// Gets the header fields.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether or not the layout has a second index column.
    pub fn has_index2(&self) -> bool {
        self.index2.is_some()
    }
}

impl FromStr for Layout {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let columns = split_fields(s)
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        let position = |name: &str| columns.iter().position(|column| is_column(column, name));

        let sample_id = position(SAMPLE_ID_COLUMN).ok_or(LayoutError::MissingSampleId)?;
        let index = position(INDEX_COLUMN);
        let index2 = position(INDEX2_COLUMN);
        let project = position(PROJECT_COLUMN);

        Ok(Layout {
            columns,
            sample_id,
            index,
            index2,
            project,
        })
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.columns.join(&DELIMITER.to_string()))
    }
}

/// A single sample row within a sample sheet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Sample {
    /// The raw fields, padded to the width of the header.
    fields: Vec<String>,
    /// The sample id.
    id: String,
    /// The destination project (empty when the sheet has no project column).
    project: String,
    /// The first index read.
    index: Index,
    /// The second index read (empty for single-indexed samples).
    index2: Index,
}

impl Sample {
    /// Parses a sample record using the provided layout.
    pub fn parse(line: &str, layout: &Layout) -> Result<Self, ParseError> {
        let mut fields = split_fields(line)
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();

        let width = layout.columns.len();
        if fields.len() > width {
            // Trailing empty fields are common in spreadsheet exports.
            while fields.len() > width && fields.last().is_some_and(|f| f.is_empty()) {
                fields.pop();
            }

            if fields.len() > width {
                return Err(ParseError::TooManyFields(width, fields.len()));
            }
        }
        fields.resize(width, String::new());

        let id = fields[layout.sample_id].clone();
        if id.is_empty() {
            return Err(ParseError::EmptySampleId);
        }

        let project = layout
            .project
            .map(|i| fields[i].clone())
            .unwrap_or_default();
        let index = match layout.index {
            Some(i) => fields[i].parse().map_err(ParseError::InvalidIndex)?,
            None => Index::default(),
        };
        let index2 = match layout.index2 {
            Some(i) => fields[i].parse().map_err(ParseError::InvalidIndex2)?,
            None => Index::default(),
        };

        Ok(Sample {
            fields,
            id,
            project,
            index,
            index2,
        })
    }

    /// Gets the sample id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gets the destination project id.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Gets the first index read.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Gets the second index read.
    pub fn index2(&self) -> &Index {
        &self.index2
    }

    /// Whether or not the sample carries two index reads.
    pub fn is_dual_indexed(&self) -> bool {
        !self.index2.is_empty()
    }

    /// Gets a mutable reference to the last index read of the sample
    /// (`index2` for dual-indexed samples, `index` otherwise).
    pub fn last_index_mut(&mut self) -> &mut Index {
        if self.is_dual_indexed() {
            &mut self.index2
        } else {
            &mut self.index
        }
    }

    /// Gets mutable references to every index read of the sample.
    pub fn indexes_mut(&mut self) -> [&mut Index; 2] {
        [&mut self.index, &mut self.index2]
    }

    /// Renders the sample back into a delimited line (without a line ending).
    pub fn render(&self, layout: &Layout) -> String {
        let mut fields = self.fields.clone();

        if let Some(i) = layout.index {
            fields[i] = self.index.to_string();
        }

        if let Some(i) = layout.index2 {
            fields[i] = self.index2.to_string();
        }

        fields.join(&DELIMITER.to_string())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn test_layout() -> Result<(), Box<dyn std::error::Error>> {
        let layout = "Sample_ID,Sample_Name,index,index2,Sample_Project".parse::<Layout>()?;
        assert!(layout.has_index2());
        assert_eq!(layout.columns().len(), 5);

        let err = "Lane,index".parse::<Layout>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "header does not contain a `Sample_ID` column"
        );

        assert!(Layout::is_header("Sample_ID,index\r\n"));
        assert!(Layout::is_header("Lane,Sample_ID,index"));
        assert!(!Layout::is_header("Lane,index"));
        assert!(!Layout::is_header("[Data]"));

        Ok(())
    }

    #[test]
    fn test_layout_ignores_column_case() -> Result<(), Box<dyn std::error::Error>> {
        let header = "Lane,Sample_ID,Index,Index2,Sample_Project";
        assert!(Layout::is_header(header));

        let layout = header.parse::<Layout>()?;
        assert!(layout.has_index2());

        let sample = Sample::parse("1,S1,ACGT,AACC,P1", &layout)?;
        assert_eq!(sample.index().to_string(), "ACGT");
        assert_eq!(sample.index2().to_string(), "AACC");
        assert_eq!(sample.project(), "P1");

        // The header is rendered as written.
        assert_eq!(layout.to_string(), header);

        Ok(())
    }

    #[test]
    fn test_sample_parse_and_render() -> Result<(), Box<dyn std::error::Error>> {
        let layout = "Sample_ID,index,index2,Sample_Project".parse::<Layout>()?;
        let mut sample = Sample::parse("S1,acgt,TTGG,P1,,", &layout)?;

        assert_eq!(sample.id(), "S1");
        assert_eq!(sample.project(), "P1");
        assert_eq!(sample.index().to_string(), "ACGT");
        assert!(sample.is_dual_indexed());

        *sample.last_index_mut() = sample.index2().reverse_complement();
        assert_eq!(sample.render(&layout), "S1,ACGT,CCAA,P1");

        Ok(())
    }

    #[test]
    fn test_sample_parse_errors() -> Result<(), Box<dyn std::error::Error>> {
        let layout = "Sample_ID,index".parse::<Layout>()?;

        let err = Sample::parse("S1,ACGT,P1", &layout).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid number of fields in sample record: expected at most 2 fields, found 3 fields"
        );

        let err = Sample::parse(",ACGT", &layout).unwrap_err();
        assert_eq!(err.to_string(), "sample id is empty");

        let err = Sample::parse("S1,ACGU", &layout).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid index: invalid base `U` in index sequence `ACGU`"
        );

        Ok(())
    }
}
