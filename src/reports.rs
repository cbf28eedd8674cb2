//! Reading and filtering the demultiplexer's CSV reports.

use std::collections::HashSet;

/// The demultiplexing statistics report, relative to the output directory.
pub const DEMULTIPLEX_STATS: &str = "Reports/Demultiplex_Stats.csv";

/// The column holding the sample id.
const SAMPLE_ID_COLUMN: &str = "SampleID";

/// The column holding the number of reads.
const READS_COLUMN: &str = "# Reads";

/// The sample id used for reads that could not be assigned.
pub const UNDETERMINED: &str = "Undetermined";

/// An error related to a report.
#[derive(Debug)]
pub enum Error {
    /// The report has no header line.
    Empty,
    /// A required column is missing.
    MissingColumn(&'static str),
    /// A read count could not be parsed.
    InvalidReadCount(String, usize),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Empty => write!(f, "report is empty"),
            Error::MissingColumn(column) => write!(f, "report has no `{column}` column"),
            Error::InvalidReadCount(value, line) => {
                write!(f, "invalid read count `{value}` on line {line}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Splits a CSV line into fields.
fn fields(line: &str) -> Vec<&str> {
    line.trim_end_matches('\r').split(',').map(str::trim).collect()
}

/// Finds a column within a header line.
fn column(header: &[&str], name: &'static str) -> Result<usize> {
    header
        .iter()
        .position(|field| *field == name)
        .ok_or(Error::MissingColumn(name))
}

/// Read counts summed from a demultiplexing statistics report.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReadCounts {
    /// Reads across every sample, including undetermined reads.
    pub total: u64,
    /// Reads that could not be assigned to a sample.
    pub undetermined: u64,
}

impl ReadCounts {
    /// Parses a demultiplexing statistics report.
    ///
    /// # Examples
    ///
    /// ```
    /// use seqrun::reports::ReadCounts;
    ///
    /// let report = "Lane,SampleID,Index,# Reads\n1,S1,ACGT,600\n1,Undetermined,,400\n";
    /// let counts = ReadCounts::parse(report)?;
    ///
    /// assert_eq!(counts.total, 1000);
    /// assert_eq!(counts.undetermined_ratio(), 0.4);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn parse(report: &str) -> Result<Self> {
        let mut lines = report.lines();
        let header = fields(lines.next().ok_or(Error::Empty)?);

        let sample = column(&header, SAMPLE_ID_COLUMN)?;
        let reads = column(&header, READS_COLUMN)?;

        let mut counts = ReadCounts::default();
        for (i, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let row = fields(line);
            let value = row.get(reads).copied().unwrap_or_default();
            let n = value
                .parse::<u64>()
                .map_err(|_| Error::InvalidReadCount(value.to_string(), i + 2))?;

            counts.total += n;
            if row.get(sample).copied() == Some(UNDETERMINED) {
                counts.undetermined += n;
            }
        }

        Ok(counts)
    }

    /// The fraction of reads that were undetermined.
    ///
    /// A report without any reads is treated as entirely undetermined.
    pub fn undetermined_ratio(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }

        self.undetermined as f64 / self.total as f64
    }
}

/// Whether or not a header field names the sample id, however it is spelled
/// (`SampleID`, `Sample_ID`, `Sample Id`).
fn is_sample_id_column(field: &str) -> bool {
    let normalized = field
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect::<String>();

    normalized == "sampleid"
}

/// Keeps only the rows of a CSV report whose sample id is in `samples`.
///
/// A report may hold several tables. A line naming a sample id column starts
/// a per-sample table, and every row of that table with a foreign (or
/// missing) sample id is dropped. A blank line or a single-field title line
/// ends the table. Everything outside of per-sample tables is kept, so
/// reports without a sample id column are returned unchanged.
///
/// # Examples
///
/// ```
/// use std::collections::HashSet;
///
/// use seqrun::reports::filter_by_samples;
///
/// let report = "Lane,SampleID,# Reads\n1,S1,10\n1,S2,20\n";
/// let filtered = filter_by_samples(report, &HashSet::from(["S2"]));
///
/// assert_eq!(filtered, "Lane,SampleID,# Reads\n1,S2,20\n");
/// ```
pub fn filter_by_samples(report: &str, samples: &HashSet<&str>) -> String {
    let mut filtered = String::with_capacity(report.len());
    let mut sample_column = None;

    for line in report.split_inclusive('\n') {
        let row = fields(line.trim_end_matches('\n'));

        if let Some(column) = row.iter().position(|field| is_sample_id_column(field)) {
            sample_column = Some(column);
            filtered.push_str(line);
            continue;
        }

        let Some(column) = sample_column else {
            filtered.push_str(line);
            continue;
        };

        if row.len() < 2 {
            sample_column = None;
            filtered.push_str(line);
        } else if row.get(column).is_some_and(|id| samples.contains(id)) {
            filtered.push_str(line);
        }
    }

    filtered
}

#[cfg(test)]
pub mod tests {
    use super::*;

    const REPORT: &str = "Lane,SampleID,Sample_Project,Index,# Reads\n\
                          1,S1,P1,ACGT-AACC,250\n\
                          1,S2,P2,TTGA-GGTT,230\n\
                          1,S3,P1,CCAT-TGCA,0\n\
                          1,Undetermined,,,520\n";

    #[test]
    fn test_read_counts() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let counts = ReadCounts::parse(REPORT)?;
        assert_eq!(counts.total, 1000);
        assert_eq!(counts.undetermined, 520);
        assert_eq!(counts.undetermined_ratio(), 0.52);
        Ok(())
    }

    #[test]
    fn test_empty_counts() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let counts = ReadCounts::parse("Lane,SampleID,# Reads\n")?;
        assert_eq!(counts.undetermined_ratio(), 1.0);
        Ok(())
    }

    #[test]
    fn test_invalid_reports() {
        let err = ReadCounts::parse("").unwrap_err();
        assert_eq!(err.to_string(), "report is empty");

        let err = ReadCounts::parse("Lane,SampleID\n1,S1\n").unwrap_err();
        assert_eq!(err.to_string(), "report has no `# Reads` column");

        let err = ReadCounts::parse("SampleID,# Reads\nS1,many\n").unwrap_err();
        assert_eq!(err.to_string(), "invalid read count `many` on line 2");
    }

    #[test]
    fn test_filter_by_samples() {
        let samples = HashSet::from(["S1", "S3"]);
        let filtered = filter_by_samples(REPORT, &samples);

        assert_eq!(
            filtered,
            "Lane,SampleID,Sample_Project,Index,# Reads\n\
             1,S1,P1,ACGT-AACC,250\n\
             1,S3,P1,CCAT-TGCA,0\n"
        );

        assert_eq!(filter_by_samples("", &samples), "");
        assert_eq!(
            filter_by_samples("Lane,# Reads\n1,1000\n", &samples),
            "Lane,# Reads\n1,1000\n"
        );
    }

    #[test]
    fn test_filter_sectioned_report() {
        let report = "# Version: v1.0\n\
                      Lane 1\n\
                      Total Reads,PF Reads,% Read Identified (PF)\n\
                      1000,900,95.0\n\
                      Index Number,Sample Id,Project,Index 1 (I7),% Read Identified (PF)\n\
                      1,S1,P1,ACGT,40.0\n\
                      2,S2,P2,TTGA,55.0\n\
                      Lane 2\n\
                      Index Number,Sample Id,Project,Index 1 (I7),% Read Identified (PF)\n\
                      1,S2,P2,TTGA,50.0\n\
                      2,S1,P1,ACGT,45.0\n";

        let filtered = filter_by_samples(report, &HashSet::from(["S1"]));
        assert_eq!(
            filtered,
            "# Version: v1.0\n\
             Lane 1\n\
             Total Reads,PF Reads,% Read Identified (PF)\n\
             1000,900,95.0\n\
             Index Number,Sample Id,Project,Index 1 (I7),% Read Identified (PF)\n\
             1,S1,P1,ACGT,40.0\n\
             Lane 2\n\
             Index Number,Sample Id,Project,Index 1 (I7),% Read Identified (PF)\n\
             2,S1,P1,ACGT,45.0\n"
        );
        assert!(!filtered.contains("S2"));
        assert!(!filtered.contains(UNDETERMINED));
    }

    #[test]
    fn test_filter_without_sample_column() {
        let report = "Lane,Metric\n1,42\n";
        assert_eq!(filter_by_samples(report, &HashSet::new()), report);
    }
}
