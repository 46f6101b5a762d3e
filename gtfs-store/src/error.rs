//! Module for the error management
use std::fmt;
use thiserror::Error;

/// An error that can occur when reading, writing or querying GTFS data.
#[derive(Error, Debug)]
pub enum Error {
    /// The given path is neither a file nor a directory
    #[error("could not read GTFS feed: {path} is neither a file nor a directory")]
    FeedNotFound {
        /// Path that was probed
        path: String,
    },
    /// One or more mandatory files are absent from the feed
    #[error("GTFS feed at {path} is missing required files: {}", missing.join(", "))]
    FeedFileMissing {
        /// Directory or archive that was inspected
        path: String,
        /// Every missing file name, so the caller can report them all at once
        missing: Vec<String>,
    },
    /// A row of a CSV table could not be parsed (strict mode only)
    #[error("{file}:{line}: could not parse column '{column}': {reason}")]
    FeedParse {
        /// Table file name, e.g. `stops.txt`
        file: String,
        /// 1-based line number of the offending row
        line: u64,
        /// Column the failure was attributed to, `<row>` when unattributable
        column: String,
        /// What went wrong
        reason: String,
    },
    /// A semantic invariant of the feed does not hold
    #[error("GTFS feed failed validation with {} error(s)", errors.len())]
    FeedValidation {
        /// Violations that make the feed unusable
        errors: Vec<String>,
        /// Violations that do not
        warnings: Vec<String>,
    },
    /// A date string was not in one of the accepted layouts
    #[error("'{value}' is not a valid date; expected {expected}")]
    InvalidDate {
        /// The rejected input
        value: String,
        /// Human description of the accepted layouts
        expected: String,
    },
    /// The time is not given in the H+:MM:SS format
    #[error("'{0}' is not a valid time; H:MM:SS format is expected")]
    InvalidTime(String),
    /// The color is not given in the RRGGBB format, without a leading `#`
    #[error("'{0}' is not a valid color; RRGGBB format is expected, without a leading `#`")]
    InvalidColor(String),
    /// The operation was aborted through its [crate::CancelToken]
    #[error("operation cancelled")]
    Cancelled,
    /// Generic Input/Output error while reading a file
    #[error("impossible to read file")]
    Io(#[from] std::io::Error),
    /// Impossible to read a named file
    #[error("impossible to read '{file_name}'")]
    NamedFileIo {
        /// The file name that could not be read
        file_name: String,
        /// The initial error that caused the unability to read the file
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Impossible to read a CSV file
    #[error("impossible to read csv file '{file_name}'")]
    Csv {
        /// File name that could not be parsed as CSV
        file_name: String,
        /// The initial error by the csv library
        #[source]
        source: csv::Error,
    },
    /// Error when trying to unzip the GTFS archive
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

/// A row-level diagnostic collected during a lenient load.
///
/// Lenient loads skip rows they cannot parse and record one of these instead;
/// strict loads surface the first failure as [Error::FeedParse].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// Table file name, e.g. `stop_times.txt`
    pub file: String,
    /// 1-based line number of the skipped row
    pub line: u64,
    /// Column the failure was attributed to, when known
    pub column: Option<String>,
    /// What went wrong
    pub reason: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.column {
            Some(col) => write!(
                f,
                "{}:{}: skipped row (column '{}': {})",
                self.file, self.line, col, self.reason
            ),
            None => write!(f, "{}:{}: skipped row ({})", self.file, self.line, self.reason),
        }
    }
}
