//! Result and error types for covsieve.
//!
//! Every failure is fatal to a selection run. The variants mirror the
//! stage that failed: configuration (before any round), execution (a
//! measurement round), analysis (reading a capture) and reporting (writing
//! or reading CSV files).

use crate::selector::TestSelector;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for covsieve operations
pub type CovsieveResult<T> = Result<T, CovsieveError>;

/// Errors that can occur while selecting tests
#[derive(Debug, Error)]
pub enum CovsieveError {
    /// Bad paths or arguments, detected before any round starts
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// A measurement round failed
    #[error(transparent)]
    Execution(#[from] HarnessError),

    /// A coverage capture could not be parsed or reconciled
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Persisting or reading a report failed
    #[error(transparent)]
    Reporting(#[from] ReportError),

    /// Analysis failed for the capture of a specific candidate
    #[error("Analysis failed for {selector}: {source}")]
    CandidateAnalysis {
        /// Candidate whose round produced the capture
        selector: TestSelector,
        /// Underlying analysis failure
        source: AnalysisError,
    },

    /// Analysis failed for the capture of a baseline, verification or
    /// comparison round
    #[error("Analysis failed for selectors={}: {source}", join_selectors(.selectors))]
    RoundAnalysis {
        /// Selectors the round ran
        selectors: Vec<TestSelector>,
        /// Underlying analysis failure
        source: AnalysisError,
    },
}

impl CovsieveError {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Failures of a single measurement round
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The round was asked to run nothing
    #[error("No selectors given for measurement round")]
    NoSelectors,

    /// Runtime library directory is missing
    #[error("Library directory is not a directory: {}", .path.display())]
    LibraryDirMissing {
        /// Offending path
        path: PathBuf,
    },

    /// The child process could not be started
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        /// Launcher program
        program: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The child process exited unsuccessfully
    #[error("Fork failed (exit={}): selectors={}", exit_code_label(.code), join_selectors(.selectors))]
    NonZeroExit {
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Selectors the round was running
        selectors: Vec<TestSelector>,
    },

    /// The child process outlived the round timeout and was killed
    #[error("Round timed out after {timeout_ms}ms: selectors={}", join_selectors(.selectors))]
    Timeout {
        /// Configured timeout
        timeout_ms: u64,
        /// Selectors the round was running
        selectors: Vec<TestSelector>,
    },

    /// Preparing the output location failed
    #[error("I/O error preparing {}: {source}", .path.display())]
    Io {
        /// Path being prepared
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

#[allow(clippy::ref_option)]
fn exit_code_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

fn join_selectors(selectors: &[TestSelector]) -> String {
    selectors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Failures turning a capture into coverage values
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The capture file could not be read
    #[error("Cannot read coverage capture {}: {source}", .path.display())]
    Read {
        /// Capture path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The capture is not a well-formed report
    #[error("Corrupt coverage capture {}: {message}", .path.display())]
    Corrupt {
        /// Capture path
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// The backend tool that converts raw captures failed
    #[error("Coverage conversion failed for {}: {message}", .path.display())]
    Conversion {
        /// Capture path
        path: PathBuf,
        /// Converter message
        message: String,
    },

    /// Two captures disagree on the structure of the same class
    #[error("Class structure mismatch for {class_name}: {counter} total {baseline} vs {candidate}")]
    StructureMismatch {
        /// Fully-qualified class name
        class_name: String,
        /// Counter kind whose totals differ
        counter: &'static str,
        /// Total in the baseline capture
        baseline: u64,
        /// Total in the other capture
        candidate: u64,
    },
}

impl AnalysisError {
    /// Create a corrupt-capture error
    #[must_use]
    pub fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Failures persisting or reading reports
#[derive(Debug, Error)]
pub enum ReportError {
    /// Underlying I/O failure
    #[error("Report I/O failed for {}: {source}", .path.display())]
    Io {
        /// Report path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A report row could not be parsed
    #[error("Malformed report {} at line {line}: {message}", .path.display())]
    Malformed {
        /// Report path
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What was wrong
        message: String,
    },

    /// Summary serialization failed
    #[error("Failed to serialize summary: {0}")]
    Serialize(#[from] serde_json::Error),
}
