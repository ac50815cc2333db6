//! Covsieve: coverage-guided incremental test selection
//!
//! Given a fixed baseline suite and a pool of candidate tests, covsieve
//! measures each candidate in its own JVM together with the baseline and
//! keeps only the candidates that cover something the suite built so far
//! does not. The result is a reduced suite with the same coverage as the
//! full pool, plus reports ranking every candidate by what it adds.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   run    ┌──────────────┐  capture  ┌──────────────┐
//! │   Greedy     │─────────►│   Forked     │──────────►│  Coverage    │
//! │   Selector   │          │   Harness    │           │  Backend     │
//! └──────┬───────┘          └──────────────┘           └──────┬───────┘
//!        │ fold                                               │ snapshot
//!        ▼                                                    ▼
//! ┌──────────────┐  union   ┌──────────────┐   units   ┌──────────────┐
//! │ Selection    │◄─────────│ CoverageSet  │◄──────────│  Analyzer    │
//! │ State        │          │ algebra      │           │              │
//! └──────┬───────┘          └──────────────┘           └──────────────┘
//!        │ deltas
//!        ▼
//! ┌──────────────┐
//! │ Ranking +    │──► CSV / JSON reports
//! │ Range codec  │
//! └──────────────┘
//! ```

#![warn(missing_docs)]

mod algebra;
mod analyzer;
pub mod backend;
mod delta;
pub mod discovery;
pub mod harness;
mod ranges;
mod ranking;
mod record;
pub mod report;
mod result;
mod selection;
mod selector;

#[cfg(test)]
mod fixtures;

pub use algebra::{CoverageSet, CoverageUnit};
pub use analyzer::{
    class_deltas_between, line_changes_between, test_delta_between, CoverageAnalyzer,
    Granularity, LineChanges,
};
pub use backend::{CoverageBackend, CoverageSnapshot, JacocoBackend, JacocoConfig};
pub use delta::{ClassDelta, CounterDelta, DeltaMetrics, LineDeltaRow, TestDelta};
pub use discovery::{read_selector_file, JavaTestScanner, TestFramework};
pub use harness::{ForkedHarness, Harness, HarnessConfig};
pub use ranges::{decode_ranges, encode_ranges, RangeParseError};
pub use ranking::{compare_deltas, rank, top_n};
pub use record::ExecutionRecord;
pub use report::{read_test_deltas, ReportWriter};
pub use result::{AnalysisError, CovsieveError, CovsieveResult, HarnessError, ReportError};
pub use selection::{
    CandidateMeasurement, ComparisonOutcome, Decision, GreedySelector, NoopObserver,
    SelectionObserver, SelectionOutcome, SelectionState, SelectionSummary, VerificationOutcome,
};
pub use selector::{SelectorParseError, TestSelector};
