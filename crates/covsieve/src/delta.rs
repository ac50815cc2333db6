//! Coverage deltas at test, class and line granularity

use crate::selector::TestSelector;
use serde::{Deserialize, Serialize};

/// The four coverage counters a delta reports.
///
/// Values are signed: a negative number means the other capture covered
/// less, which only happens when the backend is nondeterministic.
pub trait DeltaMetrics {
    /// Newly covered lines
    fn added_lines(&self) -> i64;
    /// Newly covered methods
    fn added_methods(&self) -> i64;
    /// Newly covered branches
    fn added_branches(&self) -> i64;
    /// Newly covered instructions
    fn added_instructions(&self) -> i64;

    /// Whether every counter is zero
    fn is_zero(&self) -> bool {
        self.added_lines() == 0
            && self.added_methods() == 0
            && self.added_branches() == 0
            && self.added_instructions() == 0
    }
}

/// Counter differences between two captures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDelta {
    /// Line counter difference
    pub lines: i64,
    /// Method counter difference
    pub methods: i64,
    /// Branch counter difference
    pub branches: i64,
    /// Instruction counter difference
    pub instructions: i64,
}

/// Coverage one candidate adds over the pristine baseline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDelta {
    /// Candidate selector
    pub selector: TestSelector,
    /// Newly covered lines
    pub added_lines: i64,
    /// Newly covered methods
    pub added_methods: i64,
    /// Newly covered branches
    pub added_branches: i64,
    /// Newly covered instructions
    pub added_instructions: i64,
}

impl TestDelta {
    /// Build from a selector and counter differences
    #[must_use]
    pub fn new(selector: TestSelector, delta: CounterDelta) -> Self {
        Self {
            selector,
            added_lines: delta.lines,
            added_methods: delta.methods,
            added_branches: delta.branches,
            added_instructions: delta.instructions,
        }
    }
}

impl DeltaMetrics for TestDelta {
    fn added_lines(&self) -> i64 {
        self.added_lines
    }
    fn added_methods(&self) -> i64 {
        self.added_methods
    }
    fn added_branches(&self) -> i64 {
        self.added_branches
    }
    fn added_instructions(&self) -> i64 {
        self.added_instructions
    }
}

/// Coverage change within one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDelta {
    /// Fully-qualified, dot-separated class name
    pub class_name: String,
    /// Newly covered lines
    pub added_lines: i64,
    /// Newly covered methods
    pub added_methods: i64,
    /// Newly covered branches
    pub added_branches: i64,
    /// Newly covered instructions
    pub added_instructions: i64,
}

impl ClassDelta {
    /// Build from a class name and counter differences
    #[must_use]
    pub fn new(class_name: impl Into<String>, delta: CounterDelta) -> Self {
        Self {
            class_name: class_name.into(),
            added_lines: delta.lines,
            added_methods: delta.methods,
            added_branches: delta.branches,
            added_instructions: delta.instructions,
        }
    }
}

impl DeltaMetrics for ClassDelta {
    fn added_lines(&self) -> i64 {
        self.added_lines
    }
    fn added_methods(&self) -> i64 {
        self.added_methods
    }
    fn added_branches(&self) -> i64 {
        self.added_branches
    }
    fn added_instructions(&self) -> i64 {
        self.added_instructions
    }
}

/// Line-level changes a kept candidate makes in one class, range-encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDeltaRow {
    /// Candidate selector
    pub selector: TestSelector,
    /// Fully-qualified class name
    pub class_name: String,
    /// Lines with no prior hits that became hit
    pub newly_covered_ranges: String,
    /// Lines that went from partly to fully covered
    pub upgraded_to_full_ranges: String,
}
