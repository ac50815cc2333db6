//! Coverage backends
//!
//! A backend knows two things about a coverage tool: the argument that
//! attaches its agent to a measurement process, and how to turn the
//! resulting capture into a [`CoverageSnapshot`]. Everything above this
//! seam works on snapshots only.

mod jacoco;

pub use jacoco::{parse_jacoco_xml, JacocoBackend, JacocoConfig};

use crate::record::ExecutionRecord;
use crate::result::AnalysisError;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Coverage tool integration used by the harness and the analyzer
pub trait CoverageBackend: Send + Sync + fmt::Debug {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// File extension of raw captures, without the dot
    fn record_extension(&self) -> &str;

    /// JVM argument attaching the agent so it writes to `destination`
    fn agent_argument(&self, destination: &Path, append: bool) -> String;

    /// Read a capture into structured per-class coverage
    fn load(&self, record: &ExecutionRecord) -> Result<CoverageSnapshot, AnalysisError>;
}

/// Counter kinds reported per class and per method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CounterKind {
    /// Bytecode instructions
    Instruction,
    /// Source lines
    Line,
    /// Branches
    Branch,
    /// Methods
    Method,
}

impl CounterKind {
    /// Every tracked counter kind
    pub const ALL: [Self; 4] = [Self::Instruction, Self::Line, Self::Branch, Self::Method];

    /// Upper-case name as it appears in JaCoCo reports
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Instruction => "INSTRUCTION",
            Self::Line => "LINE",
            Self::Branch => "BRANCH",
            Self::Method => "METHOD",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "INSTRUCTION" => Some(Self::Instruction),
            "LINE" => Some(Self::Line),
            "BRANCH" => Some(Self::Branch),
            "METHOD" => Some(Self::Method),
            _ => None,
        }
    }
}

/// Missed/covered pair for one counter kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter {
    /// Items not executed
    pub missed: u64,
    /// Items executed
    pub covered: u64,
}

impl Counter {
    /// Create a counter
    #[must_use]
    pub const fn new(missed: u64, covered: u64) -> Self {
        Self { missed, covered }
    }

    /// Missed plus covered, saturating at `u64::MAX`
    #[must_use]
    pub const fn total(self) -> u64 {
        self.missed.saturating_add(self.covered)
    }
}

/// The four counters of a class or method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Instruction counter
    pub instruction: Counter,
    /// Line counter
    pub line: Counter,
    /// Branch counter
    pub branch: Counter,
    /// Method counter
    pub method: Counter,
}

impl Counters {
    /// Counter of the given kind
    #[must_use]
    pub const fn get(&self, kind: CounterKind) -> Counter {
        match kind {
            CounterKind::Instruction => self.instruction,
            CounterKind::Line => self.line,
            CounterKind::Branch => self.branch,
            CounterKind::Method => self.method,
        }
    }

    /// Replace the counter of the given kind
    pub fn set(&mut self, kind: CounterKind, counter: Counter) {
        match kind {
            CounterKind::Instruction => self.instruction = counter,
            CounterKind::Line => self.line = counter,
            CounterKind::Branch => self.branch = counter,
            CounterKind::Method => self.method = counter,
        }
    }
}

/// Coverage state of a source line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    /// No instructions on this line
    Empty,
    /// Nothing executed
    NotCovered,
    /// Some instructions or branches missed
    PartlyCovered,
    /// Everything executed
    FullyCovered,
}

/// Instruction and branch counts for a single source line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCoverage {
    /// Missed instructions
    pub missed_instructions: u64,
    /// Covered instructions
    pub covered_instructions: u64,
    /// Missed branches
    pub missed_branches: u64,
    /// Covered branches
    pub covered_branches: u64,
}

impl LineCoverage {
    /// Classify the line
    #[must_use]
    pub const fn status(&self) -> LineStatus {
        if self.missed_instructions == 0 && self.covered_instructions == 0 {
            LineStatus::Empty
        } else if self.covered_instructions == 0 {
            LineStatus::NotCovered
        } else if self.missed_instructions > 0 || self.missed_branches > 0 {
            LineStatus::PartlyCovered
        } else {
            LineStatus::FullyCovered
        }
    }

    /// At least one instruction executed
    #[must_use]
    pub const fn is_hit(&self) -> bool {
        self.covered_instructions > 0
    }
}

/// Counters of one method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCoverage {
    /// Method name (`<init>` for constructors)
    pub name: String,
    /// JVM descriptor
    pub desc: String,
    /// First source line, if known
    pub first_line: Option<u32>,
    /// Method counters
    pub counters: Counters,
}

/// Coverage of one class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCoverage {
    /// Internal, slash-separated name (`com/acme/Foo`)
    pub internal_name: String,
    /// Source file name, if recorded
    pub source_file: Option<String>,
    /// Class counters
    pub counters: Counters,
    /// Methods in report order
    pub methods: Vec<MethodCoverage>,
    /// Per-line coverage keyed by line number
    pub lines: BTreeMap<u32, LineCoverage>,
}

impl ClassCoverage {
    /// Create an empty class entry
    #[must_use]
    pub fn new(internal_name: impl Into<String>) -> Self {
        Self {
            internal_name: internal_name.into(),
            source_file: None,
            counters: Counters::default(),
            methods: Vec::new(),
            lines: BTreeMap::new(),
        }
    }

    /// Dot-separated fully-qualified name
    #[must_use]
    pub fn qualified_name(&self) -> String {
        self.internal_name.replace('/', ".")
    }
}

/// Structured view of one execution record, keyed by qualified class name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageSnapshot {
    classes: BTreeMap<String, ClassCoverage>,
}

impl CoverageSnapshot {
    /// Empty snapshot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a class
    pub fn insert(&mut self, class: ClassCoverage) {
        let _ = self.classes.insert(class.qualified_name(), class);
    }

    /// Look up a class by qualified name
    #[must_use]
    pub fn class(&self, qualified_name: &str) -> Option<&ClassCoverage> {
        self.classes.get(qualified_name)
    }

    /// Classes ordered by qualified name
    pub fn classes(&self) -> impl Iterator<Item = (&str, &ClassCoverage)> {
        self.classes.iter().map(|(name, class)| (name.as_str(), class))
    }

    /// Number of classes
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the snapshot holds no classes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Covered count of a counter kind summed over all classes
    #[must_use]
    pub fn total_covered(&self, kind: CounterKind) -> u64 {
        self.classes
            .values()
            .map(|class| class.counters.get(kind).covered)
            .fold(0, u64::saturating_add)
    }
}
