//! Coverage analyzer
//!
//! Turns execution records into [`CoverageSet`] values for the selection
//! loop, and into test, class and line deltas for reports. Everything here
//! is a pure function of the records it is given.

use crate::algebra::{CoverageSet, CoverageUnit};
use crate::backend::{CounterKind, CoverageBackend, CoverageSnapshot, LineStatus};
use crate::delta::{ClassDelta, CounterDelta, DeltaMetrics, TestDelta};
use crate::ranking::rank;
use crate::record::ExecutionRecord;
use crate::result::AnalysisError;
use crate::selector::TestSelector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// What a single coverage unit identifies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// `pkg/Cls::method|LINE` and `pkg/Cls::method|BRANCH`
    #[default]
    Method,
    /// `pkg/Cls:<line>` for every executed source line
    Line,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method => write!(f, "method"),
            Self::Line => write!(f, "line"),
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "method" => Ok(Self::Method),
            "line" => Ok(Self::Line),
            other => Err(format!("unknown granularity: {other}")),
        }
    }
}

/// Line-level changes within one class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineChanges {
    /// Lines without hits before that have hits now
    pub newly_covered: BTreeSet<u32>,
    /// Lines that went from partly to fully covered
    pub upgraded_to_full: BTreeSet<u32>,
}

impl LineChanges {
    /// Whether nothing changed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.newly_covered.is_empty() && self.upgraded_to_full.is_empty()
    }
}

/// Reads records through a backend and derives sets and deltas
#[derive(Debug, Clone)]
pub struct CoverageAnalyzer {
    backend: Arc<dyn CoverageBackend>,
    granularity: Granularity,
}

impl CoverageAnalyzer {
    /// Create an analyzer at method granularity
    #[must_use]
    pub fn new(backend: Arc<dyn CoverageBackend>) -> Self {
        Self {
            backend,
            granularity: Granularity::default(),
        }
    }

    /// Set the unit granularity
    #[must_use]
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Unit granularity in use
    #[must_use]
    pub const fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Load the structured view of a record
    pub fn load(&self, record: &ExecutionRecord) -> Result<CoverageSnapshot, AnalysisError> {
        let snapshot = self.backend.load(record)?;
        debug!(
            path = %record.path().display(),
            classes = snapshot.len(),
            backend = self.backend.name(),
            "loaded capture"
        );
        Ok(snapshot)
    }

    /// Coverage units of a record
    pub fn analyze(&self, record: &ExecutionRecord) -> Result<CoverageSet, AnalysisError> {
        Ok(self.units(&self.load(record)?))
    }

    /// Coverage units of an already loaded snapshot
    #[must_use]
    pub fn units(&self, snapshot: &CoverageSnapshot) -> CoverageSet {
        let mut units = Vec::new();
        for (_, class) in snapshot.classes() {
            match self.granularity {
                Granularity::Method => {
                    for method in &class.methods {
                        let key = format!("{}::{}", class.internal_name, method.name);
                        if method.counters.line.covered > 0 {
                            units.push(CoverageUnit::new(format!("{key}|LINE")));
                        }
                        if method.counters.branch.covered > 0 {
                            units.push(CoverageUnit::new(format!("{key}|BRANCH")));
                        }
                    }
                }
                Granularity::Line => {
                    units.extend(
                        class
                            .lines
                            .iter()
                            .filter(|(_, line)| line.is_hit())
                            .map(|(nr, _)| {
                                CoverageUnit::new(format!("{}:{nr}", class.internal_name))
                            }),
                    );
                }
            }
        }
        units.into_iter().collect()
    }

    /// Totals a candidate record adds over the baseline record
    pub fn test_delta_totals(
        &self,
        baseline: &ExecutionRecord,
        candidate: &ExecutionRecord,
        selector: &TestSelector,
    ) -> Result<TestDelta, AnalysisError> {
        test_delta_between(&self.load(baseline)?, &self.load(candidate)?, selector)
    }

    /// Per-class changes from baseline to final, ranked
    pub fn per_class_delta(
        &self,
        baseline: &ExecutionRecord,
        final_record: &ExecutionRecord,
    ) -> Result<Vec<ClassDelta>, AnalysisError> {
        class_deltas_between(&self.load(baseline)?, &self.load(final_record)?)
    }

    /// Lines a candidate newly covers or upgrades to fully covered
    pub fn newly_covered_lines(
        &self,
        baseline: &ExecutionRecord,
        candidate: &ExecutionRecord,
    ) -> Result<BTreeMap<String, LineChanges>, AnalysisError> {
        line_changes_between(&self.load(baseline)?, &self.load(candidate)?)
    }
}

/// Signed totals of `candidate` minus `baseline`
pub fn test_delta_between(
    baseline: &CoverageSnapshot,
    candidate: &CoverageSnapshot,
    selector: &TestSelector,
) -> Result<TestDelta, AnalysisError> {
    check_structure(baseline, candidate)?;
    let diff = |kind| signed(candidate.total_covered(kind)) - signed(baseline.total_covered(kind));
    Ok(TestDelta::new(
        selector.clone(),
        CounterDelta {
            lines: diff(CounterKind::Line),
            methods: diff(CounterKind::Method),
            branches: diff(CounterKind::Branch),
            instructions: diff(CounterKind::Instruction),
        },
    ))
}

/// Non-zero per-class changes, ranked with class-name order as the base
pub fn class_deltas_between(
    baseline: &CoverageSnapshot,
    final_snapshot: &CoverageSnapshot,
) -> Result<Vec<ClassDelta>, AnalysisError> {
    check_structure(baseline, final_snapshot)?;

    let deltas = final_snapshot
        .classes()
        .filter_map(|(name, class)| {
            let base = baseline.class(name).map(|c| c.counters).unwrap_or_default();
            let diff = |kind| {
                signed(class.counters.get(kind).covered) - signed(base.get(kind).covered)
            };
            let delta = ClassDelta::new(
                name,
                CounterDelta {
                    lines: diff(CounterKind::Line),
                    methods: diff(CounterKind::Method),
                    branches: diff(CounterKind::Branch),
                    instructions: diff(CounterKind::Instruction),
                },
            );
            (!delta.is_zero()).then_some(delta)
        })
        .collect();
    Ok(rank(deltas))
}

/// Per-class line changes from `baseline` to `candidate`
pub fn line_changes_between(
    baseline: &CoverageSnapshot,
    candidate: &CoverageSnapshot,
) -> Result<BTreeMap<String, LineChanges>, AnalysisError> {
    check_structure(baseline, candidate)?;

    let mut changes = BTreeMap::new();
    for (name, class) in candidate.classes() {
        let before = baseline.class(name);
        let mut class_changes = LineChanges::default();

        for (&nr, line) in &class.lines {
            let prior = before.and_then(|c| c.lines.get(&nr));
            if line.is_hit() && !prior.is_some_and(|p| p.is_hit()) {
                let _ = class_changes.newly_covered.insert(nr);
            }
            if line.status() == LineStatus::FullyCovered
                && prior.is_some_and(|p| p.status() == LineStatus::PartlyCovered)
            {
                let _ = class_changes.upgraded_to_full.insert(nr);
            }
        }

        if !class_changes.is_empty() {
            let _ = changes.insert(name.to_string(), class_changes);
        }
    }
    Ok(changes)
}

/// Classes present in both snapshots must have identical counter totals
fn check_structure(a: &CoverageSnapshot, b: &CoverageSnapshot) -> Result<(), AnalysisError> {
    for (name, class_a) in a.classes() {
        let Some(class_b) = b.class(name) else {
            continue;
        };
        for kind in CounterKind::ALL {
            let (total_a, total_b) = (
                class_a.counters.get(kind).total(),
                class_b.counters.get(kind).total(),
            );
            if total_a != total_b {
                return Err(AnalysisError::StructureMismatch {
                    class_name: name.to_string(),
                    counter: kind.as_str(),
                    baseline: total_a,
                    candidate: total_b,
                });
            }
        }
    }
    Ok(())
}

fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
