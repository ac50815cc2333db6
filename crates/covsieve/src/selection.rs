//! Greedy incremental test selection
//!
//! Candidates are measured one at a time, each together with the baseline
//! suite, in a fresh process. A candidate is kept when its coverage reaches
//! anything the accumulated coverage does not; the accumulator then grows
//! by that coverage. Deltas for reports are always taken against the
//! pristine baseline, while keep/drop is decided against the accumulator.
//!
//! The result covers everything the full pool covers. It is not a minimum
//! cover.

use crate::algebra::CoverageSet;
use crate::analyzer::{
    class_deltas_between, line_changes_between, test_delta_between, CoverageAnalyzer,
    LineChanges,
};
use crate::delta::{ClassDelta, LineDeltaRow, TestDelta};
use crate::harness::Harness;
use crate::ranges::encode_ranges;
use crate::ranking::rank;
use crate::record::ExecutionRecord;
use crate::result::{AnalysisError, CovsieveError, CovsieveResult, HarnessError};
use crate::selector::TestSelector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Keep/drop verdict for one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Added coverage beyond the accumulator
    Kept,
    /// Added nothing new
    Dropped,
}

/// Receives progress events from a selection run
pub trait SelectionObserver: Send + Sync {
    /// The baseline round is about to run
    fn baseline_started(&self, _selectors: &[TestSelector]) {}

    /// The baseline round was analyzed
    fn baseline_finished(&self, _coverage: &CoverageSet) {}

    /// A candidate round is about to run
    fn candidate_started(&self, _index: usize, _total: usize, _selector: &TestSelector) {}

    /// A candidate was measured and judged
    fn candidate_finished(&self, _index: usize, _delta: &TestDelta, _decision: Decision) {}

    /// The verification round is about to run
    fn verification_started(&self, _kept: &[TestSelector]) {}

    /// The run is complete
    fn finished(&self, _outcome: &SelectionOutcome) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SelectionObserver for NoopObserver {}

/// Everything measured for one candidate round
#[derive(Debug, Clone)]
pub struct CandidateMeasurement {
    /// Candidate selector
    pub selector: TestSelector,
    /// Units covered by baseline plus candidate
    pub coverage: CoverageSet,
    /// Totals relative to the pristine baseline
    pub delta: TestDelta,
    /// Line changes relative to the pristine baseline, per class
    pub line_changes: BTreeMap<String, LineChanges>,
}

/// Accumulator threaded through the selection loop
#[derive(Debug, Clone)]
pub struct SelectionState {
    current: CoverageSet,
    kept: Vec<TestSelector>,
    all_deltas: Vec<TestDelta>,
    kept_deltas: Vec<TestDelta>,
    line_rows: Vec<LineDeltaRow>,
}

impl SelectionState {
    /// Start from the baseline coverage
    #[must_use]
    pub fn new(baseline: CoverageSet) -> Self {
        Self {
            current: baseline,
            kept: Vec::new(),
            all_deltas: Vec::new(),
            kept_deltas: Vec::new(),
            line_rows: Vec::new(),
        }
    }

    /// Judge one candidate and fold it into the state
    #[must_use]
    pub fn fold(mut self, measurement: CandidateMeasurement) -> (Self, Decision) {
        let CandidateMeasurement {
            selector,
            coverage,
            delta,
            line_changes,
        } = measurement;

        let decision = if coverage.adds_anything_beyond(&self.current) {
            self.current = self.current.union(&coverage);
            self.line_rows
                .extend(line_changes.into_iter().map(|(class_name, changes)| {
                    LineDeltaRow {
                        selector: selector.clone(),
                        class_name,
                        newly_covered_ranges: encode_ranges(changes.newly_covered),
                        upgraded_to_full_ranges: encode_ranges(changes.upgraded_to_full),
                    }
                }));
            self.kept_deltas.push(delta.clone());
            self.kept.push(selector);
            Decision::Kept
        } else {
            Decision::Dropped
        };
        self.all_deltas.push(delta);
        (self, decision)
    }

    /// Accumulated coverage
    #[must_use]
    pub fn current(&self) -> &CoverageSet {
        &self.current
    }

    /// Kept selectors in discovery order
    #[must_use]
    pub fn kept(&self) -> &[TestSelector] {
        &self.kept
    }
}

/// Whether the verification round reproduced the accumulated coverage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Identical coverage
    Consistent,
    /// The verification round covered a different set
    Diverged {
        /// Accumulated units the verification round did not cover
        missing: CoverageSet,
        /// Units only the verification round covered
        unexpected: CoverageSet,
    },
}

impl VerificationOutcome {
    /// Compare accumulated coverage against the verification round
    #[must_use]
    pub fn check(accumulated: &CoverageSet, verified: &CoverageSet) -> Self {
        if accumulated == verified {
            Self::Consistent
        } else {
            Self::Diverged {
                missing: accumulated.subtract(verified),
                unexpected: verified.subtract(accumulated),
            }
        }
    }

    /// Whether the two sets matched
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        matches!(self, Self::Consistent)
    }
}

/// Result of a full selection run
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    /// Baseline selectors
    pub baseline: Vec<TestSelector>,
    /// Kept candidates in discovery order
    pub kept: Vec<TestSelector>,
    /// Deltas of every candidate, in report order
    pub all_deltas: Vec<TestDelta>,
    /// Deltas of kept candidates, in report order
    pub kept_deltas: Vec<TestDelta>,
    /// Line changes of kept candidates, in discovery order
    pub line_rows: Vec<LineDeltaRow>,
    /// Per-class changes from baseline to the verification round, ranked
    pub class_deltas: Vec<ClassDelta>,
    /// Baseline coverage
    pub baseline_coverage: CoverageSet,
    /// Accumulated coverage after the last candidate
    pub final_coverage: CoverageSet,
    /// Verification verdict
    pub verification: VerificationOutcome,
}

impl SelectionOutcome {
    /// Serializable counts for `summary.json`
    #[must_use]
    pub fn summary(&self) -> SelectionSummary {
        let (missing_units, unexpected_units) = match &self.verification {
            VerificationOutcome::Consistent => (0, 0),
            VerificationOutcome::Diverged {
                missing,
                unexpected,
            } => (missing.len(), unexpected.len()),
        };
        SelectionSummary {
            baseline_selectors: self.baseline.len(),
            candidates: self.all_deltas.len(),
            kept: self.kept.len(),
            baseline_units: self.baseline_coverage.len(),
            final_units: self.final_coverage.len(),
            consistent: self.verification.is_consistent(),
            missing_units,
            unexpected_units,
        }
    }
}

/// Run counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSummary {
    /// Number of baseline selectors
    pub baseline_selectors: usize,
    /// Number of candidates measured
    pub candidates: usize,
    /// Number of candidates kept
    pub kept: usize,
    /// Units covered by the baseline
    pub baseline_units: usize,
    /// Units covered after selection
    pub final_units: usize,
    /// Whether verification reproduced the accumulated coverage
    pub consistent: bool,
    /// Accumulated units missing from verification
    pub missing_units: usize,
    /// Units only verification covered
    pub unexpected_units: usize,
}

/// Coverage of one class-level comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonOutcome {
    /// Units covered by the baseline class
    pub baseline_units: CoverageSet,
    /// Units covered by the candidate class
    pub candidate_units: CoverageSet,
    /// Units only the candidate class covers
    pub candidate_only_units: CoverageSet,
}

/// Drives measurement rounds and folds their results
pub struct GreedySelector<H: Harness> {
    harness: H,
    analyzer: CoverageAnalyzer,
    work_dir: PathBuf,
    observer: Arc<dyn SelectionObserver>,
}

impl<H: Harness> std::fmt::Debug for GreedySelector<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreedySelector")
            .field("analyzer", &self.analyzer)
            .field("work_dir", &self.work_dir)
            .finish_non_exhaustive()
    }
}

impl<H: Harness> GreedySelector<H> {
    /// Create a selector writing captures under `work_dir`
    #[must_use]
    pub fn new(harness: H, analyzer: CoverageAnalyzer, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            harness,
            analyzer,
            work_dir: work_dir.into(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Report progress to `observer`
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SelectionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Directory holding the captures
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn record_path(&self, stem: &str) -> PathBuf {
        self.work_dir
            .join(format!("{stem}.{}", self.harness.record_extension()))
    }

    async fn prepare_work_dir(&self) -> CovsieveResult<()> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|source| {
                CovsieveError::from(HarnessError::Io {
                    path: self.work_dir.clone(),
                    source,
                })
            })
    }

    /// Select the candidates that add coverage beyond `baseline`.
    ///
    /// Candidates are processed in the order given. Any failed round or
    /// unreadable capture aborts the run.
    pub async fn select(
        &self,
        baseline: &[TestSelector],
        candidates: &[TestSelector],
    ) -> CovsieveResult<SelectionOutcome> {
        if baseline.is_empty() {
            return Err(CovsieveError::configuration(
                "baseline selector set is empty",
            ));
        }
        self.prepare_work_dir().await?;

        self.observer.baseline_started(baseline);
        let baseline_record = self
            .harness
            .run(baseline, &self.record_path("baseline"), false)
            .await?;
        let baseline_snapshot = self
            .analyzer
            .load(&baseline_record)
            .map_err(round_analysis(baseline))?;
        let baseline_coverage = self.analyzer.units(&baseline_snapshot);
        info!(
            selectors = baseline.len(),
            units = baseline_coverage.len(),
            "baseline measured"
        );
        self.observer.baseline_finished(&baseline_coverage);

        let mut state = SelectionState::new(baseline_coverage.clone());
        for (index, candidate) in candidates.iter().enumerate() {
            self.observer
                .candidate_started(index, candidates.len(), candidate);

            let record = self
                .harness
                .run(
                    &with_selector(baseline, candidate),
                    &self.record_path(&format!("cand_{index}")),
                    false,
                )
                .await?;
            let measurement = self
                .measure(&baseline_snapshot, &record, candidate)
                .map_err(|source| CovsieveError::CandidateAnalysis {
                    selector: candidate.clone(),
                    source,
                })?;

            let delta = measurement.delta.clone();
            let (next, decision) = state.fold(measurement);
            state = next;
            match decision {
                Decision::Kept => info!(
                    test = %candidate,
                    added_lines = delta.added_lines,
                    units = state.current().len(),
                    "kept"
                ),
                Decision::Dropped => info!(test = %candidate, "dropped"),
            }
            self.observer.candidate_finished(index, &delta, decision);
        }

        let SelectionState {
            current,
            kept,
            all_deltas,
            kept_deltas,
            line_rows,
        } = state;

        self.observer.verification_started(&kept);
        let final_selectors = kept
            .iter()
            .fold(baseline.to_vec(), |acc, s| with_selector(&acc, s));
        let final_record = self
            .harness
            .run(&final_selectors, &self.record_path("final"), false)
            .await?;
        let final_snapshot = self
            .analyzer
            .load(&final_record)
            .map_err(round_analysis(&final_selectors))?;
        let verified = self.analyzer.units(&final_snapshot);
        let class_deltas = class_deltas_between(&baseline_snapshot, &final_snapshot)
            .map_err(round_analysis(&final_selectors))?;

        let verification = VerificationOutcome::check(&current, &verified);
        if let VerificationOutcome::Diverged {
            missing,
            unexpected,
        } = &verification
        {
            error!(
                missing = missing.len(),
                unexpected = unexpected.len(),
                "verification round diverged from accumulated coverage"
            );
        } else {
            debug!(units = current.len(), "verification consistent");
        }

        let outcome = SelectionOutcome {
            baseline: baseline.to_vec(),
            kept,
            all_deltas: rank(all_deltas),
            kept_deltas: rank(kept_deltas),
            line_rows,
            class_deltas,
            baseline_coverage,
            final_coverage: current,
            verification,
        };
        self.observer.finished(&outcome);
        Ok(outcome)
    }

    fn measure(
        &self,
        baseline: &crate::backend::CoverageSnapshot,
        record: &ExecutionRecord,
        candidate: &TestSelector,
    ) -> Result<CandidateMeasurement, AnalysisError> {
        let snapshot = self.analyzer.load(record)?;
        Ok(CandidateMeasurement {
            selector: candidate.clone(),
            coverage: self.analyzer.units(&snapshot),
            delta: test_delta_between(baseline, &snapshot, candidate)?,
            line_changes: line_changes_between(baseline, &snapshot)?,
        })
    }

    /// Measure two test classes in separate rounds and compare their units
    pub async fn compare(
        &self,
        baseline_class: &TestSelector,
        candidate_class: &TestSelector,
    ) -> CovsieveResult<ComparisonOutcome> {
        self.prepare_work_dir().await?;

        let baseline_record = self
            .harness
            .run(
                std::slice::from_ref(baseline_class),
                &self.record_path("compare_baseline"),
                false,
            )
            .await?;
        let candidate_record = self
            .harness
            .run(
                std::slice::from_ref(candidate_class),
                &self.record_path("compare_candidate"),
                false,
            )
            .await?;

        let baseline_units = self
            .analyzer
            .analyze(&baseline_record)
            .map_err(round_analysis(std::slice::from_ref(baseline_class)))?;
        let candidate_units = self
            .analyzer
            .analyze(&candidate_record)
            .map_err(round_analysis(std::slice::from_ref(candidate_class)))?;
        let candidate_only_units = candidate_units.subtract(&baseline_units);
        info!(
            baseline = baseline_units.len(),
            candidate = candidate_units.len(),
            candidate_only = candidate_only_units.len(),
            "class comparison"
        );

        Ok(ComparisonOutcome {
            baseline_units,
            candidate_units,
            candidate_only_units,
        })
    }
}

/// Attach the round's selectors to an analysis failure
fn round_analysis(
    selectors: &[TestSelector],
) -> impl FnOnce(AnalysisError) -> CovsieveError + '_ {
    move |source| CovsieveError::RoundAnalysis {
        selectors: selectors.to_vec(),
        source,
    }
}

/// `selectors` plus `extra`, unless already present
fn with_selector(selectors: &[TestSelector], extra: &TestSelector) -> Vec<TestSelector> {
    let mut out = selectors.to_vec();
    if !out.contains(extra) {
        out.push(extra.clone());
    }
    out
}
