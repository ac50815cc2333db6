//! Compare command handler

use super::{measurement_stack, reporter, runtime};
use crate::commands::{CompareArgs, FormatArg};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use covsieve::{ComparisonOutcome, GreedySelector, TestSelector};
use serde::Serialize;

/// JSON shape of a class comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonReport {
    /// Reference class
    pub baseline_class: String,
    /// Compared class
    pub candidate_class: String,
    /// Units covered by the reference class
    pub baseline_units: usize,
    /// Units covered by the compared class
    pub candidate_units: usize,
    /// Units only the compared class covers
    pub candidate_only_units: usize,
    /// Those units, when listing was requested
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<String>,
}

impl ComparisonReport {
    /// Summarize `outcome`
    #[must_use]
    pub fn new(
        baseline: &TestSelector,
        candidate: &TestSelector,
        outcome: &ComparisonOutcome,
        list_units: bool,
    ) -> Self {
        let units = if list_units {
            outcome
                .candidate_only_units
                .iter()
                .map(|unit| unit.as_str().to_string())
                .collect()
        } else {
            Vec::new()
        };
        Self {
            baseline_class: baseline.to_string(),
            candidate_class: candidate.to_string(),
            baseline_units: outcome.baseline_units.len(),
            candidate_units: outcome.candidate_units.len(),
            candidate_only_units: outcome.candidate_only_units.len(),
            units,
        }
    }
}

/// Parse a class argument, rejecting method selectors
pub fn parse_class(value: &str, flag: &str) -> CliResult<TestSelector> {
    let selector = TestSelector::parse(value)
        .map_err(|e| CliError::invalid_argument(format!("{flag}: {e}")))?;
    if !selector.is_class_only() {
        return Err(CliError::invalid_argument(format!(
            "{flag} expects a class, got method selector {selector}"
        )));
    }
    Ok(selector)
}

/// Execute the compare command
pub fn execute_compare(config: &CliConfig, args: &CompareArgs) -> CliResult<()> {
    let baseline = parse_class(&args.baseline_class, "--baseline-class")?;
    let candidate = parse_class(&args.candidate_class, "--candidate-class")?;

    let (harness, analyzer) = measurement_stack(&args.runner, args.granularity.into())?;
    let selector = GreedySelector::new(harness, analyzer, &args.runner.work_dir);
    let outcome = runtime()?.block_on(selector.compare(&baseline, &candidate))?;

    match args.format {
        FormatArg::Json => {
            let report = ComparisonReport::new(&baseline, &candidate, &outcome, args.list_units);
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| CliError::report_generation(e.to_string()))?;
            println!("{json}");
        }
        FormatArg::Text => reporter(config).comparison(&outcome, args.list_units),
    }
    Ok(())
}
