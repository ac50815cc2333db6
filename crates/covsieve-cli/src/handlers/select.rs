//! Select command handler

use super::{measurement_stack, reporter, runtime};
use crate::commands::{FormatArg, SelectArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::SelectionProgress;
use covsieve::discovery::DiscoveredClass;
use covsieve::{
    read_selector_file, GreedySelector, JavaTestScanner, ReportWriter, SelectionSummary,
    TestSelector,
};
use std::sync::Arc;

/// Execute the select command
pub fn execute_select(config: &CliConfig, args: &SelectArgs) -> CliResult<()> {
    let reporter = reporter(config);

    let baseline = read_selector_file(&args.baseline)?;
    let candidates = match (&args.candidates, &args.candidate_sources) {
        (Some(list), _) => read_selector_file(list)?,
        (None, Some(root)) => {
            let scanner = JavaTestScanner::new()?;
            let classes = scanner.scan_dir(root)?;
            for class in classes.iter().filter(|c| c.classification.speculative) {
                reporter.warning(&format!(
                    "{}: no framework markers, assuming {}",
                    class.class_name, class.classification.framework
                ));
            }
            candidates_from_classes(&classes)
        }
        (None, None) => {
            return Err(CliError::invalid_argument(
                "one of --candidates or --candidate-sources is required",
            ));
        }
    };
    if candidates.is_empty() {
        reporter.warning("no candidate tests found; only the baseline will be measured");
    }
    reporter.info(&format!(
        "{} baseline selectors, {} candidates",
        baseline.len(),
        candidates.len()
    ));

    let (harness, analyzer) = measurement_stack(&args.runner, args.granularity.into())?;
    let selector = GreedySelector::new(harness, analyzer, &args.runner.work_dir)
        .with_observer(Arc::new(SelectionProgress::new(reporter.clone())));

    let outcome = runtime()?.block_on(selector.select(&baseline, &candidates))?;

    let written = ReportWriter::new(&args.output)
        .with_summary(args.summary)
        .write_selection(&outcome)?;
    let summary = outcome.summary();

    match args.format {
        FormatArg::Json => {
            let json = serde_json::to_string_pretty(&summary)
                .map_err(|e| CliError::report_generation(e.to_string()))?;
            println!("{json}");
        }
        FormatArg::Text => reporter.selection_summary(&summary, &written),
    }

    check_divergence(&summary, args.allow_divergence)
}

/// Candidate selectors in scan order, skipping classes without test methods
#[must_use]
pub fn candidates_from_classes(classes: &[DiscoveredClass]) -> Vec<TestSelector> {
    let mut seen = std::collections::HashSet::new();
    classes
        .iter()
        .flat_map(DiscoveredClass::selectors)
        .filter(|selector| seen.insert(selector.clone()))
        .collect()
}

/// Fail the run on divergence unless it was explicitly accepted
pub fn check_divergence(summary: &SelectionSummary, allow: bool) -> CliResult<()> {
    if summary.consistent {
        return Ok(());
    }
    if allow {
        tracing::warn!(
            missing = summary.missing_units,
            unexpected = summary.unexpected_units,
            "accepting diverged verification round"
        );
        return Ok(());
    }
    Err(CliError::Divergence {
        missing: summary.missing_units,
        unexpected: summary.unexpected_units,
    })
}
