//! Rank command handler

use crate::commands::RankArgs;
use crate::config::CliConfig;
use crate::error::CliResult;
use covsieve::report::write_selector_list;
use covsieve::{read_test_deltas, top_n, TestDelta, TestSelector};
use std::io::Write;

/// Execute the rank command
pub fn execute_rank(config: &CliConfig, args: &RankArgs) -> CliResult<()> {
    let deltas = read_test_deltas(&args.deltas)?;
    let total = deltas.len();
    let top = select_top(deltas, args.top, !args.no_sort);
    tracing::info!(total, kept = top.len(), "ranked test deltas");

    if config.verbosity.is_verbose() {
        for delta in &top {
            eprintln!(
                "{:>6} lines {:>6} instr {:>5} branches {:>4} methods  {}",
                delta.added_lines,
                delta.added_instructions,
                delta.added_branches,
                delta.added_methods,
                delta.selector
            );
        }
    }
    let selectors: Vec<TestSelector> = top.into_iter().map(|delta| delta.selector).collect();

    if let Some(path) = &args.output {
        write_selector_list(path, &selectors)?;
        if !config.verbosity.is_quiet() {
            eprintln!(
                "Wrote {} of {total} selectors to {}",
                selectors.len(),
                path.display()
            );
        }
    } else {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for selector in &selectors {
            writeln!(out, "{selector}")?;
        }
    }
    Ok(())
}

/// First `top` deltas, ranked unless `sort` is off
#[must_use]
pub fn select_top(mut deltas: Vec<TestDelta>, top: usize, sort: bool) -> Vec<TestDelta> {
    if sort {
        return top_n(deltas, top);
    }
    deltas.truncate(top);
    deltas
}
