//! Output formatting and progress reporting

use console::{style, Style, Term};
use covsieve::{
    ComparisonOutcome, CoverageSet, Decision, SelectionObserver, SelectionOutcome,
    SelectionSummary, TestDelta, TestSelector, VerificationOutcome,
};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::PathBuf;

/// Status lines on stderr
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            use_color,
            quiet,
        }
    }

    fn line(&self, symbol: &str, plain: &str, paint: fn(&str) -> String, message: &str) {
        let prefix = if self.use_color {
            paint(symbol)
        } else {
            plain.to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line("✓", "KEEP", |s| style(s).green().bold().to_string(), message);
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always printed, even in quiet mode
        self.line("✗", "FAIL", |s| style(s).red().bold().to_string(), message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line("⚠", "WARN", |s| style(s).yellow().bold().to_string(), message);
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line("ℹ", "INFO", |s| style(s).blue().bold().to_string(), message);
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// Print the selection summary
    pub fn selection_summary(&self, summary: &SelectionSummary, written: &[PathBuf]) {
        let diverged = !summary.consistent;
        if self.quiet && !diverged {
            return;
        }

        self.header("Selection");
        let kept = format!("{}/{}", summary.kept, summary.candidates);
        let kept = if self.use_color {
            Style::new().green().bold().apply_to(kept).to_string()
        } else {
            kept
        };
        let _ = self.term.write_line(&format!(
            "kept {kept} candidates; coverage {} -> {} units",
            summary.baseline_units, summary.final_units
        ));

        if diverged {
            self.failure(&format!(
                "verification diverged: {} missing, {} unexpected units",
                summary.missing_units, summary.unexpected_units
            ));
        } else {
            self.info("verification round reproduced the accumulated coverage");
        }
        for path in written {
            self.info(&format!("wrote {}", path.display()));
        }
    }

    /// Print a class comparison
    pub fn comparison(&self, outcome: &ComparisonOutcome, list_units: bool) {
        if self.quiet {
            return;
        }
        self.header("Comparison");
        let _ = self.term.write_line(&format!(
            "baseline units: {}\ncandidate units: {}\ncandidate-only units: {}",
            outcome.baseline_units.len(),
            outcome.candidate_units.len(),
            outcome.candidate_only_units.len()
        ));
        if list_units {
            for unit in outcome.candidate_only_units.iter() {
                let _ = self.term.write_line(&format!("  {unit}"));
            }
        }
    }
}

/// Progress bar over candidate rounds, driven by the selector
#[derive(Debug)]
pub struct SelectionProgress {
    reporter: ProgressReporter,
    bar: ProgressBar,
}

impl SelectionProgress {
    /// Create a progress display, hidden in quiet mode
    #[must_use]
    pub fn new(reporter: ProgressReporter) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self { reporter, bar }
    }
}

impl SelectionObserver for SelectionProgress {
    fn baseline_started(&self, selectors: &[TestSelector]) {
        self.reporter
            .info(&format!("measuring baseline ({} selectors)", selectors.len()));
    }

    fn baseline_finished(&self, coverage: &CoverageSet) {
        self.reporter
            .info(&format!("baseline covers {} units", coverage.len()));
    }

    fn candidate_started(&self, index: usize, total: usize, selector: &TestSelector) {
        if index == 0 && !self.reporter.quiet {
            self.bar.set_length(total as u64);
            self.bar.set_draw_target(ProgressDrawTarget::stderr());
        }
        self.bar.set_message(selector.to_string());
    }

    fn candidate_finished(&self, _index: usize, delta: &TestDelta, decision: Decision) {
        if decision == Decision::Kept && !self.reporter.quiet {
            let label = if self.reporter.use_color {
                style("✓").green().bold().to_string()
            } else {
                "KEEP".to_string()
            };
            self.bar.println(format!(
                "{label} {} (+{} lines)",
                delta.selector, delta.added_lines
            ));
        }
        self.bar.inc(1);
    }

    fn verification_started(&self, kept: &[TestSelector]) {
        self.bar.finish_and_clear();
        self.reporter
            .info(&format!("verifying baseline plus {} kept", kept.len()));
    }

    fn finished(&self, outcome: &SelectionOutcome) {
        if let VerificationOutcome::Diverged { missing, .. } = &outcome.verification {
            for unit in missing.iter().take(10) {
                self.reporter.warning(&format!("missing after verification: {unit}"));
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod progress_reporter_tests {
        use super::*;

        #[test]
        fn test_new_reporter() {
            let reporter = ProgressReporter::new(true, false);
            assert!(reporter.use_color);
            assert!(!reporter.quiet);
        }

        #[test]
        fn test_default_reporter() {
            let reporter = ProgressReporter::default();
            assert!(reporter.use_color);
            assert!(!reporter.quiet);
        }

        #[test]
        fn test_messages_do_not_panic() {
            let reporter = ProgressReporter::new(false, false);
            reporter.success("kept");
            reporter.failure("failed");
            reporter.warning("careful");
            reporter.info("note");
            reporter.header("Section");
        }

        #[test]
        fn test_summary_in_quiet_mode() {
            let reporter = ProgressReporter::new(false, true);
            let summary = SelectionSummary {
                baseline_selectors: 1,
                candidates: 3,
                kept: 1,
                baseline_units: 4,
                final_units: 5,
                consistent: false,
                missing_units: 1,
                unexpected_units: 0,
            };
            reporter.selection_summary(&summary, &[]);
        }
    }

    mod selection_progress_tests {
        use super::*;
        use covsieve::CounterDelta;

        #[test]
        fn test_observer_events_in_quiet_mode() {
            let progress = SelectionProgress::new(ProgressReporter::new(false, true));
            let selector = TestSelector::method("a.T", "m");
            progress.baseline_started(std::slice::from_ref(&selector));
            progress.candidate_started(0, 1, &selector);
            progress.candidate_finished(
                0,
                &TestDelta::new(selector.clone(), CounterDelta::default()),
                Decision::Dropped,
            );
            progress.verification_started(&[]);
            assert_eq!(progress.bar.position(), 1);
        }
    }
}
