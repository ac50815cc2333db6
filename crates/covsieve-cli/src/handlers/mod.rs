//! Command handlers, kept out of main.rs for testability
//!
//! Each handler module contains the execution logic for one subcommand
//! plus the pure helpers it is built from.

pub mod compare;
pub mod rank;
pub mod select;

pub use compare::execute_compare;
pub use rank::{execute_rank, select_top};
pub use select::{candidates_from_classes, check_divergence, execute_select};

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::file_config::FileConfig;
use crate::output::ProgressReporter;
use crate::RunnerArgs;
use covsieve::{CoverageAnalyzer, CoverageBackend, ForkedHarness, Granularity, JacocoBackend};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Single-threaded runtime driving the measurement rounds
pub(crate) fn runtime() -> CliResult<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::config(format!("failed to create runtime: {e}")))
}

/// Reporter honouring the global quiet and color flags
pub(crate) fn reporter(config: &CliConfig) -> ProgressReporter {
    ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet())
}

/// Resolve the runner settings and wire harness and analyzer to one backend
pub(crate) fn measurement_stack(
    runner: &RunnerArgs,
    granularity: Granularity,
) -> CliResult<(ForkedHarness, CoverageAnalyzer)> {
    let settings = FileConfig::resolve(runner)?;
    settings.validate()?;
    tracing::debug!(?settings, "resolved measurement settings");

    let backend: Arc<dyn CoverageBackend> = Arc::new(JacocoBackend::new(settings.jacoco));
    let harness = ForkedHarness::new(settings.harness, Arc::clone(&backend));
    let analyzer = CoverageAnalyzer::new(backend).with_granularity(granularity);
    Ok((harness, analyzer))
}
