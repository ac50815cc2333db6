//! Covsieve CLI library
//!
//! Command-line surface for coverage-guided test selection: argument
//! parsing, run configuration, terminal output and one handler per
//! subcommand.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod file_config;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{
    Cli, ColorArg, Commands, CompareArgs, FormatArg, GranularityArg, RankArgs, RunnerArgs,
    SelectArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use file_config::FileConfig;
pub use output::{ProgressReporter, SelectionProgress};
