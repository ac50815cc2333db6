//! Covsieve CLI: keep only the tests that add coverage
//!
//! ## Usage
//!
//! ```bash
//! covsieve select --baseline manual.txt --candidates generated.txt \
//!     --jacoco-agent jacocoagent.jar --lib-dir libs --sut-classes build/classes
//! covsieve compare --baseline-class com.acme.ManualTest --candidate-class com.acme.GenTest
//! covsieve rank --deltas target/covsieve/test_deltas_all.csv --top 50
//! ```

use clap::Parser;
use covsieve_cli::{
    handlers::{execute_compare, execute_rank, execute_select},
    logging::init_tracing,
    Cli, CliConfig, CliResult, ColorChoice, Commands,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(config.verbosity);

    match &cli.command {
        Commands::Select(args) => execute_select(&config, args),
        Commands::Compare(args) => execute_compare(&config, args),
        Commands::Rank(args) => execute_rank(&config, args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = CliConfig::verbosity_from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.into();
    if color == ColorChoice::Never {
        console::set_colors_enabled_stderr(false);
    }
    CliConfig::new().with_verbosity(verbosity).with_color(color)
}
