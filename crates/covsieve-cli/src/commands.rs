//! CLI command definitions using clap

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use covsieve::Granularity;
use std::path::PathBuf;

/// Covsieve: keep only the tests that add coverage beyond a baseline suite
#[derive(Parser, Debug)]
#[command(name = "covsieve")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Select the candidate tests that add coverage beyond the baseline
    Select(SelectArgs),

    /// Compare the coverage of two test classes
    Compare(CompareArgs),

    /// Rank an existing test-deltas report and print the top selectors
    Rank(RankArgs),
}

/// Measurement process and coverage agent settings shared by commands
/// that run tests
#[derive(Args, Debug, Clone, Default)]
pub struct RunnerArgs {
    /// YAML file with `harness` and `jacoco` sections; flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Java launcher
    #[arg(long)]
    pub java: Option<String>,

    /// Directory whose jars lead the classpath
    #[arg(long)]
    pub lib_dir: Option<PathBuf>,

    /// Compiled classes of the system under test
    #[arg(long)]
    pub sut_classes: Option<PathBuf>,

    /// Compiled test classes
    #[arg(long)]
    pub test_classes: Option<PathBuf>,

    /// Jar containing the measurement entry point
    #[arg(long)]
    pub tool_jar: Option<PathBuf>,

    /// Entry point class receiving selectors as arguments
    #[arg(long)]
    pub main_class: Option<String>,

    /// Path to jacocoagent.jar
    #[arg(long)]
    pub jacoco_agent: Option<PathBuf>,

    /// Path to jacococli.jar, used to convert .exec captures
    #[arg(long)]
    pub jacoco_cli: Option<PathBuf>,

    /// Agent inclusion filter, forwarded verbatim (e.g. "com.acme.*")
    #[arg(long)]
    pub includes: Option<String>,

    /// Round timeout in milliseconds, 0 disables it
    #[arg(long, env = "COVSIEVE_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Directory for coverage captures
    #[arg(long, default_value = "target/covsieve/work")]
    pub work_dir: PathBuf,
}

/// Arguments for the select command
#[derive(Parser, Debug)]
#[command(group(
    ArgGroup::new("candidate_source")
        .required(true)
        .args(["candidates", "candidate_sources"])
))]
pub struct SelectArgs {
    /// Measurement settings
    #[command(flatten)]
    pub runner: RunnerArgs,

    /// File listing the baseline selectors, one per line
    #[arg(long)]
    pub baseline: PathBuf,

    /// File listing candidate selectors in discovery order
    #[arg(long)]
    pub candidates: Option<PathBuf>,

    /// Directory of Java test sources to scan for candidates
    #[arg(long)]
    pub candidate_sources: Option<PathBuf>,

    /// Coverage unit granularity
    #[arg(long, default_value = "method")]
    pub granularity: GranularityArg,

    /// Output directory for reports
    #[arg(short, long, default_value = "target/covsieve")]
    pub output: PathBuf,

    /// Also write summary.json
    #[arg(long)]
    pub summary: bool,

    /// Exit successfully even when verification diverges
    #[arg(long)]
    pub allow_divergence: bool,

    /// Output format for the run summary
    #[arg(long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the compare command
#[derive(Parser, Debug)]
pub struct CompareArgs {
    /// Measurement settings
    #[command(flatten)]
    pub runner: RunnerArgs,

    /// Reference test class
    #[arg(long)]
    pub baseline_class: String,

    /// Test class to compare against the reference
    #[arg(long)]
    pub candidate_class: String,

    /// Coverage unit granularity
    #[arg(long, default_value = "method")]
    pub granularity: GranularityArg,

    /// Print every candidate-only unit
    #[arg(long)]
    pub list_units: bool,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the rank command
#[derive(Parser, Debug)]
pub struct RankArgs {
    /// Test-deltas CSV to read
    #[arg(long)]
    pub deltas: PathBuf,

    /// Number of selectors to keep
    #[arg(long, default_value = "100")]
    pub top: usize,

    /// Keep file order instead of ranking
    #[arg(long)]
    pub no_sort: bool,

    /// Write the selectors to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Coverage unit granularity argument
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GranularityArg {
    /// Per-method line and branch units
    #[default]
    Method,
    /// Per-line units
    Line,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Method => Self::Method,
            GranularityArg::Line => Self::Line,
        }
    }
}

/// Summary output format argument
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// JSON on stdout
    Json,
}

/// Color argument
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_cli_definition_is_valid() {
            Cli::command().debug_assert();
        }

        #[test]
        fn test_parse_select_with_candidates() {
            let cli = Cli::parse_from([
                "covsieve",
                "select",
                "--baseline",
                "manual.txt",
                "--candidates",
                "generated.txt",
                "--jacoco-agent",
                "agent.jar",
                "--includes",
                "com.acme.*",
            ]);
            if let Commands::Select(args) = cli.command {
                assert_eq!(args.baseline, PathBuf::from("manual.txt"));
                assert_eq!(args.candidates, Some(PathBuf::from("generated.txt")));
                assert_eq!(args.runner.jacoco_agent, Some(PathBuf::from("agent.jar")));
                assert_eq!(args.runner.includes.as_deref(), Some("com.acme.*"));
                assert_eq!(args.granularity, GranularityArg::Method);
                assert_eq!(args.output, PathBuf::from("target/covsieve"));
                assert!(!args.allow_divergence);
            } else {
                panic!("expected Select command");
            }
        }

        #[test]
        fn test_select_requires_a_candidate_source() {
            let result = Cli::try_parse_from(["covsieve", "select", "--baseline", "b.txt"]);
            assert!(result.is_err());
        }

        #[test]
        fn test_select_candidate_sources_conflict_with_list() {
            let result = Cli::try_parse_from([
                "covsieve",
                "select",
                "--baseline",
                "b.txt",
                "--candidates",
                "c.txt",
                "--candidate-sources",
                "src/test/java",
            ]);
            assert!(result.is_err());
        }

        #[test]
        fn test_parse_select_flags() {
            let cli = Cli::parse_from([
                "covsieve",
                "select",
                "--baseline",
                "b.txt",
                "--candidate-sources",
                "src/test/java",
                "--timeout-ms",
                "0",
                "--granularity",
                "line",
                "--allow-divergence",
                "--summary",
                "--format",
                "json",
            ]);
            if let Commands::Select(args) = cli.command {
                assert_eq!(args.runner.timeout_ms, Some(0));
                assert_eq!(args.granularity, GranularityArg::Line);
                assert!(args.allow_divergence);
                assert!(args.summary);
                assert_eq!(args.format, FormatArg::Json);
            } else {
                panic!("expected Select command");
            }
        }

        #[test]
        fn test_timeout_reads_environment() {
            let cmd = Cli::command();
            let select = cmd.find_subcommand("select").unwrap();
            let timeout = select
                .get_arguments()
                .find(|a| a.get_id() == "timeout_ms")
                .unwrap();
            assert_eq!(
                timeout.get_env().and_then(|e| e.to_str()),
                Some("COVSIEVE_TIMEOUT_MS")
            );
        }

        #[test]
        fn test_parse_compare() {
            let cli = Cli::parse_from([
                "covsieve",
                "compare",
                "--baseline-class",
                "com.acme.ManualTest",
                "--candidate-class",
                "com.acme.GeneratedTest",
            ]);
            if let Commands::Compare(args) = cli.command {
                assert_eq!(args.baseline_class, "com.acme.ManualTest");
                assert_eq!(args.candidate_class, "com.acme.GeneratedTest");
                assert_eq!(args.runner.work_dir, PathBuf::from("target/covsieve/work"));
            } else {
                panic!("expected Compare command");
            }
        }

        #[test]
        fn test_parse_rank() {
            let cli = Cli::parse_from([
                "covsieve", "rank", "--deltas", "d.csv", "--top", "5", "--no-sort",
            ]);
            if let Commands::Rank(args) = cli.command {
                assert_eq!(args.deltas, PathBuf::from("d.csv"));
                assert_eq!(args.top, 5);
                assert!(args.no_sort);
                assert!(args.output.is_none());
            } else {
                panic!("expected Rank command");
            }
        }

        #[test]
        fn test_global_flags() {
            let cli = Cli::parse_from([
                "covsieve", "-vv", "--color", "never", "rank", "--deltas", "d.csv",
            ]);
            assert_eq!(cli.verbose, 2);
            assert!(matches!(cli.color, ColorArg::Never));
            assert!(!cli.quiet);
        }
    }

    mod conversion_tests {
        use super::*;
        use crate::config::ColorChoice;

        #[test]
        fn test_granularity_conversion() {
            assert_eq!(Granularity::from(GranularityArg::Line), Granularity::Line);
            assert_eq!(Granularity::from(GranularityArg::Method), Granularity::Method);
        }

        #[test]
        fn test_color_conversion() {
            assert_eq!(ColorChoice::from(ColorArg::Always), ColorChoice::Always);
            assert_eq!(ColorChoice::from(ColorArg::Never), ColorChoice::Never);
            assert_eq!(ColorChoice::from(ColorArg::Auto), ColorChoice::Auto);
        }
    }
}
