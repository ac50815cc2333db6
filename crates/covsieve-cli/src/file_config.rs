//! YAML run configuration
//!
//! ```yaml
//! harness:
//!   lib_dir: build/libs
//!   sut_classes: build/classes/java/main
//!   test_classes: build/classes/java/test
//!   timeout_ms: 60000
//! jacoco:
//!   agent_jar: tools/jacocoagent.jar
//!   includes: com.acme.*
//! ```
//!
//! Command-line flags override file values field by field.

use crate::commands::RunnerArgs;
use crate::error::{CliError, CliResult};
use covsieve::{CoverageBackend, HarnessConfig, JacocoBackend, JacocoConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Measurement settings for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Launcher, classpath and timeout
    pub harness: HarnessConfig,
    /// Coverage agent settings
    pub jacoco: JacocoConfig,
}

impl FileConfig {
    /// Parse a YAML document
    pub fn from_yaml(text: &str) -> CliResult<Self> {
        serde_yaml_ng::from_str(text).map_err(|e| CliError::config(e.to_string()))
    }

    /// Load a YAML file
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CliError::config(format!("cannot read {}: {e}", path.display())))?;
        serde_yaml_ng::from_str(&text)
            .map_err(|e| CliError::config(format!("{}: {e}", path.display())))
    }

    /// File named by `--config` (or defaults) with flag overrides applied
    pub fn resolve(args: &RunnerArgs) -> CliResult<Self> {
        let base = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        Ok(base.with_overrides(args))
    }

    /// Apply the flags that were given
    #[must_use]
    pub fn with_overrides(mut self, args: &RunnerArgs) -> Self {
        let harness = &mut self.harness;
        if let Some(java) = &args.java {
            harness.java.clone_from(java);
            self.jacoco.java.clone_from(java);
        }
        if let Some(dir) = &args.lib_dir {
            harness.lib_dir = Some(dir.clone());
        }
        if let Some(dir) = &args.sut_classes {
            harness.sut_classes = Some(dir.clone());
        }
        if let Some(dir) = &args.test_classes {
            harness.test_classes = Some(dir.clone());
        }
        if let Some(jar) = &args.tool_jar {
            harness.tool_artifact = Some(jar.clone());
        }
        if let Some(main_class) = &args.main_class {
            harness.main_class.clone_from(main_class);
        }
        if let Some(timeout_ms) = args.timeout_ms {
            harness.timeout_ms = timeout_ms;
        }

        let jacoco = &mut self.jacoco;
        if let Some(jar) = &args.jacoco_agent {
            jacoco.agent_jar.clone_from(jar);
        }
        if let Some(jar) = &args.jacoco_cli {
            jacoco.cli_jar = Some(jar.clone());
        }
        if let Some(includes) = &args.includes {
            jacoco.includes = Some(includes.clone());
        }
        if jacoco.class_files.is_empty() {
            if let Some(dir) = &self.harness.sut_classes {
                jacoco.class_files.push(dir.clone());
            }
        }
        self
    }

    /// Check paths that must exist before the first round
    pub fn validate(&self) -> CliResult<()> {
        let jacoco = &self.jacoco;
        if !jacoco.agent_jar.is_file() {
            return Err(CliError::config(format!(
                "coverage agent not found: {} (set --jacoco-agent)",
                jacoco.agent_jar.display()
            )));
        }
        match &jacoco.cli_jar {
            Some(jar) if !jar.is_file() => {
                return Err(CliError::config(format!(
                    "jacococli jar not found: {}",
                    jar.display()
                )));
            }
            None if JacocoBackend::new(jacoco.clone()).record_extension() == "exec" => {
                return Err(CliError::config(
                    "reading .exec captures needs jacococli (set --jacoco-cli)",
                ));
            }
            _ => {}
        }

        let harness = &self.harness;
        if let Some(dir) = &harness.lib_dir {
            if !dir.is_dir() {
                return Err(CliError::config(format!(
                    "library directory not found: {}",
                    dir.display()
                )));
            }
        }
        if let Some(jar) = &harness.tool_artifact {
            if !jar.is_file() {
                return Err(CliError::config(format!(
                    "tool jar not found: {}",
                    jar.display()
                )));
            }
        }
        for (label, dir) in [
            ("SUT classes", &harness.sut_classes),
            ("test classes", &harness.test_classes),
        ] {
            if let Some(dir) = dir {
                if !dir.exists() {
                    return Err(CliError::config(format!(
                        "{label} not found: {}",
                        dir.display()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_empty_document_uses_defaults() {
            let config = FileConfig::from_yaml("{}").unwrap();
            assert_eq!(config, FileConfig::default());
            assert_eq!(config.harness.timeout_ms, covsieve::harness::DEFAULT_TIMEOUT_MS);
        }

        #[test]
        fn test_sections_are_read() {
            let config = FileConfig::from_yaml(
                "harness:\n  lib_dir: libs\n  timeout_ms: 5000\njacoco:\n  agent_jar: tools/agent.jar\n  includes: com.acme.*\n",
            )
            .unwrap();
            assert_eq!(config.harness.lib_dir, Some(PathBuf::from("libs")));
            assert_eq!(config.harness.timeout_ms, 5000);
            assert_eq!(config.jacoco.agent_jar, PathBuf::from("tools/agent.jar"));
            assert_eq!(config.jacoco.includes.as_deref(), Some("com.acme.*"));
        }

        #[test]
        fn test_unknown_section_is_rejected() {
            let err = FileConfig::from_yaml("harnes:\n  java: java\n").unwrap_err();
            assert!(err.to_string().contains("Configuration"));
        }

        #[test]
        fn test_missing_file() {
            let err = FileConfig::load(Path::new("/nonexistent/covsieve.yaml")).unwrap_err();
            assert!(err.to_string().contains("cannot read"));
        }
    }

    mod override_tests {
        use super::*;

        #[test]
        fn test_flags_override_file_values() {
            let file = FileConfig::from_yaml("harness:\n  timeout_ms: 5000\n  main_class: a.Main\n")
                .unwrap();
            let args = RunnerArgs {
                timeout_ms: Some(0),
                java: Some("/opt/jdk/bin/java".to_string()),
                ..RunnerArgs::default()
            };
            let config = file.with_overrides(&args);
            assert_eq!(config.harness.timeout_ms, 0);
            assert_eq!(config.harness.main_class, "a.Main");
            assert_eq!(config.harness.java, "/opt/jdk/bin/java");
            assert_eq!(config.jacoco.java, "/opt/jdk/bin/java");
        }

        #[test]
        fn test_class_files_default_to_sut_classes() {
            let args = RunnerArgs {
                sut_classes: Some(PathBuf::from("build/classes")),
                ..RunnerArgs::default()
            };
            let config = FileConfig::default().with_overrides(&args);
            assert_eq!(config.jacoco.class_files, vec![PathBuf::from("build/classes")]);
        }

        #[test]
        fn test_resolve_without_file() {
            let args = RunnerArgs {
                includes: Some("com.acme.*".to_string()),
                ..RunnerArgs::default()
            };
            let config = FileConfig::resolve(&args).unwrap();
            assert_eq!(config.jacoco.includes.as_deref(), Some("com.acme.*"));
        }
    }

    mod validate_tests {
        use super::*;

        /// Config whose agent and jacococli jars exist in `dir`
        fn with_jars(dir: &Path) -> FileConfig {
            let agent = dir.join("jacocoagent.jar");
            std::fs::write(&agent, b"jar").unwrap();
            let cli = dir.join("jacococli.jar");
            std::fs::write(&cli, b"jar").unwrap();
            let mut config = FileConfig::default();
            config.jacoco.agent_jar = agent;
            config.jacoco.cli_jar = Some(cli);
            config
        }

        fn message(config: &FileConfig) -> String {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, CliError::Config { .. }));
            err.to_string()
        }

        #[test]
        fn test_missing_agent_jar() {
            let config = FileConfig::default();
            assert!(message(&config).contains("coverage agent not found"));
        }

        #[test]
        fn test_existing_paths_pass() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = with_jars(dir.path());
            config.harness.sut_classes = Some(dir.path().to_path_buf());
            config.harness.lib_dir = Some(dir.path().to_path_buf());
            config.harness.tool_artifact = config.jacoco.cli_jar.clone();
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_missing_test_classes() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = with_jars(dir.path());
            config.harness.test_classes = Some(dir.path().join("missing"));
            assert!(message(&config).contains("test classes not found"));
        }

        #[test]
        fn test_missing_lib_dir() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = with_jars(dir.path());
            config.harness.lib_dir = Some(dir.path().join("no-such-libs"));
            assert!(message(&config).contains("library directory not found"));
        }

        #[test]
        fn test_lib_dir_must_be_a_directory() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = with_jars(dir.path());
            config.harness.lib_dir = Some(config.jacoco.agent_jar.clone());
            assert!(message(&config).contains("library directory not found"));
        }

        #[test]
        fn test_missing_tool_jar() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = with_jars(dir.path());
            config.harness.tool_artifact = Some(dir.path().join("no-such-tool.jar"));
            assert!(message(&config).contains("tool jar not found"));
        }

        #[test]
        fn test_exec_captures_need_cli_jar() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = with_jars(dir.path());
            config.jacoco.cli_jar = None;
            assert!(message(&config).contains("--jacoco-cli"));
        }

        #[test]
        fn test_missing_cli_jar() {
            let dir = tempfile::tempdir().unwrap();
            let mut config = with_jars(dir.path());
            config.jacoco.cli_jar = Some(dir.path().join("gone.jar"));
            assert!(message(&config).contains("jacococli jar not found"));
        }
    }
}
