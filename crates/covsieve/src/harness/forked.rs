//! Harness that forks one JVM per round

use super::{Harness, HarnessConfig};
use crate::backend::CoverageBackend;
use crate::record::ExecutionRecord;
use crate::result::HarnessError;
use crate::selector::TestSelector;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const CLASSPATH_SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };

/// Spawns a fresh measurement process per round
#[derive(Debug, Clone)]
pub struct ForkedHarness {
    config: HarnessConfig,
    backend: Arc<dyn CoverageBackend>,
}

impl ForkedHarness {
    /// Create a harness recording through `backend`
    #[must_use]
    pub fn new(config: HarnessConfig, backend: Arc<dyn CoverageBackend>) -> Self {
        Self { config, backend }
    }

    /// Harness configuration
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Classpath: sorted library jars, SUT classes, test classes, tool jar
    pub fn classpath(&self) -> Result<String, HarnessError> {
        let mut entries: Vec<PathBuf> = Vec::new();

        if let Some(lib_dir) = &self.config.lib_dir {
            entries.extend(library_jars(lib_dir)?);
        }
        entries.extend(
            [
                &self.config.sut_classes,
                &self.config.test_classes,
                &self.config.tool_artifact,
            ]
            .into_iter()
            .flatten()
            .cloned(),
        );

        Ok(entries
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(CLASSPATH_SEPARATOR))
    }

    /// Arguments passed to the launcher for one round
    pub fn arguments(
        &self,
        selectors: &[TestSelector],
        output: &Path,
        append: bool,
    ) -> Result<Vec<String>, HarnessError> {
        let mut args = self.config.jvm_options.clone();
        args.push(self.backend.agent_argument(output, append));
        args.push("-cp".to_string());
        args.push(self.classpath()?);
        args.push(self.config.main_class.clone());
        args.extend(selectors.iter().map(ToString::to_string));
        Ok(args)
    }
}

#[async_trait]
impl Harness for ForkedHarness {
    fn record_extension(&self) -> &str {
        self.backend.record_extension()
    }

    async fn run(
        &self,
        selectors: &[TestSelector],
        output: &Path,
        append: bool,
    ) -> Result<ExecutionRecord, HarnessError> {
        if selectors.is_empty() {
            return Err(HarnessError::NoSelectors);
        }
        prepare_output(output, append).await?;

        let args = self.arguments(selectors, output, append)?;
        debug!(program = %self.config.java, ?args, "spawning measurement round");
        info!(
            selectors = selectors.len(),
            output = %output.display(),
            "measurement round"
        );

        let mut child = Command::new(&self.config.java)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| HarnessError::Spawn {
                program: self.config.java.clone(),
                source,
            })?;

        let waited = if self.config.timeout_ms == 0 {
            child.wait().await
        } else {
            let limit = Duration::from_millis(self.config.timeout_ms);
            if let Ok(status) = tokio::time::timeout(limit, child.wait()).await {
                status
            } else {
                warn!(timeout_ms = self.config.timeout_ms, "round timed out, killing");
                if let Err(err) = child.kill().await {
                    warn!(error = %err, "failed to kill timed-out round");
                }
                return Err(HarnessError::Timeout {
                    timeout_ms: self.config.timeout_ms,
                    selectors: selectors.to_vec(),
                });
            }
        };

        let status = waited.map_err(|source| HarnessError::Spawn {
            program: self.config.java.clone(),
            source,
        })?;
        if !status.success() {
            return Err(HarnessError::NonZeroExit {
                code: status.code(),
                selectors: selectors.to_vec(),
            });
        }

        let record = ExecutionRecord::new(output, selectors.to_vec());
        debug!(size_bytes = ?record.size_bytes(), "round finished");
        Ok(record)
    }
}

fn library_jars(lib_dir: &Path) -> Result<Vec<PathBuf>, HarnessError> {
    if !lib_dir.is_dir() {
        return Err(HarnessError::LibraryDirMissing {
            path: lib_dir.to_path_buf(),
        });
    }

    let pattern = format!(
        "{}/*.jar",
        glob::Pattern::escape(&lib_dir.display().to_string())
    );
    let paths = glob::glob(&pattern).map_err(|err| HarnessError::Io {
        path: lib_dir.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, err.to_string()),
    })?;

    let mut jars = paths
        .map(|entry| {
            entry.map_err(|err| HarnessError::Io {
                path: err.path().to_path_buf(),
                source: err.into_error(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    jars.retain(|p| p.is_file());
    jars.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(jars)
}

async fn prepare_output(output: &Path, append: bool) -> Result<(), HarnessError> {
    let io_error = |source| HarnessError::Io {
        path: output.to_path_buf(),
        source,
    };

    if !append {
        match tokio::fs::remove_file(output).await {
            Ok(()) => debug!(path = %output.display(), "removed previous capture"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(io_error(err)),
        }
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backend::{JacocoBackend, JacocoConfig};

    fn harness(config: HarnessConfig) -> ForkedHarness {
        let backend = JacocoBackend::new(
            JacocoConfig::new("/opt/jacocoagent.jar").with_includes("com.acme.*"),
        );
        ForkedHarness::new(config, Arc::new(backend))
    }

    /// A launcher that ignores every argument after the script
    fn shell(script: &str) -> HarnessConfig {
        HarnessConfig::new()
            .with_java("sh")
            .with_jvm_options(["-c", script, "sh"])
    }

    mod classpath_tests {
        use super::*;

        #[test]
        fn test_jars_sorted_then_class_dirs() {
            let dir = tempfile::tempdir().unwrap();
            for jar in ["zeta.jar", "alpha.jar", "notes.txt"] {
                std::fs::write(dir.path().join(jar), b"").unwrap();
            }
            let h = harness(
                HarnessConfig::new()
                    .with_lib_dir(dir.path())
                    .with_sut_classes("sut/classes")
                    .with_test_classes("test-classes")
                    .with_tool_artifact("tool.jar"),
            );

            let classpath = h.classpath().unwrap();
            let parts: Vec<&str> = classpath.split(CLASSPATH_SEPARATOR).collect();
            assert_eq!(parts.len(), 5);
            assert!(parts[0].ends_with("alpha.jar"));
            assert!(parts[1].ends_with("zeta.jar"));
            assert_eq!(&parts[2..], &["sut/classes", "test-classes", "tool.jar"]);
        }

        #[test]
        fn test_missing_lib_dir() {
            let h = harness(HarnessConfig::new().with_lib_dir("/no/such/libs"));
            let err = h.classpath().unwrap_err();
            assert!(matches!(err, HarnessError::LibraryDirMissing { .. }));
        }

        #[test]
        fn test_arguments_layout() {
            let h = harness(
                HarnessConfig::new()
                    .with_jvm_options(["-Xmx1g"])
                    .with_test_classes("tc"),
            );
            let selectors = vec![
                TestSelector::class("com.acme.BaseTest"),
                TestSelector::method("com.acme.FooTest", "parses"),
            ];
            let args = h
                .arguments(&selectors, Path::new("/w/cand_0.exec"), false)
                .unwrap();
            assert_eq!(
                args,
                vec![
                    "-Xmx1g",
                    "-javaagent:/opt/jacocoagent.jar=destfile=/w/cand_0.exec,append=false,includes=com.acme.*",
                    "-cp",
                    "tc",
                    "app.RunMany",
                    "com.acme.BaseTest",
                    "com.acme.FooTest#parses",
                ]
            );
        }
    }

    mod run_tests {
        use super::*;

        #[tokio::test]
        async fn test_no_selectors() {
            let h = harness(HarnessConfig::new());
            let err = h
                .run(&[], Path::new("/tmp/unused.exec"), false)
                .await
                .unwrap_err();
            assert!(matches!(err, HarnessError::NoSelectors));
        }

        #[tokio::test]
        async fn test_spawn_failure() {
            let dir = tempfile::tempdir().unwrap();
            let h = harness(HarnessConfig::new().with_java("/no/such/launcher"));
            let err = h
                .run(
                    &[TestSelector::class("a.T")],
                    &dir.path().join("r.exec"),
                    false,
                )
                .await
                .unwrap_err();
            assert!(matches!(err, HarnessError::Spawn { .. }));
        }

        #[cfg(unix)]
        #[tokio::test]
        async fn test_success_returns_record() {
            let dir = tempfile::tempdir().unwrap();
            let output = dir.path().join("nested").join("cand_0.exec");
            let selectors = vec![TestSelector::method("a.T", "m")];

            let record = harness(shell("exit 0"))
                .run(&selectors, &output, false)
                .await
                .unwrap();
            assert_eq!(record.path(), output);
            assert_eq!(record.selectors(), selectors.as_slice());
            assert!(output.parent().unwrap().is_dir());
        }

        #[cfg(unix)]
        #[tokio::test]
        async fn test_nonzero_exit() {
            let dir = tempfile::tempdir().unwrap();
            let err = harness(shell("exit 3"))
                .run(
                    &[TestSelector::class("a.T")],
                    &dir.path().join("r.exec"),
                    false,
                )
                .await
                .unwrap_err();
            match err {
                HarnessError::NonZeroExit { code, selectors } => {
                    assert_eq!(code, Some(3));
                    assert_eq!(selectors, vec![TestSelector::class("a.T")]);
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[cfg(unix)]
        #[tokio::test]
        async fn test_timeout_kills_round() {
            let dir = tempfile::tempdir().unwrap();
            let err = harness(shell("sleep 10").with_timeout_ms(100))
                .run(
                    &[TestSelector::class("a.T")],
                    &dir.path().join("r.exec"),
                    false,
                )
                .await
                .unwrap_err();
            assert!(matches!(err, HarnessError::Timeout { timeout_ms: 100, .. }));
        }

        #[cfg(unix)]
        #[tokio::test]
        async fn test_truncates_unless_appending() {
            let dir = tempfile::tempdir().unwrap();
            let output = dir.path().join("final.exec");
            let selectors = [TestSelector::class("a.T")];

            std::fs::write(&output, b"stale").unwrap();
            harness(shell("exit 0"))
                .run(&selectors, &output, true)
                .await
                .unwrap();
            assert!(output.exists());

            harness(shell("exit 0"))
                .run(&selectors, &output, false)
                .await
                .unwrap();
            assert!(!output.exists());
        }
    }
}
