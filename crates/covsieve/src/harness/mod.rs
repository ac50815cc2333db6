//! Isolated execution harness
//!
//! One measurement round is one fresh JVM: it loads the requested test
//! classes, runs the requested methods under the coverage agent, writes a
//! single capture and exits. Rounds are never reused or pipelined.

mod forked;

pub use forked::ForkedHarness;

use crate::record::ExecutionRecord;
use crate::result::HarnessError;
use crate::selector::TestSelector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default round timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// Default entry point of the measurement process
pub const DEFAULT_MAIN_CLASS: &str = "app.RunMany";

/// Runs one measurement round per call
#[async_trait]
pub trait Harness: Send + Sync {
    /// Extension of the captures this harness writes, without the dot
    fn record_extension(&self) -> &str;

    /// Run `selectors` in a fresh process, recording coverage into `output`.
    ///
    /// With `append == false` an existing capture at `output` is removed
    /// first. Any failure of the round is an error; there is no retry.
    async fn run(
        &self,
        selectors: &[TestSelector],
        output: &Path,
        append: bool,
    ) -> Result<ExecutionRecord, HarnessError>;
}

/// Launcher, classpath and timeout of the measurement process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Launcher program
    pub java: String,
    /// Options placed before the agent argument
    pub jvm_options: Vec<String>,
    /// Directory whose `*.jar` files lead the classpath
    pub lib_dir: Option<PathBuf>,
    /// Compiled classes of the system under test
    pub sut_classes: Option<PathBuf>,
    /// Compiled test classes
    pub test_classes: Option<PathBuf>,
    /// Jar holding the entry point
    pub tool_artifact: Option<PathBuf>,
    /// Entry point class receiving selectors as arguments
    pub main_class: String,
    /// Round timeout, `0` for none
    pub timeout_ms: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            java: "java".to_string(),
            jvm_options: default_jvm_options(),
            lib_dir: None,
            sut_classes: None,
            test_classes: None,
            tool_artifact: None,
            main_class: DEFAULT_MAIN_CLASS.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl HarnessConfig {
    /// Create a config with default launcher, options and timeout
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the launcher program
    #[must_use]
    pub fn with_java(mut self, java: impl Into<String>) -> Self {
        self.java = java.into();
        self
    }

    /// Replace the launcher options
    #[must_use]
    pub fn with_jvm_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.jvm_options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Set the runtime library directory
    #[must_use]
    pub fn with_lib_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lib_dir = Some(dir.into());
        self
    }

    /// Set the system-under-test classes location
    #[must_use]
    pub fn with_sut_classes(mut self, path: impl Into<PathBuf>) -> Self {
        self.sut_classes = Some(path.into());
        self
    }

    /// Set the test classes location
    #[must_use]
    pub fn with_test_classes(mut self, path: impl Into<PathBuf>) -> Self {
        self.test_classes = Some(path.into());
        self
    }

    /// Set the tool jar
    #[must_use]
    pub fn with_tool_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.tool_artifact = Some(path.into());
        self
    }

    /// Set the entry point class
    #[must_use]
    pub fn with_main_class(mut self, main_class: impl Into<String>) -> Self {
        self.main_class = main_class.into();
        self
    }

    /// Set the round timeout, `0` disables it
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

fn default_jvm_options() -> Vec<String> {
    [
        "java.base/java.lang",
        "java.base/java.lang.reflect",
        "java.base/java.util",
        "java.base/java.net",
        "java.desktop/java.awt",
    ]
    .iter()
    .flat_map(|module| ["--add-opens".to_string(), format!("{module}=ALL-UNNAMED")])
    .collect()
}
