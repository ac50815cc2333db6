//! Candidate discovery
//!
//! Selector list files, and a light scan of Java test sources that finds
//! test methods without loading any classes. Scanning looks at imports and
//! annotations only; it does not parse Java.

use crate::result::{CovsieveError, CovsieveResult};
use crate::selector::TestSelector;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read selectors from a file, one per line.
///
/// Blank lines and lines starting with `#` are ignored.
pub fn read_selector_file(path: &Path) -> CovsieveResult<Vec<TestSelector>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CovsieveError::configuration(format!("cannot read {}: {e}", path.display()))
    })?;
    parse_selector_list(&text).map_err(|(line, message)| {
        CovsieveError::configuration(format!("{}:{line}: {message}", path.display()))
    })
}

/// Parse selector list text, reporting the first bad line
pub fn parse_selector_list(text: &str) -> Result<Vec<TestSelector>, (usize, String)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(nr, line)| TestSelector::parse(line).map_err(|e| (nr, e.to_string())))
        .collect()
}

/// Test framework a class is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestFramework {
    /// JUnit Jupiter
    JUnit5,
    /// JUnit 4
    JUnit4,
}

impl fmt::Display for TestFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JUnit5 => write!(f, "junit5"),
            Self::JUnit4 => write!(f, "junit4"),
        }
    }
}

impl TestFramework {
    /// Method annotations that mark a test for this framework
    #[must_use]
    pub const fn test_annotations(self) -> &'static [&'static str] {
        match self {
            Self::JUnit5 => &[
                "Test",
                "RepeatedTest",
                "ParameterizedTest",
                "TestFactory",
                "TestTemplate",
            ],
            Self::JUnit4 => &["Test"],
        }
    }
}

/// Framework decision for one source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Chosen framework
    pub framework: TestFramework,
    /// No markers were found and JUnit 5 was assumed
    pub speculative: bool,
}

/// Test class found in a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredClass {
    /// Fully-qualified class name
    pub class_name: String,
    /// Source file
    pub source: PathBuf,
    /// Framework decision
    pub classification: Classification,
    /// Test method names, sorted and deduplicated
    pub methods: Vec<String>,
}

impl DiscoveredClass {
    /// One method selector per test method
    #[must_use]
    pub fn selectors(&self) -> Vec<TestSelector> {
        self.methods
            .iter()
            .map(|m| TestSelector::method(self.class_name.clone(), m.clone()))
            .collect()
    }
}

/// Annotation arguments, allowing string literals and one level of nesting
const ARGS: &str = r#"\((?:[^()"]|"(?:[^"\\]|\\.)*"|\([^()]*\))*\)"#;

/// A return type token
const TYPE: &str = r"[\w<>\[\]?,.]+";

/// Finds test methods in Java sources
#[derive(Debug, Clone)]
pub struct JavaTestScanner {
    package: Regex,
    junit5_marker: Regex,
    junit4_marker: Regex,
    test_method: Regex,
    annotation: Regex,
}

impl JavaTestScanner {
    /// Compile the scanner patterns
    pub fn new() -> CovsieveResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| CovsieveError::configuration(format!("bad scanner pattern: {e}")))
        };
        Ok(Self {
            package: compile(r"(?m)^\s*package\s+([\w.]+)\s*;")?,
            junit5_marker: compile(
                r"org\.junit\.jupiter|@(?:[\w.]+\.)?(?:ParameterizedTest|RepeatedTest|TestFactory|TestTemplate)\b",
            )?,
            junit4_marker: compile(
                r"import\s+org\.junit\.Test\s*;|@org\.junit\.Test\b|@(?:[\w.]+\.)?RunWith\b",
            )?,
            test_method: compile(&format!(
                r"((?:@[\w.]+\s*(?:{ARGS})?\s*)+)(?:(?:public|protected|private|static|final|synchronized|abstract|default)\s+)*(?:<[^>]*>\s*)?{TYPE}(?:\s+{TYPE})*?\s+(\w+)\s*\("
            ))?,
            annotation: compile(r"@(?:\w+\.)*(\w+)")?,
        })
    }

    /// Decide the framework: JUnit 5 markers win, then JUnit 4, else JUnit 5
    #[must_use]
    pub fn classify(&self, source: &str) -> Classification {
        if self.junit5_marker.is_match(source) {
            Classification {
                framework: TestFramework::JUnit5,
                speculative: false,
            }
        } else if self.junit4_marker.is_match(source) {
            Classification {
                framework: TestFramework::JUnit4,
                speculative: false,
            }
        } else {
            Classification {
                framework: TestFramework::JUnit5,
                speculative: true,
            }
        }
    }

    /// Test method names for the given framework, sorted
    #[must_use]
    pub fn test_methods(&self, source: &str, framework: TestFramework) -> Vec<String> {
        let annotations = framework.test_annotations();
        let mut methods: Vec<String> = self
            .test_method
            .captures_iter(source)
            .filter(|caps| {
                self.annotation
                    .captures_iter(&caps[1])
                    .any(|a| annotations.contains(&&a[1]))
            })
            .map(|caps| caps[2].to_string())
            .collect();
        methods.sort();
        methods.dedup();
        methods
    }

    /// Fully-qualified class name from the package and the file stem
    #[must_use]
    pub fn class_name(&self, source: &str, path: &Path) -> Option<String> {
        let stem = path.file_stem()?.to_str()?;
        Some(match self.package.captures(source) {
            Some(caps) => format!("{}.{stem}", &caps[1]),
            None => stem.to_string(),
        })
    }

    /// Scan one source file, `None` when it declares no tests
    pub fn scan_source(&self, path: &Path, source: &str) -> Option<DiscoveredClass> {
        let classification = self.classify(source);
        let methods = self.test_methods(source, classification.framework);
        if methods.is_empty() {
            return None;
        }
        let class_name = self.class_name(source, path)?;
        if classification.speculative {
            debug!(class = %class_name, "no framework markers, assuming JUnit 5");
        }
        Some(DiscoveredClass {
            class_name,
            source: path.to_path_buf(),
            classification,
            methods,
        })
    }

    /// Scan every `.java` file below `root`, ordered by class name
    pub fn scan_dir(&self, root: &Path) -> CovsieveResult<Vec<DiscoveredClass>> {
        if !root.is_dir() {
            return Err(CovsieveError::configuration(format!(
                "test source directory not found: {}",
                root.display()
            )));
        }
        let pattern = format!(
            "{}/**/*.java",
            glob::Pattern::escape(&root.display().to_string())
        );
        let paths = glob::glob(&pattern)
            .map_err(|e| CovsieveError::configuration(format!("bad source pattern: {e}")))?;

        let mut classes = Vec::new();
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(err) => {
                    warn!(path = %err.path().display(), "skipping unreadable entry");
                    continue;
                }
            };
            let source = std::fs::read_to_string(&path).map_err(|e| {
                CovsieveError::configuration(format!("cannot read {}: {e}", path.display()))
            })?;
            classes.extend(self.scan_source(&path, &source));
        }
        classes.sort_by(|a, b| a.class_name.cmp(&b.class_name));
        Ok(classes)
    }
}
