//! Test selectors: a whole test class or a single `Class#method`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Why a selector string was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorParseError {
    /// Nothing but whitespace
    #[error("Empty test selector")]
    Empty,

    /// `#` at the start or end of the selector
    #[error("Expected format fqcn or fqcn#methodName, got: {0}")]
    Malformed(String),
}

/// Identifies a unit of execution: a test class, or one method within it.
///
/// Round-trips through its string form: `com.acme.FooTest` or
/// `com.acme.FooTest#shouldParse`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TestSelector {
    class_name: String,
    method_name: Option<String>,
}

impl TestSelector {
    /// Select every test in a class
    #[must_use]
    pub fn class(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: None,
        }
    }

    /// Select a single test method; a blank method name selects the class
    #[must_use]
    pub fn method(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        let class_name: String = class_name.into();
        let method_name: String = method_name.into();
        let method_name = method_name.trim();
        Self {
            class_name: class_name.trim().to_string(),
            method_name: (!method_name.is_empty()).then(|| method_name.to_string()),
        }
    }

    /// Parse `fqcn` or `fqcn#method`, splitting at the last `#`
    pub fn parse(input: &str) -> Result<Self, SelectorParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SelectorParseError::Empty);
        }

        let Some(idx) = trimmed.rfind('#') else {
            return Ok(Self::class(trimmed));
        };
        if idx == 0 || idx == trimmed.len() - 1 {
            return Err(SelectorParseError::Malformed(input.to_string()));
        }

        let class_name = trimmed[..idx].trim();
        let method_name = trimmed[idx + 1..].trim();
        Ok(Self::method(class_name, method_name))
    }

    /// Fully-qualified test class name
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Method name, `None` for a whole-class selector
    #[must_use]
    pub fn method_name(&self) -> Option<&str> {
        self.method_name.as_deref()
    }

    /// Whether this selects the whole class
    #[must_use]
    pub fn is_class_only(&self) -> bool {
        self.method_name.is_none()
    }
}

impl fmt::Display for TestSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method_name {
            Some(method) => write!(f, "{}#{}", self.class_name, method),
            None => f.write_str(&self.class_name),
        }
    }
}

impl FromStr for TestSelector {
    type Err = SelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TestSelector {
    type Error = SelectorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TestSelector> for String {
    fn from(selector: TestSelector) -> Self {
        selector.to_string()
    }
}
