//! Execution records: the raw capture one measurement round leaves behind

use crate::selector::TestSelector;
use std::path::{Path, PathBuf};

/// Raw coverage capture written by exactly one harness invocation.
///
/// Records are write-once. The analyzer may read one any number of times;
/// nothing ever merges two records or edits one in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    path: PathBuf,
    selectors: Vec<TestSelector>,
}

impl ExecutionRecord {
    /// Describe the capture at `path` produced by running `selectors`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, selectors: Vec<TestSelector>) -> Self {
        Self {
            path: path.into(),
            selectors,
        }
    }

    /// Location of the capture
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Selectors the producing round ran
    #[must_use]
    pub fn selectors(&self) -> &[TestSelector] {
        &self.selectors
    }

    /// Size of the capture on disk, if it exists
    #[must_use]
    pub fn size_bytes(&self) -> Option<u64> {
        std::fs::metadata(&self.path).ok().map(|m| m.len())
    }
}
