//! Coverage set algebra
//!
//! A [`CoverageSet`] never changes after construction. Every operation
//! returns a new set, so the selection loop can hold a long-lived
//! accumulator and compare it against per-round results freely. Clones
//! share the underlying storage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Opaque identifier of a covered code location at some granularity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageUnit(String);

impl CoverageUnit {
    /// Wrap a unit identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoverageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CoverageUnit {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Immutable set of covered units
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageSet {
    units: Arc<BTreeSet<CoverageUnit>>,
}

impl CoverageSet {
    /// The empty set
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Units present in either set
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if Arc::ptr_eq(&self.units, &other.units) || other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        self.units.union(&other.units).cloned().collect()
    }

    /// Units of `self` absent from `other`
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Self {
        self.units.difference(&other.units).cloned().collect()
    }

    /// True iff some unit of `self` is missing from `baseline`.
    ///
    /// Stops at the first such unit; the difference is never built.
    #[must_use]
    pub fn adds_anything_beyond(&self, baseline: &Self) -> bool {
        self.units.iter().any(|unit| !baseline.units.contains(unit))
    }

    /// Every unit of `other` is also in `self`
    #[must_use]
    pub fn is_superset_of(&self, other: &Self) -> bool {
        !other.adds_anything_beyond(self)
    }

    /// Membership test
    #[must_use]
    pub fn contains(&self, unit: &CoverageUnit) -> bool {
        self.units.contains(unit)
    }

    /// Number of units
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the set has no units
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units in ascending order
    pub fn iter(&self) -> impl Iterator<Item = &CoverageUnit> {
        self.units.iter()
    }
}

impl FromIterator<CoverageUnit> for CoverageSet {
    fn from_iter<I: IntoIterator<Item = CoverageUnit>>(iter: I) -> Self {
        Self {
            units: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl<'a> FromIterator<&'a str> for CoverageSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(CoverageUnit::new).collect()
    }
}
