//! Fixed table of second-level labels used by domain reduction.
//!
//! A host like `www.example.co.uk` has the label `co` between its last two
//! dots. When that label is in the table the registrable domain climbs one
//! extra label (`example.co.uk` instead of `co.uk`). This is a deliberately
//! small approximation of the public suffix list; the browser-side script
//! embeds the same table, so both sides always agree.

use std::collections::BTreeSet;

/// Labels that mark a multi-part public suffix (`co.uk`, `com.cn`, ...).
pub const DEFAULT_TOP_LEVEL_LABELS: &[&str] = &["ac", "co", "com", "edu", "gov", "net", "org"];

/// Immutable set of second-level labels.
///
/// Built once at startup and shared read-only afterwards. Iteration order is
/// sorted so generated documents are deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLevelDomainTable {
    labels: BTreeSet<String>,
}

impl TopLevelDomainTable {
    /// Creates a table from the given labels.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `label` marks a multi-part suffix.
    #[inline]
    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    /// Iterates over the labels in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for TopLevelDomainTable {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_LEVEL_LABELS.iter().copied())
    }
}
