//! Immutable snapshot of domains that bypass the proxy.

use std::collections::HashSet;

/// Ordered list of direct-access domains with a membership index.
///
/// The empty domain is always treated as a member. Private addresses and
/// single-label hosts reduce to the empty domain, so they are always direct;
/// the generated script gets the same effect from a leading `""` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectList {
    domains: Vec<String>,
    index: HashSet<String>,
}

impl DirectList {
    /// Builds a snapshot from domains in the order the provider reported them.
    pub fn new(domains: Vec<String>) -> Self {
        let index = domains.iter().cloned().collect();
        Self { domains, index }
    }

    /// Returns true if `domain` should be reached directly.
    #[inline]
    pub fn contains(&self, domain: &str) -> bool {
        domain.is_empty() || self.index.contains(domain)
    }

    /// Domains in provider order.
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl FromIterator<String> for DirectList {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
