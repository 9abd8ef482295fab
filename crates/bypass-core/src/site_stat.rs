//! Site-statistics providers.
//!
//! The proxy learns over time which sites can be reached without it. That
//! bookkeeping lives elsewhere; this module only defines the read side the
//! PAC subsystem consumes, plus two simple providers.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::Result;

/// Source of the learned direct-access domain list.
///
/// Implementations must be cheap to call repeatedly; the list is pulled on
/// every refresh cycle.
pub trait SiteStatProvider: Send + Sync {
    /// Returns the domains currently classified as direct, in a stable order.
    fn direct_list(&self) -> Result<Vec<String>>;
}

/// In-memory provider whose list can be replaced at any time.
#[derive(Debug, Default)]
pub struct StaticSiteStat {
    domains: RwLock<Vec<String>>,
}

impl StaticSiteStat {
    /// Creates a provider reporting the given domains.
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: RwLock::new(domains.into_iter().map(Into::into).collect()),
        }
    }

    /// Replaces the reported list.
    pub fn set<I, S>(&self, domains: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.domains.write() = domains.into_iter().map(Into::into).collect();
    }

    /// Appends a domain if it is not already reported.
    pub fn add(&self, domain: impl Into<String>) {
        let domain = domain.into();
        let mut domains = self.domains.write();
        if !domains.contains(&domain) {
            domains.push(domain);
        }
    }
}

impl SiteStatProvider for StaticSiteStat {
    fn direct_list(&self) -> Result<Vec<String>> {
        Ok(self.domains.read().clone())
    }
}

/// Provider backed by a user-maintained "direct" file.
///
/// One domain per line. Blank lines and lines starting with `#` are
/// skipped, duplicates keep their first position. The file is re-read on
/// every call so edits show up on the next refresh; a missing file reports
/// an empty list.
#[derive(Debug, Clone)]
pub struct DirectFileSiteStat {
    path: PathBuf,
}

impl DirectFileSiteStat {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SiteStatProvider for DirectFileSiteStat {
    fn direct_list(&self) -> Result<Vec<String>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Direct file {:?} not found, reporting empty list", self.path);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(parse_direct_file(&contents))
    }
}

/// Parses the contents of a direct-domain file.
pub fn parse_direct_file(contents: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(*line))
        .map(String::from)
        .collect()
}
