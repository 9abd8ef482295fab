//! Bypass Core - host classification and direct-list logic.
//!
//! This crate decides, for any requested host, whether traffic should go
//! directly to the origin or through the proxy. The same rules are shipped
//! to browsers inside the PAC script rendered by `bypass-proxy`.
//!
//! ## Pieces
//!
//! - [`TopLevelDomainTable`]: fixed second-level labels (`co`, `com`, ...)
//! - [`HostClassifier`]: host → domain key reduction and bypass decision
//! - [`DirectList`]: immutable snapshot of direct-access domains
//! - [`SiteStatProvider`]: where learned direct domains come from

pub mod direct_list;
pub mod error;
pub mod host;
pub mod site_stat;
pub mod tld;

pub use direct_list::DirectList;
pub use error::{CoreError, Result};
pub use host::{host_is_ip, Decision, HostClassifier};
pub use site_stat::{parse_direct_file, DirectFileSiteStat, SiteStatProvider, StaticSiteStat};
pub use tld::{TopLevelDomainTable, DEFAULT_TOP_LEVEL_LABELS};
