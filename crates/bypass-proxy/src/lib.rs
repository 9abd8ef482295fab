//! Bypass Proxy - direct-list cache and PAC document server.
//!
//! Browsers configured with a proxy auto-config URL fetch a small script
//! that decides, per request, whether to go through the proxy. This crate
//! keeps the learned direct-access domains fresh and renders that script
//! for each client.
//!
//! ## Architecture
//!
//! ```text
//! SiteStatProvider ──(every 60s)──→ DirectListStore
//!                                         │ snapshot()
//!                                         ▼
//! PAC request → PacServer → PacRenderer(snapshot, proxy addr) → bytes → client
//! ```
//!
//! ## Features
//!
//! - Copy-on-write direct list, readers never wait on a refresh
//! - Synchronous first refresh so the first PAC served is populated
//! - Cancellable background refresh task
//! - Per-connection proxy address (configured or derived from the local IP)
//! - All-or-nothing rendering: a failed render writes no bytes

pub mod config;
pub mod direct_list;
mod error;
pub mod pac;
pub mod server;
pub mod template;

pub use config::PacConfig;
pub use direct_list::{DirectListStore, RefreshHandle, DEFAULT_REFRESH_INTERVAL};
pub use error::{PacError, Result};
pub use pac::{PacRenderer, PAC_CONTENT_TYPE, PAC_TEMPLATE};
pub use server::{is_pac_request, PacConnection, PacEndpoint, PacHandle, PacServer, PAC_PATH};
pub use template::{PacFields, PacTemplate};

/// Default port the proxy listens on.
pub const DEFAULT_PROXY_PORT: u16 = 7777;
