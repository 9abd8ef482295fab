//! PAC service configuration.
//!
//! Loaded from a JSON file; every field has a default so an empty object
//! (or no file at all) is a valid configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PacError, Result};
use crate::server::PacEndpoint;

/// Default listen address for the proxy.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:7777";

/// Default value of the `Server` response header.
pub const DEFAULT_SERVER_NAME: &str = "bypass-proxy";

/// Default direct-list refresh period, in seconds.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

/// PAC service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacConfig {
    /// Address the proxy listens on (`host:port`).
    pub listen: String,
    /// Proxy address written into PAC documents. When unset, the local
    /// address of each requesting connection is paired with the listen port.
    pub addr_in_pac: Option<String>,
    /// Value of the `Server` response header.
    pub server_name: String,
    /// Seconds between direct-list refreshes.
    pub refresh_interval_secs: u64,
    /// File of user-maintained direct domains, one per line.
    pub direct_file: Option<PathBuf>,
}

impl Default for PacConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            addr_in_pac: None,
            server_name: DEFAULT_SERVER_NAME.to_string(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            direct_file: None,
        }
    }
}

impl PacConfig {
    /// Loads a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: PacConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if self.refresh_interval_secs == 0 {
            return Err(PacError::Config(
                "refresh_interval_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(addr) = &self.addr_in_pac {
            if addr.trim().is_empty() {
                return Err(PacError::Config("addr_in_pac must not be empty".to_string()));
            }
        }
        Ok(())
    }

    /// Parses the listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| PacError::Config(format!("invalid listen address {:?}: {}", self.listen, e)))
    }

    /// Returns the refresh period.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Builds the endpoint advertised in PAC documents.
    pub fn endpoint(&self) -> Result<PacEndpoint> {
        let listen = self.listen_addr()?;
        Ok(PacEndpoint::new(listen.port()).with_addr_in_pac(self.addr_in_pac.clone()))
    }

    /// Sets the listen address.
    pub fn with_listen(mut self, listen: impl Into<String>) -> Self {
        self.listen = listen.into();
        self
    }

    /// Sets the advertised proxy address.
    pub fn with_addr_in_pac(mut self, addr: impl Into<String>) -> Self {
        self.addr_in_pac = Some(addr.into());
        self
    }

    /// Sets the direct-domain file.
    pub fn with_direct_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.direct_file = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let config = PacConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.listen_addr().unwrap().port(), 7777);
    }

    #[test]
    fn load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"listen": "0.0.0.0:1080", "addr_in_pac": "10.0.0.1:1080"}}"#).unwrap();

        let config = PacConfig::load(file.path()).unwrap();
        assert_eq!(config.listen, "0.0.0.0:1080");
        assert_eq!(config.addr_in_pac.as_deref(), Some("10.0.0.1:1080"));
        assert_eq!(config.server_name, DEFAULT_SERVER_NAME);
        assert_eq!(config.refresh_interval_secs, DEFAULT_REFRESH_INTERVAL_SECS);
    }

    #[test]
    fn load_rejects_bad_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(PacConfig::load(file.path()), Err(PacError::Json(_))));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PacConfig::load(dir.path().join("missing.json")),
            Err(PacError::Io(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_listen() {
        let config = PacConfig::default().with_listen("not-an-address");
        assert!(matches!(config.validate(), Err(PacError::Config(_))));
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let config = PacConfig {
            refresh_interval_secs: 0,
            ..PacConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_addr_in_pac() {
        let config = PacConfig::default().with_addr_in_pac(" ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn endpoint_uses_listen_port() {
        let config = PacConfig::default().with_listen("0.0.0.0:1080");
        let endpoint = config.endpoint().unwrap();
        assert_eq!(endpoint.listen_port(), 1080);
        assert!(endpoint.addr_in_pac().is_none());
    }
}
