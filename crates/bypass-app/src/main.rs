//! Bypass - PAC service for a forward HTTP proxy.
//!
//! Runs the direct-list refresh task and a listener that serves the proxy
//! auto-config script at `/pac`.

use std::path::PathBuf;
use std::sync::Arc;

use bypass_core::{DirectFileSiteStat, SiteStatProvider, StaticSiteStat, TopLevelDomainTable};
use bypass_proxy::{DirectListStore, PacConfig, PacServer};
use clap::Parser;
use directories::ProjectDirs;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Bypass - serves proxy auto-config scripts with learned direct domains
#[derive(Parser, Debug)]
#[command(name = "bypass", version, about)]
struct Args {
    /// Path to a JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on (host:port)
    #[arg(long)]
    listen: Option<String>,

    /// Proxy address to advertise in the PAC file
    #[arg(long)]
    addr_in_pac: Option<String>,

    /// File of direct domains, one per line
    #[arg(long)]
    direct_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "bypass", "Bypass")
}

/// Initialize logging with file rotation.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bypass={},warn", log_level)));

    if let Some(log_dir) = project_dirs().map(|dirs| dirs.data_dir().join("logs")) {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("bypass")
                .filename_suffix("log")
                .build(&log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stdout))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();

                tracing::info!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }
    }

    // Fallback: console logging only
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::warn!("File logging unavailable, using console only");
    None
}

/// Loads the config file (explicit, or the default one if present) and
/// applies command-line overrides.
fn load_config(args: &Args) -> anyhow::Result<PacConfig> {
    let default_path = project_dirs().map(|dirs| dirs.config_dir().join("config.json"));

    let mut config = match (&args.config, default_path) {
        (Some(path), _) => PacConfig::load(path)?,
        (None, Some(path)) if path.exists() => PacConfig::load(&path)?,
        _ => PacConfig::default(),
    };

    apply_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut PacConfig, args: &Args) {
    if let Some(listen) = &args.listen {
        config.listen = listen.clone();
    }
    if let Some(addr) = &args.addr_in_pac {
        config.addr_in_pac = Some(addr.clone());
    }
    if let Some(path) = &args.direct_file {
        config.direct_file = Some(path.clone());
    }
}

/// Picks the site-statistics provider for this run.
fn site_stat(config: &PacConfig) -> Arc<dyn SiteStatProvider> {
    let path = config
        .direct_file
        .clone()
        .or_else(|| project_dirs().map(|dirs| dirs.config_dir().join("direct")));

    match path {
        Some(path) => {
            tracing::info!("Reading direct domains from {:?}", path);
            Arc::new(DirectFileSiteStat::new(path))
        }
        None => {
            tracing::warn!("No direct file location available, direct list stays empty");
            Arc::new(StaticSiteStat::default())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep guard alive for the duration of the program
    let _log_guard = init_logging(&args);

    tracing::info!("Starting Bypass...");
    tracing::debug!("Args: {:?}", args);

    let config = load_config(&args)?;
    let listen = config.listen_addr()?;
    let table = TopLevelDomainTable::default();

    let store = DirectListStore::with_refresh_interval(site_stat(&config), config.refresh_interval());
    // Template problems are fatal here, before anything is served
    let server = PacServer::from_config(&config, &table, store.clone())?;

    // First refresh completes before the listener accepts PAC requests
    let refresh = store.start();
    let handle = server.start(listen).await?;
    tracing::info!(
        "PAC available at http://{}{} ({} direct domains)",
        handle.addr(),
        bypass_proxy::PAC_PATH,
        store.snapshot().len()
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    handle.stop().await;
    refresh.stop().await;

    tracing::info!("Bypass shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["bypass"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn args_defaults() {
        let args = args(&[]);
        assert!(args.config.is_none());
        assert!(!args.debug);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = PacConfig::default().with_addr_in_pac("file:1");
        let args = args(&[
            "--listen",
            "0.0.0.0:1080",
            "--addr-in-pac",
            "cli:2",
            "--direct-file",
            "/tmp/direct",
        ]);
        apply_overrides(&mut config, &args);

        assert_eq!(config.listen, "0.0.0.0:1080");
        assert_eq!(config.addr_in_pac.as_deref(), Some("cli:2"));
        assert_eq!(config.direct_file, Some(PathBuf::from("/tmp/direct")));
    }

    #[test]
    fn no_overrides_keep_file_values() {
        let mut config = PacConfig::default().with_addr_in_pac("file:1");
        apply_overrides(&mut config, &args(&[]));
        assert_eq!(config.addr_in_pac.as_deref(), Some("file:1"));
    }

    #[test]
    fn load_config_from_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"listen": "127.0.0.1:3128"}}"#).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = load_config(&args(&["--config", &path])).unwrap();
        assert_eq!(config.listen, "127.0.0.1:3128");
    }

    #[test]
    fn load_config_rejects_invalid_override() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        let path = file.path().to_string_lossy().to_string();

        assert!(load_config(&args(&["--config", &path, "--listen", "nope"])).is_err());
    }

    #[test]
    fn site_stat_uses_direct_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "example.com").unwrap();
        let config = PacConfig::default().with_direct_file(file.path());

        let provider = site_stat(&config);
        assert_eq!(provider.direct_list().unwrap(), vec!["example.com"]);
    }
}
