//! Periodically refreshed direct-list cache.
//!
//! Request handlers need the learned direct domains on every PAC request,
//! while the site-statistics provider may be slow (it can hit the disk).
//! The store keeps one published [`DirectList`] behind an `Arc` and swaps it
//! wholesale on each refresh.
//!
//! ## Architecture
//!
//! ```text
//! PAC Request → DirectListStore.snapshot() → Arc<DirectList>
//!                      ↑ (swap every refresh interval)
//!               SiteStatProvider.direct_list()
//! ```
//!
//! The provider is called and the new list is built before the write lock is
//! taken; the lock only covers the pointer swap. Readers hold the read lock
//! only long enough to clone the `Arc`, so a reader sees either the whole
//! previous list or the whole new one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use bypass_core::{DirectList, SiteStatProvider};

/// Default refresh interval for the direct list.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Copy-on-write cache of the current direct list.
#[derive(Clone)]
pub struct DirectListStore {
    /// Currently published snapshot.
    current: Arc<RwLock<Arc<DirectList>>>,
    /// Where learned direct domains come from.
    provider: Arc<dyn SiteStatProvider>,
    /// Number of successful refreshes.
    refresh_count: Arc<AtomicU64>,
    /// Time of the last successful refresh.
    last_refresh: Arc<RwLock<Option<DateTime<Utc>>>>,
    /// Refresh interval.
    refresh_interval: Duration,
}

impl std::fmt::Debug for DirectListStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectListStore")
            .field("domains", &self.current.read().len())
            .field("refresh_count", &self.refresh_count.load(Ordering::Relaxed))
            .field("last_refresh", &*self.last_refresh.read())
            .field("refresh_interval", &self.refresh_interval)
            .finish()
    }
}

impl DirectListStore {
    /// Creates a store with an empty snapshot.
    ///
    /// Nothing is read from the provider until [`refresh`](Self::refresh)
    /// or [`start`](Self::start) is called.
    pub fn new(provider: Arc<dyn SiteStatProvider>) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(DirectList::default()))),
            provider,
            refresh_count: Arc::new(AtomicU64::new(0)),
            last_refresh: Arc::new(RwLock::new(None)),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    /// Creates a store with a custom refresh interval.
    pub fn with_refresh_interval(provider: Arc<dyn SiteStatProvider>, interval: Duration) -> Self {
        let mut store = Self::new(provider);
        store.refresh_interval = interval;
        store
    }

    /// Returns the most recently published list.
    #[inline]
    pub fn snapshot(&self) -> Arc<DirectList> {
        Arc::clone(&*self.current.read())
    }

    /// Pulls the provider's list and publishes it.
    ///
    /// On provider failure the previous snapshot stays in place. Returns
    /// true if a new snapshot was published.
    pub fn refresh(&self) -> bool {
        let domains = match self.provider.direct_list() {
            Ok(domains) => domains,
            Err(e) => {
                tracing::warn!("Failed to refresh direct list: {}", e);
                return false;
            }
        };

        let next = Arc::new(DirectList::new(domains));
        let len = next.len();
        let old = std::mem::replace(&mut *self.current.write(), next);

        *self.last_refresh.write() = Some(Utc::now());
        self.refresh_count.fetch_add(1, Ordering::Relaxed);

        if old.len() != len {
            tracing::info!("Direct list updated: {} -> {} domains", old.len(), len);
        } else {
            tracing::debug!("Direct list refreshed: {} domains", len);
        }
        true
    }

    /// Number of successful refreshes so far.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    /// Time of the last successful refresh.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.read()
    }

    /// Returns the refresh interval.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Refreshes once, then keeps refreshing in a background task.
    ///
    /// The first refresh runs on the calling thread before this returns, so
    /// a PAC request served afterwards never sees the startup-empty list.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> RefreshHandle {
        self.refresh();

        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let handle = tokio::spawn(self.clone().refresh_loop(shutdown_rx));

        tracing::info!(
            "Direct list refresh task started (every {:?})",
            self.refresh_interval
        );

        RefreshHandle {
            shutdown_tx,
            handle,
        }
    }

    /// Refreshes every interval until a shutdown signal arrives.
    ///
    /// The first refresh happens one full interval after the loop starts.
    /// Providers may block (the file provider reads the disk), so each
    /// refresh runs on the blocking pool.
    pub fn refresh_loop(
        self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> impl std::future::Future<Output = ()> + Send {
        async move {
            let start = tokio::time::Instant::now() + self.refresh_interval;
            let mut ticker = tokio::time::interval_at(start, self.refresh_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let store = self.clone();
                        if let Err(e) = tokio::task::spawn_blocking(move || store.refresh()).await {
                            tracing::warn!("Direct list refresh task failed: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Direct list refresh task stopped");
                        break;
                    }
                }
            }
        }
    }
}

/// Handle for the background refresh task.
///
/// Dropping the handle also stops the task.
pub struct RefreshHandle {
    shutdown_tx: broadcast::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

impl RefreshHandle {
    /// Signals the refresh task to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Waits for the refresh task to finish.
    pub async fn wait(self) {
        let _ = self.handle.await;
    }

    /// Stops the refresh task and waits for it to finish.
    pub async fn stop(self) {
        self.shutdown();
        self.wait().await;
    }
}
