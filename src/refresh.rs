//! Background snapshot refresh system
//!
//! On a fixed interval every username in the store is fetched again from
//! upstream and its snapshot overwritten. One user's failure never stops the
//! others from being refreshed. Outcomes are sent to a `RefreshReporter`
//! rather than being handled by the refresh loop itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::cache::Username;
use crate::resolver::{Fetched, Resolver};

/// Configuration for the refresh schedule
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Time between refresh ticks
    pub interval: Duration,
    /// Maximum number of usernames fetched at once within a tick
    pub concurrency: usize,
    /// Whether auto-refresh is enabled
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(180), // 3 minutes
            concurrency: 4,
            enabled: true,
        }
    }
}

/// Why refreshing an entry failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Upstream could not provide the snapshot
    Upstream,
    /// The fresh snapshot could not be written
    Persist,
    /// The store could not be enumerated
    List,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Persist => "persist",
            Self::List => "list",
        }
    }
}

/// Totals for one refresh tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub refreshed: usize,
    pub failed: usize,
}

/// Events emitted while a tick runs
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    /// A tick started with this many stored usernames
    TickStarted { keys: usize, at: DateTime<Utc> },
    /// A snapshot was fetched and overwritten
    Refreshed { username: Username, at: DateTime<Utc> },
    /// A snapshot could not be refreshed
    Failed {
        username: Username,
        kind: FailureKind,
        error: String,
        at: DateTime<Utc>,
    },
    /// The store could not be listed, so the tick did nothing
    ListFailed { error: String, at: DateTime<Utc> },
    /// A tick finished
    TickCompleted(RefreshSummary),
}

/// Sink for refresh outcomes
pub trait RefreshReporter: Send + Sync {
    fn report(&self, event: RefreshEvent);
}

/// Logs refresh events with `tracing` and counts failures by kind
#[derive(Debug, Default)]
pub struct TracingReporter {
    upstream_failures: AtomicU64,
    persist_failures: AtomicU64,
    list_failures: AtomicU64,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of failures of `kind` reported since creation
    pub fn failures(&self, kind: FailureKind) -> u64 {
        self.counter(kind).load(Ordering::Relaxed)
    }

    fn counter(&self, kind: FailureKind) -> &AtomicU64 {
        match kind {
            FailureKind::Upstream => &self.upstream_failures,
            FailureKind::Persist => &self.persist_failures,
            FailureKind::List => &self.list_failures,
        }
    }
}

impl RefreshReporter for TracingReporter {
    fn report(&self, event: RefreshEvent) {
        match event {
            RefreshEvent::TickStarted { keys, at } => {
                debug!(keys, %at, "refresh tick started");
            }
            RefreshEvent::Refreshed { username, at } => {
                info!(%username, %at, "snapshot auto-updated");
            }
            RefreshEvent::Failed {
                username,
                kind,
                error,
                at,
            } => {
                self.counter(kind).fetch_add(1, Ordering::Relaxed);
                error!(%username, kind = kind.as_str(), %error, %at, "snapshot refresh failed");
            }
            RefreshEvent::ListFailed { error, at } => {
                self.counter(FailureKind::List).fetch_add(1, Ordering::Relaxed);
                error!(kind = FailureKind::List.as_str(), %error, %at, "could not list stored snapshots");
            }
            RefreshEvent::TickCompleted(summary) => {
                debug!(
                    refreshed = summary.refreshed,
                    failed = summary.failed,
                    elapsed_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
                    "refresh tick completed"
                );
            }
        }
    }
}

/// Forwards refresh events over a channel
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<RefreshEvent>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RefreshEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RefreshReporter for ChannelReporter {
    fn report(&self, event: RefreshEvent) {
        // Receiver gone means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

/// Re-fetches every stored snapshot
pub struct Refresher {
    resolver: Arc<Resolver>,
    reporter: Arc<dyn RefreshReporter>,
    concurrency: usize,
}

impl Refresher {
    pub fn new(
        resolver: Arc<Resolver>,
        reporter: Arc<dyn RefreshReporter>,
        concurrency: usize,
    ) -> Self {
        Self {
            resolver,
            reporter,
            concurrency: concurrency.max(1),
        }
    }

    /// Runs one refresh tick over every stored username
    ///
    /// Always fetches, bypassing the cache check. Per-user failures are
    /// reported and skipped.
    pub async fn run_once(&self) -> RefreshSummary {
        let started_at = Utc::now();

        let keys = match self.resolver.store().list_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                self.reporter.report(RefreshEvent::ListFailed {
                    error: err.to_string(),
                    at: Utc::now(),
                });
                return self.complete(started_at, 0, 0);
            }
        };

        self.reporter.report(RefreshEvent::TickStarted {
            keys: keys.len(),
            at: started_at,
        });

        let outcomes: Vec<bool> = stream::iter(keys)
            .map(|username| self.refresh_one(username))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let refreshed = outcomes.iter().filter(|ok| **ok).count();
        self.complete(started_at, refreshed, outcomes.len() - refreshed)
    }

    async fn refresh_one(&self, username: Username) -> bool {
        let failure = match self.resolver.fetch_and_store(&username).await {
            Ok(Fetched {
                persist_error: None,
                ..
            }) => {
                self.reporter.report(RefreshEvent::Refreshed {
                    username,
                    at: Utc::now(),
                });
                return true;
            }
            Ok(Fetched {
                persist_error: Some(err),
                ..
            }) => (FailureKind::Persist, err.to_string()),
            Err(err) => (FailureKind::Upstream, err.to_string()),
        };

        let (kind, error) = failure;
        self.reporter.report(RefreshEvent::Failed {
            username,
            kind,
            error,
            at: Utc::now(),
        });
        false
    }

    fn complete(&self, started_at: DateTime<Utc>, refreshed: usize, failed: usize) -> RefreshSummary {
        let summary = RefreshSummary {
            started_at,
            finished_at: Utc::now(),
            refreshed,
            failed,
        };
        self.reporter.report(RefreshEvent::TickCompleted(summary.clone()));
        summary
    }
}

/// Handle for controlling the background refresh task
///
/// Created once at service start. Dropping the handle also stops the task,
/// but only `shutdown` waits for it to exit.
pub struct RefreshHandle {
    /// Flag to signal shutdown
    shutdown_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Spawns the periodic refresh task
    ///
    /// The first tick runs one full interval after spawning. Ticks never
    /// overlap; ticks missed while one is running are skipped.
    pub fn spawn(config: RefreshConfig, refresher: Arc<Refresher>) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if !config.enabled {
            info!("background refresh disabled");
            return Self {
                shutdown_tx,
                task: None,
            };
        }

        info!(interval_secs = config.interval.as_secs(), "background refresh scheduled");
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // Skip the first tick (immediate)
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown_rx.recv() => break,
                }

                tokio::select! {
                    _ = refresher.run_once() => {}
                    _ = shutdown_rx.recv() => break,
                }
            }
            debug!("background refresh stopped");
        });

        Self {
            shutdown_tx,
            task: Some(task),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the refresh task and waits for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(task) = self.task {
            let _ = task.await;
        }
    }
}
