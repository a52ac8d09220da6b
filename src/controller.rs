//! Dashboard controller.
//!
//! Owns the record cache, the server-alert cache and the current student
//! filter. A refresh cycle runs `Loading → Ready` (or `→ Error`), and every
//! read recomputes the views from the cache and filter; nothing derived is
//! stored.
//!
//! Network calls happen without holding the cache lock. A refresh gate
//! guarantees at most one cycle is in flight.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::alerts::derive_alerts;
use crate::models::{Alert, Record, StudentFilter};
use crate::normalize::{normalize, normalize_alerts};
use crate::source::DashboardSource;
use crate::views::{student_directory, DashboardViews, StudentOption, ViewKind, ViewSink};

// ---

/// User-facing message shown when records cannot be loaded.
pub const RECORD_SOURCE_MESSAGE: &str = "Não foi possível obter registros do backend.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum Phase {
    Loading,
    Ready,
    /// Terminal: the record source failed before any load succeeded.
    Error(String),
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("record source failed: {0}")]
    RecordSource(String),

    #[error("a refresh is already in flight")]
    RefreshInProgress,

    #[error("dashboard is in a terminal error state: {0}")]
    Terminal(String),
}

struct Cache {
    phase: Phase,
    /// Set once a load has succeeded; later record failures keep the cache.
    loaded: bool,
    records: Vec<Record>,
    /// Alerts supplied by the backend; empty means "derive locally".
    server_alerts: Vec<Alert>,
    filter: StudentFilter,
}

impl Cache {
    fn filtered(&self) -> Vec<Record> {
        self.filter.apply(&self.records)
    }

    /// Backend alerts win whenever the backend sent any; they are never
    /// merged with derived ones.
    fn alerts_for(&self, filtered: &[Record]) -> Vec<Alert> {
        // ---
        if self.server_alerts.is_empty() {
            derive_alerts(filtered)
        } else {
            self.server_alerts
                .iter()
                .filter(|a| self.filter.matches(&a.student_id))
                .cloned()
                .collect()
        }
    }

    fn views(&self) -> DashboardViews {
        let filtered = self.filtered();
        let alerts = self.alerts_for(&filtered);
        DashboardViews::build(&filtered, &alerts)
    }
}

/// Releases the refresh gate when dropped, whatever the outcome.
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshGuard(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Controller<S> {
    source: S,
    refreshing: AtomicBool,
    cache: RwLock<Cache>,
}

impl<S: DashboardSource> Controller<S> {
    /// Create a controller in the `Loading` phase with an empty cache.
    pub fn new(source: S) -> Self {
        // ---
        Controller {
            source,
            refreshing: AtomicBool::new(false),
            cache: RwLock::new(Cache {
                phase: Phase::Loading,
                loaded: false,
                records: Vec::new(),
                server_alerts: Vec::new(),
                filter: StudentFilter::All,
            }),
        }
    }

    /// Run one fetch cycle, replacing the record cache.
    ///
    /// Rejected while another cycle is in flight and once the initial load
    /// has failed (the `Error` phase). A record failure after a successful
    /// load keeps the previous cache and leaves the controller `Ready` for the
    /// next refresh. On success the filter is reset to every student.
    pub async fn refresh(&self) -> Result<(), DashboardError> {
        // ---
        let _guard = RefreshGuard::acquire(&self.refreshing).ok_or_else(|| {
            debug!("Refresh requested while another is in flight");
            DashboardError::RefreshInProgress
        })?;

        {
            let mut cache = self.cache.write().await;
            if let Phase::Error(message) = &cache.phase {
                return Err(DashboardError::Terminal(message.clone()));
            }
            cache.phase = Phase::Loading;
        }

        info!("Refreshing dashboard");

        let raw_records = match self.source.fetch_records().await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Failed to fetch records: {:#}", e);
                let mut cache = self.cache.write().await;
                if cache.loaded {
                    cache.phase = Phase::Ready;
                } else {
                    cache.records.clear();
                    cache.server_alerts.clear();
                    cache.phase = Phase::Error(RECORD_SOURCE_MESSAGE.to_string());
                }
                return Err(DashboardError::RecordSource(format!("{e:#}")));
            }
        };
        let records = normalize(&raw_records);

        let server_alerts = match self.source.fetch_alerts().await {
            Ok(raw) if !raw.is_empty() => normalize_alerts(&raw),
            Ok(_) => {
                debug!("Backend sent no alerts, deriving locally");
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to fetch alerts, deriving locally: {:#}", e);
                Vec::new()
            }
        };

        info!(
            "Loaded {} records and {} backend alerts",
            records.len(),
            server_alerts.len()
        );

        let mut cache = self.cache.write().await;
        cache.records = records;
        cache.server_alerts = server_alerts;
        cache.filter = StudentFilter::All;
        cache.phase = Phase::Ready;
        cache.loaded = true;
        Ok(())
    }

    pub async fn phase(&self) -> Phase {
        self.cache.read().await.phase.clone()
    }

    pub async fn filter(&self) -> StudentFilter {
        self.cache.read().await.filter.clone()
    }

    /// Change the student filter and return the recomputed views.
    pub async fn set_filter(&self, filter: StudentFilter) -> DashboardViews {
        // ---
        let mut cache = self.cache.write().await;
        debug!("Filter set to {}", filter.as_str());
        cache.filter = filter;
        cache.views()
    }

    /// Views for the current filter.
    pub async fn views(&self) -> DashboardViews {
        self.cache.read().await.views()
    }

    /// Alert list for the current filter.
    pub async fn alerts(&self) -> Vec<Alert> {
        // ---
        let cache = self.cache.read().await;
        let filtered = cache.filtered();
        cache.alerts_for(&filtered)
    }

    /// Student selector entries over the whole cache.
    pub async fn students(&self) -> Vec<StudentOption> {
        student_directory(&self.cache.read().await.records)
    }

    /// Publish every view for the current filter to `sink`; returns the
    /// views the sink rejected.
    pub async fn publish<K: ViewSink + ?Sized>(&self, sink: &mut K) -> Vec<ViewKind> {
        let views = self.views().await;
        views.publish(sink)
    }
}
