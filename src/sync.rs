// src/sync.rs
//! # Sync orchestrator
//! Timer-driven loop: for each city in configured order, fetch → filter →
//! dedup check → throttle → publish → dedup mark. Cities run sequentially;
//! a failing city never stops the others or the end-of-cycle watermark write.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::{CityConfig, ServiceConfig};
use crate::error::SyncError;
use crate::ledger::DuplicateLedger;
use crate::metrics::describe_sync_metrics;
use crate::publish::Publisher;
use crate::relevance;
use crate::source::types::ItemSource;
use crate::throttle::DeliveryThrottle;

/// Shared "published at or after this instant is new" cutoff. The orchestrator
/// is the only writer; writes never move it backwards.
#[derive(Debug)]
pub struct Watermark {
    inner: RwLock<DateTime<Utc>>,
}

impl Watermark {
    pub fn new(initial: DateTime<Utc>) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    pub fn get(&self) -> DateTime<Utc> {
        *self.inner.read().expect("watermark lock poisoned")
    }

    /// Move to `ts` unless that would go backwards. Returns the stored value.
    pub fn advance_to(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let mut w = self.inner.write().expect("watermark lock poisoned");
        if ts > *w {
            *w = ts;
        }
        *w
    }
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub keywords: Vec<String>,
    pub content_type: String,
    pub group_type: String,
    /// `None` = no time-range filter.
    pub lookback: Option<chrono::Duration>,
    pub check_interval: Duration,
}

impl SyncSettings {
    pub fn from_service(cfg: &ServiceConfig) -> Self {
        Self {
            keywords: cfg.crime_keywords.clone(),
            content_type: cfg.content_type.clone(),
            group_type: cfg.group_type.clone(),
            lookback: cfg.lookback(),
            check_interval: cfg.check_interval(),
        }
    }
}

/// Per-city outcome of one cycle. Always produced, even when the city aborted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TenantReport {
    pub city: String,
    pub posted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Set when the city stopped early (fetch failure, cancellation).
    pub aborted: Option<String>,
}

impl TenantReport {
    fn new(city: &str) -> Self {
        Self {
            city: city.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub watermark: DateTime<Utc>,
    pub tenants: Vec<TenantReport>,
}

impl CycleReport {
    pub fn posted(&self) -> usize {
        self.tenants.iter().map(|t| t.posted).sum()
    }

    pub fn tenant(&self, city: &str) -> Option<&TenantReport> {
        self.tenants.iter().find(|t| t.city == city)
    }
}

pub struct SyncService {
    cities: Vec<CityConfig>,
    settings: SyncSettings,
    source: Arc<dyn ItemSource>,
    publisher: Arc<dyn Publisher>,
    ledger: DuplicateLedger,
    throttle: Arc<DeliveryThrottle>,
    watermark: Watermark,
}

impl SyncService {
    /// Initial watermark is `now - lookback` (or `now` with the window disabled).
    pub fn new(
        cities: Vec<CityConfig>,
        settings: SyncSettings,
        source: Arc<dyn ItemSource>,
        publisher: Arc<dyn Publisher>,
        ledger: DuplicateLedger,
        throttle: Arc<DeliveryThrottle>,
    ) -> Self {
        let now = Utc::now();
        let initial = settings
            .lookback
            .map_or(Some(now), |lookback| now.checked_sub_signed(lookback))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self {
            cities,
            settings,
            source,
            publisher,
            ledger,
            throttle,
            watermark: Watermark::new(initial),
        }
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark.get()
    }

    pub fn cities(&self) -> &[CityConfig] {
        &self.cities
    }

    /// Cycle now, then on every tick, until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            cities = self.cities.len(),
            interval_secs = self.settings.check_interval.as_secs(),
            lookback_hours = self.settings.lookback.map(|d| d.num_hours()),
            "sync loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("sync loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.run_once(&cancel).await;
                }
            }
        }
    }

    /// One full pass over every city, then the single watermark write.
    pub async fn run_once(&self, cancel: &CancellationToken) -> CycleReport {
        describe_sync_metrics();
        let started_at = Utc::now();
        // Read once so every city in the cycle sees the same cutoff.
        let since = self.settings.lookback.map(|_| self.watermark.get());
        tracing::info!(since = ?since, "sync cycle started");

        let mut tenants = Vec::with_capacity(self.cities.len());
        for city in &self.cities {
            if cancel.is_cancelled() {
                tracing::info!(city = %city.name, "cancelled; not starting city");
                break;
            }
            let report = self.process_city(cancel, city, since).await;
            if let Some(reason) = &report.aborted {
                tracing::warn!(city = %city.name, reason = %reason, "city aborted; continuing with next");
            }
            tenants.push(report);
        }

        // Advanced even with the window disabled, to keep one code path.
        let watermark = self.watermark.advance_to(Utc::now());
        counter!("sync_cycles_total").increment(1);
        gauge!("sync_watermark_ts").set(watermark.timestamp() as f64);
        gauge!("sync_last_cycle_ts").set(Utc::now().timestamp() as f64);

        let report = CycleReport {
            started_at,
            watermark,
            tenants,
        };
        tracing::info!(
            posted = report.posted(),
            cities = report.tenants.len(),
            watermark = %watermark.to_rfc3339(),
            "sync cycle completed"
        );
        report
    }

    /// Fetch and deliver one city's candidates. Item-level failures are counted,
    /// never propagated.
    pub async fn process_city(
        &self,
        cancel: &CancellationToken,
        city: &CityConfig,
        since: Option<DateTime<Utc>>,
    ) -> TenantReport {
        let mut report = TenantReport::new(&city.name);

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(anyhow!(SyncError::Cancelled)),
            r = self.source.find(city, since) => r,
        };
        let items = match fetched {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(city = %city.name, source = self.source.name(), error = %format!("{e:#}"), "fetch failed");
                counter!("sync_tenant_errors_total", "tenant" => city.name.clone()).increment(1);
                report.aborted = Some(format!("find articles: {e:#}"));
                return report;
            }
        };

        for item in items {
            if !relevance::keep(&item, &self.settings.keywords) {
                tracing::debug!(city = %city.name, item_id = %item.id, title = %item.title, "not relevant");
                report.skipped += 1;
                continue;
            }
            tracing::debug!(
                city = %city.name,
                item_id = %item.id,
                keywords = ?relevance::matched_keywords(&item, &self.settings.keywords),
                "relevant"
            );
            if item.id.trim().is_empty() {
                tracing::warn!(city = %city.name, title = %item.title, "item has no id; skipping");
                report.skipped += 1;
                continue;
            }
            if self.ledger.has_seen(&item.id).await {
                tracing::debug!(city = %city.name, item_id = %item.id, "already posted");
                report.skipped += 1;
                continue;
            }

            if let Err(e) = self.throttle.acquire(cancel).await {
                tracing::warn!(city = %city.name, error = %e, "throttle wait aborted");
                counter!("sync_tenant_errors_total", "tenant" => city.name.clone()).increment(1);
                report.aborted = Some(format!("rate limit wait: {e}"));
                break;
            }

            // Not raced against `cancel`: once sent, the outcome must be recorded.
            match self
                .publisher
                .send(
                    &item,
                    city,
                    &self.settings.content_type,
                    &self.settings.group_type,
                )
                .await
            {
                Ok(created) => {
                    if let Err(e) = self.ledger.mark_seen(&item.id).await {
                        tracing::warn!(city = %city.name, item_id = %item.id, error = %e, "posted but not marked; may be re-posted");
                    }
                    tracing::info!(
                        city = %city.name,
                        item_id = %item.id,
                        drupal_id = %created.id,
                        title = %item.title,
                        "article posted"
                    );
                    report.posted += 1;
                }
                Err(e) => {
                    tracing::error!(city = %city.name, item_id = %item.id, error = %e, "posting failed");
                    report.failed += 1;
                }
            }
        }

        counter!("sync_items_posted_total", "tenant" => city.name.clone()).increment(report.posted as u64);
        counter!("sync_items_skipped_total", "tenant" => city.name.clone()).increment(report.skipped as u64);
        counter!("sync_items_failed_total", "tenant" => city.name.clone()).increment(report.failed as u64);
        tracing::info!(
            city = %city.name,
            posted = report.posted,
            skipped = report.skipped,
            failed = report.failed,
            aborted = report.aborted.is_some(),
            "city processed"
        );
        report
    }
}
