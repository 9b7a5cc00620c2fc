// src/metrics.rs
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;

/// One-time metric descriptions (so series show up on /metrics before first use).
pub fn describe_sync_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sync_cycles_total", "Completed sync cycles.");
        describe_counter!(
            "sync_items_posted_total",
            "Items created at the destination, per tenant."
        );
        describe_counter!(
            "sync_items_skipped_total",
            "Items dropped by the relevance filter or the duplicate ledger, per tenant."
        );
        describe_counter!(
            "sync_items_failed_total",
            "Items the destination rejected, per tenant."
        );
        describe_counter!(
            "sync_tenant_errors_total",
            "Tenant passes aborted early (fetch failure, cancellation)."
        );
        describe_counter!(
            "sync_ledger_errors_total",
            "Duplicate store errors by operation."
        );
        describe_histogram!("sync_search_ms", "Search backend latency in milliseconds.");
        describe_histogram!("sync_publish_ms", "Destination create latency in milliseconds.");
        describe_gauge!("sync_watermark_ts", "Unix ts of the shared watermark.");
        describe_gauge!("sync_last_cycle_ts", "Unix ts when the last cycle finished.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_sync_metrics();
        Ok(Self { handle })
    }

    /// `/metrics` in Prometheus exposition format plus a plain `/health`.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new()
            .route(
                "/metrics",
                get(move || {
                    let h = handle.clone();
                    async move { h.render() }
                }),
            )
            .route("/health", get(|| async { "OK" }))
    }

    /// Serve the router until `cancel` fires.
    pub async fn serve(&self, addr: &str, cancel: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("bind metrics listener on {addr}"))?;
        tracing::info!(addr, "metrics endpoint listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .context("metrics server")?;
        Ok(())
    }
}
