// src/source/mod.rs
pub mod elastic;
pub mod query;
pub mod types;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use serde_json::Value;
use std::sync::Arc;

use crate::config::CityConfig;
use crate::error::SyncError;
use self::elastic::SearchResponse;
use self::types::{Item, ItemSource};

/// Raw search call against one index/collection.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse, SyncError>;
}

/// Builds and issues the per-city, keyword-narrowed, time-windowed search.
#[derive(Clone)]
pub struct SourceQuery {
    backend: Arc<dyn SearchBackend>,
    keywords: Vec<String>,
    result_cap: usize,
}

impl SourceQuery {
    pub fn new(backend: Arc<dyn SearchBackend>, keywords: Vec<String>) -> Self {
        Self {
            backend,
            keywords,
            result_cap: query::DEFAULT_RESULT_CAP,
        }
    }

    pub fn with_result_cap(mut self, cap: usize) -> Self {
        self.result_cap = cap.max(1);
        self
    }

    /// Diagnostic only: logs whether the index holds anything at all.
    /// Never touches the caller's result or error.
    async fn probe_empty_index(&self, index: &str, city: &str) {
        match self.backend.search(index, &query::build_probe()).await {
            Ok(resp) if resp.total() == 0 => {
                tracing::info!(city, index, "index is empty");
            }
            Ok(resp) => {
                tracing::info!(
                    city,
                    index,
                    index_total = resp.total(),
                    "index has documents but none match keywords/window"
                );
            }
            Err(e) => {
                tracing::debug!(city, index, error = %e, "diagnostic probe failed");
            }
        }
    }
}

#[async_trait]
impl ItemSource for SourceQuery {
    async fn find(&self, city: &CityConfig, since: Option<DateTime<Utc>>) -> Result<Vec<Item>> {
        let index = city.index_name();
        let body = query::build_search(&self.keywords, since, self.result_cap);

        let t0 = std::time::Instant::now();
        let result = self.backend.search(&index, &body).await;
        histogram!("sync_search_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        let resp = result.with_context(|| format!("search {index}"))?;

        let total = resp.total();
        let items = resp.into_items();
        tracing::info!(
            city = %city.name,
            index = %index,
            found = items.len(),
            total,
            windowed = since.is_some(),
            "search finished"
        );

        if total == 0 {
            self.probe_empty_index(&index, &city.name).await;
        }
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "elasticsearch"
    }
}
