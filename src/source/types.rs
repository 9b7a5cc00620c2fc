// src/source/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CityConfig;

/// A news document as stored in the search index.
///
/// Indexers disagree on field names, so the aliases below absorb the variants
/// (`content`/`body`, `published_at`/`publishedAt`/`published`, ...). `id` may be
/// empty here; the search client falls back to the backend's `_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "content", alias = "body", alias = "text")]
    pub body: String,
    #[serde(default, alias = "link", alias = "canonical_url")]
    pub url: String,
    #[serde(
        default = "epoch",
        rename = "published_at",
        alias = "publishedAt",
        alias = "published",
        alias = "pub_date"
    )]
    pub published_at: DateTime<Utc>,
    #[serde(default, alias = "origin")]
    pub source: String,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Per-tenant candidate fetch. `since` is `None` when the lookback window is disabled.
#[async_trait::async_trait]
pub trait ItemSource: Send + Sync {
    async fn find(&self, city: &CityConfig, since: Option<DateTime<Utc>>) -> Result<Vec<Item>>;
    fn name(&self) -> &'static str;
}
