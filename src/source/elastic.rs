// src/source/elastic.rs
//! Thin Elasticsearch `_search` client over reqwest.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::types::Item;
use super::SearchBackend;
use crate::config::ElasticsearchConfig;
use crate::error::SyncError;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Hits,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hits {
    #[serde(default)]
    pub total: Total,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// ES 7+ reports `{"value": n, "relation": "eq"}`, older versions a bare number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Total {
    Object { value: u64 },
    Count(u64),
}

impl Default for Total {
    fn default() -> Self {
        Total::Count(0)
    }
}

impl Total {
    pub fn value(&self) -> u64 {
        match self {
            Total::Object { value } | Total::Count(value) => *value,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_source")]
    pub source: Item,
}

impl SearchResponse {
    pub fn total(&self) -> u64 {
        self.hits.total.value()
    }

    /// Items in backend order; an item without its own id takes the hit's `_id`.
    pub fn into_items(self) -> Vec<Item> {
        self.hits
            .hits
            .into_iter()
            .map(|hit| {
                let mut item = hit.source;
                if item.id.trim().is_empty() {
                    item.id = hit.id;
                }
                item
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct ElasticClient {
    base_url: String,
    username: String,
    password: String,
    http: Client,
}

impl std::fmt::Debug for ElasticClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ElasticClient {
    pub fn new(cfg: &ElasticsearchConfig) -> Result<Self, SyncError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(cfg.timeout())
            .build()?;
        Ok(Self {
            base_url: cfg.url.trim_end_matches('/').to_string(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Pull a readable reason out of an ES error document, else return the raw body.
fn error_reason(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/root_cause/0/reason")
                .or_else(|| v.pointer("/error/reason"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl SearchBackend for ElasticClient {
    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse, SyncError> {
        let url = format!("{}/{}/_search", self.base_url, index);
        let mut req = self.http.post(&url).json(body);
        if !self.username.is_empty() {
            req = req.basic_auth(&self.username, Some(&self.password));
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SyncError::Backend {
                status: status.as_u16(),
                body: error_reason(&text),
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| SyncError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_falls_back_to_backend_id() {
        let raw = r#"{
            "hits": {
                "total": {"value": 2, "relation": "eq"},
                "hits": [
                    {"_id": "es-1", "_source": {"id": "own-1", "title": "a"}},
                    {"_id": "es-2", "_source": {"title": "b"}}
                ]
            }
        }"#;
        let resp: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.total(), 2);
        let items = resp.into_items();
        assert_eq!(items[0].id, "own-1");
        assert_eq!(items[1].id, "es-2");
    }

    #[test]
    fn legacy_numeric_total_is_accepted() {
        let raw = r#"{"hits": {"total": 7, "hits": []}}"#;
        let resp: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.total(), 7);
    }

    #[test]
    fn error_reason_prefers_root_cause() {
        let body = r#"{"error":{"root_cause":[{"type":"index_not_found_exception","reason":"no such index [x_articles]"}],"reason":"outer"},"status":404}"#;
        assert_eq!(error_reason(body), "no such index [x_articles]");
        assert_eq!(error_reason("  gateway timeout \n"), "gateway timeout");
    }
}
