// src/publish/mod.rs
pub mod drupal;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::CityConfig;
use crate::error::SyncError;
use crate::source::types::Item;

pub use self::drupal::DrupalClient;

/// What the destination needs to create one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRequest {
    pub title: String,
    pub body: String,
    pub url: String,
    pub group_id: String,
    pub group_type: String,
    pub content_type: String,
}

impl ArticleRequest {
    pub fn from_item(item: &Item, city: &CityConfig, content_type: &str, group_type: &str) -> Self {
        Self {
            title: item.title.clone(),
            body: item.body.clone(),
            url: item.url.clone(),
            group_id: city.group_id.clone(),
            group_type: group_type.to_string(),
            content_type: content_type.to_string(),
        }
    }
}

/// Identifier of the resource the destination created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedResource {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// One creation request per call; no retries. An `Err` after the request was
/// sent may still mean the node exists (e.g. malformed success body).
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn send(
        &self,
        item: &Item,
        city: &CityConfig,
        content_type: &str,
        group_type: &str,
    ) -> Result<CreatedResource, SyncError>;
}
