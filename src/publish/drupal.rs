// src/publish/drupal.rs
//! Drupal JSON:API client: node creation plus the read calls `getnode` uses.

use anyhow::{bail, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use metrics::histogram;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

use super::{ArticleRequest, CreatedResource, Publisher};
use crate::config::{CityConfig, DrupalConfig};
use crate::error::SyncError;
use crate::source::types::Item;

const JSON_API: &str = "application/vnd.api+json";

#[derive(Debug, Serialize)]
struct NodeDocument<'a> {
    data: NodeData<'a>,
}

#[derive(Debug, Serialize)]
struct NodeData<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    attributes: NodeAttributes<'a>,
    relationships: NodeRelationships<'a>,
}

#[derive(Debug, Serialize)]
struct NodeAttributes<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct NodeRelationships<'a> {
    field_group: Relationship<'a>,
}

#[derive(Debug, Serialize)]
struct Relationship<'a> {
    data: ResourceRef<'a>,
}

#[derive(Debug, Serialize)]
struct ResourceRef<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedDocument {
    data: CreatedResource,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDocument {
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: String,
}

/// JSON:API creation document for one article.
pub fn build_payload(req: &ArticleRequest) -> Value {
    let doc = NodeDocument {
        data: NodeData {
            kind: &req.content_type,
            attributes: NodeAttributes {
                title: &req.title,
                body: &req.body,
            },
            relationships: NodeRelationships {
                field_group: Relationship {
                    data: ResourceRef {
                        kind: &req.group_type,
                        id: &req.group_id,
                    },
                },
            },
        },
    };
    serde_json::to_value(doc).unwrap_or(Value::Null)
}

/// `node--article` → `{base}/jsonapi/node/article`. A label without `--` is
/// taken as a node bundle.
pub fn endpoint_for(base_url: &str, content_type: &str) -> String {
    match content_type.split_once("--") {
        Some((entity, bundle)) if !entity.is_empty() && !bundle.is_empty() => {
            format!("{base_url}/jsonapi/{entity}/{bundle}")
        }
        _ => format!("{base_url}/jsonapi/node/{content_type}"),
    }
}

/// base64(`username:token`), or base64(`token`) without a username.
pub fn api_key_value(username: &str, token: &str) -> String {
    if username.is_empty() {
        STANDARD.encode(token)
    } else {
        STANDARD.encode(format!("{username}:{token}"))
    }
}

#[derive(Clone)]
pub struct DrupalClient {
    base_url: String,
    api_key: String,
    auth_method: String,
    http: Client,
}

impl std::fmt::Debug for DrupalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrupalClient")
            .field("base_url", &self.base_url)
            .field("auth_method", &self.auth_method)
            .finish_non_exhaustive()
    }
}

impl DrupalClient {
    pub fn new(cfg: &DrupalConfig) -> Result<Self> {
        if cfg.url.trim().is_empty() {
            bail!("drupal URL is required");
        }
        if cfg.token.trim().is_empty() {
            bail!("drupal token is required");
        }

        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(cfg.timeout());
        if cfg.skip_tls_verify {
            tracing::warn!(base_url = %cfg.url, "TLS certificate verification is disabled for drupal");
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            base_url: cfg.url.trim_end_matches('/').to_string(),
            api_key: api_key_value(&cfg.username, &cfg.token),
            auth_method: cfg.auth_method.clone(),
            http: builder.build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Same credentials on every request.
    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req
            .header("API-KEY", &self.api_key)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", self.api_key));
        if self.auth_method.is_empty() {
            req
        } else {
            req.header("AUTH-METHOD", &self.auth_method)
        }
    }

    /// `GET /session/token`; plain-text body.
    pub async fn csrf_token(&self) -> Result<String, SyncError> {
        let url = format!("{}/session/token", self.base_url);
        let resp = self
            .authorize(self.http.get(&url))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        if resp.status() != StatusCode::OK {
            return Err(SyncError::Status {
                status: resp.status().to_string(),
            });
        }
        Ok(resp.text().await?.trim().to_string())
    }

    pub async fn post_article(&self, req: &ArticleRequest) -> Result<CreatedResource, SyncError> {
        let started = Instant::now();
        let endpoint = endpoint_for(&self.base_url, &req.content_type);
        let payload = build_payload(req);

        tracing::debug!(
            %endpoint,
            title = %req.title,
            content_type = %req.content_type,
            group_type = %req.group_type,
            group_id = %req.group_id,
            url = %req.url,
            "posting article"
        );

        let mut http_req = self
            .authorize(self.http.post(&endpoint))
            .header(reqwest::header::CONTENT_TYPE, JSON_API)
            .header(reqwest::header::ACCEPT, JSON_API)
            .json(&payload);

        // A missing token is not fatal; the POST's own response is the real verdict.
        match self.csrf_token().await {
            Ok(token) => http_req = http_req.header("X-CSRF-Token", token),
            Err(e) => {
                tracing::warn!(%endpoint, error = %e, "csrf token fetch failed; posting without it")
            }
        }

        let resp = http_req.send().await.map_err(|e| {
            tracing::error!(%endpoint, title = %req.title, error = %e, "drupal request failed");
            SyncError::Transport(e)
        })?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        let duration_ms = started.elapsed().as_millis() as u64;
        histogram!("sync_publish_ms").record(duration_ms as f64);

        if status.as_u16() >= 400 {
            let err = match serde_json::from_slice::<ErrorDocument>(&bytes) {
                Ok(doc) if !doc.errors.is_empty() => {
                    let first = &doc.errors[0];
                    SyncError::Api {
                        status: status.as_u16(),
                        title: first.title.clone(),
                        detail: first.detail.clone(),
                    }
                }
                _ => SyncError::Status {
                    status: status.to_string(),
                },
            };
            tracing::error!(%endpoint, title = %req.title, status = status.as_u16(), duration_ms, error = %err, "drupal rejected article");
            return Err(err);
        }

        let created = serde_json::from_slice::<CreatedDocument>(&bytes)
            .map_err(|e| SyncError::Decode(e.to_string()))?
            .data;
        if created.id.is_empty() {
            return Err(SyncError::Decode("response carries no resource id".into()));
        }

        tracing::info!(
            %endpoint,
            title = %req.title,
            drupal_id = %created.id,
            drupal_type = %created.kind,
            status = status.as_u16(),
            duration_ms,
            "article posted"
        );
        Ok(created)
    }

    /// First `limit` nodes of a content type, raw JSON:API document.
    pub async fn list_nodes(&self, content_type: &str, limit: usize) -> Result<Value, SyncError> {
        let url = endpoint_for(&self.base_url, content_type);
        let limit = limit.to_string();
        let req = self
            .authorize(self.http.get(&url))
            .query(&[("page[limit]", limit.as_str())]);
        self.get_document(req).await
    }

    pub async fn get_node(&self, content_type: &str, id: &str) -> Result<Value, SyncError> {
        let url = format!("{}/{}", endpoint_for(&self.base_url, content_type), id);
        self.get_document(self.authorize(self.http.get(&url))).await
    }

    async fn get_document(&self, req: RequestBuilder) -> Result<Value, SyncError> {
        let resp = req.header(reqwest::header::ACCEPT, JSON_API).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                status: status.to_string(),
            });
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| SyncError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Publisher for DrupalClient {
    async fn send(
        &self,
        item: &Item,
        city: &CityConfig,
        content_type: &str,
        group_type: &str,
    ) -> Result<CreatedResource, SyncError> {
        let req = ArticleRequest::from_item(item, city, content_type, group_type);
        self.post_article(&req).await
    }
}
