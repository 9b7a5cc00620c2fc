// src/source/query.rs
//! Search request bodies. Pure; no I/O.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

pub const PUBLISHED_FIELD: &str = "published_at";
pub const DEFAULT_RESULT_CAP: usize = 100;

/// Bool query: optional `published_at >= since` range plus a keyword
/// multi-match (title boosted), newest first, capped at `size`.
///
/// The multi-match only narrows the candidate set; `relevance::keep` has the
/// final word.
pub fn build_search(keywords: &[String], since: Option<DateTime<Utc>>, size: usize) -> Value {
    let mut must = Vec::with_capacity(2);
    if let Some(since) = since {
        must.push(json!({
            "range": {
                PUBLISHED_FIELD: {
                    "gte": since.to_rfc3339_opts(SecondsFormat::Secs, true)
                }
            }
        }));
    }
    if !keywords.is_empty() {
        must.push(json!({
            "multi_match": {
                "query": keywords.join(" "),
                "fields": ["title^2", "content"],
                "type": "best_fields",
                "operator": "or"
            }
        }));
    }

    json!({
        "query": { "bool": { "must": must } },
        "size": size,
        "sort": [ { PUBLISHED_FIELD: { "order": "desc" } } ],
        "track_total_hits": true
    })
}

/// Unfiltered, one-hit probe used only to tell "empty index" from "no matches".
pub fn build_probe() -> Value {
    json!({
        "query": { "match_all": {} },
        "size": 1,
        "track_total_hits": true
    })
}
