//! Diagnostic: list a few destination nodes (to find valid UUIDs) and
//! optionally fetch one by id.
//!
//! Usage: `getnode [NODE_ID]` with `CONFIG_PATH` pointing at the config file.

use anyhow::{Context, Result};
use std::process::ExitCode;

use news_sync::config::{Config, DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH};
use news_sync::logging::init_tracing;
use news_sync::publish::DrupalClient;

const LIST_LIMIT: usize = 5;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("getnode: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let path = std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = Config::load(&path)?;
    init_tracing(cfg.debug)?;

    let client = DrupalClient::new(&cfg.drupal).context("drupal client")?;
    let content_type = &cfg.service.content_type;

    tracing::info!(base_url = %client.base_url(), content_type = %content_type, limit = LIST_LIMIT, "listing nodes");
    let list = client
        .list_nodes(content_type, LIST_LIMIT)
        .await
        .context("list nodes")?;
    println!("=== Node List ===");
    println!("{}", serde_json::to_string_pretty(&list)?);

    if let Some(node_id) = std::env::args().nth(1) {
        tracing::info!(node_id = %node_id, "fetching node");
        let node = client
            .get_node(content_type, &node_id)
            .await
            .with_context(|| format!("fetch node {node_id}"))?;
        println!("\n=== Node Details ===");
        println!("{}", serde_json::to_string_pretty(&node)?);
    }
    Ok(())
}
