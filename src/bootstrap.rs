// src/bootstrap.rs
//! Turns a validated `Config` into live clients and a ready `SyncService`.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::ledger::DuplicateLedger;
use crate::publish::DrupalClient;
use crate::source::elastic::ElasticClient;
use crate::source::SourceQuery;
use crate::store::RedisStore;
use crate::sync::{SyncService, SyncSettings};
use crate::throttle::DeliveryThrottle;

/// Boot must not hang on an unreachable Redis.
pub const REDIS_BOOT_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis-backed ledger configured from `[service]`. Fails if Redis does not answer PING.
pub async fn connect_ledger(cfg: &Config) -> Result<DuplicateLedger> {
    let store = RedisStore::connect(&cfg.redis.connection_url(), REDIS_BOOT_TIMEOUT)
        .await
        .context("redis connection")?;
    Ok(ledger_over(Arc::new(store), cfg))
}

pub fn ledger_over(store: Arc<dyn crate::store::DuplicateStore>, cfg: &Config) -> DuplicateLedger {
    DuplicateLedger::new(store)
        .with_ttl(cfg.service.dedup_ttl())
        .with_prefix(cfg.service.dedup_key_prefix.clone())
}

/// Source + publisher + throttle around an already-connected ledger.
pub fn build_service(cfg: &Config, ledger: DuplicateLedger) -> Result<SyncService> {
    let elastic = ElasticClient::new(&cfg.elasticsearch).context("elasticsearch client")?;
    let source = SourceQuery::new(Arc::new(elastic), cfg.service.crime_keywords.clone())
        .with_result_cap(cfg.service.result_cap);
    let drupal = DrupalClient::new(&cfg.drupal).context("drupal client")?;
    let throttle = DeliveryThrottle::new(cfg.service.rate_limit_rps, cfg.service.rate_limit_burst());

    // Safe diagnostics: never log credentials.
    info!(
        elasticsearch = %cfg.elasticsearch.url,
        drupal = %cfg.drupal.url,
        drupal_user_set = !cfg.drupal.username.is_empty(),
        rate_limit_rps = cfg.service.rate_limit_rps,
        keywords = cfg.service.crime_keywords.len(),
        cities = cfg.cities.len(),
        "sync service configured"
    );

    Ok(SyncService::new(
        cfg.cities.clone(),
        SyncSettings::from_service(&cfg.service),
        Arc::new(source),
        Arc::new(drupal),
        ledger,
        Arc::new(throttle),
    ))
}
