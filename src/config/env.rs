// src/config/env.rs
use super::Config;

pub const ENV_ES_URL: &str = "ES_URL";
pub const ENV_DRUPAL_URL: &str = "DRUPAL_URL";
pub const ENV_DRUPAL_USERNAME: &str = "DRUPAL_USERNAME";
pub const ENV_DRUPAL_TOKEN: &str = "DRUPAL_TOKEN";
pub const ENV_DRUPAL_AUTH_METHOD: &str = "DRUPAL_AUTH_METHOD";
pub const ENV_REDIS_URL: &str = "REDIS_URL";
pub const ENV_APP_DEBUG: &str = "APP_DEBUG";

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Environment wins over the file for endpoints, credentials and debug mode.
pub fn apply_overrides(cfg: &mut Config) {
    if let Some(v) = non_empty_var(ENV_ES_URL) {
        cfg.elasticsearch.url = v;
    }
    if let Some(v) = non_empty_var(ENV_DRUPAL_URL) {
        cfg.drupal.url = v;
    }
    if let Some(v) = non_empty_var(ENV_DRUPAL_USERNAME) {
        cfg.drupal.username = v;
    }
    if let Some(v) = non_empty_var(ENV_DRUPAL_TOKEN) {
        cfg.drupal.token = v;
    }
    if let Some(v) = non_empty_var(ENV_DRUPAL_AUTH_METHOD) {
        cfg.drupal.auth_method = v;
    }
    if let Some(v) = non_empty_var(ENV_REDIS_URL) {
        cfg.redis.url = v;
    }
    if let Some(v) = non_empty_var(ENV_APP_DEBUG) {
        cfg.debug = parse_bool(&v);
    }
}

/// `true`, `1`, `yes` (any case) are true; everything else is false.
pub fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}
