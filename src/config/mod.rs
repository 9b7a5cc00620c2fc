// src/config/mod.rs
//! Service configuration: TOML file, defaults, env overrides, validation.

pub mod env;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const ENV_CONFIG_PATH: &str = "CONFIG_PATH";
/// Upper bound for hour-valued settings (100 years).
pub const MAX_HOURS: u64 = 100 * 365 * 24;

fn default_check_interval_secs() -> u64 {
    300
}
fn default_rate_limit_rps() -> u32 {
    10
}
fn default_lookback_hours() -> u64 {
    24
}
fn default_result_cap() -> usize {
    100
}
fn default_content_type() -> String {
    "node--article".to_string()
}
fn default_group_type() -> String {
    "group--crime_news".to_string()
}
fn default_dedup_ttl_hours() -> u64 {
    8760
}
fn default_dedup_key_prefix() -> String {
    "posted:article:".to_string()
}
fn default_http_timeout_secs() -> u64 {
    30
}

pub fn default_crime_keywords() -> Vec<String> {
    [
        "police",
        "arrest",
        "charged",
        "court",
        "murder",
        "assault",
        "robbery",
        "theft",
        "crime",
        "criminal",
        "suspect",
        "victim",
        "investigation",
        "warrant",
        "sentence",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Debug mode: verbose compact logs instead of JSON lines.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,
    #[serde(default)]
    pub drupal: DrupalConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub cities: Vec<CityConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrupalConfig {
    #[serde(default)]
    pub url: String,
    /// Username for REST API authentication; empty means token-only.
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub token: String,
    /// Value of the `AUTH-METHOD` header (application id), if the site wants one.
    #[serde(default)]
    pub auth_method: String,
    /// Development only.
    #[serde(default)]
    pub skip_tls_verify: bool,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedisConfig {
    /// `host:port` or a full `redis://` URL.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub db: i64,
}

fn timeout_or_default(secs: u64) -> Duration {
    if secs == 0 {
        Duration::from_secs(default_http_timeout_secs())
    } else {
        Duration::from_secs(secs)
    }
}

impl ElasticsearchConfig {
    pub fn timeout(&self) -> Duration {
        timeout_or_default(self.timeout_secs)
    }
}

impl DrupalConfig {
    pub fn timeout(&self) -> Duration {
        timeout_or_default(self.timeout_secs)
    }
}

impl RedisConfig {
    /// Connection URL for the redis client. A bare address gets password and db folded in.
    pub fn connection_url(&self) -> String {
        let raw = self.url.trim();
        if raw.contains("://") {
            return raw.to_string();
        }
        let auth = if self.password.is_empty() {
            String::new()
        } else {
            format!(":{}@", self.password)
        };
        format!("redis://{auth}{raw}/{}", self.db)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    #[serde(default = "default_rate_limit_rps")]
    pub rate_limit_rps: u32,
    /// Token bucket capacity; defaults to `rate_limit_rps`.
    #[serde(default)]
    pub rate_limit_burst: Option<u32>,
    /// 0 disables the time-range filter and searches the whole index.
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u64,
    #[serde(default = "default_result_cap")]
    pub result_cap: usize,
    #[serde(default = "default_crime_keywords")]
    pub crime_keywords: Vec<String>,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default = "default_group_type")]
    pub group_type: String,
    #[serde(default = "default_dedup_ttl_hours")]
    pub dedup_ttl_hours: u64,
    #[serde(default = "default_dedup_key_prefix")]
    pub dedup_key_prefix: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            rate_limit_rps: default_rate_limit_rps(),
            rate_limit_burst: None,
            lookback_hours: default_lookback_hours(),
            result_cap: default_result_cap(),
            crime_keywords: default_crime_keywords(),
            content_type: default_content_type(),
            group_type: default_group_type(),
            dedup_ttl_hours: default_dedup_ttl_hours(),
            dedup_key_prefix: default_dedup_key_prefix(),
        }
    }
}

impl ServiceConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// `None` when the lookback window is disabled.
    pub fn lookback(&self) -> Option<chrono::Duration> {
        if self.lookback_hours == 0 {
            None
        } else {
            i64::try_from(self.lookback_hours)
                .ok()
                .and_then(chrono::Duration::try_hours)
        }
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_hours.saturating_mul(3600))
    }

    pub fn rate_limit_burst(&self) -> u32 {
        self.rate_limit_burst.unwrap_or(self.rate_limit_rps)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// e.g. `0.0.0.0:9100`; unset disables the HTTP exporter.
    #[serde(default)]
    pub listen_addr: Option<String>,
}

/// One tenant ("city"): its own destination group and optionally its own index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityConfig {
    pub name: String,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub group_id: String,
}

impl CityConfig {
    /// Explicit index override, else `{name}_articles`.
    pub fn index_name(&self) -> String {
        match self.index.as_deref().map(str::trim) {
            Some(idx) if !idx.is_empty() => idx.to_string(),
            _ => format!("{}_articles", self.name),
        }
    }
}

impl Config {
    /// Read, apply env overrides, validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&data)?;
        env::apply_overrides(&mut cfg);
        cfg.validate().context("invalid config")?;
        Ok(cfg)
    }

    /// Parse only; no env overrides, no validation.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: Config = toml::from_str(s).context("parse config")?;
        if cfg.service.crime_keywords.is_empty() {
            cfg.service.crime_keywords = default_crime_keywords();
        }
        if cfg.service.content_type.trim().is_empty() {
            cfg.service.content_type = default_content_type();
        }
        if cfg.service.group_type.trim().is_empty() {
            cfg.service.group_type = default_group_type();
        }
        if cfg.service.dedup_ttl_hours == 0 {
            cfg.service.dedup_ttl_hours = default_dedup_ttl_hours();
        }
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.elasticsearch.url.trim().is_empty() {
            bail!("elasticsearch.url is required");
        }
        if self.drupal.url.trim().is_empty() {
            bail!("drupal.url is required");
        }
        if self.drupal.token.trim().is_empty() {
            bail!("drupal.token is required");
        }
        if self.redis.url.trim().is_empty() {
            bail!("redis.url is required");
        }
        if self.service.rate_limit_rps == 0 {
            bail!("service.rate_limit_rps must be positive");
        }
        if self.service.rate_limit_burst == Some(0) {
            bail!("service.rate_limit_burst must be positive when set");
        }
        if self.service.check_interval_secs == 0 {
            bail!("service.check_interval_secs must be positive");
        }
        if self.service.lookback_hours > MAX_HOURS {
            bail!("service.lookback_hours must be at most {MAX_HOURS}");
        }
        if self.service.dedup_ttl_hours > MAX_HOURS {
            bail!("service.dedup_ttl_hours must be at most {MAX_HOURS}");
        }
        if self.cities.is_empty() {
            bail!("at least one city must be configured");
        }
        let mut names = BTreeSet::new();
        for (i, city) in self.cities.iter().enumerate() {
            if city.name.trim().is_empty() {
                bail!("cities[{i}].name is required");
            }
            if city.group_id.trim().is_empty() {
                bail!("cities[{i}].group_id is required");
            }
            if !names.insert(city.name.as_str()) {
                bail!("cities[{i}].name {:?} is duplicated", city.name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[elasticsearch]
url = "http://localhost:9200"

[drupal]
url = "https://news.example.test"
token = "secret"

[redis]
url = "localhost:6379"

[[cities]]
name = "sudbury"
group_id = "6f0c7f3e-5d1c-4a59-9a4e-2b8a0c1d9e11"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = Config::from_toml_str(MINIMAL).unwrap();
        cfg.validate().unwrap();
        assert!(!cfg.debug);
        assert_eq!(cfg.service.check_interval(), Duration::from_secs(300));
        assert_eq!(cfg.service.rate_limit_rps, 10);
        assert_eq!(cfg.service.rate_limit_burst(), 10);
        assert_eq!(cfg.service.lookback(), Some(chrono::Duration::hours(24)));
        assert_eq!(cfg.service.result_cap, 100);
        assert_eq!(cfg.service.crime_keywords.len(), 15);
        assert_eq!(cfg.service.content_type, "node--article");
        assert_eq!(cfg.service.group_type, "group--crime_news");
        assert_eq!(cfg.service.dedup_ttl(), Duration::from_secs(8760 * 3600));
        assert_eq!(cfg.service.dedup_key_prefix, "posted:article:");
        assert_eq!(cfg.drupal.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.elasticsearch.timeout(), Duration::from_secs(30));
        assert!(cfg.metrics.listen_addr.is_none());
        assert_eq!(cfg.cities[0].index_name(), "sudbury_articles");
    }

    #[test]
    fn zero_lookback_disables_window() {
        let s = format!("{MINIMAL}\n[service]\nlookback_hours = 0\n");
        let cfg = Config::from_toml_str(&s).unwrap();
        assert_eq!(cfg.service.lookback(), None);
    }

    #[test]
    fn explicit_index_override_wins() {
        let city = CityConfig {
            name: "sudbury".into(),
            index: Some("sudbury-news-v2".into()),
            group_id: "g".into(),
        };
        assert_eq!(city.index_name(), "sudbury-news-v2");

        let blank = CityConfig {
            index: Some("  ".into()),
            ..city
        };
        assert_eq!(blank.index_name(), "sudbury_articles");
    }

    #[test]
    fn validation_rejects_missing_pieces() {
        let mut cfg = Config::from_toml_str(MINIMAL).unwrap();
        cfg.drupal.token.clear();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("drupal.token"), "{err}");

        let mut cfg = Config::from_toml_str(MINIMAL).unwrap();
        cfg.cities.clear();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("at least one city"), "{err}");

        let mut cfg = Config::from_toml_str(MINIMAL).unwrap();
        cfg.cities[0].group_id.clear();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("cities[0].group_id"), "{err}");

        let mut cfg = Config::from_toml_str(MINIMAL).unwrap();
        cfg.service.rate_limit_rps = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validation_rejects_out_of_range_hours() {
        let mut cfg = Config::from_toml_str(MINIMAL).unwrap();
        cfg.service.lookback_hours = 3_000_000_000;
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("service.lookback_hours"), "{err}");

        let mut cfg = Config::from_toml_str(MINIMAL).unwrap();
        cfg.service.dedup_ttl_hours = u64::MAX;
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("service.dedup_ttl_hours"), "{err}");

        let mut cfg = Config::from_toml_str(MINIMAL).unwrap();
        cfg.service.lookback_hours = MAX_HOURS;
        cfg.service.dedup_ttl_hours = MAX_HOURS;
        cfg.validate().unwrap();
        assert_eq!(
            cfg.service.lookback(),
            Some(chrono::Duration::hours(MAX_HOURS as i64))
        );
    }

    #[test]
    fn duration_helpers_never_overflow() {
        let mut svc = ServiceConfig::default();
        svc.lookback_hours = u64::MAX;
        svc.dedup_ttl_hours = u64::MAX;
        assert_eq!(svc.lookback(), None);
        assert_eq!(svc.dedup_ttl(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn duplicate_city_names_rejected() {
        let mut cfg = Config::from_toml_str(MINIMAL).unwrap();
        cfg.cities.push(cfg.cities[0].clone());
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("duplicated"), "{err}");
    }

    #[test]
    fn redis_connection_url_folds_password_and_db() {
        let r = RedisConfig {
            url: "cache.internal:6379".into(),
            password: "pw".into(),
            db: 2,
        };
        assert_eq!(r.connection_url(), "redis://:pw@cache.internal:6379/2");

        let bare = RedisConfig {
            url: "localhost:6379".into(),
            ..Default::default()
        };
        assert_eq!(bare.connection_url(), "redis://localhost:6379/0");

        let full = RedisConfig {
            url: "rediss://user:x@host:6380/4".into(),
            password: "ignored".into(),
            db: 9,
        };
        assert_eq!(full.connection_url(), "rediss://user:x@host:6380/4");
    }
}
