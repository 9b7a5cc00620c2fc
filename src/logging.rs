// src/logging.rs
use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level used when `RUST_LOG` is unset.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "news_sync=debug,info"
    } else {
        "info"
    }
}

/// Global subscriber. Debug mode: compact human-readable lines.
/// Otherwise: JSON lines for the log shipper. `RUST_LOG` always wins.
pub fn init_tracing(debug: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if debug {
        registry.with(fmt::layer().compact()).try_init()
    } else {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    };
    res.map_err(|e| anyhow!("init tracing: {e}"))
}
