// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod publish;
pub mod relevance;
pub mod source;
pub mod store;
pub mod sync;
pub mod throttle;

// ---- Re-exports for stable public API ----
pub use crate::config::{CityConfig, Config};
pub use crate::error::SyncError;
pub use crate::ledger::DuplicateLedger;
pub use crate::publish::{CreatedResource, Publisher};
pub use crate::source::types::{Item, ItemSource};
pub use crate::sync::{CycleReport, SyncService, SyncSettings, TenantReport, Watermark};
pub use crate::throttle::DeliveryThrottle;
