// cargo watch -x 'fmt' -x 'run'

//! Declares a per-region VPC mesh (network, subnets, gateway, routes,
//! security group, instance) as a resource graph for an external
//! provisioning engine.

pub mod aws;
pub mod components;
pub mod config;
pub mod driver;
pub mod engine;
pub mod models;
pub mod output;

pub use config::Config;
pub use driver::{prefetch, provision, run, RegionFacts};
pub use engine::{Plan, Stack};

use aws::{AwsCliLookup, CachedLookup, Lookup, StaticLookup};
use std::sync::Arc;

/// Lookup backend for `config`: static when offline, otherwise the `aws`
/// CLI behind the day-keyed cache.
pub fn lookup_for(config: &Config) -> Arc<dyn Lookup> {
    if config.offline {
        log::warn!("offline: zones and images are placeholders");
        Arc::new(StaticLookup::new())
    } else {
        Arc::new(CachedLookup::new(
            AwsCliLookup::default(),
            config.lookup_cache.as_deref(),
        ))
    }
}
