//! AWS lookups.
//!
//! - [`cli`] - command execution for the `aws` CLI
//! - [`lookup`] - zone and image lookups
//! - [`cache`] - day-keyed cache of lookup answers

mod cache;
mod cli;
mod lookup;

// Re-export public types and functions
pub use cache::{default_cache_file, CachedLookup};
pub use cli::run;
pub use lookup::{
    most_recent, parse_images, parse_zones, AwsCliLookup, Image, ImageFilter, Lookup, LookupError,
    StaticLookup,
};
