//! Network domain models.
//!
//! - [`Ipv4`] - address block with CIDR partitioning
//! - [`Tier`] - public/private subnet roles

mod ipv4;
mod tier;

// Re-export public types
pub use ipv4::{Ipv4, MAX_LENGTH, SPLIT_BITS};
pub use tier::{Tier, SUBNETS_PER_TIER};
