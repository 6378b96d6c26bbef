//! Subnet tiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of subnets created for every requested tier.
pub const SUBNETS_PER_TIER: usize = 2;

/// Logical subnet role, decides routing and public address exposure.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Public,
    Private,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Public => "public",
            Tier::Private => "private",
        }
    }

    /// Offset of the tier's first block in the VPC's partitioned block list.
    pub fn block_offset(&self) -> usize {
        match self {
            Tier::Public => 0,
            Tier::Private => SUBNETS_PER_TIER,
        }
    }

    /// Instances launched in this tier get a public address.
    pub fn maps_public_ip(&self) -> bool {
        matches!(self, Tier::Public)
    }

    /// Deterministic subnet key, e.g. `subnet-public-0`.
    pub fn subnet_key(&self, index: usize) -> String {
        format!("subnet-{}-{index}", self.as_str())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
