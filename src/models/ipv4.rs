//! IPv4 network blocks and CIDR partitioning.
//!
//! Provides the [`Ipv4`] block type used for VPC and subnet address ranges,
//! along with the mask arithmetic the partitioner is built on.

use serde::de;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Maximum length for an IPv4 prefix (32 bits).
pub const MAX_LENGTH: u8 = 32;

/// Number of prefix bits added when a VPC block is split for its subnets.
pub const SPLIT_BITS: u8 = 2;

/// Subnet mask for a prefix length, e.g. `/24` -> `0xFFFFFF00`.
/// Lengths above [`MAX_LENGTH`] are treated as `/32`.
fn prefix_mask(len: u8) -> u32 {
    let right_len = MAX_LENGTH - len.min(MAX_LENGTH);
    ((u32::MAX as u64 >> right_len) << right_len) as u32
}

/// IPv4 address block in CIDR notation.
#[derive(Eq, Ord, PartialEq, PartialOrd, Debug, Copy, Clone, Hash)]
pub struct Ipv4 {
    /// The IPv4 address.
    pub addr: Ipv4Addr,
    /// The prefix length (0-32).
    pub mask: u8,
}

impl Ipv4 {
    /// Create a new [`Ipv4`] from a CIDR string (e.g., "10.0.0.0/16").
    pub fn new(addr_cidr: &str) -> Result<Ipv4, Box<dyn Error>> {
        let addr_cidr = addr_cidr.trim();
        let (addr, mask) = addr_cidr
            .split_once('/')
            .ok_or_else(|| format!("Invalid address/mask '{addr_cidr}'"))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| format!("Invalid address {addr}"))?;
        let mask: u8 = mask
            .parse()
            .map_err(|_| format!("Invalid prefix length {mask}"))?;
        if mask > MAX_LENGTH {
            return Err(format!("Prefix length /{mask} is longer than /{MAX_LENGTH}").into());
        }
        Ok(Ipv4 { addr, mask })
    }

    /// The block with host bits cleared, e.g. `10.0.3.7/16` -> `10.0.0.0/16`.
    pub fn network(&self) -> Ipv4 {
        Ipv4 {
            addr: self.lo(),
            mask: self.mask,
        }
    }

    /// Lowest (network) address in the block.
    pub fn lo(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.addr) & prefix_mask(self.mask))
    }

    /// Highest (broadcast) address in the block.
    pub fn hi(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.addr) | !prefix_mask(self.mask))
    }

    /// Partition this block into equal children of prefix length `new_prefix`.
    ///
    /// Children are contiguous, disjoint and returned in ascending address
    /// order; together they cover the parent exactly.
    pub fn subnets(&self, new_prefix: u8) -> Result<Vec<Ipv4>, Box<dyn Error>> {
        if new_prefix > MAX_LENGTH {
            return Err(format!(
                "Cannot split {self} into /{new_prefix}: longer than /{MAX_LENGTH}"
            )
            .into());
        }
        if new_prefix < self.mask {
            return Err(format!("Cannot split {self} into larger /{new_prefix} blocks").into());
        }

        let count = 1u64 << (new_prefix - self.mask);
        let step = 1u64 << (MAX_LENGTH - new_prefix);
        let base = u32::from(self.lo()) as u64;

        let children = (0..count)
            .map(|i| Ipv4 {
                addr: Ipv4Addr::from((base + i * step) as u32),
                mask: new_prefix,
            })
            .collect();
        Ok(children)
    }

    /// Split into the four equal children used for VPC subnets (prefix + 2).
    ///
    /// # Examples
    /// ```
    /// use region_mesh::models::Ipv4;
    /// let blocks = Ipv4::new("10.0.0.0/16").unwrap().split4().unwrap();
    /// assert_eq!(blocks[1].to_string(), "10.0.64.0/18");
    /// ```
    pub fn split4(&self) -> Result<Vec<Ipv4>, Box<dyn Error>> {
        self.subnets(self.mask + SPLIT_BITS)
    }
}

impl FromStr for Ipv4 {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ipv4::new(s)
    }
}

impl Serialize for Ipv4 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ipv4 {
    fn deserialize<D>(deserializer: D) -> Result<Ipv4, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ipv4::new(&s).map_err(|e| de::Error::custom(format!("invalid CIDR {s}: {e}")))
    }
}

impl std::fmt::Display for Ipv4 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.mask)
    }
}
