//! Per-region SSH key pair.

use crate::engine::{props, Handle, ResourceOptions, ResourceType, Stack};
use std::error::Error;

/// Declare `deployer-{region}` holding `public_key`. Instances reference its
/// `key_name` attribute.
pub fn create_key_pair(
    stack: &mut Stack,
    region: &str,
    public_key: &str,
    opts: ResourceOptions,
) -> Result<Handle, Box<dyn Error>> {
    if public_key.trim().is_empty() {
        return Err(format!("key pair for {region}: empty public key").into());
    }
    stack.declare(
        ResourceType::KeyPair,
        &format!("deployer-{region}"),
        props([
            ("key_name", format!("deployer-key-{region}").into()),
            ("public_key", public_key.trim().into()),
        ]),
        opts,
    )
}
