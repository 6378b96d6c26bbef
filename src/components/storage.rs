//! Shared state bucket.

use crate::engine::{props, Handle, ResourceOptions, ResourceType, Stack};
use serde_json::json;
use std::error::Error;

/// Declare the bucket `bucket_name` through `opts.provider`, which pins the
/// bucket's region.
pub fn create_state_bucket(
    stack: &mut Stack,
    bucket_name: &str,
    opts: ResourceOptions,
) -> Result<Handle, Box<dyn Error>> {
    if opts.provider.is_none() {
        return Err(format!("bucket {bucket_name}: needs a region provider").into());
    }
    let bucket = stack.declare(
        ResourceType::Bucket,
        "s3-bucket-state",
        props([
            ("bucket", bucket_name.into()),
            (
                "tags",
                json!({ "Name": bucket_name, "Purpose": "region-mesh state" }).into(),
            ),
        ]),
        opts,
    )?;
    log::info!("state bucket {bucket_name}");
    Ok(bucket)
}
