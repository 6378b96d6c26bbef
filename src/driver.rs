//! Orchestration across regions.
//!
//! Region facts are prefetched concurrently, then the whole graph is built
//! in one sequential pass. Every region gets its own grouping node and
//! provider context, so region subgraphs never share names.

use crate::aws::{ImageFilter, Lookup};
use crate::components::iam::ADMIN_POLICY_ARN;
use crate::components::{
    create_key_pair, create_state_bucket, render_bootstrap, BootstrapParams, IngressRule,
    InstanceArgs, InstanceRole, RuleSource, SecurityGroup, SecurityGroupArgs, Vpc,
};
use crate::config::{Config, ZONES_PER_REGION};
use crate::engine::{props, Handle, ResourceOptions, ResourceType, Stack};
use crate::models::{Ipv4, Tier};
use futures::future::try_join_all;
use std::error::Error;
use std::sync::Arc;

pub const STACK_NAME: &str = "region-mesh";
pub const ROLE_NAME: &str = "admin-role";
pub const PROFILE_NAME: &str = "instance-profile";

/// Lookup answers for one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFacts {
    pub region: String,
    /// Available zones in provider order, not truncated.
    pub zones: Vec<String>,
    /// Only looked up when an instance will be created.
    pub image_id: Option<String>,
}

/// Resolve zones (and images when `with_images`) for every region in
/// parallel on the blocking pool. Results keep the order of `regions`.
pub async fn prefetch(
    lookup: Arc<dyn Lookup>,
    regions: &[String],
    with_images: bool,
) -> Result<Vec<RegionFacts>, Box<dyn Error>> {
    let tasks = regions.iter().cloned().map(|region| {
        let lookup = Arc::clone(&lookup);
        tokio::task::spawn_blocking(move || -> Result<RegionFacts, String> {
            let zones = lookup
                .availability_zones(&region)
                .map_err(|e| format!("{region}: zone lookup failed: {e}"))?;
            let image_id = if with_images {
                let image = lookup
                    .latest_image(&region, &ImageFilter::default())
                    .map_err(|e| format!("{region}: image lookup failed: {e}"))?;
                Some(image)
            } else {
                None
            };
            Ok(RegionFacts {
                region,
                zones,
                image_id,
            })
        })
    });

    let joined = try_join_all(tasks)
        .await
        .map_err(|e| format!("Lookup task failed: {e}"))?;
    let mut facts = Vec::with_capacity(joined.len());
    for result in joined {
        facts.push(result?);
    }
    log::info!("prefetched facts for {} region(s)", facts.len());
    Ok(facts)
}

/// Account-wide resources shared by every region in the extended variant.
struct Shared {
    role: InstanceRole,
    bucket_name: String,
}

/// Declare the whole mesh into `stack`.
pub fn provision(
    stack: &mut Stack,
    config: &Config,
    facts: &[RegionFacts],
) -> Result<(), Box<dyn Error>> {
    let shared = if config.extended {
        Some(create_shared(stack, config)?)
    } else {
        None
    };
    for region_facts in facts {
        provision_region(stack, config, region_facts, shared.as_ref())?;
    }
    log::info!(
        "stack {} declared {} resources, {} outputs",
        stack.name(),
        stack.resources().len(),
        stack.outputs().len()
    );
    Ok(())
}

fn create_provider(
    stack: &mut Stack,
    name: &str,
    region: &str,
    opts: ResourceOptions,
) -> Result<Handle, Box<dyn Error>> {
    stack.declare(
        ResourceType::Provider,
        name,
        props([("region", region.into())]),
        opts,
    )
}

fn create_shared(stack: &mut Stack, config: &Config) -> Result<Shared, Box<dyn Error>> {
    let role = InstanceRole::create(
        stack,
        ROLE_NAME,
        PROFILE_NAME,
        ADMIN_POLICY_ARN,
        ResourceOptions::new(),
    )?;
    let s3_provider = create_provider(
        stack,
        &format!("aws-s3-{}", config.bucket_region),
        &config.bucket_region,
        ResourceOptions::new(),
    )?;
    let bucket = create_state_bucket(
        stack,
        &config.bucket_name,
        ResourceOptions::new().provider(s3_provider.id),
    )?;
    stack.export("bucketName", bucket.id_ref())?;
    Ok(Shared {
        role,
        bucket_name: config.bucket_name.clone(),
    })
}

fn provision_region(
    stack: &mut Stack,
    config: &Config,
    facts: &RegionFacts,
    shared: Option<&Shared>,
) -> Result<(), Box<dyn Error>> {
    let region = facts.region.as_str();
    log::info!("provisioning region {region}");

    let group = stack.declare(
        ResourceType::RegionGroup,
        &format!("{region}-vpc"),
        props([("region", region.into())]),
        ResourceOptions::new(),
    )?;
    let provider = create_provider(
        stack,
        &format!("aws-{region}"),
        region,
        ResourceOptions::new().parent(group.id),
    )?;
    let opts = ResourceOptions::new()
        .parent(group.id)
        .provider(provider.id);

    let zones: Vec<String> = facts
        .zones
        .iter()
        .take(ZONES_PER_REGION)
        .cloned()
        .collect();
    let tiers: &[Tier] = if shared.is_some() {
        &[Tier::Public, Tier::Private]
    } else {
        &[Tier::Public]
    };

    let mut vpc = Vpc::create(
        stack,
        &format!("public-{region}"),
        config.vpc_cidr,
        &zones,
        opts,
    )?;
    vpc.create_subnets(stack, tiers)?;
    for subnet in vpc.subnets() {
        log::info!(
            "{region}: {} {} in zone {}",
            subnet.key,
            subnet.cidr,
            subnet.zone
        );
    }
    vpc.create_internet_gateway(stack)?;
    vpc.create_route_table(stack, Tier::Public)?;

    let sg_name = format!("ec2-{region}");
    let ssh = IngressRule::tcp(22, RuleSource::Cidr(Ipv4::new("0.0.0.0/0")?));
    let mut sg_args = SecurityGroupArgs::new(&sg_name, vpc.id(), "Allow ssh inbound traffic");
    sg_args = sg_args.ingress(ssh);
    if shared.is_some() {
        let intra = IngressRule::all_traffic(RuleSource::SelfReference);
        sg_args = sg_args.ingress(intra);
    }
    let sg = SecurityGroup::create(stack, sg_args, opts)?;
    log::debug!(
        "{region}: security group with {} ingress and {} egress rules",
        sg.ingress_rules().len(),
        sg.egress_rules().len()
    );

    let Some(shared) = shared else {
        return Ok(());
    };

    let key_pair = create_key_pair(stack, region, &config.public_key, opts)?;
    let image_id = facts
        .image_id
        .clone()
        .ok_or_else(|| format!("{region}: no image id was looked up"))?;
    let user_data = render_bootstrap(&BootstrapParams {
        bucket_name: &shared.bucket_name,
        bucket_region: &config.bucket_region,
        instance_region: region,
    });
    let instance = vpc.create_compute_instance(
        stack,
        InstanceArgs {
            tier: Tier::Public,
            instance_profile: shared.role.profile_input(),
            security_group_id: sg.id(),
            image_id,
            key_name: key_pair.attr("key_name").into(),
            user_data,
            instance_type: config.instance_type.clone(),
        },
    )?;
    stack.export(&format!("publicIp-{region}"), instance.attr("public_ip"))?;
    Ok(())
}

/// Prefetch facts through `lookup` and build the stack for `config`.
pub async fn run(config: &Config, lookup: Arc<dyn Lookup>) -> Result<Stack, Box<dyn Error>> {
    let facts = prefetch(lookup, &config.regions, config.extended).await?;
    let mut stack = Stack::new(STACK_NAME);
    provision(&mut stack, config, &facts)?;
    Ok(stack)
}
