//! VPC builder.
//!
//! Steps must run in order, each one references identifiers declared by an
//! earlier step:
//! 1. [`Vpc::create`]
//! 2. [`Vpc::create_subnets`]
//! 3. [`Vpc::create_internet_gateway`]
//! 4. [`Vpc::create_route_table`]
//! 5. [`Vpc::create_compute_instance`]

use crate::config::ROOT_VOLUME_GIB;
use crate::engine::{props, Handle, Input, Ref, ResourceOptions, ResourceType, Stack};
use crate::models::{Ipv4, Tier, SUBNETS_PER_TIER};
use itertools::Itertools;
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;

/// Destination of the default route.
pub const DEFAULT_ROUTE: &str = "0.0.0.0/0";

/// A declared subnet.
#[derive(Debug, Clone)]
pub struct SubnetInfo {
    /// Deterministic key, e.g. `subnet-public-0`.
    pub key: String,
    pub tier: Tier,
    /// Index within the tier.
    pub index: usize,
    pub cidr: Ipv4,
    pub zone: String,
    pub handle: Handle,
}

/// Everything the compute instance is wired to.
#[derive(Debug, Clone)]
pub struct InstanceArgs {
    /// Tier whose first subnet hosts the instance.
    pub tier: Tier,
    /// IAM instance profile name.
    pub instance_profile: Input,
    pub security_group_id: Ref,
    pub image_id: String,
    pub key_name: Input,
    pub user_data: String,
    pub instance_type: String,
}

#[derive(Debug)]
pub struct Vpc {
    pub name: String,
    pub cidr: Ipv4,
    azs: Vec<String>,
    opts: ResourceOptions,
    handle: Handle,
    subnet_blocks: Vec<Ipv4>,
    subnets: Vec<SubnetInfo>,
    subnets_created: bool,
    igw: Option<Handle>,
    route_tables: BTreeMap<Tier, Handle>,
    instance: Option<Handle>,
}

fn name_tag(name: &str) -> Input {
    json!({ "Name": name }).into()
}

impl Vpc {
    /// Declare `vpc-{name}` and partition `cidr` into the four subnet blocks.
    ///
    /// Fails when `cidr` is too small to split (prefix + 2 > 32).
    pub fn create(
        stack: &mut Stack,
        name: &str,
        cidr: Ipv4,
        azs: &[String],
        opts: ResourceOptions,
    ) -> Result<Vpc, Box<dyn Error>> {
        let cidr = cidr.network();
        let subnet_blocks = cidr.split4()?;
        let handle = stack.declare(
            ResourceType::Vpc,
            &format!("vpc-{name}"),
            props([
                ("cidr_block", cidr.to_string().into()),
                ("enable_dns_hostnames", true.into()),
                ("enable_dns_support", true.into()),
                ("tags", name_tag(name)),
            ]),
            opts,
        )?;
        log::info!(
            "vpc {} {cidr} -> subnet blocks {}",
            handle.name,
            subnet_blocks
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<String>>()
                .join(", ")
        );

        Ok(Vpc {
            name: name.to_string(),
            cidr,
            azs: azs.to_vec(),
            opts,
            handle,
            subnet_blocks,
            subnets: Vec::new(),
            subnets_created: false,
            igw: None,
            route_tables: BTreeMap::new(),
            instance: None,
        })
    }

    /// Declare two subnets per tier, zones assigned round-robin.
    pub fn create_subnets(
        &mut self,
        stack: &mut Stack,
        tiers: &[Tier],
    ) -> Result<(), Box<dyn Error>> {
        if self.subnets_created {
            return Err(self.error("subnets already created"));
        }
        if self.azs.is_empty() {
            return Err(self.error("no availability zones to place subnets in"));
        }
        if let Some(tier) = tiers.iter().duplicates().next() {
            return Err(self.error(format!("tier {tier} listed twice")));
        }

        let subnet_opts = self.opts.child_of(&self.handle);
        for &tier in tiers {
            for index in 0..SUBNETS_PER_TIER {
                let key = tier.subnet_key(index);
                let name = format!("{key}-{}", self.name);
                let cidr = *self
                    .subnet_blocks
                    .get(tier.block_offset() + index)
                    .ok_or_else(|| self.error(format!("no block left for {key}")))?;
                let zone = self.azs[index % self.azs.len()].clone();

                let handle = stack.declare(
                    ResourceType::Subnet,
                    &name,
                    props([
                        ("vpc_id", self.id().into()),
                        ("cidr_block", cidr.to_string().into()),
                        ("availability_zone", zone.as_str().into()),
                        ("map_public_ip_on_launch", tier.maps_public_ip().into()),
                        ("tags", name_tag(&name)),
                    ]),
                    subnet_opts,
                )?;
                self.subnets.push(SubnetInfo {
                    key,
                    tier,
                    index,
                    cidr,
                    zone,
                    handle,
                });
            }
        }
        self.subnets_created = true;
        Ok(())
    }

    /// Attach one internet gateway to the network.
    pub fn create_internet_gateway(&mut self, stack: &mut Stack) -> Result<(), Box<dyn Error>> {
        if self.igw.is_some() {
            return Err(self.error("internet gateway already created"));
        }
        let name = format!("vpc-igw-{}", self.name);
        let igw = stack.declare(
            ResourceType::InternetGateway,
            &name,
            props([("vpc_id", self.id().into()), ("tags", name_tag(&name))]),
            self.opts,
        )?;
        self.igw = Some(igw);
        Ok(())
    }

    /// Route table for `tier` with a default route to the internet gateway,
    /// associated with every subnet of the tier.
    pub fn create_route_table(
        &mut self,
        stack: &mut Stack,
        tier: Tier,
    ) -> Result<(), Box<dyn Error>> {
        let igw = self
            .igw
            .as_ref()
            .ok_or_else(|| self.error("route table needs the internet gateway"))?
            .id_ref();
        if self.route_tables.contains_key(&tier) {
            return Err(self.error(format!("route table for {tier} already created")));
        }
        let tier_subnets: Vec<(String, Ref)> = self
            .subnets
            .iter()
            .filter(|s| s.tier == tier)
            .map(|s| (s.key.clone(), s.handle.id_ref()))
            .collect();
        if tier_subnets.is_empty() {
            return Err(self.error(format!("no {tier} subnets to route")));
        }

        let name = format!("rt-{tier}-{}", self.name);
        let table = stack.declare(
            ResourceType::RouteTable,
            &name,
            props([("vpc_id", self.id().into()), ("tags", name_tag(&name))]),
            self.opts.child_of(&self.handle),
        )?;
        let table_opts = self.opts.child_of(&table);
        stack.declare(
            ResourceType::Route,
            &format!("{name}-default"),
            props([
                ("route_table_id", table.id_ref().into()),
                ("destination_cidr_block", DEFAULT_ROUTE.into()),
                ("gateway_id", igw.into()),
            ]),
            table_opts,
        )?;
        for (key, subnet_id) in tier_subnets {
            stack.declare(
                ResourceType::RouteTableAssociation,
                &format!("rta-{key}-{}", self.name),
                props([
                    ("subnet_id", subnet_id.into()),
                    ("route_table_id", table.id_ref().into()),
                ]),
                table_opts,
            )?;
        }
        self.route_tables.insert(tier, table);
        Ok(())
    }

    /// Declare the single compute instance in the first subnet of `args.tier`.
    pub fn create_compute_instance(
        &mut self,
        stack: &mut Stack,
        args: InstanceArgs,
    ) -> Result<Handle, Box<dyn Error>> {
        if self.instance.is_some() {
            return Err(self.error("compute instance already created"));
        }
        let subnet_id = self
            .subnet_ids(args.tier)
            .into_iter()
            .next()
            .ok_or_else(|| self.error(format!("no {} subnet for the instance", args.tier)))?;

        let name = format!("ec2-{}", self.name);
        let instance = stack.declare(
            ResourceType::Instance,
            &name,
            props([
                ("ami", args.image_id.into()),
                ("instance_type", args.instance_type.into()),
                ("subnet_id", subnet_id.into()),
                ("vpc_security_group_ids", vec![args.security_group_id].into()),
                ("iam_instance_profile", args.instance_profile),
                ("key_name", args.key_name),
                ("user_data", args.user_data.into()),
                ("associate_public_ip_address", args.tier.maps_public_ip().into()),
                (
                    "root_block_device",
                    json!({
                        "volume_size": ROOT_VOLUME_GIB,
                        "volume_type": "gp3",
                        "delete_on_termination": true,
                    })
                    .into(),
                ),
                ("tags", name_tag(&name)),
            ]),
            self.opts.child_of(&self.handle),
        )?;
        self.instance = Some(instance.clone());
        Ok(instance)
    }

    pub fn id(&self) -> Ref {
        self.handle.id_ref()
    }

    fn error(&self, message: impl std::fmt::Display) -> Box<dyn Error> {
        format!("vpc {}: {message}", self.name).into()
    }

    /// Ids of the tier's subnets, in index order.
    pub fn subnet_ids(&self, tier: Tier) -> Vec<Ref> {
        self.subnets
            .iter()
            .filter(|s| s.tier == tier)
            .map(|s| s.handle.id_ref())
            .collect()
    }

    pub fn subnets(&self) -> &[SubnetInfo] {
        &self.subnets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Plan;

    fn zones() -> Vec<String> {
        vec!["us-east-1a".to_string(), "us-east-1b".to_string()]
    }

    fn new_vpc(stack: &mut Stack) -> Vpc {
        Vpc::create(
            stack,
            "public-us-east-1",
            Ipv4::new("10.0.0.0/16").unwrap(),
            &zones(),
            ResourceOptions::new(),
        )
        .unwrap()
    }

    fn instance_args(sg: Ref) -> InstanceArgs {
        InstanceArgs {
            tier: Tier::Public,
            instance_profile: "instance-profile".into(),
            security_group_id: sg,
            image_id: "ami-123".to_string(),
            key_name: "deployer-key".into(),
            user_data: "#!/bin/bash\n".to_string(),
            instance_type: "t3.medium".to_string(),
        }
    }

    #[test]
    fn test_create_declares_vpc() {
        let mut stack = Stack::new("test");
        let vpc = new_vpc(&mut stack);
        let plan = stack.plan();
        let planned = plan.resource("vpc-public-us-east-1").unwrap();
        assert_eq!(planned.properties["cidr_block"], "10.0.0.0/16");
        assert_eq!(planned.properties["enable_dns_hostnames"], true);
        assert_eq!(planned.properties["tags"]["Name"], "public-us-east-1");
        assert!(vpc.subnets().is_empty());
    }

    #[test]
    fn test_repeated_tier_declares_nothing() {
        let mut stack = Stack::new("test");
        let mut vpc = new_vpc(&mut stack);
        let err = vpc
            .create_subnets(&mut stack, &[Tier::Public, Tier::Public])
            .unwrap_err();
        assert!(err.to_string().contains("listed twice"), "{err}");
        assert_eq!(stack.of_type(ResourceType::Subnet).count(), 0);

        vpc.create_subnets(&mut stack, &[Tier::Public]).unwrap();
        assert_eq!(vpc.subnet_ids(Tier::Public).len(), 2);
        assert!(vpc.create_subnets(&mut stack, &[Tier::Private]).is_err());
    }

    #[test]
    fn test_create_fails_on_unsplittable_cidr() {
        let mut stack = Stack::new("test");
        let result = Vpc::create(
            &mut stack,
            "tiny",
            Ipv4::new("10.0.0.0/31").unwrap(),
            &zones(),
            ResourceOptions::new(),
        );
        assert!(result.is_err());
        assert!(stack.resources().is_empty());
    }

    #[test]
    fn test_public_subnets_round_robin() {
        let mut stack = Stack::new("test");
        let mut vpc = new_vpc(&mut stack);
        vpc.create_subnets(&mut stack, &[Tier::Public]).unwrap();

        let subnets = vpc.subnets();
        assert_eq!(subnets.len(), 2);
        assert_eq!(subnets[0].key, "subnet-public-0");
        assert_eq!(subnets[0].zone, "us-east-1a");
        assert_eq!(subnets[0].cidr.to_string(), "10.0.0.0/18");
        assert_eq!(subnets[1].key, "subnet-public-1");
        assert_eq!(subnets[1].zone, "us-east-1b");
        assert_eq!(subnets[1].cidr.to_string(), "10.0.64.0/18");

        let plan = stack.plan();
        let s0 = plan.resource("subnet-public-0-public-us-east-1").unwrap();
        assert_eq!(s0.properties["map_public_ip_on_launch"], true);
        assert_eq!(s0.properties["vpc_id"], "${vpc-public-us-east-1.id}");
        assert_eq!(
            s0.properties["tags"]["Name"],
            "subnet-public-0-public-us-east-1"
        );
        assert_eq!(s0.parent.as_deref(), Some("vpc-public-us-east-1"));
    }

    #[test]
    fn test_single_zone_wraps() {
        let mut stack = Stack::new("test");
        let mut vpc = Vpc::create(
            &mut stack,
            "one-zone",
            Ipv4::new("10.0.0.0/16").unwrap(),
            &["eu-north-1a".to_string()],
            ResourceOptions::new(),
        )
        .unwrap();
        vpc.create_subnets(&mut stack, &[Tier::Public, Tier::Private])
            .unwrap();
        assert!(vpc.subnets().iter().all(|s| s.zone == "eu-north-1a"));
    }

    #[test]
    fn test_private_tier_uses_upper_blocks() {
        let mut stack = Stack::new("test");
        let mut vpc = new_vpc(&mut stack);
        vpc.create_subnets(&mut stack, &[Tier::Public, Tier::Private])
            .unwrap();
        let private: Vec<String> = vpc
            .subnets()
            .iter()
            .filter(|s| s.tier == Tier::Private)
            .map(|s| format!("{} {} {}", s.key, s.cidr, s.zone))
            .collect();
        assert_eq!(
            private,
            vec![
                "subnet-private-0 10.0.128.0/18 us-east-1a",
                "subnet-private-1 10.0.192.0/18 us-east-1b"
            ]
        );
        let plan = stack.plan();
        let p0 = plan.resource("subnet-private-0-public-us-east-1").unwrap();
        assert_eq!(p0.properties["map_public_ip_on_launch"], false);
        assert_eq!(vpc.subnet_ids(Tier::Private).len(), 2);
    }

    #[test]
    fn test_subnets_require_zones_and_run_once() {
        let mut stack = Stack::new("test");
        let mut vpc = Vpc::create(
            &mut stack,
            "nozones",
            Ipv4::new("10.0.0.0/16").unwrap(),
            &[],
            ResourceOptions::new(),
        )
        .unwrap();
        assert!(vpc.create_subnets(&mut stack, &[Tier::Public]).is_err());

        let mut vpc = new_vpc(&mut stack);
        vpc.create_subnets(&mut stack, &[Tier::Public]).unwrap();
        assert!(vpc.create_subnets(&mut stack, &[Tier::Private]).is_err());
    }

    #[test]
    fn test_public_route_table_associations() {
        let mut stack = Stack::new("test");
        let mut vpc = new_vpc(&mut stack);
        vpc.create_subnets(&mut stack, &[Tier::Public, Tier::Private])
            .unwrap();
        vpc.create_internet_gateway(&mut stack).unwrap();
        vpc.create_route_table(&mut stack, Tier::Public).unwrap();

        let plan: Plan = stack.plan();
        let route = plan.resource("rt-public-public-us-east-1-default").unwrap();
        assert_eq!(route.properties["destination_cidr_block"], "0.0.0.0/0");
        assert_eq!(
            route.properties["gateway_id"],
            "${vpc-igw-public-us-east-1.id}"
        );

        let mut associated: Vec<String> = plan
            .resources
            .iter()
            .filter(|r| r.type_token == ResourceType::RouteTableAssociation.token())
            .map(|r| r.properties["subnet_id"].as_str().unwrap().to_string())
            .collect();
        associated.sort();
        assert_eq!(
            associated,
            vec![
                "${subnet-public-0-public-us-east-1.id}",
                "${subnet-public-1-public-us-east-1.id}"
            ]
        );
        assert_eq!(plan.count_type(ResourceType::Route.token()), 1);
        assert!(plan.resource("rt-public-public-us-east-1").is_some());
        assert!(plan.resource("rt-private-public-us-east-1").is_none());
    }

    #[test]
    fn test_route_table_ordering_errors() {
        let mut stack = Stack::new("test");
        let mut vpc = new_vpc(&mut stack);
        vpc.create_subnets(&mut stack, &[Tier::Public]).unwrap();
        assert!(vpc.create_route_table(&mut stack, Tier::Public).is_err());

        vpc.create_internet_gateway(&mut stack).unwrap();
        assert!(vpc.create_internet_gateway(&mut stack).is_err());
        let err = vpc
            .create_route_table(&mut stack, Tier::Private)
            .unwrap_err();
        assert!(err.to_string().contains("no private subnets"));

        vpc.create_route_table(&mut stack, Tier::Public).unwrap();
        assert!(vpc.create_route_table(&mut stack, Tier::Public).is_err());
    }

    #[test]
    fn test_instance_in_first_tier_subnet() {
        let mut stack = Stack::new("test");
        let mut vpc = new_vpc(&mut stack);
        vpc.create_subnets(&mut stack, &[Tier::Public]).unwrap();
        let sg = Ref::new("vpc-public-us-east-1", "id");
        let instance = vpc
            .create_compute_instance(&mut stack, instance_args(sg.clone()))
            .unwrap();
        assert_eq!(instance.name, "ec2-public-us-east-1");
        assert!(vpc
            .create_compute_instance(&mut stack, instance_args(sg))
            .is_err());

        let plan = stack.plan();
        let props = &plan.resource("ec2-public-us-east-1").unwrap().properties;
        assert_eq!(props["subnet_id"], "${subnet-public-0-public-us-east-1.id}");
        assert_eq!(props["ami"], "ami-123");
        assert_eq!(props["iam_instance_profile"], "instance-profile");
        assert_eq!(props["root_block_device"]["volume_size"], ROOT_VOLUME_GIB);
        assert_eq!(
            props["vpc_security_group_ids"][0],
            "${vpc-public-us-east-1.id}"
        );
    }

    #[test]
    fn test_instance_requires_subnets() {
        let mut stack = Stack::new("test");
        let mut vpc = new_vpc(&mut stack);
        let sg = Ref::new("vpc-public-us-east-1", "id");
        let result = vpc.create_compute_instance(&mut stack, instance_args(sg));
        assert!(result.is_err());
    }
}
