//! Security group builder.
//!
//! Expands ingress rule lists into one rule resource per entry and installs
//! the default all-traffic egress rule.

use crate::engine::{props, Handle, Input, Ref, ResourceOptions, ResourceType, Stack};
use crate::models::Ipv4;
use std::error::Error;

/// Protocol value meaning "all protocols".
pub const ALL_PROTOCOLS: &str = "-1";
/// Destination of the default egress rule.
pub const ANY_IPV4: &str = "0.0.0.0/0";

/// Where traffic matched by a rule comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    Cidr(Ipv4),
    /// Another group, by id.
    Group(String),
    /// The group owning the rule, resolved once the group is declared.
    SelfReference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub protocol: String,
    /// Unset for [`ALL_PROTOCOLS`].
    pub from_port: Option<u16>,
    pub to_port: Option<u16>,
    pub source: RuleSource,
}

impl IngressRule {
    pub fn tcp(port: u16, source: RuleSource) -> IngressRule {
        IngressRule::tcp_range(port, port, source)
    }

    pub fn tcp_range(from_port: u16, to_port: u16, source: RuleSource) -> IngressRule {
        IngressRule {
            protocol: "tcp".to_string(),
            from_port: Some(from_port),
            to_port: Some(to_port),
            source,
        }
    }

    pub fn all_traffic(source: RuleSource) -> IngressRule {
        IngressRule {
            protocol: ALL_PROTOCOLS.to_string(),
            from_port: None,
            to_port: None,
            source,
        }
    }
}

/// Explicit egress rule. Accepted on [`SecurityGroupArgs`] but not supported
/// yet: a non-empty list makes [`SecurityGroup::create`] fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressRule {
    pub protocol: String,
    pub from_port: Option<u16>,
    pub to_port: Option<u16>,
    pub destination: RuleSource,
}

#[derive(Debug, Clone)]
pub struct SecurityGroupArgs {
    pub name: String,
    pub vpc_id: Ref,
    pub description: String,
    pub ingresses: Vec<IngressRule>,
    pub egresses: Vec<EgressRule>,
}

impl SecurityGroupArgs {
    pub fn new(name: &str, vpc_id: Ref, description: &str) -> SecurityGroupArgs {
        SecurityGroupArgs {
            name: name.to_string(),
            vpc_id,
            description: description.to_string(),
            ingresses: Vec::new(),
            egresses: Vec::new(),
        }
    }

    pub fn ingress(mut self, rule: IngressRule) -> SecurityGroupArgs {
        self.ingresses.push(rule);
        self
    }
}

/// A declared security group and its rules.
#[derive(Debug, Clone)]
pub struct SecurityGroup {
    pub name: String,
    handle: Handle,
    egress_rules: Vec<Handle>,
    ingress_rules: Vec<Handle>,
}

impl SecurityGroup {
    /// Declare `sg-{name}` in the network `args.vpc_id`, then its egress and
    /// ingress rules as children of the group.
    pub fn create(
        stack: &mut Stack,
        args: SecurityGroupArgs,
        opts: ResourceOptions,
    ) -> Result<SecurityGroup, Box<dyn Error>> {
        if !args.egresses.is_empty() {
            return Err(format!(
                "Security group '{}': explicit egress rules are not supported ({} given)",
                args.name,
                args.egresses.len()
            )
            .into());
        }

        let handle = stack.declare(
            ResourceType::SecurityGroup,
            &format!("sg-{}", args.name),
            props([
                ("vpc_id", args.vpc_id.clone().into()),
                ("name", args.name.as_str().into()),
                ("description", args.description.as_str().into()),
            ]),
            opts,
        )?;

        let mut group = SecurityGroup {
            name: args.name,
            handle,
            egress_rules: Vec::new(),
            ingress_rules: Vec::new(),
        };
        let rule_opts = opts.child_of(&group.handle);
        group.create_default_egress(stack, rule_opts)?;
        group.create_ingresses(stack, &args.ingresses, rule_opts)?;

        log::info!(
            "security group {} with {} egress / {} ingress rules",
            group.handle.name,
            group.egress_rules.len(),
            group.ingress_rules.len()
        );
        Ok(group)
    }

    fn create_default_egress(
        &mut self,
        stack: &mut Stack,
        opts: ResourceOptions,
    ) -> Result<(), Box<dyn Error>> {
        let egress = stack.declare(
            ResourceType::SecurityGroupEgressRule,
            &format!("sg-egress-{}", self.name),
            props([
                ("security_group_id", self.id().into()),
                ("ip_protocol", ALL_PROTOCOLS.into()),
                ("cidr_ipv4", ANY_IPV4.into()),
            ]),
            opts,
        )?;
        self.egress_rules.push(egress);
        Ok(())
    }

    fn create_ingresses(
        &mut self,
        stack: &mut Stack,
        rules: &[IngressRule],
        opts: ResourceOptions,
    ) -> Result<(), Box<dyn Error>> {
        for (i, rule) in rules.iter().enumerate() {
            let mut properties = props([
                ("security_group_id", self.id().into()),
                ("ip_protocol", rule.protocol.as_str().into()),
            ]);
            if let Some(port) = rule.from_port {
                properties.insert("from_port".to_string(), port.into());
            }
            if let Some(port) = rule.to_port {
                properties.insert("to_port".to_string(), port.into());
            }
            let (key, source): (&str, Input) = match &rule.source {
                RuleSource::Cidr(cidr) => ("cidr_ipv4", cidr.to_string().into()),
                RuleSource::Group(id) => ("referenced_security_group_id", id.into()),
                RuleSource::SelfReference => ("referenced_security_group_id", self.id().into()),
            };
            properties.insert(key.to_string(), source);

            let ingress = stack.declare(
                ResourceType::SecurityGroupIngressRule,
                &format!("sg-ingress-{}-{i}", self.name),
                properties,
                opts,
            )?;
            self.ingress_rules.push(ingress);
        }
        Ok(())
    }

    /// Engine-assigned id of the group.
    pub fn id(&self) -> Ref {
        self.handle.id_ref()
    }

    pub fn egress_rules(&self) -> &[Handle] {
        &self.egress_rules
    }

    pub fn ingress_rules(&self) -> &[Handle] {
        &self.ingress_rules
    }
}
