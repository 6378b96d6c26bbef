//! Declared resources and their ownership options.

use super::input::{Properties, Ref};
use std::fmt;

/// Position of a resource in its [`Stack`](super::Stack).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) usize);

/// Resource types this crate declares, with their engine type tokens.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// Grouping node owning everything declared for one region.
    RegionGroup,
    Provider,
    Vpc,
    Subnet,
    InternetGateway,
    RouteTable,
    Route,
    RouteTableAssociation,
    SecurityGroup,
    SecurityGroupEgressRule,
    SecurityGroupIngressRule,
    Instance,
    KeyPair,
    IamRole,
    RolePolicyAttachment,
    InstanceProfile,
    Bucket,
}

impl ResourceType {
    pub fn token(&self) -> &'static str {
        match self {
            ResourceType::RegionGroup => "mesh:index:Region",
            ResourceType::Provider => "pulumi:providers:aws",
            ResourceType::Vpc => "aws:ec2/vpc:Vpc",
            ResourceType::Subnet => "aws:ec2/subnet:Subnet",
            ResourceType::InternetGateway => "aws:ec2/internetGateway:InternetGateway",
            ResourceType::RouteTable => "aws:ec2/routeTable:RouteTable",
            ResourceType::Route => "aws:ec2/route:Route",
            ResourceType::RouteTableAssociation => {
                "aws:ec2/routeTableAssociation:RouteTableAssociation"
            }
            ResourceType::SecurityGroup => "aws:ec2/securityGroup:SecurityGroup",
            ResourceType::SecurityGroupEgressRule => {
                "aws:vpc/securityGroupEgressRule:SecurityGroupEgressRule"
            }
            ResourceType::SecurityGroupIngressRule => {
                "aws:vpc/securityGroupIngressRule:SecurityGroupIngressRule"
            }
            ResourceType::Instance => "aws:ec2/instance:Instance",
            ResourceType::KeyPair => "aws:ec2/keyPair:KeyPair",
            ResourceType::IamRole => "aws:iam/role:Role",
            ResourceType::RolePolicyAttachment => {
                "aws:iam/rolePolicyAttachment:RolePolicyAttachment"
            }
            ResourceType::InstanceProfile => "aws:iam/instanceProfile:InstanceProfile",
            ResourceType::Bucket => "aws:s3/bucketV2:BucketV2",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Explicit position of a new resource in the ownership tree.
///
/// `parent` only groups resources for the engine; it is also a dependency.
/// `provider` selects the region-scoped provider context.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ResourceOptions {
    pub parent: Option<ResourceId>,
    pub provider: Option<ResourceId>,
}

impl ResourceOptions {
    pub fn new() -> ResourceOptions {
        ResourceOptions::default()
    }

    pub fn parent(mut self, parent: ResourceId) -> ResourceOptions {
        self.parent = Some(parent);
        self
    }

    pub fn provider(mut self, provider: ResourceId) -> ResourceOptions {
        self.provider = Some(provider);
        self
    }

    /// Same provider, new parent. Used for children of a declared resource.
    pub fn child_of(&self, parent: &Handle) -> ResourceOptions {
        ResourceOptions {
            parent: Some(parent.id),
            provider: self.provider,
        }
    }
}

/// A declared resource.
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub kind: ResourceType,
    pub parent: Option<ResourceId>,
    pub provider: Option<ResourceId>,
    pub properties: Properties,
}

impl Resource {
    /// Resource names referenced from the properties, in key order.
    pub fn referenced_names(&self) -> Vec<&str> {
        self.properties
            .values()
            .flat_map(|p| p.refs())
            .map(|r| r.resource.as_str())
            .collect()
    }
}

/// Returned by [`Stack::declare`](super::Stack::declare); names the resource
/// for later references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    pub id: ResourceId,
    pub name: String,
}

impl Handle {
    /// Engine-assigned attribute of this resource.
    pub fn attr(&self, attr: &str) -> Ref {
        Ref::new(&self.name, attr)
    }

    /// The engine-assigned identifier.
    pub fn id_ref(&self) -> Ref {
        self.attr("id")
    }
}
