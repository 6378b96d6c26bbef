//! IAM role and instance profile for the compute instances.

use crate::engine::{props, Handle, Input, Ref, ResourceOptions, ResourceType, Stack};
use serde_json::{json, Value};
use std::error::Error;

pub const ADMIN_POLICY_ARN: &str = "arn:aws:iam::aws:policy/AdministratorAccess";
pub const EC2_SERVICE: &str = "ec2.amazonaws.com";

/// Trust policy letting `service` assume the role.
pub fn assume_role_policy(service: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Action": ["sts:AssumeRole"],
            "Principal": { "Service": [service] },
        }],
    })
}

#[derive(Debug, Clone)]
pub struct InstanceRole {
    pub role: Handle,
    pub attachment: Handle,
    pub profile: Handle,
}

impl InstanceRole {
    /// Declare a role assumable by EC2, attach `policy_arn` and wrap it in an
    /// instance profile. Account-wide, so created once per stack.
    pub fn create(
        stack: &mut Stack,
        role_name: &str,
        profile_name: &str,
        policy_arn: &str,
        opts: ResourceOptions,
    ) -> Result<InstanceRole, Box<dyn Error>> {
        let policy = serde_json::to_string(&assume_role_policy(EC2_SERVICE))?;
        let role = stack.declare(
            ResourceType::IamRole,
            "instance-role",
            props([
                ("name", role_name.into()),
                ("assume_role_policy", policy.into()),
            ]),
            opts,
        )?;
        let attachment = stack.declare(
            ResourceType::RolePolicyAttachment,
            "instance-role-policy",
            props([
                ("role", role.attr("name").into()),
                ("policy_arn", policy_arn.into()),
            ]),
            opts.child_of(&role),
        )?;
        let profile = stack.declare(
            ResourceType::InstanceProfile,
            "instance-profile",
            props([
                ("name", profile_name.into()),
                ("role", role.attr("name").into()),
            ]),
            opts,
        )?;
        log::info!("iam role {role_name} with profile {profile_name} ({policy_arn})");
        Ok(InstanceRole {
            role,
            attachment,
            profile,
        })
    }

    /// Profile name as seen by instances, resolved after the profile exists.
    pub fn profile_name(&self) -> Ref {
        self.profile.attr("name")
    }

    pub fn profile_input(&self) -> Input {
        self.profile_name().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assume_role_policy_document() {
        let policy = assume_role_policy(EC2_SERVICE);
        assert_eq!(policy["Statement"][0]["Action"][0], "sts:AssumeRole");
        assert_eq!(
            policy["Statement"][0]["Principal"]["Service"][0],
            "ec2.amazonaws.com"
        );
    }

    #[test]
    fn test_profile_depends_on_role() {
        let mut stack = Stack::new("test");
        let iam = InstanceRole::create(
            &mut stack,
            "admin-role",
            "instance-profile",
            ADMIN_POLICY_ARN,
            ResourceOptions::new(),
        )
        .unwrap();
        assert_eq!(stack.dependencies(iam.profile.id), vec![iam.role.id]);
        assert_eq!(stack.dependencies(iam.attachment.id), vec![iam.role.id]);
        assert_eq!(iam.profile_name().to_string(), "${instance-profile.name}");

        let plan = stack.plan();
        let role = plan.resource("instance-role").unwrap();
        let policy: Value =
            serde_json::from_str(role.properties["assume_role_policy"].as_str().unwrap()).unwrap();
        assert_eq!(policy["Version"], "2012-10-17");
        assert_eq!(
            plan.resource("instance-role-policy").unwrap().properties["policy_arn"],
            ADMIN_POLICY_ARN
        );
    }
}
