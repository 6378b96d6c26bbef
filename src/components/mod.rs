//! Resource compositions.
//!
//! - [`vpc`] - network, subnets, gateway, routes, instance
//! - [`security_group`] - group plus expanded rules
//! - [`iam`], [`storage`], [`key_pair`] - shared account resources
//! - [`user_data`] - instance bootstrap script

pub mod iam;
pub mod key_pair;
pub mod security_group;
pub mod storage;
pub mod user_data;
pub mod vpc;

// Re-export public types
pub use iam::InstanceRole;
pub use key_pair::create_key_pair;
pub use security_group::{EgressRule, IngressRule, RuleSource, SecurityGroup, SecurityGroupArgs};
pub use storage::create_state_bucket;
pub use user_data::{render_bootstrap, BootstrapParams};
pub use vpc::{InstanceArgs, SubnetInfo, Vpc};
