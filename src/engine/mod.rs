//! Declarative resource graph.
//!
//! The provisioning engine is external. This module is the surface it is
//! driven through:
//! - [`Stack`] - collects resource declarations and stack outputs
//! - [`Input`] / [`Ref`] - property values and engine-resolved references
//! - [`ResourceOptions`] - explicit parent/provider ownership
//! - [`Plan`] - the serialized graph

mod input;
mod plan;
mod resource;
mod stack;

// Re-export public types
pub use input::{props, Input, Properties, Ref};
pub use plan::{Plan, PlannedResource};
pub use resource::{Handle, Resource, ResourceId, ResourceOptions, ResourceType};
pub use stack::Stack;
