//! Serialized form of a [`Stack`](super::Stack).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Plan document read by the provisioning engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Plan {
    pub stack: String,
    /// In declaration order, which is a valid creation order.
    pub resources: Vec<PlannedResource>,
    pub outputs: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlannedResource {
    pub name: String,
    #[serde(rename = "type")]
    pub type_token: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub properties: BTreeMap<String, Value>,
}

impl Plan {
    pub fn resource(&self, name: &str) -> Option<&PlannedResource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn count_type(&self, type_token: &str) -> usize {
        self.resources
            .iter()
            .filter(|r| r.type_token == type_token)
            .count()
    }
}
