//! The declarative resource graph handed to the provisioning engine.
//!
//! Resources can only reference resources declared before them, so the
//! graph is acyclic by construction and declaration order is a valid
//! creation order. The engine is free to parallelize independent branches.

use super::input::{Input, Properties};
use super::plan::{Plan, PlannedResource};
use super::resource::{Handle, Resource, ResourceId, ResourceOptions, ResourceType};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::error::Error;

/// Collects declarations for one provisioning pass.
#[derive(Debug, Default)]
pub struct Stack {
    name: String,
    resources: Vec<Resource>,
    index: HashMap<String, ResourceId>,
    outputs: BTreeMap<String, Input>,
}

impl Stack {
    pub fn new(name: &str) -> Stack {
        Stack {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a resource.
    ///
    /// Fails on a duplicate name, on a parent or provider that is not part of
    /// this stack, and on references to undeclared resources.
    pub fn declare(
        &mut self,
        kind: ResourceType,
        name: &str,
        properties: Properties,
        opts: ResourceOptions,
    ) -> Result<Handle, Box<dyn Error>> {
        if self.index.contains_key(name) {
            return Err(format!("Duplicate resource name '{name}' ({kind})").into());
        }
        if let Some(parent) = opts.parent {
            self.check_id(parent, name)?;
        }
        if let Some(provider) = opts.provider {
            let p = self.check_id(provider, name)?;
            if p.kind != ResourceType::Provider {
                return Err(format!(
                    "Resource '{name}' uses '{}' as provider but it is a {}",
                    p.name, p.kind
                )
                .into());
            }
        }
        for (key, value) in properties.iter() {
            self.check_refs(name, key, value)?;
        }

        let id = ResourceId(self.resources.len());
        log::debug!("declare #{:3} {kind} '{name}'", id.0);
        self.resources.push(Resource {
            name: name.to_string(),
            kind,
            parent: opts.parent,
            provider: opts.provider,
            properties,
        });
        self.index.insert(name.to_string(), id);

        Ok(Handle {
            id,
            name: name.to_string(),
        })
    }

    /// Publish a named stack output.
    pub fn export(&mut self, name: &str, value: impl Into<Input>) -> Result<(), Box<dyn Error>> {
        let value = value.into();
        if self.outputs.contains_key(name) {
            return Err(format!("Duplicate output '{name}'").into());
        }
        self.check_refs("<outputs>", name, &value)?;
        log::info!("export {name} = {}", value.to_json());
        self.outputs.insert(name.to_string(), value);
        Ok(())
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn outputs(&self) -> &BTreeMap<String, Input> {
        &self.outputs
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.index.get(name).map(|id| &self.resources[id.0])
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id.0)
    }

    pub fn of_type(&self, kind: ResourceType) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    /// Resources that must exist before `id`: its parent, its provider and
    /// everything its properties reference. Sorted, without duplicates.
    pub fn dependencies(&self, id: ResourceId) -> Vec<ResourceId> {
        let Some(resource) = self.resources.get(id.0) else {
            return vec![];
        };
        let mut deps: BTreeSet<ResourceId> = BTreeSet::new();
        deps.extend(resource.parent);
        deps.extend(resource.provider);
        deps.extend(
            resource
                .referenced_names()
                .into_iter()
                .filter_map(|n| self.index.get(n).copied()),
        );
        deps.into_iter().collect()
    }

    /// Render the plan document consumed by the engine.
    pub fn plan(&self) -> Plan {
        let name_of = |id: ResourceId| self.resources[id.0].name.clone();
        let resources = self
            .resources
            .iter()
            .enumerate()
            .map(|(i, r)| PlannedResource {
                name: r.name.clone(),
                type_token: r.kind.token().to_string(),
                parent: r.parent.map(name_of),
                provider: r.provider.map(name_of),
                depends_on: self
                    .dependencies(ResourceId(i))
                    .into_iter()
                    .map(name_of)
                    .collect(),
                properties: r
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            })
            .collect();
        Plan {
            stack: self.name.clone(),
            resources,
            outputs: self
                .outputs
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        }
    }

    fn check_id(&self, id: ResourceId, name: &str) -> Result<&Resource, Box<dyn Error>> {
        self.resources
            .get(id.0)
            .ok_or_else(|| format!("Resource '{name}' refers to unknown resource #{}", id.0).into())
    }

    fn check_refs(&self, owner: &str, key: &str, value: &Input) -> Result<(), Box<dyn Error>> {
        for r in value.refs() {
            if !self.index.contains_key(&r.resource) {
                return Err(format!(
                    "'{owner}.{key}' references undeclared resource '{}'",
                    r.resource
                )
                .into());
            }
        }
        Ok(())
    }
}
