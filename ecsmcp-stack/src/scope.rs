//! Scope - Collects what constructs declare while the stack is built

use log::debug;

use ecsmcp_aws::template::Output;
use ecsmcp_core::construct::ConstructPath;
use ecsmcp_core::resource::{Resource, Value};

use crate::assets::ImageAsset;
use crate::config::Environment;
use crate::error::StackError;

/// Resource of `resource_type` declared at `path`
pub fn declare(path: &ConstructPath, resource_type: &str) -> Resource {
    Resource::new(resource_type, path.logical_id()).with_path(path)
}

#[derive(Debug)]
pub struct Scope {
    stack_name: String,
    environment: Environment,
    resources: Vec<Resource>,
    outputs: Vec<Output>,
    assets: Vec<ImageAsset>,
}

impl Scope {
    pub fn new(stack_name: impl Into<String>, environment: Environment) -> Self {
        Self {
            stack_name: stack_name.into(),
            environment,
            resources: Vec::new(),
            outputs: Vec::new(),
            assets: Vec::new(),
        }
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// `<stack>/<path>`, used where the provider wants a readable name
    pub fn qualified(&self, path: &ConstructPath) -> String {
        format!("{}/{}", self.stack_name, path)
    }

    /// Add a resource and return its logical ID
    pub fn add(&mut self, resource: Resource) -> String {
        let logical_id = resource.logical_id().to_string();
        debug!("Declared {}", resource.id);
        self.resources.push(resource);
        logical_id
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.logical_id() == logical_id)
    }

    pub fn resource_mut(&mut self, logical_id: &str) -> Result<&mut Resource, StackError> {
        self.resources
            .iter_mut()
            .find(|r| r.logical_id() == logical_id)
            .ok_or_else(|| StackError::UnknownResource(logical_id.to_string()))
    }

    /// Append to a list attribute, creating it when absent
    pub fn push_to_list(
        &mut self,
        logical_id: &str,
        attribute: &str,
        value: Value,
    ) -> Result<(), StackError> {
        let resource = self.resource_mut(logical_id)?;
        let mut items = match resource.get(attribute) {
            Some(Value::List(items)) => items.clone(),
            _ => Vec::new(),
        };
        items.push(value);
        resource.set(attribute, Value::List(items));
        Ok(())
    }

    pub fn add_dependency(&mut self, logical_id: &str, on: &str) -> Result<(), StackError> {
        self.resource_mut(logical_id)?.add_dependency(on);
        Ok(())
    }

    pub fn add_output(&mut self, output: Output) {
        self.outputs.push(output);
    }

    pub fn add_asset(&mut self, asset: ImageAsset) {
        self.assets.push(asset);
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn into_parts(self) -> (Vec<Resource>, Vec<Output>, Vec<ImageAsset>) {
        (self.resources, self.outputs, self.assets)
    }
}
