//! The state file
//!
//! JSON, one entry per managed resource, kept sorted by type then logical id
//! so successive writes diff cleanly.

use std::collections::{BTreeMap, HashMap};

use ecsmcp_core::resource::{DELETION_POLICY_ATTR, DeletionPolicy, ResourceId, State, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    /// Bumped on every write
    pub serial: u64,
    /// Fixed at creation; tells two unrelated state files apart
    pub lineage: String,
    /// ecsmcp version of the last writer
    pub tool_version: String,
    #[serde(default)]
    pub stack_name: String,
    pub resources: Vec<ResourceState>,
    /// CfnOutput values as resolved by the last apply
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

impl StateFile {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage: uuid::Uuid::new_v4().to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            stack_name: String::new(),
            resources: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn for_stack(mut self, stack_name: impl Into<String>) -> Self {
        self.stack_name = stack_name.into();
        self
    }

    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.tool_version = env!("CARGO_PKG_VERSION").to_string();
    }

    fn position(&self, resource_type: &str, name: &str) -> Result<usize, usize> {
        self.resources
            .binary_search_by(|r| (r.resource_type.as_str(), r.name.as_str()).cmp(&(resource_type, name)))
    }

    pub fn resource(&self, resource_type: &str, name: &str) -> Option<&ResourceState> {
        self.position(resource_type, name)
            .ok()
            .map(|i| &self.resources[i])
    }

    /// Store the applied `state`, replacing any earlier entry for the same resource
    pub fn record(&mut self, state: &State, provider: &str) {
        let entry = ResourceState::from_state(state, provider);
        match self.position(&entry.resource_type, &entry.name) {
            Ok(i) => self.resources[i] = entry,
            Err(i) => self.resources.insert(i, entry),
        }
    }

    pub fn remove_resource(&mut self, resource_type: &str, name: &str) -> Option<ResourceState> {
        self.position(resource_type, name)
            .ok()
            .map(|i| self.resources.remove(i))
    }

    /// What the provider last reported, as the planner consumes it
    pub fn current_states(&self) -> HashMap<ResourceId, State> {
        self.resources
            .iter()
            .map(|r| (ResourceId::new(&r.resource_type, &r.name), r.to_state()))
            .collect()
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    pub resource_type: String,
    pub name: String,
    /// `simulated` or `awscc`
    pub provider: String,
    /// Physical id: bucket name, group id, ARN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// DeletionPolicy Retain; destroy releases it without deleting
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub protected: bool,
}

impl ResourceState {
    pub fn from_state(state: &State, provider: &str) -> Self {
        let protected = state.deletion_policy() == DeletionPolicy::Retain;
        Self {
            resource_type: state.id.resource_type.clone(),
            name: state.id.name.clone(),
            provider: provider.to_string(),
            identifier: state.identifier.clone(),
            attributes: state
                .attributes
                .iter()
                .filter(|(key, _)| key.as_str() != DELETION_POLICY_ATTR)
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect(),
            protected,
        }
    }

    pub fn to_state(&self) -> State {
        let mut attributes: HashMap<String, Value> = self
            .attributes
            .iter()
            .map(|(key, value)| (key.clone(), Value::from_json(value)))
            .collect();
        if self.protected {
            attributes.insert(
                DELETION_POLICY_ATTR.to_string(),
                Value::string(DeletionPolicy::Retain.as_str()),
            );
        }
        State {
            id: ResourceId::new(&self.resource_type, &self.name),
            identifier: self.identifier.clone(),
            attributes,
            exists: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(resource_type: &str, name: &str, attrs: &[(&str, Value)]) -> State {
        let attributes = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        State::existing(ResourceId::new(resource_type, name), attributes)
            .with_identifier(format!("{}-id", name))
    }

    #[test]
    fn entries_stay_sorted_and_unique() {
        let mut file = StateFile::new().for_stack("EcsMcpServerSampleStack");
        file.record(&applied("ecs.service", "AIService", &[]), "simulated");
        file.record(&applied("ec2.vpc", "NetworkingVpc", &[]), "simulated");
        file.record(
            &applied("ecs.service", "AIService", &[("desired_count", Value::Int(3))]),
            "simulated",
        );

        let names: Vec<_> = file.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["NetworkingVpc", "AIService"]);
        assert_eq!(
            file.resource("ecs.service", "AIService").unwrap().attributes["desired_count"],
            serde_json::json!(3)
        );

        assert!(file.remove_resource("ec2.vpc", "NetworkingVpc").is_some());
        assert!(file.remove_resource("ec2.vpc", "NetworkingVpc").is_none());
        assert_eq!(file.resources.len(), 1);
    }

    #[test]
    fn serial_counts_writes() {
        let mut file = StateFile::new();
        assert_eq!(file.serial, 0);
        file.increment_serial();
        file.increment_serial();
        assert_eq!(file.serial, 2);
        assert_ne!(file.lineage, StateFile::new().lineage);
    }

    #[test]
    fn retain_policy_is_stored_as_protected() {
        let logs = applied(
            "s3.bucket",
            "StorageAccessLogs",
            &[
                ("bucket_name", Value::string("logs")),
                (DELETION_POLICY_ATTR, Value::string("Retain")),
            ],
        );
        let mut file = StateFile::new();
        file.record(&logs, "simulated");

        let entry = &file.resources[0];
        assert!(entry.protected);
        assert!(!entry.attributes.contains_key(DELETION_POLICY_ATTR));

        let states = file.current_states();
        let restored = &states[&ResourceId::new("s3.bucket", "StorageAccessLogs")];
        assert_eq!(restored.identifier.as_deref(), Some("StorageAccessLogs-id"));
        assert_eq!(restored.deletion_policy(), DeletionPolicy::Retain);
        assert_eq!(restored.attributes["bucket_name"], Value::string("logs"));
    }

    #[test]
    fn unprotected_entries_omit_the_flag() {
        let mut file = StateFile::new();
        file.record(&applied("logs.log_group", "McpOneLogs", &[]), "simulated");
        file.outputs.insert("SecretARN".into(), "arn:aws:secretsmanager:x".into());

        let json = serde_json::to_value(&file).unwrap();
        assert!(json["resources"][0].get("protected").is_none());

        let back: StateFile = serde_json::from_value(json).unwrap();
        assert!(!back.resources[0].protected);
        assert_eq!(back.outputs["SecretARN"], "arn:aws:secretsmanager:x");
    }
}
