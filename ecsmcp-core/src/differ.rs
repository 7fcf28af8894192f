//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the resources produced by the stack with the states recorded from
//! earlier applies, and generates the Effects needed to converge them.

use std::collections::{HashMap, HashSet};

use crate::effect::Effect;
use crate::graph::{DependencyGraph, GraphError, sort_resources};
use crate::plan::Plan;
use crate::resolve::Bindings;
use crate::resource::{DeletionPolicy, Resource, ResourceId, State, Value};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
///
/// References in `desired` are resolved against `bindings` first; a reference
/// that is still unknown counts as a change.
pub fn diff(desired: &Resource, current: &State, bindings: &Bindings) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let resolved = bindings.resolve_resource_partially(desired);
    let changed = find_changed_attributes(&resolved.attributes, &current.attributes);

    if changed.is_empty() {
        Diff::NoChange(desired.id.clone())
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
pub fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed: Vec<String> = desired
        .iter()
        // Skip internal attributes (starting with _)
        .filter(|(key, _)| !key.starts_with('_'))
        .filter(|(key, desired_value)| match current.get(*key) {
            Some(current_value) => !desired_value.is_resolved() || current_value != *desired_value,
            None => true,
        })
        .map(|(key, _)| key.clone())
        .collect();
    changed.sort();
    changed
}

/// Compute the Plan that converges `current_states` to `desired`
///
/// Creates and updates run in dependency order, followed by deletes of
/// recorded resources that are no longer desired, dependents first.
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    bindings: &Bindings,
) -> Result<Plan, GraphError> {
    let mut plan = Plan::new();

    for resource in sort_resources(desired)? {
        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        match diff(&resource, &current, bindings) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update { id, from, to, .. } => plan.add(Effect::Update { id, from, to }),
            Diff::NoChange(_) => {}
        }
    }

    let desired_ids: HashSet<&ResourceId> = desired.iter().map(|r| &r.id).collect();
    let orphans: Vec<&State> = current_states
        .values()
        .filter(|s| s.exists && !desired_ids.contains(&s.id))
        .collect();
    for effect in delete_effects(&orphans)? {
        plan.add(effect);
    }

    Ok(plan)
}

/// Plan the teardown of every recorded resource, dependents first
///
/// Resources with a Retain deletion policy are released, not deleted.
pub fn destroy_plan(current_states: &HashMap<ResourceId, State>) -> Result<Plan, GraphError> {
    let states: Vec<&State> = current_states.values().filter(|s| s.exists).collect();
    let mut plan = Plan::new();
    for effect in delete_effects(&states)? {
        plan.add(effect);
    }
    Ok(plan)
}

fn delete_effects(states: &[&State]) -> Result<Vec<Effect>, GraphError> {
    // Sort first so the graph's insertion order, and so the plan, is stable
    let mut states = states.to_vec();
    states.sort_by(|a, b| a.id.cmp(&b.id));

    let graph = DependencyGraph::from_states(states.iter().copied());
    let by_name: HashMap<&str, &State> = states.iter().map(|s| (s.id.name.as_str(), *s)).collect();

    Ok(graph
        .reverse_topological_order()?
        .iter()
        .filter_map(|name| by_name.get(name.as_str()))
        .map(|state| Effect::Delete {
            id: state.id.clone(),
            identifier: state.identifier.clone().unwrap_or_default(),
            retain: state.deletion_policy() == DeletionPolicy::Retain,
            path: state.path(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{DELETION_POLICY_ATTR, DEPENDS_ON_ATTR};

    fn existing(resource_type: &str, name: &str, attrs: &[(&str, Value)]) -> State {
        let attrs = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        State::existing(ResourceId::new(resource_type, name), attrs)
            .with_identifier(format!("{}-id", name.to_lowercase()))
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("s3.bucket", "Logs");
        let current = State::not_found(ResourceId::new("s3.bucket", "Logs"));

        let result = diff(&desired, &current, &Bindings::new());
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_when_same() {
        let desired = Resource::new("ec2.vpc", "Vpc")
            .with_attribute("cidr_block", "192.168.0.0/16")
            .with_attribute("_path", "Networking/Vpc");
        let current = existing("ec2.vpc", "Vpc", &[("cidr_block", Value::string("192.168.0.0/16"))]);

        let result = diff(&desired, &current, &Bindings::new());
        assert!(!result.is_change());
    }

    #[test]
    fn diff_update_when_different() {
        let desired = Resource::new("ecs.service", "Service").with_attribute("desired_count", 2i64);
        let current = existing("ecs.service", "Service", &[("desired_count", Value::Int(1))]);

        match diff(&desired, &current, &Bindings::new()) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["desired_count".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn references_are_compared_after_resolution() {
        let vpc = existing("ec2.vpc", "Vpc", &[]);
        let subnet_state = existing("ec2.subnet", "Subnet", &[("vpc_id", Value::string("vpc-id"))]);
        let desired = Resource::new("ec2.subnet", "Subnet").with_attribute("vpc_id", Value::ref_of("Vpc"));

        let bindings = Bindings::from_states([&vpc]);
        assert!(!diff(&desired, &subnet_state, &bindings).is_change());
        // Without the binding the reference is unknown, so it is a change
        assert!(diff(&desired, &subnet_state, &Bindings::new()).is_change());
    }

    #[test]
    fn create_plan_orders_creates_and_deletes_orphans() {
        let resources = vec![
            Resource::new("ec2.subnet", "Subnet").with_attribute("vpc_id", Value::ref_of("Vpc")),
            Resource::new("ec2.vpc", "Vpc").with_attribute("cidr_block", "10.0.0.0/16"),
        ];
        let mut current = HashMap::new();
        let orphan = existing("ec2.eip", "OldEip", &[]);
        current.insert(orphan.id.clone(), orphan);

        let plan = create_plan(&resources, &current, &Bindings::new()).unwrap();
        let kinds: Vec<_> = plan
            .effects()
            .iter()
            .map(|e| (e.kind(), e.resource_id().name.clone()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("create", "Vpc".to_string()),
                ("create", "Subnet".to_string()),
                ("delete", "OldEip".to_string()),
            ]
        );
    }

    #[test]
    fn destroy_plan_reverses_dependencies_and_retains() {
        let bucket = existing(
            "s3.bucket",
            "Logs",
            &[(DELETION_POLICY_ATTR, Value::string("Retain"))],
        );
        let vpc = existing("ec2.vpc", "Vpc", &[]);
        let flow_log = existing(
            "ec2.flow_log",
            "FlowLog",
            &[(DEPENDS_ON_ATTR, Value::strings(["Vpc", "Logs"]))],
        );
        let current: HashMap<_, _> = [bucket, vpc, flow_log]
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();

        let plan = destroy_plan(&current).unwrap();
        let effects = plan.effects();
        assert_eq!(effects.len(), 3);
        assert_eq!(effects[0].resource_id().name, "FlowLog");
        let bucket_effect = effects
            .iter()
            .find(|e| e.resource_id().name == "Logs")
            .unwrap();
        assert_eq!(bucket_effect.kind(), "retain");
        assert!(matches!(
            effects.iter().find(|e| e.resource_id().name == "Vpc"),
            Some(Effect::Delete { retain: false, identifier, .. }) if identifier == "vpc-id"
        ));
    }
}
