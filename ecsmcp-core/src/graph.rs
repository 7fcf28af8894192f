//! Graph - Dependency graph between resources
//!
//! Edges come from references (`Value::ResourceRef`) and explicit ordering
//! (`_depends_on`). Creation follows the topological order; deletion runs it
//! in reverse.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::resource::{Resource, State};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("Resource '{from}' references unknown resource '{target}'")]
    UnknownReference { from: String, target: String },

    #[error("Duplicate logical ID '{0}'")]
    DuplicateId(String),
}

/// Dependency graph keyed by logical ID
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Nodes in insertion order
    nodes: Vec<String>,
    /// Resource -> resources it depends on
    edges: HashMap<String, BTreeSet<String>>,
    /// Resource -> resources that depend on it
    reverse_edges: HashMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for desired resources
    ///
    /// Every reference must point at a resource in the same set.
    pub fn from_resources(resources: &[Resource]) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for resource in resources {
            if graph.contains(resource.logical_id()) {
                return Err(GraphError::DuplicateId(resource.logical_id().to_string()));
            }
            graph.add_node(resource.logical_id());
        }
        for resource in resources {
            for dep in resource.dependencies() {
                if !graph.contains(&dep) {
                    return Err(GraphError::UnknownReference {
                        from: resource.logical_id().to_string(),
                        target: dep,
                    });
                }
                graph.add_edge(resource.logical_id(), &dep);
            }
        }
        Ok(graph)
    }

    /// Build the graph for recorded states
    ///
    /// Dependencies on resources that are no longer recorded are dropped.
    pub fn from_states<'a>(states: impl IntoIterator<Item = &'a State>) -> Self {
        let states: Vec<&State> = states.into_iter().collect();
        let mut graph = Self::new();
        for state in &states {
            graph.add_node(&state.id.name);
        }
        for state in &states {
            for dep in state.dependencies() {
                if graph.contains(&dep) && dep != state.id.name {
                    graph.add_edge(&state.id.name, &dep);
                }
            }
        }
        graph
    }

    pub fn add_node(&mut self, id: &str) {
        if !self.contains(id) {
            self.nodes.push(id.to_string());
            self.edges.entry(id.to_string()).or_default();
        }
    }

    /// Add an edge meaning `from` depends on `to`
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.add_node(from);
        self.add_node(to);
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.reverse_edges
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct dependencies of a resource
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .get(id)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Resources that depend directly on this resource
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.reverse_edges
            .get(id)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether `id` depends on `target`, directly or transitively
    pub fn depends_transitively(&self, id: &str, target: &str) -> bool {
        let mut stack = vec![id];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            for dep in self.dependencies_of(current) {
                if dep == target {
                    return true;
                }
                if seen.insert(dep) {
                    stack.push(dep);
                }
            }
        }
        false
    }

    pub fn has_cycle(&self) -> bool {
        self.topological_order().is_err()
    }

    /// Order in which resources can be created
    ///
    /// Dependencies come first; ties keep insertion order.
    pub fn topological_order(&self) -> Result<Vec<String>, GraphError> {
        let mut sorted = Vec::with_capacity(self.nodes.len());
        let mut visited: HashSet<&str> = HashSet::new();
        let mut visiting: Vec<&str> = Vec::new();

        for node in &self.nodes {
            self.visit(node, &mut visited, &mut visiting, &mut sorted)?;
        }
        Ok(sorted)
    }

    /// Order in which resources can be deleted
    pub fn reverse_topological_order(&self) -> Result<Vec<String>, GraphError> {
        let mut order = self.topological_order()?;
        order.reverse();
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        visiting: &mut Vec<&'a str>,
        sorted: &mut Vec<String>,
    ) -> Result<(), GraphError> {
        if visited.contains(node) {
            return Ok(());
        }
        if let Some(pos) = visiting.iter().position(|n| *n == node) {
            let mut cycle: Vec<String> = visiting[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(node.to_string());
            return Err(GraphError::Cycle(cycle));
        }

        visiting.push(node);
        if let Some(deps) = self.edges.get(node) {
            for dep in deps {
                self.visit(dep, visited, visiting, sorted)?;
            }
        }
        visiting.pop();

        visited.insert(node);
        sorted.push(node.to_string());
        Ok(())
    }
}

/// Sort resources so that every resource follows its dependencies
pub fn sort_resources(resources: &[Resource]) -> Result<Vec<Resource>, GraphError> {
    let graph = DependencyGraph::from_resources(resources)?;
    let by_id: HashMap<&str, &Resource> =
        resources.iter().map(|r| (r.logical_id(), r)).collect();

    Ok(graph
        .topological_order()?
        .iter()
        .filter_map(|id| by_id.get(id.as_str()).map(|r| (*r).clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Value;

    fn resource(name: &str, refs: &[&str]) -> Resource {
        let mut r = Resource::new("test", name);
        for (i, target) in refs.iter().enumerate() {
            r.set(format!("ref{}", i), Value::ref_of(*target));
        }
        r
    }

    #[test]
    fn dependencies_come_first() {
        let resources = vec![
            resource("Service", &["Cluster", "TaskDef"]),
            resource("TaskDef", &["Role"]),
            resource("Role", &[]),
            resource("Cluster", &[]),
        ];
        let sorted: Vec<_> = sort_resources(&resources)
            .unwrap()
            .into_iter()
            .map(|r| r.id.name)
            .collect();
        assert_eq!(sorted, vec!["Cluster", "Role", "TaskDef", "Service"]);
    }

    #[test]
    fn reverse_order_deletes_dependents_first() {
        let resources = vec![resource("Vpc", &[]), resource("Subnet", &["Vpc"])];
        let graph = DependencyGraph::from_resources(&resources).unwrap();
        assert_eq!(graph.reverse_topological_order().unwrap(), vec!["Subnet", "Vpc"]);
        assert_eq!(graph.dependents_of("Vpc"), vec!["Subnet"]);
    }

    #[test]
    fn cycle_is_reported_with_path() {
        let resources = vec![resource("A", &["B"]), resource("B", &["A"])];
        let graph = DependencyGraph::from_resources(&resources).unwrap();
        assert!(graph.has_cycle());
        match graph.topological_order() {
            Err(GraphError::Cycle(path)) => assert_eq!(path, vec!["A", "B", "A"]),
            other => panic!("Expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn unknown_reference_is_rejected() {
        let resources = vec![resource("Subnet", &["Vpc"])];
        assert_eq!(
            DependencyGraph::from_resources(&resources).unwrap_err(),
            GraphError::UnknownReference {
                from: "Subnet".to_string(),
                target: "Vpc".to_string()
            }
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let resources = vec![resource("Vpc", &[]), resource("Vpc", &[])];
        assert!(matches!(
            DependencyGraph::from_resources(&resources),
            Err(GraphError::DuplicateId(_))
        ));
    }

    #[test]
    fn transitive_dependency() {
        let resources = vec![
            resource("Vpc", &[]),
            resource("Subnet", &["Vpc"]),
            resource("Service", &["Subnet"]),
        ];
        let graph = DependencyGraph::from_resources(&resources).unwrap();
        assert!(graph.depends_transitively("Service", "Vpc"));
        assert!(!graph.depends_transitively("Vpc", "Service"));
    }
}
