//! Construct - Paths in the construct tree and the logical IDs derived from them
//!
//! Every resource is declared at a path such as `AiService/ECSService/TaskDefinition`.
//! The logical ID is a readable prefix built from the path plus a short hash of the
//! full path, so two constructs with the same leaf id never collide.

use std::fmt;

use sha2::{Digest, Sha256};

/// Maximum length of the human readable part of a logical ID
const MAX_HUMAN_LEN: usize = 240;
/// Number of hex digits of the path hash appended to logical IDs
const HASH_LEN: usize = 8;

/// Path of a construct from the root of the stack
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ConstructPath {
    components: Vec<String>,
}

impl ConstructPath {
    /// The stack root
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/` separated path
    pub fn parse(s: &str) -> Self {
        Self {
            components: s
                .split('/')
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Path of a child construct
    pub fn child(&self, id: impl Into<String>) -> Self {
        let mut components = self.components.clone();
        components.push(id.into());
        Self { components }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// First component, i.e. the construct directly under the stack
    pub fn top_level(&self) -> Option<&str> {
        self.components.first().map(String::as_str)
    }

    /// Whether `self` is `other` or lies below it
    pub fn starts_with(&self, other: &ConstructPath) -> bool {
        self.components.starts_with(&other.components)
    }

    /// Logical ID for a resource declared at this path
    ///
    /// A single component is used as-is (minus non-alphanumerics); deeper paths
    /// get a hash suffix.
    pub fn logical_id(&self) -> String {
        if let [only] = self.components.as_slice() {
            return sanitize(only);
        }

        let mut human = String::new();
        let mut previous: Option<&str> = None;
        for component in &self.components {
            // "Cluster/Cluster" reads as "Cluster"
            if previous == Some(component.as_str()) {
                continue;
            }
            human.push_str(&sanitize(component));
            previous = Some(component);
        }
        human.truncate(MAX_HUMAN_LEN);

        format!("{}{}", human, path_hash(&self.to_string()))
    }
}

impl fmt::Display for ConstructPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("/"))
    }
}

fn sanitize(component: &str) -> String {
    let cleaned: String = component.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let mut chars = cleaned.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn path_hash(path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    hex::encode_upper(digest)[..HASH_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let path = ConstructPath::parse("/AiService/ECSService/");
        assert_eq!(path.components().len(), 2);
        assert_eq!(path.to_string(), "AiService/ECSService");
        assert_eq!(path.top_level(), Some("AiService"));
    }

    #[test]
    fn single_component_keeps_its_name() {
        assert_eq!(ConstructPath::parse("ALBSg").logical_id(), "ALBSg");
        assert_eq!(ConstructPath::parse("SGmcp-one").logical_id(), "SGmcpone");
    }

    #[test]
    fn nested_paths_get_stable_hash_suffix() {
        let path = ConstructPath::parse("Storage/AccessLogs");
        let id = path.logical_id();
        assert!(id.starts_with("StorageAccessLogs"));
        assert_eq!(id.len(), "StorageAccessLogs".len() + HASH_LEN);
        assert_eq!(id, path.logical_id());
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn same_leaf_under_different_parents_differs() {
        let one = ConstructPath::parse("MCPOne/TaskRole").logical_id();
        let two = ConstructPath::parse("MCPTwo/TaskRole").logical_id();
        assert_ne!(one, two);
    }

    #[test]
    fn repeated_components_collapse_in_readable_part() {
        let id = ConstructPath::parse("ECS/Cluster/Cluster").logical_id();
        assert!(id.starts_with("ECSCluster"));
        assert!(!id.starts_with("ECSClusterCluster"));
    }

    #[test]
    fn child_and_starts_with() {
        let parent = ConstructPath::parse("MCPOne");
        let child = parent.child("ECSService").child("TaskDefinition");
        assert!(child.starts_with(&parent));
        assert!(!parent.starts_with(&child));
        assert!(ConstructPath::root().is_root());
    }
}
