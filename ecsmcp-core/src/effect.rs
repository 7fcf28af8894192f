//! Effect - Side effects described as values
//!
//! An Effect is what would happen to a single resource. Nothing runs until
//! an Interpreter executes it against a Provider.

use crate::construct::ConstructPath;
use crate::resource::{Resource, ResourceId, State};

/// A single planned operation on a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Read the current state of a resource
    Read(ResourceId),
    /// Create a resource; references are resolved when the effect runs
    Create(Resource),
    /// Update an existing resource
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
    },
    /// Remove a resource from the stack
    ///
    /// With `retain` set the physical resource is kept and only forgotten.
    Delete {
        id: ResourceId,
        identifier: String,
        retain: bool,
        path: Option<ConstructPath>,
    },
}

impl Effect {
    /// Returns whether this Effect changes infrastructure or recorded state
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Effect::Read(_))
    }

    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Read(id) => id,
            Effect::Create(resource) => &resource.id,
            Effect::Update { id, .. } => id,
            Effect::Delete { id, .. } => id,
        }
    }

    /// Construct path of the affected resource, if known
    pub fn path(&self) -> Option<ConstructPath> {
        match self {
            Effect::Read(_) => None,
            Effect::Create(resource) => resource.path(),
            Effect::Update { to, .. } => to.path(),
            Effect::Delete { path, .. } => path.clone(),
        }
    }

    /// Short label used in plan output
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Read(_) => "read",
            Effect::Create(_) => "create",
            Effect::Update { .. } => "update",
            Effect::Delete { retain: true, .. } => "retain",
            Effect::Delete { .. } => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retained_delete_is_labelled_retain() {
        let effect = Effect::Delete {
            id: ResourceId::new("s3.bucket", "Logs"),
            identifier: "logs-bucket".to_string(),
            retain: true,
            path: Some(ConstructPath::parse("Storage/AccessLogs")),
        };
        assert_eq!(effect.kind(), "retain");
        assert!(effect.is_mutating());
        assert_eq!(effect.path().unwrap().top_level(), Some("Storage"));
    }

    #[test]
    fn read_is_not_mutating() {
        let effect = Effect::Read(ResourceId::new("ec2.vpc", "Vpc"));
        assert!(!effect.is_mutating());
        assert_eq!(effect.resource_id().name, "Vpc");
    }
}
