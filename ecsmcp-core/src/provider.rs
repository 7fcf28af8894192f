//! The seam between planning and infrastructure
//!
//! Effects reach a [`Provider`] with every reference already resolved to a
//! literal. Two providers exist: an in-memory simulation and AWS Cloud
//! Control. Errors carry an [`ErrorKind`] so the interpreter can tell a
//! resource that is already gone from a failed call.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceId, State};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No schema or handler for the resource type
    UnsupportedType,
    /// Rejected before any call: failed validation, missing identifier
    Invalid,
    AlreadyExists,
    NotFound,
    /// The remote API refused or failed the operation
    Api,
    Timeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::UnsupportedType => "unsupported type",
            ErrorKind::Invalid => "invalid",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::NotFound => "not found",
            ErrorKind::Api => "api error",
            ErrorKind::Timeout => "timed out",
        })
    }
}

#[derive(Debug)]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
    pub resource_id: Option<ResourceId>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            resource_id: None,
            source: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Api, message)
    }

    pub fn for_resource(mut self, id: &ResourceId) -> Self {
        self.resource_id = Some(id.clone());
        self
    }

    pub fn caused_by(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource_id {
            Some(id) => write!(f, "[{}] {}", id, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait Provider: Send + Sync {
    /// Recorded in state next to every resource it created
    fn name(&self) -> &'static str;

    /// `State::not_found` when nothing exists under `identifier`
    fn read(&self, id: &ResourceId, identifier: Option<&str>) -> BoxFuture<'_, ProviderResult<State>>;

    /// Returned state carries the physical identifier and every computed
    /// attribute (ARNs, group ids, DNS names) later references may need.
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Fails with [`ErrorKind::NotFound`] if the resource is already gone
    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>>;
}

impl<P: Provider + ?Sized> Provider for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn read(&self, id: &ResourceId, identifier: Option<&str>) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(id, identifier)
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create(resource)
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).update(id, identifier, from, to)
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(id, identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn message_is_prefixed_with_the_resource() {
        let id = ResourceId::new("ecs.service", "McpOneService");
        let err = ProviderError::api("throttled").for_resource(&id);
        assert_eq!(err.to_string(), "[ecs.service.McpOneService] throttled");
        assert_eq!(ProviderError::invalid("bad cidr").to_string(), "bad cidr");
    }

    #[test]
    fn kind_and_source_survive() {
        let err = ProviderError::not_found("gone").caused_by(std::io::Error::other("404"));
        assert!(err.is_not_found());
        assert_eq!(err.source().map(|e| e.to_string()).as_deref(), Some("404"));
        assert!(!ProviderError::new(ErrorKind::Timeout, "slow").is_not_found());
    }
}
