//! Runs a plan against a provider
//!
//! Effects run strictly in plan order. A reference such as
//! `ALBSg.group_id` is resolved just before its effect runs, from whatever the
//! provider reported for resources applied earlier in the same run. When a
//! resource fails, everything that references it is skipped rather than sent
//! to the provider with a dangling value.

use std::collections::HashSet;

use log::{debug, info, warn};

use crate::effect::Effect;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::resolve::Bindings;
use crate::resource::{DEPENDS_ON_ATTR, Resource, ResourceId, State, Value};

#[derive(Debug)]
pub enum EffectOutcome {
    Read { state: State },
    /// `state` is what gets recorded: resolved attributes plus provider output
    Created { state: State },
    Updated { state: State },
    Deleted { id: ResourceId },
    /// Dropped from state; the physical resource stays (DeletionPolicy Retain)
    Retained { id: ResourceId },
    /// Dry run, or a dependency failed earlier in the run
    Skipped { id: ResourceId, reason: String },
}

/// One outcome per attempted effect, in plan order. Stops short of the plan
/// length when the run aborted on the first error.
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<Result<EffectOutcome, ProviderError>>,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// Report every effect as skipped without calling the provider
    pub dry_run: bool,
    /// Keep going past a failure; dependents of the failed resource are still skipped
    pub continue_on_error: bool,
}

pub struct Interpreter<P: Provider> {
    provider: P,
    config: InterpreterConfig,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// `bindings` must already hold the pseudo parameters and the states of
    /// resources the plan leaves untouched; it is updated as effects land.
    pub async fn apply(&self, plan: &Plan, bindings: &mut Bindings) -> ApplyResult {
        let mut outcomes = Vec::new();
        let mut success_count = 0;
        let mut failure_count = 0;
        let mut skipped_count = 0;
        let mut failed: HashSet<String> = HashSet::new();

        for effect in plan.effects() {
            let id = effect.resource_id().clone();

            if let Some(blocked_by) = self.blocking_failure(effect, &failed) {
                warn!("Skipping {}: dependency {} failed", id, blocked_by);
                failed.insert(id.name.clone());
                skipped_count += 1;
                outcomes.push(Ok(EffectOutcome::Skipped {
                    id,
                    reason: format!("dependency {} failed", blocked_by),
                }));
                continue;
            }

            let result = self.execute_effect(effect, bindings).await;

            match &result {
                Ok(EffectOutcome::Skipped { .. }) => skipped_count += 1,
                Ok(_) => success_count += 1,
                Err(e) => {
                    warn!("{} failed: {}", id, e);
                    failure_count += 1;
                    failed.insert(id.name.clone());
                    if !self.config.continue_on_error {
                        outcomes.push(result);
                        break;
                    }
                }
            }

            outcomes.push(result);
        }

        ApplyResult {
            outcomes,
            success_count,
            failure_count,
            skipped_count,
        }
    }

    fn blocking_failure(&self, effect: &Effect, failed: &HashSet<String>) -> Option<String> {
        let deps = match effect {
            Effect::Create(resource) | Effect::Update { to: resource, .. } => {
                resource.dependencies()
            }
            _ => return None,
        };
        deps.into_iter().find(|d| failed.contains(d))
    }

    async fn execute_effect(
        &self,
        effect: &Effect,
        bindings: &mut Bindings,
    ) -> ProviderResult<EffectOutcome> {
        if self.config.dry_run {
            return Ok(EffectOutcome::Skipped {
                id: effect.resource_id().clone(),
                reason: "dry-run mode".to_string(),
            });
        }

        match effect {
            Effect::Read(id) => {
                let state = self.provider.read(id, None).await?;
                Ok(EffectOutcome::Read { state })
            }
            Effect::Create(resource) => {
                let resolved = resolve(resource, bindings)?;
                info!("Creating {}", resource.id);
                let created = self.provider.create(&resolved).await?;
                let state = record(&resolved, resource, created);
                bindings.insert_state(&state);
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update { id, from, to } => {
                let identifier = from.identifier.as_deref().ok_or_else(|| {
                    ProviderError::invalid("No identifier recorded for resource").for_resource(id)
                })?;
                let resolved = resolve(to, bindings)?;
                info!("Updating {}", id);
                let mut updated = self.provider.update(id, identifier, from, &resolved).await?;
                if updated.identifier.is_none() {
                    updated.identifier = from.identifier.clone();
                }
                let state = record(&resolved, to, updated);
                bindings.insert_state(&state);
                Ok(EffectOutcome::Updated { state })
            }
            Effect::Delete {
                id,
                retain: true,
                ..
            } => {
                info!("Retaining {} (deletion policy Retain)", id);
                bindings.remove(&id.name);
                Ok(EffectOutcome::Retained { id: id.clone() })
            }
            Effect::Delete { id, identifier, .. } => {
                if identifier.is_empty() {
                    return Err(
                        ProviderError::invalid("No identifier recorded for resource").for_resource(id)
                    );
                }
                info!("Deleting {}", id);
                match self.provider.delete(id, identifier).await {
                    Err(e) if e.is_not_found() => warn!("{} was already deleted", id),
                    other => other?,
                }
                bindings.remove(&id.name);
                Ok(EffectOutcome::Deleted { id: id.clone() })
            }
        }
    }
}

fn resolve(resource: &Resource, bindings: &Bindings) -> ProviderResult<Resource> {
    bindings
        .resolve_resource(resource)
        .map_err(|e| ProviderError::invalid(e.to_string()).for_resource(&resource.id).caused_by(e))
}

/// Build the state to record: resolved desired attributes, overlaid with what
/// the provider reported, plus the internal attributes needed for teardown.
fn record(resolved: &Resource, desired: &Resource, reported: State) -> State {
    let mut attributes = resolved.attributes.clone();
    attributes.extend(reported.attributes);
    let deps: Vec<String> = desired.dependencies().into_iter().collect();
    attributes.insert(DEPENDS_ON_ATTR.to_string(), Value::strings(deps));
    debug!("Recorded {} with {} attributes", desired.id, attributes.len());

    State {
        id: desired.id.clone(),
        identifier: reported.identifier,
        attributes,
        exists: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::BoxFuture;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestProvider {
        calls: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl Provider for TestProvider {
        fn name(&self) -> &'static str {
            "test"
        }

        fn read(
            &self,
            id: &ResourceId,
            _identifier: Option<&str>,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            Box::pin(async move { Ok(State::not_found(id)) })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            self.calls.lock().unwrap().push(format!("create {}", resource.id.name));
            let result = if self.fail_on.as_deref() == Some(resource.id.name.as_str()) {
                Err(ProviderError::api("boom").for_resource(&resource.id))
            } else {
                let mut attrs = HashMap::new();
                attrs.insert("arn".to_string(), Value::string(format!("arn:{}", resource.id.name)));
                Ok(State::existing(resource.id.clone(), attrs)
                    .with_identifier(format!("{}-id", resource.id.name)))
            };
            Box::pin(async move { result })
        }

        fn update(
            &self,
            id: &ResourceId,
            _identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            self.calls.lock().unwrap().push(format!("update {}", id.name));
            let state = State::existing(id.clone(), to.attributes.clone());
            Box::pin(async move { Ok(state) })
        }

        fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("delete {} {}", id.name, identifier));
            let result = if identifier == "gone" {
                Err(ProviderError::not_found("no such resource").for_resource(id))
            } else {
                Ok(())
            };
            Box::pin(async move { result })
        }
    }

    #[tokio::test]
    async fn apply_empty_plan() {
        let interpreter = Interpreter::new(TestProvider::default());
        let result = interpreter.apply(&Plan::new(), &mut Bindings::new()).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 0);
    }

    #[tokio::test]
    async fn references_resolve_from_earlier_effects() {
        let interpreter = Interpreter::new(TestProvider::default());
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("ec2.vpc", "Vpc")));
        plan.add(Effect::Create(
            Resource::new("ec2.subnet", "Subnet")
                .with_attribute("vpc_id", Value::ref_of("Vpc"))
                .with_attribute("vpc_arn", Value::attr_of("Vpc", "arn")),
        ));

        let mut bindings = Bindings::new();
        let result = interpreter.apply(&plan, &mut bindings).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 2);
        match &result.outcomes[1] {
            Ok(EffectOutcome::Created { state }) => {
                assert_eq!(state.attributes.get("vpc_id"), Some(&Value::string("Vpc-id")));
                assert_eq!(state.attributes.get("vpc_arn"), Some(&Value::string("arn:Vpc")));
                assert_eq!(state.dependencies(), vec!["Vpc".to_string()]);
            }
            other => panic!("Expected Created, got {:?}", other),
        }
        assert!(bindings.contains("Subnet"));
    }

    #[tokio::test]
    async fn dependents_of_failed_resources_are_skipped() {
        let provider = TestProvider {
            fail_on: Some("Vpc".to_string()),
            ..Default::default()
        };
        let config = InterpreterConfig {
            continue_on_error: true,
            ..Default::default()
        };
        let interpreter = Interpreter::new(provider).with_config(config);
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("ec2.vpc", "Vpc")));
        plan.add(Effect::Create(
            Resource::new("ec2.subnet", "Subnet").with_attribute("vpc_id", Value::ref_of("Vpc")),
        ));
        plan.add(Effect::Create(Resource::new("s3.bucket", "Logs")));

        let result = interpreter.apply(&plan, &mut Bindings::new()).await;

        assert_eq!(result.failure_count, 1);
        assert_eq!(result.skipped_count, 1);
        assert_eq!(result.success_count, 1);
        assert!(matches!(result.outcomes[1], Ok(EffectOutcome::Skipped { .. })));
        let calls = interpreter.provider().calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["create Vpc", "create Logs"]);
    }

    #[tokio::test]
    async fn stops_at_first_error_by_default() {
        let provider = TestProvider {
            fail_on: Some("Vpc".to_string()),
            ..Default::default()
        };
        let interpreter = Interpreter::new(provider);
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("ec2.vpc", "Vpc")));
        plan.add(Effect::Create(Resource::new("s3.bucket", "Logs")));

        let result = interpreter.apply(&plan, &mut Bindings::new()).await;
        assert!(!result.is_success());
        assert_eq!(result.outcomes.len(), 1);
    }

    #[tokio::test]
    async fn retained_resources_are_not_deleted() {
        let interpreter = Interpreter::new(TestProvider::default());
        let mut plan = Plan::new();
        plan.add(Effect::Delete {
            id: ResourceId::new("ecs.service", "Service"),
            identifier: "svc-arn".to_string(),
            retain: false,
            path: None,
        });
        plan.add(Effect::Delete {
            id: ResourceId::new("s3.bucket", "Logs"),
            identifier: "logs-bucket".to_string(),
            retain: true,
            path: None,
        });

        let result = interpreter.apply(&plan, &mut Bindings::new()).await;

        assert!(result.is_success());
        assert!(matches!(result.outcomes[1], Ok(EffectOutcome::Retained { .. })));
        let calls = interpreter.provider().calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["delete Service svc-arn"]);
    }

    #[tokio::test]
    async fn deleting_a_vanished_resource_succeeds() {
        let interpreter = Interpreter::new(TestProvider::default());
        let mut plan = Plan::new();
        plan.add(Effect::Delete {
            id: ResourceId::new("logs.log_group", "McpOneLogs"),
            identifier: "gone".to_string(),
            retain: false,
            path: None,
        });

        let result = interpreter.apply(&plan, &mut Bindings::new()).await;
        assert!(result.is_success());
        assert!(matches!(result.outcomes[0], Ok(EffectOutcome::Deleted { .. })));
    }

    #[tokio::test]
    async fn dry_run_skips_effects() {
        let config = InterpreterConfig {
            dry_run: true,
            ..Default::default()
        };
        let interpreter = Interpreter::new(TestProvider::default()).with_config(config);
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("test", "example")));

        let result = interpreter.apply(&plan, &mut Bindings::new()).await;

        assert!(result.is_success());
        assert_eq!(result.skipped_count, 1);
        assert!(interpreter.provider().calls.lock().unwrap().is_empty());
    }
}
