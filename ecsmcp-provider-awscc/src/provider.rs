//! Cloud Control backed provider
//!
//! Create, update and delete are asynchronous on the AWS side: each returns a
//! request token that is polled until the operation settles. ECS services and
//! NAT gateways routinely take minutes, hence the generous deadline.
//!
//! Secret dynamic references in a document are filled in from Secrets Manager
//! just before the request is sent.

use std::collections::BTreeSet;
use std::time::Duration;

use aws_config::Region;
use aws_sdk_cloudcontrol::Client;
use aws_sdk_cloudcontrol::error::DisplayErrorContext;
use aws_sdk_cloudcontrol::types::{HandlerErrorCode, OperationStatus, ProgressEvent};
use log::{debug, info};

use ecsmcp_aws::{AwsSchemaConfig, config_for};
use ecsmcp_core::provider::{BoxFuture, ErrorKind, Provider, ProviderError, ProviderResult};
use ecsmcp_core::resource::{Resource, ResourceId, State};

use crate::convert::{
    SecretValues, conceal_secrets, desired_state, is_not_found, patch_operations, read_back, secret_references,
};

/// How request tokens are polled
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            deadline: Duration::from_secs(30 * 60),
        }
    }
}

pub struct AwsccProvider {
    client: Client,
    secrets: aws_sdk_secretsmanager::Client,
    region: String,
    poll: PollPolicy,
}

impl AwsccProvider {
    /// Credentials come from the default chain; only the region is pinned
    pub async fn new(region: &str) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self {
            client: Client::new(&sdk_config),
            secrets: aws_sdk_secretsmanager::Client::new(&sdk_config),
            region: region.to_string(),
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    async fn get(&self, config: &AwsSchemaConfig, identifier: &str) -> ProviderResult<Option<serde_json::Value>> {
        let response = match self
            .client
            .get_resource()
            .type_name(config.cfn_type)
            .identifier(identifier)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if is_not_found(&format!("{:?}", e)) => return Ok(None),
            Err(e) => return Err(api_error(&format!("GetResource {}", config.cfn_type), &e)),
        };
        let Some(properties) = response.resource_description().and_then(|d| d.properties()) else {
            return Ok(None);
        };
        serde_json::from_str(properties)
            .map(Some)
            .map_err(|e| ProviderError::api("GetResource returned malformed properties").caused_by(e))
    }

    async fn secret_values(&self, ids: BTreeSet<String>) -> ProviderResult<SecretValues> {
        let mut values = SecretValues::new();
        for id in ids {
            debug!("GetSecretValue {}", id);
            let response = self
                .secrets
                .get_secret_value()
                .secret_id(&id)
                .send()
                .await
                .map_err(|e| api_error("GetSecretValue", &e))?;
            let value = response
                .secret_string()
                .ok_or_else(|| ProviderError::invalid(format!("secret {} has no string value", id)))?;
            values.insert(id, value.to_string());
        }
        Ok(values)
    }

    /// Poll `request_token` until it settles; returns the primary identifier
    async fn settle(&self, request_token: &str) -> ProviderResult<String> {
        let started = tokio::time::Instant::now();
        while started.elapsed() < self.poll.deadline {
            let status = self
                .client
                .get_resource_request_status()
                .request_token(request_token)
                .send()
                .await
                .map_err(|e| api_error("GetResourceRequestStatus", &e))?;

            match status.progress_event() {
                Some(event) if event.operation_status() == Some(&OperationStatus::Success) => {
                    return Ok(event.identifier().unwrap_or_default().to_string());
                }
                Some(event)
                    if matches!(
                        event.operation_status(),
                        Some(OperationStatus::Failed | OperationStatus::CancelComplete)
                    ) =>
                {
                    return Err(failure(event));
                }
                _ => {
                    debug!("request {} pending after {:?}", request_token, started.elapsed());
                    tokio::time::sleep(self.poll.interval).await;
                }
            }
        }
        Err(ProviderError::new(
            ErrorKind::Timeout,
            format!("request {} did not settle within {:?}", request_token, self.poll.deadline),
        ))
    }

    async fn settle_event(&self, event: Option<&ProgressEvent>) -> ProviderResult<Option<String>> {
        match event.and_then(ProgressEvent::request_token) {
            Some(token) => self.settle(token).await.map(Some),
            None => Ok(None),
        }
    }

    async fn read_now(&self, id: &ResourceId, identifier: Option<&str>) -> ProviderResult<State> {
        let config = schema_config(id)?;
        let Some(identifier) = identifier else {
            return Ok(State::not_found(id.clone()));
        };
        Ok(match self.get(&config, identifier).await.map_err(|e| e.for_resource(id))? {
            Some(properties) => {
                State::existing(id.clone(), read_back(&properties, &config)).with_identifier(identifier)
            }
            None => State::not_found(id.clone()),
        })
    }

    async fn create_now(&self, resource: &Resource) -> ProviderResult<State> {
        let config = schema_config(&resource.id)?;
        info!("CreateResource {} ({})", resource.id, config.cfn_type);
        let secrets = self
            .secret_values(secret_references(resource))
            .await
            .map_err(|e| e.for_resource(&resource.id))?;
        let desired = desired_state(resource, &config, &secrets).map_err(|e| e.for_resource(&resource.id))?;
        let response = self
            .client
            .create_resource()
            .type_name(config.cfn_type)
            .desired_state(desired.to_string())
            .send()
            .await
            .map_err(|e| api_error("CreateResource", &e).for_resource(&resource.id))?;
        let identifier = self
            .settle_event(response.progress_event())
            .await
            .map_err(|e| e.for_resource(&resource.id))?
            .ok_or_else(|| ProviderError::api("CreateResource returned no request token").for_resource(&resource.id))?;
        let mut state = self.read_now(&resource.id, Some(&identifier)).await?;
        conceal_secrets(&mut state, resource);
        Ok(state)
    }

    async fn update_now(&self, id: &ResourceId, identifier: &str, from: &State, to: &Resource) -> ProviderResult<State> {
        let config = schema_config(id)?;
        let secrets = self
            .secret_values(secret_references(to))
            .await
            .map_err(|e| e.for_resource(id))?;
        let patch = patch_operations(from, to, &config, &secrets).map_err(|e| e.for_resource(id))?;
        if !patch.is_empty() {
            info!("UpdateResource {} ({} operations)", id, patch.len());
            let document = serde_json::Value::Array(patch).to_string();
            let response = self
                .client
                .update_resource()
                .type_name(config.cfn_type)
                .identifier(identifier)
                .patch_document(document)
                .send()
                .await
                .map_err(|e| api_error("UpdateResource", &e).for_resource(id))?;
            self.settle_event(response.progress_event())
                .await
                .map_err(|e| e.for_resource(id))?;
        }
        let mut state = self.read_now(id, Some(identifier)).await?;
        conceal_secrets(&mut state, to);
        Ok(state)
    }

    async fn delete_now(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let config = schema_config(id)?;
        info!("DeleteResource {} ({})", id, identifier);
        let response = match self
            .client
            .delete_resource()
            .type_name(config.cfn_type)
            .identifier(identifier)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if is_not_found(&format!("{:?}", e)) => {
                return Err(ProviderError::not_found(format!("{} does not exist", identifier)).for_resource(id));
            }
            Err(e) => {
                return Err(api_error("DeleteResource", &e).for_resource(id));
            }
        };
        self.settle_event(response.progress_event())
            .await
            .map(|_| ())
            .map_err(|e| e.for_resource(id))
    }
}

fn schema_config(id: &ResourceId) -> ProviderResult<AwsSchemaConfig> {
    config_for(&id.resource_type).ok_or_else(|| {
        ProviderError::new(ErrorKind::UnsupportedType, format!("no Cloud Control mapping for {}", id.resource_type))
            .for_resource(id)
    })
}

fn api_error(call: &str, error: &(impl std::error::Error + 'static)) -> ProviderError {
    ProviderError::api(format!("{}: {}", call, DisplayErrorContext(error)))
}

fn failure(event: &ProgressEvent) -> ProviderError {
    let kind = match event.error_code() {
        Some(HandlerErrorCode::NotFound) => ErrorKind::NotFound,
        Some(HandlerErrorCode::AlreadyExists) => ErrorKind::AlreadyExists,
        Some(HandlerErrorCode::InvalidRequest) => ErrorKind::Invalid,
        Some(HandlerErrorCode::ServiceTimeout) => ErrorKind::Timeout,
        _ => ErrorKind::Api,
    };
    let status = match event.operation_status() {
        Some(OperationStatus::CancelComplete) => "cancelled",
        _ => "failed",
    };
    ProviderError::new(
        kind,
        format!(
            "{} {}: {}",
            event.type_name().unwrap_or("operation"),
            status,
            event.status_message().unwrap_or("no status message")
        ),
    )
}

impl Provider for AwsccProvider {
    fn name(&self) -> &'static str {
        "awscc"
    }

    fn read(&self, id: &ResourceId, identifier: Option<&str>) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(str::to_string);
        Box::pin(async move { self.read_now(&id, identifier.as_deref()).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_now(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let (id, identifier, from, to) = (id.clone(), identifier.to_string(), from.clone(), to.clone());
        Box::pin(async move { self.update_now(&id, &identifier, &from, &to).await })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let (id, identifier) = (id.clone(), identifier.to_string());
        Box::pin(async move { self.delete_now(&id, &identifier).await })
    }
}
