//! The services of the sample: two MCP servers and the AI agent in front of them

use std::path::Path;

use ecsmcp_aws::iam::PolicyDocument;
use ecsmcp_core::construct::ConstructPath;
use ecsmcp_core::resource::Value;

use crate::assets::{ContainerImage, ImageAsset};
use crate::error::StackError;
use crate::scope::{Scope, declare};

pub mod ai;
pub mod mcp;

pub use ai::{AiService, AiServiceProps};
pub use mcp::{McpService, McpServiceProps};

/// Port every service of the sample listens on
pub const SERVICE_PORT: i64 = 8000;

/// Name and port another service reaches a service at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDetails {
    pub service_name: String,
    pub service_port: i64,
}

/// Role assumed by the service's tasks, with optional inline policies
fn task_role(
    scope: &mut Scope,
    path: &ConstructPath,
    inline_policies: Vec<(&str, PolicyDocument)>,
) -> String {
    let mut role = declare(&path.child("TaskRole"), "iam.role").with_attribute(
        "assume_role_policy_document",
        PolicyDocument::assume_role("ecs-tasks.amazonaws.com").to_value(),
    );
    if !inline_policies.is_empty() {
        role.set(
            "policies",
            Value::List(
                inline_policies
                    .into_iter()
                    .map(|(name, document)| {
                        Value::map([
                            ("PolicyName", Value::string(name)),
                            ("PolicyDocument", document.to_value()),
                        ])
                    })
                    .collect(),
            ),
        );
    }
    scope.add(role)
}

/// Hash the build context under `services_dir` and register the asset
fn image_asset(
    scope: &mut Scope,
    path: &ConstructPath,
    services_dir: &Path,
    context: &str,
) -> Result<ContainerImage, StackError> {
    let asset = ImageAsset::from_directory(path.to_string(), &services_dir.join(context))?;
    let image = ContainerImage::from_asset(&asset);
    scope.add_asset(asset);
    Ok(image)
}
