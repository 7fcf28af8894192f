use std::path::PathBuf;

use ecsmcp_aws::nag::Finding;
use ecsmcp_aws::schemas::SchemaError;
use ecsmcp_aws::template::TemplateError;
use ecsmcp_core::graph::GraphError;

#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Invalid CIDR '{cidr}': {reason}")]
    InvalidCidr { cidr: String, reason: String },

    #[error("Cannot split {cidr} into {count} subnets: blocks would be smaller than /{max_prefix}")]
    CidrTooSmall {
        cidr: String,
        count: usize,
        max_prefix: u8,
    },

    #[error("Service '{service}': {reason}")]
    InvalidService { service: String, reason: String },

    #[error("Build context {0} does not exist or is not a directory")]
    MissingBuildContext(PathBuf),

    #[error("Resource '{0}' is not declared in this stack")]
    UnknownResource(String),

    #[error("{} schema violation(s), first: {}", .0.len(), first_error(.0))]
    Schema(Vec<SchemaError>),

    #[error("{} unsuppressed rule finding(s), first: {}", .0.len(), first_finding(.0))]
    Nag(Vec<Finding>),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn first_error(errors: &[SchemaError]) -> String {
    errors.first().map(ToString::to_string).unwrap_or_default()
}

fn first_finding(findings: &[Finding]) -> String {
    findings.first().map(ToString::to_string).unwrap_or_default()
}
