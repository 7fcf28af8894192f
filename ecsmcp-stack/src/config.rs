//! Stack configuration
//!
//! Settings come from an optional TOML file; the deployment environment is
//! then overlaid from `CDK_DEFAULT_ACCOUNT` / `CDK_DEFAULT_REGION`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use ecsmcp_aws::schemas::types::validate_region;

use crate::error::StackError;

pub const DEFAULT_STACK_NAME: &str = "EcsMcpServerSampleStack";
pub const DEFAULT_REGION: &str = "ap-northeast-1";
pub const DEFAULT_VPC_CIDR: &str = "192.168.0.0/16";
pub const DEFAULT_NAMESPACE: &str = "services.local";

pub const ACCOUNT_ENV: &str = "CDK_DEFAULT_ACCOUNT";
pub const REGION_ENV: &str = "CDK_DEFAULT_REGION";

/// Where the stack is deployed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub account: Option<String>,
    pub region: String,
}

impl Environment {
    pub fn new(account: Option<String>, region: impl Into<String>) -> Self {
        Self {
            account,
            region: region.into(),
        }
    }
}

/// Which provider realizes the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Simulated,
    Awscc,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Simulated => write!(f, "simulated"),
            ProviderKind::Awscc => write!(f, "awscc"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simulated" => Ok(ProviderKind::Simulated),
            "awscc" => Ok(ProviderKind::Awscc),
            other => Err(format!(
                "Unknown provider '{}', expected simulated or awscc",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    pub stack_name: String,
    pub account: Option<String>,
    pub region: Option<String>,
    pub vpc_cidr: String,
    pub namespace: String,
    /// Directory holding the `ai-agent`, `mcp-one` and `mcp-two` build contexts
    pub services_dir: PathBuf,
    pub state_path: PathBuf,
    pub provider: ProviderKind,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: DEFAULT_STACK_NAME.to_string(),
            account: None,
            region: None,
            vpc_cidr: DEFAULT_VPC_CIDR.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            services_dir: PathBuf::from("services"),
            state_path: PathBuf::from("ecsmcp.state.json"),
            provider: ProviderKind::default(),
        }
    }
}

impl StackConfig {
    pub fn from_toml(content: &str) -> Result<Self, StackError> {
        Ok(toml::from_str(content)?)
    }

    /// Load the file if it exists, defaults otherwise
    pub fn load(path: &Path) -> Result<Self, StackError> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| StackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Overlay account and region from the process environment
    pub fn with_process_env(self) -> Self {
        self.with_env(|key| std::env::var(key).ok())
    }

    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(account) = lookup(ACCOUNT_ENV).filter(|a| !a.is_empty()) {
            self.account = Some(account);
        }
        if let Some(region) = lookup(REGION_ENV).filter(|r| !r.is_empty()) {
            self.region = Some(region);
        }
        self
    }

    /// Deployment environment, falling back to the default region
    pub fn environment(&self) -> Result<Environment, StackError> {
        let region = match &self.region {
            Some(region) => region.clone(),
            None => {
                warn!(
                    "{} is not set, defaulting region to {}",
                    REGION_ENV, DEFAULT_REGION
                );
                DEFAULT_REGION.to_string()
            }
        };
        validate_region(&region).map_err(StackError::InvalidRegion)?;
        Ok(Environment::new(self.account.clone(), region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_sample_stack() {
        let config = StackConfig::default();
        assert_eq!(config.stack_name, "EcsMcpServerSampleStack");
        assert_eq!(config.vpc_cidr, "192.168.0.0/16");
        assert_eq!(config.namespace, "services.local");
        assert_eq!(config.provider, ProviderKind::Simulated);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = StackConfig::from_toml(
            r#"
            region = "us-west-2"
            provider = "awscc"
            "#,
        )
        .unwrap();
        assert_eq!(config.region.as_deref(), Some("us-west-2"));
        assert_eq!(config.provider, ProviderKind::Awscc);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            StackConfig::from_toml("vpc_cidrs = \"10.0.0.0/16\""),
            Err(StackError::Config(_))
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StackConfig::load(&dir.path().join("ecsmcp.toml")).unwrap();
        assert_eq!(config, StackConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ecsmcp.toml");
        std::fs::write(&path, "stack_name = \"Other\"\n").unwrap();
        assert_eq!(StackConfig::load(&path).unwrap().stack_name, "Other");
    }

    #[test]
    fn environment_variables_override_file() {
        let env: HashMap<&str, &str> = [
            (ACCOUNT_ENV, "123456789012"),
            (REGION_ENV, "eu-west-1"),
        ]
        .into_iter()
        .collect();
        let config = StackConfig {
            region: Some("us-east-1".to_string()),
            ..Default::default()
        }
        .with_env(|key| env.get(key).map(|v| v.to_string()));

        let environment = config.environment().unwrap();
        assert_eq!(environment.account.as_deref(), Some("123456789012"));
        assert_eq!(environment.region, "eu-west-1");
    }

    #[test]
    fn region_defaults_when_unset() {
        let environment = StackConfig::default().with_env(|_| None).environment().unwrap();
        assert_eq!(environment.region, DEFAULT_REGION);
        assert_eq!(environment.account, None);
    }

    #[test]
    fn invalid_region_is_an_error() {
        let config = StackConfig {
            region: Some("mars-1".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.environment(), Err(StackError::InvalidRegion(_))));
    }

    #[test]
    fn provider_kind_parses() {
        assert_eq!("awscc".parse::<ProviderKind>(), Ok(ProviderKind::Awscc));
        assert!("terraform".parse::<ProviderKind>().is_err());
    }
}
