//! ecsmcp Stack
//!
//! The ECS MCP sample stack: a VPC with flow logs, a Fargate cluster with a
//! Service Connect namespace, two MCP services, and an AI service published
//! behind an Application Load Balancer guarded by an API key header.

pub mod assets;
pub mod cidr;
pub mod config;
pub mod constructs;
pub mod error;
pub mod scope;
pub mod services;
pub mod stack;

pub use config::{Environment, ProviderKind, StackConfig};
pub use error::StackError;
pub use stack::{SynthesizedStack, build};
