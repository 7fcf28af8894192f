//! AWS support for ecsmcp
//!
//! Resource schemas for the AWS types the stack declares, CloudFormation
//! template synthesis, the AwsSolutions rule pack, static analysis of the
//! network and listener routing, and a simulated provider.

pub mod case_convert;
pub mod elb_accounts;
pub mod iam;
pub mod nag;
pub mod network_access;
pub mod routing;
pub mod schemas;
pub mod simulated;
pub mod template;

pub use schemas::{AwsSchemaConfig, SchemaError, config_for, validate_resources};
pub use simulated::SimulatedProvider;
