//! Realizes the stack through the AWS Cloud Control API
//!
//! Cloud Control speaks the CloudFormation resource model, so each resource
//! type maps onto its `AWS::*` type name and property names via the schemas in
//! `ecsmcp-aws`. [`convert`] does the attribute mapping, [`provider`] the API
//! calls.

pub mod convert;
pub mod provider;

pub use provider::{AwsccProvider, PollPolicy};
