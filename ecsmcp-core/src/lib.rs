//! ecsmcp Core
//!
//! Core library for composing infrastructure as a tree of constructs,
//! planning the resulting resources as values and interpreting the plan
//! against a provider.

pub mod construct;
pub mod differ;
pub mod effect;
pub mod graph;
pub mod interpreter;
pub mod plan;
pub mod provider;
pub mod resolve;
pub mod resource;
pub mod schema;
