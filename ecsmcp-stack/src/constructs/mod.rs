//! Reusable building blocks
//!
//! Each construct is a plain struct built once from its props. Building it
//! declares its resources in the [`Scope`](crate::scope::Scope) and keeps the
//! logical IDs later constructs wire against.

pub mod ecs_cluster;
pub mod ecs_service;
pub mod load_balancer;
pub mod networking;
pub mod security_group;
pub mod storage;

pub use ecs_cluster::EcsCluster;
pub use ecs_service::{EcsService, EcsServiceProps};
pub use load_balancer::LoadBalancer;
pub use networking::{Networking, SubnetTier};
pub use security_group::{Peer, SecurityGroup};
pub use storage::Storage;
