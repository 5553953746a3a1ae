//! Poolgate Core
//!
//! This crate holds the routing state of the proxy: the service/pool/node
//! registry, request routing (service resolution, pool selection and node
//! picking) and connection accounting for draining nodes.

pub mod config;
pub mod error;
pub mod lease;
pub mod model;
pub mod registry;
pub mod routing;

pub use config::{NodeConfig, PoolConfig, PoolsConfig, ServiceConfig, apply_services};
pub use error::{CoreError, CoreResult};
pub use lease::{ConnectionLease, NodeTarget};
pub use model::{
    LbPolicy, MAX_WEIGHT, MIN_WEIGHT, Node, NodeStatus, Pattern, PatternKind, Pool, PoolKind,
    Pools, Service,
};
pub use registry::{
    NewNode, NewService, Registry, RegistrySummary, UpdateNode, UpdatePool, UpdateService,
};
pub use routing::{RouteRequest, resolve_service, select_pool, strip_port};
