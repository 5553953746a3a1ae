//! Request routing
//!
//! This module resolves an inbound request to a backend node:
//! - Service resolution by host and path prefix
//! - Pool selection by header pattern (debug, then gray, then prod)
//! - Node selection by the pool's load-balancing policy

mod balancer;
mod matcher;
mod router;

pub use router::{RouteRequest, resolve_service, select_pool, strip_port};
