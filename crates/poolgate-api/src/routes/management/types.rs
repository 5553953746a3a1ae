//! Request/Response DTOs for management API

use poolgate_core::{LbPolicy, Node, NodeStatus, Pattern, Pool, PoolKind, Service};
use serde::{Deserialize, Serialize};

// ==================== Service Types ====================

/// Create service request
#[derive(Deserialize)]
pub struct CreateServiceRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub url: String,
}

/// Update service request; the name comes from the path
#[derive(Deserialize)]
pub struct UpdateServiceRequest {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub url: String,
}

/// Service response
#[derive(Serialize, Deserialize, Debug)]
pub struct ServiceResponse {
    pub name: String,
    pub host: String,
    pub url: String,
}

impl From<Service> for ServiceResponse {
    fn from(service: Service) -> Self {
        Self {
            name: service.name,
            host: service.host,
            url: service.url,
        }
    }
}

// ==================== Pool Types ====================

/// Update pool request
#[derive(Deserialize)]
pub struct UpdatePoolRequest {
    #[serde(default)]
    pub pattern: Option<Pattern>,
    #[serde(default)]
    pub lb_policy: LbPolicy,
}

/// Pool response
#[derive(Serialize, Deserialize, Debug)]
pub struct PoolResponse {
    pub name: PoolKind,
    pub pattern: Option<Pattern>,
    pub lb_policy: LbPolicy,
    pub node_count: usize,
}

pub fn pool_to_response(kind: PoolKind, pool: Pool) -> PoolResponse {
    PoolResponse {
        name: kind,
        pattern: pool.pattern,
        lb_policy: pool.lb_policy,
        node_count: pool.nodes.len(),
    }
}

// ==================== Node Types ====================

/// Create node request. A `conn_num` field, if sent, is ignored.
#[derive(Deserialize)]
pub struct CreateNodeRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default = "default_weight")]
    pub weight: i64,
}

/// Update node request
#[derive(Deserialize)]
pub struct UpdateNodeRequest {
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub status: Option<NodeStatus>,
}

/// Node response
#[derive(Serialize, Deserialize, Debug)]
pub struct NodeResponse {
    pub name: String,
    pub host: String,
    pub status: NodeStatus,
    pub weight: u8,
    pub conn_num: u64,
}

impl From<Node> for NodeResponse {
    fn from(node: Node) -> Self {
        Self {
            name: node.name,
            host: node.host,
            status: node.status,
            weight: node.weight,
            conn_num: node.conn_num,
        }
    }
}

fn default_weight() -> i64 {
    1
}
