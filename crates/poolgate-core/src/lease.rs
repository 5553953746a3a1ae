//! Connection accounting for forwarded requests

use uuid::Uuid;

use crate::model::{Node, PoolKind};
use crate::registry::Registry;

/// Where a request was routed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTarget {
    pub service: String,
    pub pool: PoolKind,
    pub node: String,
    /// `host:port` of the node
    pub host: String,
    pub(crate) instance: Uuid,
}

impl NodeTarget {
    pub(crate) fn new(service: &str, pool: PoolKind, node: &Node) -> Self {
        Self {
            service: service.to_string(),
            pool,
            node: node.name.clone(),
            host: node.host.clone(),
            instance: node.instance,
        }
    }
}

/// One in-flight request counted against a node.
///
/// Dropping the lease releases the connection exactly once, whether the
/// response finished, failed, or was abandoned by the client. If the node
/// was unloading and this was its last connection, it becomes `off`.
#[must_use = "the connection is released as soon as the lease is dropped"]
#[derive(Debug)]
pub struct ConnectionLease {
    registry: Registry,
    target: NodeTarget,
}

impl ConnectionLease {
    pub(crate) fn new(registry: Registry, target: NodeTarget) -> Self {
        Self { registry, target }
    }

    pub fn target(&self) -> &NodeTarget {
        &self.target
    }

    /// `host:port` to forward to
    pub fn host(&self) -> &str {
        &self.target.host
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.registry.release(&self.target);
    }
}
