//! Service registry
//!
//! The registry owns every service, pool and node behind a single lock.
//! Each public operation takes the lock once, applies its change completely
//! and releases it, so concurrent readers only ever observe whole
//! operations. Network I/O never happens while the lock is held.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};
use crate::lease::{ConnectionLease, NodeTarget};
use crate::model::{
    LbPolicy, MAX_WEIGHT, MIN_WEIGHT, Node, NodeStatus, Pattern, Pool, PoolKind, Service,
    normalize_url,
};
use crate::routing::{RouteRequest, resolve_service, select_pool};

/// Registry-wide counts reported by the control plane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrySummary {
    pub services: usize,
    pub nodes: usize,
    /// Nodes with status `on`
    pub available_nodes: usize,
    /// Connections in flight across all nodes
    pub connections: u64,
}

/// Input for creating a service
#[derive(Debug, Clone, Default)]
pub struct NewService {
    pub name: String,
    pub host: String,
    pub url: String,
}

/// Replacement host and url for an existing service
#[derive(Debug, Clone, Default)]
pub struct UpdateService {
    pub host: String,
    pub url: String,
}

/// Replacement routing settings for a pool
#[derive(Debug, Clone, Default)]
pub struct UpdatePool {
    pub pattern: Option<Pattern>,
    pub lb_policy: LbPolicy,
}

/// Input for registering a node
#[derive(Debug, Clone)]
pub struct NewNode {
    pub name: String,
    pub host: String,
    pub status: NodeStatus,
    pub weight: u8,
}

/// Administrative change to a node; absent fields are left as they are
#[derive(Debug, Clone, Default)]
pub struct UpdateNode {
    pub weight: Option<u8>,
    pub status: Option<NodeStatus>,
}

/// Shared, lock-guarded store of services, pools and nodes
#[derive(Clone, Default)]
pub struct Registry {
    services: Arc<RwLock<Vec<Service>>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("services", &self.services.read().len())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Totals over the whole registry, taken under one read lock
    pub fn summary(&self) -> RegistrySummary {
        let services = self.services.read();
        let mut summary = RegistrySummary {
            services: services.len(),
            ..RegistrySummary::default()
        };

        let nodes = services
            .iter()
            .flat_map(|s| {
                PoolKind::ALL
                    .into_iter()
                    .filter_map(move |kind| s.pools.get(kind))
            })
            .flat_map(|pool| pool.nodes.iter());
        for node in nodes {
            summary.nodes += 1;
            if node.is_available() {
                summary.available_nodes += 1;
            }
            summary.connections += node.conn_num;
        }
        summary
    }

    // ==================== Services ====================

    /// Snapshot of all services in registration order
    pub fn list_services(&self) -> Vec<Service> {
        self.services.read().clone()
    }

    pub fn create_service(&self, new: NewService) -> CoreResult<Service> {
        if new.name.is_empty() {
            return Err(CoreError::BadRequest("empty service name".to_string()));
        }

        let mut services = self.services.write();
        if services.iter().any(|s| s.name == new.name) {
            return Err(CoreError::Conflict(format!("service {}", new.name)));
        }

        let service = Service::new(new.name, new.host, new.url);
        info!(
            "Created service {} (host: {:?}, url: {})",
            service.name, service.host, service.url
        );
        services.push(service.clone());
        Ok(service)
    }

    pub fn get_service(&self, name: &str) -> CoreResult<Service> {
        let services = self.services.read();
        find_service(&services, name).cloned()
    }

    pub fn update_service(&self, name: &str, update: UpdateService) -> CoreResult<Service> {
        let mut services = self.services.write();
        let service = find_service_mut(&mut services, name)?;

        service.host = update.host;
        service.url = normalize_url(update.url);
        info!(
            "Updated service {} (host: {:?}, url: {})",
            service.name, service.host, service.url
        );
        Ok(service.clone())
    }

    /// Remove a service with all of its pools and nodes
    pub fn delete_service(&self, name: &str) -> CoreResult<()> {
        let mut services = self.services.write();
        let idx = services
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| CoreError::NotFound(format!("service {}", name)))?;

        services.remove(idx);
        info!("Deleted service {}", name);
        Ok(())
    }

    // ==================== Pools ====================

    /// The fixed pool names of a service
    pub fn list_pools(&self, service: &str) -> CoreResult<Vec<PoolKind>> {
        let services = self.services.read();
        find_service(&services, service)?;
        Ok(PoolKind::ALL.to_vec())
    }

    pub fn get_pool(&self, service: &str, kind: PoolKind) -> CoreResult<Pool> {
        let services = self.services.read();
        find_pool(find_service(&services, service)?, kind).cloned()
    }

    /// Replace a pool's pattern and policy. A deleted pool is recreated
    /// empty with the given settings.
    pub fn update_pool(&self, service: &str, kind: PoolKind, update: UpdatePool) -> CoreResult<Pool> {
        let mut services = self.services.write();
        let svc = find_service_mut(&mut services, service)?;

        let slot = svc.pools.slot_mut(kind);
        let pool = match slot.take() {
            Some(mut pool) => {
                pool.pattern = update.pattern;
                pool.lb_policy = update.lb_policy;
                pool
            }
            None => {
                info!("Recreating pool {} of service {}", kind, service);
                Pool::new(update.pattern, update.lb_policy)
            }
        };
        let pool = slot.insert(pool);

        info!(
            "Updated pool {} of service {} (policy: {})",
            kind,
            service,
            pool.lb_policy.as_str()
        );
        Ok(pool.clone())
    }

    /// Empty a pool slot; routing treats the slot as absent afterwards
    pub fn delete_pool(&self, service: &str, kind: PoolKind) -> CoreResult<()> {
        let mut services = self.services.write();
        let slot = find_service_mut(&mut services, service)?.pools.slot_mut(kind);

        if slot.take().is_none() {
            return Err(pool_not_found(service, kind));
        }

        info!("Deleted pool {} of service {}", kind, service);
        Ok(())
    }

    // ==================== Nodes ====================

    pub fn list_nodes(&self, service: &str, kind: PoolKind) -> CoreResult<Vec<Node>> {
        let services = self.services.read();
        Ok(find_pool(find_service(&services, service)?, kind)?.nodes.clone())
    }

    /// Register a node. It starts with no connections, and `unloading` is
    /// stored as `off`.
    pub fn create_node(&self, service: &str, kind: PoolKind, new: NewNode) -> CoreResult<Node> {
        if new.name.is_empty() {
            return Err(CoreError::BadRequest("empty node name".to_string()));
        }
        if new.host.is_empty() {
            return Err(CoreError::BadRequest("empty node host".to_string()));
        }
        validate_weight(new.weight)?;

        let mut services = self.services.write();
        let pool = find_pool_mut(find_service_mut(&mut services, service)?, kind)?;

        if pool.node(&new.name).is_some() {
            return Err(CoreError::Conflict(format!("node {}", new.name)));
        }

        let node = Node::new(new.name, new.host, new.status, new.weight);
        info!(
            "Added node {} ({}) to pool {} of service {} with status {}",
            node.name, node.host, kind, service, node.status
        );
        pool.nodes.push(node.clone());
        Ok(node)
    }

    pub fn get_node(&self, service: &str, kind: PoolKind, name: &str) -> CoreResult<Node> {
        let services = self.services.read();
        find_pool(find_service(&services, service)?, kind)?
            .node(name)
            .cloned()
            .ok_or_else(|| node_not_found(name))
    }

    /// Apply a new weight and/or status. Setting `unloading` on a node with
    /// no connections in flight moves it straight to `off`.
    pub fn update_node(
        &self,
        service: &str,
        kind: PoolKind,
        name: &str,
        update: UpdateNode,
    ) -> CoreResult<Node> {
        if let Some(weight) = update.weight {
            validate_weight(weight)?;
        }

        let mut services = self.services.write();
        let node = find_pool_mut(find_service_mut(&mut services, service)?, kind)?
            .node_mut(name)
            .ok_or_else(|| node_not_found(name))?;

        if let Some(weight) = update.weight {
            node.weight = weight;
        }
        if let Some(status) = update.status {
            node.set_status(status);
        }

        info!(
            "Updated node {} in pool {} of service {}: status {}, weight {}, {} in flight",
            name, kind, service, node.status, node.weight, node.conn_num
        );
        Ok(node.clone())
    }

    pub fn delete_node(&self, service: &str, kind: PoolKind, name: &str) -> CoreResult<()> {
        let mut services = self.services.write();
        let pool = find_pool_mut(find_service_mut(&mut services, service)?, kind)?;

        let idx = pool
            .nodes
            .iter()
            .position(|n| n.name == name)
            .ok_or_else(|| node_not_found(name))?;

        let node = pool.nodes.remove(idx);
        info!(
            "Deleted node {} from pool {} of service {} ({} in flight)",
            name, kind, service, node.conn_num
        );
        Ok(())
    }

    // ==================== Data plane ====================

    #[cfg(test)]
    fn lookup(&self, request: &RouteRequest<'_>) -> Option<NodeTarget> {
        let services = self.services.read();
        let (svc_idx, kind, node_idx) = resolve(&services, request)?;
        let service = &services[svc_idx];
        let node = &service.pools.get(kind)?.nodes[node_idx];
        Some(NodeTarget::new(&service.name, kind, node))
    }

    /// Resolve a request to a node and count a new connection on it.
    ///
    /// Resolution and the increment happen under one write lock, so the node
    /// cannot be drained or removed between being picked and being counted.
    /// The connection is released when the returned lease is dropped.
    pub fn acquire(&self, request: &RouteRequest<'_>) -> Option<ConnectionLease> {
        let mut services = self.services.write();
        let (svc_idx, kind, node_idx) = resolve(&services, request)?;

        let service = &mut services[svc_idx];
        let service_name = service.name.clone();
        let node = &mut service.pools.get_mut(kind)?.nodes[node_idx];
        node.acquire();

        debug!(
            "Routed {}{} to node {} ({}) in pool {} of service {}, {} in flight",
            request.host, request.path, node.name, node.host, kind, service_name, node.conn_num
        );

        let target = NodeTarget::new(&service_name, kind, node);
        Some(ConnectionLease::new(self.clone(), target))
    }

    /// Count a finished connection. Only leases call this, once each.
    pub(crate) fn release(&self, target: &NodeTarget) {
        let mut services = self.services.write();

        let node = services
            .iter_mut()
            .find(|s| s.name == target.service)
            .and_then(|s| s.pools.get_mut(target.pool))
            .and_then(|p| p.nodes.iter_mut().find(|n| n.instance == target.instance));

        match node {
            Some(node) => {
                if node.release() {
                    info!(
                        "Node {} in pool {} of service {} drained, now off",
                        node.name, target.pool, target.service
                    );
                }
            }
            None => debug!(
                "Node {} in pool {} of service {} was removed while serving",
                target.node, target.pool, target.service
            ),
        }
    }
}

/// Run both routing stages and the node pick against a locked snapshot
fn resolve(services: &[Service], request: &RouteRequest<'_>) -> Option<(usize, PoolKind, usize)> {
    let Some(svc_idx) = resolve_service(services, request) else {
        debug!("No service for {}{}", request.host, request.path);
        return None;
    };

    let service = &services[svc_idx];
    let Some(kind) = select_pool(service, request.headers) else {
        debug!("Service {} has no pool to serve from", service.name);
        return None;
    };

    let node_idx = service.pools.get(kind)?.pick_index();
    if node_idx.is_none() {
        debug!(
            "No available node in pool {} of service {}",
            kind, service.name
        );
    }

    Some((svc_idx, kind, node_idx?))
}

fn find_service<'s>(services: &'s [Service], name: &str) -> CoreResult<&'s Service> {
    services
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| CoreError::NotFound(format!("service {}", name)))
}

fn find_service_mut<'s>(services: &'s mut [Service], name: &str) -> CoreResult<&'s mut Service> {
    services
        .iter_mut()
        .find(|s| s.name == name)
        .ok_or_else(|| CoreError::NotFound(format!("service {}", name)))
}

fn find_pool(service: &Service, kind: PoolKind) -> CoreResult<&Pool> {
    service
        .pools
        .get(kind)
        .ok_or_else(|| pool_not_found(&service.name, kind))
}

fn find_pool_mut(service: &mut Service, kind: PoolKind) -> CoreResult<&mut Pool> {
    let name = &service.name;
    service
        .pools
        .get_mut(kind)
        .ok_or_else(|| pool_not_found(name, kind))
}

fn pool_not_found(service: &str, kind: PoolKind) -> CoreError {
    CoreError::NotFound(format!("pool {} of service {}", kind, service))
}

fn node_not_found(name: &str) -> CoreError {
    CoreError::NotFound(format!("node {}", name))
}

fn validate_weight(weight: u8) -> CoreResult<()> {
    if !(MIN_WEIGHT..=MAX_WEIGHT).contains(&weight) {
        return Err(CoreError::BadRequest(format!(
            "node weight must be between {} and {}",
            MIN_WEIGHT, MAX_WEIGHT
        )));
    }
    Ok(())
}
