//! Seed configuration for the registry
//!
//! These types describe services, pools and nodes declared in the config
//! file. The file itself is loaded by the binary; this module only defines
//! the `[[services]]` shape and how it is applied to a [`Registry`].

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CoreResult;
use crate::model::{LbPolicy, NodeStatus, Pattern, PoolKind};
use crate::registry::{NewNode, NewService, Registry, UpdatePool};

/// A service declared in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    /// Exact hostname; empty is the catch-all
    #[serde(default)]
    pub host: String,
    /// Path prefix
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub pools: PoolsConfig,
}

/// Per-pool settings of a seeded service. Pools that are not listed keep
/// their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolsConfig {
    #[serde(default)]
    pub prod: Option<PoolConfig>,
    #[serde(default)]
    pub gray: Option<PoolConfig>,
    #[serde(default)]
    pub debug: Option<PoolConfig>,
}

impl PoolsConfig {
    fn iter(&self) -> impl Iterator<Item = (PoolKind, &PoolConfig)> {
        [
            (PoolKind::Prod, self.prod.as_ref()),
            (PoolKind::Gray, self.gray.as_ref()),
            (PoolKind::Debug, self.debug.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, pool)| pool.map(|pool| (kind, pool)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default)]
    pub pattern: Option<Pattern>,
    #[serde(default)]
    pub lb_policy: LbPolicy,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    /// `host:port` of the backend
    pub host: String,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default = "default_weight")]
    pub weight: u8,
}

fn default_url() -> String {
    "/".to_string()
}

fn default_weight() -> u8 {
    1
}

/// Register every seeded service through the regular registry operations,
/// so seeds obey the same validation as management requests.
///
/// Returns the number of services created.
pub fn apply_services(registry: &Registry, services: &[ServiceConfig]) -> CoreResult<usize> {
    for service in services {
        registry.create_service(NewService {
            name: service.name.clone(),
            host: service.host.clone(),
            url: service.url.clone(),
        })?;

        for (kind, pool) in service.pools.iter() {
            registry.update_pool(
                &service.name,
                kind,
                UpdatePool {
                    pattern: pool.pattern.clone(),
                    lb_policy: pool.lb_policy.clone(),
                },
            )?;

            for node in &pool.nodes {
                registry.create_node(
                    &service.name,
                    kind,
                    NewNode {
                        name: node.name.clone(),
                        host: node.host.clone(),
                        status: node.status,
                        weight: node.weight,
                    },
                )?;
            }
        }
    }

    if !services.is_empty() {
        info!("Seeded {} service(s) from configuration", services.len());
    }
    Ok(services.len())
}
