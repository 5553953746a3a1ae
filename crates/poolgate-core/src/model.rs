//! Registry data model
//!
//! A [`Service`] is a virtual host plus path prefix owning exactly three
//! traffic pools (prod, gray, debug). Each [`Pool`] carries an optional
//! routing [`Pattern`], a load-balancing policy and an ordered set of
//! backend [`Node`]s.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

use crate::error::CoreError;

/// Lowest accepted node weight
pub const MIN_WEIGHT: u8 = 1;
/// Highest accepted node weight
pub const MAX_WEIGHT: u8 = 10;

/// Operational status of a node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Eligible for new requests
    On,
    /// Ineligible; drained or intentionally disabled
    #[default]
    Off,
    /// Ineligible for new requests, still serving the ones already assigned
    Unloading,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::On => "on",
            NodeStatus::Off => "off",
            NodeStatus::Unloading => "unloading",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(NodeStatus::On),
            "off" => Ok(NodeStatus::Off),
            "unloading" => Ok(NodeStatus::Unloading),
            _ => Err(CoreError::BadRequest(format!("invalid node status: {}", s))),
        }
    }
}

/// Traffic class of a pool. The set is closed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    Prod,
    Gray,
    Debug,
}

impl PoolKind {
    pub const ALL: [PoolKind; 3] = [PoolKind::Prod, PoolKind::Gray, PoolKind::Debug];

    pub fn as_str(&self) -> &'static str {
        match self {
            PoolKind::Prod => "prod",
            PoolKind::Gray => "gray",
            PoolKind::Debug => "debug",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prod" => Ok(PoolKind::Prod),
            "gray" => Ok(PoolKind::Gray),
            "debug" => Ok(PoolKind::Debug),
            _ => Err(CoreError::NotFound(format!("pool {}", s))),
        }
    }
}

/// Load-balancing policy of a pool
///
/// Only `random` (uniform over nodes that are `on`) is implemented. Any other
/// name is kept as declared and selects no node; node weights are not
/// consulted by any policy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LbPolicy {
    #[default]
    Random,
    Unsupported(String),
}

impl LbPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            LbPolicy::Random => "random",
            LbPolicy::Unsupported(name) => name,
        }
    }
}

impl From<String> for LbPolicy {
    fn from(name: String) -> Self {
        match name.as_str() {
            "" | "random" => LbPolicy::Random,
            _ => LbPolicy::Unsupported(name),
        }
    }
}

impl From<LbPolicy> for String {
    fn from(policy: LbPolicy) -> Self {
        match policy {
            LbPolicy::Random => "random".to_string(),
            LbPolicy::Unsupported(name) => name,
        }
    }
}

/// Kind of condition a pattern evaluates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PatternKind {
    /// Matches when any request header carries the pattern value
    Header,
    /// Declared but not evaluated; never matches
    Unsupported(String),
}

impl From<String> for PatternKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "header" => PatternKind::Header,
            _ => PatternKind::Unsupported(kind),
        }
    }
}

impl From<PatternKind> for String {
    fn from(kind: PatternKind) -> Self {
        match kind {
            PatternKind::Header => "header".to_string(),
            PatternKind::Unsupported(kind) => kind,
        }
    }
}

/// Routing condition that opts a request into a non-default pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub value: String,
}

impl Pattern {
    pub fn header(value: impl Into<String>) -> Self {
        Self {
            kind: PatternKind::Header,
            value: value.into(),
        }
    }
}

/// A single backend instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    /// `host:port` requests are forwarded to
    pub host: String,
    pub status: NodeStatus,
    /// Declared weight (1-10); not consulted by the `random` policy
    pub weight: u8,
    /// Requests currently in flight to this node
    pub conn_num: u64,
    /// Distinguishes this node from a later node registered under the same name
    pub(crate) instance: Uuid,
}

impl Node {
    /// Build a fresh node. A new node cannot start mid-drain, so `unloading`
    /// is stored as `off`, and it always starts with no connections.
    pub(crate) fn new(name: String, host: String, status: NodeStatus, weight: u8) -> Self {
        let status = match status {
            NodeStatus::Unloading => NodeStatus::Off,
            other => other,
        };

        Self {
            name,
            host,
            status,
            weight,
            conn_num: 0,
            instance: Uuid::new_v4(),
        }
    }

    /// Whether the load balancer may hand new requests to this node
    pub fn is_available(&self) -> bool {
        self.status == NodeStatus::On
    }

    /// Assign a status; an idle node asked to unload goes straight to `off`
    pub(crate) fn set_status(&mut self, status: NodeStatus) {
        self.status = status;
        self.complete_drain();
    }

    pub(crate) fn acquire(&mut self) {
        self.conn_num += 1;
    }

    /// Returns true when this release finished a drain
    pub(crate) fn release(&mut self) -> bool {
        if self.conn_num == 0 {
            warn!("Release on node {} with no connections in flight", self.name);
            return false;
        }

        self.conn_num -= 1;
        self.complete_drain()
    }

    fn complete_drain(&mut self) -> bool {
        if self.status == NodeStatus::Unloading && self.conn_num == 0 {
            self.status = NodeStatus::Off;
            return true;
        }
        false
    }
}

/// A traffic class within a service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pool {
    /// Absent means the pool only receives traffic as the prod fallback
    pub pattern: Option<Pattern>,
    pub lb_policy: LbPolicy,
    pub nodes: Vec<Node>,
}

impl Pool {
    pub fn new(pattern: Option<Pattern>, lb_policy: LbPolicy) -> Self {
        Self {
            pattern,
            lb_policy,
            nodes: Vec::new(),
        }
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub(crate) fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }
}

/// The three pool slots of a service. A deleted pool leaves an empty slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pools {
    pub prod: Option<Pool>,
    pub gray: Option<Pool>,
    pub debug: Option<Pool>,
}

impl Default for Pools {
    fn default() -> Self {
        Self {
            prod: Some(Pool::default()),
            gray: Some(Pool::default()),
            debug: Some(Pool::default()),
        }
    }
}

impl Pools {
    pub fn get(&self, kind: PoolKind) -> Option<&Pool> {
        match kind {
            PoolKind::Prod => self.prod.as_ref(),
            PoolKind::Gray => self.gray.as_ref(),
            PoolKind::Debug => self.debug.as_ref(),
        }
    }

    pub(crate) fn get_mut(&mut self, kind: PoolKind) -> Option<&mut Pool> {
        self.slot_mut(kind).as_mut()
    }

    pub(crate) fn slot_mut(&mut self, kind: PoolKind) -> &mut Option<Pool> {
        match kind {
            PoolKind::Prod => &mut self.prod,
            PoolKind::Gray => &mut self.gray,
            PoolKind::Debug => &mut self.debug,
        }
    }
}

/// A virtual host plus path prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    /// Exact hostname to match; empty is the catch-all
    pub host: String,
    /// Path prefix
    pub url: String,
    pub pools: Pools,
}

impl Service {
    /// Create a service with three empty `random` pools
    pub(crate) fn new(name: String, host: String, url: String) -> Self {
        Self {
            name,
            host,
            url: normalize_url(url),
            pools: Pools::default(),
        }
    }
}

/// An empty path prefix means the whole host
pub(crate) fn normalize_url(url: String) -> String {
    if url.is_empty() { "/".to_string() } else { url }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_kind_parsing() {
        assert_eq!("prod".parse::<PoolKind>().unwrap(), PoolKind::Prod);
        assert_eq!("gray".parse::<PoolKind>().unwrap(), PoolKind::Gray);
        assert_eq!("debug".parse::<PoolKind>().unwrap(), PoolKind::Debug);

        let err = "canary".parse::<PoolKind>().unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        assert!("Prod".parse::<PoolKind>().is_err());
    }

    #[test]
    fn test_node_status_parsing() {
        assert_eq!("unloading".parse::<NodeStatus>().unwrap(), NodeStatus::Unloading);
        assert!(matches!(
            "drained".parse::<NodeStatus>(),
            Err(CoreError::BadRequest(_))
        ));
    }

    #[test]
    fn test_lb_policy_keeps_unknown_names() {
        let policy: LbPolicy = serde_json::from_str("\"weighted\"").unwrap();
        assert_eq!(policy, LbPolicy::Unsupported("weighted".to_string()));
        assert_eq!(serde_json::to_string(&policy).unwrap(), "\"weighted\"");

        let policy: LbPolicy = serde_json::from_str("\"\"").unwrap();
        assert_eq!(policy, LbPolicy::Random);
    }

    #[test]
    fn test_pattern_wire_format() {
        let pattern: Pattern =
            serde_json::from_str(r#"{"type": "header", "value": "debug-token"}"#).unwrap();
        assert_eq!(pattern, Pattern::header("debug-token"));

        let pattern: Pattern = serde_json::from_str(r#"{"type": "ip", "value": "10.0.0.1"}"#).unwrap();
        assert_eq!(pattern.kind, PatternKind::Unsupported("ip".to_string()));
    }

    #[test]
    fn test_new_node_cannot_start_unloading() {
        let node = Node::new("n1".into(), "127.0.0.1:1".into(), NodeStatus::Unloading, 1);
        assert_eq!(node.status, NodeStatus::Off);
        assert_eq!(node.conn_num, 0);
    }

    #[test]
    fn test_drain_transitions() {
        let mut node = Node::new("n1".into(), "127.0.0.1:1".into(), NodeStatus::On, 1);
        node.acquire();
        node.acquire();

        node.set_status(NodeStatus::Unloading);
        assert_eq!(node.status, NodeStatus::Unloading);
        assert!(!node.is_available());

        assert!(!node.release());
        assert_eq!(node.status, NodeStatus::Unloading);
        assert!(node.release());
        assert_eq!(node.status, NodeStatus::Off);
        assert_eq!(node.conn_num, 0);

        // Extra release never underflows
        assert!(!node.release());
        assert_eq!(node.conn_num, 0);
    }

    #[test]
    fn test_idle_node_unloads_to_off() {
        let mut node = Node::new("n1".into(), "127.0.0.1:1".into(), NodeStatus::On, 1);
        node.set_status(NodeStatus::Unloading);
        assert_eq!(node.status, NodeStatus::Off);
    }

    #[test]
    fn test_service_defaults() {
        let service = Service::new("web".into(), String::new(), String::new());
        assert_eq!(service.url, "/");
        for kind in PoolKind::ALL {
            let pool = service.pools.get(kind).unwrap();
            assert_eq!(pool.lb_policy, LbPolicy::Random);
            assert!(pool.pattern.is_none());
            assert!(pool.nodes.is_empty());
        }
    }
}
