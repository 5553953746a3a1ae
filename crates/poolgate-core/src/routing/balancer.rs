//! Node selection within a pool

use rand::Rng;
use tracing::debug;

use crate::model::{LbPolicy, Node, Pool};

impl Pool {
    /// Pick a node for a new request, or `None` when no node is available.
    pub fn pick(&self) -> Option<&Node> {
        self.pick_index().map(|idx| &self.nodes[idx])
    }

    pub(crate) fn pick_index(&self) -> Option<usize> {
        let available: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_available())
            .map(|(idx, _)| idx)
            .collect();

        if available.is_empty() {
            return None;
        }

        match &self.lb_policy {
            LbPolicy::Random => Some(available[rand::rng().random_range(0..available.len())]),
            LbPolicy::Unsupported(name) => {
                debug!("Load-balancing policy {} is not implemented", name);
                None
            }
        }
    }
}
