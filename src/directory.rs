use std::collections::BTreeMap;

use crate::config::{DEFAULT_ELECTION_PORT, DEFAULT_PEER_PREFIX};
use crate::types::NodeId;

/// Maps node ids to dialable addresses.
///
/// Deployed clusters use the naming rule `<prefix><id>:<port>`, every node listening on the same
/// election port. Local clusters (and tests) bind ephemeral ports, so they use a static table.
#[derive(Debug, Clone)]
pub enum PeerDirectory {
    Naming { prefix: String, port: u16 },
    Static(BTreeMap<NodeId, String>),
}

impl PeerDirectory {
    pub fn naming(prefix: impl Into<String>, port: u16) -> Self {
        Self::Naming {
            prefix: prefix.into(),
            port,
        }
    }

    pub fn address_of(&self, node_id: NodeId) -> Option<String> {
        match self {
            Self::Naming { prefix, port } => Some(format!("{prefix}{node_id}:{port}")),
            Self::Static(table) => table.get(&node_id).cloned(),
        }
    }
}

impl Default for PeerDirectory {
    fn default() -> Self {
        Self::naming(DEFAULT_PEER_PREFIX, DEFAULT_ELECTION_PORT)
    }
}

impl From<BTreeMap<NodeId, String>> for PeerDirectory {
    fn from(table: BTreeMap<NodeId, String>) -> Self {
        Self::Static(table)
    }
}
