#![allow(dead_code)]

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use ringleader::config::{NodeConfig, TrafficConfig, TransportConfig};
use ringleader::directory::PeerDirectory;
use ringleader::election_state::ElectionSnapshot;
use ringleader::node::{spawn_node, RunningNode};
use ringleader::transport::TcpTransport;
use ringleader::types::NodeId;
use tokio::net::TcpListener;
use tokio::time::{sleep, Instant};

pub fn transport_config() -> TransportConfig {
    TransportConfig {
        connect_timeout: Duration::from_millis(500),
        reply_timeout: Duration::from_millis(500),
        frame_idle_timeout: Duration::from_millis(50),
        frame_read_timeout: Duration::from_secs(1),
    }
}

pub fn no_traffic() -> TrafficConfig {
    TrafficConfig {
        interval: Duration::ZERO..Duration::ZERO,
        limit: Some(0),
    }
}

/// A ring of nodes on loopback, each on its own ephemeral port.
pub struct Cluster {
    pub nodes: BTreeMap<NodeId, RunningNode<TcpTransport>>,
    pub addresses: BTreeMap<NodeId, String>,
}

pub struct ClusterBuilder {
    members: Vec<NodeId>,
    down: Vec<NodeId>,
    default_leader: NodeId,
    sink_address: Option<String>,
    traffic: TrafficConfig,
}

impl ClusterBuilder {
    pub fn new(members: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            members: members.into_iter().collect(),
            down: Vec::new(),
            default_leader: 4,
            sink_address: None,
            traffic: no_traffic(),
        }
    }

    /// The node gets an address nobody listens on.
    pub fn down(mut self, id: NodeId) -> Self {
        self.down.push(id);
        self
    }

    pub fn default_leader(mut self, leader: NodeId) -> Self {
        self.default_leader = leader;
        self
    }

    pub fn sink(mut self, address: impl Into<String>) -> Self {
        self.sink_address = Some(address.into());
        self
    }

    pub fn traffic(mut self, traffic: TrafficConfig) -> Self {
        self.traffic = traffic;
        self
    }

    pub async fn spawn(self) -> Cluster {
        let mut listeners = BTreeMap::new();
        let mut addresses = BTreeMap::new();
        for id in &self.members {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            addresses.insert(*id, listener.local_addr().unwrap().to_string());
            // a dead node keeps its address but the port is closed again
            if !self.down.contains(id) {
                listeners.insert(*id, listener);
            }
        }

        let mut nodes = BTreeMap::new();
        for (id, listener) in listeners {
            let mut config = NodeConfig::new(id, self.members.clone())
                .with_default_leader(self.default_leader)
                .with_directory(PeerDirectory::from(addresses.clone()))
                .with_traffic(self.traffic.clone());
            if let Some(sink) = &self.sink_address {
                config = config.with_sink_address(sink.clone());
            }

            let node = spawn_node(config, TcpTransport::new(transport_config()), listener, transport_config());
            nodes.insert(id, node);
        }

        Cluster { nodes, addresses }
    }
}

impl Cluster {
    pub fn node(&self, id: NodeId) -> &RunningNode<TcpTransport> {
        &self.nodes[&id]
    }

    pub async fn snapshots(&self) -> BTreeMap<NodeId, ElectionSnapshot> {
        let mut snapshots = BTreeMap::new();
        for (id, node) in &self.nodes {
            snapshots.insert(*id, node.service.snapshot().await);
        }
        snapshots
    }

    /// Waits until every live node follows `leader` and no election is running.
    pub async fn settled_on(&self, leader: NodeId) -> bool {
        wait_until(Duration::from_secs(5), || async {
            self.snapshots()
                .await
                .values()
                .all(|snapshot| snapshot.believed_leader == leader && !snapshot.election_in_progress)
        })
        .await
    }
}

pub async fn wait_until<F, Fut>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition().await {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    condition().await
}
