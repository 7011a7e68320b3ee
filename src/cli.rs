use std::net::SocketAddr;
use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{
    NodeConfig, TrafficConfig, TransportConfig, DEFAULT_ELECTION_PORT, DEFAULT_IP, DEFAULT_LEADER_ID,
    DEFAULT_PEER_PREFIX, DEFAULT_SINK_ADDRESS, DEFAULT_SINK_FILE, DEFAULT_TRAFFIC_LIMIT,
};
use crate::directory::PeerDirectory;
use crate::types::NodeId;
use crate::util::{parse_interval, parse_peer, peer_table};

/// A member of the election ring.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct NodeArgs {
    /// Id of this node.
    #[arg(long)]
    pub id: NodeId,

    /// Every node of the ring, comma separated, in ring order.
    #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,5")]
    pub members: Vec<NodeId>,

    /// Leader assumed before the first election.
    #[arg(long, default_value_t = DEFAULT_LEADER_ID)]
    pub default_leader: NodeId,

    /// Address the election listener binds to. Defaults to 0.0.0.0 on the election port.
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Port every peer listens on under the naming rule.
    #[arg(long, default_value_t = DEFAULT_ELECTION_PORT)]
    pub port: u16,

    /// Peer host names are this prefix followed by the node id.
    #[arg(long, default_value = DEFAULT_PEER_PREFIX)]
    pub peer_prefix: String,

    /// Static peer address, `<id>=<host:port>`. Repeat for every member; replaces the naming rule.
    #[arg(long = "peer", value_parser = parse_peer)]
    pub peers: Vec<(NodeId, String)>,

    /// Address of the log sink.
    #[arg(long, default_value = DEFAULT_SINK_ADDRESS)]
    pub sink: String,

    /// Host name reported in SAVE records. Defaults to the peer name of this node.
    #[arg(long)]
    pub hostname: Option<String>,

    /// IP reported in SAVE records.
    #[arg(long, default_value = DEFAULT_IP)]
    pub ip: String,

    /// Pause between generated records in milliseconds, `<min>..<max>` or a fixed value.
    #[arg(long, value_parser = parse_interval, default_value = "1000..11000")]
    pub traffic_interval: Range<Duration>,

    /// Number of records to generate; 0 generates forever.
    #[arg(long, default_value_t = DEFAULT_TRAFFIC_LIMIT)]
    pub traffic_limit: u64,

    /// Start an election as soon as the listener is up.
    #[arg(long)]
    pub elect_on_start: bool,
}

impl NodeArgs {
    pub fn listen_address(&self) -> SocketAddr {
        self.listen.unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], self.port)))
    }

    pub fn node_config(&self) -> NodeConfig {
        let directory = if self.peers.is_empty() {
            PeerDirectory::naming(self.peer_prefix.clone(), self.port)
        } else {
            PeerDirectory::from(peer_table(&self.peers))
        };

        let mut config = NodeConfig::new(self.id, self.members.clone())
            .with_default_leader(self.default_leader)
            .with_directory(directory)
            .with_sink_address(self.sink.clone())
            .with_traffic(TrafficConfig {
                interval: self.traffic_interval.clone(),
                limit: (self.traffic_limit > 0).then_some(self.traffic_limit),
            });
        config.hostname = self
            .hostname
            .clone()
            .unwrap_or_else(|| format!("{}{}", self.peer_prefix, self.id));
        config.ip = self.ip.clone();
        config
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::default()
    }
}

/// Stores the SAVE records handed over by the ring leader.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct SinkArgs {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:80")]
    pub listen: SocketAddr,

    /// File the records are appended to.
    #[arg(long, default_value = DEFAULT_SINK_FILE)]
    pub file: PathBuf,
}
