use std::ops::Range;
use std::time::Duration;

use crate::directory::PeerDirectory;
use crate::types::NodeId;

/// Leader every node believes in before the first election.
pub const DEFAULT_LEADER_ID: NodeId = 4;

pub const DEFAULT_ELECTION_PORT: u16 = 80;

pub const DEFAULT_PEER_PREFIX: &str = "peer-";

pub const DEFAULT_SINK_ADDRESS: &str = "server:80";

pub const DEFAULT_SINK_FILE: &str = "files/logs.txt";

pub const DEFAULT_IP: &str = "127.0.0.1";

// ticks are randomized to keep nodes from sending in lockstep
pub const DEFAULT_TRAFFIC_INTERVAL: Range<Duration> = Duration::from_secs(1)..Duration::from_secs(11);

pub const DEFAULT_TRAFFIC_LIMIT: u64 = 1000;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a reader waits for more bytes of a frame that was not terminated by a newline.
pub const DEFAULT_FRAME_IDLE_TIMEOUT: Duration = Duration::from_millis(250);

/// How long a listener waits for an accepted connection to deliver its frame.
pub const DEFAULT_FRAME_READ_TIMEOUT: Duration = Duration::from_secs(5);

pub const MAX_FRAME_LEN: u64 = 2048;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub reply_timeout: Duration,
    pub frame_idle_timeout: Duration,
    pub frame_read_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            frame_idle_timeout: DEFAULT_FRAME_IDLE_TIMEOUT,
            frame_read_timeout: DEFAULT_FRAME_READ_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrafficConfig {
    pub interval: Range<Duration>,
    /// `None` keeps generating for the whole process lifetime.
    pub limit: Option<u64>,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_TRAFFIC_INTERVAL,
            limit: Some(DEFAULT_TRAFFIC_LIMIT),
        }
    }
}

/// Everything a node needs to know about itself and the cluster at startup.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub node_id: NodeId,
    pub membership: Vec<NodeId>,
    pub default_leader: NodeId,
    pub directory: PeerDirectory,
    pub sink_address: String,
    pub hostname: String,
    pub ip: String,
    pub traffic: TrafficConfig,
}

impl NodeConfig {
    pub fn new(node_id: NodeId, membership: Vec<NodeId>) -> Self {
        Self {
            node_id,
            membership,
            default_leader: DEFAULT_LEADER_ID,
            directory: PeerDirectory::default(),
            sink_address: DEFAULT_SINK_ADDRESS.to_string(),
            hostname: format!("{DEFAULT_PEER_PREFIX}{node_id}"),
            ip: DEFAULT_IP.to_string(),
            traffic: TrafficConfig::default(),
        }
    }

    pub fn with_default_leader(mut self, leader: NodeId) -> Self {
        self.default_leader = leader;
        self
    }

    pub fn with_directory(mut self, directory: PeerDirectory) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_sink_address(mut self, address: impl Into<String>) -> Self {
        self.sink_address = address.into();
        self
    }

    pub fn with_traffic(mut self, traffic: TrafficConfig) -> Self {
        self.traffic = traffic;
        self
    }
}
