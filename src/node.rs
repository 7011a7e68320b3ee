use std::sync::Arc;

use futures::future::join_all;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info_span, Instrument};

use crate::config::{NodeConfig, TransportConfig};
use crate::election_state::{ElectionSnapshot, ElectionState, SharedElection, Step};
use crate::error::TransportError;
use crate::messages::ballot::Ballot;
use crate::messages::{decode, Message};
use crate::queue::{pending_send_queue, PendingReceiver, PendingSender};
use crate::traffic::traffic_loop;
use crate::transport::{serve, FrameHandler, Transport};
use crate::types::NodeId;

/// One member of the ring: election state, pending-send queue and the transport to reach peers.
pub struct NodeService<T> {
    config: NodeConfig,
    election: SharedElection,
    queue: PendingSender,
    // taken once by the drain loop
    queue_receiver: Mutex<Option<PendingReceiver>>,
    transport: T,
}

impl<T> NodeService<T>
where
    T: Transport,
{
    pub fn new(config: NodeConfig, transport: T) -> Self {
        let election = SharedElection::new(ElectionState::new(
            config.node_id,
            config.membership.clone(),
            config.default_leader,
            config.directory.clone(),
        ));
        let (queue, queue_receiver) = pending_send_queue();

        Self {
            config,
            election,
            queue,
            queue_receiver: Mutex::new(Some(queue_receiver)),
            transport,
        }
    }

    pub fn id(&self) -> NodeId {
        self.config.node_id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn snapshot(&self) -> ElectionSnapshot {
        self.election.snapshot().await
    }

    /// Decodes a frame and applies it to the election state.
    ///
    /// Only in-memory work happens here; the returned [`Step`] holds whatever must be sent
    /// afterwards (see [`NodeService::execute`]).
    #[tracing::instrument(level = "trace", skip(self), fields(node = self.config.node_id))]
    pub async fn handle_frame(&self, frame: &str) -> Step {
        let message = match decode(frame).and_then(Message::try_from) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, frame, "dropping frame");
                return Step::Idle;
            }
        };

        tracing::debug!(?message, "received");

        match message {
            Message::Save(record) => {
                self.accept_save(record).await;
                Step::Idle
            }
            Message::Election(ballot) => self.election.relay(ballot).await,
            Message::Leader(leader) => {
                self.election.adopt(leader).await;
                Step::Idle
            }
        }
    }

    // the leadership check and the push happen under the same lock
    async fn accept_save(&self, record: String) {
        let queue = &self.queue;
        let accepted = self
            .election
            .with(|state| {
                if state.is_elected_self() {
                    queue.enqueue(record);
                    true
                } else {
                    false
                }
            })
            .await;

        if !accepted {
            tracing::debug!("not the leader, ignoring SAVE");
        }
    }

    /// Starts an election unless one is already running.
    pub async fn start_election(&self, suspect: Option<NodeId>) {
        let step = self.election.initiate(suspect).await;
        self.execute(step).await;
    }

    /// Performs the network side of a transition. Never called with the election lock held.
    pub async fn execute(&self, mut step: Step) {
        loop {
            match step {
                Step::Idle => return,
                Step::Forward { to, ballot } => {
                    let frame = Message::Election(ballot.clone()).encode();
                    match self.send_to_peer(to, &frame).await {
                        Ok(()) => {
                            tracing::debug!(to, %ballot, "ballot forwarded");
                            return;
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, to, "next hop unreachable, skipping it");
                            step = self.election.skip_unreachable(to, ballot).await;
                        }
                    }
                }
                Step::Announce {
                    winner,
                    recipients,
                    ballot,
                } => {
                    if self.announce(winner, recipients, &ballot).await {
                        return;
                    }
                    // everybody else is about to follow a dead leader
                    step = self.election.initiate(Some(winner)).await;
                }
            }
        }
    }

    /// Dials every recipient, returns `false` if the winner itself could not be reached.
    async fn announce(&self, winner: NodeId, recipients: Vec<NodeId>, ballot: &Ballot) -> bool {
        tracing::info!(winner, %ballot, "announcing the new leader");
        let frame = Message::Leader(winner).encode();

        let deliveries = recipients.into_iter().map(|recipient| {
            let frame = frame.as_str();
            async move { (recipient, self.send_to_peer(recipient, frame).await) }
        });

        let mut winner_reachable = true;
        for (recipient, result) in join_all(deliveries).await {
            if let Err(err) = result {
                tracing::warn!(error = %err, recipient, "leader announcement lost");
                winner_reachable &= recipient != winner;
            }
        }
        winner_reachable
    }

    async fn send_to_peer(&self, peer: NodeId, frame: &str) -> Result<(), TransportError> {
        let Some(address) = self.config.directory.address_of(peer) else {
            return Err(TransportError::connect(
                &format!("node {peer}"),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no address for this node"),
            ));
        };
        self.transport.send(&address, frame, true).await.map(|_| ())
    }

    /// Sends a SAVE record to the believed leader; a leader that does not answer triggers an
    /// election. Returns whether the record was delivered.
    pub async fn send_to_leader(&self, record: &str) -> bool {
        let leader = self.election.snapshot().await.believed_leader;
        let frame = Message::Save(record.to_string()).encode();

        match self.send_to_peer(leader, &frame).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, leader, "leader unreachable");
                self.start_election(Some(leader)).await;
                false
            }
        }
    }

    /// Pops queued SAVE payloads for the process lifetime.
    pub async fn drain_loop(self: Arc<Self>) {
        let Some(mut queue) = self.queue_receiver.lock().await.take() else {
            tracing::error!("drain loop already running");
            return;
        };

        while let Some(payload) = queue.dequeue().await {
            self.drain_one(payload).await;
        }
    }

    async fn drain_one(&self, payload: String) {
        // leadership is read at pop time, it may have moved since the payload was queued
        let snapshot = self.election.snapshot().await;

        if snapshot.is_elected_self {
            if let Err(err) = self.transport.send(&self.config.sink_address, &payload, true).await {
                tracing::warn!(error = %err, "log sink unreachable, record dropped");
            } else {
                tracing::trace!("record handed to the log sink");
            }
        } else {
            tracing::debug!(leader = snapshot.believed_leader, "no longer leader, forwarding record");
            self.send_to_leader(&payload).await;
        }
    }
}

impl<T> FrameHandler for NodeService<T>
where
    T: Transport,
{
    type FollowUp = Step;

    async fn on_frame(&self, frame: String) -> Step {
        self.handle_frame(&frame).await
    }

    async fn follow_up(&self, step: Step) {
        self.execute(step).await;
    }
}

/// The long-lived tasks of a node. Dropping it stops them.
pub struct RunningNode<T> {
    pub service: Arc<NodeService<T>>,
    handles: Vec<JoinHandle<()>>,
}

impl<T> RunningNode<T> {
    pub fn shutdown(self) {
        drop(self);
    }
}

impl<T> Drop for RunningNode<T> {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// Spawns the listener, drain and traffic tasks of a node on an already bound listener.
pub fn spawn_node<T>(config: NodeConfig, transport: T, listener: TcpListener, transport_config: TransportConfig) -> RunningNode<T>
where
    T: Transport,
{
    let id = config.node_id;
    let service = Arc::new(NodeService::new(config, transport));

    let listener_task = tokio::spawn(
        serve(listener, Arc::clone(&service), transport_config).instrument(info_span!("node", id)),
    );
    let drain_task = tokio::spawn(Arc::clone(&service).drain_loop().instrument(info_span!("node", id)));
    let traffic_task = tokio::spawn(traffic_loop(Arc::clone(&service)).instrument(info_span!("node", id)));

    tracing::info!(id, "node started");

    RunningNode {
        service,
        handles: vec![listener_task, drain_task, traffic_task],
    }
}
