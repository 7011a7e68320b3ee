use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter, Result};

use tokio::sync::Mutex;

use crate::directory::PeerDirectory;
use crate::messages::ballot::Ballot;
use crate::types::NodeId;

/// Network work left to do once a transition has been applied and the lock released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Idle,
    /// Pass the (already extended) ballot to the next node of the ring.
    Forward { to: NodeId, ballot: Ballot },
    /// The ballot is complete and this node has already adopted `winner`; tell the other voters.
    Announce {
        winner: NodeId,
        recipients: Vec<NodeId>,
        ballot: Ballot,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionPhase {
    Idle,
    ElectionStarted,
}

/// Copy of the election state taken under the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionSnapshot {
    pub me: NodeId,
    pub believed_leader: NodeId,
    pub leader_address: Option<String>,
    pub is_elected_self: bool,
    pub election_in_progress: bool,
}

impl ElectionSnapshot {
    pub fn phase(&self) -> ElectionPhase {
        if self.election_in_progress {
            ElectionPhase::ElectionStarted
        } else {
            ElectionPhase::Idle
        }
    }
}

/// Election bookkeeping of one node.
///
/// Fields are private: every change goes through one of the transitions below, so that
/// `is_elected_self` and `leader_address` can never drift away from `believed_leader`.
pub struct ElectionState {
    me: NodeId,
    membership: Vec<NodeId>,
    directory: PeerDirectory,
    believed_leader: NodeId,
    leader_address: Option<String>,
    is_elected_self: bool,
    election_in_progress: bool,
    // peers found unreachable during the current round, forgotten when the round ends
    excluded: BTreeSet<NodeId>,
}

impl ElectionState {
    pub fn new(me: NodeId, membership: Vec<NodeId>, default_leader: NodeId, directory: PeerDirectory) -> Self {
        let mut state = Self {
            me,
            membership,
            directory,
            believed_leader: default_leader,
            leader_address: None,
            is_elected_self: false,
            election_in_progress: false,
            excluded: BTreeSet::new(),
        };
        state.set_leader(default_leader);
        state
    }

    pub fn me(&self) -> NodeId {
        self.me
    }

    pub fn believed_leader(&self) -> NodeId {
        self.believed_leader
    }

    pub fn leader_address(&self) -> Option<&str> {
        self.leader_address.as_deref()
    }

    pub fn is_elected_self(&self) -> bool {
        self.is_elected_self
    }

    pub fn election_in_progress(&self) -> bool {
        self.election_in_progress
    }

    pub fn membership(&self) -> &[NodeId] {
        &self.membership
    }

    pub fn snapshot(&self) -> ElectionSnapshot {
        ElectionSnapshot {
            me: self.me,
            believed_leader: self.believed_leader,
            leader_address: self.leader_address.clone(),
            is_elected_self: self.is_elected_self,
            election_in_progress: self.election_in_progress,
        }
    }

    /// Starts a round with a ballot holding only this node.
    ///
    /// A no-op while a round is already running. `suspect` (usually the leader that stopped
    /// answering) is skipped when choosing the next hop.
    pub fn initiate(&mut self, suspect: Option<NodeId>) -> Step {
        if self.election_in_progress {
            tracing::trace!("election already in progress, not starting another one");
            return Step::Idle;
        }

        self.election_in_progress = true;
        if let Some(suspect) = suspect.filter(|suspect| *suspect != self.me) {
            self.excluded.insert(suspect);
        }

        let ballot = Ballot::started_by(self.me);
        tracing::debug!(%ballot, suspect, "starting an election");
        self.forward_or_decide(ballot)
    }

    /// Handles an incoming ELECTION ballot.
    pub fn relay(&mut self, mut ballot: Ballot) -> Step {
        if ballot.contains(self.me) {
            if !self.election_in_progress {
                tracing::debug!(%ballot, "ballot came back after the round ended, ignoring");
                return Step::Idle;
            }
            // the ring wrapped around to a node that already voted
            tracing::trace!(%ballot, "ballot came back, deciding");
            return self.decide(ballot);
        }

        self.election_in_progress = true;
        ballot.push(self.me);
        self.forward_or_decide(ballot)
    }

    /// Drops an unreachable hop from the current round and picks another one for `ballot`.
    pub fn skip_unreachable(&mut self, unreachable: NodeId, ballot: Ballot) -> Step {
        if !self.election_in_progress {
            tracing::debug!(unreachable, "round already over, dropping the ballot");
            return Step::Idle;
        }

        self.excluded.insert(unreachable);
        self.forward_or_decide(ballot)
    }

    /// Applies a LEADER announcement. Returns `false` when it was ignored because no election
    /// is running (stale or duplicated announcement).
    pub fn adopt(&mut self, leader: NodeId) -> bool {
        if !self.election_in_progress {
            tracing::trace!(leader, "not in an election, ignoring leader announcement");
            return false;
        }

        self.set_leader(leader);
        self.election_in_progress = false;
        self.excluded.clear();

        tracing::info!(
            leader,
            leader_address = ?self.leader_address,
            is_elected_self = self.is_elected_self,
            "new leader adopted"
        );
        true
    }

    fn forward_or_decide(&mut self, ballot: Ballot) -> Step {
        match self.next_hop(&ballot) {
            Some(to) => Step::Forward { to, ballot },
            None => self.decide(ballot),
        }
    }

    fn decide(&mut self, ballot: Ballot) -> Step {
        let ballot = ballot.closed();
        let winner = ballot.winner().unwrap_or(self.me);
        let recipients = ballot.voters().filter(|id| *id != self.me).collect();

        tracing::debug!(%ballot, winner, "ballot complete");
        self.adopt(winner);

        Step::Announce {
            winner,
            recipients,
            ballot,
        }
    }

    /// First node after this one in ring order that has not voted and was not found unreachable.
    fn next_hop(&self, ballot: &Ballot) -> Option<NodeId> {
        let start = self
            .membership
            .iter()
            .position(|id| *id == self.me)
            .map_or(0, |position| position + 1);

        self.membership
            .iter()
            .cycle()
            .skip(start)
            .take(self.membership.len())
            .copied()
            .find(|id| *id != self.me && !ballot.contains(*id) && !self.excluded.contains(id))
    }

    fn set_leader(&mut self, leader: NodeId) {
        self.believed_leader = leader;
        self.is_elected_self = leader == self.me;
        self.leader_address = self.directory.address_of(leader);
    }
}

impl Debug for ElectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_struct("ElectionState")
            .field("me", &self.me)
            .field("believed_leader", &self.believed_leader)
            .field("is_elected_self", &self.is_elected_self)
            .field("election_in_progress", &self.election_in_progress)
            .field("excluded", &self.excluded)
            .finish_non_exhaustive()
    }
}

/// The one lock of a node. Each method holds it for a single transition and never across I/O.
pub struct SharedElection {
    state: Mutex<ElectionState>,
}

impl SharedElection {
    pub fn new(state: ElectionState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub async fn initiate(&self, suspect: Option<NodeId>) -> Step {
        self.state.lock().await.initiate(suspect)
    }

    pub async fn relay(&self, ballot: Ballot) -> Step {
        self.state.lock().await.relay(ballot)
    }

    pub async fn skip_unreachable(&self, unreachable: NodeId, ballot: Ballot) -> Step {
        self.state.lock().await.skip_unreachable(unreachable, ballot)
    }

    pub async fn adopt(&self, leader: NodeId) -> bool {
        self.state.lock().await.adopt(leader)
    }

    pub async fn snapshot(&self) -> ElectionSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Runs `f` with the lock held, for checks that must be atomic with a side effect
    /// (e.g. accepting a SAVE only while leader).
    pub async fn with<R>(&self, f: impl FnOnce(&ElectionState) -> R) -> R {
        f(&*self.state.lock().await)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn state(me: NodeId, leader: NodeId) -> ElectionState {
        ElectionState::new(me, vec![1, 2, 3, 4, 5], leader, PeerDirectory::default())
    }

    #[test]
    fn elected_flag_follows_the_leader() {
        let node = state(4, 4);
        assert!(node.is_elected_self());
        assert_eq!(node.leader_address(), Some("peer-4:80"));

        let node = state(2, 4);
        assert!(!node.is_elected_self());
        assert!(!node.election_in_progress());
    }

    #[test]
    fn initiate_forwards_to_the_next_node() {
        let mut node = state(1, 4);
        let step = node.initiate(None);
        assert_eq!(
            step,
            Step::Forward {
                to: 2,
                ballot: Ballot::from(vec![1])
            }
        );
        assert!(node.election_in_progress());
    }

    #[test]
    fn initiate_twice_is_a_no_op() {
        let mut node = state(1, 4);
        node.initiate(None);
        assert_eq!(node.initiate(None), Step::Idle);
        assert!(node.election_in_progress());
    }

    #[test]
    fn initiate_skips_the_suspected_leader() {
        let mut node = state(3, 4);
        let step = node.initiate(Some(4));
        assert_eq!(
            step,
            Step::Forward {
                to: 5,
                ballot: Ballot::from(vec![3])
            }
        );
    }

    #[test]
    fn ring_wraps_around() {
        let mut node = state(5, 4);
        let step = node.relay(Ballot::from(vec![3, 4]));
        assert_eq!(
            step,
            Step::Forward {
                to: 1,
                ballot: Ballot::from(vec![3, 4, 5])
            }
        );
    }

    #[test]
    fn relay_from_idle_starts_the_round_here() {
        let mut node = state(2, 4);
        node.relay(Ballot::from(vec![1]));
        assert!(node.election_in_progress());
    }

    #[test]
    fn last_voter_decides_for_the_highest_id() {
        let mut node = state(5, 4);
        let step = node.relay(Ballot::from(vec![1, 2, 3, 4]));
        assert_eq!(
            step,
            Step::Announce {
                winner: 5,
                recipients: vec![1, 2, 3, 4],
                ballot: Ballot::from(vec![1, 2, 3, 4, 5, 1]),
            }
        );
        assert!(node.is_elected_self());
        assert!(!node.election_in_progress());
    }

    #[test]
    fn deciding_node_adopts_someone_else() {
        let mut node = ElectionState::new(3, vec![1, 2, 3, 5], 4, PeerDirectory::default());
        let step = node.relay(Ballot::from(vec![5, 1, 2]));
        assert_matches!(step, Step::Announce { winner: 5, ref recipients, .. } if recipients == &vec![5, 1, 2]);
        assert_eq!(node.believed_leader(), 5);
        assert!(!node.is_elected_self());
        assert!(!node.election_in_progress());
    }

    #[test]
    fn own_id_coming_back_terminates() {
        let mut node = state(2, 4);
        node.initiate(None);
        let step = node.relay(Ballot::from(vec![2, 3, 2]));
        assert_matches!(step, Step::Announce { winner: 3, .. });
    }

    #[test]
    fn stale_ballot_after_the_round_is_ignored() {
        let mut node = state(2, 4);
        assert_eq!(node.relay(Ballot::from(vec![2, 3])), Step::Idle);
        assert!(!node.election_in_progress());
        assert_eq!(node.believed_leader(), 4);
    }

    #[test]
    fn unreachable_hop_is_skipped_until_the_round_ends() {
        let mut node = state(1, 4);
        let Step::Forward { to, ballot } = node.initiate(None) else {
            panic!("expected a forward");
        };
        assert_eq!(to, 2);

        let step = node.skip_unreachable(2, ballot);
        assert_eq!(
            step,
            Step::Forward {
                to: 3,
                ballot: Ballot::from(vec![1])
            }
        );

        node.adopt(5);

        // a new round sees the whole membership again
        assert_eq!(
            node.initiate(None),
            Step::Forward {
                to: 2,
                ballot: Ballot::from(vec![1])
            }
        );
    }

    #[test]
    fn lonely_node_elects_itself() {
        let mut node = ElectionState::new(7, vec![7], 1, PeerDirectory::default());
        let step = node.initiate(Some(1));
        assert_matches!(step, Step::Announce { winner: 7, ref recipients, .. } if recipients.is_empty());
        assert!(node.is_elected_self());
    }

    #[test]
    fn everybody_unreachable_elects_the_relay() {
        let mut node = state(2, 4);
        node.initiate(Some(4));
        let mut step = node.skip_unreachable(3, Ballot::from(vec![2]));
        for unreachable in [5, 1] {
            step = match step {
                Step::Forward { to, ballot } => {
                    assert_eq!(to, unreachable);
                    node.skip_unreachable(to, ballot)
                }
                other => other,
            };
        }
        assert_matches!(step, Step::Announce { winner: 2, .. });
        assert!(node.is_elected_self());
    }

    #[test]
    fn adopt_is_idempotent() {
        let mut node = state(2, 4);
        node.initiate(None);

        assert!(node.adopt(5));
        let after_first = node.snapshot();

        assert!(!node.adopt(5));
        assert_eq!(node.snapshot(), after_first);
    }

    #[test]
    fn leader_outside_an_election_is_ignored() {
        let mut node = state(2, 4);
        assert!(!node.adopt(1));
        assert_eq!(node.believed_leader(), 4);
    }

    #[test]
    fn skip_after_the_round_ended_drops_the_ballot() {
        let mut node = state(1, 4);
        node.initiate(None);
        node.adopt(5);
        assert_eq!(node.skip_unreachable(2, Ballot::from(vec![1])), Step::Idle);
    }
}
