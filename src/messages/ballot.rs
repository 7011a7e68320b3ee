use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use itertools::Itertools;

use crate::error::FrameError;
use crate::types::NodeId;

/// Ids collected while an ELECTION message travels around the ring, in propagation order.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Ballot(Vec<NodeId>);

impl Ballot {
    /// A fresh ballot, holding only the node that starts the election.
    pub fn started_by(originator: NodeId) -> Self {
        Self(vec![originator])
    }

    pub fn originator(&self) -> Option<NodeId> {
        self.0.first().copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.0.contains(&id)
    }

    pub fn occurrences(&self, id: NodeId) -> usize {
        self.0.iter().filter(|voter| **voter == id).count()
    }

    pub fn push(&mut self, id: NodeId) {
        self.0.push(id);
    }

    /// Highest id in the ballot: the bully tie-break.
    pub fn winner(&self) -> Option<NodeId> {
        self.0.iter().max().copied()
    }

    /// Distinct ids, in the order they first voted.
    pub fn voters(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.iter().copied().unique()
    }

    /// Closes the ring back to its originator, which then appears exactly twice.
    pub fn closed(mut self) -> Self {
        if let Some(originator) = self.originator() {
            if self.0.len() == 1 || self.0.last() != Some(&originator) {
                self.0.push(originator);
            }
        }
        self
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<NodeId>> for Ballot {
    fn from(ids: Vec<NodeId>) -> Self {
        Self(ids)
    }
}

impl Display for Ballot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join(","))
    }
}

impl Debug for Ballot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Ballot [{self}]")
    }
}

impl FromStr for Ballot {
    type Err = FrameError;

    fn from_str(body: &str) -> Result<Self, Self::Err> {
        let ids = body
            .split(',')
            .map(|id| id.trim().parse::<NodeId>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| FrameError::Malformed(format!("bad ballot {body:?}")))?;

        Ok(Self(ids))
    }
}
