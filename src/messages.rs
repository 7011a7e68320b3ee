pub mod ballot;
pub mod save_record;

use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use crate::error::FrameError;
use crate::messages::ballot::Ballot;
use crate::types::NodeId;

/// Kind token of a wire frame, the part between `<` and `>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Save,
    Election,
    Leader,
}

impl Kind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Save => "SAVE",
            Self::Election => "ELECTION",
            Self::Leader => "LEADER",
        }
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = FrameError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "SAVE" => Ok(Self::Save),
            "ELECTION" => Ok(Self::Election),
            "LEADER" => Ok(Self::Leader),
            other => Err(FrameError::UnroutableKind(other.to_string())),
        }
    }
}

/// Typed decoding of a wire frame `<KIND>body`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub kind: Kind,
    pub body: String,
}

impl Envelope {
    pub fn new(kind: Kind, body: impl Into<String>) -> Self {
        Self {
            kind,
            body: body.into(),
        }
    }

    pub fn encode(&self) -> String {
        encode(self.kind, &self.body)
    }
}

/// Produces `<KIND>body`. Nothing is escaped: a body holding `<` or `>` will be rejected by
/// [`decode`] on the receiving side.
pub fn encode(kind: Kind, body: &str) -> String {
    format!("<{kind}>{body}")
}

/// Splits a frame at its first `>`. The body is kept verbatim, whitespace included.
pub fn decode(raw: &str) -> Result<Envelope, FrameError> {
    let Some((head, body)) = raw.split_once('>') else {
        return Err(FrameError::Malformed(format!("no '>' delimiter in {raw:?}")));
    };

    let Some(token) = head.trim_start().strip_prefix('<') else {
        return Err(FrameError::Malformed(format!("no '<' before the kind in {raw:?}")));
    };

    // a stray delimiter in the body would look like a nested envelope to older peers
    if body.contains(['<', '>']) {
        return Err(FrameError::Malformed(format!("nested delimiter in body {body:?}")));
    }

    let kind = token.trim().parse()?;

    Ok(Envelope::new(kind, body))
}

/// Messages understood by a node, parsed out of an [`Envelope`] body.
#[derive(Clone, PartialEq, Eq)]
pub enum Message {
    Save(String),
    Election(Ballot),
    Leader(NodeId),
}

impl Message {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Save(_) => Kind::Save,
            Self::Election(_) => Kind::Election,
            Self::Leader(_) => Kind::Leader,
        }
    }

    pub fn encode(&self) -> String {
        Envelope::from(self).encode()
    }
}

impl Debug for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Save(record) => write!(f, "Save [{record}]"),
            Self::Election(ballot) => write!(f, "Election [{ballot}]"),
            Self::Leader(leader) => write!(f, "Leader {leader}"),
        }
    }
}

impl TryFrom<Envelope> for Message {
    type Error = FrameError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        match envelope.kind {
            Kind::Save => Ok(Self::Save(envelope.body)),
            Kind::Election => Ok(Self::Election(envelope.body.parse()?)),
            Kind::Leader => {
                let leader = envelope
                    .body
                    .trim()
                    .parse()
                    .map_err(|_| FrameError::Malformed(format!("bad leader id {:?}", envelope.body)))?;
                Ok(Self::Leader(leader))
            }
        }
    }
}

impl From<&Message> for Envelope {
    fn from(message: &Message) -> Self {
        match message {
            Message::Save(record) => Envelope::new(Kind::Save, record.as_str()),
            Message::Election(ballot) => Envelope::new(Kind::Election, ballot.to_string()),
            Message::Leader(leader) => Envelope::new(Kind::Leader, leader.to_string()),
        }
    }
}

impl From<Ballot> for Message {
    fn from(ballot: Ballot) -> Self {
        Self::Election(ballot)
    }
}

impl FromStr for Message {
    type Err = FrameError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        decode(raw)?.try_into()
    }
}
