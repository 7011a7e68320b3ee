/// Identifier of a node in the static membership.
pub type NodeId = u32;
