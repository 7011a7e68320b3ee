pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod messages;
pub mod queue;
pub mod transport;
pub mod types;
pub mod util;

pub mod election_state;
pub mod node;
pub mod sink;
pub mod traffic;
