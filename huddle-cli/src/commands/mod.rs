//! CLI command implementations

pub mod chat;
pub mod roster;

pub use chat::ChatArgs;
pub use roster::RosterArgs;

use huddle_core::Topology;

/// Parse a topology name for clap
pub(crate) fn parse_topology(s: &str) -> Result<Topology, String> {
    s.parse::<Topology>()
}
