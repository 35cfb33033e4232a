//! Group chat orchestration
//!
//! A [`GroupChat`] owns the roster, the transition graph and the history, and
//! drives one serialized turn at a time until the stop condition matches, the
//! round budget runs out, the run is cancelled or a turn fails. Human-proxy
//! turns suspend the run until input is provided.

mod events;
mod graph;
mod session;
mod state;
mod stop;

pub use events::{ChatEvent, EventSink};
pub use graph::{Edge, Topology, TransitionGraph};
pub use session::{GroupChat, GroupChatBuilder, RunOutcome, TurnFailure};
pub use state::{ChatState, Lifecycle};
pub use stop::StopCondition;
