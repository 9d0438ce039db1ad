//! Restart orchestration.

mod orchestrator;
mod state;
mod trigger;

pub use orchestrator::*;
pub use state::*;
pub use trigger::*;
