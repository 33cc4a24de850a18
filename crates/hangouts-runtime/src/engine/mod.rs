//! Engine Module
//!
//! - `state`: engine state, statistics and the synchronous step functions
//! - `handlers`: command and event handlers
//! - `task`: the async loop that feeds the state from its channels
//!
//! All durable and projection writes happen inside the engine task, one
//! command or event at a time.

pub mod handlers;
pub mod state;
pub mod task;

pub use handlers::{CommandHandlers, EventHandlers};
pub use state::{EngineState, EngineStats, Step};
pub use task::EngineTask;
