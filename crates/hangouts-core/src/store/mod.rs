//! Hangout Store
//!
//! Owns the projection and applies actions to it through [`reduce`].

pub mod action;
pub mod projection;

pub use action::Action;
pub use projection::{reduce, Projection};

use tracing::trace;

/// The single authoritative in-memory projection
#[derive(Debug, Default)]
pub struct HangoutStore {
    state: Projection,
    dispatched: u64,
}

impl HangoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&mut self, action: Action) {
        trace!(action = action.name(), "dispatch");
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, action);
        self.dispatched += 1;
    }

    pub fn state(&self) -> &Projection {
        &self.state
    }

    /// Number of actions applied so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }
}
