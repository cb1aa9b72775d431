//! Occlusion query state machine.
//!
//! ```text
//! Idle --begin--> Pending --end--> Ended --poll(ready)--> Complete
//!   ^                                 |                      |
//!   +------------- begin (reuse) -----+----------------------+
//! ```
//!
//! Completion is only ever observed by polling; nothing here blocks.

use crate::error::{GraphicsError, GraphicsResult};

/// Lifecycle state of an occlusion query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryState {
    /// Never begun.
    #[default]
    Idle,
    /// Between `begin` and `end`; samples are being counted.
    Pending,
    /// Ended; the result is not yet known to be ready.
    Ended,
    /// The result has been observed and can be read.
    Complete,
}

/// Host-side bookkeeping for one occlusion query.
#[derive(Debug, Clone, Default)]
pub struct OcclusionQuery {
    state: QueryState,
    pixel_count: u64,
}

impl OcclusionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Start counting. Fails if the query is already pending.
    pub fn begin(&mut self) -> GraphicsResult<()> {
        if self.state == QueryState::Pending {
            return Err(GraphicsError::PreconditionViolation(
                "query begun twice without an intervening end".into(),
            ));
        }
        self.state = QueryState::Pending;
        self.pixel_count = 0;
        Ok(())
    }

    /// Stop counting. Fails unless the query is pending.
    pub fn end(&mut self) -> GraphicsResult<()> {
        if self.state != QueryState::Pending {
            return Err(GraphicsError::PreconditionViolation(format!(
                "query ended while {:?}",
                self.state
            )));
        }
        self.state = QueryState::Ended;
        Ok(())
    }

    /// Returns true if the result must be polled from the backend.
    pub fn awaiting_result(&self) -> bool {
        self.state == QueryState::Ended
    }

    /// Feed a backend poll result. `Some(count)` completes an ended query.
    /// Returns whether the query is complete.
    pub fn observe(&mut self, result: Option<u64>) -> bool {
        if let (QueryState::Ended, Some(count)) = (self.state, result) {
            self.pixel_count = count;
            self.state = QueryState::Complete;
        }
        self.state == QueryState::Complete
    }

    /// Number of samples that passed depth/stencil testing. Only valid once
    /// the query is complete.
    pub fn pixel_count(&self) -> GraphicsResult<u64> {
        if self.state != QueryState::Complete {
            return Err(GraphicsError::PreconditionViolation(format!(
                "query pixel count read while {:?}",
                self.state
            )));
        }
        Ok(self.pixel_count)
    }
}
