//! Request lifecycle bookkeeping.
//!
//! ```text
//! idle -> analyzed -> matched -> presented -> installing -> executing -> completed
//!                          |            |                      ^
//!                          |            +----------------------+
//!                          +-----------------------------------+
//! ```
//!
//! Any non-terminal state can be cancelled. Reaching [`MAX_FAILURES`]
//! cumulative failures moves the request to `error`. The decisions that
//! drive these transitions are made outside this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Cumulative failures after which a request ends in `error`.
pub const MAX_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Idle,
    Analyzed,
    Matched,
    Presented,
    Installing,
    Executing,
    Completed,
    Cancelled,
    Error,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Analyzed => "analyzed",
            Self::Matched => "matched",
            Self::Presented => "presented",
            Self::Installing => "installing",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Error)
    }

    /// Whether `self -> to` is a forward edge of the lifecycle.
    pub fn can_advance_to(&self, to: Self) -> bool {
        matches!(
            (*self, to),
            (Self::Idle, Self::Analyzed)
                | (Self::Analyzed, Self::Matched)
                | (Self::Matched, Self::Presented | Self::Executing)
                | (Self::Presented, Self::Installing | Self::Executing)
                | (Self::Installing, Self::Executing)
                | (Self::Executing, Self::Completed)
        )
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: RequestState, to: RequestState },
    #[error("request already finished in state {0}")]
    Terminal(RequestState),
}

/// State of one request as it moves through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLifecycle {
    pub id: Uuid,
    pub state: RequestState,
    pub failures: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for RequestLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestLifecycle {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            state: RequestState::Idle,
            failures: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn advance(&mut self, to: RequestState) -> Result<RequestState, LifecycleError> {
        if self.state.is_terminal() {
            return Err(LifecycleError::Terminal(self.state));
        }
        if !self.state.can_advance_to(to) {
            return Err(LifecycleError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.set_state(to);
        Ok(to)
    }

    /// Records a failed attempt; the state is kept until the limit is hit.
    pub fn record_failure(&mut self) -> Result<RequestState, LifecycleError> {
        if self.state.is_terminal() {
            return Err(LifecycleError::Terminal(self.state));
        }
        self.failures += 1;
        if self.failures >= MAX_FAILURES {
            self.set_state(RequestState::Error);
        } else {
            self.updated_at = Utc::now();
        }
        Ok(self.state)
    }

    pub fn cancel(&mut self) -> Result<RequestState, LifecycleError> {
        if self.state.is_terminal() {
            return Err(LifecycleError::Terminal(self.state));
        }
        self.set_state(RequestState::Cancelled);
        Ok(self.state)
    }

    fn set_state(&mut self, to: RequestState) {
        tracing::debug!(request_id = %self.id, from = %self.state, to = %to, "request state change");
        self.state = to;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_through_presentation_and_install() {
        let mut lifecycle = RequestLifecycle::new();
        for state in [
            RequestState::Analyzed,
            RequestState::Matched,
            RequestState::Presented,
            RequestState::Installing,
            RequestState::Executing,
            RequestState::Completed,
        ] {
            assert_eq!(lifecycle.advance(state).unwrap(), state);
        }
        assert!(lifecycle.state().is_terminal());
    }

    #[test]
    fn matched_can_execute_directly() {
        let mut lifecycle = RequestLifecycle::new();
        lifecycle.advance(RequestState::Analyzed).unwrap();
        lifecycle.advance(RequestState::Matched).unwrap();
        assert!(lifecycle.advance(RequestState::Executing).is_ok());
    }

    #[test]
    fn rejects_skipped_states() {
        let mut lifecycle = RequestLifecycle::new();
        let err = lifecycle.advance(RequestState::Matched).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: RequestState::Idle,
                to: RequestState::Matched,
            }
        );
        assert_eq!(lifecycle.state(), RequestState::Idle);
    }

    #[test]
    fn cancel_from_any_non_terminal_state() {
        let mut lifecycle = RequestLifecycle::new();
        lifecycle.advance(RequestState::Analyzed).unwrap();
        assert_eq!(lifecycle.cancel().unwrap(), RequestState::Cancelled);
        assert_eq!(
            lifecycle.advance(RequestState::Matched).unwrap_err(),
            LifecycleError::Terminal(RequestState::Cancelled)
        );
        assert!(lifecycle.cancel().is_err());
    }

    #[test]
    fn third_failure_moves_to_error() {
        let mut lifecycle = RequestLifecycle::new();
        lifecycle.advance(RequestState::Analyzed).unwrap();
        lifecycle.advance(RequestState::Matched).unwrap();
        lifecycle.advance(RequestState::Executing).unwrap();

        assert_eq!(lifecycle.record_failure().unwrap(), RequestState::Executing);
        assert_eq!(lifecycle.record_failure().unwrap(), RequestState::Executing);
        assert_eq!(lifecycle.record_failure().unwrap(), RequestState::Error);
        assert_eq!(lifecycle.failures, MAX_FAILURES);
        assert!(lifecycle.record_failure().is_err());
    }

    #[test]
    fn state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RequestState::Presented).unwrap(),
            "\"presented\""
        );
        assert_eq!(RequestState::Cancelled.to_string(), "cancelled");
    }
}
