use std::time::Duration;

use thiserror::Error;

use crate::command::RunState;

#[derive(Debug, Error)]
pub enum ClockError {
    /// The reply did not arrive within the deadline.  The clock may still
    /// complete the work; only this caller gave up.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The clock task is gone — torn down, superseded as the notification
    /// recipient, or killed by a panicking action.
    #[error("clock task has terminated or abandoned this request")]
    Closed,

    /// A control request arrived while another one's reply was pending.
    #[error("{0} rejected: a control request is already in flight")]
    Busy(&'static str),

    #[error("{op} is only valid while idle (clock is {state})")]
    NotIdle { op: &'static str, state: RunState },

    #[error("stop is only valid while running")]
    NotRunning,

    #[error("time must be finite, got {0}")]
    NonFiniteTime(f64),

    #[error("cycle must be a positive finite number, got {0}")]
    BadCycle(f64),

    #[error("run duration must be finite and non-negative, got {0}")]
    BadDuration(f64),
}

pub type ClockResult<T> = Result<T, ClockError>;
