//! The clock's wire types: requests, replies, and public snapshots.

use des_core::{EventId, SimTime};
use des_queue::{EventQueue, EventUpdate};
use std::fmt;
use tokio::sync::oneshot;

use crate::action::Action;
use crate::error::ClockResult;

// ── Timing ────────────────────────────────────────────────────────────────────

/// When a new event should fire.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Timing {
    /// Absolute virtual time.
    At(SimTime),
    /// Relative to the clock's time when the request is processed.
    After(SimTime),
}

impl Timing {
    /// The raw operand, for validation before a resolved time exists.
    pub(crate) fn operand(self) -> SimTime {
        match self {
            Timing::At(t) | Timing::After(t) => t,
        }
    }

    /// Resolve against the clock's current time.
    pub(crate) fn resolve(self, now: SimTime) -> SimTime {
        match self {
            Timing::At(t) => t,
            Timing::After(dt) => now + dt,
        }
    }
}

// ── Run state ─────────────────────────────────────────────────────────────────

/// The clock's control state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Accepting control commands; nothing being driven.
    Idle,
    /// A `run` is driving batches to its horizon.
    Running,
    /// Stop requested; honoured at the next batch boundary.
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Stopped => "stopped",
        })
    }
}

// ── Replies ───────────────────────────────────────────────────────────────────

/// How a `step`, `run`, or `stop` concluded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// One batch executed via `step`; the clock stayed idle.
    Stepped,
    /// The run reached its horizon or drained the queue.
    Done,
    /// The run was stopped at a batch boundary.
    Stopped,
}

/// Summary delivered when a control command concludes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RunReport {
    /// Events executed since the control command began.
    pub events: u64,
    /// Virtual time afterwards.  A completed run reports at least its
    /// horizon even if the queue drained early.
    pub time: SimTime,
    pub outcome: RunOutcome,
}

/// Answer to a `state` query.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StateSnapshot {
    pub state: RunState,
    /// Events executed in the current (or last) control command.
    pub evcount: u64,
    /// Horizon of the current (or last) run.
    pub tend: SimTime,
    /// `true` while a control reply is pending — i.e. some client is owed a
    /// batch-boundary notification.
    pub busy: bool,
}

// ── Command ───────────────────────────────────────────────────────────────────

/// Reply channel for control commands whose answer arrives at a batch
/// boundary.
pub(crate) type ControlReply = oneshot::Sender<ClockResult<RunReport>>;

/// One inbound request to the clock task.  Arguments are validated by the
/// handle before a command is ever built.
pub(crate) enum Command {
    Schedule {
        timing: Timing,
        cycle:  Option<SimTime>,
        action: Action,
        reply:  oneshot::Sender<EventId>,
    },
    Update {
        id:     EventId,
        change: EventUpdate<Action>,
        reply:  oneshot::Sender<EventId>,
    },
    Cancel {
        ids:   Vec<EventId>,
        reply: oneshot::Sender<usize>,
    },
    Now {
        reply: oneshot::Sender<SimTime>,
    },
    Events {
        reply: oneshot::Sender<EventQueue<Action>>,
    },
    State {
        reply: oneshot::Sender<StateSnapshot>,
    },
    Step {
        reply: ControlReply,
    },
    Run {
        duration: SimTime,
        reply:    ControlReply,
    },
    Stop {
        reply: ControlReply,
    },
    Reset {
        at:    SimTime,
        reply: oneshot::Sender<ClockResult<()>>,
    },
}
