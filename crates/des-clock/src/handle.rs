//! `ClockHandle` — the client surface.
//!
//! A handle is a cheap clone of the clock's command sender.  Every method is
//! a request-reply cycle: build a command carrying a fresh `oneshot` reply
//! channel, send it, await the reply under a deadline.  A timeout returns
//! control to the caller and nothing else — the clock neither notices nor
//! cares, and will complete the work regardless.
//!
//! Argument validation happens here, before any message is sent: a command
//! that reaches the clock task is always well-formed.

use std::time::Duration;

use des_core::{EventId, SimTime};
use des_queue::{EventQueue, EventUpdate};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::action::Action;
use crate::command::{Command, RunReport, StateSnapshot, Timing};
use crate::error::{ClockError, ClockResult};

/// Reply deadline for scheduling, queries, and `step`.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Reply deadline for `run` and `stop`, which wait on real event execution.
pub const RUN_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Client handle to a spawned [`Clock`][crate::Clock].
///
/// Clones address the same clock.  Requests from one handle are processed in
/// send order.
#[derive(Clone)]
pub struct ClockHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl ClockHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        ClockHandle { tx }
    }

    // ── Scheduling ────────────────────────────────────────────────────────

    /// Schedule an event; returns its id.
    ///
    /// `Timing::At(t)` fires at absolute time `t`; `Timing::After(dt)` at
    /// `now + dt`.  `cycle`, if given, makes the event recur that long after
    /// each firing.
    pub async fn event(
        &self,
        timing: Timing,
        cycle:  Option<SimTime>,
        action: Action,
    ) -> ClockResult<EventId> {
        self.event_within(timing, cycle, action, DEFAULT_REPLY_TIMEOUT).await
    }

    pub async fn event_within(
        &self,
        timing:   Timing,
        cycle:    Option<SimTime>,
        action:   Action,
        deadline: Duration,
    ) -> ClockResult<EventId> {
        let operand = timing.operand();
        if !operand.is_finite() {
            return Err(ClockError::NonFiniteTime(operand));
        }
        check_cycle(cycle)?;
        let (reply, rx) = oneshot::channel();
        self.send(Command::Schedule { timing, cycle, action, reply })?;
        await_reply(rx, deadline).await
    }

    /// Mutate a pending event.  An unknown id is a silent no-op; the id is
    /// echoed back either way.
    pub async fn update(&self, id: EventId, change: EventUpdate<Action>) -> ClockResult<EventId> {
        self.update_within(id, change, DEFAULT_REPLY_TIMEOUT).await
    }

    pub async fn update_within(
        &self,
        id:       EventId,
        change:   EventUpdate<Action>,
        deadline: Duration,
    ) -> ClockResult<EventId> {
        match &change {
            EventUpdate::Time(t) if !t.is_finite() => {
                return Err(ClockError::NonFiniteTime(*t));
            }
            EventUpdate::Cycle(c) => check_cycle(Some(*c))?,
            _ => {}
        }
        let (reply, rx) = oneshot::channel();
        self.send(Command::Update { id, change, reply })?;
        await_reply(rx, deadline).await
    }

    /// Cancel pending events; returns how many were still live.  Unknown
    /// ids are ignored.
    pub async fn cancel(&self, ids: impl IntoIterator<Item = EventId>) -> ClockResult<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Cancel { ids: ids.into_iter().collect(), reply })?;
        await_reply(rx, DEFAULT_REPLY_TIMEOUT).await
    }

    // ── Control ───────────────────────────────────────────────────────────

    /// Execute the next due batch.  Replies once the batch has completed;
    /// with nothing scheduled, replies immediately with zero events at the
    /// current time.
    pub async fn step(&self) -> ClockResult<RunReport> {
        self.step_within(DEFAULT_REPLY_TIMEOUT).await
    }

    pub async fn step_within(&self, deadline: Duration) -> ClockResult<RunReport> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Step { reply })?;
        await_reply(rx, deadline).await?
    }

    /// Drive batches until virtual time advances by `duration` or the queue
    /// drains, whichever comes first.
    pub async fn run(&self, duration: SimTime) -> ClockResult<RunReport> {
        self.run_within(duration, RUN_REPLY_TIMEOUT).await
    }

    pub async fn run_within(&self, duration: SimTime, deadline: Duration) -> ClockResult<RunReport> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(ClockError::BadDuration(duration));
        }
        let (reply, rx) = oneshot::channel();
        self.send(Command::Run { duration, reply })?;
        await_reply(rx, deadline).await?
    }

    /// Ask a running clock to stop at the next batch boundary and await the
    /// boundary notification.  The caller becomes the notification
    /// recipient; the superseded `run` caller observes [`ClockError::Closed`].
    pub async fn stop(&self) -> ClockResult<RunReport> {
        self.stop_within(RUN_REPLY_TIMEOUT).await
    }

    pub async fn stop_within(&self, deadline: Duration) -> ClockResult<RunReport> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stop { reply })?;
        await_reply(rx, deadline).await?
    }

    /// Rebuild an empty clock at virtual time `at`.
    pub async fn reset(&self, at: SimTime) -> ClockResult<()> {
        if !at.is_finite() {
            return Err(ClockError::NonFiniteTime(at));
        }
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reset { at, reply })?;
        await_reply(rx, DEFAULT_REPLY_TIMEOUT).await?
    }

    // ── Introspection ─────────────────────────────────────────────────────

    /// Current virtual time.
    pub async fn now(&self) -> ClockResult<SimTime> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Now { reply })?;
        await_reply(rx, DEFAULT_REPLY_TIMEOUT).await
    }

    /// A read-only snapshot of the pending event set.
    pub async fn events(&self) -> ClockResult<EventQueue<Action>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Events { reply })?;
        await_reply(rx, DEFAULT_REPLY_TIMEOUT).await
    }

    /// The clock's control state, run horizon, and executed-event count.
    pub async fn state(&self) -> ClockResult<StateSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::State { reply })?;
        await_reply(rx, DEFAULT_REPLY_TIMEOUT).await
    }

    // ── Internal ──────────────────────────────────────────────────────────

    fn send(&self, cmd: Command) -> ClockResult<()> {
        self.tx.send(cmd).map_err(|_| ClockError::Closed)
    }
}

/// Await a reply under a deadline.  A closed channel means the clock task
/// died or handed the reply slot to someone else.
async fn await_reply<T>(rx: oneshot::Receiver<T>, deadline: Duration) -> ClockResult<T> {
    match timeout(deadline, rx).await {
        Err(_) => Err(ClockError::Timeout(deadline)),
        Ok(Err(_)) => Err(ClockError::Closed),
        Ok(Ok(value)) => Ok(value),
    }
}

fn check_cycle(cycle: Option<SimTime>) -> ClockResult<()> {
    match cycle {
        Some(c) if !c.is_finite() || c <= 0.0 => Err(ClockError::BadCycle(c)),
        _ => Ok(()),
    }
}
