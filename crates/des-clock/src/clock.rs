//! The clock task: state bundle, receive loop, and batch dispatch.
//!
//! # Control flow
//!
//! The task suspends only on its two inbound channels — commands from
//! clients and completion signals from batch workers.  Everything else is
//! synchronous state manipulation, so a message is always handled to
//! completion before the next one is looked at, and the clock's state is
//! never shared: clients only ever see it through replies.
//!
//! ```text
//!  clients ──commands──▶ ┌───────┐ ──batch──▶ worker ──┐
//!                        │ Clock │                     │ fan out, join
//!                        └───────┘ ◀──completion───────┘
//! ```
//!
//! While a worker is executing a batch the loop keeps serving scheduling
//! requests and queries; only the *driving* of further batches waits for the
//! completion signal.

use std::any::Any;

use des_core::SimTime;
use des_queue::{Batch, EventQueue};
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::action::Action;
use crate::command::{Command, ControlReply, RunOutcome, RunReport, RunState, StateSnapshot};
use crate::error::{ClockError, ClockResult};
use crate::handle::ClockHandle;

/// Signal a batch worker sends back when its batch is finished.
pub(crate) enum BatchSignal {
    Finished,
    /// An action panicked; the payload is re-raised on the clock task.
    Panicked(Box<dyn Any + Send>),
}

/// The clock's private state bundle.  Owned by a single tokio task; created
/// through [`Clock::spawn`], driven by [`ClockHandle`]s.
pub struct Clock {
    /// Current virtual time.  Advances to each batch's time as it is popped,
    /// and is clamped up to the horizon when a run completes.
    t: SimTime,

    /// The event queue.  Exclusively owned; queries hand out clones.
    eq: EventQueue<Action>,

    state: RunState,

    /// Events executed by the control command in progress (or the last one).
    evcount: u64,

    /// Horizon of the run in progress (or the last one).
    tend: SimTime,

    /// Reply channel of the client owed the next batch-boundary
    /// notification.  `Some` exactly while a `step`/`run`/`stop` is in
    /// flight.
    pending: Option<ControlReply>,

    cmd_rx:  mpsc::UnboundedReceiver<Command>,
    done_tx: mpsc::UnboundedSender<BatchSignal>,
    done_rx: mpsc::UnboundedReceiver<BatchSignal>,

    /// Handle passed to executing actions.  Holding it keeps the command
    /// channel open: the task lives until its runtime is torn down.
    handle: ClockHandle,
}

impl Clock {
    /// Spawn a clock task starting at virtual time `t0` and return a handle
    /// to it.  Must be called within a tokio runtime.
    pub fn spawn(t0: SimTime) -> ClockHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let handle = ClockHandle::new(cmd_tx);
        let clock = Clock {
            t: t0,
            eq: EventQueue::new(),
            state: RunState::Idle,
            evcount: 0,
            tend: t0,
            pending: None,
            cmd_rx,
            done_tx,
            done_rx,
            handle: handle.clone(),
        };
        tokio::spawn(clock.run_loop());
        handle
    }

    async fn run_loop(mut self) {
        debug!(t0 = self.t, "clock task started");
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd),
                    None => break,
                },
                Some(signal) = self.done_rx.recv() => self.on_batch_done(signal),
            }
        }
        debug!("clock task finished");
    }

    // ── Command handling ──────────────────────────────────────────────────

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Schedule { timing, cycle, action, reply } => {
                let time = timing.resolve(self.t);
                let id = self.eq.add(action, time, cycle);
                trace!(%id, time, cyclic = cycle.is_some(), "event scheduled");
                let _ = reply.send(id);
            }
            Command::Update { id, change, reply } => {
                if !self.eq.update(id, change) {
                    trace!(%id, "update of unknown event ignored");
                }
                let _ = reply.send(id);
            }
            Command::Cancel { ids, reply } => {
                let removed = self.eq.delete_all(ids);
                trace!(removed, "events cancelled");
                let _ = reply.send(removed);
            }
            Command::Now { reply } => {
                let _ = reply.send(self.t);
            }
            Command::Events { reply } => {
                let _ = reply.send(self.eq.clone());
            }
            Command::State { reply } => {
                let _ = reply.send(StateSnapshot {
                    state:   self.state,
                    evcount: self.evcount,
                    tend:    self.tend,
                    busy:    self.pending.is_some(),
                });
            }
            Command::Step { reply } => self.on_step(reply),
            Command::Run { duration, reply } => self.on_run(duration, reply),
            Command::Stop { reply } => self.on_stop(reply),
            Command::Reset { at, reply } => {
                let _ = reply.send(self.on_reset(at));
            }
        }
    }

    /// Pop and execute one batch; the reply is sent once the batch
    /// completes.  An empty queue replies immediately with zero events at
    /// the current time.
    fn on_step(&mut self, reply: ControlReply) {
        if let Err(e) = self.ensure_idle("step") {
            let _ = reply.send(Err(e));
            return;
        }
        match self.eq.next() {
            None => {
                let _ = reply.send(Ok(RunReport {
                    events:  0,
                    time:    self.t,
                    outcome: RunOutcome::Stepped,
                }));
            }
            Some(batch) => {
                self.t = batch.time;
                self.evcount = batch.len() as u64;
                self.pending = Some(reply);
                self.dispatch(batch);
            }
        }
    }

    /// Drive batches until virtual time reaches `now + duration` or the
    /// queue drains; the reply is sent when either happens.
    fn on_run(&mut self, duration: SimTime, reply: ControlReply) {
        if let Err(e) = self.ensure_idle("run") {
            let _ = reply.send(Err(e));
            return;
        }
        self.tend = self.t + duration;
        self.evcount = 0;
        debug!(from = self.t, tend = self.tend, "run started");
        match self.eq.next() {
            None => {
                // Nothing scheduled: the horizon is still honoured.
                self.t = self.tend;
                debug!(t = self.t, "run finished with an empty queue");
                let _ = reply.send(Ok(RunReport {
                    events:  0,
                    time:    self.t,
                    outcome: RunOutcome::Done,
                }));
            }
            Some(batch) => {
                self.state = RunState::Running;
                self.t = batch.time;
                self.evcount = batch.len() as u64;
                self.pending = Some(reply);
                self.dispatch(batch);
            }
        }
    }

    /// Record a stop request; it takes effect at the next batch boundary.
    /// The stop caller supersedes the run caller as the recipient of the
    /// boundary notification.
    fn on_stop(&mut self, reply: ControlReply) {
        if self.state != RunState::Running {
            warn!(state = %self.state, "stop rejected: clock is not running");
            let _ = reply.send(Err(ClockError::NotRunning));
            return;
        }
        debug!("stop requested; honouring at the next batch boundary");
        self.state = RunState::Stopped;
        self.pending = Some(reply);
    }

    /// Rebuild an empty clock at `at`.
    fn on_reset(&mut self, at: SimTime) -> ClockResult<()> {
        self.ensure_idle("reset")?;
        self.t = at;
        self.eq = EventQueue::new();
        self.evcount = 0;
        self.tend = at;
        debug!(t0 = at, "clock reset");
        Ok(())
    }

    fn ensure_idle(&self, op: &'static str) -> ClockResult<()> {
        if self.state != RunState::Idle {
            warn!(op, state = %self.state, "control command rejected");
            return Err(ClockError::NotIdle { op, state: self.state });
        }
        if self.pending.is_some() {
            warn!(op, "control command rejected: reply already in flight");
            return Err(ClockError::Busy(op));
        }
        Ok(())
    }

    // ── Batch completion ──────────────────────────────────────────────────

    fn on_batch_done(&mut self, signal: BatchSignal) {
        if let BatchSignal::Panicked(payload) = signal {
            // Action correctness is the client's contract: a panicking
            // action takes the clock task down with it.
            std::panic::resume_unwind(payload);
        }
        match self.state {
            // A step leaves the clock idle while its batch executes.
            RunState::Idle => self.notify(RunOutcome::Stepped, self.t),
            RunState::Stopped => {
                debug!(t = self.t, events = self.evcount, "run stopped");
                self.state = RunState::Idle;
                self.notify(RunOutcome::Stopped, self.t);
            }
            RunState::Running => {
                if self.t >= self.tend {
                    self.finish_run();
                } else {
                    match self.eq.next() {
                        None => self.finish_run(),
                        Some(batch) => {
                            self.t = batch.time;
                            self.evcount += batch.len() as u64;
                            self.dispatch(batch);
                        }
                    }
                }
            }
        }
    }

    fn finish_run(&mut self) {
        // A run always concludes at or past its horizon, even when the
        // queue drained early.
        self.t = self.tend.max(self.t);
        self.state = RunState::Idle;
        debug!(t = self.t, events = self.evcount, "run finished");
        self.notify(RunOutcome::Done, self.t);
    }

    /// Deliver the boundary notification to whoever is owed it.  A recipient
    /// that timed out or was superseded is simply gone; the send result does
    /// not matter.
    fn notify(&mut self, outcome: RunOutcome, time: SimTime) {
        if let Some(reply) = self.pending.take() {
            let _ = reply.send(Ok(RunReport { events: self.evcount, time, outcome }));
        }
    }

    // ── Batch execution ───────────────────────────────────────────────────

    /// Hand a batch to a worker task.  The clock never blocks on actions:
    /// an empty batch completes in place, anything else is fanned out on a
    /// worker — one sub-task per action, started in bucket order, joined
    /// before the completion signal is sent.
    fn dispatch(&mut self, batch: Batch<Action>) {
        trace!(time = batch.time, actions = batch.len(), "dispatching batch");
        if batch.is_empty() {
            let _ = self.done_tx.send(BatchSignal::Finished);
            return;
        }
        let handle = self.handle.clone();
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let tasks: Vec<_> = batch
                .actions
                .into_iter()
                .map(|action| tokio::spawn(action(handle.clone())))
                .collect();
            let mut panicked = None;
            for result in join_all(tasks).await {
                if let Err(join_err) = result {
                    if join_err.is_panic() && panicked.is_none() {
                        panicked = Some(join_err.into_panic());
                    }
                }
            }
            let _ = done.send(match panicked {
                Some(payload) => BatchSignal::Panicked(payload),
                None => BatchSignal::Finished,
            });
        });
    }
}
