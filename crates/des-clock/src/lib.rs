//! `des-clock` — the virtual-time clock task.
//!
//! A `Clock` owns an event queue and the current virtual time.  It runs as a
//! single tokio task receiving commands over a channel; clients hold a
//! cloneable [`ClockHandle`] whose async methods are request-reply wrappers
//! with a deadline.  Due actions never execute on the clock task itself —
//! each batch is handed to a worker task that fans the actions out in
//! parallel and signals completion back — so the clock keeps answering
//! scheduling requests and queries mid-run.
//!
//! # Crate layout
//!
//! | Module      | Contents                                             |
//! |-------------|------------------------------------------------------|
//! | [`action`]  | `Action`, the boxed async callable events carry      |
//! | [`command`] | `Timing`, `RunState`, `RunReport`, `StateSnapshot`   |
//! | [`clock`]   | `Clock` — state bundle and receive loop              |
//! | [`handle`]  | `ClockHandle` — client surface with reply timeouts   |
//! | [`error`]   | `ClockError`, `ClockResult<T>`                       |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use des_clock::{action, Clock, Timing};
//!
//! let clock = Clock::spawn(0.0);
//! clock.event(Timing::After(1.0), None, action(|c| async move {
//!     if let Ok(t) = c.now().await {
//!         println!("fired at t={t}");
//!     }
//! })).await?;
//! let report = clock.run(10.0).await?;
//! assert_eq!(report.events, 1);
//! ```
//!
//! # State machine
//!
//! ```text
//!          step / run                 batch boundary
//!   idle ───────────────▶ running ───────────────────▶ idle
//!                            │                           ▲
//!                          stop                          │
//!                            ▼          next boundary    │
//!                         stopped ───────────────────────┘
//! ```
//!
//! Scheduling (`event`, `update`, `cancel`) and queries are accepted in any
//! state; `step`, `run` and `reset` require an idle clock with no control
//! reply in flight.

pub mod action;
pub mod clock;
pub mod command;
pub mod error;
pub mod handle;

#[cfg(test)]
mod tests;

pub use action::{action, Action, ActionFuture};
pub use clock::Clock;
pub use command::{RunOutcome, RunReport, RunState, StateSnapshot, Timing};
pub use error::{ClockError, ClockResult};
pub use handle::{ClockHandle, DEFAULT_REPLY_TIMEOUT, RUN_REPLY_TIMEOUT};
