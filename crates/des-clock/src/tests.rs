//! Integration tests for des-clock.
//!
//! The harness stands in for a client mailbox: actions report into an
//! unbounded channel and tests drain ("flush") it between control commands.
//! A control reply is only sent after its batch has fully completed, so a
//! flush right after `step`/`run` returns is deterministic.  Within one
//! batch actions run in parallel and may report in any order — assertions
//! on multi-action batches therefore sort the batch's slice first.

use std::time::Duration;

use des_core::EventId;
use des_queue::EventUpdate;
use tokio::sync::mpsc;

use crate::{
    action, Action, Clock, ClockError, ClockHandle, RunOutcome, RunState, Timing,
};

// ── Harness ───────────────────────────────────────────────────────────────────

type Mailbox = mpsc::UnboundedReceiver<f64>;

fn mailbox() -> (mpsc::UnboundedSender<f64>, Mailbox) {
    mpsc::unbounded_channel()
}

/// Action that reads the clock's time when it fires and reports it.
fn report_now(tx: &mpsc::UnboundedSender<f64>) -> Action {
    let tx = tx.clone();
    action(move |clock| {
        let tx = tx.clone();
        async move {
            if let Ok(t) = clock.now().await {
                let _ = tx.send(t);
            }
        }
    })
}

/// Action that reports a fixed value.
fn report_value(tx: &mpsc::UnboundedSender<f64>, value: f64) -> Action {
    let tx = tx.clone();
    action(move |_| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(value);
        }
    })
}

/// Action that holds its batch open for `ms` milliseconds.
fn sleepy(ms: u64) -> Action {
    action(move |_| async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    })
}

/// Drain everything currently in the mailbox.
fn flush(rx: &mut Mailbox) -> Vec<f64> {
    let mut out = Vec::new();
    while let Ok(v) = rx.try_recv() {
        out.push(v);
    }
    out
}

/// The shared opening schedule: events at t = 1, 1, 2, 4 via `After` plus
/// one at t = 3 via `At` (ids 1–5), each reporting the clock time it fired
/// at.
async fn seed_schedule(clock: &ClockHandle, tx: &mpsc::UnboundedSender<f64>) {
    for dt in [1.0, 1.0, 2.0, 4.0] {
        clock.event(Timing::After(dt), None, report_now(tx)).await.unwrap();
    }
    clock.event(Timing::At(3.0), None, report_now(tx)).await.unwrap();
}

/// The shared mid-scenario mutations: move id 5 to t = 5, then turn id 4
/// into a recurring reporter of the constant 10.
async fn apply_updates(clock: &ClockHandle, tx: &mpsc::UnboundedSender<f64>) {
    clock.update(EventId(5), EventUpdate::Time(5.0)).await.unwrap();
    clock
        .update(EventId(4), EventUpdate::Action(report_value(tx, 10.0)))
        .await
        .unwrap();
    clock.update(EventId(4), EventUpdate::Cycle(1.0)).await.unwrap();
}

// ── Construction & queries ────────────────────────────────────────────────────

#[cfg(test)]
mod fresh_clock {
    use super::*;

    #[tokio::test]
    async fn starts_idle_at_its_origin() {
        let clock = Clock::spawn(2.5);
        assert_eq!(clock.now().await.unwrap(), 2.5);

        let snap = clock.state().await.unwrap();
        assert_eq!(snap.state, RunState::Idle);
        assert_eq!(snap.evcount, 0);
        assert_eq!(snap.tend, 2.5);
        assert!(!snap.busy);
    }

    #[tokio::test]
    async fn event_ids_count_up() {
        let (tx, _rx) = mailbox();
        let clock = Clock::spawn(0.0);
        for expect in 1..=4u64 {
            let id = clock.event(Timing::After(1.0), None, report_now(&tx)).await.unwrap();
            assert_eq!(id, EventId(expect));
        }
    }

    #[tokio::test]
    async fn timing_resolves_against_now() {
        let (tx, _rx) = mailbox();
        let clock = Clock::spawn(10.0);
        let relative = clock.event(Timing::After(1.5), None, report_now(&tx)).await.unwrap();
        let absolute = clock.event(Timing::At(3.0), None, report_now(&tx)).await.unwrap();

        let snapshot = clock.events().await.unwrap();
        assert_eq!(snapshot.get(relative).unwrap().time, 11.5);
        assert_eq!(snapshot.get(absolute).unwrap().time, 3.0);
    }

    #[tokio::test]
    async fn events_snapshot_reflects_the_queue() {
        let (tx, _rx) = mailbox();
        let clock = Clock::spawn(0.0);
        seed_schedule(&clock, &tx).await;

        let snapshot = clock.events().await.unwrap();
        assert_eq!(snapshot.len(), 5);
        assert_eq!(snapshot.last_id(), EventId(5));
        assert_eq!(snapshot.peek_time(), Some(1.0));
    }
}

// ── Argument validation ───────────────────────────────────────────────────────

#[cfg(test)]
mod bad_arguments {
    use super::*;

    #[tokio::test]
    async fn rejected_before_any_message_is_sent() {
        let (tx, _rx) = mailbox();
        let clock = Clock::spawn(0.0);

        let err = clock.event(Timing::At(f64::NAN), None, report_now(&tx)).await;
        assert!(matches!(err, Err(ClockError::NonFiniteTime(_))));

        let err = clock.event(Timing::After(1.0), Some(0.0), report_now(&tx)).await;
        assert!(matches!(err, Err(ClockError::BadCycle(_))));

        let err = clock.update(EventId(1), EventUpdate::Time(f64::INFINITY)).await;
        assert!(matches!(err, Err(ClockError::NonFiniteTime(_))));

        let err = clock.update(EventId(1), EventUpdate::Cycle(-2.0)).await;
        assert!(matches!(err, Err(ClockError::BadCycle(_))));

        let err = clock.run(-1.0).await;
        assert!(matches!(err, Err(ClockError::BadDuration(_))));

        // Nothing reached the clock: the queue is still empty.
        assert!(clock.events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_of_unknown_id_echoes_the_id() {
        let clock = Clock::spawn(0.0);
        let id = clock.update(EventId(99), EventUpdate::Cycle(1.0)).await.unwrap();
        assert_eq!(id, EventId(99));
        assert!(clock.events().await.unwrap().is_empty());
    }
}

// ── Stepping ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod stepping {
    use super::*;

    #[tokio::test]
    async fn step_executes_one_batch_of_simultaneous_events() {
        let (tx, mut rx) = mailbox();
        let clock = Clock::spawn(0.0);
        seed_schedule(&clock, &tx).await;

        let report = clock.step().await.unwrap();
        assert_eq!(report.events, 2);
        assert_eq!(report.time, 1.0);
        assert_eq!(report.outcome, RunOutcome::Stepped);
        assert_eq!(flush(&mut rx), vec![1.0, 1.0]);
    }

    #[tokio::test]
    async fn step_sequence_with_mid_flight_updates() {
        let (tx, mut rx) = mailbox();
        let clock = Clock::spawn(0.0);
        seed_schedule(&clock, &tx).await;

        let report = clock.step().await.unwrap();
        assert_eq!((report.events, report.time), (2, 1.0));
        assert_eq!(flush(&mut rx), vec![1.0, 1.0]);

        let report = clock.step().await.unwrap();
        assert_eq!((report.events, report.time), (1, 2.0));
        assert_eq!(flush(&mut rx), vec![2.0]);

        apply_updates(&clock, &tx).await;

        // t = 3 is vacated (id 5 moved to 5), so the next batch is t = 4.
        let report = clock.step().await.unwrap();
        assert_eq!((report.events, report.time), (1, 4.0));
        assert_eq!(flush(&mut rx), vec![10.0]);

        // t = 5: the recycled id 4 and the relocated id 5 fire together.
        let report = clock.step().await.unwrap();
        assert_eq!((report.events, report.time), (2, 5.0));
        let mut batch = flush(&mut rx);
        batch.sort_by(f64::total_cmp);
        assert_eq!(batch, vec![5.0, 10.0]);

        // t = 6: only the recurrence remains.
        let report = clock.step().await.unwrap();
        assert_eq!((report.events, report.time), (1, 6.0));
        assert_eq!(flush(&mut rx), vec![10.0]);

        // Wipe and verify the round-trip.
        clock.reset(0.0).await.unwrap();
        assert_eq!(clock.now().await.unwrap(), 0.0);
        let snap = clock.state().await.unwrap();
        assert_eq!(snap.state, RunState::Idle);
        assert_eq!(snap.evcount, 0);
        assert_eq!(snap.tend, 0.0);
        assert!(clock.events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn step_on_an_empty_clock_is_a_noop() {
        // Documented behaviour: zero events, time unchanged, still a reply.
        let clock = Clock::spawn(7.25);
        let report = clock.step().await.unwrap();
        assert_eq!(report.events, 0);
        assert_eq!(report.time, 7.25);
        assert_eq!(report.outcome, RunOutcome::Stepped);
    }

    #[tokio::test]
    async fn cancelled_event_never_executes() {
        let (tx, mut rx) = mailbox();
        let clock = Clock::spawn(0.0);
        clock.event(Timing::After(1.0), None, report_now(&tx)).await.unwrap();
        let doomed = clock.event(Timing::After(1.0), None, report_now(&tx)).await.unwrap();
        clock.event(Timing::After(2.0), None, report_now(&tx)).await.unwrap();

        assert_eq!(clock.cancel([doomed]).await.unwrap(), 1);

        // The t = 1 batch still exists but carries only the surviving event.
        let report = clock.step().await.unwrap();
        assert_eq!((report.events, report.time), (1, 1.0));
        assert_eq!(flush(&mut rx), vec![1.0]);

        let report = clock.step().await.unwrap();
        assert_eq!((report.events, report.time), (1, 2.0));
        assert_eq!(flush(&mut rx), vec![2.0]);
    }
}

// ── Running ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod running {
    use super::*;

    #[tokio::test]
    async fn run_drives_batches_to_the_horizon() {
        let (tx, mut rx) = mailbox();
        let clock = Clock::spawn(0.0);
        seed_schedule(&clock, &tx).await;
        apply_updates(&clock, &tx).await;

        // Batches: t=1 (×2), t=2, t=4, t=5 (×2), t=6 — seven events, and the
        // run concludes exactly at its horizon.
        let report = clock.run(6.0).await.unwrap();
        assert_eq!(report.events, 7);
        assert_eq!(report.time, 6.0);
        assert_eq!(report.outcome, RunOutcome::Done);

        let got = flush(&mut rx);
        assert_eq!(got.len(), 7);
        assert_eq!(&got[0..2], &[1.0, 1.0]);
        assert_eq!(&got[2..4], &[2.0, 10.0]);
        let mut t5_batch = got[4..6].to_vec();
        t5_batch.sort_by(f64::total_cmp);
        assert_eq!(t5_batch, vec![5.0, 10.0]);
        assert_eq!(got[6], 10.0);

        // The recurrence survived the run; a second leg picks it up at
        // t = 7, 8, 9, 10.
        let report = clock.run(4.0).await.unwrap();
        assert_eq!(report.events, 4);
        assert_eq!(report.time, 10.0);
        assert_eq!(flush(&mut rx), vec![10.0, 10.0, 10.0, 10.0]);
    }

    #[tokio::test]
    async fn run_on_an_empty_queue_still_honours_the_horizon() {
        let clock = Clock::spawn(1.0);
        let report = clock.run(5.0).await.unwrap();
        assert_eq!(report.events, 0);
        assert_eq!(report.time, 6.0);
        assert_eq!(report.outcome, RunOutcome::Done);
        assert_eq!(clock.now().await.unwrap(), 6.0);
    }

    #[tokio::test]
    async fn run_reports_past_the_horizon_when_the_last_batch_overshoots() {
        // The first batch is popped unconditionally, so a lone event beyond
        // the horizon still executes and the run reports its (later) time.
        let (tx, mut rx) = mailbox();
        let clock = Clock::spawn(0.0);
        clock.event(Timing::At(7.0), None, report_now(&tx)).await.unwrap();

        let report = clock.run(2.0).await.unwrap();
        assert_eq!(report.events, 1);
        assert_eq!(report.time, 7.0);
        assert_eq!(flush(&mut rx), vec![7.0]);
    }

    #[tokio::test]
    async fn actions_can_schedule_follow_up_events() {
        let (tx, mut rx) = mailbox();
        let clock = Clock::spawn(0.0);

        let tx2 = tx.clone();
        let spawner = action(move |clock| {
            let tx = tx2.clone();
            async move {
                let follow_up = report_value(&tx, 2.0);
                let _ = clock.event(Timing::At(2.0), None, follow_up).await;
            }
        });
        clock.event(Timing::At(1.0), None, spawner).await.unwrap();

        let report = clock.run(3.0).await.unwrap();
        assert_eq!(report.events, 2);
        assert_eq!(report.time, 3.0);
        assert_eq!(flush(&mut rx), vec![2.0]);
    }

    #[tokio::test]
    async fn queries_and_scheduling_are_served_mid_run() {
        let (tx, _keep) = mailbox();
        let clock = Clock::spawn(0.0);
        clock.event(Timing::At(1.0), None, sleepy(150)).await.unwrap();

        let runner = clock.clone();
        let run_task = tokio::spawn(async move { runner.run(2.0).await });

        // Land inside the sleeping batch.
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(clock.now().await.unwrap(), 1.0);
        let snap = clock.state().await.unwrap();
        assert_eq!(snap.state, RunState::Running);
        assert!(snap.busy);

        // New events are accepted without disturbing the execution cycle…
        let late = clock.event(Timing::At(1.5), None, report_now(&tx)).await.unwrap();
        assert_eq!(late, EventId(2));

        // …and get driven by the same run.
        let report = run_task.await.unwrap().unwrap();
        assert_eq!(report.events, 2);
        assert_eq!(report.time, 2.0);
    }
}

// ── Stopping ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod stopping {
    use super::*;

    #[tokio::test]
    async fn stop_takes_effect_at_the_next_batch_boundary() {
        let clock = Clock::spawn(0.0);
        clock.event(Timing::After(0.5), Some(0.5), sleepy(60)).await.unwrap();

        let runner = clock.clone();
        let run_task = tokio::spawn(async move { runner.run(1_000_000.0).await });

        // Ask for a stop while the first batch is executing.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let report = clock.stop().await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Stopped);
        assert!(report.events >= 1);

        // The superseded run caller is abandoned, not replied to.
        let run_result = run_task.await.unwrap();
        assert!(matches!(run_result, Err(ClockError::Closed)));

        let snap = clock.state().await.unwrap();
        assert_eq!(snap.state, RunState::Idle);
        assert!(!snap.busy);
    }

    #[tokio::test]
    async fn stop_is_rejected_while_idle() {
        let clock = Clock::spawn(0.0);
        assert!(matches!(clock.stop().await, Err(ClockError::NotRunning)));
    }
}

// ── Lifecycle & failure modes ─────────────────────────────────────────────────

#[cfg(test)]
mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn control_commands_are_rejected_while_busy() {
        let clock = Clock::spawn(0.0);
        clock.event(Timing::At(1.0), None, sleepy(150)).await.unwrap();

        let stepper = clock.clone();
        let step_task = tokio::spawn(async move { stepper.step().await });

        tokio::time::sleep(Duration::from_millis(40)).await;
        // A second step while the first one's reply is pending.
        assert!(matches!(clock.step().await, Err(ClockError::Busy(_))));

        let report = step_task.await.unwrap().unwrap();
        assert_eq!(report.events, 1);
    }

    #[tokio::test]
    async fn reset_is_rejected_while_running() {
        let clock = Clock::spawn(0.0);
        clock.event(Timing::At(1.0), None, sleepy(150)).await.unwrap();

        let runner = clock.clone();
        let run_task = tokio::spawn(async move { runner.run(5.0).await });

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(matches!(
            clock.reset(0.0).await,
            Err(ClockError::NotIdle { op: "reset", .. })
        ));
        run_task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn timeout_returns_control_without_disturbing_the_clock() {
        let clock = Clock::spawn(0.0);
        clock.event(Timing::At(1.0), None, sleepy(150)).await.unwrap();

        // Give up long before the batch finishes.
        let err = clock.step_within(Duration::from_millis(20)).await;
        assert!(matches!(err, Err(ClockError::Timeout(_))));

        // The clock completed the work anyway and is back to idle.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(clock.now().await.unwrap(), 1.0);
        let snap = clock.state().await.unwrap();
        assert_eq!(snap.state, RunState::Idle);
        assert!(!snap.busy);
    }

    #[tokio::test]
    async fn panicking_action_kills_the_clock_task() {
        let clock = Clock::spawn(0.0);
        clock
            .event(Timing::At(1.0), None, action(|_| async { panic!("client bug") }))
            .await
            .unwrap();

        // The step reply never comes: the clock re-raises the panic and dies.
        assert!(matches!(clock.step().await, Err(ClockError::Closed)));
        assert!(matches!(clock.now().await, Err(ClockError::Closed)));
    }
}
