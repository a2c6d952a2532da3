//! ticker — smallest example for the rust_des engine.
//!
//! One recurring heartbeat plus a handful of randomly placed one-shot jobs,
//! driven to a fixed horizon.  The schedule is seeded, so every run prints
//! the same trace; crank `JOB_COUNT` and the horizon to taste.

use anyhow::Result;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use des_clock::{action, Clock, Timing};
use des_core::SimTime;

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:            u64     = 42;
const JOB_COUNT:       usize   = 5;
const HORIZON:         SimTime = 10.0;
const HEARTBEAT_CYCLE: SimTime = 1.0;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let clock = Clock::spawn(0.0);

    // A heartbeat at t = 1, 2, 3, … for the lifetime of the run.
    clock
        .event(
            Timing::At(HEARTBEAT_CYCLE),
            Some(HEARTBEAT_CYCLE),
            action(|clock| async move {
                if let Ok(t) = clock.now().await {
                    println!("  heartbeat         t={t:5.2}");
                }
            }),
        )
        .await?;

    // One-shot jobs at seeded random times within the horizon.
    let mut rng = SmallRng::seed_from_u64(SEED);
    for job in 0..JOB_COUNT {
        let at: SimTime = rng.gen_range(0.0..HORIZON);
        clock
            .event(
                Timing::At(at),
                None,
                action(move |clock| async move {
                    if let Ok(t) = clock.now().await {
                        println!("  job {job} fired at   t={t:5.2}");
                    }
                }),
            )
            .await?;
    }

    println!("running to t={HORIZON}…");
    let report = clock.run(HORIZON).await?;
    println!(
        "done: {} events executed, virtual time {:.2}",
        report.events, report.time
    );
    Ok(())
}
