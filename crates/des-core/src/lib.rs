//! `des-core` — foundational types for the `rust_des` simulation engine.
//!
//! This crate is a dependency of every other `des-*` crate.  It intentionally
//! has no `des-*` dependencies and no required external ones (only optional
//! `serde`).
//!
//! # What lives here
//!
//! | Module   | Contents                                  |
//! |----------|-------------------------------------------|
//! | [`ids`]  | `EventId`                                 |
//! | [`time`] | `SimTime`, `RESOLUTION`, `BucketKey`      |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                              |
//! |---------|-----------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types. |

pub mod ids;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use ids::EventId;
pub use time::{BucketKey, SimTime, RESOLUTION};
