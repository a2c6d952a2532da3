//! `des-queue` — the indexed, time-priority event queue.
//!
//! # Crate layout
//!
//! | Module    | Contents                                    |
//! |-----------|---------------------------------------------|
//! | [`event`] | `Event<A>`, `EventUpdate<A>`                |
//! | [`queue`] | `EventQueue<A>`, `Bucket`, `Batch<A>`       |
//!
//! # Data model (summary)
//!
//! The queue keeps two coupled views of the same event set:
//!
//! ```text
//! events:  EventId → Event { time, action, cycle }     (authoritative)
//! buckets: BucketKey → { time, [EventId, …] }          (priority index)
//! ```
//!
//! `BucketKey` quantizes time to 1/1000 units, so events closer together
//! than that are simultaneous: they share a bucket and are extracted as one
//! batch by [`EventQueue::next`].  Deletion only touches the authoritative
//! view; stale bucket entries are filtered out lazily at extraction.
//!
//! The queue is generic over the action payload `A` and never invokes
//! actions itself — executing what it hands out is the caller's business.

pub mod event;
pub mod queue;


pub use event::{Event, EventUpdate};
pub use queue::{Batch, Bucket, EventQueue};
