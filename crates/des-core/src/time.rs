//! Virtual time and its quantization.
//!
//! # Design
//!
//! Virtual time is a continuous `f64` — fractional times are first-class, so
//! an event may fire at `t = 1.25` or `t = 0.0003`.  Floats make poor ordered
//! map keys, though, so the priority index never orders raw times: it orders
//! [`BucketKey`]s, obtained by truncating `t * RESOLUTION` to an integer.
//! With `RESOLUTION = 1000` two events closer together than one millisecond
//! of virtual time land in the same bucket and are treated as simultaneous.
//!
//! Virtual time has no relation to wall-clock time: it advances only when the
//! clock consumes a batch of due events.

use std::fmt;

/// A point in virtual time.  Continuous; fractional values allowed.
pub type SimTime = f64;

/// Quantization factor for bucket keys: times are bucketed at 1/1000 of a
/// time unit.  Events within the same 1/1000 slot execute as one batch.
pub const RESOLUTION: f64 = 1000.0;

// ── BucketKey ─────────────────────────────────────────────────────────────────

/// The quantized form of a [`SimTime`], used as the priority-index key.
///
/// Keys order exactly as the times they quantize (truncation is monotone), so
/// min-key extraction yields the earliest scheduled bucket.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BucketKey(pub i64);

impl BucketKey {
    /// Quantize a time: `trunc(t * RESOLUTION)`.
    ///
    /// Truncation (not flooring) matches the engine's historical behaviour
    /// for negative times: `-0.0005` shares bucket `0` with `+0.0005`.
    #[inline]
    pub fn of(t: SimTime) -> BucketKey {
        BucketKey((t * RESOLUTION).trunc() as i64)
    }

    /// `true` if `a` and `b` quantize to the same bucket.
    #[inline]
    pub fn same_bucket(a: SimTime, b: SimTime) -> bool {
        BucketKey::of(a) == BucketKey::of(b)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "K{}", self.0)
    }
}
