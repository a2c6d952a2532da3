//! Strongly typed event identifier.
//!
//! Ids are assigned by the event queue at insertion, starting at 1 and
//! increasing strictly.  They are never reused for the lifetime of the owning
//! clock — deletion leaves a hole, and a full reset starts a fresh counter.
//! Downstream code may therefore use an id as a stable handle to a pending
//! event across updates and recurrences.

use std::fmt;

/// Identifier of a scheduled event.
///
/// `EventId(0)` is the "nothing inserted yet" counter value; the first event
/// of a queue gets `EventId(1)`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(pub u64);

impl EventId {
    /// Counter origin — not a valid id of any stored event.
    pub const ZERO: EventId = EventId(0);

    /// The next id in allocation order.
    #[inline]
    pub fn next(self) -> EventId {
        EventId(self.0 + 1)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}
