//! `EventQueue` — insertion, keyed mutation, and batch extraction.
//!
//! # Why two views
//!
//! A simulation with thousands of live entities mutates pending events
//! constantly (reschedule, retarget, cancel) while the run loop repeatedly
//! asks "what is due next?".  A single ordered structure would pay a scan or
//! a re-sort for every keyed mutation.  `EventQueue` keeps the authoritative
//! records in a hash map for O(1) keyed access and a `BTreeMap` of time
//! buckets for O(log W) min-extraction, where W = number of distinct
//! quantized times currently scheduled.
//!
//! # Lazy deletion
//!
//! [`EventQueue::delete`] removes only the authoritative record and leaves
//! the id dangling in its bucket.  [`EventQueue::next`] filters dangling ids
//! against the live set at extraction.  This keeps deletion O(1) instead of
//! O(bucket) and is invisible to callers — a deleted event's action is never
//! handed out.

use std::collections::{BTreeMap, HashMap};

use des_core::{BucketKey, EventId, SimTime};

use crate::event::{Event, EventUpdate};

// ── Bucket ────────────────────────────────────────────────────────────────────

/// One node of the priority index: all event ids scheduled at (quantized)
/// time `time`, in insertion order.
///
/// `time` is the unquantized time of the bucket's first inserter; it is what
/// the clock advances to when the bucket's batch executes.
#[derive(Clone, Debug, PartialEq)]
pub struct Bucket {
    pub time: SimTime,
    pub ids:  Vec<EventId>,
}

// ── Batch ─────────────────────────────────────────────────────────────────────

/// The result of extracting one bucket: everything due at `time`.
///
/// `actions` holds the payloads of the bucket's *live* events in bucket
/// order; deleted events are filtered out, so a batch may be empty even
/// though its bucket was not.
#[derive(Clone, Debug)]
pub struct Batch<A> {
    pub time:    SimTime,
    pub actions: Vec<A>,
}

impl<A> Batch<A> {
    /// Number of live actions in the batch.
    #[inline]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

// ── EventQueue ────────────────────────────────────────────────────────────────

/// An indexed, time-priority event queue.
///
/// Supports O(1) insertion and keyed mutation, O(1) deletion (lazy), and
/// O(log W) extraction of the next batch of simultaneously due events.
#[derive(Clone, Debug, PartialEq)]
pub struct EventQueue<A> {
    /// Id of the most recently inserted event.  Monotonic; never recycled.
    last_id: EventId,

    /// Authoritative store of event content.
    events: HashMap<EventId, Event<A>>,

    /// Priority index: quantized time → bucket of ids due then.
    buckets: BTreeMap<BucketKey, Bucket>,
}

impl<A> Default for EventQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> EventQueue<A> {
    /// An empty queue with a fresh id counter.
    pub fn new() -> Self {
        EventQueue {
            last_id: EventId::ZERO,
            events:  HashMap::new(),
            buckets: BTreeMap::new(),
        }
    }

    // ── Introspection ─────────────────────────────────────────────────────

    /// Id of the most recently inserted event (`EventId::ZERO` when nothing
    /// was ever inserted).
    #[inline]
    pub fn last_id(&self) -> EventId {
        self.last_id
    }

    /// Number of live (non-deleted) events.
    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of buckets in the priority index.  May exceed the number of
    /// distinct live times when deleted ids are still awaiting lazy cleanup.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// The authoritative record for `id`, if live.
    #[inline]
    pub fn get(&self, id: EventId) -> Option<&Event<A>> {
        self.events.get(&id)
    }

    #[inline]
    pub fn contains(&self, id: EventId) -> bool {
        self.events.contains_key(&id)
    }

    /// The bucket at `key`, if present.  Snapshot inspection only.
    pub fn bucket(&self, key: BucketKey) -> Option<&Bucket> {
        self.buckets.get(&key)
    }

    /// Recorded time of the earliest bucket, or `None` if nothing is
    /// scheduled.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.buckets.values().next().map(|b| b.time)
    }

    /// Iterate over all live events in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (EventId, &Event<A>)> {
        self.events.iter().map(|(&id, ev)| (id, ev))
    }

    // ── Mutation ──────────────────────────────────────────────────────────

    /// Insert a new event at `time`, returning its freshly assigned id.
    ///
    /// The id joins the back of the bucket at `BucketKey::of(time)` — events
    /// sharing a bucket are handed out in insertion order.  A new bucket
    /// records `time` as its representative time.
    pub fn add(&mut self, action: A, time: SimTime, cycle: Option<SimTime>) -> EventId {
        let id = self.last_id.next();
        self.last_id = id;
        self.events.insert(id, Event { time, action, cycle });
        self.bucket_entry(time).ids.push(id);
        id
    }

    /// Apply a keyed mutation to a pending event.
    ///
    /// Returns `false` (and leaves the queue untouched) if `id` is not live.
    /// An [`EventUpdate::Time`] re-homes the id: it is removed from its old
    /// bucket (the bucket is dropped once emptied; a surviving bucket keeps
    /// its recorded time) and appended at the new time's bucket.
    pub fn update(&mut self, id: EventId, change: EventUpdate<A>) -> bool {
        let Some(event) = self.events.get_mut(&id) else {
            return false;
        };
        match change {
            EventUpdate::Cycle(c) => event.cycle = Some(c),
            EventUpdate::Action(a) => event.action = a,
            EventUpdate::Time(t) => {
                let old_key = BucketKey::of(event.time);
                event.time = t;
                if let Some(bucket) = self.buckets.get_mut(&old_key) {
                    bucket.ids.retain(|&other| other != id);
                    if bucket.ids.is_empty() {
                        self.buckets.remove(&old_key);
                    }
                }
                self.bucket_entry(t).ids.push(id);
            }
        }
        true
    }

    /// Delete a pending event.  Returns `false` if `id` is not live.
    ///
    /// Only the authoritative record is removed; the id stays in its bucket
    /// until [`next`][Self::next] filters it out.
    pub fn delete(&mut self, id: EventId) -> bool {
        self.events.remove(&id).is_some()
    }

    /// Delete several events at once; returns how many were live.
    pub fn delete_all(&mut self, ids: impl IntoIterator<Item = EventId>) -> usize {
        ids.into_iter().filter(|&id| self.delete(id)).count()
    }

    /// Extract the earliest bucket as a batch of due actions.
    ///
    /// Returns `None` when the priority index is empty.  Otherwise the
    /// minimum bucket is removed and its live ids are resolved in bucket
    /// order:
    ///
    /// - a deleted id is skipped (lazy deletion),
    /// - a one-shot event is consumed — its record leaves the queue,
    /// - a cyclic event stays live: its action is cloned out, its record's
    ///   time becomes `due + cycle`, and its id is re-inserted at the *front*
    ///   of the bucket at that time, so a recurring event fires ahead of
    ///   events moved there earlier.
    pub fn next(&mut self) -> Option<Batch<A>>
    where
        A: Clone,
    {
        let (_, bucket) = self.buckets.pop_first()?;
        let due = bucket.time;
        let mut actions = Vec::with_capacity(bucket.ids.len());
        for id in bucket.ids {
            let Some(mut event) = self.events.remove(&id) else {
                continue; // deleted since insertion
            };
            match event.cycle {
                None => actions.push(event.action),
                Some(cycle) => {
                    let at = due + cycle;
                    actions.push(event.action.clone());
                    event.time = at;
                    self.events.insert(id, event);
                    self.bucket_entry(at).ids.insert(0, id);
                }
            }
        }
        Some(Batch { time: due, actions })
    }

    // ── Internal ──────────────────────────────────────────────────────────

    /// The bucket at `time`'s key, created empty (recording `time`) if absent.
    fn bucket_entry(&mut self, time: SimTime) -> &mut Bucket {
        self.buckets
            .entry(BucketKey::of(time))
            .or_insert_with(|| Bucket { time, ids: Vec::new() })
    }
}
