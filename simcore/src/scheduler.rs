use std::collections::{BTreeMap, HashMap};

use derive_more::{Display, From, Into};
use ordered_float::OrderedFloat;

/// Stable handle of a scheduled event.
///
/// IDs are issued in strictly increasing order, so they double as the insertion sequence used
/// to break ties between events scheduled for the same time.
#[derive(From, Into, Debug, PartialEq, PartialOrd, Eq, Ord, Copy, Clone, Hash, Display)]
pub struct EventId(u64);

type EntryKey = (OrderedFloat<f64>, EventId);

/// Entry returned by the scheduler, including the event value, its ID, and the time when it
/// is supposed to occur.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEntry<E> {
    time: f64,
    id: EventId,
    event: E,
}

impl<E> EventEntry<E> {
    /// The time at which the event was scheduled.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The handle returned when the event was scheduled.
    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Borrows the event value.
    #[must_use]
    pub fn event(&self) -> &E {
        &self.event
    }

    /// Consumes the entry, returning the event value.
    #[must_use]
    pub fn into_event(self) -> E {
        self.event
    }
}

/// Scheduler is used to keep the current time and information about the upcoming events.
///
/// Events are ordered by time; events with equal times are popped in the order in which they
/// were scheduled (FIFO). The clock never moves backwards: attempts to schedule an event in
/// the past are clamped to the current time.
pub struct Scheduler<E> {
    events: BTreeMap<EntryKey, E>,
    pending: HashMap<EventId, OrderedFloat<f64>>,
    clock: f64,
    next_id: u64,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self {
            events: BTreeMap::new(),
            pending: HashMap::new(),
            clock: 0.0,
            next_id: 0,
        }
    }
}

impl<E> Scheduler<E> {
    /// Schedules `event` to be executed at `self.time() + delay`.
    pub fn schedule(&mut self, delay: f64, event: E) -> EventId {
        self.schedule_at(self.clock + delay, event)
    }

    /// Schedules `event` to be executed at `self.time()`, after all events already scheduled
    /// for the current time.
    pub fn schedule_immediately(&mut self, event: E) -> EventId {
        self.schedule_at(self.clock, event)
    }

    /// Schedules `event` to be executed at the absolute `time`.
    ///
    /// A time earlier than the current clock (or NaN) is clamped to the current clock.
    pub fn schedule_at(&mut self, time: f64, event: E) -> EventId {
        #[allow(clippy::neg_cmp_op_on_partial_ord)]
        let time = if !(time >= self.clock) {
            log::warn!(
                "[{}] Event scheduled in the past ({}); executing it now instead",
                self.clock,
                time
            );
            self.clock
        } else {
            time
        };
        let id = EventId(self.next_id);
        self.next_id += 1;
        let time = OrderedFloat(time);
        self.events.insert((time, id), event);
        self.pending.insert(id, time);
        id
    }

    /// Removes a pending event without executing it.
    ///
    /// Returns `false` if the event is unknown or has already been popped; the pending set is
    /// left untouched in that case.
    pub fn cancel(&mut self, id: EventId) -> bool {
        match self.pending.remove(&id) {
            Some(time) => self.events.remove(&(time, id)).is_some(),
            None => false,
        }
    }

    /// Returns `true` if the event with the given ID is still waiting to be popped.
    #[must_use]
    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Removes and returns the next scheduled event or `None` if none are left.
    /// The clock is advanced to the time of the returned event.
    pub fn pop(&mut self) -> Option<EventEntry<E>> {
        let key = *self.events.keys().next()?;
        let event = self.events.remove(&key)?;
        let (OrderedFloat(time), id) = key;
        self.pending.remove(&id);
        self.clock = time;
        Some(EventEntry { time, id, event })
    }

    /// Time of the earliest pending event, if any.
    #[must_use]
    pub fn peek_time(&self) -> Option<f64> {
        self.events.keys().next().map(|(time, _)| time.into_inner())
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.clock
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Checks if there are no pending events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
