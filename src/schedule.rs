//! Storage for events keyed by simulated time.
//!
//! Defines an `EventScheduler<R, O>` holding two kinds of entries:
//!
//! * every-day entries of type `R`, keyed by second-of-day and fired once per simulated day at
//!   that second until unregistered;
//! * one-shot entries of type `O`, keyed by an absolute `(day, second)` instant and fired once.
//!
//! Each registration gets an [`EventHandle`] that is later used to remove exactly that entry.
//! Several entries may share a key; they are kept in registration order, which is also the order
//! in which `Context` fires them.
//!
//! The scheduler only stores entries. `Context` owns one whose payloads are boxed closures and
//! does the actual firing, using the take/restore methods below so that a handler can cancel or
//! register other handlers while it runs.

use std::collections::BTreeMap;

use crate::error::OutbreakError;
use crate::hashing::HashMap;

/// A unique identifier for an entry added to an `EventScheduler`
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventHandle(u64);

/// A registered entry. `data` is `None` while the entry is taken out to be fired.
struct Slot<H, T> {
    handle: H,
    data: Option<T>,
}

pub struct EventScheduler<R, O = R> {
    day_length: u32,
    every_day: BTreeMap<u32, Vec<Slot<EventHandle, R>>>,
    once: BTreeMap<u32, BTreeMap<u32, Vec<(EventHandle, O)>>>,
    once_index: HashMap<EventHandle, (u32, u32)>,
    handle_counter: u64,
}

impl<R, O> EventScheduler<R, O> {
    /// Create an empty scheduler for days of `day_length` seconds
    #[must_use]
    pub fn new(day_length: u32) -> EventScheduler<R, O> {
        EventScheduler {
            day_length,
            every_day: BTreeMap::new(),
            once: BTreeMap::new(),
            once_index: HashMap::default(),
            handle_counter: 0,
        }
    }

    #[must_use]
    pub fn day_length(&self) -> u32 {
        self.day_length
    }

    fn check_second(&self, second: u32) -> Result<(), OutbreakError> {
        if second >= self.day_length {
            return Err(OutbreakError::SecondOutOfRange {
                second,
                day_length: self.day_length,
            });
        }
        Ok(())
    }

    fn next_handle(&mut self) -> EventHandle {
        let handle = EventHandle(self.handle_counter);
        self.handle_counter += 1;
        handle
    }

    /// Add an entry that fires every day at `second`
    ///
    /// # Errors
    ///
    /// Returns `SecondOutOfRange` if `second` is not in `[0, day_length)`.
    pub fn register_every_day(&mut self, second: u32, data: R) -> Result<EventHandle, OutbreakError> {
        self.check_second(second)?;
        let handle = self.next_handle();
        self.every_day.entry(second).or_default().push(Slot {
            handle,
            data: Some(data),
        });
        Ok(handle)
    }

    /// Remove an every-day entry. The key is dropped with its last entry.
    ///
    /// Returns false if no such entry was registered at `second`.
    pub fn unregister_every_day(&mut self, second: u32, handle: EventHandle) -> bool {
        let Some(slots) = self.every_day.get_mut(&second) else {
            return false;
        };
        let before = slots.len();
        slots.retain(|slot| slot.handle != handle);
        let removed = slots.len() != before;
        if slots.is_empty() {
            self.every_day.remove(&second);
        }
        removed
    }

    #[must_use]
    pub fn is_registered_every_day(&self, second: u32, handle: EventHandle) -> bool {
        self.every_day
            .get(&second)
            .is_some_and(|slots| slots.iter().any(|slot| slot.handle == handle))
    }

    /// Snapshot of the handles registered at `second`, in firing order
    #[must_use]
    pub fn every_day_handles(&self, second: u32) -> Vec<EventHandle> {
        self.every_day
            .get(&second)
            .map(|slots| slots.iter().map(|slot| slot.handle).collect())
            .unwrap_or_default()
    }

    /// Take the payload of an every-day entry out for firing. The entry stays registered.
    pub fn take_every_day(&mut self, second: u32, handle: EventHandle) -> Option<R> {
        self.every_day
            .get_mut(&second)?
            .iter_mut()
            .find(|slot| slot.handle == handle)?
            .data
            .take()
    }

    /// Put a taken payload back. If the entry was unregistered in the meantime the payload is
    /// dropped and false is returned.
    pub fn restore_every_day(&mut self, second: u32, handle: EventHandle, data: R) -> bool {
        let slot = self
            .every_day
            .get_mut(&second)
            .and_then(|slots| slots.iter_mut().find(|slot| slot.handle == handle));
        match slot {
            Some(slot) => {
                slot.data = Some(data);
                true
            }
            None => false,
        }
    }

    /// Number of seconds-of-day that have at least one every-day entry
    #[must_use]
    pub fn every_day_seconds(&self) -> usize {
        self.every_day.len()
    }

    /// Total number of every-day entries
    #[must_use]
    pub fn every_day_count(&self) -> usize {
        self.every_day.values().map(Vec::len).sum()
    }

    /// Add an entry that fires once at `(day, second)`
    ///
    /// # Errors
    ///
    /// Returns `SecondOutOfRange` if `second` is not in `[0, day_length)`.
    pub fn register_once(&mut self, day: u32, second: u32, data: O) -> Result<EventHandle, OutbreakError> {
        self.check_second(second)?;
        let handle = self.next_handle();
        self.once
            .entry(day)
            .or_default()
            .entry(second)
            .or_default()
            .push((handle, data));
        self.once_index.insert(handle, (day, second));
        Ok(handle)
    }

    /// Cancel a one-shot entry that has not fired yet
    ///
    /// Returns false if the entry already fired, was purged or was cancelled before.
    pub fn cancel_once(&mut self, handle: EventHandle) -> bool {
        let Some((day, second)) = self.once_index.remove(&handle) else {
            return false;
        };
        if let Some(seconds) = self.once.get_mut(&day) {
            if let Some(entries) = seconds.get_mut(&second) {
                entries.retain(|(entry_handle, _)| *entry_handle != handle);
                if entries.is_empty() {
                    seconds.remove(&second);
                }
            }
            if seconds.is_empty() {
                self.once.remove(&day);
            }
        }
        true
    }

    /// Remove and return every one-shot entry at `(day, second)`, in registration order
    pub fn take_once(&mut self, day: u32, second: u32) -> Vec<(EventHandle, O)> {
        let Some(seconds) = self.once.get_mut(&day) else {
            return Vec::new();
        };
        let entries = seconds.remove(&second).unwrap_or_default();
        if seconds.is_empty() {
            self.once.remove(&day);
        }
        for (handle, _) in &entries {
            self.once_index.remove(handle);
        }
        entries
    }

    /// Remove every one-shot entry scheduled for a day before `current_day`
    ///
    /// Returns the number of entries dropped.
    pub fn purge_past(&mut self, current_day: u32) -> usize {
        let kept = self.once.split_off(&current_day);
        let past = std::mem::replace(&mut self.once, kept);
        let mut purged = 0;
        for entries in past.into_values().flat_map(BTreeMap::into_values) {
            for (handle, _) in entries {
                self.once_index.remove(&handle);
                purged += 1;
            }
        }
        purged
    }

    /// Total number of pending one-shot entries
    #[must_use]
    pub fn once_count(&self) -> usize {
        self.once_index.len()
    }

    /// Days that currently hold at least one one-shot entry, in increasing order
    #[must_use]
    pub fn once_days(&self) -> Vec<u32> {
        self.once.keys().copied().collect()
    }
}

/// A unique identifier for a subscription in a `HookList`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HookHandle(u64);

/// An ordered list of broadcast subscribers, such as the per-second and end-of-day hooks
pub struct HookList<T> {
    slots: Vec<Slot<HookHandle, T>>,
    handle_counter: u64,
}

impl<T> HookList<T> {
    #[must_use]
    pub fn new() -> HookList<T> {
        HookList {
            slots: Vec::new(),
            handle_counter: 0,
        }
    }

    pub fn subscribe(&mut self, data: T) -> HookHandle {
        let handle = HookHandle(self.handle_counter);
        self.handle_counter += 1;
        self.slots.push(Slot {
            handle,
            data: Some(data),
        });
        handle
    }

    pub fn unsubscribe(&mut self, handle: HookHandle) -> bool {
        let before = self.slots.len();
        self.slots.retain(|slot| slot.handle != handle);
        self.slots.len() != before
    }

    #[must_use]
    pub fn handles(&self) -> Vec<HookHandle> {
        self.slots.iter().map(|slot| slot.handle).collect()
    }

    pub fn take(&mut self, handle: HookHandle) -> Option<T> {
        self.slots
            .iter_mut()
            .find(|slot| slot.handle == handle)?
            .data
            .take()
    }

    pub fn restore(&mut self, handle: HookHandle, data: T) -> bool {
        match self.slots.iter_mut().find(|slot| slot.handle == handle) {
            Some(slot) => {
                slot.data = Some(data);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<T> Default for HookList<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> EventScheduler<u32> {
        EventScheduler::new(100)
    }

    #[test]
    fn empty_scheduler() {
        let mut schedule = scheduler();
        assert_eq!(schedule.every_day_count(), 0);
        assert_eq!(schedule.once_count(), 0);
        assert!(schedule.take_once(1, 0).is_empty());
        assert!(schedule.every_day_handles(0).is_empty());
    }

    #[test]
    fn every_day_entries_keep_registration_order() {
        let mut schedule = scheduler();
        let first = schedule.register_every_day(10, 1).unwrap();
        let second = schedule.register_every_day(10, 2).unwrap();
        schedule.register_every_day(20, 3).unwrap();

        assert_eq!(schedule.every_day_handles(10), vec![first, second]);
        assert_eq!(schedule.every_day_seconds(), 2);
        assert_eq!(schedule.every_day_count(), 3);
    }

    #[test]
    fn unregistering_last_entry_removes_the_key() {
        let mut schedule = scheduler();
        let first = schedule.register_every_day(10, 1).unwrap();
        let second = schedule.register_every_day(10, 2).unwrap();

        assert!(schedule.unregister_every_day(10, first));
        assert_eq!(schedule.every_day_seconds(), 1);
        assert!(schedule.unregister_every_day(10, second));
        assert_eq!(schedule.every_day_seconds(), 0);
        assert!(!schedule.unregister_every_day(10, second));
    }

    #[test]
    fn unregister_at_wrong_second_does_nothing() {
        let mut schedule = scheduler();
        let handle = schedule.register_every_day(10, 1).unwrap();
        assert!(!schedule.unregister_every_day(11, handle));
        assert!(schedule.is_registered_every_day(10, handle));
    }

    #[test]
    fn rejects_seconds_outside_the_day() {
        let mut schedule = scheduler();
        assert!(matches!(
            schedule.register_every_day(100, 1),
            Err(OutbreakError::SecondOutOfRange {
                second: 100,
                day_length: 100
            })
        ));
        assert!(schedule.register_once(3, 250, 1).is_err());
        assert_eq!(schedule.every_day_count(), 0);
        assert_eq!(schedule.once_count(), 0);
    }

    #[test]
    fn take_and_restore_every_day() {
        let mut schedule = scheduler();
        let handle = schedule.register_every_day(5, 7).unwrap();

        assert_eq!(schedule.take_every_day(5, handle), Some(7));
        // Taken entries stay registered but cannot be taken twice
        assert!(schedule.is_registered_every_day(5, handle));
        assert_eq!(schedule.take_every_day(5, handle), None);

        assert!(schedule.restore_every_day(5, handle, 7));
        assert_eq!(schedule.take_every_day(5, handle), Some(7));
    }

    #[test]
    fn restore_after_unregister_drops_the_payload() {
        let mut schedule = scheduler();
        let handle = schedule.register_every_day(5, 7).unwrap();
        let payload = schedule.take_every_day(5, handle).unwrap();
        assert!(schedule.unregister_every_day(5, handle));
        assert!(!schedule.restore_every_day(5, handle, payload));
        assert_eq!(schedule.every_day_seconds(), 0);
    }

    #[test]
    fn once_entries_compose_and_clear_as_a_unit() {
        let mut schedule = scheduler();
        schedule.register_once(2, 30, 1).unwrap();
        schedule.register_once(2, 30, 2).unwrap();
        schedule.register_once(2, 40, 3).unwrap();

        let fired: Vec<u32> = schedule
            .take_once(2, 30)
            .into_iter()
            .map(|(_, data)| data)
            .collect();
        assert_eq!(fired, vec![1, 2]);
        assert!(schedule.take_once(2, 30).is_empty());
        assert_eq!(schedule.once_count(), 1);
        assert_eq!(schedule.once_days(), vec![2]);

        schedule.take_once(2, 40);
        assert!(schedule.once_days().is_empty());
    }

    #[test]
    fn cancel_once_entries() {
        let mut schedule = scheduler();
        let keep = schedule.register_once(4, 10, 1).unwrap();
        let cancel = schedule.register_once(4, 10, 2).unwrap();

        assert!(schedule.cancel_once(cancel));
        assert!(!schedule.cancel_once(cancel));

        let fired = schedule.take_once(4, 10);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, keep);
        assert!(!schedule.cancel_once(keep));
    }

    #[test]
    fn purge_removes_strictly_past_days() {
        let mut schedule = scheduler();
        schedule.register_once(5, 100 - 1, 1).unwrap();
        schedule.register_once(5, 0, 2).unwrap();
        schedule.register_once(6, 10, 3).unwrap();
        schedule.register_once(9, 10, 4).unwrap();

        assert_eq!(schedule.purge_past(6), 2);
        assert_eq!(schedule.once_days(), vec![6, 9]);
        assert_eq!(schedule.once_count(), 2);
        assert!(schedule.take_once(5, 0).is_empty());
    }

    #[test]
    fn purge_bounds_memory_across_days() {
        let mut schedule = scheduler();
        for day in 1..=30 {
            for second in 0..5 {
                schedule.register_once(day, second * 10, day).unwrap();
                schedule.register_once(day + 1, second * 10, day).unwrap();
            }
            schedule.purge_past(day + 1);
            // Only entries for tomorrow or later survive
            assert!(schedule.once_days().iter().all(|d| *d > day));
            assert!(schedule.once_count() <= 10);
        }
    }

    #[test]
    fn hook_list_subscribe_take_restore() {
        let mut hooks = HookList::new();
        let a = hooks.subscribe("a");
        let b = hooks.subscribe("b");
        assert_eq!(hooks.handles(), vec![a, b]);

        assert_eq!(hooks.take(a), Some("a"));
        assert!(hooks.unsubscribe(a));
        assert!(!hooks.restore(a, "a"));
        assert_eq!(hooks.len(), 1);
        assert!(hooks.unsubscribe(b));
        assert!(hooks.is_empty());
    }
}
