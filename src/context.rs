//! The central simulation object.
//!
//! A `Context` owns everything that used to be reached through global lookups in a game engine:
//! the [`VirtualClock`], the [`EventScheduler`] with its per-second and end-of-day hooks, the
//! daily transmission counter, and any number of typed data containers ("data plugins") that
//! modules use to keep their state. Modules add behavior through extension traits on `Context`
//! (`ContextHealthExt`, `ContextFacilityExt`, ...).
//!
//! Simulated time only moves through [`Context::tick`]. Each tick resolves everything due at the
//! new instant before returning, in this order:
//!
//! 1. per-second hooks;
//! 2. on day rollover: reset of the daily transmission counter, end-of-day hooks and purge of
//!    one-shot events left on past days;
//! 3. every-day events registered at the new second, except those registered earlier in the
//!    same tick, which first fire on the next day;
//! 4. one-shot events registered at the new `(day, second)`;
//! 5. callbacks queued by any of the above, including event handlers.
use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::rc::Rc;
use std::thread;

use crate::clock::{ClockAdvance, SimulationSpeed, VirtualClock};
use crate::error::OutbreakError;
use crate::event::Event;
use crate::hashing::{HashMap, HashSet};
use crate::log::trace;
use crate::schedule::{EventHandle, EventScheduler, HookHandle, HookList};

/// A trait for objects that can provide data containers to be held by `Context`
pub trait DataPlugin: Any {
    type DataContainer;

    fn create_data_container() -> Self::DataContainer;
}

/// Defines a new type for storing data in `Context`.
#[macro_export]
macro_rules! define_data_plugin {
    ($plugin:ident, $data_container:ty, $default: expr) => {
        #[derive(Copy, Clone)]
        struct $plugin;

        impl $crate::context::DataPlugin for $plugin {
            type DataContainer = $data_container;

            fn create_data_container() -> Self::DataContainer {
                $default
            }
        }
    };
}
pub use define_data_plugin;

type Callback = dyn FnOnce(&mut Context);
/// A handler fired every simulated day at a fixed second. The return value reports whether the
/// handler acted; the scheduler ignores it.
pub type EveryDayCallback = dyn FnMut(&mut Context) -> bool;
/// A handler fired once at an absolute `(day, second)`.
pub type OnceCallback = dyn FnOnce(&mut Context) -> bool;
/// A broadcast subscriber (per-second or end-of-day).
pub type HookCallback = dyn FnMut(&mut Context);
type EventHandlers<E> = Vec<Rc<dyn Fn(&mut Context, E)>>;

/// Result of a single [`Context::tick`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The clock is paused or at zero speed; nothing happened.
    Suspended,
    Advanced(ClockAdvance),
}

/// Why an `execute_*` loop returned
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The requested instant was reached.
    Completed,
    /// The clock is halted and nothing inside the simulation can resume it.
    Suspended,
    /// `shutdown()` was called.
    Shutdown,
}

pub struct Context {
    clock: VirtualClock,
    scheduler: EventScheduler<Box<EveryDayCallback>, Box<OnceCallback>>,
    per_second_hooks: HookList<Box<HookCallback>>,
    end_of_day_hooks: HookList<Box<HookCallback>>,
    callback_queue: VecDeque<Box<Callback>>,
    event_handlers: HashMap<TypeId, Box<dyn Any>>,
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    firing_instant: Option<(u32, u32)>,
    // Every-day events registered at the current second; they wait for the next day.
    deferred_every_day: HashSet<EventHandle>,
    daily_transmissions: u32,
    shutdown_requested: bool,
}

impl Context {
    /// Create a context with a default clock (5000-second days, day 1 at midday)
    #[must_use]
    pub fn new() -> Context {
        Context::with_clock(VirtualClock::default())
    }

    #[must_use]
    pub fn with_clock(clock: VirtualClock) -> Context {
        Context {
            scheduler: EventScheduler::new(clock.day_length()),
            clock,
            per_second_hooks: HookList::new(),
            end_of_day_hooks: HookList::new(),
            callback_queue: VecDeque::new(),
            event_handlers: HashMap::default(),
            data_plugins: HashMap::default(),
            firing_instant: None,
            deferred_every_day: HashSet::default(),
            daily_transmissions: 0,
            shutdown_requested: false,
        }
    }

    #[must_use]
    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    #[must_use]
    pub fn current_day(&self) -> u32 {
        self.clock.current_day()
    }

    #[must_use]
    pub fn current_second(&self) -> u32 {
        self.clock.current_second()
    }

    #[must_use]
    pub fn day_length(&self) -> u32 {
        self.clock.day_length()
    }

    pub fn set_speed(&mut self, speed: SimulationSpeed) {
        trace!("speed set to {:?}", speed);
        self.clock.set_speed(speed);
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn resume(&mut self) {
        self.clock.resume();
    }

    /// Read-only access to the event storage, for inspection
    #[must_use]
    pub fn scheduler(&self) -> &EventScheduler<Box<EveryDayCallback>, Box<OnceCallback>> {
        &self.scheduler
    }

    /// Register `callback` to run every day at `second`
    ///
    /// A callback registered at the current second first runs on the next day, even when the
    /// current instant has not been fired yet.
    ///
    /// # Errors
    ///
    /// Returns `SecondOutOfRange` if `second` does not fit in a day.
    pub fn register_every_day(
        &mut self,
        second: u32,
        callback: impl FnMut(&mut Context) -> bool + 'static,
    ) -> Result<EventHandle, OutbreakError> {
        let handle = self.scheduler.register_every_day(second, Box::new(callback))?;
        if second == self.clock.current_second() {
            self.deferred_every_day.insert(handle);
        }
        Ok(handle)
    }

    /// Remove an every-day callback. Takes effect immediately, even for a callback that is due
    /// later in the current tick.
    pub fn unregister_every_day(&mut self, second: u32, handle: EventHandle) -> bool {
        self.scheduler.unregister_every_day(second, handle)
    }

    /// Register `callback` to run once at `(day, second)`
    ///
    /// The instant must lie in the future. The only exception is the instant currently being
    /// fired: callbacks added for it from inside a handler run later in the same tick.
    ///
    /// # Errors
    ///
    /// Returns `SecondOutOfRange` if `second` does not fit in a day and `EventInPast` if the
    /// instant was already reached.
    pub fn register_once(
        &mut self,
        day: u32,
        second: u32,
        callback: impl FnOnce(&mut Context) -> bool + 'static,
    ) -> Result<EventHandle, OutbreakError> {
        let instant = (day, second);
        if instant <= self.clock.now() && self.firing_instant != Some(instant) {
            return Err(OutbreakError::EventInPast { day, second });
        }
        self.scheduler.register_once(day, second, Box::new(callback))
    }

    pub fn cancel_once(&mut self, handle: EventHandle) -> bool {
        self.scheduler.cancel_once(handle)
    }

    /// Subscribe to the broadcast fired after every simulated second
    pub fn subscribe_per_second(&mut self, callback: impl FnMut(&mut Context) + 'static) -> HookHandle {
        self.per_second_hooks.subscribe(Box::new(callback))
    }

    pub fn unsubscribe_per_second(&mut self, handle: HookHandle) -> bool {
        self.per_second_hooks.unsubscribe(handle)
    }

    /// Subscribe to the broadcast fired once per day rollover
    pub fn subscribe_end_of_day(&mut self, callback: impl FnMut(&mut Context) + 'static) -> HookHandle {
        self.end_of_day_hooks.subscribe(Box::new(callback))
    }

    pub fn unsubscribe_end_of_day(&mut self, handle: HookHandle) -> bool {
        self.end_of_day_hooks.unsubscribe(handle)
    }

    /// Add a callback to run after the handler currently executing returns, before the clock
    /// advances again
    pub fn queue_callback(&mut self, callback: impl FnOnce(&mut Context) + 'static) {
        self.callback_queue.push_back(Box::new(callback));
    }

    /// Register a handler for events of type `E`
    pub fn subscribe_to_event<E: Event>(&mut self, handler: impl Fn(&mut Context, E) + 'static) {
        let handlers = self
            .event_handlers
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::<EventHandlers<E>>::default());
        if let Some(handlers) = handlers.downcast_mut::<EventHandlers<E>>() {
            handlers.push(Rc::new(handler));
        }
    }

    /// Emit an event. Handlers are queued and run once the current handler returns.
    pub fn emit_event<E: Event>(&mut self, event: E) {
        let Some(handlers) = self
            .event_handlers
            .get(&TypeId::of::<E>())
            .and_then(|handlers| handlers.downcast_ref::<EventHandlers<E>>())
        else {
            return;
        };
        for handler in handlers.clone() {
            self.queue_callback(move |context| handler(context, event));
        }
    }

    fn add_plugin<T: DataPlugin>(&mut self) {
        self.data_plugins
            .insert(TypeId::of::<T>(), Box::new(T::create_data_container()));
    }

    /// Mutable access to a plugin's data container, creating it on first use
    #[allow(clippy::missing_panics_doc)]
    pub fn get_data_mut<T: DataPlugin>(&mut self, _plugin: T) -> &mut T::DataContainer {
        let type_id = TypeId::of::<T>();
        if !self.data_plugins.contains_key(&type_id) {
            self.add_plugin::<T>();
        }
        self.data_plugins
            .get_mut(&type_id)
            .and_then(|data| data.downcast_mut::<T::DataContainer>())
            .expect("data plugin container has the wrong type")
    }

    /// Shared access to a plugin's data container, if it was ever created
    #[must_use]
    pub fn get_data<T: DataPlugin>(&self, _plugin: T) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|data| data.downcast_ref::<T::DataContainer>())
    }

    /// Number of successful transmissions since the current day started
    #[must_use]
    pub fn daily_transmissions(&self) -> u32 {
        self.daily_transmissions
    }

    pub(crate) fn record_transmission(&mut self) {
        self.daily_transmissions += 1;
    }

    /// Request that any running `execute_*` loop stops after the current tick
    pub fn shutdown(&mut self) {
        trace!("shutdown requested");
        self.shutdown_requested = true;
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_requested
    }

    /// Advance the clock by one second and fire everything due at the new instant
    pub fn tick(&mut self) -> TickOutcome {
        let Some(advance) = self.clock.advance() else {
            return TickOutcome::Suspended;
        };

        self.fire_hooks(HookKind::PerSecond);
        if advance.rolled_over {
            trace!("day {} started", advance.day);
            self.daily_transmissions = 0;
            self.fire_hooks(HookKind::EndOfDay);
            let purged = self.scheduler.purge_past(advance.day);
            if purged > 0 {
                trace!("purged {} stale one-shot events", purged);
            }
        }
        self.fire_due(advance.day, advance.second);
        self.execute_queued_callbacks();
        TickOutcome::Advanced(advance)
    }

    /// Fire the every-day events registered at `second`, then the one-shot events registered at
    /// `(day, second)`
    ///
    /// The every-day handlers are snapshotted first; a handler unregistered by an earlier one in
    /// the same tick is skipped, and handlers registered during firing wait for the next day.
    pub fn fire_due(&mut self, day: u32, second: u32) {
        self.firing_instant = Some((day, second));

        for handle in self.scheduler.every_day_handles(second) {
            if self.deferred_every_day.contains(&handle) {
                continue;
            }
            let Some(mut callback) = self.scheduler.take_every_day(second, handle) else {
                continue;
            };
            callback(self);
            self.scheduler.restore_every_day(second, handle, callback);
        }

        loop {
            let due = self.scheduler.take_once(day, second);
            if due.is_empty() {
                break;
            }
            for (_, callback) in due {
                callback(self);
            }
        }

        self.deferred_every_day.clear();
        self.firing_instant = None;
    }

    fn fire_hooks(&mut self, kind: HookKind) {
        let handles = match kind {
            HookKind::PerSecond => self.per_second_hooks.handles(),
            HookKind::EndOfDay => self.end_of_day_hooks.handles(),
        };
        for handle in handles {
            let hooks = match kind {
                HookKind::PerSecond => &mut self.per_second_hooks,
                HookKind::EndOfDay => &mut self.end_of_day_hooks,
            };
            let Some(mut callback) = hooks.take(handle) else {
                continue;
            };
            callback(self);
            let hooks = match kind {
                HookKind::PerSecond => &mut self.per_second_hooks,
                HookKind::EndOfDay => &mut self.end_of_day_hooks,
            };
            hooks.restore(handle, callback);
        }
    }

    /// Run queued callbacks until the queue is empty
    pub fn execute_queued_callbacks(&mut self) {
        while let Some(callback) = self.callback_queue.pop_front() {
            callback(self);
        }
    }

    /// Tick as fast as possible until the clock reaches `(day, second)`
    pub fn execute_until(&mut self, day: u32, second: u32) -> ExecutionStatus {
        self.execute_queued_callbacks();
        loop {
            if self.shutdown_requested {
                return ExecutionStatus::Shutdown;
            }
            if self.clock.now() >= (day, second) {
                return ExecutionStatus::Completed;
            }
            if self.tick() == TickOutcome::Suspended {
                return ExecutionStatus::Suspended;
            }
        }
    }

    /// Tick as fast as possible for `days` whole simulated days
    pub fn execute_days(&mut self, days: u32) -> ExecutionStatus {
        let (day, second) = self.clock.now();
        self.execute_until(day + days, second)
    }

    /// Tick until `(day, second)`, sleeping `tick_interval` of real time before every tick
    pub fn execute_realtime(&mut self, day: u32, second: u32) -> ExecutionStatus {
        self.execute_queued_callbacks();
        loop {
            if self.shutdown_requested {
                return ExecutionStatus::Shutdown;
            }
            if self.clock.now() >= (day, second) {
                return ExecutionStatus::Completed;
            }
            let Some(interval) = self.clock.tick_interval() else {
                return ExecutionStatus::Suspended;
            };
            thread::sleep(interval);
            self.tick();
        }
    }
}

#[derive(Copy, Clone)]
enum HookKind {
    PerSecond,
    EndOfDay,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
