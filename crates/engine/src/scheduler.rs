//! Owner-keyed timer scheduler.
//!
//! The scheduler owns every registered [`Timer`] in a generational slab
//! and ticks two flat lanes (regular and fixed-step) once per
//! corresponding logical frame. Each owner gets a manifest recording the
//! timers it registered and the hooks it subscribed (including hooks on
//! other owners' timers), so [`Scheduler::unregister_all`] is a single
//! call that leaves nothing of the owner reachable.
//!
//! Lanes are iterated backwards so an entry removed mid-tick never
//! corrupts iteration.

use std::collections::HashMap;
use std::fmt;

use crate::error::ScheduleError;
use crate::timer::{HookId, Timer, TimerCallback, TimerEvent};

/// Stable, comparable handle for an entity that owns timers and hooks.
///
/// Must remain valid for the owner's full lifetime; the owner's teardown
/// path must call [`Scheduler::unregister_all`] exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OwnerId(pub u32);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Generational handle to a timer owned by the scheduler's slab.
///
/// Stale handles (unregistered, or from a torn-down owner) are inert:
/// every operation taking a handle treats a miss as a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimerHandle {
    index: u32,
    generation: u32,
}

struct Entry {
    owner: OwnerId,
    timer: Timer,
    fixed: bool,
}

struct SlabSlot {
    generation: u32,
    entry: Option<Entry>,
}

/// Generational slab: stable indices, O(1) insert/remove, slot reuse.
#[derive(Default)]
struct TimerSlab {
    slots: Vec<SlabSlot>,
    free: Vec<u32>,
    len: usize,
}

impl TimerSlab {
    fn insert(&mut self, entry: Entry) -> TimerHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            TimerHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(SlabSlot {
                generation: 0,
                entry: Some(entry),
            });
            TimerHandle {
                index,
                generation: 0,
            }
        }
    }

    fn remove(&mut self, handle: TimerHandle) -> Option<Entry> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || slot.entry.is_none() {
            return None;
        }
        let entry = slot.entry.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        entry
    }

    fn get(&self, handle: TimerHandle) -> Option<&Entry> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn get_mut(&mut self, handle: TimerHandle) -> Option<&mut Entry> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// Per-owner record of everything teardown must release.
#[derive(Default)]
struct Manifest {
    timers: Vec<TimerHandle>,
    hooks: Vec<(TimerHandle, HookId)>,
}

/// Global registry that ticks all live timers and bulk-cleans an owner's
/// timers and hooks.
#[derive(Default)]
pub struct Scheduler {
    slab: TimerSlab,
    regular: Vec<TimerHandle>,
    fixed: Vec<TimerHandle>,
    manifests: HashMap<OwnerId, Manifest>,
    next_hook: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a timer under `owner`, creating the owner's manifest on
    /// first registration. The timer lands in the fixed-step lane when
    /// `fixed` is set, the regular lane otherwise.
    pub fn register(&mut self, owner: OwnerId, timer: Timer, fixed: bool) -> TimerHandle {
        let handle = self.slab.insert(Entry {
            owner,
            timer,
            fixed,
        });
        if fixed {
            self.fixed.push(handle);
        } else {
            self.regular.push(handle);
        }
        self.manifests.entry(owner).or_default().timers.push(handle);
        tracing::debug!(%owner, ?handle, fixed, "timer registered");
        handle
    }

    /// Subscribe `callback` to a timer event, tracked under `owner` so the
    /// owner's teardown unsubscribes it even when the timer belongs to
    /// someone else.
    ///
    /// Misuse to call before `owner` has ever registered a timer: there is
    /// no manifest to track the hook yet. Register at least one timer
    /// (even a disabled one) first.
    pub fn subscribe(
        &mut self,
        owner: OwnerId,
        handle: TimerHandle,
        event: TimerEvent,
        callback: TimerCallback,
    ) -> Result<HookId, ScheduleError> {
        if !self.manifests.contains_key(&owner) {
            tracing::warn!(%owner, %event, "hook subscription before first timer registration");
            return Err(ScheduleError::ManifestMissing(owner));
        }
        let Some(entry) = self.slab.get_mut(handle) else {
            tracing::warn!(%owner, ?handle, "hook subscription on stale timer handle");
            return Err(ScheduleError::StaleTimer);
        };

        let id = HookId(self.next_hook);
        self.next_hook += 1;
        entry.timer.subscribe(event, id, callback);
        if let Some(manifest) = self.manifests.get_mut(&owner) {
            manifest.hooks.push((handle, id));
        }
        Ok(id)
    }

    /// Remove a hook by identity. No-op when the timer or hook is gone.
    pub fn unsubscribe(&mut self, handle: TimerHandle, hook: HookId) -> bool {
        match self.slab.get_mut(handle) {
            Some(entry) => entry.timer.unsubscribe(hook),
            None => false,
        }
    }

    /// Tick every running timer in the regular lane by `dt` seconds.
    pub fn tick_regular(&mut self, dt: f32) {
        Self::tick_lane(&mut self.slab, &mut self.regular, dt);
    }

    /// Tick every running timer in the fixed-step lane by `dt` seconds.
    pub fn tick_fixed(&mut self, dt: f32) {
        Self::tick_lane(&mut self.slab, &mut self.fixed, dt);
    }

    fn tick_lane(slab: &mut TimerSlab, lane: &mut Vec<TimerHandle>, dt: f32) {
        debug_assert!(dt >= 0.0, "negative dt");
        // Backwards, so pruning a dead handle never skips a live one.
        for i in (0..lane.len()).rev() {
            let handle = lane[i];
            match slab.get_mut(handle) {
                Some(entry) => {
                    if entry.timer.is_running() && !entry.timer.is_paused() {
                        entry.timer.tick(dt);
                    }
                }
                None => {
                    lane.swap_remove(i);
                }
            }
        }
    }

    /// Unregister one timer. Stale handles are a no-op.
    pub fn unregister(&mut self, handle: TimerHandle) -> bool {
        let Some(entry) = self.slab.remove(handle) else {
            return false;
        };
        let lane = if entry.fixed {
            &mut self.fixed
        } else {
            &mut self.regular
        };
        lane.retain(|&h| h != handle);
        if let Some(manifest) = self.manifests.get_mut(&entry.owner) {
            manifest.timers.retain(|&h| h != handle);
        }
        // Any owner may have hooked this timer; drop every record keyed
        // by the dead handle so hook counts stay honest.
        for manifest in self.manifests.values_mut() {
            manifest.hooks.retain(|&(h, _)| h != handle);
        }
        true
    }

    /// Tear down everything `owner` registered or subscribed: its timers
    /// leave both lanes and the slab, and its hooks leave every timer they
    /// were attached to. Calling again is a no-op.
    pub fn unregister_all(&mut self, owner: OwnerId) {
        let Some(manifest) = self.manifests.remove(&owner) else {
            return;
        };
        for handle in &manifest.timers {
            if let Some(entry) = self.slab.remove(*handle) {
                let lane = if entry.fixed {
                    &mut self.fixed
                } else {
                    &mut self.regular
                };
                lane.retain(|h| h != handle);
            }
        }
        for (handle, hook) in &manifest.hooks {
            if let Some(entry) = self.slab.get_mut(*handle) {
                entry.timer.unsubscribe(*hook);
            }
        }
        // Other owners' hook records on the dead timers are stale now.
        for other in self.manifests.values_mut() {
            other
                .hooks
                .retain(|(handle, _)| !manifest.timers.contains(handle));
        }
        tracing::debug!(
            %owner,
            timers = manifest.timers.len(),
            hooks = manifest.hooks.len(),
            "owner manifest torn down"
        );
    }

    /// Start the timer behind `handle`. Stale handles are a no-op.
    pub fn start(&mut self, handle: TimerHandle) -> bool {
        match self.slab.get_mut(handle) {
            Some(entry) => {
                entry.timer.start();
                true
            }
            None => false,
        }
    }

    /// Stop the timer behind `handle`, firing its stop hooks synchronously.
    pub fn stop(&mut self, handle: TimerHandle) -> bool {
        match self.slab.get_mut(handle) {
            Some(entry) => {
                entry.timer.stop();
                true
            }
            None => false,
        }
    }

    /// Pause the timer behind `handle`.
    pub fn pause(&mut self, handle: TimerHandle) -> bool {
        match self.slab.get_mut(handle) {
            Some(entry) => {
                entry.timer.pause();
                true
            }
            None => false,
        }
    }

    /// Resume the timer behind `handle`.
    pub fn resume(&mut self, handle: TimerHandle) -> bool {
        match self.slab.get_mut(handle) {
            Some(entry) => {
                entry.timer.resume();
                true
            }
            None => false,
        }
    }

    /// The timer behind `handle`, if still registered.
    pub fn timer(&self, handle: TimerHandle) -> Option<&Timer> {
        self.slab.get(handle).map(|entry| &entry.timer)
    }

    /// The owner a timer was registered under.
    pub fn timer_owner(&self, handle: TimerHandle) -> Option<OwnerId> {
        self.slab.get(handle).map(|entry| entry.owner)
    }

    pub fn is_registered(&self, handle: TimerHandle) -> bool {
        self.slab.get(handle).is_some()
    }

    /// Total number of registered timers across both lanes.
    pub fn timer_count(&self) -> usize {
        self.slab.len()
    }

    /// Number of timers `owner` currently has registered.
    pub fn owner_timer_count(&self, owner: OwnerId) -> usize {
        self.manifests
            .get(&owner)
            .map_or(0, |manifest| manifest.timers.len())
    }

    /// Number of hook subscriptions `owner` currently tracks.
    pub fn owner_hook_count(&self, owner: OwnerId) -> usize {
        self.manifests
            .get(&owner)
            .map_or(0, |manifest| manifest.hooks.len())
    }

    /// Number of hooks attached to a timer, across all events.
    pub fn hook_count(&self, handle: TimerHandle) -> usize {
        self.slab
            .get(handle)
            .map_or(0, |entry| entry.timer.hook_count())
    }

    /// Whether `owner` has a manifest (has ever registered a timer).
    pub fn has_manifest(&self, owner: OwnerId) -> bool {
        self.manifests.contains_key(&owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    const ALICE: OwnerId = OwnerId(1);
    const BOB: OwnerId = OwnerId(2);

    #[test]
    fn registered_timer_ticks_to_expiry() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.register(ALICE, Timer::countdown(2.0), false);
        assert_eq!(scheduler.timer_owner(handle), Some(ALICE));
        scheduler.start(handle);

        scheduler.tick_regular(1.0);
        assert!(scheduler.timer(handle).unwrap().is_running());
        scheduler.tick_regular(1.0);
        let timer = scheduler.timer(handle).unwrap();
        assert!(!timer.is_running());
        assert!(timer.is_finished());
        // Expired timers stay registered until explicitly unregistered.
        assert_eq!(scheduler.timer_count(), 1);
    }

    #[test]
    fn lanes_tick_independently() {
        let mut scheduler = Scheduler::new();
        let regular = scheduler.register(ALICE, Timer::countdown(1.0), false);
        let fixed = scheduler.register(ALICE, Timer::countdown(1.0), true);
        scheduler.start(regular);
        scheduler.start(fixed);

        scheduler.tick_regular(1.0);
        assert!(scheduler.timer(regular).unwrap().is_finished());
        assert!(scheduler.timer(fixed).unwrap().is_running());

        scheduler.tick_fixed(1.0);
        assert!(scheduler.timer(fixed).unwrap().is_finished());
    }

    #[test]
    fn subscribe_before_any_registration_is_misuse() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.register(ALICE, Timer::countdown(1.0), false);

        let result = scheduler.subscribe(BOB, handle, TimerEvent::Stop, Box::new(|_| {}));
        assert_eq!(result, Err(ScheduleError::ManifestMissing(BOB)));

        // A single (even never-started) registration unlocks subscription.
        scheduler.register(BOB, Timer::countdown(1.0), false);
        let result = scheduler.subscribe(BOB, handle, TimerEvent::Stop, Box::new(|_| {}));
        assert!(result.is_ok());
    }

    #[test]
    fn stop_hooks_fire_from_within_a_tick() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.register(ALICE, Timer::countdown(1.0), false);
        let stopped = Rc::new(Cell::new(false));
        let observed = Rc::clone(&stopped);
        scheduler
            .subscribe(
                ALICE,
                handle,
                TimerEvent::Stop,
                Box::new(move |_| observed.set(true)),
            )
            .unwrap();

        scheduler.start(handle);
        scheduler.tick_regular(0.5);
        assert!(!stopped.get());
        scheduler.tick_regular(0.5);
        assert!(stopped.get());
    }

    #[test]
    fn unregister_all_leaves_nothing_reachable() {
        let mut scheduler = Scheduler::new();
        let mut handles = Vec::new();
        for i in 0..4 {
            handles.push(scheduler.register(ALICE, Timer::countdown(5.0), i % 2 == 0));
        }
        let shared = scheduler.register(BOB, Timer::countdown(5.0), false);
        // Alice hooks one of her own timers and one of Bob's.
        scheduler
            .subscribe(ALICE, handles[0], TimerEvent::Stop, Box::new(|_| {}))
            .unwrap();
        scheduler
            .subscribe(ALICE, shared, TimerEvent::Stop, Box::new(|_| {}))
            .unwrap();
        assert_eq!(scheduler.timer_count(), 5);
        assert_eq!(scheduler.hook_count(shared), 1);

        scheduler.unregister_all(ALICE);

        assert_eq!(scheduler.owner_timer_count(ALICE), 0);
        assert_eq!(scheduler.owner_hook_count(ALICE), 0);
        assert!(!scheduler.has_manifest(ALICE));
        for handle in handles {
            assert!(!scheduler.is_registered(handle));
        }
        // Bob's timer survives, but Alice's hook on it is gone.
        assert!(scheduler.is_registered(shared));
        assert_eq!(scheduler.hook_count(shared), 0);
        assert_eq!(scheduler.timer_count(), 1);

        // Second teardown is a no-op.
        scheduler.unregister_all(ALICE);
        assert_eq!(scheduler.timer_count(), 1);
    }

    #[test]
    fn foreign_hook_records_die_with_the_timer() {
        let mut scheduler = Scheduler::new();
        let shared = scheduler.register(ALICE, Timer::countdown(5.0), false);
        scheduler.register(BOB, Timer::countdown(5.0), false);
        scheduler
            .subscribe(BOB, shared, TimerEvent::Stop, Box::new(|_| {}))
            .unwrap();
        assert_eq!(scheduler.owner_hook_count(BOB), 1);

        // Bob's record goes down with Alice's timer, not with Bob.
        scheduler.unregister(shared);
        assert_eq!(scheduler.owner_hook_count(BOB), 0);

        // Same through bulk teardown of the timer's owner.
        let shared = scheduler.register(ALICE, Timer::countdown(5.0), false);
        scheduler
            .subscribe(BOB, shared, TimerEvent::Stop, Box::new(|_| {}))
            .unwrap();
        assert_eq!(scheduler.owner_hook_count(BOB), 1);
        scheduler.unregister_all(ALICE);
        assert_eq!(scheduler.owner_hook_count(BOB), 0);
        // Bob's own timer registration is untouched.
        assert_eq!(scheduler.owner_timer_count(BOB), 1);
    }

    #[test]
    fn stale_handles_are_inert() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.register(ALICE, Timer::countdown(1.0), false);
        assert!(scheduler.unregister(handle));
        assert!(!scheduler.unregister(handle));
        assert!(!scheduler.start(handle));
        assert!(!scheduler.stop(handle));
        assert!(scheduler.timer(handle).is_none());
        assert_eq!(
            scheduler.subscribe(ALICE, handle, TimerEvent::Stop, Box::new(|_| {})),
            Err(ScheduleError::StaleTimer)
        );

        // The slot is recycled under a new generation; the old handle
        // still misses.
        let replacement = scheduler.register(ALICE, Timer::countdown(1.0), false);
        assert!(scheduler.is_registered(replacement));
        assert!(!scheduler.is_registered(handle));
    }

    #[test]
    fn dead_handles_are_pruned_from_lanes_during_tick() {
        let mut scheduler = Scheduler::new();
        let a = scheduler.register(ALICE, Timer::countdown(5.0), false);
        let b = scheduler.register(ALICE, Timer::countdown(5.0), false);
        let c = scheduler.register(ALICE, Timer::countdown(5.0), false);
        scheduler.start(a);
        scheduler.start(b);
        scheduler.start(c);
        scheduler.unregister(b);

        scheduler.tick_regular(1.0);
        assert_eq!(scheduler.timer(a).unwrap().remaining(), 4.0);
        assert_eq!(scheduler.timer(c).unwrap().remaining(), 4.0);
        assert_eq!(scheduler.timer_count(), 2);
    }
}
