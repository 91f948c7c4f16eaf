//! Stats: ordered modifier pipelines with cached values, change
//! reactions, and decorator-driven timed lifecycles.
//!
//! A stat folds its base value left-to-right through every applied slot
//! in insertion order, so non-commutative stacks (`×2` then `+5` versus
//! the reverse) resolve deterministically. Slots own their decorators as
//! a strict tree: removing a slot cascades to every decorator's side
//! effects, while detaching one decorator never removes the slot.
//!
//! Timed expiry is pull-based. The scheduler never holds a callback into
//! a stat; instead [`Stat::reap_expired`] polls each decorator's timer
//! once per frame and removes slots whose timers finished. The frame
//! driver ticks the scheduler, then reaps every live stat.

use crate::modifier::{Modifier, ModifierHash, StatTag};
use crate::scheduler::{OwnerId, Scheduler, TimerHandle};
use crate::timer::Timer;

/// Handle to one applied modifier slot, scoped to the issuing stat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotId(pub u32);

/// Handle to one decorator on a slot, scoped to the issuing stat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecoratorId(pub u32);

/// Identity of one change reaction, for removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReactionId(pub u64);

type AttachCallback = Box<dyn FnMut()>;

/// Builder for a timed decoration: a countdown bound to a slot so that
/// expiry removes the whole slot.
///
/// `on_attach` callbacks run exactly once when the decoration attaches
/// (after the timer starts); `on_detach` callbacks run when the decorator
/// is detached or its slot is removed.
pub struct TimedDecoration {
    duration: f32,
    fixed_step: bool,
    label: Option<&'static str>,
    on_attach: Vec<AttachCallback>,
    on_detach: Vec<AttachCallback>,
}

impl TimedDecoration {
    /// A decoration expiring after `duration` seconds on the regular lane.
    pub fn new(duration: f32) -> Self {
        Self {
            duration,
            fixed_step: false,
            label: None,
            on_attach: Vec::new(),
            on_detach: Vec::new(),
        }
    }

    /// Tick the decoration's timer on the fixed-step lane instead.
    #[must_use]
    pub fn fixed_step(mut self) -> Self {
        self.fixed_step = true;
        self
    }

    /// Tag the decorator for external bookkeeping.
    #[must_use]
    pub fn label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    /// Run `callback` once when the decoration attaches.
    #[must_use]
    pub fn on_attach(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_attach.push(Box::new(callback));
        self
    }

    /// Run `callback` when the decorator detaches or its slot is removed.
    #[must_use]
    pub fn on_detach(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_detach.push(Box::new(callback));
        self
    }
}

/// A lifecycle extension attached to a slot. Slot-owned; no back-pointer.
struct Decorator {
    id: DecoratorId,
    timer: Option<TimerHandle>,
    label: Option<&'static str>,
    on_detach: Vec<AttachCallback>,
}

impl Decorator {
    /// Fire detach callbacks and release the timer, if any.
    fn detach(mut self, scheduler: &mut Scheduler) {
        for callback in &mut self.on_detach {
            callback();
        }
        if let Some(handle) = self.timer {
            scheduler.unregister(handle);
        }
    }
}

/// One applied instance of a modifier on a stat, plus its decorators.
struct ModifierSlot<K: StatTag> {
    id: SlotId,
    modifier: Modifier<K>,
    decorators: Vec<Decorator>,
    removable: bool,
}

impl<K: StatTag> ModifierSlot<K> {
    /// True when a decorator timer finished, went stale (its registering
    /// owner was torn down), or the slot was marked removable.
    fn is_expired(&self, scheduler: &Scheduler) -> bool {
        if self.removable {
            return true;
        }
        self.decorators.iter().any(|decorator| {
            decorator.timer.is_some_and(|handle| {
                scheduler
                    .timer(handle)
                    .is_none_or(|timer| timer.is_finished())
            })
        })
    }
}

/// A tagged attribute: base value, ordered modifier pipeline, cached
/// effective value, and change reactions.
pub struct Stat<K: StatTag> {
    base: K::Value,
    slots: Vec<ModifierSlot<K>>,
    cached: K::Value,
    reactions: Vec<(ReactionId, Box<dyn FnMut(K::Value)>)>,
    next_slot: u32,
    next_decorator: u32,
    next_reaction: u64,
}

impl<K: StatTag> Stat<K> {
    pub fn new(base: K::Value) -> Self {
        Self {
            base,
            slots: Vec::new(),
            cached: base,
            reactions: Vec::new(),
            next_slot: 0,
            next_decorator: 0,
            next_reaction: 0,
        }
    }

    /// The cached effective value: `base` folded through every slot in
    /// insertion order.
    pub fn value(&self) -> K::Value {
        self.cached
    }

    /// The unmodified base value.
    pub fn base(&self) -> K::Value {
        self.base
    }

    /// Replace the base value, recomputing and firing reactions.
    pub fn set_base(&mut self, base: K::Value) {
        self.base = base;
        self.recompute();
    }

    /// Apply a modifier, always creating a new slot.
    ///
    /// No deduplication happens against existing slots with an equal
    /// hash: applying `+5` twice yields two slots whose effects compose.
    /// Removal-by-hash is the explicit way to collapse duplicates.
    pub fn apply_modifier(&mut self, modifier: Modifier<K>) -> SlotId {
        let id = SlotId(self.next_slot);
        self.next_slot += 1;
        self.slots.push(ModifierSlot {
            id,
            modifier,
            decorators: Vec::new(),
            removable: false,
        });
        tracing::trace!(tag = K::NAME, slot = id.0, hash = %modifier.hash(), "modifier applied");
        self.recompute();
        id
    }

    /// Remove the first slot whose modifier hash matches, cascading its
    /// decorators' teardown. Unknown hashes are a silent no-op.
    pub fn remove_modifier(&mut self, hash: ModifierHash, scheduler: &mut Scheduler) -> bool {
        let Some(index) = self
            .slots
            .iter()
            .position(|slot| slot.modifier.hash() == hash)
        else {
            return false;
        };
        self.remove_slot_at(index, scheduler);
        true
    }

    /// Attach a timed decoration to a slot.
    ///
    /// The countdown is registered with the scheduler under `caster`,
    /// the owner issuing the decoration, which may differ from the stat's
    /// owner (a buff cast by one entity onto another's stat expires when
    /// the caster's clock says so, and dies with the caster's manifest).
    /// Returns `None` when the slot no longer exists.
    ///
    /// A non-positive (or NaN) duration is misuse: no timer is registered
    /// and the slot is marked expired instead, so the next
    /// [`Stat::reap_expired`] removes it. A zero-second buff has already
    /// run out.
    pub fn decorate_timed(
        &mut self,
        slot: SlotId,
        caster: OwnerId,
        decoration: TimedDecoration,
        scheduler: &mut Scheduler,
    ) -> Option<DecoratorId> {
        let TimedDecoration {
            duration,
            fixed_step,
            label,
            mut on_attach,
            on_detach,
        } = decoration;

        let slot = self.slots.iter_mut().find(|s| s.id == slot)?;
        if !(duration > 0.0) {
            tracing::warn!(
                tag = K::NAME,
                slot = slot.id.0,
                duration,
                "non-positive decoration duration, slot marked expired"
            );
            slot.removable = true;
            return None;
        }
        let handle = scheduler.register(caster, Timer::countdown(duration), fixed_step);
        scheduler.start(handle);

        let id = DecoratorId(self.next_decorator);
        self.next_decorator += 1;
        slot.decorators.push(Decorator {
            id,
            timer: Some(handle),
            label,
            on_detach,
        });
        for callback in &mut on_attach {
            callback();
        }
        Some(id)
    }

    /// Attach a bookkeeping-only decorator carrying a label.
    pub fn decorate_tag(&mut self, slot: SlotId, label: &'static str) -> Option<DecoratorId> {
        let slot = self.slots.iter_mut().find(|s| s.id == slot)?;
        let id = DecoratorId(self.next_decorator);
        self.next_decorator += 1;
        slot.decorators.push(Decorator {
            id,
            timer: None,
            label: Some(label),
            on_detach: Vec::new(),
        });
        Some(id)
    }

    /// Detach one decorator: its `on_detach` fires and its timer is
    /// released, but the slot and its sibling decorators persist.
    pub fn detach_decorator(
        &mut self,
        slot: SlotId,
        decorator: DecoratorId,
        scheduler: &mut Scheduler,
    ) -> bool {
        let Some(slot) = self.slots.iter_mut().find(|s| s.id == slot) else {
            return false;
        };
        let Some(index) = slot.decorators.iter().position(|d| d.id == decorator) else {
            return false;
        };
        slot.decorators.remove(index).detach(scheduler);
        true
    }

    /// Synchronously expire a slot: every decorator timer's stop-hook
    /// chain fires as if it had run out, then the whole slot is removed
    /// with full cascade. Idempotent: a second call is a no-op.
    pub fn force_stop(&mut self, slot: SlotId, scheduler: &mut Scheduler) -> bool {
        let Some(index) = self.slots.iter().position(|s| s.id == slot) else {
            return false;
        };
        self.slots[index].removable = true;
        let handles: Vec<TimerHandle> = self.slots[index]
            .decorators
            .iter()
            .filter_map(|d| d.timer)
            .collect();
        for handle in handles {
            scheduler.stop(handle);
        }
        self.remove_slot_at(index, scheduler);
        true
    }

    /// Remove every slot with a finished (or stale) decorator timer.
    ///
    /// Call once per frame after the scheduler ticks. Returns the number
    /// of slots removed. Either of two sibling timed decorators finishing
    /// removes the whole slot: expiry is slot-scoped, first-to-expire
    /// wins.
    pub fn reap_expired(&mut self, scheduler: &mut Scheduler) -> usize {
        let mut removed = 0;
        for index in (0..self.slots.len()).rev() {
            if self.slots[index].is_expired(scheduler) {
                self.remove_slot_at(index, scheduler);
                removed += 1;
            }
        }
        removed
    }

    /// Subscribe to effective-value changes. The callback fires with the
    /// new value whenever the cached value actually changes.
    pub fn on_change(&mut self, callback: impl FnMut(K::Value) + 'static) -> ReactionId {
        let id = ReactionId(self.next_reaction);
        self.next_reaction += 1;
        self.reactions.push((id, Box::new(callback)));
        id
    }

    /// Remove a change reaction by identity.
    pub fn remove_reaction(&mut self, id: ReactionId) -> bool {
        match self.reactions.iter().position(|(rid, _)| *rid == id) {
            Some(index) => {
                self.reactions.remove(index);
                true
            }
            None => false,
        }
    }

    /// True if any slot carries a modifier with this hash.
    pub fn has_modifier(&self, hash: ModifierHash) -> bool {
        self.slots.iter().any(|slot| slot.modifier.hash() == hash)
    }

    /// Number of applied slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of decorators on a slot, if it exists.
    pub fn decorator_count(&self, slot: SlotId) -> Option<usize> {
        self.slots
            .iter()
            .find(|s| s.id == slot)
            .map(|s| s.decorators.len())
    }

    /// Labels of a slot's decorators, for external bookkeeping.
    pub fn decorator_labels(&self, slot: SlotId) -> Vec<&'static str> {
        self.slots
            .iter()
            .find(|s| s.id == slot)
            .map(|s| s.decorators.iter().filter_map(|d| d.label).collect())
            .unwrap_or_default()
    }

    fn remove_slot_at(&mut self, index: usize, scheduler: &mut Scheduler) {
        let slot = self.slots.remove(index);
        tracing::trace!(tag = K::NAME, slot = slot.id.0, "slot removed");
        for decorator in slot.decorators {
            decorator.detach(scheduler);
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        let effective = self
            .slots
            .iter()
            .fold(self.base, |acc, slot| slot.modifier.apply(acc));
        if effective != self.cached {
            self.cached = effective;
            for (_, reaction) in &mut self.reactions {
                reaction(effective);
            }
        }
    }
}
