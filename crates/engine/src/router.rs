//! Per-owner dispatch: route a type-erased modifier to whichever stat
//! field of an owner accepts it.
//!
//! No runtime reflection: an owner type declares its routable stat fields
//! once through [`StatHost::register_stats`], and the router builds a
//! `TypeId → apply` table per owner at registration time. Routing a
//! modifier an owner has no stat for is a silent no-op, which is what
//! makes broadcasting to mixed entity sets cheap: callers never switch
//! over concrete owner types.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;

use crate::modifier::{AnyModifier, Modifier, StatTag};
use crate::scheduler::{OwnerId, Scheduler};
use crate::stat::{Stat, TimedDecoration};

/// Context threaded through a bound apply: the scheduler, the owner the
/// decoration timer registers under, and the optional duration.
pub struct RouteCtx<'a> {
    pub scheduler: &'a mut Scheduler,
    pub caster: OwnerId,
    pub duration: Option<f32>,
}

type ApplyFn = Box<dyn Fn(&mut dyn Any, &dyn AnyModifier, &mut RouteCtx<'_>) -> bool>;

/// An owner type whose stat fields can receive routed modifiers.
///
/// ```
/// # use stat_engine::{HostBindings, Stat, StatHost, StatTag};
/// # struct Speed;
/// # impl StatTag for Speed { type Value = i32; const NAME: &'static str = "speed"; }
/// struct Goblin {
///     speed: Stat<Speed>,
/// }
///
/// impl StatHost for Goblin {
///     fn register_stats(bindings: &mut HostBindings<Self>) {
///         bindings.stat(|goblin| &mut goblin.speed);
///     }
/// }
/// ```
pub trait StatHost: Any {
    /// Declare every routable stat field.
    fn register_stats(bindings: &mut HostBindings<Self>)
    where
        Self: Sized;
}

/// Registration surface handed to [`StatHost::register_stats`].
pub struct HostBindings<O: ?Sized> {
    entries: Vec<(TypeId, ApplyFn)>,
    _owner: PhantomData<fn(&mut O)>,
}

impl<O: Any> HostBindings<O> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            _owner: PhantomData,
        }
    }

    /// Bind a stat field: modifiers of type `Modifier<K>` routed to this
    /// owner will be applied through `accessor`.
    pub fn stat<K: StatTag>(&mut self, accessor: fn(&mut O) -> &mut Stat<K>) {
        let apply: ApplyFn = Box::new(move |owner, modifier, ctx| {
            let Some(owner) = owner.downcast_mut::<O>() else {
                return false;
            };
            let Some(modifier) = modifier.as_any().downcast_ref::<Modifier<K>>() else {
                return false;
            };
            let stat = accessor(owner);
            let slot = stat.apply_modifier(*modifier);
            if let Some(duration) = ctx.duration {
                // The slot was created two lines up; the decoration cannot miss.
                let _ = stat.decorate_timed(
                    slot,
                    ctx.caster,
                    TimedDecoration::new(duration),
                    ctx.scheduler,
                );
            }
            true
        });
        self.entries.push((TypeId::of::<Modifier<K>>(), apply));
    }
}

struct OwnerTable {
    by_type: HashMap<TypeId, ApplyFn>,
}

/// Per-owner routing tables, built once at owner registration and dropped
/// at owner teardown.
#[derive(Default)]
pub struct Router {
    tables: HashMap<OwnerId, OwnerTable>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the routing table for `owner` from `O`'s declared stat
    /// fields. Re-registering replaces the previous table.
    pub fn register_owner<O: StatHost>(&mut self, owner: OwnerId) {
        let mut bindings = HostBindings::<O>::new();
        O::register_stats(&mut bindings);
        let mut by_type = HashMap::with_capacity(bindings.entries.len());
        for (type_id, apply) in bindings.entries {
            by_type.insert(type_id, apply);
        }
        tracing::debug!(%owner, stats = by_type.len(), "owner routing table built");
        self.tables.insert(owner, OwnerTable { by_type });
    }

    /// Drop an owner's table at entity teardown.
    pub fn remove_owner(&mut self, owner: OwnerId) -> bool {
        self.tables.remove(&owner).is_some()
    }

    /// Apply a type-erased modifier to whichever of `owner`'s stats
    /// accepts it. Unknown owner, unknown modifier type, or a mismatched
    /// `owner` value are silent no-ops returning `false`.
    pub fn route(
        &self,
        scheduler: &mut Scheduler,
        owner_id: OwnerId,
        owner: &mut dyn Any,
        modifier: &dyn AnyModifier,
    ) -> bool {
        self.dispatch(scheduler, owner_id, owner, modifier, owner_id, None)
    }

    /// Like [`Router::route`], additionally binding the applied slot to a
    /// countdown registered under `caster`.
    pub fn route_timed(
        &self,
        scheduler: &mut Scheduler,
        owner_id: OwnerId,
        owner: &mut dyn Any,
        modifier: &dyn AnyModifier,
        caster: OwnerId,
        duration: f32,
    ) -> bool {
        self.dispatch(scheduler, owner_id, owner, modifier, caster, Some(duration))
    }

    /// Whether `owner` has a routing table.
    pub fn is_registered(&self, owner: OwnerId) -> bool {
        self.tables.contains_key(&owner)
    }

    fn dispatch(
        &self,
        scheduler: &mut Scheduler,
        owner_id: OwnerId,
        owner: &mut dyn Any,
        modifier: &dyn AnyModifier,
        caster: OwnerId,
        duration: Option<f32>,
    ) -> bool {
        let Some(table) = self.tables.get(&owner_id) else {
            tracing::trace!(%owner_id, tag = modifier.tag_name(), "route miss: unregistered owner");
            return false;
        };
        let Some(apply) = table.by_type.get(&modifier.as_any().type_id()) else {
            tracing::trace!(%owner_id, tag = modifier.tag_name(), "route miss: owner lacks stat");
            return false;
        };
        let mut ctx = RouteCtx {
            scheduler,
            caster,
            duration,
        };
        apply(owner, modifier, &mut ctx)
    }
}
