//! Attribute-modification and timed-lifecycle engine.
//!
//! `stat-engine` attaches, stacks, and automatically expires numeric
//! transformations ("modifiers") on tagged attributes ("stats") owned by
//! arbitrary game entities. The pieces compose bottom-up:
//!
//! - [`Timer`]: a restartable countdown/decay value with lifecycle hooks.
//! - [`Scheduler`]: owner-keyed registry that ticks every live timer once
//!   per logical frame (regular and fixed-step lanes) and bulk-releases
//!   everything an owner registered or subscribed on teardown.
//! - [`Modifier`]: a pure, content-hashed value transform for one stat
//!   tag.
//! - [`Stat`]: an ordered pipeline of modifier slots folded over a base
//!   value, with change reactions and decorator-driven timed expiry.
//! - [`Router`]: per-owner `TypeId → apply` tables so gameplay code can
//!   route an opaque modifier to whatever entity got hit, without a
//!   switch over concrete owner types.
//!
//! The engine is single-threaded and frame-stepped: an external loop
//! calls [`Scheduler::tick_regular`] and [`Scheduler::tick_fixed`] once
//! per frame, then reaps expired slots on live stats via
//! [`Stat::reap_expired`]. There is no persistence and no wire surface.

pub mod error;
pub mod modifier;
pub mod router;
pub mod scheduler;
pub mod stat;
pub mod timer;
pub mod value;

pub use error::{EngineError, ErrorSeverity, ScheduleError};
pub use modifier::{AnyModifier, Modifier, ModifierHash, ModifierOp, StatTag};
pub use router::{HostBindings, RouteCtx, Router, StatHost};
pub use scheduler::{OwnerId, Scheduler, TimerHandle};
pub use stat::{DecoratorId, ReactionId, SlotId, Stat, TimedDecoration};
pub use timer::{HookId, Timer, TimerCallback, TimerEvent, TimerMode, TimerView};
pub use value::StatValue;
