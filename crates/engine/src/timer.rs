//! Restartable countdown and decay timers with lifecycle hooks.
//!
//! A timer is created stopped, started explicitly, and ticked only by the
//! [`Scheduler`](crate::scheduler::Scheduler) (`tick` is crate-private, so
//! no external caller can advance one by hand). Hooks are explicit
//! observer lists keyed by [`HookId`], subscribed and removed by identity
//! through the scheduler.

use strum::Display;

/// Identity of one subscribed hook, allocated by the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HookId(pub u64);

/// Lifecycle events a timer hook can observe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimerEvent {
    /// Fired when a stopped timer starts.
    Start,
    /// Fired on every scheduler tick that advances the timer.
    Tick,
    /// Fired once when the timer stops, naturally or explicitly.
    Stop,
}

/// How a timer advances toward its stop condition.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimerMode {
    /// Subtract `dt` each tick; progress shrinks from 1 toward 0.
    Countdown,
    /// Subtract `dt × rate` each tick; progress grows from 0 toward 1.
    Decay {
        /// Decay units consumed per second.
        rate: f32,
    },
}

/// Copyable snapshot of a timer's state, passed to hooks.
///
/// Hooks receive a snapshot rather than the timer itself so a hook can
/// never restart or re-enter the timer it is observing.
#[derive(Clone, Copy, Debug)]
pub struct TimerView {
    /// Seconds (or decay units) left before the stop condition.
    pub remaining: f32,
    /// Full duration the timer resets to on start.
    pub total: f32,
    /// Mode-dependent completion fraction, see [`Timer::progress`].
    pub progress: f32,
    /// Whether the timer is currently running.
    pub running: bool,
}

/// Callback invoked with a snapshot of the firing timer.
pub type TimerCallback = Box<dyn FnMut(TimerView)>;

#[derive(Default)]
struct TimerHooks {
    start: Vec<(HookId, TimerCallback)>,
    tick: Vec<(HookId, TimerCallback)>,
    stop: Vec<(HookId, TimerCallback)>,
}

/// A restartable countdown or decay value.
///
/// Lifecycle: created stopped → `start()` resets `remaining` to `total`
/// and fires `Start` → each scheduler tick decrements `remaining`, firing
/// `Tick`, until `remaining <= 0` triggers `stop()` and `Stop` → may be
/// restarted any number of times. `pause`/`resume` gate ticking without
/// firing stop hooks.
pub struct Timer {
    mode: TimerMode,
    total: f32,
    remaining: f32,
    running: bool,
    paused: bool,
    finished: bool,
    hooks: TimerHooks,
}

impl Timer {
    /// A countdown over `total` seconds. Created stopped.
    pub fn countdown(total: f32) -> Self {
        Self::with_mode(total, TimerMode::Countdown)
    }

    /// A decay timer consuming `total` units at `rate` units per second.
    /// Created stopped.
    pub fn decay(total: f32, rate: f32) -> Self {
        Self::with_mode(total, TimerMode::Decay { rate })
    }

    fn with_mode(total: f32, mode: TimerMode) -> Self {
        Self {
            mode,
            total,
            remaining: 0.0,
            running: false,
            paused: false,
            finished: false,
            hooks: TimerHooks::default(),
        }
    }

    /// Start the timer.
    ///
    /// A no-op warning when `total <= 0`, and a silent no-op while already
    /// running: only a stopped timer transitions on start.
    pub fn start(&mut self) {
        if self.total <= 0.0 {
            tracing::warn!(total = self.total, "timer start ignored: non-positive duration");
            return;
        }
        if self.running {
            return;
        }
        self.remaining = self.total;
        self.running = true;
        self.paused = false;
        self.finished = false;
        self.fire(TimerEvent::Start);
    }

    /// Stop the timer, firing `Stop` hooks. Idempotent.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.finished = true;
        self.fire(TimerEvent::Stop);
    }

    /// Suspend ticking without stopping. No hooks fire.
    pub fn pause(&mut self) {
        if self.running {
            self.paused = true;
        }
    }

    /// Resume a paused timer.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Advance the timer by `dt` seconds. Scheduler-only.
    pub(crate) fn tick(&mut self, dt: f32) {
        debug_assert!(dt >= 0.0, "negative dt");
        if !self.running || self.paused {
            return;
        }
        let step = match self.mode {
            TimerMode::Countdown => dt,
            TimerMode::Decay { rate } => dt * rate,
        };
        self.remaining = (self.remaining - step).max(0.0);
        self.fire(TimerEvent::Tick);
        if self.remaining <= 0.0 {
            self.stop();
        }
    }

    /// Mode-dependent completion fraction.
    ///
    /// Countdown progress shrinks from 1 toward 0; decay progress grows
    /// from 0 toward 1. Both reach their terminal value exactly when the
    /// shared stop condition (`remaining <= 0`) fires.
    pub fn progress(&self) -> f32 {
        if self.total <= 0.0 {
            return 0.0;
        }
        match self.mode {
            TimerMode::Countdown => self.remaining / self.total,
            TimerMode::Decay { .. } => 1.0 - self.remaining / self.total,
        }
    }

    /// Seconds (or decay units) left before the stop condition.
    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    /// The duration the timer resets to on start.
    pub fn total(&self) -> f32 {
        self.total
    }

    /// The advance mode.
    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// True once the timer has stopped (naturally or explicitly) since its
    /// last start.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn subscribe(&mut self, event: TimerEvent, id: HookId, callback: TimerCallback) {
        let list = match event {
            TimerEvent::Start => &mut self.hooks.start,
            TimerEvent::Tick => &mut self.hooks.tick,
            TimerEvent::Stop => &mut self.hooks.stop,
        };
        list.push((id, callback));
    }

    /// Remove a hook by identity from whichever event list holds it.
    pub(crate) fn unsubscribe(&mut self, id: HookId) -> bool {
        for list in [
            &mut self.hooks.start,
            &mut self.hooks.tick,
            &mut self.hooks.stop,
        ] {
            if let Some(index) = list.iter().position(|(hook, _)| *hook == id) {
                list.remove(index);
                return true;
            }
        }
        false
    }

    pub(crate) fn hook_count(&self) -> usize {
        self.hooks.start.len() + self.hooks.tick.len() + self.hooks.stop.len()
    }

    fn view(&self) -> TimerView {
        TimerView {
            remaining: self.remaining,
            total: self.total,
            progress: self.progress(),
            running: self.running,
        }
    }

    fn fire(&mut self, event: TimerEvent) {
        let view = self.view();
        let list = match event {
            TimerEvent::Start => &mut self.hooks.start,
            TimerEvent::Tick => &mut self.hooks.tick,
            TimerEvent::Stop => &mut self.hooks.stop,
        };
        for (_, callback) in list.iter_mut() {
            callback(view);
        }
    }
}

impl core::fmt::Debug for Timer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Timer")
            .field("mode", &self.mode)
            .field("total", &self.total)
            .field("remaining", &self.remaining)
            .field("running", &self.running)
            .field("paused", &self.paused)
            .field("finished", &self.finished)
            .field("hooks", &self.hook_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn countdown_lifecycle_and_exact_stop_frame() {
        let mut timer = Timer::countdown(3.0);
        assert!(!timer.is_running());

        timer.start();
        assert!(timer.is_running());
        assert_eq!(timer.remaining(), 3.0);
        assert_eq!(timer.progress(), 1.0);

        timer.tick(1.0);
        assert!(timer.is_running());
        timer.tick(1.0);
        assert!(timer.is_running());
        // Stops at the frame where remaining first reaches 0, never before.
        timer.tick(1.0);
        assert!(!timer.is_running());
        assert!(timer.is_finished());
        assert_eq!(timer.progress(), 0.0);
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let mut timer = Timer::countdown(5.0);
        timer.start();
        timer.tick(2.0);
        timer.start();
        assert_eq!(timer.remaining(), 3.0);
    }

    #[test]
    fn zero_duration_start_is_a_no_op() {
        let mut timer = Timer::countdown(0.0);
        timer.start();
        assert!(!timer.is_running());
        assert!(!timer.is_finished());
    }

    #[test]
    fn decay_progress_grows_while_countdown_shrinks() {
        let mut countdown = Timer::countdown(4.0);
        let mut decay = Timer::decay(4.0, 2.0);
        countdown.start();
        decay.start();
        assert_eq!(countdown.progress(), 1.0);
        assert_eq!(decay.progress(), 0.0);

        countdown.tick(1.0);
        decay.tick(1.0); // consumes 2.0 units
        assert_eq!(countdown.progress(), 0.75);
        assert_eq!(decay.progress(), 0.5);

        decay.tick(1.0);
        assert!(decay.is_finished());
        assert_eq!(decay.progress(), 1.0);
    }

    #[test]
    fn pause_gates_ticking_without_stop_hooks() {
        let mut timer = Timer::countdown(2.0);
        let stops = Rc::new(Cell::new(0u32));
        let observed = Rc::clone(&stops);
        timer.subscribe(
            TimerEvent::Stop,
            HookId(1),
            Box::new(move |_| observed.set(observed.get() + 1)),
        );

        timer.start();
        timer.pause();
        timer.tick(10.0);
        assert!(timer.is_running());
        assert_eq!(timer.remaining(), 2.0);
        assert_eq!(stops.get(), 0);

        timer.resume();
        timer.tick(2.0);
        assert!(!timer.is_running());
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn stop_hooks_fire_once_and_restart_rearms() {
        let mut timer = Timer::countdown(1.0);
        let stops = Rc::new(Cell::new(0u32));
        let observed = Rc::clone(&stops);
        timer.subscribe(
            TimerEvent::Stop,
            HookId(1),
            Box::new(move |view| {
                assert!(!view.running);
                observed.set(observed.get() + 1);
            }),
        );

        timer.start();
        timer.tick(1.0);
        timer.stop(); // already stopped: idempotent
        assert_eq!(stops.get(), 1);

        timer.start();
        timer.tick(1.0);
        assert_eq!(stops.get(), 2);
    }

    #[test]
    fn unsubscribe_removes_by_identity() {
        let mut timer = Timer::countdown(1.0);
        timer.subscribe(TimerEvent::Tick, HookId(1), Box::new(|_| {}));
        timer.subscribe(TimerEvent::Stop, HookId(2), Box::new(|_| {}));
        assert_eq!(timer.hook_count(), 2);
        assert!(timer.unsubscribe(HookId(1)));
        assert!(!timer.unsubscribe(HookId(1)));
        assert_eq!(timer.hook_count(), 1);
    }
}
