//! Focus state machine implementation.
//!
//! The machine is wall-clock-based and owns no threads or OS timers - the
//! hosting context feeds it visibility changes and calls `tick()`
//! periodically, passing the current time explicitly. Pending deadlines
//! (the warning grace period, the HP-drain schedule) are plain data owned
//! by the state that created them and are cancelled synchronously when that
//! state is left.
//!
//! ## State transitions
//!
//! ```text
//! Idle -> Focusing <-> Warning -> Penalizing
//!            ^            |           |
//!            +------------+-----------+   (visibility restored)
//! any -> Breaking (start_break), any -> Idle (reset)
//! ```
//!
//! The machine never inspects health. It only emits drain amounts; the
//! session coordinator clamps health and decides failure.

use serde::{Deserialize, Serialize};

use super::observer::{Registry, SubscriptionId};

/// Grace period between losing visibility and the penalty starting.
pub const GRACE_PERIOD_MS: u64 = 5_000;

/// Interval between HP-drain ticks while penalizing.
pub const DRAIN_INTERVAL_MS: u64 = 5_000;

/// HP removed per drain tick.
pub const DRAIN_HP: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusState {
    Idle,
    Focusing,
    /// Page lost focus/visibility during a work interval; grace period
    /// running.
    Warning,
    /// Grace period expired or a violation was forced; health draining.
    Penalizing,
    Breaking,
}

/// Signal emitted by a machine command or tick.
///
/// Registered observers are notified as each signal occurs; the same
/// signals are also returned to the caller so the driving coordinator can
/// react without re-entering the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusSignal {
    StateChanged(FocusState),
    HpDrain(u32),
}

/// Deadline owned by the `Warning` state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct GraceTimer {
    deadline_ms: u64,
}

/// Drain schedule owned by the `Penalizing` state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct DrainTimer {
    next_tick_ms: u64,
}

/// Finite-state machine governing focus/break/warning/penalty transitions.
#[derive(Debug, Serialize, Deserialize)]
pub struct FocusMachine {
    state: FocusState,
    authorized_exit: bool,
    /// Whether visibility changes are currently observed. Set by
    /// `start_focus`, cleared by `reset`.
    observing: bool,
    #[serde(default)]
    grace: Option<GraceTimer>,
    #[serde(default)]
    drain: Option<DrainTimer>,
    #[serde(skip)]
    state_observers: Registry<FocusState>,
    #[serde(skip)]
    drain_observers: Registry<u32>,
}

impl FocusMachine {
    pub fn new() -> Self {
        Self {
            state: FocusState::Idle,
            authorized_exit: false,
            observing: false,
            grace: None,
            drain: None,
            state_observers: Registry::default(),
            drain_observers: Registry::default(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> FocusState {
        self.state
    }

    pub fn authorized_exit(&self) -> bool {
        self.authorized_exit
    }

    /// True while a drain schedule is pending (state is `Penalizing`).
    pub fn draining(&self) -> bool {
        self.drain.is_some()
    }

    // ── Observers ────────────────────────────────────────────────────

    /// Register a state-change listener. Listeners fire in registration
    /// order on every transition.
    pub fn subscribe(&mut self, listener: impl FnMut(FocusState) + Send + 'static) -> SubscriptionId {
        self.state_observers.subscribe(listener)
    }

    /// Remove a state-change listener. Returns true if it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.state_observers.unsubscribe(id)
    }

    /// Register an HP-drain listener receiving the drain amount.
    pub fn on_hp_drain(&mut self, listener: impl FnMut(u32) + Send + 'static) -> SubscriptionId {
        self.drain_observers.subscribe(listener)
    }

    /// Remove an HP-drain listener. Returns true if it was registered.
    pub fn unsubscribe_hp_drain(&mut self, id: SubscriptionId) -> bool {
        self.drain_observers.unsubscribe(id)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Force the machine into `Focusing` from any prior state and begin
    /// observing visibility changes. Pending timers from a previous state
    /// are cancelled; no timer outlives the state that created it.
    pub fn start_focus(&mut self) -> Vec<FocusSignal> {
        let mut out = Vec::new();
        self.cancel_timers();
        self.observing = true;
        self.transition(FocusState::Focusing, &mut out);
        out
    }

    /// Cancel pending warning/penalty timers and force `Breaking`.
    /// Visibility changes are ignored until the next work interval.
    pub fn start_break(&mut self) -> Vec<FocusSignal> {
        let mut out = Vec::new();
        self.cancel_timers();
        self.transition(FocusState::Breaking, &mut out);
        out
    }

    /// Immediately force `Penalizing`, bypassing the grace period. Used
    /// when the extension reports a violation. Emits one drain tick at
    /// once unless a drain schedule is already running.
    pub fn force_penalty(&mut self, now_ms: u64) -> Vec<FocusSignal> {
        let mut out = Vec::new();
        self.grace = None;
        self.transition(FocusState::Penalizing, &mut out);
        if self.drain.is_none() {
            self.start_drain(now_ms, &mut out);
        }
        out
    }

    /// While true, visibility/blur transitions are suppressed entirely -
    /// no warning, no penalty. Used while the user follows a sanctioned
    /// external link.
    pub fn set_authorized_exit(&mut self, value: bool) {
        self.authorized_exit = value;
    }

    /// Cancel all timers, stop observing visibility, force `Idle`.
    pub fn reset(&mut self) -> Vec<FocusSignal> {
        let mut out = Vec::new();
        self.cancel_timers();
        self.observing = false;
        self.transition(FocusState::Idle, &mut out);
        out
    }

    // ── Inputs ───────────────────────────────────────────────────────

    /// Feed a page visibility/blur change into the machine.
    pub fn visibility_changed(&mut self, hidden: bool, now_ms: u64) -> Vec<FocusSignal> {
        let mut out = Vec::new();
        if !self.observing || self.authorized_exit {
            return out;
        }

        if hidden && self.state == FocusState::Focusing {
            self.grace = Some(GraceTimer {
                deadline_ms: now_ms + GRACE_PERIOD_MS,
            });
            self.transition(FocusState::Warning, &mut out);
        } else if !hidden && self.state == FocusState::Warning {
            self.grace = None;
            self.transition(FocusState::Focusing, &mut out);
        } else if !hidden && self.state == FocusState::Penalizing {
            self.drain = None;
            self.transition(FocusState::Focusing, &mut out);
        }
        out
    }

    /// Call periodically. Fires the grace-expiry transition and any due
    /// drain ticks.
    pub fn tick(&mut self, now_ms: u64) -> Vec<FocusSignal> {
        let mut out = Vec::new();

        if self.state == FocusState::Warning {
            if let Some(grace) = self.grace {
                if now_ms >= grace.deadline_ms {
                    self.grace = None;
                    self.transition(FocusState::Penalizing, &mut out);
                    self.start_drain(now_ms, &mut out);
                }
            }
        }

        if self.state == FocusState::Penalizing {
            while let Some(drain) = self.drain {
                if now_ms < drain.next_tick_ms {
                    break;
                }
                self.drain = Some(DrainTimer {
                    next_tick_ms: drain.next_tick_ms + DRAIN_INTERVAL_MS,
                });
                self.emit_drain(&mut out);
            }
        }

        out
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn transition(&mut self, next: FocusState, out: &mut Vec<FocusSignal>) {
        self.state = next;
        self.state_observers.notify(next);
        out.push(FocusSignal::StateChanged(next));
    }

    /// Emit one immediate drain tick and schedule the next.
    fn start_drain(&mut self, now_ms: u64, out: &mut Vec<FocusSignal>) {
        self.drain = Some(DrainTimer {
            next_tick_ms: now_ms + DRAIN_INTERVAL_MS,
        });
        self.emit_drain(out);
    }

    fn emit_drain(&mut self, out: &mut Vec<FocusSignal>) {
        self.drain_observers.notify(DRAIN_HP);
        out.push(FocusSignal::HpDrain(DRAIN_HP));
    }

    fn cancel_timers(&mut self) {
        self.grace = None;
        self.drain = None;
    }
}

impl Default for FocusMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn drains(signals: &[FocusSignal]) -> Vec<u32> {
        signals
            .iter()
            .filter_map(|s| match s {
                FocusSignal::HpDrain(amount) => Some(*amount),
                _ => None,
            })
            .collect()
    }

    fn states(signals: &[FocusSignal]) -> Vec<FocusState> {
        signals
            .iter()
            .filter_map(|s| match s {
                FocusSignal::StateChanged(state) => Some(*state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn starts_idle() {
        let machine = FocusMachine::new();
        assert_eq!(machine.state(), FocusState::Idle);
    }

    #[test]
    fn hide_then_show_within_grace_returns_to_focusing_without_drain() {
        let mut machine = FocusMachine::new();
        machine.start_focus();

        let signals = machine.visibility_changed(true, 1_000);
        assert_eq!(states(&signals), vec![FocusState::Warning]);

        // 3s elapse, still under the 5s grace.
        let signals = machine.tick(4_000);
        assert!(signals.is_empty());

        let signals = machine.visibility_changed(false, 4_500);
        assert_eq!(states(&signals), vec![FocusState::Focusing]);
        assert!(drains(&signals).is_empty());

        // A stale tick after the return must not fire the old grace timer.
        let signals = machine.tick(10_000);
        assert!(signals.is_empty());
        assert_eq!(machine.state(), FocusState::Focusing);
    }

    #[test]
    fn grace_expiry_penalizes_with_immediate_drain() {
        let mut machine = FocusMachine::new();
        machine.start_focus();
        machine.visibility_changed(true, 1_000);

        let signals = machine.tick(6_000);
        assert_eq!(states(&signals), vec![FocusState::Penalizing]);
        assert_eq!(drains(&signals), vec![DRAIN_HP]);
    }

    #[test]
    fn drain_repeats_every_interval_until_visibility_restored() {
        let mut machine = FocusMachine::new();
        machine.start_focus();
        machine.visibility_changed(true, 0);
        let signals = machine.tick(5_000); // grace expires
        assert_eq!(drains(&signals), vec![DRAIN_HP]);

        assert!(drains(&machine.tick(9_999)).is_empty());
        assert_eq!(drains(&machine.tick(10_000)), vec![DRAIN_HP]);
        assert_eq!(drains(&machine.tick(15_000)), vec![DRAIN_HP]);

        // Two intervals elapsed in one tick -> two whole drain events.
        assert_eq!(drains(&machine.tick(25_000)), vec![DRAIN_HP, DRAIN_HP]);

        let signals = machine.visibility_changed(false, 26_000);
        assert_eq!(states(&signals), vec![FocusState::Focusing]);
        assert!(drains(&machine.tick(60_000)).is_empty());
    }

    #[test]
    fn force_penalty_skips_grace() {
        let mut machine = FocusMachine::new();
        machine.start_focus();
        machine.visibility_changed(true, 1_000); // Warning, grace pending

        let signals = machine.force_penalty(2_000);
        assert_eq!(states(&signals), vec![FocusState::Penalizing]);
        assert_eq!(drains(&signals), vec![DRAIN_HP]);

        // The cancelled grace timer must not re-fire an extra drain.
        let signals = machine.tick(6_500);
        assert!(signals.is_empty());
        assert_eq!(drains(&machine.tick(7_000)), vec![DRAIN_HP]);
    }

    #[test]
    fn force_penalty_while_draining_does_not_double_drain() {
        let mut machine = FocusMachine::new();
        machine.start_focus();
        let first = machine.force_penalty(1_000);
        assert_eq!(drains(&first), vec![DRAIN_HP]);

        let second = machine.force_penalty(2_000);
        assert!(drains(&second).is_empty());
        // Original schedule is preserved.
        assert_eq!(drains(&machine.tick(6_000)), vec![DRAIN_HP]);
    }

    #[test]
    fn authorized_exit_suppresses_monitoring() {
        let mut machine = FocusMachine::new();
        machine.start_focus();
        machine.set_authorized_exit(true);

        assert!(machine.visibility_changed(true, 1_000).is_empty());
        assert_eq!(machine.state(), FocusState::Focusing);
        assert!(machine.tick(60_000).is_empty());

        machine.set_authorized_exit(false);
        let signals = machine.visibility_changed(true, 61_000);
        assert_eq!(states(&signals), vec![FocusState::Warning]);
    }

    #[test]
    fn visibility_ignored_before_start_and_during_break() {
        let mut machine = FocusMachine::new();
        assert!(machine.visibility_changed(true, 0).is_empty());

        machine.start_focus();
        machine.start_break();
        assert!(machine.visibility_changed(true, 1_000).is_empty());
        assert_eq!(machine.state(), FocusState::Breaking);
    }

    #[test]
    fn start_break_cancels_pending_timers() {
        let mut machine = FocusMachine::new();
        machine.start_focus();
        machine.visibility_changed(true, 0);
        machine.start_break();

        assert!(machine.tick(10_000).is_empty());
        assert_eq!(machine.state(), FocusState::Breaking);
    }

    #[test]
    fn reset_cancels_timers_and_removes_observation() {
        let mut machine = FocusMachine::new();
        machine.start_focus();
        machine.force_penalty(0);

        let signals = machine.reset();
        assert_eq!(states(&signals), vec![FocusState::Idle]);
        assert!(!machine.draining());
        assert!(machine.tick(100_000).is_empty());
        assert!(machine.visibility_changed(true, 100_000).is_empty());
    }

    #[test]
    fn observers_fire_in_registration_order_and_unsubscribe() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut machine = FocusMachine::new();

        let first = Arc::clone(&seen);
        machine.subscribe(move |state| first.lock().unwrap().push(("first", state)));
        let second = Arc::clone(&seen);
        let token = machine.subscribe(move |state| second.lock().unwrap().push(("second", state)));

        machine.start_focus();
        {
            let seen = seen.lock().unwrap();
            assert_eq!(
                *seen,
                vec![("first", FocusState::Focusing), ("second", FocusState::Focusing)]
            );
        }

        assert!(machine.unsubscribe(token));
        machine.start_break();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&("first", FocusState::Breaking)));
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn hp_drain_observer_receives_amounts() {
        let total = Arc::new(Mutex::new(0u32));
        let mut machine = FocusMachine::new();
        let sink = Arc::clone(&total);
        machine.on_hp_drain(move |amount| *sink.lock().unwrap() += amount);

        machine.start_focus();
        machine.force_penalty(0);
        machine.tick(5_000);
        machine.tick(10_000);

        assert_eq!(*total.lock().unwrap(), 30);
    }

    #[test]
    fn machine_state_round_trips_through_serde() {
        let mut machine = FocusMachine::new();
        machine.start_focus();
        machine.visibility_changed(true, 1_000);

        let json = serde_json::to_string(&machine).unwrap();
        let mut restored: FocusMachine = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.state(), FocusState::Warning);
        // Restored grace deadline still fires.
        let signals = restored.tick(6_000);
        assert_eq!(states(&signals), vec![FocusState::Penalizing]);
    }
}
