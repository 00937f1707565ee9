//! Session coordinator.
//!
//! Bridges the focus state machine, the extension message bridge, and the
//! two backend collaborators. Owns the [`SessionRun`] and the work/break
//! phase countdown; clamps health and decides terminal success or failure.
//! The state machine itself never inspects health - drain amounts flow in
//! here and are applied (and clamped) exactly once.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::events::Event;
use crate::focus::{FocusMachine, FocusSignal, FocusState};
use crate::integrations::{ProgressRecorder, SessionOutcome, SessionReporter};
use crate::protocol::{ExtensionMessage, PageBridge, PageMessage};
use crate::reward::{self, ActionKind};

use super::run::{QuestConfig, QuestStatus, SessionRun};

pub struct SessionCoordinator {
    machine: FocusMachine,
    bridge: PageBridge,
    recorder: Arc<dyn ProgressRecorder>,
    reporter: Arc<dyn SessionReporter>,
    user_id: Option<i64>,
    run: Option<SessionRun>,
    /// Deadline of the current work or break interval. The countdown keeps
    /// running through warning/penalty phases.
    phase_deadline_ms: Option<u64>,
}

/// Persistable slice of coordinator state, for hosts that park a session
/// between invocations.
#[derive(Serialize)]
struct SavedStateRef<'a> {
    machine: &'a FocusMachine,
    run: &'a Option<SessionRun>,
    phase_deadline_ms: Option<u64>,
}

#[derive(Deserialize)]
struct SavedState {
    machine: FocusMachine,
    run: Option<SessionRun>,
    phase_deadline_ms: Option<u64>,
}

impl SessionCoordinator {
    pub fn new(
        bridge: PageBridge,
        recorder: Arc<dyn ProgressRecorder>,
        reporter: Arc<dyn SessionReporter>,
        user_id: Option<i64>,
    ) -> Self {
        Self {
            machine: FocusMachine::new(),
            bridge,
            recorder,
            reporter,
            user_id,
            run: None,
            phase_deadline_ms: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn run(&self) -> Option<&SessionRun> {
        self.run.as_ref()
    }

    pub fn machine(&self) -> &FocusMachine {
        &self.machine
    }

    pub fn extension_connected(&self) -> bool {
        self.bridge.extension_connected()
    }

    /// Full state snapshot event.
    pub fn snapshot(&self) -> Event {
        let (current_cycle, total_cycles, health, earned_xp) = match &self.run {
            Some(run) => (run.current_cycle, run.total_cycles, run.health, run.earned_xp),
            None => (0, 0, 0, 0),
        };
        Event::StateSnapshot {
            state: self.machine.state(),
            current_cycle,
            total_cycles,
            health,
            earned_xp,
            extension_connected: self.bridge.extension_connected(),
            at: Utc::now(),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start a quest. The config is assumed validated/clamped by the
    /// caller (`total_cycles >= 1`, durations > 0); any active run is
    /// discarded without being reported.
    pub fn start(&mut self, config: QuestConfig, now_ms: u64) -> Vec<Event> {
        let mut out = Vec::new();
        if self.run.is_some() {
            debug!("discarding stale run before starting a new quest");
            self.run = None;
            self.machine.reset();
        }

        let run = SessionRun::new(&config);
        out.push(Event::QuestStarted {
            total_cycles: run.total_cycles,
            work_duration_secs: run.work_duration_secs,
            break_duration_secs: run.break_duration_secs,
            allowed_hosts: run.allowed_hostnames.iter().cloned().collect(),
            at: Utc::now(),
        });

        self.machine.set_authorized_exit(false);
        let allowed_urls: Vec<String> = config
            .allowed_resources
            .iter()
            .map(|r| r.url.clone())
            .collect();
        self.bridge.send(PageMessage::StartQuest { allowed_urls });

        self.phase_deadline_ms = Some(now_ms + run.work_duration_secs * 1000);
        self.run = Some(run);
        let signals = self.machine.start_focus();
        self.apply_signals(signals, &mut out);
        out
    }

    /// External "all tasks done" style completion trigger. Idempotent.
    pub fn complete_quest(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        self.finish(QuestStatus::Completed, &mut out);
        out
    }

    /// Abandon the running quest, reporting it as such.
    pub fn abandon(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        self.finish(QuestStatus::Abandoned, &mut out);
        out
    }

    /// Best-effort cleanup on host teardown: reset the machine, then tell
    /// the extension to stop monitoring. Nothing is reported; failure to
    /// reach the extension never fails teardown.
    pub fn teardown(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        self.run = None;
        self.phase_deadline_ms = None;
        let signals = self.machine.reset();
        self.apply_signals(signals, &mut out);
        self.bridge.send(PageMessage::StopQuest);
        out
    }

    // ── Timer collaborator inputs ────────────────────────────────────

    /// Advance timers: machine grace/drain first, then the work/break
    /// phase countdown.
    pub fn tick(&mut self, now_ms: u64) -> Vec<Event> {
        let mut out = Vec::new();
        let signals = self.machine.tick(now_ms);
        self.apply_signals(signals, &mut out);

        if self.run.is_some() {
            if let Some(deadline) = self.phase_deadline_ms {
                if now_ms >= deadline {
                    match self.machine.state() {
                        FocusState::Breaking => out.extend(self.on_break_end(now_ms)),
                        FocusState::Focusing | FocusState::Warning | FocusState::Penalizing => {
                            out.extend(self.on_cycle_complete(now_ms));
                        }
                        FocusState::Idle => self.phase_deadline_ms = None,
                    }
                }
            }
        }
        out
    }

    /// A work interval elapsed. Grants cycle XP and either starts the
    /// break or completes the quest.
    pub fn on_cycle_complete(&mut self, now_ms: u64) -> Vec<Event> {
        let mut out = Vec::new();
        if self.run.is_none() {
            return out;
        }

        let added = self.record_action(ActionKind::Cycle);
        let Some(run) = self.run.as_mut() else {
            return out;
        };
        run.current_cycle = (run.current_cycle + 1).min(run.total_cycles);
        run.earned_xp += added;
        let cycle = run.current_cycle;
        let total_cycles = run.total_cycles;
        let break_secs = run.break_duration_secs;

        out.push(Event::CycleCompleted {
            cycle,
            total_cycles,
            added_xp: added,
            at: Utc::now(),
        });

        if cycle < total_cycles {
            let signals = self.machine.start_break();
            self.apply_signals(signals, &mut out);
            self.phase_deadline_ms = Some(now_ms + break_secs * 1000);
            out.push(Event::BreakStarted {
                cycle,
                duration_secs: break_secs,
                at: Utc::now(),
            });
        } else {
            self.finish(QuestStatus::Completed, &mut out);
        }
        out
    }

    /// A break interval elapsed; back to work.
    pub fn on_break_end(&mut self, now_ms: u64) -> Vec<Event> {
        let mut out = Vec::new();
        let Some(run) = self.run.as_ref() else {
            return out;
        };
        let work_secs = run.work_duration_secs;
        let cycle = run.current_cycle;

        let signals = self.machine.start_focus();
        self.apply_signals(signals, &mut out);
        self.phase_deadline_ms = Some(now_ms + work_secs * 1000);
        out.push(Event::FocusResumed {
            cycle,
            at: Utc::now(),
        });
        out
    }

    // ── Monitoring inputs ────────────────────────────────────────────

    /// Feed a page visibility/blur change through to the machine.
    pub fn visibility_changed(&mut self, hidden: bool, now_ms: u64) -> Vec<Event> {
        let mut out = Vec::new();
        let signals = self.machine.visibility_changed(hidden, now_ms);
        self.apply_signals(signals, &mut out);
        out
    }

    /// Suppress (or restore) penalty triggers while the user follows a
    /// sanctioned external link.
    pub fn set_authorized_exit(&mut self, value: bool) {
        self.machine.set_authorized_exit(value);
        if let Some(run) = self.run.as_mut() {
            run.authorized_exit = value;
        }
    }

    /// Extension-reported violation: force the penalty immediately unless
    /// the run is on a break.
    pub fn on_violation(&mut self, hostname: &str, now_ms: u64) -> Vec<Event> {
        let mut out = Vec::new();
        if self.run.is_none() || self.machine.state() == FocusState::Breaking {
            return out;
        }
        out.push(Event::ViolationReported {
            hostname: hostname.to_string(),
            at: Utc::now(),
        });
        let signals = self.machine.force_penalty(now_ms);
        self.apply_signals(signals, &mut out);
        out
    }

    /// Drain health by `amount`, clamping at zero. Failure fires exactly
    /// once; drain ticks arriving after it are no-ops.
    pub fn on_hp_drain(&mut self, amount: u32) -> Vec<Event> {
        let mut out = Vec::new();
        self.apply_drain(amount, &mut out);
        out
    }

    /// Dispatch one inbound broadcast-channel value from the extension.
    pub fn handle_broadcast(&mut self, value: &Value, now_ms: u64) -> Vec<Event> {
        match self.bridge.handle_inbound(value) {
            Some(ExtensionMessage::QuestViolation { url }) => self.on_violation(&url, now_ms),
            Some(ExtensionMessage::ExtensionReady) => vec![Event::ExtensionLinked { at: Utc::now() }],
            None => Vec::new(),
        }
    }

    /// Ask the extension for a fresh readiness signal.
    pub fn ping_extension(&self) {
        self.bridge.ping();
    }

    // ── Tasks ────────────────────────────────────────────────────────

    /// Toggle a mission objective. Completing the whole checklist
    /// completes the quest through the usual idempotent path.
    pub fn toggle_task(&mut self, task_id: &str) -> Vec<Event> {
        let mut out = Vec::new();
        let Some(run) = self.run.as_mut() else {
            return out;
        };
        let Some(task) = run.tasks.iter_mut().find(|t| t.id == task_id) else {
            return out;
        };
        task.completed = !task.completed;
        if run.all_tasks_completed() {
            self.finish(QuestStatus::Completed, &mut out);
        }
        out
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Serialize machine + run state for parking between host invocations.
    /// Observer registrations are not part of the state.
    pub fn save_state(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&SavedStateRef {
            machine: &self.machine,
            run: &self.run,
            phase_deadline_ms: self.phase_deadline_ms,
        })
    }

    /// Restore previously saved machine + run state.
    pub fn restore_state(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let saved: SavedState = serde_json::from_str(json)?;
        self.machine = saved.machine;
        self.run = saved.run;
        self.phase_deadline_ms = saved.phase_deadline_ms;
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn apply_signals(&mut self, signals: Vec<FocusSignal>, out: &mut Vec<Event>) {
        for signal in signals {
            match signal {
                FocusSignal::StateChanged(state) => out.push(Event::StateChanged {
                    state,
                    at: Utc::now(),
                }),
                FocusSignal::HpDrain(amount) => self.apply_drain(amount, out),
            }
        }
    }

    fn apply_drain(&mut self, amount: u32, out: &mut Vec<Event>) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        run.health = run.health.saturating_sub(amount);
        let health = run.health;
        out.push(Event::HealthDrained {
            amount,
            health,
            at: Utc::now(),
        });
        if health == 0 {
            self.finish(QuestStatus::Abandoned, out);
        }
    }

    /// Record an action, falling back to the local reward table when the
    /// recorder is unreachable or no user is signed in. Never stalls the
    /// session.
    fn record_action(&mut self, kind: ActionKind) -> u64 {
        let fallback = reward::xp_for_action(kind);
        match self.user_id {
            Some(user_id) => match self.recorder.record(user_id, kind) {
                Ok(update) => update.added_xp,
                Err(err) => {
                    warn!(error = %err, "progress recorder unreachable; using local fallback");
                    fallback
                }
            },
            None => fallback,
        }
    }

    /// Terminal path for both outcomes. Taking the run out makes re-entry
    /// a no-op, which is what guards double completion and post-failure
    /// drain ticks.
    fn finish(&mut self, status: QuestStatus, out: &mut Vec<Event>) {
        let Some(mut run) = self.run.take() else {
            return;
        };
        self.phase_deadline_ms = None;

        if status == QuestStatus::Completed {
            let bonus = self.record_action(ActionKind::Quest);
            run.earned_xp += bonus;
        }

        // Stop any drain and tear the machine down before telling the
        // extension; a late violation report then lands on a dead run.
        let signals = self.machine.reset();
        self.apply_signals(signals, out);
        self.bridge.send(PageMessage::StopQuest);

        let outcome = SessionOutcome {
            total_hours: run.total_hours,
            total_cycles: run.total_cycles,
            completed_cycles: run.current_cycle,
            total_xp_earned: run.earned_xp,
            status,
            started_at: run.started_at,
        };
        match self.user_id {
            Some(user_id) => {
                if let Err(err) = self.reporter.report(user_id, &outcome) {
                    warn!(error = %err, "session reporter unreachable; outcome dropped");
                }
            }
            None => debug!("no user signed in; outcome not reported"),
        }

        out.push(match status {
            QuestStatus::Completed => Event::QuestCompleted {
                completed_cycles: run.current_cycle,
                earned_xp: run.earned_xp,
                at: Utc::now(),
            },
            QuestStatus::Abandoned => Event::QuestFailed {
                completed_cycles: run.current_cycle,
                earned_xp: run.earned_xp,
                at: Utc::now(),
            },
        });
    }
}
