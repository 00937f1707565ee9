use std::sync::{Arc, Mutex};

use clap::Subcommand;
use focusquest_core::focus::now_ms;
use focusquest_core::integrations::{
    DbSessionReporter, HttpProgressRecorder, NullProgressRecorder, ProgressRecorder,
    SessionReporter,
};
use focusquest_core::monitor::{KvMonitorStore, TabMonitor};
use focusquest_core::protocol::PageBridge;
use focusquest_core::session::{QuestConfig, QuestTask, SessionCoordinator};
use focusquest_core::storage::{Config, Database};
use focusquest_core::Event;

const SESSION_KEY: &str = "session_state";

/// Tab id standing in for the page hosting the app. The CLI plays both
/// the page and the background context, so any fixed id works.
const APP_TAB: u32 = 0;

#[derive(Subcommand)]
pub enum QuestAction {
    /// Start a quest
    Start {
        /// Total study hours (standard 25/5 shape, clamped to 0.5-8)
        #[arg(long, conflicts_with_all = ["cycles", "focus", "break_mins"])]
        hours: Option<f64>,
        /// Number of cycles (custom shape, clamped to 1-20)
        #[arg(long)]
        cycles: Option<u32>,
        /// Focus minutes per cycle (custom shape, clamped to 1-120)
        #[arg(long)]
        focus: Option<u32>,
        /// Break minutes per cycle (custom shape, clamped to 1-60)
        #[arg(long = "break")]
        break_mins: Option<u32>,
        /// Extra allowed resource URL (repeatable, persisted)
        #[arg(long = "allow")]
        allow: Vec<String>,
        /// Mission objective (repeatable)
        #[arg(long = "task")]
        tasks: Vec<String>,
    },
    /// Advance timers and print the current snapshot as JSON
    Status,
    /// Simulate the page being hidden or shown
    Visibility {
        #[arg(value_parser = ["hidden", "visible"])]
        state: String,
    },
    /// List the running quest's mission objectives
    Tasks,
    /// Toggle a mission objective by id
    Task { id: String },
    /// Abandon the running quest (reported as such)
    Stop,
    /// Reset to idle without reporting
    Reset,
}

pub(crate) fn load_coordinator(
    config: &Config,
    db: &Arc<Mutex<Database>>,
) -> Result<SessionCoordinator, Box<dyn std::error::Error>> {
    let recorder: Arc<dyn ProgressRecorder> = match config.api.user_id {
        Some(_) => Arc::new(HttpProgressRecorder::new(config.api.base_url.clone())),
        None => Arc::new(NullProgressRecorder),
    };
    let reporter: Arc<dyn SessionReporter> = Arc::new(DbSessionReporter::new(Arc::clone(db)));
    let user_id = Some(config.api.user_id.unwrap_or(0));

    let mut coordinator =
        SessionCoordinator::new(PageBridge::disconnected(), recorder, reporter, user_id);
    let saved = db.lock().map_err(|e| e.to_string())?.kv_get(SESSION_KEY)?;
    if let Some(json) = saved {
        coordinator.restore_state(&json)?;
    }
    Ok(coordinator)
}

pub(crate) fn save_coordinator(
    coordinator: &SessionCoordinator,
    db: &Arc<Mutex<Database>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = coordinator.save_state()?;
    db.lock().map_err(|e| e.to_string())?.kv_set(SESSION_KEY, &json)?;
    Ok(())
}

/// The CLI stands in for the background context too: terminal quest
/// events clear the persisted monitoring state.
pub(crate) fn sync_monitor(
    events: &[Event],
    monitor: &mut TabMonitor<KvMonitorStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let terminal = events
        .iter()
        .any(|e| matches!(e, Event::QuestCompleted { .. } | Event::QuestFailed { .. }));
    if terminal {
        monitor.stop_quest()?;
    }
    Ok(())
}

pub(crate) fn open_monitor() -> Result<TabMonitor<KvMonitorStore>, Box<dyn std::error::Error>> {
    Ok(TabMonitor::new(KvMonitorStore::new(Database::open()?))?)
}

fn print_events(events: &[Event]) -> Result<(), Box<dyn std::error::Error>> {
    if !events.is_empty() {
        println!("{}", serde_json::to_string_pretty(events)?);
    }
    Ok(())
}

pub fn run(action: QuestAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Arc::new(Mutex::new(Database::open()?));
    let mut coordinator = load_coordinator(&config, &db)?;
    let mut monitor = open_monitor()?;
    let now = now_ms();

    match action {
        QuestAction::Start {
            hours,
            cycles,
            focus,
            break_mins,
            allow,
            tasks,
        } => {
            let mut resources = db.lock().map_err(|e| e.to_string())?.list_resources()?;
            for url in allow {
                let url = ensure_scheme(&url);
                let resource = db.lock().map_err(|e| e.to_string())?.add_resource(&url)?;
                resources.push(resource);
            }

            let quest = match hours {
                Some(hours) => QuestConfig::pomodoro(hours),
                None => QuestConfig::custom(
                    cycles.unwrap_or(config.session.default_cycles),
                    focus.unwrap_or(config.session.focus_minutes),
                    break_mins.unwrap_or(config.session.break_minutes),
                ),
            }
            .with_tasks(tasks.into_iter().map(|name| QuestTask::new(name, 1)).collect())
            .with_resources(resources.clone());

            let urls: Vec<String> = resources.into_iter().map(|r| r.url).collect();
            monitor.start_quest(APP_TAB, &urls)?;

            let events = coordinator.start(quest, now);
            print_events(&events)?;
        }
        QuestAction::Status => {
            let events = coordinator.tick(now);
            sync_monitor(&events, &mut monitor)?;
            print_events(&events)?;
            println!("{}", serde_json::to_string_pretty(&coordinator.snapshot())?);
        }
        QuestAction::Visibility { state } => {
            let events = coordinator.visibility_changed(state == "hidden", now);
            sync_monitor(&events, &mut monitor)?;
            print_events(&events)?;
        }
        QuestAction::Tasks => {
            let tasks = coordinator.run().map(|run| run.tasks.clone()).unwrap_or_default();
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        QuestAction::Task { id } => {
            let events = coordinator.toggle_task(&id);
            sync_monitor(&events, &mut monitor)?;
            print_events(&events)?;
        }
        QuestAction::Stop => {
            let events = coordinator.abandon();
            monitor.stop_quest()?;
            print_events(&events)?;
        }
        QuestAction::Reset => {
            let events = coordinator.teardown();
            monitor.stop_quest()?;
            print_events(&events)?;
        }
    }

    save_coordinator(&coordinator, &db)?;
    Ok(())
}

/// Bare hostnames are accepted the way the app's resource input is:
/// https:// is prepended when no scheme is present.
pub(crate) fn ensure_scheme(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}
