//! End-to-end quest flow across the three contexts: page coordinator,
//! content relay, and background monitor.

use std::sync::{Arc, Mutex};

use focusquest_core::integrations::{
    ProgressRecorder, ProgressUpdate, SessionOutcome, SessionReporter,
};
use focusquest_core::monitor::{BackgroundRouter, MemoryMonitorStore, TabMonitor};
use focusquest_core::protocol::{ContentRelay, PageBridge, PageMessage};
use focusquest_core::reward::ActionKind;
use focusquest_core::session::{QuestConfig, QuestStatus, SessionCoordinator};
use focusquest_core::storage::AllowedResource;
use focusquest_core::{Event, FocusState};

#[derive(Default)]
struct StubRecorder;

impl ProgressRecorder for StubRecorder {
    fn record(
        &self,
        _user_id: i64,
        kind: ActionKind,
    ) -> Result<ProgressUpdate, Box<dyn std::error::Error>> {
        let added = match kind {
            ActionKind::Cycle => 200,
            ActionKind::Quest => 500,
        };
        Ok(ProgressUpdate {
            total_xp: added,
            level: 1,
            quests_completed: 0,
            added_xp: added,
        })
    }
}

#[derive(Default)]
struct CapturingReporter {
    outcomes: Mutex<Vec<SessionOutcome>>,
}

impl SessionReporter for CapturingReporter {
    fn report(
        &self,
        _user_id: i64,
        outcome: &SessionOutcome,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.outcomes.lock().unwrap().push(outcome.clone());
        Ok(())
    }
}

fn resource(url: &str, hostname: &str) -> AllowedResource {
    AllowedResource {
        id: "r1".into(),
        url: url.into(),
        hostname: hostname.into(),
    }
}

#[tokio::test]
async fn violation_round_trip_across_contexts() {
    let (relay, mut page, mut background) = ContentRelay::channels();
    tokio::spawn(relay.run());

    let reporter = Arc::new(CapturingReporter::default());
    let mut coordinator = SessionCoordinator::new(
        PageBridge::new(page.to_relay.clone()),
        Arc::new(StubRecorder),
        Arc::clone(&reporter) as Arc<dyn SessionReporter>,
        Some(7),
    );

    // Extension-presence handshake: relay announces itself on load.
    let ready = page.from_relay.recv().await.unwrap();
    coordinator.handle_broadcast(&ready, 0);
    assert!(coordinator.extension_connected());

    // Start a quest with one allowed resource.
    let config = QuestConfig::custom(2, 25, 5)
        .with_resources(vec![resource("https://Docs.RS/serde", "docs.rs")]);
    coordinator.start(config, 0);
    assert_eq!(coordinator.machine().state(), FocusState::Focusing);

    // The background receives START_QUEST and seeds its monitor.
    let envelope = background.from_relay.recv().await.unwrap();
    let monitor = TabMonitor::new(MemoryMonitorStore::default()).unwrap();
    let mut router = BackgroundRouter::new(monitor, 1, background.to_relay.clone());
    router.handle_page_message(envelope.message).unwrap();

    let state = router.monitor().state();
    assert!(state.quest_active);
    assert_eq!(state.protected_tab, Some(1));
    assert_eq!(state.allowed_hosts, vec!["docs.rs"]);

    // Allowed subdomain and the protected tab itself pass silently.
    assert!(router.handle_navigation(2, "https://docs.rs/serde").is_none());
    assert!(router.handle_navigation(1, "https://evil.com").is_none());

    // A disallowed navigation travels back to the page and forces the
    // penalty, skipping the grace period.
    assert!(router.handle_navigation(2, "https://evil.com/feed").is_some());
    let violation = page.from_relay.recv().await.unwrap();
    let events = coordinator.handle_broadcast(&violation, 1_000);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ViolationReported { .. })));
    assert_eq!(coordinator.machine().state(), FocusState::Penalizing);
    assert_eq!(coordinator.run().unwrap().health, 90);

    // Abandoning the quest emits STOP_QUEST; the monitor clears and a
    // subsequent navigation produces no violation.
    coordinator.abandon();
    let envelope = background.from_relay.recv().await.unwrap();
    assert_eq!(envelope.message, PageMessage::StopQuest);
    router.handle_page_message(envelope.message).unwrap();

    assert!(router.handle_navigation(2, "https://evil.com").is_none());
    assert!(!router.monitor().state().quest_active);

    let outcomes = reporter.outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, QuestStatus::Abandoned);
}

#[tokio::test]
async fn monitor_state_survives_background_restart() {
    let (relay, mut page, mut background) = ContentRelay::channels();
    tokio::spawn(relay.run());
    let _ready = page.from_relay.recv().await.unwrap();

    let reporter = Arc::new(CapturingReporter::default());
    let mut coordinator = SessionCoordinator::new(
        PageBridge::new(page.to_relay.clone()),
        Arc::new(StubRecorder),
        reporter as Arc<dyn SessionReporter>,
        Some(7),
    );
    let config =
        QuestConfig::pomodoro(1.0).with_resources(vec![resource("https://chatgpt.com", "chatgpt.com")]);
    coordinator.start(config, 0);

    let store = MemoryMonitorStore::default();
    let envelope = background.from_relay.recv().await.unwrap();
    let mut router = BackgroundRouter::new(
        TabMonitor::new(store.clone()).unwrap(),
        1,
        background.to_relay.clone(),
    );
    router.handle_page_message(envelope.message).unwrap();

    // The background process restarts: a fresh monitor over the same
    // persisted store still enforces the running quest.
    let mut restarted = BackgroundRouter::new(
        TabMonitor::new(store).unwrap(),
        1,
        background.to_relay.clone(),
    );
    assert!(restarted
        .handle_navigation(2, "https://chat.chatgpt.com/c/1")
        .is_none());
    assert!(restarted.handle_navigation(2, "https://evil.com").is_some());

    let violation = page.from_relay.recv().await.unwrap();
    coordinator.handle_broadcast(&violation, 500);
    assert_eq!(coordinator.machine().state(), FocusState::Penalizing);
}

#[tokio::test]
async fn completed_quest_reports_and_stops_monitoring() {
    let (relay, mut page, mut background) = ContentRelay::channels();
    tokio::spawn(relay.run());
    let _ready = page.from_relay.recv().await.unwrap();

    let reporter = Arc::new(CapturingReporter::default());
    let mut coordinator = SessionCoordinator::new(
        PageBridge::new(page.to_relay.clone()),
        Arc::new(StubRecorder),
        Arc::clone(&reporter) as Arc<dyn SessionReporter>,
        Some(7),
    );
    coordinator.start(QuestConfig::custom(2, 25, 5), 0);
    let _start = background.from_relay.recv().await.unwrap();

    coordinator.on_cycle_complete(0);
    coordinator.on_break_end(0);
    let events = coordinator.on_cycle_complete(0);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::QuestCompleted { earned_xp: 900, .. })));

    let envelope = background.from_relay.recv().await.unwrap();
    assert_eq!(envelope.message, PageMessage::StopQuest);

    let outcomes = reporter.outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, QuestStatus::Completed);
    assert_eq!(outcomes[0].completed_cycles, 2);
    assert_eq!(outcomes[0].total_xp_earned, 900);
}
