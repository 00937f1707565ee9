//! # FocusQuest Core Library
//!
//! Core logic for FocusQuest, a gamified focus timer: users run
//! pomodoro-style quests, earn XP, and lose health when they stray from
//! allowed browser tabs while a quest is active.
//!
//! ## Architecture
//!
//! - **Focus machine**: a wall-clock-based state machine driving
//!   focus/break/warning/penalty transitions; the host feeds it visibility
//!   changes and periodic `tick()` calls
//! - **Session coordinator**: owns a quest run, applies HP drain and XP
//!   rewards, and talks to the backend collaborators
//! - **Bridge**: typed envelope protocol linking the page, its content
//!   relay, and the privileged background process over two channels
//! - **Monitor**: background-side tab/domain watcher with a persisted
//!   allow-list, restart-safe
//! - **Storage**: SQLite quest history and TOML configuration
//!
//! ## Key Components
//!
//! - [`FocusMachine`]: focus/penalty state machine
//! - [`SessionCoordinator`]: quest run orchestration
//! - [`TabMonitor`]: navigation checks against the allow-list
//! - [`ContentRelay`]: cross-context message relay
//! - [`Database`]: quest and state persistence

pub mod error;
pub mod events;
pub mod focus;
pub mod integrations;
pub mod monitor;
pub mod protocol;
pub mod reward;
pub mod session;
pub mod storage;

pub use error::{ConfigError, CoreError, ProtocolError, StorageError, ValidationError};
pub use events::Event;
pub use focus::{FocusMachine, FocusSignal, FocusState};
pub use integrations::{
    DbSessionReporter, HttpProgressRecorder, HttpSessionReporter, ProgressRecorder,
    ProgressUpdate, SessionOutcome, SessionReporter,
};
pub use monitor::{BackgroundRouter, MonitorState, MonitorStore, TabId, TabMonitor, ViolationEvent};
pub use protocol::{ContentRelay, Envelope, ExtensionMessage, Origin, PageBridge, PageMessage};
pub use session::{QuestConfig, QuestStatus, QuestTask, SessionCoordinator, SessionRun};
pub use storage::{AllowedResource, Config, Database, QuestRecord, Stats};
