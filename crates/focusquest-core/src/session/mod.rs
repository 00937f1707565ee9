mod coordinator;
mod run;

pub use coordinator::SessionCoordinator;
pub use run::{QuestConfig, QuestStatus, QuestTask, SessionRun, STARTING_HEALTH};
