pub mod completions;
pub mod config;
pub mod monitor;
pub mod quest;
pub mod resources;
pub mod stats;
