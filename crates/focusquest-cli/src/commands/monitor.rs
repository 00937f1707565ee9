use std::sync::{Arc, Mutex};

use clap::Subcommand;
use focusquest_core::focus::now_ms;
use focusquest_core::storage::{Config, Database};

use super::quest::{load_coordinator, open_monitor, save_coordinator, sync_monitor};

#[derive(Subcommand)]
pub enum MonitorAction {
    /// Print the persisted monitoring state
    Status,
    /// Check a tab navigation against the allow-list; a violation is fed
    /// into the running quest like an extension report would be
    Check { tab: u32, url: String },
    /// Clear the persisted monitoring state
    Stop,
}

pub fn run(action: MonitorAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut monitor = open_monitor()?;

    match action {
        MonitorAction::Status => {
            println!("{}", serde_json::to_string_pretty(monitor.state())?);
        }
        MonitorAction::Check { tab, url } => {
            match monitor.check_navigation(tab, &url)? {
                Some(violation) => {
                    println!("{}", serde_json::to_string_pretty(&violation)?);

                    let config = Config::load()?;
                    let db = Arc::new(Mutex::new(Database::open()?));
                    let mut coordinator = load_coordinator(&config, &db)?;
                    let events = coordinator.on_violation(&violation.hostname, now_ms());
                    sync_monitor(&events, &mut monitor)?;
                    if !events.is_empty() {
                        println!("{}", serde_json::to_string_pretty(&events)?);
                    }
                    save_coordinator(&coordinator, &db)?;
                }
                None => println!("{{\"allowed\": true}}"),
            }
        }
        MonitorAction::Stop => {
            monitor.stop_quest()?;
            println!("{{\"type\": \"monitoring_stopped\"}}");
        }
    }
    Ok(())
}
