use clap::Subcommand;
use focusquest_core::storage::Database;

#[derive(Subcommand)]
pub enum StatsAction {
    /// All-time stats
    All,
    /// Most recent quests
    Recent {
        #[arg(long, default_value = "10")]
        limit: u32,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        StatsAction::All => {
            let stats = db.stats_all()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::Recent { limit } => {
            let quests = db.recent_quests(limit)?;
            println!("{}", serde_json::to_string_pretty(&quests)?);
        }
    }
    Ok(())
}
