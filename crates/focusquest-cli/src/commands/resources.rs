use clap::Subcommand;
use focusquest_core::storage::Database;

use super::quest::ensure_scheme;

#[derive(Subcommand)]
pub enum ResourcesAction {
    /// Add an allowed resource URL
    Add { url: String },
    /// List allowed resources
    List,
    /// Remove an allowed resource by id
    Remove { id: String },
}

pub fn run(action: ResourcesAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        ResourcesAction::Add { url } => {
            let resource = db.add_resource(&ensure_scheme(&url))?;
            println!("{}", serde_json::to_string_pretty(&resource)?);
        }
        ResourcesAction::List => {
            let resources = db.list_resources()?;
            println!("{}", serde_json::to_string_pretty(&resources)?);
        }
        ResourcesAction::Remove { id } => {
            if db.remove_resource(&id)? {
                println!("{{\"removed\": true}}");
            } else {
                return Err(format!("no resource with id {id}").into());
            }
        }
    }
    Ok(())
}
