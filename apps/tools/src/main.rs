use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::NewMenuItem;
use storage::{ReservationStore, Storage};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/reservations.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provision an operator account for the admin console.
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Load menu items from a JSON array of items.
    SeedMenu { file: PathBuf },
    ListReservations,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateAdmin { username, password } => {
            let admin_id = storage.create_admin(&username, &password).await?;
            println!("created admin '{username}' (id={admin_id})");
        }
        Command::SeedMenu { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let items = parse_menu(&raw)
                .with_context(|| format!("{} is not a menu item list", file.display()))?;
            for item in &items {
                let id = storage.insert_menu_item(item).await?;
                println!("menu_item_id={} {} ({})", id, item.name, item.category.as_str());
            }
            println!("seeded {} menu items", items.len());
        }
        Command::ListReservations => {
            for r in storage.list().await? {
                println!(
                    "#{:<4} {} {} {:>2} guests table {:>2} {:<9} {} <{}>",
                    r.id.0,
                    r.date,
                    r.time,
                    r.guests,
                    r.table_number,
                    r.status.as_str(),
                    r.name,
                    r.email
                );
            }
        }
    }

    Ok(())
}

fn parse_menu(raw: &str) -> Result<Vec<NewMenuItem>> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::MenuCategory;

    #[test]
    fn parses_menu_seed_file() {
        let items = parse_menu(
            r#"[
                {"name": "Samoosas", "price_cents": 650, "category": "starters",
                 "is_spicy": true},
                {"name": "Malva pudding", "description": "With custard",
                 "price_cents": 700, "category": "desserts"}
            ]"#,
        )
        .expect("menu");

        assert_eq!(items.len(), 2);
        assert!(items[0].is_spicy);
        assert_eq!(items[1].category, MenuCategory::Desserts);
        assert_eq!(items[1].description.as_deref(), Some("With custard"));
    }

    #[test]
    fn rejects_unknown_category() {
        let raw = r#"[{"name": "Tea", "price_cents": 100, "category": "brunch"}]"#;
        assert!(parse_menu(raw).is_err());
    }
}
