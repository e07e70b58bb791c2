//! Database maintenance commands: `podspace init-db` and `podspace seed`.

use anyhow::Result;
use std::path::PathBuf;

use podspace::config::HubConfig;
use podspace::hub::db::HubDb;
use podspace::hub::seed::{SeedOutcome, seed_explore};

fn open_db(config: &HubConfig, db_path: Option<PathBuf>) -> Result<(HubDb, PathBuf)> {
    let db_path = db_path.unwrap_or_else(|| config.server.db_path.clone());
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let db = HubDb::new(&db_path)?;
    Ok((db, db_path))
}

pub fn cmd_init_db(config: &HubConfig, db_path: Option<PathBuf>) -> Result<()> {
    let (_db, db_path) = open_db(config, db_path)?;
    println!("Hub database initialized at {}", db_path.display());
    Ok(())
}

pub fn cmd_seed(config: &HubConfig, db_path: Option<PathBuf>) -> Result<()> {
    let (db, db_path) = open_db(config, db_path)?;
    match seed_explore(&db)? {
        SeedOutcome::AlreadySeeded { count } => {
            println!("Explore profiles already seeded ({} present)", count);
        }
        SeedOutcome::Created { names } => {
            println!(
                "Seeded {} Explore profiles into {}",
                names.len(),
                db_path.display()
            );
        }
    }
    Ok(())
}
