//! Database maintenance commands: `taskboard init` and `taskboard check`.

use anyhow::{Context, Result};
use std::path::Path;
use taskboard::board::db::BoardDb;
use taskboard::config::TaskboardConfig;

pub fn cmd_init(config: &TaskboardConfig, config_path: &Path) -> Result<()> {
    let db_path = &config.database.path;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    BoardDb::new(db_path)?;
    println!("Board database initialized at {}", db_path.display());

    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        config.save(config_path)?;
        println!("Wrote configuration to {}", config_path.display());
    }
    Ok(())
}

/// Exit non-zero when any scope is not dense.
pub fn cmd_check(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        anyhow::bail!(
            "No database at {}. Run `taskboard init` first.",
            db_path.display()
        );
    }
    let db = BoardDb::new(db_path)?;
    let violations = db.find_violations()?;

    if violations.is_empty() {
        println!("OK: all position sequences in {} are dense", db_path.display());
        return Ok(());
    }

    println!("Found {} broken position sequence(s):", violations.len());
    for violation in &violations {
        println!("  {}: positions {:?}", violation.scope, violation.positions);
    }
    anyhow::bail!("{} scope(s) failed the ordering check", violations.len())
}
