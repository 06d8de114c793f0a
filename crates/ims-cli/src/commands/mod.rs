pub mod config;
pub mod migrate;
pub mod rules;

use anyhow::{Context as _, Result};
use ims_core::schema::Database;
use ims_migrate::Config;
use std::io::{self, BufRead, Write};

/// Settings shared by every command.
#[derive(Debug)]
pub struct Context {
    pub config: Config,
    /// Skip confirmation prompts.
    pub yes: bool,
    /// Treat a no-op on an explicit target as a failure.
    pub strict: bool,
}

impl Context {
    /// Open the configured database, creating its directory if needed.
    pub fn open_database(&self) -> Result<Database> {
        let path = &self.config.database_path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let db = Database::open_with(path, self.config.database_options())
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        db.ensure_transactions_supported()?;
        log::debug!("Opened database {}", path.display());
        Ok(db)
    }

    /// Ask a yes/no question on the terminal; `--yes` answers for the user.
    pub fn confirm(&self, question: &str) -> Result<bool> {
        if self.yes {
            return Ok(true);
        }

        print!("{} [y/N] ", question);
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(matches!(
            answer.trim().to_lowercase().as_str(),
            "y" | "yes"
        ))
    }
}
