//! Persistence of the migration position.

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::collections::DATABASE_MIGRATIONS;
use super::session::{from_document, to_document, Session};

const RECORD_ID: &str = "last_migration";

/// The singleton record of which migrations have been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Name of the last applied migration; `None` when nothing was ever
    /// applied.
    #[serde(default)]
    pub current_migration_name: Option<String>,

    /// Migration names known to the registry at the last run, in order.
    #[serde(default)]
    pub available_migrations: Vec<String>,
}

/// Read the migration record, or a default one if none has been written.
///
/// Reading never creates the record.
pub fn get_current_migration_state(session: &Session<'_>) -> Result<MigrationRecord> {
    session
        .find_by_id(DATABASE_MIGRATIONS, RECORD_ID)?
        .map(from_document)
        .transpose()
        .map(Option::unwrap_or_default)
}

/// Overwrite the migration record.
///
/// Runs in the caller's session, so it commits or rolls back together with
/// whatever migration work produced it.
pub fn set_current_migration_state(
    session: &Session<'_>,
    name: Option<&str>,
    available: &[String],
) -> Result<()> {
    let record = MigrationRecord {
        current_migration_name: name.map(str::to_string),
        available_migrations: available.to_vec(),
    };
    session.upsert(DATABASE_MIGRATIONS, RECORD_ID, to_document(&record)?)
}

/// Delete the migration record entirely (administrative reset).
pub fn reset_migration_state(session: &Session<'_>) -> Result<bool> {
    Ok(session.delete_many(
        DATABASE_MIGRATIONS,
        &super::query::Filter::by_id(RECORD_ID),
    )? > 0)
}
