//! Document store over SQLite: connections, sessions, queries and the
//! migration state record.

pub mod db;
pub mod layout;
pub mod query;
pub mod session;
pub mod state;

pub use db::{Database, DatabaseOptions, RetryPolicy};
pub use query::{Filter, Update};
pub use session::{from_document, to_document, Session};
pub use state::{
    get_current_migration_state, reset_migration_state, set_current_migration_state, MigrationRecord,
};

/// A JSON document. Keys are kept sorted, so equal documents serialize to
/// equal bytes.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Names of the collections this crate reads or writes.
pub mod collections {
    pub const DATABASE_MIGRATIONS: &str = "database_migrations";
    pub const RULES: &str = "rules";
    pub const SYSTEM_TYPES: &str = "system_types";
    pub const USAGE_STATUSES: &str = "usage_statuses";
    pub const SYSTEMS: &str = "systems";
    pub const ITEMS: &str = "items";
    pub const CATALOGUE_ITEMS: &str = "catalogue_items";
}
