use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::model::SystemTypeId;
use crate::schema::Session;

use super::store::load_rule_table;
use super::table::{RuleTable, UsageStatusChange};

/// Shares the current rule table between request handlers.
///
/// The table itself is never mutated. A refresh validates a complete new
/// table and swaps it in with one atomic store; handlers holding a
/// [`snapshot`](Self::snapshot) keep the table they started with.
pub struct RuleEngine {
    current: ArcSwap<RuleTable>,
}

impl fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.current.load().len())
            .finish()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(RuleTable::empty())
    }
}

impl RuleEngine {
    #[must_use]
    pub fn new(table: RuleTable) -> Self {
        Self {
            current: ArcSwap::from_pointee(table),
        }
    }

    /// Load and validate the stored rules. Intended for service startup so
    /// a malformed rule table stops the service immediately.
    pub fn load(session: &Session<'_>) -> Result<Self> {
        let table = load_rule_table(session)?;
        log::info!("Loaded {} usage status rule(s)", table.len());
        Ok(Self::new(table))
    }

    /// The current table, valid for as long as the caller holds it.
    pub fn snapshot(&self) -> Arc<RuleTable> {
        self.current.load_full()
    }

    pub fn replace(&self, table: RuleTable) {
        self.current.store(Arc::new(table));
    }

    /// Reload rules from the store. On error the previous table stays in
    /// place.
    pub fn refresh(&self, session: &Session<'_>) -> Result<Arc<RuleTable>> {
        let table = Arc::new(load_rule_table(session)?);
        self.current.store(Arc::clone(&table));
        log::info!("Refreshed usage status rules ({} rule(s))", table.len());
        Ok(table)
    }

    pub fn derive_usage_status(
        &self,
        source: Option<SystemTypeId>,
        destination: Option<SystemTypeId>,
    ) -> UsageStatusChange {
        self.current.load().derive_usage_status(source, destination)
    }
}
