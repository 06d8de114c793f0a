//! Usage-status rules: which status an item gets when it moves between
//! systems of given types.
//!
//! A [`RuleTable`] is built once from the stored rules and validated so that
//! every `(source type, destination type)` pair has at most one rule. The
//! [`RuleEngine`] shares the current table between handlers and swaps in a
//! new one on refresh.
//!
//! # Example
//!
//! ```no_run
//! use ims_core::rules::{RuleEngine, UsageStatusChange};
//! use ims_core::schema::Database;
//!
//! let mut db = Database::open("ims.db").unwrap();
//! let session = db.read_transaction("loading rules").unwrap();
//! let engine = RuleEngine::load(&session).unwrap();
//! let rules = engine.snapshot();
//! assert_eq!(rules.derive_usage_status(None, None), UsageStatusChange::Unchanged);
//! ```

pub mod engine;
pub mod seed;
pub mod store;
pub mod table;

pub use engine::RuleEngine;
pub use seed::{export_rules, seed_rules, RuleSeed, RuleSeedFile, DEFAULT_RULES};
pub use store::{insert_rule, load_rule_table, load_rules};
pub use table::{RuleTable, UsageStatusChange};
