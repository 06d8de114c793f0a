use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::model::{Rule, SystemTypeId, UsageStatusId};

type RuleKey = (Option<SystemTypeId>, Option<SystemTypeId>);

/// What a system-type transition does to an item's usage status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageStatusChange {
    /// No rule covers the transition; keep the current status as-is.
    Unchanged,
    /// A rule covers the transition and sets no status; clear it.
    Clear,
    /// A rule covers the transition; use this status.
    Set(UsageStatusId),
}

impl UsageStatusChange {
    pub const fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

/// An immutable, validated set of usage-status rules keyed by
/// `(source type, destination type)`.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
    index: HashMap<RuleKey, usize>,
}

impl RuleTable {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table, rejecting any two rules with the same
    /// `(source, destination)` pair whatever their usage statuses.
    pub fn from_rules(rules: impl IntoIterator<Item = Rule>) -> Result<Self> {
        let rules: Vec<Rule> = rules.into_iter().collect();
        let mut index = HashMap::with_capacity(rules.len());

        for (position, rule) in rules.iter().enumerate() {
            match index.entry(rule.key()) {
                Entry::Occupied(existing) => {
                    let first: &Rule = &rules[*existing.get()];
                    return Err(Error::Configuration(format!(
                        "rules {} and {} both match the transition {} -> {}",
                        first.id,
                        rule.id,
                        TypeLabel(rule.source_system_type_id),
                        TypeLabel(rule.destination_system_type_id),
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(position);
                }
            }
        }

        Ok(Self { rules, index })
    }

    /// Derive the usage status for an item moving from a system of type
    /// `source` to one of type `destination`.
    ///
    /// `None` as source means the item is being created, `None` as
    /// destination means it is leaving every system.
    pub fn derive_usage_status(
        &self,
        source: Option<SystemTypeId>,
        destination: Option<SystemTypeId>,
    ) -> UsageStatusChange {
        match self.matching_rule(source, destination) {
            None => UsageStatusChange::Unchanged,
            Some(rule) => rule
                .destination_usage_status_id
                .map_or(UsageStatusChange::Clear, UsageStatusChange::Set),
        }
    }

    pub fn matching_rule(
        &self,
        source: Option<SystemTypeId>,
        destination: Option<SystemTypeId>,
    ) -> Option<&Rule> {
        self.index
            .get(&(source, destination))
            .map(|&position| &self.rules[position])
    }

    /// Rules in the order they were loaded.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

struct TypeLabel(Option<SystemTypeId>);

impl fmt::Display for TypeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{}", id),
            None => f.write_str("<none>"),
        }
    }
}
