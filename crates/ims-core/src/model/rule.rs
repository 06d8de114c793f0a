use serde::{Deserialize, Serialize};

use super::ids::{RuleId, SystemTypeId, UsageStatusId};

/// A usage-status rule as stored in the `rules` collection.
///
/// A missing source type means the item is newly created, a missing
/// destination type means the item leaves every system, and a missing usage
/// status means the status is cleared when the rule fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "_id")]
    pub id: RuleId,

    #[serde(rename = "src_system_type_id", default)]
    pub source_system_type_id: Option<SystemTypeId>,

    #[serde(rename = "dst_system_type_id", default)]
    pub destination_system_type_id: Option<SystemTypeId>,

    #[serde(rename = "dst_usage_status_id", default)]
    pub destination_usage_status_id: Option<UsageStatusId>,
}

impl Rule {
    #[must_use]
    pub fn new(
        source: Option<SystemTypeId>,
        destination: Option<SystemTypeId>,
        usage_status: Option<UsageStatusId>,
    ) -> Self {
        Self {
            id: RuleId::new(),
            source_system_type_id: source,
            destination_system_type_id: destination,
            destination_usage_status_id: usage_status,
        }
    }

    /// The `(source, destination)` pair this rule matches on.
    #[must_use]
    pub const fn key(&self) -> (Option<SystemTypeId>, Option<SystemTypeId>) {
        (self.source_system_type_id, self.destination_system_type_id)
    }
}
