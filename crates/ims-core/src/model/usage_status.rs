use serde::{Deserialize, Serialize};

use super::ids::UsageStatusId;

/// Lifecycle state of a physical item (New, In Use, Used, Scrapped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStatus {
    #[serde(rename = "_id")]
    pub id: UsageStatusId,
    pub value: String,

    /// Normalized value, used for uniqueness checks.
    pub code: String,
}

impl UsageStatus {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            id: UsageStatusId::new(),
            code: generate_code(&value),
            value,
        }
    }
}

/// Normalize a display value into a code: trimmed, lowercase, spaces
/// replaced by hyphens.
pub fn generate_code(value: &str) -> String {
    value.trim().to_lowercase().replace(' ', "-")
}
