use serde::{Deserialize, Serialize};

use super::ids::SystemTypeId;

/// Classification of a system an item can reside in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemType {
    #[serde(rename = "_id")]
    pub id: SystemTypeId,
    pub value: String,
}

impl SystemType {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            id: SystemTypeId::new(),
            value: value.into(),
        }
    }
}
