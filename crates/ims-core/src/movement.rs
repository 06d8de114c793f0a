//! Writing item placements together with their derived usage status.
//!
//! Every operation runs in the caller's session, so the new `system_id` and
//! the usage-status change commit or roll back together.

use serde_json::Value;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::model::{ItemId, SystemId, SystemTypeId, UsageStatus, UsageStatusId};
use crate::rules::{RuleTable, UsageStatusChange};
use crate::schema::{collections, from_document, Document, Filter, Session};

const SYSTEM_ID: &str = "system_id";
const TYPE_ID: &str = "type_id";
const USAGE_STATUS_ID: &str = "usage_status_id";
const USAGE_STATUS: &str = "usage_status";

/// Places, moves and removes items using one rule table snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ItemMovement<'a> {
    rules: &'a RuleTable,
}

impl<'a> ItemMovement<'a> {
    #[must_use]
    pub const fn new(rules: &'a RuleTable) -> Self {
        Self { rules }
    }

    /// Insert a new item into the system named by its `system_id` field.
    pub fn place_new_item(
        &self,
        session: &Session<'_>,
        mut item: Document,
    ) -> Result<(ItemId, UsageStatusChange)> {
        let system_id = required_id::<SystemId>(&item, SYSTEM_ID, "new item")?;
        let destination = system_type_of(session, system_id)?;

        let change = self.rules.derive_usage_status(None, Some(destination));
        apply_change(session, &mut item, change)?;

        let id = session.insert_one(collections::ITEMS, item)?;
        log::debug!("Placed item {} in system {} ({:?})", id, system_id, change);
        Ok((ItemId::from_str(&id)?, change))
    }

    /// Move an existing item into another system.
    pub fn move_item(
        &self,
        session: &Session<'_>,
        item_id: ItemId,
        destination_system: SystemId,
    ) -> Result<UsageStatusChange> {
        let mut item = load_item(session, item_id)?;
        let source = current_system_type(session, &item, item_id)?;
        let destination = system_type_of(session, destination_system)?;

        let change = self.rules.derive_usage_status(source, Some(destination));
        item.insert(
            SYSTEM_ID.to_string(),
            Value::String(destination_system.to_string()),
        );
        apply_change(session, &mut item, change)?;

        session.replace_one(collections::ITEMS, &item_id.to_string(), item)?;
        log::debug!(
            "Moved item {} to system {} ({:?})",
            item_id,
            destination_system,
            change
        );
        Ok(change)
    }

    /// Delete an item, returning the change a removal would cause so it
    /// can be recorded.
    pub fn remove_item(&self, session: &Session<'_>, item_id: ItemId) -> Result<UsageStatusChange> {
        let item = load_item(session, item_id)?;
        let source = current_system_type(session, &item, item_id)?;

        let change = self.rules.derive_usage_status(source, None);
        session.delete_many(
            collections::ITEMS,
            &Filter::by_id(item_id.to_string()),
        )?;
        log::debug!("Removed item {} ({:?})", item_id, change);
        Ok(change)
    }
}

/// The `type_id` of a system. A system without one is an error rather than
/// a transition from "nowhere".
pub fn system_type_of(session: &Session<'_>, system_id: SystemId) -> Result<SystemTypeId> {
    let system = session
        .find_by_id(collections::SYSTEMS, &system_id.to_string())?
        .ok_or_else(|| Error::not_found(SystemId::ENTITY, system_id.to_string()))?;
    required_id(&system, TYPE_ID, &format!("system {}", system_id))
}

fn load_item(session: &Session<'_>, item_id: ItemId) -> Result<Document> {
    session
        .find_by_id(collections::ITEMS, &item_id.to_string())?
        .ok_or_else(|| Error::not_found(ItemId::ENTITY, item_id.to_string()))
}

fn current_system_type(
    session: &Session<'_>,
    item: &Document,
    item_id: ItemId,
) -> Result<Option<SystemTypeId>> {
    match item.get(SYSTEM_ID) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => {
            let system_id = required_id::<SystemId>(item, SYSTEM_ID, &format!("item {}", item_id))?;
            system_type_of(session, system_id).map(Some)
        }
    }
}

fn required_id<T: FromStr<Err = Error>>(doc: &Document, field: &str, owner: &str) -> Result<T> {
    match doc.get(field) {
        Some(Value::String(id)) => id.parse(),
        Some(other) => Err(Error::InvalidData(format!(
            "{} has a non-string {}: {}",
            owner, field, other
        ))),
        None | Some(Value::Null) => Err(Error::InvalidData(format!(
            "{} has no {}",
            owner, field
        ))),
    }
}

fn apply_change(session: &Session<'_>, item: &mut Document, change: UsageStatusChange) -> Result<()> {
    match change {
        UsageStatusChange::Unchanged => {}
        UsageStatusChange::Clear => {
            item.remove(USAGE_STATUS_ID);
            item.remove(USAGE_STATUS);
        }
        UsageStatusChange::Set(status_id) => {
            let doc = session
                .find_by_id(collections::USAGE_STATUSES, &status_id.to_string())?
                .ok_or_else(|| Error::not_found(UsageStatusId::ENTITY, status_id.to_string()))?;
            let status: UsageStatus = from_document(doc)?;
            item.insert(
                USAGE_STATUS_ID.to_string(),
                Value::String(status.id.to_string()),
            );
            item.insert(USAGE_STATUS.to_string(), Value::String(status.value));
        }
    }
    Ok(())
}
