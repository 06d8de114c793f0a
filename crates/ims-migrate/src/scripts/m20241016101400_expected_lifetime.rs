use ims_core::schema::{collections, Filter, Session, Update};
use serde_json::Value;

use crate::migration::Migration;

const FIELD: &str = "expected_lifetime_days";

/// Gives every item an `expected_lifetime_days` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpectedLifetime;

impl Migration for ExpectedLifetime {
    fn name(&self) -> &str {
        "20241016101400_expected_lifetime"
    }

    fn description(&self) -> &str {
        "Adds expected_lifetime_days to items"
    }

    fn forward(&self, session: &Session<'_>) -> ims_core::Result<()> {
        // Missing compares equal to null, so existing values are kept.
        let updated = session.update_many(
            collections::ITEMS,
            &Filter::all().eq(FIELD, Value::Null),
            &Update::new().set(FIELD, Value::Null),
        )?;
        log::debug!("Added {} to {} item(s)", FIELD, updated);
        Ok(())
    }

    fn backward(&self, session: &Session<'_>) -> ims_core::Result<()> {
        let updated =
            session.update_many(collections::ITEMS, &Filter::all(), &Update::new().unset(FIELD))?;
        log::debug!("Removed {} from {} item(s)", FIELD, updated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ims_core::schema::Database;
    use serde_json::json;

    #[test]
    fn test_forward_keeps_existing_values() {
        let mut db = Database::open_in_memory().unwrap();
        let session = db.transaction("test").unwrap();
        let Value::Object(with_value) = json!({"_id": "a", "expected_lifetime_days": 365.0}) else {
            unreachable!()
        };
        let Value::Object(without) = json!({"_id": "b"}) else {
            unreachable!()
        };
        session.insert_many(collections::ITEMS, [with_value, without]).unwrap();

        ExpectedLifetime.forward(&session).unwrap();

        let a = session.find_by_id(collections::ITEMS, "a").unwrap().unwrap();
        let b = session.find_by_id(collections::ITEMS, "b").unwrap().unwrap();
        assert_eq!(a[FIELD], json!(365.0));
        assert_eq!(b.get(FIELD), Some(&Value::Null));

        ExpectedLifetime.backward(&session).unwrap();
        let b = session.find_by_id(collections::ITEMS, "b").unwrap().unwrap();
        assert!(!b.contains_key(FIELD));
    }
}
