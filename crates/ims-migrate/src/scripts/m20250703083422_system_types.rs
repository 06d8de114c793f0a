use ims_core::model::SystemType;
use ims_core::schema::{
    collections, from_document, to_document, Database, Document, Filter, Session, Update,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::migration::Migration;

const SYSTEM_TYPE_VALUES: [&str; 3] = ["Storage", "Operational", "Scrapped"];
const DEFAULT_TYPE: &str = "Operational";

/// Creates the `system_types` collection and gives every system a
/// `type_id`.
///
/// A root system whose name equals a type value gets that type, any other
/// root is `Operational`, and every descendant inherits its root's type.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTypes;

impl SystemTypes {
    /// Ids of the system types by value, creating any that are missing.
    fn ensure_system_types(session: &Session<'_>) -> ims_core::Result<HashMap<String, String>> {
        let mut ids: HashMap<String, String> = session
            .find(collections::SYSTEM_TYPES, &Filter::all())?
            .into_iter()
            .map(from_document::<SystemType>)
            .map(|t| t.map(|t| (t.value, t.id.to_string())))
            .collect::<ims_core::Result<_>>()?;

        for value in SYSTEM_TYPE_VALUES {
            if !ids.contains_key(value) {
                let system_type = SystemType::new(value);
                session.insert_one(collections::SYSTEM_TYPES, to_document(&system_type)?)?;
                ids.insert(value.to_string(), system_type.id.to_string());
            }
        }
        Ok(ids)
    }
}

fn string_field<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str)
}

impl Migration for SystemTypes {
    fn name(&self) -> &str {
        "20250703083422_system_types"
    }

    fn description(&self) -> &str {
        "Adds system_types collection and type_id field to systems"
    }

    fn forward(&self, session: &Session<'_>) -> ims_core::Result<()> {
        let type_ids = Self::ensure_system_types(session)?;
        let default_type = type_ids.get(DEFAULT_TYPE).cloned().ok_or_else(|| {
            ims_core::Error::InvalidData(format!("system type {} is missing", DEFAULT_TYPE))
        })?;

        let systems = session.find(collections::SYSTEMS, &Filter::all())?;
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut queue = VecDeque::new();

        for system in &systems {
            let Some(id) = string_field(system, "_id") else {
                continue;
            };
            match string_field(system, "parent_id") {
                Some(parent) => children
                    .entry(parent.to_string())
                    .or_default()
                    .push(id.to_string()),
                None => {
                    let type_id = string_field(system, "name")
                        .and_then(|name| type_ids.get(name))
                        .unwrap_or(&default_type);
                    queue.push_back((id.to_string(), type_id.clone()));
                }
            }
        }

        let mut by_id: HashMap<String, Document> = systems
            .into_iter()
            .filter_map(|doc| {
                let id = string_field(&doc, "_id")?.to_string();
                Some((id, doc))
            })
            .collect();
        let mut visited = HashSet::new();

        // Breadth-first so arbitrarily deep hierarchies need no recursion.
        while let Some((id, type_id)) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            if let Some(mut system) = by_id.remove(&id) {
                system.insert("type_id".to_string(), Value::String(type_id.clone()));
                session.replace_one(collections::SYSTEMS, &id, system)?;
            }
            for child in children.remove(&id).unwrap_or_default() {
                queue.push_back((child, type_id.clone()));
            }
        }

        if !by_id.is_empty() {
            log::warn!(
                "{} system(s) are not reachable from a root system and were left without a type",
                by_id.len()
            );
        }
        Ok(())
    }

    fn backward(&self, session: &Session<'_>) -> ims_core::Result<()> {
        session.update_many(
            collections::SYSTEMS,
            &Filter::all(),
            &Update::new().unset("type_id"),
        )?;
        Ok(())
    }

    fn backward_after_transaction(&self, db: &mut Database) -> ims_core::Result<()> {
        let dropped = db.with_transaction("dropping system types", |session| {
            session.drop_collection(collections::SYSTEM_TYPES)
        })?;
        log::info!("Dropped {} system type(s)", dropped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn system(id: &str, name: &str, parent: Option<&str>) -> Document {
        let Value::Object(doc) = json!({"_id": id, "name": name, "parent_id": parent}) else {
            unreachable!()
        };
        doc
    }

    fn type_value(session: &Session<'_>, system_id: &str) -> String {
        let system = session
            .find_by_id(collections::SYSTEMS, system_id)
            .unwrap()
            .unwrap();
        let type_id = system["type_id"].as_str().unwrap();
        let doc = session
            .find_by_id(collections::SYSTEM_TYPES, type_id)
            .unwrap()
            .unwrap();
        from_document::<SystemType>(doc).unwrap().value
    }

    #[test]
    fn test_roots_match_by_name_and_children_inherit() {
        let mut db = Database::open_in_memory().unwrap();
        let session = db.transaction("test").unwrap();
        session
            .insert_many(
                collections::SYSTEMS,
                [
                    system("root-storage", "Storage", None),
                    system("root-other", "Beamline", None),
                    system("child", "Shelf", Some("root-storage")),
                    system("grandchild", "Box", Some("child")),
                    system("other-child", "Magnet", Some("root-other")),
                ],
            )
            .unwrap();

        SystemTypes.forward(&session).unwrap();

        assert_eq!(type_value(&session, "root-storage"), "Storage");
        assert_eq!(type_value(&session, "child"), "Storage");
        assert_eq!(type_value(&session, "grandchild"), "Storage");
        assert_eq!(type_value(&session, "root-other"), "Operational");
        assert_eq!(type_value(&session, "other-child"), "Operational");
    }

    #[test]
    fn test_deep_hierarchy() {
        let mut db = Database::open_in_memory().unwrap();
        let session = db.transaction("test").unwrap();
        let mut docs = vec![system("s0", "Scrapped", None)];
        for depth in 1..2000 {
            docs.push(system(
                &format!("s{}", depth),
                "nested",
                Some(&format!("s{}", depth - 1)),
            ));
        }
        session.insert_many(collections::SYSTEMS, docs).unwrap();

        SystemTypes.forward(&session).unwrap();

        assert_eq!(type_value(&session, "s1999"), "Scrapped");
    }

    #[test]
    fn test_forward_twice_reuses_types() {
        let mut db = Database::open_in_memory().unwrap();
        let session = db.transaction("test").unwrap();
        SystemTypes.forward(&session).unwrap();
        SystemTypes.forward(&session).unwrap();
        assert_eq!(
            session
                .count(collections::SYSTEM_TYPES, &Filter::all())
                .unwrap(),
            3
        );
    }

    #[test]
    fn test_backward_then_drop() {
        let mut db = Database::open_in_memory().unwrap();
        db.with_transaction("forward", |session| {
            session.insert_one(collections::SYSTEMS, system("a", "Storage", None))?;
            SystemTypes.forward(session)
        })
        .unwrap();

        db.with_transaction("backward", |session| SystemTypes.backward(session))
            .unwrap();
        SystemTypes.backward_after_transaction(&mut db).unwrap();

        let session = db.read_transaction("check").unwrap();
        let a = session.find_by_id(collections::SYSTEMS, "a").unwrap().unwrap();
        assert!(!a.contains_key("type_id"));
        assert_eq!(
            session
                .count(collections::SYSTEM_TYPES, &Filter::all())
                .unwrap(),
            0
        );
    }
}
