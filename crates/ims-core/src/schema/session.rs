use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};

use super::query::{Filter, Update};
use super::Document;

/// A scoped transaction over the document store.
///
/// Every read and write goes through a session. [`Session::commit`] makes
/// the writes visible; dropping the session in any other way rolls them
/// back.
pub struct Session<'db> {
    tx: Transaction<'db>,
    action: String,
}

impl fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

impl<'db> Session<'db> {
    pub(crate) fn begin(
        conn: &'db mut Connection,
        action: &str,
        behavior: TransactionBehavior,
    ) -> Result<Self> {
        log::debug!("Starting transaction: {}", action);
        Ok(Self {
            tx: conn.transaction_with_behavior(behavior)?,
            action: action.to_string(),
        })
    }

    /// What this transaction is doing, for error messages.
    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn commit(self) -> Result<()> {
        log::debug!("Committing transaction: {}", self.action);
        self.tx.commit()?;
        Ok(())
    }

    pub fn rollback(self) -> Result<()> {
        log::debug!("Rolling back transaction: {}", self.action);
        self.tx.rollback()?;
        Ok(())
    }
}

// Reads
impl Session<'_> {
    fn scan(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        let mut stmt = self
            .tx
            .prepare_cached("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY seq")?;
        let rows = stmt
            .query_map([collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, body)| Ok((id, parse_body(collection, &body)?)))
            .collect()
    }

    /// All documents of `collection` matching `filter`, in insertion order.
    pub fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        Ok(self
            .scan(collection)?
            .into_iter()
            .map(|(_, doc)| doc)
            .filter(|doc| filter.matches(doc))
            .collect())
    }

    pub fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        Ok(self
            .scan(collection)?
            .into_iter()
            .map(|(_, doc)| doc)
            .find(|doc| filter.matches(doc)))
    }

    pub fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let body: Option<String> = self
            .tx
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                [collection, id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|body| parse_body(collection, &body)).transpose()
    }

    pub fn count(&self, collection: &str, filter: &Filter) -> Result<usize> {
        if filter.is_empty() {
            let count: i64 = self.tx.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                [collection],
                |row| row.get(0),
            )?;
            return Ok(usize::try_from(count).unwrap_or(0));
        }
        Ok(self.find(collection, filter)?.len())
    }
}

// Writes
impl Session<'_> {
    /// Insert a document, generating a UUID `_id` when it has none.
    pub fn insert_one(&self, collection: &str, mut doc: Document) -> Result<String> {
        let id = match doc.get("_id") {
            Some(Value::String(id)) => id.clone(),
            Some(other) => {
                return Err(Error::InvalidData(format!(
                    "_id in {} must be a string, got {}",
                    collection, other
                )))
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                doc.insert("_id".to_string(), Value::String(id.clone()));
                id
            }
        };

        self.tx
            .prepare_cached("INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)")?
            .execute(rusqlite::params![collection, id, serde_json::to_string(&doc)?])?;
        Ok(id)
    }

    pub fn insert_many(
        &self,
        collection: &str,
        docs: impl IntoIterator<Item = Document>,
    ) -> Result<Vec<String>> {
        docs.into_iter()
            .map(|doc| self.insert_one(collection, doc))
            .collect()
    }

    /// Replace the body of document `id`, keeping its position in the
    /// collection. Returns `false` when no such document exists.
    pub fn replace_one(&self, collection: &str, id: &str, mut doc: Document) -> Result<bool> {
        doc.insert("_id".to_string(), Value::String(id.to_string()));
        let changed = self
            .tx
            .prepare_cached("UPDATE documents SET body = ?3 WHERE collection = ?1 AND id = ?2")?
            .execute(rusqlite::params![collection, id, serde_json::to_string(&doc)?])?;
        Ok(changed > 0)
    }

    /// Insert document `id` or replace it if it already exists.
    pub fn upsert(&self, collection: &str, id: &str, mut doc: Document) -> Result<()> {
        doc.insert("_id".to_string(), Value::String(id.to_string()));
        self.tx
            .prepare_cached(
                "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)
                 ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body",
            )?
            .execute(rusqlite::params![collection, id, serde_json::to_string(&doc)?])?;
        Ok(())
    }

    /// Apply `update` to every matching document. Returns how many changed.
    pub fn update_many(&self, collection: &str, filter: &Filter, update: &Update) -> Result<usize> {
        let mut modified = 0;
        for (id, mut doc) in self.scan(collection)? {
            if !filter.matches(&doc) {
                continue;
            }
            if update.apply(&mut doc)? {
                self.replace_one(collection, &id, doc)?;
                modified += 1;
            }
        }
        log::debug!("Updated {} document(s) in {}", modified, collection);
        Ok(modified)
    }

    pub fn delete_many(&self, collection: &str, filter: &Filter) -> Result<usize> {
        if filter.is_empty() {
            return self.drop_collection(collection);
        }

        let mut deleted = 0;
        for (id, doc) in self.scan(collection)? {
            if filter.matches(&doc) {
                deleted += self.tx.execute(
                    "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                    [collection, id.as_str()],
                )?;
            }
        }
        Ok(deleted)
    }

    /// Delete every document of `collection`.
    pub fn drop_collection(&self, collection: &str) -> Result<usize> {
        let deleted = self
            .tx
            .execute("DELETE FROM documents WHERE collection = ?1", [collection])?;
        log::debug!("Dropped {} document(s) from {}", deleted, collection);
        Ok(deleted)
    }
}

fn parse_body(collection: &str, body: &str) -> Result<Document> {
    match serde_json::from_str(body)? {
        Value::Object(doc) => Ok(doc),
        other => Err(Error::InvalidData(format!(
            "document in {} is not an object: {}",
            collection, other
        ))),
    }
}

/// Read a typed record out of a document.
pub fn from_document<T: serde::de::DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// Turn a typed record into a document.
pub fn to_document<T: serde::Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(doc) => Ok(doc),
        other => Err(Error::InvalidData(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Database;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_insert_generates_id() {
        let mut db = Database::open_in_memory().unwrap();
        let session = db.transaction("test").unwrap();

        let id = session.insert_one("units", doc(json!({"value": "mm"}))).unwrap();
        let stored = session.find_by_id("units", &id).unwrap().unwrap();

        assert_eq!(stored.get("_id"), Some(&json!(id)));
        assert_eq!(stored.get("value"), Some(&json!("mm")));
    }

    #[test]
    fn test_insert_rejects_non_string_id() {
        let mut db = Database::open_in_memory().unwrap();
        let session = db.transaction("test").unwrap();
        let err = session.insert_one("units", doc(json!({"_id": 5}))).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        let session = db.transaction("test").unwrap();
        session.insert_one("units", doc(json!({"_id": "a"}))).unwrap();
        assert!(session.insert_one("units", doc(json!({"_id": "a"}))).is_err());
        // Same id in another collection is fine
        session.insert_one("systems", doc(json!({"_id": "a"}))).unwrap();
    }

    #[test]
    fn test_find_preserves_insertion_order() {
        let mut db = Database::open_in_memory().unwrap();
        let session = db.transaction("test").unwrap();
        for name in ["c", "a", "b"] {
            session.insert_one("systems", doc(json!({"_id": name}))).unwrap();
        }
        session
            .replace_one("systems", "c", doc(json!({"name": "changed"})))
            .unwrap();

        let ids: Vec<_> = session
            .find("systems", &Filter::all())
            .unwrap()
            .into_iter()
            .map(|d| d["_id"].clone())
            .collect();
        assert_eq!(ids, vec![json!("c"), json!("a"), json!("b")]);
    }

    #[test]
    fn test_find_one_and_count_with_filter() {
        let mut db = Database::open_in_memory().unwrap();
        let session = db.transaction("test").unwrap();
        session
            .insert_many(
                "systems",
                vec![
                    doc(json!({"name": "root"})),
                    doc(json!({"name": "child", "parent_id": "x"})),
                ],
            )
            .unwrap();

        let roots = Filter::all().eq("parent_id", Value::Null);
        assert_eq!(session.count("systems", &roots).unwrap(), 1);
        let root = session.find_one("systems", &roots).unwrap().unwrap();
        assert_eq!(root["name"], json!("root"));
        assert_eq!(session.count("systems", &Filter::all()).unwrap(), 2);
    }

    #[test]
    fn test_replace_missing_returns_false() {
        let mut db = Database::open_in_memory().unwrap();
        let session = db.transaction("test").unwrap();
        assert!(!session.replace_one("units", "nope", Document::new()).unwrap());
    }

    #[test]
    fn test_upsert_inserts_then_replaces() {
        let mut db = Database::open_in_memory().unwrap();
        let session = db.transaction("test").unwrap();
        session.upsert("state", "only", doc(json!({"n": 1}))).unwrap();
        session.upsert("state", "only", doc(json!({"n": 2}))).unwrap();

        assert_eq!(session.count("state", &Filter::all()).unwrap(), 1);
        let stored = session.find_by_id("state", "only").unwrap().unwrap();
        assert_eq!(stored["n"], json!(2));
    }

    #[test]
    fn test_update_many_and_delete_many() {
        let mut db = Database::open_in_memory().unwrap();
        let session = db.transaction("test").unwrap();
        session
            .insert_many(
                "items",
                vec![
                    doc(json!({"system_id": "s1"})),
                    doc(json!({"system_id": "s1"})),
                    doc(json!({"system_id": "s2"})),
                ],
            )
            .unwrap();

        let in_s1 = Filter::all().eq("system_id", "s1");
        let modified = session
            .update_many("items", &in_s1, &Update::new().set("usage_status", "New"))
            .unwrap();
        assert_eq!(modified, 2);

        let deleted = session.delete_many("items", &in_s1).unwrap();
        assert_eq!(deleted, 2);
        let left = session.find("items", &Filter::all()).unwrap();
        assert_eq!(left.len(), 1);
        assert!(left[0].get("usage_status").is_none());
    }

    #[test]
    fn test_serialized_bodies_are_key_sorted() {
        let mut db = Database::open_in_memory().unwrap();
        let session = db.transaction("test").unwrap();
        let mut d = Document::new();
        d.insert("zeta".to_string(), json!(1));
        d.insert("alpha".to_string(), json!(2));
        session.insert_one("units", d).unwrap();

        let body: String = session
            .tx
            .query_row("SELECT body FROM documents WHERE collection = 'units'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert!(body.find("alpha").unwrap() < body.find("zeta").unwrap());
    }

    #[test]
    fn test_typed_round_trip_helpers() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Unit {
            value: String,
        }

        let d = to_document(&Unit {
            value: "mm".to_string(),
        })
        .unwrap();
        let unit: Unit = from_document(d).unwrap();
        assert_eq!(unit.value, "mm");
        assert!(to_document(&5).is_err());
    }
}
