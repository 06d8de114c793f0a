//! Integration tests for usage-status derivation against a file-backed
//! database: seeding, the engine snapshot and item movements together.

use ims_core::model::{SystemId, SystemType, UsageStatus};
use ims_core::movement::ItemMovement;
use ims_core::rules::{seed_rules, RuleEngine, RuleSeedFile, UsageStatusChange};
use ims_core::schema::{
    collections, from_document, to_document, Database, DatabaseOptions, Document, Filter,
    RetryPolicy,
};
use ims_core::Error;
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => panic!("not an object"),
    }
}

struct Site {
    dir: TempDir,
    db: Database,
    stores: SystemId,
    beamline: SystemId,
    skip: SystemId,
}

/// A database with the three system types, one system of each and the
/// default rule table.
fn site() -> Site {
    let dir = TempDir::new().unwrap();
    let mut db = Database::open(dir.path().join("ims.db")).unwrap();
    let stores = SystemId::new();
    let beamline = SystemId::new();
    let skip = SystemId::new();

    db.with_transaction("creating site", |session| {
        for (system, name, type_value) in [
            (stores, "Stores", "Storage"),
            (beamline, "Beamline", "Operational"),
            (skip, "Skip", "Scrapped"),
        ] {
            let system_type = SystemType::new(type_value);
            session.insert_one(collections::SYSTEM_TYPES, to_document(&system_type)?)?;
            session.insert_one(
                collections::SYSTEMS,
                doc(json!({
                    "_id": system.to_string(),
                    "name": name,
                    "parent_id": null,
                    "type_id": system_type.id.to_string(),
                })),
            )?;
        }
        seed_rules(session, &RuleSeedFile::default_rules()?, false)?;
        Ok(())
    })
    .unwrap();

    Site {
        dir,
        db,
        stores,
        beamline,
        skip,
    }
}

fn status_value(db: &mut Database, change: UsageStatusChange) -> Option<String> {
    let UsageStatusChange::Set(id) = change else {
        return None;
    };
    let session = db.read_transaction("reading status").unwrap();
    let doc = session
        .find_by_id(collections::USAGE_STATUSES, &id.to_string())
        .unwrap()
        .unwrap();
    Some(from_document::<UsageStatus>(doc).unwrap().value)
}

#[test]
fn test_item_lifecycle_follows_default_rules() {
    let mut site = site();
    let engine = {
        let session = site.db.read_transaction("loading rules").unwrap();
        RuleEngine::load(&session).unwrap()
    };
    let rules = engine.snapshot();
    let movement = ItemMovement::new(&rules);

    let (item, created) = site
        .db
        .with_transaction("creating item", |session| {
            movement.place_new_item(session, doc(json!({"system_id": site.stores.to_string()})))
        })
        .unwrap();
    assert_eq!(status_value(&mut site.db, created).as_deref(), Some("New"));

    let mut observed = Vec::new();
    for destination in [site.beamline, site.stores, site.beamline, site.skip] {
        let change = site
            .db
            .with_transaction("moving item", |session| {
                movement.move_item(session, item, destination)
            })
            .unwrap();
        observed.push(status_value(&mut site.db, change));
    }

    assert_eq!(
        observed,
        vec![
            Some("In Use".to_string()),
            Some("Used".to_string()),
            Some("In Use".to_string()),
            Some("Scrapped".to_string()),
        ]
    );

    let session = site.db.read_transaction("reading item").unwrap();
    let stored = session
        .find_by_id(collections::ITEMS, &item.to_string())
        .unwrap()
        .unwrap();
    assert_eq!(stored["usage_status"], json!("Scrapped"));
    assert_eq!(stored["system_id"], json!(site.skip.to_string()));
}

#[test]
fn test_removal_from_storage_clears_but_operational_keeps() {
    let mut site = site();
    let rules = {
        let session = site.db.read_transaction("loading rules").unwrap();
        RuleEngine::load(&session).unwrap().snapshot()
    };
    let movement = ItemMovement::new(&rules);

    let (stored, in_use) = site
        .db
        .with_transaction("creating items", |session| {
            let (stored, _) = movement
                .place_new_item(session, doc(json!({"system_id": site.stores.to_string()})))?;
            let (in_use, _) = movement
                .place_new_item(session, doc(json!({"system_id": site.stores.to_string()})))?;
            movement.move_item(session, in_use, site.beamline)?;
            Ok((stored, in_use))
        })
        .unwrap();

    let (storage_removal, operational_removal) = site
        .db
        .with_transaction("removing items", |session| {
            Ok((
                movement.remove_item(session, stored)?,
                movement.remove_item(session, in_use)?,
            ))
        })
        .unwrap();

    assert_eq!(storage_removal, UsageStatusChange::Clear);
    assert_eq!(operational_removal, UsageStatusChange::Unchanged);

    let session = site.db.read_transaction("counting").unwrap();
    assert_eq!(session.count(collections::ITEMS, &Filter::all()).unwrap(), 0);
}

#[test]
fn test_concurrent_writer_surfaces_as_conflict() {
    let site = site();
    let path = site.dir.path().join("ims.db");
    let mut holder = Database::open(&path).unwrap();
    let mut contender = Database::open_with(
        &path,
        DatabaseOptions {
            busy_timeout: Duration::from_millis(20),
            retry: RetryPolicy {
                max_retries: 2,
                min_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
        },
    )
    .unwrap();

    let lock = holder.transaction("holding the write lock").unwrap();
    let err = contender
        .with_transaction("creating item", |session| {
            session.insert_one(collections::ITEMS, doc(json!({"name": "blocked"})))
        })
        .unwrap_err();
    drop(lock);

    assert!(err.is_retryable(), "{:?}", err);
    assert!(matches!(err, Error::TransactionConflict(_)));
    assert!(err.to_string().contains("creating item"));

    let session = contender.read_transaction("counting").unwrap();
    assert_eq!(session.count(collections::ITEMS, &Filter::all()).unwrap(), 0);
}
