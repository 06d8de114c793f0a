//! Moves the database between migration states.
//!
//! The runner is positioned by the recorded `current_migration_name`:
//! either nothing is applied, or every unit up to and including the named
//! one is. Each unit runs in its own transaction together with the state
//! update naming the state it leaves behind, so the record always matches
//! the committed data.

use ims_core::schema::{
    get_current_migration_state, set_current_migration_state, Database, MigrationRecord,
};

use crate::error::{state_label, Direction, MigrationError, MigrationResult};
use crate::registry::Registry;

/// One unit of a plan and the state recorded once it commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub name: String,
    pub description: String,
    pub state_after: Option<String>,
    index: usize,
}

/// Units to run for one forward or backward request, computed without
/// touching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    pub direction: Direction,
    /// State the plan was computed from.
    pub start: Option<String>,
    pub target: String,
    pub steps: Vec<PlannedStep>,
}

impl MigrationPlan {
    /// State after every step has run.
    pub fn end_state(&self) -> Option<&str> {
        self.steps
            .last()
            .map_or(self.start.as_deref(), |step| step.state_after.as_deref())
    }
}

/// One registry entry as seen by [`Migrator::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub name: String,
    pub description: String,
    pub applied: bool,
}

/// Read-only view of where the database stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub current: Option<String>,
    /// `false` when the recorded name is not in the registry. Nothing can
    /// run until the state is corrected.
    pub current_known: bool,
    pub entries: Vec<StatusEntry>,
    pub pending: Vec<String>,
    /// Applied units, most recent first.
    pub revertible: Vec<String>,
    /// Registered units not present at the last recorded run.
    pub added_since_last_run: Vec<String>,
    /// Units recorded at the last run that are no longer registered.
    pub missing_from_registry: Vec<String>,
}

impl MigrationStatus {
    pub fn has_drift(&self) -> bool {
        !self.added_since_last_run.is_empty() || !self.missing_from_registry.is_empty()
    }
}

/// Plans and runs migrations from a [`Registry`].
#[derive(Debug)]
pub struct Migrator {
    registry: Registry,
}

impl Migrator {
    #[must_use]
    pub const fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    fn read_state(db: &mut Database) -> MigrationResult<MigrationRecord> {
        let session = db.read_transaction("reading migration state")?;
        let record = get_current_migration_state(&session)?;
        session.commit()?;
        Ok(record)
    }

    /// Registry index of the recorded state, refusing a name the registry
    /// does not know.
    fn position(&self, record: &MigrationRecord) -> MigrationResult<Option<usize>> {
        match &record.current_migration_name {
            None => Ok(None),
            Some(name) => self.registry.index_of(name).map(Some).ok_or_else(|| {
                MigrationError::Configuration(format!(
                    "recorded migration {} is not in the registry; correct it with `migrate set`",
                    name
                ))
            }),
        }
    }

    pub fn status(&self, db: &mut Database) -> MigrationResult<MigrationStatus> {
        let record = Self::read_state(db)?;
        let names = self.registry.names();
        let position = self.position(&record);
        let current_known = position.is_ok();
        let applied_through = position.unwrap_or(None);

        let is_applied = |index: usize| applied_through.is_some_and(|p| index <= p);

        let entries = self
            .registry
            .units()
            .iter()
            .enumerate()
            .map(|(index, unit)| StatusEntry {
                name: unit.name().to_string(),
                description: unit.description().to_string(),
                applied: current_known && is_applied(index),
            })
            .collect::<Vec<_>>();

        let (pending, revertible) = if current_known {
            let pending = entries
                .iter()
                .filter(|e| !e.applied)
                .map(|e| e.name.clone())
                .collect();
            let revertible = entries
                .iter()
                .rev()
                .filter(|e| e.applied)
                .map(|e| e.name.clone())
                .collect();
            (pending, revertible)
        } else {
            (Vec::new(), Vec::new())
        };

        // A database that never recorded a run has nothing to drift from.
        let recorded = &record.available_migrations;
        let (added_since_last_run, missing_from_registry) = if recorded.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            (
                names
                    .iter()
                    .filter(|name| !recorded.contains(name))
                    .cloned()
                    .collect(),
                recorded
                    .iter()
                    .filter(|name| !names.contains(name))
                    .cloned()
                    .collect(),
            )
        };

        Ok(MigrationStatus {
            current: record.current_migration_name,
            current_known,
            entries,
            pending,
            revertible,
            added_since_last_run,
            missing_from_registry,
        })
    }

    /// Units strictly after the current state up to and including `target`
    /// (`latest` for the last one).
    pub fn plan_forward(&self, db: &mut Database, target: &str) -> MigrationResult<MigrationPlan> {
        let record = Self::read_state(db)?;
        let position = self.position(&record)?;
        let no_op = || MigrationError::NoOp {
            target: target.to_string(),
            current: record.current_migration_name.clone(),
            direction: Direction::Forward,
        };

        let target_index = self.registry.resolve(target)?.ok_or_else(no_op)?;
        let first = position.map_or(0, |p| p + 1);
        if target_index < first {
            return Err(no_op());
        }

        let steps = (first..=target_index)
            .map(|index| {
                let unit = &self.registry.units()[index];
                PlannedStep {
                    name: unit.name().to_string(),
                    description: unit.description().to_string(),
                    state_after: Some(unit.name().to_string()),
                    index,
                }
            })
            .collect();

        Ok(MigrationPlan {
            direction: Direction::Forward,
            start: record.current_migration_name.clone(),
            target: target.to_string(),
            steps,
        })
    }

    /// Units from the current state back to and including `target`, most
    /// recent first. Undoing a unit leaves the state at its predecessor.
    pub fn plan_backward(&self, db: &mut Database, target: &str) -> MigrationResult<MigrationPlan> {
        let record = Self::read_state(db)?;
        let position = self.position(&record)?;
        let no_op = || MigrationError::NoOp {
            target: target.to_string(),
            current: record.current_migration_name.clone(),
            direction: Direction::Backward,
        };

        let target_index = self.registry.resolve(target)?.ok_or_else(no_op)?;
        let last = position.ok_or_else(no_op)?;
        if target_index > last {
            return Err(no_op());
        }

        let units = self.registry.units();
        let steps = (target_index..=last)
            .rev()
            .map(|index| PlannedStep {
                name: units[index].name().to_string(),
                description: units[index].description().to_string(),
                state_after: index
                    .checked_sub(1)
                    .map(|previous| units[previous].name().to_string()),
                index,
            })
            .collect();

        Ok(MigrationPlan {
            direction: Direction::Backward,
            start: record.current_migration_name.clone(),
            target: target.to_string(),
            steps,
        })
    }

    /// Run every step of `plan`, stopping at the first failure.
    ///
    /// Returns the state the store is left in.
    pub fn execute(
        &self,
        db: &mut Database,
        plan: &MigrationPlan,
    ) -> MigrationResult<Option<String>> {
        db.ensure_transactions_supported()
            .map_err(|err| MigrationError::Configuration(err.to_string()))?;

        let record = Self::read_state(db)?;
        if record.current_migration_name != plan.start {
            return Err(MigrationError::Configuration(format!(
                "migration state changed since the plan was made (expected {}, found {})",
                state_label(&plan.start),
                state_label(&record.current_migration_name)
            )));
        }

        let names = self.registry.names();
        let mut state = plan.start.clone();

        for step in &plan.steps {
            let unit = self
                .registry
                .get(step.index)
                .filter(|unit| unit.name() == step.name)
                .ok_or_else(|| MigrationError::NotFound {
                    name: step.name.clone(),
                })?;

            let action = match plan.direction {
                Direction::Forward => format!("applying migration {}", step.name),
                Direction::Backward => format!("reverting migration {}", step.name),
            };
            log::info!("{}: {}", capitalize(&action), step.description);

            let outcome = db.with_transaction(&action, |session| {
                match plan.direction {
                    Direction::Forward => unit.forward(session)?,
                    Direction::Backward => unit.backward(session)?,
                }
                set_current_migration_state(session, step.state_after.as_deref(), &names)
            });

            if let Err(source) = outcome {
                log::error!(
                    "Migration {} failed going {}; state remains {}",
                    step.name,
                    plan.direction,
                    state_label(&state)
                );
                return Err(MigrationError::UnitFailed {
                    name: step.name.clone(),
                    direction: plan.direction,
                    state,
                    source,
                });
            }
            state.clone_from(&step.state_after);

            let finalised = match plan.direction {
                Direction::Forward => unit.forward_after_transaction(db),
                Direction::Backward => unit.backward_after_transaction(db),
            };
            if let Err(source) = finalised {
                log::error!(
                    "Post-commit step of {} failed; state is {}",
                    step.name,
                    state_label(&state)
                );
                return Err(MigrationError::UnitFailed {
                    name: step.name.clone(),
                    direction: plan.direction,
                    state,
                    source,
                });
            }

            log::info!(
                "Finished {} {}; state is now {}",
                plan.direction,
                step.name,
                state_label(&state)
            );
        }

        Ok(state)
    }

    pub fn forward(&self, db: &mut Database, target: &str) -> MigrationResult<Option<String>> {
        let plan = self.plan_forward(db, target)?;
        self.execute(db, &plan)
    }

    pub fn backward(&self, db: &mut Database, target: &str) -> MigrationResult<Option<String>> {
        let plan = self.plan_backward(db, target)?;
        self.execute(db, &plan)
    }

    /// Record `name` as the current state without running anything.
    ///
    /// `name` may be `latest`. The name must be registered so the store never
    /// records a state the runner cannot position itself on.
    pub fn force_state(&self, db: &mut Database, name: &str) -> MigrationResult<String> {
        let index = self
            .registry
            .resolve(name)?
            .ok_or_else(|| MigrationError::NotFound {
                name: name.to_string(),
            })?;
        let resolved = self.registry.units()[index].name().to_string();
        let names = self.registry.names();

        db.with_transaction("forcing migration state", |session| {
            set_current_migration_state(session, Some(resolved.as_str()), &names)
        })?;
        log::warn!("Migration state forced to {}", resolved);
        Ok(resolved)
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::Migration;
    use ims_core::schema::{collections, Session};
    use serde_json::{json, Value};

    /// Records its own name in the `journal` collection.
    #[derive(Debug)]
    struct Journal(&'static str);

    impl Migration for Journal {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "journals itself"
        }

        fn forward(&self, session: &Session<'_>) -> ims_core::Result<()> {
            let Value::Object(doc) = json!({"_id": self.0}) else {
                unreachable!()
            };
            session.insert_one("journal", doc)?;
            Ok(())
        }

        fn backward(&self, session: &Session<'_>) -> ims_core::Result<()> {
            session.delete_many("journal", &ims_core::schema::Filter::by_id(self.0))?;
            Ok(())
        }
    }

    fn migrator() -> Migrator {
        Migrator::new(
            Registry::new(vec![
                Box::new(Journal("2024-01-01_a")),
                Box::new(Journal("2024-02-01_b")),
                Box::new(Journal("2024-03-01_c")),
            ])
            .unwrap(),
        )
    }

    fn current(db: &mut Database) -> Option<String> {
        Migrator::read_state(db).unwrap().current_migration_name
    }

    #[test]
    fn test_forward_to_named_target() {
        let mut db = Database::open_in_memory().unwrap();
        let migrator = migrator();

        let state = migrator.forward(&mut db, "2024-02-01_b").unwrap();

        assert_eq!(state.as_deref(), Some("2024-02-01_b"));
        assert_eq!(current(&mut db).as_deref(), Some("2024-02-01_b"));
        let session = db.read_transaction("check").unwrap();
        assert_eq!(
            session
                .count("journal", &ims_core::schema::Filter::all())
                .unwrap(),
            2
        );
    }

    #[test]
    fn test_backward_to_first_uninitializes() {
        let mut db = Database::open_in_memory().unwrap();
        let migrator = migrator();
        migrator.forward(&mut db, "2024-02-01_b").unwrap();

        let plan = migrator.plan_backward(&mut db, "2024-01-01_a").unwrap();
        let names: Vec<&str> = plan.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["2024-02-01_b", "2024-01-01_a"]);
        assert_eq!(plan.steps[0].state_after.as_deref(), Some("2024-01-01_a"));
        assert_eq!(plan.end_state(), None);

        let state = migrator.execute(&mut db, &plan).unwrap();
        assert!(state.is_none());
        assert!(current(&mut db).is_none());
    }

    #[test]
    fn test_backward_to_current_undoes_it() {
        let mut db = Database::open_in_memory().unwrap();
        let migrator = migrator();
        migrator.forward(&mut db, "latest").unwrap();

        let state = migrator.backward(&mut db, "2024-03-01_c").unwrap();
        assert_eq!(state.as_deref(), Some("2024-02-01_b"));
    }

    #[test]
    fn test_forward_at_or_before_current_is_no_op() {
        let mut db = Database::open_in_memory().unwrap();
        let migrator = migrator();
        migrator.forward(&mut db, "2024-02-01_b").unwrap();

        for target in ["2024-01-01_a", "2024-02-01_b"] {
            let err = migrator.forward(&mut db, target).unwrap_err();
            assert!(err.is_no_op(), "{:?}", err);
        }
        assert_eq!(current(&mut db).as_deref(), Some("2024-02-01_b"));
    }

    #[test]
    fn test_backward_ahead_or_uninitialized_is_no_op() {
        let mut db = Database::open_in_memory().unwrap();
        let migrator = migrator();

        assert!(migrator
            .backward(&mut db, "2024-01-01_a")
            .unwrap_err()
            .is_no_op());

        migrator.forward(&mut db, "2024-01-01_a").unwrap();
        assert!(migrator
            .backward(&mut db, "2024-02-01_b")
            .unwrap_err()
            .is_no_op());
    }

    #[test]
    fn test_unknown_target_is_not_found() {
        let mut db = Database::open_in_memory().unwrap();
        let err = migrator().forward(&mut db, "2099-01-01_z").unwrap_err();
        assert!(matches!(err, MigrationError::NotFound { name } if name == "2099-01-01_z"));
    }

    #[test]
    fn test_empty_registry_latest_is_no_op() {
        let mut db = Database::open_in_memory().unwrap();
        let migrator = Migrator::new(Registry::new(Vec::new()).unwrap());
        assert!(migrator.forward(&mut db, "latest").unwrap_err().is_no_op());
    }

    #[test]
    fn test_stale_plan_is_refused() {
        let mut db = Database::open_in_memory().unwrap();
        let migrator = migrator();
        let plan = migrator.plan_forward(&mut db, "2024-01-01_a").unwrap();
        migrator.forward(&mut db, "2024-01-01_a").unwrap();

        let err = migrator.execute(&mut db, &plan).unwrap_err();
        assert!(matches!(err, MigrationError::Configuration(_)));
    }

    #[test]
    fn test_unknown_recorded_state_blocks_runs_but_not_status() {
        let mut db = Database::open_in_memory().unwrap();
        db.with_transaction("corrupting", |session| {
            set_current_migration_state(session, Some("2023-12-01_gone"), &[])
        })
        .unwrap();
        let migrator = migrator();

        assert!(matches!(
            migrator.forward(&mut db, "latest"),
            Err(MigrationError::Configuration(_))
        ));
        assert!(matches!(
            migrator.backward(&mut db, "2024-01-01_a"),
            Err(MigrationError::Configuration(_))
        ));

        let status = migrator.status(&mut db).unwrap();
        assert!(!status.current_known);
        assert!(status.entries.iter().all(|e| !e.applied));
    }

    #[test]
    fn test_status_reports_pending_and_drift() {
        let mut db = Database::open_in_memory().unwrap();
        db.with_transaction("recording", |session| {
            set_current_migration_state(
                session,
                Some("2024-01-01_a"),
                &["2024-01-01_a".to_string(), "2023-06-01_old".to_string()],
            )
        })
        .unwrap();

        let status = migrator().status(&mut db).unwrap();

        assert!(status.current_known);
        assert_eq!(status.pending, vec!["2024-02-01_b", "2024-03-01_c"]);
        assert_eq!(status.revertible, vec!["2024-01-01_a"]);
        assert_eq!(status.added_since_last_run, vec!["2024-02-01_b", "2024-03-01_c"]);
        assert_eq!(status.missing_from_registry, vec!["2023-06-01_old"]);
        assert!(status.has_drift());
    }

    #[test]
    fn test_status_does_not_create_record() {
        let mut db = Database::open_in_memory().unwrap();
        let status = migrator().status(&mut db).unwrap();
        assert!(status.current.is_none());
        assert!(!status.has_drift());

        let session = db.read_transaction("check").unwrap();
        assert_eq!(
            session
                .count(
                    collections::DATABASE_MIGRATIONS,
                    &ims_core::schema::Filter::all()
                )
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_force_state() {
        let mut db = Database::open_in_memory().unwrap();
        let migrator = migrator();

        assert_eq!(
            migrator.force_state(&mut db, "latest").unwrap(),
            "2024-03-01_c"
        );
        assert_eq!(current(&mut db).as_deref(), Some("2024-03-01_c"));

        assert!(matches!(
            migrator.force_state(&mut db, "nope"),
            Err(MigrationError::NotFound { .. })
        ));
        assert_eq!(current(&mut db).as_deref(), Some("2024-03-01_c"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("applying x"), "Applying x");
        assert_eq!(capitalize(""), "");
    }
}
