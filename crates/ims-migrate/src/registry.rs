use std::collections::HashSet;

use crate::error::{MigrationError, MigrationResult};
use crate::migration::Migration;
use crate::scripts;

/// Target name that resolves to the last registered migration.
pub const LATEST: &str = "latest";

/// The ordered catalogue of migration units.
#[derive(Debug)]
pub struct Registry {
    units: Vec<Box<dyn Migration>>,
}

impl Registry {
    /// Build a registry, checking that names are non-empty, not `latest`,
    /// unique and strictly ascending.
    pub fn new(units: Vec<Box<dyn Migration>>) -> MigrationResult<Self> {
        let mut seen = HashSet::with_capacity(units.len());
        for unit in &units {
            let name = unit.name();
            if name.trim().is_empty() {
                return Err(MigrationError::Configuration(
                    "migration with an empty name".to_string(),
                ));
            }
            if name == LATEST {
                return Err(MigrationError::Configuration(format!(
                    "'{}' is reserved and cannot name a migration",
                    LATEST
                )));
            }
            if !seen.insert(name) {
                return Err(MigrationError::Configuration(format!(
                    "migration {} is registered twice",
                    name
                )));
            }
        }

        for pair in units.windows(2) {
            if pair[0].name() >= pair[1].name() {
                return Err(MigrationError::Configuration(format!(
                    "migrations are out of order: {} is registered before {}",
                    pair[0].name(),
                    pair[1].name()
                )));
            }
        }

        Ok(Self { units })
    }

    /// The migrations compiled into this crate.
    pub fn builtin() -> MigrationResult<Self> {
        Self::new(scripts::all())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[Box<dyn Migration>] {
        &self.units
    }

    pub fn get(&self, index: usize) -> Option<&dyn Migration> {
        self.units.get(index).map(AsRef::as_ref)
    }

    pub fn names(&self) -> Vec<String> {
        self.units.iter().map(|u| u.name().to_string()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.units.iter().position(|u| u.name() == name)
    }

    /// Resolve a target name to a registry index. `latest` is the last unit,
    /// or `None` when the registry is empty.
    pub fn resolve(&self, target: &str) -> MigrationResult<Option<usize>> {
        if target == LATEST {
            return Ok(self.units.len().checked_sub(1));
        }
        self.index_of(target)
            .map(Some)
            .ok_or_else(|| MigrationError::NotFound {
                name: target.to_string(),
            })
    }
}
