//! Bootstrap seeding of the `rules` collection from a TOML file.
//!
//! Rules are written by system type and usage status *value* rather than id:
//!
//! ```toml
//! [[rules]]
//! source = "Storage"
//! destination = "Operational"
//! usage_status = "In Use"
//! ```
//!
//! Seeding resolves the values against the store, creates any usage status
//! that does not exist yet, validates the resulting table and writes it in
//! the caller's session.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{generate_code, Rule, SystemType, SystemTypeId, UsageStatus, UsageStatusId};
use crate::schema::{collections, from_document, to_document, Filter, Session};

use super::store::{insert_rule, load_rules};
use super::table::RuleTable;

/// The rule table every new environment starts with.
pub const DEFAULT_RULES: &str = include_str!("../../config/rules.toml");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSeedFile {
    #[serde(default)]
    pub rules: Vec<RuleSeed>,
}

/// One rule, named by values instead of ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSeed {
    /// System type the item leaves; absent for newly created items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// System type the item enters; absent when it leaves every system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Resulting usage status; absent clears the status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_status: Option<String>,
}

impl RuleSeedFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            Error::InvalidData(format!(
                "failed to parse rules from {}: {}",
                path.display(),
                e
            ))
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn default_rules() -> Result<Self> {
        Self::parse(DEFAULT_RULES)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidData(format!("failed to write rules as TOML: {}", e)))
    }
}

/// Reference data resolved once per seeding run.
struct References {
    system_types: Vec<SystemType>,
    usage_statuses: Vec<UsageStatus>,
}

impl References {
    fn load(session: &Session<'_>) -> Result<Self> {
        Ok(Self {
            system_types: load_all(session, collections::SYSTEM_TYPES)?,
            usage_statuses: load_all(session, collections::USAGE_STATUSES)?,
        })
    }

    fn system_type(&self, value: Option<&str>) -> Result<Option<SystemTypeId>> {
        let Some(value) = value else {
            return Ok(None);
        };
        self.system_types
            .iter()
            .find(|t| t.value.trim().eq_ignore_ascii_case(value.trim()))
            .map(|t| Some(t.id))
            .ok_or_else(|| Error::not_found(SystemTypeId::ENTITY, value))
    }

    fn usage_status(
        &mut self,
        session: &Session<'_>,
        value: Option<&str>,
    ) -> Result<Option<UsageStatusId>> {
        let Some(value) = value else {
            return Ok(None);
        };
        let code = generate_code(value);
        if let Some(existing) = self.usage_statuses.iter().find(|s| s.code == code) {
            return Ok(Some(existing.id));
        }

        let status = UsageStatus::new(value.trim());
        session.insert_one(collections::USAGE_STATUSES, to_document(&status)?)?;
        log::info!("Created usage status {} ({})", status.value, status.code);
        let id = status.id;
        self.usage_statuses.push(status);
        Ok(Some(id))
    }
}

fn load_all<T: serde::de::DeserializeOwned>(
    session: &Session<'_>,
    collection: &str,
) -> Result<Vec<T>> {
    session
        .find(collection, &Filter::all())?
        .into_iter()
        .map(from_document)
        .collect()
}

/// Write the rules of `seed` into the store.
///
/// Refuses to touch a non-empty `rules` collection unless `replace` is set,
/// in which case the existing rules are removed first. Nothing is written
/// when a system type is unknown or the table has duplicate transitions.
pub fn seed_rules(session: &Session<'_>, seed: &RuleSeedFile, replace: bool) -> Result<RuleTable> {
    let existing = session.count(collections::RULES, &Filter::all())?;
    if existing > 0 && !replace {
        return Err(Error::Configuration(format!(
            "rules collection already holds {} rule(s); seed with replace to overwrite them",
            existing
        )));
    }

    let mut refs = References::load(session)?;

    // Resolve system types up front so an unknown one fails before any
    // usage status is created.
    let transitions = seed
        .rules
        .iter()
        .map(|rule| {
            Ok((
                refs.system_type(rule.source.as_deref())?,
                refs.system_type(rule.destination.as_deref())?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut rules = Vec::with_capacity(seed.rules.len());
    for (rule, (source, destination)) in seed.rules.iter().zip(transitions) {
        let status = refs.usage_status(session, rule.usage_status.as_deref())?;
        rules.push(Rule::new(source, destination, status));
    }

    let table = RuleTable::from_rules(rules)?;

    if existing > 0 {
        log::warn!("Replacing {} existing rule(s)", existing);
        session.drop_collection(collections::RULES)?;
    }
    for rule in table.rules() {
        insert_rule(session, rule)?;
    }

    log::info!("Seeded {} usage status rule(s)", table.len());
    Ok(table)
}

/// Read the stored rules back in seed form, naming types and statuses by
/// value. Ids with no matching reference document are shown as-is.
pub fn export_rules(session: &Session<'_>) -> Result<RuleSeedFile> {
    let refs = References::load(session)?;
    let type_names: HashMap<SystemTypeId, &str> = refs
        .system_types
        .iter()
        .map(|t| (t.id, t.value.as_str()))
        .collect();
    let status_names: HashMap<UsageStatusId, &str> = refs
        .usage_statuses
        .iter()
        .map(|s| (s.id, s.value.as_str()))
        .collect();

    let type_name = |id: Option<SystemTypeId>| {
        id.map(|id| {
            type_names
                .get(&id)
                .map_or_else(|| id.to_string(), |name| (*name).to_string())
        })
    };

    let rules = load_rules(session)?
        .into_iter()
        .map(|rule| RuleSeed {
            source: type_name(rule.source_system_type_id),
            destination: type_name(rule.destination_system_type_id),
            usage_status: rule.destination_usage_status_id.map(|id| {
                status_names
                    .get(&id)
                    .map_or_else(|| id.to_string(), |name| (*name).to_string())
            }),
        })
        .collect();

    Ok(RuleSeedFile { rules })
}
