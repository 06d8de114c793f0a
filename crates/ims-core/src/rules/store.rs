use crate::error::Result;
use crate::model::Rule;
use crate::schema::{collections, from_document, to_document, Filter, Session};

use super::table::RuleTable;

/// Every stored rule, in insertion order.
pub fn load_rules(session: &Session<'_>) -> Result<Vec<Rule>> {
    session
        .find(collections::RULES, &Filter::all())?
        .into_iter()
        .map(from_document)
        .collect()
}

/// Load the stored rules and validate them into a table.
pub fn load_rule_table(session: &Session<'_>) -> Result<RuleTable> {
    RuleTable::from_rules(load_rules(session)?)
}

pub fn insert_rule(session: &Session<'_>, rule: &Rule) -> Result<()> {
    session.insert_one(collections::RULES, to_document(rule)?)?;
    Ok(())
}
