//! Equality filters and field updates over top-level document fields.

use serde_json::Value;

use crate::error::{Error, Result};

use super::Document;

/// Matches documents whose top-level fields equal the given values.
///
/// A field missing from a document compares equal to `null`, so
/// `Filter::all().eq("parent_id", Value::Null)` selects root systems whether
/// or not they store the field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// A filter that matches every document.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::all().eq("_id", id.into())
    }

    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| doc.get(field).unwrap_or(&Value::Null) == value)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum UpdateOp {
    Set(String, Value),
    Unset(String),
    Rename { from: String, to: String },
}

/// An ordered list of field updates applied to each matching document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set(field.into(), value.into()));
        self
    }

    #[must_use]
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset(field.into()));
        self
    }

    #[must_use]
    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Rename {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Apply every operation to `doc`, returning whether anything changed.
    ///
    /// `_id` is immutable; an update touching it is rejected before any
    /// operation runs.
    pub fn apply(&self, doc: &mut Document) -> Result<bool> {
        for op in &self.ops {
            let touches_id = match op {
                UpdateOp::Set(field, _) | UpdateOp::Unset(field) => field == "_id",
                UpdateOp::Rename { from, to } => from == "_id" || to == "_id",
            };
            if touches_id {
                return Err(Error::InvalidData(
                    "updates may not modify the _id field".to_string(),
                ));
            }
        }

        let mut changed = false;
        for op in &self.ops {
            match op {
                UpdateOp::Set(field, value) => {
                    if doc.get(field) != Some(value) {
                        doc.insert(field.clone(), value.clone());
                        changed = true;
                    }
                }
                UpdateOp::Unset(field) => {
                    changed |= doc.remove(field).is_some();
                }
                UpdateOp::Rename { from, to } => {
                    if let Some(value) = doc.remove(from) {
                        doc.insert(to.clone(), value);
                        changed = true;
                    }
                }
            }
        }
        Ok(changed)
    }
}
