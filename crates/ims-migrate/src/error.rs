//! Migration error types.

use std::fmt;
use thiserror::Error;

/// Which way a migration unit is being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        })
    }
}

/// Errors from planning or running migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The registry, the recorded state or the store cannot be used as-is.
    /// No retry fixes this.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The requested migration is not in the registry.
    #[error("migration {name} not found")]
    NotFound { name: String },

    /// The target is already reached; nothing was run.
    #[error("{}", no_op_message(.target, .current, .direction))]
    NoOp {
        target: String,
        current: Option<String>,
        direction: Direction,
    },

    /// A unit failed and the batch stopped. `state` is the migration state
    /// left in the store.
    #[error("migration {name} failed going {direction} (state left at {}): {source}", state_label(.state))]
    UnitFailed {
        name: String,
        direction: Direction,
        state: Option<String>,
        source: ims_core::Error,
    },

    /// A store error outside any migration unit.
    #[error("store error: {0}")]
    Store(#[from] ims_core::Error),
}

impl MigrationError {
    /// Returns `true` when the request was valid but there was nothing to do.
    pub fn is_no_op(&self) -> bool {
        matches!(self, Self::NoOp { .. })
    }

    /// Returns `true` for errors that should stop the operator's run.
    pub fn is_fatal(&self) -> bool {
        !self.is_no_op()
    }
}

/// Human label for a migration state; `None` means nothing is applied.
pub fn state_label(state: &Option<String>) -> &str {
    state.as_deref().unwrap_or("<none>")
}

fn no_op_message(target: &str, current: &Option<String>, direction: &Direction) -> String {
    match (direction, current) {
        (Direction::Backward, None) => {
            format!("nothing to revert to {}: no migrations are applied", target)
        }
        (Direction::Forward, _) => format!(
            "nothing to apply: {} is at or before the current migration ({})",
            target,
            state_label(current)
        ),
        (Direction::Backward, Some(current)) => format!(
            "nothing to revert: {} is after the current migration ({})",
            target, current
        ),
    }
}

/// Convenience alias for migration results.
pub type MigrationResult<T> = std::result::Result<T, MigrationError>;
