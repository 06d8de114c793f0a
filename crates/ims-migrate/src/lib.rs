//! Forward and backward document migrations.
//!
//! Migration units are compiled into a [`Registry`] in name order. The
//! [`Migrator`] plans which units a request needs and runs each in its own
//! transaction together with the recorded migration state.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod migration;
pub mod registry;
pub mod runner;
pub mod scaffold;
pub mod scripts;

pub use config::Config;
pub use error::{Direction, MigrationError, MigrationResult};
pub use migration::Migration;
pub use registry::{Registry, LATEST};
pub use runner::{MigrationPlan, MigrationStatus, Migrator, PlannedStep, StatusEntry};
