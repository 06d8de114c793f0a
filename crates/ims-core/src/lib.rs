//! Core of the inventory management system.
//!
//! This crate provides the transactional document store (a SQLite-backed
//! collection of JSON documents), the migration state record, the reference
//! models for system types and usage statuses, and the usage-status rule
//! engine used when items move between systems.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod movement;
pub mod rules;
pub mod schema;

pub use error::{Error, Result};
