//! Migration units compiled into the runner.
//!
//! New units are added with `ims migrate create <name> <description>`,
//! which writes the module and appends it to [`all`].

use crate::migration::Migration;

mod m20241016101400_expected_lifetime;
mod m20241125102300_number_of_spares;
mod m20250703083422_system_types;

pub use m20241016101400_expected_lifetime::ExpectedLifetime;
pub use m20241125102300_number_of_spares::NumberOfSpares;
pub use m20250703083422_system_types::SystemTypes;

/// Every registered migration, oldest first.
pub fn all() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(m20241016101400_expected_lifetime::ExpectedLifetime),
        Box::new(m20241125102300_number_of_spares::NumberOfSpares),
        Box::new(m20250703083422_system_types::SystemTypes),
    ]
}
