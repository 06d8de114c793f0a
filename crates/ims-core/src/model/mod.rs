pub mod ids;
pub mod rule;
pub mod system_type;
pub mod usage_status;

pub use ids::{ItemId, RuleId, SystemId, SystemTypeId, UsageStatusId};
pub use rule::Rule;
pub use system_type::SystemType;
pub use usage_status::{generate_code, UsageStatus};
