use ims_core::schema::{Database, Session};
use std::fmt;

/// A named, ordered pair of forward and backward database changes.
///
/// `forward` and `backward` run inside the runner's transaction together
/// with the state update, so a failure leaves nothing behind. Both should be
/// safe to run again on data they have already changed.
pub trait Migration: Send + Sync + fmt::Debug {
    /// Unique name; registry order is the byte order of these names.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn forward(&self, session: &Session<'_>) -> ims_core::Result<()>;

    fn backward(&self, session: &Session<'_>) -> ims_core::Result<()>;

    /// Runs after the forward transaction commits, for work that cannot be
    /// part of it.
    fn forward_after_transaction(&self, _db: &mut Database) -> ims_core::Result<()> {
        Ok(())
    }

    /// Runs after the backward transaction commits.
    fn backward_after_transaction(&self, _db: &mut Database) -> ims_core::Result<()> {
        Ok(())
    }
}
