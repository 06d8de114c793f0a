use ims_core::schema::{collections, Filter, Session, Update};
use serde_json::Value;

use crate::migration::Migration;

const FIELD: &str = "number_of_spares";

/// Adds the computed `number_of_spares` field to catalogue items. It starts
/// out null until spares are next recalculated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberOfSpares;

impl Migration for NumberOfSpares {
    fn name(&self) -> &str {
        "20241125102300_number_of_spares"
    }

    fn description(&self) -> &str {
        "Adds number_of_spares to catalogue items"
    }

    fn forward(&self, session: &Session<'_>) -> ims_core::Result<()> {
        log::info!("number_of_spares forward migration");
        session.update_many(
            collections::CATALOGUE_ITEMS,
            &Filter::all().eq(FIELD, Value::Null),
            &Update::new().set(FIELD, Value::Null),
        )?;
        Ok(())
    }

    fn backward(&self, session: &Session<'_>) -> ims_core::Result<()> {
        log::info!("number_of_spares backward migration");
        session.update_many(
            collections::CATALOGUE_ITEMS,
            &Filter::all(),
            &Update::new().unset(FIELD),
        )?;
        Ok(())
    }
}
