use eyre::{Result, eyre};
use serde::Serialize;
use serde::de::DeserializeOwned;
use store::import_state::model::ImportStateRow;

use crate::range::RangeValue;
use crate::state::import::ImportState;

impl<T: RangeValue + Serialize + DeserializeOwned> ImportState<T> {
    pub fn to_row(&self, chain: &str, object_key: &str) -> Result<ImportStateRow> {
        Ok(ImportStateRow {
            chain: chain.to_string(),
            object_key: object_key.to_string(),
            state_json: serde_json::to_string(self)?,
            last_import_date: self.last_import_date.map(|d| d.timestamp_millis()).unwrap_or(0),
        })
    }

    /// Rejects rows holding invalid ranges instead of loading them.
    pub fn from_row(row: &ImportStateRow) -> Result<Self> {
        let state: ImportState<T> = serde_json::from_str(&row.state_json)?;
        state.validate().map_err(|e| {
            eyre!("Corrupted import state for {}/{}: {e}", row.chain, row.object_key)
        })?;
        Ok(state)
    }
}
