use alloy::primitives::BlockNumber;
use chrono::Utc;
use eyre::{Result, eyre};
use store::import_state::store::Store as ImportStateStore;

use crate::range::Range;
use crate::state::import::ImportState;

/// Loads and saves the import state of every object tracked on one chain.
#[derive(Clone)]
pub struct Checkpointer {
    store: ImportStateStore,
    chain: String,
}

impl Checkpointer {
    pub fn new(store: ImportStateStore, chain: impl Into<String>) -> Self {
        Self { store, chain: chain.into() }
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub async fn load(&self, object_key: &str) -> Result<Option<ImportState<BlockNumber>>> {
        match self.store.get_import_state(&self.chain, object_key).await {
            Ok(Some(row)) => Ok(Some(ImportState::from_row(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::error!("Checkpointer failed on [get_import_state]: {e:?}");
                Err(eyre!(e))
            }
        }
    }

    /// First sight of an object starts with nothing covered over `full_range`.
    pub async fn load_or_create(
        &self,
        object_key: &str,
        full_range: Range<BlockNumber>,
    ) -> Result<ImportState<BlockNumber>> {
        match self.load(object_key).await? {
            Some(state) => Ok(state),
            None => {
                tracing::info!("New object {object_key} on {}, tracking {full_range}", self.chain);
                Ok(ImportState::new(full_range))
            }
        }
    }

    /// Stamps the state with the current time, then persists it.
    pub async fn save(&self, object_key: &str, state: &mut ImportState<BlockNumber>) -> Result<()> {
        state.touch(Utc::now());
        let row = state.to_row(&self.chain, object_key)?;
        match self.store.upsert_import_state(&row).await {
            Ok(_) => {
                tracing::debug!("Import state saved for {object_key} on {}", self.chain);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Checkpointer failed on [upsert_import_state]: {e:?}");
                Err(eyre!(e))
            }
        }
    }

    /// Every saved state of the chain, least recently imported first.
    pub async fn load_all(&self) -> Result<Vec<(String, ImportState<BlockNumber>)>> {
        let rows = self.store.get_import_states(&self.chain).await.map_err(|e| {
            tracing::error!("Checkpointer failed on [get_import_states]: {e:?}");
            eyre!(e)
        })?;

        rows.iter()
            .map(|row| Ok((row.object_key.clone(), ImportState::from_row(row)?)))
            .collect()
    }
}
