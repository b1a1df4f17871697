use crate::client::Client;
use crate::import_state::model::ImportStateRow;
use eyre::Result;
use sqlx::Error;

#[derive(Clone)]
pub struct Store {
    client: Client,
}

impl Store {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    // ---------------------------
    // IMPORT STATES
    // ---------------------------

    /// Last write wins.
    pub async fn upsert_import_state(&self, row: &ImportStateRow) -> Result<(), Error> {
        let query = r#"
            INSERT INTO import_states (chain, object_key, state_json, last_import_date)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (chain, object_key) DO UPDATE SET
                state_json = excluded.state_json,
                last_import_date = excluded.last_import_date
            "#;
        sqlx::query(query)
            .bind(&row.chain)
            .bind(&row.object_key)
            .bind(&row.state_json)
            .bind(row.last_import_date)
            .execute(self.client.pool())
            .await?;
        Ok(())
    }

    pub async fn get_import_state(
        &self,
        chain: &str,
        object_key: &str,
    ) -> Result<Option<ImportStateRow>, Error> {
        let query = r#"
            SELECT chain, object_key, state_json, last_import_date
            FROM import_states
            WHERE chain = ? AND object_key = ?
            LIMIT 1
            "#;
        let row = sqlx::query_as(query)
            .bind(chain)
            .bind(object_key)
            .fetch_optional(self.client.pool())
            .await?;

        Ok(row)
    }

    /// Least recently imported first.
    pub async fn get_import_states(&self, chain: &str) -> Result<Vec<ImportStateRow>, Error> {
        let query = r#"
            SELECT chain, object_key, state_json, last_import_date
            FROM import_states
            WHERE chain = ?
            ORDER BY last_import_date ASC, object_key ASC
            "#;
        let rows = sqlx::query_as(query).bind(chain).fetch_all(self.client.pool()).await?;

        Ok(rows)
    }
}
