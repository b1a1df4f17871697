use sqlx::FromRow;

/// Persisted import progress of one tracked object on one chain.
///
/// `state_json` is opaque to the store; the engine owns its format.
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct ImportStateRow {
    pub chain: String,
    pub object_key: String,
    pub state_json: String,
    /// Unix milliseconds.
    pub last_import_date: i64,
}
