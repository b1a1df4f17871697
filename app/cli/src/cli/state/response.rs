use alloy::primitives::BlockNumber;
use engine::range::{Range, ranges_len};
use engine::state::import::ImportState;
use serde::{Serialize, ser::SerializeStruct};

// Tuple wrapper for one object's import state
pub struct ImportStateResponse(pub String, pub ImportState<BlockNumber>);

impl Serialize for ImportStateResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let (key, s) = (&self.0, &self.1);
        let needed: Vec<Range<BlockNumber>> = s.needed().unwrap_or_default();
        let mut state = serializer.serialize_struct("ImportState", 8)?;
        state.serialize_field("object", key)?;
        state.serialize_field("full_range", &s.full_range)?;
        state.serialize_field("covered_ranges", &s.covered_ranges)?;
        state.serialize_field("to_retry", &s.to_retry)?;
        state.serialize_field("archive_retry", &s.archive_retry)?;
        state.serialize_field("needed_blocks", &ranges_len(&needed))?;
        state.serialize_field("complete", &s.is_complete().unwrap_or(false))?;
        state.serialize_field("last_import_date", &s.last_import_date)?;
        state.end()
    }
}
