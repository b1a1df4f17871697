use crate::range::Range;
use crate::state::import::ImportState;

/// How ties between equally good objects are broken when forming address
/// batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Spreads load across objects between runs.
    #[default]
    Random,
    /// Object key order, for reproducible plans.
    Deterministic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerOptions {
    /// Plan the full range again, ignoring coverage and retries.
    pub ignore_import_state: bool,
    pub max_addresses_per_query: usize,
    pub max_range_size: u64,
    pub max_queries_per_product: usize,
    pub tie_break: TieBreak,
}

#[derive(Debug, Clone)]
pub struct OptimizerInput<K, T> {
    pub key: K,
    pub state: ImportState<T>,
}

/// One RPC call for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectQuery<K, T> {
    pub key: K,
    pub range: Range<T>,
}

/// Which part of a shared address batch range an object actually needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter<T> {
    /// The object needs the whole query range.
    NoFilter,
    Ranges(Vec<Range<T>>),
}

impl<T: Copy> PostFilter<T> {
    /// Ranges served to the object by a query over `query_range`.
    pub fn served(&self, query_range: &Range<T>) -> Vec<Range<T>> {
        match self {
            PostFilter::NoFilter => vec![*query_range],
            PostFilter::Ranges(ranges) => ranges.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPostFilter<K, T> {
    pub key: K,
    pub filter: PostFilter<T>,
}

/// One RPC call covering several objects over a shared range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBatchQuery<K, T> {
    pub keys: Vec<K>,
    pub range: Range<T>,
    pub post_filters: Vec<ObjectPostFilter<K, T>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizerOutput<K, T> {
    JsonRpcBatch { queries: Vec<ObjectQuery<K, T>> },
    AddressBatch { queries: Vec<AddressBatchQuery<K, T>> },
}

impl<K, T> OptimizerOutput<K, T> {
    pub fn query_count(&self) -> usize {
        match self {
            OptimizerOutput::JsonRpcBatch { queries } => queries.len(),
            OptimizerOutput::AddressBatch { queries } => queries.len(),
        }
    }
}
