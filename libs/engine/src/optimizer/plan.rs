use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use crate::optimizer::index::build_range_index;
use crate::optimizer::strategy::{SliceNeed, choose_strategy};
use crate::optimizer::types::{OptimizerInput, OptimizerOptions, OptimizerOutput};
use crate::range::{Range, RangeValue, ranges_intersect};

/// Turns per-object import states into an ordered list of RPC queries.
///
/// Ranges never covered are planned first (most recent first), then the
/// ranges that previously failed. Retries are planned even if a fresh query
/// happens to cover the same span again, `ignore_import_state` included: it
/// only replaces the fresh needs with the full range.
///
/// Duplicate keys reject the whole call. An object holding an invalid range
/// is skipped, its siblings are still planned.
pub fn optimize<K, T>(
    inputs: &[OptimizerInput<K, T>],
    options: &OptimizerOptions,
) -> Vec<OptimizerOutput<K, T>>
where
    K: Clone + Ord + Hash + Debug,
    T: RangeValue,
{
    if options.max_addresses_per_query == 0
        || options.max_range_size == 0
        || options.max_queries_per_product == 0
    {
        tracing::error!("Refusing to plan with empty budgets: {options:?}");
        return vec![];
    }

    let mut seen = HashSet::with_capacity(inputs.len());
    if let Some(duplicate) = inputs.iter().find(|input| !seen.insert(&input.key)) {
        tracing::error!("Duplicate object key {:?}, refusing to plan", duplicate.key);
        return vec![];
    }

    let mut fresh: Vec<SliceNeed<K, T>> = Vec::with_capacity(inputs.len());
    let mut retry: Vec<SliceNeed<K, T>> = Vec::new();
    for input in inputs {
        let needed = match input.state.validate().and_then(|_| input.state.needed()) {
            Ok(needed) => needed,
            Err(e) => {
                tracing::error!("Skipping {:?}: {e}", input.key);
                continue;
            }
        };

        let ranges = if options.ignore_import_state {
            vec![input.state.full_range]
        } else {
            needed.into_iter().rev().collect()
        };
        fresh.push(SliceNeed { key: input.key.clone(), ranges });
        if !input.state.to_retry.is_empty() {
            retry.push(SliceNeed {
                key: input.key.clone(),
                ranges: input.state.to_retry.iter().rev().copied().collect(),
            });
        }
    }

    let mut outputs = plan_phase(&fresh, options);
    outputs.extend(plan_phase(&retry, options));
    compact(outputs)
}

fn plan_phase<K, T>(
    needs: &[SliceNeed<K, T>],
    options: &OptimizerOptions,
) -> Vec<OptimizerOutput<K, T>>
where
    K: Clone + Ord + Debug,
    T: RangeValue,
{
    let needs: Vec<&SliceNeed<K, T>> = needs.iter().filter(|n| !n.ranges.is_empty()).collect();
    if needs.is_empty() {
        return vec![];
    }

    let ranges_per_object: Vec<Vec<Range<T>>> = needs.iter().map(|n| n.ranges.clone()).collect();
    let slices =
        match build_range_index(&ranges_per_object, options.max_range_size / 2, options.max_range_size)
        {
            Ok(slices) => slices,
            Err(e) => {
                tracing::error!("Could not index needed ranges: {e}");
                return vec![];
            }
        };

    let deferred = slices.len().saturating_sub(options.max_queries_per_product);
    if deferred > 0 {
        tracing::debug!("Deferring {deferred} oldest slices to a later pass");
    }

    let mut outputs = Vec::new();
    for slice in slices.iter().rev().take(options.max_queries_per_product) {
        let mut slice_needs = Vec::with_capacity(needs.len());
        for need in &needs {
            match ranges_intersect(&need.ranges, std::slice::from_ref(slice)) {
                Ok(ranges) if ranges.is_empty() => {}
                Ok(ranges) => slice_needs.push(SliceNeed { key: need.key.clone(), ranges }),
                Err(e) => tracing::error!("Skipping {:?} in slice {slice}: {e}", need.key),
            }
        }
        if !slice_needs.is_empty() {
            outputs.push(choose_strategy(&slice_needs, options));
        }
    }
    outputs
}

/// Concatenates consecutive JSON-RPC batches. Address batches stay alone.
fn compact<K, T>(outputs: Vec<OptimizerOutput<K, T>>) -> Vec<OptimizerOutput<K, T>> {
    let mut compacted: Vec<OptimizerOutput<K, T>> = Vec::with_capacity(outputs.len());
    for output in outputs {
        if output.query_count() == 0 {
            continue;
        }
        match output {
            OptimizerOutput::JsonRpcBatch { queries } => {
                if let Some(OptimizerOutput::JsonRpcBatch { queries: previous }) =
                    compacted.last_mut()
                {
                    previous.extend(queries);
                } else {
                    compacted.push(OptimizerOutput::JsonRpcBatch { queries });
                }
            }
            batch => compacted.push(batch),
        }
    }
    compacted
}
