use std::cmp::{Ordering, Reverse};

use rand::seq::SliceRandom;

use crate::optimizer::types::{
    AddressBatchQuery, ObjectPostFilter, ObjectQuery, OptimizerOptions, OptimizerOutput,
    PostFilter, TieBreak,
};
use crate::range::{Range, RangeValue, ranges_covering, ranges_len};

/// Needed ranges of one object, restricted to the slice being planned.
#[derive(Debug, Clone)]
pub struct SliceNeed<K, T> {
    pub key: K,
    pub ranges: Vec<Range<T>>,
}

/// Picks the cheapest way to serve every need in a slice.
///
/// Fewer queries wins, then more coverage served. When both are equal the
/// address batch is only used if it actually groups objects together.
pub fn choose_strategy<K, T>(
    needs: &[SliceNeed<K, T>],
    options: &OptimizerOptions,
) -> OptimizerOutput<K, T>
where
    K: Clone + Ord,
    T: RangeValue,
{
    let per_object = per_object_queries(needs, options);
    if options.max_addresses_per_query <= 1 {
        return OptimizerOutput::JsonRpcBatch { queries: per_object };
    }

    let batched = address_batch_queries(needs, options);

    let per_object_coverage = per_object.iter().map(|q| q.range.len()).sum::<u64>();
    let batched_coverage = needs.iter().map(|need| ranges_len(&need.ranges)).sum::<u64>();
    let groups_objects = batched.iter().any(|q| q.keys.len() > 1);

    let use_batch = match batched.len().cmp(&per_object.len()) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => match batched_coverage.cmp(&per_object_coverage) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => groups_objects,
        },
    };

    if use_batch {
        OptimizerOutput::AddressBatch { queries: batched }
    } else {
        OptimizerOutput::JsonRpcBatch { queries: per_object }
    }
}

/// One query per object sub-range, most recent first.
pub fn per_object_queries<K, T>(
    needs: &[SliceNeed<K, T>],
    options: &OptimizerOptions,
) -> Vec<ObjectQuery<K, T>>
where
    K: Clone + Ord,
    T: RangeValue,
{
    let mut queries = Vec::new();
    for need in needs {
        let mut chunks: Vec<Range<T>> =
            need.ranges.iter().flat_map(|r| r.split_from_end(options.max_range_size)).collect();
        chunks.sort_by_key(|chunk| Reverse(chunk.to));
        chunks.truncate(options.max_queries_per_product);

        queries.extend(chunks.into_iter().map(|range| ObjectQuery { key: need.key.clone(), range }));
    }

    queries.sort_by(|a, b| {
        b.range.to.cmp(&a.range.to).then(b.range.from.cmp(&a.range.from)).then(a.key.cmp(&b.key))
    });
    queries
}

/// Groups objects by most needed coverage and issues one query per group
/// over the envelope of the group's needs. With a deterministic tie-break the
/// objects of a group are listed by key.
pub fn address_batch_queries<K, T>(
    needs: &[SliceNeed<K, T>],
    options: &OptimizerOptions,
) -> Vec<AddressBatchQuery<K, T>>
where
    K: Clone + Ord,
    T: RangeValue,
{
    let mut ordered: Vec<&SliceNeed<K, T>> =
        needs.iter().filter(|need| !need.ranges.is_empty()).collect();
    match options.tie_break {
        TieBreak::Random => ordered.shuffle(&mut rand::thread_rng()),
        TieBreak::Deterministic => ordered.sort_by(|a, b| a.key.cmp(&b.key)),
    }
    // stable, so the order above breaks ties
    ordered.sort_by_key(|need| Reverse(ranges_len(&need.ranges)));

    ordered
        .chunks(options.max_addresses_per_query.max(1))
        .filter_map(|group| {
            let mut group = group.to_vec();
            if options.tie_break == TieBreak::Deterministic {
                group.sort_by(|a, b| a.key.cmp(&b.key));
            }

            let needed: Vec<Range<T>> =
                group.iter().flat_map(|need| need.ranges.iter().copied()).collect();
            let range = match ranges_covering(&needed) {
                Ok(range) => range?,
                Err(e) => {
                    tracing::error!("Skipping address group with invalid needs: {e}");
                    return None;
                }
            };

            let post_filters = group
                .iter()
                .map(|need| {
                    let filter = if need.ranges.len() == 1 && need.ranges[0] == range {
                        PostFilter::NoFilter
                    } else {
                        PostFilter::Ranges(need.ranges.clone())
                    };
                    ObjectPostFilter { key: need.key.clone(), filter }
                })
                .collect();

            Some(AddressBatchQuery {
                keys: group.iter().map(|need| need.key.clone()).collect(),
                range,
                post_filters,
            })
        })
        .collect()
}
