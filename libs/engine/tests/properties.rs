#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use engine::optimizer::plan::optimize;
    use engine::optimizer::types::{OptimizerInput, OptimizerOptions, OptimizerOutput, TieBreak};
    use engine::range::{Range, ranges_len, ranges_merge};
    use engine::state::import::ImportState;
    use proptest::prelude::*;

    /// A range inside `[0, 2000]`.
    fn arb_range() -> impl Strategy<Value = Range<u64>> {
        (0u64..2000, 0u64..300).prop_map(|(from, len)| Range { from, to: (from + len).min(2000) })
    }

    /// A state whose covered and retry ranges lie within its full range.
    fn arb_state() -> impl Strategy<Value = ImportState<u64>> {
        (
            arb_range(),
            prop::collection::vec(arb_range(), 0..6),
            prop::collection::vec(arb_range(), 0..3),
        )
            .prop_map(|(full, covered, retry)| {
                let mut state = ImportState::new(full);
                for range in covered.iter().filter_map(|r| r.intersect(&full)) {
                    state.record_success(range).unwrap();
                }
                for range in retry.iter().filter_map(|r| r.intersect(&full)) {
                    state.record_failure(range).unwrap();
                }
                state
            })
    }

    fn arb_options() -> impl Strategy<Value = OptimizerOptions> {
        (1usize..5, 1u64..400).prop_map(|(max_addresses, max_range_size)| OptimizerOptions {
            ignore_import_state: false,
            max_addresses_per_query: max_addresses,
            max_range_size,
            max_queries_per_product: 100_000,
            tie_break: TieBreak::Deterministic,
        })
    }

    /// Ranges served to each object by a plan.
    fn served(outputs: &[OptimizerOutput<String, u64>]) -> HashMap<String, Vec<Range<u64>>> {
        let mut served: HashMap<String, Vec<Range<u64>>> = HashMap::new();
        for output in outputs {
            match output {
                OptimizerOutput::JsonRpcBatch { queries } => {
                    for query in queries {
                        served.entry(query.key.clone()).or_default().push(query.range);
                    }
                }
                OptimizerOutput::AddressBatch { queries } => {
                    for query in queries {
                        for post_filter in &query.post_filters {
                            served
                                .entry(post_filter.key.clone())
                                .or_default()
                                .extend(post_filter.filter.served(&query.range));
                        }
                    }
                }
            }
        }
        served
    }

    proptest! {
        #[test]
        fn prop_record_success_is_idempotent(state in arb_state(), range in arb_range()) {
            let mut once = state.clone();
            once.record_success(range).unwrap();
            let mut twice = once.clone();
            twice.record_success(range).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_no_block_is_lost(state in arb_state()) {
            let mut all = state.needed().unwrap();
            all.extend_from_slice(&state.covered_ranges);
            all.extend_from_slice(&state.to_retry);
            prop_assert_eq!(ranges_merge(&all).unwrap(), vec![state.full_range]);
        }

        #[test]
        fn prop_covered_ranges_stay_sorted_and_disjoint(
            full in arb_range(),
            successes in prop::collection::vec(arb_range(), 0..20),
        ) {
            let mut state = ImportState::new(full);
            for range in successes {
                state.record_success(range).unwrap();
                for pair in state.covered_ranges.windows(2) {
                    // adjacent ranges would have been merged
                    prop_assert!(pair[0].to + 1 < pair[1].from);
                }
            }
        }

        #[test]
        fn prop_plan_serves_exactly_the_needed_ranges(
            states in prop::collection::vec(arb_state(), 1..5),
            options in arb_options(),
        ) {
            let inputs: Vec<OptimizerInput<String, u64>> = states
                .into_iter()
                .enumerate()
                .map(|(i, state)| OptimizerInput { key: format!("object-{i}"), state })
                .collect();

            let served = served(&optimize(&inputs, &options));
            for input in &inputs {
                let needed = input.state.needed().unwrap();
                let mut wanted = needed.clone();
                wanted.extend_from_slice(&input.state.to_retry);

                let got = served.get(&input.key).cloned().unwrap_or_default();
                prop_assert_eq!(ranges_merge(&got).unwrap(), ranges_merge(&wanted).unwrap());
                // fresh and retry needs are disjoint, each block is served once
                let expected_len = ranges_len(&needed) + ranges_len(&input.state.to_retry);
                prop_assert_eq!(ranges_len(&got), expected_len);
            }
        }

        #[test]
        fn prop_capped_plan_stays_within_needs(
            states in prop::collection::vec(arb_state(), 1..5),
            mut options in arb_options(),
            max_queries in 1usize..4,
        ) {
            options.max_queries_per_product = max_queries;
            let inputs: Vec<OptimizerInput<String, u64>> = states
                .into_iter()
                .enumerate()
                .map(|(i, state)| OptimizerInput { key: format!("object-{i}"), state })
                .collect();

            let served = served(&optimize(&inputs, &options));
            for input in &inputs {
                let mut wanted = input.state.needed().unwrap();
                wanted.extend_from_slice(&input.state.to_retry);
                let wanted = ranges_merge(&wanted).unwrap();

                // a capped plan never serves a block nobody asked for
                for range in served.get(&input.key).into_iter().flatten() {
                    prop_assert!(wanted.iter().any(|w| w.covers(range)));
                }
            }
        }

        #[test]
        fn prop_single_address_budget_never_batches_addresses(
            states in prop::collection::vec(arb_state(), 1..5),
            mut options in arb_options(),
        ) {
            options.max_addresses_per_query = 1;
            let inputs: Vec<OptimizerInput<String, u64>> = states
                .into_iter()
                .enumerate()
                .map(|(i, state)| OptimizerInput { key: format!("object-{i}"), state })
                .collect();

            for output in optimize(&inputs, &options) {
                let is_json_rpc = matches!(output, OptimizerOutput::JsonRpcBatch { .. });
                prop_assert!(is_json_rpc);
            }
        }
    }
}
