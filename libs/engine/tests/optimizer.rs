mod common;

#[cfg(test)]
mod tests {
    use crate::common::{range, state};
    use engine::optimizer::index::build_range_index;
    use engine::optimizer::plan::optimize;
    use engine::optimizer::types::{
        AddressBatchQuery, ObjectPostFilter, ObjectQuery, OptimizerInput, OptimizerOptions,
        OptimizerOutput, PostFilter, TieBreak,
    };
    use engine::state::import::ImportState;

    fn options(max_addresses: usize, max_range_size: u64, max_queries: usize) -> OptimizerOptions {
        OptimizerOptions {
            ignore_import_state: false,
            max_addresses_per_query: max_addresses,
            max_range_size,
            max_queries_per_product: max_queries,
            tie_break: TieBreak::Deterministic,
        }
    }

    fn input(key: &str, state: ImportState<u64>) -> OptimizerInput<String, u64> {
        OptimizerInput { key: key.to_string(), state }
    }

    fn query(key: &str, from: u64, to: u64) -> ObjectQuery<String, u64> {
        ObjectQuery { key: key.to_string(), range: range(from, to) }
    }

    fn three_objects() -> Vec<OptimizerInput<String, u64>> {
        vec![
            input("a", state((200, 500), &[], &[])),
            input("b", state((300, 700), &[], &[])),
            input("c", state((480, 630), &[], &[])),
        ]
    }

    #[test]
    fn test_build_range_index_merges_close_blobs() {
        let index = build_range_index(
            &[vec![range(200, 500), range(300, 700)], vec![range(480, 630), range(1333, 1350)]],
            100,
            1000,
        )
        .unwrap();
        assert_eq!(index, vec![range(200, 700), range(1333, 1350)]);

        // a gap under the threshold joins the blobs
        let joined = build_range_index(&[vec![range(1, 10)], vec![range(60, 70)]], 100, 1000).unwrap();
        assert_eq!(joined, vec![range(1, 70)]);

        let sliced = build_range_index(&[vec![range(1, 25)]], 0, 10).unwrap();
        assert_eq!(sliced, vec![range(1, 5), range(6, 15), range(16, 25)]);
    }

    #[test]
    fn test_address_batch_with_generous_budgets() {
        let outputs = optimize(&three_objects(), &options(1000, 1000, 10));

        let expected = OptimizerOutput::AddressBatch {
            queries: vec![AddressBatchQuery {
                keys: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                range: range(200, 700),
                post_filters: vec![
                    ObjectPostFilter {
                        key: "a".to_string(),
                        filter: PostFilter::Ranges(vec![range(200, 500)]),
                    },
                    ObjectPostFilter {
                        key: "b".to_string(),
                        filter: PostFilter::Ranges(vec![range(300, 700)]),
                    },
                    ObjectPostFilter {
                        key: "c".to_string(),
                        filter: PostFilter::Ranges(vec![range(480, 630)]),
                    },
                ],
            }],
        };
        assert_eq!(outputs, vec![expected]);
    }

    #[test]
    fn test_single_address_budget_yields_most_recent_object_first() {
        let outputs = optimize(&three_objects(), &options(1, 1000, 10));
        assert_eq!(
            outputs,
            vec![OptimizerOutput::JsonRpcBatch {
                queries: vec![query("b", 300, 700), query("c", 480, 630), query("a", 200, 500)],
            }]
        );
    }

    #[test]
    fn test_fresh_ranges_come_before_retries() {
        let inputs = vec![input("a", state((1, 1000), &[(900, 1000)], &[(901, 909)]))];
        let outputs = optimize(&inputs, &options(1000, 500, 3));
        assert_eq!(
            outputs,
            vec![OptimizerOutput::JsonRpcBatch {
                queries: vec![query("a", 400, 899), query("a", 1, 399), query("a", 901, 909)],
            }]
        );
    }

    #[test]
    fn test_oldest_slices_are_deferred() {
        let inputs = vec![input("a", state((1, 3000), &[], &[]))];
        let outputs = optimize(&inputs, &options(10, 1000, 2));
        assert_eq!(
            outputs,
            vec![OptimizerOutput::JsonRpcBatch {
                queries: vec![query("a", 2001, 3000), query("a", 1001, 2000)],
            }]
        );
    }

    #[test]
    fn test_identical_needs_need_no_post_filter() {
        let inputs = vec![input("b", state((100, 200), &[], &[])), input("a", state((100, 200), &[], &[]))];
        let outputs = optimize(&inputs, &options(10, 1000, 10));
        assert_eq!(
            outputs,
            vec![OptimizerOutput::AddressBatch {
                queries: vec![AddressBatchQuery {
                    keys: vec!["a".to_string(), "b".to_string()],
                    range: range(100, 200),
                    post_filters: vec![
                        ObjectPostFilter { key: "a".to_string(), filter: PostFilter::NoFilter },
                        ObjectPostFilter { key: "b".to_string(), filter: PostFilter::NoFilter },
                    ],
                }],
            }]
        );
    }

    #[test]
    fn test_ignore_import_state_plans_the_full_range() {
        let inputs = vec![input("a", state((1, 100), &[(1, 100)], &[(10, 20)]))];
        // only the retry is planned
        assert_eq!(
            optimize(&inputs, &options(10, 1000, 10)),
            vec![OptimizerOutput::JsonRpcBatch { queries: vec![query("a", 10, 20)] }]
        );

        // the retry still gets its own query after the full re-import
        let mut opts = options(10, 1000, 10);
        opts.ignore_import_state = true;
        assert_eq!(
            optimize(&inputs, &opts),
            vec![OptimizerOutput::JsonRpcBatch {
                queries: vec![query("a", 1, 100), query("a", 10, 20)]
            }]
        );
    }

    #[test]
    fn test_duplicate_keys_reject_everything() {
        let inputs = vec![
            input("a", state((1, 100), &[], &[])),
            input("b", state((1, 100), &[], &[])),
            input("a", state((200, 300), &[], &[])),
        ];
        assert!(optimize(&inputs, &options(10, 1000, 10)).is_empty());
    }

    #[test]
    fn test_invalid_object_is_skipped() {
        let inputs = vec![
            input("a", state((1, 100), &[(50, 40)], &[])),
            input("b", state((1, 100), &[], &[])),
        ];
        assert_eq!(
            optimize(&inputs, &options(10, 1000, 10)),
            vec![OptimizerOutput::JsonRpcBatch { queries: vec![query("b", 1, 100)] }]
        );
    }

    #[test]
    fn test_empty_budgets_and_complete_states_plan_nothing() {
        let inputs = vec![input("a", state((1, 100), &[], &[]))];
        assert!(optimize(&inputs, &options(0, 1000, 10)).is_empty());
        assert!(optimize(&inputs, &options(10, 0, 10)).is_empty());
        assert!(optimize(&inputs, &options(10, 1000, 0)).is_empty());

        let done = vec![input("a", state((1, 100), &[(1, 100)], &[]))];
        assert!(optimize(&done, &options(10, 1000, 10)).is_empty());
        assert!(optimize::<String, u64>(&[], &options(10, 1000, 10)).is_empty());
    }

    #[test]
    fn test_address_batches_are_chunked_by_coverage() {
        let inputs = vec![
            input("a", state((1, 100), &[], &[])),
            input("b", state((1, 100), &[(1, 50)], &[])),
            input("c", state((1, 100), &[(1, 90)], &[])),
        ];
        let outputs = optimize(&inputs, &options(2, 1000, 10));
        assert_eq!(outputs.len(), 1);
        let OptimizerOutput::AddressBatch { queries } = &outputs[0] else {
            panic!("expected an address batch, got {outputs:?}");
        };
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(queries[0].range, range(1, 100));
        assert_eq!(queries[1].keys, vec!["c".to_string()]);
        assert_eq!(queries[1].range, range(91, 100));
        assert_eq!(queries[1].post_filters[0].filter, PostFilter::NoFilter);
    }
}
