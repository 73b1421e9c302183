use a2a_analyzer::codec::{compress_int_array, count_elements, decode_compressed_list};
use a2a_analyzer::grouping::group_values;
use proptest::prelude::*;
use std::collections::BTreeSet;

proptest! {
    #[test]
    fn compressed_lists_decode_to_the_input(
        set in prop::collection::btree_set(0usize..5000, 0..200)
    ) {
        let values: Vec<usize> = set.into_iter().collect();
        let list = compress_int_array(&values);

        prop_assert_eq!(decode_compressed_list(&list).unwrap(), values.clone());
        prop_assert_eq!(count_elements(&list).unwrap(), values.len());
    }

    #[test]
    fn compressed_lists_have_no_adjacent_runs(
        set in prop::collection::btree_set(0usize..500, 1..100)
    ) {
        let values: Vec<usize> = set.into_iter().collect();
        let list = compress_int_array(&values);

        // Each token ends at least two below the next token's start
        let bounds: Vec<(usize, usize)> = list
            .split(',')
            .map(|token| match token.split_once('-') {
                Some((a, b)) => (a.parse().unwrap(), b.parse().unwrap()),
                None => {
                    let v = token.parse().unwrap();
                    (v, v)
                }
            })
            .collect();
        for pair in bounds.windows(2) {
            prop_assert!(pair[0].1 + 1 < pair[1].0);
        }
    }

    #[test]
    fn grouping_partitions_every_value(values in prop::collection::vec(0i64..10_000, 1..120)) {
        let engine = group_values(&values).unwrap();
        let groups = engine.groups();

        let mut seen = BTreeSet::new();
        for group in groups {
            prop_assert!(!group.is_empty());
            prop_assert_eq!(group.min(), *group.values().iter().min().unwrap());
            prop_assert_eq!(group.max(), *group.values().iter().max().unwrap());
            prop_assert_eq!(group.cached_sum(), group.values().iter().sum::<i64>());
            for id in group.ids() {
                prop_assert!(seen.insert(id), "id {} in two groups", id);
            }
        }
        prop_assert_eq!(seen.len(), values.len());

        for pair in groups.windows(2) {
            prop_assert!(pair[0].min() <= pair[1].min());
            prop_assert!(
                pair[0].max() <= pair[1].min(),
                "groups [{}, {}] and [{}, {}] overlap",
                pair[0].min(),
                pair[0].max(),
                pair[1].min(),
                pair[1].max()
            );
        }
    }
}
