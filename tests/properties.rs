//! Property tests for the reconciliation pipeline

use bigdecimal::BigDecimal;
use deposits_matcher_core::{
    DepositList, EntryStatus, GroupingPreference, ListSide, MatchCandidate, MatcherConfig,
    NoopProgress, Optimality, ReconciliationEngine, ReconciliationInput, SubsetEnumerator,
};
use proptest::prelude::*;
use std::collections::HashSet;

fn to_input(a: &[u32], b: &[u32], cents: bool) -> ReconciliationInput {
    let render = |values: &[u32]| -> Vec<String> {
        values
            .iter()
            .map(|v| {
                if cents {
                    format!("{}.{:02}", v / 100, v % 100)
                } else {
                    v.to_string()
                }
            })
            .collect()
    };
    ReconciliationInput::new(
        DepositList::parse(ListSide::A, &render(a)).unwrap(),
        DepositList::parse(ListSide::B, &render(b)).unwrap(),
    )
    .unwrap()
}

fn engine(grouping: GroupingPreference) -> ReconciliationEngine {
    ReconciliationEngine::with_config(MatcherConfig {
        grouping,
        ..MatcherConfig::default()
    })
    .unwrap()
}

fn subset_sums(values: &[u32]) -> HashSet<u64> {
    (1u32..(1 << values.len()))
        .map(|mask| {
            values
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, &v)| u64::from(v))
                .sum()
        })
        .collect()
}

/// Best (total, groups) over every non-overlapping selection of candidates
fn exhaustive_best(
    candidates: &[MatchCandidate],
    start: usize,
    used_a: u64,
    used_b: u64,
) -> (BigDecimal, usize) {
    let mut best = (BigDecimal::from(0), 0);
    for i in start..candidates.len() {
        let c = &candidates[i];
        if c.a.mask() & used_a != 0 || c.b.mask() & used_b != 0 {
            continue;
        }
        let (rest_total, rest_groups) =
            exhaustive_best(candidates, i + 1, used_a | c.a.mask(), used_b | c.b.mask());
        let option = (rest_total + c.sum.to_decimal(), rest_groups + 1);
        if option > best {
            best = option;
        }
    }
    best
}

fn small_list() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(1u32..=40, 1..=6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn property_subset_count_is_two_to_the_n_minus_one(values in small_list()) {
        let list = DepositList::from_amounts(
            ListSide::A,
            values.iter().map(|&v| BigDecimal::from(v)).collect(),
        )
        .unwrap();
        let subsets = SubsetEnumerator::enumerate(&list).unwrap();

        prop_assert_eq!(subsets.len() as u64, (1u64 << values.len()) - 1);
        let masks: HashSet<u64> = subsets.iter().map(|s| s.mask()).collect();
        prop_assert_eq!(masks.len(), subsets.len());
    }

    #[test]
    fn property_total_is_largest_common_subset_sum(
        a in small_list(),
        b in small_list(),
        cents in any::<bool>(),
    ) {
        let report = engine(GroupingPreference::FirstFound)
            .reconcile(&to_input(&a, &b, cents))
            .unwrap();

        let best = subset_sums(&a)
            .intersection(&subset_sums(&b))
            .copied()
            .max()
            .unwrap_or(0);
        let expected = if cents {
            BigDecimal::new(best.into(), 2)
        } else {
            BigDecimal::from(best)
        };

        prop_assert_eq!(&report.matched_total, &expected);
        prop_assert_eq!(report.optimality, Optimality::Exact);
    }

    #[test]
    fn property_reconciliation_identity_holds(
        a in small_list(),
        b in small_list(),
        finest in any::<bool>(),
    ) {
        let grouping = if finest { GroupingPreference::Finest } else { GroupingPreference::FirstFound };
        let report = engine(grouping).reconcile(&to_input(&a, &b, false)).unwrap();

        let groups: BigDecimal = report.related_sets.iter().map(|s| s.sum.clone()).sum();
        prop_assert_eq!(&report.summary_a.matched, &groups);
        prop_assert_eq!(&report.summary_b.matched, &groups);
        for side in [ListSide::A, ListSide::B] {
            let summary = report.summary(side);
            prop_assert_eq!(&summary.matched + &summary.unmatched, summary.total.clone());

            let mut seen = HashSet::new();
            for set in &report.related_sets {
                for id in set.members(side) {
                    prop_assert!(seen.insert(*id), "{} in two related sets", id);
                    let record = report.entry(*id).unwrap();
                    prop_assert_eq!(record.status, EntryStatus::Matched { related_set: set.id });
                }
            }
            let matched = report.entries(side).iter().filter(|r| r.status.is_matched()).count();
            prop_assert_eq!(matched, seen.len());
        }
    }

    #[test]
    fn property_pipeline_is_deterministic(
        a in small_list(),
        b in small_list(),
        finest in any::<bool>(),
    ) {
        let grouping = if finest { GroupingPreference::Finest } else { GroupingPreference::FirstFound };
        let input = to_input(&a, &b, true);
        let first = engine(grouping).reconcile(&input).unwrap();
        let second = engine(grouping).reconcile(&input).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn property_finest_grouping_matches_exhaustive_search(
        a in prop::collection::vec(1u32..=12, 1..=4),
        b in prop::collection::vec(1u32..=12, 1..=4),
    ) {
        let input = to_input(&a, &b, false);
        let matcher = engine(GroupingPreference::Finest);
        let candidates = matcher
            .prepare(&input, &NoopProgress)
            .unwrap()
            .candidates()
            .to_vec();
        let (best_total, best_groups) = exhaustive_best(&candidates, 0, 0, 0);

        let report = matcher.reconcile(&input).unwrap();
        prop_assert_eq!(report.matched_total, best_total);
        prop_assert_eq!(report.related_sets.len(), best_groups);
        prop_assert_eq!(report.optimality, Optimality::Exact);
    }
}
