use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use scholar_search::fusion::{FusionConfig, FusionStrategy, HybridRanker, RankedResult};

fn arb_list(max_score: f64) -> impl Strategy<Value = BTreeMap<u32, f64>> {
    prop::collection::btree_map(0_u32..40, 0.0..max_score, 0..20)
}

fn arb_strategy() -> impl Strategy<Value = FusionStrategy> {
    prop_oneof![Just(FusionStrategy::WeightedScore), Just(FusionStrategy::Rrf)]
}

/// Best-first list as an index would return it.
fn best_first(scores: &BTreeMap<u32, f64>) -> Vec<(u32, f64)> {
    let mut list: Vec<(u32, f64)> = scores.iter().map(|(id, s)| (*id, *s)).collect();
    list.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    list
}

fn ranker(strategy: FusionStrategy) -> HybridRanker {
    HybridRanker::new(FusionConfig {
        strategy,
        ..FusionConfig::default()
    })
    .expect("default weights are valid")
}

fn position(result: &RankedResult<u32>, id: u32) -> Option<usize> {
    result.iter().position(|r| *r.document_id() == id)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn output_is_the_truncated_union_without_duplicates(
        lexical in arb_list(50.0),
        vector in arb_list(1.0),
        limit in 1_usize..30,
        strategy in arb_strategy(),
    ) {
        let ranked = ranker(strategy)
            .rank(best_first(&lexical), best_first(&vector), limit)
            .expect("rank");

        let union: BTreeSet<u32> = lexical.keys().chain(vector.keys()).copied().collect();
        let ids: Vec<u32> = ranked.ids().copied().collect();
        let unique: BTreeSet<u32> = ids.iter().copied().collect();

        prop_assert_eq!(ids.len(), union.len().min(limit));
        prop_assert_eq!(unique.len(), ids.len());
        prop_assert!(unique.is_subset(&union));
    }

    #[test]
    fn ranks_are_dense_and_scores_non_increasing(
        lexical in arb_list(50.0),
        vector in arb_list(1.0),
        strategy in arb_strategy(),
    ) {
        let ranked = ranker(strategy)
            .rank(best_first(&lexical), best_first(&vector), 100)
            .expect("rank");

        for (i, r) in ranked.iter().enumerate() {
            prop_assert_eq!(r.rank, i + 1);
            prop_assert!(r.combined_score.is_finite());
        }
        for pair in ranked.results.windows(2) {
            prop_assert!(pair[0].combined_score >= pair[1].combined_score);
            if pair[0].combined_score.total_cmp(&pair[1].combined_score).is_eq() {
                prop_assert!(pair[0].document_id() < pair[1].document_id());
            }
        }
    }

    #[test]
    fn ranking_is_deterministic(
        lexical in arb_list(50.0),
        vector in arb_list(1.0),
        strategy in arb_strategy(),
    ) {
        let r = ranker(strategy);
        let first = r.rank(best_first(&lexical), best_first(&vector), 25).expect("rank");
        let second = r.rank(best_first(&lexical), best_first(&vector), 25).expect("rank");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn truncation_is_a_prefix(
        lexical in arb_list(50.0),
        vector in arb_list(1.0),
        limit in 1_usize..10,
        strategy in arb_strategy(),
    ) {
        let r = ranker(strategy);
        let full = r.rank(best_first(&lexical), best_first(&vector), 100).expect("rank");
        let cut = r.rank(best_first(&lexical), best_first(&vector), limit).expect("rank");
        prop_assert_eq!(&cut.results[..], &full.results[..cut.len()]);
    }

    #[test]
    fn single_channel_candidates_miss_the_other_score(
        lexical in arb_list(50.0),
        vector in arb_list(1.0),
        strategy in arb_strategy(),
    ) {
        let ranked = ranker(strategy)
            .rank(best_first(&lexical), best_first(&vector), 100)
            .expect("rank");
        for r in ranked.iter() {
            let id = r.document_id();
            prop_assert_eq!(r.candidate.lexical_score.is_some(), lexical.contains_key(id));
            prop_assert_eq!(r.candidate.vector_score.is_some(), vector.contains_key(id));
        }
    }

    #[test]
    fn raising_a_lexical_score_never_lowers_the_rank(
        lexical in prop::collection::btree_map(0_u32..40, 0.0..50.0, 2..20),
        vector in arb_list(1.0),
        pick in any::<prop::sample::Index>(),
    ) {
        let r = ranker(FusionStrategy::WeightedScore);
        let before = r.rank(best_first(&lexical), best_first(&vector), 100).expect("rank");

        let target = *pick.get(&lexical.keys().copied().collect::<Vec<_>>());
        let max = lexical.values().copied().fold(f64::MIN, f64::max);
        let mut raised = lexical.clone();
        raised.insert(target, (lexical[&target] + max) / 2.0);
        let after = r.rank(best_first(&raised), best_first(&vector), 100).expect("rank");

        prop_assert!(position(&after, target) <= position(&before, target));
    }
}

#[test]
fn empty_inputs_give_empty_output() {
    for strategy in [FusionStrategy::WeightedScore, FusionStrategy::Rrf] {
        let ranked = ranker(strategy)
            .rank(Vec::<(u32, f64)>::new(), Vec::new(), 10)
            .expect("rank");
        assert!(ranked.is_empty());
    }
}

#[test]
fn worked_example_orders_as_computed() {
    let lexical = vec![
        ("A".to_string(), 10.0),
        ("B".to_string(), 5.0),
        ("C".to_string(), 1.0),
    ];
    let vector = vec![
        ("B".to_string(), 0.9),
        ("A".to_string(), 0.8),
        ("D".to_string(), 0.7),
    ];

    let ranked = HybridRanker::default()
        .rank(lexical.clone(), vector.clone(), 10)
        .expect("rank");
    let ids: Vec<&str> = ranked.ids().map(String::as_str).collect();
    assert_eq!(ids, vec!["A", "B", "C", "D"]);

    let rrf = ranker(FusionStrategy::Rrf)
        .rank(lexical, vector, 10)
        .expect("rank");
    let ids: Vec<&str> = rrf.ids().map(String::as_str).collect();
    assert_eq!(ids, vec!["A", "B", "C", "D"]);
}
