//! Property-based tests for the deterministic foundations: RNG range
//! and weighting contracts, literal conversions, and the trace
//! tokenizer.

mod common;

use proptest::prelude::*;
use smtsmith_core::literals::{str_bin_to_dec, str_bin_to_hex, str_dec_to_bin};
use smtsmith_core::rng::RngState;
use smtsmith_core::trace::tokenize;

proptest! {
    #[test]
    fn prop_u32_range_contains_result(seed: u32, lo: u32, span in 0u32..10_000) {
        let hi = lo.saturating_add(span);
        let mut rng = RngState::new(seed);
        let v = rng.pick_u32_range(lo, hi);
        prop_assert!(lo <= v && v <= hi);
    }

    #[test]
    fn prop_weighted_pick_has_positive_weight(seed: u32, weights in prop::collection::vec(0u32..100, 1..20)) {
        prop_assume!(weights.iter().any(|w| *w > 0));
        let mut rng = RngState::new(seed);
        let idx = rng.pick_weighted(&weights);
        prop_assert!(idx < weights.len());
        prop_assert!(weights[idx] > 0);
    }

    #[test]
    fn prop_dec_bin_roundtrip(n: u64) {
        let bin = format!("{n:b}");
        prop_assert_eq!(str_bin_to_dec(&bin), n.to_string());
        prop_assert_eq!(str_dec_to_bin(&n.to_string()), bin);
    }

    #[test]
    fn prop_bin_hex_matches_format(n: u64) {
        let bin = format!("{n:b}");
        prop_assert_eq!(str_bin_to_hex(&bin), format!("{n:x}"));
    }

    #[test]
    fn prop_tokenizer_roundtrips_simple_tokens(
        id in "[a-z][a-z-]{0,10}",
        tokens in prop::collection::vec("[a-z0-9-]{1,8}", 0..8),
    ) {
        let mut line = id.clone();
        for t in &tokens {
            line.push(' ');
            line.push_str(t);
        }
        let (parsed_id, parsed_tokens) = tokenize(&line).expect("non-empty line");
        prop_assert_eq!(parsed_id, id);
        prop_assert_eq!(parsed_tokens, tokens);
    }

    #[test]
    fn prop_quoted_tokens_preserve_content(content in "[ -!#-:<-~]{0,20}") {
        // printable ASCII minus '"' and ';'
        let line = format!("mk-const s1 \"{content}\"");
        let (_, tokens) = tokenize(&line).expect("non-empty line");
        prop_assert_eq!(tokens.len(), 2);
        prop_assert_eq!(tokens[1].as_str(), content.as_str());
    }
}

/// Empirical action frequencies converge to the configured weights.
#[test]
fn test_weighted_sampling_fairness() {
    let weights = [1u32, 2, 3, 4];
    let total: u32 = weights.iter().sum();
    let n = 100_000u32;
    let mut counts = [0u32; 4];
    let mut rng = RngState::new(123);
    for _ in 0..n {
        counts[rng.pick_weighted(&weights)] += 1;
    }
    for (i, w) in weights.iter().enumerate() {
        let expected = f64::from(n) * f64::from(*w) / f64::from(total);
        let got = f64::from(counts[i]);
        let tolerance = f64::from(n) * 0.01;
        assert!(
            (got - expected).abs() < tolerance,
            "action {i}: got {got}, expected {expected}"
        );
    }
}
