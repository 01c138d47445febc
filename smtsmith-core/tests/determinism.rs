//! Determinism of trace generation.
//!
//! For a fixed seed, configuration, and back-end, two runs must produce
//! byte-identical traces, and distinct seeds must diverge.

mod common;

use common::generate;
use smtsmith_core::solver::mock::default_options;
use smtsmith_core::theory::Theory;

const QF_BV: &[Theory] = &[Theory::Bool, Theory::Bv];

#[test]
fn test_same_seed_identical_traces() {
    let a = generate(1, 200, QF_BV, default_options());
    let b = generate(1, 200, QF_BV, default_options());
    assert_eq!(a, b);
    assert!(!a.is_empty());
}

#[test]
fn test_different_seeds_diverge() {
    let a = generate(1, 200, QF_BV, default_options());
    let b = generate(2, 200, QF_BV, default_options());
    assert_ne!(a, b);
}

#[test]
fn test_trace_starts_with_seed_and_new() {
    let trace = generate(42, 100, QF_BV, default_options());
    let mut lines = trace.lines();
    assert_eq!(lines.next(), Some("set-seed 42"));
    assert_eq!(lines.next(), Some("new"));
}

#[test]
fn test_determinism_across_theory_sets() {
    let theories = &[
        Theory::Bool,
        Theory::Bv,
        Theory::Int,
        Theory::Real,
        Theory::Array,
        Theory::Uf,
        Theory::Quant,
    ];
    let a = generate(7, 300, theories, default_options());
    let b = generate(7, 300, theories, default_options());
    assert_eq!(a, b);
}
