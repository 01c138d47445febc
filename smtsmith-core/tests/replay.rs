//! Replay fidelity.
//!
//! A generated trace replays to completion, re-emits itself byte for
//! byte, and replaying a tampered trace aborts with a divergence.

mod common;

use common::{generate, replay};
use smtsmith_core::solver::mock::default_options;
use smtsmith_core::theory::Theory;
use smtsmith_core::FuzzerError;

const QF_BV: &[Theory] = &[Theory::Bool, Theory::Bv];

#[test]
fn test_replay_reproduces_trace() {
    let trace = generate(1, 300, QF_BV, default_options());
    let replayed = replay(&trace, QF_BV, default_options()).expect("replay completes");
    assert_eq!(trace, replayed);
}

#[test]
fn test_replay_reproduces_rich_theory_trace() {
    let theories = &[
        Theory::Bool,
        Theory::Bv,
        Theory::Int,
        Theory::Real,
        Theory::String,
        Theory::Array,
        Theory::Seq,
        Theory::Set,
        Theory::Bag,
        Theory::Fp,
        Theory::Uf,
        Theory::Quant,
    ];
    let trace = generate(9, 400, theories, default_options());
    let replayed = replay(&trace, theories, default_options()).expect("replay completes");
    assert_eq!(trace, replayed);
}

#[test]
fn test_replay_detects_divergent_return_id() {
    let trace = generate(1, 300, QF_BV, default_options());
    // tamper with the first return line
    let tampered: Vec<String> = {
        let mut done = false;
        trace
            .lines()
            .map(|l| {
                if !done && l.starts_with("return ") {
                    done = true;
                    let kind = &l["return ".len()..="return ".len()];
                    format!("return {kind}9999")
                } else {
                    l.to_string()
                }
            })
            .collect()
    };
    let tampered = tampered.join("\n");
    assert_ne!(trace, tampered);
    let err = replay(&tampered, QF_BV, default_options()).unwrap_err();
    assert!(
        matches!(err, FuzzerError::Divergence { traced: 9999, .. }),
        "expected divergence, got: {err}"
    );
}

#[test]
fn test_replay_rejects_unknown_action() {
    let err = replay("set-seed 1\nfrobnicate t1\n", QF_BV, default_options()).unwrap_err();
    assert!(matches!(err, FuzzerError::Untrace { line: 2, .. }));
}

#[test]
fn test_replay_rejects_stray_return() {
    let err = replay("set-seed 1\nreturn t1\n", QF_BV, default_options()).unwrap_err();
    assert!(matches!(err, FuzzerError::Untrace { line: 2, .. }));
}

#[test]
fn test_replay_skips_comments_and_blank_lines() {
    let trace = generate(5, 100, QF_BV, default_options());
    let commented = format!("; generated by a fuzzer\n\n{trace}");
    // the re-emitted trace drops the comment but replays the content
    let replayed = replay(&commented, QF_BV, default_options()).expect("replay completes");
    assert_eq!(trace, replayed);
}
