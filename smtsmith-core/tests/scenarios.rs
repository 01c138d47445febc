//! End-to-end scenario checks over generated traces.

mod common;

use common::generate;
use smtsmith_core::mgr::{ManagerConfig, SolverMgr};
use smtsmith_core::op::OpKind;
use smtsmith_core::options::{OptionTable, SolverOption};
use smtsmith_core::solver::mock::{default_options, MockSolver};
use smtsmith_core::solver::Solver;
use smtsmith_core::sort::{Sort, SortKind};
use smtsmith_core::term::LeafKind;
use smtsmith_core::theory::Theory;
use smtsmith_core::trace::{tokenize, TraceWriter};

const QF_BV: &[Theory] = &[Theory::Bool, Theory::Bv];

/// Operator tokens legal in a Bool+BV configuration.
fn is_qf_bv_op(op: &str) -> bool {
    op.starts_with("bv-")
        || matches!(
            op,
            "equal" | "distinct" | "ite" | "and" | "or" | "xor" | "implies" | "not"
        )
}

#[test]
fn test_qf_bv_trace_shape() {
    let trace = generate(1, 500, QF_BV, default_options());
    let lines: Vec<&str> = trace.lines().collect();
    assert_eq!(lines[0], "set-seed 1");
    assert_eq!(lines[1], "new");

    let mut num_checks = 0;
    for line in &lines {
        let Some((id, tokens)) = tokenize(line) else {
            continue;
        };
        match id.as_str() {
            "check-sat" | "check-sat-assuming" => num_checks += 1,
            "mk-sort" => assert!(
                tokens[0] == "BOOL" || tokens[0] == "BV",
                "unexpected sort kind in QF_BV trace: {line}"
            ),
            "mk-term" => assert!(
                is_qf_bv_op(&tokens[0]),
                "unexpected operator in QF_BV trace: {line}"
            ),
            _ => {}
        }
    }
    assert!(num_checks > 0, "no satisfiability call in 500 steps");
}

#[test]
fn test_every_referenced_id_was_returned() {
    let theories = &[Theory::Bool, Theory::Bv, Theory::Int, Theory::Uf];
    let trace = generate(11, 400, theories, default_options());
    let mut known: Vec<String> = Vec::new();
    for line in trace.lines() {
        let Some((id, tokens)) = tokenize(line) else {
            continue;
        };
        if id == "return" {
            known.push(tokens[0].clone());
            continue;
        }
        if id == "delete" {
            known.clear();
            continue;
        }
        for tok in &tokens {
            let looks_like_ref = (tok.starts_with('s') || tok.starts_with('t'))
                && tok.len() > 1
                && tok[1..].bytes().all(|b| b.is_ascii_digit());
            if looks_like_ref
                && (id.starts_with("mk-")
                    || id == "assert"
                    || id.starts_with("check")
                    || id.starts_with("get"))
            {
                assert!(
                    known.contains(tok),
                    "line '{line}' references {tok} before it was returned"
                );
            }
        }
    }
}

#[test]
fn test_unsat_assumptions_gated_when_disabled() {
    // no produce-unsat-assumptions option declared: the back-end can
    // never report the capability as enabled
    let options = OptionTable::with_options(vec![
        SolverOption::boolean("incremental", false),
        SolverOption::boolean("produce-models", false),
    ]);
    let trace = generate(3, 600, QF_BV, options);
    assert!(
        !trace.lines().any(|l| l.starts_with("get-unsat-assumptions")),
        "get-unsat-assumptions appeared although the capability was disabled"
    );
}

#[test]
fn test_get_value_gated_on_model_gen() {
    let options = OptionTable::with_options(vec![SolverOption::boolean("incremental", false)]);
    let trace = generate(3, 600, QF_BV, options);
    assert!(!trace.lines().any(|l| l.starts_with("get-value")));
    assert!(!trace.lines().any(|l| l.starts_with("print-model")));
}

#[test]
fn test_conflicting_options_never_both_set() {
    let options = OptionTable::with_options(vec![
        SolverOption::boolean("alpha", false).with_conflicts(&["beta"]),
        SolverOption::boolean("beta", false).with_conflicts(&["alpha"]),
        SolverOption::boolean("incremental", false),
    ]);
    let trace = generate(13, 600, QF_BV, options);
    // conflict exclusion holds per solver instance
    let mut set_in_instance: Vec<String> = Vec::new();
    for line in trace.lines() {
        let Some((id, tokens)) = tokenize(line) else {
            continue;
        };
        if id == "delete" {
            set_in_instance.clear();
        } else if id == "set-opt" {
            set_in_instance.push(tokens[0].clone());
        }
    }
    let alpha = set_in_instance.iter().any(|n| n == "alpha");
    let beta = set_in_instance.iter().any(|n| n == "beta");
    assert!(!(alpha && beta), "conflicting options alpha and beta both set");
}

#[test]
fn test_no_option_set_twice_per_instance() {
    let trace = generate(17, 600, QF_BV, default_options());
    let mut seen: Vec<String> = Vec::new();
    for line in trace.lines() {
        let Some((id, tokens)) = tokenize(line) else {
            continue;
        };
        if id == "delete" {
            seen.clear();
        } else if id == "set-opt" {
            assert!(
                !seen.contains(&tokens[0]),
                "option {} set twice in one instance",
                tokens[0]
            );
            seen.push(tokens[0].clone());
        }
    }
}

fn quantifier_fixture() -> SolverMgr {
    let mut mgr = SolverMgr::new(
        Box::new(MockSolver::new()),
        1,
        ManagerConfig::default(),
        OptionTable::new(),
        TraceWriter::sink(),
    );
    mgr.on_new_instance().expect("instance");
    mgr
}

#[test]
fn test_quantifier_consumes_bound_variable() {
    let mut mgr = quantifier_fixture();
    let handle = mgr.solver_mut().mk_sort(SortKind::Bool).unwrap();
    let sort = mgr.add_sort(Sort::new(handle), SortKind::Bool).unwrap();

    let var_handle = mgr.solver_mut().mk_var(&sort, "x").unwrap();
    let var = mgr.register_leaf(var_handle, &sort, LeafKind::Variable, None);
    assert_eq!(mgr.db().num_vars(), 1);

    let body_handle = mgr
        .solver_mut()
        .mk_term(OpKind::Not, std::slice::from_ref(&var), &[])
        .unwrap();
    let body = mgr
        .register_term(body_handle, OpKind::Not, SortKind::Bool, &[var.clone()])
        .unwrap();
    assert!(mgr.db().has_quant_body());

    let q_handle = mgr
        .solver_mut()
        .mk_term(OpKind::Forall, &[var.clone(), body.clone()], &[])
        .unwrap();
    let quant = mgr
        .register_quantifier(q_handle, OpKind::Forall, &var, &body)
        .unwrap();

    // the bound variable is gone, and so is everything referencing it
    assert_eq!(mgr.db().num_vars(), 0);
    assert!(!mgr.db().has_quant_body());
    let (db, rng) = mgr.db_and_rng();
    assert!(db.pick_var(rng).is_none());
    // the quantifier itself is an ordinary ground Boolean term now
    assert!(quant.is_var_free());
    let picked = db.pick_term_of_kind(rng, SortKind::Bool);
    assert!(picked.is_some());
}

#[test]
fn test_push_pop_hides_scoped_constants() {
    let mut mgr = quantifier_fixture();
    mgr.solver_mut().set_opt("incremental", "true").unwrap();
    let handle = mgr.solver_mut().mk_sort(SortKind::Bool).unwrap();
    let sort = mgr.add_sort(Sort::new(handle), SortKind::Bool).unwrap();

    mgr.solver_mut().push(2).unwrap();
    mgr.db_mut().push_levels(2);
    let c_handle = mgr.solver_mut().mk_const(&sort, "c").unwrap();
    let c = mgr.register_leaf(c_handle, &sort, LeafKind::Constant, None);
    assert!(mgr.db().has_term_of_sort(&sort));

    mgr.solver_mut().pop(2).unwrap();
    mgr.db_mut().pop_levels(2);
    let (db, rng) = mgr.db_and_rng();
    assert!(db.pick_term_of_sort(rng, &sort).is_none());
    // hidden, not deleted: the id space stays stable
    assert_eq!(c.id(), 1);
    assert_eq!(db.num_terms(), 1);
}
