//! Back-end extension hooks: solver-specific actions registered through
//! `configure_fsm`, operator filtering through `unsupported_op_kinds`,
//! and state-graph validation of a broken configuration.

mod common;

use common::SharedBuf;
use smtsmith_core::actions::Action;
use smtsmith_core::error::Result;
use smtsmith_core::fsm::{Fsm, FsmBuilder};
use smtsmith_core::mgr::SolverMgr;
use smtsmith_core::op::{OpKind, OpKindSet};
use smtsmith_core::options::OptionTable;
use smtsmith_core::solver::mock::{default_options, MockSolver};
use smtsmith_core::solver::{
    SolveResult, Solver, SortHandle, SortKindSet, SpecialValue, TermHandle, ValueBase,
};
use smtsmith_core::sort::{Sort, SortKind};
use smtsmith_core::term::Term;
use smtsmith_core::theory::Theory;
use smtsmith_core::trace::TraceWriter;
use smtsmith_core::FuzzerError;
use std::rc::Rc;

/// A solver-specific diagnostic action: traces a probe line, no
/// back-end effect.
#[derive(Debug, Default)]
struct ActionProbe;

impl Action for ActionProbe {
    fn id(&self) -> &str {
        "ext-probe"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized() {
            return Ok(false);
        }
        mgr.trace_line("ext-probe")?;
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        if !tokens.is_empty() {
            return Err(FuzzerError::Untrace {
                line: 0,
                reason: "ext-probe takes no arguments".into(),
            });
        }
        mgr.trace_line("ext-probe")?;
        Ok(0)
    }
}

/// Mock back-end with extension hooks exercised.
struct ExtSolver {
    inner: MockSolver,
    break_graph: bool,
}

impl ExtSolver {
    fn new(break_graph: bool) -> Self {
        Self {
            inner: MockSolver::new(),
            break_graph,
        }
    }
}

impl Solver for ExtSolver {
    fn name(&self) -> &'static str {
        "ext"
    }

    fn new_instance(&mut self) -> Result<()> {
        self.inner.new_instance()
    }

    fn delete_instance(&mut self) -> Result<()> {
        self.inner.delete_instance()
    }

    fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    fn supported_theories(&self) -> Vec<Theory> {
        self.inner.supported_theories()
    }

    fn unsupported_op_kinds(&self) -> OpKindSet {
        let mut set = self.inner.unsupported_op_kinds();
        set.insert(OpKind::BvXor);
        set
    }

    fn unsupported_var_sort_kinds(&self) -> SortKindSet {
        self.inner.unsupported_var_sort_kinds()
    }

    fn option_incremental(&self) -> &'static str {
        self.inner.option_incremental()
    }

    fn option_model_gen(&self) -> &'static str {
        self.inner.option_model_gen()
    }

    fn option_unsat_cores(&self) -> &'static str {
        self.inner.option_unsat_cores()
    }

    fn option_unsat_assumptions(&self) -> &'static str {
        self.inner.option_unsat_assumptions()
    }

    fn is_incremental(&self) -> bool {
        self.inner.is_incremental()
    }

    fn is_model_gen(&self) -> bool {
        self.inner.is_model_gen()
    }

    fn is_unsat_cores(&self) -> bool {
        self.inner.is_unsat_cores()
    }

    fn is_unsat_assumptions(&self) -> bool {
        self.inner.is_unsat_assumptions()
    }

    fn set_opt(&mut self, name: &str, value: &str) -> Result<()> {
        self.inner.set_opt(name, value)
    }

    fn mk_sort(&mut self, kind: SortKind) -> Result<Rc<dyn SortHandle>> {
        self.inner.mk_sort(kind)
    }

    fn mk_sort_bv(&mut self, bw: u32) -> Result<Rc<dyn SortHandle>> {
        self.inner.mk_sort_bv(bw)
    }

    fn mk_sort_fp(&mut self, esize: u32, ssize: u32) -> Result<Rc<dyn SortHandle>> {
        self.inner.mk_sort_fp(esize, ssize)
    }

    fn mk_sort_parametric(
        &mut self,
        kind: SortKind,
        params: &[Sort],
    ) -> Result<Rc<dyn SortHandle>> {
        self.inner.mk_sort_parametric(kind, params)
    }

    fn mk_const(&mut self, sort: &Sort, symbol: &str) -> Result<Rc<dyn TermHandle>> {
        self.inner.mk_const(sort, symbol)
    }

    fn mk_var(&mut self, sort: &Sort, symbol: &str) -> Result<Rc<dyn TermHandle>> {
        self.inner.mk_var(sort, symbol)
    }

    fn mk_value_bool(&mut self, sort: &Sort, value: bool) -> Result<Rc<dyn TermHandle>> {
        self.inner.mk_value_bool(sort, value)
    }

    fn mk_value_str(&mut self, sort: &Sort, value: &str) -> Result<Rc<dyn TermHandle>> {
        self.inner.mk_value_str(sort, value)
    }

    fn mk_value_rational(
        &mut self,
        sort: &Sort,
        num: &str,
        den: &str,
    ) -> Result<Rc<dyn TermHandle>> {
        self.inner.mk_value_rational(sort, num, den)
    }

    fn mk_value_bv(
        &mut self,
        sort: &Sort,
        value: &str,
        base: ValueBase,
    ) -> Result<Rc<dyn TermHandle>> {
        self.inner.mk_value_bv(sort, value, base)
    }

    fn mk_special_value(
        &mut self,
        sort: &Sort,
        value: SpecialValue,
    ) -> Result<Rc<dyn TermHandle>> {
        self.inner.mk_special_value(sort, value)
    }

    fn mk_term(
        &mut self,
        kind: OpKind,
        args: &[Term],
        indices: &[u32],
    ) -> Result<Rc<dyn TermHandle>> {
        self.inner.mk_term(kind, args, indices)
    }

    fn get_sort(
        &mut self,
        term: &Rc<dyn TermHandle>,
        expected: SortKind,
    ) -> Result<Rc<dyn SortHandle>> {
        self.inner.get_sort(term, expected)
    }

    fn assert_formula(&mut self, term: &Term) -> Result<()> {
        self.inner.assert_formula(term)
    }

    fn check_sat(&mut self) -> Result<SolveResult> {
        self.inner.check_sat()
    }

    fn check_sat_assuming(&mut self, assumptions: &[Term]) -> Result<SolveResult> {
        self.inner.check_sat_assuming(assumptions)
    }

    fn get_unsat_assumptions(&mut self) -> Result<Vec<Rc<dyn TermHandle>>> {
        self.inner.get_unsat_assumptions()
    }

    fn check_unsat_assumption(&mut self, term: &Term) -> Result<bool> {
        self.inner.check_unsat_assumption(term)
    }

    fn get_value(&mut self, terms: &[Term]) -> Result<Vec<Rc<dyn TermHandle>>> {
        self.inner.get_value(terms)
    }

    fn push(&mut self, n: u32) -> Result<()> {
        self.inner.push(n)
    }

    fn pop(&mut self, n: u32) -> Result<()> {
        self.inner.pop(n)
    }

    fn print_model(&mut self) -> Result<String> {
        self.inner.print_model()
    }

    fn reset_assertions(&mut self) -> Result<()> {
        self.inner.reset_assertions()
    }

    fn reset(&mut self) -> Result<()> {
        self.inner.reset()
    }

    fn reset_sat(&mut self) {
        self.inner.reset_sat();
    }

    fn configure_fsm(&self, fsm: &mut FsmBuilder) -> Result<()> {
        if self.break_graph {
            // a state nothing transitions into
            let orphan = fsm.new_state("orphan", None, false);
            fsm.add_action(orphan, Rc::new(ActionProbe), 1, None);
        } else {
            let main = fsm
                .state_id("main")
                .ok_or_else(|| FuzzerError::Config("no main state".into()))?;
            fsm.add_action(main, Rc::new(ActionProbe), 50, None);
        }
        Ok(())
    }
}

fn generate_ext(seed: u32, max_steps: u64) -> String {
    let buf = SharedBuf::new();
    let mut fsm = Fsm::new(
        Box::new(ExtSolver::new(false)),
        common::config(seed, max_steps, &[Theory::Bool, Theory::Bv]),
        default_options(),
        TraceWriter::new(Box::new(buf.clone())),
    )
    .expect("state graph validates");
    fsm.run().expect("run completes");
    buf.contents()
}

#[test]
fn test_solver_specific_action_fires_and_replays() {
    let trace = generate_ext(21, 400);
    assert!(
        trace.lines().any(|l| l == "ext-probe"),
        "solver-specific action never fired"
    );

    let buf = SharedBuf::new();
    let mut fsm = Fsm::new(
        Box::new(ExtSolver::new(false)),
        common::config(0, 1, &[Theory::Bool, Theory::Bv]),
        default_options(),
        TraceWriter::new(Box::new(buf.clone())),
    )
    .expect("state graph validates");
    let mut reader = trace.as_bytes();
    fsm.untrace(&mut reader).expect("replay completes");
    assert_eq!(trace, buf.contents());
}

#[test]
fn test_solver_specific_unsupported_op_excluded() {
    let trace = generate_ext(22, 400);
    for line in trace.lines() {
        if let Some(rest) = line.strip_prefix("mk-term ") {
            assert!(
                !rest.starts_with("bv-xor "),
                "unsupported operator appeared: {line}"
            );
        }
    }
}

#[test]
fn test_check_states_rejects_unreachable_state() {
    let err = Fsm::new(
        Box::new(ExtSolver::new(true)),
        common::config(0, 10, &[Theory::Bool]),
        OptionTable::new(),
        TraceWriter::sink(),
    )
    .err()
    .expect("construction must fail");
    assert!(matches!(err, FuzzerError::Config(_)), "got: {err}");
}
