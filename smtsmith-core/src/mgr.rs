//! The solver manager.
//!
//! [`SolverMgr`] is the façade every action runs against. It owns the
//! RNG, the back-end, the term database, the operator catalog, the option
//! table, the trace writer, the statistics, and the replay id maps, and
//! it implements the typed `pick_*` queries plus the operator
//! availability cache.

use crate::error::{FuzzerError, Result};
use crate::op::{OpCatalog, OpData, OpKind};
use crate::options::OptionTable;
use crate::rng::RngState;
use crate::solver::{SolveResult, Solver, SortHandle, SpecialValue, TermHandle};
use crate::sort::{Sort, SortKind};
use crate::stats::Statistics;
use crate::term::{LeafKind, LevelSet, Term, VarSet};
use crate::termdb::TermDb;
use crate::theory::Theory;
use crate::trace::TraceWriter;
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Behavioral switches of the generator.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Theories to exercise; intersected with what the back-end supports.
    pub theories: Vec<Theory>,
    /// Exclude non-linear arithmetic operators.
    pub linear_arith: bool,
    /// Accept Real sorts where Int is expected.
    pub arith_subtyping: bool,
    /// Emit `_x{n}` symbols instead of random SMT-LIB symbols.
    pub simple_symbols: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            theories: Theory::ALL.to_vec(),
            linear_arith: false,
            arith_subtyping: false,
            simple_symbols: true,
        }
    }
}

/// Owner of all engine state for one fuzzing run.
pub struct SolverMgr {
    rng: RngState,
    solver: Box<dyn Solver>,
    db: TermDb,
    opcat: Option<OpCatalog>,
    options: OptionTable,
    trace: TraceWriter,
    stats: Statistics,
    config: ManagerConfig,
    enabled_theories: Vec<Theory>,
    symbol_counter: u32,
    sat_called: bool,
    sat_result: SolveResult,
    num_sat_calls: u32,
    assumptions: Vec<Term>,
    /// Operators still waiting for enabling terms.
    ops_waiting: Vec<OpKind>,
    /// Operators whose argument sort kinds have been seen populated.
    ops_enabled: Vec<OpKind>,
    untraced_sorts: FxHashMap<u64, Sort>,
    untraced_terms: FxHashMap<u64, Term>,
}

impl std::fmt::Debug for SolverMgr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverMgr")
            .field("solver", &self.solver.name())
            .field("sorts", &self.db.num_sorts())
            .field("terms", &self.db.num_terms())
            .finish_non_exhaustive()
    }
}

impl SolverMgr {
    /// Create a manager around `solver`, seeded with `seed`.
    #[must_use]
    pub fn new(
        solver: Box<dyn Solver>,
        seed: u32,
        config: ManagerConfig,
        options: OptionTable,
        trace: TraceWriter,
    ) -> Self {
        Self {
            rng: RngState::new(seed),
            solver,
            db: TermDb::new(),
            opcat: None,
            options,
            trace,
            stats: Statistics::new(),
            config,
            enabled_theories: Vec::new(),
            symbol_counter: 0,
            sat_called: false,
            sat_result: SolveResult::Unknown,
            num_sat_calls: 0,
            assumptions: Vec::new(),
            ops_waiting: Vec::new(),
            ops_enabled: Vec::new(),
            untraced_sorts: FxHashMap::default(),
            untraced_terms: FxHashMap::default(),
        }
    }

    // --- accessors --------------------------------------------------

    /// The deterministic RNG.
    pub fn rng_mut(&mut self) -> &mut RngState {
        &mut self.rng
    }

    /// The term database and the RNG, split-borrowed for pick queries.
    pub fn db_and_rng(&mut self) -> (&TermDb, &mut RngState) {
        (&self.db, &mut self.rng)
    }

    /// The back-end.
    #[must_use]
    pub fn solver(&self) -> &dyn Solver {
        self.solver.as_ref()
    }

    /// The back-end, mutably.
    pub fn solver_mut(&mut self) -> &mut dyn Solver {
        self.solver.as_mut()
    }

    /// The term database.
    #[must_use]
    pub fn db(&self) -> &TermDb {
        &self.db
    }

    /// The term database, mutably.
    pub fn db_mut(&mut self) -> &mut TermDb {
        &mut self.db
    }

    /// Run statistics.
    #[must_use]
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Run statistics, mutably.
    pub fn stats_mut(&mut self) -> &mut Statistics {
        &mut self.stats
    }

    /// The option table.
    #[must_use]
    pub fn options(&self) -> &OptionTable {
        &self.options
    }

    /// The operator catalog; `None` before `new`.
    #[must_use]
    pub fn opcat(&self) -> Option<&OpCatalog> {
        self.opcat.as_ref()
    }

    /// Descriptor of `kind`, if in the catalog.
    #[must_use]
    pub fn op_data(&self, kind: OpKind) -> Option<&OpData> {
        self.opcat.as_ref().and_then(|c| c.op(kind))
    }

    /// Theories enabled for this instance.
    #[must_use]
    pub fn enabled_theories(&self) -> &[Theory] {
        &self.enabled_theories
    }

    /// True if `theory` is enabled.
    #[must_use]
    pub fn theory_enabled(&self, theory: Theory) -> bool {
        self.enabled_theories.contains(&theory)
    }

    /// Generator switches.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // --- lifecycle --------------------------------------------------

    /// Bring up the back-end instance and build the operator catalog.
    pub fn on_new_instance(&mut self) -> Result<()> {
        self.solver.new_instance()?;
        let supported = self.solver.supported_theories();
        let mut enabled: Vec<Theory> = self
            .config
            .theories
            .iter()
            .copied()
            .filter(|t| supported.contains(t))
            .collect();
        if !enabled.contains(&Theory::Bool) && supported.contains(&Theory::Bool) {
            enabled.push(Theory::Bool);
        }
        let enabled_set = enabled.iter().copied().collect();
        let mut opcat = OpCatalog::new(
            &enabled_set,
            self.config.linear_arith,
            &self.solver.unsupported_op_kinds(),
        )?;
        self.solver.configure_opmgr(&mut opcat)?;
        self.ops_waiting = opcat
            .all_ops()
            .map(|d| d.kind)
            .filter(|k| !k.is_quantifier())
            .collect();
        self.ops_enabled.clear();
        self.opcat = Some(opcat);
        self.enabled_theories = enabled;
        Ok(())
    }

    /// Tear down the back-end instance and drop all run state.
    pub fn on_delete_instance(&mut self) -> Result<()> {
        self.solver.delete_instance()?;
        self.db.clear();
        self.opcat = None;
        self.options.reset_used();
        self.enabled_theories.clear();
        self.symbol_counter = 0;
        self.sat_called = false;
        self.sat_result = SolveResult::Unknown;
        self.num_sat_calls = 0;
        self.assumptions.clear();
        self.ops_waiting.clear();
        self.ops_enabled.clear();
        self.untraced_sorts.clear();
        self.untraced_terms.clear();
        Ok(())
    }

    /// True between `new` and `delete`.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.solver.is_initialized()
    }

    // --- satisfiability bookkeeping ---------------------------------

    /// Record the result of a satisfiability call.
    pub fn report_result(&mut self, result: SolveResult) {
        self.sat_called = true;
        self.sat_result = result;
        self.num_sat_calls += 1;
        self.stats.count_result(result.as_str());
    }

    /// True once any satisfiability call was made on this instance.
    #[must_use]
    pub fn sat_called(&self) -> bool {
        self.sat_called
    }

    /// Number of satisfiability calls made on this instance.
    #[must_use]
    pub fn num_sat_calls(&self) -> u32 {
        self.num_sat_calls
    }

    /// The last satisfiability result.
    #[must_use]
    pub fn last_result(&self) -> SolveResult {
        self.sat_result
    }

    /// Invalidate the last result (assertion state changed).
    pub fn invalidate_sat(&mut self) {
        self.sat_result = SolveResult::Unknown;
        self.solver.reset_sat();
    }

    /// Record the assumptions of the pending `check-sat-assuming`.
    pub fn set_assumptions(&mut self, assumptions: Vec<Term>) {
        self.assumptions = assumptions;
    }

    /// Assumptions of the last `check-sat-assuming`.
    #[must_use]
    pub fn assumptions(&self) -> &[Term] {
        &self.assumptions
    }

    /// True if `term` was among the last assumptions.
    #[must_use]
    pub fn is_assumption(&self, term: &Term) -> bool {
        self.assumptions.contains(term)
    }

    // --- typed registration -----------------------------------------

    fn kind_acceptable(&self, expected: SortKind, sort: &Sort) -> bool {
        let actual = sort.kind();
        actual == expected
            || (expected == SortKind::Bool && actual == SortKind::Bv && sort.bv_size() == 1)
            || (expected == SortKind::Int
                && actual == SortKind::Real
                && self.config.arith_subtyping)
    }

    /// Intern a sort, promoting an unconstrained kind to `expected` and
    /// enforcing kind consistency.
    pub fn add_sort(&mut self, sort: Sort, expected: SortKind) -> Result<Sort> {
        let canonical = self.db.find_sort(sort.clone());
        if canonical.id() != 0 {
            return Ok(canonical);
        }
        if sort.kind() == SortKind::Any {
            if expected == SortKind::Any {
                return Err(FuzzerError::Invariant(
                    "cannot register a sort of unconstrained kind".into(),
                ));
            }
            sort.set_kind(expected);
        } else if expected != SortKind::Any && !self.kind_acceptable(expected, &sort) {
            return Err(FuzzerError::Invariant(format!(
                "sort kind {} where {} was expected",
                sort.kind(),
                expected
            )));
        }
        let sort = self.db.add_sort(sort);
        self.stats.sorts += 1;
        Ok(sort)
    }

    /// Register a leaf term (constant, variable, or value) of `sort`.
    ///
    /// Leaves created above push level 0 carry that level and become
    /// hidden when it is popped.
    pub fn register_leaf(
        &mut self,
        handle: Rc<dyn TermHandle>,
        sort: &Sort,
        leaf: LeafKind,
        special: Option<SpecialValue>,
    ) -> Term {
        let mut levels = LevelSet::new();
        let cur = self.db.cur_level();
        if cur > 0 && leaf != LeafKind::Variable {
            levels.push(cur);
        }
        let term = Term::leaf(handle, sort.clone(), leaf, special, levels);
        let (term, new) = self.db.add(term);
        if new {
            self.stats.terms += 1;
        }
        term
    }

    /// Register an operator application returned by the back-end.
    ///
    /// Consults the back-end for the result sort, canonicalises it,
    /// backfills implicit element sorts, and unions the argument
    /// level and variable sets.
    pub fn register_term(
        &mut self,
        handle: Rc<dyn TermHandle>,
        kind: OpKind,
        result_hint: SortKind,
        args: &[Term],
    ) -> Result<Term> {
        let sort_handle = self.solver.get_sort(&handle, result_hint)?;
        let expected = if result_hint == SortKind::Any {
            sort_handle.kind()
        } else {
            result_hint
        };
        let sort = self.add_sort(Sort::new(sort_handle), expected)?;
        if matches!(kind, OpKind::SeqUnit | OpKind::SetSingleton | OpKind::BagMake)
            && sort.param_sorts().is_empty()
        {
            if let Some(first) = args.first() {
                sort.set_param_sorts(vec![first.sort().clone()]);
            }
        }
        let mut levels = LevelSet::new();
        let mut vars = VarSet::new();
        for a in args {
            levels = Term::union_levels(&levels, a.levels());
            vars = Term::union_vars(&vars, &a.var_ids());
        }
        let term = Term::new(handle, sort, levels, vars);
        let (term, new) = self.db.add(term);
        if new {
            self.stats.terms += 1;
            self.stats.count_op(kind.as_str());
        }
        Ok(term)
    }

    /// Register a quantifier application and consume its bound variable.
    ///
    /// The new term's variable set is the body's minus the bound
    /// variable; the variable and every term still referencing it are
    /// removed from the database afterwards.
    pub fn register_quantifier(
        &mut self,
        handle: Rc<dyn TermHandle>,
        kind: OpKind,
        var: &Term,
        body: &Term,
    ) -> Result<Term> {
        let sort_handle = self.solver.get_sort(&handle, SortKind::Bool)?;
        let sort = self.add_sort(Sort::new(sort_handle), SortKind::Bool)?;
        let mut vars = body.var_ids();
        if let Ok(pos) = vars.binary_search(&var.id()) {
            vars.remove(pos);
        }
        let term = Term::new(handle, sort, body.levels().clone(), vars);
        let (term, new) = self.db.add(term);
        if new {
            self.stats.terms += 1;
            self.stats.count_op(kind.as_str());
        }
        self.db.remove_var(var);
        Ok(term)
    }

    /// Resolve a term handle the back-end returned (a failed assumption)
    /// against the database.
    ///
    /// The handle must denote an already-registered term; anything else
    /// is an invariant violation, because ids are only ever minted by
    /// object-creating actions with `return` lines.
    pub fn find_returned_term(
        &mut self,
        handle: Rc<dyn TermHandle>,
        sort_hint: SortKind,
    ) -> Result<Term> {
        let sort_handle = self.solver.get_sort(&handle, sort_hint)?;
        let sort = self.db.find_sort(Sort::new(sort_handle));
        let probe = Term::leaf(handle, sort, LeafKind::None, None, LevelSet::new());
        let term = self.db.find(probe);
        if term.id() == 0 {
            return Err(FuzzerError::Invariant(
                "back-end returned a term the engine never registered".into(),
            ));
        }
        Ok(term)
    }

    /// Check that a model value the back-end returned has the sort of
    /// the term it was queried for.
    pub fn check_value_sort(
        &mut self,
        handle: &Rc<dyn TermHandle>,
        queried: &Term,
    ) -> Result<()> {
        let sort_handle = self.solver.get_sort(handle, queried.sort().kind())?;
        let sort = self.db.find_sort(Sort::new(sort_handle));
        if sort != *queried.sort() {
            return Err(FuzzerError::Invariant(format!(
                "model value for t{} has a different sort",
                queried.id()
            )));
        }
        Ok(())
    }

    // --- picks ------------------------------------------------------

    /// Generate a fresh symbol.
    pub fn pick_symbol(&mut self) -> String {
        if self.config.simple_symbols {
            let n = self.symbol_counter;
            self.symbol_counter += 1;
            format!("_x{n}")
        } else {
            self.rng.pick_symbol()
        }
    }

    /// Pick an eligible option and a value from its domain.
    ///
    /// Once a satisfiability call was made, the incrementality option is
    /// off the table.
    pub fn pick_option(&mut self) -> Option<(String, String)> {
        let banned: Vec<&str> = if self.sat_called {
            vec![self.solver.option_incremental()]
        } else {
            Vec::new()
        };
        self.options.pick(&mut self.rng, &banned)
    }

    /// Record that an option has been set.
    pub fn mark_option_used(&mut self, name: &str) {
        self.options.mark_used(name);
    }

    /// Pick an operator whose argument sort kinds currently have terms.
    ///
    /// Walks the waiting set lazily: an operator whose argument kinds
    /// are all populated moves to the enabled set and is never checked
    /// again. The quantifier builders bypass the cache because they
    /// consume variables.
    pub fn pick_op_kind(&mut self) -> Option<OpKind> {
        let (ready, still): (Vec<OpKind>, Vec<OpKind>) = {
            let opcat = self.opcat.as_ref()?;
            self.ops_waiting.iter().copied().partition(|k| {
                opcat
                    .op(*k)
                    .is_some_and(|d| self.db.has_term_of_kinds(&d.distinct_arg_kinds()))
            })
        };
        self.ops_waiting = still;
        self.ops_enabled.extend(ready);
        let mut pool = self.ops_enabled.clone();
        if let Some(opcat) = self.opcat.as_ref() {
            for q in [OpKind::Forall, OpKind::Exists] {
                if opcat.contains(q) && self.db.num_vars() > 0 && self.db.has_quant_body() {
                    pool.push(q);
                }
            }
        }
        if pool.is_empty() {
            None
        } else {
            Some(*self.rng.choose(&pool))
        }
    }

    // --- trace ------------------------------------------------------

    /// Emit one trace line.
    pub fn trace_line(&mut self, line: &str) -> Result<()> {
        self.trace.line(line)
    }

    /// Emit the `return` line for a created sort.
    ///
    /// Marks the sort as traced: from here on, later trace lines may
    /// reference it by its `s<id>` token.
    pub fn trace_return_sort(&mut self, sort: &Sort) -> Result<()> {
        sort.set_traced();
        let line = format!("return s{}", sort.id());
        self.trace.line(&line)
    }

    /// Emit the `return` line for a created term.
    pub fn trace_return_term(&mut self, term: &Term) -> Result<()> {
        let line = format!("return t{}", term.id());
        self.trace.line(&line)
    }

    /// The most recently emitted trace line.
    #[must_use]
    pub fn last_trace_line(&self) -> &str {
        self.trace.last_line()
    }

    // --- replay id maps ---------------------------------------------

    /// Map a traced sort id to the live sort it denotes.
    pub fn map_untraced_sort(&mut self, traced: u64, sort: Sort) {
        self.untraced_sorts.insert(traced, sort);
    }

    /// Map a traced term id to the live term it denotes.
    pub fn map_untraced_term(&mut self, traced: u64, term: Term) {
        self.untraced_terms.insert(traced, term);
    }

    /// The live sort a traced id denotes.
    pub fn untraced_sort(&self, traced: u64) -> Result<Sort> {
        self.untraced_sorts
            .get(&traced)
            .cloned()
            .ok_or_else(|| FuzzerError::Untrace {
                line: 0,
                reason: format!("unknown sort id s{traced}"),
            })
    }

    /// The live term a traced id denotes.
    pub fn untraced_term(&self, traced: u64) -> Result<Term> {
        self.untraced_terms
            .get(&traced)
            .cloned()
            .ok_or_else(|| FuzzerError::Untrace {
                line: 0,
                reason: format!("unknown term id t{traced}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::mock::MockSolver;

    fn mgr() -> SolverMgr {
        SolverMgr::new(
            Box::new(MockSolver::new()),
            7,
            ManagerConfig::default(),
            OptionTable::new(),
            TraceWriter::sink(),
        )
    }

    fn mgr_with_theories(theories: &[Theory]) -> SolverMgr {
        SolverMgr::new(
            Box::new(MockSolver::new()),
            7,
            ManagerConfig {
                theories: theories.to_vec(),
                ..ManagerConfig::default()
            },
            OptionTable::new(),
            TraceWriter::sink(),
        )
    }

    #[test]
    fn test_new_instance_builds_catalog() {
        let mut m = mgr_with_theories(&[Theory::Bool, Theory::Bv]);
        m.on_new_instance().unwrap();
        assert!(m.is_initialized());
        assert!(m.opcat().is_some());
        assert!(m.op_data(OpKind::BvAdd).is_some());
        assert!(m.op_data(OpKind::IntAdd).is_none());
    }

    #[test]
    fn test_pick_op_kind_requires_terms() {
        let mut m = mgr_with_theories(&[Theory::Bool, Theory::Bv]);
        m.on_new_instance().unwrap();
        // no terms yet: nothing is pickable
        assert!(m.pick_op_kind().is_none());
        // add one Boolean constant, Bool-only ops become available
        let h = m.solver_mut().mk_sort(SortKind::Bool).unwrap();
        let sort = m.add_sort(Sort::new(h), SortKind::Bool).unwrap();
        let c = m.solver_mut().mk_const(&sort, "p").unwrap();
        m.register_leaf(c, &sort, LeafKind::Constant, None);
        let kind = m.pick_op_kind().unwrap();
        let data = m.op_data(kind).unwrap().clone();
        assert!(data
            .distinct_arg_kinds()
            .iter()
            .all(|k| matches!(k, SortKind::Bool | SortKind::Any)));
    }

    #[test]
    fn test_add_sort_rejects_kind_mismatch() {
        let mut m = mgr();
        m.on_new_instance().unwrap();
        let h = m.solver_mut().mk_sort(SortKind::Int).unwrap();
        let res = m.add_sort(Sort::new(h), SortKind::Bool);
        assert!(matches!(res, Err(FuzzerError::Invariant(_))));
    }

    #[test]
    fn test_arith_subtyping_accepts_real_for_int() {
        let mut m = SolverMgr::new(
            Box::new(MockSolver::new()),
            7,
            ManagerConfig {
                arith_subtyping: true,
                ..ManagerConfig::default()
            },
            OptionTable::new(),
            TraceWriter::sink(),
        );
        m.on_new_instance().unwrap();
        let h = m.solver_mut().mk_sort(SortKind::Real).unwrap();
        assert!(m.add_sort(Sort::new(h), SortKind::Int).is_ok());
    }

    #[test]
    fn test_simple_symbols_count_up() {
        let mut m = mgr();
        assert_eq!(m.pick_symbol(), "_x0");
        assert_eq!(m.pick_symbol(), "_x1");
    }

    #[test]
    fn test_incremental_option_banned_after_sat_call() {
        let mut m = SolverMgr::new(
            Box::new(MockSolver::new()),
            7,
            ManagerConfig::default(),
            OptionTable::with_options(vec![crate::options::SolverOption::boolean(
                "incremental",
                false,
            )]),
            TraceWriter::sink(),
        );
        m.on_new_instance().unwrap();
        assert!(m.pick_option().is_some());
        m.report_result(SolveResult::Sat);
        assert!(m.pick_option().is_none());
    }
}
