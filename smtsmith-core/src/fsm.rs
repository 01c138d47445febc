//! The weighted finite-state machine and trace replay.
//!
//! States hold weighted action tuples; the driver picks one per round,
//! runs it, and transitions on success. Precondition misses cost nothing
//! and the machine repicks. `check_states` validates the graph at
//! construction: every non-final state has actions with positive total
//! weight, every state is reachable from the initial state, and a final
//! state is reachable from everywhere.

use crate::actions::{
    Action, ActionAssert, ActionCheckSat, ActionCheckSatAssuming, ActionDelete,
    ActionGetUnsatAssumptions, ActionGetValue, ActionMkConst, ActionMkSort, ActionMkTerm,
    ActionMkValue, ActionMkVar, ActionNew, ActionPop, ActionPrintModel, ActionPush,
    ActionResetAssertions, ActionSetOption, Transition,
};
use crate::error::{FuzzerError, Result};
use crate::mgr::{ManagerConfig, SolverMgr};
use crate::options::OptionTable;
use crate::solver::Solver;
use crate::stats::Statistics;
use crate::trace::{tokenize, TraceWriter};
use std::io::BufRead;
use std::rc::Rc;

/// Index of a state inside the machine.
pub type StateId = usize;

/// Precondition for entering a state.
pub type StatePrecond = Box<dyn Fn(&SolverMgr) -> bool>;

/// Give up after this many consecutive precondition misses; a correctly
/// configured graph never gets close.
const MAX_CONSECUTIVE_MISSES: u64 = 100_000;

/// An action paired with the state to transition into after running it.
#[derive(Clone)]
pub struct ActionTuple {
    /// The action to run.
    pub action: Rc<dyn Action>,
    /// Target state; `None` stays in the current state.
    pub next: Option<StateId>,
}

/// A named node of the state machine.
pub struct State {
    id: String,
    is_final: bool,
    precond: Option<StatePrecond>,
    tuples: Vec<ActionTuple>,
    weights: Vec<u32>,
}

impl State {
    /// The state's identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True if reaching this state ends the run.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.is_final
    }
}

/// Builder for the state graph, also handed to back-ends so they can
/// register solver-specific states and actions.
#[derive(Default)]
pub struct FsmBuilder {
    states: Vec<State>,
    init: Option<StateId>,
}

impl FsmBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and add a new state.
    pub fn new_state(
        &mut self,
        id: &str,
        precond: Option<StatePrecond>,
        is_final: bool,
    ) -> StateId {
        self.states.push(State {
            id: id.into(),
            is_final,
            precond,
            tuples: Vec::new(),
            weights: Vec::new(),
        });
        self.states.len() - 1
    }

    /// Add an action to `state` with the given weight; `next` is the
    /// state to transition into, or `None` to stay.
    pub fn add_action(
        &mut self,
        state: StateId,
        action: Rc<dyn Action>,
        weight: u32,
        next: Option<StateId>,
    ) {
        let s = &mut self.states[state];
        s.tuples.push(ActionTuple { action, next });
        s.weights.push(weight);
    }

    /// Set the initial state.
    pub fn set_init_state(&mut self, state: StateId) {
        self.init = Some(state);
    }

    /// Look up a state by id (for back-end hooks).
    #[must_use]
    pub fn state_id(&self, id: &str) -> Option<StateId> {
        self.states.iter().position(|s| s.id == id)
    }

    /// The base configuration: the state graph every run starts from.
    ///
    /// `delete` is reachable only from `sat`, so every completed run
    /// contains at least one satisfiability call.
    #[must_use]
    pub fn default_graph() -> Self {
        let mut b = Self::new();

        let s_new = b.new_state("new", None, false);
        let s_opt = b.new_state("opt", None, false);
        let s_sorts = b.new_state("sorts", None, false);
        let s_inputs = b.new_state("inputs", None, false);
        let s_terms = b.new_state("terms", None, false);
        let s_main = b.new_state("main", None, false);
        let s_sat = b.new_state("sat", Some(Box::new(SolverMgr::sat_called)), false);
        let s_final = b.new_state("final", None, true);

        let transition: Rc<dyn Action> = Rc::new(Transition);
        let mk_sort: Rc<dyn Action> = Rc::new(ActionMkSort);
        let mk_const: Rc<dyn Action> = Rc::new(ActionMkConst);
        let mk_value: Rc<dyn Action> = Rc::new(ActionMkValue);
        let mk_var: Rc<dyn Action> = Rc::new(ActionMkVar);
        let mk_term: Rc<dyn Action> = Rc::new(ActionMkTerm);
        let set_opt: Rc<dyn Action> = Rc::new(ActionSetOption);

        b.add_action(s_new, Rc::new(ActionNew), 1, Some(s_opt));

        b.add_action(s_opt, set_opt.clone(), 10, None);
        b.add_action(s_opt, transition.clone(), 5, Some(s_sorts));

        b.add_action(s_sorts, mk_sort.clone(), 10, None);
        b.add_action(s_sorts, transition.clone(), 5, Some(s_inputs));

        b.add_action(s_inputs, mk_const.clone(), 10, None);
        b.add_action(s_inputs, mk_value.clone(), 6, None);
        b.add_action(s_inputs, mk_sort.clone(), 2, None);
        b.add_action(s_inputs, transition.clone(), 4, Some(s_terms));

        b.add_action(s_terms, mk_term.clone(), 15, None);
        b.add_action(s_terms, mk_const.clone(), 3, None);
        b.add_action(s_terms, mk_value.clone(), 3, None);
        b.add_action(s_terms, mk_var.clone(), 2, None);
        b.add_action(s_terms, mk_sort.clone(), 1, None);
        b.add_action(s_terms, transition.clone(), 5, Some(s_main));

        b.add_action(s_main, mk_term, 10, None);
        b.add_action(s_main, mk_const, 2, None);
        b.add_action(s_main, mk_value, 2, None);
        b.add_action(s_main, mk_var, 1, None);
        b.add_action(s_main, mk_sort, 1, None);
        b.add_action(s_main, set_opt, 1, None);
        b.add_action(s_main, Rc::new(ActionAssert), 8, None);
        b.add_action(s_main, Rc::new(ActionPush), 2, None);
        b.add_action(s_main, Rc::new(ActionPop), 2, None);
        b.add_action(s_main, Rc::new(ActionResetAssertions), 1, None);
        b.add_action(s_main, Rc::new(ActionCheckSat), 4, Some(s_sat));
        b.add_action(s_main, Rc::new(ActionCheckSatAssuming), 3, Some(s_sat));

        b.add_action(s_sat, Rc::new(ActionGetValue), 5, None);
        b.add_action(s_sat, Rc::new(ActionGetUnsatAssumptions), 5, None);
        b.add_action(s_sat, Rc::new(ActionPrintModel), 2, None);
        b.add_action(s_sat, transition, 12, Some(s_main));
        b.add_action(s_sat, Rc::new(ActionDelete), 2, Some(s_final));

        b.set_init_state(s_new);
        b
    }
}

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct FsmConfig {
    /// The run's seed.
    pub seed: u32,
    /// Step budget: successful actions before the run stops.
    pub max_steps: u64,
    /// Generator switches.
    pub manager: ManagerConfig,
}

impl Default for FsmConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_steps: 1000,
            manager: ManagerConfig::default(),
        }
    }
}

/// The state machine driver.
pub struct Fsm {
    mgr: SolverMgr,
    states: Vec<State>,
    registry: Vec<Rc<dyn Action>>,
    init: StateId,
    cur: StateId,
    max_steps: u64,
    seed: u32,
}

impl Fsm {
    /// Build a driver around `solver` with the base state graph plus
    /// whatever the back-end registers, then validate the graph.
    pub fn new(
        solver: Box<dyn Solver>,
        config: FsmConfig,
        options: OptionTable,
        trace: TraceWriter,
    ) -> Result<Self> {
        let mut builder = FsmBuilder::default_graph();
        solver.configure_fsm(&mut builder)?;
        let init = builder
            .init
            .ok_or_else(|| FuzzerError::Config("no initial state configured".into()))?;
        let mut registry: Vec<Rc<dyn Action>> = Vec::new();
        for state in &builder.states {
            for tuple in &state.tuples {
                let id = tuple.action.id();
                if !id.is_empty() && !registry.iter().any(|a| a.id() == id) {
                    registry.push(tuple.action.clone());
                }
            }
        }
        let mgr = SolverMgr::new(solver, config.seed, config.manager, options, trace);
        let fsm = Self {
            mgr,
            states: builder.states,
            registry,
            init,
            cur: init,
            max_steps: config.max_steps,
            seed: config.seed,
        };
        fsm.check_states()?;
        Ok(fsm)
    }

    /// The solver manager.
    #[must_use]
    pub fn mgr(&self) -> &SolverMgr {
        &self.mgr
    }

    /// The solver manager, mutably.
    pub fn mgr_mut(&mut self) -> &mut SolverMgr {
        &mut self.mgr
    }

    /// Run statistics.
    #[must_use]
    pub fn stats(&self) -> &Statistics {
        self.mgr.stats()
    }

    /// Validate the configured state graph.
    pub fn check_states(&self) -> Result<()> {
        for state in &self.states {
            if state.is_final {
                continue;
            }
            if state.tuples.is_empty() {
                return Err(FuzzerError::Config(format!(
                    "state '{}' has no actions",
                    state.id
                )));
            }
            if state.weights.iter().all(|w| *w == 0) {
                return Err(FuzzerError::Config(format!(
                    "state '{}' has zero total action weight",
                    state.id
                )));
            }
        }
        // every state reachable from the initial state
        let reachable = self.reachable_from(self.init);
        for (i, state) in self.states.iter().enumerate() {
            if !reachable[i] {
                return Err(FuzzerError::Config(format!(
                    "state '{}' is unreachable from the initial state",
                    state.id
                )));
            }
        }
        // a final state reachable from every state
        for (i, state) in self.states.iter().enumerate() {
            let from_here = self.reachable_from(i);
            if !self
                .states
                .iter()
                .enumerate()
                .any(|(j, s)| s.is_final && from_here[j])
            {
                return Err(FuzzerError::Config(format!(
                    "no final state is reachable from state '{}'",
                    state.id
                )));
            }
        }
        Ok(())
    }

    fn reachable_from(&self, start: StateId) -> Vec<bool> {
        let mut seen = vec![false; self.states.len()];
        let mut stack = vec![start];
        while let Some(s) = stack.pop() {
            if seen[s] {
                continue;
            }
            seen[s] = true;
            for tuple in &self.states[s].tuples {
                if let Some(next) = tuple.next {
                    if !seen[next] {
                        stack.push(next);
                    }
                }
            }
        }
        seen
    }

    fn attach_trace_context(&self, err: FuzzerError) -> FuzzerError {
        match err {
            FuzzerError::Backend { reason, trace_line } if trace_line.is_empty() => {
                FuzzerError::Backend {
                    reason,
                    trace_line: self.mgr.last_trace_line().to_string(),
                }
            }
            e => e,
        }
    }

    /// Run the machine until a final state is reached or the step
    /// budget is exhausted.
    pub fn run(&mut self) -> Result<()> {
        self.mgr.trace_line(&format!("set-seed {}", self.seed))?;
        let mut steps: u64 = 0;
        let mut misses: u64 = 0;
        loop {
            if self.states[self.cur].is_final || steps >= self.max_steps {
                break;
            }
            if let Some(precond) = &self.states[self.cur].precond {
                if !precond(&self.mgr) {
                    if self.cur == self.init {
                        return Err(FuzzerError::Config(
                            "initial state precondition is unsatisfiable".into(),
                        ));
                    }
                    tracing::trace!(state = %self.states[self.cur].id, "state precondition failed");
                    self.cur = self.init;
                    continue;
                }
            }
            let idx = self.mgr.rng_mut().pick_weighted(&self.states[self.cur].weights);
            let tuple = self.states[self.cur].tuples[idx].clone();
            let fired = tuple
                .action
                .run(&mut self.mgr)
                .map_err(|e| self.attach_trace_context(e))?;
            if !fired {
                misses += 1;
                if misses > MAX_CONSECUTIVE_MISSES {
                    return Err(FuzzerError::Invariant(format!(
                        "state '{}' made no progress after {MAX_CONSECUTIVE_MISSES} attempts",
                        self.states[self.cur].id
                    )));
                }
                continue;
            }
            misses = 0;
            steps += 1;
            if !tuple.action.id().is_empty() {
                let id = tuple.action.id().to_string();
                self.mgr.stats_mut().count_action(&id);
            }
            if let Some(next) = tuple.next {
                let id = self.states[next].id.clone();
                self.mgr.stats_mut().count_state(&id);
                tracing::trace!(from = %self.states[self.cur].id, to = %id, "transition");
                self.cur = next;
            }
        }
        self.mgr.stats_mut().steps = steps;
        Ok(())
    }

    fn find_action(&self, id: &str) -> Option<Rc<dyn Action>> {
        self.registry.iter().find(|a| a.id() == id).cloned()
    }

    fn renumber(err: FuzzerError, line: usize) -> FuzzerError {
        match err {
            FuzzerError::Untrace { line: 0, reason } => FuzzerError::Untrace { line, reason },
            e => e,
        }
    }

    /// Replay a trace, cross-checking every `return` line.
    ///
    /// Replayed actions re-emit their trace lines through this driver's
    /// writer, so a replay of a recorded run reproduces the recording
    /// byte for byte.
    pub fn untrace(&mut self, reader: &mut dyn BufRead) -> Result<()> {
        let mut lines: Vec<String> = Vec::new();
        let mut buf = String::new();
        loop {
            buf.clear();
            if reader.read_line(&mut buf)? == 0 {
                break;
            }
            lines.push(buf.trim_end_matches(['\n', '\r']).to_string());
        }
        let mut i = 0;
        while i < lines.len() {
            let lineno = i + 1;
            let Some((id, tokens)) = tokenize(&lines[i]) else {
                i += 1;
                continue;
            };
            if id == "set-seed" {
                if tokens.len() != 1 {
                    return Err(FuzzerError::Untrace {
                        line: lineno,
                        reason: "set-seed expects one token".into(),
                    });
                }
                let seed = tokens[0].parse::<u32>().map_err(|_| FuzzerError::Untrace {
                    line: lineno,
                    reason: format!("invalid seed '{}'", tokens[0]),
                })?;
                self.mgr.rng_mut().reseed(seed);
                self.mgr.trace_line(&format!("set-seed {seed}"))?;
                i += 1;
                continue;
            }
            if id == "return" {
                return Err(FuzzerError::Untrace {
                    line: lineno,
                    reason: "return without a preceding action".into(),
                });
            }
            let action = self.find_action(&id).ok_or_else(|| FuzzerError::Untrace {
                line: lineno,
                reason: format!("unknown action '{id}'"),
            })?;
            let actual = action
                .untrace(&mut self.mgr, &tokens)
                .map_err(|e| Self::renumber(self.attach_trace_context(e), lineno))?;

            let ret = lines
                .get(i + 1)
                .and_then(|l| tokenize(l))
                .filter(|(rid, _)| rid.as_str() == "return");
            match (actual, ret) {
                (0, None) => i += 1,
                (0, Some(_)) => {
                    return Err(FuzzerError::Untrace {
                        line: lineno + 1,
                        reason: format!("action '{id}' creates no object but trace has a return"),
                    })
                }
                (_, None) => {
                    return Err(FuzzerError::Untrace {
                        line: lineno,
                        reason: format!("missing return line after '{id}'"),
                    })
                }
                (actual, Some((_, ret_tokens))) => {
                    if ret_tokens.len() != 1 {
                        return Err(FuzzerError::Untrace {
                            line: lineno + 1,
                            reason: "return expects one token".into(),
                        });
                    }
                    let tok = &ret_tokens[0];
                    let (is_sort, id_str) = match tok.as_bytes().first() {
                        Some(&b's') => (true, &tok[1..]),
                        Some(&b't') => (false, &tok[1..]),
                        _ => {
                            return Err(FuzzerError::Untrace {
                                line: lineno + 1,
                                reason: format!("malformed return token '{tok}'"),
                            })
                        }
                    };
                    let traced = id_str.parse::<u64>().map_err(|_| FuzzerError::Untrace {
                        line: lineno + 1,
                        reason: format!("malformed return token '{tok}'"),
                    })?;
                    if traced != actual {
                        return Err(FuzzerError::Divergence {
                            line: lineno + 1,
                            traced,
                            actual,
                        });
                    }
                    if is_sort {
                        let sort = self.mgr.db().sort_by_id(actual).ok_or_else(|| {
                            FuzzerError::Invariant(format!("created sort s{actual} not in database"))
                        })?;
                        self.mgr.map_untraced_sort(traced, sort);
                    } else {
                        let term = self.mgr.db().term_by_id(actual).ok_or_else(|| {
                            FuzzerError::Invariant(format!("created term t{actual} not in database"))
                        })?;
                        self.mgr.map_untraced_term(traced, term);
                    }
                    i += 2;
                }
            }
        }
        Ok(())
    }
}
