//! The action set.
//!
//! Each action is one parameterised transition of the state machine:
//! `run` samples its arguments from the solver manager, emits its trace
//! line, calls into the back-end, and registers whatever came back.
//! Returning `Ok(false)` means a precondition failed and the machine
//! stays put without consuming a step. `untrace` rebuilds the same
//! effect from trace tokens and returns the id of any created object so
//! the replayer can cross-check it against the `return` line.

use crate::config::{
    mk_term_n_args_min, BW_MAX, BW_MIN, FP_EXP_MAX, FP_EXP_MIN, FP_SIG_MAX, FP_SIG_MIN,
    FUN_ARITY_MAX, INT_LEN_MAX, MAX_N_ASSUMPTIONS, MAX_N_PUSH_LEVELS, MAX_N_TERMS_GET_VALUE,
    MK_TERM_N_ARGS_MAX, REAL_LEN_MAX, STR_LEN_MAX,
};
use crate::error::{FuzzerError, Result};
use crate::literals::{str_bin_to_dec, str_bin_to_hex};
use crate::mgr::SolverMgr;
use crate::op::{OpData, OpKind};
use crate::solver::{SolveResult, SpecialValue, ValueBase};
use crate::sort::{Sort, SortKind};
use crate::term::{LeafKind, Term};
use crate::theory::Theory;
use crate::trace::quote;

/// One parameterised transition of the state machine.
pub trait Action {
    /// Stable id, used as the leading trace token.
    fn id(&self) -> &str;

    /// Execute with freshly sampled arguments.
    ///
    /// Returns `false` when a precondition failed; the FSM then stays
    /// in its current state without consuming a step.
    fn run(&self, mgr: &mut SolverMgr) -> Result<bool>;

    /// Re-execute from trace tokens; returns the id of the created
    /// object, or 0 if the action creates none.
    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64>;
}

fn untrace_err(reason: impl Into<String>) -> FuzzerError {
    FuzzerError::Untrace {
        line: 0,
        reason: reason.into(),
    }
}

fn parse_uint(tok: &str) -> Result<u64> {
    tok.parse::<u64>()
        .map_err(|_| untrace_err(format!("expected unsigned integer, got '{tok}'")))
}

fn parse_u32(tok: &str) -> Result<u32> {
    tok.parse::<u32>()
        .map_err(|_| untrace_err(format!("expected unsigned integer, got '{tok}'")))
}

fn parse_sort_token(mgr: &SolverMgr, tok: &str) -> Result<Sort> {
    let id = tok
        .strip_prefix('s')
        .ok_or_else(|| untrace_err(format!("expected sort token, got '{tok}'")))?;
    mgr.untraced_sort(parse_uint(id)?)
}

fn parse_term_token(mgr: &SolverMgr, tok: &str) -> Result<Term> {
    let id = tok
        .strip_prefix('t')
        .ok_or_else(|| untrace_err(format!("expected term token, got '{tok}'")))?;
    mgr.untraced_term(parse_uint(id)?)
}

fn expect_ntokens(tokens: &[String], n: usize, what: &str) -> Result<()> {
    if tokens.len() == n {
        Ok(())
    } else {
        Err(untrace_err(format!(
            "{what}: expected {n} tokens, got {}",
            tokens.len()
        )))
    }
}

/// No-op edge between states; traces nothing.
#[derive(Debug, Default)]
pub struct Transition;

impl Action for Transition {
    fn id(&self) -> &str {
        ""
    }

    fn run(&self, _mgr: &mut SolverMgr) -> Result<bool> {
        Ok(true)
    }

    fn untrace(&self, _mgr: &mut SolverMgr, _tokens: &[String]) -> Result<u64> {
        Ok(0)
    }
}

/// Create the solver instance.
#[derive(Debug, Default)]
pub struct ActionNew;

impl Action for ActionNew {
    fn id(&self) -> &str {
        "new"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if mgr.is_initialized() {
            return Ok(false);
        }
        mgr.trace_line("new")?;
        mgr.on_new_instance()?;
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        expect_ntokens(tokens, 0, "new")?;
        mgr.trace_line("new")?;
        mgr.on_new_instance()?;
        Ok(0)
    }
}

/// Destroy the solver instance and reset all engine state.
#[derive(Debug, Default)]
pub struct ActionDelete;

impl Action for ActionDelete {
    fn id(&self) -> &str {
        "delete"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized() {
            return Ok(false);
        }
        mgr.trace_line("delete")?;
        mgr.on_delete_instance()?;
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        expect_ntokens(tokens, 0, "delete")?;
        mgr.trace_line("delete")?;
        mgr.on_delete_instance()?;
        Ok(0)
    }
}

/// Set one eligible solver option.
#[derive(Debug, Default)]
pub struct ActionSetOption;

impl Action for ActionSetOption {
    fn id(&self) -> &str {
        "set-opt"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized() {
            return Ok(false);
        }
        let Some((name, value)) = mgr.pick_option() else {
            return Ok(false);
        };
        mgr.trace_line(&format!("set-opt {name} {value}"))?;
        mgr.solver_mut().set_opt(&name, &value)?;
        mgr.mark_option_used(&name);
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        expect_ntokens(tokens, 2, "set-opt")?;
        mgr.trace_line(&format!("set-opt {} {}", tokens[0], tokens[1]))?;
        mgr.solver_mut().set_opt(&tokens[0], &tokens[1])?;
        mgr.mark_option_used(&tokens[0]);
        Ok(0)
    }
}

/// Sort kinds constructible per enabled theory.
fn sort_kinds_for_theory(theory: Theory) -> &'static [SortKind] {
    match theory {
        Theory::Bool => &[SortKind::Bool],
        Theory::Bv => &[SortKind::Bv],
        Theory::Int => &[SortKind::Int],
        Theory::Real => &[SortKind::Real],
        Theory::Fp => &[SortKind::Fp, SortKind::Rm],
        Theory::String => &[SortKind::String, SortKind::Reglan],
        Theory::Array => &[SortKind::Array],
        Theory::Seq => &[SortKind::Seq],
        Theory::Set => &[SortKind::Set],
        Theory::Bag => &[SortKind::Bag],
        Theory::Uf => &[SortKind::Fun],
        Theory::Quant => &[],
    }
}

/// Sorts usable as parameters of a new parametric sort.
///
/// Only traced sorts qualify: their ids appear as `s<id>` tokens in the
/// trace, which replay can only resolve for sorts that went through a
/// `return` line.
fn param_candidates(mgr: &SolverMgr) -> Vec<Sort> {
    mgr.db()
        .sorts()
        .iter()
        .filter(|s| s.is_traced())
        .filter(|s| !matches!(s.kind(), SortKind::Fun | SortKind::Reglan))
        .cloned()
        .collect()
}

/// Create and register one sort.
#[derive(Debug, Default)]
pub struct ActionMkSort;

impl ActionMkSort {
    fn build(
        mgr: &mut SolverMgr,
        kind: SortKind,
        widths: &[u32],
        params: &[Sort],
    ) -> Result<Sort> {
        let handle = match kind {
            SortKind::Bv => mgr.solver_mut().mk_sort_bv(widths[0])?,
            SortKind::Fp => mgr.solver_mut().mk_sort_fp(widths[0], widths[1])?,
            k if k.is_parametric() => mgr.solver_mut().mk_sort_parametric(k, params)?,
            k => mgr.solver_mut().mk_sort(k)?,
        };
        let sort = if params.is_empty() {
            Sort::new(handle)
        } else {
            Sort::with_params(handle, params.to_vec())
        };
        mgr.add_sort(sort, kind)
    }
}

impl Action for ActionMkSort {
    fn id(&self) -> &str {
        "mk-sort"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized() {
            return Ok(false);
        }
        let mut kinds: Vec<SortKind> = Vec::new();
        for theory in mgr.enabled_theories() {
            kinds.extend_from_slice(sort_kinds_for_theory(*theory));
        }
        let params_pool = param_candidates(mgr);
        kinds.retain(|k| !k.is_parametric() || !params_pool.is_empty());
        if kinds.is_empty() {
            return Ok(false);
        }
        let kind = *mgr.rng_mut().choose(&kinds);

        let mut widths: Vec<u32> = Vec::new();
        let mut params: Vec<Sort> = Vec::new();
        let rng = mgr.rng_mut();
        match kind {
            SortKind::Bv => widths.push(rng.pick_u32_range(BW_MIN, BW_MAX)),
            SortKind::Fp => {
                widths.push(rng.pick_u32_range(FP_EXP_MIN, FP_EXP_MAX));
                widths.push(rng.pick_u32_range(FP_SIG_MIN, FP_SIG_MAX));
            }
            SortKind::Array => {
                params.push(rng.choose(&params_pool).clone());
                params.push(rng.choose(&params_pool).clone());
            }
            SortKind::Seq | SortKind::Set | SortKind::Bag => {
                params.push(rng.choose(&params_pool).clone());
            }
            SortKind::Fun => {
                let arity = rng.pick_u32_range(1, FUN_ARITY_MAX);
                for _ in 0..=arity {
                    params.push(rng.choose(&params_pool).clone());
                }
            }
            _ => {}
        }

        let mut line = format!("mk-sort {kind}");
        for w in &widths {
            line.push_str(&format!(" {w}"));
        }
        for p in &params {
            line.push_str(&format!(" s{}", p.id()));
        }
        mgr.trace_line(&line)?;
        let sort = Self::build(mgr, kind, &widths, &params)?;
        mgr.trace_return_sort(&sort)?;
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        if tokens.is_empty() {
            return Err(untrace_err("mk-sort: missing sort kind"));
        }
        let kind = SortKind::from_str_opt(&tokens[0])
            .ok_or_else(|| untrace_err(format!("unknown sort kind '{}'", tokens[0])))?;
        let mut widths: Vec<u32> = Vec::new();
        let mut params: Vec<Sort> = Vec::new();
        match kind {
            SortKind::Bv => {
                expect_ntokens(tokens, 2, "mk-sort BV")?;
                widths.push(parse_u32(&tokens[1])?);
            }
            SortKind::Fp => {
                expect_ntokens(tokens, 3, "mk-sort FP")?;
                widths.push(parse_u32(&tokens[1])?);
                widths.push(parse_u32(&tokens[2])?);
            }
            k if k.is_parametric() => {
                for tok in &tokens[1..] {
                    params.push(parse_sort_token(mgr, tok)?);
                }
                if params.is_empty() {
                    return Err(untrace_err("mk-sort: parametric sort without parameters"));
                }
            }
            _ => expect_ntokens(tokens, 1, "mk-sort")?,
        }
        let mut line = format!("mk-sort {kind}");
        for w in &widths {
            line.push_str(&format!(" {w}"));
        }
        for p in &params {
            line.push_str(&format!(" s{}", p.id()));
        }
        mgr.trace_line(&line)?;
        let sort = Self::build(mgr, kind, &widths, &params)?;
        mgr.trace_return_sort(&sort)?;
        Ok(sort.id())
    }
}

/// Declare a free constant of a picked sort.
#[derive(Debug, Default)]
pub struct ActionMkConst;

impl Action for ActionMkConst {
    fn id(&self) -> &str {
        "mk-const"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized() {
            return Ok(false);
        }
        let candidates: Vec<Sort> = mgr
            .db()
            .sorts()
            .iter()
            .filter(|s| s.is_traced() && s.kind() != SortKind::Reglan)
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Ok(false);
        }
        let sort = mgr.rng_mut().choose(&candidates).clone();
        let symbol = mgr.pick_symbol();
        mgr.trace_line(&format!("mk-const s{} {}", sort.id(), quote(&symbol)))?;
        let handle = mgr.solver_mut().mk_const(&sort, &symbol)?;
        let term = mgr.register_leaf(handle, &sort, LeafKind::Constant, None);
        mgr.trace_return_term(&term)?;
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        expect_ntokens(tokens, 2, "mk-const")?;
        let sort = parse_sort_token(mgr, &tokens[0])?;
        let symbol = &tokens[1];
        mgr.trace_line(&format!("mk-const s{} {}", sort.id(), quote(symbol)))?;
        let handle = mgr.solver_mut().mk_const(&sort, symbol)?;
        let term = mgr.register_leaf(handle, &sort, LeafKind::Constant, None);
        mgr.trace_return_term(&term)?;
        Ok(term.id())
    }
}

/// Declare a quantifier-bound variable.
#[derive(Debug, Default)]
pub struct ActionMkVar;

impl Action for ActionMkVar {
    fn id(&self) -> &str {
        "mk-var"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized() || !mgr.theory_enabled(Theory::Quant) {
            return Ok(false);
        }
        let banned = mgr.solver().unsupported_var_sort_kinds();
        let candidates: Vec<Sort> = mgr
            .db()
            .sorts()
            .iter()
            .filter(|s| s.is_traced() && !banned.contains(&s.kind()))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Ok(false);
        }
        let sort = mgr.rng_mut().choose(&candidates).clone();
        let symbol = mgr.pick_symbol();
        mgr.trace_line(&format!("mk-var s{} {}", sort.id(), quote(&symbol)))?;
        let handle = mgr.solver_mut().mk_var(&sort, &symbol)?;
        let term = mgr.register_leaf(handle, &sort, LeafKind::Variable, None);
        mgr.trace_return_term(&term)?;
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        expect_ntokens(tokens, 2, "mk-var")?;
        let sort = parse_sort_token(mgr, &tokens[0])?;
        let symbol = &tokens[1];
        mgr.trace_line(&format!("mk-var s{} {}", sort.id(), quote(symbol)))?;
        let handle = mgr.solver_mut().mk_var(&sort, symbol)?;
        let term = mgr.register_leaf(handle, &sort, LeafKind::Variable, None);
        mgr.trace_return_term(&term)?;
        Ok(term.id())
    }
}

/// Sort kinds that admit values.
const VALUE_SORT_KINDS: &[SortKind] = &[
    SortKind::Bool,
    SortKind::Bv,
    SortKind::Int,
    SortKind::Real,
    SortKind::String,
    SortKind::Fp,
    SortKind::Rm,
    SortKind::Reglan,
];

/// Create a literal or special value of a picked sort.
#[derive(Debug, Default)]
pub struct ActionMkValue;

impl ActionMkValue {
    fn run_special(mgr: &mut SolverMgr, sort: &Sort, value: SpecialValue) -> Result<Term> {
        mgr.trace_line(&format!("mk-value s{} {value}", sort.id()))?;
        let handle = mgr.solver_mut().mk_special_value(sort, value)?;
        let term = mgr.register_leaf(handle, sort, LeafKind::Value, Some(value));
        mgr.trace_return_term(&term)?;
        Ok(term)
    }

    fn run_literal(mgr: &mut SolverMgr, sort: &Sort, lit: &str) -> Result<Term> {
        mgr.trace_line(&format!("mk-value s{} {}", sort.id(), quote(lit)))?;
        let handle = match sort.kind() {
            SortKind::Bool => {
                let value = lit == "true";
                mgr.solver_mut().mk_value_bool(sort, value)?
            }
            _ => mgr.solver_mut().mk_value_str(sort, lit)?,
        };
        let term = mgr.register_leaf(handle, sort, LeafKind::Value, None);
        mgr.trace_return_term(&term)?;
        Ok(term)
    }

    fn run_rational(mgr: &mut SolverMgr, sort: &Sort, num: &str, den: &str) -> Result<Term> {
        mgr.trace_line(&format!(
            "mk-value s{} {} {}",
            sort.id(),
            quote(num),
            quote(den)
        ))?;
        let handle = mgr.solver_mut().mk_value_rational(sort, num, den)?;
        let term = mgr.register_leaf(handle, sort, LeafKind::Value, None);
        mgr.trace_return_term(&term)?;
        Ok(term)
    }

    fn run_bv(mgr: &mut SolverMgr, sort: &Sort, value: &str, base: ValueBase) -> Result<Term> {
        mgr.trace_line(&format!(
            "mk-value s{} {} {}",
            sort.id(),
            quote(value),
            base
        ))?;
        let handle = mgr.solver_mut().mk_value_bv(sort, value, base)?;
        let term = mgr.register_leaf(handle, sort, LeafKind::Value, None);
        mgr.trace_return_term(&term)?;
        Ok(term)
    }

    fn pick_bool_literal(mgr: &mut SolverMgr) -> String {
        if mgr.rng_mut().flip_coin() {
            "true".into()
        } else {
            "false".into()
        }
    }

    fn pick_int_literal(mgr: &mut SolverMgr) -> String {
        let rng = mgr.rng_mut();
        let len = rng.pick_u32_range(1, INT_LEN_MAX);
        let mut s = String::new();
        if rng.flip_coin() {
            s.push('-');
        }
        s.push_str(&rng.pick_dec_str(len));
        s
    }

    fn pick_real_literal(mgr: &mut SolverMgr) -> String {
        let rng = mgr.rng_mut();
        let len = rng.pick_u32_range(1, REAL_LEN_MAX);
        let frac = rng.pick_u32_range(1, REAL_LEN_MAX);
        let mut s = String::new();
        if rng.flip_coin() {
            s.push('-');
        }
        s.push_str(&rng.pick_dec_str(len));
        s.push('.');
        s.push_str(&rng.pick_dec_str(frac));
        s
    }
}

impl Action for ActionMkValue {
    fn id(&self) -> &str {
        "mk-value"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized() {
            return Ok(false);
        }
        let candidates: Vec<Sort> = mgr
            .db()
            .sorts()
            .iter()
            .filter(|s| s.is_traced() && VALUE_SORT_KINDS.contains(&s.kind()))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Ok(false);
        }
        let sort = mgr.rng_mut().choose(&candidates).clone();
        match sort.kind() {
            SortKind::Bool => {
                let lit = Self::pick_bool_literal(mgr);
                Self::run_literal(mgr, &sort, &lit)?;
            }
            SortKind::Int => {
                let lit = Self::pick_int_literal(mgr);
                Self::run_literal(mgr, &sort, &lit)?;
            }
            SortKind::Real => {
                if mgr.rng_mut().flip_coin() {
                    let lit = Self::pick_real_literal(mgr);
                    Self::run_literal(mgr, &sort, &lit)?;
                } else {
                    let rng = mgr.rng_mut();
                    let num_len = rng.pick_u32_range(1, REAL_LEN_MAX);
                    let den_len = rng.pick_u32_range(1, REAL_LEN_MAX);
                    let num = rng.pick_dec_str(num_len);
                    let den = rng.pick_dec_str(den_len);
                    Self::run_rational(mgr, &sort, &num, &den)?;
                }
            }
            SortKind::String => {
                let rng = mgr.rng_mut();
                let len = rng.pick_u32_range(0, STR_LEN_MAX);
                let lit = rng.pick_string_literal(len);
                Self::run_literal(mgr, &sort, &lit)?;
            }
            SortKind::Bv => {
                let bw = sort.bv_size();
                if mgr.rng_mut().pick_with_prob(250) {
                    let value = *mgr.rng_mut().choose(SpecialValue::BV);
                    Self::run_special(mgr, &sort, value)?;
                } else {
                    let rng = mgr.rng_mut();
                    let bits = rng.pick_bin_str(bw);
                    let base = *rng.choose(ValueBase::ALL);
                    let value = match base {
                        ValueBase::Bin => bits,
                        ValueBase::Dec => str_bin_to_dec(&bits),
                        ValueBase::Hex => str_bin_to_hex(&bits),
                    };
                    Self::run_bv(mgr, &sort, &value, base)?;
                }
            }
            SortKind::Fp => {
                let value = *mgr.rng_mut().choose(SpecialValue::FP);
                Self::run_special(mgr, &sort, value)?;
            }
            SortKind::Rm => {
                let value = *mgr.rng_mut().choose(SpecialValue::RM);
                Self::run_special(mgr, &sort, value)?;
            }
            SortKind::Reglan => {
                let value = *mgr.rng_mut().choose(SpecialValue::RE);
                Self::run_special(mgr, &sort, value)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        if tokens.len() < 2 {
            return Err(untrace_err("mk-value: too few tokens"));
        }
        let sort = parse_sort_token(mgr, &tokens[0])?;
        let term = match sort.kind() {
            SortKind::Bool | SortKind::Int | SortKind::String => {
                expect_ntokens(tokens, 2, "mk-value")?;
                Self::run_literal(mgr, &sort, &tokens[1])?
            }
            SortKind::Real => {
                if tokens.len() == 3 {
                    Self::run_rational(mgr, &sort, &tokens[1], &tokens[2])?
                } else {
                    expect_ntokens(tokens, 2, "mk-value")?;
                    Self::run_literal(mgr, &sort, &tokens[1])?
                }
            }
            SortKind::Bv => {
                if tokens.len() == 2 {
                    let value = SpecialValue::from_str_opt(&tokens[1])
                        .ok_or_else(|| untrace_err("mk-value: unknown special value"))?;
                    Self::run_special(mgr, &sort, value)?
                } else {
                    expect_ntokens(tokens, 3, "mk-value")?;
                    let base = ValueBase::from_str_opt(&tokens[2])
                        .ok_or_else(|| untrace_err("mk-value: unknown base"))?;
                    Self::run_bv(mgr, &sort, &tokens[1], base)?
                }
            }
            SortKind::Fp | SortKind::Rm | SortKind::Reglan => {
                expect_ntokens(tokens, 2, "mk-value")?;
                let value = SpecialValue::from_str_opt(&tokens[1])
                    .ok_or_else(|| untrace_err("mk-value: unknown special value"))?;
                Self::run_special(mgr, &sort, value)?
            }
            k => return Err(untrace_err(format!("mk-value: sort kind {k} has no values"))),
        };
        Ok(term.id())
    }
}

/// Number of arguments for a possibly variadic operator.
fn pick_n_args(mgr: &mut SolverMgr, data: &OpData) -> u32 {
    if data.arity >= 0 {
        data.arity as u32
    } else {
        let min = mk_term_n_args_min(data.arity);
        mgr.rng_mut().pick_u32_range(min, MK_TERM_N_ARGS_MAX)
    }
}

/// Resolve one concrete sort with visible terms for `kind`.
fn pick_arg_sort(mgr: &mut SolverMgr, kind: SortKind) -> Option<Sort> {
    let (db, rng) = mgr.db_and_rng();
    db.pick_sort(rng, Some(kind), true)
}

/// Probability (out of 1000) of sampling a variable-scoped term for an
/// argument position while bound variables are open. This is how
/// quantifier bodies come to exist.
const P_PICK_QUANT_TERM: u32 = 100;

/// Pick an argument term of `sort`, occasionally variable-scoped.
fn pick_term_mixed_sort(mgr: &mut SolverMgr, sort: &Sort) -> Option<Term> {
    if mgr.db().num_vars() > 0 && mgr.rng_mut().pick_with_prob(P_PICK_QUANT_TERM) {
        let (db, rng) = mgr.db_and_rng();
        if let Some(term) = db.pick_quant_term(rng, sort) {
            return Some(term);
        }
    }
    let (db, rng) = mgr.db_and_rng();
    db.pick_term_of_sort(rng, sort)
}

/// Pick an argument term of `kind`, occasionally variable-scoped.
fn pick_term_mixed_kind(mgr: &mut SolverMgr, kind: SortKind) -> Option<Term> {
    if mgr.db().num_vars() > 0 && mgr.rng_mut().pick_with_prob(P_PICK_QUANT_TERM) {
        let (db, rng) = mgr.db_and_rng();
        if let Some(term) = db.pick_quant_term_of_kind(rng, kind) {
            return Some(term);
        }
    }
    let (db, rng) = mgr.db_and_rng();
    db.pick_term_of_kind(rng, kind)
}

/// Sampled arguments for one operator application.
struct PickedArgs {
    args: Vec<Term>,
    indices: Vec<u32>,
    /// For quantifiers: (bound variable, body).
    quant: Option<(Term, Term)>,
}

/// Sample typed arguments for `data`, or `None` when the term database
/// cannot currently supply them.
#[allow(clippy::too_many_lines)]
fn pick_args(mgr: &mut SolverMgr, data: &OpData) -> Option<PickedArgs> {
    use OpKind::*;
    let mut args: Vec<Term> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut quant = None;

    match data.kind {
        Equal | Distinct => {
            let n = pick_n_args(mgr, data);
            let sort = {
                let (db, rng) = mgr.db_and_rng();
                db.pick_sort(rng, None, true)?
            };
            for _ in 0..n {
                args.push(pick_term_mixed_sort(mgr, &sort)?);
            }
        }
        Ite => {
            let sort = {
                let (db, rng) = mgr.db_and_rng();
                db.pick_sort(rng, None, true)?
            };
            args.push(pick_term_mixed_kind(mgr, SortKind::Bool)?);
            args.push(pick_term_mixed_sort(mgr, &sort)?);
            args.push(pick_term_mixed_sort(mgr, &sort)?);
        }
        UfApply => {
            let fun_sort = pick_arg_sort(mgr, SortKind::Fun)?;
            let params = fun_sort.param_sorts();
            if params.len() < 2 {
                return None;
            }
            // function symbols are always free constants
            let fun = {
                let (db, rng) = mgr.db_and_rng();
                db.pick_term_of_sort(rng, &fun_sort)?
            };
            args.push(fun);
            let (domain, _codomain) = params.split_at(params.len() - 1);
            for dom in domain {
                args.push(pick_term_mixed_sort(mgr, dom)?);
            }
        }
        Forall | Exists => {
            let (db, rng) = mgr.db_and_rng();
            let body = db.pick_quant_body(rng)?;
            let var_ids = body.var_ids();
            let var_id = *rng.choose(&var_ids);
            let var = db.var_by_id(var_id)?;
            args.push(var.clone());
            args.push(body.clone());
            quant = Some((var, body));
        }
        ArraySelect | ArrayStore => {
            let arr_sort = pick_arg_sort(mgr, SortKind::Array)?;
            let params = arr_sort.param_sorts();
            if params.len() != 2 {
                return None;
            }
            args.push(pick_term_mixed_sort(mgr, &arr_sort)?);
            args.push(pick_term_mixed_sort(mgr, &params[0])?);
            if data.kind == ArrayStore {
                args.push(pick_term_mixed_sort(mgr, &params[1])?);
            }
        }
        SetMember | SetInsert | BagCount => {
            let container_kind = if data.kind == BagCount {
                SortKind::Bag
            } else {
                SortKind::Set
            };
            let cont_sort = pick_arg_sort(mgr, container_kind)?;
            let elem = cont_sort.param_sorts().first()?.clone();
            args.push(pick_term_mixed_sort(mgr, &elem)?);
            args.push(pick_term_mixed_sort(mgr, &cont_sort)?);
        }
        BagMake => {
            let elem_sort = {
                let (db, rng) = mgr.db_and_rng();
                db.pick_sort(rng, None, true)?
            };
            args.push(pick_term_mixed_sort(mgr, &elem_sort)?);
            args.push(pick_term_mixed_kind(mgr, SortKind::Int)?);
        }
        SeqUnit | SetSingleton => {
            let elem_sort = {
                let (db, rng) = mgr.db_and_rng();
                db.pick_sort(rng, None, true)?
            };
            args.push(pick_term_mixed_sort(mgr, &elem_sort)?);
        }
        SeqAt | SeqNth => {
            let seq_sort = pick_arg_sort(mgr, SortKind::Seq)?;
            args.push(pick_term_mixed_sort(mgr, &seq_sort)?);
            args.push(pick_term_mixed_kind(mgr, SortKind::Int)?);
        }
        BvExtract => {
            let sort = pick_arg_sort(mgr, SortKind::Bv)?;
            let bw = sort.bv_size();
            args.push(pick_term_mixed_sort(mgr, &sort)?);
            let rng = mgr.rng_mut();
            let hi = rng.pick_u32_range(0, bw - 1);
            let lo = rng.pick_u32_range(0, hi);
            indices.push(hi);
            indices.push(lo);
        }
        BvRepeat => {
            let sort = pick_arg_sort(mgr, SortKind::Bv)?;
            let bw = sort.bv_size();
            args.push(pick_term_mixed_sort(mgr, &sort)?);
            indices.push(mgr.rng_mut().pick_u32_range(1, (BW_MAX / bw).max(1)));
        }
        BvRotateLeft | BvRotateRight => {
            let sort = pick_arg_sort(mgr, SortKind::Bv)?;
            let bw = sort.bv_size();
            args.push(pick_term_mixed_sort(mgr, &sort)?);
            indices.push(mgr.rng_mut().pick_u32_range(0, bw));
        }
        BvSignExtend | BvZeroExtend => {
            let sort = pick_arg_sort(mgr, SortKind::Bv)?;
            let bw = sort.bv_size();
            args.push(pick_term_mixed_sort(mgr, &sort)?);
            indices.push(mgr.rng_mut().pick_u32_range(0, BW_MAX.saturating_sub(bw)));
        }
        BvConcat => {
            let n = pick_n_args(mgr, data);
            for _ in 0..n {
                args.push(pick_term_mixed_kind(mgr, SortKind::Bv)?);
            }
        }
        _ => {
            // Uniform path: one concrete sort per parametric argument
            // kind, single-sorted kinds picked directly.
            let n = pick_n_args(mgr, data);
            let mut bv_sort: Option<Sort> = None;
            let mut fp_sort: Option<Sort> = None;
            let mut seq_sort: Option<Sort> = None;
            let mut set_sort: Option<Sort> = None;
            let mut bag_sort: Option<Sort> = None;
            for i in 0..n {
                let kind = data.arg_sort_kind(i as usize);
                let slot = match kind {
                    SortKind::Bv => Some(&mut bv_sort),
                    SortKind::Fp => Some(&mut fp_sort),
                    SortKind::Seq => Some(&mut seq_sort),
                    SortKind::Set => Some(&mut set_sort),
                    SortKind::Bag => Some(&mut bag_sort),
                    _ => None,
                };
                let arg = if let Some(slot) = slot {
                    if slot.is_none() {
                        *slot = Some(pick_arg_sort(mgr, kind)?);
                    }
                    let sort = slot.clone()?;
                    pick_term_mixed_sort(mgr, &sort)?
                } else {
                    pick_term_mixed_kind(mgr, kind)?
                };
                args.push(arg);
            }
        }
    }
    Some(PickedArgs {
        args,
        indices,
        quant,
    })
}

fn mk_term_trace_line(kind: OpKind, args: &[Term], indices: &[u32]) -> String {
    let mut line = format!("mk-term {kind} {}", args.len());
    for a in args {
        line.push_str(&format!(" t{}", a.id()));
    }
    if !indices.is_empty() {
        line.push_str(&format!(" {}", indices.len()));
        for i in indices {
            line.push_str(&format!(" {i}"));
        }
    }
    line
}

/// Build one well-typed term with a picked operator.
#[derive(Debug, Default)]
pub struct ActionMkTerm;

impl Action for ActionMkTerm {
    fn id(&self) -> &str {
        "mk-term"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized() {
            return Ok(false);
        }
        let Some(kind) = mgr.pick_op_kind() else {
            return Ok(false);
        };
        let Some(data) = mgr.op_data(kind).cloned() else {
            return Ok(false);
        };
        let Some(picked) = pick_args(mgr, &data) else {
            return Ok(false);
        };
        mgr.trace_line(&mk_term_trace_line(kind, &picked.args, &picked.indices))?;
        let handle = mgr
            .solver_mut()
            .mk_term(kind, &picked.args, &picked.indices)?;
        let term = match picked.quant {
            Some((var, body)) => mgr.register_quantifier(handle, kind, &var, &body)?,
            None => mgr.register_term(handle, kind, data.sort_kind, &picked.args)?,
        };
        mgr.trace_return_term(&term)?;
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        if tokens.len() < 2 {
            return Err(untrace_err("mk-term: too few tokens"));
        }
        let kind = OpKind::from_str_opt(&tokens[0])
            .ok_or_else(|| untrace_err(format!("unknown operator '{}'", tokens[0])))?;
        let data = mgr
            .op_data(kind)
            .cloned()
            .ok_or_else(|| untrace_err(format!("operator '{kind}' not in catalog")))?;
        let n = parse_uint(&tokens[1])? as usize;
        if tokens.len() < 2 + n {
            return Err(untrace_err("mk-term: missing argument tokens"));
        }
        let mut args = Vec::with_capacity(n);
        for tok in &tokens[2..2 + n] {
            args.push(parse_term_token(mgr, tok)?);
        }
        let mut indices = Vec::new();
        if tokens.len() > 2 + n {
            let nidx = parse_uint(&tokens[2 + n])? as usize;
            expect_ntokens(tokens, 3 + n + nidx, "mk-term indices")?;
            for tok in &tokens[3 + n..3 + n + nidx] {
                indices.push(parse_u32(tok)?);
            }
        }
        mgr.trace_line(&mk_term_trace_line(kind, &args, &indices))?;
        let handle = mgr.solver_mut().mk_term(kind, &args, &indices)?;
        let term = if kind.is_quantifier() {
            let var = args[0].clone();
            let body = args[1].clone();
            mgr.register_quantifier(handle, kind, &var, &body)?
        } else {
            mgr.register_term(handle, kind, data.sort_kind, &args)?
        };
        mgr.trace_return_term(&term)?;
        Ok(term.id())
    }
}

/// Assert one Boolean term.
#[derive(Debug, Default)]
pub struct ActionAssert;

impl Action for ActionAssert {
    fn id(&self) -> &str {
        "assert"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized() {
            return Ok(false);
        }
        let term = {
            let (db, rng) = mgr.db_and_rng();
            db.pick_term_of_kind(rng, SortKind::Bool)
        };
        let Some(term) = term else {
            return Ok(false);
        };
        mgr.trace_line(&format!("assert t{}", term.id()))?;
        mgr.solver_mut().assert_formula(&term)?;
        mgr.invalidate_sat();
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        expect_ntokens(tokens, 1, "assert")?;
        let term = parse_term_token(mgr, &tokens[0])?;
        mgr.trace_line(&format!("assert t{}", term.id()))?;
        mgr.solver_mut().assert_formula(&term)?;
        mgr.invalidate_sat();
        Ok(0)
    }
}

/// Check satisfiability of the assertion stack.
#[derive(Debug, Default)]
pub struct ActionCheckSat;

impl Action for ActionCheckSat {
    fn id(&self) -> &str {
        "check-sat"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized() {
            return Ok(false);
        }
        mgr.trace_line("check-sat")?;
        let result = mgr.solver_mut().check_sat()?;
        mgr.set_assumptions(Vec::new());
        mgr.report_result(result);
        tracing::debug!(result = %result, "check-sat");
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        expect_ntokens(tokens, 0, "check-sat")?;
        mgr.trace_line("check-sat")?;
        let result = mgr.solver_mut().check_sat()?;
        mgr.set_assumptions(Vec::new());
        mgr.report_result(result);
        Ok(0)
    }
}

/// Check satisfiability under 1..5 picked assumptions.
#[derive(Debug, Default)]
pub struct ActionCheckSatAssuming;

impl Action for ActionCheckSatAssuming {
    fn id(&self) -> &str {
        "check-sat-assuming"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized() || !mgr.solver().is_incremental() {
            return Ok(false);
        }
        if !mgr.db().has_term_of_kind(SortKind::Bool) {
            return Ok(false);
        }
        let n = mgr.rng_mut().pick_u32_range(1, MAX_N_ASSUMPTIONS);
        let mut assumptions = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let (db, rng) = mgr.db_and_rng();
            match db.pick_term_of_kind(rng, SortKind::Bool) {
                Some(t) => assumptions.push(t),
                None => return Ok(false),
            }
        }
        let mut line = format!("check-sat-assuming {}", assumptions.len());
        for a in &assumptions {
            line.push_str(&format!(" t{}", a.id()));
        }
        mgr.trace_line(&line)?;
        let result = mgr.solver_mut().check_sat_assuming(&assumptions)?;
        mgr.set_assumptions(assumptions);
        mgr.report_result(result);
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        if tokens.is_empty() {
            return Err(untrace_err("check-sat-assuming: missing count"));
        }
        let n = parse_uint(&tokens[0])? as usize;
        expect_ntokens(tokens, 1 + n, "check-sat-assuming")?;
        let mut assumptions = Vec::with_capacity(n);
        for tok in &tokens[1..] {
            assumptions.push(parse_term_token(mgr, tok)?);
        }
        let mut line = format!("check-sat-assuming {n}");
        for a in &assumptions {
            line.push_str(&format!(" t{}", a.id()));
        }
        mgr.trace_line(&line)?;
        let result = mgr.solver_mut().check_sat_assuming(&assumptions)?;
        mgr.set_assumptions(assumptions);
        mgr.report_result(result);
        Ok(0)
    }
}

/// Fetch the assumptions responsible for the last `unsat`.
#[derive(Debug, Default)]
pub struct ActionGetUnsatAssumptions;

impl ActionGetUnsatAssumptions {
    fn execute(mgr: &mut SolverMgr) -> Result<()> {
        mgr.trace_line("get-unsat-assumptions")?;
        let handles = mgr.solver_mut().get_unsat_assumptions()?;
        for handle in handles {
            let term = mgr.find_returned_term(handle, SortKind::Bool)?;
            if !mgr.is_assumption(&term) {
                return Err(FuzzerError::Invariant(format!(
                    "back-end returned t{} as a failed assumption, but it was never assumed",
                    term.id()
                )));
            }
            if !mgr.solver_mut().check_unsat_assumption(&term)? {
                return Err(FuzzerError::Invariant(format!(
                    "back-end disagrees with itself about failed assumption t{}",
                    term.id()
                )));
            }
        }
        Ok(())
    }
}

impl Action for ActionGetUnsatAssumptions {
    fn id(&self) -> &str {
        "get-unsat-assumptions"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized()
            || !mgr.solver().is_unsat_assumptions()
            || mgr.last_result() != SolveResult::Unsat
            || mgr.assumptions().is_empty()
        {
            return Ok(false);
        }
        Self::execute(mgr)?;
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        expect_ntokens(tokens, 0, "get-unsat-assumptions")?;
        Self::execute(mgr)?;
        Ok(0)
    }
}

/// Query model values for 1..5 picked terms.
#[derive(Debug, Default)]
pub struct ActionGetValue;

impl ActionGetValue {
    fn execute(mgr: &mut SolverMgr, terms: &[Term]) -> Result<()> {
        let mut line = format!("get-value {}", terms.len());
        for t in terms {
            line.push_str(&format!(" t{}", t.id()));
        }
        mgr.trace_line(&line)?;
        let values = mgr.solver_mut().get_value(terms)?;
        if values.len() != terms.len() {
            return Err(FuzzerError::Invariant(format!(
                "get-value returned {} values for {} terms",
                values.len(),
                terms.len()
            )));
        }
        for (term, handle) in terms.iter().zip(values) {
            mgr.check_value_sort(&handle, term)?;
        }
        Ok(())
    }
}

impl Action for ActionGetValue {
    fn id(&self) -> &str {
        "get-value"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized()
            || !mgr.solver().is_model_gen()
            || mgr.last_result() != SolveResult::Sat
        {
            return Ok(false);
        }
        if !mgr.db().has_term_any() {
            return Ok(false);
        }
        let n = mgr.rng_mut().pick_u32_range(1, MAX_N_TERMS_GET_VALUE);
        let mut terms = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let (db, rng) = mgr.db_and_rng();
            match db.pick_term_any(rng) {
                Some(t) => terms.push(t),
                None => return Ok(false),
            }
        }
        Self::execute(mgr, &terms)?;
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        if tokens.is_empty() {
            return Err(untrace_err("get-value: missing count"));
        }
        let n = parse_uint(&tokens[0])? as usize;
        expect_ntokens(tokens, 1 + n, "get-value")?;
        let mut terms = Vec::with_capacity(n);
        for tok in &tokens[1..] {
            terms.push(parse_term_token(mgr, tok)?);
        }
        Self::execute(mgr, &terms)?;
        Ok(0)
    }
}

/// Push 1..5 assertion levels.
#[derive(Debug, Default)]
pub struct ActionPush;

impl Action for ActionPush {
    fn id(&self) -> &str {
        "push"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized() || !mgr.solver().is_incremental() {
            return Ok(false);
        }
        let n = mgr.rng_mut().pick_u32_range(1, MAX_N_PUSH_LEVELS);
        mgr.trace_line(&format!("push {n}"))?;
        mgr.solver_mut().push(n)?;
        mgr.db_mut().push_levels(n);
        mgr.invalidate_sat();
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        expect_ntokens(tokens, 1, "push")?;
        let n = parse_u32(&tokens[0])?;
        mgr.trace_line(&format!("push {n}"))?;
        mgr.solver_mut().push(n)?;
        mgr.db_mut().push_levels(n);
        mgr.invalidate_sat();
        Ok(0)
    }
}

/// Pop up to the current number of pushed levels.
#[derive(Debug, Default)]
pub struct ActionPop;

impl Action for ActionPop {
    fn id(&self) -> &str {
        "pop"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized() || !mgr.solver().is_incremental() {
            return Ok(false);
        }
        let cur = mgr.db().cur_level();
        if cur == 0 {
            return Ok(false);
        }
        let n = mgr.rng_mut().pick_u32_range(1, cur.min(MAX_N_PUSH_LEVELS));
        mgr.trace_line(&format!("pop {n}"))?;
        mgr.solver_mut().pop(n)?;
        mgr.db_mut().pop_levels(n);
        mgr.invalidate_sat();
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        expect_ntokens(tokens, 1, "pop")?;
        let n = parse_u32(&tokens[0])?;
        if n > mgr.db().cur_level() {
            return Err(untrace_err(format!(
                "pop {n} exceeds current level {}",
                mgr.db().cur_level()
            )));
        }
        mgr.trace_line(&format!("pop {n}"))?;
        mgr.solver_mut().pop(n)?;
        mgr.db_mut().pop_levels(n);
        mgr.invalidate_sat();
        Ok(0)
    }
}

/// Render the model after a `sat` answer.
#[derive(Debug, Default)]
pub struct ActionPrintModel;

impl Action for ActionPrintModel {
    fn id(&self) -> &str {
        "print-model"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized()
            || !mgr.solver().is_model_gen()
            || mgr.last_result() != SolveResult::Sat
        {
            return Ok(false);
        }
        mgr.trace_line("print-model")?;
        let model = mgr.solver_mut().print_model()?;
        tracing::debug!(len = model.len(), "print-model");
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        expect_ntokens(tokens, 0, "print-model")?;
        mgr.trace_line("print-model")?;
        mgr.solver_mut().print_model()?;
        Ok(0)
    }
}

/// Drop all assertions, keeping declarations and terms.
#[derive(Debug, Default)]
pub struct ActionResetAssertions;

impl ActionResetAssertions {
    fn execute(mgr: &mut SolverMgr) -> Result<()> {
        mgr.trace_line("reset-assertions")?;
        mgr.solver_mut().reset_assertions()?;
        let cur = mgr.db().cur_level();
        mgr.db_mut().pop_levels(cur);
        mgr.invalidate_sat();
        Ok(())
    }
}

impl Action for ActionResetAssertions {
    fn id(&self) -> &str {
        "reset-assertions"
    }

    fn run(&self, mgr: &mut SolverMgr) -> Result<bool> {
        if !mgr.is_initialized() || !mgr.solver().is_incremental() {
            return Ok(false);
        }
        Self::execute(mgr)?;
        Ok(true)
    }

    fn untrace(&self, mgr: &mut SolverMgr, tokens: &[String]) -> Result<u64> {
        expect_ntokens(tokens, 0, "reset-assertions")?;
        Self::execute(mgr)?;
        Ok(0)
    }
}
