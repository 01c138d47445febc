//! Built-in deterministic back-end.
//!
//! A self-contained implementation of the [`Solver`](super::Solver)
//! contract used by the test suite and the CLI. It interns sorts and
//! terms structurally, type-checks every `mk_term` call against SMT-LIB
//! typing rules (so a generator bug surfaces as a back-end rejection),
//! and answers satisfiability queries by a deterministic function of its
//! assertion state so both the sat and unsat paths of the engine are
//! exercised under replay.

use super::{SolveResult, Solver, SortHandle, SortKindSet, SpecialValue, TermHandle, ValueBase};
use crate::error::{FuzzerError, Result};
use crate::literals::{str_dec_to_bin, str_hex_to_bin};
use crate::op::{OpKind, OpKindSet};
use crate::sort::{Sort, SortKind};
use crate::term::Term;
use crate::theory::Theory;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::rc::Rc;

/// Structural representation of a mock sort.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SortRepr {
    Simple(SortKind),
    Bv(u32),
    Fp(u32, u32),
    Parametric(SortKind, Vec<usize>),
    Uninterpreted(String, u32),
}

impl SortRepr {
    fn kind(&self) -> SortKind {
        match self {
            SortRepr::Simple(k) | SortRepr::Parametric(k, _) => *k,
            SortRepr::Bv(_) => SortKind::Bv,
            SortRepr::Fp(_, _) => SortKind::Fp,
            SortRepr::Uninterpreted(_, _) => SortKind::Any,
        }
    }
}

/// Structural representation of a mock term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TermRepr {
    Const { sort: usize, symbol: String },
    Var { sort: usize, symbol: String },
    ValueBool { value: bool },
    ValueStr { sort: usize, lit: String },
    ValueRational { num: String, den: String },
    ValueBv { sort: usize, bits: String },
    Special { sort: usize, value: SpecialValue },
    App { kind: OpKind, args: Vec<usize>, indices: Vec<u32> },
}

#[derive(Debug)]
struct SortEntry {
    repr: SortRepr,
}

#[derive(Debug)]
struct TermEntry {
    repr: TermRepr,
    sort: usize,
}

#[derive(Debug)]
struct MockSortHandle {
    idx: usize,
    kind: SortKind,
    bv_size: u32,
    fp_exp: u32,
    fp_sig: u32,
}

impl SortHandle for MockSortHandle {
    fn equals(&self, other: &dyn SortHandle) -> bool {
        other
            .as_any()
            .downcast_ref::<MockSortHandle>()
            .is_some_and(|o| o.idx == self.idx)
    }

    fn hash_value(&self) -> u64 {
        self.idx as u64
    }

    fn kind(&self) -> SortKind {
        self.kind
    }

    fn bv_size(&self) -> u32 {
        self.bv_size
    }

    fn fp_exp_size(&self) -> u32 {
        self.fp_exp
    }

    fn fp_sig_size(&self) -> u32 {
        self.fp_sig
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
struct MockTermHandle {
    idx: usize,
}

impl TermHandle for MockTermHandle {
    fn equals(&self, other: &dyn TermHandle) -> bool {
        other
            .as_any()
            .downcast_ref::<MockTermHandle>()
            .is_some_and(|o| o.idx == self.idx)
    }

    fn hash_value(&self) -> u64 {
        self.idx as u64
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The option table matching this back-end's declared option names.
#[must_use]
pub fn default_options() -> crate::options::OptionTable {
    use crate::options::{OptionTable, SolverOption};
    OptionTable::with_options(vec![
        SolverOption::boolean("incremental", false),
        SolverOption::boolean("produce-models", false),
        SolverOption::boolean("produce-unsat-cores", false),
        SolverOption::boolean("produce-unsat-assumptions", false),
        SolverOption::int("verbosity", 0, 3, 0),
        SolverOption::mode("sat-engine", &["cdcl", "lookahead", "walk"], "cdcl"),
    ])
}

/// The deterministic in-memory back-end.
#[derive(Debug, Default)]
pub struct MockSolver {
    initialized: bool,
    sorts: Vec<SortEntry>,
    sort_lookup: FxHashMap<SortRepr, usize>,
    terms: Vec<TermEntry>,
    term_lookup: FxHashMap<TermRepr, usize>,
    options: FxHashMap<String, String>,
    incremental: bool,
    model_gen: bool,
    unsat_cores: bool,
    unsat_assumptions: bool,
    /// Assertion frames; index 0 is the base level.
    assertion_frames: Vec<Vec<usize>>,
    last_assumptions: Vec<usize>,
    last_result: Option<SolveResult>,
    num_checks: usize,
}

impl MockSolver {
    /// Create an uninitialised back-end.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn require_init(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(FuzzerError::backend("solver not initialized"))
        }
    }

    fn intern_sort(&mut self, repr: SortRepr) -> usize {
        if let Some(idx) = self.sort_lookup.get(&repr) {
            return *idx;
        }
        let idx = self.sorts.len();
        self.sorts.push(SortEntry { repr: repr.clone() });
        self.sort_lookup.insert(repr, idx);
        idx
    }

    fn intern_term(&mut self, repr: TermRepr, sort: usize) -> usize {
        if let Some(idx) = self.term_lookup.get(&repr) {
            return *idx;
        }
        let idx = self.terms.len();
        self.terms.push(TermEntry {
            repr: repr.clone(),
            sort,
        });
        self.term_lookup.insert(repr, idx);
        idx
    }

    fn sort_handle(&self, idx: usize) -> Rc<dyn SortHandle> {
        let repr = &self.sorts[idx].repr;
        let (bv, exp, sig) = match repr {
            SortRepr::Bv(w) => (*w, 0, 0),
            SortRepr::Fp(e, s) => (0, *e, *s),
            _ => (0, 0, 0),
        };
        Rc::new(MockSortHandle {
            idx,
            kind: repr.kind(),
            bv_size: bv,
            fp_exp: exp,
            fp_sig: sig,
        })
    }

    fn term_handle(idx: usize) -> Rc<dyn TermHandle> {
        Rc::new(MockTermHandle { idx })
    }

    fn sort_idx(sort: &Sort) -> Result<usize> {
        sort.handle()
            .as_any()
            .downcast_ref::<MockSortHandle>()
            .map(|h| h.idx)
            .ok_or_else(|| FuzzerError::backend("foreign sort handle"))
    }

    fn term_idx(term: &Term) -> Result<usize> {
        term.handle()
            .as_any()
            .downcast_ref::<MockTermHandle>()
            .map(|h| h.idx)
            .ok_or_else(|| FuzzerError::backend("foreign term handle"))
    }

    fn kind_of(&self, sort: usize) -> SortKind {
        self.sorts[sort].repr.kind()
    }

    fn bv_width(&self, sort: usize) -> Result<u32> {
        match self.sorts[sort].repr {
            SortRepr::Bv(w) => Ok(w),
            _ => Err(FuzzerError::backend("expected bit-vector sort")),
        }
    }

    fn params_of(&self, sort: usize) -> Result<Vec<usize>> {
        match &self.sorts[sort].repr {
            SortRepr::Parametric(_, params) => Ok(params.clone()),
            _ => Err(FuzzerError::backend("expected parametric sort")),
        }
    }

    fn simple_sort(&mut self, kind: SortKind) -> usize {
        self.intern_sort(SortRepr::Simple(kind))
    }

    fn expect_kind(&self, sort: usize, kind: SortKind, what: &str) -> Result<()> {
        if self.kind_of(sort) == kind {
            Ok(())
        } else {
            Err(FuzzerError::backend(format!(
                "{what}: expected {kind} argument, got {}",
                self.kind_of(sort)
            )))
        }
    }

    fn expect_same(&self, sorts: &[usize], what: &str) -> Result<()> {
        if sorts.windows(2).all(|w| w[0] == w[1]) {
            Ok(())
        } else {
            Err(FuzzerError::backend(format!("{what}: mismatched argument sorts")))
        }
    }

    fn expect_arity(args: usize, want: usize, what: &str) -> Result<()> {
        if args == want {
            Ok(())
        } else {
            Err(FuzzerError::backend(format!(
                "{what}: expected {want} arguments, got {args}"
            )))
        }
    }

    fn expect_min_arity(args: usize, min: usize, what: &str) -> Result<()> {
        if args >= min {
            Ok(())
        } else {
            Err(FuzzerError::backend(format!(
                "{what}: expected at least {min} arguments, got {args}"
            )))
        }
    }

    /// Compute the result sort of an application, validating the
    /// argument sorts against SMT-LIB typing rules.
    #[allow(clippy::too_many_lines)]
    fn typecheck(
        &mut self,
        kind: OpKind,
        args: &[usize],
        arg_sorts: &[usize],
        indices: &[u32],
    ) -> Result<usize> {
        use OpKind::*;
        let what = kind.as_str();
        let n = arg_sorts.len();
        match kind {
            Equal | Distinct => {
                Self::expect_min_arity(n, 2, what)?;
                self.expect_same(arg_sorts, what)?;
                Ok(self.simple_sort(SortKind::Bool))
            }
            Ite => {
                Self::expect_arity(n, 3, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Bool, what)?;
                self.expect_same(&arg_sorts[1..], what)?;
                Ok(arg_sorts[1])
            }
            And | Or | Xor | Implies => {
                Self::expect_min_arity(n, 2, what)?;
                for s in arg_sorts {
                    self.expect_kind(*s, SortKind::Bool, what)?;
                }
                Ok(self.simple_sort(SortKind::Bool))
            }
            Not => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Bool, what)?;
                Ok(self.simple_sort(SortKind::Bool))
            }
            UfApply => {
                Self::expect_min_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Fun, what)?;
                let params = self.params_of(arg_sorts[0])?;
                Self::expect_arity(n - 1, params.len() - 1, what)?;
                for (arg, dom) in arg_sorts[1..].iter().zip(&params) {
                    if arg != dom {
                        return Err(FuzzerError::backend(format!(
                            "{what}: argument sort does not match function domain"
                        )));
                    }
                }
                Ok(*params.last().unwrap_or(&arg_sorts[0]))
            }
            Forall | Exists => {
                Self::expect_arity(n, 2, what)?;
                match self.terms[args[0]].repr {
                    TermRepr::Var { .. } => {}
                    _ => {
                        return Err(FuzzerError::backend(format!(
                            "{what}: first argument must be a bound variable"
                        )))
                    }
                }
                self.expect_kind(arg_sorts[1], SortKind::Bool, what)?;
                Ok(self.simple_sort(SortKind::Bool))
            }
            ArraySelect => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Array, what)?;
                let params = self.params_of(arg_sorts[0])?;
                if arg_sorts[1] != params[0] {
                    return Err(FuzzerError::backend(format!("{what}: index sort mismatch")));
                }
                Ok(params[1])
            }
            ArrayStore => {
                Self::expect_arity(n, 3, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Array, what)?;
                let params = self.params_of(arg_sorts[0])?;
                if arg_sorts[1] != params[0] || arg_sorts[2] != params[1] {
                    return Err(FuzzerError::backend(format!(
                        "{what}: index or element sort mismatch"
                    )));
                }
                Ok(arg_sorts[0])
            }
            BvExtract => {
                Self::expect_arity(n, 1, what)?;
                if indices.len() != 2 {
                    return Err(FuzzerError::backend(format!("{what}: expected 2 indices")));
                }
                let w = self.bv_width(arg_sorts[0])?;
                let (hi, lo) = (indices[0], indices[1]);
                if lo > hi || hi >= w {
                    return Err(FuzzerError::backend(format!(
                        "{what}: indices [{hi}:{lo}] out of range for width {w}"
                    )));
                }
                Ok(self.intern_sort(SortRepr::Bv(hi - lo + 1)))
            }
            BvRepeat => {
                Self::expect_arity(n, 1, what)?;
                if indices.len() != 1 {
                    return Err(FuzzerError::backend(format!("{what}: expected 1 index")));
                }
                let w = self.bv_width(arg_sorts[0])?;
                let times = indices[0];
                if times == 0 {
                    return Err(FuzzerError::backend(format!("{what}: zero repeat count")));
                }
                Ok(self.intern_sort(SortRepr::Bv(w * times)))
            }
            BvRotateLeft | BvRotateRight => {
                Self::expect_arity(n, 1, what)?;
                let w = self.bv_width(arg_sorts[0])?;
                Ok(self.intern_sort(SortRepr::Bv(w)))
            }
            BvSignExtend | BvZeroExtend => {
                Self::expect_arity(n, 1, what)?;
                if indices.len() != 1 {
                    return Err(FuzzerError::backend(format!("{what}: expected 1 index")));
                }
                let w = self.bv_width(arg_sorts[0])?;
                Ok(self.intern_sort(SortRepr::Bv(w + indices[0])))
            }
            BvConcat => {
                Self::expect_min_arity(n, 2, what)?;
                let mut total = 0;
                for s in arg_sorts {
                    total += self.bv_width(*s)?;
                }
                Ok(self.intern_sort(SortRepr::Bv(total)))
            }
            BvAdd | BvMul | BvAnd | BvOr | BvXor => {
                Self::expect_min_arity(n, 2, what)?;
                self.bv_width(arg_sorts[0])?;
                self.expect_same(arg_sorts, what)?;
                Ok(arg_sorts[0])
            }
            BvNot | BvNeg | BvInc | BvDec => {
                Self::expect_arity(n, 1, what)?;
                self.bv_width(arg_sorts[0])?;
                Ok(arg_sorts[0])
            }
            BvRedand | BvRedor | BvRedxor => {
                Self::expect_arity(n, 1, what)?;
                self.bv_width(arg_sorts[0])?;
                Ok(self.intern_sort(SortRepr::Bv(1)))
            }
            BvNand | BvNor | BvXnor | BvSub | BvUdiv | BvUrem | BvSdiv | BvSrem | BvSmod
            | BvShl | BvLshr | BvAshr => {
                Self::expect_arity(n, 2, what)?;
                self.bv_width(arg_sorts[0])?;
                self.expect_same(arg_sorts, what)?;
                Ok(arg_sorts[0])
            }
            BvComp => {
                Self::expect_arity(n, 2, what)?;
                self.bv_width(arg_sorts[0])?;
                self.expect_same(arg_sorts, what)?;
                Ok(self.intern_sort(SortRepr::Bv(1)))
            }
            BvUlt | BvUle | BvUgt | BvUge | BvSlt | BvSle | BvSgt | BvSge | BvUaddo | BvSaddo
            | BvUsubo | BvSsubo | BvUmulo | BvSmulo | BvSdivo => {
                Self::expect_arity(n, 2, what)?;
                self.bv_width(arg_sorts[0])?;
                self.expect_same(arg_sorts, what)?;
                Ok(self.simple_sort(SortKind::Bool))
            }
            IntNeg | IntAbs => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Int, what)?;
                Ok(arg_sorts[0])
            }
            IntAdd | IntSub | IntMul | IntDiv => {
                Self::expect_min_arity(n, 2, what)?;
                for s in arg_sorts {
                    self.expect_kind(*s, SortKind::Int, what)?;
                }
                Ok(arg_sorts[0])
            }
            IntMod => {
                Self::expect_arity(n, 2, what)?;
                for s in arg_sorts {
                    self.expect_kind(*s, SortKind::Int, what)?;
                }
                Ok(arg_sorts[0])
            }
            IntLt | IntLe | IntGt | IntGe => {
                Self::expect_arity(n, 2, what)?;
                for s in arg_sorts {
                    self.expect_kind(*s, SortKind::Int, what)?;
                }
                Ok(self.simple_sort(SortKind::Bool))
            }
            IntToReal => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Int, what)?;
                Ok(self.simple_sort(SortKind::Real))
            }
            RealNeg => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Real, what)?;
                Ok(arg_sorts[0])
            }
            RealAdd | RealSub | RealMul | RealDiv => {
                Self::expect_min_arity(n, 2, what)?;
                for s in arg_sorts {
                    self.expect_kind(*s, SortKind::Real, what)?;
                }
                Ok(arg_sorts[0])
            }
            RealLt | RealLe | RealGt | RealGe => {
                Self::expect_arity(n, 2, what)?;
                for s in arg_sorts {
                    self.expect_kind(*s, SortKind::Real, what)?;
                }
                Ok(self.simple_sort(SortKind::Bool))
            }
            RealIsInt => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Real, what)?;
                Ok(self.simple_sort(SortKind::Bool))
            }
            RealToInt => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Real, what)?;
                Ok(self.simple_sort(SortKind::Int))
            }
            FpAbs | FpNeg => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Fp, what)?;
                Ok(arg_sorts[0])
            }
            FpAdd | FpSub | FpMul | FpDiv => {
                Self::expect_arity(n, 3, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Rm, what)?;
                self.expect_kind(arg_sorts[1], SortKind::Fp, what)?;
                self.expect_same(&arg_sorts[1..], what)?;
                Ok(arg_sorts[1])
            }
            FpFma => {
                Self::expect_arity(n, 4, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Rm, what)?;
                self.expect_kind(arg_sorts[1], SortKind::Fp, what)?;
                self.expect_same(&arg_sorts[1..], what)?;
                Ok(arg_sorts[1])
            }
            FpSqrt | FpRti => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Rm, what)?;
                self.expect_kind(arg_sorts[1], SortKind::Fp, what)?;
                Ok(arg_sorts[1])
            }
            FpRem | FpMin | FpMax => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Fp, what)?;
                self.expect_same(arg_sorts, what)?;
                Ok(arg_sorts[0])
            }
            FpEq | FpLeq | FpLt | FpGeq | FpGt => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Fp, what)?;
                self.expect_same(arg_sorts, what)?;
                Ok(self.simple_sort(SortKind::Bool))
            }
            FpIsNormal | FpIsSubnormal | FpIsZero | FpIsInf | FpIsNan | FpIsNeg | FpIsPos => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Fp, what)?;
                Ok(self.simple_sort(SortKind::Bool))
            }
            StrConcat => {
                Self::expect_min_arity(n, 2, what)?;
                for s in arg_sorts {
                    self.expect_kind(*s, SortKind::String, what)?;
                }
                Ok(arg_sorts[0])
            }
            StrLen => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::String, what)?;
                Ok(self.simple_sort(SortKind::Int))
            }
            StrAt => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[0], SortKind::String, what)?;
                self.expect_kind(arg_sorts[1], SortKind::Int, what)?;
                Ok(arg_sorts[0])
            }
            StrSubstr => {
                Self::expect_arity(n, 3, what)?;
                self.expect_kind(arg_sorts[0], SortKind::String, what)?;
                self.expect_kind(arg_sorts[1], SortKind::Int, what)?;
                self.expect_kind(arg_sorts[2], SortKind::Int, what)?;
                Ok(arg_sorts[0])
            }
            StrContains | StrPrefixof | StrSuffixof => {
                Self::expect_arity(n, 2, what)?;
                for s in arg_sorts {
                    self.expect_kind(*s, SortKind::String, what)?;
                }
                Ok(self.simple_sort(SortKind::Bool))
            }
            StrIndexof => {
                Self::expect_arity(n, 3, what)?;
                self.expect_kind(arg_sorts[0], SortKind::String, what)?;
                self.expect_kind(arg_sorts[1], SortKind::String, what)?;
                self.expect_kind(arg_sorts[2], SortKind::Int, what)?;
                Ok(self.simple_sort(SortKind::Int))
            }
            StrReplace | StrReplaceAll => {
                Self::expect_arity(n, 3, what)?;
                for s in arg_sorts {
                    self.expect_kind(*s, SortKind::String, what)?;
                }
                Ok(arg_sorts[0])
            }
            StrToRe => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::String, what)?;
                Ok(self.simple_sort(SortKind::Reglan))
            }
            StrInRe => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[0], SortKind::String, what)?;
                self.expect_kind(arg_sorts[1], SortKind::Reglan, what)?;
                Ok(self.simple_sort(SortKind::Bool))
            }
            ReConcat | ReUnion | ReInter => {
                Self::expect_min_arity(n, 2, what)?;
                for s in arg_sorts {
                    self.expect_kind(*s, SortKind::Reglan, what)?;
                }
                Ok(arg_sorts[0])
            }
            ReStar | RePlus | ReOpt | ReComp => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Reglan, what)?;
                Ok(arg_sorts[0])
            }
            SeqUnit => {
                Self::expect_arity(n, 1, what)?;
                Ok(self.intern_sort(SortRepr::Parametric(SortKind::Seq, vec![arg_sorts[0]])))
            }
            SeqLen => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Seq, what)?;
                Ok(self.simple_sort(SortKind::Int))
            }
            SeqConcat => {
                Self::expect_min_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Seq, what)?;
                self.expect_same(arg_sorts, what)?;
                Ok(arg_sorts[0])
            }
            SeqAt | SeqNth => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Seq, what)?;
                self.expect_kind(arg_sorts[1], SortKind::Int, what)?;
                if kind == SeqAt {
                    Ok(arg_sorts[0])
                } else {
                    Ok(self.params_of(arg_sorts[0])?[0])
                }
            }
            SeqContains | SeqPrefixof | SeqSuffixof => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Seq, what)?;
                self.expect_same(arg_sorts, what)?;
                Ok(self.simple_sort(SortKind::Bool))
            }
            SeqReplace => {
                Self::expect_arity(n, 3, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Seq, what)?;
                self.expect_same(arg_sorts, what)?;
                Ok(arg_sorts[0])
            }
            SeqRev => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Seq, what)?;
                Ok(arg_sorts[0])
            }
            SetSingleton => {
                Self::expect_arity(n, 1, what)?;
                Ok(self.intern_sort(SortRepr::Parametric(SortKind::Set, vec![arg_sorts[0]])))
            }
            SetUnion | SetInter => {
                Self::expect_min_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Set, what)?;
                self.expect_same(arg_sorts, what)?;
                Ok(arg_sorts[0])
            }
            SetMinus => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Set, what)?;
                self.expect_same(arg_sorts, what)?;
                Ok(arg_sorts[0])
            }
            SetMember => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[1], SortKind::Set, what)?;
                if self.params_of(arg_sorts[1])?[0] != arg_sorts[0] {
                    return Err(FuzzerError::backend(format!("{what}: element sort mismatch")));
                }
                Ok(self.simple_sort(SortKind::Bool))
            }
            SetSubset => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Set, what)?;
                self.expect_same(arg_sorts, what)?;
                Ok(self.simple_sort(SortKind::Bool))
            }
            SetInsert => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[1], SortKind::Set, what)?;
                if self.params_of(arg_sorts[1])?[0] != arg_sorts[0] {
                    return Err(FuzzerError::backend(format!("{what}: element sort mismatch")));
                }
                Ok(arg_sorts[1])
            }
            SetComplement => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Set, what)?;
                Ok(arg_sorts[0])
            }
            SetCard => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Set, what)?;
                Ok(self.simple_sort(SortKind::Int))
            }
            BagMake => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[1], SortKind::Int, what)?;
                Ok(self.intern_sort(SortRepr::Parametric(SortKind::Bag, vec![arg_sorts[0]])))
            }
            BagUnionMax | BagUnionDisjoint | BagInterMin | BagDifferenceSubtract
            | BagDifferenceRemove => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Bag, what)?;
                self.expect_same(arg_sorts, what)?;
                Ok(arg_sorts[0])
            }
            BagCount => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[1], SortKind::Bag, what)?;
                if self.params_of(arg_sorts[1])?[0] != arg_sorts[0] {
                    return Err(FuzzerError::backend(format!("{what}: element sort mismatch")));
                }
                Ok(self.simple_sort(SortKind::Int))
            }
            BagCard => {
                Self::expect_arity(n, 1, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Bag, what)?;
                Ok(self.simple_sort(SortKind::Int))
            }
            BagSubbag => {
                Self::expect_arity(n, 2, what)?;
                self.expect_kind(arg_sorts[0], SortKind::Bag, what)?;
                self.expect_same(arg_sorts, what)?;
                Ok(self.simple_sort(SortKind::Bool))
            }
            Undefined => Err(FuzzerError::backend("undefined operator")),
        }
    }

    fn total_assertions(&self) -> usize {
        self.assertion_frames.iter().map(Vec::len).sum()
    }

    /// Deterministic verdict; cycles through all three results as the
    /// assertion state evolves.
    fn decide(&self, salt: usize) -> SolveResult {
        let n = self.total_assertions() * 5 + self.assertion_frames.len() * 3 + self.num_checks
            + salt;
        match n % 4 {
            0 | 3 => SolveResult::Sat,
            1 => SolveResult::Unsat,
            _ => SolveResult::Unknown,
        }
    }

    fn default_value(&mut self, sort: usize) -> Option<usize> {
        let repr = match &self.sorts[sort].repr {
            SortRepr::Simple(SortKind::Bool) => TermRepr::ValueBool { value: false },
            SortRepr::Simple(SortKind::Int) => TermRepr::ValueStr {
                sort,
                lit: "0".into(),
            },
            SortRepr::Simple(SortKind::Real) => TermRepr::ValueStr {
                sort,
                lit: "0.0".into(),
            },
            SortRepr::Simple(SortKind::String) => TermRepr::ValueStr {
                sort,
                lit: String::new(),
            },
            SortRepr::Simple(SortKind::Rm) => TermRepr::Special {
                sort,
                value: SpecialValue::RmRne,
            },
            SortRepr::Simple(SortKind::Reglan) => TermRepr::Special {
                sort,
                value: SpecialValue::ReNone,
            },
            SortRepr::Bv(w) => TermRepr::ValueBv {
                sort,
                bits: "0".repeat(*w as usize),
            },
            SortRepr::Fp(_, _) => TermRepr::Special {
                sort,
                value: SpecialValue::FpPosZero,
            },
            _ => return None,
        };
        Some(self.intern_term(repr, sort))
    }
}

impl Solver for MockSolver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn new_instance(&mut self) -> Result<()> {
        if self.initialized {
            return Err(FuzzerError::backend("solver already initialized"));
        }
        self.initialized = true;
        self.assertion_frames = vec![Vec::new()];
        Ok(())
    }

    fn delete_instance(&mut self) -> Result<()> {
        self.require_init()?;
        *self = Self::default();
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn supported_theories(&self) -> Vec<Theory> {
        Theory::ALL.to_vec()
    }

    fn unsupported_var_sort_kinds(&self) -> SortKindSet {
        let mut set = SortKindSet::default();
        set.insert(SortKind::Fun);
        set.insert(SortKind::Reglan);
        set
    }

    fn unsupported_op_kinds(&self) -> OpKindSet {
        OpKindSet::default()
    }

    fn option_incremental(&self) -> &'static str {
        "incremental"
    }

    fn option_model_gen(&self) -> &'static str {
        "produce-models"
    }

    fn option_unsat_cores(&self) -> &'static str {
        "produce-unsat-cores"
    }

    fn option_unsat_assumptions(&self) -> &'static str {
        "produce-unsat-assumptions"
    }

    fn is_incremental(&self) -> bool {
        self.incremental
    }

    fn is_model_gen(&self) -> bool {
        self.model_gen
    }

    fn is_unsat_cores(&self) -> bool {
        self.unsat_cores
    }

    fn is_unsat_assumptions(&self) -> bool {
        self.unsat_assumptions
    }

    fn set_opt(&mut self, name: &str, value: &str) -> Result<()> {
        self.require_init()?;
        let flag = match value {
            "true" => true,
            "false" => false,
            _ if name == self.option_incremental()
                || name == self.option_model_gen()
                || name == self.option_unsat_cores()
                || name == self.option_unsat_assumptions() =>
            {
                return Err(FuzzerError::backend(format!(
                    "option {name} expects a Boolean value, got {value}"
                )))
            }
            _ => false,
        };
        if name == self.option_incremental() {
            self.incremental = flag;
        } else if name == self.option_model_gen() {
            self.model_gen = flag;
        } else if name == self.option_unsat_cores() {
            self.unsat_cores = flag;
        } else if name == self.option_unsat_assumptions() {
            self.unsat_assumptions = flag;
        }
        self.options.insert(name.into(), value.into());
        Ok(())
    }

    fn mk_sort(&mut self, kind: SortKind) -> Result<Rc<dyn SortHandle>> {
        self.require_init()?;
        if !matches!(
            kind,
            SortKind::Bool
                | SortKind::Int
                | SortKind::Real
                | SortKind::String
                | SortKind::Reglan
                | SortKind::Rm
        ) {
            return Err(FuzzerError::backend(format!(
                "mk_sort: {kind} is not a simple sort kind"
            )));
        }
        let idx = self.simple_sort(kind);
        Ok(self.sort_handle(idx))
    }

    fn mk_sort_bv(&mut self, bw: u32) -> Result<Rc<dyn SortHandle>> {
        self.require_init()?;
        if bw == 0 {
            return Err(FuzzerError::backend("mk_sort_bv: zero width"));
        }
        let idx = self.intern_sort(SortRepr::Bv(bw));
        Ok(self.sort_handle(idx))
    }

    fn mk_sort_fp(&mut self, esize: u32, ssize: u32) -> Result<Rc<dyn SortHandle>> {
        self.require_init()?;
        if esize < 2 || ssize < 2 {
            return Err(FuzzerError::backend("mk_sort_fp: widths must be at least 2"));
        }
        let idx = self.intern_sort(SortRepr::Fp(esize, ssize));
        Ok(self.sort_handle(idx))
    }

    fn mk_sort_parametric(
        &mut self,
        kind: SortKind,
        params: &[Sort],
    ) -> Result<Rc<dyn SortHandle>> {
        self.require_init()?;
        let want = match kind {
            SortKind::Array => 2,
            SortKind::Seq | SortKind::Set | SortKind::Bag => 1,
            SortKind::Fun => {
                if params.len() < 2 {
                    return Err(FuzzerError::backend(
                        "mk_sort_parametric: function sorts need a domain and codomain",
                    ));
                }
                params.len()
            }
            _ => {
                return Err(FuzzerError::backend(format!(
                    "mk_sort_parametric: {kind} is not parametric"
                )))
            }
        };
        if params.len() != want {
            return Err(FuzzerError::backend(format!(
                "mk_sort_parametric: {kind} expects {want} parameters, got {}",
                params.len()
            )));
        }
        let mut idxs = Vec::with_capacity(params.len());
        for p in params {
            idxs.push(Self::sort_idx(p)?);
        }
        let idx = self.intern_sort(SortRepr::Parametric(kind, idxs));
        Ok(self.sort_handle(idx))
    }

    fn mk_sort_uninterpreted(&mut self, symbol: &str, arity: u32) -> Result<Rc<dyn SortHandle>> {
        self.require_init()?;
        let idx = self.intern_sort(SortRepr::Uninterpreted(symbol.into(), arity));
        Ok(self.sort_handle(idx))
    }

    fn mk_const(&mut self, sort: &Sort, symbol: &str) -> Result<Rc<dyn TermHandle>> {
        self.require_init()?;
        let sort = Self::sort_idx(sort)?;
        let idx = self.intern_term(
            TermRepr::Const {
                sort,
                symbol: symbol.into(),
            },
            sort,
        );
        Ok(Self::term_handle(idx))
    }

    fn mk_var(&mut self, sort: &Sort, symbol: &str) -> Result<Rc<dyn TermHandle>> {
        self.require_init()?;
        let sort = Self::sort_idx(sort)?;
        let idx = self.intern_term(
            TermRepr::Var {
                sort,
                symbol: symbol.into(),
            },
            sort,
        );
        Ok(Self::term_handle(idx))
    }

    fn mk_value_bool(&mut self, sort: &Sort, value: bool) -> Result<Rc<dyn TermHandle>> {
        self.require_init()?;
        let sort = Self::sort_idx(sort)?;
        if self.kind_of(sort) != SortKind::Bool {
            return Err(FuzzerError::backend("mk_value_bool: non-Boolean sort"));
        }
        let idx = self.intern_term(TermRepr::ValueBool { value }, sort);
        Ok(Self::term_handle(idx))
    }

    fn mk_value_str(&mut self, sort: &Sort, value: &str) -> Result<Rc<dyn TermHandle>> {
        self.require_init()?;
        let sort = Self::sort_idx(sort)?;
        if !matches!(
            self.kind_of(sort),
            SortKind::Int | SortKind::Real | SortKind::String
        ) {
            return Err(FuzzerError::backend("mk_value_str: unsupported sort"));
        }
        let idx = self.intern_term(
            TermRepr::ValueStr {
                sort,
                lit: value.into(),
            },
            sort,
        );
        Ok(Self::term_handle(idx))
    }

    fn mk_value_rational(
        &mut self,
        sort: &Sort,
        num: &str,
        den: &str,
    ) -> Result<Rc<dyn TermHandle>> {
        self.require_init()?;
        let sort = Self::sort_idx(sort)?;
        if self.kind_of(sort) != SortKind::Real {
            return Err(FuzzerError::backend("mk_value_rational: non-Real sort"));
        }
        if den.trim_start_matches('0').is_empty() {
            return Err(FuzzerError::backend("mk_value_rational: zero denominator"));
        }
        let idx = self.intern_term(
            TermRepr::ValueRational {
                num: num.into(),
                den: den.into(),
            },
            sort,
        );
        Ok(Self::term_handle(idx))
    }

    fn mk_value_bv(
        &mut self,
        sort: &Sort,
        value: &str,
        base: ValueBase,
    ) -> Result<Rc<dyn TermHandle>> {
        self.require_init()?;
        let sort = Self::sort_idx(sort)?;
        let w = self.bv_width(sort)? as usize;
        let bits = match base {
            ValueBase::Bin => value.to_string(),
            ValueBase::Dec => str_dec_to_bin(value),
            ValueBase::Hex => str_hex_to_bin(value),
        };
        let bits = bits.trim_start_matches('0');
        if bits.len() > w {
            return Err(FuzzerError::backend(format!(
                "mk_value_bv: value does not fit in {w} bits"
            )));
        }
        let mut padded = "0".repeat(w - bits.len());
        padded.push_str(bits);
        let idx = self.intern_term(TermRepr::ValueBv { sort, bits: padded }, sort);
        Ok(Self::term_handle(idx))
    }

    fn mk_special_value(
        &mut self,
        sort: &Sort,
        value: SpecialValue,
    ) -> Result<Rc<dyn TermHandle>> {
        self.require_init()?;
        let sort_idx = Self::sort_idx(sort)?;
        let kind = self.kind_of(sort_idx);
        if !SpecialValue::for_sort_kind(kind).contains(&value) {
            return Err(FuzzerError::backend(format!(
                "mk_special_value: {value} not admitted by {kind}"
            )));
        }
        // BV special values canonicalise to their bit-string form so
        // `zero` and the literal 0 intern to the same term.
        let repr = if kind == SortKind::Bv {
            let w = self.bv_width(sort_idx)?;
            let bits = match value {
                SpecialValue::BvZero => crate::literals::bv_special_value_zero_str(w),
                SpecialValue::BvOne => crate::literals::bv_special_value_one_str(w),
                SpecialValue::BvOnes => crate::literals::bv_special_value_ones_str(w),
                SpecialValue::BvMinSigned => crate::literals::bv_special_value_min_signed_str(w),
                _ => crate::literals::bv_special_value_max_signed_str(w),
            };
            TermRepr::ValueBv {
                sort: sort_idx,
                bits,
            }
        } else {
            TermRepr::Special {
                sort: sort_idx,
                value,
            }
        };
        let idx = self.intern_term(repr, sort_idx);
        Ok(Self::term_handle(idx))
    }

    fn mk_term(
        &mut self,
        kind: OpKind,
        args: &[Term],
        indices: &[u32],
    ) -> Result<Rc<dyn TermHandle>> {
        self.require_init()?;
        let mut arg_idxs = Vec::with_capacity(args.len());
        for a in args {
            arg_idxs.push(Self::term_idx(a)?);
        }
        let arg_sorts: Vec<usize> = arg_idxs.iter().map(|i| self.terms[*i].sort).collect();
        let result_sort = self.typecheck(kind, &arg_idxs, &arg_sorts, indices)?;
        let idx = self.intern_term(
            TermRepr::App {
                kind,
                args: arg_idxs,
                indices: indices.to_vec(),
            },
            result_sort,
        );
        Ok(Self::term_handle(idx))
    }

    fn get_sort(
        &mut self,
        term: &Rc<dyn TermHandle>,
        expected: SortKind,
    ) -> Result<Rc<dyn SortHandle>> {
        self.require_init()?;
        let idx = term
            .as_any()
            .downcast_ref::<MockTermHandle>()
            .map(|h| h.idx)
            .ok_or_else(|| FuzzerError::backend("foreign term handle"))?;
        let sort = self.terms[idx].sort;
        let kind = self.kind_of(sort);
        if expected != SortKind::Any && kind != expected {
            return Err(FuzzerError::backend(format!(
                "get_sort: expected {expected}, term has sort {kind}"
            )));
        }
        Ok(self.sort_handle(sort))
    }

    fn assert_formula(&mut self, term: &Term) -> Result<()> {
        self.require_init()?;
        let idx = Self::term_idx(term)?;
        if self.kind_of(self.terms[idx].sort) != SortKind::Bool {
            return Err(FuzzerError::backend("assert: non-Boolean term"));
        }
        if let Some(frame) = self.assertion_frames.last_mut() {
            frame.push(idx);
        }
        self.last_result = None;
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SolveResult> {
        self.require_init()?;
        self.num_checks += 1;
        let res = self.decide(0);
        self.last_result = Some(res);
        self.last_assumptions.clear();
        Ok(res)
    }

    fn check_sat_assuming(&mut self, assumptions: &[Term]) -> Result<SolveResult> {
        self.require_init()?;
        if assumptions.is_empty() {
            return Err(FuzzerError::backend("check_sat_assuming: no assumptions"));
        }
        self.num_checks += 1;
        let mut idxs = Vec::with_capacity(assumptions.len());
        for a in assumptions {
            let idx = Self::term_idx(a)?;
            if self.kind_of(self.terms[idx].sort) != SortKind::Bool {
                return Err(FuzzerError::backend(
                    "check_sat_assuming: non-Boolean assumption",
                ));
            }
            idxs.push(idx);
        }
        let res = self.decide(assumptions.len());
        self.last_result = Some(res);
        self.last_assumptions = if res == SolveResult::Unsat { idxs } else { Vec::new() };
        Ok(res)
    }

    fn get_unsat_assumptions(&mut self) -> Result<Vec<Rc<dyn TermHandle>>> {
        self.require_init()?;
        if !self.unsat_assumptions {
            return Err(FuzzerError::backend("unsat assumptions not enabled"));
        }
        if self.last_result != Some(SolveResult::Unsat) {
            return Err(FuzzerError::backend("last result is not unsat"));
        }
        Ok(self
            .last_assumptions
            .iter()
            .map(|i| Self::term_handle(*i))
            .collect())
    }

    fn check_unsat_assumption(&mut self, term: &Term) -> Result<bool> {
        self.require_init()?;
        let idx = Self::term_idx(term)?;
        Ok(self.last_assumptions.contains(&idx))
    }

    fn get_value(&mut self, terms: &[Term]) -> Result<Vec<Rc<dyn TermHandle>>> {
        self.require_init()?;
        if !self.model_gen {
            return Err(FuzzerError::backend("model generation not enabled"));
        }
        if self.last_result != Some(SolveResult::Sat) {
            return Err(FuzzerError::backend("last result is not sat"));
        }
        let mut out = Vec::with_capacity(terms.len());
        for t in terms {
            let idx = Self::term_idx(t)?;
            let value = match self.terms[idx].repr {
                TermRepr::ValueBool { .. }
                | TermRepr::ValueStr { .. }
                | TermRepr::ValueRational { .. }
                | TermRepr::ValueBv { .. }
                | TermRepr::Special { .. } => idx,
                _ => {
                    let sort = self.terms[idx].sort;
                    self.default_value(sort).unwrap_or(idx)
                }
            };
            out.push(Self::term_handle(value));
        }
        Ok(out)
    }

    fn push(&mut self, n: u32) -> Result<()> {
        self.require_init()?;
        if !self.incremental {
            return Err(FuzzerError::backend("push: not incremental"));
        }
        for _ in 0..n {
            self.assertion_frames.push(Vec::new());
        }
        Ok(())
    }

    fn pop(&mut self, n: u32) -> Result<()> {
        self.require_init()?;
        if !self.incremental {
            return Err(FuzzerError::backend("pop: not incremental"));
        }
        if n as usize >= self.assertion_frames.len() {
            return Err(FuzzerError::backend("pop: not enough levels"));
        }
        for _ in 0..n {
            self.assertion_frames.pop();
        }
        self.last_result = None;
        Ok(())
    }

    fn print_model(&mut self) -> Result<String> {
        self.require_init()?;
        if !self.model_gen {
            return Err(FuzzerError::backend("model generation not enabled"));
        }
        if self.last_result != Some(SolveResult::Sat) {
            return Err(FuzzerError::backend("last result is not sat"));
        }
        Ok(format!(
            "(model ; {} assertions over {} terms)",
            self.total_assertions(),
            self.terms.len()
        ))
    }

    fn reset_assertions(&mut self) -> Result<()> {
        self.require_init()?;
        self.assertion_frames = vec![Vec::new()];
        self.last_result = None;
        self.last_assumptions.clear();
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        *self = Self::default();
        Ok(())
    }

    fn reset_sat(&mut self) {
        self.last_result = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::LeafKind;
    use smallvec::SmallVec;

    fn wrap_sort(handle: Rc<dyn SortHandle>) -> Sort {
        Sort::new(handle)
    }

    fn wrap_term(handle: Rc<dyn TermHandle>, sort: Sort) -> Term {
        Term::leaf(handle, sort, LeafKind::Constant, None, SmallVec::new())
    }

    fn init() -> MockSolver {
        let mut s = MockSolver::new();
        s.new_instance().unwrap();
        s
    }

    #[test]
    fn test_sort_interning_is_structural() {
        let mut s = init();
        let a = s.mk_sort_bv(8).unwrap();
        let b = s.mk_sort_bv(8).unwrap();
        let c = s.mk_sort_bv(9).unwrap();
        assert!(a.equals(b.as_ref()));
        assert!(!a.equals(c.as_ref()));
        assert_eq!(a.hash_value(), b.hash_value());
    }

    #[test]
    fn test_mk_term_typechecks() {
        let mut s = init();
        let bv8 = wrap_sort(s.mk_sort_bv(8).unwrap());
        let boolean = wrap_sort(s.mk_sort(SortKind::Bool).unwrap());
        let x = wrap_term(s.mk_const(&bv8, "x").unwrap(), bv8.clone());
        let p = wrap_term(s.mk_const(&boolean, "p").unwrap(), boolean.clone());

        let sum = s.mk_term(OpKind::BvAdd, &[x.clone(), x.clone()], &[]);
        assert!(sum.is_ok());

        // Boolean argument to a BV operator is a type error.
        let bad = s.mk_term(OpKind::BvAdd, &[x.clone(), p.clone()], &[]);
        assert!(bad.is_err());

        // extract with out-of-range indices is rejected.
        let bad = s.mk_term(OpKind::BvExtract, &[x.clone()], &[8, 0]);
        assert!(bad.is_err());
        let ok = s.mk_term(OpKind::BvExtract, &[x], &[4, 1]);
        let sort = s.get_sort(&ok.unwrap(), SortKind::Bv).unwrap();
        assert_eq!(sort.bv_size(), 4);
    }

    #[test]
    fn test_special_value_aliases_literal() {
        let mut s = init();
        let bv4 = wrap_sort(s.mk_sort_bv(4).unwrap());
        let zero = s.mk_special_value(&bv4, SpecialValue::BvZero).unwrap();
        let lit = s.mk_value_bv(&bv4, "0000", ValueBase::Bin).unwrap();
        assert!(zero.equals(lit.as_ref()));
    }

    #[test]
    fn test_check_sat_deterministic() {
        let mut a = init();
        let mut b = init();
        for _ in 0..8 {
            assert_eq!(a.check_sat().unwrap(), b.check_sat().unwrap());
        }
    }

    #[test]
    fn test_push_pop_requires_incremental() {
        let mut s = init();
        assert!(s.push(1).is_err());
        s.set_opt("incremental", "true").unwrap();
        assert!(s.push(2).is_ok());
        assert!(s.pop(2).is_ok());
        assert!(s.pop(1).is_err());
    }

    #[test]
    fn test_reset_drops_everything() {
        let mut s = init();
        s.set_opt("incremental", "true").unwrap();
        let _ = s.mk_sort_bv(8).unwrap();
        s.reset().unwrap();
        assert!(!s.is_initialized());
        // a fresh instance starts from an empty intern table
        s.new_instance().unwrap();
        let h = s.mk_sort_bv(8).unwrap();
        assert_eq!(h.hash_value(), 0);
        assert!(!s.is_incremental());
    }

    #[test]
    fn test_get_value_gated_on_model_gen() {
        let mut s = init();
        let boolean = wrap_sort(s.mk_sort(SortKind::Bool).unwrap());
        let p = wrap_term(s.mk_const(&boolean, "p").unwrap(), boolean.clone());
        assert!(s.get_value(&[p]).is_err());
    }
}
