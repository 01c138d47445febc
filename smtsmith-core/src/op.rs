//! Operator catalog.
//!
//! [`OpKind`] names every operator the generator can emit; [`OpData`]
//! records its arity, index count, result sort kind, per-position argument
//! sort kinds, and owning theory. [`OpCatalog`] is built once per solver
//! instance from the enabled theories minus the back-end's unsupported
//! set, and validates the descriptor table at construction time.

use crate::config::{MK_TERM_N_ARGS, MK_TERM_N_ARGS_BIN};
use crate::error::{FuzzerError, Result};
use crate::sort::SortKind;
use crate::theory::Theory;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::{smallvec, SmallVec};
use std::fmt;

macro_rules! op_kinds {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Every operator the engine knows about.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum OpKind {
            $(
                #[doc = concat!("The `", $name, "` operator.")]
                $variant,
            )+
        }

        impl OpKind {
            /// All operator kinds, in declaration order.
            pub const ALL: &'static [OpKind] = &[$(OpKind::$variant),+];

            /// Stable trace token for this operator.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(OpKind::$variant => $name,)+
                }
            }

            /// Parse a trace token as printed by [`OpKind::as_str`].
            #[must_use]
            pub fn from_str_opt(s: &str) -> Option<Self> {
                match s {
                    $($name => Some(OpKind::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

op_kinds! {
    Undefined => "undefined",

    Distinct => "distinct",
    Equal => "equal",
    Ite => "ite",

    And => "and",
    Implies => "implies",
    Not => "not",
    Or => "or",
    Xor => "xor",

    UfApply => "apply-uf",

    Forall => "forall",
    Exists => "exists",

    ArraySelect => "array-select",
    ArrayStore => "array-store",

    BvExtract => "bv-extract",
    BvRepeat => "bv-repeat",
    BvRotateLeft => "bv-rotate-left",
    BvRotateRight => "bv-rotate-right",
    BvSignExtend => "bv-sign-extend",
    BvZeroExtend => "bv-zero-extend",

    BvAdd => "bv-add",
    BvAnd => "bv-and",
    BvAshr => "bv-ashr",
    BvComp => "bv-comp",
    BvConcat => "bv-concat",
    BvDec => "bv-dec",
    BvInc => "bv-inc",
    BvLshr => "bv-lshr",
    BvMul => "bv-mul",
    BvNand => "bv-nand",
    BvNeg => "bv-neg",
    BvNor => "bv-nor",
    BvNot => "bv-not",
    BvOr => "bv-or",
    BvRedand => "bv-redand",
    BvRedor => "bv-redor",
    BvRedxor => "bv-redxor",
    BvSaddo => "bv-saddo",
    BvSdiv => "bv-sdiv",
    BvSdivo => "bv-sdivo",
    BvSge => "bv-sge",
    BvSgt => "bv-sgt",
    BvShl => "bv-shl",
    BvSle => "bv-sle",
    BvSlt => "bv-slt",
    BvSmod => "bv-smod",
    BvSmulo => "bv-smulo",
    BvSrem => "bv-srem",
    BvSsubo => "bv-ssubo",
    BvSub => "bv-sub",
    BvUaddo => "bv-uaddo",
    BvUdiv => "bv-udiv",
    BvUge => "bv-uge",
    BvUgt => "bv-ugt",
    BvUle => "bv-ule",
    BvUlt => "bv-ult",
    BvUmulo => "bv-umulo",
    BvUrem => "bv-urem",
    BvUsubo => "bv-usubo",
    BvXnor => "bv-xnor",
    BvXor => "bv-xor",

    IntAbs => "int-abs",
    IntAdd => "int-add",
    IntDiv => "int-div",
    IntGe => "int-ge",
    IntGt => "int-gt",
    IntLe => "int-le",
    IntLt => "int-lt",
    IntMod => "int-mod",
    IntMul => "int-mul",
    IntNeg => "int-neg",
    IntSub => "int-sub",
    IntToReal => "int-to-real",

    RealAdd => "real-add",
    RealDiv => "real-div",
    RealGe => "real-ge",
    RealGt => "real-gt",
    RealIsInt => "real-is-int",
    RealLe => "real-le",
    RealLt => "real-lt",
    RealMul => "real-mul",
    RealNeg => "real-neg",
    RealSub => "real-sub",
    RealToInt => "real-to-int",

    FpAbs => "fp-abs",
    FpAdd => "fp-add",
    FpDiv => "fp-div",
    FpEq => "fp-eq",
    FpFma => "fp-fma",
    FpGeq => "fp-geq",
    FpGt => "fp-gt",
    FpIsInf => "fp-is-inf",
    FpIsNan => "fp-is-nan",
    FpIsNeg => "fp-is-neg",
    FpIsNormal => "fp-is-normal",
    FpIsPos => "fp-is-pos",
    FpIsSubnormal => "fp-is-subnormal",
    FpIsZero => "fp-is-zero",
    FpLeq => "fp-leq",
    FpLt => "fp-lt",
    FpMax => "fp-max",
    FpMin => "fp-min",
    FpMul => "fp-mul",
    FpNeg => "fp-neg",
    FpRem => "fp-rem",
    FpRti => "fp-rti",
    FpSqrt => "fp-sqrt",
    FpSub => "fp-sub",

    StrAt => "str-at",
    StrConcat => "str-concat",
    StrContains => "str-contains",
    StrInRe => "str-in-re",
    StrIndexof => "str-indexof",
    StrLen => "str-len",
    StrPrefixof => "str-prefixof",
    StrReplace => "str-replace",
    StrReplaceAll => "str-replace-all",
    StrSubstr => "str-substr",
    StrSuffixof => "str-suffixof",
    StrToRe => "str-to-re",

    ReComp => "re-comp",
    ReConcat => "re-concat",
    ReInter => "re-inter",
    ReOpt => "re-opt",
    RePlus => "re-plus",
    ReStar => "re-star",
    ReUnion => "re-union",

    SeqAt => "seq-at",
    SeqConcat => "seq-concat",
    SeqContains => "seq-contains",
    SeqLen => "seq-len",
    SeqNth => "seq-nth",
    SeqPrefixof => "seq-prefixof",
    SeqReplace => "seq-replace",
    SeqRev => "seq-rev",
    SeqSuffixof => "seq-suffixof",
    SeqUnit => "seq-unit",

    SetCard => "set-card",
    SetComplement => "set-complement",
    SetInsert => "set-insert",
    SetInter => "set-inter",
    SetMember => "set-member",
    SetMinus => "set-minus",
    SetSingleton => "set-singleton",
    SetSubset => "set-subset",
    SetUnion => "set-union",

    BagCard => "bag-card",
    BagCount => "bag-count",
    BagDifferenceRemove => "bag-difference-remove",
    BagDifferenceSubtract => "bag-difference-subtract",
    BagInterMin => "bag-inter-min",
    BagMake => "bag-make",
    BagSubbag => "bag-subbag",
    BagUnionDisjoint => "bag-union-disjoint",
    BagUnionMax => "bag-union-max",
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OpKind {
    /// True for the quantifier builders, which bypass the availability cache.
    #[must_use]
    pub fn is_quantifier(self) -> bool {
        matches!(self, OpKind::Forall | OpKind::Exists)
    }
}

/// Set of operator kinds.
pub type OpKindSet = FxHashSet<OpKind>;

/// Per-position argument descriptor; the last entry repeats for
/// variadic tails.
pub type ArgKinds = SmallVec<[SortKind; 4]>;

/// Everything the generator needs to know about one operator.
#[derive(Debug, Clone)]
pub struct OpData {
    /// The operator.
    pub kind: OpKind,
    /// Fixed arity (`>= 0`), or `-1` for "at least one", `-2` for
    /// "at least two".
    pub arity: i32,
    /// Number of integer indices (e.g. 2 for `extract`).
    pub nindices: u32,
    /// Result sort kind; [`SortKind::Any`] when derived from the
    /// arguments.
    pub sort_kind: SortKind,
    /// Argument sort kinds by position.
    pub arg_kinds: ArgKinds,
    /// The theory this operator belongs to.
    pub theory: Theory,
}

impl OpData {
    /// Argument sort kind at position `i` (the tail repeats).
    #[must_use]
    pub fn arg_sort_kind(&self, i: usize) -> SortKind {
        let last = self.arg_kinds.len() - 1;
        self.arg_kinds[i.min(last)]
    }

    /// Distinct argument sort kinds of this operator.
    #[must_use]
    pub fn distinct_arg_kinds(&self) -> ArgKinds {
        let mut out = ArgKinds::new();
        for k in &self.arg_kinds {
            if !out.contains(k) {
                out.push(*k);
            }
        }
        out
    }
}

/// The theory a sort kind belongs to; `None` for [`SortKind::Any`].
#[must_use]
pub fn sort_kind_theory(kind: SortKind) -> Option<Theory> {
    match kind {
        SortKind::Bool => Some(Theory::Bool),
        SortKind::Bv => Some(Theory::Bv),
        SortKind::Int => Some(Theory::Int),
        SortKind::Real => Some(Theory::Real),
        SortKind::Fp | SortKind::Rm => Some(Theory::Fp),
        SortKind::String | SortKind::Reglan => Some(Theory::String),
        SortKind::Array => Some(Theory::Array),
        SortKind::Bag => Some(Theory::Bag),
        SortKind::Seq => Some(Theory::Seq),
        SortKind::Set => Some(Theory::Set),
        SortKind::Fun => Some(Theory::Uf),
        SortKind::Any => None,
    }
}

/// Operators that must take a rounding-mode first argument.
const RM_FIRST_ARG_OPS: &[OpKind] = &[
    OpKind::FpAdd,
    OpKind::FpSub,
    OpKind::FpMul,
    OpKind::FpDiv,
    OpKind::FpFma,
    OpKind::FpSqrt,
    OpKind::FpRti,
];

/// Non-linear arithmetic operators, excluded in linear mode.
const NONLINEAR_OPS: &[OpKind] = &[
    OpKind::IntMul,
    OpKind::IntDiv,
    OpKind::IntMod,
    OpKind::RealMul,
    OpKind::RealDiv,
];

/// The table of every operator with its typing constraints.
#[derive(Debug)]
pub struct OpCatalog {
    ops: FxHashMap<OpKind, OpData>,
    /// Kinds in deterministic declaration order, for reproducible walks.
    order: Vec<OpKind>,
}

impl OpCatalog {
    /// Build the catalog for the given theory set.
    ///
    /// `linear` excludes non-linear arithmetic operators; `unsupported`
    /// is the back-end's rejection set. Fails if a descriptor violates
    /// its own constraints.
    pub fn new(enabled: &FxHashSet<Theory>, linear: bool, unsupported: &OpKindSet) -> Result<Self> {
        let mut catalog = Self {
            ops: FxHashMap::default(),
            order: Vec::new(),
        };
        for data in default_op_table() {
            if unsupported.contains(&data.kind) {
                continue;
            }
            if linear && NONLINEAR_OPS.contains(&data.kind) {
                continue;
            }
            if !enabled.contains(&data.theory) {
                continue;
            }
            // Every sort kind the operator touches must come from an
            // enabled theory, or terms of that sort could never exist.
            let mut kinds: Vec<SortKind> = data.arg_kinds.to_vec();
            kinds.push(data.sort_kind);
            let usable = kinds
                .iter()
                .all(|k| sort_kind_theory(*k).map_or(true, |t| enabled.contains(&t)));
            if usable {
                catalog.add_op(data)?;
            }
        }
        Ok(catalog)
    }

    /// Insert one operator descriptor, validating its constraints.
    ///
    /// Back-ends use this from `configure_opmgr` to register
    /// solver-specific operators.
    pub fn add_op(&mut self, data: OpData) -> Result<()> {
        if data.arg_kinds.is_empty() && data.arity != 0 {
            return Err(FuzzerError::Config(format!(
                "operator {} has no argument descriptor",
                data.kind
            )));
        }
        if data.arity >= 0 && data.arg_kinds.len() > 1 && data.arg_kinds.len() != data.arity as usize
        {
            return Err(FuzzerError::Config(format!(
                "operator {} declares {} argument kinds for arity {}",
                data.kind,
                data.arg_kinds.len(),
                data.arity
            )));
        }
        if data.arity < 0 && data.arity != MK_TERM_N_ARGS && data.arity != MK_TERM_N_ARGS_BIN {
            return Err(FuzzerError::Config(format!(
                "operator {} has invalid arity {}",
                data.kind, data.arity
            )));
        }
        if RM_FIRST_ARG_OPS.contains(&data.kind) && data.arg_kinds.first() != Some(&SortKind::Rm) {
            return Err(FuzzerError::Config(format!(
                "operator {} requires a rounding-mode first argument",
                data.kind
            )));
        }
        if self.ops.insert(data.kind, data.clone()).is_none() {
            self.order.push(data.kind);
        }
        Ok(())
    }

    /// All operators, in deterministic order.
    pub fn all_ops(&self) -> impl Iterator<Item = &OpData> {
        self.order.iter().map(|k| &self.ops[k])
    }

    /// Look up one operator.
    #[must_use]
    pub fn op(&self, kind: OpKind) -> Option<&OpData> {
        self.ops.get(&kind)
    }

    /// True if the catalog contains `kind`.
    #[must_use]
    pub fn contains(&self, kind: OpKind) -> bool {
        self.ops.contains_key(&kind)
    }

    /// Number of operators in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True if no operator survived filtering.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn op(
    kind: OpKind,
    arity: i32,
    nindices: u32,
    sort_kind: SortKind,
    arg_kinds: ArgKinds,
    theory: Theory,
) -> OpData {
    OpData {
        kind,
        arity,
        nindices,
        sort_kind,
        arg_kinds,
        theory,
    }
}

/// The built-in operator table.
#[allow(clippy::too_many_lines)]
fn default_op_table() -> Vec<OpData> {
    use OpKind::*;
    use SortKind::{Any, Array, Bag, Bool, Bv, Fp, Fun, Int, Real, Reglan, Rm, Seq, Set, String};
    use Theory as T;

    let n = MK_TERM_N_ARGS;
    let n2 = MK_TERM_N_ARGS_BIN;

    vec![
        op(Equal, n2, 0, Bool, smallvec![Any], T::Bool),
        op(Distinct, n2, 0, Bool, smallvec![Any], T::Bool),
        op(Ite, 3, 0, Any, smallvec![Bool, Any, Any], T::Bool),
        op(And, n2, 0, Bool, smallvec![Bool], T::Bool),
        op(Or, n2, 0, Bool, smallvec![Bool], T::Bool),
        op(Xor, n2, 0, Bool, smallvec![Bool], T::Bool),
        op(Implies, n2, 0, Bool, smallvec![Bool], T::Bool),
        op(Not, 1, 0, Bool, smallvec![Bool], T::Bool),
        op(UfApply, n2, 0, Any, smallvec![Fun, Any], T::Uf),
        op(Forall, 2, 0, Bool, smallvec![Any, Bool], T::Quant),
        op(Exists, 2, 0, Bool, smallvec![Any, Bool], T::Quant),
        op(ArraySelect, 2, 0, Any, smallvec![Array, Any], T::Array),
        op(ArrayStore, 3, 0, Array, smallvec![Array, Any, Any], T::Array),
        // Indexed bit-vector operators.
        op(BvExtract, 1, 2, Bv, smallvec![Bv], T::Bv),
        op(BvRepeat, 1, 1, Bv, smallvec![Bv], T::Bv),
        op(BvRotateLeft, 1, 1, Bv, smallvec![Bv], T::Bv),
        op(BvRotateRight, 1, 1, Bv, smallvec![Bv], T::Bv),
        op(BvSignExtend, 1, 1, Bv, smallvec![Bv], T::Bv),
        op(BvZeroExtend, 1, 1, Bv, smallvec![Bv], T::Bv),
        // Bit-vector operators.
        op(BvConcat, n2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvAdd, n2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvMul, n2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvAnd, n2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvOr, n2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvXor, n2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvNot, 1, 0, Bv, smallvec![Bv], T::Bv),
        op(BvNeg, 1, 0, Bv, smallvec![Bv], T::Bv),
        op(BvInc, 1, 0, Bv, smallvec![Bv], T::Bv),
        op(BvDec, 1, 0, Bv, smallvec![Bv], T::Bv),
        op(BvRedand, 1, 0, Bv, smallvec![Bv], T::Bv),
        op(BvRedor, 1, 0, Bv, smallvec![Bv], T::Bv),
        op(BvRedxor, 1, 0, Bv, smallvec![Bv], T::Bv),
        op(BvNand, 2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvNor, 2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvXnor, 2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvComp, 2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvSub, 2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvUdiv, 2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvUrem, 2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvSdiv, 2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvSrem, 2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvSmod, 2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvShl, 2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvLshr, 2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvAshr, 2, 0, Bv, smallvec![Bv], T::Bv),
        op(BvUlt, 2, 0, Bool, smallvec![Bv], T::Bv),
        op(BvUle, 2, 0, Bool, smallvec![Bv], T::Bv),
        op(BvUgt, 2, 0, Bool, smallvec![Bv], T::Bv),
        op(BvUge, 2, 0, Bool, smallvec![Bv], T::Bv),
        op(BvSlt, 2, 0, Bool, smallvec![Bv], T::Bv),
        op(BvSle, 2, 0, Bool, smallvec![Bv], T::Bv),
        op(BvSgt, 2, 0, Bool, smallvec![Bv], T::Bv),
        op(BvSge, 2, 0, Bool, smallvec![Bv], T::Bv),
        op(BvUaddo, 2, 0, Bool, smallvec![Bv], T::Bv),
        op(BvSaddo, 2, 0, Bool, smallvec![Bv], T::Bv),
        op(BvUsubo, 2, 0, Bool, smallvec![Bv], T::Bv),
        op(BvSsubo, 2, 0, Bool, smallvec![Bv], T::Bv),
        op(BvUmulo, 2, 0, Bool, smallvec![Bv], T::Bv),
        op(BvSmulo, 2, 0, Bool, smallvec![Bv], T::Bv),
        op(BvSdivo, 2, 0, Bool, smallvec![Bv], T::Bv),
        // Integer arithmetic.
        op(IntNeg, 1, 0, Int, smallvec![Int], T::Int),
        op(IntAbs, 1, 0, Int, smallvec![Int], T::Int),
        op(IntAdd, n2, 0, Int, smallvec![Int], T::Int),
        op(IntSub, n2, 0, Int, smallvec![Int], T::Int),
        op(IntMul, n2, 0, Int, smallvec![Int], T::Int),
        op(IntDiv, n2, 0, Int, smallvec![Int], T::Int),
        op(IntMod, 2, 0, Int, smallvec![Int], T::Int),
        op(IntLt, 2, 0, Bool, smallvec![Int], T::Int),
        op(IntLe, 2, 0, Bool, smallvec![Int], T::Int),
        op(IntGt, 2, 0, Bool, smallvec![Int], T::Int),
        op(IntGe, 2, 0, Bool, smallvec![Int], T::Int),
        op(IntToReal, 1, 0, Real, smallvec![Int], T::Int),
        // Real arithmetic.
        op(RealNeg, 1, 0, Real, smallvec![Real], T::Real),
        op(RealAdd, n2, 0, Real, smallvec![Real], T::Real),
        op(RealSub, n2, 0, Real, smallvec![Real], T::Real),
        op(RealMul, n2, 0, Real, smallvec![Real], T::Real),
        op(RealDiv, n2, 0, Real, smallvec![Real], T::Real),
        op(RealLt, 2, 0, Bool, smallvec![Real], T::Real),
        op(RealLe, 2, 0, Bool, smallvec![Real], T::Real),
        op(RealGt, 2, 0, Bool, smallvec![Real], T::Real),
        op(RealGe, 2, 0, Bool, smallvec![Real], T::Real),
        op(RealIsInt, 1, 0, Bool, smallvec![Real], T::Real),
        op(RealToInt, 1, 0, Int, smallvec![Real], T::Real),
        // Floating-point.
        op(FpAbs, 1, 0, Fp, smallvec![Fp], T::Fp),
        op(FpNeg, 1, 0, Fp, smallvec![Fp], T::Fp),
        op(FpAdd, 3, 0, Fp, smallvec![Rm, Fp, Fp], T::Fp),
        op(FpSub, 3, 0, Fp, smallvec![Rm, Fp, Fp], T::Fp),
        op(FpMul, 3, 0, Fp, smallvec![Rm, Fp, Fp], T::Fp),
        op(FpDiv, 3, 0, Fp, smallvec![Rm, Fp, Fp], T::Fp),
        op(FpFma, 4, 0, Fp, smallvec![Rm, Fp, Fp, Fp], T::Fp),
        op(FpSqrt, 2, 0, Fp, smallvec![Rm, Fp], T::Fp),
        op(FpRti, 2, 0, Fp, smallvec![Rm, Fp], T::Fp),
        op(FpRem, 2, 0, Fp, smallvec![Fp], T::Fp),
        op(FpMin, 2, 0, Fp, smallvec![Fp], T::Fp),
        op(FpMax, 2, 0, Fp, smallvec![Fp], T::Fp),
        op(FpEq, 2, 0, Bool, smallvec![Fp], T::Fp),
        op(FpLeq, 2, 0, Bool, smallvec![Fp], T::Fp),
        op(FpLt, 2, 0, Bool, smallvec![Fp], T::Fp),
        op(FpGeq, 2, 0, Bool, smallvec![Fp], T::Fp),
        op(FpGt, 2, 0, Bool, smallvec![Fp], T::Fp),
        op(FpIsNormal, 1, 0, Bool, smallvec![Fp], T::Fp),
        op(FpIsSubnormal, 1, 0, Bool, smallvec![Fp], T::Fp),
        op(FpIsZero, 1, 0, Bool, smallvec![Fp], T::Fp),
        op(FpIsInf, 1, 0, Bool, smallvec![Fp], T::Fp),
        op(FpIsNan, 1, 0, Bool, smallvec![Fp], T::Fp),
        op(FpIsNeg, 1, 0, Bool, smallvec![Fp], T::Fp),
        op(FpIsPos, 1, 0, Bool, smallvec![Fp], T::Fp),
        // Strings and regular languages.
        op(StrConcat, n2, 0, String, smallvec![String], T::String),
        op(StrLen, 1, 0, Int, smallvec![String], T::String),
        op(StrAt, 2, 0, String, smallvec![String, Int], T::String),
        op(StrSubstr, 3, 0, String, smallvec![String, Int, Int], T::String),
        op(StrContains, 2, 0, Bool, smallvec![String], T::String),
        op(StrPrefixof, 2, 0, Bool, smallvec![String], T::String),
        op(StrSuffixof, 2, 0, Bool, smallvec![String], T::String),
        op(StrIndexof, 3, 0, Int, smallvec![String, String, Int], T::String),
        op(StrReplace, 3, 0, String, smallvec![String], T::String),
        op(StrReplaceAll, 3, 0, String, smallvec![String], T::String),
        op(StrToRe, 1, 0, Reglan, smallvec![String], T::String),
        op(StrInRe, 2, 0, Bool, smallvec![String, Reglan], T::String),
        op(ReConcat, n2, 0, Reglan, smallvec![Reglan], T::String),
        op(ReUnion, n2, 0, Reglan, smallvec![Reglan], T::String),
        op(ReInter, n2, 0, Reglan, smallvec![Reglan], T::String),
        op(ReStar, 1, 0, Reglan, smallvec![Reglan], T::String),
        op(RePlus, 1, 0, Reglan, smallvec![Reglan], T::String),
        op(ReOpt, 1, 0, Reglan, smallvec![Reglan], T::String),
        op(ReComp, 1, 0, Reglan, smallvec![Reglan], T::String),
        // Sequences.
        op(SeqUnit, 1, 0, Seq, smallvec![Any], T::Seq),
        op(SeqLen, 1, 0, Int, smallvec![Seq], T::Seq),
        op(SeqConcat, n2, 0, Seq, smallvec![Seq], T::Seq),
        op(SeqAt, 2, 0, Seq, smallvec![Seq, Int], T::Seq),
        op(SeqNth, 2, 0, Any, smallvec![Seq, Int], T::Seq),
        op(SeqContains, 2, 0, Bool, smallvec![Seq], T::Seq),
        op(SeqPrefixof, 2, 0, Bool, smallvec![Seq], T::Seq),
        op(SeqSuffixof, 2, 0, Bool, smallvec![Seq], T::Seq),
        op(SeqReplace, 3, 0, Seq, smallvec![Seq], T::Seq),
        op(SeqRev, 1, 0, Seq, smallvec![Seq], T::Seq),
        // Sets.
        op(SetSingleton, 1, 0, Set, smallvec![Any], T::Set),
        op(SetUnion, n2, 0, Set, smallvec![Set], T::Set),
        op(SetInter, n2, 0, Set, smallvec![Set], T::Set),
        op(SetMinus, 2, 0, Set, smallvec![Set], T::Set),
        op(SetMember, 2, 0, Bool, smallvec![Any, Set], T::Set),
        op(SetSubset, 2, 0, Bool, smallvec![Set], T::Set),
        op(SetInsert, 2, 0, Set, smallvec![Any, Set], T::Set),
        op(SetComplement, 1, 0, Set, smallvec![Set], T::Set),
        op(SetCard, 1, 0, Int, smallvec![Set], T::Set),
        // Bags.
        op(BagMake, 2, 0, Bag, smallvec![Any, Int], T::Bag),
        op(BagUnionMax, 2, 0, Bag, smallvec![Bag], T::Bag),
        op(BagUnionDisjoint, 2, 0, Bag, smallvec![Bag], T::Bag),
        op(BagInterMin, 2, 0, Bag, smallvec![Bag], T::Bag),
        op(BagDifferenceSubtract, 2, 0, Bag, smallvec![Bag], T::Bag),
        op(BagDifferenceRemove, 2, 0, Bag, smallvec![Bag], T::Bag),
        op(BagCount, 2, 0, Int, smallvec![Any, Bag], T::Bag),
        op(BagCard, 1, 0, Int, smallvec![Bag], T::Bag),
        op(BagSubbag, 2, 0, Bool, smallvec![Bag], T::Bag),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theories(list: &[Theory]) -> FxHashSet<Theory> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_full_catalog_builds() {
        let enabled = theories(Theory::ALL);
        let catalog = OpCatalog::new(&enabled, false, &OpKindSet::default()).unwrap();
        assert!(catalog.contains(OpKind::BvAdd));
        assert!(catalog.contains(OpKind::FpFma));
        assert!(catalog.contains(OpKind::Forall));
        assert!(!catalog.contains(OpKind::Undefined));
    }

    #[test]
    fn test_theory_filtering() {
        let enabled = theories(&[Theory::Bool, Theory::Bv]);
        let catalog = OpCatalog::new(&enabled, false, &OpKindSet::default()).unwrap();
        assert!(catalog.contains(OpKind::BvAdd));
        assert!(catalog.contains(OpKind::Equal));
        assert!(!catalog.contains(OpKind::IntAdd));
        assert!(!catalog.contains(OpKind::Forall));
        // str-len produces Int terms, so it needs Int enabled too.
        let enabled = theories(&[Theory::Bool, Theory::String]);
        let catalog = OpCatalog::new(&enabled, false, &OpKindSet::default()).unwrap();
        assert!(catalog.contains(OpKind::StrConcat));
        assert!(!catalog.contains(OpKind::StrLen));
    }

    #[test]
    fn test_linear_mode_excludes_nonlinear() {
        let enabled = theories(&[Theory::Bool, Theory::Int, Theory::Real]);
        let catalog = OpCatalog::new(&enabled, true, &OpKindSet::default()).unwrap();
        assert!(catalog.contains(OpKind::IntAdd));
        assert!(!catalog.contains(OpKind::IntMul));
        assert!(!catalog.contains(OpKind::RealDiv));
    }

    #[test]
    fn test_unsupported_ops_excluded() {
        let enabled = theories(&[Theory::Bool, Theory::Bv]);
        let mut unsupported = OpKindSet::default();
        unsupported.insert(OpKind::BvSmod);
        let catalog = OpCatalog::new(&enabled, false, &unsupported).unwrap();
        assert!(!catalog.contains(OpKind::BvSmod));
        assert!(catalog.contains(OpKind::BvSrem));
    }

    #[test]
    fn test_arity_validation_rejects_mismatch() {
        let mut catalog = OpCatalog {
            ops: FxHashMap::default(),
            order: Vec::new(),
        };
        let bad = op(
            OpKind::FpAdd,
            3,
            0,
            SortKind::Fp,
            smallvec![SortKind::Fp, SortKind::Fp],
            Theory::Fp,
        );
        assert!(catalog.add_op(bad).is_err());
    }

    #[test]
    fn test_rm_first_arg_enforced() {
        let mut catalog = OpCatalog {
            ops: FxHashMap::default(),
            order: Vec::new(),
        };
        let bad = op(
            OpKind::FpSqrt,
            2,
            0,
            SortKind::Fp,
            smallvec![SortKind::Fp, SortKind::Fp],
            Theory::Fp,
        );
        assert!(catalog.add_op(bad).is_err());
    }

    #[test]
    fn test_trace_token_roundtrip() {
        for kind in OpKind::ALL {
            assert_eq!(OpKind::from_str_opt(kind.as_str()), Some(*kind));
        }
    }
}
