//! Sort value objects.
//!
//! A [`Sort`] wraps a back-end's opaque sort handle together with the
//! engine-side metadata the generator needs: a stable id assigned at
//! interning, the sort kind, and parameter sorts for containers. Equality
//! and hashing delegate to the back-end's structural contract, so two
//! handles denoting the same SMT sort collapse to one interned object.

use crate::solver::SortHandle;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// The kind of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SortKind {
    /// Booleans.
    Bool,
    /// Fixed-width bit-vectors.
    Bv,
    /// Unbounded integers.
    Int,
    /// Reals.
    Real,
    /// IEEE-754 floating-point numbers.
    Fp,
    /// Floating-point rounding modes.
    Rm,
    /// Unicode strings.
    String,
    /// Regular languages over strings.
    Reglan,
    /// Arrays (index sort, element sort).
    Array,
    /// Multisets (element sort).
    Bag,
    /// Sequences (element sort).
    Seq,
    /// Finite sets (element sort).
    Set,
    /// Uninterpreted functions (domain sorts, codomain sort).
    Fun,
    /// Sentinel: unconstrained. Never stored for a registered sort.
    Any,
}

impl SortKind {
    /// All concrete sort kinds, in canonical order (excludes [`SortKind::Any`]).
    pub const ALL: &'static [SortKind] = &[
        SortKind::Bool,
        SortKind::Bv,
        SortKind::Int,
        SortKind::Real,
        SortKind::Fp,
        SortKind::Rm,
        SortKind::String,
        SortKind::Reglan,
        SortKind::Array,
        SortKind::Bag,
        SortKind::Seq,
        SortKind::Set,
        SortKind::Fun,
    ];

    /// Stable uppercase name, used as the trace token.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortKind::Bool => "BOOL",
            SortKind::Bv => "BV",
            SortKind::Int => "INT",
            SortKind::Real => "REAL",
            SortKind::Fp => "FP",
            SortKind::Rm => "RM",
            SortKind::String => "STRING",
            SortKind::Reglan => "REGLAN",
            SortKind::Array => "ARRAY",
            SortKind::Bag => "BAG",
            SortKind::Seq => "SEQ",
            SortKind::Set => "SET",
            SortKind::Fun => "FUN",
            SortKind::Any => "ANY",
        }
    }

    /// Parse a trace token as printed by [`SortKind::as_str`].
    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        SortKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .or((s == "ANY").then_some(SortKind::Any))
    }

    /// True for kinds parameterised by other sorts.
    #[must_use]
    pub fn is_parametric(self) -> bool {
        matches!(
            self,
            SortKind::Array | SortKind::Bag | SortKind::Seq | SortKind::Set | SortKind::Fun
        )
    }
}

impl fmt::Display for SortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct SortData {
    /// Nonzero once interned by the solver manager.
    id: Cell<u64>,
    /// Concrete kind; promoted in place when the handle reported `Any`.
    kind: Cell<SortKind>,
    /// True once a `mk-sort` action has put this sort's id on a
    /// `return` line. Only traced sorts may be referenced by sort
    /// tokens in later trace lines, or replay could not resolve them.
    traced: Cell<bool>,
    /// Parameter sorts; backfilled for implicit-element operators.
    params: RefCell<Vec<Sort>>,
    handle: Rc<dyn SortHandle>,
}

/// A back-end-agnostic sort with identity.
#[derive(Clone)]
pub struct Sort(Rc<SortData>);

impl Sort {
    /// Wrap a back-end handle. The kind is taken from the handle.
    #[must_use]
    pub fn new(handle: Rc<dyn SortHandle>) -> Self {
        let kind = handle.kind();
        Self(Rc::new(SortData {
            id: Cell::new(0),
            kind: Cell::new(kind),
            traced: Cell::new(false),
            params: RefCell::new(Vec::new()),
            handle,
        }))
    }

    /// Wrap a back-end handle with known parameter sorts.
    #[must_use]
    pub fn with_params(handle: Rc<dyn SortHandle>, params: Vec<Sort>) -> Self {
        let sort = Self::new(handle);
        *sort.0.params.borrow_mut() = params;
        sort
    }

    /// The interned id; zero until registered.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0.id.get()
    }

    pub(crate) fn set_id(&self, id: u64) {
        self.0.id.set(id);
    }

    /// The sort kind.
    #[must_use]
    pub fn kind(&self) -> SortKind {
        self.0.kind.get()
    }

    pub(crate) fn set_kind(&self, kind: SortKind) {
        self.0.kind.set(kind);
    }

    /// True once this sort's id has appeared on a `return` line.
    #[must_use]
    pub fn is_traced(&self) -> bool {
        self.0.traced.get()
    }

    pub(crate) fn set_traced(&self) {
        self.0.traced.set(true);
    }

    /// Parameter sorts (element/index/domain sorts), possibly empty.
    #[must_use]
    pub fn param_sorts(&self) -> Vec<Sort> {
        self.0.params.borrow().clone()
    }

    pub(crate) fn set_param_sorts(&self, params: Vec<Sort>) {
        *self.0.params.borrow_mut() = params;
    }

    /// Bit-vector width; zero for non-BV sorts.
    #[must_use]
    pub fn bv_size(&self) -> u32 {
        self.0.handle.bv_size()
    }

    /// Floating-point exponent width; zero for non-FP sorts.
    #[must_use]
    pub fn fp_exp_size(&self) -> u32 {
        self.0.handle.fp_exp_size()
    }

    /// Floating-point significand width; zero for non-FP sorts.
    #[must_use]
    pub fn fp_sig_size(&self) -> u32 {
        self.0.handle.fp_sig_size()
    }

    /// The back-end's opaque handle.
    #[must_use]
    pub fn handle(&self) -> &Rc<dyn SortHandle> {
        &self.0.handle
    }

    /// True if this is the Boolean sort.
    #[must_use]
    pub fn is_bool(&self) -> bool {
        self.kind() == SortKind::Bool
    }
}

impl PartialEq for Sort {
    fn eq(&self, other: &Self) -> bool {
        self.0.handle.equals(other.0.handle.as_ref())
    }
}

impl Eq for Sort {}

impl Hash for Sort {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.handle.hash_value());
    }
}

impl fmt::Debug for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sort")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.id())
    }
}
