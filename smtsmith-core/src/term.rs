//! Term value objects.
//!
//! A [`Term`] wraps a back-end term handle plus the metadata the typed
//! database indexes on: the owning [`Sort`], a leaf tag, the push-level
//! set of its free constants, and the ids of any bound variables it
//! references. Equality is back-end equality and identical sort.

use crate::solver::{SpecialValue, TermHandle};
use crate::sort::Sort;
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Leaf classification of a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LeafKind {
    /// Not a leaf (built by an operator).
    #[default]
    None,
    /// A value (literal or special).
    Value,
    /// A free constant (input).
    Constant,
    /// A quantifier-bound variable.
    Variable,
}

/// Sorted set of push levels, small in practice.
pub type LevelSet = SmallVec<[u32; 2]>;
/// Sorted set of referenced bound-variable ids.
pub type VarSet = SmallVec<[u64; 2]>;

struct TermData {
    /// Nonzero once registered in the term database.
    id: Cell<u64>,
    sort: Sort,
    leaf: LeafKind,
    special: Option<SpecialValue>,
    /// Push levels of every free constant this term references, sorted.
    levels: LevelSet,
    /// Ids of bound variables this term references, sorted.
    ///
    /// A variable leaf references itself, so this is populated when the
    /// id is assigned.
    vars: RefCell<VarSet>,
    handle: Rc<dyn TermHandle>,
}

/// A back-end-agnostic term with identity.
#[derive(Clone)]
pub struct Term(Rc<TermData>);

impl Term {
    /// Wrap a back-end handle as a non-leaf term.
    #[must_use]
    pub fn new(handle: Rc<dyn TermHandle>, sort: Sort, levels: LevelSet, vars: VarSet) -> Self {
        Self(Rc::new(TermData {
            id: Cell::new(0),
            sort,
            leaf: LeafKind::None,
            special: None,
            levels,
            vars: RefCell::new(vars),
            handle,
        }))
    }

    /// Wrap a back-end handle as a leaf term.
    #[must_use]
    pub fn leaf(
        handle: Rc<dyn TermHandle>,
        sort: Sort,
        leaf: LeafKind,
        special: Option<SpecialValue>,
        levels: LevelSet,
    ) -> Self {
        Self(Rc::new(TermData {
            id: Cell::new(0),
            sort,
            leaf,
            special,
            levels,
            vars: RefCell::new(SmallVec::new()),
            handle,
        }))
    }

    /// The database id; zero until registered.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0.id.get()
    }

    pub(crate) fn set_id(&self, id: u64) {
        self.0.id.set(id);
        if self.0.leaf == LeafKind::Variable {
            self.0.vars.borrow_mut().push(id);
        }
    }

    /// The owning sort.
    #[must_use]
    pub fn sort(&self) -> &Sort {
        &self.0.sort
    }

    /// Leaf classification.
    #[must_use]
    pub fn leaf_kind(&self) -> LeafKind {
        self.0.leaf
    }

    /// Special-value tag, for values built from one.
    #[must_use]
    pub fn special_value(&self) -> Option<SpecialValue> {
        self.0.special
    }

    /// Push levels of the free constants this term references.
    #[must_use]
    pub fn levels(&self) -> &LevelSet {
        &self.0.levels
    }

    /// Highest push level this term depends on (0 for ground terms).
    #[must_use]
    pub fn max_level(&self) -> u32 {
        self.0.levels.last().copied().unwrap_or(0)
    }

    /// Ids of the bound variables this term references.
    #[must_use]
    pub fn var_ids(&self) -> VarSet {
        self.0.vars.borrow().clone()
    }

    /// True if this term references no bound variable.
    #[must_use]
    pub fn is_var_free(&self) -> bool {
        self.0.vars.borrow().is_empty()
    }

    /// True if this term references the bound variable with id `var_id`.
    #[must_use]
    pub fn references_var(&self, var_id: u64) -> bool {
        self.0.vars.borrow().binary_search(&var_id).is_ok()
    }

    /// The back-end's opaque handle.
    #[must_use]
    pub fn handle(&self) -> &Rc<dyn TermHandle> {
        &self.0.handle
    }

    /// Union two sorted level sets.
    #[must_use]
    pub fn union_levels(a: &LevelSet, b: &LevelSet) -> LevelSet {
        let mut out: LevelSet = a.clone();
        for lvl in b {
            if let Err(pos) = out.binary_search(lvl) {
                out.insert(pos, *lvl);
            }
        }
        out
    }

    /// Union two sorted variable-id sets.
    #[must_use]
    pub fn union_vars(a: &VarSet, b: &VarSet) -> VarSet {
        let mut out: VarSet = a.clone();
        for v in b {
            if let Err(pos) = out.binary_search(v) {
                out.insert(pos, *v);
            }
        }
        out
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.0.handle.equals(other.0.handle.as_ref()) && self.0.sort == other.0.sort
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.handle.hash_value());
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Term")
            .field("id", &self.id())
            .field("sort", &self.0.sort.kind())
            .field("leaf", &self.0.leaf)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.id())
    }
}
