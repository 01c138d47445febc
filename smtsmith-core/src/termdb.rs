//! The typed term database.
//!
//! Every sort and term the back-end has ever produced is interned here
//! with a stable id. Terms are bucketed by sort kind and sort, ordered by
//! id inside each bucket, so uniform picks replay identically. Visibility
//! is scoped: a term is offered only while its highest referenced push
//! level is still on the stack, and terms referencing bound variables are
//! segregated from the ordinary pick paths.

use crate::rng::RngState;
use crate::sort::{Sort, SortKind};
use crate::term::{LeafKind, Term};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Multi-indexed store of live sorts and terms.
#[derive(Debug, Default)]
pub struct TermDb {
    /// Interned sorts in registration order.
    sorts: Vec<Sort>,
    sorts_by_kind: FxHashMap<SortKind, Vec<Sort>>,
    sort_intern: FxHashMap<Sort, Sort>,
    /// Term buckets: kind, then sort, then id order.
    terms: FxHashMap<SortKind, FxHashMap<Sort, BTreeMap<u64, Term>>>,
    term_intern: FxHashMap<Term, Term>,
    /// Open bound variables, by id.
    vars: BTreeMap<u64, Term>,
    cur_level: u32,
    next_sort_id: u64,
    next_term_id: u64,
}

impl TermDb {
    /// Empty database at push level 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_sort_id: 1,
            next_term_id: 1,
            ..Self::default()
        }
    }

    /// Drop everything, as after `delete`/`reset`. Id reuse across
    /// resets is allowed; within one run it is not.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Current push level.
    #[must_use]
    pub fn cur_level(&self) -> u32 {
        self.cur_level
    }

    /// Record `n` pushed levels.
    pub fn push_levels(&mut self, n: u32) {
        self.cur_level += n;
    }

    /// Record `n` popped levels. Terms above the new level become
    /// hidden but are not deleted, so the id space stays stable.
    pub fn pop_levels(&mut self, n: u32) {
        debug_assert!(n <= self.cur_level);
        self.cur_level -= n;
    }

    // --- sorts ------------------------------------------------------

    /// Canonicalise a sort: the interned equal sort if one exists,
    /// otherwise the argument unchanged.
    #[must_use]
    pub fn find_sort(&self, sort: Sort) -> Sort {
        self.sort_intern.get(&sort).cloned().unwrap_or(sort)
    }

    /// Intern a sort, assigning an id on first registration.
    pub fn add_sort(&mut self, sort: Sort) -> Sort {
        if let Some(existing) = self.sort_intern.get(&sort) {
            return existing.clone();
        }
        sort.set_id(self.next_sort_id);
        self.next_sort_id += 1;
        self.sort_intern.insert(sort.clone(), sort.clone());
        self.sorts.push(sort.clone());
        self.sorts_by_kind
            .entry(sort.kind())
            .or_default()
            .push(sort.clone());
        sort
    }

    /// All registered sorts, in registration order.
    #[must_use]
    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    /// Number of registered sorts.
    #[must_use]
    pub fn num_sorts(&self) -> usize {
        self.sorts.len()
    }

    /// True if a sort of `kind` is registered.
    #[must_use]
    pub fn has_sort_of_kind(&self, kind: SortKind) -> bool {
        self.sorts_by_kind
            .get(&kind)
            .is_some_and(|v| !v.is_empty())
    }

    /// Pick a sort kind among those with a registered sort; with
    /// `with_terms`, only kinds with at least one visible term qualify.
    pub fn pick_sort_kind(&self, rng: &mut RngState, with_terms: bool) -> Option<SortKind> {
        let candidates: Vec<SortKind> = SortKind::ALL
            .iter()
            .copied()
            .filter(|k| {
                if with_terms {
                    self.has_term_of_kind(*k)
                } else {
                    self.has_sort_of_kind(*k)
                }
            })
            .collect();
        if candidates.is_empty() {
            None
        } else {
            Some(*rng.choose(&candidates))
        }
    }

    /// Pick a registered sort, optionally constrained by kind; with
    /// `with_terms`, only sorts with at least one visible term qualify.
    pub fn pick_sort(
        &self,
        rng: &mut RngState,
        kind: Option<SortKind>,
        with_terms: bool,
    ) -> Option<Sort> {
        let pool: Vec<&Sort> = match kind {
            Some(k) => self
                .sorts_by_kind
                .get(&k)
                .map(|v| v.iter().collect())
                .unwrap_or_default(),
            None => self.sorts.iter().collect(),
        };
        let candidates: Vec<&Sort> = pool
            .into_iter()
            .filter(|s| !with_terms || self.has_term_of_sort(s))
            .collect();
        if candidates.is_empty() {
            None
        } else {
            Some((*rng.choose(&candidates)).clone())
        }
    }

    // --- terms ------------------------------------------------------

    /// Canonicalise a term: the interned equal term if one exists,
    /// otherwise the argument unchanged.
    #[must_use]
    pub fn find(&self, term: Term) -> Term {
        self.term_intern.get(&term).cloned().unwrap_or(term)
    }

    /// Intern a term, assigning an id on first registration.
    ///
    /// Returns the canonical term and whether it was new. The term's
    /// sort must already be interned. Bound variables additionally enter
    /// the open-variable table.
    pub fn add(&mut self, term: Term) -> (Term, bool) {
        if let Some(existing) = self.term_intern.get(&term) {
            return (existing.clone(), false);
        }
        term.set_id(self.next_term_id);
        self.next_term_id += 1;
        self.term_intern.insert(term.clone(), term.clone());
        let sort = term.sort().clone();
        self.terms
            .entry(sort.kind())
            .or_default()
            .entry(sort)
            .or_default()
            .insert(term.id(), term.clone());
        if term.leaf_kind() == LeafKind::Variable {
            self.vars.insert(term.id(), term.clone());
        }
        (term, true)
    }

    /// Number of terms ever registered in this run.
    #[must_use]
    pub fn num_terms(&self) -> usize {
        self.term_intern.len()
    }

    fn visible(&self, term: &Term) -> bool {
        term.max_level() <= self.cur_level && term.is_var_free()
    }

    /// True if a visible, variable-free term of `kind` exists.
    #[must_use]
    pub fn has_term_of_kind(&self, kind: SortKind) -> bool {
        self.terms.get(&kind).is_some_and(|by_sort| {
            by_sort
                .values()
                .any(|bucket| bucket.values().any(|t| self.visible(t)))
        })
    }

    /// True if a visible, variable-free term of `sort` exists.
    #[must_use]
    pub fn has_term_of_sort(&self, sort: &Sort) -> bool {
        self.terms
            .get(&sort.kind())
            .and_then(|by_sort| by_sort.get(sort))
            .is_some_and(|bucket| bucket.values().any(|t| self.visible(t)))
    }

    /// True if every kind in `kinds` has a visible term.
    #[must_use]
    pub fn has_term_of_kinds(&self, kinds: &[SortKind]) -> bool {
        kinds.iter().all(|k| match k {
            SortKind::Any => self.has_term_any(),
            _ => self.has_term_of_kind(*k),
        })
    }

    /// True if any visible, variable-free term exists at all.
    #[must_use]
    pub fn has_term_any(&self) -> bool {
        SortKind::ALL.iter().any(|k| self.has_term_of_kind(*k))
    }

    /// Uniform pick among the visible, variable-free terms of `sort`.
    pub fn pick_term_of_sort(&self, rng: &mut RngState, sort: &Sort) -> Option<Term> {
        let bucket = self.terms.get(&sort.kind())?.get(sort)?;
        let candidates: Vec<&Term> = bucket.values().filter(|t| self.visible(t)).collect();
        if candidates.is_empty() {
            None
        } else {
            Some((*rng.choose(&candidates)).clone())
        }
    }

    /// Uniform pick among the visible, variable-free terms of `kind`.
    pub fn pick_term_of_kind(&self, rng: &mut RngState, kind: SortKind) -> Option<Term> {
        let by_sort = self.terms.get(&kind)?;
        let order = self.sorts_by_kind.get(&kind)?;
        let mut candidates: Vec<&Term> = Vec::new();
        for sort in order {
            if let Some(bucket) = by_sort.get(sort) {
                candidates.extend(bucket.values().filter(|t| self.visible(t)));
            }
        }
        if candidates.is_empty() {
            None
        } else {
            Some((*rng.choose(&candidates)).clone())
        }
    }

    /// Uniform pick among all visible, variable-free terms.
    pub fn pick_term_any(&self, rng: &mut RngState) -> Option<Term> {
        let kind = self.pick_sort_kind(rng, true)?;
        self.pick_term_of_kind(rng, kind)
    }

    /// Uniform pick among the visible values of `sort`.
    pub fn pick_value(&self, rng: &mut RngState, sort: &Sort) -> Option<Term> {
        let bucket = self.terms.get(&sort.kind())?.get(sort)?;
        let candidates: Vec<&Term> = bucket
            .values()
            .filter(|t| self.visible(t) && t.leaf_kind() == LeafKind::Value)
            .collect();
        if candidates.is_empty() {
            None
        } else {
            Some((*rng.choose(&candidates)).clone())
        }
    }

    // --- bound variables and quantifier bodies ----------------------

    /// Number of open bound variables.
    #[must_use]
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Uniform pick among the open bound variables.
    pub fn pick_var(&self, rng: &mut RngState) -> Option<Term> {
        rng.choose_iter(self.vars.values()).cloned()
    }

    /// Uniform pick among open bound variables of the given sort.
    pub fn pick_var_of_sort(&self, rng: &mut RngState, sort: &Sort) -> Option<Term> {
        let candidates: Vec<&Term> =
            self.vars.values().filter(|v| v.sort() == sort).collect();
        if candidates.is_empty() {
            None
        } else {
            Some((*rng.choose(&candidates)).clone())
        }
    }

    /// True if `id` names an open bound variable.
    #[must_use]
    pub fn is_open_var(&self, id: u64) -> bool {
        self.vars.contains_key(&id)
    }

    /// Candidate quantifier bodies: Boolean terms referencing at least
    /// one bound variable, visible at the current level.
    fn quant_bodies(&self) -> Vec<&Term> {
        let mut out = Vec::new();
        if let (Some(by_sort), Some(order)) = (
            self.terms.get(&SortKind::Bool),
            self.sorts_by_kind.get(&SortKind::Bool),
        ) {
            for sort in order {
                if let Some(bucket) = by_sort.get(sort) {
                    out.extend(bucket.values().filter(|t| {
                        !t.is_var_free() && t.max_level() <= self.cur_level
                    }));
                }
            }
        }
        out
    }

    /// True if a quantifier can currently be built.
    #[must_use]
    pub fn has_quant_body(&self) -> bool {
        !self.quant_bodies().is_empty()
    }

    /// Uniform pick among candidate quantifier bodies.
    pub fn pick_quant_body(&self, rng: &mut RngState) -> Option<Term> {
        let bodies = self.quant_bodies();
        if bodies.is_empty() {
            None
        } else {
            Some((*rng.choose(&bodies)).clone())
        }
    }

    /// Uniform pick among variable-referencing terms of `sort`
    /// (including the variables themselves), for growing quantifier
    /// bodies.
    pub fn pick_quant_term(&self, rng: &mut RngState, sort: &Sort) -> Option<Term> {
        let bucket = self.terms.get(&sort.kind())?.get(sort)?;
        let candidates: Vec<&Term> = bucket
            .values()
            .filter(|t| !t.is_var_free() && t.max_level() <= self.cur_level)
            .collect();
        if candidates.is_empty() {
            None
        } else {
            Some((*rng.choose(&candidates)).clone())
        }
    }

    /// Like [`TermDb::pick_quant_term`], constrained by kind instead of
    /// a concrete sort.
    pub fn pick_quant_term_of_kind(&self, rng: &mut RngState, kind: SortKind) -> Option<Term> {
        let by_sort = self.terms.get(&kind)?;
        let order = self.sorts_by_kind.get(&kind)?;
        let mut candidates: Vec<&Term> = Vec::new();
        for sort in order {
            if let Some(bucket) = by_sort.get(sort) {
                candidates.extend(
                    bucket
                        .values()
                        .filter(|t| !t.is_var_free() && t.max_level() <= self.cur_level),
                );
            }
        }
        if candidates.is_empty() {
            None
        } else {
            Some((*rng.choose(&candidates)).clone())
        }
    }

    /// The open bound variable with the given id.
    #[must_use]
    pub fn var_by_id(&self, id: u64) -> Option<Term> {
        self.vars.get(&id).cloned()
    }

    /// The registered sort with the given id.
    #[must_use]
    pub fn sort_by_id(&self, id: u64) -> Option<Sort> {
        self.sorts.iter().find(|s| s.id() == id).cloned()
    }

    /// The registered term with the given id (hidden terms included).
    #[must_use]
    pub fn term_by_id(&self, id: u64) -> Option<Term> {
        self.term_intern.values().find(|t| t.id() == id).cloned()
    }

    /// Remove a bound variable once its quantifier is closed, deleting
    /// every term that still references it.
    pub fn remove_var(&mut self, var: &Term) {
        let id = var.id();
        self.vars.remove(&id);
        for by_sort in self.terms.values_mut() {
            for bucket in by_sort.values_mut() {
                bucket.retain(|_, t| !t.references_var(id));
            }
        }
        self.term_intern.retain(|t, _| !t.references_var(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::mock::MockSolver;
    use crate::solver::Solver;
    use crate::term::{LevelSet, VarSet};
    use smallvec::smallvec;

    struct Fixture {
        solver: MockSolver,
        db: TermDb,
    }

    impl Fixture {
        fn new() -> Self {
            let mut solver = MockSolver::new();
            solver.new_instance().unwrap();
            Self {
                solver,
                db: TermDb::new(),
            }
        }

        fn bool_sort(&mut self) -> Sort {
            let h = self.solver.mk_sort(SortKind::Bool).unwrap();
            self.db.add_sort(Sort::new(h))
        }

        fn bv_sort(&mut self, w: u32) -> Sort {
            let h = self.solver.mk_sort_bv(w).unwrap();
            self.db.add_sort(Sort::new(h))
        }

        fn mk_const(&mut self, sort: &Sort, name: &str, levels: LevelSet) -> Term {
            let h = self.solver.mk_const(sort, name).unwrap();
            let t = Term::leaf(h, sort.clone(), LeafKind::Constant, None, levels);
            self.db.add(t).0
        }

        fn mk_var(&mut self, sort: &Sort, name: &str) -> Term {
            let h = self.solver.mk_var(sort, name).unwrap();
            let t = Term::leaf(h, sort.clone(), LeafKind::Variable, None, smallvec![]);
            self.db.add(t).0
        }
    }

    #[test]
    fn test_ids_are_stable_and_unique() {
        let mut fx = Fixture::new();
        let b = fx.bool_sort();
        let t1 = fx.mk_const(&b, "p", smallvec![]);
        let t2 = fx.mk_const(&b, "q", smallvec![]);
        assert_eq!(t1.id(), 1);
        assert_eq!(t2.id(), 2);
        // re-adding an equal term yields the canonical object
        let again = fx.mk_const(&b, "p", smallvec![]);
        assert_eq!(again.id(), 1);
        assert_eq!(fx.db.num_terms(), 2);
    }

    #[test]
    fn test_sort_interning_reuses_id() {
        let mut fx = Fixture::new();
        let a = fx.bv_sort(8);
        let b = fx.bv_sort(8);
        assert_eq!(a.id(), b.id());
        assert_eq!(fx.db.num_sorts(), 1);
    }

    #[test]
    fn test_scope_visibility() {
        let mut fx = Fixture::new();
        let b = fx.bool_sort();
        fx.db.push_levels(2);
        let scoped = fx.mk_const(&b, "c", smallvec![2]);
        assert!(fx.db.has_term_of_sort(&b));
        fx.db.pop_levels(2);
        assert!(!fx.db.has_term_of_sort(&b));
        let mut rng = RngState::new(1);
        assert!(fx.db.pick_term_of_sort(&mut rng, &b).is_none());
        // hidden, not deleted
        assert_eq!(fx.db.num_terms(), 1);
        assert_eq!(scoped.max_level(), 2);
    }

    #[test]
    fn test_vars_segregated_from_ordinary_picks() {
        let mut fx = Fixture::new();
        let b = fx.bool_sort();
        fx.mk_var(&b, "x");
        let mut rng = RngState::new(1);
        assert!(fx.db.pick_term_of_sort(&mut rng, &b).is_none());
        assert!(fx.db.pick_var(&mut rng).is_some());
    }

    #[test]
    fn test_remove_var_deletes_referencing_terms() {
        let mut fx = Fixture::new();
        let b = fx.bool_sort();
        let v = fx.mk_var(&b, "x");
        // a body referencing the variable
        let h = fx
            .solver
            .mk_term(crate::op::OpKind::Not, &[v.clone()], &[])
            .unwrap();
        let vars: VarSet = v.var_ids();
        let body = Term::new(h, b.clone(), smallvec![], vars);
        fx.db.add(body);
        assert!(fx.db.has_quant_body());
        fx.db.remove_var(&v);
        assert_eq!(fx.db.num_vars(), 0);
        assert!(!fx.db.has_quant_body());
        let mut rng = RngState::new(1);
        assert!(fx.db.pick_var(&mut rng).is_none());
    }

    #[test]
    fn test_pick_value_only_returns_values() {
        let mut fx = Fixture::new();
        let b = fx.bool_sort();
        fx.mk_const(&b, "p", smallvec![]);
        let mut rng = RngState::new(1);
        assert!(fx.db.pick_value(&mut rng, &b).is_none());
        let h = fx.solver.mk_value_bool(&b, true).unwrap();
        let val = Term::leaf(h, b.clone(), LeafKind::Value, None, smallvec![]);
        fx.db.add(val);
        let picked = fx.db.pick_value(&mut rng, &b).unwrap();
        assert_eq!(picked.leaf_kind(), LeafKind::Value);
    }

    #[test]
    fn test_clear_resets_ids() {
        let mut fx = Fixture::new();
        let b = fx.bool_sort();
        fx.mk_const(&b, "p", smallvec![]);
        fx.db.clear();
        assert_eq!(fx.db.num_terms(), 0);
        let b2 = fx.bool_sort();
        assert_eq!(b2.id(), 1);
    }
}
