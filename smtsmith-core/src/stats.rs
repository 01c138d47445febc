//! Run statistics.
//!
//! Counters over one generator run, serialisable for the CLI's JSON
//! summary. Constructed fresh per driver; there is no global state.

use rustc_hash::FxHashMap;
use serde::Serialize;

/// Counters collected while the FSM runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    /// Successful action executions, by action id.
    pub actions: FxHashMap<String, u64>,
    /// Terms built, by operator token.
    pub ops: FxHashMap<String, u64>,
    /// Satisfiability results seen, by result name.
    pub results: FxHashMap<String, u64>,
    /// States entered, by state id.
    pub states: FxHashMap<String, u64>,
    /// Total sorts registered.
    pub sorts: u64,
    /// Total terms registered.
    pub terms: u64,
    /// Total steps the FSM consumed.
    pub steps: u64,
}

impl Statistics {
    /// Fresh, all-zero statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one successful execution of `action`.
    pub fn count_action(&mut self, action: &str) {
        *self.actions.entry(action.into()).or_insert(0) += 1;
    }

    /// Count one term built with `op`.
    pub fn count_op(&mut self, op: &str) {
        *self.ops.entry(op.into()).or_insert(0) += 1;
    }

    /// Count one satisfiability result.
    pub fn count_result(&mut self, result: &str) {
        *self.results.entry(result.into()).or_insert(0) += 1;
    }

    /// Count one state entry.
    pub fn count_state(&mut self, state: &str) {
        *self.states.entry(state.into()).or_insert(0) += 1;
    }

    /// Total successful action executions.
    #[must_use]
    pub fn total_actions(&self) -> u64 {
        self.actions.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let mut stats = Statistics::new();
        stats.count_action("mk-term");
        stats.count_action("mk-term");
        stats.count_action("assert");
        assert_eq!(stats.actions["mk-term"], 2);
        assert_eq!(stats.total_actions(), 3);
    }
}
