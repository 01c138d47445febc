//! Solver option declarations and selection.
//!
//! Options are declared with a value domain, a default, the options they
//! conflict with, and the options they depend on. The table tracks which
//! options a run has already set and filters the candidate set so that
//! conflicting options are never both set and dependencies are set first.

use crate::rng::RngState;
use rustc_hash::FxHashSet;

/// The value domain of an option.
#[derive(Debug, Clone)]
pub enum OptionDomain {
    /// `true` / `false`.
    Bool,
    /// An inclusive integer range.
    Int {
        /// Lower bound.
        lo: i64,
        /// Upper bound.
        hi: i64,
    },
    /// One of a fixed list of modes.
    Mode(Vec<String>),
}

/// A single declared option.
#[derive(Debug, Clone)]
pub struct SolverOption {
    /// Option name as the back-end expects it.
    pub name: String,
    /// Value domain.
    pub domain: OptionDomain,
    /// Default value, used for reporting only.
    pub default: String,
    /// Names of options that must not be set together with this one.
    pub conflicts: FxHashSet<String>,
    /// Names of options that must be set before this one.
    pub depends: FxHashSet<String>,
}

impl SolverOption {
    /// Declare a Boolean option without conflicts or dependencies.
    #[must_use]
    pub fn boolean(name: &str, default: bool) -> Self {
        Self {
            name: name.into(),
            domain: OptionDomain::Bool,
            default: default.to_string(),
            conflicts: FxHashSet::default(),
            depends: FxHashSet::default(),
        }
    }

    /// Declare an integer-range option.
    #[must_use]
    pub fn int(name: &str, lo: i64, hi: i64, default: i64) -> Self {
        Self {
            name: name.into(),
            domain: OptionDomain::Int { lo, hi },
            default: default.to_string(),
            conflicts: FxHashSet::default(),
            depends: FxHashSet::default(),
        }
    }

    /// Declare a mode-list option.
    #[must_use]
    pub fn mode(name: &str, modes: &[&str], default: &str) -> Self {
        Self {
            name: name.into(),
            domain: OptionDomain::Mode(modes.iter().map(|m| (*m).to_string()).collect()),
            default: default.into(),
            conflicts: FxHashSet::default(),
            depends: FxHashSet::default(),
        }
    }

    /// Add conflicting option names.
    #[must_use]
    pub fn with_conflicts(mut self, names: &[&str]) -> Self {
        self.conflicts.extend(names.iter().map(|n| (*n).to_string()));
        self
    }

    /// Add dependency option names.
    #[must_use]
    pub fn with_depends(mut self, names: &[&str]) -> Self {
        self.depends.extend(names.iter().map(|n| (*n).to_string()));
        self
    }

    /// Sample a value from this option's domain.
    pub fn pick_value(&self, rng: &mut RngState) -> String {
        match &self.domain {
            OptionDomain::Bool => rng.flip_coin().to_string(),
            OptionDomain::Int { lo, hi } => {
                let span = (hi - lo) as u64;
                let v = lo + rng.pick_u64_range(0, span) as i64;
                v.to_string()
            }
            OptionDomain::Mode(modes) => rng.choose(modes).clone(),
        }
    }
}

/// The table of declared options plus the used-set of the current run.
#[derive(Debug, Default)]
pub struct OptionTable {
    options: Vec<SolverOption>,
    used: FxHashSet<String>,
}

impl OptionTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with the given declarations.
    #[must_use]
    pub fn with_options(options: Vec<SolverOption>) -> Self {
        Self {
            options,
            used: FxHashSet::default(),
        }
    }

    /// Declare one more option.
    pub fn add(&mut self, option: SolverOption) {
        self.options.push(option);
    }

    /// Number of declared options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// True if no option is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Record that `name` has been set.
    pub fn mark_used(&mut self, name: &str) {
        self.used.insert(name.into());
    }

    /// True if `name` has been set in this run.
    #[must_use]
    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Forget all used marks (solver instance deleted).
    pub fn reset_used(&mut self) {
        self.used.clear();
    }

    /// Options currently eligible for setting.
    ///
    /// An option qualifies when it has not been set, none of its
    /// conflicts have been set, every dependency has been set, and it is
    /// not in `banned`.
    #[must_use]
    pub fn available(&self, banned: &[&str]) -> Vec<&SolverOption> {
        self.options
            .iter()
            .filter(|o| !self.used.contains(&o.name))
            .filter(|o| !banned.contains(&o.name.as_str()))
            .filter(|o| o.conflicts.iter().all(|c| !self.used.contains(c)))
            .filter(|o| o.depends.iter().all(|d| self.used.contains(d)))
            .collect()
    }

    /// Uniformly pick an eligible option and a value from its domain.
    pub fn pick(&self, rng: &mut RngState, banned: &[&str]) -> Option<(String, String)> {
        let candidates = self.available(banned);
        if candidates.is_empty() {
            return None;
        }
        let opt = candidates[rng.pick_index(candidates.len())];
        let value = opt.pick_value(rng);
        Some((opt.name.clone(), value))
    }

    /// Look up a declared option by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SolverOption> {
        self.options.iter().find(|o| o.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> OptionTable {
        OptionTable::with_options(vec![
            SolverOption::boolean("a", false),
            SolverOption::boolean("b", false).with_conflicts(&["a"]),
            SolverOption::int("c", 0, 7, 0).with_depends(&["a"]),
            SolverOption::mode("m", &["fast", "slow"], "fast"),
        ])
    }

    #[test]
    fn test_conflicts_filtered() {
        let mut t = table();
        t.mark_used("a");
        let names: Vec<&str> = t.available(&[]).iter().map(|o| o.name.as_str()).collect();
        assert!(!names.contains(&"a"), "already used");
        assert!(!names.contains(&"b"), "conflicts with used a");
        assert!(names.contains(&"c"), "dependency satisfied");
    }

    #[test]
    fn test_dependencies_gate() {
        let t = table();
        let names: Vec<&str> = t.available(&[]).iter().map(|o| o.name.as_str()).collect();
        assert!(!names.contains(&"c"), "dependency a unset");
    }

    #[test]
    fn test_banned_filtered() {
        let t = table();
        let names: Vec<&str> = t.available(&["m"]).iter().map(|o| o.name.as_str()).collect();
        assert!(!names.contains(&"m"));
    }

    #[test]
    fn test_pick_value_in_domain() {
        let mut rng = RngState::new(17);
        let t = table();
        for _ in 0..50 {
            if let Some((name, value)) = t.pick(&mut rng, &[]) {
                match &t.get(&name).unwrap().domain {
                    OptionDomain::Bool => assert!(value == "true" || value == "false"),
                    OptionDomain::Int { lo, hi } => {
                        let v: i64 = value.parse().unwrap();
                        assert!(*lo <= v && v <= *hi);
                    }
                    OptionDomain::Mode(modes) => assert!(modes.contains(&value)),
                }
            }
        }
    }

    #[test]
    fn test_reset_used() {
        let mut t = table();
        t.mark_used("a");
        t.reset_used();
        assert!(!t.is_used("a"));
        let names: Vec<&str> = t.available(&[]).iter().map(|o| o.name.as_str()).collect();
        assert!(names.contains(&"a") && names.contains(&"b"));
    }
}
