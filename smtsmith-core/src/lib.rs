//! smtsmith-core - Model-Based Fuzzing Engine for SMT Solvers
//!
//! This crate drives SMT solver back-ends through long, random, but
//! always well-typed API call sequences:
//! - A weighted finite-state machine schedules [`actions::Action`]s
//! - A typed [`termdb::TermDb`] tracks every sort and term the back-end
//!   has ever produced, partitioned by sort and push level
//! - An [`op::OpCatalog`] constrains operator selection to arguments
//!   that currently exist
//! - A single 32-bit Mersenne Twister makes every run bit-identically
//!   replayable from its seed
//! - Every run emits a line-oriented trace that [`fsm::Fsm::untrace`]
//!   replays with divergence checking
//!
//! Back-ends implement the [`solver::Solver`] trait; a deterministic
//! in-memory back-end ([`solver::mock::MockSolver`]) ships with the
//! crate for tests and smoke runs.
//!
//! # Examples
//!
//! ```
//! use smtsmith_core::fsm::{Fsm, FsmConfig};
//! use smtsmith_core::options::OptionTable;
//! use smtsmith_core::solver::mock::MockSolver;
//! use smtsmith_core::trace::TraceWriter;
//!
//! let config = FsmConfig {
//!     seed: 1,
//!     max_steps: 50,
//!     ..FsmConfig::default()
//! };
//! let mut fsm = Fsm::new(
//!     Box::new(MockSolver::new()),
//!     config,
//!     OptionTable::new(),
//!     TraceWriter::sink(),
//! )
//! .expect("valid state graph");
//! fsm.run().expect("run completes");
//! assert!(fsm.stats().total_actions() > 0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod actions;
pub mod config;
pub mod error;
pub mod fsm;
pub mod literals;
pub mod mgr;
pub mod op;
pub mod options;
pub mod rng;
pub mod solver;
pub mod sort;
pub mod stats;
pub mod term;
pub mod termdb;
pub mod theory;
pub mod trace;

pub use error::{FuzzerError, Result};
pub use fsm::{Fsm, FsmBuilder, FsmConfig};
pub use mgr::{ManagerConfig, SolverMgr};
pub use op::{OpCatalog, OpData, OpKind};
pub use options::{OptionDomain, OptionTable, SolverOption};
pub use rng::{RngState, SeedGenerator};
pub use solver::{SolveResult, Solver, SpecialValue, ValueBase};
pub use sort::{Sort, SortKind};
pub use stats::Statistics;
pub use term::{LeafKind, Term};
pub use termdb::TermDb;
pub use theory::Theory;
pub use trace::TraceWriter;
