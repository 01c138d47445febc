//! Shared helpers for the integration suites.
#![allow(dead_code)]

use smtsmith_core::fsm::{Fsm, FsmConfig};
use smtsmith_core::mgr::ManagerConfig;
use smtsmith_core::options::OptionTable;
use smtsmith_core::solver::mock::MockSolver;
use smtsmith_core::theory::Theory;
use smtsmith_core::trace::TraceWriter;
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

/// A `Write` sink tests can read back after the writer is consumed.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn config(seed: u32, max_steps: u64, theories: &[Theory]) -> FsmConfig {
    FsmConfig {
        seed,
        max_steps,
        manager: ManagerConfig {
            theories: theories.to_vec(),
            ..ManagerConfig::default()
        },
    }
}

/// Generate a trace and return it as a string.
pub fn generate(seed: u32, max_steps: u64, theories: &[Theory], options: OptionTable) -> String {
    let buf = SharedBuf::new();
    let mut fsm = Fsm::new(
        Box::new(MockSolver::new()),
        config(seed, max_steps, theories),
        options,
        TraceWriter::new(Box::new(buf.clone())),
    )
    .expect("state graph validates");
    fsm.run().expect("run completes");
    buf.contents()
}

/// Replay a trace, returning the re-emitted trace.
pub fn replay(
    trace: &str,
    theories: &[Theory],
    options: OptionTable,
) -> smtsmith_core::Result<String> {
    let buf = SharedBuf::new();
    let mut fsm = Fsm::new(
        Box::new(MockSolver::new()),
        config(0, 1, theories),
        options,
        TraceWriter::new(Box::new(buf.clone())),
    )?;
    let mut reader = trace.as_bytes();
    fsm.untrace(&mut reader)?;
    Ok(buf.contents())
}
