//! Lane state
//!
//! A lane holds everything needed to stop at a statement boundary and be
//! resumed later:
//! - pc: index of the next op to execute
//! - env: function-wide variables
//! - stack: active loop iterators, try handlers and scoped resources

use std::rc::Rc;

use super::errors::RuntimeError;
use super::expressions::Env;
use super::types::{Frame, Program, StepIndex, Val};

/* ===================== Lane ===================== */

/// One independent resumable execution of an instrumented kernel
#[derive(Debug, Clone)]
pub struct Lane {
    /// Lane ordinal, also bound to `lane` in the environment
    pub(crate) id: usize,

    /// Shared lowered kernel
    pub(crate) program: Rc<Program>,

    /// Next op to execute
    pub(crate) pc: usize,

    /// Variable environment
    pub(crate) env: Env,

    /// Control stack
    pub(crate) stack: Vec<Frame>,

    /// Step index reported by the last resume
    pub(crate) last_step: Option<StepIndex>,

    /// Error that escaped the lane, replayed on every later resume
    pub(crate) failed: Option<RuntimeError>,
}

impl Lane {
    /// Create a lane positioned before the first op
    pub fn new(id: usize, program: Rc<Program>, env: Env) -> Self {
        Lane {
            id,
            program,
            pc: 0,
            env,
            stack: Vec::new(),
            last_step: None,
            failed: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Step index reported by the most recent resume
    pub fn step(&self) -> Option<StepIndex> {
        self.last_step
    }

    /// Whether the lane reached the sentinel
    pub fn is_done(&self) -> bool {
        self.last_step == Some(self.program.sentinel())
    }

    /// Current value of a variable
    pub fn get(&self, name: &str) -> Option<&Val> {
        self.env.get(name)
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Depth of the control stack (empty between top-level statements)
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }
}
