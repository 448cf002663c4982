//! Statement instrumentation
//!
//! Lowers a validated kernel body into a flat op list. Every statement gets
//! a step index from one counter shared by the whole kernel, allocated in
//! pre-order textual order, and an `Op::Suspend(step)` in front of its ops.
//! The list always ends with `Op::Suspend(sentinel)` where the sentinel is
//! the number of statements.
//!
//! Layouts (`S(k)` is the statement's suspension):
//!
//! ```text
//! if:    S(k) Branch(->E) then.. Jump(->X) E: else.. X:
//! while: S(k) L: Branch(->E) body.. Jump(->L) E: else.. X:
//! for:   S(k) IterStart L: IterNext(->E) body.. Jump(->L) E: else.. X:
//! try:   S(k) PushHandler body.. DisarmCatch else.. Jump(->F) C: catch..
//!        F: PopHandler finally.. EndFinally
//!        (without a catch: S(k) PushHandler body.. else.. PopHandler ..)
//! with:  S(k) EnterScope body.. ExitScope
//! ```
//!
//! `break` jumps to `X`, `continue` to `L`; both unwind the control stack
//! to the loop's depth first.

use std::rc::Rc;

use super::args::{bind_arguments, Args};
use super::errors::BindError;
use super::types::{CatchTarget, Op, Param, Program, Span, Stmt};
use super::vm::Lane;
use crate::parser::printer::print_stmt;
use crate::parser::semantic_validator::{validate_kernel, NodeKind, StructuralViolation};
use crate::parser::KernelDef;

/* ===================== Instrumented Kernel ===================== */

/// A kernel lowered to a resumable op list
///
/// Cheap to clone; the program and step texts are shared.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentedKernel {
    name: String,
    params: Vec<Param>,
    step_text: Rc<[String]>,
    program: Rc<Program>,
}

impl InstrumentedKernel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Number of instrumented statements
    pub fn num_steps(&self) -> usize {
        self.program.num_steps
    }

    /// Step index reported by a finished lane
    pub fn sentinel(&self) -> usize {
        self.program.sentinel()
    }

    /// Source text of every statement, indexed by step
    pub fn step_text(&self) -> &Rc<[String]> {
        &self.step_text
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Start a lane: the kernel's own parameters plus a leading lane id
    pub fn spawn(&self, lane_id: usize, args: &Args) -> Result<Lane, BindError> {
        let env = bind_arguments(&self.params, lane_id, args)?;
        Ok(Lane::new(lane_id, Rc::clone(&self.program), env))
    }
}

/* ===================== Public API ===================== */

/// Validate a kernel and lower it into an [`InstrumentedKernel`]
///
/// The kernel is only borrowed; on failure nothing is produced.
pub fn instrument(kernel: &KernelDef) -> Result<InstrumentedKernel, StructuralViolation> {
    validate_kernel(kernel)?;

    let mut lowering = Lowering::default();
    lowering.lower_body(&kernel.body)?;

    let num_steps = lowering.step_text.len();
    lowering.ops.push(Op::Suspend(num_steps));

    Ok(InstrumentedKernel {
        name: kernel.name.clone(),
        params: kernel.params.clone(),
        step_text: lowering.step_text.into(),
        program: Rc::new(Program {
            ops: lowering.ops,
            num_steps,
        }),
    })
}

/* ===================== Lowering ===================== */

/// Jump targets of the innermost enclosing loop
struct LoopTargets {
    continue_target: usize,
    /// Control stack depth inside the loop body
    continue_depth: usize,
    /// Control stack depth outside the loop
    break_depth: usize,
    /// `Unwind` ops waiting for the loop's exit index
    breaks: Vec<usize>,
}

#[derive(Default)]
struct Lowering {
    ops: Vec<Op>,
    step_text: Vec<String>,
    /// Control stack depth at the current position
    depth: usize,
    loops: Vec<LoopTargets>,
}

impl Lowering {
    fn emit(&mut self, op: Op) -> usize {
        self.ops.push(op);
        self.ops.len() - 1
    }

    fn here(&self) -> usize {
        self.ops.len()
    }

    /// Point the forward reference at `at` to `target`
    fn patch(&mut self, at: usize, target: usize) {
        match &mut self.ops[at] {
            Op::Branch { otherwise, .. } => *otherwise = target,
            Op::Jump(to) => *to = target,
            Op::IterNext { exhausted, .. } => *exhausted = target,
            Op::Unwind { target: to, .. } => *to = target,
            _ => {}
        }
    }

    /// Allocate the statement's step index and emit its suspension
    fn suspend(&mut self, stmt: &Stmt) {
        let step = self.step_text.len();
        self.step_text.push(print_stmt(stmt));
        self.emit(Op::Suspend(step));
    }

    fn lower_body(&mut self, body: &[Stmt]) -> Result<(), StructuralViolation> {
        for stmt in body {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), StructuralViolation> {
        // Blocks only group statements
        if let Stmt::Block { body, .. } = stmt {
            return self.lower_body(body);
        }

        self.suspend(stmt);

        match stmt {
            Stmt::Block { .. } => {}

            Stmt::Let { name, init, .. } => {
                self.emit(Op::Let {
                    name: name.clone(),
                    init: init.clone(),
                });
            }

            Stmt::Assign {
                var,
                path,
                op,
                value,
                ..
            } => {
                self.emit(Op::Assign {
                    var: var.clone(),
                    path: path.clone(),
                    op: *op,
                    value: value.clone(),
                });
            }

            Stmt::Expr { expr, .. } => {
                self.emit(Op::Eval(expr.clone()));
            }

            Stmt::Assert { test, message, .. } => {
                self.emit(Op::Assert {
                    test: test.clone(),
                    message: message.clone(),
                });
            }

            Stmt::Throw {
                value: Some(value), ..
            } => {
                self.emit(Op::Throw(value.clone()));
            }

            Stmt::If {
                test,
                then_body,
                else_body,
                ..
            } => {
                let branch = self.emit(Op::Branch {
                    test: test.clone(),
                    otherwise: 0,
                });
                self.lower_body(then_body)?;
                if else_body.is_empty() {
                    let end = self.here();
                    self.patch(branch, end);
                } else {
                    let skip_else = self.emit(Op::Jump(0));
                    let else_start = self.here();
                    self.patch(branch, else_start);
                    self.lower_body(else_body)?;
                    let end = self.here();
                    self.patch(skip_else, end);
                }
            }

            Stmt::While {
                test,
                body,
                else_body,
                ..
            } => {
                let top = self.here();
                let branch = self.emit(Op::Branch {
                    test: test.clone(),
                    otherwise: 0,
                });
                self.lower_loop_body(body, top, self.depth)?;
                let breaks = self.finish_loop(top);
                let else_start = self.here();
                self.patch(branch, else_start);
                self.lower_body(else_body)?;
                self.patch_breaks(breaks);
            }

            Stmt::For {
                binding,
                iterable,
                body,
                else_body,
                ..
            } => {
                self.emit(Op::IterStart(iterable.clone()));
                self.depth += 1;
                let top = self.emit(Op::IterNext {
                    binding: binding.clone(),
                    exhausted: 0,
                });
                self.lower_loop_body(body, top, self.depth - 1)?;
                let breaks = self.finish_loop(top);
                self.depth -= 1;
                // IterNext pops the iterator before jumping here
                let else_start = self.here();
                self.patch(top, else_start);
                self.lower_body(else_body)?;
                self.patch_breaks(breaks);
            }

            Stmt::Try {
                body,
                catch,
                else_body,
                finally_body,
                ..
            } => {
                let push = self.emit(Op::PushHandler {
                    catch: None,
                    finally: None,
                });
                self.depth += 1;
                self.lower_body(body)?;

                let mut catch_target = None;
                let mut to_finally = None;
                if let Some(catch) = catch {
                    self.emit(Op::DisarmCatch);
                    self.lower_body(else_body)?;
                    to_finally = Some(self.emit(Op::Jump(0)));
                    catch_target = Some(CatchTarget {
                        pc: self.here(),
                        binding: catch.binding.clone(),
                    });
                    self.lower_body(&catch.body)?;
                } else {
                    // Without a catch nothing can skip the else body
                    self.lower_body(else_body)?;
                }

                let finally_entry = self.here();
                if let Some(jump) = to_finally {
                    self.patch(jump, finally_entry);
                }
                self.emit(Op::PopHandler);

                let mut finally_target = None;
                if let Some(finally_body) = finally_body {
                    finally_target = Some(self.here());
                    self.lower_body(finally_body)?;
                    self.emit(Op::EndFinally);
                }
                self.depth -= 1;

                self.ops[push] = Op::PushHandler {
                    catch: catch_target,
                    finally: finally_target,
                };
            }

            Stmt::With {
                resource,
                binding,
                body,
                ..
            } => {
                self.emit(Op::EnterScope {
                    resource: resource.clone(),
                    binding: binding.clone(),
                });
                self.depth += 1;
                self.lower_body(body)?;
                self.depth -= 1;
                self.emit(Op::ExitScope);
            }

            Stmt::Break { span } => {
                let depth = self.innermost_loop(stmt)?.break_depth;
                let at = self.emit(Op::Unwind { depth, target: 0 });
                match self.loops.last_mut() {
                    Some(targets) => targets.breaks.push(at),
                    None => return Err(outside_loop(NodeKind::Break, *span)),
                }
            }

            Stmt::Continue { .. } => {
                let targets = self.innermost_loop(stmt)?;
                let op = Op::Unwind {
                    depth: targets.continue_depth,
                    target: targets.continue_target,
                };
                self.emit(op);
            }

            Stmt::Throw { value: None, span } => {
                return Err(rejected(NodeKind::Reraise, *span));
            }
            Stmt::FunctionDef { span, .. } => return Err(rejected(NodeKind::FunctionDef, *span)),
            Stmt::ClassDef { span, .. } => return Err(rejected(NodeKind::ClassDef, *span)),
            Stmt::Import { span, .. } => return Err(rejected(NodeKind::Import, *span)),
            Stmt::Return { span, .. } => return Err(rejected(NodeKind::Return, *span)),
        }
        Ok(())
    }

    /// Lower a loop body with break/continue targets registered
    fn lower_loop_body(&mut self, body: &[Stmt], top: usize, break_depth: usize) -> Result<(), StructuralViolation> {
        self.loops.push(LoopTargets {
            continue_target: top,
            continue_depth: self.depth,
            break_depth,
            breaks: Vec::new(),
        });
        self.lower_body(body)
    }

    /// Close the loop with a back edge and return its pending breaks
    fn finish_loop(&mut self, top: usize) -> Vec<usize> {
        self.emit(Op::Jump(top));
        self.loops.pop().map(|targets| targets.breaks).unwrap_or_default()
    }

    fn patch_breaks(&mut self, breaks: Vec<usize>) {
        let exit = self.here();
        for at in breaks {
            self.patch(at, exit);
        }
    }

    fn innermost_loop(&self, stmt: &Stmt) -> Result<&LoopTargets, StructuralViolation> {
        let kind = match stmt {
            Stmt::Break { .. } => NodeKind::Break,
            _ => NodeKind::Continue,
        };
        self.loops.last().ok_or_else(|| outside_loop(kind, stmt.span()))
    }
}

fn rejected(node: NodeKind, span: Span) -> StructuralViolation {
    StructuralViolation::new(
        node,
        span,
        format!("{} statements are not allowed", node),
        "instrument",
    )
}

fn outside_loop(node: NodeKind, span: Span) -> StructuralViolation {
    StructuralViolation::new(node, span, format!("'{}' outside loop", node), "instrument")
}
