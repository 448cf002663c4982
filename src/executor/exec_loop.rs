//! Core execution loop
//!
//! `Lane::resume` runs ops from the program counter until the next
//! `Suspend`. Errors and break/continue unwind the lane's control stack:
//! - an armed catch handler stops a raise and jumps into the catch body
//! - a handler with a finally body stops any unwind; the interrupted
//!   completion is parked on a `Finally` frame and resumed by `EndFinally`
//! - scope frames restore the binding they shadowed

use std::rc::Rc;

use tracing::trace;

use super::errors::RuntimeError;
use super::expressions::eval_expr;
use super::statements::{execute_assert, execute_assign, execute_eval, execute_let, execute_throw};
use super::types::{Completion, Frame, Op, StepIndex, Val};
use super::vm::Lane;

/// What the loop does after an op
enum Flow {
    /// Fall through to the next op
    Next,
    /// Continue at an absolute op index
    Goto(usize),
    /// Stop and report a step index
    Suspend(StepIndex),
}

/* ===================== Public API ===================== */

impl Lane {
    /// Run until the next statement boundary
    ///
    /// Returns the step index of the statement about to execute, or the
    /// sentinel once the kernel body is finished. A finished lane keeps
    /// returning the sentinel. An error that escapes every handler is
    /// returned, and returned again by any later resume.
    pub fn resume(&mut self) -> Result<StepIndex, RuntimeError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }

        let program = Rc::clone(&self.program);
        loop {
            let Some(op) = program.ops.get(self.pc) else {
                let sentinel = program.sentinel();
                self.last_step = Some(sentinel);
                return Ok(sentinel);
            };

            let flow = match self.execute(op) {
                Ok(flow) => flow,
                Err(err) => match self.raise(err) {
                    Ok(()) => continue,
                    Err(err) => {
                        trace!(lane = self.id, pc = self.pc, error = %err, "Lane failed");
                        self.failed = Some(err.clone());
                        return Err(err);
                    }
                },
            };

            match flow {
                Flow::Next => self.pc += 1,
                Flow::Goto(target) => self.pc = target,
                Flow::Suspend(step) => {
                    self.pc += 1;
                    self.last_step = Some(step);
                    return Ok(step);
                }
            }
        }
    }

    /// Resume until the sentinel, returning the number of resumes taken
    pub fn run_to_end(&mut self) -> Result<usize, RuntimeError> {
        let sentinel = self.program.sentinel();
        let mut resumes = 0;
        while self.resume()? != sentinel {
            resumes += 1;
        }
        Ok(resumes)
    }

    /* ===================== Op Dispatch ===================== */

    fn execute(&mut self, op: &Op) -> Result<Flow, RuntimeError> {
        match op {
            Op::Suspend(step) => return Ok(Flow::Suspend(*step)),

            Op::Let { name, init } => execute_let(self, name, init.as_ref())?,

            Op::Assign {
                var,
                path,
                op,
                value,
            } => execute_assign(self, var, path, *op, value)?,

            Op::Eval(expr) => execute_eval(self, expr)?,

            Op::Assert { test, message } => execute_assert(self, test, message.as_ref())?,

            Op::Throw(value) => return Err(execute_throw(self, value)),

            Op::Branch { test, otherwise } => {
                if !eval_expr(test, &self.env, self.id)?.is_truthy() {
                    return Ok(Flow::Goto(*otherwise));
                }
            }

            Op::Jump(target) => return Ok(Flow::Goto(*target)),

            Op::IterStart(iterable) => {
                let items = iter_items(eval_expr(iterable, &self.env, self.id)?)?;
                self.stack.push(Frame::Iter { items, next: 0 });
            }

            Op::IterNext { binding, exhausted } => {
                let next_item = match self.stack.last_mut() {
                    Some(Frame::Iter { items, next }) => {
                        let item = items.get(*next).cloned();
                        *next += 1;
                        item
                    }
                    _ => return Err(corrupt_stack("iterator")),
                };
                match next_item {
                    Some(item) => {
                        self.env.insert(binding.clone(), item);
                    }
                    None => {
                        self.stack.pop();
                        return Ok(Flow::Goto(*exhausted));
                    }
                }
            }

            Op::PushHandler { catch, finally } => {
                self.stack.push(Frame::Handler {
                    catch: catch.clone(),
                    finally: *finally,
                });
            }

            Op::DisarmCatch => match self.stack.last_mut() {
                Some(Frame::Handler { catch, .. }) => *catch = None,
                _ => return Err(corrupt_stack("handler")),
            },

            Op::PopHandler => match self.stack.pop() {
                Some(Frame::Handler { finally, .. }) => {
                    if finally.is_some() {
                        self.stack.push(Frame::Finally {
                            pending: Completion::Normal,
                        });
                    }
                }
                _ => return Err(corrupt_stack("handler")),
            },

            Op::EndFinally => match self.stack.pop() {
                Some(Frame::Finally { pending }) => match pending {
                    Completion::Normal => {}
                    Completion::Unwind { depth, target } => return Ok(self.unwind(depth, target)),
                    Completion::Raise(err) => return Err(err),
                },
                _ => return Err(corrupt_stack("finally")),
            },

            Op::EnterScope { resource, binding } => {
                let value = eval_expr(resource, &self.env, self.id)?;
                let previous = match binding {
                    Some(name) => self.env.insert(name.clone(), value),
                    None => None,
                };
                self.stack.push(Frame::Scope {
                    binding: binding.clone(),
                    previous,
                });
            }

            Op::ExitScope => match self.stack.pop() {
                Some(frame @ Frame::Scope { .. }) => self.restore_scope(frame),
                _ => return Err(corrupt_stack("scope")),
            },

            Op::Unwind { depth, target } => return Ok(self.unwind(*depth, *target)),
        }
        Ok(Flow::Next)
    }

    /* ===================== Control Flow ===================== */

    /// Pop frames down to `depth`, then continue at `target`
    ///
    /// A pending finally body interrupts the unwind; `EndFinally` picks it
    /// up again.
    fn unwind(&mut self, depth: usize, target: usize) -> Flow {
        while self.stack.len() > depth {
            match self.stack.pop() {
                Some(Frame::Handler {
                    finally: Some(finally),
                    ..
                }) => {
                    self.stack.push(Frame::Finally {
                        pending: Completion::Unwind { depth, target },
                    });
                    return Flow::Goto(finally);
                }
                Some(frame @ Frame::Scope { .. }) => self.restore_scope(frame),
                // Leaving a finally body early drops its pending completion
                Some(_) | None => {}
            }
        }
        Flow::Goto(target)
    }

    /// Route an error to the nearest handler
    ///
    /// Returns the error back if it escapes the control stack.
    fn raise(&mut self, err: RuntimeError) -> Result<(), RuntimeError> {
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Handler {
                    catch: Some(target),
                    finally,
                } => {
                    trace!(lane = self.id, error = %err, "Caught error");
                    if let Some(name) = &target.binding {
                        self.env.insert(name.clone(), err.to_value());
                    }
                    self.stack.push(Frame::Handler {
                        catch: None,
                        finally,
                    });
                    self.pc = target.pc;
                    return Ok(());
                }
                Frame::Handler {
                    catch: None,
                    finally: Some(finally),
                } => {
                    self.stack.push(Frame::Finally {
                        pending: Completion::Raise(err),
                    });
                    self.pc = finally;
                    return Ok(());
                }
                frame @ Frame::Scope { .. } => self.restore_scope(frame),
                // An error inside a finally body replaces the pending completion
                Frame::Handler { .. } | Frame::Iter { .. } | Frame::Finally { .. } => {}
            }
        }
        Err(err)
    }

    fn restore_scope(&mut self, frame: Frame) {
        if let Frame::Scope {
            binding: Some(name),
            previous,
        } = frame
        {
            match previous {
                Some(value) => {
                    self.env.insert(name, value);
                }
                None => {
                    self.env.remove(&name);
                }
            }
        }
    }
}

/// Items a for loop iterates over
fn iter_items(value: Val) -> Result<Vec<Val>, RuntimeError> {
    match value {
        Val::List(items) => Ok(Rc::try_unwrap(items).unwrap_or_else(|shared| shared.as_ref().clone())),
        Val::Str(s) => Ok(s.chars().map(|c| Val::Str(c.to_string())).collect()),
        other => Err(RuntimeError::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

fn corrupt_stack(expected: &str) -> RuntimeError {
    RuntimeError::type_error(format!("control stack has no active {} frame", expected))
}
