//! Tree-walking evaluator over a resolved unit.
//!
//! Statements complete with a [`Flow`] signal so loops and function bodies
//! can pass `return`, `break` and `continue` outwards as plain data. Errors
//! travel through `RuntimeResult`; every scope and frame pushed on the way
//! down is popped again on the way out, so references held by locals are
//! released even when a call fails.

mod calls;
mod expressions;
mod statements;

use crate::config::Config;
use crate::error::{RuntimeError, RuntimeErrorKind, RuntimeResult, SourceLocation};
use crate::heap::Heap;
use crate::library::HostState;
use crate::resolver::CompiledUnit;
use crate::value::Value;
use crate::variable::Environment;

/// Snapshot handed to the interrupt callback.
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    /// Loop iterations and calls so far in this execution.
    pub steps: u64,
    /// Active call depth.
    pub depth: usize,
    pub location: SourceLocation,
}

/// Returns `false` to abort the running script.
pub type Interrupt = Box<dyn FnMut(&Probe) -> bool>;

/// How a statement completed.
#[derive(Debug)]
pub(crate) enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

pub struct Interpreter<'a> {
    unit: &'a CompiledUnit,
    heap: &'a Heap,
    state: &'a mut HostState,
    config: &'a Config,
    interrupt: Option<&'a mut Interrupt>,
    env: Environment,
    steps: u64,
    /// Native stack position when `run` started.
    stack_base: usize,
    /// Value of the last top-level expression statement.
    last_value: Value,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        unit: &'a CompiledUnit,
        heap: &'a Heap,
        state: &'a mut HostState,
        config: &'a Config,
        interrupt: Option<&'a mut Interrupt>,
    ) -> Self {
        Self {
            unit,
            heap,
            state,
            config,
            interrupt,
            env: Environment::new(),
            steps: 0,
            stack_base: stack_position(),
            last_value: Value::Null,
        }
    }

    /// Run the top-level statements, then the entry function if one is named.
    pub fn run(&mut self, entry: Option<&str>, args: Vec<Value>) -> RuntimeResult<Value> {
        self.stack_base = stack_position();
        let unit = self.unit;
        for statement in &unit.program.statements {
            match self.execute(statement)? {
                Flow::Normal => {}
                Flow::Return(value) => return Ok(value),
                Flow::Break | Flow::Continue => {
                    return Err(RuntimeError::type_error(
                        "break or continue outside of a loop",
                        statement.location,
                    ))
                }
            }
        }

        let Some(name) = entry else {
            return Ok(std::mem::replace(&mut self.last_value, Value::Null));
        };
        tracing::debug!(entry = name, args = args.len(), "calling entry function");
        let location = SourceLocation::default();
        if let Some(decl) = unit.functions.get(name) {
            return self.call_script(decl, None, args, location);
        }
        if let Some(function) = unit.host_functions.get(name) {
            return self.call_host(function, args, location);
        }
        Err(RuntimeError::name_error(
            format!("entry function '{}' is not defined", name),
            location,
        ))
    }

    /// Cooperative limit check at loop iterations and call boundaries.
    fn checkpoint(&mut self, location: SourceLocation) -> RuntimeResult<()> {
        self.steps += 1;
        if let Some(limit) = self.config.max_steps {
            if self.steps > limit {
                tracing::info!(steps = self.steps, "step budget exhausted");
                return Err(RuntimeError::new(
                    RuntimeErrorKind::Interrupted(self.steps),
                    location,
                ));
            }
        }
        if let Some(interrupt) = self.interrupt.as_deref_mut() {
            let probe = Probe {
                steps: self.steps,
                depth: self.env.depth(),
                location,
            };
            if !interrupt(&probe) {
                tracing::info!(steps = self.steps, "interrupted by host");
                return Err(RuntimeError::new(
                    RuntimeErrorKind::Interrupted(self.steps),
                    location,
                ));
            }
        }
        Ok(())
    }

    /// Fails with `StackOverflow` once nested evaluation has used more
    /// native stack than `max_stack_bytes`. The call depth reached is reported.
    fn guard_stack(&self, location: SourceLocation) -> RuntimeResult<()> {
        let used = self.stack_base.abs_diff(stack_position());
        if used > self.config.max_stack_bytes {
            let depth = self.env.depth();
            tracing::debug!(used, depth, "native stack budget exhausted");
            return Err(RuntimeError::new(RuntimeErrorKind::StackOverflow(depth), location));
        }
        Ok(())
    }

    /// Run `f` inside a fresh block scope that is popped whatever happens.
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> RuntimeResult<T>) -> RuntimeResult<T> {
        self.env.push_scope();
        let result = f(self);
        self.env.pop_scope();
        result
    }
}

/// Address of a local in the caller's frame.
#[inline(always)]
fn stack_position() -> usize {
    let marker = 0u8;
    std::ptr::addr_of!(marker) as usize
}
