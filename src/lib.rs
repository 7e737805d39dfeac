//! eci: an embeddable interpreter for a C++-like and a JS-like scripting
//! grammar sharing one tree, one resolver and one evaluator.
//!
//! ```no_run
//! use eci::{Config, Engine, Grammar};
//!
//! let mut engine = Engine::new(Config::captured());
//! let unit = engine.compile("printf(\"%d\\n\", 6 * 7);", Grammar::Cpp).unwrap();
//! engine.execute(&unit, None, Vec::new()).unwrap();
//! assert_eq!(engine.take_output(), "42\n");
//! ```

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod heap;
pub mod interpreter;
pub mod lexer;
pub mod library;
pub mod parser;
pub mod printer;
pub mod resolver;
pub mod symbol_table;
pub mod types;
pub mod value;
pub mod variable;

pub use config::Config;
pub use diagnostics::Diagnostic;
pub use error::{CompileError, RuntimeError, RuntimeErrorKind};
pub use heap::{Heap, HeapStats};
pub use interpreter::{Interrupt, Probe};
pub use lexer::Grammar;
pub use library::{HostClass, HostContext, Library};
pub use printer::unparse;
pub use resolver::CompiledUnit;
pub use value::Value;

use error::CompileResult;
use interpreter::Interpreter;
use library::HostState;
use std::io::BufRead;

/// One embedding of the interpreter: a host library, a heap and the
/// script-visible standard streams, shared by every unit it runs.
pub struct Engine {
    config: Config,
    library: Library,
    heap: Heap,
    state: HostState,
    interrupt: Option<Interrupt>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        let mut library = Library::new();
        if config.stdlib {
            if let Err(err) = library::stdlib::register(&mut library) {
                internal_error!("standard library failed to register: {}", err);
            }
        }
        tracing::info!(
            stdlib = config.stdlib,
            max_call_depth = config.max_call_depth,
            "engine created"
        );
        Self {
            state: HostState::new(config.capture_output),
            config,
            library,
            heap: Heap::new(),
            interrupt: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Host registration; closed once the first unit is compiled.
    pub fn library_mut(&mut self) -> &mut Library {
        &mut self.library
    }

    pub fn compile(&mut self, source: &str, grammar: Grammar) -> CompileResult<CompiledUnit> {
        self.library.seal();
        let program = parser::parse(source, grammar)?;
        let unit = resolver::resolve(program, grammar, &self.library)?;
        tracing::info!(
            %grammar,
            classes = unit.types.classes.len(),
            functions = unit.functions.len(),
            "compiled unit"
        );
        Ok(unit)
    }

    /// Run the unit's top-level statements, then `entry` if given.
    pub fn execute(
        &mut self,
        unit: &CompiledUnit,
        entry: Option<&str>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let result = Interpreter::new(
            unit,
            &self.heap,
            &mut self.state,
            &self.config,
            self.interrupt.as_mut(),
        )
        .run(entry, args);
        let stats = self.heap.stats();
        tracing::debug!(
            allocated = stats.allocated(),
            released = stats.released(),
            ok = result.is_ok(),
            "execution finished"
        );
        result
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Output buffered so far when `capture_output` is on.
    pub fn take_output(&mut self) -> String {
        self.state.take_output()
    }

    pub fn set_input(&mut self, input: Box<dyn BufRead>) {
        self.state.set_input(input);
    }

    /// Probe called at every loop iteration and call; `false` aborts.
    pub fn set_interrupt(&mut self, interrupt: impl FnMut(&Probe) -> bool + 'static) {
        self.interrupt = Some(Box::new(interrupt));
    }

    pub fn clear_interrupt(&mut self) {
        self.interrupt = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BindingError;

    #[test]
    fn test_compile_and_execute() {
        let mut engine = Engine::new(Config::captured());
        let unit = engine
            .compile("int square(int x) { return x * x; }", Grammar::Cpp)
            .unwrap();
        let value = engine.execute(&unit, Some("square"), vec![Value::Int(9)]).unwrap();
        assert_eq!(value, Value::Int(81));
    }

    #[test]
    fn test_library_is_sealed_after_compile() {
        let mut engine = Engine::new(Config::captured());
        engine
            .library_mut()
            .function("int twice(int)", |_, args| Ok(Value::Int(args.int(0)? * 2)))
            .unwrap();
        let unit = engine.compile("twice(21);", Grammar::Js).unwrap();
        assert_eq!(engine.execute(&unit, None, Vec::new()).unwrap(), Value::Int(42));

        let err = engine
            .library_mut()
            .function("int late(int)", |_, _| Ok(Value::Null))
            .unwrap_err();
        assert_eq!(err, BindingError::Sealed("late".to_string()));
    }

    #[test]
    fn test_interrupt_is_installed_on_the_engine() {
        let mut engine = Engine::new(Config::captured());
        engine.set_interrupt(|probe| probe.steps < 10);
        let unit = engine.compile("while (true) {}", Grammar::Cpp).unwrap();
        let err = engine.execute(&unit, None, Vec::new()).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Interrupted(10));

        engine.clear_interrupt();
        let unit = engine.compile("1 + 1;", Grammar::Cpp).unwrap();
        assert_eq!(engine.execute(&unit, None, Vec::new()).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_without_stdlib_printf_is_unknown() {
        let config = Config {
            stdlib: false,
            ..Config::captured()
        };
        let mut engine = Engine::new(config);
        let unit = engine.compile("printf(\"x\");", Grammar::Cpp).unwrap();
        let err = engine.execute(&unit, None, Vec::new()).unwrap_err();
        assert_eq!(err.kind_name(), "NameError");
        assert_eq!(engine.heap().stats().live(), 0);
    }
}
