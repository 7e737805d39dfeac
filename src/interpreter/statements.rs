use super::{Flow, Interpreter};
use crate::ast::{Expression, Statement, StatementKind, VarDecl};
use crate::error::{RuntimeError, RuntimeResult};
use crate::value::{coerce, default_value, Value};
use crate::variable::Variable;

impl Interpreter<'_> {
    pub(crate) fn execute(&mut self, statement: &Statement) -> RuntimeResult<Flow> {
        self.guard_stack(statement.location)?;
        match &statement.kind {
            StatementKind::Expression(expr) => {
                let value = self.evaluate(expr)?;
                if self.env.depth() == 0 {
                    self.last_value = value;
                }
                Ok(Flow::Normal)
            }
            StatementKind::VarDecl(declarations) => {
                for decl in declarations {
                    self.declare_variable(decl)?;
                }
                Ok(Flow::Normal)
            }
            StatementKind::Block(statements) => self.execute_block(statements),
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StatementKind::While { condition, body } => self.execute_while(condition, body),
            StatementKind::DoWhile { body, condition } => self.execute_do_while(body, condition),
            StatementKind::For {
                init,
                condition,
                update,
                body,
            } => self.scoped(|this| {
                if let Some(init) = init {
                    this.execute(init)?;
                }
                this.execute_for(condition.as_ref(), update.as_ref(), body)
            }),
            StatementKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            StatementKind::Break => Ok(Flow::Break),
            StatementKind::Continue => Ok(Flow::Continue),
            // Declarations were bound by the resolver.
            StatementKind::Function(_)
            | StatementKind::Class(_)
            | StatementKind::Enum(_)
            | StatementKind::Empty => Ok(Flow::Normal),
        }
    }

    /// Statements in order, stopping at the first non-normal completion.
    pub(crate) fn execute_statements(&mut self, statements: &[Statement]) -> RuntimeResult<Flow> {
        for statement in statements {
            match self.execute(statement)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_block(&mut self, statements: &[Statement]) -> RuntimeResult<Flow> {
        self.scoped(|this| this.execute_statements(statements))
    }

    fn execute_while(&mut self, condition: &Expression, body: &Statement) -> RuntimeResult<Flow> {
        loop {
            self.checkpoint(body.location)?;
            if !self.evaluate(condition)?.is_truthy() {
                break;
            }
            match self.execute(body)? {
                Flow::Break => break,
                Flow::Normal | Flow::Continue => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_do_while(&mut self, body: &Statement, condition: &Expression) -> RuntimeResult<Flow> {
        loop {
            self.checkpoint(body.location)?;
            match self.execute(body)? {
                Flow::Break => break,
                Flow::Normal | Flow::Continue => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
            if !self.evaluate(condition)?.is_truthy() {
                break;
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_for(
        &mut self,
        condition: Option<&Expression>,
        update: Option<&Expression>,
        body: &Statement,
    ) -> RuntimeResult<Flow> {
        loop {
            self.checkpoint(body.location)?;
            if let Some(condition) = condition {
                if !self.evaluate(condition)?.is_truthy() {
                    break;
                }
            }
            match self.execute(body)? {
                Flow::Break => break,
                Flow::Normal | Flow::Continue => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
            if let Some(update) = update {
                self.evaluate(update)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn declare_variable(&mut self, decl: &VarDecl) -> RuntimeResult<()> {
        let unit = self.unit;
        let value = match &decl.initializer {
            Some(expr) => self.evaluate(expr)?,
            None => match &decl.var_type {
                Some(var_type) => default_value(var_type, &unit.types),
                None => Value::Null,
            },
        };
        let value = match &decl.var_type {
            Some(var_type) => coerce(value, var_type, &unit.types).map_err(|message| {
                RuntimeError::type_error(
                    format!("cannot initialise '{}': {}", decl.name, message),
                    decl.location,
                )
            })?,
            None => value,
        };
        tracing::trace!(name = %decl.name, "declared variable");
        self.env.declare(Variable::new(
            decl.name.clone(),
            decl.var_type.clone(),
            value,
            decl.constant,
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::error::RuntimeResult;
    use crate::heap::Heap;
    use crate::interpreter::Interpreter;
    use crate::lexer::Grammar;
    use crate::library::{HostState, Library};
    use crate::parser::parse;
    use crate::resolver::resolve;
    use crate::value::Value;

    fn run(source: &str, grammar: Grammar) -> RuntimeResult<Value> {
        let library = Library::new();
        let unit = resolve(parse(source, grammar).unwrap(), grammar, &library).unwrap();
        let heap = Heap::new();
        let mut state = HostState::new(true);
        let config = Config::default();
        Interpreter::new(&unit, &heap, &mut state, &config, None).run(None, Vec::new())
    }

    #[test]
    fn test_block_locals_are_gone_after_the_block() {
        let err = run("{ int inner = 1; } inner;", Grammar::Cpp).unwrap_err();
        assert_eq!(err.kind_name(), "NameError");
        assert_eq!(
            run("int x = 1; { int x = 2; } x;", Grammar::Cpp).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            run("let x = 1; { x = x + 5; } x;", Grammar::Js).unwrap(),
            Value::Int(6)
        );
    }

    #[test]
    fn test_for_loop_variable_is_scoped_to_the_loop() {
        let err = run("for (let i = 0; i < 3; i++) {} i;", Grammar::Js).unwrap_err();
        assert_eq!(err.kind_name(), "NameError");
    }

    #[test]
    fn test_typed_declarations_default_and_coerce() {
        assert_eq!(run("double d; d;", Grammar::Cpp).unwrap(), Value::Float(0.0));
        assert_eq!(run("int n = 2.9; n;", Grammar::Cpp).unwrap(), Value::Int(2));
        assert_eq!(run("string s; s;", Grammar::Cpp).unwrap(), Value::string(""));
        let err = run("int n = \"text\";", Grammar::Cpp).unwrap_err();
        assert_eq!(err.kind_name(), "TypeError");
    }

    #[test]
    fn test_constants_cannot_be_reassigned() {
        let err = run("const k = 1; k = 2;", Grammar::Js).unwrap_err();
        assert_eq!(err.kind_name(), "TypeError");
    }

    #[test]
    fn test_return_leaves_nested_loops() {
        let source = "
            function find(limit) {
                for (let i = 0; i < limit; i++) {
                    let j = 0;
                    while (true) {
                        if (i * j == 12) { return i * 10 + j; }
                        if (j > i) { break; }
                        j++;
                    }
                }
                return -1;
            }
            find(10);";
        assert_eq!(run(source, Grammar::Js).unwrap(), Value::Int(34));
    }
}
