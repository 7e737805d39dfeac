use super::{Flow, Interpreter};
use crate::ast::{Expression, ExpressionKind, FunctionDecl, Statement, StatementKind};
use crate::error::{BindingError, RuntimeError, RuntimeErrorKind, RuntimeResult, SourceLocation};
use crate::heap::ObjectRef;
use crate::library::marshal::{marshal_arguments, marshal_return};
use crate::library::{HostConstructor, HostContext, HostFunction};
use crate::types::{ClassInfo, MethodBody, MethodInfo, Type};
use crate::value::{coerce, default_value, FunctionRef, Value};
use crate::variable::{Frame, Variable};
use std::rc::Rc;

/// What a call expression resolved to before its arguments are evaluated.
enum Callee {
    Function(FunctionRef),
    /// Receiver plus the method dispatch picked for it.
    Method(ObjectRef, MethodInfo),
}

/// Whether a constructor body starts its base explicitly with `super(...)`
/// or an initialiser-list entry.
fn calls_base_constructor(body: &[Statement]) -> bool {
    body.iter().any(|statement| {
        matches!(
            &statement.kind,
            StatementKind::Expression(Expression {
                kind: ExpressionKind::SuperCall { method: None, .. },
                ..
            })
        )
    })
}

impl Interpreter<'_> {
    pub(super) fn evaluate_call(
        &mut self,
        callee: &Expression,
        args: &[Expression],
        location: SourceLocation,
    ) -> RuntimeResult<Value> {
        match &callee.kind {
            ExpressionKind::Identifier(name) => {
                let callee = self.resolve_callee(name, location)?;
                let args = self.evaluate_all(args)?;
                self.call_callee(callee, args, location)
            }
            ExpressionKind::Member { object, member } => {
                let receiver = self.evaluate(object)?;
                let callee = self.resolve_member_callee(&receiver, member, location)?;
                let args = self.evaluate_all(args)?;
                self.call_callee(callee, args, location)
            }
            ExpressionKind::Scope { scope, member } => {
                let callee = self.resolve_scoped_callee(scope, member, location)?;
                let args = self.evaluate_all(args)?;
                self.call_callee(callee, args, location)
            }
            _ => {
                let value = self.evaluate(callee)?;
                let args = self.evaluate_all(args)?;
                self.call_value(value, args, location)
            }
        }
    }

    /// Locals, then methods of `this`, then unit functions, host functions
    /// and finally globals holding a function value.
    fn resolve_callee(&self, name: &str, location: SourceLocation) -> RuntimeResult<Callee> {
        let not_callable = |value: &Value| {
            RuntimeError::type_error(
                format!("'{}' is a {}, not a function", name, value.type_name()),
                location,
            )
        };

        if let Some(variable) = self.env.lookup_local(name) {
            return match &variable.value {
                Value::Function(function) => Ok(Callee::Function(function.clone())),
                other => Err(not_callable(other)),
            };
        }
        if let Some(this) = &self.env.frame().this {
            let method = this
                .borrow()
                .as_instance()
                .and_then(|instance| instance.class.find_method(name).cloned());
            if let Some(method) = method {
                return Ok(Callee::Method(Rc::clone(this), method));
            }
        }
        let unit = self.unit;
        if let Some(decl) = unit.functions.get(name) {
            return Ok(Callee::Function(FunctionRef::Script(Rc::clone(decl))));
        }
        if let Some(function) = unit.host_functions.get(name) {
            return Ok(Callee::Function(FunctionRef::Host(Rc::clone(function))));
        }
        match self.env.global(name) {
            Some(Variable {
                value: Value::Function(function),
                ..
            }) => Ok(Callee::Function(function.clone())),
            Some(variable) => Err(not_callable(&variable.value)),
            None => Err(RuntimeError::name_error(
                format!("function '{}' is not defined", name),
                location,
            )),
        }
    }

    /// Dispatch on the receiver's dynamic class.
    fn resolve_member_callee(
        &self,
        receiver: &Value,
        member: &str,
        location: SourceLocation,
    ) -> RuntimeResult<Callee> {
        let object = match receiver {
            Value::Object(object) => object,
            Value::Null => {
                return Err(RuntimeError::type_error(
                    format!("cannot call '{}' on null", member),
                    location,
                ))
            }
            other => {
                return Err(RuntimeError::type_error(
                    format!("{} has no method '{}'", other.type_name(), member),
                    location,
                ))
            }
        };
        let method = object
            .borrow()
            .as_instance()
            .and_then(|instance| instance.class.find_method(member).cloned());
        if let Some(method) = method {
            return Ok(Callee::Method(Rc::clone(object), method));
        }
        match self.read_member(receiver, member, location)? {
            Value::Function(function) => Ok(Callee::Function(function)),
            other => Err(RuntimeError::type_error(
                format!("'{}' is a {}, not a function", member, other.type_name()),
                location,
            )),
        }
    }

    /// `Base::method(...)` from inside a method: the named ancestor's
    /// implementation, bypassing dynamic dispatch.
    fn resolve_scoped_callee(
        &self,
        scope: &str,
        member: &str,
        location: SourceLocation,
    ) -> RuntimeResult<Callee> {
        let frame = self.env.frame();
        if let (Some(this), Some(class)) = (&frame.this, &frame.class) {
            if let Some(ancestor) = class.ancestor(scope) {
                return match ancestor.find_method(member) {
                    Some(method) => Ok(Callee::Method(Rc::clone(this), method.clone())),
                    None => Err(RuntimeError::name_error(
                        format!("'{}' has no method '{}'", scope, member),
                        location,
                    )),
                };
            }
        }
        if self.unit.types.is_enum(scope) {
            return Err(RuntimeError::type_error(
                format!("'{}::{}' is not a function", scope, member),
                location,
            ));
        }
        Err(RuntimeError::name_error(
            format!("'{}::{}' is not callable here", scope, member),
            location,
        ))
    }

    fn call_callee(
        &mut self,
        callee: Callee,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> RuntimeResult<Value> {
        match callee {
            Callee::Function(function) => self.call_function(&function, args, location),
            Callee::Method(this, method) => self.call_method(&this, &method, args, location),
        }
    }

    pub(crate) fn call_value(
        &mut self,
        value: Value,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> RuntimeResult<Value> {
        match value {
            Value::Function(function) => self.call_function(&function, args, location),
            other => Err(RuntimeError::type_error(
                format!("{} is not a function", other.type_name()),
                location,
            )),
        }
    }

    fn call_function(
        &mut self,
        function: &FunctionRef,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> RuntimeResult<Value> {
        match function {
            FunctionRef::Script(decl) => self.call_script(decl, None, args, location),
            FunctionRef::Host(function) => self.call_host(function, args, location),
        }
    }

    /// Run a script function in a fresh frame. The depth limit is checked
    /// before the frame exists, so the failing call leaves no trace entry.
    pub(crate) fn call_script(
        &mut self,
        decl: &Rc<FunctionDecl>,
        this: Option<(ObjectRef, Rc<ClassInfo>)>,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> RuntimeResult<Value> {
        let limit = self.config.max_call_depth;
        if self.env.depth() >= limit {
            tracing::debug!(function = %decl.name, limit, "call depth exceeded");
            return Err(RuntimeError::new(RuntimeErrorKind::StackOverflow(limit), location));
        }
        self.checkpoint(location)?;

        let Some(body) = &decl.body else {
            crate::internal_error!("prototype '{}' reached the evaluator", decl.name);
        };
        if args.len() < decl.required_params() || args.len() > decl.params.len() {
            let expected = if decl.required_params() == decl.params.len() {
                decl.params.len().to_string()
            } else {
                format!("{} to {}", decl.required_params(), decl.params.len())
            };
            return Err(RuntimeError::type_error(
                format!(
                    "'{}' expects {} argument(s), got {}",
                    decl.name,
                    expected,
                    args.len()
                ),
                location,
            ));
        }

        let frame_name = match &this {
            Some((_, class)) => format!("{}::{}", class.name, decl.name),
            None => decl.name.clone(),
        };
        let frame = match this {
            Some((object, class)) => Frame::method(frame_name.clone(), object, class, location),
            None => Frame::new(frame_name.clone(), location),
        };
        self.env.push_frame(frame);
        let result = self.bind_and_run(decl, body, args);
        self.env.pop_frame();
        result.map_err(|err| err.with_frame(frame_name, location))
    }

    fn bind_and_run(
        &mut self,
        decl: &FunctionDecl,
        body: &[Statement],
        args: Vec<Value>,
    ) -> RuntimeResult<Value> {
        let unit = self.unit;
        let mut args = args.into_iter();
        for param in &decl.params {
            let value = match (args.next(), &param.default) {
                (Some(value), _) => value,
                // Defaults see the earlier parameters.
                (None, Some(default)) => self.evaluate(default)?,
                (None, None) => crate::internal_error!("missing argument for '{}'", param.name),
            };
            let value = coerce(value, &param.param_type, &unit.types).map_err(|message| {
                RuntimeError::type_error(
                    format!("argument '{}' of '{}': {}", param.name, decl.name, message),
                    param.location,
                )
            })?;
            let var_type = match &param.param_type {
                Type::Any => None,
                other => Some(other.clone()),
            };
            self.env
                .declare(Variable::new(param.name.clone(), var_type, value, false));
        }

        match self.execute_statements(body)? {
            Flow::Return(value) => coerce(value, &decl.return_type, &unit.types).map_err(|message| {
                RuntimeError::type_error(
                    format!("'{}' returns {}: {}", decl.name, decl.return_type, message),
                    decl.location,
                )
            }),
            Flow::Normal => Ok(default_value(&decl.return_type, &unit.types)),
            Flow::Break | Flow::Continue => Err(RuntimeError::type_error(
                "break or continue outside of a loop",
                decl.location,
            )),
        }
    }

    pub(crate) fn call_host(
        &mut self,
        function: &Rc<HostFunction>,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> RuntimeResult<Value> {
        self.checkpoint(location)?;
        let unit = self.unit;
        let binding = |err: BindingError| RuntimeError::binding(err, location);
        let args = marshal_arguments(&function.signature, args, &unit.types).map_err(binding)?;
        tracing::trace!(function = %function.signature.name, "host call");
        let mut context = HostContext::new(self.heap, &unit.types, &mut *self.state);
        let value = function.invoke(&mut context, args).map_err(binding)?;
        marshal_return(&function.signature, value, &unit.types).map_err(binding)
    }

    pub(crate) fn call_method(
        &mut self,
        this: &ObjectRef,
        method: &MethodInfo,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> RuntimeResult<Value> {
        self.check_access(&method.owner, method.visibility, &method.name, location)?;
        match &method.body {
            MethodBody::Script(decl) => {
                let owner = self.class_rc(&method.owner);
                self.call_script(decl, Some((Rc::clone(this), owner)), args, location)
            }
            MethodBody::Host(host) => {
                self.checkpoint(location)?;
                let unit = self.unit;
                let binding = |err: BindingError| RuntimeError::binding(err, location);
                let args = marshal_arguments(&host.signature, args, &unit.types).map_err(binding)?;
                let mut context = HostContext::new(self.heap, &unit.types, &mut *self.state);
                let value = host.invoke(&mut context, this, args).map_err(binding)?;
                marshal_return(&host.signature, value, &unit.types).map_err(binding)
            }
            MethodBody::Abstract => Err(RuntimeError::type_error(
                format!("abstract method '{}::{}' has no body", method.owner, method.name),
                location,
            )),
        }
    }

    pub(super) fn evaluate_super_call(
        &mut self,
        method: Option<&str>,
        args: &[Expression],
        location: SourceLocation,
    ) -> RuntimeResult<Value> {
        let frame = self.env.frame();
        let (Some(this), Some(class)) = (frame.this.clone(), frame.class.clone()) else {
            return Err(RuntimeError::type_error("'super' used outside of a method", location));
        };
        let Some(base) = class.base.clone() else {
            return Err(RuntimeError::type_error(
                format!("'{}' has no base class", class.name),
                location,
            ));
        };
        match method {
            None => {
                let args = self.evaluate_all(args)?;
                self.construct(&base, &this, args, location)?;
                Ok(Value::Null)
            }
            Some(name) => {
                let Some(method) = base.find_method(name).cloned() else {
                    return Err(RuntimeError::name_error(
                        format!("'{}' has no method '{}'", base.name, name),
                        location,
                    ));
                };
                let args = self.evaluate_all(args)?;
                self.call_method(&this, &method, args, location)
            }
        }
    }

    /// Run the constructor chain of `class` on an allocated instance.
    /// A script constructor that does not call its base explicitly gets
    /// the base constructed with no arguments first.
    pub(super) fn construct(
        &mut self,
        class: &Rc<ClassInfo>,
        object: &ObjectRef,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> RuntimeResult<()> {
        if let Some(ctor) = &class.constructor {
            let MethodBody::Script(decl) = &ctor.body else {
                crate::internal_error!("constructor of '{}' is not a script body", class.name);
            };
            self.check_access(&ctor.owner, ctor.visibility, &class.name, location)?;
            let explicit_base = decl.body.as_deref().map_or(false, calls_base_constructor);
            if let (Some(base), false) = (&class.base, explicit_base) {
                self.construct(base, object, Vec::new(), location)?;
            }
            self.call_script(decl, Some((Rc::clone(object), Rc::clone(class))), args, location)?;
            return Ok(());
        }
        if let Some(host) = &class.host_constructor {
            return self.construct_host(host, object, args, location);
        }
        match &class.base {
            Some(base) => self.construct(base, object, args, location),
            None if args.is_empty() => Ok(()),
            None => Err(RuntimeError::type_error(
                format!("'{}' has no constructor taking {} argument(s)", class.name, args.len()),
                location,
            )),
        }
    }

    pub(super) fn construct_host(
        &mut self,
        ctor: &Rc<HostConstructor>,
        object: &ObjectRef,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> RuntimeResult<()> {
        let unit = self.unit;
        let binding = |err: BindingError| RuntimeError::binding(err, location);
        let args = marshal_arguments(&ctor.signature, args, &unit.types).map_err(binding)?;
        let mut context = HostContext::new(self.heap, &unit.types, &mut *self.state);
        let handle = ctor.invoke(&mut context, args).map_err(binding)?;
        if let Some(instance) = object.borrow_mut().as_instance_mut() {
            instance.host = Some(handle);
        }
        Ok(())
    }

    /// Evaluate `f` with `this` bound, as field initialisers need. Counts
    /// against the call depth like a script call.
    pub(super) fn in_method_frame<T>(
        &mut self,
        name: String,
        object: &ObjectRef,
        class: Rc<ClassInfo>,
        location: SourceLocation,
        f: impl FnOnce(&mut Self) -> RuntimeResult<T>,
    ) -> RuntimeResult<T> {
        let limit = self.config.max_call_depth;
        if self.env.depth() >= limit {
            tracing::debug!(frame = %name, limit, "call depth exceeded");
            return Err(RuntimeError::new(RuntimeErrorKind::StackOverflow(limit), location));
        }
        self.checkpoint(location)?;
        self.env
            .push_frame(Frame::method(name, Rc::clone(object), class, location));
        let result = f(self);
        self.env.pop_frame();
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::error::{RuntimeError, RuntimeErrorKind};
    use crate::heap::Heap;
    use crate::interpreter::Interpreter;
    use crate::lexer::Grammar;
    use crate::library::{HostClass, HostState, Library};
    use crate::parser::parse;
    use crate::resolver::resolve;
    use crate::value::Value;
    use std::any::Any;

    fn run_in(library: &Library, source: &str, grammar: Grammar) -> Result<Value, RuntimeError> {
        let unit = resolve(parse(source, grammar).unwrap(), grammar, library).unwrap();
        let heap = Heap::new();
        let mut state = HostState::new(true);
        let config = Config::default();
        Interpreter::new(&unit, &heap, &mut state, &config, None).run(None, Vec::new())
    }

    fn run(source: &str, grammar: Grammar) -> Result<Value, RuntimeError> {
        run_in(&Library::new(), source, grammar)
    }

    #[test]
    fn test_constructors_and_methods() {
        let source = "
            class Point {
            public:
                int x, y;
                Point(int x0, int y0) : x(x0), y(y0) {}
                int sum() { return x + y; }
            };
            Point *p = new Point(2, 3);
            p->sum();";
        assert_eq!(run(source, Grammar::Cpp).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_dispatch_uses_the_dynamic_class() {
        let source = "
            class Shape { area() { return 0; } describe() { return this.area() * 2; } }
            class Square extends Shape {
                constructor(side) { super(); this.side = side; }
                side = 0;
                area() { return this.side * this.side; }
            }
            let s = new Square(3);
            s.describe();";
        assert_eq!(run(source, Grammar::Js).unwrap(), Value::Int(18));
    }

    #[test]
    fn test_base_implementation_calls() {
        let source = "
            class Base { public: virtual int f() { return 1; } };
            class Derived : public Base {
            public:
                int f() { return Base::f() + 10; }
            };
            Base *b = new Derived();
            b->f();";
        assert_eq!(run(source, Grammar::Cpp).unwrap(), Value::Int(11));

        let source = "
            class A { name() { return 'a'; } }
            class B extends A { name() { return super.name() + 'b'; } }
            new B().name();";
        assert_eq!(run(source, Grammar::Js).unwrap(), Value::string("ab"));
    }

    #[test]
    fn test_base_constructors_run_first() {
        let source = "
            class A { constructor() { this.log = this.log + 'A'; } log = ''; }
            class B extends A { constructor() { this.log = this.log + 'B'; } }
            new B().log;";
        assert_eq!(run(source, Grammar::Js).unwrap(), Value::string("AB"));
    }

    #[test]
    fn test_private_members_are_enforced() {
        let source = "
            class Account {
                #balance = 10;
                deposit(n) { this.#balance += n; return this.#balance; }
            }
            let a = new Account();
            a.deposit(5);";
        assert_eq!(run(source, Grammar::Js).unwrap(), Value::Int(15));

        let source = "
            class Account { private: int balance; public: Account() { balance = 3; } };
            Account *a = new Account();
            a->balance;";
        let err = run(source, Grammar::Cpp).unwrap_err();
        assert_eq!(err.kind_name(), "TypeError");
    }

    #[test]
    fn test_abstract_classes_cannot_be_instantiated() {
        let source = "
            class Shape { public: virtual int area() = 0; };
            Shape *s = new Shape();";
        let err = run(source, Grammar::Cpp).unwrap_err();
        assert_eq!(err.kind_name(), "TypeError");
    }

    #[test]
    fn test_arity_mismatch_and_unknown_functions() {
        let err = run("function f(a, b) { return a; } f(1);", Grammar::Js).unwrap_err();
        assert_eq!(err.kind_name(), "TypeError");
        let err = run("let x = 3; x();", Grammar::Js).unwrap_err();
        assert_eq!(err.kind_name(), "TypeError");
        let err = run("nothing(1, 2);", Grammar::Js).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::Name("function 'nothing' is not defined".into()));
    }

    #[test]
    fn test_errors_carry_a_call_trace() {
        let source = "function inner() { return missing; }\nfunction outer() { return inner(); }\nouter();";
        let err = run(source, Grammar::Js).unwrap_err();
        let names: Vec<&str> = err.trace.iter().map(|frame| frame.function.as_str()).collect();
        assert_eq!(names, vec!["inner", "outer"]);
        assert_eq!(err.trace[1].location.line, 3);
    }

    #[test]
    fn test_host_class_handles() {
        let mut library = Library::new();
        library
            .class(
                HostClass::new("Counter")
                    .constructor("Counter(int)", |_, args| {
                        Ok(Box::new(args.int(0)?) as Box<dyn Any>)
                    })
                    .unwrap()
                    .method("int bump(int)", |_, this, args| {
                        crate::library::with_handle::<i64, _>(this, |count| {
                            *count += args.int(0)?;
                            Ok(Value::Int(*count))
                        })
                    })
                    .unwrap(),
            )
            .unwrap();
        let source = "let c = new Counter(10); c.bump(2); c.bump(3);";
        assert_eq!(run_in(&library, source, Grammar::Js).unwrap(), Value::Int(15));

        let err = run_in(&library, "let c = new Counter();", Grammar::Js).unwrap_err();
        assert_eq!(err.kind_name(), "BindingError");
    }
}
