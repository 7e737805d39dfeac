//! Host bridge: the registration table of host functions, constants and
//! classes, and the context host code runs in.
//!
//! Everything a script can call that is not written in the script itself
//! comes through here, the standard library included. Each entry is a
//! C-style prototype plus a Rust closure; arguments are marshalled by the
//! prototype before the closure sees them.

pub mod marshal;
pub mod signature;
pub mod stdlib;

pub use marshal::Args;
pub use signature::{parse_field, parse_prototype};

use crate::error::BindingError;
use crate::heap::{Heap, ObjectRef};
use crate::types::{Signature, Type, TypeRegistry};
use crate::value::{coerce, default_value, Value};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use std::time::Instant;

pub type HostResult = Result<Value, BindingError>;

type FunctionCallable = dyn Fn(&mut HostContext, Args) -> HostResult;
type MethodCallable = dyn Fn(&mut HostContext, &ObjectRef, Args) -> HostResult;
type ConstructorCallable = dyn Fn(&mut HostContext, Args) -> Result<Box<dyn Any>, BindingError>;

pub struct HostFunction {
    pub signature: Signature,
    callable: Box<FunctionCallable>,
}

impl HostFunction {
    pub fn new<F>(signature: Signature, callable: F) -> Self
    where
        F: Fn(&mut HostContext, Args) -> HostResult + 'static,
    {
        Self {
            signature,
            callable: Box::new(callable),
        }
    }

    /// Call with arguments already marshalled against `signature`.
    pub fn invoke(&self, context: &mut HostContext, args: Args) -> HostResult {
        (self.callable)(context, args)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HostFunction({})", self.signature)
    }
}

pub struct HostMethod {
    pub signature: Signature,
    callable: Box<MethodCallable>,
}

impl HostMethod {
    pub fn invoke(&self, context: &mut HostContext, this: &ObjectRef, args: Args) -> HostResult {
        (self.callable)(context, this, args)
    }
}

impl fmt::Debug for HostMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HostMethod({})", self.signature)
    }
}

/// Builds the opaque handle stored inside instances of a host class.
pub struct HostConstructor {
    pub signature: Signature,
    callable: Box<ConstructorCallable>,
}

impl HostConstructor {
    pub fn invoke(&self, context: &mut HostContext, args: Args) -> Result<Box<dyn Any>, BindingError> {
        (self.callable)(context, args)
    }
}

impl fmt::Debug for HostConstructor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HostConstructor({})", self.signature)
    }
}

/// Declaration of a class implemented by the host.
#[derive(Debug)]
pub struct HostClass {
    pub name: String,
    pub base: Option<String>,
    pub fields: Vec<(String, Type)>,
    pub constructor: Option<Rc<HostConstructor>>,
    pub methods: Vec<Rc<HostMethod>>,
}

impl HostClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            fields: Vec::new(),
            constructor: None,
            methods: Vec::new(),
        }
    }

    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Add a script-visible field from a declaration such as `"int tm_sec"`.
    pub fn field(mut self, declaration: &str) -> Result<Self, BindingError> {
        let (name, field_type) = parse_field(declaration)?;
        if self.fields.iter().any(|(existing, _)| *existing == name) {
            return Err(BindingError::Duplicate(format!("{}.{}", self.name, name)));
        }
        self.fields.push((name, field_type));
        Ok(self)
    }

    /// The prototype names the class, e.g. `"FILE(string, string)"`.
    pub fn constructor<F>(mut self, prototype: &str, callable: F) -> Result<Self, BindingError>
    where
        F: Fn(&mut HostContext, Args) -> Result<Box<dyn Any>, BindingError> + 'static,
    {
        let signature = parse_prototype(prototype)?;
        if signature.name != self.name {
            return Err(BindingError::Prototype {
                prototype: prototype.to_string(),
                message: format!("constructor must be named '{}'", self.name),
            });
        }
        self.constructor = Some(Rc::new(HostConstructor {
            signature,
            callable: Box::new(callable),
        }));
        Ok(self)
    }

    pub fn method<F>(mut self, prototype: &str, callable: F) -> Result<Self, BindingError>
    where
        F: Fn(&mut HostContext, &ObjectRef, Args) -> HostResult + 'static,
    {
        let signature = parse_prototype(prototype)?;
        if self.methods.iter().any(|m| m.signature.name == signature.name)
            || self.fields.iter().any(|(name, _)| *name == signature.name)
        {
            return Err(BindingError::Duplicate(format!(
                "{}.{}",
                self.name, signature.name
            )));
        }
        self.methods.push(Rc::new(HostMethod {
            signature,
            callable: Box::new(callable),
        }));
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct HostConstant {
    pub name: String,
    pub constant_type: Type,
    pub value: Value,
}

/// Registration table shared by every unit an engine compiles. It is
/// sealed by the first compilation.
#[derive(Debug, Default)]
pub struct Library {
    functions: HashMap<String, Rc<HostFunction>>,
    constants: HashMap<String, HostConstant>,
    classes: HashMap<String, Rc<HostClass>>,
    sealed: bool,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seal(&mut self) {
        if !self.sealed {
            tracing::debug!(
                functions = self.functions.len(),
                constants = self.constants.len(),
                classes = self.classes.len(),
                "host library sealed"
            );
        }
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn check_open(&self, name: &str) -> Result<(), BindingError> {
        if self.sealed {
            return Err(BindingError::Sealed(name.to_string()));
        }
        if self.contains(name) {
            return Err(BindingError::Duplicate(name.to_string()));
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
            || self.constants.contains_key(name)
            || self.classes.contains_key(name)
    }

    /// Register a host function from a C prototype such as
    /// `"int printf(string, ...)"`.
    pub fn function<F>(&mut self, prototype: &str, callable: F) -> Result<&mut Self, BindingError>
    where
        F: Fn(&mut HostContext, Args) -> HostResult + 'static,
    {
        let signature = parse_prototype(prototype)?;
        self.check_open(&signature.name)?;
        tracing::trace!(%signature, "registered host function");
        self.functions.insert(
            signature.name.clone(),
            Rc::new(HostFunction::new(signature, callable)),
        );
        Ok(self)
    }

    pub fn constant(
        &mut self,
        name: &str,
        constant_type: Type,
        value: impl Into<Value>,
    ) -> Result<&mut Self, BindingError> {
        self.check_open(name)?;
        let value = coerce(value.into(), &constant_type, &TypeRegistry::default()).map_err(
            |message| BindingError::Prototype {
                prototype: name.to_string(),
                message,
            },
        )?;
        self.constants.insert(
            name.to_string(),
            HostConstant {
                name: name.to_string(),
                constant_type,
                value,
            },
        );
        Ok(self)
    }

    pub fn class(&mut self, class: HostClass) -> Result<&mut Self, BindingError> {
        self.check_open(&class.name)?;
        if let Some(base) = &class.base {
            if !self.classes.contains_key(base) {
                return Err(BindingError::Host(format!(
                    "host class '{}' extends unregistered class '{}'",
                    class.name, base
                )));
            }
        }
        tracing::trace!(class = %class.name, "registered host class");
        self.classes.insert(class.name.clone(), Rc::new(class));
        Ok(self)
    }

    pub fn host_function(&self, name: &str) -> Option<&Rc<HostFunction>> {
        self.functions.get(name)
    }

    pub fn host_constant(&self, name: &str) -> Option<&HostConstant> {
        self.constants.get(name)
    }

    pub fn host_class(&self, name: &str) -> Option<&Rc<HostClass>> {
        self.classes.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Rc<HostFunction>> {
        self.functions.values()
    }

    pub fn constants(&self) -> impl Iterator<Item = &HostConstant> {
        self.constants.values()
    }

    /// Host classes with every base ahead of its subclasses.
    pub fn classes(&self) -> Vec<&Rc<HostClass>> {
        let mut ordered: Vec<&Rc<HostClass>> = Vec::new();
        let mut names: Vec<&String> = self.classes.keys().collect();
        names.sort();
        while ordered.len() < names.len() {
            let before = ordered.len();
            for name in &names {
                let class = &self.classes[*name];
                if ordered.iter().any(|c| c.name == class.name) {
                    continue;
                }
                let base_ready = match &class.base {
                    Some(base) => ordered.iter().any(|c| c.name == *base),
                    None => true,
                };
                if base_ready {
                    ordered.push(class);
                }
            }
            if ordered.len() == before {
                break;
            }
        }
        ordered
    }
}

/// Where script-visible stdout goes.
#[derive(Debug)]
pub enum Output {
    Stdout,
    Captured(String),
}

/// Process-like state host functions share: stdio, `errno`, the random
/// generator and the clock origin.
pub struct HostState {
    output: Output,
    input: Box<dyn BufRead>,
    pub errno: i64,
    pub rng: StdRng,
    started: Instant,
}

impl HostState {
    pub fn new(capture_output: bool) -> Self {
        Self {
            output: if capture_output {
                Output::Captured(String::new())
            } else {
                Output::Stdout
            },
            input: Box::new(io::BufReader::new(io::stdin())),
            errno: 0,
            rng: StdRng::seed_from_u64(1),
            started: Instant::now(),
        }
    }

    /// Replace script stdin, e.g. with an in-memory buffer.
    pub fn set_input(&mut self, input: Box<dyn BufRead>) {
        self.input = input;
    }

    /// Captured output so far; empty when writing to the real stdout.
    pub fn take_output(&mut self) -> String {
        match &mut self.output {
            Output::Captured(buffer) => std::mem::take(buffer),
            Output::Stdout => String::new(),
        }
    }
}

impl fmt::Debug for HostState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HostState")
            .field("output", &self.output)
            .field("errno", &self.errno)
            .finish()
    }
}

/// What a host callable sees of the running interpreter.
pub struct HostContext<'a> {
    heap: &'a Heap,
    types: &'a TypeRegistry,
    state: &'a mut HostState,
}

impl<'a> HostContext<'a> {
    pub fn new(heap: &'a Heap, types: &'a TypeRegistry, state: &'a mut HostState) -> Self {
        Self { heap, types, state }
    }

    pub fn heap(&self) -> &Heap {
        self.heap
    }

    pub fn types(&self) -> &TypeRegistry {
        self.types
    }

    pub fn write(&mut self, text: &str) -> Result<(), BindingError> {
        match &mut self.state.output {
            Output::Captured(buffer) => {
                buffer.push_str(text);
                Ok(())
            }
            Output::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout
                    .write_all(text.as_bytes())
                    .and_then(|_| stdout.flush())
                    .map_err(|err| BindingError::Host(format!("stdout: {}", err)))
            }
        }
    }

    /// One line of stdin without its terminator; `None` at end of input.
    pub fn read_line(&mut self) -> Result<Option<String>, BindingError> {
        let mut line = String::new();
        let read = self
            .state
            .input
            .read_line(&mut line)
            .map_err(|err| BindingError::Host(format!("stdin: {}", err)))?;
        if read == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    pub fn read_byte(&mut self) -> Result<Option<u8>, BindingError> {
        let buffer = self
            .state
            .input
            .fill_buf()
            .map_err(|err| BindingError::Host(format!("stdin: {}", err)))?;
        match buffer.first().copied() {
            Some(byte) => {
                self.state.input.consume(1);
                Ok(Some(byte))
            }
            None => Ok(None),
        }
    }

    pub fn errno(&self) -> i64 {
        self.state.errno
    }

    pub fn set_errno(&mut self, errno: i64) {
        self.state.errno = errno;
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.state.rng
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.state.started.elapsed()
    }

    pub fn new_array(&self, items: Vec<Value>) -> Value {
        Value::Object(self.heap.alloc_array(items))
    }

    /// Allocate an instance of a registered class with default field values.
    pub fn new_instance(
        &self,
        class: &str,
        handle: Option<Box<dyn Any>>,
    ) -> Result<ObjectRef, BindingError> {
        let info = self
            .types
            .class(class)
            .ok_or_else(|| BindingError::Host(format!("unknown class '{}'", class)))?;
        let fields = info
            .fields
            .iter()
            .map(|field| default_value(&field.field_type, self.types))
            .collect();
        Ok(self.heap.alloc_instance(Rc::clone(info), fields, handle))
    }

    pub fn get_field(&self, object: &ObjectRef, name: &str) -> Result<Value, BindingError> {
        let object = object.borrow();
        let instance = object
            .as_instance()
            .ok_or_else(|| BindingError::Host(format!("{} has no fields", object.type_name())))?;
        let slot = instance.class.field_slot(name).ok_or_else(|| {
            BindingError::Host(format!("{} has no field '{}'", instance.class.name, name))
        })?;
        Ok(instance.fields[slot].clone())
    }

    pub fn set_field(&self, object: &ObjectRef, name: &str, value: Value) -> Result<(), BindingError> {
        let mut object = object.borrow_mut();
        let type_name = object.type_name();
        let instance = object
            .as_instance_mut()
            .ok_or_else(|| BindingError::Host(format!("{} has no fields", type_name)))?;
        let slot = instance
            .class
            .field_slot(name)
            .ok_or_else(|| BindingError::Host(format!("{} has no field '{}'", type_name, name)))?;
        let field_type = instance.class.fields[slot].field_type.clone();
        instance.fields[slot] =
            coerce(value, &field_type, self.types).map_err(BindingError::Host)?;
        Ok(())
    }
}

/// Run `f` with the instance's host handle downcast to `T`.
pub fn with_handle<T: 'static, R>(
    object: &ObjectRef,
    f: impl FnOnce(&mut T) -> Result<R, BindingError>,
) -> Result<R, BindingError> {
    let mut object = object.borrow_mut();
    let type_name = object.type_name();
    match object.host_mut::<T>() {
        Some(handle) => f(handle),
        None => Err(BindingError::Handle(type_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut HostContext, _: Args) -> HostResult {
        Ok(Value::Null)
    }

    #[test]
    fn test_duplicate_names_are_rejected_across_kinds() {
        let mut library = Library::new();
        library.function("int f(int)", noop).unwrap();
        assert_eq!(
            library.function("double f(double)", noop).unwrap_err(),
            BindingError::Duplicate("f".into())
        );
        assert_eq!(
            library.constant("f", Type::Int, 1i64).unwrap_err(),
            BindingError::Duplicate("f".into())
        );
        assert!(library.class(HostClass::new("f")).is_err());
    }

    #[test]
    fn test_sealed_library_refuses_registration() {
        let mut library = Library::new();
        library.seal();
        assert_eq!(
            library.function("int g()", noop).unwrap_err(),
            BindingError::Sealed("g".into())
        );
    }

    #[test]
    fn test_host_class_builder() {
        let class = HostClass::new("Counter")
            .field("int count")
            .unwrap()
            .constructor("Counter()", |_, _| Ok(Box::new(0i64) as Box<dyn Any>))
            .unwrap()
            .method("int bump(int)", |_, _, _| Ok(Value::Null))
            .unwrap();
        assert_eq!(class.fields, vec![("count".to_string(), Type::Int)]);
        assert_eq!(class.methods[0].signature.params, vec![Type::Int]);
        assert!(HostClass::new("Counter")
            .constructor("Other()", |_, _| Ok(Box::new(()) as Box<dyn Any>))
            .is_err());
        assert!(HostClass::new("C").field("int a").unwrap().field("double a").is_err());
    }

    #[test]
    fn test_classes_are_ordered_base_first() {
        let mut library = Library::new();
        library.class(HostClass::new("Base")).unwrap();
        library.class(HostClass::new("Aa").extends("Base")).unwrap();
        let names: Vec<&str> = library.classes().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Base", "Aa"]);
        assert!(library.class(HostClass::new("X").extends("Missing")).is_err());
    }

    #[test]
    fn test_captured_output_and_input() {
        let heap = Heap::new();
        let types = TypeRegistry::default();
        let mut state = HostState::new(true);
        state.set_input(Box::new(io::Cursor::new("ab\nrest\n")));
        let mut context = HostContext::new(&heap, &types, &mut state);
        context.write("hello ").unwrap();
        context.write("world").unwrap();
        assert_eq!(context.read_byte().unwrap(), Some(b'a'));
        assert_eq!(context.read_line().unwrap(), Some("b".to_string()));
        assert_eq!(context.read_line().unwrap(), Some("rest".to_string()));
        assert_eq!(context.read_line().unwrap(), None);
        assert_eq!(state.take_output(), "hello world");
    }
}
