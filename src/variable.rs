use crate::error::SourceLocation;
use crate::heap::ObjectRef;
use crate::types::{ClassInfo, Type, TypeRegistry};
use crate::value::{coerce, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// A named binding with its declared type.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    /// `None` for dynamically typed bindings.
    pub var_type: Option<Type>,
    pub value: Value,
    pub constant: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>, var_type: Option<Type>, value: Value, constant: bool) -> Self {
        Self {
            name: name.into(),
            var_type,
            value,
            constant,
        }
    }

    /// Store a new value, applying the declared type's conversion.
    pub fn assign(&mut self, value: Value, types: &TypeRegistry) -> Result<(), String> {
        if self.constant {
            return Err(format!("cannot assign to constant '{}'", self.name));
        }
        self.value = match &self.var_type {
            Some(ty) => coerce(value, ty, types)?,
            None => value,
        };
        Ok(())
    }
}

/// Variables of one block in declaration order. Dropping a scope releases
/// them last-declared first, so host finalizers run in a fixed order.
#[derive(Debug, Default)]
pub struct Scope {
    variables: Vec<Variable>,
    index: HashMap<String, usize>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.index.get(name).map(|&slot| &self.variables[slot])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.index.get(name).map(|&slot| &mut self.variables[slot])
    }

    /// Redeclaring a name replaces the old binding in place.
    pub fn insert(&mut self, variable: Variable) {
        match self.index.get(&variable.name) {
            Some(&slot) => self.variables[slot] = variable,
            None => {
                self.index.insert(variable.name.clone(), self.variables.len());
                self.variables.push(variable);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        while self.variables.pop().is_some() {}
    }
}

/// Activation record of one call.
#[derive(Debug)]
pub struct Frame {
    pub function: String,
    pub this: Option<ObjectRef>,
    /// Class that declares the executing method; used for visibility checks
    /// and `super` resolution.
    pub class: Option<Rc<ClassInfo>>,
    pub call_site: SourceLocation,
    scopes: Vec<Scope>,
}

impl Frame {
    pub fn new(function: impl Into<String>, call_site: SourceLocation) -> Self {
        Self {
            function: function.into(),
            this: None,
            class: None,
            call_site,
            scopes: vec![Scope::default()],
        }
    }

    pub fn method(
        function: impl Into<String>,
        this: ObjectRef,
        class: Rc<ClassInfo>,
        call_site: SourceLocation,
    ) -> Self {
        let mut frame = Self::new(function, call_site);
        frame.this = Some(this);
        frame.class = Some(class);
        frame
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        while self.scopes.pop().is_some() {}
    }
}

/// Stack of call frames, each a stack of block scopes, over the globals.
/// Lookups see the current frame innermost-first and then the globals;
/// callers' locals are never visible.
#[derive(Debug)]
pub struct Environment {
    globals: Scope,
    frames: Vec<Frame>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        let mut top_level = Frame::new("<top-level>", SourceLocation::default());
        // Top-level declarations outside any block are globals.
        top_level.scopes.clear();
        Self {
            globals: Scope::default(),
            frames: vec![top_level],
        }
    }

    pub fn frame(&self) -> &Frame {
        match self.frames.last() {
            Some(frame) => frame,
            None => crate::internal_error!("environment has no frames"),
        }
    }

    fn frame_mut(&mut self) -> &mut Frame {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => crate::internal_error!("environment has no frames"),
        }
    }

    /// Number of active calls.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Frame {
        if self.frames.len() <= 1 {
            crate::internal_error!("popped the top-level frame");
        }
        match self.frames.pop() {
            Some(frame) => frame,
            None => crate::internal_error!("environment has no frames"),
        }
    }

    pub fn push_scope(&mut self) {
        self.frame_mut().scopes.push(Scope::default());
    }

    /// Dropping the scope releases every reference its variables held.
    pub fn pop_scope(&mut self) {
        if self.frame_mut().scopes.pop().is_none() {
            crate::internal_error!("scope stack underflow");
        }
    }

    pub fn declare(&mut self, variable: Variable) {
        let frame = self.frame_mut();
        match frame.scopes.last_mut() {
            Some(scope) => scope.insert(variable),
            None => self.globals.insert(variable),
        }
    }

    pub fn declare_global(&mut self, variable: Variable) {
        self.globals.insert(variable);
    }

    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.frame()
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.globals.get(name))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Variable> {
        let Environment { globals, frames } = self;
        let frame = match frames.last_mut() {
            Some(frame) => frame,
            None => crate::internal_error!("environment has no frames"),
        };
        for scope in frame.scopes.iter_mut().rev() {
            if let Some(variable) = scope.get_mut(name) {
                return Some(variable);
            }
        }
        globals.get_mut(name)
    }

    /// Only the current frame's block scopes, globals excluded.
    pub fn lookup_local(&self, name: &str) -> Option<&Variable> {
        self.frame()
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
    }

    pub fn lookup_local_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.frame_mut()
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
    }

    pub fn global(&self, name: &str) -> Option<&Variable> {
        self.globals.get(name)
    }

    pub fn global_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.globals.get_mut(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(name: &str, value: i64) -> Variable {
        Variable::new(name, Some(Type::Int), Value::Int(value), false)
    }

    #[test]
    fn test_block_scope_hides_inner_and_shadows_outer() {
        let mut env = Environment::new();
        env.declare(int("x", 1));
        env.push_scope();
        assert_eq!(env.lookup("x").map(|v| v.value.clone()), Some(Value::Int(1)));
        env.declare(int("x", 2));
        env.declare(int("y", 3));
        assert_eq!(env.lookup("x").map(|v| v.value.clone()), Some(Value::Int(2)));
        env.pop_scope();
        assert_eq!(env.lookup("x").map(|v| v.value.clone()), Some(Value::Int(1)));
        assert!(env.lookup("y").is_none());
    }

    #[test]
    fn test_frames_do_not_see_caller_locals() {
        let mut env = Environment::new();
        env.declare(int("global", 1));
        env.push_scope();
        env.declare(int("local", 2));
        env.push_frame(Frame::new("callee", SourceLocation::default()));
        assert_eq!(env.depth(), 1);
        assert!(env.lookup("global").is_some());
        assert!(env.lookup("local").is_none());
        env.pop_frame();
        assert!(env.lookup("local").is_some());
    }

    #[test]
    fn test_typed_assignment_coerces_and_constants_reject() {
        let types = TypeRegistry::default();
        let mut env = Environment::new();
        env.declare(Variable::new("f", Some(Type::Float), Value::Float(0.0), false));
        env.declare(Variable::new("k", None, Value::Int(1), true));
        env.lookup_mut("f").unwrap().assign(Value::Int(3), &types).unwrap();
        assert_eq!(env.lookup("f").unwrap().value, Value::Float(3.0));
        assert!(env.lookup_mut("k").unwrap().assign(Value::Int(2), &types).is_err());
        assert!(env
            .lookup_mut("f")
            .unwrap()
            .assign(Value::string("no"), &types)
            .is_err());
    }
}
