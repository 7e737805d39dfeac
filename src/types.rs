use crate::ast::{Expression, FunctionDecl};
use crate::error::SourceLocation;
use crate::library::{HostConstructor, HostMethod};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Type {
    Void,
    /// 64-bit wrapping integer; every C integer spelling maps here.
    Int,
    Float,
    Bool,
    String,
    /// Dynamically typed slot (`var`, `let`, `auto`, untyped JS parameters).
    Any,
    /// A class or enum, resolved by name.
    Named(String),
    Array(Box<Type>),
    Function,
}

impl Type {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    /// Every class or enum name this type mentions.
    pub fn named(&self) -> Option<&str> {
        match self {
            Type::Named(name) => Some(name),
            Type::Array(inner) => inner.named(),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "double"),
            Type::Bool => write!(f, "bool"),
            Type::String => write!(f, "string"),
            Type::Any => write!(f, "any"),
            Type::Named(name) => write!(f, "{}", name),
            Type::Array(inner) => write!(f, "{}[]", inner),
            Type::Function => write!(f, "function"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Protected => write!(f, "protected"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// Declared shape of a host callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Type>,
    pub variadic: bool,
    pub return_type: Type,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}(", self.return_type, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        if self.variadic {
            if !self.params.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "...")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub field_type: Type,
    /// Class that declares the field.
    pub owner: String,
    pub visibility: Visibility,
    pub initializer: Option<Expression>,
}

#[derive(Debug, Clone)]
pub enum MethodBody {
    Script(Rc<FunctionDecl>),
    Host(Rc<HostMethod>),
    Abstract,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    pub owner: String,
    pub visibility: Visibility,
    pub arity: usize,
    pub body: MethodBody,
}

/// Resolved class layout: fields are flattened base-first, methods hold only
/// the class's own members and dispatch walks `base`.
#[derive(Debug)]
pub struct ClassInfo {
    pub name: String,
    pub base: Option<Rc<ClassInfo>>,
    pub fields: Vec<FieldInfo>,
    pub methods: HashMap<String, MethodInfo>,
    pub constructor: Option<MethodInfo>,
    pub host_constructor: Option<Rc<HostConstructor>>,
    pub is_host: bool,
    pub location: SourceLocation,
}

impl ClassInfo {
    pub fn field_slot(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Most-derived method of that name, walking the base chain.
    pub fn find_method(&self, name: &str) -> Option<&MethodInfo> {
        let mut class = Some(self);
        while let Some(current) = class {
            if let Some(method) = current.methods.get(name) {
                return Some(method);
            }
            class = current.base.as_deref();
        }
        None
    }

    /// Nearest constructor in the class chain, starting with this class.
    pub fn find_constructor(&self) -> Option<(&ClassInfo, &MethodInfo)> {
        let mut class = Some(self);
        while let Some(current) = class {
            if let Some(ctor) = &current.constructor {
                return Some((current, ctor));
            }
            class = current.base.as_deref();
        }
        None
    }

    /// Nearest host class in the chain that knows how to build a handle.
    pub fn find_host_constructor(&self) -> Option<(&ClassInfo, &Rc<HostConstructor>)> {
        let mut class = Some(self);
        while let Some(current) = class {
            if let Some(ctor) = &current.host_constructor {
                return Some((current, ctor));
            }
            class = current.base.as_deref();
        }
        None
    }

    pub fn is_subclass_of(&self, name: &str) -> bool {
        self.ancestor(name).is_some()
    }

    /// The class itself or one of its bases with the given name.
    pub fn ancestor(&self, name: &str) -> Option<&ClassInfo> {
        let mut class = Some(self);
        while let Some(current) = class {
            if current.name == name {
                return Some(current);
            }
            class = current.base.as_deref();
        }
        None
    }

    /// Chain from the root base down to this class.
    pub fn lineage(&self) -> Vec<&ClassInfo> {
        let mut chain = Vec::new();
        let mut class = Some(self);
        while let Some(current) = class {
            chain.push(current);
            class = current.base.as_deref();
        }
        chain.reverse();
        chain
    }

    /// Abstract methods that no class in the chain overrides.
    pub fn abstract_methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for class in self.lineage() {
            for method in class.methods.values() {
                if matches!(method.body, MethodBody::Abstract) {
                    names.push(&method.name);
                }
            }
        }
        names.retain(|name| {
            self.find_method(name)
                .map(|m| matches!(m.body, MethodBody::Abstract))
                .unwrap_or(false)
        });
        names.sort_unstable();
        names.dedup();
        names
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumInfo {
    pub name: String,
    pub scoped: bool,
    /// Declaration order is kept.
    pub members: Vec<(String, i64)>,
}

impl EnumInfo {
    pub fn value(&self, member: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .map(|(_, value)| *value)
    }
}

/// Classes and enums visible to one compiled unit, host ones included.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    pub classes: HashMap<String, Rc<ClassInfo>>,
    pub enums: HashMap<String, Rc<EnumInfo>>,
}

impl TypeRegistry {
    pub fn class(&self, name: &str) -> Option<&Rc<ClassInfo>> {
        self.classes.get(name)
    }

    pub fn enumeration(&self, name: &str) -> Option<&Rc<EnumInfo>> {
        self.enums.get(name)
    }

    pub fn is_enum(&self, name: &str) -> bool {
        self.enums.contains_key(name)
    }

    pub fn knows(&self, name: &str) -> bool {
        self.classes.contains_key(name) || self.enums.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, base: Option<Rc<ClassInfo>>, methods: &[(&str, MethodBody)]) -> Rc<ClassInfo> {
        let methods = methods
            .iter()
            .map(|(m, body)| {
                (
                    m.to_string(),
                    MethodInfo {
                        name: m.to_string(),
                        owner: name.to_string(),
                        visibility: Visibility::Public,
                        arity: 0,
                        body: body.clone(),
                    },
                )
            })
            .collect();
        Rc::new(ClassInfo {
            name: name.to_string(),
            base,
            fields: Vec::new(),
            methods,
            constructor: None,
            host_constructor: None,
            is_host: false,
            location: SourceLocation::default(),
        })
    }

    #[test]
    fn test_method_lookup_prefers_most_derived() {
        let a = class("A", None, &[("m", MethodBody::Abstract), ("n", MethodBody::Abstract)]);
        let decl = Rc::new(FunctionDecl {
            name: "m".into(),
            owner: None,
            params: Vec::new(),
            return_type: Type::Int,
            body: Some(Vec::new()),
            location: SourceLocation::default(),
        });
        let b = class("B", Some(a.clone()), &[("m", MethodBody::Script(decl))]);

        assert_eq!(b.find_method("m").map(|m| m.owner.as_str()), Some("B"));
        assert_eq!(b.find_method("n").map(|m| m.owner.as_str()), Some("A"));
        assert!(b.find_method("missing").is_none());
        assert!(b.is_subclass_of("A"));
        assert!(!a.is_subclass_of("B"));
        assert_eq!(b.abstract_methods(), vec!["n"]);
        assert_eq!(
            b.lineage().iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );
    }

    #[test]
    fn test_signature_display() {
        let sig = Signature {
            name: "printf".into(),
            params: vec![Type::String],
            variadic: true,
            return_type: Type::Int,
        };
        assert_eq!(sig.to_string(), "int printf(string, ...)");
    }
}
