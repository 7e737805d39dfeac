//! Declaration resolution.
//!
//! Runs in two passes over a parsed program. The first registers every
//! class, enum and function of the unit (plus everything the host library
//! provides) so declarations may refer to each other in any order. The
//! second walks every body with a lexical scope tree to catch duplicate
//! declarations, bad parameter lists and unknown type names.

use crate::ast::{
    BinaryOperator, ClassDecl, EnumDecl, Expression, ExpressionKind, FunctionDecl, Program,
    Statement, StatementKind,
};
use crate::error::{ResolutionError, ResolveResult, SourceLocation};
use crate::lexer::Grammar;
use crate::library::{HostClass, HostFunction, Library};
use crate::symbol_table::{ScopeKind, SymbolKind, SymbolTable};
use crate::types::{
    ClassInfo, EnumInfo, FieldInfo, MethodBody, MethodInfo, Type, TypeRegistry, Visibility,
};
use crate::value::{binary_op, cast, unary_op, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// A parsed and resolved program, ready to execute.
#[derive(Debug)]
pub struct CompiledUnit {
    pub grammar: Grammar,
    pub program: Program,
    pub types: TypeRegistry,
    /// Top-level script functions that have a body.
    pub functions: HashMap<String, Rc<FunctionDecl>>,
    pub host_functions: HashMap<String, Rc<HostFunction>>,
    /// Host constants and members of unscoped enums.
    pub constants: HashMap<String, Value>,
}

impl CompiledUnit {
    pub fn class(&self, name: &str) -> Option<&Rc<ClassInfo>> {
        self.types.class(name)
    }
}

/// Resolve a parsed program against the host library.
pub fn resolve(program: Program, grammar: Grammar, library: &Library) -> ResolveResult<CompiledUnit> {
    let mut resolver = Resolver::new(library);
    resolver.declare_program(&program)?;
    resolver.check_program(&program)?;
    tracing::debug!(
        classes = resolver.types.classes.len(),
        enums = resolver.types.enums.len(),
        functions = resolver.functions.len(),
        "resolved unit"
    );
    Ok(CompiledUnit {
        grammar,
        program,
        types: resolver.types,
        functions: resolver.functions,
        host_functions: library
            .functions()
            .map(|function| (function.signature.name.clone(), Rc::clone(function)))
            .collect(),
        constants: resolver.constants,
    })
}

/// Class layouts of every host class, bases first.
pub fn host_types(library: &Library) -> TypeRegistry {
    let mut types = TypeRegistry::default();
    for class in library.classes() {
        let base = class
            .base
            .as_ref()
            .and_then(|base| types.classes.get(base).cloned());
        types
            .classes
            .insert(class.name.clone(), Rc::new(host_class_info(class, base)));
    }
    types
}

fn host_class_info(class: &HostClass, base: Option<Rc<ClassInfo>>) -> ClassInfo {
    let mut fields = base
        .as_ref()
        .map(|base| base.fields.clone())
        .unwrap_or_default();
    fields.extend(class.fields.iter().map(|(name, field_type)| FieldInfo {
        name: name.clone(),
        field_type: field_type.clone(),
        owner: class.name.clone(),
        visibility: Visibility::Public,
        initializer: None,
    }));
    let methods = class
        .methods
        .iter()
        .map(|method| {
            let name = method.signature.name.clone();
            let info = MethodInfo {
                name: name.clone(),
                owner: class.name.clone(),
                visibility: Visibility::Public,
                arity: method.signature.params.len(),
                body: MethodBody::Host(Rc::clone(method)),
            };
            (name, info)
        })
        .collect();
    ClassInfo {
        name: class.name.clone(),
        base,
        fields,
        methods,
        constructor: None,
        host_constructor: class.constructor.clone(),
        is_host: true,
        location: SourceLocation::default(),
    }
}

struct Resolver {
    symbols: SymbolTable,
    types: TypeRegistry,
    functions: HashMap<String, Rc<FunctionDecl>>,
    constants: HashMap<String, Value>,
    class_decls: HashMap<String, Rc<ClassDecl>>,
    /// `T Class::method() {}` definitions waiting for their class.
    out_of_line: HashMap<(String, String), Rc<FunctionDecl>>,
}

impl Resolver {
    fn new(library: &Library) -> Self {
        let mut symbols = SymbolTable::new();
        let types = host_types(library);
        let mut constants = HashMap::new();

        let host_names = library
            .functions()
            .map(|f| f.signature.name.clone())
            .chain(library.constants().map(|c| c.name.clone()))
            .chain(types.classes.keys().cloned());
        for name in host_names {
            if let Err(err) = symbols.declare(&name, SymbolKind::Host, SourceLocation::default()) {
                crate::internal_error!("library holds a duplicate host name: {}", err);
            }
        }
        for constant in library.constants() {
            constants.insert(constant.name.clone(), constant.value.clone());
        }

        Self {
            symbols,
            types,
            functions: HashMap::new(),
            constants,
            class_decls: HashMap::new(),
            out_of_line: HashMap::new(),
        }
    }

    // First pass: register every top-level declaration

    fn declare_program(&mut self, program: &Program) -> ResolveResult<()> {
        let mut class_order = Vec::new();
        for statement in &program.statements {
            match &statement.kind {
                StatementKind::Function(function) => self.declare_function(function)?,
                StatementKind::Class(class) => {
                    self.symbols
                        .declare(&class.name, SymbolKind::Class, class.location)?;
                    self.class_decls.insert(class.name.clone(), Rc::clone(class));
                    class_order.push(class.name.clone());
                }
                StatementKind::Enum(decl) => self.declare_enum(decl)?,
                _ => {}
            }
        }

        for name in &class_order {
            self.build_class(name, &mut Vec::new())?;
        }
        if let Some(((class, member), function)) = self.out_of_line.iter().next() {
            return Err(if self.types.class(class).is_some() {
                ResolutionError::UndeclaredMember {
                    class: class.clone(),
                    member: member.clone(),
                    location: function.location,
                }
            } else {
                ResolutionError::UnknownType {
                    name: class.clone(),
                    location: function.location,
                }
            });
        }

        if let Some(symbol) = self.symbols.undefined_functions().first() {
            return Err(ResolutionError::UndefinedPrototype {
                name: symbol.name.clone(),
                location: symbol.declared_at,
            });
        }
        Ok(())
    }

    fn declare_function(&mut self, function: &Rc<FunctionDecl>) -> ResolveResult<()> {
        if let Some(owner) = &function.owner {
            let key = (owner.clone(), function.name.clone());
            if function.body.is_none() || self.out_of_line.contains_key(&key) {
                return Err(ResolutionError::DuplicateMember {
                    class: owner.clone(),
                    member: function.name.clone(),
                    location: function.location,
                });
            }
            self.out_of_line.insert(key, Rc::clone(function));
            return Ok(());
        }

        let defined = function.body.is_some();
        let existing = self
            .symbols
            .lookup_current_scope(&function.name)
            .and_then(|id| self.symbols.get_symbol(id).map(|symbol| (id, symbol.kind.clone())));
        match existing {
            None => {
                self.symbols.declare(
                    &function.name,
                    SymbolKind::Function { defined },
                    function.location,
                )?;
            }
            // A prototype of something already known, or the body of an
            // earlier prototype.
            Some((_, SymbolKind::Host)) | Some((_, SymbolKind::Function { .. })) if !defined => {}
            Some((id, SymbolKind::Function { defined: false })) => {
                if let Some(symbol) = self.symbols.get_symbol_mut(id) {
                    symbol.kind = SymbolKind::Function { defined: true };
                }
            }
            Some(_) => {
                return Err(ResolutionError::Duplicate {
                    name: function.name.clone(),
                    location: function.location,
                })
            }
        }
        if defined {
            self.functions
                .insert(function.name.clone(), Rc::clone(function));
        }
        Ok(())
    }

    fn declare_enum(&mut self, decl: &EnumDecl) -> ResolveResult<()> {
        self.symbols
            .declare(&decl.name, SymbolKind::Enum, decl.location)?;

        let mut members: Vec<(String, i64)> = Vec::new();
        let mut next = 0i64;
        for member in &decl.members {
            if members.iter().any(|(name, _)| *name == member.name) {
                return Err(ResolutionError::DuplicateMember {
                    class: decl.name.clone(),
                    member: member.name.clone(),
                    location: member.location,
                });
            }
            let value = match &member.value {
                Some(expr) => self
                    .constant_value(&members, expr)
                    .and_then(|value| cast(value, &Type::Int, &self.types).ok())
                    .and_then(|value| value.as_int())
                    .ok_or_else(|| ResolutionError::NonConstantEnumValue {
                        member: member.name.clone(),
                        location: expr.location,
                    })?,
                None => next,
            };
            next = value.wrapping_add(1);
            members.push((member.name.clone(), value));

            if !decl.scoped {
                self.symbols.declare(
                    &member.name,
                    SymbolKind::EnumMember { value },
                    member.location,
                )?;
                self.constants.insert(member.name.clone(), Value::Int(value));
            }
        }

        self.types.enums.insert(
            decl.name.clone(),
            Rc::new(EnumInfo {
                name: decl.name.clone(),
                scoped: decl.scoped,
                members,
            }),
        );
        Ok(())
    }

    /// Fold a constant integer expression over literals, earlier members
    /// of the enum being built and already known constants.
    fn constant_value(&self, members: &[(String, i64)], expr: &Expression) -> Option<Value> {
        match &expr.kind {
            ExpressionKind::Integer(value) => Some(Value::Int(*value)),
            ExpressionKind::Bool(value) => Some(Value::Bool(*value)),
            ExpressionKind::Identifier(name) => members
                .iter()
                .find(|(member, _)| member == name)
                .map(|(_, value)| Value::Int(*value))
                .or_else(|| {
                    self.constants
                        .get(name)
                        .filter(|value| matches!(value, Value::Int(_)))
                        .cloned()
                }),
            ExpressionKind::Scope { scope, member } => self
                .types
                .enumeration(scope)?
                .value(member)
                .map(Value::Int),
            ExpressionKind::Member { object, member } => match &object.kind {
                ExpressionKind::Identifier(scope) => self
                    .types
                    .enumeration(scope)?
                    .value(member)
                    .map(Value::Int),
                _ => None,
            },
            ExpressionKind::Unary { operator, operand } => {
                unary_op(*operator, &self.constant_value(members, operand)?).ok()
            }
            ExpressionKind::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.constant_value(members, left)?;
                match operator {
                    BinaryOperator::And if !left.is_truthy() => Some(Value::Bool(false)),
                    BinaryOperator::Or if left.is_truthy() => Some(Value::Bool(true)),
                    BinaryOperator::And | BinaryOperator::Or => Some(Value::Bool(
                        self.constant_value(members, right)?.is_truthy(),
                    )),
                    _ => binary_op(*operator, &left, &self.constant_value(members, right)?).ok(),
                }
            }
            ExpressionKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                if self.constant_value(members, condition)?.is_truthy() {
                    self.constant_value(members, then_expr)
                } else {
                    self.constant_value(members, else_expr)
                }
            }
            ExpressionKind::Cast {
                target_type,
                operand,
            } => cast(
                self.constant_value(members, operand)?,
                target_type,
                &self.types,
            )
            .ok(),
            _ => None,
        }
    }

    /// Build a script class after its base; `visiting` detects cycles.
    fn build_class(&mut self, name: &str, visiting: &mut Vec<String>) -> ResolveResult<Rc<ClassInfo>> {
        if let Some(info) = self.types.class(name) {
            return Ok(Rc::clone(info));
        }
        let decl = match self.class_decls.get(name) {
            Some(decl) => Rc::clone(decl),
            None => crate::internal_error!("class '{}' was never declared", name),
        };
        if visiting.iter().any(|visited| visited == name) {
            return Err(ResolutionError::InheritanceCycle {
                class: name.to_string(),
                location: decl.location,
            });
        }
        visiting.push(name.to_string());

        let base = match &decl.base {
            Some(base) if self.class_decls.contains_key(base) => Some(self.build_class(base, visiting)?),
            Some(base) => match self.types.class(base) {
                Some(host) => Some(Rc::clone(host)),
                None => {
                    return Err(ResolutionError::UnknownType {
                        name: base.clone(),
                        location: decl.location,
                    })
                }
            },
            None => None,
        };
        visiting.pop();

        let info = Rc::new(self.class_info(&decl, base)?);
        self.types
            .classes
            .insert(decl.name.clone(), Rc::clone(&info));
        Ok(info)
    }

    fn class_info(&mut self, decl: &ClassDecl, base: Option<Rc<ClassInfo>>) -> ResolveResult<ClassInfo> {
        let duplicate = |member: &str, location: SourceLocation| ResolutionError::DuplicateMember {
            class: decl.name.clone(),
            member: member.to_string(),
            location,
        };

        let mut fields = base
            .as_ref()
            .map(|base| base.fields.clone())
            .unwrap_or_default();
        for field in &decl.fields {
            if fields.iter().any(|existing| existing.name == field.name) {
                return Err(duplicate(&field.name, field.location));
            }
            fields.push(FieldInfo {
                name: field.name.clone(),
                field_type: field.field_type.clone(),
                owner: decl.name.clone(),
                visibility: field.visibility,
                initializer: field.initializer.clone(),
            });
        }

        let mut methods: HashMap<String, MethodInfo> = HashMap::new();
        for method in &decl.methods {
            let function = &method.function;
            if methods.contains_key(&function.name)
                || fields.iter().any(|field| field.name == function.name)
            {
                return Err(duplicate(&function.name, function.location));
            }

            let (body, arity) = if method.is_abstract {
                (MethodBody::Abstract, function.params.len())
            } else if function.body.is_some() {
                (MethodBody::Script(Rc::clone(function)), function.params.len())
            } else {
                let key = (decl.name.clone(), function.name.clone());
                match self.out_of_line.remove(&key) {
                    Some(definition) => {
                        let arity = definition.params.len();
                        (MethodBody::Script(definition), arity)
                    }
                    None => {
                        return Err(ResolutionError::UndefinedPrototype {
                            name: format!("{}::{}", decl.name, function.name),
                            location: function.location,
                        })
                    }
                }
            };

            if let Some(inherited) = base.as_ref().and_then(|base| base.find_method(&function.name)) {
                if inherited.arity != arity {
                    return Err(ResolutionError::OverrideArity {
                        class: decl.name.clone(),
                        method: function.name.clone(),
                        expected: inherited.arity,
                        found: arity,
                        location: function.location,
                    });
                }
            }

            methods.insert(
                function.name.clone(),
                MethodInfo {
                    name: function.name.clone(),
                    owner: decl.name.clone(),
                    visibility: method.visibility,
                    arity,
                    body,
                },
            );
        }

        let constructor = decl.constructor.as_ref().map(|ctor| MethodInfo {
            name: decl.name.clone(),
            owner: decl.name.clone(),
            visibility: ctor.visibility,
            arity: ctor.function.params.len(),
            body: MethodBody::Script(Rc::clone(&ctor.function)),
        });

        Ok(ClassInfo {
            name: decl.name.clone(),
            base,
            fields,
            methods,
            constructor,
            host_constructor: None,
            is_host: false,
            location: decl.location,
        })
    }

    // Second pass: walk every body with lexical scopes

    fn check_program(&mut self, program: &Program) -> ResolveResult<()> {
        for statement in &program.statements {
            self.check_statement(statement)?;
        }
        Ok(())
    }

    fn check_type(&self, ty: &Type, location: SourceLocation) -> ResolveResult<()> {
        match ty.named() {
            Some(name) if !self.types.knows(name) => Err(ResolutionError::UnknownType {
                name: name.to_string(),
                location,
            }),
            _ => Ok(()),
        }
    }

    fn check_function(&mut self, function: &FunctionDecl) -> ResolveResult<()> {
        self.check_type(&function.return_type, function.location)?;
        self.symbols.enter_scope(ScopeKind::Function {
            name: function.name.clone(),
        });

        let mut seen_default = false;
        for (index, param) in function.params.iter().enumerate() {
            self.check_type(&param.param_type, param.location)?;
            if function.params[..index].iter().any(|p| p.name == param.name) {
                return Err(ResolutionError::DuplicateParameter {
                    function: function.name.clone(),
                    parameter: param.name.clone(),
                    location: param.location,
                });
            }
            match &param.default {
                Some(default) => {
                    seen_default = true;
                    self.check_expression(default)?;
                }
                None if seen_default => {
                    return Err(ResolutionError::MissingDefault {
                        function: function.name.clone(),
                        parameter: param.name.clone(),
                        location: param.location,
                    })
                }
                None => {}
            }
            self.symbols
                .declare(&param.name, SymbolKind::Parameter, param.location)?;
        }

        // The body shares the parameters' scope.
        if let Some(body) = &function.body {
            for statement in body {
                self.check_statement(statement)?;
            }
        }
        self.symbols.exit_scope();
        Ok(())
    }

    fn check_class(&mut self, class: &ClassDecl) -> ResolveResult<()> {
        self.symbols.enter_scope(ScopeKind::Function {
            name: class.name.clone(),
        });
        for field in &class.fields {
            self.check_type(&field.field_type, field.location)?;
            if let Some(initializer) = &field.initializer {
                self.check_expression(initializer)?;
            }
        }
        self.symbols.exit_scope();

        if let Some(constructor) = &class.constructor {
            self.check_function(&constructor.function)?;
        }
        for method in &class.methods {
            if method.function.body.is_some() {
                self.check_function(&method.function)?;
            } else {
                self.check_type(&method.function.return_type, method.function.location)?;
                for param in &method.function.params {
                    self.check_type(&param.param_type, param.location)?;
                }
            }
        }
        Ok(())
    }

    fn check_block(&mut self, statements: &[Statement], kind: ScopeKind) -> ResolveResult<()> {
        self.symbols.enter_scope(kind);
        for statement in statements {
            self.check_statement(statement)?;
        }
        self.symbols.exit_scope();
        Ok(())
    }

    fn check_statement(&mut self, statement: &Statement) -> ResolveResult<()> {
        match &statement.kind {
            StatementKind::Expression(expr) => self.check_expression(expr),
            StatementKind::VarDecl(declarations) => {
                for decl in declarations {
                    if let Some(var_type) = &decl.var_type {
                        self.check_type(var_type, decl.location)?;
                    }
                    if let Some(initializer) = &decl.initializer {
                        self.check_expression(initializer)?;
                    }
                    self.symbols.declare(
                        &decl.name,
                        SymbolKind::Variable {
                            constant: decl.constant,
                        },
                        decl.location,
                    )?;
                }
                Ok(())
            }
            StatementKind::Block(statements) => self.check_block(statements, ScopeKind::Block),
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_expression(condition)?;
                self.check_statement(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.check_statement(else_branch)?;
                }
                Ok(())
            }
            StatementKind::While { condition, body } | StatementKind::DoWhile { body, condition } => {
                self.check_expression(condition)?;
                self.check_statement(body)
            }
            StatementKind::For {
                init,
                condition,
                update,
                body,
            } => {
                self.symbols.enter_scope(ScopeKind::ForLoop);
                if let Some(init) = init {
                    self.check_statement(init)?;
                }
                if let Some(condition) = condition {
                    self.check_expression(condition)?;
                }
                if let Some(update) = update {
                    self.check_expression(update)?;
                }
                self.check_statement(body)?;
                self.symbols.exit_scope();
                Ok(())
            }
            StatementKind::Return(value) => match value {
                Some(value) => self.check_expression(value),
                None => Ok(()),
            },
            StatementKind::Function(function) => match function.body {
                Some(_) => self.check_function(function),
                None => Ok(()),
            },
            StatementKind::Class(class) => self.check_class(class),
            StatementKind::Enum(_)
            | StatementKind::Break
            | StatementKind::Continue
            | StatementKind::Empty => Ok(()),
        }
    }

    fn check_expressions(&mut self, exprs: &[Expression]) -> ResolveResult<()> {
        for expr in exprs {
            self.check_expression(expr)?;
        }
        Ok(())
    }

    fn check_expression(&mut self, expr: &Expression) -> ResolveResult<()> {
        match &expr.kind {
            ExpressionKind::Integer(_)
            | ExpressionKind::Float(_)
            | ExpressionKind::Bool(_)
            | ExpressionKind::String(_)
            | ExpressionKind::Null
            | ExpressionKind::Identifier(_)
            | ExpressionKind::This => Ok(()),
            ExpressionKind::ArrayLiteral(items) => self.check_expressions(items),
            ExpressionKind::Binary { left, right, .. } => {
                self.check_expression(left)?;
                self.check_expression(right)
            }
            ExpressionKind::Unary { operand, .. } => self.check_expression(operand),
            ExpressionKind::Update { target, .. } => self.check_expression(target),
            ExpressionKind::Assign { target, value, .. } => {
                self.check_expression(target)?;
                self.check_expression(value)
            }
            ExpressionKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                self.check_expression(condition)?;
                self.check_expression(then_expr)?;
                self.check_expression(else_expr)
            }
            ExpressionKind::Call { callee, args } => {
                self.check_expression(callee)?;
                self.check_expressions(args)
            }
            ExpressionKind::Member { object, .. } => self.check_expression(object),
            ExpressionKind::Scope { scope, member } => {
                if let Some(enumeration) = self.types.enumeration(scope) {
                    if enumeration.value(member).is_none() {
                        return Err(ResolutionError::UnknownType {
                            name: format!("{}::{}", scope, member),
                            location: expr.location,
                        });
                    }
                    Ok(())
                } else {
                    self.check_type(&Type::Named(scope.clone()), expr.location)
                }
            }
            ExpressionKind::Index { object, index } => {
                self.check_expression(object)?;
                self.check_expression(index)
            }
            ExpressionKind::New { class, args } => {
                if self.types.class(class).is_none() {
                    return Err(ResolutionError::UnknownType {
                        name: class.clone(),
                        location: expr.location,
                    });
                }
                self.check_expressions(args)
            }
            ExpressionKind::NewArray { element_type, size } => {
                self.check_type(element_type, expr.location)?;
                self.check_expression(size)
            }
            ExpressionKind::SuperCall { args, .. } => self.check_expressions(args),
            ExpressionKind::Cast {
                target_type,
                operand,
            } => {
                self.check_type(target_type, expr.location)?;
                self.check_expression(operand)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn compile(source: &str, grammar: Grammar) -> ResolveResult<CompiledUnit> {
        let program = parse(source, grammar).expect("parses");
        resolve(program, grammar, &Library::new())
    }

    fn cpp(source: &str) -> ResolveResult<CompiledUnit> {
        compile(source, Grammar::Cpp)
    }

    #[test]
    fn test_forward_references_between_classes_and_functions() {
        let unit = cpp(
            "int main() { Derived d; return helper(); }
             int helper() { return 1; }
             class Derived : public Base { public: int y; };
             class Base { public: int x; virtual int get() { return x; } };",
        )
        .unwrap();
        let derived = unit.class("Derived").unwrap();
        let names: Vec<&str> = derived.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert_eq!(derived.find_method("get").unwrap().owner, "Base");
        assert!(unit.functions.contains_key("helper"));
    }

    #[test]
    fn test_duplicate_top_level_names() {
        let err = cpp("int f() { return 1; } class f {};").unwrap_err();
        assert!(matches!(err, ResolutionError::Duplicate { ref name, .. } if name == "f"));
        let err = cpp("int x = 1; int x = 2;").unwrap_err();
        assert!(matches!(err, ResolutionError::Duplicate { .. }));
    }

    #[test]
    fn test_shadowing_in_nested_blocks_is_allowed() {
        assert!(cpp("int x = 1; void f() { int x = 2; { int x = 3; } }").is_ok());
        assert!(cpp("void f(int a) { int a = 2; }").is_err());
    }

    #[test]
    fn test_inheritance_errors() {
        let err = cpp("class A : public B {}; class B : public A {};").unwrap_err();
        assert!(matches!(err, ResolutionError::InheritanceCycle { .. }));
        let err = cpp("class A : public Missing {};").unwrap_err();
        assert!(matches!(err, ResolutionError::UnknownType { ref name, .. } if name == "Missing"));
        let err = cpp(
            "class A { public: virtual int m(int a) { return a; } };
             class B : public A { public: int m() { return 0; } };",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::OverrideArity {
                expected: 1,
                found: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_field_shadowing_is_a_duplicate_member() {
        let err = cpp("class A { public: int x; }; class B : public A { public: int x; };")
            .unwrap_err();
        assert!(matches!(err, ResolutionError::DuplicateMember { ref member, .. } if member == "x"));
    }

    #[test]
    fn test_parameter_lists() {
        let err = cpp("int f(int a, int a) { return a; }").unwrap_err();
        assert!(matches!(err, ResolutionError::DuplicateParameter { .. }));
        let err = cpp("int f(int a = 1, int b) { return a; }").unwrap_err();
        assert!(matches!(err, ResolutionError::MissingDefault { .. }));
        assert!(cpp("int f(int a, int b = 2) { return a + b; }").is_ok());
    }

    #[test]
    fn test_prototypes_and_out_of_line_methods() {
        assert!(cpp("int f(int); int main() { return f(1); } int f(int x) { return x; }").is_ok());
        let err = cpp("int f(int);").unwrap_err();
        assert!(matches!(err, ResolutionError::UndefinedPrototype { ref name, .. } if name == "f"));

        let unit = cpp("class P { public: int x; int get(); }; int P::get() { return x; }").unwrap();
        assert!(matches!(
            unit.class("P").unwrap().find_method("get").unwrap().body,
            MethodBody::Script(_)
        ));
        let err = cpp("class P { public: int get(); };").unwrap_err();
        assert!(matches!(err, ResolutionError::UndefinedPrototype { .. }));
        let err = cpp("class P {}; int P::get() { return 1; }").unwrap_err();
        assert!(matches!(err, ResolutionError::UndeclaredMember { .. }));
    }

    #[test]
    fn test_enum_values() {
        let unit = cpp("enum Color { Red, Green = 5, Blue, Mask = Blue << 1 }; enum class Mode { A = Color::Green + 1 };").unwrap();
        let color = unit.types.enumeration("Color").unwrap();
        assert_eq!(
            color.members,
            vec![
                ("Red".to_string(), 0),
                ("Green".to_string(), 5),
                ("Blue".to_string(), 6),
                ("Mask".to_string(), 12)
            ]
        );
        assert_eq!(unit.constants.get("Blue"), Some(&Value::Int(6)));
        assert_eq!(unit.types.enumeration("Mode").unwrap().value("A"), Some(6));
        assert!(!unit.constants.contains_key("A"));

        let err = cpp("int f() { return 1; } enum E { X = f() };").unwrap_err();
        assert!(matches!(err, ResolutionError::NonConstantEnumValue { .. }));
        let err = cpp("enum E { X, X };").unwrap_err();
        assert!(matches!(err, ResolutionError::DuplicateMember { .. }));
    }

    #[test]
    fn test_unknown_type_names() {
        let err = cpp("void f() { Widget w; }").unwrap_err();
        assert!(matches!(err, ResolutionError::UnknownType { ref name, .. } if name == "Widget"));
        let err = compile("let p = new Nope();", Grammar::Js).unwrap_err();
        assert!(matches!(err, ResolutionError::UnknownType { .. }));
        let err = cpp("enum class Mode { A }; int m = Mode::B;").unwrap_err();
        assert!(matches!(err, ResolutionError::UnknownType { ref name, .. } if name == "Mode::B"));
    }

    #[test]
    fn test_host_names_participate() {
        let mut library = Library::new();
        library
            .function("int twice(int)", |_, args| Ok(Value::Int(args.int(0)? * 2)))
            .unwrap();
        library
            .class(HostClass::new("Gadget").field("int size").unwrap())
            .unwrap();

        let program = parse("class Widget : public Gadget { public: int extra; };", Grammar::Cpp).unwrap();
        let unit = resolve(program, Grammar::Cpp, &library).unwrap();
        let widget = unit.class("Widget").unwrap();
        assert_eq!(widget.fields.len(), 2);
        assert!(widget.base.as_ref().unwrap().is_host);
        assert!(unit.host_functions.contains_key("twice"));

        let program = parse("int twice(int x) { return x; }", Grammar::Cpp).unwrap();
        assert!(matches!(
            resolve(program, Grammar::Cpp, &library),
            Err(ResolutionError::Duplicate { .. })
        ));
        let program = parse("int twice(int);", Grammar::Cpp).unwrap();
        assert!(resolve(program, Grammar::Cpp, &library).is_ok());

        crate::library::stdlib::register(&mut library).unwrap();
        library.constant("GADGET_MAX", Type::Int, 8i64).unwrap();
        let program = parse("int limit = GADGET_MAX;", Grammar::Cpp).unwrap();
        let unit = resolve(program, Grammar::Cpp, &library).unwrap();
        assert!(unit.host_functions.contains_key("printf"));
        let program = parse("int GADGET_MAX = 1;", Grammar::Cpp).unwrap();
        assert!(matches!(
            resolve(program, Grammar::Cpp, &library),
            Err(ResolutionError::Duplicate { .. })
        ));
    }
}
