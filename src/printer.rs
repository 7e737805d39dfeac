//! Unparser: turns a program back into source text for either grammar.
//!
//! Output re-parses to the same tree up to source locations, so
//! `unparse(parse(unparse(p)))` is a fixpoint. Parentheses are emitted only
//! where the shared precedence table requires them.

use crate::ast::{
    BinaryOperator, ClassDecl, EnumDecl, Expression, ExpressionKind, FieldDecl, FunctionDecl,
    MethodDecl, Parameter, Program, Statement, StatementKind, VarDecl,
};
use crate::lexer::Grammar;
use crate::types::{Type, Visibility};
use std::collections::HashSet;

// Expression levels above the binary operators.
const ASSIGNMENT: u8 = 1;
const CONDITIONAL: u8 = 2;
const UNARY: u8 = 13;
const POSTFIX: u8 = 14;
const PRIMARY: u8 = 15;

pub fn unparse(program: &Program, grammar: Grammar) -> String {
    let enums = program
        .statements
        .iter()
        .filter_map(|statement| match &statement.kind {
            StatementKind::Enum(decl) => Some(decl.name.clone()),
            _ => None,
        })
        .collect();
    let mut printer = Printer {
        grammar,
        out: String::new(),
        indent: 0,
        enums,
        base: None,
    };
    for statement in &program.statements {
        printer.statement(statement);
    }
    printer.out
}

/// Where a type is spelled; C++ has no single word for "any".
#[derive(Clone, Copy, PartialEq)]
enum TypeSite {
    Variable,
    Signature,
}

struct Printer {
    grammar: Grammar,
    out: String,
    indent: usize,
    enums: HashSet<String>,
    /// Base class of the class being printed.
    base: Option<String>,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn is_cpp(&self) -> bool {
        self.grammar == Grammar::Cpp
    }

    // Types

    fn cpp_type(&self, ty: &Type, site: TypeSite) -> String {
        match ty {
            Type::Void => "void".to_string(),
            Type::Int => "int".to_string(),
            Type::Float => "double".to_string(),
            Type::Bool => "bool".to_string(),
            Type::String => "string".to_string(),
            Type::Any | Type::Function => match site {
                TypeSite::Variable => "auto".to_string(),
                TypeSite::Signature => "void*".to_string(),
            },
            Type::Named(name) if self.enums.contains(name) => name.clone(),
            Type::Named(name) => format!("{}*", name),
            Type::Array(inner) => {
                let inner = match inner.as_ref() {
                    Type::Named(name) => name.clone(),
                    Type::Any | Type::Function => "auto".to_string(),
                    other => self.cpp_type(other, site),
                };
                format!("{}[]", inner)
            }
        }
    }

    fn js_type(&self, ty: &Type) -> String {
        match ty {
            Type::Void => "void".to_string(),
            Type::Int => "int".to_string(),
            Type::Float => "number".to_string(),
            Type::Bool => "boolean".to_string(),
            Type::String => "string".to_string(),
            Type::Any | Type::Function => "any".to_string(),
            Type::Named(name) => name.clone(),
            Type::Array(inner) => format!("{}[]", self.js_type(inner)),
        }
    }

    /// `: T`, or nothing for an untyped JS slot.
    fn annotation(&self, ty: &Type) -> String {
        match ty {
            Type::Any => String::new(),
            other => format!(": {}", self.js_type(other)),
        }
    }

    // Statements

    fn statement(&mut self, statement: &Statement) {
        match &statement.kind {
            StatementKind::Expression(expr) => {
                let text = format!("{};", self.expression(expr, 0));
                self.line(&text);
            }
            StatementKind::VarDecl(decls) => {
                for text in self.declarations(decls) {
                    self.line(&format!("{};", text));
                }
            }
            StatementKind::Block(statements) => {
                self.line("{");
                self.block_body(statements);
                self.line("}");
            }
            StatementKind::If { .. } => self.if_statement(statement, ""),
            StatementKind::While { condition, body } => {
                let head = format!("while ({})", self.expression(condition, 0));
                self.body(&head, body, "");
            }
            StatementKind::DoWhile { body, condition } => {
                let tail = format!(" while ({});", self.expression(condition, 0));
                self.body("do", body, &tail);
            }
            StatementKind::For {
                init,
                condition,
                update,
                body,
            } => {
                let init = match init.as_deref().map(|init| &init.kind) {
                    Some(StatementKind::VarDecl(decls)) => self.declarations(decls).join(", "),
                    Some(StatementKind::Expression(expr)) => self.expression(expr, 0),
                    _ => String::new(),
                };
                let condition = condition
                    .as_ref()
                    .map(|c| format!(" {}", self.expression(c, 0)))
                    .unwrap_or_default();
                let update = update
                    .as_ref()
                    .map(|u| format!(" {}", self.expression(u, 0)))
                    .unwrap_or_default();
                let head = format!("for ({};{};{})", init, condition, update);
                self.body(&head, body, "");
            }
            StatementKind::Return(value) => {
                let text = match value {
                    Some(value) => format!("return {};", self.expression(value, 0)),
                    None => "return;".to_string(),
                };
                self.line(&text);
            }
            StatementKind::Break => self.line("break;"),
            StatementKind::Continue => self.line("continue;"),
            StatementKind::Function(decl) => self.function(decl),
            StatementKind::Class(decl) => self.class(decl),
            StatementKind::Enum(decl) => self.enumeration(decl),
            StatementKind::Empty => self.line(";"),
        }
    }

    fn block_body(&mut self, statements: &[Statement]) {
        self.indent += 1;
        for statement in statements {
            self.statement(statement);
        }
        self.indent -= 1;
    }

    /// Loop or branch header followed by its body statement.
    fn body(&mut self, head: &str, body: &Statement, tail: &str) {
        match &body.kind {
            StatementKind::Block(statements) => {
                self.line(&format!("{} {{", head));
                self.block_body(statements);
                self.line(&format!("}}{}", tail));
            }
            _ => {
                self.line(head);
                self.indent += 1;
                self.statement(body);
                self.indent -= 1;
                if !tail.is_empty() {
                    self.line(tail.trim_start());
                }
            }
        }
    }

    fn if_statement(&mut self, statement: &Statement, prefix: &str) {
        let StatementKind::If {
            condition,
            then_branch,
            else_branch,
        } = &statement.kind
        else {
            return;
        };
        let head = format!("{}if ({})", prefix, self.expression(condition, 0));
        let Some(else_branch) = else_branch else {
            self.body(&head, then_branch, "");
            return;
        };
        let braced = match &then_branch.kind {
            StatementKind::Block(statements) => Some(statements.as_slice()),
            // A trailing `if` without `else` would capture ours.
            _ if ends_in_open_if(then_branch) => Some(std::slice::from_ref(then_branch.as_ref())),
            _ => None,
        };
        let keyword = match braced {
            Some(statements) => {
                self.line(&format!("{} {{", head));
                self.block_body(statements);
                "} else"
            }
            None => {
                self.line(&head);
                self.indent += 1;
                self.statement(then_branch);
                self.indent -= 1;
                "else"
            }
        };
        match &else_branch.kind {
            StatementKind::If { .. } => self.if_statement(else_branch, &format!("{} ", keyword)),
            StatementKind::Block(statements) => {
                self.line(&format!("{} {{", keyword));
                self.block_body(statements);
                self.line("}");
            }
            _ => {
                self.line(keyword);
                self.indent += 1;
                self.statement(else_branch);
                self.indent -= 1;
            }
        }
    }

    /// One entry per declarator group, without the trailing `;`.
    fn declarations(&self, decls: &[VarDecl]) -> Vec<String> {
        let Some(first) = decls.first() else {
            return Vec::new();
        };
        let shared = decls
            .iter()
            .all(|d| d.var_type == first.var_type && d.constant == first.constant);
        if !shared && self.is_cpp() {
            return decls
                .iter()
                .flat_map(|decl| self.declarations(std::slice::from_ref(decl)))
                .collect();
        }

        let declarators: Vec<String> = decls
            .iter()
            .map(|decl| {
                let mut text = decl.name.clone();
                if !self.is_cpp() {
                    if let Some(ty) = &decl.var_type {
                        text.push_str(&self.annotation(ty));
                    }
                }
                if let Some(init) = &decl.initializer {
                    text.push_str(" = ");
                    text.push_str(&self.expression(init, ASSIGNMENT));
                }
                text
            })
            .collect();

        let head = if self.is_cpp() {
            let ty = match &first.var_type {
                Some(ty) => self.cpp_type(ty, TypeSite::Variable),
                None => "auto".to_string(),
            };
            if first.constant {
                format!("const {}", ty)
            } else {
                ty
            }
        } else if first.constant {
            "const".to_string()
        } else {
            "let".to_string()
        };
        vec![format!("{} {}", head, declarators.join(", "))]
    }

    fn parameters(&self, params: &[Parameter]) -> String {
        params
            .iter()
            .map(|param| {
                let mut text = if self.is_cpp() {
                    format!("{} {}", self.cpp_type(&param.param_type, TypeSite::Signature), param.name)
                } else {
                    format!("{}{}", param.name, self.annotation(&param.param_type))
                };
                if let Some(default) = &param.default {
                    text.push_str(" = ");
                    text.push_str(&self.expression(default, ASSIGNMENT));
                }
                text
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn function(&mut self, decl: &FunctionDecl) {
        let head = if self.is_cpp() {
            let name = match &decl.owner {
                Some(owner) => format!("{}::{}", owner, decl.name),
                None => decl.name.clone(),
            };
            format!(
                "{} {}({})",
                self.cpp_type(&decl.return_type, TypeSite::Signature),
                name,
                self.parameters(&decl.params)
            )
        } else {
            format!(
                "function {}({}){}",
                decl.name,
                self.parameters(&decl.params),
                self.annotation(&decl.return_type)
            )
        };
        self.function_body(&head, decl.body.as_deref());
    }

    fn function_body(&mut self, head: &str, body: Option<&[Statement]>) {
        match body {
            None => self.line(&format!("{};", head)),
            Some([]) => self.line(&format!("{} {{}}", head)),
            Some(statements) => {
                self.line(&format!("{} {{", head));
                self.block_body(statements);
                self.line("}");
            }
        }
    }

    fn class(&mut self, decl: &ClassDecl) {
        let outer = std::mem::replace(&mut self.base, decl.base.clone());
        if self.is_cpp() {
            self.cpp_class(decl);
        } else {
            self.js_class(decl);
        }
        self.base = outer;
    }

    fn cpp_class(&mut self, decl: &ClassDecl) {
        let keyword = if decl.is_struct { "struct" } else { "class" };
        let head = match &decl.base {
            Some(base) => format!("{} {} : public {} {{", keyword, decl.name, base),
            None => format!("{} {} {{", keyword, decl.name),
        };
        self.line(&head);
        let mut current = Visibility::Public;
        let mut label = |printer: &mut Self, visibility: Visibility| {
            if visibility != current {
                current = visibility;
                printer.line(&format!("{}:", visibility));
            }
        };

        self.indent += 1;
        for field in &decl.fields {
            label(self, field.visibility);
            self.cpp_field(field);
        }
        if let Some(ctor) = &decl.constructor {
            label(self, ctor.visibility);
            self.cpp_constructor(decl, &ctor.function);
        }
        for method in &decl.methods {
            label(self, method.visibility);
            self.cpp_method(method);
        }
        self.indent -= 1;
        self.line("};");
    }

    fn cpp_field(&mut self, field: &FieldDecl) {
        let ty = self.cpp_type(&field.field_type, TypeSite::Variable);
        let text = match &field.initializer {
            Some(Expression {
                kind: ExpressionKind::ArrayLiteral(items),
                ..
            }) if items.len() > 1 => format!("{} {}{};", ty, field.name, self.brace_list(items)),
            Some(init) => format!("{} {} = {};", ty, field.name, self.expression(init, ASSIGNMENT)),
            None => format!("{} {};", ty, field.name),
        };
        self.line(&text);
    }

    /// Leading base calls and `this->x = v` stores become the initialiser list.
    fn cpp_constructor(&mut self, class: &ClassDecl, function: &FunctionDecl) {
        let body = function.body.as_deref().unwrap_or_default();
        let mut inits = Vec::new();
        let mut rest = body;
        while let Some((first, tail)) = rest.split_first() {
            let StatementKind::Expression(expr) = &first.kind else {
                break;
            };
            match &expr.kind {
                ExpressionKind::SuperCall { method: None, args } => match &class.base {
                    Some(base) => inits.push(format!("{}({})", base, self.arguments(args))),
                    None => break,
                },
                ExpressionKind::Assign {
                    target,
                    operator: None,
                    value,
                } => match &target.kind {
                    ExpressionKind::Member { object, member }
                        if matches!(object.kind, ExpressionKind::This) =>
                    {
                        inits.push(format!("{}({})", member, self.expression(value, ASSIGNMENT)));
                    }
                    _ => break,
                },
                _ => break,
            }
            rest = tail;
        }

        let mut head = format!("{}({})", class.name, self.parameters(&function.params));
        if !inits.is_empty() {
            head.push_str(" : ");
            head.push_str(&inits.join(", "));
        }
        self.function_body(&head, Some(rest));
    }

    fn cpp_method(&mut self, method: &MethodDecl) {
        let function = &method.function;
        let head = format!(
            "{}{} {}({})",
            if method.is_virtual { "virtual " } else { "" },
            self.cpp_type(&function.return_type, TypeSite::Signature),
            function.name,
            self.parameters(&function.params)
        );
        if method.is_abstract {
            self.line(&format!("{} = 0;", head));
        } else {
            self.function_body(&head, function.body.as_deref());
        }
    }

    fn js_class(&mut self, decl: &ClassDecl) {
        let head = match &decl.base {
            Some(base) => format!("class {} extends {} {{", decl.name, base),
            None => format!("class {} {{", decl.name),
        };
        self.line(&head);
        self.indent += 1;
        for field in &decl.fields {
            let mut text = format!("{}{}", field.name, self.annotation(&field.field_type));
            if let Some(init) = &field.initializer {
                text.push_str(" = ");
                text.push_str(&self.expression(init, ASSIGNMENT));
            }
            text.push(';');
            self.line(&text);
        }
        if let Some(ctor) = &decl.constructor {
            let head = format!("constructor({})", self.parameters(&ctor.function.params));
            self.function_body(&head, Some(ctor.function.body.as_deref().unwrap_or_default()));
        }
        for method in &decl.methods {
            let function = &method.function;
            let head = format!(
                "{}({}){}",
                function.name,
                self.parameters(&function.params),
                self.annotation(&function.return_type)
            );
            self.function_body(&head, Some(function.body.as_deref().unwrap_or_default()));
        }
        self.indent -= 1;
        self.line("}");
    }

    fn enumeration(&mut self, decl: &EnumDecl) {
        let members = decl
            .members
            .iter()
            .map(|member| match &member.value {
                Some(value) => format!("{} = {}", member.name, self.expression(value, CONDITIONAL)),
                None => member.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let text = match (self.grammar, decl.scoped) {
            (Grammar::Cpp, true) => format!("enum class {} {{ {} }};", decl.name, members),
            (Grammar::Cpp, false) if decl.name.is_empty() => format!("enum {{ {} }};", members),
            (Grammar::Cpp, false) => format!("enum {} {{ {} }};", decl.name, members),
            (Grammar::Js, _) => format!("enum {} {{ {} }}", decl.name, members),
        };
        self.line(&text);
    }

    // Expressions

    fn arguments(&self, args: &[Expression]) -> String {
        args.iter()
            .map(|arg| self.expression(arg, ASSIGNMENT))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn brace_list(&self, items: &[Expression]) -> String {
        format!("{{{}}}", self.arguments(items))
    }

    /// Render `expr`, parenthesised when it binds looser than `context`.
    fn expression(&self, expr: &Expression, context: u8) -> String {
        let (text, level) = self.render(expr);
        if level < context {
            format!("({})", text)
        } else {
            text
        }
    }

    fn render(&self, expr: &Expression) -> (String, u8) {
        match &expr.kind {
            ExpressionKind::Integer(value) if *value < 0 => (value.to_string(), UNARY),
            ExpressionKind::Integer(value) => (value.to_string(), PRIMARY),
            ExpressionKind::Float(value) => (format!("{:?}", value), PRIMARY),
            ExpressionKind::Bool(value) => (value.to_string(), PRIMARY),
            ExpressionKind::String(value) => (quote(value), PRIMARY),
            ExpressionKind::Null => {
                let text = if self.is_cpp() { "nullptr" } else { "null" };
                (text.to_string(), PRIMARY)
            }
            ExpressionKind::Identifier(name) => (name.clone(), PRIMARY),
            ExpressionKind::This => ("this".to_string(), PRIMARY),
            ExpressionKind::ArrayLiteral(items) => {
                let text = if self.is_cpp() {
                    self.brace_list(items)
                } else {
                    format!("[{}]", self.arguments(items))
                };
                (text, PRIMARY)
            }
            ExpressionKind::Binary {
                left,
                operator,
                right,
            } => {
                let precedence = operator.precedence();
                let text = format!(
                    "{} {} {}",
                    self.expression(left, precedence),
                    operator.symbol(),
                    self.expression(right, precedence + 1)
                );
                (text, precedence)
            }
            ExpressionKind::Unary { operator, operand } => {
                let operand = self.expression(operand, UNARY);
                (prefix(operator.symbol(), &operand), UNARY)
            }
            ExpressionKind::Update {
                increment,
                prefix: is_prefix,
                target,
            } => {
                let symbol = if *increment { "++" } else { "--" };
                if *is_prefix {
                    (prefix(symbol, &self.expression(target, UNARY)), UNARY)
                } else {
                    (format!("{}{}", self.expression(target, POSTFIX), symbol), POSTFIX)
                }
            }
            ExpressionKind::Assign {
                target,
                operator,
                value,
            } => {
                let symbol = match operator {
                    Some(operator) => format!("{}=", operator.symbol()),
                    None => "=".to_string(),
                };
                let text = format!(
                    "{} {} {}",
                    self.expression(target, CONDITIONAL),
                    symbol,
                    self.expression(value, ASSIGNMENT)
                );
                (text, ASSIGNMENT)
            }
            ExpressionKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                let text = format!(
                    "{} ? {} : {}",
                    self.expression(condition, BinaryOperator::Or.precedence()),
                    self.expression(then_expr, ASSIGNMENT),
                    self.expression(else_expr, CONDITIONAL)
                );
                (text, CONDITIONAL)
            }
            ExpressionKind::Call { callee, args } => (
                format!("{}({})", self.expression(callee, POSTFIX), self.arguments(args)),
                POSTFIX,
            ),
            ExpressionKind::Member { object, member } => {
                let arrow = self.is_cpp() && member != "length";
                let text = format!(
                    "{}{}{}",
                    self.expression(object, POSTFIX),
                    if arrow { "->" } else { "." },
                    member
                );
                (text, POSTFIX)
            }
            ExpressionKind::Scope { scope, member } => {
                let separator = if self.is_cpp() { "::" } else { "." };
                (format!("{}{}{}", scope, separator, member), PRIMARY)
            }
            ExpressionKind::Index { object, index } => (
                format!("{}[{}]", self.expression(object, POSTFIX), self.expression(index, 0)),
                POSTFIX,
            ),
            ExpressionKind::New { class, args } => {
                (format!("new {}({})", class, self.arguments(args)), PRIMARY)
            }
            ExpressionKind::NewArray { element_type, size } => {
                let text = if self.is_cpp() {
                    let element = match element_type {
                        Type::Named(name) => name.clone(),
                        Type::Any | Type::Function => "auto".to_string(),
                        other => self.cpp_type(other, TypeSite::Variable),
                    };
                    format!("new {}[{}]", element, self.expression(size, 0))
                } else {
                    format!("new Array({})", self.expression(size, ASSIGNMENT))
                };
                (text, PRIMARY)
            }
            ExpressionKind::SuperCall { method, args } => {
                let text = match (self.grammar, method) {
                    (Grammar::Js, None) => format!("super({})", self.arguments(args)),
                    (Grammar::Js, Some(method)) => format!("super.{}({})", method, self.arguments(args)),
                    (Grammar::Cpp, method) => {
                        let base = self.base.as_deref().unwrap_or("Base");
                        match method {
                            None => format!("{}({})", base, self.arguments(args)),
                            Some(method) => format!("{}::{}({})", base, method, self.arguments(args)),
                        }
                    }
                };
                (text, POSTFIX)
            }
            ExpressionKind::Cast {
                target_type,
                operand,
            } => {
                if self.is_cpp() {
                    let ty = self.cpp_type(target_type, TypeSite::Signature);
                    (format!("({}){}", ty, self.expression(operand, UNARY)), UNARY)
                } else {
                    // No cast syntax in the JS grammar; the conversion is dropped.
                    self.render(operand)
                }
            }
        }
    }
}

/// Keeps `- -x` and `+ +x` from lexing as `--x` / `++x`.
fn prefix(symbol: &str, operand: &str) -> String {
    let clash = symbol
        .chars()
        .last()
        .zip(operand.chars().next())
        .map_or(false, |(a, b)| (a == '-' || a == '+') && a == b);
    if clash {
        format!("{} {}", symbol, operand)
    } else {
        format!("{}{}", symbol, operand)
    }
}

/// Whether `statement` ends in an `if` without `else`.
fn ends_in_open_if(statement: &Statement) -> bool {
    match &statement.kind {
        StatementKind::If {
            else_branch: None, ..
        } => true,
        StatementKind::If {
            else_branch: Some(else_branch),
            ..
        } => ends_in_open_if(else_branch),
        StatementKind::While { body, .. } | StatementKind::For { body, .. } => ends_in_open_if(body),
        _ => false,
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
