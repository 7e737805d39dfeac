use crate::error::SourceLocation;
use crate::types::{Type, Visibility};
use serde::Serialize;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: Type,
    pub default: Option<Expression>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDecl {
    pub name: String,
    /// Class name for an out-of-line member definition (`int Point::sum() {}`).
    pub owner: Option<String>,
    pub params: Vec<Parameter>,
    pub return_type: Type,
    /// `None` for a prototype.
    pub body: Option<Vec<Statement>>,
    pub location: SourceLocation,
}

impl FunctionDecl {
    /// Number of parameters without a default value.
    pub fn required_params(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDecl {
    pub name: String,
    pub field_type: Type,
    pub initializer: Option<Expression>,
    pub visibility: Visibility,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodDecl {
    pub function: Rc<FunctionDecl>,
    pub visibility: Visibility,
    pub is_virtual: bool,
    /// `virtual void f() = 0;`
    pub is_abstract: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassDecl {
    pub name: String,
    pub base: Option<String>,
    pub is_struct: bool,
    pub fields: Vec<FieldDecl>,
    pub constructor: Option<MethodDecl>,
    pub methods: Vec<MethodDecl>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumMember {
    pub name: String,
    pub value: Option<Expression>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumDecl {
    pub name: String,
    /// Scoped enums are only reachable through their name.
    pub scoped: bool,
    pub members: Vec<EnumMember>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarDecl {
    pub name: String,
    /// `None` declares a dynamically typed variable (`var`, `let`, `auto`).
    pub var_type: Option<Type>,
    pub initializer: Option<Expression>,
    pub constant: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub kind: StatementKind,
    pub location: SourceLocation,
}

impl Statement {
    pub fn new(kind: StatementKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StatementKind {
    Expression(Expression),
    /// One declaration statement may introduce several variables.
    VarDecl(Vec<VarDecl>),
    Block(Vec<Statement>),
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    DoWhile {
        body: Box<Statement>,
        condition: Expression,
    },
    For {
        init: Option<Box<Statement>>,
        condition: Option<Expression>,
        update: Option<Expression>,
        body: Box<Statement>,
    },
    Return(Option<Expression>),
    Break,
    Continue,
    Function(Rc<FunctionDecl>),
    Class(Rc<ClassDecl>),
    Enum(EnumDecl),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub location: SourceLocation,
}

impl Expression {
    pub fn new(kind: ExpressionKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }

    /// Whether the expression denotes a storage location.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExpressionKind::Identifier(_)
                | ExpressionKind::Member { .. }
                | ExpressionKind::Index { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExpressionKind {
    Integer(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Null,
    Identifier(String),
    This,
    ArrayLiteral(Vec<Expression>),
    Binary {
        left: Box<Expression>,
        operator: BinaryOperator,
        right: Box<Expression>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    /// `++x`, `x--` and friends.
    Update {
        increment: bool,
        prefix: bool,
        target: Box<Expression>,
    },
    /// Plain `=` has no operator; `+=` carries `Add`, and so on.
    Assign {
        target: Box<Expression>,
        operator: Option<BinaryOperator>,
        value: Box<Expression>,
    },
    Conditional {
        condition: Box<Expression>,
        then_expr: Box<Expression>,
        else_expr: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },
    Member {
        object: Box<Expression>,
        member: String,
    },
    /// `Scope::member`, naming an enum member or a class method.
    Scope {
        scope: String,
        member: String,
    },
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    New {
        class: String,
        args: Vec<Expression>,
    },
    NewArray {
        element_type: Type,
        size: Box<Expression>,
    },
    /// Base constructor call when `method` is `None`, otherwise a
    /// non-virtual call of the base implementation.
    SuperCall {
        method: Option<String>,
        args: Vec<Expression>,
    },
    Cast {
        target_type: Type,
        operand: Box<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOperator {
    Not,
    Negate,
    Plus,
    BitNot,
}

impl UnaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOperator::Not => "!",
            UnaryOperator::Negate => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::ShiftLeft => "<<",
            BinaryOperator::ShiftRight => ">>",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::StrictEqual => "===",
            BinaryOperator::StrictNotEqual => "!==",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }

    /// Binding strength, higher binds tighter. Shared by both grammars.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 3,
            BinaryOperator::And => 4,
            BinaryOperator::BitOr => 5,
            BinaryOperator::BitXor => 6,
            BinaryOperator::BitAnd => 7,
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::StrictEqual
            | BinaryOperator::StrictNotEqual => 8,
            BinaryOperator::Less
            | BinaryOperator::LessEqual
            | BinaryOperator::Greater
            | BinaryOperator::GreaterEqual => 9,
            BinaryOperator::ShiftLeft | BinaryOperator::ShiftRight => 10,
            BinaryOperator::Add | BinaryOperator::Subtract => 11,
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub statements: Vec<Statement>,
}
