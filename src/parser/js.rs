use super::{ExpressionParser, Frontend, TokenCursor};
use crate::ast::{
    ClassDecl, EnumDecl, EnumMember, Expression, ExpressionKind, FieldDecl, FunctionDecl,
    MethodDecl, Parameter, Program, Statement, StatementKind, UnaryOperator, VarDecl,
};
use crate::error::{ParseError, ParseResult, SourceLocation};
use crate::lexer::{Grammar, Keyword, Token, TokenType};
use crate::types::{Type, Visibility};
use std::rc::Rc;

/// Recursive-descent parser for the JavaScript-like grammar, with optional
/// `: type` annotations.
pub struct JsParser {
    cursor: TokenCursor,
    function_depth: usize,
}

impl Frontend for JsParser {
    fn grammar(&self) -> Grammar {
        Grammar::Js
    }

    fn parse_program(&mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        while !self.cursor.is_at_end() {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }
}

impl ExpressionParser for JsParser {
    fn cursor(&mut self) -> &mut TokenCursor {
        &mut self.cursor
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let location = self.cursor.location();
        let operator = match self.cursor.peek().token_type {
            TokenType::Bang => Some(UnaryOperator::Not),
            TokenType::Minus => Some(UnaryOperator::Negate),
            TokenType::Plus => Some(UnaryOperator::Plus),
            TokenType::Tilde => Some(UnaryOperator::BitNot),
            _ => None,
        };
        if let Some(operator) = operator {
            self.cursor.advance();
            let operand = self.nested(Self::parse_unary)?;
            return Ok(Expression::new(
                ExpressionKind::Unary {
                    operator,
                    operand: Box::new(operand),
                },
                location,
            ));
        }

        if matches!(
            self.cursor.peek().token_type,
            TokenType::PlusPlus | TokenType::MinusMinus
        ) {
            let increment = self.cursor.advance().token_type == TokenType::PlusPlus;
            let target = self.nested(Self::parse_unary)?;
            if !target.is_assignable() {
                return Err(ParseError::InvalidSyntax {
                    message: "Invalid increment/decrement target".to_string(),
                    location,
                });
            }
            return Ok(Expression::new(
                ExpressionKind::Update {
                    increment,
                    prefix: true,
                    target: Box::new(target),
                },
                location,
            ));
        }

        self.parse_postfix()
    }
}

impl JsParser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            cursor: TokenCursor::new(tokens),
            function_depth: 0,
        }
    }

    /// Semicolons may be left out before '}', at end of input or at a line break.
    fn end_statement(&mut self, expected: &str) -> ParseResult<()> {
        if self.cursor.match_token(&TokenType::Semicolon)
            || self.cursor.check(&TokenType::RightBrace)
            || self.cursor.is_at_end()
            || self.cursor.peek().location.line > self.cursor.previous().location.line
        {
            Ok(())
        } else {
            Err(self.cursor.error_expected(expected))
        }
    }

    // Statements

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        self.nested(Self::parse_statement_level)
    }

    fn parse_statement_level(&mut self) -> ParseResult<Statement> {
        let location = self.cursor.location();
        match &self.cursor.peek().token_type {
            TokenType::Semicolon => {
                self.cursor.advance();
                Ok(Statement::new(StatementKind::Empty, location))
            }
            TokenType::LeftBrace => {
                let statements = self.parse_block()?;
                Ok(Statement::new(StatementKind::Block(statements), location))
            }
            TokenType::Keyword(Keyword::Var)
            | TokenType::Keyword(Keyword::Let)
            | TokenType::Keyword(Keyword::Const) => {
                let declarations = self.parse_var_declarations()?;
                self.end_statement("';' after declaration")?;
                Ok(Statement::new(StatementKind::VarDecl(declarations), location))
            }
            TokenType::Keyword(Keyword::Function) => {
                if self.function_depth > 0 {
                    return Err(self.cursor.not_implemented("Nested function declarations"));
                }
                self.parse_function()
            }
            TokenType::Keyword(Keyword::Class) => {
                if self.function_depth > 0 {
                    return Err(self.cursor.not_implemented("Local class declarations"));
                }
                self.parse_class()
            }
            TokenType::Keyword(Keyword::Enum) => {
                if self.function_depth > 0 {
                    return Err(self.cursor.not_implemented("Local enum declarations"));
                }
                self.parse_enum()
            }
            TokenType::Keyword(Keyword::If) => self.parse_if(),
            TokenType::Keyword(Keyword::While) => self.parse_while(),
            TokenType::Keyword(Keyword::Do) => self.parse_do_while(),
            TokenType::Keyword(Keyword::For) => self.parse_for(),
            TokenType::Keyword(Keyword::Return) => {
                self.cursor.advance(); // consume 'return'
                let same_line = self.cursor.peek().location.line == self.cursor.previous().location.line;
                let value = if self.cursor.check(&TokenType::Semicolon)
                    || self.cursor.check(&TokenType::RightBrace)
                    || self.cursor.is_at_end()
                    || !same_line
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.end_statement("';' after return")?;
                Ok(Statement::new(StatementKind::Return(value), location))
            }
            TokenType::Keyword(Keyword::Break) => {
                self.cursor.advance();
                self.end_statement("';' after break")?;
                Ok(Statement::new(StatementKind::Break, location))
            }
            TokenType::Keyword(Keyword::Continue) => {
                self.cursor.advance();
                self.end_statement("';' after continue")?;
                Ok(Statement::new(StatementKind::Continue, location))
            }
            _ => {
                let expr = self.parse_expression()?;
                self.end_statement("';' after expression")?;
                Ok(Statement::new(StatementKind::Expression(expr), location))
            }
        }
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Statement>> {
        self.cursor.consume(&TokenType::LeftBrace, "'{'")?;
        let mut statements = Vec::new();
        while !self.cursor.check(&TokenType::RightBrace) {
            if self.cursor.is_at_end() {
                return Err(self.cursor.error_expected("'}'"));
            }
            statements.push(self.parse_statement()?);
        }
        self.cursor.advance(); // consume '}'
        Ok(statements)
    }

    fn parse_condition(&mut self) -> ParseResult<Expression> {
        self.cursor.consume(&TokenType::LeftParen, "'(' before condition")?;
        let condition = self.parse_expression()?;
        self.cursor.consume(&TokenType::RightParen, "')' after condition")?;
        Ok(condition)
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        let location = self.cursor.advance().location; // consume 'if'
        let condition = self.parse_condition()?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.cursor.match_keyword(Keyword::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::new(
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            },
            location,
        ))
    }

    fn parse_while(&mut self) -> ParseResult<Statement> {
        let location = self.cursor.advance().location; // consume 'while'
        let condition = self.parse_condition()?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::new(StatementKind::While { condition, body }, location))
    }

    fn parse_do_while(&mut self) -> ParseResult<Statement> {
        let location = self.cursor.advance().location; // consume 'do'
        let body = Box::new(self.parse_statement()?);
        self.cursor.consume_keyword(Keyword::While, "'while' after do body")?;
        let condition = self.parse_condition()?;
        self.end_statement("';' after do-while")?;
        Ok(Statement::new(StatementKind::DoWhile { body, condition }, location))
    }

    fn parse_for(&mut self) -> ParseResult<Statement> {
        let location = self.cursor.advance().location; // consume 'for'
        self.cursor.consume(&TokenType::LeftParen, "'(' after 'for'")?;

        let init_location = self.cursor.location();
        let init = if self.cursor.check(&TokenType::Semicolon) {
            None
        } else if matches!(
            self.cursor.peek().token_type,
            TokenType::Keyword(Keyword::Var | Keyword::Let | Keyword::Const)
        ) {
            let declarations = self.parse_var_declarations()?;
            Some(Box::new(Statement::new(
                StatementKind::VarDecl(declarations),
                init_location,
            )))
        } else {
            let expr = self.parse_expression()?;
            Some(Box::new(Statement::new(
                StatementKind::Expression(expr),
                init_location,
            )))
        };
        if matches!(&self.cursor.peek().token_type, TokenType::Identifier(word) if word == "of" || word == "in")
        {
            return Err(self.cursor.not_implemented("for-of/for-in loops"));
        }
        self.cursor.consume(&TokenType::Semicolon, "';' after for initializer")?;

        let condition = if self.cursor.check(&TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.cursor.consume(&TokenType::Semicolon, "';' after for condition")?;

        let update = if self.cursor.check(&TokenType::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.cursor.consume(&TokenType::RightParen, "')' after for clauses")?;

        let body = Box::new(self.parse_statement()?);
        Ok(Statement::new(
            StatementKind::For {
                init,
                condition,
                update,
                body,
            },
            location,
        ))
    }

    // Declarations

    /// Optional `: type` annotation.
    fn parse_annotation(&mut self) -> ParseResult<Option<Type>> {
        if self.cursor.match_token(&TokenType::Colon) {
            Ok(Some(self.parse_type()?))
        } else {
            Ok(None)
        }
    }

    fn parse_type(&mut self) -> ParseResult<Type> {
        let base = match self.cursor.peek().token_type.clone() {
            TokenType::Identifier(name) => {
                self.cursor.advance();
                match name.as_str() {
                    "int" | "long" | "char" => Type::Int,
                    "number" | "float" | "double" => Type::Float,
                    "string" => Type::String,
                    "bool" | "boolean" => Type::Bool,
                    "void" => Type::Void,
                    "any" => Type::Any,
                    _ => Type::Named(name),
                }
            }
            TokenType::Keyword(Keyword::Null) => {
                self.cursor.advance();
                Type::Any
            }
            _ => return Err(self.cursor.error_expected("type name")),
        };
        let mut result = base;
        while self.cursor.check(&TokenType::LeftBracket)
            && self.cursor.peek_at(1).token_type == TokenType::RightBracket
        {
            self.cursor.advance();
            self.cursor.advance();
            result = Type::Array(Box::new(result));
        }
        Ok(result)
    }

    fn parse_var_declarations(&mut self) -> ParseResult<Vec<VarDecl>> {
        let constant = self.cursor.advance().token_type == TokenType::Keyword(Keyword::Const);
        let mut declarations = Vec::new();
        loop {
            let (name, location) = self.cursor.consume_identifier("variable name")?;
            let var_type = self.parse_annotation()?.filter(|t| *t != Type::Any);
            let initializer = if self.cursor.match_token(&TokenType::Equal) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            if constant && initializer.is_none() {
                return Err(ParseError::InvalidSyntax {
                    message: format!("Missing initializer in const declaration '{}'", name),
                    location,
                });
            }
            declarations.push(VarDecl {
                name,
                var_type,
                initializer,
                constant,
                location,
            });
            if !self.cursor.match_token(&TokenType::Comma) {
                break;
            }
        }
        Ok(declarations)
    }

    fn parse_parameters(&mut self) -> ParseResult<Vec<Parameter>> {
        self.cursor.consume(&TokenType::LeftParen, "'(' before parameters")?;
        let mut params = Vec::new();
        if !self.cursor.check(&TokenType::RightParen) {
            loop {
                if self.cursor.check(&TokenType::Ellipsis) {
                    return Err(self.cursor.not_implemented("Rest parameters"));
                }
                let (name, location) = self.cursor.consume_identifier("parameter name")?;
                let param_type = self.parse_annotation()?.unwrap_or(Type::Any);
                let default = if self.cursor.match_token(&TokenType::Equal) {
                    Some(self.parse_assignment()?)
                } else {
                    None
                };
                params.push(Parameter {
                    name,
                    param_type,
                    default,
                    location,
                });
                if !self.cursor.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.cursor.consume(&TokenType::RightParen, "')' after parameters")?;
        Ok(params)
    }

    fn parse_function_body(&mut self) -> ParseResult<Vec<Statement>> {
        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;
        body
    }

    fn parse_function(&mut self) -> ParseResult<Statement> {
        let location = self.cursor.advance().location; // consume 'function'
        let (name, _) = self.cursor.consume_identifier("function name")?;
        let params = self.parse_parameters()?;
        let return_type = self.parse_annotation()?.unwrap_or(Type::Any);
        let body = self.parse_function_body()?;
        Ok(Statement::new(
            StatementKind::Function(Rc::new(FunctionDecl {
                name,
                owner: None,
                params,
                return_type,
                body: Some(body),
                location,
            })),
            location,
        ))
    }

    fn parse_class(&mut self) -> ParseResult<Statement> {
        let location = self.cursor.advance().location; // consume 'class'
        let (name, _) = self.cursor.consume_identifier("class name")?;
        let base = if self.cursor.match_keyword(Keyword::Extends) {
            Some(self.cursor.consume_identifier("base class name")?.0)
        } else {
            None
        };
        self.cursor.consume(&TokenType::LeftBrace, "'{' before class body")?;

        let mut fields = Vec::new();
        let mut constructor = None;
        let mut methods = Vec::new();

        while !self.cursor.match_token(&TokenType::RightBrace) {
            if self.cursor.is_at_end() {
                return Err(self.cursor.error_expected("'}' after class body"));
            }
            if self.cursor.match_token(&TokenType::Semicolon) {
                continue;
            }
            if self.cursor.check_keyword(Keyword::Static) {
                return Err(self.cursor.not_implemented("Static members"));
            }

            let member_location = self.cursor.location();
            let (member, _) = self.cursor.consume_identifier("class member")?;
            // `#name` members are private.
            let visibility = if member.starts_with('#') {
                Visibility::Private
            } else {
                Visibility::Public
            };

            if self.cursor.check(&TokenType::LeftParen) {
                let params = self.parse_parameters()?;
                let is_constructor = member == "constructor";
                let return_type = if is_constructor {
                    Type::Void
                } else {
                    self.parse_annotation()?.unwrap_or(Type::Any)
                };
                let body = self.parse_function_body()?;
                let method = MethodDecl {
                    function: Rc::new(FunctionDecl {
                        name: if is_constructor { name.clone() } else { member },
                        owner: Some(name.clone()),
                        params,
                        return_type,
                        body: Some(body),
                        location: member_location,
                    }),
                    visibility,
                    is_virtual: true,
                    is_abstract: false,
                };
                if is_constructor {
                    if constructor.is_some() {
                        return Err(ParseError::InvalidSyntax {
                            message: "A class may only have one constructor".to_string(),
                            location: member_location,
                        });
                    }
                    constructor = Some(method);
                } else {
                    methods.push(method);
                }
                continue;
            }

            let field_type = self.parse_annotation()?.unwrap_or(Type::Any);
            let initializer = if self.cursor.match_token(&TokenType::Equal) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            self.end_statement("';' after field")?;
            fields.push(FieldDecl {
                name: member,
                field_type,
                initializer,
                visibility,
                location: member_location,
            });
        }

        Ok(Statement::new(
            StatementKind::Class(Rc::new(ClassDecl {
                name,
                base,
                is_struct: false,
                fields,
                constructor,
                methods,
                location,
            })),
            location,
        ))
    }

    fn parse_enum(&mut self) -> ParseResult<Statement> {
        let location = self.cursor.advance().location; // consume 'enum'
        let (name, _) = self.cursor.consume_identifier("enum name")?;
        self.cursor.consume(&TokenType::LeftBrace, "'{' before enum members")?;
        let mut members = Vec::new();
        while !self.cursor.check(&TokenType::RightBrace) {
            let (member, member_location) = self.cursor.consume_identifier("enum member")?;
            let value = if self.cursor.match_token(&TokenType::Equal) {
                Some(self.parse_conditional()?)
            } else {
                None
            };
            members.push(EnumMember {
                name: member,
                value,
                location: member_location,
            });
            if !self.cursor.match_token(&TokenType::Comma) {
                break;
            }
        }
        self.cursor.consume(&TokenType::RightBrace, "'}' after enum members")?;
        Ok(Statement::new(
            StatementKind::Enum(EnumDecl {
                name,
                scoped: true,
                members,
                location,
            }),
            location,
        ))
    }

    // Expressions

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;

        loop {
            let location = self.cursor.location();
            match self.cursor.peek().token_type {
                TokenType::LeftParen => {
                    self.cursor.advance(); // consume '('
                    let args = self.parse_arguments()?;
                    expr = Expression::new(
                        ExpressionKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        location,
                    );
                }
                TokenType::Dot => {
                    self.cursor.advance(); // consume '.'
                    let (member, _) = self.cursor.consume_identifier("property name")?;
                    expr = Expression::new(
                        ExpressionKind::Member {
                            object: Box::new(expr),
                            member,
                        },
                        location,
                    );
                }
                TokenType::LeftBracket => {
                    self.cursor.advance(); // consume '['
                    let index = self.parse_expression()?;
                    self.cursor.consume(&TokenType::RightBracket, "']' after index")?;
                    expr = Expression::new(
                        ExpressionKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        location,
                    );
                }
                TokenType::PlusPlus | TokenType::MinusMinus => {
                    // A line break before ++/-- ends the statement.
                    if location.line > self.cursor.previous().location.line {
                        break;
                    }
                    if !expr.is_assignable() {
                        return Err(self.cursor.invalid("Invalid increment/decrement target"));
                    }
                    let increment = self.cursor.advance().token_type == TokenType::PlusPlus;
                    expr = Expression::new(
                        ExpressionKind::Update {
                            increment,
                            prefix: false,
                            target: Box::new(expr),
                        },
                        location,
                    );
                }
                TokenType::FatArrow => {
                    return Err(self.cursor.not_implemented("Arrow functions"));
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let location = self.cursor.location();
        let kind = match self.cursor.peek().token_type.clone() {
            TokenType::Integer(value) => {
                self.cursor.advance();
                ExpressionKind::Integer(value)
            }
            TokenType::Float(value) => {
                self.cursor.advance();
                ExpressionKind::Float(value)
            }
            TokenType::String(value) => {
                self.cursor.advance();
                ExpressionKind::String(value)
            }
            TokenType::Keyword(Keyword::True) => {
                self.cursor.advance();
                ExpressionKind::Bool(true)
            }
            TokenType::Keyword(Keyword::False) => {
                self.cursor.advance();
                ExpressionKind::Bool(false)
            }
            TokenType::Keyword(Keyword::Null) => {
                self.cursor.advance();
                ExpressionKind::Null
            }
            TokenType::Keyword(Keyword::This) => {
                self.cursor.advance();
                ExpressionKind::This
            }
            TokenType::Keyword(Keyword::Super) => {
                self.cursor.advance(); // consume 'super'
                return self.parse_super(location);
            }
            TokenType::Keyword(Keyword::New) => {
                self.cursor.advance(); // consume 'new'
                return self.parse_new(location);
            }
            TokenType::Keyword(Keyword::Function) => {
                return Err(self.cursor.not_implemented("Function expressions"));
            }
            TokenType::Identifier(name) => {
                self.cursor.advance();
                ExpressionKind::Identifier(name)
            }
            TokenType::LeftParen => {
                self.cursor.advance(); // consume '('
                if self.cursor.check(&TokenType::RightParen) {
                    return Err(self.cursor.not_implemented("Arrow functions"));
                }
                let expr = self.parse_expression()?;
                self.cursor.consume(&TokenType::RightParen, "')' after expression")?;
                return Ok(expr);
            }
            TokenType::LeftBracket => {
                self.cursor.advance(); // consume '['
                let mut elements = Vec::new();
                while !self.cursor.check(&TokenType::RightBracket) {
                    elements.push(self.parse_assignment()?);
                    if !self.cursor.match_token(&TokenType::Comma) {
                        break;
                    }
                }
                self.cursor.consume(&TokenType::RightBracket, "']' after array elements")?;
                ExpressionKind::ArrayLiteral(elements)
            }
            _ => return Err(self.cursor.error_expected("expression")),
        };
        Ok(Expression::new(kind, location))
    }

    fn parse_super(&mut self, location: SourceLocation) -> ParseResult<Expression> {
        let method = if self.cursor.match_token(&TokenType::Dot) {
            Some(self.cursor.consume_identifier("method name after 'super.'")?.0)
        } else {
            None
        };
        self.cursor.consume(&TokenType::LeftParen, "'(' after super")?;
        let args = self.parse_arguments()?;
        Ok(Expression::new(
            ExpressionKind::SuperCall { method, args },
            location,
        ))
    }

    fn parse_new(&mut self, location: SourceLocation) -> ParseResult<Expression> {
        let (class, _) = self.cursor.consume_identifier("class name after 'new'")?;
        let args = if self.cursor.match_token(&TokenType::LeftParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };

        // `new Array(n)` allocates n null slots.
        if class == "Array" {
            let mut args = args;
            if args.len() != 1 {
                return Err(ParseError::InvalidSyntax {
                    message: "new Array expects exactly one length argument".to_string(),
                    location,
                });
            }
            return Ok(Expression::new(
                ExpressionKind::NewArray {
                    element_type: Type::Any,
                    size: Box::new(args.remove(0)),
                },
                location,
            ));
        }

        Ok(Expression::new(ExpressionKind::New { class, args }, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> ParseResult<Program> {
        let tokens = Lexer::new(source, Grammar::Js).tokenize()?;
        JsParser::new(tokens).parse_program()
    }

    #[test]
    fn test_class_with_constructor_super_and_private_field() {
        let source = "class B extends A {
            #secret = 1;
            count: int;
            constructor(x, y = 2) { super(x); this.count = y; }
            total(): int { return super.total() + this.#secret; }
        }";
        let program = parse(source).unwrap();
        let StatementKind::Class(class) = &program.statements[0].kind else {
            panic!("expected class");
        };
        assert_eq!(class.base.as_deref(), Some("A"));
        assert_eq!(class.fields[0].name, "#secret");
        assert_eq!(class.fields[0].visibility, Visibility::Private);
        assert_eq!(class.fields[1].field_type, Type::Int);
        let ctor = class.constructor.as_ref().unwrap();
        assert_eq!(ctor.function.name, "B");
        assert_eq!(ctor.function.required_params(), 1);
        assert_eq!(class.methods[0].function.return_type, Type::Int);
    }

    #[test]
    fn test_optional_semicolons() {
        let program = parse("let a = 1\nlet b = a + 2\nb").unwrap();
        assert_eq!(program.statements.len(), 3);
        assert!(parse("let a = 1 let b = 2").is_err());
    }

    #[test]
    fn test_return_on_its_own_line_returns_nothing() {
        let program = parse("function f() {\n return\n 42\n}").unwrap();
        let StatementKind::Function(f) = &program.statements[0].kind else {
            panic!("expected function");
        };
        let body = f.body.as_ref().unwrap();
        assert_eq!(body[0].kind, StatementKind::Return(None));
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_annotations_and_untyped_declarations() {
        let program = parse("var x; let y: number = 1; const z: string[] = [];").unwrap();
        let decls: Vec<_> = program
            .statements
            .iter()
            .map(|s| match &s.kind {
                StatementKind::VarDecl(d) => d[0].clone(),
                _ => panic!("expected declaration"),
            })
            .collect();
        assert_eq!(decls[0].var_type, None);
        assert_eq!(decls[1].var_type, Some(Type::Float));
        assert_eq!(
            decls[2].var_type,
            Some(Type::Array(Box::new(Type::String)))
        );
        assert!(decls[2].constant);
    }

    #[test]
    fn test_enum_is_scoped() {
        let program = parse("enum Color { Red, Green = 4 }\nlet c = Color.Green").unwrap();
        let StatementKind::Enum(color) = &program.statements[0].kind else {
            panic!("expected enum");
        };
        assert!(color.scoped);
        assert_eq!(color.members.len(), 2);
    }

    #[test]
    fn test_closures_are_rejected() {
        for source in [
            "let f = (a) => a",
            "function outer() { function inner() {} }",
            "let g = function() {}",
        ] {
            let err = parse(source).unwrap_err();
            assert!(matches!(err, ParseError::NotImplemented { .. }), "{}: {:?}", source, err);
        }
    }

    #[test]
    fn test_new_array_lowering() {
        let program = parse("let a = new Array(3)").unwrap();
        let StatementKind::VarDecl(d) = &program.statements[0].kind else {
            panic!("expected declaration");
        };
        assert!(matches!(
            d[0].initializer.as_ref().map(|e| &e.kind),
            Some(ExpressionKind::NewArray { element_type: Type::Any, .. })
        ));
    }
}
