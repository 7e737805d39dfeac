use super::{ExpressionParser, Frontend, TokenCursor};
use crate::ast::{
    ClassDecl, EnumDecl, EnumMember, Expression, ExpressionKind, FieldDecl, FunctionDecl,
    MethodDecl, Parameter, Program, Statement, StatementKind, UnaryOperator, VarDecl,
};
use crate::error::{ParseError, ParseResult, SourceLocation};
use crate::lexer::{Grammar, Keyword, Token, TokenType};
use crate::types::{Type, Visibility};
use std::rc::Rc;

/// Recursive-descent parser for the C++-like grammar.
pub struct CppParser {
    cursor: TokenCursor,
    /// Name of the class whose body is being parsed.
    class_name: Option<String>,
    function_depth: usize,
}

impl Frontend for CppParser {
    fn grammar(&self) -> Grammar {
        Grammar::Cpp
    }

    fn parse_program(&mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        while !self.cursor.is_at_end() {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }
}

impl ExpressionParser for CppParser {
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

        // C-style cast: '(' type ')' operand
        if self.cursor.check(&TokenType::LeftParen) && self.is_cast_ahead() {
            self.cursor.advance(); // consume '('
            let target_type = self.parse_type()?.0;
            self.cursor.consume(&TokenType::RightParen, "')' after cast type")?;
            let operand = self.nested(Self::parse_unary)?;
            return Ok(Expression::new(
                ExpressionKind::Cast {
                    target_type,
                    operand: Box::new(operand),
                },
                location,
            ));
        }

        self.parse_postfix()
    }
}

impl CppParser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            cursor: TokenCursor::new(tokens),
            class_name: None,
            function_depth: 0,
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
            TokenType::Keyword(Keyword::If) => self.parse_if(),
            TokenType::Keyword(Keyword::While) => self.parse_while(),
            TokenType::Keyword(Keyword::Do) => self.parse_do_while(),
            TokenType::Keyword(Keyword::For) => self.parse_for(),
            TokenType::Keyword(Keyword::Return) => {
                self.cursor.advance(); // consume 'return'
                let value = if self.cursor.check(&TokenType::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.cursor.consume(&TokenType::Semicolon, "';' after return")?;
                Ok(Statement::new(StatementKind::Return(value), location))
            }
            TokenType::Keyword(Keyword::Break) => {
                self.cursor.advance();
                self.cursor.consume(&TokenType::Semicolon, "';' after break")?;
                Ok(Statement::new(StatementKind::Break, location))
            }
            TokenType::Keyword(Keyword::Continue) => {
                self.cursor.advance();
                self.cursor.consume(&TokenType::Semicolon, "';' after continue")?;
                Ok(Statement::new(StatementKind::Continue, location))
            }
            TokenType::Keyword(Keyword::Class) | TokenType::Keyword(Keyword::Struct) => {
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
            _ if self.is_declaration_start() => self.parse_declaration(),
            _ => {
                let expr = self.parse_expression()?;
                self.cursor.consume(&TokenType::Semicolon, "';' after expression")?;
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
        self.cursor.consume(&TokenType::Semicolon, "';' after do-while")?;
        Ok(Statement::new(StatementKind::DoWhile { body, condition }, location))
    }

    fn parse_for(&mut self) -> ParseResult<Statement> {
        let location = self.cursor.advance().location; // consume 'for'
        self.cursor.consume(&TokenType::LeftParen, "'(' after 'for'")?;

        let init = if self.cursor.match_token(&TokenType::Semicolon) {
            None
        } else if self.is_declaration_start() {
            Some(Box::new(self.parse_declaration()?))
        } else {
            let init_location = self.cursor.location();
            let expr = self.parse_expression()?;
            self.cursor.consume(&TokenType::Semicolon, "';' after for initializer")?;
            Some(Box::new(Statement::new(
                StatementKind::Expression(expr),
                init_location,
            )))
        };

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

    fn is_type_keyword(token_type: &TokenType) -> bool {
        matches!(
            token_type,
            TokenType::Keyword(
                Keyword::Const
                    | Keyword::Static
                    | Keyword::Unsigned
                    | Keyword::Signed
                    | Keyword::Int
                    | Keyword::Long
                    | Keyword::Short
                    | Keyword::Char
                    | Keyword::Bool
                    | Keyword::Float
                    | Keyword::Double
                    | Keyword::Void
                    | Keyword::Auto
                    | Keyword::String
            )
        )
    }

    /// Whether the tokens ahead read as `Type name ...`.
    fn is_declaration_start(&self) -> bool {
        let first = &self.cursor.peek().token_type;
        if Self::is_type_keyword(first) {
            return true;
        }
        if !matches!(first, TokenType::Identifier(_)) {
            return false;
        }
        match &self.cursor.peek_at(1).token_type {
            TokenType::Identifier(_) => true,
            TokenType::Star | TokenType::Ampersand => {
                matches!(self.cursor.peek_at(2).token_type, TokenType::Identifier(_))
                    && matches!(
                        self.cursor.peek_at(3).token_type,
                        TokenType::Equal
                            | TokenType::Semicolon
                            | TokenType::LeftParen
                            | TokenType::Comma
                            | TokenType::LeftBracket
                            | TokenType::RightParen
                    )
            }
            TokenType::LeftBracket => {
                self.cursor.peek_at(2).token_type == TokenType::RightBracket
                    && matches!(self.cursor.peek_at(3).token_type, TokenType::Identifier(_))
            }
            // `std::string name`
            TokenType::ColonColon => {
                matches!(&self.cursor.peek().token_type, TokenType::Identifier(n) if n == "std")
                    && matches!(self.cursor.peek_at(3).token_type, TokenType::Identifier(_))
            }
            _ => false,
        }
    }

    /// Whether a '(' starts a C-style cast.
    fn is_cast_ahead(&self) -> bool {
        let next = &self.cursor.peek_at(1).token_type;
        if Self::is_type_keyword(next) {
            return true;
        }
        matches!(next, TokenType::Identifier(_))
            && self.cursor.peek_at(2).token_type == TokenType::Star
            && self.cursor.peek_at(3).token_type == TokenType::RightParen
    }

    /// Parse a type; the flag reports a `const` qualifier.
    pub(crate) fn parse_type(&mut self) -> ParseResult<(Type, bool)> {
        let mut constant = false;
        loop {
            if self.cursor.match_keyword(Keyword::Const) {
                constant = true;
            } else if !self.cursor.match_keyword(Keyword::Static) {
                break;
            }
        }

        let mut is_char = false;
        let base = match self.cursor.peek().token_type.clone() {
            TokenType::Keyword(Keyword::Unsigned) | TokenType::Keyword(Keyword::Signed) => {
                self.cursor.advance();
                if self.cursor.check_keyword(Keyword::Char) {
                    is_char = true;
                }
                self.skip_integer_words();
                Type::Int
            }
            TokenType::Keyword(Keyword::Long) => {
                self.cursor.advance();
                if self.cursor.match_keyword(Keyword::Double) {
                    Type::Float
                } else {
                    self.skip_integer_words();
                    Type::Int
                }
            }
            TokenType::Keyword(Keyword::Short) | TokenType::Keyword(Keyword::Int) => {
                self.cursor.advance();
                self.skip_integer_words();
                Type::Int
            }
            TokenType::Keyword(Keyword::Char) => {
                self.cursor.advance();
                is_char = true;
                Type::Int
            }
            TokenType::Keyword(Keyword::Bool) => {
                self.cursor.advance();
                Type::Bool
            }
            TokenType::Keyword(Keyword::Float) | TokenType::Keyword(Keyword::Double) => {
                self.cursor.advance();
                Type::Float
            }
            TokenType::Keyword(Keyword::Void) => {
                self.cursor.advance();
                Type::Void
            }
            TokenType::Keyword(Keyword::Auto) => {
                self.cursor.advance();
                Type::Any
            }
            TokenType::Keyword(Keyword::String) => {
                self.cursor.advance();
                Type::String
            }
            TokenType::Identifier(name) => {
                self.cursor.advance();
                if name == "std" && self.cursor.match_token(&TokenType::ColonColon) {
                    if self.cursor.match_keyword(Keyword::String) {
                        Type::String
                    } else {
                        let (inner, location) =
                            self.cursor.consume_identifier("type name after 'std::'")?;
                        return Err(ParseError::NotImplemented {
                            feature: format!("std::{}", inner),
                            location,
                        });
                    }
                } else {
                    Type::Named(name)
                }
            }
            _ => return Err(self.cursor.error_expected("type")),
        };

        if self.cursor.match_keyword(Keyword::Const) {
            constant = true;
        }

        let mut result = base;
        // Pointers and references are object handles already.
        while matches!(
            self.cursor.peek().token_type,
            TokenType::Star | TokenType::Ampersand
        ) {
            let pointer = self.cursor.advance().token_type == TokenType::Star;
            if pointer && is_char {
                result = Type::String;
                is_char = false;
            } else if pointer && result == Type::Void {
                result = Type::Any;
            }
            self.cursor.match_keyword(Keyword::Const);
        }
        while self.cursor.check(&TokenType::LeftBracket)
            && self.cursor.peek_at(1).token_type == TokenType::RightBracket
        {
            self.cursor.advance();
            self.cursor.advance();
            result = Type::Array(Box::new(result));
        }

        Ok((result, constant))
    }

    fn skip_integer_words(&mut self) {
        while matches!(
            self.cursor.peek().token_type,
            TokenType::Keyword(Keyword::Int | Keyword::Long | Keyword::Short | Keyword::Char)
        ) {
            self.cursor.advance();
        }
    }

    /// `Type name ...` at statement level: a function or a variable list.
    fn parse_declaration(&mut self) -> ParseResult<Statement> {
        let location = self.cursor.location();
        let (decl_type, constant) = self.parse_type()?;
        let (name, name_location) = self.cursor.consume_identifier("declaration name")?;

        if self.cursor.check(&TokenType::ColonColon) {
            self.cursor.advance(); // consume '::'
            let (member, _) = self.cursor.consume_identifier("member name after '::'")?;
            if self.function_depth > 0 {
                return Err(self.cursor.not_implemented("Nested function definitions"));
            }
            let function = self.parse_function_rest(member, Some(name), decl_type, location)?;
            return Ok(Statement::new(
                StatementKind::Function(Rc::new(function)),
                location,
            ));
        }

        if self.cursor.check(&TokenType::LeftParen) && self.is_parameter_list_ahead() {
            if self.function_depth > 0 {
                return Err(self.cursor.not_implemented("Nested function definitions"));
            }
            let function = self.parse_function_rest(name, None, decl_type, location)?;
            return Ok(Statement::new(
                StatementKind::Function(Rc::new(function)),
                location,
            ));
        }

        let mut declarations = vec![self.parse_declarator_rest(
            name,
            name_location,
            decl_type.clone(),
            constant,
        )?];
        while self.cursor.match_token(&TokenType::Comma) {
            let (name, name_location) = self.cursor.consume_identifier("variable name")?;
            declarations.push(self.parse_declarator_rest(
                name,
                name_location,
                decl_type.clone(),
                constant,
            )?);
        }
        self.cursor.consume(&TokenType::Semicolon, "';' after declaration")?;
        Ok(Statement::new(StatementKind::VarDecl(declarations), location))
    }

    /// Distinguishes `int f(int a)` from `Point p(1, 2)`.
    fn is_parameter_list_ahead(&self) -> bool {
        let next = &self.cursor.peek_at(1).token_type;
        if *next == TokenType::RightParen || Self::is_type_keyword(next) {
            return true;
        }
        matches!(next, TokenType::Identifier(_))
            && matches!(
                self.cursor.peek_at(2).token_type,
                TokenType::Identifier(_) | TokenType::Star | TokenType::Ampersand
            )
    }

    /// Array suffix and initializer after a variable name.
    fn parse_declarator_rest(
        &mut self,
        name: String,
        location: SourceLocation,
        mut var_type: Type,
        constant: bool,
    ) -> ParseResult<VarDecl> {
        let mut size = None;
        if self.cursor.match_token(&TokenType::LeftBracket) {
            if !self.cursor.check(&TokenType::RightBracket) {
                size = Some(self.parse_expression()?);
            }
            self.cursor.consume(&TokenType::RightBracket, "']' after array size")?;
            var_type = Type::Array(Box::new(var_type));
        }

        let initializer = if self.cursor.match_token(&TokenType::Equal) {
            if self.cursor.check(&TokenType::LeftBrace) {
                Some(self.parse_brace_list()?)
            } else {
                Some(self.parse_expression()?)
            }
        } else if self.cursor.check(&TokenType::LeftBrace) {
            Some(self.parse_brace_list()?)
        } else if self.cursor.check(&TokenType::LeftParen) {
            // Constructor-call syntax: `Point p(1, 2);`
            let ctor_location = self.cursor.advance().location;
            let args = self.parse_arguments()?;
            match &var_type {
                Type::Named(class) => Some(Expression::new(
                    ExpressionKind::New {
                        class: class.clone(),
                        args,
                    },
                    ctor_location,
                )),
                _ if args.len() == 1 => args.into_iter().next(),
                _ => {
                    return Err(ParseError::InvalidSyntax {
                        message: format!("Invalid initializer for '{}'", name),
                        location: ctor_location,
                    })
                }
            }
        } else if let (Some(size), Type::Array(element)) = (size, &var_type) {
            Some(Expression::new(
                ExpressionKind::NewArray {
                    element_type: (**element).clone(),
                    size: Box::new(size),
                },
                location,
            ))
        } else {
            None
        };

        Ok(VarDecl {
            name,
            var_type: if var_type == Type::Any {
                None
            } else {
                Some(var_type)
            },
            initializer,
            constant,
            location,
        })
    }

    fn parse_brace_list(&mut self) -> ParseResult<Expression> {
        let location = self.cursor.advance().location; // consume '{'
        let mut elements = Vec::new();
        while !self.cursor.check(&TokenType::RightBrace) {
            if self.cursor.check(&TokenType::LeftBrace) {
                elements.push(self.parse_brace_list()?);
            } else {
                elements.push(self.parse_assignment()?);
            }
            if !self.cursor.match_token(&TokenType::Comma) {
                break;
            }
        }
        self.cursor.consume(&TokenType::RightBrace, "'}' after initializer list")?;
        Ok(Expression::new(ExpressionKind::ArrayLiteral(elements), location))
    }

    fn parse_parameters(&mut self) -> ParseResult<Vec<Parameter>> {
        self.cursor.consume(&TokenType::LeftParen, "'(' before parameters")?;
        let mut params = Vec::new();

        // `f(void)`
        if self.cursor.check_keyword(Keyword::Void)
            && self.cursor.peek_at(1).token_type == TokenType::RightParen
        {
            self.cursor.advance();
        }

        if !self.cursor.check(&TokenType::RightParen) {
            loop {
                if self.cursor.check(&TokenType::Ellipsis) {
                    return Err(self.cursor.not_implemented("Variadic script functions"));
                }
                let location = self.cursor.location();
                let (mut param_type, _) = self.parse_type()?;
                let name = match &self.cursor.peek().token_type {
                    TokenType::Identifier(name) => {
                        let name = name.clone();
                        self.cursor.advance();
                        name
                    }
                    // Unnamed prototype parameter.
                    _ => format!("arg{}", params.len()),
                };
                if self.cursor.match_token(&TokenType::LeftBracket) {
                    self.cursor.consume(&TokenType::RightBracket, "']' in array parameter")?;
                    param_type = Type::Array(Box::new(param_type));
                }
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

    /// Skip trailing `const` / `override` qualifiers after a parameter list.
    fn skip_function_qualifiers(&mut self) {
        loop {
            if self.cursor.match_keyword(Keyword::Const) || self.cursor.match_keyword(Keyword::Override) {
                continue;
            }
            break;
        }
    }

    fn parse_function_body(&mut self) -> ParseResult<Vec<Statement>> {
        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;
        body
    }

    fn parse_function_rest(
        &mut self,
        name: String,
        owner: Option<String>,
        return_type: Type,
        location: SourceLocation,
    ) -> ParseResult<FunctionDecl> {
        let params = self.parse_parameters()?;
        self.skip_function_qualifiers();
        let body = if self.cursor.match_token(&TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_function_body()?)
        };
        Ok(FunctionDecl {
            name,
            owner,
            params,
            return_type,
            body,
            location,
        })
    }

    fn parse_class(&mut self) -> ParseResult<Statement> {
        let keyword = self.cursor.advance();
        let location = keyword.location;
        let is_struct = keyword.token_type == TokenType::Keyword(Keyword::Struct);
        let (name, _) = self.cursor.consume_identifier("class name")?;

        // Forward declaration.
        if self.cursor.match_token(&TokenType::Semicolon) {
            return Ok(Statement::new(StatementKind::Empty, location));
        }

        let base = if self.cursor.match_token(&TokenType::Colon) {
            while matches!(
                self.cursor.peek().token_type,
                TokenType::Keyword(
                    Keyword::Public | Keyword::Protected | Keyword::Private | Keyword::Virtual
                )
            ) {
                self.cursor.advance();
            }
            let (base, _) = self.cursor.consume_identifier("base class name")?;
            if self.cursor.check(&TokenType::Comma) {
                return Err(self.cursor.not_implemented("Multiple inheritance"));
            }
            Some(base)
        } else {
            None
        };

        self.cursor.consume(&TokenType::LeftBrace, "'{' before class body")?;
        let outer = self.class_name.replace(name.clone());
        let members = self.parse_class_members(&name, base.as_deref());
        self.class_name = outer;
        let (fields, constructor, methods) = members?;
        self.cursor.match_token(&TokenType::Semicolon);

        Ok(Statement::new(
            StatementKind::Class(Rc::new(ClassDecl {
                name,
                base,
                is_struct,
                fields,
                constructor,
                methods,
                location,
            })),
            location,
        ))
    }

    #[allow(clippy::type_complexity)]
    fn parse_class_members(
        &mut self,
        class: &str,
        base: Option<&str>,
    ) -> ParseResult<(Vec<FieldDecl>, Option<MethodDecl>, Vec<MethodDecl>)> {
        let mut visibility = Visibility::Public;
        let mut fields = Vec::new();
        let mut constructor = None;
        let mut methods = Vec::new();

        while !self.cursor.match_token(&TokenType::RightBrace) {
            if self.cursor.is_at_end() {
                return Err(self.cursor.error_expected("'}' after class body"));
            }
            let location = self.cursor.location();

            // Access labels.
            let label = match self.cursor.peek().token_type {
                TokenType::Keyword(Keyword::Public) => Some(Visibility::Public),
                TokenType::Keyword(Keyword::Protected) => Some(Visibility::Protected),
                TokenType::Keyword(Keyword::Private) => Some(Visibility::Private),
                _ => None,
            };
            if let Some(label) = label {
                self.cursor.advance();
                self.cursor.consume(&TokenType::Colon, "':' after access specifier")?;
                visibility = label;
                continue;
            }

            if self.cursor.match_token(&TokenType::Semicolon) {
                continue;
            }
            if self.cursor.check(&TokenType::Tilde) {
                return Err(self.cursor.not_implemented("Destructors"));
            }
            if self.cursor.check_keyword(Keyword::Static) {
                return Err(self.cursor.not_implemented("Static members"));
            }
            if matches!(
                self.cursor.peek().token_type,
                TokenType::Keyword(Keyword::Class | Keyword::Struct | Keyword::Enum)
            ) {
                return Err(self.cursor.not_implemented("Nested type declarations"));
            }

            let is_virtual = self.cursor.match_keyword(Keyword::Virtual);

            // Constructor: `Name(`
            if matches!(&self.cursor.peek().token_type, TokenType::Identifier(n) if n == class)
                && self.cursor.peek_at(1).token_type == TokenType::LeftParen
            {
                self.cursor.advance(); // consume class name
                let ctor = self.parse_constructor(class, base, location)?;
                if constructor.is_some() {
                    return Err(ParseError::NotImplemented {
                        feature: "Constructor overloading".to_string(),
                        location,
                    });
                }
                constructor = Some(MethodDecl {
                    function: Rc::new(ctor),
                    visibility,
                    is_virtual: false,
                    is_abstract: false,
                });
                continue;
            }

            let (member_type, _) = self.parse_type()?;
            let (name, name_location) = self.cursor.consume_identifier("member name")?;

            if self.cursor.check(&TokenType::LeftParen) {
                let params = self.parse_parameters()?;
                self.skip_function_qualifiers();
                let mut is_abstract = false;
                let body = if self.cursor.match_token(&TokenType::Equal) {
                    match self.cursor.peek().token_type {
                        TokenType::Integer(0) => {
                            self.cursor.advance();
                            is_abstract = true;
                        }
                        _ => return Err(self.cursor.error_expected("'0' in pure virtual declaration")),
                    }
                    self.cursor.consume(&TokenType::Semicolon, "';' after pure virtual method")?;
                    None
                } else if self.cursor.match_token(&TokenType::Semicolon) {
                    None
                } else {
                    Some(self.parse_function_body()?)
                };
                methods.push(MethodDecl {
                    function: Rc::new(FunctionDecl {
                        name,
                        owner: Some(class.to_string()),
                        params,
                        return_type: member_type,
                        body,
                        location,
                    }),
                    visibility,
                    is_virtual,
                    is_abstract,
                });
                continue;
            }

            let mut declarators = vec![(name, name_location)];
            while self.cursor.match_token(&TokenType::Comma) {
                declarators.push(self.cursor.consume_identifier("field name")?);
            }
            let initializer = if self.cursor.match_token(&TokenType::Equal) {
                Some(self.parse_expression()?)
            } else if self.cursor.check(&TokenType::LeftBrace) {
                let list = self.parse_brace_list()?;
                match list.kind {
                    ExpressionKind::ArrayLiteral(mut items) if items.len() == 1 => items.pop(),
                    ExpressionKind::ArrayLiteral(items) if items.is_empty() => None,
                    _ => Some(list),
                }
            } else {
                None
            };
            self.cursor.consume(&TokenType::Semicolon, "';' after field")?;
            for (name, location) in declarators {
                fields.push(FieldDecl {
                    name,
                    field_type: member_type.clone(),
                    initializer: initializer.clone(),
                    visibility,
                    location,
                });
            }
        }

        Ok((fields, constructor, methods))
    }

    /// Constructor after its name; lowers the member-initializer list to
    /// a base constructor call and field assignments at the top of the body.
    fn parse_constructor(
        &mut self,
        class: &str,
        base: Option<&str>,
        location: SourceLocation,
    ) -> ParseResult<FunctionDecl> {
        let params = self.parse_parameters()?;
        let mut prologue = Vec::new();

        if self.cursor.match_token(&TokenType::Colon) {
            loop {
                let (target, target_location) =
                    self.cursor.consume_identifier("member or base name in initializer list")?;
                let closing = if self.cursor.match_token(&TokenType::LeftBrace) {
                    TokenType::RightBrace
                } else {
                    self.cursor.consume(&TokenType::LeftParen, "'(' in initializer list")?;
                    TokenType::RightParen
                };
                let mut args = Vec::new();
                while !self.cursor.check(&closing) {
                    args.push(self.parse_assignment()?);
                    if !self.cursor.match_token(&TokenType::Comma) {
                        break;
                    }
                }
                self.cursor.consume(&closing, "end of initializer")?;

                let expr = if Some(target.as_str()) == base {
                    ExpressionKind::SuperCall { method: None, args }
                } else if args.len() == 1 {
                    let value = args.remove(0);
                    ExpressionKind::Assign {
                        target: Box::new(Expression::new(
                            ExpressionKind::Member {
                                object: Box::new(Expression::new(
                                    ExpressionKind::This,
                                    target_location,
                                )),
                                member: target,
                            },
                            target_location,
                        )),
                        operator: None,
                        value: Box::new(value),
                    }
                } else {
                    return Err(ParseError::InvalidSyntax {
                        message: format!("Member initializer for '{}' takes one value", target),
                        location: target_location,
                    });
                };
                prologue.push(Statement::new(
                    StatementKind::Expression(Expression::new(expr, target_location)),
                    target_location,
                ));

                if !self.cursor.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }

        if self.cursor.check(&TokenType::Semicolon) {
            return Err(self.cursor.not_implemented("Out-of-line constructors"));
        }
        let mut body = self.parse_function_body()?;
        prologue.append(&mut body);

        Ok(FunctionDecl {
            name: class.to_string(),
            owner: Some(class.to_string()),
            params,
            return_type: Type::Void,
            body: Some(prologue),
            location,
        })
    }

    fn parse_enum(&mut self) -> ParseResult<Statement> {
        let location = self.cursor.advance().location; // consume 'enum'
        let scoped = self.cursor.match_keyword(Keyword::Class) || self.cursor.match_keyword(Keyword::Struct);
        let name = match &self.cursor.peek().token_type {
            TokenType::Identifier(name) => {
                let name = name.clone();
                self.cursor.advance();
                name
            }
            _ if !scoped => String::new(),
            _ => return Err(self.cursor.error_expected("enum name")),
        };
        // Underlying type is accepted and ignored.
        if self.cursor.match_token(&TokenType::Colon) {
            self.parse_type()?;
        }

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
        self.cursor.consume(&TokenType::Semicolon, "';' after enum")?;

        Ok(Statement::new(
            StatementKind::Enum(EnumDecl {
                name,
                scoped,
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
                TokenType::Dot | TokenType::Arrow => {
                    self.cursor.advance(); // consume '.' or '->'
                    let (member, _) = self.cursor.consume_identifier("member name")?;
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
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let location = self.cursor.location();
        let kind = match self.cursor.peek().token_type.clone() {
            TokenType::Integer(value) | TokenType::Char(value) => {
                self.cursor.advance();
                ExpressionKind::Integer(value)
            }
            TokenType::Float(value) => {
                self.cursor.advance();
                ExpressionKind::Float(value)
            }
            TokenType::String(value) => {
                self.cursor.advance();
                let mut value = value;
                // Adjacent literals concatenate.
                while let TokenType::String(next) = &self.cursor.peek().token_type {
                    value.push_str(next);
                    self.cursor.advance();
                }
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
            TokenType::Keyword(Keyword::New) => {
                self.cursor.advance(); // consume 'new'
                return self.parse_new(location);
            }
            TokenType::Identifier(name) => {
                self.cursor.advance();
                if self.cursor.match_token(&TokenType::ColonColon) {
                    let (member, _) = self.cursor.consume_identifier("name after '::'")?;
                    ExpressionKind::Scope {
                        scope: name,
                        member,
                    }
                } else {
                    ExpressionKind::Identifier(name)
                }
            }
            TokenType::LeftParen => {
                self.cursor.advance(); // consume '('
                let expr = self.parse_expression()?;
                self.cursor.consume(&TokenType::RightParen, "')' after expression")?;
                return Ok(expr);
            }
            // Functional cast: `int(x)`, `double(n)`.
            ref token if Self::is_type_keyword(token)
                && self.cursor.peek_at(1).token_type == TokenType::LeftParen =>
            {
                let (target_type, _) = self.parse_type()?;
                self.cursor.advance(); // consume '('
                let operand = self.parse_expression()?;
                self.cursor.consume(&TokenType::RightParen, "')' after cast operand")?;
                ExpressionKind::Cast {
                    target_type,
                    operand: Box::new(operand),
                }
            }
            TokenType::LeftBracket => {
                return Err(self.cursor.not_implemented("Lambda expressions"));
            }
            _ => return Err(self.cursor.error_expected("expression")),
        };
        Ok(Expression::new(kind, location))
    }

    fn parse_new(&mut self, location: SourceLocation) -> ParseResult<Expression> {
        let (new_type, _) = self.parse_type()?;

        if self.cursor.match_token(&TokenType::LeftBracket) {
            let size = self.parse_expression()?;
            self.cursor.consume(&TokenType::RightBracket, "']' after array size")?;
            return Ok(Expression::new(
                ExpressionKind::NewArray {
                    element_type: new_type,
                    size: Box::new(size),
                },
                location,
            ));
        }

        let class = match new_type {
            Type::Named(class) => class,
            other => {
                return Err(ParseError::InvalidSyntax {
                    message: format!("Cannot construct '{}' with new", other),
                    location,
                })
            }
        };
        let args = if self.cursor.match_token(&TokenType::LeftParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expression::new(ExpressionKind::New { class, args }, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> ParseResult<Program> {
        let tokens = Lexer::new(source, Grammar::Cpp).tokenize()?;
        CppParser::new(tokens).parse_program()
    }

    fn first(source: &str) -> StatementKind {
        parse(source).unwrap().statements.remove(0).kind
    }

    #[test]
    fn test_class_declaration_keeps_member_order() {
        let source = "class Point : public Shape {
            int x; int y = 3;
          private:
            double scale;
          public:
            Point(int a) : Shape(a), x(a) { y = a; }
            virtual int sum() { return x + y; }
            virtual void draw() = 0;
            int area() const;
        };";
        let StatementKind::Class(class) = first(source) else {
            panic!("expected class");
        };
        assert_eq!(class.base.as_deref(), Some("Shape"));
        let names: Vec<_> = class.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "scale"]);
        assert_eq!(class.fields[2].visibility, Visibility::Private);
        assert_eq!(class.fields[0].visibility, Visibility::Public);
        assert!(class.fields[1].initializer.is_some());

        let ctor = class.constructor.as_ref().unwrap();
        let body = ctor.function.body.as_ref().unwrap();
        assert!(matches!(
            &body[0].kind,
            StatementKind::Expression(Expression { kind: ExpressionKind::SuperCall { method: None, .. }, .. })
        ));
        assert!(matches!(
            &body[1].kind,
            StatementKind::Expression(Expression { kind: ExpressionKind::Assign { .. }, .. })
        ));
        assert_eq!(body.len(), 3);

        let methods: Vec<_> = class.methods.iter().map(|m| m.function.name.as_str()).collect();
        assert_eq!(methods, vec!["sum", "draw", "area"]);
        assert!(class.methods[1].is_abstract);
        assert!(class.methods[2].function.body.is_none());
        assert!(!class.methods[2].is_abstract);
    }

    #[test]
    fn test_declarations_versus_expressions() {
        let program = parse("Point p; p = new Point(); int a = 1, b; Point* q = p; x * 2;").unwrap();
        assert!(matches!(program.statements[0].kind, StatementKind::VarDecl(_)));
        assert!(matches!(program.statements[1].kind, StatementKind::Expression(_)));
        let StatementKind::VarDecl(decls) = &program.statements[2].kind else {
            panic!("expected declaration");
        };
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[1].var_type, Some(Type::Int));
        let StatementKind::VarDecl(decls) = &program.statements[3].kind else {
            panic!("expected pointer declaration");
        };
        assert_eq!(decls[0].var_type, Some(Type::Named("Point".into())));
        assert!(matches!(program.statements[4].kind, StatementKind::Expression(_)));
    }

    #[test]
    fn test_function_prototypes_and_definitions() {
        let program =
            parse("int add(int, int); int add(int a, int b = 2) { return a + b; } int Point::sum() { return 0; }")
                .unwrap();
        let StatementKind::Function(proto) = &program.statements[0].kind else {
            panic!("expected prototype");
        };
        assert!(proto.body.is_none());
        assert_eq!(proto.params[1].name, "arg1");
        let StatementKind::Function(def) = &program.statements[1].kind else {
            panic!("expected definition");
        };
        assert_eq!(def.required_params(), 1);
        let StatementKind::Function(member) = &program.statements[2].kind else {
            panic!("expected member definition");
        };
        assert_eq!(member.owner.as_deref(), Some("Point"));
    }

    #[test]
    fn test_type_spellings() {
        let program = parse(
            "unsigned long long a; const char* s; long double d; std::string t; int arr[3]; int v[] = {1, 2};",
        )
        .unwrap();
        let types: Vec<_> = program
            .statements
            .iter()
            .map(|s| match &s.kind {
                StatementKind::VarDecl(d) => d[0].var_type.clone(),
                _ => panic!("expected declaration"),
            })
            .collect();
        assert_eq!(types[0], Some(Type::Int));
        assert_eq!(types[1], Some(Type::String));
        assert_eq!(types[2], Some(Type::Float));
        assert_eq!(types[3], Some(Type::String));
        assert_eq!(types[4], Some(Type::Array(Box::new(Type::Int))));
        let StatementKind::VarDecl(d) = &program.statements[4].kind else {
            unreachable!()
        };
        assert!(matches!(
            d[0].initializer.as_ref().map(|e| &e.kind),
            Some(ExpressionKind::NewArray { .. })
        ));
    }

    #[test]
    fn test_enums_and_scope_access() {
        let program = parse("enum Color { Red, Green = 5, Blue }; enum class Mode : int { On }; x = Mode::On;").unwrap();
        let StatementKind::Enum(color) = &program.statements[0].kind else {
            panic!("expected enum");
        };
        assert!(!color.scoped);
        assert_eq!(color.members.len(), 3);
        let StatementKind::Enum(mode) = &program.statements[1].kind else {
            panic!("expected enum");
        };
        assert!(mode.scoped);
        let StatementKind::Expression(expr) = &program.statements[2].kind else {
            panic!("expected expression");
        };
        let ExpressionKind::Assign { value, .. } = &expr.kind else {
            panic!("expected assignment");
        };
        assert_eq!(
            value.kind,
            ExpressionKind::Scope {
                scope: "Mode".into(),
                member: "On".into()
            }
        );
    }

    #[test]
    fn test_casts_and_postfix() {
        let StatementKind::Expression(expr) = first("(int)x + double(y);") else {
            panic!("expected expression");
        };
        let ExpressionKind::Binary { left, right, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert!(matches!(left.kind, ExpressionKind::Cast { target_type: Type::Int, .. }));
        assert!(matches!(right.kind, ExpressionKind::Cast { target_type: Type::Float, .. }));

        let StatementKind::Expression(expr) = first("p->items[i]++;") else {
            panic!("expected expression");
        };
        let ExpressionKind::Update { prefix: false, target, .. } = expr.kind else {
            panic!("expected postfix update");
        };
        assert!(matches!(target.kind, ExpressionKind::Index { .. }));
    }

    #[test]
    fn test_nested_functions_are_rejected() {
        let err = parse("int outer() { int inner(int a) { return a; } return 0; }").unwrap_err();
        assert!(matches!(err, ParseError::NotImplemented { .. }), "{:?}", err);
    }

    #[test]
    fn test_destructors_are_rejected() {
        let err = parse("class A { ~A() {} };").unwrap_err();
        assert!(matches!(err, ParseError::NotImplemented { .. }));
    }

    #[test]
    fn test_missing_semicolon_reports_position() {
        let err = parse("int x = 1\nint y = 2;").unwrap_err();
        match err {
            ParseError::UnexpectedToken { location, .. } => assert_eq!(location.line, 2),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
