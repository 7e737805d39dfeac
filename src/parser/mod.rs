//! Front ends. Each grammar lowers source text into the shared AST in
//! `crate::ast`; the expression precedence table lives here so both
//! grammars agree on operators they share.

pub mod cpp;
pub mod js;

use crate::ast::{BinaryOperator, Expression, ExpressionKind, Program};
use crate::error::{ParseError, ParseResult, SourceLocation};
use crate::lexer::{Grammar, Keyword, Lexer, Token, TokenType};

pub use cpp::CppParser;
pub use js::JsParser;

/// A grammar that lowers text into the shared tree.
pub trait Frontend {
    fn grammar(&self) -> Grammar;
    fn parse_program(&mut self) -> ParseResult<Program>;
}

/// Lex and parse `source` with the selected grammar.
pub fn parse(source: &str, grammar: Grammar) -> ParseResult<Program> {
    let tokens = Lexer::new(source, grammar).tokenize()?;
    tracing::debug!(%grammar, tokens = tokens.len(), "lexed source");
    let program = match grammar {
        Grammar::Cpp => CppParser::new(tokens).parse_program()?,
        Grammar::Js => JsParser::new(tokens).parse_program()?,
    };
    tracing::debug!(%grammar, statements = program.statements.len(), "parsed program");
    Ok(program)
}

/// Deepest statement and expression nesting accepted.
pub const MAX_NESTING: usize = 100;

/// Token cursor shared by both parsers.
pub struct TokenCursor {
    tokens: Vec<Token>,
    current: usize,
    nesting: usize,
}

impl TokenCursor {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(t) if t.token_type == TokenType::Eof) {
            let location = tokens.last().map(|t| t.location).unwrap_or_default();
            tokens.push(Token {
                token_type: TokenType::Eof,
                lexeme: String::new(),
                location,
            });
        }
        Self {
            tokens,
            current: 0,
            nesting: 0,
        }
    }

    /// Step one nesting level down; pair with `leave`.
    pub fn enter(&mut self) -> ParseResult<()> {
        if self.nesting >= MAX_NESTING {
            return Err(self.invalid(format!("nesting too deep (limit {})", MAX_NESTING)));
        }
        self.nesting += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
    }

    pub fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    pub fn peek_at(&self, ahead: usize) -> &Token {
        let index = (self.current + ahead).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    pub fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    pub fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        &self.tokens[self.current - 1]
    }

    pub fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    pub fn location(&self) -> SourceLocation {
        self.peek().location
    }

    pub fn check(&self, token_type: &TokenType) -> bool {
        &self.peek().token_type == token_type
    }

    pub fn check_keyword(&self, keyword: Keyword) -> bool {
        self.peek().token_type == TokenType::Keyword(keyword)
    }

    pub fn match_token(&mut self, token_type: &TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn match_keyword(&mut self, keyword: Keyword) -> bool {
        self.match_token(&TokenType::Keyword(keyword))
    }

    pub fn consume(&mut self, token_type: &TokenType, expected: &str) -> ParseResult<&Token> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(self.error_expected(expected))
        }
    }

    pub fn consume_keyword(&mut self, keyword: Keyword, expected: &str) -> ParseResult<&Token> {
        self.consume(&TokenType::Keyword(keyword), expected)
    }

    pub fn consume_identifier(&mut self, expected: &str) -> ParseResult<(String, SourceLocation)> {
        match &self.peek().token_type {
            TokenType::Identifier(name) => {
                let name = name.clone();
                let location = self.advance().location;
                Ok((name, location))
            }
            _ => Err(self.error_expected(expected)),
        }
    }

    pub fn error_expected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        if token.token_type == TokenType::Eof {
            ParseError::UnexpectedEof {
                expected: expected.to_string(),
                location: token.location,
            }
        } else {
            ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.token_type.describe(),
                location: token.location,
            }
        }
    }

    pub fn invalid(&self, message: impl Into<String>) -> ParseError {
        ParseError::InvalidSyntax {
            message: message.into(),
            location: self.location(),
        }
    }

    pub fn not_implemented(&self, feature: &str) -> ParseError {
        ParseError::NotImplemented {
            feature: feature.to_string(),
            location: self.location(),
        }
    }
}

pub fn binary_operator(token_type: &TokenType) -> Option<BinaryOperator> {
    let op = match token_type {
        TokenType::OrOr => BinaryOperator::Or,
        TokenType::AndAnd => BinaryOperator::And,
        TokenType::Pipe => BinaryOperator::BitOr,
        TokenType::Caret => BinaryOperator::BitXor,
        TokenType::Ampersand => BinaryOperator::BitAnd,
        TokenType::EqualEqual => BinaryOperator::Equal,
        TokenType::NotEqual => BinaryOperator::NotEqual,
        TokenType::StrictEqual => BinaryOperator::StrictEqual,
        TokenType::StrictNotEqual => BinaryOperator::StrictNotEqual,
        TokenType::Less => BinaryOperator::Less,
        TokenType::LessEqual => BinaryOperator::LessEqual,
        TokenType::Greater => BinaryOperator::Greater,
        TokenType::GreaterEqual => BinaryOperator::GreaterEqual,
        TokenType::ShiftLeft => BinaryOperator::ShiftLeft,
        TokenType::ShiftRight => BinaryOperator::ShiftRight,
        TokenType::Plus => BinaryOperator::Add,
        TokenType::Minus => BinaryOperator::Subtract,
        TokenType::Star => BinaryOperator::Multiply,
        TokenType::Slash => BinaryOperator::Divide,
        TokenType::Percent => BinaryOperator::Modulo,
        _ => return None,
    };
    Some(op)
}

/// `Some(None)` is plain `=`, `Some(Some(op))` a compound assignment.
pub fn assignment_operator(token_type: &TokenType) -> Option<Option<BinaryOperator>> {
    let op = match token_type {
        TokenType::Equal => None,
        TokenType::PlusEqual => Some(BinaryOperator::Add),
        TokenType::MinusEqual => Some(BinaryOperator::Subtract),
        TokenType::StarEqual => Some(BinaryOperator::Multiply),
        TokenType::SlashEqual => Some(BinaryOperator::Divide),
        TokenType::PercentEqual => Some(BinaryOperator::Modulo),
        TokenType::AmpersandEqual => Some(BinaryOperator::BitAnd),
        TokenType::PipeEqual => Some(BinaryOperator::BitOr),
        TokenType::CaretEqual => Some(BinaryOperator::BitXor),
        TokenType::ShiftLeftEqual => Some(BinaryOperator::ShiftLeft),
        TokenType::ShiftRightEqual => Some(BinaryOperator::ShiftRight),
        _ => return None,
    };
    Some(op)
}

/// Assignment, conditional and binary levels. Grammars supply the
/// prefix/postfix/primary levels through `parse_unary`.
pub trait ExpressionParser: Sized {
    fn cursor(&mut self) -> &mut TokenCursor;
    fn parse_unary(&mut self) -> ParseResult<Expression>;

    /// Run `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        self.cursor().enter()?;
        let result = parse(self);
        self.cursor().leave();
        result
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> ParseResult<Expression> {
        self.nested(Self::parse_assignment_level)
    }

    fn parse_assignment_level(&mut self) -> ParseResult<Expression> {
        let target = self.parse_conditional()?;

        if let Some(operator) = assignment_operator(&self.cursor().peek().token_type) {
            if !target.is_assignable() {
                return Err(self.cursor().invalid("Invalid assignment target"));
            }
            let location = self.cursor().advance().location;
            let value = self.parse_assignment()?;
            return Ok(Expression::new(
                ExpressionKind::Assign {
                    target: Box::new(target),
                    operator,
                    value: Box::new(value),
                },
                location,
            ));
        }

        Ok(target)
    }

    fn parse_conditional(&mut self) -> ParseResult<Expression> {
        let condition = self.parse_binary(BinaryOperator::Or.precedence())?;

        if self.cursor().check(&TokenType::Question) {
            let location = self.cursor().advance().location;
            let then_expr = self.parse_assignment()?;
            self.cursor().consume(&TokenType::Colon, "':' in conditional expression")?;
            let else_expr = self.nested(Self::parse_conditional)?;
            return Ok(Expression::new(
                ExpressionKind::Conditional {
                    condition: Box::new(condition),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                },
                location,
            ));
        }

        Ok(condition)
    }

    /// Precedence climbing over the shared table; all binary levels are
    /// left-associative.
    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;

        while let Some(operator) = binary_operator(&self.cursor().peek().token_type) {
            let precedence = operator.precedence();
            if precedence < min_precedence {
                break;
            }
            let location = self.cursor().advance().location;
            let right = self.parse_binary(precedence + 1)?;
            left = Expression::new(
                ExpressionKind::Binary {
                    left: Box::new(left),
                    operator,
                    right: Box::new(right),
                },
                location,
            );
        }

        Ok(left)
    }

    /// Comma-separated arguments after an opening '(' up to and including ')'.
    fn parse_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        let mut args = Vec::new();
        if !self.cursor().check(&TokenType::RightParen) {
            loop {
                args.push(self.parse_assignment()?);
                if !self.cursor().match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.cursor().consume(&TokenType::RightParen, "')' after arguments")?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::StatementKind;

    fn expression(source: &str, grammar: Grammar) -> Expression {
        let program = parse(source, grammar).unwrap();
        match program.statements.into_iter().next().map(|s| s.kind) {
            Some(StatementKind::Expression(expr)) => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    fn shape(expr: &Expression) -> String {
        match &expr.kind {
            ExpressionKind::Binary {
                left,
                operator,
                right,
            } => format!("({} {} {})", shape(left), operator.symbol(), shape(right)),
            ExpressionKind::Integer(v) => v.to_string(),
            ExpressionKind::Identifier(name) => name.clone(),
            ExpressionKind::Assign { target, value, .. } => {
                format!("({} = {})", shape(target), shape(value))
            }
            ExpressionKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => format!(
                "({} ? {} : {})",
                shape(condition),
                shape(then_expr),
                shape(else_expr)
            ),
            other => format!("{:?}", other),
        }
    }

    #[test]
    fn test_precedence_is_shared_between_grammars() {
        let cases = [
            ("1 + 2 * 3;", "(1 + (2 * 3))"),
            ("1 - 2 - 3;", "((1 - 2) - 3)"),
            ("a || b && c;", "(a || (b && c))"),
            ("a & b == c;", "(a & (b == c))"),
            ("1 << 2 + 3;", "(1 << (2 + 3))"),
            ("a < b == c < d;", "((a < b) == (c < d))"),
            ("a | b ^ c & d;", "(a | (b ^ (c & d)))"),
            ("a = b = c;", "(a = (b = c))"),
            ("a ? b : c ? d : e;", "(a ? b : (c ? d : e))"),
        ];
        for (source, expected) in cases {
            assert_eq!(shape(&expression(source, Grammar::Cpp)), expected, "cpp: {}", source);
            assert_eq!(shape(&expression(source, Grammar::Js)), expected, "js: {}", source);
        }
    }

    #[test]
    fn test_invalid_assignment_target() {
        for grammar in [Grammar::Cpp, Grammar::Js] {
            let err = parse("1 = 2;", grammar).unwrap_err();
            assert!(matches!(err, ParseError::InvalidSyntax { .. }));
        }
    }

    #[test]
    fn test_unexpected_eof_reports_expectation() {
        let err = parse("x = (1 + 2", Grammar::Cpp).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }), "{:?}", err);
    }

    #[test]
    fn test_deep_nesting_is_a_parse_error() {
        let depth = 20_000;
        let parens = format!("{}1{};", "(".repeat(depth), ")".repeat(depth));
        let negations = format!("{}1;", "!".repeat(depth));
        let blocks = format!("{}{}", "{".repeat(depth), "}".repeat(depth));
        let ifs = "if (a) ".repeat(depth) + "x;";
        let ternaries = "a ? b : ".repeat(depth) + "c;";
        for grammar in [Grammar::Cpp, Grammar::Js] {
            for source in [&parens, &negations, &blocks, &ifs, &ternaries] {
                let err = parse(source, grammar).unwrap_err();
                assert!(
                    matches!(err, ParseError::InvalidSyntax { ref message, .. } if message.contains("nesting")),
                    "{:?}",
                    err
                );
            }
        }
        let shallow = format!("{}1{};", "(".repeat(40), ")".repeat(40));
        assert!(parse(&shallow, Grammar::Js).is_ok());
    }

    #[test]
    fn test_lex_errors_surface_through_parse() {
        let err = parse("x = \"open;", Grammar::Js).unwrap_err();
        assert!(matches!(err, ParseError::Lex(_)));
    }
}
