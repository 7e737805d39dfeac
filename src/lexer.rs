use crate::error::{LexError, LexResult, SourceLocation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Front-end grammar selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grammar {
    Cpp,
    Js,
}

impl Grammar {
    /// Pick a grammar from a file extension; anything but `.js` is C++-like.
    pub fn from_extension(path: &str) -> Self {
        if path.ends_with(".js") || path.ends_with(".mjs") {
            Grammar::Js
        } else {
            Grammar::Cpp
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Grammar::Cpp => write!(f, "cpp"),
            Grammar::Js => write!(f, "js"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Keyword {
    If,
    Else,
    While,
    Do,
    For,
    Return,
    Break,
    Continue,
    Class,
    Struct,
    Enum,
    New,
    This,
    Null,
    True,
    False,
    Public,
    Private,
    Protected,
    Virtual,
    Override,
    Const,
    Static,
    Void,
    Bool,
    Char,
    Short,
    Int,
    Long,
    Unsigned,
    Signed,
    Float,
    Double,
    Auto,
    String,
    Extends,
    Super,
    Var,
    Let,
    Function,
}

impl Keyword {
    fn lookup(word: &str, grammar: Grammar) -> Option<Keyword> {
        let shared = match word {
            "if" => Some(Keyword::If),
            "else" => Some(Keyword::Else),
            "while" => Some(Keyword::While),
            "do" => Some(Keyword::Do),
            "for" => Some(Keyword::For),
            "return" => Some(Keyword::Return),
            "break" => Some(Keyword::Break),
            "continue" => Some(Keyword::Continue),
            "class" => Some(Keyword::Class),
            "enum" => Some(Keyword::Enum),
            "new" => Some(Keyword::New),
            "this" => Some(Keyword::This),
            "true" => Some(Keyword::True),
            "false" => Some(Keyword::False),
            "const" => Some(Keyword::Const),
            "static" => Some(Keyword::Static),
            _ => None,
        };
        if shared.is_some() {
            return shared;
        }
        match grammar {
            Grammar::Cpp => match word {
                "nullptr" => Some(Keyword::Null),
                "struct" => Some(Keyword::Struct),
                "public" => Some(Keyword::Public),
                "private" => Some(Keyword::Private),
                "protected" => Some(Keyword::Protected),
                "virtual" => Some(Keyword::Virtual),
                "override" => Some(Keyword::Override),
                "void" => Some(Keyword::Void),
                "bool" => Some(Keyword::Bool),
                "char" => Some(Keyword::Char),
                "short" => Some(Keyword::Short),
                "int" => Some(Keyword::Int),
                "long" => Some(Keyword::Long),
                "unsigned" => Some(Keyword::Unsigned),
                "signed" => Some(Keyword::Signed),
                "float" => Some(Keyword::Float),
                "double" => Some(Keyword::Double),
                "auto" => Some(Keyword::Auto),
                "string" => Some(Keyword::String),
                _ => None,
            },
            Grammar::Js => match word {
                "null" | "undefined" => Some(Keyword::Null),
                "extends" => Some(Keyword::Extends),
                "super" => Some(Keyword::Super),
                "var" => Some(Keyword::Var),
                "let" => Some(Keyword::Let),
                "function" => Some(Keyword::Function),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    Identifier(String),
    Keyword(Keyword),
    Integer(i64),
    Float(f64),
    String(String),
    /// C character literal, already converted to its code.
    Char(i64),
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Semicolon,
    Colon,
    ColonColon,
    Dot,
    Ellipsis,
    Arrow,
    FatArrow,
    Question,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Equal,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,
    AmpersandEqual,
    PipeEqual,
    CaretEqual,
    ShiftLeftEqual,
    ShiftRightEqual,
    EqualEqual,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    ShiftLeft,
    ShiftRight,
    AndAnd,
    OrOr,
    Bang,
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    Eof,
}

impl TokenType {
    pub fn describe(&self) -> String {
        match self {
            TokenType::Identifier(name) => format!("identifier '{}'", name),
            TokenType::Keyword(kw) => format!("keyword '{:?}'", kw).to_lowercase(),
            TokenType::Integer(v) => format!("integer {}", v),
            TokenType::Float(v) => format!("number {}", v),
            TokenType::String(_) => "string literal".to_string(),
            TokenType::Char(_) => "character literal".to_string(),
            TokenType::Eof => "end of file".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    /// Spelling of punctuation and operator tokens.
    pub fn symbol(&self) -> &'static str {
        match self {
            TokenType::LeftParen => "(",
            TokenType::RightParen => ")",
            TokenType::LeftBrace => "{",
            TokenType::RightBrace => "}",
            TokenType::LeftBracket => "[",
            TokenType::RightBracket => "]",
            TokenType::Comma => ",",
            TokenType::Semicolon => ";",
            TokenType::Colon => ":",
            TokenType::ColonColon => "::",
            TokenType::Dot => ".",
            TokenType::Ellipsis => "...",
            TokenType::Arrow => "->",
            TokenType::FatArrow => "=>",
            TokenType::Question => "?",
            TokenType::Plus => "+",
            TokenType::Minus => "-",
            TokenType::Star => "*",
            TokenType::Slash => "/",
            TokenType::Percent => "%",
            TokenType::PlusPlus => "++",
            TokenType::MinusMinus => "--",
            TokenType::Equal => "=",
            TokenType::PlusEqual => "+=",
            TokenType::MinusEqual => "-=",
            TokenType::StarEqual => "*=",
            TokenType::SlashEqual => "/=",
            TokenType::PercentEqual => "%=",
            TokenType::AmpersandEqual => "&=",
            TokenType::PipeEqual => "|=",
            TokenType::CaretEqual => "^=",
            TokenType::ShiftLeftEqual => "<<=",
            TokenType::ShiftRightEqual => ">>=",
            TokenType::EqualEqual => "==",
            TokenType::NotEqual => "!=",
            TokenType::StrictEqual => "===",
            TokenType::StrictNotEqual => "!==",
            TokenType::Less => "<",
            TokenType::LessEqual => "<=",
            TokenType::Greater => ">",
            TokenType::GreaterEqual => ">=",
            TokenType::ShiftLeft => "<<",
            TokenType::ShiftRight => ">>",
            TokenType::AndAnd => "&&",
            TokenType::OrOr => "||",
            TokenType::Bang => "!",
            TokenType::Ampersand => "&",
            TokenType::Pipe => "|",
            TokenType::Caret => "^",
            TokenType::Tilde => "~",
            _ => "",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub location: SourceLocation,
}

/// Single-pass tokenizer. Iterating yields tokens lazily and ends after
/// `Eof` or the first error; lexing again needs a fresh `Lexer`.
pub struct Lexer {
    input: Vec<char>,
    grammar: Grammar,
    position: usize,
    offset: usize,
    line: usize,
    column: usize,
    finished: bool,
}

impl Lexer {
    pub fn new(input: &str, grammar: Grammar) -> Self {
        Self {
            input: input.chars().collect(),
            grammar,
            position: 0,
            offset: 0,
            line: 1,
            column: 1,
            finished: false,
        }
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    /// Drain the lexer into a token vector terminated by `Eof`.
    pub fn tokenize(&mut self) -> LexResult<Vec<Token>> {
        let mut tokens = Vec::new();
        for token in self.by_ref() {
            tokens.push(token?);
        }
        Ok(tokens)
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column, self.offset)
    }

    fn next_token(&mut self) -> LexResult<Token> {
        self.skip_trivia()?;

        let location = self.location();
        let start = self.position;

        if self.is_at_end() {
            return Ok(Token {
                token_type: TokenType::Eof,
                lexeme: String::new(),
                location,
            });
        }

        let ch = self.current_char();
        let token_type = match ch {
            '(' => self.single(TokenType::LeftParen),
            ')' => self.single(TokenType::RightParen),
            '{' => self.single(TokenType::LeftBrace),
            '}' => self.single(TokenType::RightBrace),
            '[' => self.single(TokenType::LeftBracket),
            ']' => self.single(TokenType::RightBracket),
            ',' => self.single(TokenType::Comma),
            ';' => self.single(TokenType::Semicolon),
            '?' => self.single(TokenType::Question),
            '~' => self.single(TokenType::Tilde),
            ':' => {
                self.advance();
                if self.grammar == Grammar::Cpp && self.match_char(':') {
                    TokenType::ColonColon
                } else {
                    TokenType::Colon
                }
            }
            '.' => {
                if self.peek_char(1).is_ascii_digit() {
                    self.read_number(location)?
                } else if self.peek_char(1) == '.' && self.peek_char(2) == '.' {
                    self.advance();
                    self.advance();
                    self.advance();
                    TokenType::Ellipsis
                } else {
                    self.single(TokenType::Dot)
                }
            }
            '+' => {
                self.advance();
                if self.match_char('+') {
                    TokenType::PlusPlus
                } else if self.match_char('=') {
                    TokenType::PlusEqual
                } else {
                    TokenType::Plus
                }
            }
            '-' => {
                self.advance();
                if self.match_char('-') {
                    TokenType::MinusMinus
                } else if self.match_char('=') {
                    TokenType::MinusEqual
                } else if self.grammar == Grammar::Cpp && self.match_char('>') {
                    TokenType::Arrow
                } else {
                    TokenType::Minus
                }
            }
            '*' => {
                self.advance();
                if self.match_char('=') {
                    TokenType::StarEqual
                } else {
                    TokenType::Star
                }
            }
            '/' => {
                self.advance();
                if self.match_char('=') {
                    TokenType::SlashEqual
                } else {
                    TokenType::Slash
                }
            }
            '%' => {
                self.advance();
                if self.match_char('=') {
                    TokenType::PercentEqual
                } else {
                    TokenType::Percent
                }
            }
            '=' => {
                self.advance();
                if self.match_char('=') {
                    if self.grammar == Grammar::Js && self.match_char('=') {
                        TokenType::StrictEqual
                    } else {
                        TokenType::EqualEqual
                    }
                } else if self.grammar == Grammar::Js && self.match_char('>') {
                    TokenType::FatArrow
                } else {
                    TokenType::Equal
                }
            }
            '!' => {
                self.advance();
                if self.match_char('=') {
                    if self.grammar == Grammar::Js && self.match_char('=') {
                        TokenType::StrictNotEqual
                    } else {
                        TokenType::NotEqual
                    }
                } else {
                    TokenType::Bang
                }
            }
            '<' => {
                self.advance();
                if self.match_char('<') {
                    if self.match_char('=') {
                        TokenType::ShiftLeftEqual
                    } else {
                        TokenType::ShiftLeft
                    }
                } else if self.match_char('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                }
            }
            '>' => {
                self.advance();
                if self.match_char('>') {
                    if self.match_char('=') {
                        TokenType::ShiftRightEqual
                    } else {
                        TokenType::ShiftRight
                    }
                } else if self.match_char('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                }
            }
            '&' => {
                self.advance();
                if self.match_char('&') {
                    TokenType::AndAnd
                } else if self.match_char('=') {
                    TokenType::AmpersandEqual
                } else {
                    TokenType::Ampersand
                }
            }
            '|' => {
                self.advance();
                if self.match_char('|') {
                    TokenType::OrOr
                } else if self.match_char('=') {
                    TokenType::PipeEqual
                } else {
                    TokenType::Pipe
                }
            }
            '^' => {
                self.advance();
                if self.match_char('=') {
                    TokenType::CaretEqual
                } else {
                    TokenType::Caret
                }
            }
            '"' => self.read_string('"', location)?,
            '\'' => match self.grammar {
                Grammar::Cpp => self.read_char(location)?,
                Grammar::Js => self.read_string('\'', location)?,
            },
            '#' if self.grammar == Grammar::Js && is_identifier_start(self.peek_char(1)) => {
                self.read_identifier()
            }
            _ if is_identifier_start(ch) => self.read_identifier(),
            _ if ch.is_ascii_digit() => self.read_number(location)?,
            _ => {
                return Err(LexError::UnexpectedCharacter {
                    character: ch,
                    location,
                })
            }
        };

        Ok(Token {
            token_type,
            lexeme: self.input[start..self.position].iter().collect(),
            location,
        })
    }

    fn single(&mut self, token_type: TokenType) -> TokenType {
        self.advance();
        token_type
    }

    fn skip_trivia(&mut self) -> LexResult<()> {
        let mut at_line_start = self.column == 1;
        loop {
            if self.is_at_end() {
                return Ok(());
            }
            match self.current_char() {
                '\n' => {
                    self.advance();
                    at_line_start = true;
                }
                ' ' | '\r' | '\t' => self.advance(),
                '/' if self.peek_char(1) == '/' => {
                    while !self.is_at_end() && self.current_char() != '\n' {
                        self.advance();
                    }
                }
                '/' if self.peek_char(1) == '*' => {
                    let location = self.location();
                    self.advance();
                    self.advance();
                    self.skip_block_comment(location)?;
                }
                // Preprocessor directives are accepted and ignored.
                '#' if self.grammar == Grammar::Cpp && at_line_start => {
                    let location = self.location();
                    let mut directive = String::new();
                    while !self.is_at_end() && self.current_char() != '\n' {
                        directive.push(self.current_char());
                        self.advance();
                    }
                    tracing::debug!(%location, directive = directive.trim(), "skipping preprocessor directive");
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self, location: SourceLocation) -> LexResult<()> {
        // The opening /* is already consumed.
        while !self.is_at_end() {
            if self.current_char() == '*' && self.peek_char(1) == '/' {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }
        Err(LexError::UnterminatedComment { location })
    }

    fn read_escape(&mut self) -> LexResult<char> {
        // Positioned on the character after the backslash.
        let location = self.location();
        if self.is_at_end() {
            return Err(LexError::UnterminatedString { location });
        }
        let escape = self.current_char();
        self.advance();
        let decoded = match escape {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            'a' => '\u{07}',
            'b' => '\u{08}',
            'f' => '\u{0C}',
            'v' => '\u{0B}',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            '?' => '?',
            'x' => self.read_hex_escape(2, escape, location)?,
            'u' => self.read_hex_escape(4, escape, location)?,
            _ => return Err(LexError::InvalidEscape { escape, location }),
        };
        Ok(decoded)
    }

    fn read_hex_escape(
        &mut self,
        digits: usize,
        escape: char,
        location: SourceLocation,
    ) -> LexResult<char> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self
                .current_char()
                .to_digit(16)
                .ok_or(LexError::InvalidEscape { escape, location })?;
            code = code * 16 + digit;
            self.advance();
        }
        char::from_u32(code).ok_or(LexError::InvalidEscape { escape, location })
    }

    fn read_string(&mut self, quote: char, location: SourceLocation) -> LexResult<TokenType> {
        self.advance(); // Skip opening quote
        let mut value = String::new();

        loop {
            if self.is_at_end() || self.current_char() == '\n' {
                return Err(LexError::UnterminatedString { location });
            }
            let ch = self.current_char();
            if ch == quote {
                self.advance(); // Skip closing quote
                return Ok(TokenType::String(value));
            }
            self.advance();
            if ch == '\\' {
                value.push(self.read_escape()?);
            } else {
                value.push(ch);
            }
        }
    }

    fn read_char(&mut self, location: SourceLocation) -> LexResult<TokenType> {
        self.advance(); // Skip opening quote
        if self.is_at_end() || self.current_char() == '\n' || self.current_char() == '\'' {
            return Err(LexError::UnterminatedChar { location });
        }
        let ch = self.current_char();
        self.advance();
        let value = if ch == '\\' { self.read_escape()? } else { ch };
        if self.current_char() != '\'' {
            return Err(LexError::UnterminatedChar { location });
        }
        self.advance();
        Ok(TokenType::Char(value as i64))
    }

    fn read_identifier(&mut self) -> TokenType {
        let mut value = String::new();
        if self.current_char() == '#' {
            value.push('#');
            self.advance();
        }

        while !self.is_at_end() && is_identifier_part(self.current_char()) {
            value.push(self.current_char());
            self.advance();
        }

        match Keyword::lookup(&value, self.grammar) {
            Some(keyword) => TokenType::Keyword(keyword),
            None => TokenType::Identifier(value),
        }
    }

    fn read_number(&mut self, location: SourceLocation) -> LexResult<TokenType> {
        let mut text = String::new();
        let mut is_float = false;

        let radix = if self.current_char() == '0' && matches!(self.peek_char(1), 'x' | 'X') {
            16
        } else if self.current_char() == '0' && matches!(self.peek_char(1), 'b' | 'B') {
            2
        } else {
            10
        };

        if radix != 10 {
            text.push(self.current_char());
            self.advance();
            text.push(self.current_char());
            self.advance();
            let digits_start = text.len();
            while !self.is_at_end() && self.current_char().is_digit(radix) {
                text.push(self.current_char());
                self.advance();
            }
            if text.len() == digits_start {
                return Err(self.invalid_number(text, location));
            }
        } else {
            while !self.is_at_end() && self.current_char().is_ascii_digit() {
                text.push(self.current_char());
                self.advance();
            }
            // `0.x` is a member access on 0, not a float.
            if self.current_char() == '.'
                && self.peek_char(1) != '.'
                && !is_identifier_start(self.peek_char(1))
            {
                is_float = true;
                text.push('.');
                self.advance();
                while !self.is_at_end() && self.current_char().is_ascii_digit() {
                    text.push(self.current_char());
                    self.advance();
                }
            }
            if matches!(self.current_char(), 'e' | 'E') {
                is_float = true;
                text.push(self.current_char());
                self.advance();
                if matches!(self.current_char(), '+' | '-') {
                    text.push(self.current_char());
                    self.advance();
                }
                let exponent_start = text.len();
                while !self.is_at_end() && self.current_char().is_ascii_digit() {
                    text.push(self.current_char());
                    self.advance();
                }
                if text.len() == exponent_start {
                    return Err(self.invalid_number(text, location));
                }
            }
        }

        // C suffixes are accepted and do not change the value.
        if self.grammar == Grammar::Cpp {
            let mut suffix = String::new();
            while matches!(self.current_char(), 'u' | 'U' | 'l' | 'L' | 'f' | 'F') {
                suffix.push(self.current_char());
                self.advance();
            }
            let float_suffix = suffix.contains(['f', 'F']);
            if float_suffix && (!is_float || suffix.len() > 1) {
                text.push_str(&suffix);
                return Err(self.invalid_number(text, location));
            }
            if !float_suffix && is_float && !suffix.is_empty() && suffix != "l" && suffix != "L" {
                text.push_str(&suffix);
                return Err(self.invalid_number(text, location));
            }
        }

        if is_identifier_part(self.current_char()) && !self.is_at_end() {
            return Err(self.invalid_number(text, location));
        }

        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| LexError::InvalidNumber {
                    value: text.clone(),
                    location,
                })?;
            Ok(TokenType::Float(value))
        } else {
            let digits = if radix == 10 { &text[..] } else { &text[2..] };
            // Literals above i64::MAX wrap into the signed range.
            let value = u64::from_str_radix(digits, radix).map_err(|_| LexError::InvalidNumber {
                value: text.clone(),
                location,
            })?;
            Ok(TokenType::Integer(value as i64))
        }
    }

    fn invalid_number(&mut self, mut text: String, location: SourceLocation) -> LexError {
        while !self.is_at_end() && is_identifier_part(self.current_char()) {
            text.push(self.current_char());
            self.advance();
        }
        LexError::InvalidNumber {
            value: text,
            location,
        }
    }

    fn current_char(&self) -> char {
        self.peek_char(0)
    }

    fn peek_char(&self, ahead: usize) -> char {
        self.input.get(self.position + ahead).copied().unwrap_or('\0')
    }

    fn match_char(&mut self, expected: char) -> bool {
        if !self.is_at_end() && self.current_char() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            let ch = self.current_char();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.offset += ch.len_utf8();
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }
}

impl Iterator for Lexer {
    type Item = LexResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        match &result {
            Ok(token) if token.token_type == TokenType::Eof => self.finished = true,
            Err(_) => self.finished = true,
            Ok(_) => {}
        }
        Some(result)
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_identifier_part(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(input: &str, grammar: Grammar) -> Vec<TokenType> {
        Lexer::new(input, grammar)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn test_multi_character_operators_per_grammar() {
        assert_eq!(
            types("a::b -> c", Grammar::Cpp),
            vec![
                TokenType::Identifier("a".into()),
                TokenType::ColonColon,
                TokenType::Identifier("b".into()),
                TokenType::Arrow,
                TokenType::Identifier("c".into()),
                TokenType::Eof,
            ]
        );
        assert_eq!(
            types("a === b => c !== d", Grammar::Js),
            vec![
                TokenType::Identifier("a".into()),
                TokenType::StrictEqual,
                TokenType::Identifier("b".into()),
                TokenType::FatArrow,
                TokenType::Identifier("c".into()),
                TokenType::StrictNotEqual,
                TokenType::Identifier("d".into()),
                TokenType::Eof,
            ]
        );
        assert_eq!(
            types("x <<= 2 >= 1", Grammar::Cpp)[1..3],
            [TokenType::ShiftLeftEqual, TokenType::Integer(2)]
        );
    }

    #[test]
    fn test_keywords_depend_on_grammar() {
        assert_eq!(
            types("int", Grammar::Cpp)[0],
            TokenType::Keyword(Keyword::Int)
        );
        assert_eq!(
            types("int", Grammar::Js)[0],
            TokenType::Identifier("int".into())
        );
        assert_eq!(
            types("function", Grammar::Js)[0],
            TokenType::Keyword(Keyword::Function)
        );
        assert_eq!(
            types("undefined", Grammar::Js)[0],
            TokenType::Keyword(Keyword::Null)
        );
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(types("42", Grammar::Cpp)[0], TokenType::Integer(42));
        assert_eq!(types("0x1F", Grammar::Cpp)[0], TokenType::Integer(31));
        assert_eq!(types("0b101", Grammar::Js)[0], TokenType::Integer(5));
        assert_eq!(types("2.5e3", Grammar::Js)[0], TokenType::Float(2500.0));
        assert_eq!(types(".5", Grammar::Cpp)[0], TokenType::Float(0.5));
        assert_eq!(types("10UL", Grammar::Cpp)[0], TokenType::Integer(10));
        assert_eq!(types("1.5f", Grammar::Cpp)[0], TokenType::Float(1.5));
        assert_eq!(
            types("0.1", Grammar::Cpp)[0],
            TokenType::Float("0.1".parse::<f64>().unwrap())
        );
    }

    #[test]
    fn test_invalid_numbers_fail_with_position() {
        for bad in ["12abc", "0x", "1e+", "3f"] {
            let err = Lexer::new(bad, Grammar::Cpp).tokenize().unwrap_err();
            assert!(
                matches!(err, LexError::InvalidNumber { .. }),
                "{} gave {:?}",
                bad,
                err
            );
        }
        let err = Lexer::new("x = \n  99zz", Grammar::Js).tokenize().unwrap_err();
        assert_eq!(err.location().line, 2);
        assert_eq!(err.location().column, 3);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            types(r#""a\tb\n\x41\"""#, Grammar::Cpp)[0],
            TokenType::String("a\tb\nA\"".into())
        );
        assert_eq!(
            types("'single'", Grammar::Js)[0],
            TokenType::String("single".into())
        );
        assert_eq!(types(r"'\n'", Grammar::Cpp)[0], TokenType::Char(10));
        assert_eq!(types("'a'", Grammar::Cpp)[0], TokenType::Char(97));
    }

    #[test]
    fn test_string_errors() {
        assert!(matches!(
            Lexer::new("\"open", Grammar::Cpp).tokenize(),
            Err(LexError::UnterminatedString { .. })
        ));
        assert!(matches!(
            Lexer::new(r#""bad \q""#, Grammar::Js).tokenize(),
            Err(LexError::InvalidEscape { escape: 'q', .. })
        ));
        assert!(matches!(
            Lexer::new("/* never closed", Grammar::Js).tokenize(),
            Err(LexError::UnterminatedComment { .. })
        ));
    }

    #[test]
    fn test_comments_and_directives_are_skipped() {
        let input = "#include <stdio.h>\n// line\nint /* block */ x;";
        assert_eq!(
            types(input, Grammar::Cpp),
            vec![
                TokenType::Keyword(Keyword::Int),
                TokenType::Identifier("x".into()),
                TokenType::Semicolon,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_positions_and_lexemes() {
        let tokens = Lexer::new("a\n  bb == 3", Grammar::Cpp).tokenize().unwrap();
        assert_eq!(tokens[1].lexeme, "bb");
        assert_eq!(tokens[1].location, SourceLocation::new(2, 3, 4));
        assert_eq!(tokens[2].lexeme, "==");
        assert_eq!(tokens[2].location.column, 6);
    }

    #[test]
    fn test_lexer_is_lazy_and_stops_after_error() {
        let mut lexer = Lexer::new("a @ b", Grammar::Cpp);
        assert!(matches!(lexer.next(), Some(Ok(_))));
        assert!(matches!(
            lexer.next(),
            Some(Err(LexError::UnexpectedCharacter { character: '@', .. }))
        ));
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_js_private_names() {
        assert_eq!(
            types("this.#secret", Grammar::Js)[2],
            TokenType::Identifier("#secret".into())
        );
    }
}
