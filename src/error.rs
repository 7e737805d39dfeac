use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    /// Byte offset into the source text.
    pub offset: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Raised for interpreter bugs, never for script mistakes. Not recoverable.
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        panic!("internal interpreter error: {}", format!($($arg)*))
    };
}

// Lexer Errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("{location}: Unexpected character '{character}'")]
    UnexpectedCharacter {
        character: char,
        location: SourceLocation,
    },
    #[error("{location}: Unterminated string literal")]
    UnterminatedString { location: SourceLocation },
    #[error("{location}: Unterminated character literal")]
    UnterminatedChar { location: SourceLocation },
    #[error("{location}: Unterminated comment")]
    UnterminatedComment { location: SourceLocation },
    #[error("{location}: Invalid escape sequence '\\{escape}'")]
    InvalidEscape {
        escape: char,
        location: SourceLocation,
    },
    #[error("{location}: Invalid number '{value}'")]
    InvalidNumber {
        value: String,
        location: SourceLocation,
    },
}

impl LexError {
    pub fn location(&self) -> SourceLocation {
        match self {
            LexError::UnexpectedCharacter { location, .. }
            | LexError::UnterminatedString { location }
            | LexError::UnterminatedChar { location }
            | LexError::UnterminatedComment { location }
            | LexError::InvalidEscape { location, .. }
            | LexError::InvalidNumber { location, .. } => *location,
        }
    }
}

// Parser Errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{location}: Expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        location: SourceLocation,
    },
    #[error("{location}: Unexpected end of file, expected {expected}")]
    UnexpectedEof {
        expected: String,
        location: SourceLocation,
    },
    #[error("{location}: {message}")]
    InvalidSyntax {
        message: String,
        location: SourceLocation,
    },
    #[error("{location}: {feature} not supported")]
    NotImplemented {
        feature: String,
        location: SourceLocation,
    },
    #[error("{0}")]
    Lex(#[from] LexError),
}

impl ParseError {
    pub fn location(&self) -> SourceLocation {
        match self {
            ParseError::UnexpectedToken { location, .. }
            | ParseError::UnexpectedEof { location, .. }
            | ParseError::InvalidSyntax { location, .. }
            | ParseError::NotImplemented { location, .. } => *location,
            ParseError::Lex(err) => err.location(),
        }
    }
}

// Resolution Errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    #[error("{location}: Unknown type '{name}'")]
    UnknownType {
        name: String,
        location: SourceLocation,
    },
    #[error("{location}: '{name}' is already declared")]
    Duplicate {
        name: String,
        location: SourceLocation,
    },
    #[error("{location}: Class '{class}' declares member '{member}' more than once")]
    DuplicateMember {
        class: String,
        member: String,
        location: SourceLocation,
    },
    #[error("{location}: Parameter '{parameter}' of '{function}' is declared more than once")]
    DuplicateParameter {
        function: String,
        parameter: String,
        location: SourceLocation,
    },
    #[error("{location}: Parameter '{parameter}' of '{function}' needs a default value")]
    MissingDefault {
        function: String,
        parameter: String,
        location: SourceLocation,
    },
    #[error("{location}: Inheritance cycle through class '{class}'")]
    InheritanceCycle {
        class: String,
        location: SourceLocation,
    },
    #[error("{location}: '{method}' in '{class}' takes {found} parameter(s) but overrides a method taking {expected}")]
    OverrideArity {
        class: String,
        method: String,
        expected: usize,
        found: usize,
        location: SourceLocation,
    },
    #[error("{location}: Function '{name}' is declared but never defined")]
    UndefinedPrototype {
        name: String,
        location: SourceLocation,
    },
    #[error("{location}: Class '{class}' does not declare a member '{member}' to define")]
    UndeclaredMember {
        class: String,
        member: String,
        location: SourceLocation,
    },
    #[error("{location}: Enum value of '{member}' is not a constant integer expression")]
    NonConstantEnumValue {
        member: String,
        location: SourceLocation,
    },
}

impl ResolutionError {
    pub fn location(&self) -> SourceLocation {
        match self {
            ResolutionError::UnknownType { location, .. }
            | ResolutionError::Duplicate { location, .. }
            | ResolutionError::DuplicateMember { location, .. }
            | ResolutionError::DuplicateParameter { location, .. }
            | ResolutionError::MissingDefault { location, .. }
            | ResolutionError::InheritanceCycle { location, .. }
            | ResolutionError::OverrideArity { location, .. }
            | ResolutionError::UndefinedPrototype { location, .. }
            | ResolutionError::UndeclaredMember { location, .. }
            | ResolutionError::NonConstantEnumValue { location, .. } => *location,
        }
    }
}

// Compilation Errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Lexical error: {0}")]
    Lex(LexError),
    #[error("Parse error: {0}")]
    Parse(ParseError),
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),
}

impl CompileError {
    pub fn location(&self) -> SourceLocation {
        match self {
            CompileError::Lex(err) => err.location(),
            CompileError::Parse(err) => err.location(),
            CompileError::Resolution(err) => err.location(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            CompileError::Lex(_) => "LexError",
            CompileError::Parse(_) => "ParseError",
            CompileError::Resolution(_) => "ResolutionError",
        }
    }
}

impl From<LexError> for CompileError {
    fn from(err: LexError) -> Self {
        CompileError::Lex(err)
    }
}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        // A lexer failure surfaces through the parser but keeps its own kind.
        match err {
            ParseError::Lex(lex) => CompileError::Lex(lex),
            other => CompileError::Parse(other),
        }
    }
}

// Host bridge errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    #[error("'{function}' expects {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },
    #[error("'{function}' argument {index}: expected {expected}, got {found}")]
    ArgumentType {
        function: String,
        index: usize,
        expected: String,
        found: String,
    },
    #[error("'{function}' returned {found} but is declared to return {expected}")]
    ReturnType {
        function: String,
        expected: String,
        found: String,
    },
    #[error("invalid host prototype '{prototype}': {message}")]
    Prototype { prototype: String, message: String },
    #[error("host name '{0}' is registered twice")]
    Duplicate(String),
    #[error("cannot register '{0}': the library is sealed once compilation has started")]
    Sealed(String),
    #[error("host object of '{0}' is missing or has an unexpected type")]
    Handle(String),
    #[error("{0}")]
    Host(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceFrame {
    pub function: String,
    pub location: SourceLocation,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "at {} ({})", self.function, self.location)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeErrorKind {
    #[error("TypeError: {0}")]
    Type(String),
    #[error("NameError: {0}")]
    Name(String),
    #[error("IndexError: index {index} out of range for length {len}")]
    Index { index: i64, len: usize },
    #[error("BindingError: {0}")]
    Binding(BindingError),
    #[error("StackOverflow: call depth exceeded {0}")]
    StackOverflow(usize),
    #[error("Interrupted after {0} steps")]
    Interrupted(u64),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{location}: {kind}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub location: SourceLocation,
    /// Innermost call first.
    pub trace: Vec<TraceFrame>,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, location: SourceLocation) -> Self {
        Self {
            kind,
            location,
            trace: Vec::new(),
        }
    }

    pub fn type_error(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(RuntimeErrorKind::Type(message.into()), location)
    }

    pub fn name_error(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(RuntimeErrorKind::Name(message.into()), location)
    }

    pub fn index_error(index: i64, len: usize, location: SourceLocation) -> Self {
        Self::new(RuntimeErrorKind::Index { index, len }, location)
    }

    pub fn binding(err: BindingError, location: SourceLocation) -> Self {
        Self::new(RuntimeErrorKind::Binding(err), location)
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            RuntimeErrorKind::Type(_) => "TypeError",
            RuntimeErrorKind::Name(_) => "NameError",
            RuntimeErrorKind::Index { .. } => "IndexError",
            RuntimeErrorKind::Binding(_) => "BindingError",
            RuntimeErrorKind::StackOverflow(_) => "StackOverflow",
            RuntimeErrorKind::Interrupted(_) => "Interrupted",
        }
    }

    pub fn with_frame(mut self, function: impl Into<String>, location: SourceLocation) -> Self {
        self.trace.push(TraceFrame {
            function: function.into(),
            location,
        });
        self
    }
}

// Result types
pub type LexResult<T> = Result<T, LexError>;
pub type ParseResult<T> = Result<T, ParseError>;
pub type ResolveResult<T> = Result<T, ResolutionError>;
pub type CompileResult<T> = Result<T, CompileError>;
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_error_through_parser_keeps_kind() {
        let lex = LexError::UnterminatedString {
            location: SourceLocation::new(3, 7, 40),
        };
        let compile: CompileError = ParseError::from(lex.clone()).into();
        assert_eq!(compile, CompileError::Lex(lex));
        assert_eq!(compile.kind_name(), "LexError");
        assert_eq!(compile.location().line, 3);
    }

    #[test]
    fn test_runtime_error_display_carries_location() {
        let err = RuntimeError::type_error("division by zero", SourceLocation::new(2, 5, 12));
        assert_eq!(err.to_string(), "2:5: TypeError: division by zero");
        assert_eq!(err.kind_name(), "TypeError");
    }

    #[test]
    fn test_trace_frames_accumulate_innermost_first() {
        let err = RuntimeError::name_error("x", SourceLocation::default())
            .with_frame("inner", SourceLocation::new(4, 1, 0))
            .with_frame("outer", SourceLocation::new(9, 1, 0));
        assert_eq!(err.trace[0].function, "inner");
        assert_eq!(err.trace[1].function, "outer");
    }
}
