//! Error reports for people and for tools.
//!
//! A [`Diagnostic`] flattens a compile or runtime error into kind, message,
//! position and call trace. `render` prints it against the source with a
//! caret under the failing column; `serde_json` gives the `--json` form.

use crate::error::{CompileError, RuntimeError, RuntimeErrorKind, SourceLocation};
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub function: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: &'static str,
    pub message: String,
    pub line: usize,
    pub column: usize,
    /// Innermost call first; empty for compile errors.
    pub trace: Vec<TraceEntry>,
}

impl From<&CompileError> for Diagnostic {
    fn from(err: &CompileError) -> Self {
        let location = err.location();
        let message = match err {
            CompileError::Lex(inner) => inner.to_string(),
            CompileError::Parse(inner) => inner.to_string(),
            CompileError::Resolution(inner) => inner.to_string(),
        };
        Self {
            kind: err.kind_name(),
            message: strip_location(&message, location),
            line: location.line,
            column: location.column,
            trace: Vec::new(),
        }
    }
}

impl From<&RuntimeError> for Diagnostic {
    fn from(err: &RuntimeError) -> Self {
        let message = match &err.kind {
            RuntimeErrorKind::Type(message) | RuntimeErrorKind::Name(message) => message.clone(),
            RuntimeErrorKind::Binding(inner) => inner.to_string(),
            RuntimeErrorKind::Index { index, len } => {
                format!("index {} out of range for length {}", index, len)
            }
            RuntimeErrorKind::StackOverflow(limit) => format!("call depth exceeded {}", limit),
            RuntimeErrorKind::Interrupted(steps) => format!("interrupted after {} steps", steps),
        };
        Self {
            kind: err.kind_name(),
            message,
            line: err.location.line,
            column: err.location.column,
            trace: err
                .trace
                .iter()
                .map(|frame| TraceEntry {
                    function: frame.function.clone(),
                    line: frame.location.line,
                    column: frame.location.column,
                })
                .collect(),
        }
    }
}

impl Diagnostic {
    /// Human-readable report quoting the offending source line.
    pub fn render(&self, source: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}: {}", self.kind, self.message);
        let _ = writeln!(out, "  --> {}:{}", self.line, self.column);
        if let Some(text) = self.line.checked_sub(1).and_then(|n| source.lines().nth(n)) {
            let gutter = self.line.to_string();
            let _ = writeln!(out, "{} | {}", gutter, text);
            let pad = " ".repeat(gutter.len());
            let caret = " ".repeat(self.column.saturating_sub(1));
            let _ = writeln!(out, "{} | {}^", pad, caret);
        }
        for frame in &self.trace {
            let _ = writeln!(out, "  at {} ({}:{})", frame.function, frame.line, frame.column);
        }
        out
    }
}

/// Inner errors print their own `line:col` prefix; the report carries it separately.
fn strip_location(message: &str, location: SourceLocation) -> String {
    let prefix = format!("{}: ", location);
    message
        .strip_prefix(&prefix)
        .unwrap_or(message)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseError, TraceFrame};

    #[test]
    fn test_runtime_report_points_at_the_column() {
        let mut err = RuntimeError::type_error("division by zero", SourceLocation::new(2, 9, 20));
        err.trace.push(TraceFrame {
            function: "divide".to_string(),
            location: SourceLocation::new(5, 1, 40),
        });
        let diagnostic = Diagnostic::from(&err);
        let report = diagnostic.render("int a = 1;\nint b = a / 0;\n");
        assert_eq!(
            report,
            "TypeError: division by zero\n  --> 2:9\n2 | int b = a / 0;\n  |         ^\n  at divide (5:1)\n"
        );
    }

    #[test]
    fn test_json_shape() {
        let err = RuntimeError::index_error(4, 2, SourceLocation::new(1, 3, 2));
        let json = serde_json::to_value(Diagnostic::from(&err)).unwrap();
        assert_eq!(json["kind"], "IndexError");
        assert_eq!(json["line"], 1);
        assert_eq!(json["trace"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_compile_errors_keep_their_kind() {
        let parse = ParseError::InvalidSyntax {
            message: "unexpected token".to_string(),
            location: SourceLocation::new(3, 4, 10),
        };
        let diagnostic = Diagnostic::from(&CompileError::from(parse));
        assert_eq!(diagnostic.kind, "ParseError");
        assert_eq!((diagnostic.line, diagnostic.column), (3, 4));
        // A line past the end of the source prints no excerpt.
        assert!(!diagnostic.render("x;").contains(" | "));
    }
}
