use serde::Serialize;

use super::ast::Pos;

/// A compilation error with source location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileError {
    pub message: String,
    pub pos: Pos,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Lexer,
    Parser,
    Binding,
    Signature,
    Lowering,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Lexer => "lexer",
            ErrorKind::Parser => "parser",
            ErrorKind::Binding => "binding",
            ErrorKind::Signature => "signature",
            ErrorKind::Lowering => "lowering",
        }
    }
}

impl CompileError {
    fn new(kind: ErrorKind, message: impl Into<String>, pos: Pos) -> Self {
        Self {
            message: message.into(),
            pos,
            kind,
        }
    }

    pub fn lexer(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(ErrorKind::Lexer, message, pos)
    }

    pub fn parser(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(ErrorKind::Parser, message, pos)
    }

    pub fn binding(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(ErrorKind::Binding, message, pos)
    }

    pub fn signature(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(ErrorKind::Signature, message, pos)
    }

    pub fn lowering(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(ErrorKind::Lowering, message, pos)
    }

    /// Format as `[parser] line 3:7: message`.
    pub fn format_with_kind(&self) -> String {
        format!(
            "[{}] line {}:{}: {}",
            self.kind.label(),
            self.pos.line,
            self.pos.col,
            self.message,
        )
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CompileError {}

/// Write-only sink for compile errors. Compilation keeps going after a report.
pub trait Diagnostics {
    fn report(&mut self, error: CompileError);
}

impl Diagnostics for Vec<CompileError> {
    fn report(&mut self, error: CompileError) {
        self.push(error);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn formats_kind_and_position() {
        let err = CompileError::parser("expected ')'", Pos::new(3, 7));
        assert_eq!(err.format_with_kind(), "[parser] line 3:7: expected ')'");
        assert_eq!(err.to_string(), "expected ')'");
    }

    #[test]
    fn vec_collects_reports() {
        let mut sink: Vec<CompileError> = Vec::new();
        sink.report(CompileError::binding("unknown variable 'x'", Pos::new(1, 1)));
        sink.report(CompileError::signature("undefined function 'f'", Pos::new(2, 1)));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[1].kind, ErrorKind::Signature);
    }

    #[test]
    fn serializes_kind_in_snake_case() {
        let err = CompileError::lowering("CONTINUE outside of a loop", Pos::new(4, 2));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "lowering");
        assert_eq!(json["pos"]["line"], 4);
    }
}
