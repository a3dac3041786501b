use serde::Serialize;

use crate::backend::vm::VmError;
use crate::frontend::error::CompileError;

/// Top-level error for library entry points and the CLI.
#[derive(Debug, thiserror::Error)]
pub enum ToyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("compilation failed with {} error(s)", .0.len())]
    Compile(Vec<CompileError>),
    #[error("no entry function '{0}' defined")]
    MissingEntry(String),
    #[error("runtime error: {0}")]
    Runtime(#[from] VmError),
}

impl From<Vec<CompileError>> for ToyError {
    fn from(errors: Vec<CompileError>) -> Self {
        ToyError::Compile(errors)
    }
}

impl Serialize for ToyError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::Pos;

    #[test]
    fn display_messages() {
        let err = ToyError::from(vec![
            CompileError::parser("a", Pos::new(1, 1)),
            CompileError::parser("b", Pos::new(2, 1)),
        ]);
        assert_eq!(err.to_string(), "compilation failed with 2 error(s)");
        assert_eq!(
            ToyError::MissingEntry("main".into()).to_string(),
            "no entry function 'main' defined"
        );
        assert_eq!(
            ToyError::from(VmError::DivisionByZero).to_string(),
            "runtime error: division by zero"
        );
    }

    #[test]
    fn serializes_as_string() {
        let err = ToyError::MissingEntry("start".into());
        assert_eq!(
            serde_json::to_string(&err).ok().as_deref(),
            Some("\"no entry function 'start' defined\"")
        );
    }
}
