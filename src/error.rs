//! The numbered error taxonomy.
//!
//! Every failure in the pipeline is an `Error`: a kind whose number doubles
//! as the process exit code, an optional detail message, and an optional
//! source context (module, line number, offending line). The innermost
//! frame that knows a position attaches it; outer frames leave it alone.

use std::fmt;

use thiserror::Error as ThisError;

use crate::module::Source;

/// Error kinds with stable numbers, used as process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum ErrorKind {
    #[error("NameError")]
    Name,
    #[error("TypeError")]
    Type,
    #[error("SyntaxError")]
    Syntax,
    #[error("ValueError")]
    Value,
    #[error("SystemError")]
    System,
    #[error("IndexError: index out of range")]
    Index,
    #[error("Out of memory")]
    OutOfMemory,
    #[error("ModNotAllowedError")]
    ModNotAllowed,
    #[error("DivisionByZeroError: division by zero")]
    DivisionByZero,
    #[error("DesignError")]
    Design,
}

impl ErrorKind {
    pub fn number(self) -> i32 {
        match self {
            ErrorKind::Name => 1,
            ErrorKind::Type => 2,
            ErrorKind::Syntax => 3,
            ErrorKind::Value => 4,
            ErrorKind::System => 5,
            ErrorKind::Index => 6,
            ErrorKind::OutOfMemory => 7,
            ErrorKind::ModNotAllowed => 8,
            ErrorKind::DivisionByZero => 9,
            ErrorKind::Design => 10,
        }
    }

    /// Kinds whose label already carries the full message.
    fn is_self_describing(self) -> bool {
        matches!(
            self,
            ErrorKind::Index | ErrorKind::OutOfMemory | ErrorKind::DivisionByZero
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Context {
    module: String,
    lineno: usize,
    line: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    detail: Option<String>,
    context: Option<Context>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
            context: None,
        }
    }

    /// An error whose kind label is the whole message.
    pub fn plain(kind: ErrorKind) -> Self {
        Self {
            kind,
            detail: None,
            context: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.number()
    }

    /// Attach a source position unless an inner frame already did.
    pub fn with_source(mut self, source: &Source) -> Self {
        if self.context.is_none() {
            self.context = Some(Context {
                module: source.module.name.clone(),
                lineno: source.lineno,
                line: source.module.line_at(source.bol).to_string(),
            });
        }
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            writeln!(f, "File {}, line {}", context.module, context.lineno)?;
            writeln!(f, "{}", context.line)?;
        }
        write!(f, "{}", self.kind)?;
        if !self.kind.is_self_describing() {
            if let Some(detail) = &self.detail {
                write!(f, ": {detail}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleCode;

    #[test]
    fn renders_context_and_detail() {
        let module = ModuleCode::from_source("prog.ti", "  print x");
        let source = Source {
            module,
            lineno: 1,
            bol: 0,
        };
        let error = Error::new(ErrorKind::Name, "identifier x is not defined")
            .with_source(&source);
        assert_eq!(
            error.to_string(),
            "File prog.ti, line 1\nprint x\nNameError: identifier x is not defined"
        );
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn self_describing_kinds_ignore_detail() {
        let error = Error::plain(ErrorKind::DivisionByZero);
        assert_eq!(error.to_string(), "DivisionByZeroError: division by zero");
        assert_eq!(error.exit_code(), 9);
    }

    #[test]
    fn inner_context_wins() {
        let module = ModuleCode::from_source("a.ti", "inner");
        let inner = Source {
            module: module.clone(),
            lineno: 1,
            bol: 0,
        };
        let outer_module = ModuleCode::from_source("b.ti", "outer");
        let outer = Source {
            module: outer_module,
            lineno: 9,
            bol: 0,
        };
        let error = Error::plain(ErrorKind::Index)
            .with_source(&inner)
            .with_source(&outer);
        assert!(error.to_string().starts_with("File a.ti, line 1"));
    }
}
