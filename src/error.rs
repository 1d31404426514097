//! Error type shared by the library and the `fitfun` binary.
//!
//! Every failure is a value carrying an [`ErrorKind`] and a message. The kind
//! decides the process exit code when the error reaches `main`.
//!
//! Memory faults inside foreign model code are deliberately *not* represented
//! here: they never return to the caller (see `foreign::guard`).

use thiserror::Error;

/// Broad failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed names, units, paths or settings. Prior state is unchanged.
    Config,
    /// Inconsistent measurement grid (lengths, notice list, edge bookkeeping).
    Grid,
    /// Registration or lookup problems in the function registry.
    Registry,
    /// A registered function failed or refused to evaluate.
    Eval,
    /// File or stream I/O of the command-line surface.
    Io,
}

impl ErrorKind {
    fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Config => 2,
            ErrorKind::Io => 2,
            ErrorKind::Registry => 3,
            ErrorKind::Grid => 4,
            ErrorKind::Eval => 5,
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn grid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Grid, message)
    }

    pub fn registry(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Registry, message)
    }

    pub fn eval(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Eval, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_bare_message() {
        let err = AppError::grid("no noticed bins");
        assert_eq!(err.to_string(), "no noticed bins");
        assert_eq!(err.kind(), ErrorKind::Grid);
    }

    #[test]
    fn exit_codes_follow_kind() {
        assert_eq!(AppError::config("x").exit_code(), 2);
        assert_eq!(AppError::registry("x").exit_code(), 3);
        assert_eq!(AppError::grid("x").exit_code(), 4);
        assert_eq!(AppError::eval("x").exit_code(), 5);
    }
}
