use std::path::PathBuf;

use thiserror::Error;

/// A line/column location in source text, with the originating file when
/// the input was loaded from one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub path: Option<PathBuf>,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Position {
            line,
            column,
            path: None,
        }
    }

    pub fn in_file(line: u32, column: u32, path: PathBuf) -> Self {
        Position {
            line,
            column,
            path: Some(path),
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{}:{}", path.display(), self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

/// Errors surfaced by the lexer, parser and composer.
///
/// `Syntax` is recoverable: an interactive front end may discard the
/// offending statement and keep going. `Logic` means an internal invariant
/// was violated and indicates a bug rather than bad input. `File` and
/// `Server` wrap collaborator-boundary failures and carry their own
/// severity flag, decoupled from the core kinds.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input at the lexical or grammatical level.
    #[error("syntax error: {message}{}", .position.as_ref().map(|p| format!(" at {p}")).unwrap_or_default())]
    Syntax {
        message: String,
        position: Option<Position>,
    },

    /// An internal invariant was violated (e.g. a cursor position
    /// assertion failed).
    #[error("logic error: {0}")]
    Logic(String),

    /// I/O failure at a collaborator boundary.
    #[error("file error: {message}")]
    File { message: String, fatal: bool },

    /// Remote-dispatch failure at a collaborator boundary.
    #[error("server error: {message}")]
    Server { message: String, fatal: bool },
}

impl Error {
    pub fn syntax(message: impl Into<String>, position: Option<Position>) -> Self {
        Error::Syntax {
            message: message.into(),
            position,
        }
    }

    pub fn logic(message: impl Into<String>) -> Self {
        Error::Logic(message.into())
    }

    /// Whether the caller should treat this error as unrecoverable.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Syntax { .. } => false,
            Error::Logic(_) => true,
            Error::File { fatal, .. } | Error::Server { fatal, .. } => *fatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
