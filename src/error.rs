//! Error taxonomy shared by every stage of the query pipeline.
//!
//! Each variant names *why* a statement failed, which decides what the
//! cursor does next: `Programming` and query-shape `UnsupportedQuery`
//! failures send the statement to the local fallback engine, everything
//! else aborts it.

use std::fmt;

/// Where in a query text an error was detected (1-based, like the parsers
/// that report it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Query texts and position attached to syntax and remote errors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Diagnostic {
    /// The statement as the caller wrote it (after parameter substitution).
    pub original: String,
    /// The remote dialect text, when translation got that far.
    pub translated: Option<String>,
    /// First position reported by the parser or the remote side.
    pub position: Option<Position>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The statement text could not be parsed.
    #[error("{message}")]
    Syntax {
        message: String,
        diagnostic: Diagnostic,
    },
    /// Well-formed SQL the remote dialect cannot express, or a FROM clause
    /// that is not a single quoted URL.
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),
    /// Transport failure, non-2xx response, undecodable payload, or a failed
    /// column probe.
    #[error("remote error: {0}")]
    Remote(String),
    /// The remote side rejected the translated dialect text.
    #[error("{message}")]
    Programming {
        message: String,
        diagnostic: Option<Diagnostic>,
    },
    /// Cursor or connection used out of sequence.
    #[error("{0}")]
    Interface(String),
    #[error("not supported: {0}")]
    NotSupported(String),
    /// Failure inside the local fallback store.
    #[error("local engine error: {0}")]
    Local(#[from] rusqlite::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedQuery(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Error::Remote(msg.into())
    }

    pub fn interface(msg: impl Into<String>) -> Self {
        Error::Interface(msg.into())
    }

    /// The diagnostic carried by syntax and remote-rejection errors.
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Error::Syntax { diagnostic, .. } => Some(diagnostic),
            Error::Programming { diagnostic, .. } => diagnostic.as_ref(),
            _ => None,
        }
    }

    /// True for failures that mean "the remote dialect cannot run this
    /// statement" rather than "the input or the transport is broken".
    pub fn is_query_shape(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedQuery(_) | Error::Programming { .. }
        )
    }
}

/// Render `text` up to `position.line`, followed by a caret under
/// `position.column` and then `message`.
pub fn caret_diagnostic(text: &str, position: Position, message: &str) -> String {
    let mut lines: Vec<String> = text
        .split('\n')
        .take(position.line)
        .map(str::to_string)
        .collect();
    lines.push(format!("{}^", " ".repeat(position.column.saturating_sub(1))));
    lines.push(message.to_string());
    lines.join("\n")
}
