//! Error and failure types shared by the compiler, the type registry and the engine.

use std::fmt;

/// Errors raised while compiling a pattern, resolving a type, or compiling a
/// match tree into values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// Syntax error in the pattern. `slice` is the pattern text from `offset` onward.
    Malformed {
        message: String,
        offset: usize,
        slice: String,
    },
    /// Raised by a fatal error-reporting type; compilation stops at the first one.
    Fatal {
        message: String,
        offset: usize,
        slice: String,
    },
    /// A type reference names a type the registry does not know.
    UnknownType { name: String, offset: usize },
    /// A type with this name is already registered.
    DuplicateType(String),
    /// A type failed to supply its checker or its value.
    Type { name: String, message: String },
    /// Several non-fatal errors reported during one compilation, in source order.
    Many(Vec<GrammarError>),
}

impl GrammarError {
    /// Build a [`GrammarError::Malformed`] for `text` at char offset `offset`.
    pub fn malformed(message: impl Into<String>, text: &[char], offset: usize) -> Self {
        Self::Malformed {
            message: message.into(),
            offset,
            slice: slice_from(text, offset),
        }
    }

    /// Build a [`GrammarError::Fatal`] for `text` at char offset `offset`.
    pub fn fatal(message: impl Into<String>, text: &[char], offset: usize) -> Self {
        Self::Fatal {
            message: message.into(),
            offset,
            slice: slice_from(text, offset),
        }
    }

    /// Char offset the error points at, if it has one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Malformed { offset, .. }
            | Self::Fatal { offset, .. }
            | Self::UnknownType { offset, .. } => Some(*offset),
            Self::Many(errors) => errors.first().and_then(GrammarError::offset),
            Self::DuplicateType(_) | Self::Type { .. } => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

fn slice_from(text: &[char], offset: usize) -> String {
    text.get(offset..).unwrap_or_default().iter().collect()
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed {
                message,
                offset,
                slice,
            } => write!(f, "Malformed grammar: {message} at {offset}: {slice:?}"),
            Self::Fatal {
                message,
                offset,
                slice,
            } => write!(f, "Fatal grammar error: {message} at {offset}: {slice:?}"),
            Self::UnknownType { name, offset } => {
                write!(f, "Unknown parser type '{name}' referenced at {offset}")
            }
            Self::DuplicateType(name) => write!(f, "Parser type '{name}' is already registered"),
            Self::Type { name, message } => write!(f, "Parser type '{name}': {message}"),
            Self::Many(errors) => {
                for (i, error) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for GrammarError {}

/// A runtime matching failure: the longest position any attempt reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unmatched {
    /// Char offset where the furthest attempt stopped.
    pub offset: usize,
    /// String form of what was expected there.
    pub expected: String,
    /// Repeats of the expected entry found before giving up.
    pub repeats: usize,
}

impl fmt::Display for Unmatched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {}, found {} repeats at offset {}",
            self.expected, self.repeats, self.offset
        )
    }
}

/// Result of a failed `parse`/`match_text`.
///
/// [`ParseError::Unmatched`] is the ordinary outcome of text that does not
/// fit the grammar; the other variants are fatal configuration problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Unmatched(Unmatched),
    UnknownType { name: String, offset: usize },
    Type { name: String, message: String },
}

impl ParseError {
    pub fn unmatched(&self) -> Option<&Unmatched> {
        match self {
            Self::Unmatched(u) => Some(u),
            _ => None,
        }
    }
}

impl From<GrammarError> for ParseError {
    fn from(err: GrammarError) -> Self {
        match err {
            GrammarError::UnknownType { name, offset } => Self::UnknownType { name, offset },
            GrammarError::Type { name, message } => Self::Type { name, message },
            other => Self::Type {
                name: String::new(),
                message: other.to_string(),
            },
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmatched(u) => write!(f, "Unmatched: {u}"),
            Self::UnknownType { name, offset } => {
                write!(f, "Unknown parser type '{name}' at offset {offset}")
            }
            Self::Type { name, message } => write!(f, "Parser type '{name}': {message}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Invalid direct construction of a checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerError {
    EmptyWord,
    EmptyFixed,
    UnboundedRegionNotLast,
}

impl fmt::Display for CheckerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyWord => write!(f, "A word checker needs at least one character"),
            Self::EmptyFixed => write!(f, "A fixed checker needs at least one region"),
            Self::UnboundedRegionNotLast => {
                write!(f, "Only the last region of a fixed checker may be unbounded")
            }
        }
    }
}

impl std::error::Error for CheckerError {}
