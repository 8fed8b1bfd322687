//! The checker algebra: immutable matching primitives.
//!
//! A checker answers one question: how many characters of `text` match
//! starting exactly at `offset`? Checkers compose into trees (alternatives,
//! negations, nested grammars) and are compared structurally, so equal trees
//! built by different routes deduplicate.
//!
//! All offsets and lengths are **character** (not byte) counts.

pub mod alternative;
pub mod char_set;
pub mod fixed;

use std::fmt;
use std::sync::Arc;

use crate::engine;
use crate::error::CheckerError;
use crate::grammar::Grammar;
use crate::types::TypeRegistry;

pub use alternative::Alternative;
pub use char_set::{CharChecker, CharClassProvider, StandardClasses};
pub use fixed::{Fixed, Region};

/// A matching primitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Checker {
    /// One character from a set.
    Char(CharChecker),
    /// A literal character sequence.
    Word(Word),
    /// Longest of several checkers, with an optional fallback.
    Alternative(Alternative),
    /// A fixed number of arbitrary characters, or the rest of the input.
    Any(Any),
    /// One character at which the inner checker does not match.
    Not(Box<Checker>),
    /// Consecutive fixed-width regions.
    Fixed(Fixed),
    /// A nested grammar used as a checker.
    Grammar(Arc<Grammar>),
}

impl Checker {
    pub fn single(ch: char) -> Self {
        Self::Char(CharChecker::single(ch))
    }

    pub fn word(text: &str) -> Result<Self, CheckerError> {
        Word::new(text).map(Self::Word)
    }

    /// Exactly `width` arbitrary characters.
    pub fn any(width: usize) -> Self {
        Self::Any(Any::width(width))
    }

    /// Everything from the offset to the end of input.
    pub fn rest() -> Self {
        Self::Any(Any::rest())
    }

    pub fn not(inner: Checker) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn grammar(grammar: Grammar) -> Self {
        Self::Grammar(Arc::new(grammar))
    }

    /// Literal text; the empty string matches without consuming anything.
    pub(crate) fn literal(text: &str) -> Self {
        Self::word(text).unwrap_or_else(|_| Self::any(0))
    }

    /// A checker that never matches.
    pub fn never() -> Self {
        Self::Alternative(Alternative::new(vec![]))
    }

    /// Length of the match starting exactly at `offset`, or `None`.
    pub fn match_at(&self, text: &[char], offset: usize, registry: &TypeRegistry) -> Option<usize> {
        match self {
            Self::Char(c) => {
                let ch = *text.get(offset)?;
                c.matches(ch, registry.classes()).then_some(1)
            }
            Self::Word(w) => w.match_at(text, offset),
            Self::Alternative(a) => a.match_at(text, offset, registry),
            Self::Any(a) => a.match_at(text, offset),
            Self::Not(inner) => {
                if offset >= text.len() {
                    // Nothing left for the inner checker to match: zero-width success.
                    return Some(0);
                }
                match inner.match_at(text, offset, registry) {
                    Some(_) => None,
                    None => Some(1),
                }
            }
            Self::Fixed(f) => f.match_at(text, offset, registry),
            Self::Grammar(g) => engine::parse_prefix(g, text, offset, registry),
        }
    }

    /// `Some(true)` when the same input and offset always give the same
    /// length, `None` when that depends on types resolved at match time.
    pub fn is_deterministic(&self) -> Option<bool> {
        match self {
            Self::Char(_) | Self::Word(_) | Self::Any(_) => Some(true),
            Self::Not(inner) => inner.is_deterministic().map(|_| true),
            Self::Alternative(a) => a.is_deterministic(),
            Self::Fixed(f) => f.is_deterministic(),
            Self::Grammar(g) => g.is_deterministic(),
        }
    }

    /// Structurally simpler equivalent.
    pub fn optimize(&self) -> Checker {
        match self {
            Self::Char(c) => Self::Char(c.optimize()),
            Self::Word(w) if w.len() == 1 => Self::single(w.chars[0]),
            Self::Alternative(a) => a.optimize(),
            Self::Not(inner) => match inner.as_ref() {
                Self::Not(x) => x.optimize(),
                other => Self::not(other.optimize()),
            },
            Self::Fixed(f) => Self::Fixed(f.optimize()),
            Self::Grammar(g) => Self::Grammar(Arc::new(g.optimize())),
            other => other.clone(),
        }
    }
}

impl From<CharChecker> for Checker {
    fn from(c: CharChecker) -> Self {
        Self::Char(c)
    }
}

impl fmt::Display for Checker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(c) => write!(f, "{c}"),
            Self::Word(w) => write!(f, "{w}"),
            Self::Alternative(a) => write!(f, "{a}"),
            Self::Any(a) => write!(f, "{a}"),
            Self::Not(inner) => write!(f, "(^{inner})"),
            Self::Fixed(x) => write!(f, "{x}"),
            Self::Grammar(g) => write!(f, "({g})"),
        }
    }
}

/// A non-empty literal character sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Word {
    chars: Vec<char>,
}

impl Word {
    pub fn new(text: &str) -> Result<Self, CheckerError> {
        if text.is_empty() {
            return Err(CheckerError::EmptyWord);
        }
        Ok(Self {
            chars: text.chars().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn match_at(&self, text: &[char], offset: usize) -> Option<usize> {
        text.get(offset..)?
            .starts_with(&self.chars)
            .then_some(self.chars.len())
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"")?;
        for &c in &self.chars {
            match c {
                '"' | '\\' => write!(f, "\\{c}")?,
                '\n' => write!(f, "\\n")?,
                '\t' => write!(f, "\\t")?,
                '\r' => write!(f, "\\r")?,
                _ => write!(f, "{c}")?,
            }
        }
        write!(f, "\"")
    }
}

/// Arbitrary characters: a fixed width, or the remainder of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Any {
    width: Option<usize>,
}

impl Any {
    pub fn width(width: usize) -> Self {
        Self { width: Some(width) }
    }

    pub fn rest() -> Self {
        Self { width: None }
    }

    /// `None` for the unbounded form.
    pub fn fixed_width(&self) -> Option<usize> {
        self.width
    }

    pub fn match_at(&self, text: &[char], offset: usize) -> Option<usize> {
        match self.width {
            Some(0) => Some(0),
            Some(width) => offset
                .checked_add(width)
                .is_some_and(|end| end <= text.len())
                .then_some(width),
            None => text.len().checked_sub(offset),
        }
    }
}

impl fmt::Display for Any {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.width {
            Some(1) => write!(f, "."),
            Some(n) => write!(f, ".{{{n}}}"),
            None => write!(f, ".*"),
        }
    }
}

/// Combine determinism of parts: any known-false wins, then any unknown.
pub(crate) fn all_deterministic(parts: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut unknown = false;
    for part in parts {
        match part {
            Some(false) => return Some(false),
            None => unknown = true,
            Some(true) => {}
        }
    }
    if unknown { None } else { Some(true) }
}

/// Pattern-syntax rendering of one character. `in_set` selects the escaping
/// rules that apply between `[` and `]`.
pub(crate) fn escape_char(c: char, in_set: bool) -> String {
    let special = if in_set {
        matches!(c, '[' | ']' | '\\' | '^' | '-' | '&')
    } else {
        matches!(
            c,
            '.' | '?' | '*' | '+' | '^' | '{' | '}' | '(' | ')' | '[' | ']' | '|' | '\\' | '!'
                | '$' | '"' | '\'' | '`' | '~' | ' '
        )
    };
    match c {
        '\n' => "\\n".to_string(),
        '\t' => "\\t".to_string(),
        '\r' => "\\r".to_string(),
        c if special => format!("\\{c}"),
        c if c.is_control() => format!("\\u{:04x}", c as u32),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn at(c: &Checker, s: &str, offset: usize) -> Option<usize> {
        c.match_at(&chars(s), offset, &TypeRegistry::default())
    }

    #[test]
    fn empty_word_is_rejected() {
        assert_eq!(Word::new(""), Err(CheckerError::EmptyWord));
    }

    #[test]
    fn word_matches_prefix_exactly() {
        let w = Checker::word("555").unwrap();
        assert_eq!(at(&w, "555A", 0), Some(3));
        assert_eq!(at(&w, "55", 0), None);
        assert_eq!(at(&w, "A555", 1), Some(3));
        assert_eq!(at(&w, "A555", 9), None);
    }

    #[test]
    fn any_width_and_rest() {
        assert_eq!(at(&Checker::any(2), "abc", 0), Some(2));
        assert_eq!(at(&Checker::any(4), "abc", 0), None);
        assert_eq!(at(&Checker::rest(), "abc", 1), Some(2));
        assert_eq!(at(&Checker::rest(), "abc", 3), Some(0));
        assert_eq!(at(&Checker::any(0), "abc", 3), Some(0));
        assert_eq!(at(&Checker::any(usize::MAX), "abc", 1), None);
    }

    #[test]
    fn char_checker_fails_at_end() {
        assert_eq!(at(&Checker::single('a'), "a", 1), None);
    }

    #[test]
    fn not_consumes_one_char_where_inner_fails() {
        let n = Checker::not(Checker::word("*/").unwrap());
        assert_eq!(at(&n, "ab*/", 0), Some(1));
        assert_eq!(at(&n, "ab*/", 2), None);
        assert_eq!(at(&n, "ab", 2), Some(0));
    }

    #[test]
    fn double_not_optimizes_away() {
        let w = Checker::word("ab").unwrap();
        let nn = Checker::not(Checker::not(w.clone()));
        assert_eq!(nn.optimize(), w);
    }

    #[test]
    fn single_char_word_optimizes_to_char() {
        let w = Checker::word("x").unwrap();
        assert_eq!(w.optimize(), Checker::single('x'));
    }

    #[test]
    fn determinism_of_leaves() {
        assert_eq!(Checker::single('a').is_deterministic(), Some(true));
        assert_eq!(Checker::rest().is_deterministic(), Some(true));
    }

    #[test]
    fn all_deterministic_prefers_false_over_unknown() {
        assert_eq!(all_deterministic([Some(true), None]), None);
        assert_eq!(all_deterministic([None, Some(false)]), Some(false));
        assert_eq!(all_deterministic([Some(true)]), Some(true));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Checker::word("Colo").unwrap().to_string(), "\"Colo\"");
        assert_eq!(Checker::any(1).to_string(), ".");
        assert_eq!(Checker::any(3).to_string(), ".{3}");
        assert_eq!(Checker::rest().to_string(), ".*");
        assert_eq!(Checker::not(Checker::single('a')).to_string(), "(^a)");
    }

    #[test]
    fn escape_char_rules() {
        assert_eq!(escape_char('a', false), "a");
        assert_eq!(escape_char('(', false), "\\(");
        assert_eq!(escape_char('-', true), "\\-");
        assert_eq!(escape_char('-', false), "-");
        assert_eq!(escape_char('\n', false), "\\n");
    }
}
