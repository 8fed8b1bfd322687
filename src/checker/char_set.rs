//! Single-character checkers and the character-class provider.

use std::fmt;

use itertools::Itertools;
use phf::{Map, phf_map};

use super::escape_char;

/// Membership test for a single character.
///
/// Build values through the constructor functions: they keep unions and
/// intersections flat and collapse double negation, so structural equality
/// matches semantic identity for the common cases.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CharChecker {
    Single(char),
    /// Inclusive bounds, `lo <= hi`.
    Range(char, char),
    /// Sorted, de-duplicated member characters.
    Set(String),
    /// Named class resolved by a [`CharClassProvider`].
    Class(String),
    Union(Vec<CharChecker>),
    Intersect(Vec<CharChecker>),
    Not(Box<CharChecker>),
}

impl CharChecker {
    pub fn single(ch: char) -> Self {
        Self::Single(ch)
    }

    /// Range with bounds put in order.
    pub fn range(a: char, b: char) -> Self {
        if a <= b {
            Self::Range(a, b)
        } else {
            Self::Range(b, a)
        }
    }

    pub fn set(members: &str) -> Self {
        Self::Set(members.chars().sorted().dedup().collect())
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::Class(name.into())
    }

    /// Union; nested unions merge into this one.
    pub fn union(items: impl IntoIterator<Item = CharChecker>) -> Self {
        let mut flat = Vec::new();
        for item in items {
            match item {
                Self::Union(children) => flat.extend(children),
                other => flat.push(other),
            }
        }
        Self::Union(flat)
    }

    /// Intersection; nested intersections merge into this one.
    pub fn intersect(items: impl IntoIterator<Item = CharChecker>) -> Self {
        let mut flat = Vec::new();
        for item in items {
            match item {
                Self::Intersect(children) => flat.extend(children),
                other => flat.push(other),
            }
        }
        Self::Intersect(flat)
    }

    /// Negation; `not(not(x))` is `x`.
    pub fn not(item: CharChecker) -> Self {
        match item {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    pub fn matches(&self, ch: char, classes: &dyn CharClassProvider) -> bool {
        match self {
            Self::Single(c) => *c == ch,
            Self::Range(lo, hi) => *lo <= ch && ch <= *hi,
            Self::Set(members) => members.contains(ch),
            Self::Class(name) => classes.contains(name, ch).unwrap_or(false),
            Self::Union(items) => items.iter().any(|c| c.matches(ch, classes)),
            Self::Intersect(items) => {
                !items.is_empty() && items.iter().all(|c| c.matches(ch, classes))
            }
            Self::Not(inner) => !inner.matches(ch, classes),
        }
    }

    /// Structurally simpler equivalent.
    pub fn optimize(&self) -> CharChecker {
        match self {
            Self::Set(members) if members.chars().count() == 1 => {
                members.chars().next().map_or_else(|| self.clone(), Self::Single)
            }
            Self::Union(items) => {
                let items: Vec<CharChecker> = Self::union(items.iter().map(Self::optimize))
                    .into_items()
                    .into_iter()
                    .unique()
                    .collect();
                if items.len() == 1 {
                    return items.into_iter().next().unwrap_or_else(|| Self::Union(vec![]));
                }
                if items.len() > 1 && items.iter().all(Self::is_plain_members) {
                    let members: String = items.iter().flat_map(Self::plain_members).collect();
                    return Self::set(&members).optimize();
                }
                Self::Union(items)
            }
            Self::Intersect(items) => {
                let items: Vec<CharChecker> = Self::intersect(items.iter().map(Self::optimize))
                    .into_items()
                    .into_iter()
                    .unique()
                    .collect();
                if items.len() == 1 {
                    return items
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| Self::Intersect(vec![]));
                }
                Self::Intersect(items)
            }
            Self::Not(inner) => Self::not(inner.optimize()),
            other => other.clone(),
        }
    }

    fn into_items(self) -> Vec<CharChecker> {
        match self {
            Self::Union(items) | Self::Intersect(items) => items,
            other => vec![other],
        }
    }

    fn is_plain_members(&self) -> bool {
        matches!(self, Self::Single(_) | Self::Set(_))
    }

    fn plain_members(&self) -> Vec<char> {
        match self {
            Self::Single(c) => vec![*c],
            Self::Set(members) => members.chars().collect(),
            _ => vec![],
        }
    }

    /// Render as it would appear between `[` and `]`.
    fn fmt_item(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(c) => write!(f, "{}", escape_char(*c, true)),
            Self::Range(lo, hi) => {
                write!(f, "{}-{}", escape_char(*lo, true), escape_char(*hi, true))
            }
            Self::Set(members) => {
                for c in members.chars() {
                    write!(f, "{}", escape_char(c, true))?;
                }
                Ok(())
            }
            Self::Class(name) => write!(f, "\\p{{{name}}}"),
            Self::Union(items) => {
                for item in items {
                    item.fmt_item(f)?;
                }
                Ok(())
            }
            Self::Intersect(_) | Self::Not(_) => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for CharChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(c) => write!(f, "{}", escape_char(*c, false)),
            Self::Class(name) => write!(f, "\\p{{{name}}}"),
            Self::Intersect(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "&&")?;
                    }
                    item.fmt_item(f)?;
                }
                write!(f, "]")
            }
            Self::Not(inner) => {
                write!(f, "[^")?;
                inner.fmt_item(f)?;
                write!(f, "]")
            }
            other => {
                write!(f, "[")?;
                other.fmt_item(f)?;
                write!(f, "]")
            }
        }
    }
}

/// Source of named character classes (`\p{name}`, `\d`, ...).
pub trait CharClassProvider: fmt::Debug + Send + Sync {
    /// `None` when the class is unknown.
    fn contains(&self, class: &str, ch: char) -> Option<bool>;

    fn has_class(&self, class: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassKind {
    Digit,
    Alpha,
    Alnum,
    Upper,
    Lower,
    Whitespace,
    Word,
    Punct,
    Print,
    HexDigit,
    Ascii,
    Any,
}

/// Class names understood by [`StandardClasses`]. Aliases share a kind.
static CLASS_NAMES: Map<&'static str, ClassKind> = phf_map! {
    "digit" => ClassKind::Digit,
    "alpha" => ClassKind::Alpha,
    "alphabet" => ClassKind::Alpha,
    "alnum" => ClassKind::Alnum,
    "upper" => ClassKind::Upper,
    "lower" => ClassKind::Lower,
    "space" => ClassKind::Whitespace,
    "whitespace" => ClassKind::Whitespace,
    "word" => ClassKind::Word,
    "punct" => ClassKind::Punct,
    "print" => ClassKind::Print,
    "hexdigit" => ClassKind::HexDigit,
    "ascii" => ClassKind::Ascii,
    "any" => ClassKind::Any,
};

/// Default class provider backed by the standard library's `char` predicates.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardClasses;

impl CharClassProvider for StandardClasses {
    fn contains(&self, class: &str, ch: char) -> Option<bool> {
        let kind = CLASS_NAMES.get(class)?;
        Some(match kind {
            ClassKind::Digit => ch.is_ascii_digit(),
            ClassKind::Alpha => ch.is_alphabetic(),
            ClassKind::Alnum => ch.is_alphanumeric(),
            ClassKind::Upper => ch.is_uppercase(),
            ClassKind::Lower => ch.is_lowercase(),
            ClassKind::Whitespace => ch.is_whitespace(),
            ClassKind::Word => ch.is_alphanumeric() || ch == '_',
            ClassKind::Punct => ch.is_ascii_punctuation(),
            ClassKind::Print => ('\x20'..='\x7e').contains(&ch),
            ClassKind::HexDigit => ch.is_ascii_hexdigit(),
            ClassKind::Ascii => ch.is_ascii(),
            ClassKind::Any => true,
        })
    }

    fn has_class(&self, class: &str) -> bool {
        CLASS_NAMES.contains_key(class)
    }
}
