use std::fmt;

use itertools::Itertools;

use super::{Checker, all_deterministic};
use crate::types::TypeRegistry;

/// Longest match among `choices`, falling back to `default` when none match.
///
/// Choices are tried last-declared first and a later candidate only replaces
/// the current best when strictly longer, so on equal lengths the
/// last-declared choice wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Alternative {
    choices: Vec<Checker>,
    default: Option<Box<Checker>>,
}

impl Alternative {
    /// Alternative without a default. Nested default-less alternatives merge
    /// into this one.
    pub fn new(choices: Vec<Checker>) -> Self {
        Self {
            choices: flatten(choices),
            default: None,
        }
    }

    pub fn with_default(choices: Vec<Checker>, default: Checker) -> Self {
        Self {
            choices: flatten(choices),
            default: Some(Box::new(default)),
        }
    }

    pub fn choices(&self) -> &[Checker] {
        &self.choices
    }

    pub fn default_choice(&self) -> Option<&Checker> {
        self.default.as_deref()
    }

    /// Index into `choices` of the winning candidate, given a per-choice
    /// match function. Shared with the engine, which evaluates grammar
    /// choices itself.
    pub(crate) fn pick<F>(&self, mut attempt: F) -> Option<(usize, usize)>
    where
        F: FnMut(usize, &Checker) -> Option<usize>,
    {
        let mut best: Option<(usize, usize)> = None;
        for (index, choice) in self.choices.iter().enumerate().rev() {
            if let Some(len) = attempt(index, choice) {
                if best.is_none_or(|(_, best_len)| len > best_len) {
                    best = Some((index, len));
                }
            }
        }
        best
    }

    pub fn match_at(&self, text: &[char], offset: usize, registry: &TypeRegistry) -> Option<usize> {
        match self.pick(|_, c| c.match_at(text, offset, registry)) {
            Some((_, len)) => Some(len),
            None => self
                .default
                .as_ref()
                .and_then(|d| d.match_at(text, offset, registry)),
        }
    }

    pub fn is_deterministic(&self) -> Option<bool> {
        all_deterministic(
            self.choices
                .iter()
                .chain(self.default.as_deref())
                .map(Checker::is_deterministic),
        )
    }

    pub fn optimize(&self) -> Checker {
        let mut choices: Vec<Checker> = self.choices.iter().map(Checker::optimize).collect();
        // Keep the last copy of a duplicate so the tie-break order survives.
        choices.reverse();
        let mut choices: Vec<Checker> = choices.into_iter().unique().collect();
        choices.reverse();
        let default = self.default.as_deref().map(Checker::optimize);
        match (choices.len(), default) {
            (1, None) => choices.pop().unwrap_or_else(Checker::never),
            (0, Some(default)) => default,
            (_, None) => Checker::Alternative(Self::new(choices)),
            (_, Some(default)) => Checker::Alternative(Self::with_default(choices, default)),
        }
    }
}

fn flatten(choices: Vec<Checker>) -> Vec<Checker> {
    let mut flat = Vec::with_capacity(choices.len());
    for choice in choices {
        match choice {
            Checker::Alternative(Alternative {
                choices,
                default: None,
            }) => flat.extend(choices),
            other => flat.push(other),
        }
    }
    flat
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.choices.iter().join("|"))?;
        if let Some(default) = &self.default {
            write!(f, "||{default}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::CharChecker;

    fn word(s: &str) -> Checker {
        Checker::word(s).unwrap()
    }

    fn at(a: &Alternative, s: &str) -> Option<usize> {
        let text: Vec<char> = s.chars().collect();
        a.match_at(&text, 0, &TypeRegistry::default())
    }

    #[test]
    fn longest_choice_wins() {
        let a = Alternative::new(vec![word("AA"), word("AAA"), word("A")]);
        assert_eq!(at(&a, "AAAA"), Some(3));
        assert_eq!(at(&a, "B"), None);
    }

    #[test]
    fn last_declared_wins_ties() {
        let digit = Checker::Char(CharChecker::range('0', '9'));
        let five = Checker::single('5');
        let a = Alternative::new(vec![digit.clone(), five.clone()]);
        let (index, len) = a
            .pick(|_, c| c.match_at(&['5'], 0, &TypeRegistry::default()))
            .unwrap();
        assert_eq!((index, len), (1, 1));
    }

    #[test]
    fn default_used_only_when_nothing_matches() {
        let a = Alternative::with_default(vec![word("AA"), word("AAA")], word("AAAA"));
        assert_eq!(at(&a, "AAAA"), Some(3));
        assert_eq!(at(&a, "A"), None);
        let b = Alternative::with_default(vec![word("B")], word("A"));
        assert_eq!(at(&b, "AAAA"), Some(1));
    }

    #[test]
    fn nested_alternatives_flatten() {
        let inner = Checker::Alternative(Alternative::new(vec![word("a"), word("b")]));
        let outer = Alternative::new(vec![inner, word("c")]);
        assert_eq!(outer, Alternative::new(vec![word("a"), word("b"), word("c")]));
    }

    #[test]
    fn defaulted_alternative_does_not_flatten() {
        let inner = Checker::Alternative(Alternative::with_default(vec![word("a")], word("b")));
        let outer = Alternative::new(vec![inner.clone(), word("c")]);
        assert_eq!(outer.choices(), &[inner, word("c")]);
    }

    #[test]
    fn empty_alternative_never_matches() {
        assert_eq!(at(&Alternative::new(vec![]), "x"), None);
    }

    #[test]
    fn optimize_reduces_single_choice() {
        let a = Alternative::new(vec![word("ab"), word("ab")]);
        assert_eq!(a.optimize(), word("ab"));
    }

    #[test]
    fn display() {
        let a = Alternative::with_default(vec![word("AA"), word("AAA")], word("AAAA"));
        assert_eq!(a.to_string(), "(\"AA\"|\"AAA\"||\"AAAA\")");
    }
}
