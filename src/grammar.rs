//! Compiled grammars: ordered sequences of quantified entries.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use itertools::Itertools;

use crate::checker::{Checker, all_deterministic};
use crate::compiler;
use crate::engine::{self, Mode};
use crate::error::{GrammarError, ParseError, Unmatched};
use crate::quantifier::Quantifier;
use crate::tree::MatchTree;
use crate::types::{ParserType, TypeRegistry};

/// A reference to a registry type by name, resolved at match time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub name: String,
    pub param: Option<String>,
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(f, "!{}({param})!", self.name),
            None => write!(f, "!{}!", self.name),
        }
    }
}

/// What an entry matches with.
#[derive(Debug, Clone)]
pub enum Target {
    Checker(Checker),
    TypeRef(TypeRef),
    /// A type held directly rather than looked up in the registry.
    Type(Arc<dyn ParserType>),
}

impl Target {
    pub fn is_deterministic(&self) -> Option<bool> {
        match self {
            Self::Checker(c) => c.is_deterministic(),
            Self::TypeRef(_) | Self::Type(_) => None,
        }
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Checker(a), Self::Checker(b)) => a == b,
            (Self::TypeRef(a), Self::TypeRef(b)) => a == b,
            (Self::Type(a), Self::Type(b)) => a.name() == b.name(),
            _ => false,
        }
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Checker(c) => c.hash(state),
            Self::TypeRef(r) => r.hash(state),
            Self::Type(t) => t.name().hash(state),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checker(c) => write!(f, "{c}"),
            Self::TypeRef(r) => write!(f, "{r}"),
            Self::Type(t) => write!(f, "!{}!", t.name()),
        }
    }
}

/// One quantified position of a grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    pub name: Option<String>,
    /// Named node keeps no children (`($name: ...)`).
    pub flat: bool,
    pub target: Target,
    pub quantifier: Quantifier,
    /// Re-parses the span this entry matched; must consume all of it.
    pub secondary: Option<Arc<Grammar>>,
}

impl Entry {
    fn new(target: Target) -> Self {
        Self {
            name: None,
            flat: false,
            target,
            quantifier: Quantifier::ONE,
            secondary: None,
        }
    }

    pub fn checker(checker: Checker) -> Self {
        Self::new(Target::Checker(checker))
    }

    pub fn type_ref(name: impl Into<String>, param: Option<String>) -> Self {
        Self::new(Target::TypeRef(TypeRef {
            name: name.into(),
            param,
        }))
    }

    pub fn typed(ty: Arc<dyn ParserType>) -> Self {
        Self::new(Target::Type(ty))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self.flat = false;
        self
    }

    pub fn flat_named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self.flat = true;
        self
    }

    pub fn quantified(mut self, quantifier: Quantifier) -> Self {
        self.quantifier = quantifier;
        self
    }

    pub fn with_secondary(mut self, grammar: Grammar) -> Self {
        self.secondary = Some(Arc::new(grammar));
        self
    }

    pub fn is_deterministic(&self) -> Option<bool> {
        if !self.quantifier.is_deterministic() {
            return Some(false);
        }
        all_deterministic(
            std::iter::once(self.target.is_deterministic())
                .chain(self.secondary.as_ref().map(|g| g.is_deterministic())),
        )
    }

    fn optimize(&self) -> Entry {
        Entry {
            target: match &self.target {
                Target::Checker(c) => Target::Checker(c.optimize()),
                other => other.clone(),
            },
            secondary: self.secondary.as_ref().map(|g| Arc::new(g.optimize())),
            ..self.clone()
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wrapped = self.name.is_some() || self.secondary.is_some();
        if wrapped {
            write!(f, "(")?;
            if let Some(name) = &self.name {
                let sigil = if self.flat { '$' } else { '#' };
                write!(f, "{sigil}{name}: ")?;
            }
            match &self.target {
                Target::Checker(Checker::Grammar(g)) => write!(f, "{g}")?,
                other => write!(f, "{other}")?,
            }
            if let Some(second) = &self.secondary {
                write!(f, " ~ {second}")?;
            }
            write!(f, ")")?;
        } else {
            write!(f, "{}", self.target)?;
        }
        write!(f, "{}", self.quantifier)
    }
}

/// An ordered sequence of entries.
///
/// Grammars are immutable once built and can be shared between threads and
/// between any number of concurrent parses.
#[derive(Debug, Clone)]
pub struct Grammar {
    entries: Vec<Entry>,
    deterministic: Option<bool>,
}

impl Grammar {
    pub fn new(entries: Vec<Entry>) -> Self {
        let deterministic = all_deterministic(
            entries
                .iter()
                .filter(|e| !e.quantifier.is_zero())
                .map(Entry::is_deterministic),
        );
        Self {
            entries,
            deterministic,
        }
    }

    /// Compile pattern text against the built-in types.
    pub fn compile(pattern: &str) -> Result<Self, GrammarError> {
        compiler::compile(pattern)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_deterministic(&self) -> Option<bool> {
        self.deterministic
    }

    pub fn optimize(&self) -> Grammar {
        Grammar::new(self.entries.iter().map(Entry::optimize).collect())
    }

    /// Match a prefix of `text`; trailing input is allowed.
    pub fn parse(&self, text: &str) -> Result<MatchTree, ParseError> {
        self.parse_with(text, TypeRegistry::standard())
    }

    pub fn parse_with(&self, text: &str, registry: &TypeRegistry) -> Result<MatchTree, ParseError> {
        self.run(text, 0, Mode::Prefix, registry)
    }

    /// Match all of `text`.
    pub fn match_text(&self, text: &str) -> Result<MatchTree, ParseError> {
        self.match_text_with(text, TypeRegistry::standard())
    }

    pub fn match_text_with(
        &self,
        text: &str,
        registry: &TypeRegistry,
    ) -> Result<MatchTree, ParseError> {
        self.run(text, 0, Mode::Whole, registry)
    }

    /// First prefix match at any start offset, scanning left to right.
    pub fn find(&self, text: &str) -> Result<MatchTree, ParseError> {
        self.find_with(text, TypeRegistry::standard())
    }

    pub fn find_with(&self, text: &str, registry: &TypeRegistry) -> Result<MatchTree, ParseError> {
        let chars: Arc<[char]> = text.chars().collect();
        let mut furthest: Option<Unmatched> = None;
        for start in 0..=chars.len() {
            match engine::parse(self, &chars, start, Mode::Prefix, registry) {
                Ok((end, nodes)) => return Ok(MatchTree::new(chars, start, end, nodes)),
                Err(ParseError::Unmatched(u)) => {
                    if furthest.as_ref().is_none_or(|f| u.offset > f.offset) {
                        furthest = Some(u);
                    }
                }
                Err(other) => return Err(other),
            }
        }
        Err(ParseError::Unmatched(furthest.unwrap_or_else(|| Unmatched {
            offset: 0,
            expected: self.to_string(),
            repeats: 0,
        })))
    }

    fn run(
        &self,
        text: &str,
        start: usize,
        mode: Mode,
        registry: &TypeRegistry,
    ) -> Result<MatchTree, ParseError> {
        let chars: Arc<[char]> = text.chars().collect();
        let (end, nodes) = engine::parse(self, &chars, start, mode, registry)?;
        Ok(MatchTree::new(chars, start, end, nodes))
    }
}

impl PartialEq for Grammar {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Grammar {}

impl Hash for Grammar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entries.hash(state);
    }
}

impl FromStr for Grammar {
    type Err = GrammarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        compiler::compile(s)
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entries.iter().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::CharChecker;
    use crate::quantifier::Greediness;

    fn word(s: &str) -> Entry {
        Entry::checker(Checker::word(s).unwrap())
    }

    #[test]
    fn determinism_follows_quantifiers_and_targets() {
        let g = Grammar::new(vec![word("a"), word("b").quantified(Quantifier::ZERO_OR_MORE)]);
        assert_eq!(g.is_deterministic(), Some(true));

        let lazy = Quantifier::ZERO_OR_MORE.with_greediness(Greediness::Minimum);
        let g = Grammar::new(vec![word("a").quantified(lazy)]);
        assert_eq!(g.is_deterministic(), Some(false));

        let g = Grammar::new(vec![Entry::type_ref("identifier", None)]);
        assert_eq!(g.is_deterministic(), None);
    }

    #[test]
    fn zero_entries_do_not_affect_determinism() {
        let lazy = Quantifier::ZERO.with_greediness(Greediness::Minimum);
        let g = Grammar::new(vec![word("a").quantified(lazy)]);
        assert_eq!(g.is_deterministic(), Some(true));
    }

    #[test]
    fn equality_is_structural() {
        let a = Grammar::new(vec![word("ab"), Entry::checker(CharChecker::set("xy").into())]);
        let b = Grammar::new(vec![word("ab"), Entry::checker(CharChecker::set("yx").into())]);
        assert_eq!(a, b);
    }

    #[test]
    fn parse_allows_trailing_input_and_match_does_not() {
        let g = Grammar::new(vec![word("ab")]);
        assert_eq!(g.parse("abc").unwrap().len(), 2);
        assert!(g.match_text("abc").is_err());
        assert_eq!(g.match_text("ab").unwrap().len(), 2);
    }

    #[test]
    fn find_scans_start_offsets() {
        let g = Grammar::new(vec![word("555")]);
        let tree = g.find("222A555").unwrap();
        assert_eq!((tree.start(), tree.end()), (4, 7));
        assert!(g.find("222").is_err());
    }

    #[test]
    fn display_renders_pattern_syntax() {
        let g = Grammar::new(vec![
            word("Colo"),
            word("u").quantified(Quantifier::ZERO_OR_ONE),
            word("r").named("end"),
            Entry::type_ref("textCI", Some("abc".into())).flat_named("t"),
        ]);
        assert_eq!(g.to_string(), "\"Colo\" \"u\"? (#end: \"r\") ($t: !textCI(abc)!)");
    }
}
