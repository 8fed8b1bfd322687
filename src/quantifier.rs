//! Repeat bounds and greediness for grammar entries.

use std::fmt;

/// How the engine picks a repeat count when later entries fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Greediness {
    /// Consume as many repeats as possible and never give any back.
    #[default]
    Possessive,
    /// Consume as many repeats as possible; retry with fewer on later failure.
    Maximum,
    /// Consume as few repeats as possible; retry with more on later failure.
    Minimum,
}

/// Repeat bounds of an entry. `upper == None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quantifier {
    pub lower: usize,
    pub upper: Option<usize>,
    pub greediness: Greediness,
}

impl Default for Quantifier {
    fn default() -> Self {
        Self::ONE
    }
}

impl Quantifier {
    pub const ONE: Quantifier = Quantifier::new(1, Some(1));
    pub const ZERO: Quantifier = Quantifier::new(0, Some(0));
    pub const ZERO_OR_ONE: Quantifier = Quantifier::new(0, Some(1));
    pub const ZERO_OR_MORE: Quantifier = Quantifier::new(0, None);
    pub const ONE_OR_MORE: Quantifier = Quantifier::new(1, None);

    /// A possessive quantifier with the given bounds.
    pub const fn new(lower: usize, upper: Option<usize>) -> Self {
        Self {
            lower,
            upper,
            greediness: Greediness::Possessive,
        }
    }

    pub const fn exactly(n: usize) -> Self {
        Self::new(n, Some(n))
    }

    pub const fn with_greediness(self, greediness: Greediness) -> Self {
        Self {
            lower: self.lower,
            upper: self.upper,
            greediness,
        }
    }

    pub fn is_one(&self) -> bool {
        self.lower == 1 && self.upper == Some(1)
    }

    pub fn is_zero(&self) -> bool {
        self.lower == 0 && self.upper == Some(0)
    }

    /// True when only one repeat count is possible, so greediness is irrelevant.
    pub fn is_fixed(&self) -> bool {
        self.upper == Some(self.lower)
    }

    /// True when `repeats` has reached the upper bound.
    pub fn is_full(&self, repeats: usize) -> bool {
        self.upper.is_some_and(|upper| repeats >= upper)
    }

    /// The entry can never yield more than one outcome for a given input.
    pub fn is_deterministic(&self) -> bool {
        self.is_fixed() || self.greediness == Greediness::Possessive
    }
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lower, self.upper) {
            (1, Some(1)) => return Ok(()),
            (0, Some(0)) => write!(f, "^")?,
            (0, Some(1)) => write!(f, "?")?,
            (0, None) => write!(f, "*")?,
            (1, None) => write!(f, "+")?,
            (n, None) => write!(f, "{{{n},}}")?,
            (0, Some(m)) => write!(f, "{{,{m}}}")?,
            (n, Some(m)) if n == m => write!(f, "{{{n}}}")?,
            (n, Some(m)) => write!(f, "{{{n},{m}}}")?,
        }
        match self.greediness {
            Greediness::Possessive => Ok(()),
            Greediness::Maximum => write!(f, "+"),
            Greediness::Minimum => write!(f, "*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_pattern_syntax() {
        assert_eq!(Quantifier::ONE.to_string(), "");
        assert_eq!(Quantifier::ZERO.to_string(), "^");
        assert_eq!(Quantifier::ZERO_OR_ONE.to_string(), "?");
        assert_eq!(Quantifier::ZERO_OR_MORE.to_string(), "*");
        assert_eq!(Quantifier::ONE_OR_MORE.to_string(), "+");
        assert_eq!(Quantifier::exactly(3).to_string(), "{3}");
        assert_eq!(Quantifier::new(2, None).to_string(), "{2,}");
        assert_eq!(Quantifier::new(0, Some(4)).to_string(), "{,4}");
        assert_eq!(Quantifier::new(2, Some(4)).to_string(), "{2,4}");
        assert_eq!(
            Quantifier::ZERO_OR_MORE
                .with_greediness(Greediness::Maximum)
                .to_string(),
            "*+"
        );
        assert_eq!(
            Quantifier::ONE_OR_MORE
                .with_greediness(Greediness::Minimum)
                .to_string(),
            "+*"
        );
    }

    #[test]
    fn bounds_queries() {
        assert!(Quantifier::ONE.is_one());
        assert!(Quantifier::ZERO.is_zero());
        assert!(Quantifier::exactly(4).is_fixed());
        assert!(!Quantifier::ZERO_OR_MORE.is_full(1_000));
        assert!(Quantifier::ZERO_OR_ONE.is_full(1));
    }

    #[test]
    fn determinism_depends_on_greediness_and_bounds() {
        assert!(Quantifier::ZERO_OR_MORE.is_deterministic());
        assert!(
            !Quantifier::ZERO_OR_MORE
                .with_greediness(Greediness::Minimum)
                .is_deterministic()
        );
        assert!(
            Quantifier::exactly(2)
                .with_greediness(Greediness::Maximum)
                .is_deterministic()
        );
    }
}
