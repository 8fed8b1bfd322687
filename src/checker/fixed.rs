use std::fmt;
use std::sync::Arc;

use super::all_deterministic;
use crate::engine;
use crate::error::CheckerError;
use crate::grammar::Grammar;
use crate::types::TypeRegistry;

/// One named region of a [`Fixed`] checker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    pub name: String,
    /// `None` for the trailing unbounded region.
    pub width: Option<usize>,
    /// Grammar that must match the region's text entirely.
    pub grammar: Option<Arc<Grammar>>,
}

impl Region {
    pub fn new(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            width: Some(width),
            grammar: None,
        }
    }

    pub fn unbounded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            width: None,
            grammar: None,
        }
    }

    pub fn with_grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = Some(Arc::new(grammar));
        self
    }
}

/// Consecutive fixed-width regions, as in column-oriented records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fixed {
    regions: Vec<Region>,
    /// Sum of the bounded widths.
    width: usize,
}

impl Fixed {
    pub fn new(regions: Vec<Region>) -> Result<Self, CheckerError> {
        if regions.is_empty() {
            return Err(CheckerError::EmptyFixed);
        }
        let last = regions.len() - 1;
        if regions[..last].iter().any(|r| r.width.is_none()) {
            return Err(CheckerError::UnboundedRegionNotLast);
        }
        // Saturates: a width past usize::MAX can never fit any text.
        let width = regions
            .iter()
            .filter_map(|r| r.width)
            .fold(0usize, usize::saturating_add);
        Ok(Self { regions, width })
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn declared_width(&self) -> usize {
        self.width
    }

    pub fn is_unbounded(&self) -> bool {
        self.regions.last().is_some_and(|r| r.width.is_none())
    }

    /// Absolute `(start, end)` of every region when all of them fit and
    /// their grammars accept their text.
    pub fn region_spans(
        &self,
        text: &[char],
        offset: usize,
        registry: &TypeRegistry,
    ) -> Option<Vec<(usize, usize)>> {
        if offset.checked_add(self.width).is_none_or(|end| end > text.len()) {
            return None;
        }
        let mut spans = Vec::with_capacity(self.regions.len());
        let mut start = offset;
        for region in &self.regions {
            let end = region.width.map_or(Some(text.len()), |w| start.checked_add(w))?;
            if let Some(grammar) = &region.grammar {
                if !engine::matches_whole(grammar, &text[start..end], registry) {
                    return None;
                }
            }
            spans.push((start, end));
            start = end;
        }
        Some(spans)
    }

    pub fn match_at(&self, text: &[char], offset: usize, registry: &TypeRegistry) -> Option<usize> {
        let spans = self.region_spans(text, offset, registry)?;
        Some(spans.last().map_or(0, |&(_, end)| end - offset))
    }

    pub fn is_deterministic(&self) -> Option<bool> {
        all_deterministic(
            self.regions
                .iter()
                .filter_map(|r| r.grammar.as_ref())
                .map(|g| g.is_deterministic()),
        )
    }

    pub fn optimize(&self) -> Fixed {
        let regions = self
            .regions
            .iter()
            .map(|r| Region {
                name: r.name.clone(),
                width: r.width,
                grammar: r.grammar.as_ref().map(|g| Arc::new(g.optimize())),
            })
            .collect();
        Self {
            regions,
            width: self.width,
        }
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<")?;
        for (i, region) in self.regions.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match region.width {
                Some(w) => write!(f, "{}:{w}", region.name)?,
                None => write!(f, "{}:*", region.name)?,
            }
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn construction_rules() {
        assert_eq!(Fixed::new(vec![]), Err(CheckerError::EmptyFixed));
        assert_eq!(
            Fixed::new(vec![Region::unbounded("a"), Region::new("b", 2)]),
            Err(CheckerError::UnboundedRegionNotLast)
        );
        let f = Fixed::new(vec![Region::new("a", 2), Region::new("b", 3)]).unwrap();
        assert_eq!(f.declared_width(), 5);
        assert!(!f.is_unbounded());
    }

    #[test]
    fn matches_declared_width() {
        let registry = TypeRegistry::default();
        let f = Fixed::new(vec![Region::new("a", 2), Region::new("b", 3)]).unwrap();
        assert_eq!(f.match_at(&chars("1234567"), 0, &registry), Some(5));
        assert_eq!(f.match_at(&chars("1234"), 0, &registry), None);
        assert_eq!(
            f.region_spans(&chars("x12345"), 1, &registry),
            Some(vec![(1, 3), (3, 6)])
        );
    }

    #[test]
    fn huge_widths_never_fit() {
        let registry = TypeRegistry::default();
        let f = Fixed::new(vec![Region::new("a", usize::MAX), Region::new("b", 2)]).unwrap();
        assert_eq!(f.declared_width(), usize::MAX);
        assert_eq!(f.match_at(&chars("abc"), 1, &registry), None);
        let f = Fixed::new(vec![Region::new("a", usize::MAX), Region::unbounded("rest")]).unwrap();
        assert_eq!(f.match_at(&chars("abc"), 2, &registry), None);
    }

    #[test]
    fn unbounded_tail_takes_the_rest() {
        let registry = TypeRegistry::default();
        let f = Fixed::new(vec![Region::new("id", 1), Region::unbounded("rest")]).unwrap();
        assert_eq!(f.match_at(&chars("abcdef"), 0, &registry), Some(6));
        assert_eq!(f.match_at(&chars("a"), 0, &registry), Some(1));
    }

    #[test]
    fn display_lists_regions() {
        let f = Fixed::new(vec![Region::new("id", 3), Region::unbounded("rest")]).unwrap();
        assert_eq!(f.to_string(), "<id:3 rest:*>");
    }
}
