//! Snapshot-based backtracking matcher.
//!
//! The engine keeps one [`Session`] per grammar being walked. Leaf checkers
//! match in one step; a grammar that can yield more than one outcome opens a
//! nested session so later failures can backtrack into it. Before every
//! choice the engine can revisit it pushes a [`Snapshot`] of the whole session
//! stack; a failure pops snapshots until one offers an unexplored option.
//!
//! Grammars whose outcome is fixed for a given offset run as independent
//! sub-parses instead, which keeps the snapshot stack short.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use crate::checker::{Alternative, Checker};
use crate::error::{ParseError, Unmatched};
use crate::grammar::{Entry, Grammar, Target};
use crate::quantifier::Greediness;
use crate::tree::{MatchNode, NodeList, NodeRef};
use crate::types::{Host, ParserType, Scope, TypeRegistry};

/// Whether trailing input is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Prefix,
    Whole,
}

/// Run `grammar` from `start`; returns the end offset and top-level nodes.
pub(crate) fn parse(
    grammar: &Grammar,
    text: &[char],
    start: usize,
    mode: Mode,
    registry: &TypeRegistry,
) -> Result<(usize, Vec<MatchNode>), ParseError> {
    let mut engine = Engine::new(GrammarRef::Borrowed(grammar), text, start, registry, Vec::new());
    match engine.run(mode)? {
        Some(result) => Ok(result),
        None => Err(ParseError::Unmatched(engine.failure.unwrap_or_else(|| Unmatched {
            offset: start,
            expected: grammar.to_string(),
            repeats: 0,
        }))),
    }
}

/// Length of the first prefix parse at `offset`, for grammars used as checkers.
pub(crate) fn parse_prefix(
    grammar: &Grammar,
    text: &[char],
    offset: usize,
    registry: &TypeRegistry,
) -> Option<usize> {
    parse(grammar, text, offset, Mode::Prefix, registry)
        .ok()
        .map(|(end, _)| end - offset)
}

/// True when `grammar` consumes all of `text`.
pub(crate) fn matches_whole(grammar: &Grammar, text: &[char], registry: &TypeRegistry) -> bool {
    parse(grammar, text, 0, Mode::Whole, registry).is_ok()
}

#[derive(Debug, Clone)]
enum GrammarRef<'a> {
    Borrowed(&'a Grammar),
    Shared(Arc<Grammar>),
}

impl Deref for GrammarRef<'_> {
    type Target = Grammar;

    fn deref(&self) -> &Grammar {
        match self {
            Self::Borrowed(g) => g,
            Self::Shared(g) => g,
        }
    }
}

/// A type in use by an entry, with its parameter.
#[derive(Debug, Clone)]
struct TypeUse {
    ty: Arc<dyn ParserType>,
    param: Option<String>,
}

#[derive(Debug, Clone)]
struct Session<'a> {
    grammar: GrammarRef<'a>,
    index: usize,
    repeats: usize,
    /// Offset the session was opened at.
    start: usize,
    nodes: NodeList,
    /// Snapshot pushed when this session was opened for a parent entry.
    barrier: Option<usize>,
    /// Type whose checker opened this session.
    ty: Option<TypeUse>,
}

impl<'a> Session<'a> {
    fn new(grammar: GrammarRef<'a>, start: usize) -> Self {
        Self {
            grammar,
            index: 0,
            repeats: 0,
            start,
            nodes: NodeList::default(),
            barrier: None,
            ty: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    /// Resume as if the attempt made here had failed.
    Failed,
    /// Resume by forcing one more repeat of a lazy entry.
    Repeat,
    /// Nothing left to try here.
    Exhausted,
}

#[derive(Debug)]
struct Snapshot<'a> {
    sessions: Vec<Session<'a>>,
    offset: usize,
    forced: bool,
    action: Action,
}

/// Result of one attempt at the current entry.
enum Attempt<'a> {
    /// Consumed `len` chars and produced `nodes`.
    Matched { len: usize, nodes: Vec<MatchNode> },
    /// Needs a nested session over this grammar.
    Open { grammar: GrammarRef<'a>, ty: Option<TypeUse> },
    Failed { expected: String },
}

/// Where an entry's children came from; only grammar-built children are
/// spliced into an unnamed parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Leaf,
    Grammar,
}

type CacheKey = (String, Option<String>);

struct Engine<'a> {
    text: &'a [char],
    registry: &'a TypeRegistry,
    /// Node lists of enclosing engines, outermost first.
    outer: Vec<Scope<'a>>,
    sessions: Vec<Session<'a>>,
    snapshots: Vec<Snapshot<'a>>,
    offset: usize,
    /// The current entry must take one more repeat or fail.
    forced: bool,
    failure: Option<Unmatched>,
    cache: HashMap<CacheKey, Arc<Checker>>,
}

impl<'a> Engine<'a> {
    fn new(
        grammar: GrammarRef<'a>,
        text: &'a [char],
        start: usize,
        registry: &'a TypeRegistry,
        outer: Vec<Scope<'a>>,
    ) -> Self {
        Self {
            text,
            registry,
            outer,
            sessions: vec![Session::new(grammar, start)],
            snapshots: Vec::new(),
            offset: start,
            forced: false,
            failure: None,
            cache: HashMap::new(),
        }
    }

    fn run(&mut self, mode: Mode) -> Result<Option<(usize, Vec<MatchNode>)>, ParseError> {
        loop {
            let Some(top) = self.sessions.last() else {
                return Ok(None);
            };
            let grammar = top.grammar.clone();
            let index = top.index;

            if index >= grammar.entries().len() {
                if self.sessions.len() == 1 {
                    if mode == Mode::Whole && self.offset != self.text.len() {
                        self.record_failure(self.offset, "end of input".to_string(), 0);
                        if !self.backtrack() {
                            return Ok(None);
                        }
                        continue;
                    }
                    let nodes = self
                        .sessions
                        .pop()
                        .map(|s| s.nodes.into_vec())
                        .unwrap_or_default();
                    return Ok(Some((self.offset, nodes)));
                }
                if !self.finish_session()? && !self.backtrack() {
                    return Ok(None);
                }
                continue;
            }

            let entry = &grammar.entries()[index];
            let quantifier = entry.quantifier;
            let repeats = self.repeats();

            if quantifier.is_zero() {
                self.advance();
                continue;
            }
            if !self.forced {
                if quantifier.is_full(repeats) {
                    self.advance();
                    continue;
                }
                if quantifier.greediness == Greediness::Minimum && repeats >= quantifier.lower {
                    self.push_snapshot(Action::Repeat);
                    self.advance();
                    continue;
                }
            }

            match self.attempt(entry)? {
                Attempt::Matched { len, nodes } => {
                    if quantifier.greediness == Greediness::Maximum
                        && repeats >= quantifier.lower
                        && !self.forced
                    {
                        self.push_snapshot(Action::Failed);
                    }
                    self.accept(len, nodes);
                }
                Attempt::Open { grammar, ty } => {
                    let barrier = self.push_snapshot(Action::Failed);
                    let mut session = Session::new(grammar, self.offset);
                    session.barrier = Some(barrier);
                    session.ty = ty;
                    self.sessions.push(session);
                    self.forced = false;
                }
                Attempt::Failed { expected } => {
                    if self.forced || repeats < quantifier.lower {
                        self.record_failure(self.offset, expected, repeats);
                        if !self.backtrack() {
                            return Ok(None);
                        }
                    } else {
                        self.advance();
                    }
                }
            }
        }
    }

    fn repeats(&self) -> usize {
        self.sessions.last().map_or(0, |s| s.repeats)
    }

    fn advance(&mut self) {
        if let Some(top) = self.sessions.last_mut() {
            top.index += 1;
            top.repeats = 0;
        }
        self.forced = false;
    }

    /// Record one repeat of the current entry.
    fn accept(&mut self, len: usize, nodes: Vec<MatchNode>) {
        self.offset += len;
        self.forced = false;
        if let Some(top) = self.sessions.last_mut() {
            top.nodes.extend(nodes);
            top.repeats += 1;
        }
        if len == 0 {
            // Another empty repeat would change nothing.
            self.advance();
        }
    }

    fn push_snapshot(&mut self, action: Action) -> usize {
        self.snapshots.push(Snapshot {
            sessions: self.sessions.clone(),
            offset: self.offset,
            forced: self.forced,
            action,
        });
        self.snapshots.len() - 1
    }

    /// Pop snapshots until one leaves something to try. False when none does.
    fn backtrack(&mut self) -> bool {
        while let Some(snapshot) = self.snapshots.pop() {
            if snapshot.action == Action::Exhausted {
                continue;
            }
            self.sessions = snapshot.sessions;
            self.offset = snapshot.offset;
            self.forced = snapshot.forced;
            match snapshot.action {
                Action::Repeat => {
                    self.forced = true;
                    return true;
                }
                Action::Failed => {
                    let Some(top) = self.sessions.last() else {
                        continue;
                    };
                    let lower = top.grammar.entries()[top.index].quantifier.lower;
                    if self.forced || top.repeats < lower {
                        continue;
                    }
                    self.advance();
                    return true;
                }
                Action::Exhausted => {}
            }
        }
        false
    }

    /// Longest offset wins; on a tie the first failure stays.
    fn record_failure(&mut self, offset: usize, expected: String, repeats: usize) {
        self.merge_failure(Some(Unmatched {
            offset,
            expected,
            repeats,
        }));
    }

    fn merge_failure(&mut self, failure: Option<Unmatched>) {
        let Some(failure) = failure else { return };
        if self.failure.as_ref().is_none_or(|f| failure.offset > f.offset) {
            self.failure = Some(failure);
        }
    }

    /// Pop a completed nested session and record it as one repeat of the
    /// parent entry. False when the parent entry rejects the match.
    fn finish_session(&mut self) -> Result<bool, ParseError> {
        let Some(finished) = self.sessions.pop() else {
            return Ok(false);
        };
        let parent = self.sessions.last().map(|p| (p.grammar.clone(), p.index));
        let Some((grammar, index)) = parent else {
            return Ok(false);
        };
        let entry = &grammar.entries()[index];
        if entry.quantifier.greediness == Greediness::Possessive {
            if let Some(snapshot) = finished.barrier.and_then(|b| self.snapshots.get_mut(b)) {
                snapshot.action = Action::Exhausted;
            }
        }
        let start = finished.start;
        let end = self.offset;
        let children = finished.nodes.into_vec();
        match self.complete(entry, start, end, children, Origin::Grammar, finished.ty.as_ref())? {
            Some(nodes) => {
                self.offset = start;
                self.accept(end - start, nodes);
                Ok(true)
            }
            None => {
                let repeats = self.repeats();
                self.record_failure(start, entry.to_string(), repeats);
                Ok(false)
            }
        }
    }

    /// Try the current entry once at the current offset.
    fn attempt(&mut self, entry: &Entry) -> Result<Attempt<'a>, ParseError> {
        match &entry.target {
            Target::Checker(checker) => self.attempt_checker(entry, checker, None),
            Target::TypeRef(r) => {
                let ty = self
                    .registry
                    .lookup(&r.name)
                    .map_err(|_| ParseError::UnknownType {
                        name: r.name.clone(),
                        offset: self.offset,
                    })?
                    .clone();
                self.attempt_type(entry, ty, r.param.clone())
            }
            Target::Type(ty) => self.attempt_type(entry, ty.clone(), None),
        }
    }

    fn attempt_type(
        &mut self,
        entry: &Entry,
        ty: Arc<dyn ParserType>,
        param: Option<String>,
    ) -> Result<Attempt<'a>, ParseError> {
        let key = (ty.name().to_string(), param.clone());
        let cached = if ty.depends_on_host() {
            None
        } else {
            self.cache.get(&key).cloned()
        };
        let checker = match cached {
            Some(checker) => checker,
            None => {
                let host = host_view(self.text, self.offset, &self.outer, &self.sessions);
                let checker = ty.checker(&host, param.as_deref(), self.registry)?;
                if !ty.depends_on_host() {
                    self.cache.insert(key, checker.clone());
                }
                checker
            }
        };
        self.attempt_checker(entry, &checker, Some(TypeUse { ty, param }))
    }

    fn attempt_checker(
        &mut self,
        entry: &Entry,
        checker: &Checker,
        ty: Option<TypeUse>,
    ) -> Result<Attempt<'a>, ParseError> {
        let start = self.offset;
        let matched = match checker {
            Checker::Grammar(g) if g.is_deterministic() != Some(true) => {
                return Ok(Attempt::Open {
                    grammar: GrammarRef::Shared(g.clone()),
                    ty,
                });
            }
            Checker::Grammar(g) => self
                .sub_parse(g, self.text, start, Mode::Prefix)?
                .map(|(end, nodes)| (end, nodes, Origin::Grammar)),
            Checker::Alternative(a) => self.attempt_alternative(a, start)?,
            Checker::Fixed(f) => f.region_spans(self.text, start, self.registry).map(|spans| {
                let end = spans.last().map_or(start, |&(_, end)| end);
                let regions = f
                    .regions()
                    .iter()
                    .zip(spans)
                    .map(|(region, (s, e))| {
                        let mut node = MatchNode::leaf(s, e);
                        node.name = Some(region.name.clone());
                        node
                    })
                    .collect();
                (end, regions, Origin::Leaf)
            }),
            other => other
                .match_at(self.text, start, self.registry)
                .map(|len| (start + len, Vec::new(), Origin::Leaf)),
        };
        let Some((end, children, origin)) = matched else {
            return Ok(Attempt::Failed {
                expected: entry.target.to_string(),
            });
        };
        match self.complete(entry, start, end, children, origin, ty.as_ref())? {
            Some(nodes) => Ok(Attempt::Matched {
                len: end - start,
                nodes,
            }),
            None => Ok(Attempt::Failed {
                expected: entry.target.to_string(),
            }),
        }
    }

    /// Evaluate an alternative here so grammar choices keep their nodes.
    fn attempt_alternative(
        &mut self,
        alternative: &Alternative,
        start: usize,
    ) -> Result<Option<(usize, Vec<MatchNode>, Origin)>, ParseError> {
        let mut error = None;
        let mut built: HashMap<usize, Vec<MatchNode>> = HashMap::new();
        let picked = alternative.pick(|index, choice| {
            if error.is_some() {
                return None;
            }
            match self.attempt_choice(choice, start) {
                Ok(Some((len, nodes))) => {
                    if let Some(nodes) = nodes {
                        built.insert(index, nodes);
                    }
                    Some(len)
                }
                Ok(None) => None,
                Err(e) => {
                    error = Some(e);
                    None
                }
            }
        });
        if let Some(e) = error {
            return Err(e);
        }
        if let Some((index, len)) = picked {
            return Ok(Some(match built.remove(&index) {
                Some(nodes) => (start + len, nodes, Origin::Grammar),
                None => (start + len, Vec::new(), Origin::Leaf),
            }));
        }
        let Some(default) = alternative.default_choice() else {
            return Ok(None);
        };
        Ok(self.attempt_choice(default, start)?.map(|(len, nodes)| match nodes {
            Some(nodes) => (start + len, nodes, Origin::Grammar),
            None => (start + len, Vec::new(), Origin::Leaf),
        }))
    }

    /// One alternative choice; grammar choices also return their nodes.
    fn attempt_choice(
        &mut self,
        choice: &Checker,
        start: usize,
    ) -> Result<Option<(usize, Option<Vec<MatchNode>>)>, ParseError> {
        match choice {
            Checker::Grammar(g) => Ok(self
                .sub_parse(g, self.text, start, Mode::Prefix)?
                .map(|(end, nodes)| (end - start, Some(nodes)))),
            Checker::Alternative(a) => Ok(self
                .attempt_alternative(a, start)?
                .map(|(end, nodes, origin)| {
                    (end - start, (origin == Origin::Grammar).then_some(nodes))
                })),
            other => Ok(other.match_at(self.text, start, self.registry).map(|len| (len, None))),
        }
    }

    /// Run `grammar` as an independent parse that can see this engine's
    /// captures. `text` may be cut short to bound the parse.
    fn sub_parse(
        &mut self,
        grammar: &Grammar,
        text: &[char],
        start: usize,
        mode: Mode,
    ) -> Result<Option<(usize, Vec<MatchNode>)>, ParseError> {
        let (result, failure) = {
            let mut outer = self.outer.clone();
            outer.extend(self.sessions.iter().map(|s| Scope::List(&s.nodes)));
            let grammar = GrammarRef::Borrowed(grammar);
            let mut sub = Engine::new(grammar, text, start, self.registry, outer);
            let result = sub.run(mode);
            (result, sub.failure)
        };
        self.merge_failure(failure);
        result
    }

    /// Validate one match of `entry` and shape its nodes. `None` when the
    /// entry's type or secondary grammar rejects the span.
    fn complete(
        &mut self,
        entry: &Entry,
        start: usize,
        end: usize,
        mut children: Vec<MatchNode>,
        mut origin: Origin,
        ty: Option<&TypeUse>,
    ) -> Result<Option<Vec<MatchNode>>, ParseError> {
        if let Some(secondary) = &entry.secondary {
            let text = self.text;
            let bounded = &text[..end];
            match self.sub_parse(secondary, bounded, start, Mode::Whole)? {
                Some((_, nodes)) => {
                    children = nodes;
                    origin = Origin::Grammar;
                }
                None => return Ok(None),
            }
        }

        let Some(ty) = ty else {
            return Ok(Some(match &entry.name {
                Some(name) => {
                    let mut node = MatchNode::leaf(start, end);
                    node.name = Some(name.clone());
                    if !entry.flat {
                        node.children = children;
                    }
                    vec![node]
                }
                None if origin == Origin::Grammar => children,
                None => {
                    let mut node = MatchNode::leaf(start, end);
                    node.children = children;
                    vec![node]
                }
            }));
        };

        let mut node = MatchNode::leaf(start, end);
        node.name = entry.name.clone();
        node.type_name = Some(ty.ty.name().to_string());
        node.param = ty.param.clone();
        node.children = children;
        let host = host_view(self.text, start, &self.outer, &self.sessions);
        let this = NodeRef::new(self.text, &node, 0);
        if !ty.ty.is_valid(&host, this, ty.param.as_deref(), self.registry) {
            return Ok(None);
        }
        if entry.flat {
            node.children.clear();
        }
        Ok(Some(vec![node]))
    }
}

fn host_view<'h>(
    text: &'h [char],
    offset: usize,
    outer: &[Scope<'h>],
    sessions: &'h [Session<'_>],
) -> Host<'h> {
    let mut scopes = outer.to_vec();
    scopes.extend(sessions.iter().map(|s| Scope::List(&s.nodes)));
    Host::with_scopes(text, offset, scopes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::checker::CharChecker;
    use crate::quantifier::Quantifier;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn run(grammar: &Grammar, s: &str, mode: Mode) -> Result<(usize, Vec<MatchNode>), ParseError> {
        parse(grammar, &chars(s), 0, mode, &TypeRegistry::default())
    }

    fn set(s: &str) -> Checker {
        Checker::Char(CharChecker::set(s))
    }

    fn entry(c: Checker, q: Quantifier) -> Entry {
        Entry::checker(c).quantified(q)
    }

    #[test]
    fn possessive_never_gives_back() {
        let g = Grammar::new(vec![
            entry(set("a"), Quantifier::ONE_OR_MORE),
            Entry::checker(Checker::single('a')),
        ]);
        assert!(run(&g, "aaa", Mode::Prefix).is_err());
    }

    #[test]
    fn maximum_gives_back_one_at_a_time() {
        let max = Quantifier::ONE_OR_MORE.with_greediness(Greediness::Maximum);
        let g = Grammar::new(vec![
            entry(set("a"), max).named("run"),
            Entry::checker(Checker::word("aa").unwrap()),
        ]);
        let (end, nodes) = run(&g, "aaaa", Mode::Prefix).unwrap();
        assert_eq!(end, 4);
        // Two repeats of the named entry, then the word.
        assert_eq!(nodes.iter().filter(|n| n.name.is_some()).count(), 2);
    }

    #[test]
    fn snapshots_share_gathered_nodes() {
        let max = Quantifier::new(0, None).with_greediness(Greediness::Maximum);
        let g = Grammar::new(vec![
            entry(set("ab"), max),
            Entry::checker(Checker::single('b')),
        ]);
        let n = 2_000;
        let text = chars(&format!("{}b", "a".repeat(n)));
        let registry = TypeRegistry::default();
        let mut engine = Engine::new(GrammarRef::Borrowed(&g), &text, 0, &registry, Vec::new());
        let (end, nodes) = engine.run(Mode::Whole).unwrap().unwrap();
        assert_eq!(end, n + 1);
        assert_eq!(nodes.len(), n + 1);
        assert!(engine.snapshots.len() >= n);

        // One link per consumed repeat, however many snapshots were taken.
        let links: HashSet<usize> = engine
            .snapshots
            .iter()
            .flat_map(|s| &s.sessions)
            .flat_map(|s| s.nodes.link_addrs())
            .collect();
        assert!(links.len() <= n + 1, "{} links", links.len());
    }

    #[test]
    fn minimum_takes_as_few_as_possible() {
        let min = Quantifier::new(1, None).with_greediness(Greediness::Minimum);
        let g = Grammar::new(vec![entry(set("a"), min), Entry::checker(set("ab"))]);
        let (end, _) = run(&g, "aaab", Mode::Prefix).unwrap();
        assert_eq!(end, 2);
        let (end, _) = run(&g, "aaab", Mode::Whole).unwrap();
        assert_eq!(end, 4);
    }

    #[test]
    fn zero_quantifier_is_skipped() {
        let g = Grammar::new(vec![
            entry(set("a"), Quantifier::ZERO),
            Entry::checker(set("a")),
        ]);
        assert_eq!(run(&g, "a", Mode::Whole).unwrap().0, 1);
    }

    #[test]
    fn nested_session_backtracks_into_inner_choice() {
        let max = Quantifier::ZERO_OR_MORE.with_greediness(Greediness::Maximum);
        let inner = Grammar::new(vec![entry(set("ab"), max)]);
        let g = Grammar::new(vec![
            Entry::checker(Checker::grammar(inner)).named("head"),
            Entry::checker(Checker::single('b')),
        ]);
        let (end, nodes) = run(&g, "abab", Mode::Whole).unwrap();
        assert_eq!(end, 4);
        assert_eq!((nodes[0].start, nodes[0].end), (0, 3));
    }

    #[test]
    fn failure_reports_furthest_offset() {
        let g = Grammar::new(vec![
            Entry::checker(Checker::word("ab").unwrap()),
            Entry::checker(Checker::word("cd").unwrap()),
        ]);
        let err = run(&g, "abce", Mode::Prefix).unwrap_err();
        let u = err.unmatched().unwrap();
        assert_eq!(u.offset, 2);
        assert_eq!(u.expected, "\"cd\"");
    }

    #[test]
    fn whole_mode_reports_trailing_input() {
        let g = Grammar::new(vec![Entry::checker(Checker::word("ab").unwrap())]);
        let err = run(&g, "abc", Mode::Whole).unwrap_err();
        assert_eq!(err.unmatched().unwrap().offset, 2);
    }

    #[test]
    fn unknown_type_is_an_error() {
        let g = Grammar::new(vec![Entry::type_ref("nope", None)]);
        assert_eq!(
            run(&g, "x", Mode::Prefix),
            Err(ParseError::UnknownType {
                name: "nope".into(),
                offset: 0
            })
        );
    }

    #[test]
    fn unnamed_grammar_children_are_spliced() {
        let inner = Grammar::new(vec![Entry::checker(set("a")).named("x")]);
        let g = Grammar::new(vec![Entry::checker(Checker::grammar(inner))]);
        let (_, nodes) = run(&g, "a", Mode::Whole).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name.as_deref(), Some("x"));
    }

    #[test]
    fn flat_entries_drop_children() {
        let inner = Grammar::new(vec![Entry::checker(set("a")).named("x")]);
        let g = Grammar::new(vec![Entry::checker(Checker::grammar(inner)).flat_named("f")]);
        let (_, nodes) = run(&g, "a", Mode::Whole).unwrap();
        assert!(nodes[0].children.is_empty());
    }

    #[test]
    fn fixed_regions_become_children() {
        use crate::checker::{Fixed, Region};
        let f = Fixed::new(vec![Region::new("id", 2), Region::unbounded("rest")]).unwrap();
        let g = Grammar::new(vec![Entry::checker(Checker::Fixed(f)).named("rec")]);
        let (_, nodes) = run(&g, "01abc", Mode::Whole).unwrap();
        let regions: Vec<_> = nodes[0]
            .children
            .iter()
            .map(|n| (n.name.clone().unwrap(), n.start, n.end))
            .collect();
        assert_eq!(regions, vec![("id".into(), 0, 2), ("rest".into(), 2, 5)]);
    }

    #[test]
    fn secondary_grammar_must_consume_span() {
        let digits = Grammar::new(vec![
            entry(set("0123456789"), Quantifier::ONE_OR_MORE).named("n"),
        ]);
        let g = Grammar::new(vec![
            entry(Checker::Char(CharChecker::class("alnum")), Quantifier::ONE_OR_MORE)
                .named("word")
                .with_secondary(digits),
        ]);
        let (_, nodes) = run(&g, "123", Mode::Whole).unwrap();
        assert_eq!(nodes[0].children[0].name.as_deref(), Some("n"));
        assert!(run(&g, "12a", Mode::Whole).is_err());
    }
}
