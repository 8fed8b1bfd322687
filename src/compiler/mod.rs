//! Pattern text to [`Grammar`].
//!
//! Compilation runs in two passes over the tree the pattern language
//! (`syntax`) produces for the pattern: the first reports every error node
//! (stopping at the first fatal one), the second walks the tree and builds
//! entries and checkers.

mod syntax;

use std::collections::HashMap;
use std::sync::Arc;

use phf::{Map, phf_map};

use crate::checker::{Alternative, CharChecker, Checker};
use crate::error::GrammarError;
use crate::grammar::{Entry, Grammar, Target};
use crate::quantifier::{Greediness, Quantifier};
use crate::tree::NodeRef;
use crate::types::{CompileContext, TypeRegistry};

/// Compile `pattern` against the built-in types.
pub fn compile(pattern: &str) -> Result<Grammar, GrammarError> {
    Compiler::new(TypeRegistry::standard()).compile(pattern)
}

/// Single-character escapes for control characters.
const CONTROL_ESCAPES: Map<char, char> = phf_map! {
    't' => '\t',
    'n' => '\n',
    'r' => '\r',
    'f' => '\x0c',
    'e' => '\x1b',
    'a' => '\x07',
    '0' => '\0',
};

/// Class escapes: class name and whether it is negated.
const CLASS_ESCAPES: Map<char, (&'static str, bool)> = phf_map! {
    'd' => ("digit", false),
    'D' => ("digit", true),
    'w' => ("word", false),
    'W' => ("word", true),
    's' => ("whitespace", false),
    'S' => ("whitespace", true),
};

/// Compiles patterns whose type references resolve in `registry`.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'r> {
    registry: &'r TypeRegistry,
}

/// A decoded escape.
enum Escaped {
    Char(char),
    Class(CharChecker),
}

/// What one item contributes to its sequence. Adjacent unquantified
/// literals merge into a single word.
enum Piece {
    Literal(String),
    Entry(Entry),
}

/// A compiled `body`: a plain sequence, or alternatives between sequences.
enum Body {
    Sequence(Vec<Entry>),
    Choice(Checker),
}

impl Body {
    fn into_grammar(self) -> Grammar {
        match self {
            Body::Sequence(entries) => Grammar::new(entries),
            Body::Choice(checker) => Grammar::new(vec![Entry::checker(checker)]),
        }
    }

    fn into_checker(self) -> Checker {
        match self {
            Body::Sequence(entries) => sequence_checker(entries),
            Body::Choice(checker) => checker,
        }
    }
}

/// An entry that adds nothing around its checker.
fn is_plain(entry: &Entry) -> bool {
    entry.name.is_none() && entry.quantifier.is_one() && entry.secondary.is_none()
}

fn sequence_checker(entries: Vec<Entry>) -> Checker {
    if let [entry] = entries.as_slice() {
        if let (true, Target::Checker(checker)) = (is_plain(entry), &entry.target) {
            return checker.clone();
        }
    }
    Checker::grammar(Grammar::new(entries))
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    pub fn compile(&self, pattern: &str) -> Result<Grammar, GrammarError> {
        let chars: Vec<char> = pattern.chars().collect();
        let tree = syntax::PATTERN
            .parse_with(pattern, &syntax::META)
            .map_err(|e| GrammarError::malformed(e.to_string(), &chars, 0))?;

        report_errors(tree.root())?;
        if let Some(&c) = chars.get(tree.end()) {
            return Err(GrammarError::malformed(
                format!("Unexpected character '{c}'"),
                &chars,
                tree.end(),
            ));
        }

        match tree.root().children().find(|n| n.type_name() == Some("body")) {
            Some(body) => Ok(self.body(body)?.into_grammar()),
            None => Ok(Grammar::new(Vec::new())),
        }
    }

    fn body(&self, node: NodeRef<'_>) -> Result<Body, GrammarError> {
        // Segments are separated by `||`; each one is the default of the
        // segments before it.
        let mut segments: Vec<Vec<Vec<Entry>>> = vec![Vec::new()];
        for child in node.children() {
            if child.type_name() == Some("sequence") {
                let sequence = self.sequence(child)?;
                if let Some(segment) = segments.last_mut() {
                    segment.push(sequence);
                }
            } else if child.name() == Some("sep") && child.text() == "||" {
                segments.push(Vec::new());
            }
        }
        if segments.len() == 1 && segments[0].len() == 1 {
            return Ok(Body::Sequence(segments.remove(0).remove(0)));
        }

        let mut fallback: Option<Checker> = None;
        for segment in segments.into_iter().rev() {
            let mut choices: Vec<Checker> = segment.into_iter().map(sequence_checker).collect();
            fallback = Some(match fallback {
                Some(default) => Checker::Alternative(Alternative::with_default(choices, default)),
                None if choices.len() == 1 => choices.remove(0),
                None => Checker::Alternative(Alternative::new(choices)),
            });
        }
        Ok(Body::Choice(fallback.unwrap_or_else(|| Checker::any(0))))
    }

    fn sequence(&self, node: NodeRef<'_>) -> Result<Vec<Entry>, GrammarError> {
        let mut entries = Vec::new();
        let mut pending = String::new();
        for item in node.children().filter(|n| n.type_name() == Some("item")) {
            match self.item(item)? {
                Piece::Literal(text) => pending.push_str(&text),
                Piece::Entry(entry) => {
                    flush_literal(&mut pending, &mut entries);
                    entries.push(entry);
                }
            }
        }
        flush_literal(&mut pending, &mut entries);
        Ok(entries)
    }

    fn item(&self, node: NodeRef<'_>) -> Result<Piece, GrammarError> {
        let quantifier = match node.typed_children("quantifier").first() {
            Some(q) => self.quantifier(*q)?,
            None => Quantifier::ONE,
        };
        let Some(element) = node.children().find(|n| n.type_name() != Some("quantifier")) else {
            return Err(malformed("Missing element", node, node.start()));
        };

        let entry = match element.type_name() {
            Some("group") => self.group(element)?,
            Some("charSet") => Entry::checker(self.char_set(element)?.into()),
            Some("typeRef") => self.type_ref(element)?,
            Some("backRef") => self.back_ref(element)?,
            Some("quoted") => {
                let (quote, text) = self.quoted(element)?;
                if quote == '`' {
                    Entry::type_ref("textCI", Some(text))
                } else if quantifier.is_one() {
                    return Ok(Piece::Literal(text));
                } else {
                    Entry::checker(Checker::literal(&text).optimize())
                }
            }
            Some("escape") => match self.escape(element)? {
                Escaped::Char(c) if quantifier.is_one() => return Ok(Piece::Literal(c.into())),
                Escaped::Char(c) => Entry::checker(Checker::single(c)),
                Escaped::Class(class) => Entry::checker(class.into()),
            },
            _ if element.text() == "." => return Ok(Piece::Entry(dot(quantifier))),
            _ => {
                let text = element.text();
                if quantifier.is_one() {
                    return Ok(Piece::Literal(text));
                }
                Entry::checker(Checker::literal(&text).optimize())
            }
        };
        Ok(Piece::Entry(entry.quantified(quantifier)))
    }

    fn quantifier(&self, node: NodeRef<'_>) -> Result<Quantifier, GrammarError> {
        let chars = node.chars();
        let greed = node.child("greed");
        let base = &chars[..chars.len() - greed.map_or(0, |g| g.len())];
        let quantifier = match base {
            ['?'] => Quantifier::ZERO_OR_ONE,
            ['*'] => Quantifier::ZERO_OR_MORE,
            ['+'] => Quantifier::ONE_OR_MORE,
            ['^'] => Quantifier::ZERO,
            ['{', inner @ .., '}'] => bounds(inner).ok_or_else(|| {
                malformed("Malformed quantifier", node, node.start())
            })?,
            _ => return Err(malformed("Malformed quantifier", node, node.start())),
        };
        let Some(greed) = greed else {
            return Ok(quantifier);
        };
        if quantifier.is_zero() {
            return Err(malformed(
                "Zero quantifier cannot take a greediness marker",
                node,
                greed.start(),
            ));
        }
        let greediness = if greed.text() == "+" {
            Greediness::Maximum
        } else {
            Greediness::Minimum
        };
        Ok(quantifier.with_greediness(greediness))
    }

    fn group(&self, node: NodeRef<'_>) -> Result<Entry, GrammarError> {
        let Some(body) = node
            .children()
            .find(|n| n.type_name() == Some("body") && n.name().is_none())
        else {
            return Err(malformed("Unclosed group", node, node.start()));
        };
        let body = self.body(body)?;
        let mut entry = if node.child("not").is_some() {
            Entry::checker(Checker::not(body.into_checker()))
        } else {
            match body {
                Body::Sequence(mut entries) if entries.len() == 1 && is_plain(&entries[0]) => {
                    entries.remove(0)
                }
                Body::Sequence(entries) => Entry::checker(Checker::grammar(Grammar::new(entries))),
                Body::Choice(checker) => Entry::checker(checker),
            }
        };
        if let Some(second) = node.child("second") {
            entry.secondary = Some(Arc::new(self.body(second)?.into_grammar()));
        }
        if let (Some(kind), Some(name)) = (node.child("kind"), node.child("name")) {
            entry = if kind.text() == "$" {
                entry.flat_named(name.text())
            } else {
                entry.named(name.text())
            };
        }
        Ok(entry)
    }

    fn char_set(&self, node: NodeRef<'_>) -> Result<CharChecker, GrammarError> {
        let mut parts = Vec::new();
        if let Some(items) = node.typed_children("setItems").first() {
            for part in items.children().filter(|n| n.name() == Some("part")) {
                let members = part
                    .typed_children("setItem")
                    .into_iter()
                    .map(|item| self.set_item(item))
                    .collect::<Result<Vec<_>, _>>()?;
                parts.push(CharChecker::union(members));
            }
        }
        let set = if parts.len() == 1 {
            parts.remove(0)
        } else {
            CharChecker::intersect(parts)
        };
        let set = set.optimize();
        Ok(if node.child("negate").is_some() {
            CharChecker::not(set)
        } else {
            set
        })
    }

    fn set_item(&self, node: NodeRef<'_>) -> Result<CharChecker, GrammarError> {
        if let Some(nested) = node.typed_children("charSet").first() {
            return self.char_set(*nested);
        }
        if let (Some(from), Some(to)) = (node.child("from"), node.child("to")) {
            return match (self.set_char(from)?, self.set_char(to)?) {
                (Escaped::Char(a), Escaped::Char(b)) => Ok(CharChecker::range(a, b)),
                _ => Err(malformed(
                    "Character class used as a range bound",
                    node,
                    node.start(),
                )),
            };
        }
        match node.typed_children("setChar").first() {
            Some(c) => Ok(match self.set_char(*c)? {
                Escaped::Char(c) => CharChecker::single(c),
                Escaped::Class(class) => class,
            }),
            None => Err(malformed("Malformed character set", node, node.start())),
        }
    }

    fn set_char(&self, node: NodeRef<'_>) -> Result<Escaped, GrammarError> {
        if let Some(escape) = node.typed_children("escape").first() {
            return self.escape(*escape);
        }
        node.chars()
            .first()
            .map(|&c| Escaped::Char(c))
            .ok_or_else(|| malformed("Malformed character set", node, node.start()))
    }

    fn escape(&self, node: NodeRef<'_>) -> Result<Escaped, GrammarError> {
        let invalid = || malformed("Invalid escape", node, node.start());
        let body = node.chars().get(1..).unwrap_or_default();
        match body {
            ['x', hex @ ..] | ['u', hex @ ..] if hex.len() >= 2 => {
                let digits: String = hex.iter().collect();
                u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .map(Escaped::Char)
                    .ok_or_else(invalid)
            }
            ['0', octal @ ..] if !octal.is_empty() => {
                let digits: String = octal.iter().collect();
                u32::from_str_radix(&digits, 8)
                    .ok()
                    .and_then(char::from_u32)
                    .map(Escaped::Char)
                    .ok_or_else(invalid)
            }
            [p @ ('p' | 'P'), '{', class @ .., '}'] => {
                let class: String = class.iter().collect();
                if !self.registry.classes().has_class(&class) {
                    return Err(malformed(
                        format!("Unknown character class '{class}'"),
                        node,
                        node.start(),
                    ));
                }
                let class = CharChecker::class(class);
                Ok(Escaped::Class(if *p == 'P' {
                    CharChecker::not(class)
                } else {
                    class
                }))
            }
            [c] => {
                if let Some(&(class, negated)) = CLASS_ESCAPES.get(c) {
                    let class = CharChecker::class(class);
                    return Ok(Escaped::Class(if negated {
                        CharChecker::not(class)
                    } else {
                        class
                    }));
                }
                if let Some(&control) = CONTROL_ESCAPES.get(c) {
                    return Ok(Escaped::Char(control));
                }
                if c.is_alphanumeric() {
                    return Err(invalid());
                }
                Ok(Escaped::Char(*c))
            }
            _ => Err(invalid()),
        }
    }

    /// Quote character and decoded contents.
    fn quoted(&self, node: NodeRef<'_>) -> Result<(char, String), GrammarError> {
        let chars = node.chars();
        let Some(&quote) = chars.first() else {
            return Err(malformed("Unterminated literal", node, node.start()));
        };
        let mut escapes = HashMap::new();
        node.walk(&mut |n| {
            if n.type_name() == Some("escape") {
                escapes.insert(n.start(), n);
            }
        });
        let mut text = String::new();
        let mut pos = node.start() + 1;
        let end = node.end().saturating_sub(1);
        while pos < end {
            match escapes.get(&pos) {
                Some(escape) => {
                    match self.escape(*escape)? {
                        Escaped::Char(c) => text.push(c),
                        Escaped::Class(_) => {
                            return Err(malformed(
                                "Character class inside a literal",
                                node,
                                pos,
                            ));
                        }
                    }
                    pos = escape.end();
                }
                None => {
                    text.push(node.source()[pos]);
                    pos += 1;
                }
            }
        }
        Ok((quote, text))
    }

    fn type_ref(&self, node: NodeRef<'_>) -> Result<Entry, GrammarError> {
        let name = node
            .child("name")
            .map(|n| n.text())
            .ok_or_else(|| malformed("Malformed type reference", node, node.start()))?;
        if !self.registry.contains(&name) {
            return Err(GrammarError::UnknownType {
                name,
                offset: node.start(),
            });
        }
        let param = node.child("param").map(|p| p.text());
        let entry = Entry::type_ref(name.clone(), param);
        Ok(if node.child("capture").is_some() {
            entry.named(name)
        } else {
            entry
        })
    }

    fn back_ref(&self, node: NodeRef<'_>) -> Result<Entry, GrammarError> {
        let name = node
            .child("name")
            .map(|n| n.text())
            .ok_or_else(|| malformed("Malformed back-reference", node, node.start()))?;
        let ty = if node.child("ci").is_some() {
            "backrefCI"
        } else {
            "backref"
        };
        if !self.registry.contains(ty) {
            return Err(GrammarError::UnknownType {
                name: ty.to_string(),
                offset: node.start(),
            });
        }
        Ok(Entry::type_ref(ty, Some(name)))
    }
}

/// Report every error node in document order; a fatal one ends the walk.
fn report_errors(root: NodeRef<'_>) -> Result<(), GrammarError> {
    let mut errors = Vec::new();
    root.walk(&mut |n| {
        if matches!(n.type_name(), Some("error" | "fatalError")) {
            errors.push(n);
        }
    });
    let mut ctx = CompileContext::default();
    for node in errors {
        node.value(&syntax::META, &mut ctx)?;
    }
    ctx.finish()
}

fn malformed(message: impl Into<String>, node: NodeRef<'_>, offset: usize) -> GrammarError {
    GrammarError::malformed(message, node.source(), offset)
}

fn flush_literal(pending: &mut String, entries: &mut Vec<Entry>) {
    if !pending.is_empty() {
        entries.push(Entry::checker(Checker::literal(pending)));
        pending.clear();
    }
}

/// `.` with its quantifier; possessive `.*` and `.{n}` become one step.
fn dot(quantifier: Quantifier) -> Entry {
    if quantifier.greediness == Greediness::Possessive {
        if quantifier.lower == 0 && quantifier.upper.is_none() {
            return Entry::checker(Checker::rest());
        }
        if quantifier.is_fixed() {
            return Entry::checker(Checker::any(quantifier.lower));
        }
    }
    Entry::checker(Checker::any(1)).quantified(quantifier)
}

/// Bounds inside `{...}`: `n`, `n,`, `,m` or `n,m`.
fn bounds(inner: &[char]) -> Option<Quantifier> {
    let text: String = inner.iter().collect();
    let number = |s: &str| s.parse::<usize>().ok();
    match text.split_once(',') {
        None => number(&text).map(Quantifier::exactly),
        Some(("", "")) => None,
        Some((lower, "")) => number(lower).map(|n| Quantifier::new(n, None)),
        Some(("", upper)) => number(upper).map(|m| Quantifier::new(0, Some(m))),
        Some((lower, upper)) => {
            let (n, m) = (number(lower)?, number(upper)?);
            (n <= m).then(|| Quantifier::new(n, Some(m)))
        }
    }
}
