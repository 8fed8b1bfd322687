//! Types every default registry carries.

use std::sync::Arc;

use super::{CompileContext, Host, ParserType, TypeRegistry, Value};
use crate::checker::{Alternative, CharChecker, Checker};
use crate::error::GrammarError;
use crate::grammar::{Entry, Grammar};
use crate::quantifier::Quantifier;
use crate::tree::NodeRef;

/// Register every built-in type whose name is still free.
pub fn register_builtins(registry: &mut TypeRegistry) {
    let builtins: [Arc<dyn ParserType>; 8] = [
        Arc::new(Identifier::new()),
        Arc::new(StringLiteral::new()),
        Arc::new(TextCI),
        Arc::new(IdentifierCI::new()),
        Arc::new(Backref::exact()),
        Arc::new(Backref::case_insensitive()),
        Arc::new(ErrorType::error()),
        Arc::new(ErrorType::fatal()),
    ];
    for ty in builtins {
        if !registry.contains(ty.name()) {
            // The name is free, so registration cannot fail.
            let _ = registry.register_arc(ty);
        }
    }
}

fn ch(c: char) -> Entry {
    Entry::checker(Checker::single(c))
}

fn identifier_checker() -> Checker {
    let head = CharChecker::union([CharChecker::class("alpha"), CharChecker::single('_')]);
    let tail = CharChecker::class("word");
    Checker::grammar(Grammar::new(vec![
        Entry::checker(head.into()),
        Entry::checker(tail.into()).quantified(Quantifier::ZERO_OR_MORE),
    ]))
}

/// Checker matching `text` with ASCII and Unicode simple case folding.
pub(crate) fn case_insensitive(text: &str) -> Checker {
    let mut checkers: Vec<Checker> = text
        .chars()
        .map(|c| {
            let mut members = String::from(c);
            let lower: Vec<char> = c.to_lowercase().collect();
            let upper: Vec<char> = c.to_uppercase().collect();
            for mapped in [lower, upper] {
                // Multi-char mappings cannot match a single input char.
                if let [x] = mapped[..] {
                    members.push(x);
                }
            }
            CharChecker::set(&members).optimize().into()
        })
        .collect();
    match checkers.len() {
        0 => Checker::any(0),
        1 => checkers.pop().unwrap_or_else(|| Checker::any(0)),
        _ => Checker::grammar(Grammar::new(
            checkers.into_iter().map(Entry::checker).collect(),
        )),
    }
}

fn missing_param(name: &str) -> GrammarError {
    GrammarError::Type {
        name: name.to_string(),
        message: "a parameter is required".to_string(),
    }
}

/// `!identifier!`: a letter or `_` followed by word characters.
#[derive(Debug)]
pub struct Identifier {
    checker: Arc<Checker>,
}

impl Identifier {
    pub fn new() -> Self {
        Self {
            checker: Arc::new(identifier_checker()),
        }
    }
}

impl Default for Identifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserType for Identifier {
    fn name(&self) -> &str {
        "identifier"
    }

    fn checker(
        &self,
        _: &Host<'_>,
        _: Option<&str>,
        _: &TypeRegistry,
    ) -> Result<Arc<Checker>, GrammarError> {
        Ok(self.checker.clone())
    }
}

/// `!identifierCI(word)!`: an identifier equal to `word` ignoring case.
#[derive(Debug)]
pub struct IdentifierCI {
    checker: Arc<Checker>,
}

impl IdentifierCI {
    pub fn new() -> Self {
        Self {
            checker: Arc::new(identifier_checker()),
        }
    }
}

impl Default for IdentifierCI {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserType for IdentifierCI {
    fn name(&self) -> &str {
        "identifierCI"
    }

    fn checker(
        &self,
        _: &Host<'_>,
        _: Option<&str>,
        _: &TypeRegistry,
    ) -> Result<Arc<Checker>, GrammarError> {
        Ok(self.checker.clone())
    }

    fn is_valid(
        &self,
        _: &Host<'_>,
        this: NodeRef<'_>,
        param: Option<&str>,
        _: &TypeRegistry,
    ) -> bool {
        param.is_some_and(|p| p.to_lowercase() == this.text().to_lowercase())
    }
}

/// `!stringLiteral!`: a double-quoted string with backslash escapes.
/// Compiles to the unescaped contents.
#[derive(Debug)]
pub struct StringLiteral {
    checker: Arc<Checker>,
}

impl StringLiteral {
    pub fn new() -> Self {
        let escaped = Checker::grammar(Grammar::new(vec![
            ch('\\'),
            Entry::checker(Checker::any(1)),
        ]));
        let plain = Checker::Char(CharChecker::not(CharChecker::set("\"\\")));
        let body = Checker::Alternative(Alternative::new(vec![escaped, plain]));
        let checker = Checker::grammar(Grammar::new(vec![
            ch('"'),
            Entry::checker(body).quantified(Quantifier::ZERO_OR_MORE),
            ch('"'),
        ]));
        Self {
            checker: Arc::new(checker),
        }
    }
}

impl Default for StringLiteral {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserType for StringLiteral {
    fn name(&self) -> &str {
        "stringLiteral"
    }

    fn checker(
        &self,
        _: &Host<'_>,
        _: Option<&str>,
        _: &TypeRegistry,
    ) -> Result<Arc<Checker>, GrammarError> {
        Ok(self.checker.clone())
    }

    fn compile(
        &self,
        this: NodeRef<'_>,
        _: usize,
        _: Option<&str>,
        _: &mut CompileContext,
        _: &TypeRegistry,
    ) -> Result<Value, GrammarError> {
        let chars = this.chars();
        let inner = chars.get(1..chars.len().saturating_sub(1)).unwrap_or_default();
        let mut out = String::with_capacity(inner.len());
        let mut it = inner.iter();
        while let Some(&c) = it.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match it.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(&other) => out.push(other),
                None => out.push('\\'),
            }
        }
        Ok(Value::Text(out))
    }
}

/// `!textCI(text)!`: `text` ignoring case.
///
/// Holds no state; a parse reuses the checker it built for each text.
#[derive(Debug, Default)]
pub struct TextCI;

impl ParserType for TextCI {
    fn name(&self) -> &str {
        "textCI"
    }

    fn checker(
        &self,
        _: &Host<'_>,
        param: Option<&str>,
        _: &TypeRegistry,
    ) -> Result<Arc<Checker>, GrammarError> {
        let text = param.ok_or_else(|| missing_param(self.name()))?;
        Ok(Arc::new(case_insensitive(text)))
    }
}

/// `!backref(name)!` and `!backrefCI(name)!`: the text of the last node
/// named `name`, exactly or ignoring case.
///
/// With no such node the reference never matches; an empty capture matches
/// the empty string.
#[derive(Debug)]
pub struct Backref {
    case_insensitive: bool,
}

impl Backref {
    pub fn exact() -> Self {
        Self {
            case_insensitive: false,
        }
    }

    pub fn case_insensitive() -> Self {
        Self {
            case_insensitive: true,
        }
    }
}

impl ParserType for Backref {
    fn name(&self) -> &str {
        if self.case_insensitive { "backrefCI" } else { "backref" }
    }

    fn checker(
        &self,
        host: &Host<'_>,
        param: Option<&str>,
        _: &TypeRegistry,
    ) -> Result<Arc<Checker>, GrammarError> {
        let name = param.ok_or_else(|| missing_param(self.name()))?;
        let Some(captured) = host.last_named(name) else {
            return Ok(Arc::new(Checker::never()));
        };
        let text = captured.text();
        let checker = if text.is_empty() {
            Checker::any(0)
        } else if self.case_insensitive {
            case_insensitive(&text)
        } else {
            Checker::word(&text).map_err(|e| GrammarError::Type {
                name: self.name().to_string(),
                message: e.to_string(),
            })?
        };
        Ok(Arc::new(checker))
    }

    fn depends_on_host(&self) -> bool {
        true
    }
}

/// `!error(message)!` and `!fatalError(message)!`: consume the rest of the
/// input and report `message` when compiled.
///
/// A plain error is collected in the compile context; a fatal one aborts.
#[derive(Debug)]
pub struct ErrorType {
    fatal: bool,
    checker: Arc<Checker>,
}

impl ErrorType {
    pub fn error() -> Self {
        Self {
            fatal: false,
            checker: Arc::new(Checker::rest()),
        }
    }

    pub fn fatal() -> Self {
        Self {
            fatal: true,
            checker: Arc::new(Checker::rest()),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }
}

impl ParserType for ErrorType {
    fn name(&self) -> &str {
        if self.fatal { "fatalError" } else { "error" }
    }

    fn checker(
        &self,
        _: &Host<'_>,
        _: Option<&str>,
        _: &TypeRegistry,
    ) -> Result<Arc<Checker>, GrammarError> {
        Ok(self.checker.clone())
    }

    fn compile(
        &self,
        this: NodeRef<'_>,
        _: usize,
        param: Option<&str>,
        ctx: &mut CompileContext,
        _: &TypeRegistry,
    ) -> Result<Value, GrammarError> {
        let message = param.unwrap_or("Syntax error");
        if self.fatal {
            return Err(GrammarError::fatal(message, this.source(), this.start()));
        }
        ctx.report(GrammarError::malformed(message, this.source(), this.start()));
        Ok(Value::Unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pattern: &str, text: &str) -> Option<crate::MatchTree> {
        Grammar::compile(pattern).unwrap().match_text(text).ok()
    }

    #[test]
    fn identifier() {
        assert!(parse("!identifier!", "_foo42").is_some());
        assert!(parse("!identifier!", "4foo").is_none());
    }

    #[test]
    fn identifier_ci_compares_ignoring_case() {
        assert!(parse("!identifierCI(Select)!", "SELECT").is_some());
        assert!(parse("!identifierCI(Select)!", "SELECTED").is_none());
    }

    #[test]
    fn text_ci() {
        assert!(parse("!textCI(Hello)!", "hELLo").is_some());
        assert!(parse("!textCI(Hello)!", "help").is_none());
        assert!(parse("`ab-c`", "AB-C").is_some());
        assert!(parse("!textCI(ab)!+", "AbaBAB").is_some());
        // Checkers live only as long as the parse that built them.
        assert_eq!(std::mem::size_of::<TextCI>(), 0);
    }

    #[test]
    fn string_literal_unescapes() {
        let tree = parse(r#"(#s: !stringLiteral!)"#, r#""a\"b\n""#).unwrap();
        let registry = TypeRegistry::default();
        let mut ctx = CompileContext::default();
        let value = tree.find("s").unwrap().value(&registry, &mut ctx).unwrap();
        assert_eq!(value, Value::Text("a\"b\n".into()));
    }

    #[test]
    fn backrefs_match_captured_text() {
        assert!(parse("(#q: [ab]) x $q;", "axa").is_some());
        assert!(parse("(#q: [ab]) x $q;", "axb").is_none());
        assert!(parse("(#q: [ab]+) x $q';", "abxAB").is_some());
    }

    #[test]
    fn backref_prefers_the_enclosing_capture() {
        assert!(parse("(#x: (#x: a) b) $x;", "abab").is_some());
        assert!(parse("(#x: (#x: a) b) $x;", "aba").is_none());
    }

    #[test]
    fn missing_capture_never_matches() {
        assert!(parse("x $nothing;", "x").is_none());
    }

    #[test]
    fn empty_capture_matches_empty() {
        assert!(parse("(#q: a*) x $q;", "x").is_some());
    }

    #[test]
    fn error_types_report_when_compiled() {
        let registry = TypeRegistry::default();
        let tree = parse("a (#e: !error(Bad tail)!)", "abc").unwrap();
        let mut ctx = CompileContext::default();
        let value = tree.find("e").unwrap().value(&registry, &mut ctx).unwrap();
        assert_eq!(value, Value::Unit);
        assert_eq!(ctx.errors()[0].offset(), Some(1));

        let tree = parse("a (#e: !fatalError(Stop)!)", "abc").unwrap();
        let err = tree.find("e").unwrap().value(&registry, &mut ctx).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn case_insensitive_checker_shapes() {
        assert_eq!(case_insensitive(""), Checker::any(0));
        assert_eq!(case_insensitive("-"), Checker::single('-'));
        assert_eq!(case_insensitive("a"), Checker::Char(CharChecker::set("aA")));
    }
}
