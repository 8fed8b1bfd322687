//! The pattern language, written in the checker algebra it compiles to.
//!
//! Each syntactic category is a type in [`META`] so categories can refer to
//! each other recursively (a group contains a body, which contains items,
//! which contain groups). Malformed constructs are caught by `fatalError`
//! defaults at the point where the construct stops making sense, so the
//! parse itself always succeeds and the errors appear as nodes in its tree.

use std::sync::{Arc, LazyLock};

use crate::checker::{Alternative, CharChecker, Checker};
use crate::error::GrammarError;
use crate::grammar::{Entry, Grammar};
use crate::quantifier::Quantifier;
use crate::types::{Host, ParserType, TypeRegistry, register_builtins};

/// Characters with a meaning of their own outside character sets.
pub(crate) const SPECIALS: &str = "()[]{}.?*+|\\!$\"'`~^";

/// Entry point: one `body` covering as much of the pattern as it can.
pub(crate) static PATTERN: LazyLock<Grammar> = LazyLock::new(|| Grammar::new(vec![t("body")]));

/// Registry of the syntactic categories, plus the built-in types.
pub(crate) static META: LazyLock<TypeRegistry> = LazyLock::new(|| {
    let mut registry = TypeRegistry::empty();
    register_builtins(&mut registry);
    let categories = [
        ("ignored", ignored()),
        ("escape", escape()),
        ("quantifier", quantifier()),
        ("charSet", char_set()),
        ("setItems", set_items()),
        ("setItem", set_item()),
        ("setChar", set_char()),
        ("typeRef", type_ref()),
        ("backRef", back_ref()),
        ("quoted", quoted()),
        ("group", group()),
        ("body", body()),
        ("sequence", sequence()),
        ("item", item()),
    ];
    for (name, checker) in categories {
        // Category names never clash with the built-ins.
        let _ = registry.register(Category {
            name,
            checker: Arc::new(checker),
        });
    }
    registry
});

#[derive(Debug)]
struct Category {
    name: &'static str,
    checker: Arc<Checker>,
}

impl ParserType for Category {
    fn name(&self) -> &str {
        self.name
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

fn t(name: &str) -> Entry {
    Entry::type_ref(name, None)
}

fn ch(c: char) -> Entry {
    Entry::checker(Checker::single(c))
}

fn lit(text: &str) -> Entry {
    Entry::checker(Checker::literal(text))
}

fn e(checker: Checker) -> Entry {
    Entry::checker(checker)
}

fn g(entries: Vec<Entry>) -> Checker {
    Checker::grammar(Grammar::new(entries))
}

fn alt(choices: Vec<Checker>) -> Checker {
    Checker::Alternative(Alternative::new(choices))
}

fn star(entry: Entry) -> Entry {
    entry.quantified(Quantifier::ZERO_OR_MORE)
}

fn opt(entry: Entry) -> Entry {
    entry.quantified(Quantifier::ZERO_OR_ONE)
}

fn none_of(chars: &str) -> Checker {
    Checker::Char(CharChecker::not(CharChecker::set(chars)))
}

/// `body`, or a fatal error carrying `message` where it failed to start.
fn or_fatal(body: Checker, message: &str) -> Checker {
    let fatal = g(vec![Entry::type_ref("fatalError", Some(message.to_string()))]);
    Checker::Alternative(Alternative::with_default(vec![body], fatal))
}

fn name(node: &str) -> Entry {
    let head = CharChecker::union([
        CharChecker::range('a', 'z'),
        CharChecker::range('A', 'Z'),
        CharChecker::single('_'),
    ]);
    let tail = CharChecker::union([head.clone(), CharChecker::range('0', '9')]);
    e(g(vec![e(head.into()), star(e(tail.into()))])).named(node)
}

/// Whitespace and comments.
fn ignored() -> Checker {
    let until = |close: &str| {
        g(vec![
            star(e(Checker::not(Checker::literal(close)))),
            lit(close),
        ])
    };
    alt(vec![
        CharChecker::class("whitespace").into(),
        g(vec![lit("/*"), e(or_fatal(until("*/"), "Unterminated comment"))]),
        g(vec![lit("(*"), e(or_fatal(until("*)"), "Unterminated comment"))]),
        g(vec![lit("//"), star(e(none_of("\n")))]),
    ])
}

/// `\` and what follows; decoded by the compiler.
fn escape() -> Checker {
    let hex: Checker = CharChecker::class("hexdigit").into();
    let octal: Checker = CharChecker::range('0', '7').into();
    let forms = alt(vec![
        g(vec![ch('x'), e(hex.clone()).quantified(Quantifier::exactly(2))]),
        g(vec![ch('u'), e(hex).quantified(Quantifier::exactly(4))]),
        g(vec![ch('0'), e(octal).quantified(Quantifier::new(1, Some(3)))]),
        g(vec![
            e(CharChecker::set("pP").into()),
            ch('{'),
            star(e(none_of("}"))),
            ch('}'),
        ]),
        Checker::any(1),
    ]);
    g(vec![ch('\\'), e(or_fatal(forms, "Invalid escape"))])
}

fn quantifier() -> Checker {
    let digits = star(e(CharChecker::range('0', '9').into()));
    let braces = g(vec![
        ch('{'),
        e(or_fatal(
            g(vec![
                digits.clone(),
                opt(e(g(vec![ch(','), digits]))),
                ch('}'),
            ]),
            "Malformed quantifier",
        )),
    ]);
    g(vec![
        e(alt(vec![
            Checker::single('?'),
            Checker::single('*'),
            Checker::single('+'),
            Checker::single('^'),
            braces,
        ])),
        opt(e(CharChecker::set("+*").into()).named("greed")),
    ])
}

fn char_set() -> Checker {
    g(vec![
        ch('['),
        opt(ch('^').named("negate")),
        e(or_fatal(
            g(vec![t("setItems"), ch(']')]),
            "Malformed character set",
        )),
    ])
}

/// Items split into `part`s by `&&`.
fn set_items() -> Checker {
    let part = || e(g(vec![star(t("setItem"))])).named("part");
    g(vec![part(), star(e(g(vec![lit("&&"), part()])))])
}

fn set_item() -> Checker {
    alt(vec![
        g(vec![t("charSet")]),
        g(vec![t("setChar").named("from"), ch('-'), t("setChar").named("to")]),
        g(vec![t("setChar")]),
    ])
}

/// One member character of a set. A literal `&` needs an escape.
fn set_char() -> Checker {
    alt(vec![g(vec![t("escape")]), none_of("]\\[&")])
}

/// `!name!`, `!name(param)!` and `!$name!`.
fn type_ref() -> Checker {
    let param = e(g(vec![star(e(none_of(")")))])).named("param");
    g(vec![
        ch('!'),
        e(or_fatal(
            g(vec![
                opt(ch('$').named("capture")),
                name("name"),
                opt(e(g(vec![ch('('), param, ch(')')]))),
                ch('!'),
            ]),
            "Malformed type reference",
        )),
    ])
}

/// `$name;` and `$name';`.
fn back_ref() -> Checker {
    g(vec![
        ch('$'),
        e(or_fatal(
            g(vec![name("name"), opt(ch('\'').named("ci")), ch(';')]),
            "Malformed back-reference",
        )),
    ])
}

/// `"text"`, `'text'` and case-insensitive `` `text` ``.
fn quoted() -> Checker {
    let quote = |q: char| {
        let content = alt(vec![g(vec![t("escape")]), none_of(&format!("{q}\\"))]);
        g(vec![
            ch(q),
            e(or_fatal(g(vec![star(e(content)), ch(q)]), "Unterminated literal")),
        ])
    };
    alt(vec![quote('"'), quote('\''), quote('`')])
}

/// `( [#name: | $name:] [^] body [~ body] )`.
fn group() -> Checker {
    let capture = g(vec![
        e(CharChecker::set("#$").into()).named("kind"),
        name("name"),
        ch(':'),
    ]);
    let second = g(vec![star(t("ignored")), ch('~'), t("body").named("second")]);
    g(vec![
        ch('('),
        e(or_fatal(
            g(vec![
                opt(e(capture)),
                star(t("ignored")),
                opt(ch('^').named("not")),
                t("body"),
                opt(e(second)),
                ch(')'),
            ]),
            "Unclosed group",
        )),
    ])
}

/// Sequences separated by `|` or `||`.
fn body() -> Checker {
    let separator = alt(vec![Checker::literal("||"), Checker::single('|')]);
    g(vec![
        t("sequence"),
        star(e(g(vec![e(separator).named("sep"), t("sequence")]))),
    ])
}

fn sequence() -> Checker {
    g(vec![
        star(e(g(vec![star(t("ignored")), t("item")]))),
        star(t("ignored")),
    ])
}

/// One element and its optional quantifier.
fn item() -> Checker {
    let literal = CharChecker::not(CharChecker::union([
        CharChecker::set(SPECIALS),
        CharChecker::class("whitespace"),
    ]));
    let element = alt(vec![
        g(vec![t("group")]),
        g(vec![t("charSet")]),
        g(vec![t("quoted")]),
        g(vec![t("typeRef")]),
        g(vec![t("backRef")]),
        g(vec![t("escape")]),
        Checker::single('.'),
        literal.into(),
    ]);
    g(vec![e(element), opt(t("quantifier"))])
}
