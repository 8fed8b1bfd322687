use std::sync::Arc;

use regparser::{
    Checker, CompileContext, Entry, Fixed, FnType, Grammar, GrammarError, MatchTree, Region,
    TypeRegistry, Value, compile,
};

fn grammar(pattern: &str) -> Grammar {
    compile(pattern).unwrap_or_else(|e| panic!("{pattern}: {e}"))
}

fn spans(tree: &MatchTree, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .map(|name| tree.find(name).map(|n| n.text()).unwrap_or_default())
        .collect()
}

#[test]
fn digits_then_zeds() {
    let g = grammar("A[0-9Z]{2,4}Z+");
    let tree = g.match_text("A012ZZ").unwrap();
    assert_eq!(tree.end(), 6);
    let runs: Vec<_> = tree.nodes().iter().map(|n| (n.start, n.end)).collect();
    assert_eq!(runs, [(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 6)]);

    // The possessive bound keeps all four chars it can take.
    let g = grammar("A (#d: [0-9Z]{2,4}) (#z: Z+)");
    let tree = g.match_text("A012ZZ").unwrap();
    assert_eq!(spans(&tree, &["d", "z"]), ["012Z", "Z"]);

    // Taking the fewest repeats leaves both Zs to the tail.
    let g = grammar("A (#d: [0-9Z]{2,4}*) (#z: Z+)");
    let tree = g.match_text("A012ZZ").unwrap();
    assert_eq!(spans(&tree, &["d", "z"]), ["012", "ZZ"]);
}

#[test]
fn possessive_bounds_do_not_give_back() {
    let g = grammar("A[0-9Z]{2,4}Z+");
    assert!(g.match_text("A012Z").is_err());

    let maximum = grammar("A[0-9Z]{2,4}+Z+");
    assert_eq!(maximum.match_text("A012Z").unwrap().end(), 5);

    let minimum = grammar("A[0-9Z]{2,4}*Z+");
    assert_eq!(minimum.match_text("A012Z").unwrap().end(), 5);
}

#[test]
fn minimum_takes_fewest_repeats() {
    let g = grammar("(#head: .+*) (#tail: [0-9]+)");
    let tree = g.match_text("ab12").unwrap();
    assert_eq!(tree.find("head").unwrap().text(), "ab");
    assert_eq!(tree.find("tail").unwrap().text(), "12");

    let g = grammar("(#head: .+) (#tail: [0-9]+)");
    assert!(g.match_text("ab12").is_err());

    let g = grammar("(#head: .++) (#tail: [0-9]+)");
    let tree = g.match_text("ab12").unwrap();
    assert_eq!(tree.find("head").unwrap().text(), "ab1");
}

#[test]
fn bounded_minimum_fails_once_its_bound_is_spent() {
    let g = grammar("a{1,2}* b");
    assert!(g.match_text("aab").is_ok());
    let err = g.match_text("aaab").unwrap_err();
    assert!(err.unmatched().is_some());
}

#[test]
fn validator_rejection_backtracks_into_earlier_repeats() {
    let mut registry = TypeRegistry::default();
    registry
        .register(
            FnType::fixed("even", Checker::grammar(compile("[0-9]").unwrap()))
                .with_validator(|_, node, _| node.text().parse::<u8>().is_ok_and(|d| d % 2 == 0)),
        )
        .unwrap();
    let compiler = regparser::Compiler::new(&registry);

    // Maximum gives back 3 (rejected), then 4, and accepts 4.
    let maximum = compiler.compile("(#head: [0-9]*+) (#tail: !even!)").unwrap();
    let tree = maximum.parse_with("1243", &registry).unwrap();
    assert_eq!(tree.end(), 3);
    assert_eq!(spans(&tree, &["head", "tail"]), ["12", "4"]);

    // Minimum tries 1 (rejected), then takes one more repeat to reach 2.
    let minimum = compiler.compile("(#head: [0-9]**) (#tail: !even!)").unwrap();
    let tree = minimum.parse_with("1243", &registry).unwrap();
    assert_eq!(spans(&tree, &["head", "tail"]), ["1", "2"]);

    // A possessive run has nothing to give back.
    let possessive = compiler.compile("[0-9]* !even!").unwrap();
    assert!(possessive.parse_with("1243", &registry).is_err());
}

#[test]
fn long_runs_backtrack_linearly() {
    let n = 20_000;
    let text = format!("{}b", "a".repeat(n));
    let tree = grammar("[a-z]*+ b").match_text(&text).unwrap();
    assert_eq!(tree.end(), n + 1);
    assert_eq!(tree.nodes().len(), n + 1);

    let literal = "a".repeat(2_000);
    let g = compile(&literal).unwrap();
    assert!(g.match_text(&literal).is_ok());
}

#[test]
fn huge_any_width_never_matches() {
    let g = grammar("x.{18446744073709551615}");
    assert!(g.parse("xab").is_err());
}

#[test]
fn boolean_alternative() {
    let g = grammar("(true|false)");
    assert_eq!(g.match_text("false").unwrap().end(), 5);
    assert_eq!(g.match_text("true").unwrap().end(), 4);
}

#[test]
fn default_alternative_leaves_input_over() {
    let g = grammar("(AA|AAA||AAAA)");
    let err = g.match_text("AAAA").unwrap_err();
    assert_eq!(err.unmatched().unwrap().offset, 3);
    assert_eq!(g.parse("AAAA").unwrap().end(), 3);
}

#[test]
fn optional_letter_reports_first_word() {
    let g = grammar("Colou?r");
    assert_eq!(g.match_text("Color").unwrap().end(), 5);
    assert_eq!(g.match_text("Colour").unwrap().end(), 6);

    let err = g.match_text("Clr").unwrap_err();
    let unmatched = err.unmatched().unwrap();
    assert_eq!(unmatched.offset, 0);
    assert_eq!(unmatched.expected, "\"Colo\"");
}

#[test]
fn word_alternation_at_start() {
    let g = grammar("(555|222)");
    let tree = g.parse("222A555").unwrap();
    assert_eq!((tree.start(), tree.end()), (0, 3));
}

#[test]
fn find_scans_forward() {
    let g = grammar("(555|222)");
    let tree = g.find("xx555").unwrap();
    assert_eq!((tree.start(), tree.end()), (2, 5));
    assert!(g.find("123").is_err());
}

#[test]
fn back_reference_matches_captured_quote() {
    let g = grammar(r#"(#q: ["']) [a-z]* $q;"#);
    assert!(g.match_text("'abc'").is_ok());
    assert!(g.match_text("\"abc\"").is_ok());
    assert!(g.match_text("'abc\"").is_err());

    let ci = grammar("(#w: [a-zA-Z]+) \\- $w';");
    assert!(ci.match_text("Tag-TAG").is_ok());
}

#[test]
fn backtick_text_ignores_case() {
    let g = grammar("`select` \\  !identifier!");
    let tree = g.match_text("SeLeCt name").unwrap();
    assert_eq!(tree.end(), 11);
}

#[test]
fn named_and_flat_groups() {
    let g = grammar("(#pair: (#k: [a-z]+) \\= (#v: [0-9]+)) ($raw: (#x: .)*)");
    let tree = g.match_text("ab=12zz").unwrap();
    let pair = tree.find("pair").unwrap();
    assert_eq!(pair.text(), "ab=12");
    assert_eq!(pair.child("k").unwrap().text(), "ab");
    assert_eq!(pair.child("v").unwrap().text(), "12");

    let raw = tree.find("raw").unwrap();
    assert_eq!(raw.text(), "zz");
    assert_eq!(raw.children().count(), 0);
}

#[test]
fn string_literal_value() {
    let g = grammar("(#s: !stringLiteral!)");
    let tree = g.match_text(r#""a\"b""#).unwrap();
    let s = tree.find("s").unwrap();
    let mut ctx = CompileContext::default();
    let value = s.value(TypeRegistry::standard(), &mut ctx).unwrap();
    assert_eq!(value, Value::Text("a\"b".to_string()));
}

#[test]
fn secondary_grammar_refines_the_span() {
    let g = grammar("(#word: [a-z0-9]+ ~ [a-z]+ [0-9]+)");
    assert!(g.match_text("abc123").is_ok());
    assert!(g.match_text("123abc").is_err());
}

#[test]
fn recursive_pattern_types() {
    let mut registry = TypeRegistry::default();
    registry
        .register_pattern("list", r"\( (!item! (\, !item!)*)? \)")
        .unwrap();
    registry
        .register_pattern("item", "([0-9]+ | !list!)")
        .unwrap();
    let g = regparser::Compiler::new(&registry).compile("!list!").unwrap();
    assert!(g.match_text_with("(1,(2,3),())", &registry).is_ok());
    assert!(g.match_text_with("(1,(2,3)", &registry).is_err());
}

#[test]
fn closure_types_validate_and_compile() {
    let mut registry = TypeRegistry::default();
    let digits = compile("[0-9]+").unwrap();
    registry
        .register(
            FnType::fixed("even", Checker::grammar(digits))
                .with_validator(|_, node, _| node.text().parse::<u64>().is_ok_and(|n| n % 2 == 0))
                .with_compiler(|node, _, _| {
                    node.text()
                        .parse::<i64>()
                        .map(Value::Int)
                        .map_err(|e| GrammarError::Type {
                            name: "even".to_string(),
                            message: e.to_string(),
                        })
                }),
        )
        .unwrap();

    let g = regparser::Compiler::new(&registry).compile("!$even!").unwrap();
    let tree = g.match_text_with("42", &registry).unwrap();
    let node = tree.find("even").unwrap();
    let mut ctx = CompileContext::default();
    assert_eq!(node.value(&registry, &mut ctx).unwrap(), Value::Int(42));
    assert!(g.match_text_with("41", &registry).is_err());
}

#[test]
fn fixed_regions_through_the_api() {
    let fixed = Fixed::new(vec![
        Region::new("code", 3).with_grammar(grammar("[A-Z]+")),
        Region::unbounded("rest"),
    ])
    .unwrap();
    let g = Grammar::new(vec![Entry::checker(Checker::Fixed(fixed)).named("record")]);
    let tree = g.match_text("ABCxyz").unwrap();
    let record = tree.find("record").unwrap();
    assert_eq!(record.child("code").unwrap().text(), "ABC");
    assert_eq!(record.child("rest").unwrap().text(), "xyz");
    assert!(g.match_text("AbCxyz").is_err());
}

#[test]
fn malformed_patterns_carry_the_offending_slice() {
    match compile("ab{3,1}cd") {
        Err(GrammarError::Malformed { offset, slice, .. }) => {
            assert_eq!(offset, 2);
            assert_eq!(slice, "{3,1}cd");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(compile("a^*"), Err(GrammarError::Malformed { .. })));
    assert!(matches!(compile("(ab"), Err(GrammarError::Fatal { .. })));
}

#[test]
fn grammars_share_across_threads() {
    let g = Arc::new(grammar("(#n: [0-9]+) (\\, (#n: [0-9]+))*"));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let g = Arc::clone(&g);
            std::thread::spawn(move || {
                let text = format!("{i},{i}{i},{i}");
                g.match_text(&text).map(|t| t.find_all("n").len())
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), Ok(3));
    }
}
