//! A textual-grammar engine: a compact pattern language compiled into
//! composable checkers, matched against text with backtracking.
//!
//! # Example
//!
//! ```rust
//! use regparser::Grammar;
//!
//! let grammar: Grammar = "(#key: !identifier!) = (#value: [0-9]+)".parse().unwrap();
//!
//! let tree = grammar.match_text("width=80").unwrap();
//! assert_eq!(tree.find("key").unwrap().text(), "width");
//! assert_eq!(tree.find("value").unwrap().text(), "80");
//!
//! // `parse` tolerates trailing input; `match_text` does not.
//! assert_eq!(grammar.parse("width=80;").unwrap().end(), 8);
//! assert!(grammar.match_text("width=80;").is_err());
//! ```

pub mod checker;
pub mod compiler;
mod engine;
mod error;
mod grammar;
mod quantifier;
mod tree;
pub mod types;

pub use checker::{
    Alternative, CharChecker, CharClassProvider, Checker, Fixed, Region, StandardClasses,
};
pub use compiler::{Compiler, compile};
pub use error::{CheckerError, GrammarError, ParseError, Unmatched};
pub use grammar::{Entry, Grammar, Target, TypeRef};
pub use quantifier::{Greediness, Quantifier};
pub use tree::{MatchNode, MatchTree, NodeRef};
pub use types::{CompileContext, FnType, Host, ParserType, PatternType, TypeRegistry, Value};
