//! Parser types and the registry that resolves them by name.
//!
//! A parser type supplies a checker for an entry, may veto a match, and may
//! turn a matched node into a [`Value`]. Entries refer to types by name, so
//! types can reference each other (and themselves) without owning each other.

mod builtin;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};

use crate::checker::{CharClassProvider, Checker, StandardClasses};
use crate::compiler::Compiler;
use crate::error::GrammarError;
use crate::tree::{MatchNode, NodeList, NodeRef};

pub use builtin::{
    Backref, ErrorType, Identifier, IdentifierCI, StringLiteral, TextCI, register_builtins,
};

/// A named, registry-resolved unit of grammar.
pub trait ParserType: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Checker for an entry referencing this type with `param`.
    fn checker(
        &self,
        host: &Host<'_>,
        param: Option<&str>,
        registry: &TypeRegistry,
    ) -> Result<Arc<Checker>, GrammarError>;

    /// The checker varies with the enclosing match, so it must not be cached.
    fn depends_on_host(&self) -> bool {
        false
    }

    /// Veto a match; a rejected match counts as no match.
    fn is_valid(
        &self,
        _host: &Host<'_>,
        _this: NodeRef<'_>,
        _param: Option<&str>,
        _registry: &TypeRegistry,
    ) -> bool {
        true
    }

    /// Turn a matched node into a value. `index` is the node's position
    /// among its siblings.
    fn compile(
        &self,
        this: NodeRef<'_>,
        _index: usize,
        _param: Option<&str>,
        _ctx: &mut CompileContext,
        _registry: &TypeRegistry,
    ) -> Result<Value, GrammarError> {
        Ok(Value::Text(this.text()))
    }
}

/// Handle into a registry's type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(usize);

/// Name to type lookup, plus the character classes checkers consult.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: Vec<Arc<dyn ParserType>>,
    index: HashMap<String, TypeId>,
    classes: Arc<dyn CharClassProvider>,
}

static STANDARD: LazyLock<TypeRegistry> = LazyLock::new(TypeRegistry::default);

impl TypeRegistry {
    /// A registry with no types and the standard character classes.
    pub fn empty() -> Self {
        Self::with_classes(Arc::new(StandardClasses))
    }

    /// A registry with no types and the given character classes.
    pub fn with_classes(classes: Arc<dyn CharClassProvider>) -> Self {
        Self {
            types: Vec::new(),
            index: HashMap::new(),
            classes,
        }
    }

    /// Shared registry holding only the built-in types.
    pub fn standard() -> &'static TypeRegistry {
        &STANDARD
    }

    pub fn register(&mut self, ty: impl ParserType + 'static) -> Result<TypeId, GrammarError> {
        self.register_arc(Arc::new(ty))
    }

    pub fn register_arc(&mut self, ty: Arc<dyn ParserType>) -> Result<TypeId, GrammarError> {
        let name = ty.name().to_string();
        if self.index.contains_key(&name) {
            return Err(GrammarError::DuplicateType(name));
        }
        let id = TypeId(self.types.len());
        self.types.push(ty);
        self.index.insert(name, id);
        Ok(id)
    }

    /// Register a type whose checker is compiled from `pattern`.
    pub fn register_pattern(
        &mut self,
        name: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Result<TypeId, GrammarError> {
        self.register(PatternType::new(name, pattern))
    }

    pub fn lookup(&self, name: &str) -> Result<&Arc<dyn ParserType>, GrammarError> {
        self.id(name)
            .map(|id| self.get(id))
            .ok_or_else(|| GrammarError::UnknownType {
                name: name.to_string(),
                offset: 0,
            })
    }

    pub fn id(&self, name: &str) -> Option<TypeId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, id: TypeId) -> &Arc<dyn ParserType> {
        &self.types[id.0]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.name())
    }

    pub fn classes(&self) -> &dyn CharClassProvider {
        self.classes.as_ref()
    }
}

impl Default for TypeRegistry {
    /// The standard character classes and every built-in type.
    fn default() -> Self {
        let mut registry = Self::empty();
        register_builtins(&mut registry);
        registry
    }
}

/// Read-only view of the match in progress, handed to types.
///
/// Scopes run from the outermost grammar to the innermost; each holds the
/// nodes completed so far at that level.
#[derive(Debug, Clone)]
pub struct Host<'a> {
    text: &'a [char],
    offset: usize,
    scopes: Vec<Scope<'a>>,
}

/// Nodes completed at one grammar level.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Scope<'a> {
    Nodes(&'a [MatchNode]),
    List(&'a NodeList),
}

impl<'a> Host<'a> {
    pub fn new(text: &'a [char], offset: usize, scopes: Vec<&'a [MatchNode]>) -> Self {
        Self::with_scopes(text, offset, scopes.into_iter().map(Scope::Nodes).collect())
    }

    pub(crate) fn with_scopes(text: &'a [char], offset: usize, scopes: Vec<Scope<'a>>) -> Self {
        Self {
            text,
            offset,
            scopes,
        }
    }

    pub fn text(&self) -> &'a [char] {
        self.text
    }

    /// Offset the type's entry is being matched at.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The most recently completed node named `name`, innermost scope first.
    ///
    /// A node completes after its children, so it is seen before them.
    pub fn last_named(&self, name: &str) -> Option<NodeRef<'a>> {
        self.scopes.iter().rev().find_map(|scope| match *scope {
            Scope::Nodes(nodes) => last_named_in(self.text, nodes.iter().enumerate().rev(), name),
            Scope::List(list) => last_named_in(self.text, list.iter_rev(), name),
        })
    }
}

fn last_named_in<'a>(
    text: &'a [char],
    nodes: impl Iterator<Item = (usize, &'a MatchNode)>,
    name: &str,
) -> Option<NodeRef<'a>> {
    for (index, node) in nodes {
        if node.name.as_deref() == Some(name) {
            return Some(NodeRef::new(text, node, index));
        }
        let children = node.children.iter().enumerate().rev();
        if let Some(found) = last_named_in(text, children, name) {
            return Some(found);
        }
    }
    None
}

/// A compiled node value.
#[derive(Clone)]
pub enum Value {
    Unit,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            Self::Custom(v) => v.downcast_ref(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unit, Self::Unit) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "Unit"),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "()"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Custom(_) => write!(f, "<custom>"),
        }
    }
}

/// Collects non-fatal errors while values are compiled.
#[derive(Debug, Default)]
pub struct CompileContext {
    errors: Vec<GrammarError>,
}

impl CompileContext {
    pub fn report(&mut self, error: GrammarError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[GrammarError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// `Ok` if nothing was reported, the single error, or all of them.
    pub fn finish(mut self) -> Result<(), GrammarError> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(GrammarError::Many(self.errors)),
        }
    }
}

/// A type whose checker is compiled from pattern text the first time it is
/// needed, against the registry resolving it. Patterns may reference the type
/// itself, or types registered after it.
#[derive(Debug)]
pub struct PatternType {
    name: String,
    pattern: String,
    compiled: OnceLock<Result<Arc<Checker>, GrammarError>>,
}

impl PatternType {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            compiled: OnceLock::new(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl ParserType for PatternType {
    fn name(&self) -> &str {
        &self.name
    }

    fn checker(
        &self,
        _host: &Host<'_>,
        _param: Option<&str>,
        registry: &TypeRegistry,
    ) -> Result<Arc<Checker>, GrammarError> {
        self.compiled
            .get_or_init(|| {
                Compiler::new(registry)
                    .compile(&self.pattern)
                    .map(|g| Arc::new(Checker::grammar(g)))
            })
            .clone()
    }
}

type CheckerFn =
    dyn Fn(&Host<'_>, Option<&str>, &TypeRegistry) -> Result<Arc<Checker>, GrammarError>
        + Send
        + Sync;
type ValidatorFn = dyn Fn(&Host<'_>, NodeRef<'_>, Option<&str>) -> bool + Send + Sync;
type CompilerFn =
    dyn Fn(NodeRef<'_>, Option<&str>, &mut CompileContext) -> Result<Value, GrammarError>
        + Send
        + Sync;

/// A type assembled from closures supplied by the embedding application.
pub struct FnType {
    name: String,
    checker: Box<CheckerFn>,
    validator: Option<Box<ValidatorFn>>,
    compiler: Option<Box<CompilerFn>>,
    host_dependent: bool,
}

impl FnType {
    pub fn new<F>(name: impl Into<String>, checker: F) -> Self
    where
        F: Fn(&Host<'_>, Option<&str>, &TypeRegistry) -> Result<Arc<Checker>, GrammarError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            checker: Box::new(checker),
            validator: None,
            compiler: None,
            host_dependent: false,
        }
    }

    /// A type that always uses `checker`, whatever the parameter.
    pub fn fixed(name: impl Into<String>, checker: Checker) -> Self {
        let checker = Arc::new(checker);
        Self::new(name, move |_, _, _| Ok(checker.clone()))
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Host<'_>, NodeRef<'_>, Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn with_compiler<F>(mut self, compiler: F) -> Self
    where
        F: Fn(NodeRef<'_>, Option<&str>, &mut CompileContext) -> Result<Value, GrammarError>
            + Send
            + Sync
            + 'static,
    {
        self.compiler = Some(Box::new(compiler));
        self
    }

    pub fn host_dependent(mut self) -> Self {
        self.host_dependent = true;
        self
    }
}

impl fmt::Debug for FnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnType")
            .field("name", &self.name)
            .field("validator", &self.validator.is_some())
            .field("compiler", &self.compiler.is_some())
            .field("host_dependent", &self.host_dependent)
            .finish()
    }
}

impl ParserType for FnType {
    fn name(&self) -> &str {
        &self.name
    }

    fn checker(
        &self,
        host: &Host<'_>,
        param: Option<&str>,
        registry: &TypeRegistry,
    ) -> Result<Arc<Checker>, GrammarError> {
        (self.checker)(host, param, registry)
    }

    fn depends_on_host(&self) -> bool {
        self.host_dependent
    }

    fn is_valid(
        &self,
        host: &Host<'_>,
        this: NodeRef<'_>,
        param: Option<&str>,
        _registry: &TypeRegistry,
    ) -> bool {
        self.validator.as_ref().is_none_or(|v| v(host, this, param))
    }

    fn compile(
        &self,
        this: NodeRef<'_>,
        _index: usize,
        param: Option<&str>,
        ctx: &mut CompileContext,
        _registry: &TypeRegistry,
    ) -> Result<Value, GrammarError> {
        match &self.compiler {
            Some(compiler) => compiler(this, param, ctx),
            None => Ok(Value::Text(this.text())),
        }
    }
}
