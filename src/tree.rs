//! Match trees produced by a successful parse.
//!
//! Nodes store char offsets into the parsed text; [`NodeRef`] pairs a node
//! with that text so spans can be read back as strings.

use std::fmt;
use std::sync::Arc;

use crate::error::GrammarError;
use crate::types::{CompileContext, TypeRegistry, Value};

/// One consumed entry repeat: its span, assigned name/type and sub-tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchNode {
    pub name: Option<String>,
    pub type_name: Option<String>,
    pub param: Option<String>,
    pub start: usize,
    pub end: usize,
    pub children: Vec<MatchNode>,
}

impl MatchNode {
    pub fn leaf(start: usize, end: usize) -> Self {
        Self {
            name: None,
            type_name: None,
            param: None,
            start,
            end,
            children: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Unnamed, untyped and childless.
    pub fn is_anonymous(&self) -> bool {
        self.name.is_none() && self.type_name.is_none() && self.children.is_empty()
    }
}

/// Append-only node sequence whose clones share every node already pushed.
///
/// The engine saves its session stack on each backtracking choice, so a
/// clone must not copy the nodes gathered so far.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeList {
    tail: Option<Arc<Link>>,
    len: usize,
}

#[derive(Debug)]
struct Link {
    node: MatchNode,
    prev: Option<Arc<Link>>,
}

impl NodeList {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn push(&mut self, node: MatchNode) {
        let prev = self.tail.take();
        self.tail = Some(Arc::new(Link { node, prev }));
        self.len += 1;
    }

    /// Nodes from last to first, each with its position in the list.
    pub(crate) fn iter_rev(&self) -> impl Iterator<Item = (usize, &MatchNode)> {
        let links = std::iter::successors(self.tail.as_deref(), |link| link.prev.as_deref());
        (0..self.len).rev().zip(links.map(|link| &link.node))
    }

    /// Moves out the nodes no other list shares and clones the rest.
    pub(crate) fn into_vec(mut self) -> Vec<MatchNode> {
        let mut nodes = Vec::with_capacity(self.len);
        let mut next = self.tail.take();
        while let Some(link) = next {
            match Arc::try_unwrap(link) {
                Ok(Link { node, prev }) => {
                    nodes.push(node);
                    next = prev;
                }
                Err(shared) => {
                    let rest = std::iter::successors(Some(&*shared), |l| l.prev.as_deref());
                    nodes.extend(rest.map(|l| l.node.clone()));
                    break;
                }
            }
        }
        nodes.reverse();
        nodes
    }

    /// Addresses of the links holding this list's nodes.
    #[cfg(test)]
    pub(crate) fn link_addrs(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.tail.as_ref(), |link| link.prev.as_ref())
            .map(|link| Arc::as_ptr(link) as usize)
    }

    #[cfg(test)]
    fn shares_tail_with(&self, other: &NodeList) -> bool {
        match (&self.tail, &other.tail) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Extend<MatchNode> for NodeList {
    fn extend<I: IntoIterator<Item = MatchNode>>(&mut self, nodes: I) {
        for node in nodes {
            self.push(node);
        }
    }
}

// Unlink iteratively so long lists do not overflow the stack.
impl Drop for NodeList {
    fn drop(&mut self) {
        let mut next = self.tail.take();
        while let Some(link) = next {
            next = match Arc::try_unwrap(link) {
                Ok(Link { prev, .. }) => prev,
                Err(_) => None,
            };
        }
    }
}

/// Result of a successful `parse`, `match_text` or `find`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchTree {
    text: Arc<[char]>,
    root: MatchNode,
}

impl MatchTree {
    pub(crate) fn new(text: Arc<[char]>, start: usize, end: usize, nodes: Vec<MatchNode>) -> Self {
        let mut root = MatchNode::leaf(start, end);
        root.children = nodes;
        Self { text, root }
    }

    pub fn start(&self) -> usize {
        self.root.start
    }

    pub fn end(&self) -> usize {
        self.root.end
    }

    /// Matched length in chars.
    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn source(&self) -> &[char] {
        &self.text
    }

    /// Top-level nodes.
    pub fn nodes(&self) -> &[MatchNode] {
        &self.root.children
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef::new(&self.text, &self.root, 0)
    }

    /// Matched text.
    pub fn text(&self) -> String {
        self.root().text()
    }

    /// First node named `name`, depth first.
    pub fn find(&self, name: &str) -> Option<NodeRef<'_>> {
        self.root().find(name)
    }

    pub fn find_all(&self, name: &str) -> Vec<NodeRef<'_>> {
        self.root().find_all(name)
    }
}

impl fmt::Display for MatchTree {
    /// Indented outline of every named or typed node, one per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}..{} {:?}", self.start(), self.end(), self.text())?;
        for child in self.root().children() {
            child.write_outline(f, 1)?;
        }
        Ok(())
    }
}

/// A node together with the text it indexes into.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    text: &'a [char],
    node: &'a MatchNode,
    index: usize,
}

impl<'a> NodeRef<'a> {
    pub fn new(text: &'a [char], node: &'a MatchNode, index: usize) -> Self {
        Self { text, node, index }
    }

    pub fn node(&self) -> &'a MatchNode {
        self.node
    }

    /// Position among the parent's children.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> Option<&'a str> {
        self.node.name.as_deref()
    }

    pub fn type_name(&self) -> Option<&'a str> {
        self.node.type_name.as_deref()
    }

    pub fn param(&self) -> Option<&'a str> {
        self.node.param.as_deref()
    }

    pub fn start(&self) -> usize {
        self.node.start
    }

    pub fn end(&self) -> usize {
        self.node.end
    }

    pub fn len(&self) -> usize {
        self.node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_empty()
    }

    /// The whole text the tree was parsed from.
    pub fn source(&self) -> &'a [char] {
        self.text
    }

    pub fn chars(&self) -> &'a [char] {
        &self.text[self.node.start..self.node.end]
    }

    pub fn text(&self) -> String {
        self.chars().iter().collect()
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let text = self.text;
        self.node
            .children
            .iter()
            .enumerate()
            .map(move |(index, node)| NodeRef::new(text, node, index))
    }

    /// Direct child named `name`.
    pub fn child(&self, name: &str) -> Option<NodeRef<'a>> {
        self.children().find(|c| c.name() == Some(name))
    }

    /// Direct children with type `type_name`.
    pub fn typed_children(&self, type_name: &str) -> Vec<NodeRef<'a>> {
        self.children()
            .filter(|c| c.type_name() == Some(type_name))
            .collect()
    }

    /// First descendant named `name`, depth first.
    pub fn find(&self, name: &str) -> Option<NodeRef<'a>> {
        for child in self.children() {
            if child.name() == Some(name) {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// Every descendant named `name`, in document order.
    pub fn find_all(&self, name: &str) -> Vec<NodeRef<'a>> {
        let mut found = Vec::new();
        self.walk(&mut |n| {
            if n.name() == Some(name) {
                found.push(n);
            }
        });
        found
    }

    /// Visit every descendant in document order.
    pub fn walk(&self, visit: &mut dyn FnMut(NodeRef<'a>)) {
        for child in self.children() {
            visit(child);
            child.walk(visit);
        }
    }

    /// Compile this node into a value through its type.
    ///
    /// Untyped nodes with children become a list of their children's values;
    /// other untyped nodes become their text.
    pub fn value(
        &self,
        registry: &TypeRegistry,
        ctx: &mut CompileContext,
    ) -> Result<Value, GrammarError> {
        match self.type_name() {
            Some(type_name) => {
                let ty = registry
                    .lookup(type_name)
                    .map_err(|_| GrammarError::UnknownType {
                        name: type_name.to_string(),
                        offset: self.start(),
                    })?;
                ty.compile(*self, self.index, self.param(), ctx, registry)
            }
            None if !self.node.children.is_empty() => self
                .children()
                .map(|c| c.value(registry, ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            None => Ok(Value::Text(self.text())),
        }
    }

    fn write_outline(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let label = match (self.name(), self.type_name()) {
            (Some(name), Some(ty)) if name != ty => Some(format!("{name}: !{ty}!")),
            (Some(name), _) => Some(name.to_string()),
            (None, Some(ty)) => Some(format!("!{ty}!")),
            (None, None) => None,
        };
        let depth = match label {
            Some(label) => {
                writeln!(
                    f,
                    "{:indent$}{label} {}..{} {:?}",
                    "",
                    self.start(),
                    self.end(),
                    self.text(),
                    indent = depth * 2
                )?;
                depth + 1
            }
            None => depth,
        };
        for child in self.children() {
            child.write_outline(f, depth)?;
        }
        Ok(())
    }
}
