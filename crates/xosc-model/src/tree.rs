//! Arena-backed XML tree
//!
//! Nodes live in a single `Vec` and are addressed by [`NodeId`]. Ids are never
//! reused or invalidated: removing a node only detaches it from its parent, so
//! callers can collect ids first and detach them all in one pass.
//!
//! All name lookups compare local names (the part after any `prefix:`), which
//! makes namespaced and plain documents behave identically.

use std::collections::HashSet;

/// Stable identifier of a node inside an [`XmlTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Element or attribute name as written in the source, with its local part
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    raw: String,
    local_start: usize,
}

impl QualifiedName {
    /// Create from a raw (possibly prefixed) name
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let local_start = raw.find(':').map_or(0, |i| i + 1);
        Self { raw, local_start }
    }

    /// Full name including prefix
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Local name (prefix stripped)
    #[inline]
    #[must_use]
    pub fn local(&self) -> &str {
        &self.raw[self.local_start..]
    }

    /// Namespace prefix, if any
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        (self.local_start > 0).then(|| &self.raw[..self.local_start - 1])
    }

    fn is_namespace_declaration(&self) -> bool {
        self.raw == "xmlns" || self.prefix() == Some("xmlns")
    }
}

/// A single element attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QualifiedName,
    pub value: String,
}

/// Element name plus attributes in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: QualifiedName,
    attributes: Vec<Attribute>,
}

impl Element {
    /// Create element without attributes
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: QualifiedName::new(name),
            attributes: Vec::new(),
        }
    }

    /// Builder-style attribute append
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_attribute(name, value);
        self
    }

    /// Qualified element name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    /// Local element name
    #[inline]
    #[must_use]
    pub fn local_name(&self) -> &str {
        self.name.local()
    }

    /// Attributes in source order
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Append an attribute without checking for an existing one
    pub fn push_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.push(Attribute {
            name: QualifiedName::new(name),
            value: value.into(),
        });
    }

    /// Attribute value by local name; namespace declarations are skipped
    #[must_use]
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| !a.name.is_namespace_declaration() && a.name.local() == local)
            .map(|a| a.value.as_str())
    }

    /// Attribute value by local name, treating an empty value as absent
    #[must_use]
    pub fn attr_non_empty(&self, local: &str) -> Option<&str> {
        self.attr(local).filter(|v| !v.is_empty())
    }

    /// Whether an attribute with this local name exists
    #[inline]
    #[must_use]
    pub fn has_attr(&self, local: &str) -> bool {
        self.attr(local).is_some()
    }

    /// Overwrite an attribute matched by local name, or append it
    pub fn set_attr(&mut self, local: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|a| !a.name.is_namespace_declaration() && a.name.local() == local)
        {
            Some(existing) => existing.value = value,
            None => self.push_attribute(local, value),
        }
    }
}

/// Content of a tree node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// XML document tree with a single root element
#[derive(Debug, Clone)]
pub struct XmlTree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl XmlTree {
    /// Create a tree holding only the root element
    #[must_use]
    pub fn new(root: Element) -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Element(root),
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
        }
    }

    /// Root element id
    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Node content
    #[inline]
    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    /// Element content, if the node is an element
    #[inline]
    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id) {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Mutable element content, if the node is an element
    #[inline]
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.index()].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Local name of an element node
    #[inline]
    #[must_use]
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::local_name)
    }

    /// Whether the node is an element with this local name
    #[inline]
    #[must_use]
    pub fn is_named(&self, id: NodeId, local: &str) -> bool {
        self.local_name(id) == Some(local)
    }

    /// Attribute of an element node by local name
    #[inline]
    #[must_use]
    pub fn attr(&self, id: NodeId, local: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(local))
    }

    /// Set an attribute on an element node; no-op for non-elements
    pub fn set_attr(&mut self, id: NodeId, local: &str, value: impl Into<String>) {
        if let Some(el) = self.element_mut(id) {
            el.set_attr(local, value);
        }
    }

    /// Parent of a node (`None` for the root and detached nodes)
    #[inline]
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    /// All children in document order
    #[inline]
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// Element children in document order
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&c| self.element(c).is_some())
    }

    /// Element children with a given local name
    pub fn children_named<'a>(
        &'a self,
        id: NodeId,
        local: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.element_children(id)
            .filter(move |&c| self.is_named(c, local))
    }

    /// First element child with a given local name
    #[must_use]
    pub fn first_child_named(&self, id: NodeId, local: &str) -> Option<NodeId> {
        self.children_named(id, local).next()
    }

    /// Whether the node has an element child with a given local name
    #[inline]
    #[must_use]
    pub fn has_child_named(&self, id: NodeId, local: &str) -> bool {
        self.first_child_named(id, local).is_some()
    }

    /// Follow a path of child local names, collecting every match
    #[must_use]
    pub fn child_path(&self, id: NodeId, path: &[&str]) -> Vec<NodeId> {
        let mut current = vec![id];
        for segment in path {
            current = current
                .into_iter()
                .flat_map(|n| self.children_named(n, segment).collect::<Vec<_>>())
                .collect();
        }
        current
    }

    /// First match of [`XmlTree::child_path`]
    #[must_use]
    pub fn first_child_path(&self, id: NodeId, path: &[&str]) -> Option<NodeId> {
        self.child_path(id, path).into_iter().next()
    }

    /// Descendants (excluding `id`) in document order
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { tree: self, stack }
    }

    /// Element descendants in document order
    pub fn descendant_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.descendants(id).filter(move |&n| self.element(n).is_some())
    }

    /// Element descendants with a given local name
    pub fn descendants_named<'a>(
        &'a self,
        id: NodeId,
        local: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.descendants(id).filter(move |&n| self.is_named(n, local))
    }

    /// Append a child node and return its id
    pub fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(NodeData {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Append a child element and return its id
    pub fn append_element(&mut self, parent: NodeId, element: Element) -> NodeId {
        self.append(parent, NodeKind::Element(element))
    }

    /// Detach every marked node from its parent in a single pass.
    ///
    /// The root cannot be detached. Returns the number of nodes that were
    /// attached to a parent before the call.
    pub fn detach_all(&mut self, marked: &HashSet<NodeId>) -> usize {
        let mut detached = 0;
        for node in &mut self.nodes {
            let before = node.children.len();
            node.children.retain(|c| !marked.contains(c));
            detached += before - node.children.len();
        }
        for &id in marked {
            if id != self.root && id.index() < self.nodes.len() {
                self.nodes[id.index()].parent = None;
            }
        }
        detached
    }

    fn subtree_eq(&self, a: NodeId, other: &Self, b: NodeId) -> bool {
        if self.kind(a) != other.kind(b) {
            return false;
        }
        let left = self.children(a);
        let right = other.children(b);
        left.len() == right.len()
            && left
                .iter()
                .zip(right)
                .all(|(&x, &y)| self.subtree_eq(x, other, y))
    }
}

impl PartialEq for XmlTree {
    /// Structural equality of the attached trees; ids are ignored
    fn eq(&self, other: &Self) -> bool {
        self.subtree_eq(self.root, other, other.root)
    }
}

impl Eq for XmlTree {}

/// Pre-order iterator over descendants
#[derive(Debug)]
pub struct Descendants<'a> {
    tree: &'a XmlTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (XmlTree, NodeId, NodeId, NodeId) {
        let mut tree = XmlTree::new(Element::new("ns:Root"));
        let root = tree.root();
        let a = tree.append_element(root, Element::new("A").with_attr("name", "first"));
        let b = tree.append_element(root, Element::new("ns:B"));
        let c = tree.append_element(a, Element::new("C"));
        tree.append(c, NodeKind::Text("hello".to_string()));
        (tree, a, b, c)
    }

    #[test]
    fn qualified_name_parts() {
        let name = QualifiedName::new("osc:Story");
        assert_eq!(name.local(), "Story");
        assert_eq!(name.prefix(), Some("osc"));
        assert_eq!(QualifiedName::new("Story").prefix(), None);
    }

    #[test]
    fn lookup_ignores_prefix() {
        let (tree, _, b, _) = sample();
        assert_eq!(tree.first_child_named(tree.root(), "B"), Some(b));
        assert_eq!(tree.local_name(tree.root()), Some("Root"));
    }

    #[test]
    fn descendants_are_preorder() {
        let (tree, a, b, c) = sample();
        let elements: Vec<_> = tree.descendant_elements(tree.root()).collect();
        assert_eq!(elements, vec![a, c, b]);
    }

    #[test]
    fn child_path_collects_matches() {
        let (tree, _, _, c) = sample();
        assert_eq!(tree.child_path(tree.root(), &["A", "C"]), vec![c]);
        assert!(tree.child_path(tree.root(), &["B", "C"]).is_empty());
    }

    #[test]
    fn detach_all_keeps_ids_stable() {
        let (mut tree, a, b, c) = sample();
        let marked: HashSet<_> = [a].into_iter().collect();
        assert_eq!(tree.detach_all(&marked), 1);
        let reachable: Vec<_> = tree.descendants(tree.root()).collect();
        assert!(!reachable.contains(&a));
        assert!(!reachable.contains(&c));
        assert!(reachable.contains(&b));
        // Detached subtree is still readable by id
        assert_eq!(tree.local_name(c), Some("C"));
        assert_eq!(tree.children(tree.root()), &[b]);
    }

    #[test]
    fn set_attr_overwrites_by_local_name() {
        let mut el = Element::new("Weather").with_attr("ns:cloudState", "free");
        el.set_attr("cloudState", "rainy");
        assert_eq!(el.attributes().len(), 1);
        assert_eq!(el.attr("cloudState"), Some("rainy"));
        el.set_attr("fog", "x");
        assert_eq!(el.attributes().len(), 2);
    }

    #[test]
    fn namespace_declarations_are_not_attributes() {
        let el = Element::new("Root").with_attr("xmlns:name", "urn:x");
        assert_eq!(el.attr("name"), None);
    }

    #[test]
    fn structural_equality_ignores_detached_nodes() {
        let (mut left, a, _, _) = sample();
        let (right, _, _, _) = sample();
        assert_eq!(left, right);
        let marked: HashSet<_> = [a].into_iter().collect();
        left.detach_all(&marked);
        assert_ne!(left, right);
    }
}
