use crate::document::{Document, DocumentId};
use crate::error::{Error, Result};
use indexmap::IndexMap;

/// Content of a node, tagged by its kind.
///
/// Comment, CData, and PI content is stored unescaped, as written between the delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeValue {
    /// The document node itself. Only slot 0 of each document has this value.
    Container,
    /// Element with its raw name, including its namespace prefix.
    Element(String),
    Text(String),
    Comment(String),
    CData(String),
    PI(String),
    DocType(String),
}

/// Kind of a node without its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Container,
    Element,
    Text,
    Comment,
    CData,
    PI,
    DocType,
    /// Attributes are not stored as nodes; only [`crate::Item`] reports this type.
    Attribute,
}

impl NodeValue {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeValue::Container => NodeType::Container,
            NodeValue::Element(_) => NodeType::Element,
            NodeValue::Text(_) => NodeType::Text,
            NodeValue::Comment(_) => NodeType::Comment,
            NodeValue::CData(_) => NodeType::CData,
            NodeValue::PI(_) => NodeType::PI,
            NodeValue::DocType(_) => NodeType::DocType,
        }
    }
}

#[derive(Debug)]
pub(crate) struct NodeData {
    pub(crate) value: NodeValue,
    pub(crate) attributes: IndexMap<String, String>, // q:attr="val" => {"q:attr": "val"}
    pub(crate) parent: Option<Node>,
    pub(crate) children: Vec<Node>,
}

/// Represents a node of a xml document: an element, comment, text and so on.
///
/// This struct only contains the id of its document and an index into that
/// document's node store, and implements trait `Copy`.
/// So you do not need to bother with having a reference.
///
/// Because the actual data of the node is stored in [`Document`],
/// most methods takes `&Document` or `&mut Document` as its first argument.
///
/// # Panics
///
/// Read accessors panic when given a [`Document`] that did not create the node.
/// Mutating methods return [`Error::WrongDocument`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Node {
    doc: DocumentId,
    id: usize,
}

impl Node {
    /// Create a new detached element with name.
    pub fn new_element<S: Into<String>>(document: &mut Document, name: S) -> Node {
        Self::create(document, NodeValue::Element(name.into()), IndexMap::new())
    }

    pub fn new_text<S: Into<String>>(document: &mut Document, text: S) -> Node {
        Self::create(document, NodeValue::Text(text.into()), IndexMap::new())
    }

    pub fn new_comment<S: Into<String>>(document: &mut Document, text: S) -> Node {
        Self::create(document, NodeValue::Comment(text.into()), IndexMap::new())
    }

    pub fn new_cdata<S: Into<String>>(document: &mut Document, text: S) -> Node {
        Self::create(document, NodeValue::CData(text.into()), IndexMap::new())
    }

    pub fn new_pi<S: Into<String>>(document: &mut Document, text: S) -> Node {
        Self::create(document, NodeValue::PI(text.into()), IndexMap::new())
    }

    pub fn new_doctype<S: Into<String>>(document: &mut Document, text: S) -> Node {
        Self::create(document, NodeValue::DocType(text.into()), IndexMap::new())
    }

    pub(crate) fn create(
        document: &mut Document,
        value: NodeValue,
        attributes: IndexMap<String, String>,
    ) -> Node {
        let node = Node {
            doc: document.id(),
            id: document.store.len(),
        };
        let data = NodeData {
            value,
            attributes,
            parent: None,
            children: vec![],
        };
        document.store.push(data);
        node
    }

    pub(crate) fn container(doc: DocumentId) -> (Node, NodeData) {
        let data = NodeData {
            value: NodeValue::Container,
            attributes: IndexMap::new(),
            parent: None,
            children: Vec::new(),
        };
        (Node { doc, id: 0 }, data)
    }

    pub fn is_container(&self) -> bool {
        self.id == 0
    }

    /// Whether this handle was created by `document`.
    pub fn belongs_to(&self, document: &Document) -> bool {
        self.doc == document.id()
    }

    pub fn separate_prefix_name(full_name: &str) -> (&str, &str) {
        match full_name.split_once(':') {
            Some((prefix, name)) => (prefix, name),
            None => ("", full_name),
        }
    }
}

impl Node {
    fn data<'a>(&self, document: &'a Document) -> &'a NodeData {
        assert!(
            self.belongs_to(document),
            "node {:?} read through a document that does not own it",
            self
        );
        &document.store[self.id]
    }

    fn mut_data<'a>(&self, document: &'a mut Document) -> Result<&'a mut NodeData> {
        if !self.belongs_to(document) {
            return Err(Error::WrongDocument);
        }
        document.store.get_mut(self.id).ok_or(Error::WrongDocument)
    }

    pub fn value<'a>(&self, document: &'a Document) -> &'a NodeValue {
        &self.data(document).value
    }

    pub fn node_type(&self, document: &Document) -> NodeType {
        self.value(document).node_type()
    }

    pub fn is_element(&self, document: &Document) -> bool {
        self.node_type(document) == NodeType::Element
    }

    /// Name of the node, as the DOM `nodeName` defines it.
    ///
    /// Elements give their raw name including prefix, PIs their target, and the
    /// other kinds a fixed `#kind` name.
    pub fn name<'a>(&self, document: &'a Document) -> &'a str {
        match self.value(document) {
            NodeValue::Container => "#document",
            NodeValue::Element(name) => name,
            NodeValue::Text(_) => "#text",
            NodeValue::Comment(_) => "#comment",
            NodeValue::CData(_) => "#cdata-section",
            NodeValue::PI(text) | NodeValue::DocType(text) => {
                text.split_whitespace().next().unwrap_or("")
            }
        }
    }

    /// Get prefix and name of element.
    ///
    /// `<prefix:name` -> `("prefix", "name")`
    pub fn prefix_name<'a>(&self, document: &'a Document) -> (&'a str, &'a str) {
        Self::separate_prefix_name(self.name(document))
    }

    pub fn prefix<'a>(&self, document: &'a Document) -> &'a str {
        self.prefix_name(document).0
    }

    pub fn local_name<'a>(&self, document: &'a Document) -> &'a str {
        self.prefix_name(document).1
    }

    /// Get attributes of element, in the order they were written or set.
    ///
    /// Namespace declarations (`xmlns`, `xmlns:p`) are kept here as plain attributes.
    /// Empty for every node kind other than element.
    pub fn attributes<'a>(&self, document: &'a Document) -> &'a IndexMap<String, String> {
        &self.data(document).attributes
    }

    pub fn attribute<'a>(&self, document: &'a Document, name: &str) -> Option<&'a str> {
        self.attributes(document).get(name).map(|v| v.as_str())
    }

    /// Sets an attribute, keeping its position if it already exists.
    ///
    /// Does nothing on non-element nodes.
    pub fn set_attribute<K, V>(&self, document: &mut Document, name: K, value: V) -> Result<()>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let data = self.mut_data(document)?;
        if let NodeValue::Element(_) = data.value {
            data.attributes.insert(name.into(), value.into());
        }
        Ok(())
    }

    pub fn remove_attribute(&self, document: &mut Document, name: &str) -> Result<Option<String>> {
        Ok(self.mut_data(document)?.attributes.shift_remove(name))
    }

    /// Replace the whole attribute set.
    pub(crate) fn replace_attributes(
        &self,
        document: &mut Document,
        attributes: IndexMap<String, String>,
    ) -> Result<()> {
        let data = self.mut_data(document)?;
        if let NodeValue::Element(_) = data.value {
            data.attributes = attributes;
        }
        Ok(())
    }

    pub fn parent(&self, document: &Document) -> Option<Node> {
        self.data(document).parent
    }

    /// ```ignore
    /// self.parent(document).is_some()
    /// ```
    pub fn has_parent(&self, document: &Document) -> bool {
        self.parent(document).is_some()
    }

    pub fn children<'a>(&self, document: &'a Document) -> &'a [Node] {
        &self.data(document).children
    }

    fn _children_recursive(&self, document: &Document, nodes: &mut Vec<Node>) {
        for node in self.children(document) {
            nodes.push(*node);
            node._children_recursive(document, nodes);
        }
    }

    /// All descendants in document order.
    pub fn children_recursive(&self, document: &Document) -> Vec<Node> {
        let mut nodes = Vec::new();
        self._children_recursive(document, &mut nodes);
        nodes
    }

    /// ```ignore
    /// !self.children(document).is_empty()
    /// ```
    pub fn has_children(&self, document: &Document) -> bool {
        !self.children(document).is_empty()
    }

    pub fn child_elements(&self, document: &Document) -> Vec<Node> {
        self.children(document)
            .iter()
            .filter(|node| node.is_element(document))
            .copied()
            .collect()
    }

    pub fn child_elements_recursive(&self, document: &Document) -> Vec<Node> {
        self.children_recursive(document)
            .into_iter()
            .filter(|node| node.is_element(document))
            .collect()
    }

    /// Position of this node among its parent's children.
    pub fn index_in_parent(&self, document: &Document) -> Option<usize> {
        let parent = self.parent(document)?;
        parent
            .children(document)
            .iter()
            .position(|child| child == self)
    }

    pub(crate) fn build_text_content(&self, document: &Document, buf: &mut String) {
        match self.value(document) {
            NodeValue::Text(text) | NodeValue::CData(text) => buf.push_str(text),
            NodeValue::Comment(text) | NodeValue::PI(text) => buf.push_str(text),
            NodeValue::DocType(_) => {}
            NodeValue::Element(_) | NodeValue::Container => {
                for child in self.children(document) {
                    match child.value(document) {
                        NodeValue::Comment(_) | NodeValue::PI(_) => {}
                        _ => child.build_text_content(document, buf),
                    }
                }
            }
        }
    }

    /// Implementation of [Node.textContent](https://developer.mozilla.org/en-US/docs/Web/API/Node/textContent)
    ///
    /// Elements concatenate the text and CData of their descendants.
    /// Comment, text, CData, and PI nodes return their own content.
    pub fn text_content(&self, document: &Document) -> String {
        let mut buf = String::new();
        self.build_text_content(document, &mut buf);
        buf
    }

    /// Set the text of this node.
    ///
    /// On an element, the text and CData children are removed and a single text
    /// node takes the place of the first of them (or is appended). Element,
    /// comment, and PI children stay where they are. An empty `text` only removes.
    pub fn set_text_content<S: Into<String>>(&self, document: &mut Document, text: S) -> Result<()> {
        let text = text.into();
        let data = self.mut_data(document)?;
        match &mut data.value {
            NodeValue::Text(content)
            | NodeValue::Comment(content)
            | NodeValue::CData(content)
            | NodeValue::PI(content)
            | NodeValue::DocType(content) => {
                *content = text;
                return Ok(());
            }
            NodeValue::Container => return Ok(()),
            NodeValue::Element(_) => {}
        }
        let children = self.children(document).to_vec();
        let mut kept = Vec::with_capacity(children.len());
        let mut insert_at = None;
        for child in children {
            match child.node_type(document) {
                NodeType::Text | NodeType::CData => {
                    insert_at.get_or_insert(kept.len());
                }
                _ => kept.push(child),
            }
        }
        if !text.is_empty() {
            let text_node = Node::new_text(document, text);
            let index = insert_at.unwrap_or(kept.len());
            kept.insert(index, text_node);
        }
        self.replace_children(document, kept)
    }

    fn check_new_child(&self, document: &Document, child: Node) -> Result<()> {
        if !self.belongs_to(document) || !child.belongs_to(document) {
            return Err(Error::WrongDocument);
        }
        if child.is_container() {
            return Err(Error::ContainerCannotMove);
        }
        if child.has_parent(document) {
            return Err(Error::HasAParent);
        }
        let mut current = Some(*self);
        while let Some(node) = current {
            if node == child {
                return Err(Error::IsAnAncestor);
            }
            current = node.parent(document);
        }
        Ok(())
    }

    /// Equivalent to `vec.push()`.
    ///
    /// # Errors
    ///
    /// - [`Error::HasAParent`]: The node must not have a parent.
    /// Call `node.detach()` before.
    /// - [`Error::ContainerCannotMove`]: The container cannot be a child.
    /// - [`Error::WrongDocument`]: Both nodes must belong to `document`.
    /// - [`Error::IsAnAncestor`]: `child` is `self` or one of its ancestors.
    pub fn push_child(&self, document: &mut Document, child: Node) -> Result<()> {
        self.check_new_child(document, child)?;
        child.mut_data(document)?.parent = Some(*self);
        self.mut_data(document)?.children.push(child);
        Ok(())
    }

    /// Append a node fresh from [`Node::create`]. Both nodes must come from `document`.
    pub(crate) fn append_created(&self, document: &mut Document, child: Node) {
        document.store[child.id].parent = Some(*self);
        document.store[self.id].children.push(child);
    }

    /// Remove child node by value.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: Node was not found among its children.
    pub fn remove_child(&self, document: &mut Document, child: Node) -> Result<()> {
        let children = &mut self.mut_data(document)?.children;
        let pos = children
            .iter()
            .position(|n| *n == child)
            .ok_or(Error::NotFound)?;
        children.remove(pos);
        child.mut_data(document)?.parent = None;
        Ok(())
    }

    /// Detach this node (and its subtree) from its parent. No-op when detached.
    pub fn detach(&self, document: &mut Document) -> Result<()> {
        if self.is_container() {
            return Err(Error::ContainerCannotMove);
        }
        let parent = self.mut_data(document)?.parent;
        if let Some(parent) = parent {
            parent.remove_child(document, *self)
        } else {
            Ok(())
        }
    }

    /// Clear the children list, then rebuild it from `children`.
    ///
    /// Every node in `children` must either be detached or already be a child of `self`.
    pub(crate) fn replace_children(&self, document: &mut Document, children: Vec<Node>) -> Result<()> {
        for child in &children {
            if !child.belongs_to(document) {
                return Err(Error::WrongDocument);
            }
            if child.is_container() {
                return Err(Error::ContainerCannotMove);
            }
            match child.parent(document) {
                Some(parent) if parent != *self => return Err(Error::HasAParent),
                _ => {}
            }
        }
        let old = std::mem::take(&mut self.mut_data(document)?.children);
        for child in old {
            child.mut_data(document)?.parent = None;
        }
        for child in &children {
            child.mut_data(document)?.parent = Some(*self);
        }
        self.mut_data(document)?.children = children;
        Ok(())
    }
}
