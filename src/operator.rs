use crate::document::Document;
use crate::error::{Error, Result};
use crate::node::{Node, NodeType};
use crate::xpath::Item;
use tracing::debug;

/// Where [`ConfigOperator::add_config`] puts the new node, relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    /// Previous sibling of the target.
    Before,
    /// Last child of the target.
    At,
    /// Next sibling of the target.
    After,
}

/// Reads and mutates configuration nodes addressed by XPath expressions.
///
/// Every operation resolves its path against the current state of the document
/// and works on the first match, the target.
/// A path matching nothing is reported with `Ok(false)` or `Ok(None)`;
/// only an invalid expression or a misused node handle is an error.
/// Paths may select attributes: they exist and can be read, but update, add,
/// and remove only apply to nodes and return `false` for them.
///
/// The container (`/`) is never added to or removed, and the root element keeps
/// being the only top level element.
///
/// # Examples
/// ```
/// use xml_config::{Document, Position};
///
/// let mut doc = Document::parse_str("<Server><Port>80</Port></Server>").unwrap();
/// let host = doc.build_config("Host", "localhost", Vec::<(String, String)>::new());
/// let mut operator = doc.operator();
/// assert!(operator.add_config("//Port", host, Position::Before).unwrap());
/// assert!(operator.config_exists("/Server/Host").unwrap());
/// assert!(!operator.remove_config("/").unwrap());
/// ```
#[derive(Debug)]
pub struct ConfigOperator<'d> {
    document: &'d mut Document,
}

impl Document {
    pub fn operator(&mut self) -> ConfigOperator<'_> {
        ConfigOperator::new(self)
    }
}

impl<'d> ConfigOperator<'d> {
    pub fn new(document: &'d mut Document) -> ConfigOperator<'d> {
        ConfigOperator { document }
    }

    pub fn document(&self) -> &Document {
        self.document
    }

    fn target(&self, path: &str) -> Result<Option<Item>> {
        let target = self.document.select_items(path)?.into_iter().next();
        if target.is_none() {
            debug!(path, "no node matches path");
        }
        Ok(target)
    }

    /// The target node, `None` when nothing matches or the target is an attribute.
    fn target_node(&self, path: &str) -> Result<Option<Node>> {
        let target = self.target(path)?;
        if let Some(Item::Attribute(..)) = target {
            debug!(path, "target is an attribute");
        }
        Ok(target.and_then(|item| item.node()))
    }

    fn check_new_node(&self, node: Node) -> Result<()> {
        if !node.belongs_to(self.document) {
            return Err(Error::WrongDocument);
        }
        if node.is_container() {
            return Err(Error::ContainerCannotMove);
        }
        if node.has_parent(self.document) {
            return Err(Error::HasAParent);
        }
        Ok(())
    }

    /// Whether `path` matches at least one node or attribute.
    ///
    /// # Errors
    ///
    /// - [`Error::Query`]: Invalid expression.
    pub fn config_exists(&self, path: &str) -> Result<bool> {
        Ok(self.target(path)?.is_some())
    }

    /// First node or attribute matched by `path`.
    ///
    /// When `path` matches the container, its first child is returned instead,
    /// which may be a comment preceding the root element.
    ///
    /// # Errors
    ///
    /// - [`Error::Query`]: Invalid expression.
    pub fn get_config(&self, path: &str) -> Result<Option<Item>> {
        let target = match self.target(path)? {
            Some(target) => target,
            None => return Ok(None),
        };
        match target {
            Item::Node(node) if node.is_container() => Ok(node
                .children(self.document)
                .first()
                .copied()
                .map(Item::Node)),
            target => Ok(Some(target)),
        }
    }

    /// Copy the text content and attributes of `new` onto the target element.
    ///
    /// The attribute set of the target is replaced by the one of `new`.
    /// Text and CData children of the target are replaced by a single text node,
    /// its element and comment children stay. Children of `new` only contribute
    /// their text. Returns `false` if nothing matches or the target is not an element.
    /// Attributes are not elements.
    ///
    /// # Errors
    ///
    /// - [`Error::Query`]: Invalid expression.
    /// - [`Error::WrongDocument`]: `new` belongs to another document.
    pub fn update_config(&mut self, path: &str, new: Node) -> Result<bool> {
        if !new.belongs_to(self.document) {
            return Err(Error::WrongDocument);
        }
        let target = match self.target_node(path)? {
            Some(target) => target,
            None => return Ok(false),
        };
        if !target.is_element(self.document) {
            debug!(path, node_type = ?target.node_type(self.document), "target is not an element");
            return Ok(false);
        }
        let attributes = new.attributes(self.document).clone();
        let text = new.text_content(self.document);
        target.replace_attributes(self.document, attributes)?;
        target.set_text_content(self.document, text)?;
        debug!(path, "updated config");
        Ok(true)
    }

    /// Insert `new` at `position` relative to the target.
    ///
    /// [`Position::At`] appends `new` to the children of the target element.
    /// [`Position::Before`] and [`Position::After`] splice it next to the target,
    /// which may be any node with a parent, comments included.
    ///
    /// Returns `false` without mutating when nothing matches, when the target is
    /// the container or an attribute, when [`Position::At`] targets a non-element, or when the
    /// insertion would put a second element or text beside the root element.
    ///
    /// # Errors
    ///
    /// - [`Error::Query`]: Invalid expression.
    /// - [`Error::WrongDocument`]: `new` belongs to another document.
    /// - [`Error::HasAParent`]: `new` is attached. Call `new.detach()` first.
    /// - [`Error::ContainerCannotMove`]: `new` is the container.
    pub fn add_config(&mut self, path: &str, new: Node, position: Position) -> Result<bool> {
        self.check_new_node(new)?;
        let target = match self.target_node(path)? {
            Some(target) => target,
            None => return Ok(false),
        };
        if target.is_container() {
            debug!(path, ?position, "refusing to add next to the container");
            return Ok(false);
        }
        let doc = &mut *self.document;
        match position {
            Position::At => {
                if !target.is_element(doc) {
                    debug!(path, "cannot add children to a non-element");
                    return Ok(false);
                }
                target.push_child(doc, new)?;
            }
            Position::Before | Position::After => {
                let parent = match target.parent(doc) {
                    Some(parent) => parent,
                    None => return Ok(false),
                };
                let top_level_content = matches!(
                    new.node_type(doc),
                    NodeType::Element | NodeType::Text | NodeType::CData
                );
                if parent.is_container() && top_level_content {
                    debug!(path, ?position, "refusing to add a sibling to the root element");
                    return Ok(false);
                }
                let siblings = parent.children(doc);
                let mut children = Vec::with_capacity(siblings.len() + 1);
                for sibling in siblings {
                    if *sibling == target && position == Position::Before {
                        children.push(new);
                    }
                    children.push(*sibling);
                    if *sibling == target && position == Position::After {
                        children.push(new);
                    }
                }
                parent.replace_children(doc, children)?;
            }
        }
        debug!(path, ?position, "added config");
        Ok(true)
    }

    /// Detach the target and its subtree from its parent.
    ///
    /// Returns `false` if nothing matches, or the target is the container, the
    /// root element, or an attribute.
    ///
    /// # Errors
    ///
    /// - [`Error::Query`]: Invalid expression.
    pub fn remove_config(&mut self, path: &str) -> Result<bool> {
        let target = match self.target_node(path)? {
            Some(target) => target,
            None => return Ok(false),
        };
        let parent = match target.parent(self.document) {
            Some(parent) => parent,
            None => {
                debug!(path, "refusing to remove a node without parent");
                return Ok(false);
            }
        };
        if parent.is_container() && target.is_element(self.document) {
            debug!(path, "refusing to remove the root element");
            return Ok(false);
        }
        target.detach(self.document)?;
        debug!(path, "removed config");
        Ok(true)
    }
}
