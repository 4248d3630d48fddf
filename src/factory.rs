use crate::document::Document;
use crate::error::{Error, Result};
use crate::node::{Node, NodeValue};
use crate::parser::ReadOptions;
use indexmap::IndexMap;

/// Builds an element with its text and attributes in one go.
///
/// ```
/// use xml_config::{Document, Node};
///
/// let mut doc = Document::new();
/// let user = Node::build("Username")
///     .text_content("admin")
///     .attribute("encrypted", "false")
///     .finish(&mut doc);
/// assert_eq!(user.text_content(&doc), "admin");
/// assert!(!user.has_parent(&doc));
/// ```
#[derive(Debug, Clone)]
pub struct ElementBuilder {
    name: String,
    text: String,
    attributes: IndexMap<String, String>,
}

impl Node {
    pub fn build<S: Into<String>>(name: S) -> ElementBuilder {
        ElementBuilder {
            name: name.into(),
            text: String::new(),
            attributes: IndexMap::new(),
        }
    }
}

impl ElementBuilder {
    /// Text of the element. Empty text adds no text node.
    pub fn text_content<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
    }

    pub fn attribute<K, V>(mut self, name: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attributes<I, K, V>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.attributes.extend(
            attributes
                .into_iter()
                .map(|(name, value)| (name.into(), value.into())),
        );
        self
    }

    /// Create the element as a detached node of `document`.
    pub fn finish(self, document: &mut Document) -> Node {
        let element = Node::create(document, NodeValue::Element(self.name), self.attributes);
        if !self.text.is_empty() {
            let text = Node::new_text(document, self.text);
            element.append_created(document, text);
        }
        element
    }

    /// Create the element and append it to `parent`.
    ///
    /// # Errors
    ///
    /// - [`Error::WrongDocument`]: `parent` belongs to another document.
    pub fn push_to(self, document: &mut Document, parent: Node) -> Result<Node> {
        let element = self.finish(document);
        parent.push_child(document, element)?;
        Ok(element)
    }
}

impl Document {
    /// Build a detached element named `name` with text `value` and `attributes`.
    pub fn build_config<I, K, V>(&mut self, name: &str, value: &str, attributes: I) -> Node
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Node::build(name)
            .text_content(value)
            .attributes(attributes)
            .finish(self)
    }

    /// Parse `fragment` as a single element and copy it into this document.
    ///
    /// The returned node is detached, ready for [`crate::ConfigOperator::add_config`]
    /// or [`crate::ConfigOperator::update_config`].
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedFragment`]: `fragment` is empty, has no element,
    /// or is not well-formed.
    pub fn create_config(&mut self, fragment: &str) -> Result<Node> {
        let malformed = |reason: String| Error::MalformedFragment {
            fragment: fragment.to_string(),
            reason,
        };
        let parsed = Document::parse_str_with_opts(fragment, ReadOptions::default())
            .map_err(|err| malformed(err.to_string()))?;
        let root = parsed
            .root_element()
            .ok_or_else(|| malformed(String::from("no element found")))?;
        self.import_node(&parsed, root)
    }
}
