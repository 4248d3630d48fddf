//! XPath 1.0 location paths over a [`Document`].
//!
//! Expressions are evaluated with the container as context node. Every call
//! parses and walks the tree again; nothing is cached.
//!
//! The full XPath 1.0 core function library is available, plus `ends-with`.
//! Namespaces are not processed: names match as written (`p:name`), the
//! `namespace` axis is always empty, and `namespace-uri()` reads the `xmlns`
//! attributes in scope. `id()` looks elements up by their `xml:id` attribute.
//! Variables cannot be bound, so referencing one is an error.

mod ast;
mod eval;
mod lexer;
mod parser;

pub use self::eval::Item;

use self::eval::Evaluator;
use self::parser::parse;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::node::{Node, NodeType};
use tracing::trace;

/// Items selected by `expression`, deduplicated and in document order.
///
/// # Errors
///
/// [`Error::Query`] if the expression does not parse, or evaluates to something
/// other than a node-set.
pub fn resolve(document: &Document, expression: &str) -> Result<Vec<Item>> {
    let expr = parse(expression)?;
    let items = Evaluator::new(document, expression).select(&expr)?;
    trace!(expression, matches = items.len(), "resolved path");
    Ok(items)
}

impl Document {
    /// Shorthand for [`resolve`] on this document.
    pub fn select_items(&self, path: &str) -> Result<Vec<Item>> {
        resolve(self, path)
    }

    /// Nodes selected by `path`.
    ///
    /// # Errors
    ///
    /// [`Error::Query`] if the expression is invalid, or if it selects an
    /// attribute. Use [`Document::select_items`] for those paths.
    pub fn select(&self, path: &str) -> Result<Vec<Node>> {
        resolve(self, path)?
            .into_iter()
            .map(|item| {
                item.node().ok_or_else(|| {
                    Error::query(path, "selects attributes, use select_items")
                })
            })
            .collect()
    }
}

impl From<Node> for Item {
    fn from(node: Node) -> Item {
        Item::Node(node)
    }
}

impl Item {
    /// The selected node, or `None` for an attribute.
    pub fn node(&self) -> Option<Node> {
        match self {
            Item::Node(node) => Some(*node),
            Item::Attribute(..) => None,
        }
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self, Item::Attribute(..))
    }

    pub fn node_type(&self, document: &Document) -> NodeType {
        match self {
            Item::Node(node) => node.node_type(document),
            Item::Attribute(..) => NodeType::Attribute,
        }
    }

    /// Attribute name, or [`Node::name`].
    pub fn name<'a>(&self, document: &'a Document) -> &'a str {
        match self {
            Item::Node(node) => node.name(document),
            Item::Attribute(owner, index) => owner
                .attributes(document)
                .get_index(*index)
                .map_or("", |(name, _)| name.as_str()),
        }
    }

    /// Attribute value, or [`Node::text_content`].
    pub fn text_content(&self, document: &Document) -> String {
        match self {
            Item::Node(node) => node.text_content(document),
            Item::Attribute(owner, index) => owner
                .attributes(document)
                .get_index(*index)
                .map(|(_, value)| value.clone())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Document, Error, Item, NodeType};
    use std::str::FromStr;

    const XML: &str = r#"<?xml version="1.0"?>
<!-- top -->
<root xmlns:p="urn:p" xml:lang="en-GB">
    <a id="1">one</a>
    <!-- between -->
    <a id="2" kind="x">two</a>
    <p:b>three<c>four</c></p:b>
    <?target data?>
    <d xml:id="d1"><![CDATA[five]]></d>
</root>
"#;

    fn names(doc: &Document, path: &str) -> Vec<String> {
        doc.select_items(path)
            .unwrap()
            .iter()
            .map(|item| item.name(doc).to_string())
            .collect()
    }

    fn texts(doc: &Document, path: &str) -> Vec<String> {
        doc.select_items(path)
            .unwrap()
            .iter()
            .map(|item| item.text_content(doc))
            .collect()
    }

    #[test]
    fn test_root_selects_container() {
        let doc = Document::from_str(XML).unwrap();
        assert_eq!(doc.select("/").unwrap(), vec![doc.container()]);
        assert_eq!(names(&doc, "/*"), vec!["root"]);
        assert_eq!(names(&doc, "/node()"), vec!["#comment", "root"]);
    }

    #[test]
    fn test_paths() {
        let doc = Document::from_str(XML).unwrap();
        assert_eq!(names(&doc, "/root/a"), vec!["a", "a"]);
        assert_eq!(names(&doc, "//c"), vec!["c"]);
        assert_eq!(names(&doc, "//c/.."), vec!["p:b"]);
        assert_eq!(names(&doc, "//p:*"), vec!["p:b"]);
        assert_eq!(names(&doc, "//c/ancestor::*"), vec!["root", "p:b"]);
        assert_eq!(names(&doc, "/root/a[1]/following-sibling::*"), vec!["a", "p:b", "d"]);
        assert_eq!(names(&doc, "//d/preceding-sibling::*[1]"), vec!["p:b"]);
        assert!(doc.select("//missing").unwrap().is_empty());
    }

    #[test]
    fn test_following_and_preceding() {
        let doc = Document::from_str(XML).unwrap();
        assert_eq!(names(&doc, "/root/a[1]/following::*"), vec!["a", "p:b", "c", "d"]);
        assert_eq!(names(&doc, "//c/following::*"), vec!["d"]);
        assert_eq!(names(&doc, "//c/preceding::*"), vec!["a", "a"]);
        assert_eq!(texts(&doc, "//c/preceding::*[1]"), vec!["two"]);
        assert_eq!(names(&doc, "//a[@kind]/@kind/following::*[1]"), vec!["p:b"]);
        assert_eq!(texts(&doc, "//d/preceding::comment()"), vec![" top ", " between "]);
        assert!(doc.select("//root/namespace::*").unwrap().is_empty());
    }

    #[test]
    fn test_predicates() {
        let doc = Document::from_str(XML).unwrap();
        assert_eq!(texts(&doc, "//a[@id='2']"), vec!["two"]);
        assert_eq!(texts(&doc, "//a[@kind]"), vec!["two"]);
        assert_eq!(texts(&doc, "//a[last()]"), vec!["two"]);
        assert_eq!(texts(&doc, "//a[position() < 2]"), vec!["one"]);
        assert_eq!(texts(&doc, "//a[. = 'one' or @id = 2]"), vec!["one", "two"]);
        assert_eq!(texts(&doc, "/root/*[count(*) = 1]"), vec!["threefour"]);
        assert_eq!(texts(&doc, "//*[starts-with(name(), 'p:')]"), vec!["threefour"]);
        assert_eq!(texts(&doc, "//*[local-name() = 'b']"), vec!["threefour"]);
        assert_eq!(texts(&doc, "//d[. = 'five']"), vec!["five"]);
        assert_eq!(texts(&doc, "(//a | //d)[2]"), vec!["two"]);
        assert_eq!(texts(&doc, "//a[not(@kind) and string-length() = 3]"), vec!["one"]);
        assert_eq!(texts(&doc, "//a[@id * 2 = 4]"), vec!["two"]);
    }

    #[test]
    fn test_string_and_number_functions() {
        let doc = Document::from_str(XML).unwrap();
        assert_eq!(texts(&doc, "//a[substring(@kind, 1, 1) = 'x']"), vec!["two"]);
        assert_eq!(texts(&doc, "//a[substring(., 2) = 'ne']"), vec!["one"]);
        assert_eq!(texts(&doc, "//a[translate(., 'otw', 'OTW') = 'TWO']"), vec!["two"]);
        assert_eq!(texts(&doc, "//a[translate(., 'n', '') = 'oe']"), vec!["one"]);
        assert_eq!(texts(&doc, "//*[substring-after(name(), ':') = 'b']"), vec!["threefour"]);
        assert_eq!(texts(&doc, "//*[substring-before(name(), ':') = 'p']"), vec!["threefour"]);
        assert_eq!(names(&doc, "/root[sum(a/@id) = 3]"), vec!["root"]);
        assert_eq!(texts(&doc, "//a[floor(@id div 2) = 1]"), vec!["two"]);
        assert_eq!(texts(&doc, "//a[ceiling(@id div 2) = 1]"), vec!["one", "two"]);
        assert_eq!(texts(&doc, "//a[round(1.5) = @id]"), vec!["two"]);
        assert_eq!(texts(&doc, "//a[@id mod 2 = 1]"), vec!["one"]);
    }

    #[test]
    fn test_namespace_lang_and_id() {
        let doc = Document::from_str(XML).unwrap();
        assert_eq!(names(&doc, "//*[namespace-uri() = 'urn:p']"), vec!["p:b"]);
        assert_eq!(names(&doc, "//*[namespace-uri() = '' and name() = 'c']"), vec!["c"]);
        assert_eq!(
            names(&doc, "//d/@*[namespace-uri() = 'http://www.w3.org/XML/1998/namespace']"),
            vec!["xml:id"]
        );
        assert_eq!(texts(&doc, "//a[lang('en')]"), vec!["one", "two"]);
        assert_eq!(texts(&doc, "//a[lang('EN-gb')]"), vec!["one", "two"]);
        assert!(doc.select("//a[lang('fr') or lang('e')]").unwrap().is_empty());
        assert_eq!(names(&doc, "id('zz d1')"), vec!["d"]);
        assert_eq!(texts(&doc, "id('d1')/text()"), vec!["five"]);
    }

    #[test]
    fn test_attributes() {
        let doc = Document::from_str(XML).unwrap();
        let items = doc.select_items("//a/@id").unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(Item::is_attribute));
        assert_eq!(items[0].node(), None);
        assert_eq!(items[0].node_type(&doc), NodeType::Attribute);
        assert_eq!(texts(&doc, "//a/@id"), vec!["1", "2"]);
        assert_eq!(names(&doc, "//a[2]/@*"), vec!["id", "kind"]);
        assert_eq!(names(&doc, "//@kind/.."), vec!["a"]);

        let err = doc.select("//a/@id").unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
    }

    #[test]
    fn test_comments_and_pi() {
        let doc = Document::from_str(XML).unwrap();
        let comments = doc.select("//comment()").unwrap();
        assert_eq!(comments.len(), 2);
        assert!(comments
            .iter()
            .all(|node| node.node_type(&doc) == NodeType::Comment));
        assert_eq!(texts(&doc, "/root/comment()[contains(., 'between')]"), vec![" between "]);
        assert_eq!(doc.select("//processing-instruction('target')").unwrap().len(), 1);
        assert!(doc.select("//processing-instruction('other')").unwrap().is_empty());
        assert_eq!(texts(&doc, "/root/a[2]/text()"), vec!["two"]);
        assert_eq!(texts(&doc, "//d/text()"), vec!["five"]);
    }

    #[test]
    fn test_invalid_expressions() {
        let doc = Document::from_str(XML).unwrap();
        let invalid = [
            "\\",
            "//a[",
            "count(//a)",
            "//a[frobnicate()]",
            "//a[contains(.)]",
            "//a[$unbound]",
            "//a[substring(.)]",
        ];
        for bad in invalid.iter() {
            let err = doc.select_items(bad).unwrap_err();
            assert!(matches!(err, Error::Query { .. }), "{:?}", bad);
            assert_eq!(
                err.to_string(),
                format!("XPath expression '{}' evaluation error", bad)
            );
        }
    }
}
