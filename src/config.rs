use crate::document::Document;
use crate::node::Node;
use crate::xpath::Item;
use indexmap::IndexMap;

/// Read-only view of a configuration node or attribute, compared by content.
///
/// Two views are equal when their names, text contents, and attribute sets are
/// equal. Attribute order does not matter, and the views may come from
/// different documents. An attribute has no attributes of its own and its
/// value is its text content.
///
/// ```
/// use xml_config::Document;
///
/// let a = Document::parse_str(r#"<Port b="2" a="1">80</Port>"#).unwrap();
/// let b = Document::parse_str(r#"<Port a="1" b="2">80</Port>"#).unwrap();
/// assert_eq!(a.config(a.root_element().unwrap()), b.config(b.root_element().unwrap()));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Config<'d> {
    document: &'d Document,
    item: Item,
}

impl Document {
    pub fn config<I: Into<Item>>(&self, item: I) -> Config<'_> {
        Config {
            document: self,
            item: item.into(),
        }
    }
}

impl<'d> Config<'d> {
    pub fn item(&self) -> Item {
        self.item
    }

    /// `None` when the view is an attribute.
    pub fn node(&self) -> Option<Node> {
        self.item.node()
    }

    pub fn name(&self) -> &'d str {
        self.item.name(self.document)
    }

    /// Full text content.
    pub fn value(&self) -> String {
        self.item.text_content(self.document)
    }

    fn attribute_map(&self) -> Option<&'d IndexMap<String, String>> {
        self.node().map(|node| node.attributes(self.document))
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&'d str, &'d str)> {
        self.attribute_map()
            .into_iter()
            .flat_map(|map| map.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn attribute(&self, name: &str) -> Option<&'d str> {
        self.attribute_map()
            .and_then(|map| map.get(name))
            .map(|value| value.as_str())
    }
}

impl PartialEq for Config<'_> {
    fn eq(&self, other: &Config<'_>) -> bool {
        self.name() == other.name()
            && self.attributes().count() == other.attributes().count()
            && self
                .attributes()
                .all(|(name, value)| other.attribute(name) == Some(value))
            && self.value() == other.value()
    }
}

impl Eq for Config<'_> {}
