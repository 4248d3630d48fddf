use crate::error::{Error, Result};
use crate::node::{Node, NodeData, NodeValue};
use crate::parser::{DocumentParser, ReadOptions};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

static NEXT_DOCUMENT_ID: AtomicUsize = AtomicUsize::new(0);

/// Process-unique identity of a [`Document`]. Every [`Node`] carries the id of
/// the document that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(usize);

/// Options when writing xml.
///
/// The defaults write 4-space indentation and omit the XML declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub indent_char: u8,
    pub indent_size: usize,
    pub write_decl: bool,
}

impl Default for WriteOptions {
    fn default() -> WriteOptions {
        WriteOptions {
            indent_char: b' ',
            indent_size: 4,
            write_decl: false,
        }
    }
}

/// Represents a XML document.
///
/// All nodes live in the document's store and are addressed by [`Node`] handles.
/// Slot 0 is the container: the document node above the root element, which also
/// holds top level comments, processing instructions, and the doctype.
///
/// # Examples
/// ```
/// use xml_config::Document;
///
/// let mut doc = Document::parse_str(r#"<package>
///     <metadata>
///         <author>Lewis Carol</author>
///     </metadata>
/// </package>
/// "#).unwrap();
/// let author = doc.select("/package/metadata/author").unwrap()[0];
/// author.set_text_content(&mut doc, "Lewis Carroll").unwrap();
/// let xml = doc.write_str().unwrap();
/// assert!(xml.contains("Lewis Carroll"));
/// ```
#[derive(Debug)]
pub struct Document {
    id: DocumentId,
    pub(crate) store: Vec<NodeData>,
    container: Node,

    pub(crate) version: String,
    pub(crate) standalone: bool,
}

impl Document {
    /// Create a blank new xml document.
    pub fn new() -> Document {
        let id = DocumentId(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed));
        let (container, container_data) = Node::container(id);
        Document {
            id,
            store: vec![container_data],
            container,
            version: String::from("1.0"),
            standalone: false,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn container(&self) -> Node {
        self.container
    }

    /// True if no node was ever created in this document.
    pub fn is_empty(&self) -> bool {
        self.store.len() == 1
    }

    /// Get first element of document.
    pub fn root_element(&self) -> Option<Node> {
        self.container
            .children(self)
            .iter()
            .find(|node| node.is_element(self))
            .copied()
    }

    /// Deep copy `node` from `source` into this document.
    ///
    /// The copy is detached. Importing is the only way to move nodes across documents.
    ///
    /// # Errors
    ///
    /// - [`Error::ContainerCannotMove`]: The container cannot be imported.
    pub fn import_node(&mut self, source: &Document, node: Node) -> Result<Node> {
        if node.is_container() {
            return Err(Error::ContainerCannotMove);
        }
        let copy = Node::create(
            self,
            node.value(source).clone(),
            node.attributes(source).clone(),
        );
        for child in node.children(source) {
            let child_copy = self.import_node(source, *child)?;
            copy.push_child(self, child_copy)?;
        }
        Ok(copy)
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

// Read and write
impl Document {
    /// Parses xml string.
    pub fn parse_str(str: &str) -> Result<Document> {
        Self::parse_str_with_opts(str, ReadOptions::default())
    }

    pub fn parse_str_with_opts(str: &str, opts: ReadOptions) -> Result<Document> {
        DocumentParser::parse_reader(str.as_bytes(), opts)
    }

    /// Parses xml from reader. The encoding is detected from the byte order mark
    /// and the XML declaration.
    ///
    /// # Errors
    ///
    /// - [`Error::CannotDecode`]: Could not decode XML.
    /// - [`Error::MalformedXML`]: Could not read XML.
    /// - [`Error::Io`]: IO Error
    pub fn parse_reader<R: Read>(reader: R) -> Result<Document> {
        DocumentParser::parse_reader(reader, ReadOptions::default())
    }

    pub fn parse_reader_with_opts<R: Read>(reader: R, opts: ReadOptions) -> Result<Document> {
        DocumentParser::parse_reader(reader, opts)
    }

    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Document> {
        Self::parse_file_with_opts(path, ReadOptions::default())
    }

    pub fn parse_file_with_opts<P: AsRef<Path>>(path: P, opts: ReadOptions) -> Result<Document> {
        let path = path.as_ref();
        debug!(path = %path.display(), "parsing document");
        let file = File::open(path)?;
        DocumentParser::parse_reader(BufReader::new(file), opts)
    }

    /// Writes document as xml string.
    pub fn write_str(&self) -> Result<String> {
        self.write_str_with_opts(&WriteOptions::default())
    }

    pub fn write_str_with_opts(&self, opts: &WriteOptions) -> Result<String> {
        let mut buf: Vec<u8> = Vec::with_capacity(200);
        self.write_with_opts(&mut buf, opts)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Write document to writer. Will be written in UTF-8.
    pub fn write(&self, writer: &mut impl Write) -> Result<()> {
        self.write_with_opts(writer, &WriteOptions::default())
    }

    pub fn write_with_opts(&self, writer: &mut impl Write, opts: &WriteOptions) -> Result<()> {
        let container = self.container();
        let mut writer = Writer::new_with_indent(writer, opts.indent_char, opts.indent_size);
        if opts.write_decl {
            self.write_decl(&mut writer)?;
        }
        self.write_nodes(&mut writer, container.children(self))?;
        writer.write_event(Event::Eof)?;
        Ok(())
    }

    /// Serialize the document to `path`, replacing its content.
    ///
    /// # Errors
    ///
    /// - [`Error::Persist`]: wraps the IO or writer error. There is no partial-write
    /// protection: a failed save may leave a truncated file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save_with_opts(path, &WriteOptions::default())
    }

    pub fn save_with_opts<P: AsRef<Path>>(&self, path: P, opts: &WriteOptions) -> Result<()> {
        let path = path.as_ref();
        let persist = |err: Error| Error::Persist(Box::new(err));
        let file = File::create(path).map_err(|err| persist(Error::Io(err)))?;
        let mut writer = BufWriter::new(file);
        self.write_with_opts(&mut writer, opts).map_err(persist)?;
        writer.flush().map_err(|err| persist(Error::Io(err)))?;
        info!(path = %path.display(), "saved document");
        Ok(())
    }

    fn write_decl(&self, writer: &mut Writer<impl Write>) -> Result<()> {
        let standalone = match self.standalone {
            true => Some("yes".as_bytes()),
            false => None,
        };
        writer.write_event(Event::Decl(BytesDecl::new(
            self.version.as_bytes(),
            Some("UTF-8".as_bytes()),
            standalone,
        )))?;
        Ok(())
    }

    fn write_nodes(&self, writer: &mut Writer<impl Write>, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            match node.value(self) {
                NodeValue::Element(_) => self.write_element(writer, *node)?,
                NodeValue::Text(text) => {
                    writer.write_event(Event::Text(BytesText::from_plain_str(text)))?
                }
                NodeValue::DocType(text) => {
                    writer.write_event(Event::DocType(BytesText::from_escaped_str(text)))?
                }
                // Comment, CData, and PI content is not escaped.
                NodeValue::Comment(text) => {
                    writer.write_event(Event::Comment(BytesText::from_escaped_str(text)))?
                }
                NodeValue::CData(text) => {
                    writer.write_event(Event::CData(BytesText::from_escaped_str(text)))?
                }
                NodeValue::PI(text) => {
                    writer.write_event(Event::PI(BytesText::from_escaped_str(text)))?
                }
                NodeValue::Container => {}
            };
        }
        Ok(())
    }

    fn write_element(&self, writer: &mut Writer<impl Write>, element: Node) -> Result<()> {
        let name_bytes = element.name(self).as_bytes();
        let mut start = BytesStart::borrowed_name(name_bytes);
        // The `&str` pair escapes the value, the byte pair would not.
        for (key, val) in element.attributes(self) {
            start.push_attribute((key.as_str(), val.as_str()));
        }
        if element.has_children(self) {
            writer.write_event(Event::Start(start))?;
            self.write_nodes(writer, element.children(self))?;
            writer.write_event(Event::End(BytesEnd::borrowed(name_bytes)))?;
        } else {
            writer.write_event(Event::Empty(start))?;
        }
        Ok(())
    }
}

impl FromStr for Document {
    type Err = Error;

    fn from_str(s: &str) -> Result<Document> {
        Document::parse_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_element() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <basic>
            Text
            <c />
        </basic>
        "#;
        let mut document = Document::from_str(xml).unwrap();
        let basic = document.root_element().unwrap();
        let p = Node::new_element(&mut document, "p");
        basic.push_child(&mut document, p).unwrap();
        assert_eq!(p.parent(&document).unwrap(), basic);
        assert_eq!(p, *basic.children(&document).last().unwrap())
    }

    #[test]
    fn test_documents_have_distinct_ids() {
        let a = Document::new();
        let b = Document::new();
        assert_ne!(a.id(), b.id());
        assert!(a.container().belongs_to(&a));
        assert!(!a.container().belongs_to(&b));
    }

    #[test]
    fn test_import_node() {
        let source = Document::from_str(r#"<a x="1"><b>text</b><!--c--></a>"#).unwrap();
        let mut target = Document::from_str("<root/>").unwrap();
        let a = source.root_element().unwrap();
        let copy = target.import_node(&source, a).unwrap();
        assert!(copy.belongs_to(&target));
        assert!(!copy.has_parent(&target));
        assert_eq!(copy.name(&target), "a");
        assert_eq!(copy.attribute(&target, "x"), Some("1"));
        assert_eq!(copy.children(&target).len(), 2);
        assert_eq!(copy.text_content(&target), "text");
        assert!(matches!(
            target.import_node(&source, source.container()),
            Err(Error::ContainerCannotMove)
        ));
    }

    #[test]
    fn test_write_omits_decl() {
        let doc = Document::from_str(
            r#"<?xml version="1.0" encoding="UTF-8"?><!--top--><root a="&lt;"><b>x &amp; y</b></root>"#,
        )
        .unwrap();
        let xml = doc.write_str().unwrap();
        assert_eq!(
            xml,
            "<!--top-->\n<root a=\"&lt;\">\n    <b>x &amp; y</b>\n</root>"
        );

        let opts = WriteOptions {
            write_decl: true,
            indent_size: 2,
            ..WriteOptions::default()
        };
        let xml = doc.write_str_with_opts(&opts).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("\n  <b>"));
    }

    #[test]
    fn test_write_escapes_attribute_values() {
        let doc = Document::from_str(r#"<a x="&lt;&amp;&quot;" y="'&gt;"/>"#).unwrap();
        let xml = doc.write_str().unwrap();
        assert_eq!(xml, r#"<a x="&lt;&amp;&quot;" y="&apos;&gt;"/>"#);
        let reparsed = Document::from_str(&xml).unwrap();
        let a = reparsed.root_element().unwrap();
        assert_eq!(a.attribute(&reparsed, "x"), Some("<&\""));
        assert_eq!(a.attribute(&reparsed, "y"), Some("'>"));
    }
}
