use crate::document::Document;
use crate::error::{Error, Result};
use crate::node::{Node, NodeValue};
use encoding_rs::{Decoder, Encoding, UTF_16BE, UTF_16LE, UTF_8};
use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;
use std::io::{self, BufRead, Read};
use tracing::trace;

const UNDECODED_CAP: usize = 4096;
const DECODED_CAP: usize = 3 * UNDECODED_CAP;
// Is there an encoding with > 32 bytes for a char?
const CARRY_CAP: usize = 32;

/// Buffered reader that decodes its input into UTF-8 when a decoder is set.
///
/// The decoder can be swapped after the XML declaration has been read.
pub(crate) struct DecodeReader<R: Read> {
    decoder: Option<Decoder>,
    inner: R,
    undecoded: Box<[u8; UNDECODED_CAP]>,
    undecoded_pos: usize,
    undecoded_cap: usize,
    decoded: Box<[u8; DECODED_CAP]>,
    decoded_pos: usize,
    decoded_cap: usize,
    done: bool,
}

impl<R: Read> DecodeReader<R> {
    // If Decoder is not set, don't decode.
    pub(crate) fn new(reader: R, decoder: Option<Decoder>) -> DecodeReader<R> {
        DecodeReader {
            decoder,
            inner: reader,
            undecoded: Box::new([0; UNDECODED_CAP]),
            undecoded_pos: 0,
            undecoded_cap: 0,
            decoded: Box::new([0; DECODED_CAP]),
            decoded_pos: 0,
            decoded_cap: 0,
            done: false,
        }
    }

    pub(crate) fn set_decoder(&mut self, dec: Option<Decoder>) {
        self.decoder = dec;
        self.done = false;
    }

    fn fill_buf_decode(&mut self) -> io::Result<&[u8]> {
        if self.decoded_pos >= self.decoded_cap {
            if self.done {
                return Ok(&[]);
            }
            let remaining = self.undecoded_cap - self.undecoded_pos;
            if remaining <= CARRY_CAP {
                // Move undecoded bytes at the end to the start, then refill.
                self.undecoded
                    .copy_within(self.undecoded_pos..self.undecoded_cap, 0);
                let read = self.inner.read(&mut self.undecoded[remaining..])?;
                self.done = read == 0;
                self.undecoded_pos = 0;
                self.undecoded_cap = remaining + read;
            }

            let (read, written) = match self.decoder.as_mut() {
                Some(decoder) => {
                    let (_res, read, written, _replaced) = decoder.decode_to_utf8(
                        &self.undecoded[self.undecoded_pos..self.undecoded_cap],
                        &mut self.decoded[..],
                        self.done,
                    );
                    (read, written)
                }
                None => return self.fill_buf_without_decode(),
            };
            self.undecoded_pos += read;
            self.decoded_cap = written;
            self.decoded_pos = 0;
        }
        Ok(&self.decoded[self.decoded_pos..self.decoded_cap])
    }

    fn fill_buf_without_decode(&mut self) -> io::Result<&[u8]> {
        if self.undecoded_pos >= self.undecoded_cap {
            self.undecoded_cap = self.inner.read(&mut self.undecoded[..])?;
            self.undecoded_pos = 0;
        }
        Ok(&self.undecoded[self.undecoded_pos..self.undecoded_cap])
    }
}

impl<R: Read> Read for DecodeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let amt = available.len().min(buf.len());
        buf[..amt].copy_from_slice(&available[..amt]);
        self.consume(amt);
        Ok(amt)
    }
}

impl<R: Read> BufRead for DecodeReader<R> {
    // Decoder may change from None to Some.
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match &self.decoder {
            Some(_) => self.fill_buf_decode(),
            None => self.fill_buf_without_decode(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match &self.decoder {
            Some(_) => {
                self.decoded_pos = std::cmp::min(self.decoded_pos + amt, self.decoded_cap);
            }
            None => {
                self.undecoded_pos = std::cmp::min(self.undecoded_pos + amt, self.undecoded_cap);
            }
        }
    }
}

/// Options when parsing xml.
///
/// `empty_text_node`: `<tag></tag>` will have a `Text("")` child, while `<tag />` won't.
///
/// `require_decl`: Fail with [`Error::MalformedXML`] when the input does not start with
/// an XML declaration. Configuration files often omit it, so this is off by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    pub empty_text_node: bool,
    pub require_decl: bool,
}

impl Default for ReadOptions {
    fn default() -> ReadOptions {
        ReadOptions {
            empty_text_node: true,
            require_decl: false,
        }
    }
}

// Byte order mark length and the encoding guessed from the first bytes.
fn sniff_encoding(bytes: &[u8]) -> (usize, Option<&'static Encoding>) {
    match bytes {
        [0xfe, 0xff, ..] => (2, Some(UTF_16BE)),
        [0xff, 0xfe, ..] => (2, Some(UTF_16LE)),
        [0xef, 0xbb, 0xbf, ..] => (3, None),
        [0x00, 0x3c, ..] => (0, Some(UTF_16BE)),
        [0x3c, 0x00, ..] => (0, Some(UTF_16LE)),
        // UTF-8 or ASCII compatible. Declaration may still switch it.
        _ => (0, None),
    }
}

pub(crate) struct DocumentParser {
    document: Document,
    read_opts: ReadOptions,
    encoding: Option<String>,
}

impl DocumentParser {
    pub(crate) fn parse_reader<R: Read>(reader: R, opts: ReadOptions) -> Result<Document> {
        let mut parser = DocumentParser {
            document: Document::new(),
            read_opts: opts,
            encoding: None,
        };
        parser.parse_start(reader)?;
        Ok(parser.document)
    }

    fn handle_decl(&mut self, ev: &BytesDecl) -> Result<()> {
        self.document.version = String::from_utf8(ev.version()?.to_vec())?;
        self.encoding = match ev.encoding() {
            Some(res) => Some(String::from_utf8(res?.to_vec())?),
            None => None,
        };
        self.document.standalone = match ev.standalone() {
            Some(res) => {
                let val = std::str::from_utf8(&*res?)?.to_lowercase();
                if val == "yes" {
                    true
                } else if val == "no" {
                    false
                } else {
                    return Err(Error::MalformedXML(
                        "Standalone Document Declaration has non boolean value".to_string(),
                    ));
                }
            }
            None => false,
        };
        Ok(())
    }

    fn push_to_current(&mut self, element_stack: &[Node], node: Node) -> Result<()> {
        let container = self.document.container();
        let parent = element_stack.last().copied().unwrap_or(container);
        parent.push_child(&mut self.document, node)
    }

    fn handle_bytes_start(&mut self, element_stack: &[Node], ev: &BytesStart) -> Result<Node> {
        let doc = &mut self.document;
        let container = doc.container();
        if element_stack.len() == 1 && doc.root_element().is_some() {
            return Err(Error::MalformedXML(
                "Document has more than one root element".to_string(),
            ));
        }
        let full_name = String::from_utf8(ev.name().to_vec())?;
        let mut attributes = IndexMap::new();
        for attr in ev.attributes() {
            let attr = attr?;
            let key = String::from_utf8(attr.key.to_vec())?;
            let value = String::from_utf8(attr.unescaped_value()?.to_vec())?;
            attributes.insert(key, value);
        }
        let element = Node::create(doc, NodeValue::Element(full_name), attributes);
        let parent = element_stack.last().copied().unwrap_or(container);
        parent.push_child(doc, element)?;
        Ok(element)
    }

    // Returns if document parsing is finished.
    fn handle_event(&mut self, element_stack: &mut Vec<Node>, event: Event) -> Result<bool> {
        trace!(event = ?event, depth = element_stack.len(), "xml event");
        match event {
            Event::Start(ref ev) => {
                let element = self.handle_bytes_start(element_stack, ev)?;
                element_stack.push(element);
                Ok(false)
            }
            Event::End(_) => {
                // quick-xml checks if tag names match for us
                if element_stack.len() <= 1 {
                    return Err(Error::MalformedXML(
                        "Closing tag without an opening tag".to_string(),
                    ));
                }
                if let Some(elem) = element_stack.pop() {
                    // distinguish <tag></tag> and <tag />
                    if self.read_opts.empty_text_node && !elem.has_children(&self.document) {
                        let empty = Node::new_text(&mut self.document, "");
                        elem.push_child(&mut self.document, empty)?;
                    }
                }
                Ok(false)
            }
            Event::Empty(ref ev) => {
                self.handle_bytes_start(element_stack, ev)?;
                Ok(false)
            }
            Event::Text(ev) => {
                let content = String::from_utf8(ev.unescaped()?.to_vec())?;
                // Indentation between tags. Other text is kept as written.
                if content.trim().is_empty() {
                    return Ok(false);
                }
                if element_stack.len() <= 1 {
                    return Err(Error::MalformedXML(format!(
                        "Text '{}' outside of root element",
                        content
                    )));
                }
                let node = Node::new_text(&mut self.document, content);
                self.push_to_current(element_stack, node)?;
                Ok(false)
            }
            Event::DocType(ev) => {
                let content = String::from_utf8(ev.to_vec())?;
                let node = Node::new_doctype(&mut self.document, content);
                self.push_to_current(element_stack, node)?;
                Ok(false)
            }
            // Comment, CData, and PI content is not escaped.
            Event::Comment(ev) => {
                let content = String::from_utf8(ev.to_vec())?;
                let node = Node::new_comment(&mut self.document, content);
                self.push_to_current(element_stack, node)?;
                Ok(false)
            }
            Event::CData(ev) => {
                let content = String::from_utf8(ev.to_vec())?;
                let node = Node::new_cdata(&mut self.document, content);
                self.push_to_current(element_stack, node)?;
                Ok(false)
            }
            Event::PI(ev) => {
                let content = String::from_utf8(ev.to_vec())?;
                let node = Node::new_pi(&mut self.document, content);
                self.push_to_current(element_stack, node)?;
                Ok(false)
            }
            Event::Decl(_) => Err(Error::MalformedXML(
                "XML Declaration is only allowed at the start of file".to_string(),
            )),
            Event::Eof => {
                if let Some(open) = element_stack.get(1) {
                    return Err(Error::MalformedXML(format!(
                        "Element <{}> is not closed",
                        open.name(&self.document)
                    )));
                }
                if self.document.root_element().is_none() {
                    return Err(Error::MalformedXML(
                        "Document has no root element".to_string(),
                    ));
                }
                Ok(true)
            }
        }
    }

    // Look at the document decl and figure out the document encoding
    fn parse_start<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut bufreader = DecodeReader::new(reader, None);
        let (bom_len, init_encoding) = sniff_encoding(bufreader.fill_buf()?);
        bufreader.consume(bom_len);
        bufreader.set_decoder(init_encoding.map(|e| e.new_decoder_without_bom_handling()));

        let mut xmlreader = Reader::from_reader(bufreader);
        let mut element_stack = vec![self.document.container()];
        let mut buf = Vec::with_capacity(150);
        let event = xmlreader.read_event(&mut buf)?;
        if let Event::Decl(ev) = event {
            self.handle_decl(&ev)?;
            if let Some(encoding_str) = &self.encoding {
                let encoding =
                    Encoding::for_label(encoding_str.as_bytes()).ok_or(Error::CannotDecode)?;
                let encoding = if encoding == UTF_8 {
                    None
                } else {
                    Some(encoding)
                };
                // Encoding::for_label("UTF-16") defaults to UTF-16 LE, even though it could be UTF-16 BE
                if encoding != init_encoding
                    && !(encoding == Some(UTF_16LE) && init_encoding == Some(UTF_16BE))
                {
                    let mut decode_reader = xmlreader.into_underlying_reader();
                    decode_reader
                        .set_decoder(encoding.map(|e| e.new_decoder_without_bom_handling()));
                    xmlreader = Reader::from_reader(decode_reader);
                }
            }
        } else if self.read_opts.require_decl {
            return Err(Error::MalformedXML(
                "Didn't find XML Declaration at the start of file".to_string(),
            ));
        } else if self.handle_event(&mut element_stack, event)? {
            return Ok(());
        }
        self.parse_content(xmlreader, element_stack)
    }

    fn parse_content<B: BufRead>(
        &mut self,
        mut reader: Reader<B>,
        mut element_stack: Vec<Node>,
    ) -> Result<()> {
        let mut buf = Vec::with_capacity(200); // reduce time increasing capacity at start.
        loop {
            buf.clear();
            let ev = reader.read_event(&mut buf)?;
            if self.handle_event(&mut element_stack, ev)? {
                return Ok(());
            }
        }
    }
}
