use quick_xml::Error as XMLError;
use std::path::PathBuf;
use std::{str::Utf8Error, string::FromUtf8Error};
use thiserror::Error;

/// Wrapper around `std::Result`
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
///
/// A path that matches nothing is not an error. Operations report that with
/// `Ok(false)` or `Ok(None)`.
#[derive(Error, Debug)]
pub enum Error {
    /// XPath expression could not be compiled or evaluated.
    #[error("XPath expression '{expression}' evaluation error")]
    Query { expression: String, reason: String },
    /// String passed to [`crate::Document::create_config`] is not a single well-formed element.
    #[error("XML parsing error when parsing xml string '{fragment}'")]
    MalformedFragment { fragment: String, reason: String },
    /// Serializing or writing the document failed.
    #[error("XML transformation error when saving file: {0}")]
    Persist(#[source] Box<Error>),
    /// [`std::io`] related error.
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// Decoding related error.
    /// Maybe the XML declaration has an encoding value that it doesn't recognize,
    /// or it doesn't match its actual encoding,
    #[error("Cannot decode XML")]
    CannotDecode,
    /// Assorted errors while parsing XML.
    #[error("Malformed XML: {0}")]
    MalformedXML(String),
    /// The path given to [`crate::ConfigFile::open`] is not a regular file.
    #[error("The file path {} provided is not a valid file", .0.display())]
    NotAFile(PathBuf),
    /// The container node cannot have a parent.
    /// Use `node.is_container()` to check if it is a container before
    /// assigning it to another parent.
    #[error("Container node cannot move")]
    ContainerCannotMove,
    /// You need to call `node.detach()` before assigning another parent.
    #[error("Node already has a parent. Call detach() before changing parent.")]
    HasAParent,
    /// A node cannot become a child of itself or of one of its descendants.
    #[error("Node is an ancestor of the new parent")]
    IsAnAncestor,
    /// Node handle was created by another [`crate::Document`].
    /// Use [`crate::Document::import_node`] to copy it over first.
    #[error("Node belongs to another document")]
    WrongDocument,
    /// Node is not a child of the given parent.
    #[error("Node not found")]
    NotFound,
}

impl Error {
    pub(crate) fn query<S: Into<String>>(expression: &str, reason: S) -> Error {
        Error::Query {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<XMLError> for Error {
    fn from(err: XMLError) -> Error {
        match err {
            XMLError::EndEventMismatch { expected, found } => Error::MalformedXML(format!(
                "Closing tag mismatch. Expected {}, found {}",
                expected, found,
            )),
            XMLError::Io(err) => Error::Io(err),
            XMLError::Utf8(_) => Error::CannotDecode,
            err => Error::MalformedXML(err.to_string()),
        }
    }
}

impl From<FromUtf8Error> for Error {
    fn from(_: FromUtf8Error) -> Error {
        Error::CannotDecode
    }
}

impl From<Utf8Error> for Error {
    fn from(_: Utf8Error) -> Error {
        Error::CannotDecode
    }
}
