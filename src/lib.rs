//! Read and edit XML configuration files with XPath.
//!
//! A [`Document`] owns every node in an arena; [`Node`] is a copyable handle
//! into it. [`ConfigOperator`] checks, reads, updates, adds, and removes the
//! nodes matched by a path, and [`Document::save`] writes the result back.
//!
//! ```
//! use xml_config::{Document, Position};
//!
//! let mut doc = Document::parse_str(r#"<APIManager>
//!     <AuthManager enabled="true">
//!         <Username>oldname</Username>
//!     </AuthManager>
//! </APIManager>"#).unwrap();
//!
//! let admin = doc.build_config("Username", "admin", Vec::<(&str, &str)>::new());
//! let password = doc.create_config("<Password>secret</Password>").unwrap();
//!
//! let mut operator = doc.operator();
//! assert!(operator.update_config("//AuthManager/Username", admin).unwrap());
//! assert!(operator.add_config("//AuthManager/Username", password, Position::After).unwrap());
//! let username = operator.get_config("//AuthManager/Username").unwrap().unwrap();
//! assert_eq!(doc.config(username), doc.config(admin));
//!
//! // Attributes can be read, but only elements are changed.
//! let mut operator = doc.operator();
//! let enabled = operator.get_config("//AuthManager/@enabled").unwrap().unwrap();
//! assert_eq!(enabled.text_content(operator.document()), "true");
//! assert!(!operator.remove_config("//AuthManager/@enabled").unwrap());
//! ```

mod config;
mod document;
mod error;
mod factory;
mod file;
mod node;
mod operator;
mod parser;
pub mod xpath;

pub use crate::config::Config;
pub use crate::document::{Document, DocumentId, WriteOptions};
pub use crate::error::{Error, Result};
pub use crate::factory::ElementBuilder;
pub use crate::file::ConfigFile;
pub use crate::node::{Node, NodeType, NodeValue};
pub use crate::operator::{ConfigOperator, Position};
pub use crate::parser::ReadOptions;
pub use crate::xpath::Item;
