//! Common utilities shared by ISAPI document parsers
//!
//! - [`xml_decode`]: namespace stripping, root inspection and serde entry points

pub mod xml_decode;

pub use xml_decode::{parse_document, strip_namespaces, Document};
