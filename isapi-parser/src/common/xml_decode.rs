//! XML decoding utilities for ISAPI documents.
//!
//! Devices answer with documents in the `http://www.hikvision.com/ver20/XMLSchema`
//! namespace, and some firmware adds prefixed elements. The helpers here
//! rewrite a document to plain local names so that serde structs can stay
//! simple, and report the root element so callers can reject documents of
//! the wrong kind before deserializing.

use std::borrow::Cow;

use crate::error::{ParseError, ParseResult};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::de::DeserializeOwned;

/// A well-formed document rewritten without namespace prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Local name of the root element
    pub root: String,
    /// The rewritten document text
    pub xml: String,
}

impl Document {
    /// Deserialize the rewritten document into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> ParseResult<T> {
        quick_xml::de::from_str(&self.xml)
            .map_err(|e| ParseError::XmlDeserializationFailed(e.to_string()))
    }
}

/// Check well-formedness, strip namespaces and find the root element.
///
/// Fails with [`ParseError::InvalidXmlStructure`] when the reader rejects the
/// input, when elements are left unclosed, or when there is no element at all.
pub fn parse_document(xml: &str) -> ParseResult<Document> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut root: Option<String> = None;
    let mut depth = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ParseError::InvalidXmlStructure(e.to_string()))?;

        let rewritten = match event {
            Event::Start(start) => {
                let start = local_start(&start)?;
                if depth == 0 {
                    claim_root(&mut root, &start)?;
                }
                depth += 1;
                Event::Start(start)
            }
            Event::Empty(start) => {
                let start = local_start(&start)?;
                if depth == 0 {
                    claim_root(&mut root, &start)?;
                }
                Event::Empty(start)
            }
            Event::End(end) => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    ParseError::InvalidXmlStructure("closing tag without opening tag".to_string())
                })?;
                let name = String::from_utf8_lossy(end.local_name().as_ref()).into_owned();
                Event::End(BytesEnd::new(name))
            }
            Event::Eof => break,
            other => other,
        };

        writer
            .write_event(rewritten)
            .map_err(|e| ParseError::InvalidXmlStructure(e.to_string()))?;
    }

    if depth != 0 {
        return Err(ParseError::InvalidXmlStructure(format!(
            "{depth} element(s) left unclosed"
        )));
    }

    let root = root
        .ok_or_else(|| ParseError::InvalidXmlStructure("document has no root element".to_string()))?;
    let xml = String::from_utf8(writer.into_inner())
        .map_err(|e| ParseError::InvalidEncoding(e.to_string()))?;

    Ok(Document { root, xml })
}

/// Strip namespace prefixes and `xmlns` declarations from an XML document.
///
/// Input: `<ns:EventNotificationAlert xmlns:ns="urn:x"><ns:eventType>VMD</ns:eventType></ns:EventNotificationAlert>`
/// Output: `<EventNotificationAlert><eventType>VMD</eventType></EventNotificationAlert>`
pub fn strip_namespaces(xml: &str) -> ParseResult<String> {
    parse_document(xml).map(|doc| doc.xml)
}

fn claim_root(root: &mut Option<String>, start: &BytesStart<'_>) -> ParseResult<()> {
    if root.is_some() {
        return Err(ParseError::InvalidXmlStructure(
            "multiple root elements".to_string(),
        ));
    }
    *root = Some(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    Ok(())
}

fn local_start(start: &BytesStart<'_>) -> ParseResult<BytesStart<'static>> {
    let local = start.local_name();
    let name: Cow<'_, str> = String::from_utf8_lossy(local.as_ref());
    let mut out = BytesStart::new(name.into_owned());

    for attr in start.attributes() {
        let attr = attr.map_err(|e| ParseError::InvalidXmlStructure(e.to_string()))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = attr.key.local_name();
        out.push_attribute((key.as_ref(), attr.value.as_ref()));
    }

    Ok(out.into_owned())
}
