//! A small namespace-aware XML tree used by the validator.
//!
//! Documents are parsed with `quick_xml::NsReader` into owned [`XmlElement`]s carrying resolved
//! namespace URIs, so checks can ask for `{http://www.loc.gov/METS/}dmdSec` regardless of the
//! prefix the producer chose.

use crate::{AipError, AipResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    /// Attribute value by local name, in any namespace.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Attribute value by namespace and local name.
    pub fn attr_ns(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name && a.namespace.as_deref() == Some(namespace))
            .map(|a| a.value.as_str())
    }

    /// All descendants (excluding `self`) in document order.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        let mut stack: Vec<&XmlElement> = self.children.iter().rev().collect();
        while let Some(el) = stack.pop() {
            out.push(el);
            stack.extend(el.children.iter().rev());
        }
        out
    }

    pub fn find_all(&self, namespace: &str, name: &str) -> Vec<&XmlElement> {
        self.descendants()
            .into_iter()
            .filter(|el| el.is(namespace, name))
            .collect()
    }

    pub fn find(&self, namespace: &str, name: &str) -> Option<&XmlElement> {
        self.descendants()
            .into_iter()
            .find(|el| el.is(namespace, name))
    }

    /// Trimmed text of the first matching descendant.
    pub fn find_text(&self, namespace: &str, name: &str) -> Option<&str> {
        self.find(namespace, name).map(|el| el.text.trim())
    }
}

/// A parsed document: the root element and every namespace URI declared anywhere in it.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    pub root: XmlElement,
    pub declared_namespaces: Vec<String>,
}

impl XmlDocument {
    pub fn parse_file(path: &Path) -> AipResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| AipError::FileRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse a complete document.
    ///
    /// # Errors
    ///
    /// Returns [`AipError::Xml`] for syntax errors, mismatched or unclosed tags, content outside
    /// the root element, multiple roots, or an empty document.
    pub fn parse(text: &str) -> AipResult<Self> {
        let mut reader = NsReader::from_str(text);
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut declared_namespaces: Vec<String> = Vec::new();

        loop {
            let resolved = reader
                .read_resolved_event()
                .map(|(ns, event)| (owned_namespace(&ns), event));
            let (namespace, event) = match resolved {
                Ok(pair) => pair,
                Err(e) => {
                    return Err(AipError::Xml(format!(
                        "at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
            };

            match event {
                Event::Start(start) => {
                    let element =
                        build_element(&reader, namespace, &start, &mut declared_namespaces)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element =
                        build_element(&reader, namespace, &start, &mut declared_namespaces)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| AipError::Xml("unexpected closing tag".into()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| AipError::Xml(e.to_string()))?;
                    match stack.last_mut() {
                        Some(top) => top.text.push_str(&text),
                        None if text.trim().is_empty() => {}
                        None => return Err(AipError::Xml("text outside the root element".into())),
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(AipError::Xml(format!("unclosed element <{}>", open.name)));
        }
        let root = root.ok_or_else(|| AipError::Xml("document has no root element".into()))?;

        declared_namespaces.sort();
        declared_namespaces.dedup();
        Ok(Self {
            root,
            declared_namespaces,
        })
    }

    pub fn declares(&self, namespace: &str) -> bool {
        self.declared_namespaces.iter().any(|ns| ns == namespace)
            || self.root.namespace.as_deref() == Some(namespace)
    }
}

fn owned_namespace(ns: &ResolveResult) -> Option<String> {
    match ns {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
        _ => None,
    }
}

fn build_element(
    reader: &NsReader<&[u8]>,
    namespace: Option<String>,
    start: &BytesStart,
    declared: &mut Vec<String>,
) -> AipResult<XmlElement> {
    let mut element = XmlElement {
        namespace,
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        ..XmlElement::default()
    };

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| AipError::Xml(e.to_string()))?;
        let value = attribute
            .unescape_value()
            .map_err(|e| AipError::Xml(e.to_string()))?
            .into_owned();
        let key = attribute.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            declared.push(value);
            continue;
        }

        let (attr_ns, local) = reader.resolve_attribute(attribute.key);
        element.attributes.push(XmlAttribute {
            namespace: owned_namespace(&attr_ns),
            name: String::from_utf8_lossy(local.as_ref()).into_owned(),
            value,
        });
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> AipResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(AipError::Xml("document has more than one root element".into())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const METS: &str = "http://www.loc.gov/METS/";
    const XLINK: &str = "http://www.w3.org/1999/xlink";

    #[test]
    fn test_parse_resolves_prefixed_and_default_namespaces() {
        let doc = XmlDocument::parse(
            r#"<?xml version="1.0"?>
<mets:mets xmlns:mets="http://www.loc.gov/METS/" xmlns:xlink="http://www.w3.org/1999/xlink" OBJID="x">
  <mets:fileSec>
    <mets:file ID="f1"><mets:FLocat xlink:href="representations/rep1/data/a.pdf"/></mets:file>
  </mets:fileSec>
  <other xmlns="urn:other"><child>text &amp; more</child></other>
</mets:mets>"#,
        )
        .unwrap();

        assert!(doc.root.is(METS, "mets"));
        assert_eq!(doc.root.attr("OBJID"), Some("x"));
        assert!(doc.declares(XLINK));

        let flocat = doc.root.find(METS, "FLocat").unwrap();
        assert_eq!(
            flocat.attr_ns(XLINK, "href"),
            Some("representations/rep1/data/a.pdf")
        );
        assert_eq!(doc.root.find_text("urn:other", "child"), Some("text & more"));
        assert!(doc.root.find(METS, "child").is_none());
    }

    #[test]
    fn test_descendants_in_document_order() {
        let doc = XmlDocument::parse("<a><b><c/></b><d/></a>").unwrap();
        let names: Vec<&str> = doc
            .root
            .descendants()
            .iter()
            .map(|e| e.name.as_str())
            .collect();

        assert_eq!(names, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_parse_rejects_mismatched_tags() {
        assert!(matches!(
            XmlDocument::parse("<a><b></a></b>"),
            Err(AipError::Xml(_))
        ));
    }

    #[test]
    fn test_parse_rejects_unclosed() {
        assert!(XmlDocument::parse("<a><b>").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_and_multiple_roots() {
        assert!(XmlDocument::parse("").is_err());
        assert!(XmlDocument::parse("<a/><b/>").is_err());
    }
}
