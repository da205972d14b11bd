//! XML text <-> [`XmlDocument`] using `quick-xml`.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::document::{NodeId, XmlDocument};
use crate::error::XmlError;

pub(crate) fn parse_document(xml: &str) -> Result<XmlDocument, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut doc: Option<XmlDocument> = None;
    let mut stack: Vec<NodeId> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let id = open_element(&mut doc, &stack, e)?;
                stack.push(id);
            }
            Ok(Event::Empty(ref e)) => {
                open_element(&mut doc, &stack, e)?;
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(ref t)) => {
                let text = t.unescape().map_err(|e| XmlError::Parse(e.to_string()))?;
                if let (Some(doc), Some(top)) = (doc.as_mut(), stack.last()) {
                    doc.append_text(*top, &text)?;
                }
            }
            Ok(Event::CData(c)) => {
                let raw = c.into_inner();
                let text = String::from_utf8_lossy(&raw);
                if let (Some(doc), Some(top)) = (doc.as_mut(), stack.last()) {
                    doc.append_text(*top, &text)?;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XmlError::Parse(e.to_string())),
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::Parse("unexpected end of document".to_string()));
    }

    let mut doc = doc.ok_or_else(|| XmlError::Parse("document has no root element".to_string()))?;
    doc.reset_revision();
    Ok(doc)
}

fn open_element(
    doc: &mut Option<XmlDocument>,
    stack: &[NodeId],
    start: &BytesStart<'_>,
) -> Result<NodeId, XmlError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| XmlError::Parse(e.to_string()))?
        .to_string();

    let id = match (doc.as_mut(), stack.last()) {
        (Some(doc), Some(parent)) => doc.append_child(*parent, &name)?,
        (Some(_), None) => return Err(XmlError::Parse("multiple root elements".to_string())),
        (None, _) => {
            let created = XmlDocument::new(&name);
            let root = created.root();
            *doc = Some(created);
            root
        }
    };

    let doc = doc
        .as_mut()
        .ok_or_else(|| XmlError::Parse("document has no root element".to_string()))?;
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(|e| XmlError::Parse(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Parse(e.to_string()))?;
        doc.set_attribute(id, key, &value)?;
    }

    Ok(id)
}

/// Serialize `id` and its subtree without an XML declaration.
pub(crate) fn write_element(doc: &XmlDocument, id: NodeId) -> String {
    let mut out = String::new();
    write_into(doc, id, &mut out);
    out
}

fn write_into(doc: &XmlDocument, id: NodeId, out: &mut String) {
    let Some(element) = doc.element(id) else {
        return;
    };

    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value));
        out.push('"');
    }

    if element.children.is_empty() && element.text.is_none() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    if let Some(text) = &element.text {
        out.push_str(&escape(text));
    }
    for child in &element.children {
        write_into(doc, *child, out);
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}
