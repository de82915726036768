//! Text → [`XmlTree`] parsing on quick-xml
//!
//! The reader keeps whitespace, comments and CDATA inside the root element so
//! re-serialized documents stay diffable against their source. Prologue
//! content (declaration, doctype, processing instructions, comments before
//! the root) is dropped; the writer emits its own declaration.

use crate::error::ParseError;
use crate::tree::{Element, NodeId, NodeKind, XmlTree};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Parse document text into a tree.
///
/// # Errors
/// Any well-formedness problem yields a [`ParseError`]; no partial tree is
/// ever returned.
pub fn parse_tree(input: &str) -> Result<XmlTree, ParseError> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(false);

    let mut tree: Option<XmlTree> = None;
    let mut stack: Vec<NodeId> = Vec::new();

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader
            .read_event()
            .map_err(|e| ParseError::syntax(position, e.to_string()))?;

        match event {
            Event::Start(start) => {
                let element = element_from(&start, position)?;
                let id = open_element(&mut tree, &stack, element)?;
                stack.push(id);
            }
            Event::Empty(start) => {
                let element = element_from(&start, position)?;
                open_element(&mut tree, &stack, element)?;
            }
            Event::End(_) => {
                if stack.pop().is_none() {
                    return Err(ParseError::syntax(position, "unexpected closing tag"));
                }
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map_err(|e| ParseError::syntax(position, e.to_string()))?;
                match (&mut tree, stack.last()) {
                    (Some(t), Some(&parent)) => {
                        t.append(parent, NodeKind::Text(value.into_owned()));
                    }
                    _ if value.trim().is_empty() => {}
                    _ => return Err(ParseError::TextOutsideRoot),
                }
            }
            Event::CData(data) => {
                let value = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|e| ParseError::Encoding(e.to_string()))?;
                match (&mut tree, stack.last()) {
                    (Some(t), Some(&parent)) => {
                        t.append(parent, NodeKind::CData(value));
                    }
                    _ => return Err(ParseError::TextOutsideRoot),
                }
            }
            Event::Comment(comment) => {
                if let (Some(t), Some(&parent)) = (&mut tree, stack.last()) {
                    let value = String::from_utf8_lossy(&comment).into_owned();
                    t.append(parent, NodeKind::Comment(value));
                }
            }
            Event::Eof => break,
            // Declaration, doctype and processing instructions
            _ => {}
        }
    }

    if let (Some(t), Some(&open)) = (&tree, stack.last()) {
        let name = t
            .element(open)
            .map(|el| el.name().as_str().to_string())
            .unwrap_or_default();
        return Err(ParseError::Unclosed { name });
    }

    tree.ok_or(ParseError::Empty)
}

/// Attach an element under the current parent, or make it the root
fn open_element(
    tree: &mut Option<XmlTree>,
    stack: &[NodeId],
    element: Element,
) -> Result<NodeId, ParseError> {
    match (tree.as_mut(), stack.last()) {
        (Some(t), Some(&parent)) => Ok(t.append_element(parent, element)),
        (Some(_), None) => Err(ParseError::MultipleRoots {
            name: element.name().as_str().to_string(),
        }),
        (None, _) => {
            let t = XmlTree::new(element);
            let root = t.root();
            *tree = Some(t);
            Ok(root)
        }
    }
}

fn element_from(start: &BytesStart<'_>, position: u64) -> Result<Element, ParseError> {
    let name = decode(start.name().as_ref())?;
    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ParseError::syntax(position, e.to_string()))?;
        let key = decode(attr.key.as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(|e| ParseError::syntax(position, e.to_string()))?;
        element.push_attribute(key, value.into_owned());
    }
    Ok(element)
}

fn decode(bytes: &[u8]) -> Result<String, ParseError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| ParseError::Encoding(e.to_string()))
}
