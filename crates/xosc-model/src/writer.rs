//! [`XmlTree`] → text serialization on quick-xml

use crate::error::SerializeError;
use crate::tree::{NodeId, NodeKind, XmlTree};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// Serialize the attached part of a tree.
///
/// Elements without children are written as empty tags. With `declaration`
/// set, an `<?xml version="1.0" encoding="UTF-8"?>` line is emitted first.
///
/// # Errors
/// Returns [`SerializeError`] if the writer fails or produces invalid UTF-8.
pub fn write_tree(tree: &XmlTree, declaration: bool) -> Result<String, SerializeError> {
    let mut writer = Writer::new(Vec::new());
    if declaration {
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_error)?;
        writer.get_mut().push(b'\n');
    }
    write_node(&mut writer, tree, tree.root())?;
    String::from_utf8(writer.into_inner()).map_err(|e| SerializeError::Encoding(e.to_string()))
}

fn write_node(
    writer: &mut Writer<Vec<u8>>,
    tree: &XmlTree,
    id: NodeId,
) -> Result<(), SerializeError> {
    match tree.kind(id) {
        NodeKind::Element(element) => {
            let name = element.name().as_str();
            let mut start = BytesStart::new(name);
            for attr in element.attributes() {
                start.push_attribute((attr.name.as_str(), attr.value.as_str()));
            }
            let children = tree.children(id);
            if children.is_empty() {
                writer.write_event(Event::Empty(start)).map_err(write_error)?;
            } else {
                writer.write_event(Event::Start(start)).map_err(write_error)?;
                for &child in children {
                    write_node(writer, tree, child)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new(name)))
                    .map_err(write_error)?;
            }
        }
        NodeKind::Text(text) => {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(write_error)?;
        }
        NodeKind::CData(data) => {
            writer
                .write_event(Event::CData(BytesCData::new(data.as_str())))
                .map_err(write_error)?;
        }
        NodeKind::Comment(comment) => {
            writer
                .write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
                .map_err(write_error)?;
        }
    }
    Ok(())
}

fn write_error(err: impl std::fmt::Display) -> SerializeError {
    SerializeError::Write(err.to_string())
}
