//! Metadata Composer: assembles the canonical XIP v7 XML envelope for an entity,
//! validates it, and computes its SHA-256 digest over the exact serialized bytes.
//!
//! The whitespace-only text node between consecutive children is part of the
//! byte-exact contract: the digest is taken over the serialized form, so the
//! separator must be preserved exactly (`spec.md` 4.3, 9).

use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{ReplicatorError, Result};
use crate::model::{EntityMetadata, XmlChild, XmlNode};
use crate::ocfl::hash_bytes;

pub const XIP_V7_NAMESPACE: &str = "http://preservica.com/XIP/v7.0";

/// Ten spaces after a newline. Load-bearing: changing this changes every digest this
/// composer has ever produced.
const CHILD_SEPARATOR: &str = "\n          ";

/// Builds the `<XIP>` envelope tree for the given metadata, in the fixed child order:
/// entity node; then representation nodes (IO) or generation+bitstream nodes (CO);
/// then identifiers, links, metadata nodes, event actions.
pub fn compose(metadata: &EntityMetadata) -> XmlNode {
    let mut ordered = Vec::new();

    match metadata {
        EntityMetadata::Io {
            entity,
            representations,
            ..
        } => {
            ordered.push(entity.clone());
            ordered.extend(representations.iter().cloned());
        }
        EntityMetadata::Co {
            entity,
            generations,
            bitstreams,
            ..
        } => {
            ordered.push(entity.clone());
            ordered.extend(generations.iter().cloned());
            ordered.extend(bitstreams.iter().cloned());
        }
    }

    let common = metadata.common();
    ordered.extend(common.identifiers.iter().cloned());
    ordered.extend(common.links.iter().cloned());
    ordered.extend(common.metadata_nodes.iter().cloned());
    ordered.extend(common.event_actions.iter().cloned());

    let mut root = XmlNode::new("XIP");
    root.attributes.push(("xmlns".to_string(), XIP_V7_NAMESPACE.to_string()));

    let mut children = Vec::with_capacity(ordered.len() * 2);
    for (i, node) in ordered.into_iter().enumerate() {
        if i > 0 {
            children.push(XmlChild::Text(CHILD_SEPARATOR.to_string()));
        }
        children.push(XmlChild::Element(node));
    }
    root.children = children;

    root
}

/// Serializes the tree to its exact UTF-8 byte form.
pub fn serialize(root: &XmlNode) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_node(&mut writer, root)?;
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| ReplicatorError::Wrapped(Box::new(e)))
}

fn write_node(writer: &mut Writer<Cursor<Vec<u8>>>, node: &XmlNode) -> Result<()> {
    let mut start = BytesStart::new(node.tag.as_str());
    for (key, value) in &node.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &node.children {
        match child {
            XmlChild::Element(element) => write_node(writer, element)?,
            XmlChild::Text(text) => {
                writer.write_event(Event::Text(BytesText::new(text)))?;
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(node.tag.as_str())))?;

    Ok(())
}

/// Composes, serializes, validates against the XIP v7 schema, and returns the
/// serialized bytes together with their SHA-256 digest.
pub async fn compose_and_validate(
    validator: &dyn crate::clients::Validator,
    metadata: &EntityMetadata,
) -> Result<(String, [u8; 32])> {
    let tree = compose(metadata);
    let xml = serialize(&tree)?;

    validator
        .validate(&xml)
        .map_err(|e| ReplicatorError::Schema(e.to_string()))?;

    let digest = hash_bytes(xml.as_bytes());
    Ok((xml, digest))
}
