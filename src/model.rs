//! Closed sum types for the entity graph, the wire message shape, and the internal
//! "DR Object" unit of replication work.
//!
//! These are plain tagged enums/structs rather than an open class hierarchy, per the
//! design note that Message, `EntityMetadata`, and `DrObject` are closed variants.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a logical archival entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef(pub Uuid);

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityRef {
    fn from(u: Uuid) -> Self {
        EntityRef(u)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    InformationObject,
    ContentObject,
}

impl EntityKind {
    /// The two-letter code the upstream API expects.
    pub fn short_code(&self) -> &'static str {
        match self {
            EntityKind::InformationObject => "IO",
            EntityKind::ContentObject => "CO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepresentationType {
    Preservation,
    Access,
}

impl RepresentationType {
    /// Renders as used in the `"{type}_{index}"` representation group key, e.g. `Preservation`.
    pub fn group_label(&self) -> &'static str {
        match self {
            RepresentationType::Preservation => "Preservation",
            RepresentationType::Access => "Access",
        }
    }

    /// Renders as used in the destination path segment, e.g. `preservation` (note: the
    /// path segment for this comes from `GenerationType`, not `RepresentationType` --
    /// see `spec.md` 4.2. This helper exists for parsing the two trailing URL segments
    /// of a representation URL, which use the same capitalization as `group_label`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Preservation" | "preservation" => Some(RepresentationType::Preservation),
            "Access" | "access" => Some(RepresentationType::Access),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationType {
    Original,
    Derived,
}

impl GenerationType {
    /// Lowercased form used in the destination path segment.
    pub fn path_segment(&self) -> &'static str {
        match self {
            GenerationType::Original => "original",
            GenerationType::Derived => "derived",
        }
    }
}

/// A representation group a Content Object belongs to: `(type, 1-based index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepresentationGroup {
    pub rep_type: RepresentationType,
    pub index: u32,
}

impl RepresentationGroup {
    pub fn key(&self) -> String {
        format!("{}_{}", self.rep_type.group_label(), self.index)
    }
}

impl fmt::Display for RepresentationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Per-bitstream payload descriptor, as carried on a Content Object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitstreamInfo {
    /// Original filename; embeds the bitstream UUID before the extension.
    pub name: String,
    /// Hex-encoded SHA-256 of the payload, as declared upstream.
    pub fixity: String,
    /// Fetch location.
    pub url: String,
    pub generation_type: GenerationType,
    /// 1-based.
    pub generation_version: u32,
    /// The IO that owns the CO this bitstream belongs to.
    pub parent_ref: EntityRef,
}

/// A minimal owned XML element tree. Just enough to compose the envelope and
/// serialize it byte-exactly -- this is not a general-purpose XML library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlChild>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum XmlChild {
    Element(XmlNode),
    Text(String),
}

impl XmlNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Fragments common to both IO and CO metadata envelopes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommonFragments {
    pub identifiers: Vec<XmlNode>,
    pub links: Vec<XmlNode>,
    pub metadata_nodes: Vec<XmlNode>,
    pub event_actions: Vec<XmlNode>,
}

/// Upstream-provided tree fragments for one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntityMetadata {
    #[serde(rename = "IO")]
    Io {
        entity: XmlNode,
        representations: Vec<XmlNode>,
        common: CommonFragments,
    },
    #[serde(rename = "CO")]
    Co {
        entity: XmlNode,
        generations: Vec<XmlNode>,
        bitstreams: Vec<XmlNode>,
        common: CommonFragments,
    },
}

impl EntityMetadata {
    pub fn common(&self) -> &CommonFragments {
        match self {
            EntityMetadata::Io { common, .. } => common,
            EntityMetadata::Co { common, .. } => common,
        }
    }
}

/// An entity descriptor as returned by `EntityClient::entity_by_type_and_ref`.
#[derive(Debug, Clone)]
pub struct Entity {
    pub entity_ref: EntityRef,
    pub kind: EntityKind,
    /// The owning IO, for a Content Object. Always `None` for an IO.
    pub parent: Option<EntityRef>,
}

/// A decoded queue message. Unrecognized discriminators decode to `None` upstream of
/// this type, never to a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    InformationObjectMessage { #[serde(rename = "ref")] entity_ref: EntityRef },
    ContentObjectMessage { #[serde(rename = "ref")] entity_ref: EntityRef },
}

impl Message {
    /// Canonical text form used for batch-level deduplication.
    pub fn canonical_text(&self) -> String {
        match self {
            Message::InformationObjectMessage { entity_ref } => format!("IO:{}", entity_ref),
            Message::ContentObjectMessage { entity_ref } => format!("CO:{}", entity_ref),
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        match self {
            Message::InformationObjectMessage { entity_ref } => *entity_ref,
            Message::ContentObjectMessage { entity_ref } => *entity_ref,
        }
    }
}

/// Opaque handle identifying a message's position on the queue, needed to delete it
/// after a successful commit + publish.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle {
    pub queue_url: String,
    pub handle: String,
}

/// A message as received from the queue, paired with its decoded form (if decodable).
#[derive(Debug, Clone)]
pub struct MessageCarrier {
    pub receipt: ReceiptHandle,
    pub message: Option<Message>,
}

/// One unit of replication work, destined for a single logical path inside an OCFL
/// object. `FileObject` carries a bitstream payload; `MetadataObject` carries a
/// composed metadata envelope.
#[derive(Debug, Clone)]
pub enum DrObject {
    File(FileObject),
    Metadata(MetadataObject),
}

#[derive(Debug, Clone)]
pub struct FileObject {
    pub io_ref: EntityRef,
    pub filename: String,
    /// Expected hex-encoded SHA-256, as declared upstream.
    pub fixity: String,
    pub url: String,
    pub destination_path: String,
    /// The bitstream UUID parsed out of `filename`.
    pub identifier: Uuid,
}

#[derive(Debug, Clone)]
pub struct MetadataObject {
    pub io_ref: EntityRef,
    pub representation_group: Option<RepresentationGroup>,
    pub filename: String,
    /// SHA-256 of the serialized envelope.
    pub digest: [u8; 32],
    pub xml: XmlNode,
    pub destination_path: String,
    /// SourceID for IO metadata, bitstream UUID (rendered) for CO metadata.
    pub identifier: String,
}

impl DrObject {
    pub fn io_ref(&self) -> EntityRef {
        match self {
            DrObject::File(f) => f.io_ref,
            DrObject::Metadata(m) => m.io_ref,
        }
    }

    pub fn destination_path(&self) -> &str {
        match self {
            DrObject::File(f) => &f.destination_path,
            DrObject::Metadata(m) => &m.destination_path,
        }
    }

    /// The expected hex-encoded SHA-256 digest of the bytes that will be written.
    pub fn expected_digest_hex(&self) -> String {
        match self {
            DrObject::File(f) => f.fixity.to_ascii_lowercase(),
            DrObject::Metadata(m) => hex::encode(m.digest),
        }
    }
}

/// A tuple produced by the staging stage and consumed by the commit stage.
#[derive(Debug, Clone)]
pub struct StagedWrite {
    pub destination_path: String,
    pub staging_path: std::path::PathBuf,
    pub expected_digest_hex: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Bitstream,
    Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Created,
    Updated,
}

/// An event published after a DR Object is successfully committed.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Always `"CO"`, even for IO metadata updates -- see design notes.
    pub entity_type: &'static str,
    pub io_ref: EntityRef,
    pub object_type: ObjectType,
    pub status: ChangeStatus,
    pub identifier: String,
}

/// The wire shape published to the event topic.
#[derive(Debug, Clone, Serialize)]
pub struct SnsMessage {
    #[serde(rename = "entityType")]
    pub entity_type: &'static str,
    #[serde(rename = "ioRef")]
    pub io_ref: String,
    #[serde(rename = "objectType")]
    pub object_type: &'static str,
    pub status: &'static str,
    #[serde(rename = "bitstreamName")]
    pub bitstream_name: String,
}

impl From<&ChangeEvent> for SnsMessage {
    fn from(e: &ChangeEvent) -> Self {
        SnsMessage {
            entity_type: e.entity_type,
            io_ref: e.io_ref.to_string(),
            object_type: match e.object_type {
                ObjectType::Bitstream => "Bitstream",
                ObjectType::Metadata => "Metadata",
            },
            status: match e.status {
                ChangeStatus::Created => "Created",
                ChangeStatus::Updated => "Updated",
            },
            bitstream_name: e.identifier.clone(),
        }
    }
}

/// Extracts the mandatory SourceID from a set of `<Identifier>` XML fragments. Each
/// fragment is expected to carry `<Type>` and `<Value>` children; its absence is a
/// hard invariant violation, not a panic.
pub fn find_source_id(identifiers: &[XmlNode]) -> crate::error::Result<String> {
    identifiers
        .iter()
        .find(|node| xml_child_text(node, "Type").as_deref() == Some("SourceID"))
        .and_then(|node| xml_child_text(node, "Value"))
        .ok_or_else(|| {
            crate::error::ReplicatorError::Invariant(
                "entity metadata is missing a SourceID identifier".to_string(),
            )
        })
}

/// Returns the concatenated text content of `node`'s first direct child element named
/// `tag`, if any.
fn xml_child_text(node: &XmlNode, tag: &str) -> Option<String> {
    node.children.iter().find_map(|child| match child {
        XmlChild::Element(element) if element.tag == tag => Some(
            element
                .children
                .iter()
                .filter_map(|c| match c {
                    XmlChild::Text(text) => Some(text.as_str()),
                    XmlChild::Element(_) => None,
                })
                .collect::<String>(),
        ),
        _ => None,
    })
}

/// Strips a filename's extension and parses the remainder as a UUID, per the
/// `stripExtension(name)` rule used to recover bitstream/CO identifiers.
pub fn strip_extension_as_uuid(name: &str) -> crate::error::Result<Uuid> {
    let stem = match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    };
    Uuid::parse_str(stem).map_err(|e| {
        crate::error::ReplicatorError::Invariant(format!(
            "bitstream name {} does not embed a valid UUID: {}",
            name, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identifier(id_type: &str, value: &str) -> XmlNode {
        let mut node = XmlNode::new("Identifier");
        let mut type_node = XmlNode::new("Type");
        type_node.children.push(XmlChild::Text(id_type.to_string()));
        let mut value_node = XmlNode::new("Value");
        value_node.children.push(XmlChild::Text(value.to_string()));
        node.children.push(XmlChild::Element(type_node));
        node.children.push(XmlChild::Element(value_node));
        node
    }

    #[test]
    fn finds_source_id_among_other_identifiers() {
        let identifiers = vec![
            identifier("ApplicationID", "app-1"),
            identifier("SourceID", "dr2-source-123"),
        ];
        assert_eq!(find_source_id(&identifiers).unwrap(), "dr2-source-123");
    }

    #[test]
    fn missing_source_id_is_an_invariant_error() {
        let identifiers = vec![identifier("ApplicationID", "app-1")];
        assert!(find_source_id(&identifiers).is_err());
    }

    #[test]
    fn strips_extension_before_parsing_uuid() {
        let uuid = strip_extension_as_uuid("3fa85f64-5717-4562-b3fc-2c963f66afa6.tif").unwrap();
        assert_eq!(uuid.to_string(), "3fa85f64-5717-4562-b3fc-2c963f66afa6");
    }
}
