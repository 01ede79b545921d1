//! Path Planner: derives the deterministic destination path of every DR Object
//! inside its owning OCFL object.
//!
//! `{ioRef}[/{repGroup}][/{coRef}][/{genType}][/g{genVersion}]/{filename}`, with each
//! optional segment present only when defined (`spec.md` 3).

use uuid::Uuid;

use crate::model::{EntityRef, GenerationType, RepresentationGroup};

/// Destination path for an IO's metadata envelope: `{ioRef}/IO_Metadata.xml`.
pub fn io_metadata_path(io_ref: EntityRef) -> String {
    format!("{}/IO_Metadata.xml", io_ref)
}

/// Destination path for a CO's metadata envelope:
/// `{ioRef}[/{repGroup}]/{coRef}/CO_Metadata.xml`.
pub fn co_metadata_path(
    io_ref: EntityRef,
    rep_group: Option<RepresentationGroup>,
    co_ref: EntityRef,
) -> String {
    let mut segments = vec![io_ref.to_string()];
    if let Some(group) = rep_group {
        segments.push(group.to_string());
    }
    segments.push(co_ref.to_string());
    segments.push("CO_Metadata.xml".to_string());
    segments.join("/")
}

/// Destination path for one of a CO's bitstreams:
/// `{ioRef}[/{repGroup}]/{coRef}/{genType.lower}/g{genVersion}/{name}`.
pub fn bitstream_path(
    io_ref: EntityRef,
    rep_group: Option<RepresentationGroup>,
    co_ref: EntityRef,
    generation_type: GenerationType,
    generation_version: u32,
    name: &str,
) -> String {
    let mut segments = vec![io_ref.to_string()];
    if let Some(group) = rep_group {
        segments.push(group.to_string());
    }
    segments.push(co_ref.to_string());
    segments.push(generation_type.path_segment().to_string());
    segments.push(format!("g{}", generation_version));
    segments.push(name.to_string());
    segments.join("/")
}

/// Parses the trailing two path segments of a representation URL into
/// `(RepresentationType, index)`, per `spec.md` 4.2's "parse `(type, index)` from the
/// trailing two path segments" rule.
pub fn parse_representation_url(url: &str) -> Option<(crate::model::RepresentationType, u32)> {
    let trimmed = url.trim_end_matches('/');
    let mut segments = trimmed.rsplit('/');
    let index_segment = segments.next()?;
    let type_segment = segments.next()?;

    let index: u32 = index_segment.parse().ok()?;
    let rep_type = crate::model::RepresentationType::parse(type_segment)?;
    Some((rep_type, index))
}

/// Validates that every bitstream's stripped-extension name resolves to the same
/// identifier UUID, per the "at most one CO identifier" invariant.
pub fn single_bitstream_identifier(names: &[&str]) -> crate::error::Result<Uuid> {
    let mut identifiers = Vec::new();
    for name in names {
        let id = crate::model::strip_extension_as_uuid(name)?;
        if !identifiers.contains(&id) {
            identifiers.push(id);
        }
    }

    match identifiers.as_slice() {
        [single] => Ok(*single),
        [] => Err(crate::error::ReplicatorError::Invariant(
            "content object has no bitstreams to derive an identifier from".to_string(),
        )),
        _ => Err(crate::error::ReplicatorError::Invariant(format!(
            "content object bitstreams disagree on identifier: {:?}",
            identifiers
        ))),
    }
}
