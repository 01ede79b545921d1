//! Entity Resolver: expands one decoded queue message into the `DrObject`s it implies,
//! via the upstream entity client (`spec.md` 4.2).

use std::collections::HashSet;

use crate::clients::{EntityClient, Validator};
use crate::composer;
use crate::error::{ReplicatorError, Result};
use crate::model::{
    find_source_id, strip_extension_as_uuid, DrObject, Entity, EntityKind, EntityMetadata,
    EntityRef, FileObject, MetadataObject, Message, RepresentationGroup,
};
use crate::planner;

/// Resolves a single decoded message to the DR Objects it implies. Concurrency across
/// messages within a batch is the Coordinator's concern, not this function's.
pub async fn resolve(
    entity_client: &dyn EntityClient,
    validator: &dyn Validator,
    message: &Message,
) -> Result<Vec<DrObject>> {
    match message {
        Message::InformationObjectMessage { entity_ref } => {
            resolve_io(entity_client, validator, *entity_ref).await
        }
        Message::ContentObjectMessage { entity_ref } => {
            resolve_co(entity_client, validator, *entity_ref).await
        }
    }
}

async fn resolve_io(
    entity_client: &dyn EntityClient,
    validator: &dyn Validator,
    io_ref: EntityRef,
) -> Result<Vec<DrObject>> {
    let entity = entity_client
        .entity_by_type_and_ref(EntityKind::InformationObject, io_ref, None)
        .await?;

    let metadata = entity_client.metadata_for_entity(&entity).await?;
    let EntityMetadata::Io { .. } = &metadata else {
        return Err(ReplicatorError::Invariant(format!(
            "entity {} is an IO but upstream returned CO metadata",
            io_ref
        )));
    };

    let source_id = find_source_id(&metadata.common().identifiers)?;
    let (tree, digest) = compose_validate_and_hash(validator, &metadata)?;

    Ok(vec![DrObject::Metadata(MetadataObject {
        io_ref,
        representation_group: None,
        filename: "IO_Metadata.xml".to_string(),
        digest,
        xml: tree,
        destination_path: planner::io_metadata_path(io_ref),
        identifier: source_id,
    })])
}

/// Composes the envelope, validates it, and hashes its exact serialized bytes,
/// returning both the tree (for the staged write) and the digest (for classification).
fn compose_validate_and_hash(
    validator: &dyn Validator,
    metadata: &EntityMetadata,
) -> Result<(crate::model::XmlNode, [u8; 32])> {
    let tree = composer::compose(metadata);
    let xml = composer::serialize(&tree)?;
    validator
        .validate(&xml)
        .map_err(|e| ReplicatorError::Schema(e.to_string()))?;
    Ok((tree, crate::ocfl::hash_bytes(xml.as_bytes())))
}

async fn resolve_co(
    entity_client: &dyn EntityClient,
    validator: &dyn Validator,
    co_ref: EntityRef,
) -> Result<Vec<DrObject>> {
    let bitstreams = entity_client.bitstream_info(co_ref).await?;
    if bitstreams.is_empty() {
        return Err(ReplicatorError::Invariant(format!(
            "content object {} has no bitstreams",
            co_ref
        )));
    }

    let parent_ref = bitstreams[0].parent_ref;

    let entity = entity_client
        .entity_by_type_and_ref(EntityKind::ContentObject, co_ref, Some(parent_ref))
        .await?;

    let io_ref = entity.parent.ok_or_else(|| {
        ReplicatorError::Invariant(format!("content object {} has no parent IO", co_ref))
    })?;

    let representation_group = find_representation_group(entity_client, io_ref, co_ref).await?;

    let names: Vec<&str> = bitstreams.iter().map(|b| b.name.as_str()).collect();
    let co_identifier = planner::single_bitstream_identifier(&names)?;

    let metadata = entity_client.metadata_for_entity(&entity).await?;
    let EntityMetadata::Co { .. } = &metadata else {
        return Err(ReplicatorError::Invariant(format!(
            "entity {} is a CO but upstream returned IO metadata",
            co_ref
        )));
    };

    let (tree, digest) = compose_validate_and_hash(validator, &metadata)?;

    let mut objects = Vec::with_capacity(bitstreams.len() + 1);

    objects.push(DrObject::Metadata(MetadataObject {
        io_ref,
        representation_group,
        filename: "CO_Metadata.xml".to_string(),
        digest,
        xml: tree,
        destination_path: planner::co_metadata_path(io_ref, representation_group, co_ref),
        identifier: co_identifier.to_string(),
    }));

    for bitstream in &bitstreams {
        let identifier = strip_extension_as_uuid(&bitstream.name)?;
        let destination_path = planner::bitstream_path(
            io_ref,
            representation_group,
            co_ref,
            bitstream.generation_type,
            bitstream.generation_version,
            &bitstream.name,
        );

        objects.push(DrObject::File(FileObject {
            io_ref,
            filename: bitstream.name.clone(),
            fixity: bitstream.fixity.clone(),
            url: bitstream.url.clone(),
            destination_path,
            identifier,
        }));
    }

    Ok(objects)
}

/// Enumerates the parent IO's representations, parses `(type, index)` out of each
/// representation URL's trailing two path segments, and collects the group keys whose
/// content-object list contains `co_ref`. At most one distinct group is acceptable.
async fn find_representation_group(
    entity_client: &dyn EntityClient,
    io_ref: EntityRef,
    co_ref: EntityRef,
) -> Result<Option<RepresentationGroup>> {
    let urls = entity_client.representation_urls_for_io(io_ref).await?;

    let mut groups = HashSet::new();
    for url in &urls {
        let Some((rep_type, index)) = planner::parse_representation_url(url) else {
            continue;
        };

        let members = entity_client
            .content_objects_from_representation(io_ref, rep_type, index)
            .await?;

        if members.contains(&co_ref) {
            groups.insert(RepresentationGroup { rep_type, index });
        }
    }

    let mut groups: Vec<_> = groups.into_iter().collect();
    match groups.len() {
        0 => Ok(None),
        1 => Ok(Some(groups.remove(0))),
        _ => Err(ReplicatorError::Invariant(format!(
            "content object {} belongs to more than one representation group: {:?}",
            co_ref,
            groups.iter().map(|g| g.key()).collect::<Vec<_>>()
        ))),
    }
}
