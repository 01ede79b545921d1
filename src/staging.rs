//! Staging Transfer: moves a `DrObject`'s bytes into a temporary file inside the
//! batch's staging directory, producing a `StagedWrite` for the commit stage
//! (`spec.md` 4.5).

use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::clients::EntityClient;
use crate::composer;
use crate::error::Result;
use crate::model::{DrObject, StagedWrite};

/// Stages a single DR Object under `staging_dir`. A `FileObject` is streamed from its
/// upstream URL; a `MetadataObject` has its already-composed tree serialized and
/// written directly -- no network round-trip, since the envelope was built during
/// resolution.
pub async fn stage(
    entity_client: &dyn EntityClient,
    staging_dir: &std::path::Path,
    object: &DrObject,
) -> Result<StagedWrite> {
    let destination_path = object.destination_path().to_string();
    let expected_digest_hex = object.expected_digest_hex();

    let temp_file = tempfile::Builder::new()
        .prefix("dr-stage-")
        .tempfile_in(staging_dir)?;
    let (_, staging_path) = temp_file.keep().map_err(|e| {
        crate::error::ReplicatorError::Storage(format!("failed to keep staging file: {}", e))
    })?;

    match object {
        DrObject::File(file) => {
            let mut sink = File::create(&staging_path).await?;
            entity_client.stream_bitstream(&file.url, &mut sink).await?;
            sink.flush().await?;
        }
        DrObject::Metadata(metadata) => {
            let xml = composer::serialize(&metadata.xml)?;
            let mut sink = File::create(&staging_path).await?;
            sink.write_all(xml.as_bytes()).await?;
            sink.flush().await?;
        }
    }

    Ok(StagedWrite {
        destination_path,
        staging_path,
        expected_digest_hex,
    })
}

/// Stages every object in `objects`, independently and in parallel; a single failure
/// cancels the rest (`spec.md` 5 -- the Coordinator cancels outstanding work in a step
/// on any failure).
pub async fn stage_all(
    entity_client: &dyn EntityClient,
    staging_dir: &std::path::Path,
    objects: &[DrObject],
) -> Result<Vec<StagedWrite>> {
    let futures = objects
        .iter()
        .map(|object| stage(entity_client, staging_dir, object));
    futures::future::try_join_all(futures).await
}
