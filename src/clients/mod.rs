//! External collaborator interfaces (`spec.md` 6). Every core module depends only on
//! these traits, never on a concrete client, which is what makes the pipeline
//! testable against in-memory fakes without any network access.

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::error::Result;
use crate::model::{
    BitstreamInfo, Entity, EntityKind, EntityMetadata, EntityRef, MessageCarrier,
    ReceiptHandle, RepresentationType, SnsMessage,
};

#[cfg(feature = "aws")]
pub mod aws;

/// The hosted queue service. Operations are deliberately narrow: receive a batch,
/// delete a handle once its work is fully committed and published.
#[async_trait]
pub trait QueueClient: Send + Sync {
    async fn receive(&self) -> Result<Vec<MessageCarrier>>;
    async fn delete(&self, handle: &ReceiptHandle) -> Result<()>;
}

/// The upstream preservation repository API.
#[async_trait]
pub trait EntityClient: Send + Sync {
    async fn entity_by_type_and_ref(
        &self,
        kind: EntityKind,
        entity_ref: EntityRef,
        parent_hint: Option<EntityRef>,
    ) -> Result<Entity>;

    async fn bitstream_info(&self, co_ref: EntityRef) -> Result<Vec<BitstreamInfo>>;

    async fn metadata_for_entity(&self, entity: &Entity) -> Result<EntityMetadata>;

    async fn representation_urls_for_io(&self, io_ref: EntityRef) -> Result<Vec<String>>;

    async fn content_objects_from_representation(
        &self,
        io_ref: EntityRef,
        rep_type: RepresentationType,
        index: u32,
    ) -> Result<Vec<EntityRef>>;

    /// Streams the bitstream payload at `url` into `sink`, back-pressured.
    async fn stream_bitstream(&self, url: &str, sink: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<()>;
}

/// XML-against-schema validation. Synchronous: XSD validation is CPU-bound, not I/O.
pub trait Validator: Send + Sync {
    fn validate(&self, xml: &str) -> Result<()>;
}

/// The hosted pub/sub topic used to announce committed changes downstream.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, messages: Vec<SnsMessage>) -> Result<()>;
}

/// Always-passing validator used in tests where schema conformance is out of scope
/// for the behavior under test.
pub struct NoopValidator;

impl Validator for NoopValidator {
    fn validate(&self, _xml: &str) -> Result<()> {
        Ok(())
    }
}
