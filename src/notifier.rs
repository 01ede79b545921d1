//! Change Notifier: publishes one event per successfully committed DR Object
//! (`spec.md` 4.6). Empty batches publish nothing.

use crate::clients::EventPublisher;
use crate::error::Result;
use crate::model::{ChangeEvent, ChangeStatus, DrObject, ObjectType, SnsMessage};

/// Builds the `ChangeEvent` for a single staged object. `entity_type` is always `"CO"`
/// per the preserved schema quirk (`spec.md` 9) even when `object` is IO metadata.
pub fn change_event(object: &DrObject, status: ChangeStatus) -> ChangeEvent {
    let (object_type, identifier) = match object {
        DrObject::File(f) => (ObjectType::Bitstream, f.identifier.to_string()),
        DrObject::Metadata(m) => (ObjectType::Metadata, m.identifier.clone()),
    };

    ChangeEvent {
        entity_type: "CO",
        io_ref: object.io_ref(),
        object_type,
        status,
        identifier,
    }
}

/// Publishes one event per object in `created` (status `Created`) and `updated`
/// (status `Updated`). A no-op if both are empty.
pub async fn publish_events(
    publisher: &dyn EventPublisher,
    topic: &str,
    created: &[DrObject],
    updated: &[DrObject],
) -> Result<()> {
    let messages: Vec<SnsMessage> = created
        .iter()
        .map(|o| change_event(o, ChangeStatus::Created))
        .chain(updated.iter().map(|o| change_event(o, ChangeStatus::Updated)))
        .map(|event| SnsMessage::from(&event))
        .collect();

    if messages.is_empty() {
        return Ok(());
    }

    publisher.publish(topic, messages).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityRef, FileObject, MetadataObject, XmlNode};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<SnsMessage>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, _topic: &str, messages: Vec<SnsMessage>) -> Result<()> {
            self.published.lock().unwrap().extend(messages);
            Ok(())
        }
    }

    fn file_object() -> DrObject {
        DrObject::File(FileObject {
            io_ref: EntityRef(Uuid::new_v4()),
            filename: "x.tif".to_string(),
            fixity: "aa".to_string(),
            url: "https://example.test/x".to_string(),
            destination_path: "x.tif".to_string(),
            identifier: Uuid::new_v4(),
        })
    }

    fn metadata_object() -> DrObject {
        DrObject::Metadata(MetadataObject {
            io_ref: EntityRef(Uuid::new_v4()),
            representation_group: None,
            filename: "IO_Metadata.xml".to_string(),
            digest: [0u8; 32],
            xml: XmlNode::new("XIP"),
            destination_path: "IO_Metadata.xml".to_string(),
            identifier: "SRC-1".to_string(),
        })
    }

    #[test]
    fn entity_type_is_always_co() {
        let event = change_event(&metadata_object(), ChangeStatus::Created);
        assert_eq!(event.entity_type, "CO");
    }

    #[tokio::test]
    async fn publishes_one_message_per_object_with_correct_status() {
        let publisher = RecordingPublisher::default();
        publish_events(&publisher, "arn:aws:sns:test", &[file_object()], &[metadata_object()])
            .await
            .unwrap();

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert!(published.iter().any(|m| m.status == "Created" && m.object_type == "Bitstream"));
        assert!(published.iter().any(|m| m.status == "Updated" && m.object_type == "Metadata"));
    }

    #[tokio::test]
    async fn empty_lists_publish_nothing() {
        let publisher = RecordingPublisher::default();
        publish_events(&publisher, "arn:aws:sns:test", &[], &[]).await.unwrap();
        assert!(publisher.published.lock().unwrap().is_empty());
    }
}
