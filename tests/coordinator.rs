//! End-to-end coverage of the reconciliation pipeline against an in-memory upstream
//! and a real, temp-directory-backed OCFL store. Scenario numbers refer to the
//! literal end-to-end scenarios the pipeline is specified against.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use dr_replicator::clients::{EntityClient, EventPublisher, NoopValidator, QueueClient};
use dr_replicator::coordinator::{process, BatchOutcome};
use dr_replicator::error::{ReplicatorError, Result};
use dr_replicator::model::{
    BitstreamInfo, CommonFragments, Entity, EntityKind, EntityMetadata, EntityRef,
    GenerationType, Message, MessageCarrier, ReceiptHandle, RepresentationType, SnsMessage,
    XmlChild, XmlNode,
};
use dr_replicator::ocfl::LocalStore;
use uuid::Uuid;

fn uuid_ref(tail: &str) -> EntityRef {
    EntityRef(Uuid::parse_str(&format!("00000000-0000-0000-0000-00000000{}", tail)).unwrap())
}

fn source_id_fragment(value: &str) -> XmlNode {
    let mut node = XmlNode::new("Identifier");
    let mut type_node = XmlNode::new("Type");
    type_node.children.push(XmlChild::Text("SourceID".to_string()));
    let mut value_node = XmlNode::new("Value");
    value_node.children.push(XmlChild::Text(value.to_string()));
    node.children.push(XmlChild::Element(type_node));
    node.children.push(XmlChild::Element(value_node));
    node
}

#[derive(Default)]
struct FakeEntityClient {
    io_metadata: Mutex<HashMap<String, EntityMetadata>>,
    co_metadata: Mutex<HashMap<String, EntityMetadata>>,
    bitstreams: Mutex<HashMap<String, Vec<BitstreamInfo>>>,
    parents: Mutex<HashMap<String, EntityRef>>,
    representation_urls: Mutex<HashMap<String, Vec<String>>>,
    representation_members: Mutex<HashMap<(String, String, u32), Vec<EntityRef>>>,
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    fetch_count: Mutex<HashMap<String, usize>>,
}

impl FakeEntityClient {
    fn with_io(io_ref: EntityRef, source_id: &str) -> Self {
        let client = Self::default();
        client.io_metadata.lock().unwrap().insert(
            io_ref.to_string(),
            EntityMetadata::Io {
                entity: XmlNode::new("Entity"),
                representations: vec![],
                common: CommonFragments {
                    identifiers: vec![source_id_fragment(source_id)],
                    ..Default::default()
                },
            },
        );
        client
    }

    fn add_co(
        &self,
        io_ref: EntityRef,
        co_ref: EntityRef,
        bitstream_name: &str,
        fixity: &str,
        rep_type: RepresentationType,
        rep_index: u32,
        payload: &[u8],
    ) {
        self.parents.lock().unwrap().insert(co_ref.to_string(), io_ref);
        self.bitstreams.lock().unwrap().insert(
            co_ref.to_string(),
            vec![BitstreamInfo {
                name: bitstream_name.to_string(),
                fixity: fixity.to_string(),
                url: format!("https://example.test/bitstreams/{}", bitstream_name),
                generation_type: GenerationType::Original,
                generation_version: 1,
                parent_ref: io_ref,
            }],
        );
        self.co_metadata.lock().unwrap().insert(
            co_ref.to_string(),
            EntityMetadata::Co {
                entity: XmlNode::new("Entity"),
                generations: vec![],
                bitstreams: vec![],
                common: CommonFragments::default(),
            },
        );
        self.payloads.lock().unwrap().insert(
            format!("https://example.test/bitstreams/{}", bitstream_name),
            payload.to_vec(),
        );
        self.representation_urls.lock().unwrap().entry(io_ref.to_string()).or_default().push(
            format!(
                "https://example.test/entities/io/{}/representations/{}/{}",
                io_ref,
                rep_type.group_label().to_ascii_lowercase(),
                rep_index
            ),
        );
        self.representation_members.lock().unwrap().insert(
            (io_ref.to_string(), rep_type.group_label().to_string(), rep_index),
            vec![co_ref],
        );
    }
}

#[async_trait]
impl EntityClient for FakeEntityClient {
    async fn entity_by_type_and_ref(
        &self,
        kind: EntityKind,
        entity_ref: EntityRef,
        _parent_hint: Option<EntityRef>,
    ) -> Result<Entity> {
        *self
            .fetch_count
            .lock()
            .unwrap()
            .entry(entity_ref.to_string())
            .or_insert(0) += 1;

        Ok(Entity {
            entity_ref,
            kind,
            parent: self.parents.lock().unwrap().get(&entity_ref.to_string()).copied(),
        })
    }

    async fn bitstream_info(&self, co_ref: EntityRef) -> Result<Vec<BitstreamInfo>> {
        Ok(self
            .bitstreams
            .lock()
            .unwrap()
            .get(&co_ref.to_string())
            .cloned()
            .unwrap_or_default())
    }

    async fn metadata_for_entity(&self, entity: &Entity) -> Result<EntityMetadata> {
        let table = match entity.kind {
            EntityKind::InformationObject => &self.io_metadata,
            EntityKind::ContentObject => &self.co_metadata,
        };
        table
            .lock()
            .unwrap()
            .get(&entity.entity_ref.to_string())
            .cloned()
            .ok_or_else(|| ReplicatorError::Upstream("no metadata configured".to_string()))
    }

    async fn representation_urls_for_io(&self, io_ref: EntityRef) -> Result<Vec<String>> {
        Ok(self
            .representation_urls
            .lock()
            .unwrap()
            .get(&io_ref.to_string())
            .cloned()
            .unwrap_or_default())
    }

    async fn content_objects_from_representation(
        &self,
        io_ref: EntityRef,
        rep_type: RepresentationType,
        index: u32,
    ) -> Result<Vec<EntityRef>> {
        Ok(self
            .representation_members
            .lock()
            .unwrap()
            .get(&(io_ref.to_string(), rep_type.group_label().to_string(), index))
            .cloned()
            .unwrap_or_default())
    }

    async fn stream_bitstream(
        &self,
        url: &str,
        sink: &mut (dyn tokio::io::AsyncWrite + Unpin + Send),
    ) -> Result<()> {
        use tokio::io::AsyncWriteExt;
        let payload = self
            .payloads
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ReplicatorError::Upstream(format!("no payload for {}", url)))?;
        sink.write_all(&payload).await?;
        Ok(())
    }
}

#[derive(Default)]
struct FakeQueueClient {
    deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl QueueClient for FakeQueueClient {
    async fn receive(&self) -> Result<Vec<MessageCarrier>> {
        Ok(vec![])
    }

    async fn delete(&self, handle: &ReceiptHandle) -> Result<()> {
        self.deleted.lock().unwrap().push(handle.handle.clone());
        Ok(())
    }
}

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

fn carrier(handle: &str, message: Message) -> MessageCarrier {
    MessageCarrier {
        receipt: ReceiptHandle {
            queue_url: "https://sqs.test/q".to_string(),
            handle: handle.to_string(),
        },
        message: Some(message),
    }
}

struct Harness {
    entity_client: FakeEntityClient,
    queue: FakeQueueClient,
    publisher: RecordingPublisher,
    store: LocalStore,
    _store_dir: tempfile::TempDir,
    staging_dir: tempfile::TempDir,
}

impl Harness {
    fn new(entity_client: FakeEntityClient) -> Self {
        let store_dir = tempfile::tempdir().unwrap();
        let store =
            LocalStore::open(store_dir.path().join("repo"), store_dir.path().join("work")).unwrap();
        Self {
            entity_client,
            queue: FakeQueueClient::default(),
            publisher: RecordingPublisher::default(),
            store,
            _store_dir: store_dir,
            staging_dir: tempfile::tempdir().unwrap(),
        }
    }

    async fn run(&self, carriers: Vec<MessageCarrier>) -> Result<BatchOutcome> {
        process(
            &self.queue,
            &self.entity_client,
            &NoopValidator,
            &self.store,
            &self.publisher,
            "arn:aws:sns:eu-west-2:123:dr-topic",
            self.staging_dir.path(),
            carriers,
        )
        .await
    }
}

// Scenario 1: Fresh IO.
#[tokio::test]
async fn fresh_io_creates_object_with_one_file_and_one_created_event() {
    let io_ref = uuid_ref("a10a");
    let harness = Harness::new(FakeEntityClient::with_io(io_ref, "SRC-1"));

    let outcome = harness
        .run(vec![carrier("h1", Message::InformationObjectMessage { entity_ref: io_ref })])
        .await
        .unwrap();

    assert_eq!(outcome.missing, 1);
    assert_eq!(outcome.acked, 1);

    let written = std::fs::read(
        harness
            .store
            .object_root(&io_ref.to_string())
            .join("v1/content")
            .join(format!("{}/IO_Metadata.xml", io_ref)),
    );
    assert!(written.is_ok());

    let published = harness.publisher.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].status, "Created");
    assert_eq!(published[0].object_type, "Metadata");
    assert_eq!(published[0].bitstream_name, "SRC-1");
    assert_eq!(harness.queue.deleted.lock().unwrap().as_slice(), ["h1"]);
}

// Scenario 2: Fresh CO, preservation rep 1.
#[tokio::test]
async fn fresh_co_in_preservation_rep_1_produces_expected_paths_and_events() {
    let io_ref = uuid_ref("a10a");
    let co_ref = uuid_ref("c0c0");
    let bitstream_id = uuid_ref("b5b5").0;
    let bitstream_name = format!("{}.tif", bitstream_id);

    let entity_client = FakeEntityClient::default();
    entity_client.add_co(
        io_ref,
        co_ref,
        &bitstream_name,
        "c3a48c18d51181158ff5055329d261ff9e9aca753d208431e58868222da5a95a",
        RepresentationType::Preservation,
        1,
        b"tiff-bytes",
    );
    let harness = Harness::new(entity_client);

    let outcome = harness
        .run(vec![carrier("h1", Message::ContentObjectMessage { entity_ref: co_ref })])
        .await
        .unwrap();

    assert_eq!(outcome.missing, 2);

    let object_root = harness.store.object_root(&io_ref.to_string());
    let metadata_path = object_root.join("v1/content").join(format!(
        "{}/Preservation_1/{}/CO_Metadata.xml",
        io_ref, co_ref
    ));
    let bitstream_path = object_root.join("v1/content").join(format!(
        "{}/Preservation_1/{}/original/g1/{}",
        io_ref, co_ref, bitstream_name
    ));
    assert!(metadata_path.exists());
    assert!(bitstream_path.exists());
    assert_eq!(std::fs::read(&bitstream_path).unwrap(), b"tiff-bytes");

    let published = harness.publisher.published.lock().unwrap();
    assert_eq!(published.len(), 2);
    assert!(published.iter().all(|m| m.status == "Created"));
}

// Scenario 3: Replay.
#[tokio::test]
async fn replay_of_identical_batch_is_a_no_op() {
    let io_ref = uuid_ref("a10a");
    let co_ref = uuid_ref("c0c0");
    let bitstream_id = uuid_ref("b5b5").0;
    let bitstream_name = format!("{}.tif", bitstream_id);

    let entity_client = FakeEntityClient::default();
    entity_client.add_co(
        io_ref,
        co_ref,
        &bitstream_name,
        "c3a48c18d51181158ff5055329d261ff9e9aca753d208431e58868222da5a95a",
        RepresentationType::Preservation,
        1,
        b"tiff-bytes",
    );
    let harness = Harness::new(entity_client);

    harness
        .run(vec![carrier("h1", Message::ContentObjectMessage { entity_ref: co_ref })])
        .await
        .unwrap();

    let outcome = harness
        .run(vec![carrier("h2", Message::ContentObjectMessage { entity_ref: co_ref })])
        .await
        .unwrap();

    assert_eq!(outcome.missing, 0);
    assert_eq!(outcome.changed, 0);
    assert_eq!(outcome.unchanged, 2);
    assert_eq!(harness.publisher.published.lock().unwrap().len(), 2);
}

// Scenario 4: Metadata change.
#[tokio::test]
async fn metadata_change_commits_a_new_version_and_publishes_updated() {
    let io_ref = uuid_ref("a10a");
    let entity_client = FakeEntityClient::with_io(io_ref, "SRC-1");
    let harness = Harness::new(entity_client);

    harness
        .run(vec![carrier("h1", Message::InformationObjectMessage { entity_ref: io_ref })])
        .await
        .unwrap();

    harness.entity_client.io_metadata.lock().unwrap().insert(
        io_ref.to_string(),
        EntityMetadata::Io {
            entity: XmlNode::new("Entity"),
            representations: vec![],
            common: CommonFragments {
                identifiers: vec![
                    source_id_fragment("SRC-1"),
                    {
                        let mut extra = XmlNode::new("Identifier");
                        let mut t = XmlNode::new("Type");
                        t.children.push(XmlChild::Text("ApplicationID".to_string()));
                        let mut v = XmlNode::new("Value");
                        v.children.push(XmlChild::Text("APP-9".to_string()));
                        extra.children.push(XmlChild::Element(t));
                        extra.children.push(XmlChild::Element(v));
                        extra
                    },
                ],
                ..Default::default()
            },
        },
    );

    let outcome = harness
        .run(vec![carrier("h2", Message::InformationObjectMessage { entity_ref: io_ref })])
        .await
        .unwrap();

    assert_eq!(outcome.changed, 1);
    assert_eq!(outcome.missing, 0);

    let object_root = harness.store.object_root(&io_ref.to_string());
    assert!(object_root.join("v2").exists());

    let published = harness.publisher.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].status, "Updated");
}

// Scenario 5: Conflicting representation.
#[tokio::test]
async fn co_in_two_representation_groups_fails_without_ack_or_mutation() {
    let io_ref = uuid_ref("a10a");
    let co_ref = uuid_ref("c0c0");
    let bitstream_id = uuid_ref("b5b5").0;
    let bitstream_name = format!("{}.tif", bitstream_id);

    let entity_client = FakeEntityClient::default();
    entity_client.add_co(
        io_ref,
        co_ref,
        &bitstream_name,
        "c3a48c18d51181158ff5055329d261ff9e9aca753d208431e58868222da5a95a",
        RepresentationType::Preservation,
        1,
        b"tiff-bytes",
    );
    entity_client.representation_urls.lock().unwrap().entry(io_ref.to_string()).or_default().push(
        format!("https://example.test/entities/io/{}/representations/access/2", io_ref),
    );
    entity_client.representation_members.lock().unwrap().insert(
        (io_ref.to_string(), "Access".to_string(), 2),
        vec![co_ref],
    );

    let harness = Harness::new(entity_client);

    let result = harness
        .run(vec![carrier("h1", Message::ContentObjectMessage { entity_ref: co_ref })])
        .await;

    assert!(matches!(result, Err(ReplicatorError::Invariant(_))));
    assert!(harness.queue.deleted.lock().unwrap().is_empty());
    assert!(!harness.store.object_root(&io_ref.to_string()).exists());
}

// Scenario 6: Duplicated messages.
#[tokio::test]
async fn triplicated_co_message_resolves_upstream_once_and_acks_all_three() {
    let io_ref = uuid_ref("a10a");
    let co_ref = uuid_ref("c0c0");
    let bitstream_id = uuid_ref("b5b5").0;
    let bitstream_name = format!("{}.tif", bitstream_id);

    let entity_client = FakeEntityClient::default();
    entity_client.add_co(
        io_ref,
        co_ref,
        &bitstream_name,
        "c3a48c18d51181158ff5055329d261ff9e9aca753d208431e58868222da5a95a",
        RepresentationType::Preservation,
        1,
        b"tiff-bytes",
    );
    let harness = Harness::new(entity_client);

    let message = Message::ContentObjectMessage { entity_ref: co_ref };
    let outcome = harness
        .run(vec![
            carrier("h1", message),
            carrier("h2", message),
            carrier("h3", message),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.missing, 2);
    assert_eq!(outcome.acked, 3);
    assert_eq!(harness.publisher.published.lock().unwrap().len(), 2);
    assert_eq!(
        *harness.entity_client.fetch_count.lock().unwrap().get(&co_ref.to_string()).unwrap(),
        1
    );
}
