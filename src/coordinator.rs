//! Batch Coordinator: the top-level `process` orchestration --
//! dedupe -> resolve -> classify -> stage -> commit -> notify -> acknowledge
//! (`spec.md` 4.1).

use std::collections::BTreeMap;
use std::path::Path;

use futures::future::try_join_all;

use crate::clients::{EntityClient, EventPublisher, QueueClient, Validator};
use crate::error::Result;
use crate::model::{DrObject, EntityRef, Message, MessageCarrier, StagedWrite};
use crate::notifier;
use crate::ocfl::LocalStore;
use crate::resolver;
use crate::staging;

/// Summary of one `process` invocation, returned for logging/metrics at the call site.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub missing: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub acked: usize,
}

/// Runs the full reconciliation pipeline over one batch of message carriers. Returns
/// `Ok` only once every staged object has been committed, its event published, and
/// every carrier that contributed to the batch deleted from the queue.
///
/// A decode failure is not an error: that carrier is simply dropped from the batch and
/// left on the queue for redelivery (`spec.md` 4.1 step 1). Any other failure aborts
/// the whole batch before any carrier is deleted or acknowledged.
pub async fn process(
    queue: &dyn QueueClient,
    entity_client: &dyn EntityClient,
    validator: &dyn Validator,
    store: &LocalStore,
    publisher: &dyn EventPublisher,
    topic: &str,
    staging_dir: &Path,
    carriers: Vec<MessageCarrier>,
) -> Result<BatchOutcome> {
    let decoded: Vec<MessageCarrier> = carriers
        .into_iter()
        .filter(|c| c.message.is_some())
        .collect();

    if decoded.is_empty() {
        return Ok(BatchOutcome::default());
    }

    let unique_messages = dedupe_by_canonical_text(&decoded);

    let resolved = try_join_all(
        unique_messages
            .iter()
            .map(|message| resolver::resolve(entity_client, validator, message)),
    )
    .await?;
    let candidates: Vec<DrObject> = resolved.into_iter().flatten().collect();

    let classification = store.classify(candidates)?;

    let (missing_staged, changed_staged) = tokio::try_join!(
        staging::stage_all(entity_client, staging_dir, &classification.missing),
        staging::stage_all(entity_client, staging_dir, &classification.changed),
    )?;

    commit_by_object(
        store,
        &classification.missing,
        &missing_staged,
        &classification.changed,
        &changed_staged,
    )
    .await?;

    notifier::publish_events(publisher, topic, &classification.missing, &classification.changed)
        .await?;

    for carrier in &decoded {
        queue.delete(&carrier.receipt).await?;
    }

    Ok(BatchOutcome {
        missing: classification.missing.len(),
        changed: classification.changed.len(),
        unchanged: classification.unchanged_count,
        acked: decoded.len(),
    })
}

fn dedupe_by_canonical_text(carriers: &[MessageCarrier]) -> Vec<Message> {
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();
    for carrier in carriers {
        let message = carrier.message.as_ref().expect("filtered to decoded carriers");
        if seen.insert(message.canonical_text()) {
            unique.push(*message);
        }
    }
    unique
}

/// Commits the missing and changed staged writes destined for the same OCFL object in
/// a single new version, so an object touched by both a new file and a modified file
/// in one batch gets exactly one version, not two (`spec.md` 4.1 step 7).
async fn commit_by_object(
    store: &LocalStore,
    missing: &[DrObject],
    missing_staged: &[StagedWrite],
    changed: &[DrObject],
    changed_staged: &[StagedWrite],
) -> Result<()> {
    let mut by_object: BTreeMap<EntityRef, Vec<StagedWrite>> = BTreeMap::new();

    for (object, staged) in missing.iter().zip(missing_staged.iter()) {
        by_object.entry(object.io_ref()).or_default().push(staged.clone());
    }
    for (object, staged) in changed.iter().zip(changed_staged.iter()) {
        by_object.entry(object.io_ref()).or_default().push(staged.clone());
    }

    for (io_ref, staged) in by_object {
        store.commit(io_ref, &staged).await?;
    }

    Ok(())
}
