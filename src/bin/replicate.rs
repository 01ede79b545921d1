//! Entry point: loads configuration, binds the OCFL store and external clients, and
//! runs the receive/process loop until terminated.

use std::process::exit;
#[cfg(feature = "aws")]
use std::time::Duration;

use dr_replicator::config;
#[cfg(feature = "aws")]
use dr_replicator::config::Config;
#[cfg(feature = "aws")]
use dr_replicator::coordinator;
use dr_replicator::error::{ReplicatorError, Result};
use dr_replicator::ocfl::LocalStore;

const CONFIG_EXIT_CODE: i32 = 1;
const SCHEMA_EXIT_CODE: i32 = 2;
const RUNTIME_EXIT_CODE: i32 = 3;

fn main() {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "dr-replicator.toml".to_string());

    let runtime = tokio::runtime::Runtime::new().expect("failed to start the tokio runtime");
    if let Err(e) = runtime.block_on(run(&config_path)) {
        log::error!("{}", e);
        exit(exit_code_for(&e));
    }
}

fn exit_code_for(error: &ReplicatorError) -> i32 {
    match error {
        ReplicatorError::Config(_) => CONFIG_EXIT_CODE,
        ReplicatorError::Schema(_) => SCHEMA_EXIT_CODE,
        _ => RUNTIME_EXIT_CODE,
    }
}

async fn run(config_path: &str) -> Result<()> {
    let config = config::load_config(config_path)?;
    let store = LocalStore::open(&config.ocfl_repo_dir, &config.ocfl_work_dir)?;

    #[cfg(feature = "aws")]
    {
        run_with_aws_clients(&config, &store).await
    }

    #[cfg(not(feature = "aws"))]
    {
        let _ = &store;
        Err(ReplicatorError::Config(
            "the `aws` feature must be enabled to run the replicator against real infrastructure"
                .to_string(),
        ))
    }
}

#[cfg(feature = "aws")]
async fn run_with_aws_clients(config: &Config, store: &LocalStore) -> Result<()> {
    use dr_replicator::clients::aws::{
        resolve_credential_secret, HttpEntityClient, SnsEventPublisher, SqsQueueClient,
        XipSchemaValidator,
    };
    use dr_replicator::clients::QueueClient;
    use rusoto_core::Region;

    resolve_credential_secret(&config.preservica_secret_name)?;

    let region: Region = config
        .aws_region
        .parse()
        .map_err(|e| ReplicatorError::Config(format!("invalid awsRegion: {}", e)))?;

    let call_timeout = Duration::from_secs(config.call_timeout_secs);
    let queue = SqsQueueClient::new(region.clone(), &config.sqs_queue_url, config.batch_size, call_timeout);
    let entity_client = HttpEntityClient::new(&config.entity_api_base_url, call_timeout);
    let publisher = SnsEventPublisher::new(region, call_timeout);
    let validator = XipSchemaValidator::from_schema_path(&config.xip_schema_path)?;

    let staging_root = tempfile::tempdir_in(&config.ocfl_work_dir)?;

    loop {
        let carriers = queue.receive().await?;
        if carriers.is_empty() {
            tokio::time::sleep(Duration::from_secs(config.poll_interval_secs)).await;
            continue;
        }

        let batch_staging = tempfile::tempdir_in(staging_root.path())?;
        let outcome = coordinator::process(
            &queue,
            &entity_client,
            &validator,
            store,
            &publisher,
            &config.topic_arn,
            batch_staging.path(),
            carriers,
        )
        .await?;

        log::info!(
            "batch complete: {} missing, {} changed, {} unchanged, {} acked",
            outcome.missing,
            outcome.changed,
            outcome.unchanged,
            outcome.acked
        );
    }
}
