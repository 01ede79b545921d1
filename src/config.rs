//! Configuration loading: a TOML file naming the queue, topic, repository paths, and
//! upstream credential handle (`spec.md` 6), plus the ambient tuning knobs the source
//! doesn't name but any deployment needs.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ReplicatorError, Result};

fn default_batch_size() -> i64 {
    10
}

fn default_poll_interval_secs() -> u64 {
    20
}

fn default_call_timeout_secs() -> u64 {
    30
}

/// Replicator configuration, loaded from a TOML file at startup.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(rename = "sqsQueueUrl")]
    pub sqs_queue_url: String,
    #[serde(rename = "topicArn")]
    pub topic_arn: String,
    #[serde(rename = "ocflRepoDir")]
    pub ocfl_repo_dir: String,
    #[serde(rename = "ocflWorkDir")]
    pub ocfl_work_dir: String,
    #[serde(rename = "preservicaSecretName")]
    pub preservica_secret_name: String,
    #[serde(rename = "entityApiBaseUrl")]
    pub entity_api_base_url: String,
    #[serde(rename = "xipSchemaPath")]
    pub xip_schema_path: String,
    #[serde(rename = "awsRegion", default = "default_region")]
    pub aws_region: String,
    #[serde(rename = "batchSize", default = "default_batch_size")]
    pub batch_size: i64,
    #[serde(rename = "pollIntervalSecs", default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(rename = "callTimeoutSecs", default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

fn default_region() -> String {
    "eu-west-2".to_string()
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.sqs_queue_url.trim().is_empty() {
            return Err(ReplicatorError::Config("sqsQueueUrl must not be empty".to_string()));
        }
        if self.topic_arn.trim().is_empty() {
            return Err(ReplicatorError::Config("topicArn must not be empty".to_string()));
        }
        if self.batch_size < 1 || self.batch_size > 10 {
            return Err(ReplicatorError::Config(
                "batchSize must be between 1 and 10 (the queue's receive limit)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads and validates configuration from a TOML file at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        ReplicatorError::Config(format!("failed to read config file {}: {}", path.display(), e))
    })?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}
