//! Crate-wide error type.
//!
//! One variant per error kind named in the reconciliation pipeline's design. A queue
//! message that fails to decode is not represented here -- it's recoverable by the
//! caller, so `MessageCarrier::message` is simply `None` and the carrier is left on
//! the queue for redelivery rather than raising an error.

use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::io;

use thiserror::Error;

pub type Result<T, E = ReplicatorError> = core::result::Result<T, E>;

#[derive(Error)]
pub enum ReplicatorError {
    /// Network or protocol failure talking to the entity service.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Composed metadata failed schema validation.
    #[error("schema validation failed: {0}")]
    Schema(String),

    /// One of the fixed invariants in the data model was violated.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// OCFL commit or local filesystem write failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Event publish failure after a successful commit.
    #[error("notify error: {0}")]
    Notify(String),

    /// Invalid or missing configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Io(io::Error),

    #[error("{0}")]
    Wrapped(Box<dyn std::error::Error + Send + Sync>),
}

impl Debug for ReplicatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<io::Error> for ReplicatorError {
    fn from(e: io::Error) -> Self {
        ReplicatorError::Io(e)
    }
}

impl From<serde_json::Error> for ReplicatorError {
    fn from(e: serde_json::Error) -> Self {
        ReplicatorError::Wrapped(Box::new(e))
    }
}

impl From<toml::de::Error> for ReplicatorError {
    fn from(e: toml::de::Error) -> Self {
        ReplicatorError::Config(e.to_string())
    }
}

impl From<uuid::Error> for ReplicatorError {
    fn from(e: uuid::Error) -> Self {
        ReplicatorError::Invariant(format!("malformed uuid: {}", e))
    }
}

impl From<quick_xml::Error> for ReplicatorError {
    fn from(e: quick_xml::Error) -> Self {
        ReplicatorError::Wrapped(Box::new(e))
    }
}
