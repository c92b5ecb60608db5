use crate::record::{RawRecord, RecordError};
use async_trait::async_trait;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("registry answered with status {0}")]
    UnexpectedStatus(u16),
    #[error("malformed registry record: {0}")]
    Malformed(#[from] RecordError),
    #[error("no registry record for key {0}")]
    NotFound(String),
    #[error("registry call timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid registry configuration: {0}")]
    InvalidConfig(String),
    #[error("could not read static registry: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse static registry: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Storage-facing side of the campaign registry.
///
/// Backends deal in raw property bags only. Normalization into
/// `CampaignLinkRecord` is done by the `Registry` client.
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<RawRecord>, RegistryError>;

    async fn get_record(&self, key: &str) -> Result<Option<RawRecord>, RegistryError>;

    /// Partial update of the usage counter.
    async fn write_call_count(&self, key: &str, count: u64) -> Result<(), RegistryError>;
}
