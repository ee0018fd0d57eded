pub mod memory;
pub mod pinning;

use async_trait::async_trait;
use model::{errors::MarketError, metadata::ContentAddress};
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;
pub use pinning::PinningClient;

#[derive(Debug, Error)]
pub enum IpfsError {
    #[error("content store unreachable: {0}")]
    Unreachable(String),
    #[error("content store returned {status} for {what}")]
    Status { status: u16, what: String },
    #[error("pinning response has no content hash")]
    MissingHash,
    #[error("content not found: {0}")]
    NotFound(ContentAddress),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for IpfsError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            IpfsError::InvalidDocument(value.to_string())
        } else {
            IpfsError::Unreachable(value.to_string())
        }
    }
}

impl From<IpfsError> for MarketError {
    fn from(value: IpfsError) -> Self {
        match value {
            IpfsError::NotFound(_) | IpfsError::InvalidDocument(_) => {
                MarketError::MetadataUnresolvable(value.to_string())
            }
            _ => MarketError::TransientNetworkError(value.to_string()),
        }
    }
}

/// Content-addressed document storage.
///
/// Documents are immutable per address: `resolve(pin(doc)) == doc`.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn pin(&self, document: &Value) -> Result<ContentAddress, IpfsError>;

    async fn resolve(&self, address: &ContentAddress) -> Result<Value, IpfsError>;
}
