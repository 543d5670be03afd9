//! Metadata Source Port
//!
//! Read-only access to the third-party movie/TV metadata API.

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata request failed: {0}")]
    Request(String),
    #[error("metadata API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("metadata response could not be decoded: {0}")]
    Decode(String),
}

impl MetadataError {
    /// Upstream status, when the API answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Outbound port for metadata lookups.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// GET `path` (relative to the API root) with query parameters.
    async fn fetch(&self, path: &str, query: &[(&str, String)]) -> Result<Value, MetadataError>;
}
