mod rpc;
mod utils;

use async_trait::async_trait;

use crate::types::Block;

pub use rpc::RpcBlockSource;

/// Failures talking to a block source
///
/// None of these are fatal to the scanner. A failed call aborts the current tick,
/// and the next tick retries from the unchanged cursor
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("block source unavailable: {0}")]
    Unavailable(String),

    #[error("request to block source timed out")]
    Timeout,

    #[error("malformed response from block source: {0}")]
    Decode(String),

    #[error("block source returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("block {0} not available")]
    MissingBlock(u64),
}

impl SourceError {
    /// Transport-level failure, as opposed to a response we could not make sense of
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}

/// Supplies the chain head and block contents on demand
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn head_block_number(&self) -> Result<u64, SourceError>;

    async fn block_by_number(&self, number: u64) -> Result<Block, SourceError>;
}

#[async_trait]
impl<T: BlockSource + ?Sized> BlockSource for std::sync::Arc<T> {
    async fn head_block_number(&self) -> Result<u64, SourceError> {
        (**self).head_block_number().await
    }

    async fn block_by_number(&self, number: u64) -> Result<Block, SourceError> {
        (**self).block_by_number(number).await
    }
}
