use crate::api_client::ApiClientError;
use crate::types::FeedKey;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, FeedError>;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API client error: {0}")]
    Api(#[from] ApiClientError),

    #[error("Feed item not found: {0}")]
    ItemNotFound(FeedKey),

    #[error("Engine has been shut down")]
    Shutdown,

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}
