use crate::api::ApiError;
use crate::realtime::RealtimeError;
use crate::token_store::TokenStoreError;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, DashamError>;

#[derive(Error, Debug)]
pub enum DashamError {
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Logging setup error: {0}")]
    LoggingSetup(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Realtime error: {0}")]
    Realtime(#[from] RealtimeError),

    #[error("Token store error: {0}")]
    TokenStore(#[from] TokenStoreError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for DashamError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        DashamError::Other(anyhow::anyhow!(err.to_string()))
    }
}
