use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use crate::CacheKey;

/// Error type returned by user service functions.
pub type ServiceError = Box<dyn StdError + Send + Sync>;

/// Failure observed by a request.
///
/// Cloneable because one de-duplicated service call may be awaited by several
/// requests at once.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    #[error("service failed: {0}")]
    Service(Arc<dyn StdError + Send + Sync>),
    #[error("shared entry for cache key {key} holds a different data type")]
    TypeMismatch { key: CacheKey },
}

impl RequestError {
    pub fn service(err: ServiceError) -> Self {
        RequestError::Service(Arc::from(err))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read request config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid request config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
