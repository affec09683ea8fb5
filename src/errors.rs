//! Error types for the connection pool

use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error produced by a connection factory
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Invalid capacity settings: initial={initial}, max={max}")]
    InvalidConfig { initial: usize, max: usize },

    #[error("Factory failed to create a connection ({context}): {source}")]
    Factory {
        context: String,
        #[source]
        source: Arc<dyn StdError + Send + Sync + 'static>,
    },

    #[error("Pool is closed")]
    Closed,

    #[error("Connection is already closed - rejected")]
    ConnectionClosed,

    #[error("Pool owning this connection no longer exists")]
    PoolUnavailable,

    #[error("Operation was cancelled")]
    Cancelled,
}

impl PoolError {
    pub(crate) fn factory(context: impl Into<String>, source: BoxError) -> Self {
        Self::Factory {
            context: context.into(),
            source: Arc::from(source),
        }
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_factory_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = PoolError::factory("initial fill 2/3", Box::new(io));

        assert!(err.to_string().contains("initial fill 2/3"));
        assert_eq!(err.source().map(|s| s.to_string()), Some("refused".to_string()));
    }
}
