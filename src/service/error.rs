use thiserror::Error;

use crate::error::HttpError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed event: {0}")]
    MalformedEvent(String),
}

/// Failure talking to the product update feed.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Redis feed error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Kafka feed error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

impl ServiceError {
    /// Failures worth another attempt: dropped connections, I/O errors and
    /// pool exhaustion. Query and protocol errors are never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed
            ),
            ServiceError::Cache(e) => {
                e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal()
            }
            _ => false,
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation(_) | ServiceError::MalformedEvent(_) => {
                HttpError::bad_request(error.to_string())
            }
            _ => {
                tracing::error!("Request aborted by downstream failure: {}", error);
                HttpError::server_error(error.to_string())
            }
        }
    }
}
