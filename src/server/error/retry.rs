use sea_orm::DbErr;

use super::{
    cache::CacheError, config::ConfigError, data::DataError, worker::WorkerError, Error,
};

/// Strategy for handling errors in a retry context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorRetryStrategy {
    /// Retry with exponential backoff (transient failures)
    Retry,
    /// Failed permanently (bad input, programming errors)
    Fail,
}

impl Error {
    /// Determine error retry strategy based upon application Error type
    pub fn to_retry_strategy(&self) -> ErrorRetryStrategy {
        match self {
            Self::WorkerError(worker_error) => match worker_error {
                // Broker may come back, keep trying until the budget is spent
                WorkerError::BrokerUnavailable(_) => ErrorRetryStrategy::Retry,
                // Handlers failing or running too long may succeed on a later attempt
                WorkerError::HandlerExecution { .. } => ErrorRetryStrategy::Retry,
                WorkerError::Timeout { .. } => ErrorRetryStrategy::Retry,
                WorkerError::HealthCheckTimeout(_) => ErrorRetryStrategy::Retry,

                // Payloads that don't decode will never decode
                WorkerError::SerializationError(_) => ErrorRetryStrategy::Fail,
                WorkerError::UnregisteredTask(_) => ErrorRetryStrategy::Fail,
            },

            Self::DbErr(db_err) => match db_err {
                // Connection errors - transient, should retry
                DbErr::ConnectionAcquire(_) => ErrorRetryStrategy::Retry,
                DbErr::Conn(_) => ErrorRetryStrategy::Retry,

                // All other database errors are permanent failures:
                // constraint violations, type conversions, missing records
                _ => ErrorRetryStrategy::Fail,
            },

            Self::DataError(data_error) => match data_error {
                DataError::NotFound(_) => ErrorRetryStrategy::Fail,
                DataError::InvalidInput(_) => ErrorRetryStrategy::Fail,
                // Query failures cover dropped connections as well as bad SQL
                DataError::QueryError(_) => ErrorRetryStrategy::Retry,
            },

            Self::CacheError(cache_error) => match cache_error {
                CacheError::Backend(_) => ErrorRetryStrategy::Retry,
                CacheError::TypeMismatch { .. }
                | CacheError::Encode(_)
                | CacheError::Decode(_) => ErrorRetryStrategy::Fail,
            },

            // Redis errors - transient, connection issues
            Self::RedisError(_) => ErrorRetryStrategy::Retry,

            Self::ConfigError(ConfigError::MissingEnvVar(_))
            | Self::ConfigError(ConfigError::InvalidEnvValue { .. }) => ErrorRetryStrategy::Fail,

            // InternalError - permanent failures (internal error within swipex's code)
            Self::InternalError(_) => ErrorRetryStrategy::Fail,
        }
    }
}
