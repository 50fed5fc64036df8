//! Cache error types.
//!
//! A cache miss is not an error, lookups return `Ok(None)` instead. The variants here cover
//! the cases where a cached entry exists but cannot be used, or where the cache backend
//! itself failed.

use thiserror::Error;

use crate::server::cache::codec::Shape;

#[derive(Error, Debug)]
pub enum CacheError {
    /// A cached entry was decoded with the wrong shape.
    ///
    /// Decoding a multi-row entry as a single row (or the opposite) is a programming error in
    /// the decorator that produced the key, it is surfaced immediately instead of returning
    /// partial data.
    #[error("Cached entry shape mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: Shape, found: Shape },

    /// Failed to encode a value before writing it to the cache.
    #[error("Failed to encode cache entry: {0}")]
    Encode(String),

    /// Failed to decode a cached entry into the requested type.
    #[error("Failed to decode cache entry: {0}")]
    Decode(String),

    /// The cache backend returned an error.
    #[error("Cache backend error: {0}")]
    Backend(String),
}

impl From<fred::error::Error> for CacheError {
    fn from(err: fred::error::Error) -> Self {
        Self::Backend(err.to_string())
    }
}
