//! Data layer error types.
//!
//! Repositories surface these errors unchanged to their callers; cache decorators never
//! cache a failed read, so a `NotFound` is observed again on the next call.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    /// A query expected exactly one row but matched none.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A query failed to execute or its rows could not be decoded.
    #[error("Query failed: {0}")]
    QueryError(String),

    /// A write was rejected before reaching the store.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<sea_orm::DbErr> for DataError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err {
            sea_orm::DbErr::RecordNotFound(what) => Self::NotFound(what),
            other => Self::QueryError(other.to_string()),
        }
    }
}
