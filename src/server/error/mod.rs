//! Error types for the swipex task and cache core.
//!
//! This module provides the error taxonomy shared by the worker runtime, the cache-aside
//! decorators and the repositories. Domain errors live in their own submodules and are
//! aggregated into [`Error`] through `thiserror`'s `#[from]` conversions, so every layer can
//! propagate with `?` while the worker still decides per error whether a retry makes sense
//! (see [`retry::ErrorRetryStrategy`]).

pub mod cache;
pub mod config;
pub mod data;
pub mod retry;
pub mod worker;

use thiserror::Error;

use crate::server::error::{
    cache::CacheError, config::ConfigError, data::DataError, worker::WorkerError,
};

/// Main error type for the swipex server core.
///
/// # Error Categories
/// - Configuration errors (missing/invalid environment variables)
/// - Worker errors (broker connectivity, serialization, handler failures)
/// - Cache errors (shape mismatches, codec failures, backend failures)
/// - Data errors (row not found, query failures)
/// - External library errors (database, Redis)
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (missing or invalid environment variables).
    #[error(transparent)]
    ConfigError(#[from] ConfigError),
    /// Worker error (broker, task serialization, handler execution).
    #[error(transparent)]
    WorkerError(#[from] WorkerError),
    /// Cache error (type mismatch, codec, backend).
    #[error(transparent)]
    CacheError(#[from] CacheError),
    /// Data layer error (not found, query).
    #[error(transparent)]
    DataError(#[from] DataError),
    /// Internal error indicating a bug in swipex's code.
    ///
    /// This error should never occur in normal operation and indicates a programming error.
    #[error("Internal error with swipex's code, this indicates a bug: {0:?}")]
    InternalError(String),
    /// Database error (connection issues, migrations).
    #[error(transparent)]
    DbErr(#[from] sea_orm::DbErr),
    /// Redis error (connection, command execution).
    #[error(transparent)]
    RedisError(#[from] fred::error::Error),
}
