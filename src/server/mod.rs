//! Server core of swipex.
//!
//! This module contains the background side of the swipex backend: the task queue and worker
//! runtime, the cache-aside decorators around the repositories, and the account and order
//! services executed by the worker.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod service;
pub mod startup;
pub mod worker;
