//! Data access layer repositories.
//!
//! Each repository owns the CRUD semantics of one table and is exposed as a trait. The SQL
//! implementations run parameterized statements through the [`Database`] interface, and the
//! `Cached*Repository` decorators implement the same traits on top of any inner repository so
//! callers stay agnostic to caching.

pub mod account;
pub mod address;
pub mod category;
pub mod db;
pub mod order;

pub use db::{collect_all, collect_one, Database};
