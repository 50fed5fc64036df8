//! Service layer.
//!
//! Each service comes in two halves: the service itself runs the operation against its
//! repository and is called by the worker handlers, while the `*Tasks` producer enqueues the
//! operation as a task for request handlers.

pub mod account;
pub mod order;
