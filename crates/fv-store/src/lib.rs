//! Shared store contract.
//!
//! Market records live in a shared key/hash store (Redis in production).
//! Every component talks to it through [`SharedStore`], an object-safe
//! trait with two backends:
//!
//! - [`InMemoryStore`]: single-process store for tests and dry runs
//! - [`RedisStore`]: Redis via a multiplexed `ConnectionManager`

pub mod config;
pub mod error;
mod glob;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use config::{create_store, StoreConfig, StoreKind};
pub use error::{StoreError, StoreResult};
pub use glob::glob_match;
pub use memory::{InMemoryStore, PublishedMessage};
pub use redis_store::RedisStore;
pub use store::{BoxFuture, FieldMap, SharedStore, StoreOp};
