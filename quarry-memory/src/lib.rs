//! In-memory document storage backend for quarry.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend`
//! trait, plus the [`NamespaceRegistry`] through which several stores share one set
//! of documents.
//!
//! # Quick Start
//!
//! ```ignore
//! use quarry::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!
//!     store.insert(doc! { "_id": "alice", "age": 30 }).await?;
//!     assert_eq!(store.count(doc! { "age": 30 }).await?, 1);
//!
//!     Ok(())
//! }
//! ```

pub mod registry;
pub mod store;

pub use registry::{Namespace, NamespaceRegistry};
pub use store::{InMemoryStore, InMemoryStoreBuilder};
