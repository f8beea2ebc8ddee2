//! Main quarry crate: an embeddable document query and update engine.
//!
//! This crate is the primary entry point for users of quarry. It re-exports the core
//! types from `quarry-core` and gives access to the storage backends.
//!
//! # Features
//!
//! - **Lazy cursors** - Chain `filter`, `project`, `sort`, `offset` and `limit` in any order
//! - **Update operators** - `$set`, `$unset`, `$rename`, `$push`, `$pull` and `$inc`
//! - **Pluggable storage** - Any type implementing [`backend::StoreBackend`] can hold documents
//!
//! # Quick Start
//!
//! ```ignore
//! use quarry::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!
//!     store.insert(doc! { "item": "pen", "price": 2, "stock": 10 }).await?;
//!     store.insert(doc! { "item": "ink", "price": 7, "stock": 0 }).await?;
//!
//!     let in_stock = store
//!         .find(Condition::predicate(|d| d.get_i32("stock").unwrap_or(0) > 0), Projection::All)
//!         .sort(doc! { "price": -1 })
//!         .project(doc! { "item": 1 })
//!         .to_array()
//!         .await?;
//!
//!     store
//!         .update(doc! { "item": "ink" }, doc! { "$inc": { "stock": 5 } }, UpdateOptions::default())
//!         .await?;
//!
//!     println!("{in_stock:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! A typed store converts into a [`store::DynDocumentStore`] with `into_dyn`, so the
//! backend can be chosen at runtime:
//!
//! ```ignore
//! let store: DynDocumentStore = if persistent {
//!     DocumentStore::new(FileStore::builder(path).create_dir().build().await?).into_dyn()
//! } else {
//!     DocumentStore::new(InMemoryStore::new()).into_dyn()
//! };
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage with optionally shared namespaces
//! - `file` - One JSON file per document (requires the `file` feature)

pub mod prelude;

pub use quarry_core::{backend, cursor, document, error, query, store, update};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use quarry_memory::{InMemoryStore, InMemoryStoreBuilder, Namespace, NamespaceRegistry};
}

/// Flat-file storage backend implementations.
///
/// This module is only available when the `file` feature is enabled.
#[cfg(feature = "file")]
pub mod file {
    pub use quarry_file::{FileStore, FileStoreBuilder};
}
