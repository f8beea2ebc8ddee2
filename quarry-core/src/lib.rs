//! An embeddable document query and update engine over pluggable storage backends.
//!
//! This crate is the core of the quarry project and provides:
//!
//! - **Documents** ([`document`]) - Records, dotted field paths and value semantics
//! - **Store backend abstraction** ([`backend`]) - The storage contract every backend implements
//! - **Query compilers** ([`query`]) - Conditions, projections and sort orders
//! - **Update compiler** ([`update`]) - `$set`, `$unset`, `$rename`, `$push`, `$pull` and `$inc`
//! - **Cursors** ([`cursor`]) - Lazy, memoizing query pipelines
//! - **Document store** ([`store`]) - The query and mutation verbs over a backend
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use quarry_core::{store::DocumentStore, query::Projection};
//! use bson::doc;
//!
//! let store = DocumentStore::new(backend);
//!
//! let cheapest = store
//!     .find(doc! { "category": "pens" }, Projection::All)
//!     .sort(doc! { "price": 1 })
//!     .limit(3)
//!     .to_array()
//!     .await?;
//! ```

pub mod backend;
pub mod cursor;
pub mod document;
pub mod error;
pub mod query;
pub mod store;
pub mod update;

#[cfg(test)]
pub(crate) mod testing;
