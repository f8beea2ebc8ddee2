//! Flat-file document storage backend for quarry.
//!
//! Each document is stored as one JSON file inside a directory. Identifiers are
//! escaped into file names that are safe on case-insensitive filesystems and are
//! recovered exactly when the directory is enumerated.
//!
//! # Quick Start
//!
//! ```ignore
//! use quarry::prelude::*;
//! use quarry::file::FileStore;
//!
//! let store = DocumentStore::new(FileStore::builder("./data").create_dir().build().await?);
//! store.save("Invoice/42", doc! { "total": 99.5 }).await?;
//! ```

mod escape;
pub mod store;

pub use store::{FileStore, FileStoreBuilder};
