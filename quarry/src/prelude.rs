//! Convenient re-exports of commonly used types from quarry.
//!
//! ```ignore
//! use quarry::prelude::*;
//! ```
//!
//! `DynStoreBackend` is not exported here. With both backend traits in scope, method
//! calls on concrete backends are ambiguous.

pub use bson::{Bson, doc};

pub use quarry_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    cursor::Cursor,
    document::{Document, DocumentExt, Record},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Condition, Order, Projection},
    store::{
        DocumentStore, DynDocumentStore, FindAndModifyOptions, RemoveOptions, UpdateOptions,
        UpdateReport,
    },
};
