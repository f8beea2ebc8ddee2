//! Storage backend abstraction for the document store.
//!
//! This module defines the Storage Contract every backend provides: identifier-keyed
//! `read`/`write`/`erase`/`exist` plus `index`, which enumerates every identifier
//! currently stored. Everything above it (cursors, update operators, the
//! [`DocumentStore`](crate::store::DocumentStore) verbs) depends only on this trait.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use quarry_core::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! backend.write("alice", doc! { "name": "Alice", "age": 30 }).await?;
//! assert!(backend.exist("alice").await?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use std::{any::Any, fmt::Debug};

use crate::{document::Document, error::DocumentStoreResult};

/// Abstract interface for document storage backends.
///
/// A backend stores one namespace of documents, each named by an opaque string
/// identifier. No ordering is required of [`index`](StoreBackend::index) beyond
/// listing every current identifier exactly once.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. When several stores share the same
/// underlying data, the backend is responsible for serializing concurrent
/// mutations.
///
/// # Identifier escaping
///
/// Backends whose storage keys cannot hold arbitrary identifiers override
/// [`escape`](StoreBackend::escape) and [`unescape`](StoreBackend::unescape). The pair
/// must be a bijection on the keys the backend produces: distinct identifiers never
/// escape to the same key, and unescaping an escaped key recovers the identifier or
/// fails explicitly.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Reads the document stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`](crate::error::DocumentStoreError::DocumentNotFound)
    /// if nothing is stored under `id`, or a decode/storage error.
    async fn read(&self, id: &str) -> DocumentStoreResult<Document>;

    /// Stores `document` under `id`, replacing any existing document.
    ///
    /// # Errors
    ///
    /// Returns an encode or storage error if the document cannot be persisted.
    async fn write(&self, id: &str, document: Document) -> DocumentStoreResult<()>;

    /// Removes the document stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`](crate::error::DocumentStoreError::DocumentNotFound)
    /// if nothing is stored under `id`.
    async fn erase(&self, id: &str) -> DocumentStoreResult<()>;

    /// Reports whether a document is stored under `id`.
    async fn exist(&self, id: &str) -> DocumentStoreResult<bool>;

    /// Lists the identifiers of every stored document.
    async fn index(&self) -> DocumentStoreResult<Vec<String>>;

    /// Maps an identifier to the backend's storage key.
    fn escape(&self, id: &str) -> String {
        id.to_string()
    }

    /// Maps a storage key produced by [`escape`](StoreBackend::escape) back to its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidIdentifier`](crate::error::DocumentStoreError::InvalidIdentifier)
    /// for keys the backend could not have produced.
    fn unescape(&self, key: &str) -> DocumentStoreResult<String> {
        Ok(key.to_string())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn read(&self, id: &str) -> DocumentStoreResult<Document> {
        StoreBackend::read(*self, id).await
    }

    async fn write(&self, id: &str, document: Document) -> DocumentStoreResult<()> {
        StoreBackend::write(*self, id, document).await
    }

    async fn erase(&self, id: &str) -> DocumentStoreResult<()> {
        StoreBackend::erase(*self, id).await
    }

    async fn exist(&self, id: &str) -> DocumentStoreResult<bool> {
        StoreBackend::exist(*self, id).await
    }

    async fn index(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::index(*self).await
    }

    fn escape(&self, id: &str) -> String {
        StoreBackend::escape(*self, id)
    }

    fn unescape(&self, key: &str) -> DocumentStoreResult<String> {
        StoreBackend::unescape(*self, key)
    }
}

/// Object-safe companion of [`StoreBackend`] supporting downcasts.
///
/// Implemented for every `StoreBackend + 'static`. A `Box<dyn DynStoreBackend>` is
/// itself a [`StoreBackend`], so the backend of a store can be chosen at runtime.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn read(&self, id: &str) -> DocumentStoreResult<Document>;
    async fn write(&self, id: &str, document: Document) -> DocumentStoreResult<()>;
    async fn erase(&self, id: &str) -> DocumentStoreResult<()>;
    async fn exist(&self, id: &str) -> DocumentStoreResult<bool>;
    async fn index(&self) -> DocumentStoreResult<Vec<String>>;
    fn escape(&self, id: &str) -> String;
    fn unescape(&self, key: &str) -> DocumentStoreResult<String>;

    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn read(&self, id: &str) -> DocumentStoreResult<Document> {
        StoreBackend::read(self, id).await
    }

    async fn write(&self, id: &str, document: Document) -> DocumentStoreResult<()> {
        StoreBackend::write(self, id, document).await
    }

    async fn erase(&self, id: &str) -> DocumentStoreResult<()> {
        StoreBackend::erase(self, id).await
    }

    async fn exist(&self, id: &str) -> DocumentStoreResult<bool> {
        StoreBackend::exist(self, id).await
    }

    async fn index(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::index(self).await
    }

    fn escape(&self, id: &str) -> String {
        StoreBackend::escape(self, id)
    }

    fn unescape(&self, key: &str) -> DocumentStoreResult<String> {
        StoreBackend::unescape(self, key)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[async_trait]
impl StoreBackend for Box<dyn DynStoreBackend> {
    async fn read(&self, id: &str) -> DocumentStoreResult<Document> {
        DynStoreBackend::read(&**self, id).await
    }

    async fn write(&self, id: &str, document: Document) -> DocumentStoreResult<()> {
        DynStoreBackend::write(&**self, id, document).await
    }

    async fn erase(&self, id: &str) -> DocumentStoreResult<()> {
        DynStoreBackend::erase(&**self, id).await
    }

    async fn exist(&self, id: &str) -> DocumentStoreResult<bool> {
        DynStoreBackend::exist(&**self, id).await
    }

    async fn index(&self) -> DocumentStoreResult<Vec<String>> {
        DynStoreBackend::index(&**self).await
    }

    fn escape(&self, id: &str) -> String {
        DynStoreBackend::escape(&**self, id)
    }

    fn unescape(&self, key: &str) -> DocumentStoreResult<String> {
        DynStoreBackend::unescape(&**self, key)
    }
}

/// Factory trait implemented by backend builders.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
