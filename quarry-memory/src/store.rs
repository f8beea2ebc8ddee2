//! In-memory storage implementation for document stores.
//!
//! Documents live in a `BTreeMap` behind an async-aware read-write lock. A store is
//! either private (its own map) or attached to a namespace of a
//! [`NamespaceRegistry`], in which case every store attached to the same namespace
//! sees the same documents.

use async_trait::async_trait;
use bson::Document;
use log::trace;
use mea::rwlock::RwLock;
use std::sync::Arc;

use quarry_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
};

use crate::registry::{Namespace, NamespaceRegistry};

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable; clones share the same underlying documents.
/// Enumeration through [`index`](StoreBackend::index) yields identifiers in
/// ascending order.
///
/// # Example
///
/// ```ignore
/// use quarry_memory::{InMemoryStore, NamespaceRegistry};
/// use quarry_core::backend::{StoreBackend, StoreBackendBuilder};
///
/// let registry = NamespaceRegistry::new();
/// let orders = InMemoryStore::builder()
///     .registry(registry.clone())
///     .namespace("orders")
///     .build()
///     .await?;
///
/// orders.write("a", doc! { "total": 12 }).await?;
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    documents: Namespace,
    namespace: Option<String>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a private, empty store.
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(Default::default())),
            namespace: None,
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns the namespace this store is attached to, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Returns `true` if no documents are stored.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Removes every document.
    pub async fn clear(&self) {
        self.documents.write().await.clear();
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn read(&self, id: &str) -> DocumentStoreResult<Document> {
        trace!("memory read {id}");

        self.documents
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string()))
    }

    async fn write(&self, id: &str, document: Document) -> DocumentStoreResult<()> {
        trace!("memory write {id}");

        self.documents
            .write()
            .await
            .insert(id.to_string(), document);

        Ok(())
    }

    async fn erase(&self, id: &str) -> DocumentStoreResult<()> {
        trace!("memory erase {id}");

        match self.documents.write().await.remove(id) {
            Some(_) => Ok(()),
            None => Err(DocumentStoreError::DocumentNotFound(id.to_string())),
        }
    }

    async fn exist(&self, id: &str) -> DocumentStoreResult<bool> {
        Ok(self.documents.read().await.contains_key(id))
    }

    async fn index(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(self.documents.read().await.keys().cloned().collect())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// Without a registry the built store is private. With one, the store attaches to
/// the registry's `namespace` (default `"default"`).
#[derive(Default, Debug)]
pub struct InMemoryStoreBuilder {
    namespace: Option<String>,
    registry: Option<NamespaceRegistry>,
}

impl InMemoryStoreBuilder {
    /// Sets the namespace to attach to. Requires a [`registry`](Self::registry).
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the registry holding shared namespaces.
    pub fn registry(mut self, registry: NamespaceRegistry) -> Self {
        self.registry = Some(registry);
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds the store, attaching it to its namespace if a registry was given.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Initialization`] if a namespace is named without
    /// a registry, or if the namespace name is empty.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        match (self.registry, self.namespace) {
            (None, None) => Ok(InMemoryStore::new()),
            (None, Some(namespace)) => Err(DocumentStoreError::Initialization(format!(
                "namespace {namespace:?} requires a registry"
            ))),
            (Some(_), Some(namespace)) if namespace.is_empty() => Err(
                DocumentStoreError::Initialization("namespace name must not be empty".into()),
            ),
            (Some(registry), namespace) => {
                let namespace = namespace.unwrap_or_else(|| "default".to_string());

                Ok(InMemoryStore {
                    documents: registry.namespace(&namespace).await,
                    namespace: Some(namespace),
                })
            }
        }
    }
}
