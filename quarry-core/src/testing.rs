//! Counting backend for unit tests.

use async_trait::async_trait;
use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::{
    backend::StoreBackend,
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
};

#[derive(Debug, Default)]
pub(crate) struct MockStore {
    documents: Mutex<BTreeMap<String, Document>>,
    reads: AtomicUsize,
    indexes: AtomicUsize,
    writes: AtomicUsize,
    failing: Option<String>,
}

impl MockStore {
    pub(crate) fn with_documents<'s>(documents: impl IntoIterator<Item = (&'s str, Document)>) -> Self {
        Self {
            documents: Mutex::new(
                documents
                    .into_iter()
                    .map(|(id, document)| (id.to_string(), document))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Makes every read of `id` fail with a storage error.
    pub(crate) fn failing_on(mut self, id: &str) -> Self {
        self.failing = Some(id.to_string());
        self
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn indexes(&self) -> usize {
        self.indexes.load(Ordering::SeqCst)
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> usize {
        self.reads() + self.indexes() + self.writes()
    }

    pub(crate) fn get(&self, id: &str) -> Option<Document> {
        self.documents.lock().unwrap().get(id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.documents.lock().unwrap().len()
    }
}

#[async_trait]
impl StoreBackend for MockStore {
    async fn read(&self, id: &str) -> DocumentStoreResult<Document> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        if self.failing.as_deref() == Some(id) {
            return Err(DocumentStoreError::Storage(format!("read of {id} failed")));
        }

        self.get(id)
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string()))
    }

    async fn write(&self, id: &str, document: Document) -> DocumentStoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .unwrap()
            .insert(id.to_string(), document);

        Ok(())
    }

    async fn erase(&self, id: &str) -> DocumentStoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string()))
    }

    async fn exist(&self, id: &str) -> DocumentStoreResult<bool> {
        Ok(self.documents.lock().unwrap().contains_key(id))
    }

    async fn index(&self) -> DocumentStoreResult<Vec<String>> {
        self.indexes.fetch_add(1, Ordering::SeqCst);

        Ok(self.documents.lock().unwrap().keys().cloned().collect())
    }
}
