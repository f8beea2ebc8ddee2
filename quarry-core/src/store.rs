//! Main document store interface.
//!
//! [`DocumentStore`] layers the query and mutation verbs over a single
//! [`StoreBackend`]. Reads go through a [`Cursor`]; mutation verbs drain a cursor into
//! [`Record`]s, apply a compiled [`Mutator`] and write each result back under its
//! identifier.
//!
//! Mutations are not atomic. When a write fails part way through `update` or
//! `remove`, the error is returned and documents handled before the failure stay
//! modified.
//!
//! # Example
//!
//! ```ignore
//! use quarry::prelude::*;
//!
//! let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!
//! let id = store.insert(doc! { "name": "widget", "stock": 3 }).await?;
//! store
//!     .update(doc! { "name": "widget" }, doc! { "$inc": { "stock": 1 } }, UpdateOptions::default())
//!     .await?;
//!
//! assert_eq!(store.get(&id).await?.get_i32("stock")?, 4);
//! ```

use bson::Bson;
use log::debug;
use uuid::Uuid;

use crate::{
    backend::{self, StoreBackend},
    cursor::Cursor,
    document::{Document, ID_FIELD, Record, set_path},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Condition, Order, Projection},
    update::Mutator,
};

/// Options for [`DocumentStore::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert a new document when nothing matches.
    pub upsert: bool,
    /// Update at most one document.
    pub single: bool,
}

impl UpdateOptions {
    pub fn upsert(mut self) -> Self {
        self.upsert = true;
        self
    }

    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }
}

/// Options for [`DocumentStore::remove`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Remove at most one document.
    pub single: bool,
}

/// Options for [`DocumentStore::find_and_modify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindAndModifyOptions {
    /// Insert a new document when nothing matches.
    pub upsert: bool,
    /// Erase the located document instead of updating it.
    pub remove: bool,
    /// Return the document as it was before the modification.
    pub return_original: bool,
}

/// Outcome of [`DocumentStore::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Number of existing documents written back.
    pub affected: usize,
    /// Identifier of the document created by an upsert.
    pub upserted: Option<String>,
}

/// A document store bound to a backend implementation.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

/// A document store whose backend is chosen at runtime.
pub type DynDocumentStore = DocumentStore<Box<dyn backend::DynStoreBackend>>;

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Consumes the store, returning its backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Starts a query over every document matching `condition`, transformed by
    /// `projection`.
    ///
    /// The returned cursor is lazy. Compile errors are latched on the cursor and
    /// reported by its first terminal operation.
    pub fn find(
        &self,
        condition: impl Into<Condition>,
        projection: impl Into<Projection>,
    ) -> Cursor<'_, B> {
        Cursor::new(&self.backend)
            .filter(condition)
            .project(projection)
    }

    /// Returns the first document matching `condition`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NoMatchingDocument`] if nothing matches.
    pub async fn find_one(&self, condition: impl Into<Condition>) -> DocumentStoreResult<Document> {
        self.find(condition, Projection::All)
            .limit(1)
            .next_object()
            .await?
            .ok_or(DocumentStoreError::NoMatchingDocument)
    }

    /// Counts the documents matching `condition`.
    pub async fn count(&self, condition: impl Into<Condition>) -> DocumentStoreResult<usize> {
        self.find(condition, Projection::All)
            .count()
            .await
    }

    /// Applies `update` to every document matching `condition` and writes the results
    /// back.
    ///
    /// With `upsert` set and no match, a new document is seeded from the equality
    /// fields of the condition, mutated, and stored under a fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns a compile error before touching the backend if `condition` or `update`
    /// is invalid, otherwise the first read or write error.
    pub async fn update(
        &self,
        condition: impl Into<Condition>,
        update: impl Into<Bson>,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateReport> {
        let mutator = Mutator::compile(update)?;
        let condition = condition.into();
        let seed = seed_document(&condition);

        let mut cursor = Cursor::new(&self.backend).filter(condition);
        if options.single {
            cursor = cursor.limit(1);
        }

        let records = cursor.to_records().await?;
        let mut report = UpdateReport::default();

        for Record { id, mut document } in records {
            mutator.apply_to(&mut document);
            self.backend.write(&id, document).await?;
            report.affected += 1;
        }

        if report.affected == 0 && options.upsert {
            let mut document = seed;
            mutator.apply_to(&mut document);

            let id = Uuid::new_v4().to_string();
            self.backend.write(&id, document).await?;
            report.upserted = Some(id);
        }

        debug!(
            "update affected {} documents, upserted {:?}",
            report.affected, report.upserted
        );

        Ok(report)
    }

    /// Locates the first document matching `condition` under `order` and modifies it.
    ///
    /// Returns the modified document, the original one when `return_original` is set,
    /// or the erased one when `remove` is set. Returns `None` if nothing matched and
    /// no document was upserted.
    pub async fn find_and_modify(
        &self,
        condition: impl Into<Condition>,
        order: impl Into<Order>,
        update: impl Into<Bson>,
        options: FindAndModifyOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        let mutator = Mutator::compile(update)?;
        let condition = condition.into();
        let seed = seed_document(&condition);

        let found = Cursor::new(&self.backend)
            .filter(condition)
            .sort(order)
            .limit(1)
            .next_record()
            .await?;

        let Some(Record { id, document }) = found else {
            if !options.upsert || options.remove {
                return Ok(None);
            }

            let mut document = seed;
            mutator.apply_to(&mut document);

            let id = Uuid::new_v4().to_string();
            self.backend.write(&id, document.clone()).await?;
            debug!("find_and_modify upserted {id}");

            return Ok((!options.return_original).then_some(document));
        };

        if options.remove {
            self.backend.erase(&id).await?;
            debug!("find_and_modify removed {id}");
            return Ok(Some(document));
        }

        let mut modified = document.clone();
        mutator.apply_to(&mut modified);
        self.backend.write(&id, modified.clone()).await?;
        debug!("find_and_modify updated {id}");

        Ok(Some(if options.return_original { document } else { modified }))
    }

    /// Erases every document matching `condition`, returning how many were removed.
    pub async fn remove(
        &self,
        condition: impl Into<Condition>,
        options: RemoveOptions,
    ) -> DocumentStoreResult<usize> {
        let mut cursor = Cursor::new(&self.backend).filter(condition);
        if options.single {
            cursor = cursor.limit(1);
        }

        let records = cursor.to_records().await?;
        for record in &records {
            self.backend.erase(&record.id).await?;
        }

        debug!("remove erased {} documents", records.len());

        Ok(records.len())
    }

    /// Stores a new document and returns its identifier.
    ///
    /// A string `_id` field names the document and is removed from the stored body.
    /// Without one a UUID v4 identifier is generated.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidIdentifier`] if `_id` is not a non-empty
    /// string or a document is already stored under it.
    pub async fn insert(&self, mut document: Document) -> DocumentStoreResult<String> {
        let id = match document.remove(ID_FIELD) {
            Some(Bson::String(id)) if !id.is_empty() => {
                if self.backend.exist(&id).await? {
                    return Err(DocumentStoreError::InvalidIdentifier(format!(
                        "{id} is already in use"
                    )));
                }
                id
            }
            Some(other) => return Err(DocumentStoreError::InvalidIdentifier(other.to_string())),
            None => Uuid::new_v4().to_string(),
        };

        self.backend.write(&id, document).await?;
        debug!("inserted {id}");

        Ok(id)
    }

    /// Stores `document` under `id`, replacing any existing document.
    pub async fn save(&self, id: &str, document: Document) -> DocumentStoreResult<()> {
        self.backend.write(id, document).await
    }

    /// Reads the document stored under `id`.
    pub async fn get(&self, id: &str) -> DocumentStoreResult<Document> {
        self.backend.read(id).await
    }

    /// Erases the document stored under `id`.
    pub async fn delete(&self, id: &str) -> DocumentStoreResult<()> {
        self.backend.erase(id).await
    }

    /// Reports whether a document is stored under `id`.
    pub async fn exists(&self, id: &str) -> DocumentStoreResult<bool> {
        self.backend.exist(id).await
    }

    /// Lists every stored identifier.
    pub async fn ids(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.index().await
    }
}

impl<B: StoreBackend + 'static> DocumentStore<B> {
    /// Erases the backend type, yielding a [`DynDocumentStore`].
    pub fn into_dyn(self) -> DynDocumentStore {
        DocumentStore::new(Box::new(self.backend))
    }
}

impl DynDocumentStore {
    /// Downcasts the backend to its concrete type.
    pub fn backend_as<B: StoreBackend + 'static>(&self) -> Option<&B> {
        backend::DynStoreBackend::as_any(&*self.backend).downcast_ref::<B>()
    }
}

// Equality fields of a structural condition become the body of an upserted document.
fn seed_document(condition: &Condition) -> Document {
    let mut seed = Document::new();
    if let Some(fields) = condition.fields() {
        for (path, value) in fields {
            set_path(&mut seed, path, value.clone());
        }
    }
    seed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStore;
    use bson::doc;

    fn inventory() -> DocumentStore<MockStore> {
        DocumentStore::new(MockStore::with_documents([
            ("a", doc! { "item": "pen", "qty": 5, "tags": ["blue"] }),
            ("b", doc! { "item": "pen", "qty": 1 }),
            ("c", doc! { "item": "ink", "qty": 9 }),
        ]))
    }

    #[tokio::test]
    async fn update_writes_back_every_match() {
        let store = inventory();

        let report = store
            .update(doc! { "item": "pen" }, doc! { "$inc": { "qty": 10 } }, UpdateOptions::default())
            .await
            .unwrap();

        assert_eq!(report, UpdateReport { affected: 2, upserted: None });
        assert_eq!(store.backend().get("a").unwrap().get_i32("qty").unwrap(), 15);
        assert_eq!(store.backend().get("b").unwrap().get_i32("qty").unwrap(), 11);
        assert_eq!(store.backend().get("c").unwrap().get_i32("qty").unwrap(), 9);
    }

    #[tokio::test]
    async fn single_update_touches_one_document() {
        let store = inventory();

        let report = store
            .update(
                doc! { "item": "pen" },
                doc! { "$set": { "sold": true } },
                UpdateOptions::default().single(),
            )
            .await
            .unwrap();

        assert_eq!(report.affected, 1);
        assert_eq!(store.backend().writes(), 1);
    }

    #[tokio::test]
    async fn invalid_update_never_touches_the_backend() {
        let store = inventory();

        let result = store
            .update(doc! {}, doc! { "$bogus": { "a": 1 } }, UpdateOptions::default())
            .await;

        assert_eq!(
            result,
            Err(DocumentStoreError::InvalidUpdateOperator("$bogus".into()))
        );
        assert_eq!(store.backend().calls(), 0);
    }

    #[tokio::test]
    async fn upsert_seeds_from_the_condition() {
        let store = inventory();

        let report = store
            .update(
                doc! { "item": "nib", "spec.size": "fine" },
                doc! { "$set": { "qty": 2 } },
                UpdateOptions::default().upsert(),
            )
            .await
            .unwrap();

        let id = report.upserted.unwrap();
        assert_eq!(report.affected, 0);
        assert_eq!(
            store.backend().get(&id).unwrap(),
            doc! { "item": "nib", "spec": { "size": "fine" }, "qty": 2 }
        );
    }

    #[tokio::test]
    async fn find_and_modify_follows_the_order() {
        let store = inventory();

        let modified = store
            .find_and_modify(
                doc! { "item": "pen" },
                doc! { "qty": 1 },
                doc! { "$push": { "tags": "cheap" } },
                FindAndModifyOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(modified, Some(doc! { "item": "pen", "qty": 1, "tags": ["cheap"] }));
        assert_eq!(store.backend().get("b"), modified);
    }

    #[tokio::test]
    async fn find_and_modify_can_return_the_original_or_remove() {
        let store = inventory();

        let original = store
            .find_and_modify(
                doc! { "item": "ink" },
                Order::Natural,
                doc! { "$set": { "qty": 0 } },
                FindAndModifyOptions { return_original: true, ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(original, Some(doc! { "item": "ink", "qty": 9 }));

        let removed = store
            .find_and_modify(
                doc! { "item": "ink" },
                Order::Natural,
                Bson::Null,
                FindAndModifyOptions { remove: true, ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(removed, Some(doc! { "item": "ink", "qty": 0 }));
        assert!(store.backend().get("c").is_none());
    }

    #[tokio::test]
    async fn find_and_modify_without_match_returns_none() {
        let store = inventory();

        let result = store
            .find_and_modify(
                doc! { "item": "eraser" },
                Order::Natural,
                doc! { "$set": { "qty": 1 } },
                FindAndModifyOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(store.backend().writes(), 0);
    }

    #[tokio::test]
    async fn remove_counts_erased_documents() {
        let store = inventory();

        assert_eq!(
            store
                .remove(doc! { "item": "pen" }, RemoveOptions::default())
                .await
                .unwrap(),
            2
        );
        assert_eq!(store.backend().len(), 1);
        assert_eq!(
            store
                .remove(doc! {}, RemoveOptions { single: true })
                .await
                .unwrap(),
            1
        );
        assert_eq!(store.backend().len(), 0);
    }

    #[tokio::test]
    async fn find_one_reports_missing_matches() {
        let store = inventory();

        assert_eq!(
            store.find_one(doc! { "qty": 9 }).await.unwrap(),
            doc! { "item": "ink", "qty": 9 }
        );
        assert_eq!(
            store.find_one(doc! { "qty": 100 }).await,
            Err(DocumentStoreError::NoMatchingDocument)
        );
    }

    #[tokio::test]
    async fn insert_takes_string_identifiers_from_the_document() {
        let store = DocumentStore::new(MockStore::default());

        let id = store
            .insert(doc! { "_id": "pen", "qty": 1 })
            .await
            .unwrap();
        assert_eq!(id, "pen");
        assert_eq!(store.get("pen").await.unwrap(), doc! { "qty": 1 });

        assert!(matches!(
            store.insert(doc! { "_id": "pen" }).await,
            Err(DocumentStoreError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            store.insert(doc! { "_id": 7 }).await,
            Err(DocumentStoreError::InvalidIdentifier(_))
        ));

        let generated = store.insert(doc! { "qty": 2 }).await.unwrap();
        assert!(Uuid::parse_str(&generated).is_ok());
        assert_eq!(store.ids().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn dyn_store_downcasts_to_its_backend() {
        let store = inventory().into_dyn();

        assert_eq!(store.count(doc! { "item": "pen" }).await.unwrap(), 2);
        assert_eq!(store.backend_as::<MockStore>().map(MockStore::len), Some(3));
    }
}
