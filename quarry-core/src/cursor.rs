//! Lazy, composable query cursors.
//!
//! A [`Cursor`] is a chain of [`Stage`]s rooted at a source that enumerates a
//! backend. Each chain method (`filter`, `project`, `sort`, `offset`, `limit`) wraps
//! the current head of the chain, so the order of calls decides the order of
//! evaluation: `sort(..).limit(3)` sorts everything and keeps three documents while
//! `limit(3).sort(..)` sorts the first three.
//!
//! Stages pull one record at a time from the stage they wrap, strictly in sequence.
//! Only the sort stage materializes its input. Terminal operations (`to_array`,
//! `count`, `each`) memoize their result until [`Cursor::rewind`] is called.
//!
//! A specification that fails to compile latches its error on the cursor. Every
//! later terminal operation returns that error without touching the backend.
//!
//! # Example
//!
//! ```ignore
//! let mut cursor = store
//!     .find(doc! { "status": "active" }, Projection::All)
//!     .sort(doc! { "price": 1 })
//!     .offset(10)
//!     .limit(5);
//!
//! let page = cursor.to_array().await?;
//! ```

use async_trait::async_trait;
use futures::{Stream, stream};
use log::{debug, trace};
use std::{collections::VecDeque, fmt, ops::ControlFlow};

use crate::{
    backend::StoreBackend,
    document::{Document, DocumentExt, Record},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Comparator, Condition, Order, Predicate, Projection, Projector},
};

/// One link of a cursor's evaluation chain.
#[async_trait]
pub(crate) trait Stage: Send {
    /// Pulls the next record, or `None` once the stage is exhausted.
    async fn next_record(&mut self) -> DocumentStoreResult<Option<Record>>;

    /// Resets the stage and everything upstream of it.
    fn rewind(&mut self);
}

type BoxedStage<'a> = Box<dyn Stage + 'a>;

struct SourceStage<'a, B> {
    backend: &'a B,
    pending: Option<VecDeque<String>>,
}

#[async_trait]
impl<'a, B: StoreBackend> Stage for SourceStage<'a, B> {
    async fn next_record(&mut self) -> DocumentStoreResult<Option<Record>> {
        if self.pending.is_none() {
            let ids = self.backend.index().await?;
            trace!("source listed {} identifiers", ids.len());
            self.pending = Some(ids.into());
        }

        let Some(id) = self.pending.as_mut().and_then(VecDeque::pop_front) else {
            return Ok(None);
        };

        trace!("source reading {id}");
        let document = self.backend.read(&id).await?;

        Ok(Some(Record { id, document }))
    }

    fn rewind(&mut self) {
        self.pending = None;
    }
}

struct ConditionStage<'a> {
    upstream: BoxedStage<'a>,
    predicate: Predicate,
}

#[async_trait]
impl<'a> Stage for ConditionStage<'a> {
    async fn next_record(&mut self) -> DocumentStoreResult<Option<Record>> {
        while let Some(record) = self.upstream.next_record().await? {
            if self.predicate.matches(&record.document) {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    fn rewind(&mut self) {
        self.upstream.rewind();
    }
}

struct ProjectionStage<'a> {
    upstream: BoxedStage<'a>,
    projector: Projector,
}

#[async_trait]
impl<'a> Stage for ProjectionStage<'a> {
    async fn next_record(&mut self) -> DocumentStoreResult<Option<Record>> {
        Ok(self
            .upstream
            .next_record()
            .await?
            .map(|record| self.projector.apply(record)))
    }

    fn rewind(&mut self) {
        self.upstream.rewind();
    }
}

struct SortStage<'a> {
    upstream: BoxedStage<'a>,
    comparator: Comparator,
    sorted: Option<VecDeque<Record>>,
}

#[async_trait]
impl<'a> Stage for SortStage<'a> {
    async fn next_record(&mut self) -> DocumentStoreResult<Option<Record>> {
        if self.sorted.is_none() {
            let mut buffer = Vec::new();
            while let Some(record) = self.upstream.next_record().await? {
                buffer.push(record);
            }

            buffer.sort_by(|a, b| self.comparator.compare(&a.document, &b.document));
            debug!("sort materialized {} records", buffer.len());
            self.sorted = Some(buffer.into());
        }

        Ok(self.sorted.as_mut().and_then(VecDeque::pop_front))
    }

    fn rewind(&mut self) {
        self.sorted = None;
        self.upstream.rewind();
    }
}

struct OffsetStage<'a> {
    upstream: BoxedStage<'a>,
    offset: usize,
    remaining: usize,
}

#[async_trait]
impl<'a> Stage for OffsetStage<'a> {
    async fn next_record(&mut self) -> DocumentStoreResult<Option<Record>> {
        while self.remaining > 0 {
            if self.upstream.next_record().await?.is_none() {
                self.remaining = 0;
                return Ok(None);
            }
            self.remaining -= 1;
        }

        self.upstream.next_record().await
    }

    fn rewind(&mut self) {
        self.remaining = self.offset;
        self.upstream.rewind();
    }
}

struct LimitStage<'a> {
    upstream: BoxedStage<'a>,
    limit: usize,
    rest: usize,
}

#[async_trait]
impl<'a> Stage for LimitStage<'a> {
    async fn next_record(&mut self) -> DocumentStoreResult<Option<Record>> {
        if self.rest == 0 {
            return Ok(None);
        }

        let record = self.upstream.next_record().await?;
        if record.is_some() {
            self.rest -= 1;
        }

        Ok(record)
    }

    fn rewind(&mut self) {
        self.rest = self.limit;
        self.upstream.rewind();
    }
}

/// A lazy query over a backend.
///
/// A cursor is owned by whoever drains it; memoized results are mutated in place, so
/// it cannot be drained from two places at once.
pub struct Cursor<'a, B: StoreBackend> {
    backend: &'a B,
    head: BoxedStage<'a>,
    error: Option<DocumentStoreError>,
    records: Option<Vec<Record>>,
    index: Option<Vec<String>>,
    // Set once a stage that can change the number of results is chained.
    bounded: bool,
    // Set while `next_record` has pulled part of the chain.
    pulled: bool,
}

impl<'a, B: StoreBackend> Cursor<'a, B> {
    /// Creates a cursor enumerating every document of `backend`.
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            head: Box::new(SourceStage { backend, pending: None }),
            error: None,
            records: None,
            index: None,
            bounded: false,
            pulled: false,
        }
    }

    /// Returns the error latched by a failed compilation, if any.
    pub fn error(&self) -> Option<&DocumentStoreError> {
        self.error.as_ref()
    }

    fn latch(&mut self, error: DocumentStoreError) {
        debug!("cursor latched error: {error}");
        self.error.get_or_insert(error);
    }

    fn wrap(mut self, bounded: bool, stage: impl FnOnce(BoxedStage<'a>) -> BoxedStage<'a>) -> Self {
        self.head.rewind();
        self.head = stage(self.head);
        self.bounded |= bounded;
        self.records = None;
        self.index = None;
        self.pulled = false;
        self
    }

    /// Keeps only documents matching `condition`.
    pub fn filter(mut self, condition: impl Into<Condition>) -> Self {
        let condition = condition.into();
        if self.error.is_some() || condition.is_all() {
            return self;
        }

        match condition.compile() {
            Ok(predicate) => self.wrap(true, |upstream| {
                Box::new(ConditionStage { upstream, predicate })
            }),
            Err(error) => {
                self.latch(error);
                self
            }
        }
    }

    /// Transforms every document with `projection`.
    pub fn project(mut self, projection: impl Into<Projection>) -> Self {
        let projection = projection.into();
        if self.error.is_some() || projection.is_all() {
            return self;
        }

        match projection.compile() {
            Ok(projector) => self.wrap(false, |upstream| {
                Box::new(ProjectionStage { upstream, projector })
            }),
            Err(error) => {
                self.latch(error);
                self
            }
        }
    }

    /// Orders documents with `order`. Sorting drains everything upstream first.
    pub fn sort(mut self, order: impl Into<Order>) -> Self {
        if self.error.is_some() {
            return self;
        }

        match order.into().compile() {
            Ok(comparator) => self.wrap(false, |upstream| {
                Box::new(SortStage { upstream, comparator, sorted: None })
            }),
            Err(error) => {
                self.latch(error);
                self
            }
        }
    }

    /// Skips the first `offset` documents.
    pub fn offset(self, offset: usize) -> Self {
        if self.error.is_some() {
            return self;
        }

        self.wrap(true, |upstream| {
            Box::new(OffsetStage { upstream, offset, remaining: offset })
        })
    }

    /// Alias of [`offset`](Cursor::offset).
    pub fn skip(self, count: usize) -> Self {
        self.offset(count)
    }

    /// Returns at most `limit` documents.
    pub fn limit(self, limit: usize) -> Self {
        if self.error.is_some() {
            return self;
        }

        self.wrap(true, |upstream| {
            Box::new(LimitStage { upstream, limit, rest: limit })
        })
    }

    fn check(&self) -> DocumentStoreResult<()> {
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Pulls the next record from the chain.
    ///
    /// Draining terminals called afterwards start over from the first record.
    pub async fn next_record(&mut self) -> DocumentStoreResult<Option<Record>> {
        self.check()?;
        self.pulled = true;
        self.head.next_record().await
    }

    fn restart(&mut self) {
        if self.pulled {
            self.head.rewind();
            self.pulled = false;
        }
    }

    /// Pulls the next document from the chain.
    pub async fn next_object(&mut self) -> DocumentStoreResult<Option<Document>> {
        Ok(self
            .next_record()
            .await?
            .map(|record| record.document))
    }

    /// Drains the chain into records, memoizing the result.
    ///
    /// # Errors
    ///
    /// Returns the latched compile error, or the first error raised while draining.
    /// Records collected before a failure are discarded and the chain is rewound.
    pub async fn to_records(&mut self) -> DocumentStoreResult<Vec<Record>> {
        self.check()?;

        if let Some(records) = &self.records {
            return Ok(records.clone());
        }

        self.restart();
        let mut records = Vec::new();
        loop {
            match self.head.next_record().await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => break,
                Err(error) => {
                    self.head.rewind();
                    return Err(error);
                }
            }
        }

        self.records = Some(records.clone());

        Ok(records)
    }

    /// Drains the chain into documents, memoizing the result.
    ///
    /// Each call returns a fresh copy of the memoized documents.
    pub async fn to_array(&mut self) -> DocumentStoreResult<Vec<Document>> {
        Ok(self
            .to_records()
            .await?
            .into_iter()
            .map(|record| record.document)
            .collect())
    }

    /// Drains the chain and deserializes every document into `T`.
    pub async fn deserialize<T: DocumentExt>(&mut self) -> DocumentStoreResult<Vec<T>> {
        self.to_array()
            .await?
            .into_iter()
            .map(T::from_document)
            .collect()
    }

    /// Calls `f` with each document until the chain is exhausted or `f` breaks.
    ///
    /// A full pass memoizes its results like [`to_array`](Cursor::to_array). A pass
    /// stopped by `f` memoizes nothing and rewinds the chain.
    pub async fn each<F>(&mut self, mut f: F) -> DocumentStoreResult<()>
    where
        F: FnMut(Document) -> ControlFlow<()>,
    {
        self.check()?;

        if let Some(records) = &self.records {
            for record in records.clone() {
                if f(record.document).is_break() {
                    break;
                }
            }
            return Ok(());
        }

        self.restart();
        let mut records = Vec::new();
        loop {
            match self.head.next_record().await {
                Ok(Some(record)) => {
                    let flow = f(record.document.clone());
                    records.push(record);
                    if flow.is_break() {
                        self.head.rewind();
                        return Ok(());
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    self.head.rewind();
                    return Err(error);
                }
            }
        }

        self.records = Some(records);

        Ok(())
    }

    /// Counts the documents the cursor yields.
    ///
    /// Without filtering or bounds the count comes straight from the backend's index.
    /// Like [`to_array`](Cursor::to_array), it counts the whole result set whatever
    /// `next_object` has already pulled.
    pub async fn count(&mut self) -> DocumentStoreResult<usize> {
        self.check()?;

        if let Some(records) = &self.records {
            return Ok(records.len());
        }

        if !self.bounded {
            return Ok(self.index().await?.len());
        }

        Ok(self.to_records().await?.len())
    }

    /// Lists every identifier in the backend, ignoring the chain's stages.
    pub async fn index(&mut self) -> DocumentStoreResult<Vec<String>> {
        self.check()?;

        if let Some(index) = &self.index {
            return Ok(index.clone());
        }

        let index = self.backend.index().await?;
        self.index = Some(index.clone());

        Ok(index)
    }

    /// Discards memoized results and resets every stage.
    pub fn rewind(&mut self) {
        self.records = None;
        self.index = None;
        self.pulled = false;
        self.head.rewind();
    }

    /// Converts the cursor into a stream of documents.
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = DocumentStoreResult<Document>> + 'a {
        stream::try_unfold(self, |mut cursor| async move {
            let next = cursor.next_object().await?;
            Ok::<_, DocumentStoreError>(next.map(|document| (document, cursor)))
        })
    }
}

impl<B: StoreBackend> fmt::Debug for Cursor<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("backend", self.backend)
            .field("error", &self.error)
            .field("memoized", &self.records.as_ref().map(Vec::len))
            .field("pulled", &self.pulled)
            .finish()
    }
}
