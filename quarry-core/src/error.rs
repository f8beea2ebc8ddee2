//! Error types and result types for document store operations.
//!
//! Every fallible operation in the crate returns [`DocumentStoreResult<T>`]. Compile
//! errors (`Invalid*`) are produced eagerly when a condition, projection, sort order
//! or update specification is compiled; the remaining variants surface failures of
//! the storage backend.

use bson::{Bson, error::Error as BsonError};
use std::io::Error as IoError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
///
/// The type is `Clone` so that a cursor can latch the first error it sees and
/// replay it from every later terminal operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentStoreError {
    /// The condition is neither a document, null, nor a predicate function.
    #[error("Invalid condition: {0}")]
    InvalidCondition(Bson),
    /// The projection specification could not be compiled.
    #[error("Invalid projection: {0}")]
    InvalidProjection(Bson),
    /// The sort specification could not be compiled.
    #[error("Invalid order: {0}")]
    InvalidOrder(Bson),
    /// An update specification used an unsupported operator or a non-document argument.
    /// Carries the offending key.
    #[error("Invalid update operator: {0}")]
    InvalidUpdateOperator(String),
    /// No document is stored under the given identifier.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),
    /// A query that must yield one document matched none.
    #[error("No document matches the query")]
    NoMatchingDocument,
    /// An identifier or storage key cannot be represented by the backend.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
    /// An error occurred in the underlying storage backend.
    #[error("Storage error: {0}")]
    Storage(String),
    /// A document could not be encoded into the backend's storage format.
    #[error("Encode error: {0}")]
    Encode(String),
    /// Stored bytes could not be decoded into a document.
    #[error("Decode error: {0}")]
    Decode(String),
    /// Conversion between a typed value and a document failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend construction.
    #[error("Initialization error: {0}")]
    Initialization(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    /// Returns `true` for the errors raised while compiling a specification.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            DocumentStoreError::InvalidCondition(_)
                | DocumentStoreError::InvalidProjection(_)
                | DocumentStoreError::InvalidOrder(_)
                | DocumentStoreError::InvalidUpdateOperator(_)
        )
    }
}

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<IoError> for DocumentStoreError {
    fn from(err: IoError) -> Self {
        DocumentStoreError::Storage(err.to_string())
    }
}
