//! Error types and result types for document store operations.
//!
//! Every fallible operation in this crate returns a [`DocumentStoreResult<T>`]. The request
//! layer never lets an error escape as a panic: it folds each [`DocumentStoreError`] into a
//! fault result, using [`DocumentStoreError::kind`] as the discriminator callers see.

use bson::error::Error as BsonError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization, configuration or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} does not exist in collection {1}")]
    DocumentNotFound(String, String),
    /// The requested collection does not exist in the given database.
    /// The first argument is the collection name, the second is the database name.
    #[error("Collection {0} does not exist in database {1}")]
    CollectionNotFound(String, String),
    /// The requested database does not exist.
    #[error("Database does not exist: {0}")]
    DatabaseNotFound(String),
    /// Malformed request input: filter, projection, pagination or payload.
    #[error("Invalid input: {0}")]
    Validation(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// Appending an audit log entry failed.
    #[error("Audit log error: {0}")]
    Audit(String),
}

/// Coarse classification of a [`DocumentStoreError`], exposed to callers as the fault kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A document, collection or database is absent.
    NotFound,
    /// The request was malformed and has been rejected.
    Validation,
    /// The persistence layer failed.
    Storage,
    /// Best-effort audit logging failed.
    Audit,
    /// Anything else: serialization or setup problems.
    Internal,
}

impl DocumentStoreError {
    /// Returns the fault kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocumentStoreError::DocumentNotFound(..)
            | DocumentStoreError::CollectionNotFound(..)
            | DocumentStoreError::DatabaseNotFound(_) => ErrorKind::NotFound,
            DocumentStoreError::Validation(_) => ErrorKind::Validation,
            DocumentStoreError::Backend(_) => ErrorKind::Storage,
            DocumentStoreError::Audit(_) => ErrorKind::Audit,
            DocumentStoreError::Serialization(_) | DocumentStoreError::Initialization(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Shorthand for building a [`DocumentStoreError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        DocumentStoreError::Validation(message.into())
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for DocumentStoreError {
    fn from(err: toml::de::Error) -> Self {
        DocumentStoreError::Initialization(err.to_string())
    }
}
