//! Storage backend abstraction for the document engine.
//!
//! The engine never executes queries itself. It hands a [`Query`] (filter tree, ordering,
//! offset/limit and projection) to a [`StoreBackend`] and relies on the backend for
//! per-document atomicity. Backends address data by [`Namespace`]: a physical database and
//! collection name pair.
//!
//! # Examples
//!
//! ```ignore
//! use docgate::backend::{Namespace, StoreBackend};
//! use docgate::document::DocumentId;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//! let id = DocumentId::generate();
//! let namespace = Namespace::new("blog", "posts");
//! backend.insert_documents(vec![(id, doc! { "title": "Hello" })], &namespace).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt::{self, Debug};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    document::{Document, DocumentId},
    error::DocumentStoreResult,
    projection::Projection,
    query::{Expr, Query},
};

/// Physical location of a collection inside a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    /// Physical database name.
    pub database: String,
    /// Physical collection name.
    pub collection: String,
}

impl Namespace {
    /// Creates a new namespace.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// Implementations must support concurrent access from multiple async tasks. Reads must not
/// block other reads.
///
/// # Error Handling
///
/// Storage problems are reported as [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend).
/// Absence is not an error for reads: missing ids are omitted and unknown namespaces read as empty.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts new documents into a namespace, in order.
    ///
    /// Each document is stored under its id, which the backend also keeps in the document's
    /// `_id` field. The namespace is created on first insert.
    ///
    /// # Errors
    ///
    /// Fails if a document with the same id already exists.
    async fn insert_documents(
        &self,
        documents: Vec<(DocumentId, Document)>,
        namespace: &Namespace,
    ) -> DocumentStoreResult<()>;

    /// Retrieves documents by id, restricted to `projection`.
    ///
    /// Missing ids are omitted from the result.
    async fn get_documents(
        &self,
        ids: Vec<DocumentId>,
        namespace: &Namespace,
        projection: &Projection,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Runs a structured query: filter, stable ordering, offset/limit and projection.
    ///
    /// Documents that compare equal under the ordering keep their insertion order, so the
    /// same query returns consistent pages.
    async fn query_documents(
        &self,
        query: Query,
        namespace: &Namespace,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Counts documents matching `filter` (`None` counts everything).
    async fn count_documents(
        &self,
        filter: Option<&Expr>,
        namespace: &Namespace,
    ) -> DocumentStoreResult<usize>;

    /// Releases the backend's resources.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
