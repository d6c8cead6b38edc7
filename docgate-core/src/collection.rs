//! Reading and writing documents in a resolved collection.
//!
//! A [`DocumentCollection`] is the per-request handle returned by
//! [`DocumentStore::resolve`](crate::store::DocumentStore::resolve). It reads single documents
//! and pages of documents, and ingests new documents through the schema transform and the
//! audit trail.

use bson::Bson;
use tracing::{debug, warn};

use crate::{
    audit::{ACTION_CREATED, AuditEntry},
    backend::StoreBackend,
    catalog::CollectionDescriptor,
    document::{CreatePayload, Created, Document, DocumentId, ID_FIELD},
    error::{DocumentStoreError, DocumentStoreResult},
    page::{Page, PaginationParams},
    projection::Projection,
    query::{Expr, OrderBy, Query},
    schema::Schema,
    store::DocumentStore,
};

/// Filter and ordering of a list call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Composed filter; `None` matches everything.
    pub filter: Option<Expr>,
    /// Ordering; `None` keeps insertion order.
    pub order_by: Option<OrderBy>,
}

impl ListQuery {
    /// Creates a list query.
    pub fn new(filter: Option<Expr>, order_by: Option<OrderBy>) -> Self {
        Self { filter, order_by }
    }
}

/// A resolved collection bound to the store that serves it.
#[derive(Debug)]
pub struct DocumentCollection<'a, B: StoreBackend> {
    descriptor: CollectionDescriptor,
    store: &'a DocumentStore<B>,
}

impl<'a, B: StoreBackend> DocumentCollection<'a, B> {
    pub(crate) fn new(descriptor: CollectionDescriptor, store: &'a DocumentStore<B>) -> Self {
        Self { descriptor, store }
    }

    /// Returns the descriptor this handle was resolved to.
    pub fn descriptor(&self) -> &CollectionDescriptor {
        &self.descriptor
    }

    /// Fetches one document, restricted to `projection`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`] if no document has this id, or a
    /// backend error if storage fails.
    pub async fn get_by_id(&self, id: &DocumentId, projection: &Projection) -> DocumentStoreResult<Document> {
        self.store
            .backend
            .get_documents(vec![id.clone()], &self.descriptor.namespace(), projection)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), self.descriptor.name.clone()))
    }

    /// Lists one page of matching documents together with the total match count.
    ///
    /// `pagination` is checked (page and size at least 1) and its size clamped to the
    /// configured maximum. A page past the end yields no items but the real total.
    pub async fn list(
        &self,
        query: ListQuery,
        pagination: PaginationParams,
        projection: &Projection,
    ) -> DocumentStoreResult<Page<Document>> {
        let pagination = pagination.bounded(self.store.config.max_page_size)?;
        let namespace = self.descriptor.namespace();

        let total = self
            .store
            .backend
            .count_documents(query.filter.as_ref(), &namespace)
            .await?;

        if pagination.offset() >= total {
            debug!(%namespace, page = pagination.page, total, "page is past the end");
            return Ok(pagination.page_of(Vec::new(), total));
        }

        let items = self
            .store
            .backend
            .query_documents(
                Query::builder()
                    .maybe_filter(query.filter)
                    .order_by(query.order_by)
                    .offset(pagination.offset())
                    .limit(pagination.size)
                    .projection(projection.clone())
                    .build(),
                &namespace,
            )
            .await?;

        Ok(pagination.page_of(items, total))
    }

    /// Transforms, stores and audits new documents.
    ///
    /// A single document yields [`Created::One`], a batch yields [`Created::Many`] in input
    /// order, and any other payload shape yields [`Created::Nothing`] without touching storage.
    /// Each stored document gets a freshly generated `_id` as its first field; an `_id` sent by
    /// the caller is replaced.
    ///
    /// # Errors
    ///
    /// Schema lookup, transform and insert failures are returned. Audit failures are not: once
    /// the insert has succeeded they go to the store's fault observer.
    pub async fn create(&self, payload: CreatePayload) -> DocumentStoreResult<Created> {
        match payload {
            CreatePayload::One(document) => {
                let mut stored = self.insert(vec![document]).await?;
                stored
                    .pop()
                    .map(Created::One)
                    .ok_or_else(|| DocumentStoreError::Backend("insert returned no document".into()))
            }
            CreatePayload::Many(documents) => Ok(Created::Many(self.insert(documents).await?)),
            CreatePayload::Other => {
                debug!(collection = %self.descriptor.name, "create payload is neither an object nor a list of objects");
                Ok(Created::Nothing)
            }
        }
    }

    async fn insert(&self, documents: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let schema = self.load_schema().await?;
        let transform = self.store.transforms.select(schema.as_ref());

        let mut batch = Vec::with_capacity(documents.len());
        for mut document in documents {
            transform.transform(&mut document, schema.as_ref())?;

            let id = DocumentId::generate();
            batch.push((id.clone(), with_id(id, document)));
        }

        let stored: Vec<Document> = batch.iter().map(|(_, document)| document.clone()).collect();
        let namespace = self.descriptor.namespace();
        self.store.backend.insert_documents(batch, &namespace).await?;
        debug!(%namespace, count = stored.len(), "inserted documents");

        let entry = AuditEntry::new(
            ACTION_CREATED,
            stored.clone(),
            self.descriptor.database.name.clone(),
            self.descriptor.name.clone(),
        );
        if let Err(e) = self.store.audit.append(&entry).await {
            self.store.observer.audit_failed(&entry, &e);
        }

        Ok(stored)
    }

    async fn load_schema(&self) -> DocumentStoreResult<Option<Schema>> {
        let Some(schema_id) = self.descriptor.schema_id() else {
            return Ok(None);
        };

        let schema = self.store.schemas.schema(schema_id).await?;
        if schema.is_none() {
            warn!(
                collection = %self.descriptor.name,
                schema_id,
                "collection refers to a missing schema, storing documents untransformed"
            );
        }

        Ok(schema)
    }
}

fn with_id(id: DocumentId, document: Document) -> Document {
    let mut stored = Document::new();
    stored.insert(ID_FIELD, Bson::from(id));
    for (key, value) in document {
        if key != ID_FIELD {
            stored.insert(key, value);
        }
    }
    stored
}
