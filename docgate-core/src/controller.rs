//! Request handlers for get, list and create.
//!
//! [`DocumentController`] runs the whole pipeline for one request: resolve the collection,
//! build the projection and filter from loose parameters, call the read or write service and
//! fold the outcome into an [`ApiResult`]. It never returns an error or panics on bad input.

use serde_json::Value;
use tracing::{debug, info};

use crate::{
    backend::StoreBackend,
    catalog::RequestContext,
    collection::ListQuery,
    document::{CreatePayload, DocumentId, document_to_json, json_to_document},
    error::{DocumentStoreError, DocumentStoreResult},
    page::PaginationParams,
    projection::Projection,
    query::{compose_filter, parse_filter},
    request::{GetParams, ListBody, ListParams},
    response::ApiResult,
    store::DocumentStore,
};

/// Transport-agnostic request handlers over a [`DocumentStore`].
#[derive(Debug)]
pub struct DocumentController<B: StoreBackend> {
    store: DocumentStore<B>,
}

impl<B: StoreBackend> DocumentController<B> {
    /// Creates a controller serving `store`.
    pub fn new(store: DocumentStore<B>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &DocumentStore<B> {
        &self.store
    }

    /// Returns one document by id.
    pub async fn get(&self, context: &RequestContext, params: GetParams) -> ApiResult {
        self.try_get(context, params).await.into()
    }

    /// Returns a page of documents and the total match count.
    pub async fn list(&self, context: &RequestContext, params: ListParams, body: ListBody) -> ApiResult {
        self.try_list(context, params, body).await.into()
    }

    /// Creates one or more documents from a JSON body.
    pub async fn create(&self, context: &RequestContext, body: &Value) -> ApiResult {
        self.try_create(context, body).await.into()
    }

    async fn try_get(&self, context: &RequestContext, params: GetParams) -> DocumentStoreResult<Value> {
        let collection = self.store.resolve(context).await?;

        let id = params
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(DocumentId::from)
            .ok_or_else(|| DocumentStoreError::validation("a document id is required"))?;

        let projection = Projection::from_field_spec(params.fields.as_ref())?;
        if params.debug {
            info!(?projection, fields = ?params.fields, "get: requested fields");
        }

        document_to_json(&collection.get_by_id(&id, &projection).await?)
    }

    async fn try_list(&self, context: &RequestContext, params: ListParams, body: ListBody) -> DocumentStoreResult<Value> {
        let collection = self.store.resolve(context).await?;
        let projection = Projection::from_field_spec(params.fields.as_ref())?;

        let raw_filter = match &body.filter {
            Some(filter) => parse_filter(&json_to_document(&Value::Object(filter.clone()))?)?,
            None => None,
        };
        let filter = compose_filter(raw_filter.clone(), &params.tags, &self.store.config.tags_field);

        if params.debug {
            info!(?projection, ?raw_filter, ?filter, "list: derived query");
        } else {
            debug!(?filter, order_by = ?body.order_by, "list: derived query");
        }

        let pagination = PaginationParams::builder()
            .with_page(params.page)
            .with_size(params.size)
            .with_default_size(self.store.config.default_page_size)
            .build();

        let page = collection
            .list(ListQuery::new(filter, body.order_by), pagination, &projection)
            .await?
            .try_map(|document| document_to_json(&document))?;

        Ok(serde_json::to_value(page)?)
    }

    async fn try_create(&self, context: &RequestContext, body: &Value) -> DocumentStoreResult<Value> {
        let collection = self.store.resolve(context).await?;
        let payload = CreatePayload::from_json(body)?;

        collection.create(payload).await?.to_json()
    }
}
