use std::collections::HashMap;

use async_trait::async_trait;
use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions},
};
use tracing::debug;

use docgate_core::{
    backend::{Namespace, StoreBackend, StoreBackendBuilder},
    document::{DocumentId, ID_FIELD},
    error::{DocumentStoreError, DocumentStoreResult},
    projection::Projection,
    query::{Expr, OrderBy, Query, SortDirection},
};

use crate::query::MongoQueryTranslator;

/// Sort order for a query. The id always takes part so repeated queries page consistently.
fn sort_document(order_by: Option<&OrderBy>) -> Document {
    let Some(order_by) = order_by else {
        return doc! { ID_FIELD: 1 };
    };

    let dir = match order_by.dir {
        SortDirection::Asc => 1,
        SortDirection::Desc => -1,
    };
    let mut sort = doc! { order_by.field.clone(): dir };
    if order_by.field != ID_FIELD {
        sort.insert(ID_FIELD, 1);
    }
    sort
}

fn backend_error(err: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::Backend(err.to_string())
}

#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
}

impl MongoDbStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn builder(dsn: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn)
    }

    fn get_collection(&self, namespace: &Namespace) -> MongoCollection<Document> {
        self.client
            .database(&namespace.database)
            .collection(&namespace.collection)
    }

    /// Places the id first, replacing whatever `_id` the document carried.
    fn prepare_document(id: &DocumentId, document: Document) -> Document {
        let mut prepared = doc! { ID_FIELD: id.as_str() };
        for (key, value) in document {
            if key != ID_FIELD {
                prepared.insert(key, value);
            }
        }
        prepared
    }

    async fn find(&self, filter: Document, options: FindOptions, namespace: &Namespace) -> DocumentStoreResult<Vec<Document>> {
        self.get_collection(namespace)
            .find(filter)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_documents(
        &self,
        documents: Vec<(DocumentId, Document)>,
        namespace: &Namespace,
    ) -> DocumentStoreResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let count = documents.len();
        self.get_collection(namespace)
            .insert_many(
                documents
                    .into_iter()
                    .map(|(id, document)| Self::prepare_document(&id, document))
                    .collect::<Vec<_>>(),
            )
            .await
            .map_err(backend_error)?;

        debug!(%namespace, count, "inserted documents");
        Ok(())
    }

    async fn get_documents(
        &self,
        ids: Vec<DocumentId>,
        namespace: &Namespace,
        projection: &Projection,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut options = FindOptions::default();
        options.projection = projection.to_document();

        let keys = ids.iter().map(DocumentId::as_str).collect::<Vec<_>>();
        let mut found = self
            .find(doc! { ID_FIELD: { "$in": keys } }, options, namespace)
            .await?
            .into_iter()
            .filter_map(|document| DocumentId::of(&document).map(|id| (id, document)))
            .collect::<HashMap<_, _>>();

        // Answer in the order the ids were asked for.
        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    async fn query_documents(&self, query: Query, namespace: &Namespace) -> DocumentStoreResult<Vec<Document>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        options.sort = Some(sort_document(query.sort.as_ref()));
        options.projection = query.projection.to_document();

        let filter = MongoQueryTranslator::translate(query.filter.as_ref())?;
        self.find(filter, options, namespace).await
    }

    async fn count_documents(&self, filter: Option<&Expr>, namespace: &Namespace) -> DocumentStoreResult<usize> {
        let count = self
            .get_collection(namespace)
            .count_documents(MongoQueryTranslator::translate(filter)?)
            .await
            .map_err(backend_error)?;

        Ok(count as usize)
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str) -> Self {
        Self { dsn: dsn.to_string() }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorting_by_id_keeps_the_requested_direction() {
        let sort = sort_document(Some(&OrderBy::new(ID_FIELD, SortDirection::Desc)));
        assert_eq!(sort, doc! { "_id": -1 });
    }

    #[test]
    fn field_sorts_break_ties_by_id() {
        let sort = sort_document(Some(&OrderBy::new("createdAt", SortDirection::Desc)));
        assert_eq!(sort, doc! { "createdAt": -1, "_id": 1 });
        assert_eq!(sort.keys().next().map(String::as_str), Some("createdAt"));
    }

    #[test]
    fn unordered_queries_sort_by_id() {
        assert_eq!(sort_document(None), doc! { "_id": 1 });
    }

    #[test]
    fn prepared_documents_lead_with_the_id() {
        let id = DocumentId::from("abc");
        let prepared = MongoDbStore::prepare_document(&id, doc! { "title": "Hello", "_id": "stale" });

        assert_eq!(prepared, doc! { "_id": "abc", "title": "Hello" });
        assert_eq!(prepared.keys().next().map(String::as_str), Some("_id"));
    }
}
