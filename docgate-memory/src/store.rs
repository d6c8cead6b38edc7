//! In-memory storage implementation for document stores.
//!
//! Documents live in per-namespace collections behind an async-safe read-write lock. Each
//! collection keeps its documents in insertion order, which is what sorted queries fall back
//! on when two documents compare equal.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::Document;
use mea::rwlock::RwLock;
use tracing::debug;

use docgate_core::{
    backend::{Namespace, StoreBackend, StoreBackendBuilder},
    document::{DocumentId, ID_FIELD, lookup_path},
    error::{DocumentStoreError, DocumentStoreResult},
    projection::Projection,
    query::{Expr, Query, SortDirection},
};

use crate::evaluator::{Comparable, DocumentEvaluator};

/// Documents of one collection, in insertion order, with an id index.
#[derive(Debug, Default)]
struct CollectionData {
    documents: Vec<Document>,
    index: HashMap<String, usize>,
}

impl CollectionData {
    fn matching<'a>(&'a self, filter: Option<&'a Expr>) -> impl Iterator<Item = &'a Document> + 'a {
        self.documents
            .iter()
            .filter(move |document| DocumentEvaluator::matches(document, filter))
    }
}

/// Missing fields sort as null, ahead of every other value.
fn sort_key<'a>(document: &'a Document, field: &str) -> Comparable<'a> {
    lookup_path(document, field)
        .map(Comparable::from)
        .unwrap_or(Comparable::Null)
}

/// database name -> (collection name -> documents)
type StoreMap = HashMap<String, HashMap<String, CollectionData>>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so clones share the
/// same data. This is how the engine writes audit entries and catalog records through the same
/// store it serves documents from.
///
/// # Performance
///
/// Queries scan every document in a collection (no indexing beyond the id lookup).
///
/// # Example
///
/// ```ignore
/// use docgate_memory::InMemoryStore;
/// use docgate_core::backend::{Namespace, StoreBackend};
/// use docgate_core::document::DocumentId;
/// use docgate_core::projection::Projection;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let namespace = Namespace::new("blog", "posts");
/// let id = DocumentId::generate();
///
/// store.insert_documents(vec![(id.clone(), doc! { "title": "Hello" })], &namespace).await?;
/// let docs = store.get_documents(vec![id], &namespace, &Projection::All).await?;
/// assert_eq!(docs.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(
        &self,
        documents: Vec<(DocumentId, Document)>,
        namespace: &Namespace,
    ) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let collection = store
            .entry(namespace.database.clone())
            .or_default()
            .entry(namespace.collection.clone())
            .or_default();

        // Check the whole batch first so a duplicate leaves the collection untouched.
        for (position, (id, _)) in documents.iter().enumerate() {
            let duplicated_in_batch = documents[..position].iter().any(|(other, _)| other == id);
            if duplicated_in_batch || collection.index.contains_key(id.as_str()) {
                return Err(DocumentStoreError::Backend(format!(
                    "Document {id} already exists in {namespace}"
                )));
            }
        }

        let count = documents.len();
        for (id, mut document) in documents {
            document.insert(ID_FIELD, id.as_str());
            collection.index.insert(id.to_string(), collection.documents.len());
            collection.documents.push(document);
        }

        debug!(%namespace, count, "inserted documents");
        Ok(())
    }

    async fn get_documents(
        &self,
        ids: Vec<DocumentId>,
        namespace: &Namespace,
        projection: &Projection,
    ) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(collection) = store
            .get(&namespace.database)
            .and_then(|collections| collections.get(&namespace.collection))
        else {
            return Ok(vec![]);
        };

        Ok(ids
            .iter()
            .filter_map(|id| collection.index.get(id.as_str()))
            .map(|&position| projection.apply(collection.documents[position].clone()))
            .collect())
    }

    async fn query_documents(&self, query: Query, namespace: &Namespace) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(collection) = store
            .get(&namespace.database)
            .and_then(|collections| collections.get(&namespace.collection))
        else {
            return Ok(vec![]);
        };

        let mut matched = collection.matching(query.filter.as_ref()).collect::<Vec<_>>();

        if let Some(sort) = &query.sort {
            // `sort_by` is stable: equal keys keep insertion order.
            matched.sort_by(|a, b| {
                let ordering = sort_key(a, &sort.field).sort_cmp(&sort_key(b, &sort.field));
                match sort.dir {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        Ok(matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|document| query.projection.apply(document.clone()))
            .collect())
    }

    async fn count_documents(&self, filter: Option<&Expr>, namespace: &Namespace) -> DocumentStoreResult<usize> {
        let store = self.store.read().await;

        Ok(store
            .get(&namespace.database)
            .and_then(|collections| collections.get(&namespace.collection))
            .map(|collection| collection.matching(filter).count())
            .unwrap_or(0))
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new, empty [`InMemoryStore`].
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docgate_core::query::{Filter, OrderBy};

    fn posts() -> Namespace {
        Namespace::new("blog", "posts")
    }

    async fn seeded() -> (InMemoryStore, Vec<DocumentId>) {
        let store = InMemoryStore::new();
        let ids = (0..4).map(|_| DocumentId::generate()).collect::<Vec<_>>();
        let documents = vec![
            doc! { "title": "a", "rank": 2, "tags": ["x"] },
            doc! { "title": "b", "rank": 1, "tags": ["x", "y"] },
            doc! { "title": "c", "rank": 2 },
            doc! { "title": "d", "rank": 3, "tags": ["y"] },
        ];

        store
            .insert_documents(ids.iter().cloned().zip(documents).collect(), &posts())
            .await
            .unwrap();

        (store, ids)
    }

    fn titles(documents: &[Document]) -> Vec<&str> {
        documents
            .iter()
            .map(|document| document.get_str("title").unwrap())
            .collect()
    }

    #[tokio::test]
    async fn insert_sets_id_field() {
        let (store, ids) = seeded().await;

        let documents = store
            .get_documents(vec![ids[1].clone()], &posts(), &Projection::All)
            .await
            .unwrap();

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].get_str("_id").unwrap(), ids[1].as_str());
        assert_eq!(documents[0].get_str("title").unwrap(), "b");
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected_without_partial_writes() {
        let (store, ids) = seeded().await;

        let result = store
            .insert_documents(
                vec![
                    (DocumentId::generate(), doc! { "title": "new" }),
                    (ids[0].clone(), doc! { "title": "clash" }),
                ],
                &posts(),
            )
            .await;

        assert!(matches!(result, Err(DocumentStoreError::Backend(_))));
        assert_eq!(store.count_documents(None, &posts()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn missing_ids_are_omitted() {
        let (store, ids) = seeded().await;

        let documents = store
            .get_documents(vec![DocumentId::from("nope"), ids[3].clone()], &posts(), &Projection::All)
            .await
            .unwrap();

        assert_eq!(titles(&documents), vec!["d"]);
    }

    #[tokio::test]
    async fn unknown_namespace_reads_as_empty() {
        let store = InMemoryStore::new();
        let elsewhere = Namespace::new("nowhere", "nothing");

        assert!(store.query_documents(Query::new(), &elsewhere).await.unwrap().is_empty());
        assert_eq!(store.count_documents(None, &elsewhere).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sort_is_stable_on_ties() {
        let (store, _) = seeded().await;

        let asc = store
            .query_documents(Query::builder().sort("rank", SortDirection::Asc).build(), &posts())
            .await
            .unwrap();
        assert_eq!(titles(&asc), vec!["b", "a", "c", "d"]);

        let desc = store
            .query_documents(Query::builder().sort("rank", SortDirection::Desc).build(), &posts())
            .await
            .unwrap();
        assert_eq!(titles(&desc), vec!["d", "a", "c", "b"]);
    }

    #[tokio::test]
    async fn filter_offset_limit_and_projection() {
        let (store, _) = seeded().await;

        let query = Query::builder()
            .filter(Filter::all_of("tags", vec!["x"]))
            .order_by(Some(OrderBy::new("title", SortDirection::Desc)))
            .offset(1)
            .limit(5)
            .projection(Projection::from_fields(["title"]).unwrap())
            .build();

        let documents = store.query_documents(query, &posts()).await.unwrap();
        assert_eq!(titles(&documents), vec!["a"]);
        assert!(documents[0].contains_key("_id"));
        assert!(!documents[0].contains_key("rank"));

        let tagged_y = Filter::all_of("tags", vec!["y"]);
        assert_eq!(store.count_documents(Some(&tagged_y), &posts()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn built_stores_start_empty() {
        let store = InMemoryStore::builder().build().await.unwrap();

        assert_eq!(store.count_documents(None, &posts()).await.unwrap(), 0);
        assert!(store.get_documents(vec![DocumentId::generate()], &posts(), &Projection::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clones_share_data() {
        let (store, _) = seeded().await;
        let clone = store.clone();

        clone
            .insert_documents(vec![(DocumentId::generate(), doc! { "title": "e" })], &posts())
            .await
            .unwrap();

        assert_eq!(store.count_documents(None, &posts()).await.unwrap(), 5);
    }
}
