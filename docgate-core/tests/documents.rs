use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use bson::{Document, doc};
use serde_json::{Value, json};

use docgate_core::{
    audit::{AuditEntry, AuditSink, FaultObserver},
    backend::{Namespace, StoreBackend},
    catalog::{CollectionDescriptor, DatabaseRef, RequestContext, StaticCatalog},
    controller::DocumentController,
    document::{CreatePayload, DocumentId},
    error::{DocumentStoreError, DocumentStoreResult, ErrorKind},
    page::PaginationParams,
    projection::Projection,
    query::{Expr, OrderBy, Query, SortDirection},
    collection::ListQuery,
    request::{GetParams, ListBody, ListParams, parse_params, parse_query},
    schema::{DocumentTransform, Schema, SchemaProvider, StaticSchemas, TransformRegistry},
    store::DocumentStore,
};
use docgate_memory::InMemoryStore;

fn catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_collection(CollectionDescriptor::new(DatabaseRef::new("blog"), "posts"))
        .with_collection(CollectionDescriptor::new(DatabaseRef::new("blog"), "pages").with_schema("page"))
        .with_collection(CollectionDescriptor::new(DatabaseRef::new("blog"), "drafts").with_schema("gone"))
}

fn controller(backend: &InMemoryStore) -> DocumentController<InMemoryStore> {
    DocumentController::new(DocumentStore::builder(backend.clone()).with_resolver(catalog()).build())
}

fn posts() -> RequestContext {
    RequestContext::new("blog", "posts")
}

async fn audit_entries(backend: &InMemoryStore) -> usize {
    backend
        .count_documents(None, &Namespace::new("system", "data_action_log"))
        .await
        .unwrap()
}

async fn seed_posts(controller: &DocumentController<InMemoryStore>, count: i64) {
    let body = Value::Array(
        (1..=count)
            .map(|n| json!({ "title": format!("post {n}"), "createdAt": n }))
            .collect(),
    );
    assert!(controller.create(&posts(), &body).await.is_data());
}

fn created_at(item: &Value) -> i64 {
    item["createdAt"].as_i64().unwrap()
}

#[tokio::test]
async fn lists_second_page_newest_first() {
    let backend = InMemoryStore::new();
    let controller = controller(&backend);
    seed_posts(&controller, 25).await;

    let params: ListParams = parse_query([("page", "2"), ("size", "10")]).unwrap();
    let body: ListBody = parse_params(json!({ "orderBy": { "field": "createdAt", "dir": "desc" } })).unwrap();

    let result = controller.list(&posts(), params, body).await;
    let page = result.result().unwrap();

    assert_eq!(page["total"], json!(25));
    assert_eq!(page["next_page"], json!(3));
    assert_eq!(page["previous_page"], json!(1));

    let items = page["items"].as_array().unwrap();
    assert_eq!(items.iter().map(created_at).collect::<Vec<_>>(), (6..=15).rev().collect::<Vec<_>>());
}

#[tokio::test]
async fn page_past_the_end_is_empty_but_counts() {
    let backend = InMemoryStore::new();
    let controller = controller(&backend);
    seed_posts(&controller, 5).await;

    let params = ListParams { page: Some(3), size: Some(10), ..Default::default() };
    let result = controller.list(&posts(), params, ListBody::default()).await;

    assert_eq!(result.result().unwrap(), &json!({ "items": [], "total": 5, "previous_page": 2 }));
}

#[tokio::test]
async fn zero_page_is_rejected() {
    let backend = InMemoryStore::new();
    let controller = controller(&backend);

    let params = ListParams { page: Some(0), ..Default::default() };
    let result = controller.list(&posts(), params, ListBody::default()).await;

    assert_eq!(result.fault_kind(), Some(ErrorKind::Validation));
}

#[tokio::test]
async fn oversized_pages_are_clamped() {
    let backend = InMemoryStore::new();
    let store = DocumentStore::builder(backend.clone()).with_resolver(catalog()).build();
    let collection = store.resolve(&posts()).await.unwrap();
    collection
        .create(CreatePayload::Many((0..5).map(|n| doc! { "n": n }).collect()))
        .await
        .unwrap();

    let page = collection
        .list(ListQuery::default(), PaginationParams::new(1, 1_000), &Projection::All)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 5);

    let small = DocumentStore::builder(backend)
        .with_resolver(catalog())
        .with_config(docgate_core::config::StoreConfig::builder().with_max_page_size(2).build())
        .build();
    let page = small
        .resolve(&posts())
        .await
        .unwrap()
        .list(ListQuery::default(), PaginationParams::new(1, 1_000), &Projection::All)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total, 5);
    assert_eq!(page.next_page, Some(2));
}

#[tokio::test]
async fn tag_filter_requires_every_tag_and_keeps_raw_filter() {
    let backend = InMemoryStore::new();
    let controller = controller(&backend);

    let body = json!([
        { "title": "a", "status": "active", "tags": ["rust", "db", "async"] },
        { "title": "b", "status": "active", "tags": ["rust"] },
        { "title": "c", "status": "draft", "tags": ["rust", "db"] },
        { "title": "d", "status": "active", "tags": ["db", "rust"] },
    ]);
    assert!(controller.create(&posts(), &body).await.is_data());

    let params: ListParams = parse_query([("tags", "rust"), ("tags", "db"), ("tags", "rust"), ("fields", "title")]).unwrap();
    let body: ListBody = parse_params(json!({
        "filter": { "status": "active" },
        "orderBy": { "field": "title" },
    }))
    .unwrap();

    let result = controller.list(&posts(), params, body).await;
    let page = result.result().unwrap();

    assert_eq!(page["total"], json!(2));
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.iter().map(|item| item["title"].clone()).collect::<Vec<_>>(), vec![json!("a"), json!("d")]);
    // Projection keeps only the id and requested fields.
    for item in items {
        let keys = item.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys, vec!["_id", "title"]);
    }
}

#[tokio::test]
async fn unsupported_filter_operators_are_rejected() {
    let backend = InMemoryStore::new();
    let controller = controller(&backend);

    let body: ListBody = parse_params(json!({ "filter": { "title": { "$where": "1" } } })).unwrap();
    let result = controller.list(&posts(), ListParams::default(), body).await;

    assert_eq!(result.fault_kind(), Some(ErrorKind::Validation));
}

#[tokio::test]
async fn get_returns_projected_document() {
    let backend = InMemoryStore::new();
    let controller = controller(&backend);

    let created = controller
        .create(&posts(), &json!({ "title": "Hello", "body": "...", "author": { "name": "Ada", "age": 36 } }))
        .await;
    let id = created.result().unwrap()["_id"].as_str().unwrap().to_string();

    let params: GetParams = parse_params(json!({ "id": id, "fields": ["title", "author.name"] })).unwrap();
    let result = controller.get(&posts(), params).await;

    assert_eq!(
        result.result().unwrap(),
        &json!({ "_id": id, "title": "Hello", "author": { "name": "Ada" } })
    );
}

#[tokio::test]
async fn get_unknown_id_is_not_found() {
    let backend = InMemoryStore::new();
    let controller = controller(&backend);
    seed_posts(&controller, 1).await;

    let params = GetParams { id: Some("missing".into()), ..Default::default() };
    let result = controller.get(&posts(), params).await;

    assert_eq!(result.fault_kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn get_without_id_is_a_validation_fault() {
    let backend = InMemoryStore::new();
    let controller = controller(&backend);

    let result = controller.get(&posts(), GetParams::default()).await;
    assert_eq!(result.fault_kind(), Some(ErrorKind::Validation));
}

#[tokio::test]
async fn unknown_collection_is_not_found() {
    let backend = InMemoryStore::new();
    let controller = controller(&backend);

    let result = controller.create(&RequestContext::new("blog", "nope"), &json!({ "a": 1 })).await;
    assert_eq!(result.fault_kind(), Some(ErrorKind::NotFound));

    let result = controller.create(&RequestContext::new("shop", "orders"), &json!({ "a": 1 })).await;
    assert_eq!(result.fault_kind(), Some(ErrorKind::NotFound));

    let result = controller.create(&RequestContext::default(), &json!({ "a": 1 })).await;
    assert_eq!(result.fault_kind(), Some(ErrorKind::Validation));
}

#[tokio::test]
async fn batch_create_assigns_ids_in_order_and_audits_once() {
    let backend = InMemoryStore::new();
    let controller = controller(&backend);

    let result = controller
        .create(&posts(), &json!([{ "title": "first", "_id": "mine" }, { "title": "second" }]))
        .await;
    let created = result.result().unwrap().as_array().unwrap();

    assert_eq!(created.len(), 2);
    assert_eq!(created[0]["title"], json!("first"));
    assert_eq!(created[1]["title"], json!("second"));

    let first_id = created[0]["_id"].as_str().unwrap();
    let second_id = created[1]["_id"].as_str().unwrap();
    assert_ne!(first_id, "mine");
    assert_ne!(first_id, second_id);
    assert_eq!(created[0].as_object().unwrap().keys().next().map(String::as_str), Some("_id"));

    assert_eq!(audit_entries(&backend).await, 1);
    let entry = backend
        .query_documents(Default::default(), &Namespace::new("system", "data_action_log"))
        .await
        .unwrap()
        .remove(0);
    assert_eq!(entry.get_str("action").unwrap(), "created");
    assert_eq!(entry.get_str("database").unwrap(), "blog");
    assert_eq!(entry.get_str("collection").unwrap(), "posts");
    assert_eq!(entry.get_array("documents").unwrap().len(), 2);
}

#[tokio::test]
async fn non_object_payloads_create_nothing() {
    let backend = InMemoryStore::new();
    let controller = controller(&backend);

    for body in [json!(42), json!("text"), json!(null), json!([{ "ok": true }, 3])] {
        let result = controller.create(&posts(), &body).await;
        assert_eq!(result.result(), Some(&Value::Null));
    }

    assert_eq!(backend.count_documents(None, &Namespace::new("blog", "posts")).await.unwrap(), 0);
    assert_eq!(audit_entries(&backend).await, 0);
}

#[tokio::test]
async fn empty_batch_creates_nothing_and_skips_audit() {
    let backend = InMemoryStore::new();
    let controller = controller(&backend);

    let result = controller.create(&posts(), &json!([])).await;

    assert_eq!(result.result(), Some(&json!([])));
    assert_eq!(audit_entries(&backend).await, 0);
}

struct FailingAudit;

#[async_trait]
impl AuditSink for FailingAudit {
    async fn append(&self, _entry: &AuditEntry) -> DocumentStoreResult<()> {
        Err(DocumentStoreError::Audit("audit log unavailable".into()))
    }
}

#[derive(Clone, Default)]
struct RecordingObserver {
    failures: Arc<Mutex<Vec<(usize, String)>>>,
}

impl FaultObserver for RecordingObserver {
    fn audit_failed(&self, entry: &AuditEntry, error: &DocumentStoreError) {
        self.failures
            .lock()
            .unwrap()
            .push((entry.documents.len(), error.to_string()));
    }
}

#[tokio::test]
async fn audit_failure_does_not_fail_the_write() {
    let backend = InMemoryStore::new();
    let observer = RecordingObserver::default();
    let store = DocumentStore::builder(backend.clone())
        .with_resolver(catalog())
        .with_audit(FailingAudit)
        .with_observer(observer.clone())
        .build();
    let controller = DocumentController::new(store);

    let result = controller.create(&posts(), &json!([{ "a": 1 }, { "a": 2 }])).await;

    assert!(result.is_data());
    assert_eq!(backend.count_documents(None, &Namespace::new("blog", "posts")).await.unwrap(), 2);

    let failures = observer.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, 2);
    assert!(failures[0].1.contains("audit log unavailable"));
}

fn page_schema() -> Schema {
    Schema {
        id: "page".into(),
        title: Some("Page".into()),
        properties: doc! {
            "title": { "type": "string", "default": "Untitled" },
            "order": { "type": "integer" },
        },
    }
}

#[tokio::test]
async fn schema_defaults_are_applied_before_storing() {
    let backend = InMemoryStore::new();
    let store = DocumentStore::builder(backend.clone())
        .with_resolver(catalog())
        .with_schemas(StaticSchemas::new().with_schema(page_schema()))
        .build();
    let controller = DocumentController::new(store);

    let result = controller
        .create(&RequestContext::new("blog", "pages"), &json!({ "order": "3" }))
        .await;

    let created = result.result().unwrap();
    assert_eq!(created["title"], json!("Untitled"));
    assert_eq!(created["order"], json!(3));
}

#[derive(Clone, Default)]
struct CountingTransform {
    calls: Arc<AtomicUsize>,
}

impl DocumentTransform for CountingTransform {
    fn transform(&self, document: &mut Document, _schema: Option<&Schema>) -> DocumentStoreResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        document.insert("seen", call as i64);
        Ok(())
    }
}

#[tokio::test]
async fn registered_transform_runs_once_per_document() {
    let backend = InMemoryStore::new();
    let transform = CountingTransform::default();
    let store = DocumentStore::builder(backend)
        .with_resolver(catalog())
        .with_schemas(StaticSchemas::new().with_schema(page_schema()))
        .with_transforms(TransformRegistry::new().with_transform("page", transform.clone()))
        .build();

    let created = store
        .resolve(&RequestContext::new("blog", "pages"))
        .await
        .unwrap()
        .create(CreatePayload::Many(vec![doc! { "n": 1 }, doc! { "n": 2 }, doc! { "n": 3 }]))
        .await
        .unwrap();

    assert_eq!(transform.calls.load(Ordering::SeqCst), 3);
    let seen = created
        .documents()
        .iter()
        .map(|document| document.get_i64("seen").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(seen, vec![0, 1, 2]);
    // The registered transform replaces the defaults transform.
    assert!(!created.documents()[0].contains_key("title"));
}

#[tokio::test]
async fn collections_without_schema_are_not_transformed() {
    let backend = InMemoryStore::new();
    let transform = CountingTransform::default();
    let store = DocumentStore::builder(backend)
        .with_resolver(catalog())
        .with_transforms(TransformRegistry::new().with_fallback(transform.clone()))
        .build();

    store
        .resolve(&posts())
        .await
        .unwrap()
        .create(doc! { "n": 1 }.into())
        .await
        .unwrap();

    assert_eq!(transform.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_schema_stores_documents_untransformed() {
    let backend = InMemoryStore::new();
    let transform = CountingTransform::default();
    let store = DocumentStore::builder(backend)
        .with_resolver(catalog())
        .with_transforms(TransformRegistry::new().with_fallback(transform.clone()))
        .build();

    let created = store
        .resolve(&RequestContext::new("blog", "drafts"))
        .await
        .unwrap()
        .create(doc! { "n": 1 }.into())
        .await
        .unwrap();

    assert_eq!(created.documents().len(), 1);
    assert_eq!(transform.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stable_order_for_equal_sort_keys() {
    let backend = InMemoryStore::new();
    let store = DocumentStore::builder(backend).with_resolver(catalog()).build();
    let collection = store.resolve(&posts()).await.unwrap();

    collection
        .create(CreatePayload::Many(
            (0..6).map(|n| doc! { "n": n, "group": n % 2 }).collect(),
        ))
        .await
        .unwrap();

    let order = Some(OrderBy::new("group", SortDirection::Asc));
    let mut seen = Vec::new();
    for page in 1..=3 {
        let listed = collection
            .list(ListQuery::new(None, order.clone()), PaginationParams::new(page, 2), &Projection::All)
            .await
            .unwrap();
        seen.extend(listed.items.iter().map(|document| document.get_i32("n").unwrap()));
    }

    assert_eq!(seen, vec![0, 2, 4, 1, 3, 5]);
}

#[tokio::test]
async fn numbers_beyond_bson_range_are_invalid_input() {
    let backend = InMemoryStore::new();
    let controller = controller(&backend);

    let result = controller.create(&posts(), &json!({ "n": u64::MAX })).await;
    assert_eq!(result.fault_kind(), Some(ErrorKind::Validation));
    assert_eq!(backend.count_documents(None, &Namespace::new("blog", "posts")).await.unwrap(), 0);

    let body: ListBody = parse_params(json!({ "filter": { "n": u64::MAX } })).unwrap();
    let result = controller.list(&posts(), ListParams::default(), body).await;
    assert_eq!(result.fault_kind(), Some(ErrorKind::Validation));
}

#[derive(Clone, Default)]
struct CountingSchemas {
    lookups: Arc<AtomicUsize>,
}

#[async_trait]
impl SchemaProvider for CountingSchemas {
    async fn schema(&self, id: &str) -> DocumentStoreResult<Option<Schema>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok((id == "page").then(page_schema))
    }
}

#[tokio::test]
async fn batch_create_looks_the_schema_up_once() {
    let backend = InMemoryStore::new();
    let schemas = CountingSchemas::default();
    let store = DocumentStore::builder(backend)
        .with_resolver(catalog())
        .with_schemas(schemas.clone())
        .build();
    let controller = DocumentController::new(store);

    let result = controller
        .create(&RequestContext::new("blog", "pages"), &json!([{ "order": 1 }, { "order": 2 }, { "order": 3 }]))
        .await;

    assert_eq!(result.result().unwrap().as_array().unwrap().len(), 3);
    assert_eq!(schemas.lookups.load(Ordering::SeqCst), 1);
}

#[derive(Debug, Clone)]
struct UnavailableBackend;

fn unavailable() -> DocumentStoreError {
    DocumentStoreError::Backend("connection refused".into())
}

#[async_trait]
impl StoreBackend for UnavailableBackend {
    async fn insert_documents(&self, _documents: Vec<(DocumentId, Document)>, _namespace: &Namespace) -> DocumentStoreResult<()> {
        Err(unavailable())
    }

    async fn get_documents(
        &self,
        _ids: Vec<DocumentId>,
        _namespace: &Namespace,
        _projection: &Projection,
    ) -> DocumentStoreResult<Vec<Document>> {
        Err(unavailable())
    }

    async fn query_documents(&self, _query: Query, _namespace: &Namespace) -> DocumentStoreResult<Vec<Document>> {
        Err(unavailable())
    }

    async fn count_documents(&self, _filter: Option<&Expr>, _namespace: &Namespace) -> DocumentStoreResult<usize> {
        Err(unavailable())
    }
}

#[tokio::test]
async fn backend_failures_are_storage_faults() {
    let store = DocumentStore::builder(UnavailableBackend).with_resolver(catalog()).build();
    let controller = DocumentController::new(store);

    let result = controller.list(&posts(), ListParams::default(), ListBody::default()).await;
    assert_eq!(result.fault_kind(), Some(ErrorKind::Storage));

    let params = GetParams { id: Some("abc".into()), ..Default::default() };
    let result = controller.get(&posts(), params).await;
    assert_eq!(result.fault_kind(), Some(ErrorKind::Storage));

    let result = controller.create(&posts(), &json!({ "a": 1 })).await;
    assert_eq!(result.fault_kind(), Some(ErrorKind::Storage));
}
