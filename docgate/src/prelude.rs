//! Convenient re-exports of commonly used types from docgate.
//!
//! ```ignore
//! use docgate::prelude::*;
//! ```
//!
//! This provides access to:
//! - The store, its collections and the request controller
//! - Collection resolution, schemas and transforms
//! - Query construction, projections and pagination
//! - Audit sinks, configuration and error types

pub use docgate_core::{
    audit::{AuditEntry, AuditSink, BackendAuditLog, FaultObserver, NoAudit, TracingObserver},
    backend::{Namespace, StoreBackend, StoreBackendBuilder},
    catalog::{CollectionDescriptor, CollectionResolver, DatabaseRef, RequestContext, StaticCatalog, StoredCatalog},
    collection::{DocumentCollection, ListQuery},
    config::StoreConfig,
    controller::DocumentController,
    document::{CreatePayload, Created, Document, DocumentId},
    error::{DocumentStoreError, DocumentStoreResult, ErrorKind},
    page::{Page, PaginationParams},
    projection::{FieldSpec, Projection},
    query::{Expr, FieldOp, Filter, OrderBy, Query, QueryBuilder, QueryVisitor, SortDirection},
    request::{GetParams, ListBody, ListParams, parse_params, parse_query},
    response::ApiResult,
    schema::{DocumentTransform, Schema, SchemaProvider, StaticSchemas, StoredSchemas, TransformRegistry},
    store::DocumentStore,
};
