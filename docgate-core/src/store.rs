//! The document store: a backend plus the collaborators requests need.
//!
//! [`DocumentStore`] owns the storage backend and shares it with the collection resolver,
//! schema provider, transform registry, audit sink and fault observer. A request first
//! resolves its target with [`DocumentStore::resolve`] and then works on the returned
//! [`DocumentCollection`].
//!
//! # Example
//!
//! ```ignore
//! use docgate::prelude::*;
//! use docgate::memory::InMemoryStore;
//!
//! let backend = InMemoryStore::new();
//! let store = DocumentStore::builder(backend)
//!     .with_resolver(StaticCatalog::new().with_collection(
//!         CollectionDescriptor::new(DatabaseRef::new("blog"), "posts"),
//!     ))
//!     .build();
//!
//! let posts = store.resolve(&RequestContext::new("blog", "posts")).await?;
//! posts.create(CreatePayload::One(doc! { "title": "Hello" })).await?;
//! ```

use std::sync::Arc;

use crate::{
    audit::{AuditSink, BackendAuditLog, FaultObserver, TracingObserver},
    backend::StoreBackend,
    catalog::{CollectionDescriptor, CollectionResolver, RequestContext, StaticCatalog},
    collection::DocumentCollection,
    config::StoreConfig,
    error::DocumentStoreResult,
    schema::{SchemaProvider, StaticSchemas, TransformRegistry},
};

/// A storage backend bundled with the services that resolve, transform and audit documents.
pub struct DocumentStore<B: StoreBackend> {
    pub(crate) backend: B,
    pub(crate) resolver: Arc<dyn CollectionResolver>,
    pub(crate) schemas: Arc<dyn SchemaProvider>,
    pub(crate) transforms: TransformRegistry,
    pub(crate) audit: Arc<dyn AuditSink>,
    pub(crate) observer: Arc<dyn FaultObserver>,
    pub(crate) config: StoreConfig,
}

impl<B: StoreBackend + Clone + 'static> DocumentStore<B> {
    /// Creates a builder around `backend`.
    pub fn builder(backend: B) -> DocumentStoreBuilder<B> {
        DocumentStoreBuilder::new(backend)
    }
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Resolves the collection a request targets.
    ///
    /// # Errors
    ///
    /// Propagates the resolver's validation and not-found errors.
    pub async fn resolve(&self, context: &RequestContext) -> DocumentStoreResult<DocumentCollection<'_, B>> {
        let descriptor = self.resolver.resolve(context).await?;
        Ok(self.collection(descriptor))
    }

    /// Works on an already resolved collection.
    pub fn collection(&self, descriptor: CollectionDescriptor) -> DocumentCollection<'_, B> {
        DocumentCollection::new(descriptor, self)
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Shuts down the backend.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}

impl<B: StoreBackend> std::fmt::Debug for DocumentStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("backend", &self.backend)
            .field("transforms", &self.transforms)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`DocumentStore`].
///
/// Unset collaborators default to: an empty [`StaticCatalog`], an empty [`StaticSchemas`],
/// a [`TransformRegistry::new`], a [`BackendAuditLog`] writing to the configured audit
/// namespace of the same backend, and a [`TracingObserver`].
pub struct DocumentStoreBuilder<B: StoreBackend> {
    backend: B,
    resolver: Option<Arc<dyn CollectionResolver>>,
    schemas: Option<Arc<dyn SchemaProvider>>,
    transforms: TransformRegistry,
    audit: Option<Arc<dyn AuditSink>>,
    observer: Option<Arc<dyn FaultObserver>>,
    config: StoreConfig,
}

impl<B: StoreBackend + Clone + 'static> DocumentStoreBuilder<B> {
    /// Creates a builder with default collaborators.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            resolver: None,
            schemas: None,
            transforms: TransformRegistry::new(),
            audit: None,
            observer: None,
            config: StoreConfig::default(),
        }
    }

    /// Sets the collection resolver.
    pub fn with_resolver(mut self, resolver: impl CollectionResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Sets the schema provider.
    pub fn with_schemas(mut self, schemas: impl SchemaProvider + 'static) -> Self {
        self.schemas = Some(Arc::new(schemas));
        self
    }

    /// Sets the transform registry.
    pub fn with_transforms(mut self, transforms: TransformRegistry) -> Self {
        self.transforms = transforms;
        self
    }

    /// Sets the audit sink.
    pub fn with_audit(mut self, audit: impl AuditSink + 'static) -> Self {
        self.audit = Some(Arc::new(audit));
        self
    }

    /// Sets the observer for side-channel failures.
    pub fn with_observer(mut self, observer: impl FaultObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the store.
    pub fn build(self) -> DocumentStore<B> {
        let audit = self.audit.unwrap_or_else(|| {
            Arc::new(BackendAuditLog::new(
                self.backend.clone(),
                self.config.audit_namespace.clone(),
            ))
        });

        DocumentStore {
            resolver: self.resolver.unwrap_or_else(|| Arc::new(StaticCatalog::new())),
            schemas: self.schemas.unwrap_or_else(|| Arc::new(StaticSchemas::new())),
            transforms: self.transforms,
            audit,
            observer: self.observer.unwrap_or_else(|| Arc::new(TracingObserver)),
            config: self.config,
            backend: self.backend,
        }
    }
}
