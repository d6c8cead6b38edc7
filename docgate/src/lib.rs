//! Main docgate crate providing a unified interface to the document engine.
//!
//! This crate is the primary entry point for users of docgate. It re-exports the core types
//! and gives convenient access to the storage backends.
//!
//! # Features
//!
//! - **Dynamic documents** - Collections hold schemaless BSON documents addressed by generated ids
//! - **Loose request parameters** - Projections, tag filters and pages parsed from text or JSON
//! - **Schema-keyed transforms** - Pre-store hooks selected by the collection's schema
//! - **Audit trail** - One entry per write, recorded without blocking the write on failure
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docgate::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = DocumentStore::builder(InMemoryStore::builder().build().await.unwrap())
//!         .with_resolver(StaticCatalog::new().with_collection(
//!             CollectionDescriptor::new(DatabaseRef::new("blog"), "posts"),
//!         ))
//!         .build();
//!     let controller = DocumentController::new(store);
//!     let context = RequestContext::new("blog", "posts");
//!
//!     // Create two documents in one call
//!     let created = controller
//!         .create(&context, &json!([{ "title": "a", "tags": ["rust"] }, { "title": "b" }]))
//!         .await;
//!
//!     // List documents tagged "rust", newest first
//!     let params: ListParams = parse_query([("tags", "rust"), ("page", "1")]).unwrap();
//!     let body: ListBody = parse_params(json!({ "orderBy": { "field": "title", "dir": "desc" } })).unwrap();
//!     let page = controller.list(&context, params, body).await;
//!
//!     println!("{created:?}\n{page:?}");
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use docgate_core::{
    audit, backend, catalog, collection, config, controller, document, error, page, projection, query,
    request, response, schema, store,
};

// Re-export the value types that cross the API for convenience
pub use bson;
pub use serde_json;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docgate_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docgate_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
