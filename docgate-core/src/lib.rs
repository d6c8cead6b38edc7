//! A schema-aware dynamic document query and mutation engine.
//!
//! This crate is the core of the docgate project and provides:
//!
//! - **Documents** ([`document`]) - Dynamic documents, identifiers and create payload shapes
//! - **Projections** ([`projection`]) - Field inclusion built from `fields` specifications
//! - **Queries** ([`query`]) - Filter trees, loose filter parsing and tag-aware composition
//! - **Pagination** ([`page`]) - 1-indexed pages with totals
//! - **Collection resolution** ([`catalog`]) - Request context to collection descriptor
//! - **Schemas and transforms** ([`schema`]) - Schema lookup and the pre-store hook
//! - **Audit trail** ([`audit`]) - One entry per write, failures routed to an observer
//! - **Storage backends** ([`backend`]) - The trait storage engines implement
//! - **Store and collections** ([`store`], [`collection`]) - Read and write services
//! - **Request layer** ([`request`], [`response`], [`controller`]) - Get, list and create handlers
//! - **Configuration** ([`config`]) and **errors** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use docgate::prelude::*;
//! use docgate::memory::InMemoryStore;
//! use serde_json::json;
//!
//! let store = DocumentStore::builder(InMemoryStore::new())
//!     .with_resolver(StaticCatalog::new().with_collection(
//!         CollectionDescriptor::new(DatabaseRef::new("blog"), "posts"),
//!     ))
//!     .build();
//! let controller = DocumentController::new(store);
//!
//! let context = RequestContext::new("blog", "posts");
//! let created = controller.create(&context, &json!({ "title": "Hello" })).await;
//! assert!(created.is_data());
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_core;

pub mod audit;
pub mod backend;
pub mod catalog;
pub mod collection;
pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod page;
pub mod projection;
pub mod query;
pub mod request;
pub mod response;
pub mod schema;
pub mod store;
