//! In-memory document storage backend for docgate.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development,
//! testing and small deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Dynamic documents** - Stores documents as BSON without a fixed shape
//! - **Full query support** - Filtering (including tag containment), stable sorting and pagination
//!
//! # Quick Start
//!
//! ```ignore
//! use docgate::prelude::*;
//! use docgate::memory::InMemoryStore;
//!
//! let backend = InMemoryStore::builder().build().await?;
//! let store = DocumentStore::builder(backend)
//!     .with_resolver(StaticCatalog::new().with_collection(
//!         CollectionDescriptor::new(DatabaseRef::new("blog"), "posts"),
//!     ))
//!     .build();
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_memory;

mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
