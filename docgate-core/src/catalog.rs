//! Collection resolution from request context.
//!
//! Every request names a logical database and collection. A [`CollectionResolver`] maps those
//! names to a [`CollectionDescriptor`], which carries the physical names the backend uses and
//! the optional schema the collection is bound to. Resolution happens once per request.

use std::collections::HashMap;

use async_trait::async_trait;
use bson::{Bson, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    backend::{Namespace, StoreBackend},
    document::DocumentId,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Filter, Query},
};

/// Identifying information a request carries about its target collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Logical database name.
    #[serde(default, alias = "db")]
    pub database: Option<String>,
    /// Logical collection name.
    #[serde(default, alias = "cl")]
    pub collection: Option<String>,
}

impl RequestContext {
    /// Creates a context naming a database and collection.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            collection: Some(collection.into()),
        }
    }

    /// Returns the database and collection names, rejecting blank or missing ones.
    pub fn names(&self) -> DocumentStoreResult<(&str, &str)> {
        let database = non_blank(self.database.as_deref())
            .ok_or_else(|| DocumentStoreError::validation("request does not name a database"))?;
        let collection = non_blank(self.collection.as_deref())
            .ok_or_else(|| DocumentStoreError::validation("request does not name a collection"))?;

        Ok((database, collection))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A logical database and the physical name it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRef {
    /// Logical name used by requests.
    pub name: String,
    /// Physical name; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sysname: Option<String>,
}

impl DatabaseRef {
    /// Creates a database reference whose physical name equals its logical name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), sysname: None }
    }

    /// Sets a distinct physical name.
    pub fn with_sysname(mut self, sysname: impl Into<String>) -> Self {
        self.sysname = Some(sysname.into());
        self
    }

    /// Returns the physical name.
    pub fn storage_name(&self) -> &str {
        self.sysname.as_deref().unwrap_or(&self.name)
    }
}

/// Resolved target of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    /// Logical collection name.
    pub name: String,
    /// Physical collection name; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sysname: Option<String>,
    /// Owning database.
    pub database: DatabaseRef,
    /// Schema the collection is bound to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,
}

impl CollectionDescriptor {
    /// Creates a schema-less descriptor.
    pub fn new(database: DatabaseRef, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sysname: None,
            database,
            schema_id: None,
        }
    }

    /// Sets a distinct physical name.
    pub fn with_sysname(mut self, sysname: impl Into<String>) -> Self {
        self.sysname = Some(sysname.into());
        self
    }

    /// Binds the collection to a schema.
    pub fn with_schema(mut self, schema_id: impl Into<String>) -> Self {
        self.schema_id = Some(schema_id.into());
        self
    }

    /// Returns the schema id, ignoring blank ids.
    pub fn schema_id(&self) -> Option<&str> {
        non_blank(self.schema_id.as_deref())
    }

    /// Returns the physical location of this collection.
    pub fn namespace(&self) -> Namespace {
        Namespace::new(
            self.database.storage_name(),
            self.sysname.as_deref().unwrap_or(&self.name),
        )
    }
}

/// Maps request context to the collection the request targets.
#[async_trait]
pub trait CollectionResolver: Send + Sync {
    /// Resolves the target collection.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::Validation`] if the context lacks a database or collection name
    /// - [`DocumentStoreError::DatabaseNotFound`] if the database is unknown
    /// - [`DocumentStoreError::CollectionNotFound`] if the collection is unknown
    async fn resolve(&self, context: &RequestContext) -> DocumentStoreResult<CollectionDescriptor>;
}

/// A resolver over a fixed set of collections registered up front.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    databases: HashMap<String, HashMap<String, CollectionDescriptor>>,
}

impl StaticCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a database with no collections.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.databases.entry(database.into()).or_default();
        self
    }

    /// Registers a collection (and its database).
    pub fn with_collection(mut self, descriptor: CollectionDescriptor) -> Self {
        self.databases
            .entry(descriptor.database.name.clone())
            .or_default()
            .insert(descriptor.name.clone(), descriptor);
        self
    }
}

#[async_trait]
impl CollectionResolver for StaticCatalog {
    async fn resolve(&self, context: &RequestContext) -> DocumentStoreResult<CollectionDescriptor> {
        let (database, collection) = context.names()?;

        self.databases
            .get(database)
            .ok_or_else(|| DocumentStoreError::DatabaseNotFound(database.to_string()))?
            .get(collection)
            .cloned()
            .ok_or_else(|| {
                DocumentStoreError::CollectionNotFound(collection.to_string(), database.to_string())
            })
    }
}

/// A resolver that reads database and collection descriptors from system namespaces of a
/// backend.
///
/// Database documents look like `{ "name": "blog", "sysname": "blog_01" }`; collection
/// documents are serialized [`CollectionDescriptor`]s.
#[derive(Debug, Clone)]
pub struct StoredCatalog<B: StoreBackend> {
    backend: B,
    databases: Namespace,
    collections: Namespace,
}

impl<B: StoreBackend> StoredCatalog<B> {
    /// Creates a catalog reading from the given namespaces.
    pub fn new(backend: B, databases: Namespace, collections: Namespace) -> Self {
        Self { backend, databases, collections }
    }

    /// Stores a database descriptor.
    pub async fn register_database(&self, database: &DatabaseRef) -> DocumentStoreResult<()> {
        self.store(database, &self.databases).await
    }

    /// Stores a collection descriptor.
    pub async fn register_collection(&self, descriptor: &CollectionDescriptor) -> DocumentStoreResult<()> {
        self.store(descriptor, &self.collections).await
    }

    async fn store<T: Serialize>(&self, value: &T, namespace: &Namespace) -> DocumentStoreResult<()> {
        let document = match serialize_to_bson(value)? {
            Bson::Document(document) => document,
            _ => return Err(DocumentStoreError::Serialization("descriptor is not a document".into())),
        };

        self.backend
            .insert_documents(vec![(DocumentId::generate(), document)], namespace)
            .await
    }
}

#[async_trait]
impl<B: StoreBackend> CollectionResolver for StoredCatalog<B> {
    async fn resolve(&self, context: &RequestContext) -> DocumentStoreResult<CollectionDescriptor> {
        let (database, collection) = context.names()?;

        let known_database = self
            .backend
            .count_documents(Some(&Filter::eq("name", database)), &self.databases)
            .await?;
        if known_database == 0 {
            return Err(DocumentStoreError::DatabaseNotFound(database.to_string()));
        }

        let query = Query::builder()
            .filter(Filter::and([
                Filter::eq("database.name", database),
                Filter::eq("name", collection),
            ]))
            .limit(1)
            .build();

        let found = self
            .backend
            .query_documents(query, &self.collections)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                DocumentStoreError::CollectionNotFound(collection.to_string(), database.to_string())
            })?;

        let descriptor: CollectionDescriptor = deserialize_from_bson(Bson::Document(found))?;
        debug!(namespace = %descriptor.namespace(), "resolved collection {}.{}", database, collection);

        Ok(descriptor)
    }
}
