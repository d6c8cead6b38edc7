//! Schemas and the pre-store transform hook.
//!
//! Schemas are owned by an external service; the engine only looks them up by id through a
//! [`SchemaProvider`]. Before a document is stored it passes through exactly one
//! [`DocumentTransform`], picked by a [`TransformRegistry`] from the collection's schema. A
//! collection without a schema gets [`NoopTransform`].

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, de::deserialize_from_bson};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    backend::{Namespace, StoreBackend},
    error::DocumentStoreResult,
    query::{Filter, Query},
};

/// Declared type of a schema property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    /// Any type this crate does not interpret.
    #[serde(other)]
    Other,
}

/// One property of a schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaProperty {
    /// Declared type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<PropertyType>,
    /// Value filled in when a document omits the property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Bson>,
}

/// Description of the fields expected in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Identifier collections refer to.
    pub id: String,
    /// Human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Property name to property description, in declaration order.
    #[serde(default)]
    pub properties: Document,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            properties: Document::new(),
        }
    }

    /// Adds a property.
    pub fn with_property(mut self, name: impl Into<String>, property: &SchemaProperty) -> DocumentStoreResult<Self> {
        self.properties
            .insert(name.into(), bson::ser::serialize_to_bson(property)?);
        Ok(self)
    }

    /// Decodes the declared properties in declaration order.
    ///
    /// Entries that are not property objects are skipped.
    pub fn properties(&self) -> Vec<(&str, SchemaProperty)> {
        self.properties
            .iter()
            .filter_map(|(name, value)| match value {
                Bson::Document(_) => deserialize_from_bson::<SchemaProperty>(value.clone())
                    .ok()
                    .map(|property| (name.as_str(), property)),
                _ => None,
            })
            .collect()
    }
}

/// Looks schemas up by id.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Returns the schema with the given id, or `None` if there is none.
    async fn schema(&self, id: &str) -> DocumentStoreResult<Option<Schema>>;
}

/// A provider over schemas registered up front.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemas {
    schemas: HashMap<String, Schema>,
}

impl StaticSchemas {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema under its id.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schemas.insert(schema.id.clone(), schema);
        self
    }
}

#[async_trait]
impl SchemaProvider for StaticSchemas {
    async fn schema(&self, id: &str) -> DocumentStoreResult<Option<Schema>> {
        Ok(self.schemas.get(id).cloned())
    }
}

/// A provider reading serialized [`Schema`]s from a backend namespace.
#[derive(Debug, Clone)]
pub struct StoredSchemas<B: StoreBackend> {
    backend: B,
    namespace: Namespace,
}

impl<B: StoreBackend> StoredSchemas<B> {
    /// Creates a provider reading from `namespace`.
    pub fn new(backend: B, namespace: Namespace) -> Self {
        Self { backend, namespace }
    }
}

#[async_trait]
impl<B: StoreBackend> SchemaProvider for StoredSchemas<B> {
    async fn schema(&self, id: &str) -> DocumentStoreResult<Option<Schema>> {
        let query = Query::builder().filter(Filter::eq("id", id)).limit(1).build();

        match self.backend.query_documents(query, &self.namespace).await?.into_iter().next() {
            Some(document) => Ok(Some(deserialize_from_bson(Bson::Document(document))?)),
            None => Ok(None),
        }
    }
}

/// A pre-store transform. Runs once per document, before it is persisted, and may mutate
/// the document in place.
pub trait DocumentTransform: Send + Sync {
    fn transform(&self, document: &mut Document, schema: Option<&Schema>) -> DocumentStoreResult<()>;
}

/// Leaves documents untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTransform;

impl DocumentTransform for NoopTransform {
    fn transform(&self, _document: &mut Document, _schema: Option<&Schema>) -> DocumentStoreResult<()> {
        Ok(())
    }
}

/// Fills missing properties from schema defaults and coerces textual values to the declared
/// scalar type when they parse cleanly.
///
/// Values that cannot be coerced are left as they are; rejecting documents is not this
/// transform's job.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaDefaultsTransform;

impl DocumentTransform for SchemaDefaultsTransform {
    fn transform(&self, document: &mut Document, schema: Option<&Schema>) -> DocumentStoreResult<()> {
        let Some(schema) = schema else {
            return Ok(());
        };

        for (name, property) in schema.properties() {
            match document.get(name) {
                None => {
                    if let Some(default) = property.default {
                        trace!(field = name, "filling default");
                        document.insert(name, default);
                    }
                }
                Some(value) => {
                    if let Some(coerced) = property.kind.and_then(|kind| coerce(value, kind)) {
                        document.insert(name, coerced);
                    }
                }
            }
        }

        Ok(())
    }
}

fn coerce(value: &Bson, kind: PropertyType) -> Option<Bson> {
    match (kind, value) {
        (PropertyType::Number, Bson::String(text)) => text.trim().parse::<f64>().ok().map(Bson::Double),
        (PropertyType::Integer, Bson::String(text)) => text.trim().parse::<i64>().ok().map(Bson::Int64),
        // `i64::MAX as f64` rounds up to 2^63, which is already out of range.
        (PropertyType::Integer, Bson::Double(n))
            if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n < i64::MAX as f64 =>
        {
            Some(Bson::Int64(*n as i64))
        }
        (PropertyType::Boolean, Bson::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Bson::Boolean(true)),
            "false" => Some(Bson::Boolean(false)),
            _ => None,
        },
        (PropertyType::String, Bson::Int32(n)) => Some(Bson::String(n.to_string())),
        (PropertyType::String, Bson::Int64(n)) => Some(Bson::String(n.to_string())),
        (PropertyType::String, Bson::Double(n)) => Some(Bson::String(n.to_string())),
        (PropertyType::String, Bson::Boolean(b)) => Some(Bson::String(b.to_string())),
        _ => None,
    }
}

/// Picks the transform for a schema.
///
/// Schemas with a registered transform use it; other schemas use the fallback
/// ([`SchemaDefaultsTransform`] unless replaced); no schema means [`NoopTransform`].
#[derive(Clone)]
pub struct TransformRegistry {
    fallback: Arc<dyn DocumentTransform>,
    by_schema: HashMap<String, Arc<dyn DocumentTransform>>,
    noop: Arc<dyn DocumentTransform>,
}

impl TransformRegistry {
    /// Creates a registry with [`SchemaDefaultsTransform`] as fallback.
    pub fn new() -> Self {
        Self {
            fallback: Arc::new(SchemaDefaultsTransform),
            by_schema: HashMap::new(),
            noop: Arc::new(NoopTransform),
        }
    }

    /// Replaces the fallback used for schemas without a dedicated transform.
    pub fn with_fallback(mut self, transform: impl DocumentTransform + 'static) -> Self {
        self.fallback = Arc::new(transform);
        self
    }

    /// Registers a dedicated transform for one schema id.
    pub fn with_transform(mut self, schema_id: impl Into<String>, transform: impl DocumentTransform + 'static) -> Self {
        self.by_schema.insert(schema_id.into(), Arc::new(transform));
        self
    }

    /// Returns the transform for `schema`.
    pub fn select(&self, schema: Option<&Schema>) -> Arc<dyn DocumentTransform> {
        match schema {
            Some(schema) => self
                .by_schema
                .get(&schema.id)
                .cloned()
                .unwrap_or_else(|| self.fallback.clone()),
            None => self.noop.clone(),
        }
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("schemas", &self.by_schema.keys().collect::<Vec<_>>())
            .finish()
    }
}
