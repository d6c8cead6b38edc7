//! Dynamic document representation and create-payload shapes.
//!
//! Documents are open-ended, ordered mappings of field name to a closed set of value variants.
//! This crate uses [`bson::Document`] for that role, so the same value flows unchanged from the
//! request layer through transforms to any storage backend.

use std::fmt;

use bson::{Bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// A dynamic document.
pub type Document = bson::Document;

/// Name of the field that carries the system-assigned identifier of a stored document.
pub const ID_FIELD: &str = "_id";

/// Opaque identifier of a stored document.
///
/// Identifiers are generated from random (v4) UUIDs on insert, but lookups treat them as
/// plain strings so callers can pass whatever a previous response handed them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Generates a fresh, random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads the identifier stored on a document, if any.
    pub fn of(document: &Document) -> Option<Self> {
        match document.get(ID_FIELD) {
            Some(Bson::String(id)) => Some(Self(id.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<DocumentId> for Bson {
    fn from(id: DocumentId) -> Self {
        Bson::String(id.0)
    }
}

/// Looks up a possibly dotted field path (`"author.name"`) inside a document.
///
/// Only nested documents are traversed; a path segment that lands on an array or a scalar
/// resolves to `None`.
pub fn lookup_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Converts a JSON value into a BSON value.
///
/// JSON comes from callers, so values BSON cannot hold (integers above `i64::MAX`, for
/// example) are rejected as invalid input.
pub fn json_to_bson(value: &Value) -> DocumentStoreResult<Bson> {
    serialize_to_bson(value).map_err(|e| DocumentStoreError::validation(e.to_string()))
}

/// Converts a JSON object into a document, rejecting every other JSON shape.
pub fn json_to_document(value: &Value) -> DocumentStoreResult<Document> {
    match json_to_bson(value)? {
        Bson::Document(document) => Ok(document),
        other => Err(DocumentStoreError::validation(format!(
            "expected a JSON object, got {:?}",
            other.element_type()
        ))),
    }
}

/// Converts a document into a JSON value for responses.
pub fn document_to_json(document: &Document) -> DocumentStoreResult<Value> {
    Ok(serde_json::to_value(document)?)
}

/// The body of a create request, classified by shape.
///
/// Anything other than an object or an array consisting only of objects is [`CreatePayload::Other`]
/// and creates nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum CreatePayload {
    /// A single document.
    One(Document),
    /// A batch of documents, inserted in order.
    Many(Vec<Document>),
    /// Any other shape (scalar, null, array with non-object members).
    Other,
}

impl CreatePayload {
    /// Classifies a JSON request body.
    pub fn from_json(body: &Value) -> DocumentStoreResult<Self> {
        match body {
            Value::Object(_) => Ok(CreatePayload::One(json_to_document(body)?)),
            Value::Array(items) if items.iter().all(Value::is_object) => Ok(CreatePayload::Many(
                items
                    .iter()
                    .map(json_to_document)
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
            )),
            _ => Ok(CreatePayload::Other),
        }
    }

    /// Classifies a BSON value.
    pub fn from_bson(body: Bson) -> Self {
        match body {
            Bson::Document(document) => CreatePayload::One(document),
            Bson::Array(items) if items.iter().all(|item| item.as_document().is_some()) => {
                CreatePayload::Many(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            Bson::Document(document) => Some(document),
                            _ => None,
                        })
                        .collect(),
                )
            }
            _ => CreatePayload::Other,
        }
    }
}

impl From<Document> for CreatePayload {
    fn from(document: Document) -> Self {
        CreatePayload::One(document)
    }
}

impl From<Vec<Document>> for CreatePayload {
    fn from(documents: Vec<Document>) -> Self {
        CreatePayload::Many(documents)
    }
}

/// What a create call produced, mirroring the shape of its [`CreatePayload`].
#[derive(Debug, Clone, PartialEq)]
pub enum Created {
    /// The stored document for a single-document payload.
    One(Document),
    /// The stored documents, in input order, for a batch payload.
    Many(Vec<Document>),
    /// Nothing was created because the payload had an unsupported shape.
    Nothing,
}

impl Created {
    /// Returns the stored documents as a slice-like list regardless of shape.
    pub fn documents(&self) -> Vec<&Document> {
        match self {
            Created::One(document) => vec![document],
            Created::Many(documents) => documents.iter().collect(),
            Created::Nothing => Vec::new(),
        }
    }

    /// Renders the result for a response body: an object, an array, or `null`.
    pub fn to_json(&self) -> DocumentStoreResult<Value> {
        match self {
            Created::One(document) => document_to_json(document),
            Created::Many(documents) => Ok(Value::Array(
                documents
                    .iter()
                    .map(document_to_json)
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
            )),
            Created::Nothing => Ok(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde_json::json;

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(DocumentId::generate(), DocumentId::generate());
    }

    #[test]
    fn reads_id_from_document() {
        let document = doc! { "_id": "abc", "title": "A" };
        assert_eq!(DocumentId::of(&document), Some(DocumentId::from("abc")));
        assert_eq!(DocumentId::of(&doc! { "title": "A" }), None);
    }

    #[test]
    fn dotted_paths_walk_nested_documents() {
        let document = doc! { "author": { "name": "Ada", "tags": ["x"] }, "n": 1 };
        assert_eq!(lookup_path(&document, "author.name"), Some(&Bson::String("Ada".into())));
        assert_eq!(lookup_path(&document, "n"), Some(&Bson::Int32(1)));
        assert_eq!(lookup_path(&document, "n.x"), None);
        assert_eq!(lookup_path(&document, "author.missing"), None);
    }

    #[test]
    fn classifies_object_payload() {
        let payload = CreatePayload::from_json(&json!({ "title": "A" })).unwrap();
        assert_eq!(payload, CreatePayload::One(doc! { "title": "A" }));
    }

    #[test]
    fn classifies_array_payload() {
        let payload = CreatePayload::from_json(&json!([{ "title": "A" }, { "title": "B" }])).unwrap();
        assert_eq!(
            payload,
            CreatePayload::Many(vec![doc! { "title": "A" }, doc! { "title": "B" }])
        );
    }

    #[test]
    fn other_shapes_are_not_documents() {
        for body in [json!(42), json!("text"), json!(null), json!(true), json!([1, 2]), json!([{ "a": 1 }, 3])] {
            assert_eq!(CreatePayload::from_json(&body).unwrap(), CreatePayload::Other);
        }
        assert_eq!(CreatePayload::from_bson(Bson::Int32(1)), CreatePayload::Other);
    }

    #[test]
    fn out_of_range_numbers_are_invalid_input() {
        let err = CreatePayload::from_json(&json!({ "n": u64::MAX })).unwrap_err();
        assert!(matches!(err, DocumentStoreError::Validation(_)));
        assert!(matches!(json_to_bson(&json!([u64::MAX])), Err(DocumentStoreError::Validation(_))));
    }

    #[test]
    fn nothing_renders_as_null() {
        assert_eq!(Created::Nothing.to_json().unwrap(), Value::Null);
        assert!(Created::Nothing.documents().is_empty());
    }
}
