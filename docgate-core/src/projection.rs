//! Field projections built from caller-supplied field specifications.
//!
//! A projection is either [`Projection::All`] (no restriction) or an inclusion list. There is no
//! exclusion form: naming fields means "only these", and the identifier field is always kept.

use bson::{Bson, doc};
use serde::{Deserialize, Serialize};

use crate::{
    document::{Document, ID_FIELD},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// A field specification as it arrives on a request: `"a,b"` or `["a", "b"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    /// Comma-separated field names.
    Text(String),
    /// Field names as a list.
    List(Vec<String>),
}

/// Which fields of a document are returned.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Projection {
    /// Return every field.
    #[default]
    All,
    /// Return only the listed fields (plus the identifier), in the order first named.
    Include(Vec<String>),
}

impl Projection {
    /// Builds a projection from a comma-separated field specification.
    ///
    /// `None`, an empty string, or a string of only separators and whitespace yields
    /// [`Projection::All`]. Duplicate names collapse to their first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] when a field name starts with `$` or
    /// contains an empty path segment (`"a..b"`).
    pub fn from_spec(spec: Option<&str>) -> DocumentStoreResult<Self> {
        match spec {
            Some(spec) => Self::from_fields(spec.split(',')),
            None => Ok(Projection::All),
        }
    }

    /// Builds a projection from a [`FieldSpec`] of either form.
    pub fn from_field_spec(spec: Option<&FieldSpec>) -> DocumentStoreResult<Self> {
        match spec {
            Some(FieldSpec::Text(text)) => Self::from_spec(Some(text)),
            Some(FieldSpec::List(fields)) => Self::from_fields(fields.iter().map(String::as_str)),
            None => Ok(Projection::All),
        }
    }

    /// Builds a projection from individual field names.
    pub fn from_fields<'a>(fields: impl IntoIterator<Item = &'a str>) -> DocumentStoreResult<Self> {
        let mut included: Vec<String> = Vec::new();

        for field in fields.into_iter().map(str::trim).filter(|f| !f.is_empty()) {
            if field.starts_with('$') {
                return Err(DocumentStoreError::validation(format!(
                    "projection field '{field}' must not start with '$'"
                )));
            }
            if field.split('.').any(str::is_empty) {
                return Err(DocumentStoreError::validation(format!(
                    "projection field '{field}' has an empty path segment"
                )));
            }
            if !included.iter().any(|existing| existing == field) {
                included.push(field.to_string());
            }
        }

        // A listed parent already selects its whole subtree.
        let parents = included.clone();
        included.retain(|field| !parents.iter().any(|parent| is_sub_path(field, parent)));

        if included.is_empty() {
            Ok(Projection::All)
        } else {
            Ok(Projection::Include(included))
        }
    }

    /// Returns `true` if this projection does not restrict anything.
    pub fn is_all(&self) -> bool {
        matches!(self, Projection::All)
    }

    /// Renders the projection as an inclusion document (`{ "a": 1, "b": 1 }`).
    ///
    /// Returns `None` for [`Projection::All`].
    pub fn to_document(&self) -> Option<Document> {
        match self {
            Projection::All => None,
            Projection::Include(fields) => {
                let mut projection = doc! {};
                for field in fields {
                    projection.insert(field.clone(), Bson::Int32(1));
                }
                Some(projection)
            }
        }
    }

    /// Restricts a document to this projection.
    ///
    /// Dotted fields keep the nested structure leading to the selected value. Fields missing
    /// from the document are simply absent in the output.
    pub fn apply(&self, document: Document) -> Document {
        let fields = match self {
            Projection::All => return document,
            Projection::Include(fields) => fields,
        };

        let mut projected = Document::new();
        if let Some(id) = document.get(ID_FIELD) {
            projected.insert(ID_FIELD, id.clone());
        }

        for field in fields {
            copy_path(&document, &mut projected, field);
        }

        projected
    }
}

fn is_sub_path(field: &str, parent: &str) -> bool {
    field
        .strip_prefix(parent)
        .is_some_and(|rest| rest.starts_with('.'))
}

fn copy_path(source: &Document, target: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            if let Some(value) = source.get(path) {
                target.insert(path, value.clone());
            }
        }
        Some((head, rest)) => {
            let Some(Bson::Document(nested_source)) = source.get(head) else {
                return;
            };

            if !matches!(target.get(head), Some(Bson::Document(_))) {
                target.insert(head, Document::new());
            }
            if let Some(Bson::Document(nested_target)) = target.get_mut(head) {
                copy_path(nested_source, nested_target, rest);
            }
        }
    }
}
