//! Loosely-typed request parameters.
//!
//! Query strings deliver everything as text, while JSON bodies may use real numbers and lists.
//! The types here accept both: `page=2` and `"page": 2` parse the same, and `tags` may be a
//! list, repeated query keys or one comma-separated string. Input that cannot be read is a
//! validation failure, not a serialization error.

use serde::{Deserialize, Deserializer, de::DeserializeOwned, de::Error as _};
use serde_json::{Map, Value};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    projection::FieldSpec,
    query::OrderBy,
};

/// Parameters of a get request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GetParams {
    /// Identifier of the document to fetch.
    #[serde(default)]
    pub id: Option<String>,
    /// Fields to return.
    #[serde(default)]
    pub fields: Option<FieldSpec>,
    /// Log the derived projection at INFO level.
    #[serde(default, deserialize_with = "loose_flag")]
    pub debug: bool,
}

/// Query parameters of a list request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListParams {
    /// 1-indexed page number.
    #[serde(default, deserialize_with = "loose_count")]
    pub page: Option<usize>,
    /// Items per page.
    #[serde(default, deserialize_with = "loose_count")]
    pub size: Option<usize>,
    /// Tags every listed document must carry.
    #[serde(default, deserialize_with = "loose_tags")]
    pub tags: Vec<String>,
    /// Fields to return.
    #[serde(default)]
    pub fields: Option<FieldSpec>,
    /// Log the derived projection and filter at INFO level.
    #[serde(default, deserialize_with = "loose_flag")]
    pub debug: bool,
}

/// Body of a list request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListBody {
    /// Raw filter mapping.
    #[serde(default)]
    pub filter: Option<Map<String, Value>>,
    /// Ordering.
    #[serde(default, rename = "orderBy", alias = "order_by")]
    pub order_by: Option<OrderBy>,
}

/// Reads request parameters from a JSON value.
///
/// # Errors
///
/// Returns [`DocumentStoreError::Validation`] describing the first unreadable parameter.
pub fn parse_params<T: DeserializeOwned>(value: Value) -> DocumentStoreResult<T> {
    serde_json::from_value(value).map_err(|e| DocumentStoreError::validation(e.to_string()))
}

/// Reads request parameters from decoded query-string pairs.
///
/// A key that appears more than once (or ends in `[]`) becomes a list.
pub fn parse_query<'a, T: DeserializeOwned>(
    pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> DocumentStoreResult<T> {
    let mut object = Map::new();

    for (key, value) in pairs {
        let (key, is_list) = match key.strip_suffix("[]") {
            Some(key) => (key, true),
            None => (key, false),
        };
        let value = Value::String(value.to_string());

        match object.get_mut(key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None if is_list => {
                object.insert(key.to_string(), Value::Array(vec![value]));
            }
            None => {
                object.insert(key.to_string(), value);
            }
        }
    }

    parse_params(Value::Object(object))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose<T> {
    Exact(T),
    Text(String),
}

fn loose_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
    match Option::<Loose<u64>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Loose::Exact(n)) => usize::try_from(n).map(Some).map_err(D::Error::custom),
        Some(Loose::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Loose::Text(text)) => text
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a non-negative integer, got '{text}'"))),
    }
}

fn loose_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<Loose<bool>>::deserialize(deserializer)? {
        None => false,
        Some(Loose::Exact(flag)) => flag,
        Some(Loose::Text(text)) => matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "y" | "yes" | "true" | "1"
        ),
    })
}

fn loose_tags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<Loose<Vec<String>>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Loose::Exact(tags)) => tags,
        Some(Loose::Text(text)) => text.split(',').map(str::to_string).collect(),
    })
}
