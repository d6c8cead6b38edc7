//! Query expression evaluation for in-memory document filtering.
//!
//! This module provides the evaluation engine for query expressions,
//! enabling filtering and comparison operations on BSON documents.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document, datetime::DateTime};

use docgate_core::{
    document::lookup_path,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so `Int32(1)`, `Int64(1)` and `Double(1.0)` compare
/// equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl<'a> Comparable<'a> {
    /// Rank of a value's type, used to order values of different types (and missing values)
    /// deterministically when sorting.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Bool(_) => 5,
            Comparable::DateTime(_) => 6,
        }
    }

    /// Total order for sorting: by type rank first, then by value.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.type_rank()
            .cmp(&other.type_rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }

    fn contains(&self, needle: &Comparable<'_>) -> bool {
        match self {
            Comparable::Array(items) => items.iter().any(|item| item == needle),
            _ => false,
        }
    }

    /// Field equality with array semantics: an array field matches a scalar it contains.
    fn matches(&self, value: &Comparable<'_>) -> bool {
        self == value || (!matches!(value, Comparable::Array(_)) && self.contains(value))
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns `true` if the document matches the (optional) filter.
    pub fn matches(document: &Document, filter: Option<&Expr>) -> bool {
        match filter {
            Some(expr) => DocumentEvaluator::new(document)
                .evaluate(expr)
                .unwrap_or(false),
            None => true,
        }
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup_path(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let expected = Comparable::from(value);

        let Some(field_value) = lookup_path(self.document, field) else {
            // A missing field equals null and is outside every list.
            return Ok(match op {
                FieldOp::Eq => expected == Comparable::Null,
                FieldOp::Ne => expected != Comparable::Null,
                FieldOp::NoneOf => true,
                _ => false,
            });
        };
        let actual = Comparable::from(field_value);

        Ok(match op {
            FieldOp::Eq => actual.matches(&expected),
            FieldOp::Ne => !actual.matches(&expected),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match actual.partial_cmp(&expected) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            }
            FieldOp::AnyOf => match &expected {
                Comparable::Array(values) => values.iter().any(|candidate| actual.matches(candidate)),
                single => actual.matches(single),
            },
            FieldOp::NoneOf => match &expected {
                Comparable::Array(values) => !values.iter().any(|candidate| actual.matches(candidate)),
                single => !actual.matches(single),
            },
            FieldOp::AllOf => match &expected {
                // A scalar field holds every tag only when each tag equals it.
                Comparable::Array(values) => {
                    !values.is_empty() && values.iter().all(|wanted| actual.matches(wanted))
                }
                single => actual.matches(single),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docgate_core::query::{Filter, parse_filter};

    fn post() -> Document {
        doc! {
            "_id": "1",
            "title": "Hello",
            "status": "active",
            "views": 42_i64,
            "tags": ["rust", "db", "async"],
            "author": { "name": "Ada" },
        }
    }

    fn matches(expr: Expr) -> bool {
        DocumentEvaluator::matches(&post(), Some(&expr))
    }

    #[test]
    fn numbers_compare_across_widths() {
        assert!(matches(Filter::eq("views", 42)));
        assert!(matches(Filter::gte("views", 42.0)));
        assert!(!matches(Filter::gt("views", 42)));
        assert!(matches(Filter::lt("views", 100)));
    }

    #[test]
    fn nested_paths_are_followed() {
        assert!(matches(Filter::eq("author.name", "Ada")));
        assert!(matches(Filter::exists("author.name")));
        assert!(matches(Filter::not_exists("author.age")));
    }

    #[test]
    fn equality_on_array_field_means_contains() {
        assert!(matches(Filter::eq("tags", "db")));
        assert!(!matches(Filter::eq("tags", "go")));
        assert!(matches(Filter::ne("tags", "go")));
    }

    #[test]
    fn all_of_requires_every_tag() {
        assert!(matches(Filter::all_of("tags", vec!["rust", "db"])));
        assert!(!matches(Filter::all_of("tags", vec!["rust", "go"])));
    }

    #[test]
    fn all_of_on_a_scalar_field_compares_by_equality() {
        assert!(matches(Filter::all_of("title", vec!["Hello"])));
        assert!(matches(Filter::all_of("status", vec!["active", "active"])));
        assert!(!matches(Filter::all_of("status", vec!["active", "draft"])));
        assert!(!matches(Filter::all_of("status", Vec::<&str>::new())));
    }

    #[test]
    fn any_of_and_none_of() {
        assert!(matches(Filter::any_of("status", vec!["draft", "active"])));
        assert!(matches(Filter::any_of("tags", vec!["go", "async"])));
        assert!(matches(Filter::none_of("status", vec!["draft", "hidden"])));
        assert!(!matches(Filter::none_of("tags", vec!["db"])));
    }

    #[test]
    fn missing_fields() {
        assert!(matches(Filter::eq("missing", Bson::Null)));
        assert!(!matches(Filter::eq("missing", 1)));
        assert!(matches(Filter::none_of("missing", vec![1])));
        assert!(!matches(Filter::gt("missing", 1)));
    }

    #[test]
    fn parsed_filters_evaluate() {
        let expr = parse_filter(&doc! {
            "$or": [{ "status": "draft" }, { "views": { "$gte": 40, "$lt": 50 } }],
            "author.name": { "$ne": "Bob" },
        })
        .unwrap();

        assert!(DocumentEvaluator::matches(&post(), expr.as_ref()));
    }

    #[test]
    fn sort_order_puts_missing_first() {
        let null = Comparable::Null;
        let one = Comparable::Number(1.0);
        let text = Comparable::String("a");
        assert_eq!(null.sort_cmp(&one), Ordering::Less);
        assert_eq!(one.sort_cmp(&text), Ordering::Less);
        assert_eq!(one.sort_cmp(&Comparable::Number(1.0)), Ordering::Equal);
    }
}
