//! Query construction, loose filter parsing and tag-aware filter composition.
//!
//! Requests carry filters as loosely-typed mappings in the familiar document-database
//! style (`{ "status": "active", "age": { "$gte": 18 } }`). [`parse_filter`] turns such a
//! mapping into an [`Expr`] tree, [`compose_filter`] adds the tag condition, and the result
//! is handed to a backend inside a [`Query`]. Backends walk the tree with a [`QueryVisitor`].
//!
//! # Query Building
//!
//! ```ignore
//! use docgate::query::{Query, Filter, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("status", "active"))
//!     .limit(10)
//!     .offset(0)
//!     .sort("createdAt", SortDirection::Desc)
//!     .build();
//! ```
//!
//! # Supported filter operators
//!
//! - Comparison: `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`
//! - Membership: `$in`, `$nin`, `$all`
//! - Existence: `$exists`
//! - Logical: `$and`, `$or`, `$nor`, and field-level `$not`

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    projection::Projection,
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    #[default]
    #[serde(alias = "ASC", alias = "ascending")]
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    #[serde(alias = "DESC", alias = "descending")]
    Desc,
}

/// Ordering specification for query results: a field and a direction.
///
/// Deserializes from `{ "field": "createdAt", "dir": "desc" }`; `dir` defaults to ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// The field name to sort by. Dotted paths address nested fields.
    pub field: String,
    /// The sort direction.
    #[serde(default, alias = "direction")]
    pub dir: SortDirection,
}

impl OrderBy {
    /// Creates a new ordering specification.
    pub fn new(field: impl Into<String>, dir: SortDirection) -> Self {
        Self { field: field.into(), dir }
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Field (or one of its array items) equals any of the values.
    AnyOf,
    /// Field (or any of its array items) equals none of the values.
    NoneOf,
    /// Array field contains every one of the values.
    AllOf,
}

/// A filter expression for querying documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression (inverts the result).
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// A structured query for retrieving and filtering documents.
///
/// Use [`QueryBuilder`] for ergonomic construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional filter expression to match documents. `None` matches everything.
    pub filter: Option<Expr>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of documents to skip (for pagination).
    pub offset: Option<usize>,
    /// Ordering of results. Without it, backends return insertion order.
    pub sort: Option<OrderBy>,
    /// Fields to return.
    pub projection: Projection,
}

impl Query {
    /// Creates a new empty query with no filters or limits.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Helper struct for constructing filter expressions.
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the specified value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents where the field does not equal the specified value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    /// Matches documents where the field is greater than the specified value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    /// Matches documents where the field is greater than or equal to the specified value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    /// Matches documents where the field is less than the specified value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    /// Matches documents where the field is less than or equal to the specified value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents where the field exists.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches documents where the field does not exist.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    /// Combines multiple expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines multiple expressions such that any can match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Matches documents where the field equals, or the array field contains, any of the values.
    pub fn any_of(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, value.into())
    }

    /// Matches documents where the field matches none of the values.
    pub fn none_of(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NoneOf, value.into())
    }

    /// Matches documents whose array field contains every one of the values.
    pub fn all_of(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::AllOf, value.into())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression for this query.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets an optional filter expression; `None` clears it.
    pub fn maybe_filter(mut self, filter: Option<Expr>) -> Self {
        self.query.filter = filter;
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip (for pagination).
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Sets the sort specification for the query results.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(OrderBy::new(field, direction));
        self
    }

    /// Sets an optional ordering.
    pub fn order_by(mut self, order_by: Option<OrderBy>) -> Self {
        self.query.sort = order_by;
        self
    }

    /// Sets which fields are returned.
    pub fn projection(mut self, projection: Projection) -> Self {
        self.query.projection = projection;
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

/// Parses a loosely-typed filter mapping into an expression tree.
///
/// An empty mapping yields `None` ("match everything"). Several top-level entries, or several
/// operators on one field, are joined with AND.
///
/// # Errors
///
/// Returns [`DocumentStoreError::Validation`] for unknown operators, operators mixed with plain
/// keys in one field condition, and operands of the wrong shape (`$in` without an array, for
/// example).
pub fn parse_filter(raw: &Document) -> DocumentStoreResult<Option<Expr>> {
    let mut exprs = Vec::with_capacity(raw.len());

    for (key, value) in raw {
        exprs.push(match key.as_str() {
            "$and" => Expr::And(parse_clauses(key, value)?),
            "$or" => Expr::Or(parse_clauses(key, value)?),
            "$nor" => Expr::Or(parse_clauses(key, value)?).not(),
            op if op.starts_with('$') => {
                return Err(DocumentStoreError::validation(format!(
                    "unsupported top-level operator '{op}'"
                )));
            }
            field => parse_condition(field, value)?,
        });
    }

    Ok(join_all(exprs))
}

fn join_all(mut exprs: Vec<Expr>) -> Option<Expr> {
    match exprs.len() {
        0 => None,
        1 => exprs.pop(),
        _ => Some(Expr::And(exprs)),
    }
}

fn parse_clauses(op: &str, value: &Bson) -> DocumentStoreResult<Vec<Expr>> {
    let clauses = match value {
        Bson::Array(clauses) if !clauses.is_empty() => clauses,
        _ => {
            return Err(DocumentStoreError::validation(format!(
                "'{op}' expects a non-empty array of filters"
            )));
        }
    };

    clauses
        .iter()
        .map(|clause| match clause {
            // An empty clause matches everything.
            Bson::Document(clause) => Ok(parse_filter(clause)?.unwrap_or(Expr::And(Vec::new()))),
            _ => Err(DocumentStoreError::validation(format!(
                "'{op}' clauses must be filter objects"
            ))),
        })
        .collect()
}

fn parse_condition(field: &str, value: &Bson) -> DocumentStoreResult<Expr> {
    let operators = match value {
        Bson::Document(inner) if inner.keys().next().is_some_and(|k| k.starts_with('$')) => inner,
        _ => return Ok(Filter::eq(field, value.clone())),
    };

    let mut exprs = Vec::with_capacity(operators.len());
    for (op, operand) in operators {
        exprs.push(parse_operator(field, op, operand)?);
    }

    Ok(join_all(exprs).unwrap_or(Expr::And(Vec::new())))
}

fn parse_operator(field: &str, op: &str, operand: &Bson) -> DocumentStoreResult<Expr> {
    let expect_array = || match operand {
        Bson::Array(_) => Ok(operand.clone()),
        _ => Err(DocumentStoreError::validation(format!(
            "'{op}' on '{field}' expects an array"
        ))),
    };

    Ok(match op {
        "$eq" => Filter::eq(field, operand.clone()),
        "$ne" => Filter::ne(field, operand.clone()),
        "$gt" => Filter::gt(field, operand.clone()),
        "$gte" => Filter::gte(field, operand.clone()),
        "$lt" => Filter::lt(field, operand.clone()),
        "$lte" => Filter::lte(field, operand.clone()),
        "$in" => Filter::any_of(field, expect_array()?),
        "$nin" => Filter::none_of(field, expect_array()?),
        "$all" => Filter::all_of(field, expect_array()?),
        "$exists" => Expr::Exists(field.to_string(), is_truthy(operand)),
        "$not" => match operand {
            Bson::Document(_) => parse_condition(field, operand)?.not(),
            _ => {
                return Err(DocumentStoreError::validation(format!(
                    "'$not' on '{field}' expects an operator object"
                )));
            }
        },
        other if other.starts_with('$') => {
            return Err(DocumentStoreError::validation(format!(
                "unsupported operator '{other}' on '{field}'"
            )));
        }
        other => {
            return Err(DocumentStoreError::validation(format!(
                "cannot mix operators and the plain key '{other}' in the condition on '{field}'"
            )));
        }
    })
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

/// Adds an all-of tag condition on `tags_field` to a raw filter.
///
/// With no usable tags the raw filter is returned untouched. Otherwise the result is the
/// conjunction of the raw filter (when there is one) and a condition that the tag field
/// contains every requested tag. Tags are trimmed; blank and repeated tags are dropped.
pub fn compose_filter(raw: Option<Expr>, tags: &[String], tags_field: &str) -> Option<Expr> {
    let mut wanted: Vec<Bson> = Vec::with_capacity(tags.len());
    for tag in tags.iter().map(|tag| tag.trim()).filter(|tag| !tag.is_empty()) {
        let tag = Bson::String(tag.to_string());
        if !wanted.contains(&tag) {
            wanted.push(tag);
        }
    }

    if wanted.is_empty() {
        return raw;
    }

    let tag_condition = Filter::all_of(tags_field, Bson::Array(wanted));
    Some(match raw {
        Some(raw) => Expr::And(vec![raw, tag_condition]),
        None => tag_condition,
    })
}
