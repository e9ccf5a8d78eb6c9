//! Filter criteria and query construction.
//!
//! Criteria built here are handed to the storage backend untouched; each backend
//! interprets an [`Expr`] tree through a [`QueryVisitor`] (the in-memory store
//! evaluates it, the MongoDB store translates it to a filter document).
//!
//! ```ignore
//! use docmapper::query::{Filter, Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("active", true).and(Filter::gte("age", 18)))
//!     .sort("name", SortDirection::Asc)
//!     .limit(20)
//!     .build();
//! ```

use bson::Bson;

use crate::{document::PRIMARY_KEY, error::DocumentStoreError};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest value first.
    Asc,
    /// Largest value first.
    Desc,
}

/// Field and direction to order results by.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// Dotted path of the field to order by.
    pub field: String,
    /// Ordering applied to that field.
    pub direction: SortDirection,
}

/// Field comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Field equals the value.
    Eq,
    /// Field differs from the value, or is missing.
    Ne,
    /// Field is greater than the value.
    Gt,
    /// Field is greater than or equal to the value.
    Gte,
    /// Field is less than the value.
    Lt,
    /// Field is less than or equal to the value.
    Lte,
    /// String contains the substring, or array contains the element.
    /// An array value requires every one of its elements to be present.
    Contains,
    /// Negation of [`FieldOp::Contains`]; also matches a missing field.
    NotContains,
    /// String begins with the value.
    StartsWith,
    /// String ends with the value.
    EndsWith,
    /// Field value (or any element of an array field) is one of the given values.
    AnyOf,
    /// Field value is none of the given values, or the field is missing.
    NoneOf,
}

/// A filter expression tree.
///
/// ```ignore
/// use docmapper::query::Filter;
///
/// let staff = Filter::or([Filter::eq("role", "admin"), Filter::eq("role", "staff")]);
/// let active_staff = staff.and(Filter::eq("active", true));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Every inner expression matches. An empty list matches everything.
    And(Vec<Expr>),
    /// At least one inner expression matches. An empty list matches nothing.
    Or(Vec<Expr>),
    /// The inner expression does not match.
    Not(Box<Expr>),
    /// `Exists(field, should_exist)`
    Exists(String, bool),
    /// Compares one field against a value.
    Field {
        /// Dotted path of the field.
        field: String,
        /// Comparison to apply.
        op: FieldOp,
        /// Right-hand side of the comparison.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND, flattening nested ANDs.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR, flattening nested ORs.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression.
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// A structured query: optional filter, sort, offset and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Expr>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort: Option<Sort>,
}

impl Query {
    /// Creates a query matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query with only a filter set.
    pub fn filtered(filter: Expr) -> Self {
        Query {
            filter: Some(filter),
            ..Self::default()
        }
    }

    /// Creates a new query builder.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Constructors for common filter expressions.
///
/// ```ignore
/// let expr = Filter::eq("name", "Alice").and(Filter::gt("age", 18));
/// ```
pub struct Filter;

impl Filter {
    /// Matches the document whose primary key equals `id`.
    pub fn primary_key(id: impl Into<Bson>) -> Expr {
        Self::eq(PRIMARY_KEY, id)
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    pub fn starts_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::StartsWith, value.into())
    }

    pub fn ends_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::EndsWith, value.into())
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Contains, value.into())
    }

    pub fn not_contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NotContains, value.into())
    }

    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    pub fn any_of(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, value.into())
    }

    pub fn none_of(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NoneOf, value.into())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort { field: field.into(), direction });
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Walks an [`Expr`] tree. Backends implement this to evaluate or translate filters.
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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn and_flattens_chains() {
        let expr = Filter::eq("a", 1).and(Filter::eq("b", 2)).and(Filter::eq("c", 3));

        match expr {
            Expr::And(list) => assert_eq!(list.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn primary_key_filter_targets_id_field() {
        assert_eq!(
            Filter::primary_key(2),
            Expr::field(PRIMARY_KEY.to_string(), FieldOp::Eq, Bson::Int32(2))
        );
    }
}
