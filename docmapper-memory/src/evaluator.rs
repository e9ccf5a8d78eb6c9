//! Filter evaluation against in-memory BSON documents.

use bson::{Bson, Document as BsonDocument, datetime::DateTime};
use std::cmp::Ordering;

use docmapper_core::{
    document::as_map,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Comparable view of a BSON value.
///
/// Integers compare exactly; doubles only widen the comparison when one side is a double.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(Vec<(&'a str, Comparable<'a>)>),
    /// Values with no ordering or equality beyond identity (binary, regex, ...).
    Opaque(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => {
                let mut fields: Vec<_> = doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect();
                fields.sort_by(|(a, _), (b, _)| a.cmp(b));
                Comparable::Map(fields)
            }
            other => Comparable::Opaque(other),
        }
    }
}

/// Exact comparison of an integer with a double. `None` when `double` is NaN.
fn cmp_int_double(int: i64, double: f64) -> Option<Ordering> {
    match (int as f64).partial_cmp(&double)? {
        // Rounding may have hidden a difference; both fit in i128 exactly here.
        Ordering::Equal => Some((int as i128).cmp(&(double as i128))),
        ordering => Some(ordering),
    }
}

impl Comparable<'_> {
    /// Rank of the value's type in the cross-type sort order.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Int(_) | Comparable::Double(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Opaque(_) => 6,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
        }
    }

    fn cmp_numbers(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Int(a), Comparable::Int(b)) => Some(a.cmp(b)),
            (Comparable::Double(a), Comparable::Double(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Double(b)) => cmp_int_double(*a, *b),
            (Comparable::Double(a), Comparable::Int(b)) => cmp_int_double(*b, *a).map(Ordering::reverse),
            _ => None,
        }
    }

    fn is_nan(&self) -> bool {
        matches!(self, Comparable::Double(value) if value.is_nan())
    }

    /// Total order over all values: type rank first, then value. NaN sorts below every number.
    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        let by_rank = self.type_rank().cmp(&other.type_rank());
        if by_rank != Ordering::Equal {
            return by_rank;
        }

        match (self, other) {
            (Comparable::Null, Comparable::Null) => Ordering::Equal,
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.total_cmp(y))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Comparable::Map(a), Comparable::Map(b)) => a
                .iter()
                .zip(b)
                .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| va.total_cmp(vb)))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Comparable::Opaque(a), Comparable::Opaque(b)) => (a.element_type() as u8)
                .cmp(&(b.element_type() as u8))
                .then_with(|| a.to_string().cmp(&b.to_string())),
            (a, b) => match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => a.cmp_numbers(b).unwrap_or(Ordering::Equal),
            },
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Opaque(a), Comparable::Opaque(b)) => a == b,
            (a, b) => a.cmp_numbers(b) == Some(Ordering::Equal),
        }
    }
}

/// Filter comparisons only order values of the same type bracket.
impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (a, b) => a.cmp_numbers(b),
        }
    }
}

/// Resolves a dotted field path (`"author.name"`) inside a document.
pub(crate) fn lookup<'a>(document: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a BsonDocument,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Bson) -> DocumentStoreResult<Self> {
        Ok(Self { document: as_map(document)? })
    }

    /// Returns whether `document` satisfies `expr`.
    pub fn matches(document: &'a Bson, expr: &Expr) -> DocumentStoreResult<bool> {
        Self::new(document)?.visit_expr(expr)
    }

    fn contains(haystack: &Comparable<'_>, needle: &Comparable<'_>) -> bool {
        match (haystack, needle) {
            (Comparable::Array(items), Comparable::Array(needles)) => {
                needles.iter().all(|needle| items.contains(needle))
            }
            (Comparable::Array(items), needle) => items.contains(needle),
            (Comparable::String(left), Comparable::String(right)) => left.contains(right),
            _ => false,
        }
    }

    /// True when the field value, or any element of it, equals any of `values`.
    fn any_of(field: &Comparable<'_>, values: &Comparable<'_>) -> bool {
        match (field, values) {
            (Comparable::Array(items), Comparable::Array(values)) => {
                values.iter().any(|value| items.contains(value))
            }
            (Comparable::Array(items), single) => items.contains(single),
            (single, Comparable::Array(values)) => values.contains(single),
            (left, right) => left == right,
        }
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<bool, DocumentStoreError> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<bool, DocumentStoreError> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<bool, DocumentStoreError> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<bool, DocumentStoreError> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<bool, DocumentStoreError> {
        let Some(field_value) = lookup(self.document, field) else {
            // Negative operators match documents lacking the field.
            return Ok(matches!(op, FieldOp::Ne | FieldOp::NotContains | FieldOp::NoneOf));
        };

        let left = Comparable::from(field_value);
        let right = Comparable::from(value);

        Ok(match op {
            FieldOp::Eq => left == right,
            FieldOp::Ne => left != right,
            FieldOp::Gt => left.partial_cmp(&right) == Some(Ordering::Greater),
            FieldOp::Gte => matches!(left.partial_cmp(&right), Some(Ordering::Greater | Ordering::Equal)),
            FieldOp::Lt => left.partial_cmp(&right) == Some(Ordering::Less),
            FieldOp::Lte => matches!(left.partial_cmp(&right), Some(Ordering::Less | Ordering::Equal)),
            FieldOp::Contains => Self::contains(&left, &right),
            FieldOp::NotContains => !Self::contains(&left, &right),
            FieldOp::StartsWith => match (&left, &right) {
                (Comparable::String(l), Comparable::String(r)) => l.starts_with(r),
                _ => false,
            },
            FieldOp::EndsWith => match (&left, &right) {
                (Comparable::String(l), Comparable::String(r)) => l.ends_with(r),
                _ => false,
            },
            FieldOp::AnyOf => Self::any_of(&left, &right),
            FieldOp::NoneOf => !Self::any_of(&left, &right),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docmapper_core::query::Filter;

    fn user() -> Bson {
        Bson::Document(doc! {
            "_id": 1,
            "name": "Alice",
            "age": 31_i64,
            "tags": ["admin", "staff"],
            "address": { "city": "Lisbon" },
        })
    }

    #[test]
    fn numbers_compare_across_widths() {
        assert!(DocumentEvaluator::matches(&user(), &Filter::eq("age", 31)).unwrap());
        assert!(DocumentEvaluator::matches(&user(), &Filter::gt("age", 30.5)).unwrap());
        assert!(!DocumentEvaluator::matches(&user(), &Filter::lt("age", 31)).unwrap());
    }

    #[test]
    fn dotted_paths_reach_nested_fields() {
        assert!(DocumentEvaluator::matches(&user(), &Filter::eq("address.city", "Lisbon")).unwrap());
        assert!(!DocumentEvaluator::matches(&user(), &Filter::exists("address.zip")).unwrap());
    }

    #[test]
    fn missing_fields_match_negative_operators_only() {
        assert!(DocumentEvaluator::matches(&user(), &Filter::ne("nickname", "Al")).unwrap());
        assert!(!DocumentEvaluator::matches(&user(), &Filter::eq("nickname", "Al")).unwrap());
    }

    #[test]
    fn array_membership() {
        assert!(DocumentEvaluator::matches(&user(), &Filter::contains("tags", "admin")).unwrap());
        assert!(DocumentEvaluator::matches(&user(), &Filter::any_of("tags", vec!["guest", "staff"])).unwrap());
        assert!(DocumentEvaluator::matches(&user(), &Filter::none_of("name", vec!["Bob", "Carol"])).unwrap());
    }

    #[test]
    fn array_values_require_every_element() {
        assert!(DocumentEvaluator::matches(&user(), &Filter::contains("tags", vec!["admin", "staff"])).unwrap());
        assert!(!DocumentEvaluator::matches(&user(), &Filter::contains("tags", vec!["admin", "guest"])).unwrap());
        assert!(DocumentEvaluator::matches(&user(), &Filter::not_contains("tags", vec!["admin", "guest"])).unwrap());
    }

    #[test]
    fn large_integers_compare_exactly() {
        let big = Bson::Document(doc! { "id": 9_007_199_254_740_993_i64 });

        assert!(DocumentEvaluator::matches(&big, &Filter::eq("id", 9_007_199_254_740_993_i64)).unwrap());
        assert!(!DocumentEvaluator::matches(&big, &Filter::eq("id", 9_007_199_254_740_992_i64)).unwrap());
        assert!(!DocumentEvaluator::matches(&big, &Filter::eq("id", 9_007_199_254_740_992.0)).unwrap());
        assert!(DocumentEvaluator::matches(&big, &Filter::gt("id", 9_007_199_254_740_992.0)).unwrap());
    }

    #[test]
    fn total_order_ranks_types_before_values() {
        let values = [
            Bson::Boolean(true),
            Bson::String("b".into()),
            Bson::Int32(5),
            Bson::Null,
            Bson::Double(f64::NAN),
            Bson::String("a".into()),
            Bson::Int64(3),
            Bson::Double(4.5),
        ];
        let mut sorted: Vec<Comparable<'_>> = values.iter().map(Comparable::from).collect();
        sorted.sort_by(Comparable::total_cmp);

        let rendered: Vec<String> = sorted
            .iter()
            .map(|value| match value {
                Comparable::Null => "null".to_string(),
                Comparable::Int(v) => v.to_string(),
                Comparable::Double(v) => v.to_string(),
                Comparable::String(v) => v.to_string(),
                Comparable::Bool(v) => v.to_string(),
                other => format!("{other:?}"),
            })
            .collect();

        assert_eq!(rendered, vec!["null", "NaN", "3", "4.5", "5", "a", "b", "true"]);
    }

    #[test]
    fn non_documents_are_rejected() {
        assert!(DocumentEvaluator::matches(&Bson::Int32(3), &Filter::eq("a", 1)).is_err());
    }
}
