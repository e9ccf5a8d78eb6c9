//! Translation of filter expressions into MongoDB filter documents.

use bson::{Bson, Document, doc};
use regex_lite::escape as escape_regex;

use docmapper_core::{
    error::DocumentStoreError,
    query::{Expr, FieldOp, QueryVisitor},
};

/// Translates an [`Expr`] tree into a MongoDB filter document.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    pub(crate) fn translate(expr: Option<&Expr>) -> Result<Document, DocumentStoreError> {
        match expr {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }
}

fn as_array(value: &Bson) -> Bson {
    match value {
        Bson::Array(_) => value.clone(),
        single => Bson::Array(vec![single.clone()]),
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Document, DocumentStoreError> {
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Document, DocumentStoreError> {
        if exprs.is_empty() {
            // An empty disjunction matches nothing.
            return Ok(doc! { "_id": { "$exists": false } });
        }

        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Document, DocumentStoreError> {
        // `$not` only applies to operator expressions; `$nor` negates whole filters.
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Document, DocumentStoreError> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Document, DocumentStoreError> {
        let condition = match op {
            FieldOp::Eq => doc! { "$eq": value },
            FieldOp::Ne => doc! { "$ne": value },
            FieldOp::Gt => doc! { "$gt": value },
            FieldOp::Gte => doc! { "$gte": value },
            FieldOp::Lt => doc! { "$lt": value },
            FieldOp::Lte => doc! { "$lte": value },
            FieldOp::Contains => match value {
                Bson::String(s) => doc! { "$regex": escape_regex(s) },
                Bson::Array(arr) => doc! { "$all": arr },
                other => doc! { "$eq": other },
            },
            FieldOp::NotContains => match value {
                Bson::String(s) => doc! { "$not": { "$regex": escape_regex(s) } },
                Bson::Array(arr) => doc! { "$not": { "$all": arr } },
                other => doc! { "$ne": other },
            },
            FieldOp::StartsWith => match value {
                Bson::String(s) => doc! { "$regex": format!("^{}", escape_regex(s)) },
                _ => {
                    return Err(DocumentStoreError::Backend(
                        "StartsWith operator requires a string value".to_string(),
                    ));
                }
            },
            FieldOp::EndsWith => match value {
                Bson::String(s) => doc! { "$regex": format!("{}$", escape_regex(s)) },
                _ => {
                    return Err(DocumentStoreError::Backend(
                        "EndsWith operator requires a string value".to_string(),
                    ));
                }
            },
            FieldOp::AnyOf => doc! { "$in": as_array(value) },
            FieldOp::NoneOf => doc! { "$nin": as_array(value) },
        };

        Ok(doc! { field: condition })
    }
}
