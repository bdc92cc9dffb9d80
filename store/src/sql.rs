//! Lowering of authorization filters to parameterized SQL.
//!
//! The engine's [`FilterExpression`] is backend-agnostic; this module
//! turns it into a SQLite WHERE fragment plus bind arguments. Field
//! names are validated as plain identifiers and every value travels as
//! a bind parameter, so filter data can never splice into the SQL text.
//!
//! Equality lowers to SQLite's NULL-safe `IS` operator rather than `=`:
//! a negated condition must come out true, not NULL, on rows whose
//! column is NULL, so that the lowered filter selects exactly the rows
//! the in-memory instance check would allow.

use authz::{CondValue, FilterExpression};
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;

use crate::error::{Result, StoreError};

/// A bindable SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Text(String),
    Int(i64),
    Real(f64),
    Bool(bool),
}

/// A WHERE fragment with its bind arguments, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFilter {
    pub clause: String,
    pub args: Vec<SqlArg>,
}

impl SqlFilter {
    /// `1` — matches every row.
    pub fn always() -> Self {
        SqlFilter {
            clause: "1".to_string(),
            args: Vec::new(),
        }
    }

    pub fn is_always(&self) -> bool {
        self.clause == "1" && self.args.is_empty()
    }
}

/// Lowers a filter expression into a WHERE fragment.
pub fn lower(expr: &FilterExpression) -> Result<SqlFilter> {
    let mut args = Vec::new();
    let clause = lower_expr(expr, &mut args)?;
    Ok(SqlFilter { clause, args })
}

fn lower_expr(expr: &FilterExpression, args: &mut Vec<SqlArg>) -> Result<String> {
    match expr {
        FilterExpression::Always => Ok("1".to_string()),
        FilterExpression::Never => Ok("0".to_string()),
        FilterExpression::FieldEquals(field, value) => lower_equals(field, value, args),
        FilterExpression::And(terms) => lower_junction(terms, " AND ", args),
        FilterExpression::Or(terms) => lower_junction(terms, " OR ", args),
        FilterExpression::Not(inner) => {
            let inner_sql = lower_expr(inner, args)?;
            Ok(format!("NOT ({})", inner_sql))
        }
    }
}

fn lower_junction(
    terms: &[FilterExpression],
    joiner: &str,
    args: &mut Vec<SqlArg>,
) -> Result<String> {
    let parts = terms
        .iter()
        .map(|t| lower_expr(t, args))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("({})", parts.join(joiner)))
}

fn lower_equals(field: &str, value: &CondValue, args: &mut Vec<SqlArg>) -> Result<String> {
    if !is_identifier(field) {
        return Err(StoreError::InvalidFilter(format!(
            "'{}' is not a valid column name",
            field
        )));
    }
    match value {
        CondValue::Null => Ok(format!("{} IS NULL", field)),
        CondValue::Bool(b) => {
            args.push(SqlArg::Bool(*b));
            Ok(format!("{} IS ?", field))
        }
        CondValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                args.push(SqlArg::Int(i));
            } else if let Some(f) = n.as_f64() {
                args.push(SqlArg::Real(f));
            } else {
                return Err(StoreError::InvalidFilter(format!(
                    "numeric value for '{}' fits neither i64 nor f64",
                    field
                )));
            }
            Ok(format!("{} IS ?", field))
        }
        CondValue::String(s) => {
            args.push(SqlArg::Text(s.clone()));
            Ok(format!("{} IS ?", field))
        }
        CondValue::Sequence(_) | CondValue::Mapping(_) => Err(StoreError::InvalidFilter(format!(
            "structured condition value for '{}' has no column equivalent",
            field
        ))),
    }
}

/// True for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Appends the filter's bind arguments to a query.
pub(crate) fn bind_args<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    args: &[SqlArg],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for arg in args {
        query = match arg {
            SqlArg::Text(s) => query.bind(s.clone()),
            SqlArg::Int(i) => query.bind(*i),
            SqlArg::Real(r) => query.bind(*r),
            SqlArg::Bool(b) => query.bind(*b),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eq(field: &str, value: serde_json::Value) -> FilterExpression {
        FilterExpression::FieldEquals(field.into(), CondValue::from(value))
    }

    #[test]
    fn lowers_constants() {
        assert_eq!(lower(&FilterExpression::Always).unwrap().clause, "1");
        assert_eq!(lower(&FilterExpression::Never).unwrap().clause, "0");
    }

    #[test]
    fn lowers_field_equality_null_safe() {
        let f = lower(&eq("user_id", json!("42"))).unwrap();
        assert_eq!(f.clause, "user_id IS ?");
        assert_eq!(f.args, vec![SqlArg::Text("42".into())]);
    }

    #[test]
    fn lowers_null_to_is_null() {
        let f = lower(&eq("user_id", json!(null))).unwrap();
        assert_eq!(f.clause, "user_id IS NULL");
        assert!(f.args.is_empty());
    }

    #[test]
    fn lowers_nested_expression() {
        let expr = FilterExpression::And(vec![
            FilterExpression::Or(vec![eq("user_id", json!("42")), eq("status", json!(true))]),
            FilterExpression::Not(Box::new(eq("locked", json!(true)))),
        ]);
        let f = lower(&expr).unwrap();
        assert_eq!(
            f.clause,
            "((user_id IS ? OR status IS ?) AND NOT (locked IS ?))"
        );
        assert_eq!(
            f.args,
            vec![
                SqlArg::Text("42".into()),
                SqlArg::Bool(true),
                SqlArg::Bool(true),
            ]
        );
    }

    #[test]
    fn rejects_injection_shaped_field_names() {
        assert!(lower(&eq("user_id; DROP TABLE users", json!("x"))).is_err());
        assert!(lower(&eq("1=1 --", json!("x"))).is_err());
        assert!(lower(&eq("", json!("x"))).is_err());
    }

    #[test]
    fn rejects_structured_values() {
        assert!(lower(&eq("meta", json!({ "a": 1 }))).is_err());
        assert!(lower(&eq("tags", json!([1, 2]))).is_err());
    }

    #[test]
    fn identifier_check() {
        assert!(is_identifier("user_id"));
        assert!(is_identifier("_hidden"));
        assert!(!is_identifier("9lives"));
        assert!(!is_identifier("a-b"));
    }
}
