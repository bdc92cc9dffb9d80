//! Condition values and the recursive template-substitution walk.
//!
//! A stored condition is a JSON-shaped predicate: a mapping of field
//! name to expected value, where values may nest. [`CondValue`] is the
//! tagged in-memory form, so the substitution walk and the instance
//! matcher are exhaustive over every shape a condition can take.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::template::{render, TemplateVars};

/// A condition value: a literal, a sequence, or a nested mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CondValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Sequence(Vec<CondValue>),
    Mapping(BTreeMap<String, CondValue>),
}

impl From<JsonValue> for CondValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => CondValue::Null,
            JsonValue::Bool(b) => CondValue::Bool(b),
            JsonValue::Number(n) => CondValue::Number(n),
            JsonValue::String(s) => CondValue::String(s),
            JsonValue::Array(items) => {
                CondValue::Sequence(items.into_iter().map(CondValue::from).collect())
            }
            JsonValue::Object(map) => CondValue::Mapping(
                map.into_iter().map(|(k, v)| (k, CondValue::from(v))).collect(),
            ),
        }
    }
}

impl CondValue {
    /// Structural equality against a raw JSON attribute value.
    pub fn matches_json(&self, value: &JsonValue) -> bool {
        match (self, value) {
            (CondValue::Null, JsonValue::Null) => true,
            (CondValue::Bool(a), JsonValue::Bool(b)) => a == b,
            (CondValue::Number(a), JsonValue::Number(b)) => a == b,
            (CondValue::String(a), JsonValue::String(b)) => a == b,
            (CondValue::Sequence(a), JsonValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches_json(y))
            }
            (CondValue::Mapping(a), JsonValue::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|bv| v.matches_json(bv)))
            }
            _ => false,
        }
    }
}

/// Walks a condition value, rendering every string leaf through the
/// templater. Numeric, boolean, and null leaves pass through unchanged;
/// sequences and mappings are walked recursively, preserving shape.
pub fn resolve(value: CondValue, vars: &TemplateVars<'_>) -> CondValue {
    match value {
        CondValue::String(s) => CondValue::String(render(&s, vars)),
        CondValue::Sequence(items) => {
            CondValue::Sequence(items.into_iter().map(|v| resolve(v, vars)).collect())
        }
        CondValue::Mapping(map) => CondValue::Mapping(
            map.into_iter().map(|(k, v)| (k, resolve(v, vars))).collect(),
        ),
        leaf => leaf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const VARS: TemplateVars<'static> = TemplateVars { id: "42" };

    #[test]
    fn resolves_string_leaves() {
        let cond = CondValue::from(json!({ "user_id": "{{id}}" }));
        let resolved = resolve(cond, &VARS);
        assert_eq!(resolved, CondValue::from(json!({ "user_id": "42" })));
    }

    #[test]
    fn non_string_leaves_untouched() {
        let cond = CondValue::from(json!({ "locked": true, "priority": 3, "tag": null }));
        let resolved = resolve(cond.clone(), &VARS);
        assert_eq!(resolved, cond);
    }

    #[test]
    fn walks_nested_structures() {
        let cond = CondValue::from(json!({
            "owner": { "ids": ["{{id}}", "static"] }
        }));
        let resolved = resolve(cond, &VARS);
        assert_eq!(
            resolved,
            CondValue::from(json!({ "owner": { "ids": ["42", "static"] } }))
        );
    }

    #[test]
    fn matches_json_on_literals() {
        assert!(CondValue::from(json!("42")).matches_json(&json!("42")));
        assert!(CondValue::from(json!(true)).matches_json(&json!(true)));
        assert!(!CondValue::from(json!("42")).matches_json(&json!(42)));
        assert!(!CondValue::from(json!(1)).matches_json(&json!(2)));
    }

    #[test]
    fn matches_json_on_structures() {
        let cond = CondValue::from(json!({ "a": [1, 2] }));
        assert!(cond.matches_json(&json!({ "a": [1, 2] })));
        assert!(!cond.matches_json(&json!({ "a": [1, 2, 3] })));
        assert!(!cond.matches_json(&json!({ "a": [1, 2], "b": 0 })));
    }
}
