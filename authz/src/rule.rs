//! Normalization of stored permission records into evaluable rules.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use tracing::warn;

use model::{ActingUser, PermissionRecord};

use crate::condition::{resolve, CondValue};
use crate::template::TemplateVars;

/// Wildcard subject that matches every resource type.
pub const ALL_SUBJECTS: &str = "all";

/// Wildcard action that matches every operation.
pub const MANAGE: &str = "manage";

/// The field scope of a rule: everything, or a named ordered subset.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldScope {
    All,
    Fields(Vec<String>),
}

impl FieldScope {
    pub fn permits(&self, field: &str) -> bool {
        match self {
            FieldScope::All => true,
            FieldScope::Fields(fields) => fields.iter().any(|f| f == field),
        }
    }
}

/// One evaluable rule: a [`PermissionRecord`] with its condition parsed
/// and resolved against the acting user, and its field payload coerced.
/// Built per authorization context, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub action: String,
    pub subject: String,
    pub fields: FieldScope,
    pub inverted: bool,
    pub condition: Option<BTreeMap<String, CondValue>>,
}

impl Rule {
    pub fn matches_action(&self, action: &str) -> bool {
        self.action == action || self.action == MANAGE
    }

    pub fn matches_subject(&self, subject: &str) -> bool {
        self.subject == subject || self.subject == ALL_SUBJECTS
    }
}

/// Converts a stored record into a [`Rule`] for the given user.
///
/// A condition stored as a string is parsed as JSON first; if parsing
/// fails the rule is kept but applies unconditionally, and the failure
/// is logged with the permission id. One bad row must not take down
/// compilation of the rest of the role.
pub fn normalize(record: &PermissionRecord, user: &ActingUser) -> Rule {
    let vars = TemplateVars { id: &user.id };

    Rule {
        action: record.action.clone(),
        subject: record.subject.clone(),
        fields: coerce_fields(record.fields.as_ref()),
        inverted: record.inverted,
        condition: resolve_condition(record, &vars),
    }
}

fn resolve_condition(
    record: &PermissionRecord,
    vars: &TemplateVars<'_>,
) -> Option<BTreeMap<String, CondValue>> {
    let raw = record.condition.as_ref()?;

    let parsed: JsonValue = match raw {
        JsonValue::String(text) => match serde_json::from_str(text) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    permission_id = %record.id,
                    error = %err,
                    "malformed permission condition; treating rule as unconditional"
                );
                return None;
            }
        },
        other => other.clone(),
    };

    match resolve(CondValue::from(parsed), vars) {
        CondValue::Mapping(map) => Some(map),
        _ => {
            warn!(
                permission_id = %record.id,
                "permission condition is not a field mapping; treating rule as unconditional"
            );
            None
        }
    }
}

/// An array payload becomes an ordered set of field names (duplicates
/// and non-string entries dropped); any other payload means the rule
/// covers all fields of its subject.
fn coerce_fields(raw: Option<&JsonValue>) -> FieldScope {
    match raw {
        Some(JsonValue::Array(items)) => {
            let mut fields: Vec<String> = Vec::with_capacity(items.len());
            for item in items {
                if let JsonValue::String(name) = item {
                    if !fields.iter().any(|f| f == name) {
                        fields.push(name.clone());
                    }
                }
            }
            FieldScope::Fields(fields)
        }
        _ => FieldScope::All,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(condition: Option<JsonValue>, fields: Option<JsonValue>) -> PermissionRecord {
        PermissionRecord {
            id: "p1".into(),
            action: "update".into(),
            subject: "Channel".into(),
            fields,
            inverted: false,
            condition,
            reason: None,
        }
    }

    fn user() -> ActingUser {
        ActingUser {
            id: "42".into(),
            role: None,
        }
    }

    #[test]
    fn templates_condition_for_user() {
        let rule = normalize(&record(Some(json!({ "user_id": "{{id}}" })), None), &user());
        let cond = rule.condition.expect("condition should survive");
        assert_eq!(cond.get("user_id"), Some(&CondValue::String("42".into())));
    }

    #[test]
    fn string_condition_is_parsed_first() {
        let raw = json!("{\"user_id\": \"{{id}}\"}");
        let rule = normalize(&record(Some(raw), None), &user());
        let cond = rule.condition.expect("string condition should parse");
        assert_eq!(cond.get("user_id"), Some(&CondValue::String("42".into())));
    }

    #[test]
    fn malformed_condition_falls_open() {
        let rule = normalize(&record(Some(json!("{\"user_id\": ")), None), &user());
        assert_eq!(rule.condition, None);
    }

    #[test]
    fn non_mapping_condition_falls_open() {
        let rule = normalize(&record(Some(json!([1, 2, 3])), None), &user());
        assert_eq!(rule.condition, None);
    }

    #[test]
    fn array_fields_become_ordered_set() {
        let rule = normalize(
            &record(None, Some(json!(["name", "status", "name"]))),
            &user(),
        );
        assert_eq!(
            rule.fields,
            FieldScope::Fields(vec!["name".into(), "status".into()])
        );
    }

    #[test]
    fn missing_fields_mean_all() {
        let rule = normalize(&record(None, None), &user());
        assert_eq!(rule.fields, FieldScope::All);
        assert!(rule.fields.permits("anything"));
    }

    #[test]
    fn scalar_fields_payload_means_all() {
        let rule = normalize(&record(None, Some(json!("name"))), &user());
        assert_eq!(rule.fields, FieldScope::All);
    }

    #[test]
    fn wildcard_matching() {
        let mut rule = normalize(&record(None, None), &user());
        rule.action = MANAGE.into();
        rule.subject = ALL_SUBJECTS.into();
        assert!(rule.matches_action("delete"));
        assert!(rule.matches_subject("Program"));
    }

    #[test]
    fn inverted_flag_carried_through() {
        let mut rec = record(None, None);
        rec.inverted = true;
        assert!(normalize(&rec, &user()).inverted);
    }
}
