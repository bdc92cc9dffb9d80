//! Projection of a policy into a backend-agnostic query filter.
//!
//! `to_filter` answers "which rows may this user see/touch" as an
//! expression tree instead of row-by-row `can_instance` calls, so list
//! queries can push authorization down into the database. The tree is
//! deliberately independent of any query language; the store lowers it
//! to parameterized SQL.

use crate::condition::CondValue;
use crate::policy::Policy;
use crate::rule::Rule;

/// A boolean expression over a subject's fields.
///
/// `Always` and `Never` are explicit so that unconditional grants and
/// denials survive simplification and callers can recognize "no WHERE
/// restriction needed" / "return nothing" without walking the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    Always,
    Never,
    FieldEquals(String, CondValue),
    And(Vec<FilterExpression>),
    Or(Vec<FilterExpression>),
    Not(Box<FilterExpression>),
}

impl FilterExpression {
    /// Conjunction with short-circuit simplification: `Never` absorbs,
    /// `Always` drops out, an empty conjunction is `Always`.
    pub fn and(terms: Vec<FilterExpression>) -> FilterExpression {
        let mut kept = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                FilterExpression::Always => {}
                FilterExpression::Never => return FilterExpression::Never,
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => FilterExpression::Always,
            1 => kept.pop().unwrap_or(FilterExpression::Always),
            _ => FilterExpression::And(kept),
        }
    }

    /// Disjunction with short-circuit simplification: `Always` absorbs,
    /// `Never` drops out, an empty disjunction is `Never`.
    pub fn or(terms: Vec<FilterExpression>) -> FilterExpression {
        let mut kept = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                FilterExpression::Never => {}
                FilterExpression::Always => return FilterExpression::Always,
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => FilterExpression::Never,
            1 => kept.pop().unwrap_or(FilterExpression::Never),
            _ => FilterExpression::Or(kept),
        }
    }

    /// Negation, constant-folding the trivial cases.
    pub fn negate(self) -> FilterExpression {
        match self {
            FilterExpression::Always => FilterExpression::Never,
            FilterExpression::Never => FilterExpression::Always,
            FilterExpression::Not(inner) => *inner,
            other => FilterExpression::Not(Box::new(other)),
        }
    }
}

impl Policy {
    /// Builds the filter matching exactly the instances for which
    /// `can_instance(action, ..)` would return true: the disjunction of
    /// all granting rules' conditions, minus the disjunction of all
    /// denying rules' conditions. An unconditional grant contributes
    /// `Always`; an unconditional denial collapses the whole filter to
    /// `Never`. An empty or non-matching policy projects to `Never`.
    pub fn to_filter(&self, subject: &str, action: &str) -> FilterExpression {
        let mut grants = Vec::new();
        let mut denials = Vec::new();

        for rule in self.rules() {
            if !rule.matches_action(action) || !rule.matches_subject(subject) {
                continue;
            }
            let term = rule_term(rule);
            if rule.inverted {
                denials.push(term);
            } else {
                grants.push(term);
            }
        }

        FilterExpression::and(vec![
            FilterExpression::or(grants),
            FilterExpression::or(denials).negate(),
        ])
    }
}

/// A rule's condition as an expression: the conjunction of its
/// field/value pairs, or `Always` when it has no condition.
fn rule_term(rule: &Rule) -> FilterExpression {
    match &rule.condition {
        None => FilterExpression::Always,
        Some(cond) => FilterExpression::and(
            cond.iter()
                .map(|(field, value)| {
                    FilterExpression::FieldEquals(field.clone(), value.clone())
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::compile;
    use model::{ActingUser, PermissionRecord, Role};
    use serde_json::{json, Value as JsonValue};

    fn permission(
        action: &str,
        subject: &str,
        inverted: bool,
        condition: Option<JsonValue>,
    ) -> PermissionRecord {
        PermissionRecord {
            id: "p".into(),
            action: action.into(),
            subject: subject.into(),
            fields: None,
            inverted,
            condition,
            reason: None,
        }
    }

    fn policy_for(permissions: Vec<PermissionRecord>) -> Policy {
        compile(&ActingUser::new(
            "42",
            Role {
                id: "r1".into(),
                name: "test".into(),
                version: 1,
                permissions,
            },
        ))
        .unwrap()
    }

    fn eq(field: &str, value: JsonValue) -> FilterExpression {
        FilterExpression::FieldEquals(field.into(), CondValue::from(value))
    }

    #[test]
    fn empty_policy_projects_to_never() {
        let policy = policy_for(vec![]);
        assert_eq!(policy.to_filter("Channel", "read"), FilterExpression::Never);
    }

    #[test]
    fn unconditional_grant_projects_to_always() {
        let policy = policy_for(vec![permission("read", "Channel", false, None)]);
        assert_eq!(policy.to_filter("Channel", "read"), FilterExpression::Always);
    }

    #[test]
    fn unrelated_subject_projects_to_never() {
        let policy = policy_for(vec![permission("read", "Channel", false, None)]);
        assert_eq!(policy.to_filter("Program", "read"), FilterExpression::Never);
    }

    #[test]
    fn conditional_grant_projects_condition() {
        let policy = policy_for(vec![permission(
            "read",
            "Channel",
            false,
            Some(json!({ "user_id": "{{id}}" })),
        )]);
        assert_eq!(
            policy.to_filter("Channel", "read"),
            eq("user_id", json!("42"))
        );
    }

    #[test]
    fn grants_are_ored_denials_subtracted() {
        let policy = policy_for(vec![
            permission("read", "Channel", false, Some(json!({ "user_id": "{{id}}" }))),
            permission("read", "Channel", false, Some(json!({ "status": true }))),
            permission("read", "Channel", true, Some(json!({ "locked": true }))),
        ]);
        assert_eq!(
            policy.to_filter("Channel", "read"),
            FilterExpression::And(vec![
                FilterExpression::Or(vec![
                    eq("user_id", json!("42")),
                    eq("status", json!(true)),
                ]),
                FilterExpression::Not(Box::new(eq("locked", json!(true)))),
            ])
        );
    }

    #[test]
    fn unconditional_denial_collapses_to_never() {
        let policy = policy_for(vec![
            permission("read", "Channel", false, None),
            permission("read", "Channel", true, None),
        ]);
        assert_eq!(policy.to_filter("Channel", "read"), FilterExpression::Never);
    }

    #[test]
    fn manage_all_rules_cover_every_projection() {
        let policy = policy_for(vec![permission("manage", "all", false, None)]);
        assert_eq!(policy.to_filter("Program", "delete"), FilterExpression::Always);
    }

    #[test]
    fn multi_key_condition_becomes_conjunction() {
        let policy = policy_for(vec![permission(
            "read",
            "Channel",
            false,
            Some(json!({ "status": true, "user_id": "{{id}}" })),
        )]);
        assert_eq!(
            policy.to_filter("Channel", "read"),
            FilterExpression::And(vec![
                eq("status", json!(true)),
                eq("user_id", json!("42")),
            ])
        );
    }

    #[test]
    fn projection_is_deterministic() {
        let policy = policy_for(vec![
            permission("read", "Channel", false, Some(json!({ "user_id": "{{id}}" }))),
            permission("read", "Channel", true, Some(json!({ "locked": true }))),
        ]);
        assert_eq!(
            policy.to_filter("Channel", "read"),
            policy.to_filter("Channel", "read")
        );
    }

    #[test]
    fn constructor_simplification() {
        use FilterExpression::*;
        assert_eq!(FilterExpression::and(vec![]), Always);
        assert_eq!(FilterExpression::or(vec![]), Never);
        assert_eq!(FilterExpression::and(vec![Always, Never]), Never);
        assert_eq!(FilterExpression::or(vec![Never, Always]), Always);
        assert_eq!(Always.negate(), Never);
        assert_eq!(
            eq("a", json!(1)).negate().negate(),
            eq("a", json!(1))
        );
    }
}
