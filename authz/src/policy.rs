//! Policy compilation and point checks.
//!
//! A [`Policy`] is the compiled authorization context for one acting
//! user: the role's permission records, normalized against that user's
//! identity, in their original order. It is pure data plus evaluation
//! functions; it never mutates the records it was built from and is
//! safe to share read-only once constructed.

use model::{ActingUser, Subject};

use crate::error::{AuthzError, Result};
use crate::rule::{normalize, FieldScope, Rule};

/// A compiled, immutable rule set scoped to one acting user.
#[derive(Debug, Clone)]
pub struct Policy {
    user_id: String,
    rules: Vec<Rule>,
}

/// Compiles the acting user's role into a [`Policy`].
///
/// Compilation is an O(n) fold over the role's ordered permission
/// records; no rule is dropped or merged, so later rules can override
/// earlier ones at evaluation time. A user without an id or without a
/// role is rejected outright: deny-by-default must hold even when the
/// input is malformed.
pub fn compile(user: &ActingUser) -> Result<Policy> {
    if user.id.is_empty() {
        return Err(AuthzError::MissingUser);
    }
    let role = user
        .role
        .as_ref()
        .ok_or_else(|| AuthzError::MissingRole(user.id.clone()))?;

    let rules = role
        .permissions
        .iter()
        .map(|record| normalize(record, user))
        .collect();

    Ok(Policy {
        user_id: user.id.clone(),
        rules,
    })
}

impl Policy {
    /// The user this policy was compiled for.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Rules in evaluation order. Consumed by the filter projector.
    pub(crate) fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Subject-level check: may the user perform `action` on `subject`
    /// at all? A conditional grant counts as "possibly yes" here; a
    /// conditional denial is skipped, since it only forbids specific
    /// instances. Instance checks evaluate the conditions proper.
    pub fn can(&self, action: &str, subject: &str) -> bool {
        self.scan(action, subject, None, None)
    }

    /// Field-level check: the rule must additionally cover `field`.
    pub fn can_field(&self, action: &str, subject: &str, field: &str) -> bool {
        self.scan(action, subject, Some(field), None)
    }

    /// Instance-level check: a rule with a condition applies only when
    /// every condition key equals the instance's value at that key.
    /// Rules whose condition does not match are skipped, not treated
    /// as denials.
    pub fn can_instance<S: Subject>(&self, action: &str, instance: &S) -> bool {
        let matches_instance = |rule: &Rule| match &rule.condition {
            None => true,
            Some(cond) => cond.iter().all(|(field, expected)| {
                instance
                    .attribute(field)
                    .is_some_and(|actual| expected.matches_json(&actual))
            }),
        };
        self.scan(action, S::TYPE, None, Some(&matches_instance))
    }

    /// In-order scan with last-match-wins semantics. Every applicable
    /// rule overwrites the running answer with `!inverted`; no match
    /// at all means deny. With no instance to test against, a
    /// conditional rule applies when it grants and is skipped when it
    /// denies.
    fn scan(
        &self,
        action: &str,
        subject: &str,
        field: Option<&str>,
        instance: Option<&dyn Fn(&Rule) -> bool>,
    ) -> bool {
        let mut allowed = false;
        for rule in &self.rules {
            if !rule.matches_action(action) || !rule.matches_subject(subject) {
                continue;
            }
            if let Some(field) = field {
                if !rule.fields.permits(field) {
                    continue;
                }
            }
            let applies = match (&rule.condition, instance) {
                (None, _) => true,
                (Some(_), Some(matches_instance)) => matches_instance(rule),
                (Some(_), None) => !rule.inverted,
            };
            if !applies {
                continue;
            }
            allowed = !rule.inverted;
        }
        allowed
    }

    /// The fields of `subject` the user may touch with `action`.
    ///
    /// Folds matching rules in order: a grant adds its named fields
    /// (or `defaults` when it covers all fields), a denial removes
    /// them. This is a subject-level computation, so conditional
    /// denials are skipped like in [`Policy::can`]; the instance-
    /// scoped part of such rules is enforced by the query filter.
    /// First-appearance order is preserved so callers can build stable
    /// payload projections from the result.
    pub fn permitted_fields(&self, action: &str, subject: &str, defaults: &[&str]) -> Vec<String> {
        let mut permitted: Vec<String> = Vec::new();
        for rule in &self.rules {
            if !rule.matches_action(action) || !rule.matches_subject(subject) {
                continue;
            }
            if rule.inverted && rule.condition.is_some() {
                continue;
            }
            let rule_fields: Vec<&str> = match &rule.fields {
                FieldScope::All => defaults.to_vec(),
                FieldScope::Fields(fields) => fields.iter().map(String::as_str).collect(),
            };
            if rule.inverted {
                permitted.retain(|f| !rule_fields.iter().any(|rf| rf == f));
            } else {
                for field in rule_fields {
                    if !permitted.iter().any(|f| f == field) {
                        permitted.push(field.to_string());
                    }
                }
            }
        }
        permitted
    }
}
