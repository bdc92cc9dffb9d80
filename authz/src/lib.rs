//! Data-driven authorization engine for the Airshow admin backend.
//!
//! Permissions are *data*, not code: each role carries an ordered list
//! of permission records naming an action, a subject type, optional
//! field restrictions, an optional denial flag, and an optional
//! structured condition that may reference the acting user's identity
//! through `{{id}}` placeholders. At request time those records are
//! compiled into a [`Policy`] that answers three orthogonal questions:
//!
//! 1. `can(action, subject)` -- may the user perform the action on the
//!    subject type at all (gates mutation endpoints and UI affordances)
//! 2. `can_field(action, subject, field)` -- may they touch a specific
//!    field (drives partial-update projection)
//! 3. `can_instance(action, &instance)` -- may they touch *this* row
//!    (applies data-scoped conditions)
//!
//! and that projects into a [`FilterExpression`] equivalent to "rows
//! this policy permits", which the store lowers into a SQL predicate
//! merged into list queries.
//!
//! # Evaluation model
//!
//! Rules are evaluated in their stored order with last-match-wins
//! precedence between grants and denials; the absence of any matching
//! rule is a denial. The subject wildcard `"all"` and the action
//! wildcard `"manage"` match everything. Compilation never mutates the
//! stored records, and a compiled policy is immutable; callers may
//! cache one per (user id, role version) as long as they discard it
//! when the role's permission set changes.
//!
//! # Failure semantics
//!
//! A malformed stored condition is logged and degrades that single rule
//! to unconditional; it never aborts compilation of the rest of the
//! role. A missing acting user or role is a hard [`AuthzError`]:
//! deny-by-default holds even under malformed input.

pub mod condition;
pub mod error;
pub mod filter;
pub mod policy;
pub mod rule;
pub mod template;

pub use condition::CondValue;
pub use error::{AuthzError, Result};
pub use filter::FilterExpression;
pub use policy::{compile, Policy};
pub use rule::{FieldScope, Rule, ALL_SUBJECTS, MANAGE};
pub use template::{render, TemplateVars};
