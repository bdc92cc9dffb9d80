use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One stored permission row, as the role-management UI persists it.
///
/// The `fields` and `condition` payloads are kept raw here; coercing
/// them into evaluable shapes is the authorization engine's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub id: String,
    /// Operation name: "create", "read", "update", "delete", or the
    /// wildcard "manage".
    pub action: String,
    /// Resource type name: "Channel", "Program", "User", or the
    /// wildcard "all".
    pub subject: String,
    /// Optional list of field names the rule is restricted to.
    /// Anything other than a JSON array means "all fields".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<JsonValue>,
    /// True turns this rule into a denial instead of a grant.
    #[serde(default)]
    pub inverted: bool,
    /// Optional structured predicate scoping the rule to matching
    /// instances. May be stored as a JSON object or as a JSON string
    /// containing one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<JsonValue>,
    /// Advisory explanation shown in the role editor; never evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A role with its ordered permission list.
///
/// Insertion order is evaluation order: later rules override earlier
/// ones when both match. `version` is bumped by the store whenever the
/// permission set changes, so cached compiled policies can be keyed on
/// (user id, role version).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub version: i64,
    pub permissions: Vec<PermissionRecord>,
}

/// The identity an authorization context is compiled for.
///
/// `role` is `None` when the user row exists but no role is assigned;
/// the engine rejects that case rather than granting anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActingUser {
    pub id: String,
    pub role: Option<Role>,
}

impl ActingUser {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role: Some(role),
        }
    }
}
