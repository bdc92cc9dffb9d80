use serde_json::{json, Value as JsonValue};

use crate::{Channel, Program, User};

/// Attribute lookup for instance-level authorization checks.
///
/// A permission condition is a mapping of field name to expected value;
/// the engine resolves each key against the instance through this trait
/// and compares. Returning `None` for an unknown field makes the
/// condition fail, which keeps checks deny-by-default for typos in
/// stored conditions. A known but unset nullable field is
/// `Some(JsonValue::Null)`, matching the NULL the database column
/// holds, so instance checks and lowered SQL filters agree on such
/// rows.
pub trait Subject {
    /// Subject type name as referenced by permission records.
    const TYPE: &'static str;

    /// Current value of the named field, if the subject has one.
    fn attribute(&self, field: &str) -> Option<JsonValue>;
}

impl Subject for Channel {
    const TYPE: &'static str = "Channel";

    fn attribute(&self, field: &str) -> Option<JsonValue> {
        match field {
            "id" => Some(json!(self.id)),
            "name" => Some(json!(self.name)),
            "status" => Some(json!(self.status)),
            "user_id" => Some(json!(self.user_id)),
            _ => None,
        }
    }
}

impl Subject for Program {
    const TYPE: &'static str = "Program";

    fn attribute(&self, field: &str) -> Option<JsonValue> {
        match field {
            "id" => Some(json!(self.id)),
            "title" => Some(json!(self.title)),
            "duration" => Some(json!(self.duration)),
            "description" => Some(json!(self.description)),
            "video_url" => Some(json!(self.video_url)),
            "channel_id" => Some(json!(self.channel_id)),
            _ => None,
        }
    }
}

impl Subject for User {
    const TYPE: &'static str = "User";

    fn attribute(&self, field: &str) -> Option<JsonValue> {
        match field {
            "id" => Some(json!(self.id)),
            "name" => Some(json!(self.name)),
            "email" => Some(json!(self.email)),
            "role_id" => Some(json!(self.role_id)),
            _ => None,
        }
    }
}
