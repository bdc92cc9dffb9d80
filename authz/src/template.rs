//! Placeholder substitution for permission condition templates.
//!
//! Stored conditions may reference the acting user's identity with
//! `{{id}}` placeholders. This is deliberately *not* a general template
//! engine: the variable set is a closed whitelist and nothing is ever
//! evaluated, so stored conditions cannot become an injection vector.

use tracing::debug;

/// The variables a condition template may reference.
///
/// Currently only the acting user's id. Growing this set is an API
/// decision, not a data decision: unknown names always render empty.
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub id: &'a str,
}

impl<'a> TemplateVars<'a> {
    fn lookup(&self, name: &str) -> Option<&'a str> {
        match name {
            "id" => Some(self.id),
            _ => None,
        }
    }
}

/// Replaces every `{{name}}` placeholder in `template` with the
/// corresponding variable. Unknown placeholders render as the empty
/// string. Text without placeholders passes through unchanged.
pub fn render(template: &str, vars: &TemplateVars<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let name = after_open[..end].trim();
                match vars.lookup(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        debug!(placeholder = name, "unknown template placeholder");
                    }
                }
                rest = &after_open[end + 2..];
            }
            None => {
                // Unterminated placeholder: keep the text as-is.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
