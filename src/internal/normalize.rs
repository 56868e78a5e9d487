use crate::internal::models::NormalizedMessage;
use serde_json::{Value, json};

pub const ATTACHMENTS_FIELD: &str = "attachments";

/// Bring a parsed payload into message-group shape.
///
/// Payloads that already carry `attachments` pass through untouched; anything
/// else becomes the single attachment of a new group.
pub fn normalize(value: Value) -> NormalizedMessage {
    if has_attachments(&value) {
        NormalizedMessage(value)
    } else {
        NormalizedMessage(json!({ ATTACHMENTS_FIELD: [value] }))
    }
}

fn has_attachments(value: &Value) -> bool {
    // Falsy values count as absent.
    match value.get(ATTACHMENTS_FIELD) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(_) => true,
    }
}
