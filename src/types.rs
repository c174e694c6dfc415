//! Shared primitive ids and field-map aliases.

use serde_json::{Map, Value};

/// Ordered mapping of field name to JSON value.
pub type Fields = Map<String, Value>;
/// Store-assigned permanent entity identifier.
pub type EntityId = String;
/// Batch-local sequence reference emitted as `$id`.
pub type SeqRef = u64;

/// Wire key carrying the client entity id.
pub const ID_KEY: &str = "id";
/// Wire key carrying the transport metadata block.
pub const ASPECT_KEY: &str = "entityAspect";

/// Renders a JSON id value the way permanent ids are compared and emitted.
///
/// Strings are used as-is; every other value uses its JSON rendering.
pub fn id_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::id_to_string;

    #[test]
    fn string_ids_are_not_quoted() {
        assert_eq!(id_to_string(&json!("abc")), "abc");
        assert_eq!(id_to_string(&json!(42)), "42");
        assert_eq!(id_to_string(&json!(-1)), "-1");
    }
}
