// converters/src/json_util.rs
//! Helpers for navigating FHIR resources as raw `serde_json::Value` trees.

use std::collections::HashMap;

use serde_json::Value;

/// Safely extracts an optional string property.
pub fn get_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

pub fn get_bool(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub fn get_i64(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(Value::as_i64)
}

/// Iterates an array property; empty for anything that is not an array.
pub fn get_array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

/// The codings of a CodeableConcept property.
pub fn codings<'a>(concept: &'a Value) -> &'a [Value] {
    get_array(concept, "coding")
}

/// Finds the code of the first coding with the given system.
pub fn code_in_system<'a>(concept: &'a Value, system: &str) -> Option<&'a str> {
    codings(concept)
        .iter()
        .find(|c| get_str(c, "system") == Some(system))
        .and_then(|c| get_str(c, "code"))
}

/// A reference may be a bare string or a `{"reference": "..."}` object.
pub fn reference_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(_) => get_str(value, "reference"),
        _ => None,
    }
}

/// Builds the `#id → resource` lookup for the contained resources of a
/// Composition or List.
pub fn contained_lookup(resource: &Value) -> HashMap<String, &Value> {
    let mut lookup = HashMap::new();
    for contained in get_array(resource, "contained") {
        if let Some(id) = get_str(contained, "id") {
            lookup.insert(format!("#{}", id), contained);
        }
    }
    lookup
}

/// Collects contained resources of one resourceType, in document order.
pub fn contained_of_type<'a>(resource: &'a Value, resource_type: &str) -> Vec<&'a Value> {
    get_array(resource, "contained")
        .iter()
        .filter(|r| get_str(r, "resourceType") == Some(resource_type))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_find_codes_by_system() {
        let concept = json!({
            "coding": [
                {"system": "http://a", "code": "1"},
                {"system": "http://b", "code": "2"},
            ],
            "text": "something"
        });
        assert_eq!(code_in_system(&concept, "http://b"), Some("2"));
        assert_eq!(code_in_system(&concept, "http://c"), None);
    }

    #[test]
    fn should_accept_string_and_object_references() {
        assert_eq!(reference_str(&json!("#p1")), Some("#p1"));
        assert_eq!(reference_str(&json!({"reference": "#p1"})), Some("#p1"));
        assert_eq!(reference_str(&json!(42)), None);
    }

    #[test]
    fn should_index_contained_resources() {
        let comp = json!({
            "contained": [
                {"resourceType": "Patient", "id": "p1"},
                {"resourceType": "Condition", "id": "c1"},
            ]
        });
        let lookup = contained_lookup(&comp);
        assert!(lookup.contains_key("#p1"));
        assert_eq!(contained_of_type(&comp, "Patient").len(), 1);
    }
}
