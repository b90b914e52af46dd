//! Extension (annotation) helpers over raw JSON nodes
//!
//! Annotations are addressed by their canonical `url`. Primitive elements keep
//! their annotations in the `_name` sibling object, following the FHIR JSON rules.

use serde_json::{json, Map, Value};
use vitalis_models::{DataAbsentReason, DATA_ABSENT_REASON_URL};

/// Extensions directly attached to `node`.
pub fn extensions(node: &Value) -> &[Value] {
    node.get("extension")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn extension_url(ext: &Value) -> Option<&str> {
    ext.get("url").and_then(Value::as_str)
}

pub fn find_extension<'a>(node: &'a Value, url: &str) -> Option<&'a Value> {
    extensions(node)
        .iter()
        .find(|ext| extension_url(ext) == Some(url))
}

/// Return the extension with `url`, appending an empty one if none exists.
pub fn upsert_extension<'a>(node: &'a mut Value, url: &str) -> &'a mut Value {
    let list = extension_list_mut(node);
    let idx = match list.iter().position(|ext| extension_url(ext) == Some(url)) {
        Some(idx) => idx,
        None => {
            list.push(json!({ "url": url }));
            list.len() - 1
        }
    };
    &mut list[idx]
}

/// Remove every extension with `url`. Drops the `extension` array once empty.
pub fn remove_extension(node: &mut Value, url: &str) -> bool {
    let Some(obj) = node.as_object_mut() else {
        return false;
    };
    let Some(list) = obj.get_mut("extension").and_then(Value::as_array_mut) else {
        return false;
    };
    let before = list.len();
    list.retain(|ext| extension_url(ext) != Some(url));
    let removed = list.len() != before;
    if list.is_empty() {
        obj.remove("extension");
    }
    removed
}

/// The `_key` sibling that carries annotations for primitive `key`.
pub fn primitive_element<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    node.get(format!("_{key}"))
}

pub fn primitive_element_mut<'a>(node: &'a mut Value, key: &str) -> &'a mut Value {
    ensure_object(node)
        .entry(format!("_{key}"))
        .or_insert_with(|| Value::Object(Map::new()))
}

/// Drop the `_key` sibling when nothing is left in it.
pub fn prune_primitive_element(node: &mut Value, key: &str) {
    let Some(obj) = node.as_object_mut() else {
        return;
    };
    let meta_key = format!("_{key}");
    let empty = match obj.get(&meta_key) {
        Some(Value::Object(m)) => m.is_empty(),
        Some(Value::Null) => true,
        _ => false,
    };
    if empty {
        obj.remove(&meta_key);
    }
}

/// Read the `data-absent-reason` code carried by `holder`, if any.
pub fn absent_reason(holder: &Value) -> Option<DataAbsentReason> {
    find_extension(holder, DATA_ABSENT_REASON_URL)
        .and_then(|ext| ext.get("valueCode"))
        .and_then(Value::as_str)
        .and_then(DataAbsentReason::from_code)
}

/// Build the `_value[x]` object that marks a value as absent for `reason`.
pub fn absent_reason_element(reason: DataAbsentReason) -> Value {
    json!({
        "extension": [{ "url": DATA_ABSENT_REASON_URL, "valueCode": reason.as_code() }]
    })
}

pub fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

pub fn ensure_array(value: &mut Value) -> &mut Vec<Value> {
    if !value.is_array() {
        *value = Value::Array(Vec::new());
    }
    match value {
        Value::Array(list) => list,
        _ => unreachable!("value was just replaced with an array"),
    }
}

fn extension_list_mut(node: &mut Value) -> &mut Vec<Value> {
    let slot = ensure_object(node)
        .entry("extension")
        .or_insert_with(|| Value::Array(Vec::new()));
    ensure_array(slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://example.org/ext";

    #[test]
    fn upsert_creates_then_reuses() {
        let mut node = json!({ "resourceType": "Patient" });
        upsert_extension(&mut node, URL)["valueString"] = json!("a");
        upsert_extension(&mut node, URL)["valueString"] = json!("b");

        assert_eq!(extensions(&node).len(), 1);
        assert_eq!(find_extension(&node, URL).unwrap()["valueString"], "b");
    }

    #[test]
    fn remove_drops_empty_array() {
        let mut node = json!({ "extension": [{ "url": URL }, { "url": URL }] });
        assert!(remove_extension(&mut node, URL));
        assert!(node.get("extension").is_none());
        assert!(!remove_extension(&mut node, URL));
    }

    #[test]
    fn remove_keeps_other_extensions() {
        let mut node = json!({ "extension": [{ "url": URL }, { "url": "other" }] });
        remove_extension(&mut node, URL);
        assert_eq!(extensions(&node).len(), 1);
        assert!(find_extension(&node, "other").is_some());
    }

    #[test]
    fn primitive_element_is_created_and_pruned() {
        let mut node = json!({ "birthDate": "1940-02-19" });
        primitive_element_mut(&mut node, "birthDate");
        assert!(node.get("_birthDate").is_some());

        prune_primitive_element(&mut node, "birthDate");
        assert!(node.get("_birthDate").is_none());
        assert_eq!(node["birthDate"], "1940-02-19");
    }

    #[test]
    fn prune_keeps_populated_element() {
        let mut node = json!({ "_birthDate": { "extension": [{ "url": URL }] } });
        prune_primitive_element(&mut node, "birthDate");
        assert!(primitive_element(&node, "birthDate").is_some());
    }

    #[test]
    fn absent_reason_round_trips() {
        let holder = absent_reason_element(DataAbsentReason::Unknown);
        assert_eq!(absent_reason(&holder), Some(DataAbsentReason::Unknown));
        assert_eq!(absent_reason(&json!({})), None);
    }

    #[test]
    fn non_object_nodes_are_replaced() {
        let mut node = Value::Null;
        upsert_extension(&mut node, URL);
        assert!(node.is_object());
        assert!(find_extension(&node, URL).is_some());
    }
}
