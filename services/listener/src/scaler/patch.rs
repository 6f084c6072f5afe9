//! JSON merge patch (RFC 7386) construction.
//!
//! Patches are always diffed against a synthetic baseline that stands for
//! "nothing set", never against the live object. The result carries exactly
//! the fields the scaler owns and merges cleanly onto a resource the
//! controller is mutating at the same time.

use serde::Serialize;
use serde_json::{Map, Value};

/// Serialize both values and return the merge patch turning `baseline` into `desired`.
pub fn diff_against<T: Serialize>(baseline: &T, desired: &T) -> Result<Value, serde_json::Error> {
    let original = serde_json::to_value(baseline)?;
    let modified = serde_json::to_value(desired)?;
    Ok(create_merge_patch(&original, &modified))
}

/// Merge patch that transforms `original` into `modified`.
///
/// Unchanged members are omitted, removed members become `null`, nested
/// objects are diffed recursively and any other change replaces the value.
pub fn create_merge_patch(original: &Value, modified: &Value) -> Value {
    match (original, modified) {
        (Value::Object(original), Value::Object(modified)) => {
            Value::Object(diff_objects(original, modified))
        }
        _ => modified.clone(),
    }
}

fn diff_objects(original: &Map<String, Value>, modified: &Map<String, Value>) -> Map<String, Value> {
    let mut patch = Map::new();

    for (key, new_value) in modified {
        match original.get(key) {
            None => {
                patch.insert(key.clone(), new_value.clone());
            }
            Some(old_value) if old_value == new_value => {}
            Some(Value::Object(old)) => match new_value {
                Value::Object(new) => {
                    let nested = diff_objects(old, new);
                    if !nested.is_empty() {
                        patch.insert(key.clone(), Value::Object(nested));
                    }
                }
                _ => {
                    patch.insert(key.clone(), new_value.clone());
                }
            },
            Some(_) => {
                patch.insert(key.clone(), new_value.clone());
            }
        }
    }

    for key in original.keys() {
        if !modified.contains_key(key) {
            patch.insert(key.clone(), Value::Null);
        }
    }

    patch
}

/// Apply a merge patch in place, the way the API server does.
#[cfg(test)]
pub(crate) fn apply_merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                apply_merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_documents_produce_empty_patch() {
        let doc = json!({"spec": {"replicas": 2}});
        assert_eq!(create_merge_patch(&doc, &doc), json!({}));
    }

    #[test]
    fn test_added_and_changed_members() {
        let original = json!({"a": 1, "b": {"c": "x"}});
        let modified = json!({"a": 2, "b": {"c": "x", "d": true}});
        assert_eq!(
            create_merge_patch(&original, &modified),
            json!({"a": 2, "b": {"d": true}})
        );
    }

    #[test]
    fn test_removed_member_becomes_null() {
        let original = json!({"a": 1, "b": 2});
        let modified = json!({"a": 1});
        assert_eq!(create_merge_patch(&original, &modified), json!({"b": null}));
    }

    #[test]
    fn test_arrays_are_replaced_whole() {
        let original = json!({"list": [1, 2, 3]});
        let modified = json!({"list": [1, 2]});
        assert_eq!(
            create_merge_patch(&original, &modified),
            json!({"list": [1, 2]})
        );
    }

    #[test]
    fn test_object_replaced_by_scalar() {
        let original = json!({"a": {"b": 1}});
        let modified = json!({"a": 5});
        assert_eq!(create_merge_patch(&original, &modified), json!({"a": 5}));
    }

    #[test]
    fn test_apply_reproduces_modified_document() {
        let original = json!({"metadata": {"name": "r"}, "spec": {"replicas": 1, "patchID": 4}});
        let modified = json!({"metadata": {"name": "r"}, "spec": {"replicas": 3, "patchID": 5}});

        let patch = create_merge_patch(&original, &modified);
        let mut doc = original.clone();
        apply_merge_patch(&mut doc, &patch);
        assert_eq!(doc, modified);
    }

    #[test]
    fn test_baseline_patch_leaves_foreign_fields_alone() {
        #[derive(Serialize)]
        struct Spec {
            replicas: i32,
        }

        let patch = diff_against(&Spec { replicas: -1 }, &Spec { replicas: 2 }).unwrap();
        let mut live = json!({"replicas": 7, "ephemeralRunnerSpec": {"image": "runner:2"}});
        apply_merge_patch(&mut live, &patch);

        assert_eq!(
            live,
            json!({"replicas": 2, "ephemeralRunnerSpec": {"image": "runner:2"}})
        );
    }
}
