//! Patch merge semantics
//!
//! Patches merge field-by-field at the top level: unspecified fields are left
//! untouched, and a patched field replaces the previous value wholesale,
//! including nested collections. The last patch to touch a field wins.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{SyncError, SyncResult};

/// Merge a partial patch into the current value.
///
/// Both values are expected to be objects; if either is not, the patch
/// replaces the current value entirely.
pub fn merge_patch(current: &mut Value, patch: &Value) {
    match (current, patch) {
        (Value::Object(cur), Value::Object(fields)) => {
            for (name, value) in fields {
                cur.insert(name.clone(), value.clone());
            }
        }
        (slot, other) => *slot = other.clone(),
    }
}

/// Apply a patch to a typed state value.
///
/// The state round-trips through `serde_json::Value` for the merge. If the
/// merged result no longer deserializes as `T`, the error is returned and the
/// caller's state stays untouched.
pub fn apply_patch<T>(state: &T, patch: &Value) -> SyncResult<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = serde_json::to_value(state).map_err(SyncError::encode)?;
    merge_patch(&mut value, patch);
    serde_json::from_value(value).map_err(|e| SyncError::MalformedPatch {
        details: e.to_string(),
    })
}

/// Project a typed state value onto a subset of its top-level fields.
///
/// An empty field list selects the full state. Non-object states are
/// returned as-is.
pub fn project<T: Serialize>(state: &T, fields: &[String]) -> SyncResult<Value> {
    let value = serde_json::to_value(state).map_err(SyncError::encode)?;
    if fields.is_empty() {
        return Ok(value);
    }
    match value {
        Value::Object(map) => Ok(Value::Object(
            map.into_iter()
                .filter(|(name, _)| fields.iter().any(|f| f == name))
                .collect(),
        )),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Dashboard {
        title: String,
        counts: Vec<u32>,
        #[serde(default)]
        tags: Vec<String>,
    }

    fn dashboard() -> Dashboard {
        Dashboard {
            title: "Sales".to_string(),
            counts: vec![1, 2, 3],
            tags: vec!["q1".to_string()],
        }
    }

    #[test]
    fn test_merge_leaves_unspecified_fields() {
        let mut value = json!({ "a": 1, "b": 2 });
        merge_patch(&mut value, &json!({ "b": 5 }));
        assert_eq!(value, json!({ "a": 1, "b": 5 }));
    }

    #[test]
    fn test_merge_replaces_nested_collections_wholesale() {
        let mut value = json!({ "posts": { "c1": [1, 2], "c2": [3] } });
        merge_patch(&mut value, &json!({ "posts": { "c1": [9] } }));
        // No deep merge: the patched field's value wins entirely.
        assert_eq!(value, json!({ "posts": { "c1": [9] } }));
    }

    #[test]
    fn test_merge_non_object_replaces() {
        let mut value = json!({ "a": 1 });
        merge_patch(&mut value, &json!(42));
        assert_eq!(value, json!(42));
    }

    #[test]
    fn test_apply_patch_typed() {
        let state = dashboard();
        let next = apply_patch(&state, &json!({ "counts": [7] })).unwrap();
        assert_eq!(next.counts, vec![7]);
        assert_eq!(next.title, "Sales");
        assert_eq!(next.tags, vec!["q1".to_string()]);
    }

    #[test]
    fn test_apply_patch_rejects_shape_break() {
        let state = dashboard();
        let err = apply_patch(&state, &json!({ "counts": "oops" })).unwrap_err();
        assert!(matches!(err, SyncError::MalformedPatch { .. }));
        // Caller's state untouched.
        assert_eq!(state.counts, vec![1, 2, 3]);
    }

    #[test]
    fn test_patch_ordering_last_writer_wins() {
        let state = dashboard();
        let patches = [
            json!({ "title": "A" }),
            json!({ "counts": [5] }),
            json!({ "title": "B" }),
        ];

        // Applying in arrival order...
        let mut merged = state.clone();
        for p in &patches {
            merged = apply_patch(&merged, p).unwrap();
        }

        // ...equals a one-at-a-time simulation over raw values.
        let mut value = serde_json::to_value(&state).unwrap();
        for p in &patches {
            merge_patch(&mut value, p);
        }
        let simulated: Dashboard = serde_json::from_value(value).unwrap();

        assert_eq!(merged, simulated);
        assert_eq!(merged.title, "B");
        assert_eq!(merged.counts, vec![5]);
    }

    #[test]
    fn test_reapplying_same_state_is_idempotent() {
        let state = dashboard();
        let full = serde_json::to_value(&state).unwrap();
        let next = apply_patch(&state, &full).unwrap();
        assert_eq!(next, state);
    }

    #[test]
    fn test_project_subset() {
        let state = dashboard();
        let subset = project(&state, &["title".to_string()]).unwrap();
        assert_eq!(subset, json!({ "title": "Sales" }));
    }

    #[test]
    fn test_project_empty_fields_is_full_state() {
        let state = dashboard();
        let full = project(&state, &[]).unwrap();
        assert_eq!(full, serde_json::to_value(&state).unwrap());
    }
}
