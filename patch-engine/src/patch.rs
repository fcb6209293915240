//! The three-bucket patch and its application to a config tree.
//!
//! Buckets are applied in a fixed order: create-on-missing, then overwrite,
//! then remove. A later patch in a chain may rely on that order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::diff::diff_trees;
use crate::error::PatchError;
use crate::types::{ConfigTree, LeafPath, TreeDiff};

/// Patches for one version, keyed by config path relative to the configs root.
pub type PatchSet = BTreeMap<String, Patch>;

/// A structural change to one config document.
///
/// On the wire a patch is a three-element array of JSON-encoded strings:
/// `["<create_on_missing>", "<overwrite>", "<remove>"]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[String; 3]", into = "[String; 3]")]
pub struct Patch {
    create_on_missing: ConfigTree,
    overwrite: ConfigTree,
    remove: ConfigTree,
}

impl Patch {
    pub fn new(create_on_missing: ConfigTree, overwrite: ConfigTree, remove: ConfigTree) -> Self {
        Self {
            create_on_missing,
            overwrite,
            remove,
        }
    }

    /// The patch that turns `candidate` into `reference`.
    pub fn from_diff(reference: &ConfigTree, candidate: &ConfigTree) -> Self {
        diff_trees(reference, candidate).into()
    }

    pub fn create_on_missing(&self) -> &ConfigTree {
        &self.create_on_missing
    }

    pub fn overwrite(&self) -> &ConfigTree {
        &self.overwrite
    }

    pub fn remove(&self) -> &ConfigTree {
        &self.remove
    }

    pub fn is_empty(&self) -> bool {
        self.create_on_missing.is_empty() && self.overwrite.is_empty() && self.remove.is_empty()
    }

    /// Apply this patch to `target` and return the result.
    ///
    /// The target is consumed; if a bucket does not fit its shape the
    /// partially patched tree is dropped together with the error.
    pub fn apply(&self, mut target: ConfigTree) -> Result<ConfigTree, PatchError> {
        let root = LeafPath::default();
        apply_on_missing(&mut target, &self.create_on_missing, &root)?;
        apply_overwrite(&mut target, &self.overwrite);
        apply_remove(&mut target, &self.remove, &root)?;
        Ok(target)
    }
}

impl From<TreeDiff> for Patch {
    fn from(diff: TreeDiff) -> Self {
        Self::new(diff.create_on_missing, diff.overwrite, diff.remove)
    }
}

impl TryFrom<[String; 3]> for Patch {
    type Error = serde_json::Error;

    fn try_from([create_on_missing, overwrite, remove]: [String; 3]) -> Result<Self, Self::Error> {
        Ok(Self {
            create_on_missing: serde_json::from_str(&create_on_missing)?,
            overwrite: serde_json::from_str(&overwrite)?,
            remove: serde_json::from_str(&remove)?,
        })
    }
}

impl From<Patch> for [String; 3] {
    fn from(patch: Patch) -> Self {
        [
            Value::Object(patch.create_on_missing).to_string(),
            Value::Object(patch.overwrite).to_string(),
            Value::Object(patch.remove).to_string(),
        ]
    }
}

/// Fill gaps only. Existing values are never replaced.
fn apply_on_missing(
    target: &mut ConfigTree,
    patch: &ConfigTree,
    at: &LeafPath,
) -> Result<(), PatchError> {
    for (key, patch_value) in patch {
        let Some(existing) = target.get_mut(key) else {
            target.insert(key.clone(), patch_value.clone());
            continue;
        };

        if let Value::Object(patch_tree) = patch_value {
            let path = at.child(key);
            match existing {
                Value::Object(existing_tree) => apply_on_missing(existing_tree, patch_tree, &path)?,
                _ => {
                    return Err(PatchError::ShapeMismatch {
                        path: path.dotted(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Always wins at the targeted leaf; recurses only where both sides are trees.
fn apply_overwrite(target: &mut ConfigTree, patch: &ConfigTree) {
    for (key, patch_value) in patch {
        if let (Value::Object(patch_tree), Some(Value::Object(existing_tree))) =
            (patch_value, target.get_mut(key))
        {
            apply_overwrite(existing_tree, patch_tree);
            continue;
        }
        target.insert(key.clone(), patch_value.clone());
    }
}

/// Empty marker deletes the key; a non-empty marker recurses.
fn apply_remove(
    target: &mut ConfigTree,
    patch: &ConfigTree,
    at: &LeafPath,
) -> Result<(), PatchError> {
    for (key, marker) in patch {
        let path = at.child(key);
        let Value::Object(marker_tree) = marker else {
            return Err(PatchError::MalformedRemoveMarker {
                path: path.dotted(),
            });
        };

        if !target.contains_key(key) {
            continue;
        }

        if marker_tree.is_empty() {
            target.shift_remove(key);
            continue;
        }

        match target.get_mut(key) {
            Some(Value::Object(existing_tree)) => apply_remove(existing_tree, marker_tree, &path)?,
            _ => {
                return Err(PatchError::ShapeMismatch {
                    path: path.dotted(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> ConfigTree {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn patch(create: Value, overwrite: Value, remove: Value) -> Patch {
        Patch::new(tree(create), tree(overwrite), tree(remove))
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let target = tree(json!({"a": 1, "b": {"c": [true]}}));
        let result = Patch::default().apply(target.clone()).unwrap();
        assert_eq!(result, target);
    }

    #[test]
    fn test_create_on_missing_never_clobbers() {
        let p = patch(json!({"volume": 5, "ui": {"scale": 2}}), json!({}), json!({}));
        let result = p
            .apply(tree(json!({"volume": 9, "ui": {"scale": 1}})))
            .unwrap();
        assert_eq!(result, tree(json!({"volume": 9, "ui": {"scale": 1}})));
    }

    #[test]
    fn test_create_on_missing_fills_nested_gaps() {
        let p = patch(json!({"ui": {"scale": 2, "theme": "dark"}}), json!({}), json!({}));
        let result = p.apply(tree(json!({"ui": {"scale": 1}}))).unwrap();
        assert_eq!(result, tree(json!({"ui": {"scale": 1, "theme": "dark"}})));
    }

    #[test]
    fn test_create_on_missing_tree_over_scalar_is_fault() {
        let p = patch(json!({"ui": {"scale": 2}}), json!({}), json!({}));
        let err = p.apply(tree(json!({"ui": "compact"}))).unwrap_err();
        assert_eq!(
            err,
            PatchError::ShapeMismatch {
                path: "ui".to_string()
            }
        );
    }

    #[test]
    fn test_overwrite_forces_value() {
        let p = patch(json!({}), json!({"volume": 5}), json!({}));
        assert_eq!(p.apply(tree(json!({"volume": 9}))).unwrap(), tree(json!({"volume": 5})));
        assert_eq!(p.apply(tree(json!({}))).unwrap(), tree(json!({"volume": 5})));
    }

    #[test]
    fn test_overwrite_recurses_into_matching_trees() {
        let p = patch(json!({}), json!({"ui": {"scale": 2}}), json!({}));
        let result = p
            .apply(tree(json!({"ui": {"scale": 1, "theme": "light"}})))
            .unwrap();
        assert_eq!(result, tree(json!({"ui": {"scale": 2, "theme": "light"}})));
    }

    #[test]
    fn test_overwrite_replaces_mismatched_structure() {
        let p = patch(json!({}), json!({"keys": {"up": "W"}}), json!({}));
        let result = p.apply(tree(json!({"keys": "WASD"}))).unwrap();
        assert_eq!(result, tree(json!({"keys": {"up": "W"}})));
    }

    #[test]
    fn test_remove_deletes_and_is_idempotent() {
        let p = patch(json!({}), json!({}), json!({"debug": {}, "ui": {"legacy": {}}}));
        let target = tree(json!({"debug": true, "ui": {"legacy": 1, "scale": 2}}));
        let once = p.apply(target).unwrap();
        assert_eq!(once, tree(json!({"ui": {"scale": 2}})));
        let twice = p.apply(once.clone()).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_remove_missing_key_is_noop() {
        let p = patch(json!({}), json!({}), json!({"debug": {}}));
        let target = tree(json!({"volume": 1}));
        assert_eq!(p.apply(target.clone()).unwrap(), target);
    }

    #[test]
    fn test_remove_non_empty_marker_over_scalar_is_fault() {
        let p = patch(json!({}), json!({}), json!({"ui": {"legacy": {}}}));
        let err = p.apply(tree(json!({"ui": 3}))).unwrap_err();
        assert!(matches!(err, PatchError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_remove_marker_must_be_object() {
        let p = patch(json!({}), json!({}), json!({"debug": true}));
        let err = p.apply(tree(json!({"debug": 1}))).unwrap_err();
        assert!(matches!(err, PatchError::MalformedRemoveMarker { .. }));
    }

    #[test]
    fn test_bucket_order_create_then_overwrite_then_remove() {
        let p = patch(json!({"a": 1}), json!({"a": 2}), json!({"b": {}}));
        let result = p.apply(tree(json!({"b": 0}))).unwrap();
        assert_eq!(result, tree(json!({"a": 2})));
    }

    #[test]
    fn test_from_diff_turns_candidate_into_reference() {
        let reference = tree(json!({"a": 1, "ui": {"scale": 2, "theme": "dark"}, "keys": {"up": "W"}}));
        let candidate = tree(json!({"ui": {"scale": 1, "legacy": true}, "keys": "WASD", "old": 0}));
        let p = Patch::from_diff(&reference, &candidate);
        assert_eq!(p.apply(candidate).unwrap(), reference);
    }

    #[test]
    fn test_self_diff_overwrite_is_identity() {
        let t = tree(json!({"a": 1, "b": {"c": "x"}}));
        let p = Patch::from_diff(&t, &t);
        assert!(p.overwrite().is_empty());
        assert_eq!(p.apply(t.clone()).unwrap(), t);
    }

    #[test]
    fn test_wire_format_is_array_of_json_strings() {
        let p = patch(json!({"a": 1}), json!({}), json!({"b": {}}));
        let wire = serde_json::to_value(&p).unwrap();
        assert_eq!(wire, json!(["{\"a\":1}", "{}", "{\"b\":{}}"]));
        let back: Patch = serde_json::from_value(wire).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_wire_format_rejects_non_object_bucket() {
        let result: Result<Patch, _> = serde_json::from_value(json!(["[]", "{}", "{}"]));
        assert!(result.is_err());
    }
}
