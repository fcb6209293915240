//! Structural diff of two config trees.
//!
//! The diff answers one question: what would have to happen to `candidate`
//! for it to look like `reference`? The answer is split into the three patch
//! buckets. The reference side always wins; deciding which side is more
//! authoritative is left to the classifier.

use serde_json::Value;

use crate::types::{ConfigTree, TreeDiff, same_kind};

/// Compare `reference` against `candidate`.
///
/// - keys only in `reference` land in `create_on_missing` as-is
/// - keys in both with a different kind (tree vs leaf) land in `overwrite`
///   with the reference value, wholesale
/// - keys in both that are trees are compared recursively; non-empty
///   results are nested under the same key
/// - keys in both that are unequal leaves land in `overwrite`
/// - keys only in `candidate` get an empty marker in `remove`
pub fn diff_trees(reference: &ConfigTree, candidate: &ConfigTree) -> TreeDiff {
    let mut out = TreeDiff::default();

    for (key, ref_value) in reference {
        let Some(cand_value) = candidate.get(key) else {
            out.create_on_missing.insert(key.clone(), ref_value.clone());
            continue;
        };

        if !same_kind(ref_value, cand_value) {
            // Schema shape changed, no partial merge
            out.overwrite.insert(key.clone(), ref_value.clone());
            continue;
        }

        match (ref_value, cand_value) {
            (Value::Object(ref_tree), Value::Object(cand_tree)) => {
                let nested = diff_trees(ref_tree, cand_tree);
                if !nested.create_on_missing.is_empty() {
                    out.create_on_missing
                        .insert(key.clone(), Value::Object(nested.create_on_missing));
                }
                if !nested.overwrite.is_empty() {
                    out.overwrite
                        .insert(key.clone(), Value::Object(nested.overwrite));
                }
                if !nested.remove.is_empty() {
                    out.remove.insert(key.clone(), Value::Object(nested.remove));
                }
            }
            _ => {
                if ref_value != cand_value {
                    out.overwrite.insert(key.clone(), ref_value.clone());
                }
            }
        }
    }

    for key in candidate.keys() {
        if !reference.contains_key(key) {
            out.remove.insert(key.clone(), Value::Object(ConfigTree::new()));
        }
    }

    out
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

    #[test]
    fn test_identical_trees_have_no_diff() {
        let t = tree(json!({"a": 1, "b": {"c": [1, 2], "d": null}}));
        assert!(diff_trees(&t, &t).is_empty());
    }

    #[test]
    fn test_missing_key_goes_to_create_on_missing() {
        let reference = tree(json!({"volume": 5, "audio": {"music": true}}));
        let candidate = tree(json!({}));
        let diff = diff_trees(&reference, &candidate);
        assert_eq!(diff.create_on_missing, reference);
        assert!(diff.overwrite.is_empty());
        assert!(diff.remove.is_empty());
    }

    #[test]
    fn test_changed_leaf_goes_to_overwrite() {
        let diff = diff_trees(&tree(json!({"volume": 5})), &tree(json!({"volume": 9})));
        assert_eq!(diff.overwrite, tree(json!({"volume": 5})));
        assert!(diff.create_on_missing.is_empty());
    }

    #[test]
    fn test_kind_change_overwrites_wholesale() {
        let reference = tree(json!({"keys": {"up": "W", "down": "S"}}));
        let candidate = tree(json!({"keys": "WASD"}));
        let diff = diff_trees(&reference, &candidate);
        assert_eq!(diff.overwrite, reference);
        assert!(diff.create_on_missing.is_empty());
        assert!(diff.remove.is_empty());
    }

    #[test]
    fn test_nested_results_merge_under_key() {
        let reference = tree(json!({"ui": {"scale": 2, "theme": "dark"}}));
        let candidate = tree(json!({"ui": {"scale": 1, "legacy": true}}));
        let diff = diff_trees(&reference, &candidate);
        assert_eq!(diff.create_on_missing, tree(json!({"ui": {"theme": "dark"}})));
        assert_eq!(diff.overwrite, tree(json!({"ui": {"scale": 2}})));
        assert_eq!(diff.remove, tree(json!({"ui": {"legacy": {}}})));
    }

    #[test]
    fn test_extra_key_gets_empty_remove_marker() {
        let diff = diff_trees(&tree(json!({})), &tree(json!({"debug": {"verbose": true}})));
        assert_eq!(diff.remove, tree(json!({"debug": {}})));
    }

    #[test]
    fn test_arrays_compare_as_opaque_leaves() {
        let diff = diff_trees(&tree(json!({"list": [1, 2, 3]})), &tree(json!({"list": [1, 2]})));
        assert_eq!(diff.overwrite, tree(json!({"list": [1, 2, 3]})));
    }
}
