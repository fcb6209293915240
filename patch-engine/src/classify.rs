//! Conflict classification and directional resolution.
//!
//! The live config and its baseline (the folded history for that file) are
//! both flattened to leaves. Every leaf that differs is classified, handed to
//! a [`Resolver`], and the answers are folded back into the three patch
//! buckets of a new [`Patch`].
//!
//! | live | baseline | equal | classification |
//! |------|----------|-------|----------------|
//! | yes  | no       |       | CREATE         |
//! | yes  | yes      | yes   | (skipped)      |
//! | yes  | yes      | no    | OVERWRITE      |
//! | no   | yes      |       | REMOVE         |

use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{EngineError, ResolveError};
use crate::patch::Patch;
use crate::types::{Classification, ConfigTree, Conflict, Disposition, LeafPath, TreeDiff};

/// The operator-facing side of conflict resolution.
///
/// Called once per classified leaf, in path order, for one config file at a
/// time. `file` is the config path relative to the configs root.
pub trait Resolver {
    fn resolve(&mut self, file: &str, conflict: &Conflict) -> Result<Disposition, ResolveError>;
}

impl<F> Resolver for F
where
    F: FnMut(&str, &Conflict) -> Result<Disposition, ResolveError>,
{
    fn resolve(&mut self, file: &str, conflict: &Conflict) -> Result<Disposition, ResolveError> {
        self(file, conflict)
    }
}

/// Flatten a tree to its leaves. Nested objects disappear; an empty object
/// contributes nothing.
pub fn flatten(tree: &ConfigTree) -> BTreeMap<LeafPath, &Value> {
    let mut leaves = BTreeMap::new();
    flatten_into(tree, &LeafPath::default(), &mut leaves);
    leaves
}

fn flatten_into<'a>(tree: &'a ConfigTree, at: &LeafPath, out: &mut BTreeMap<LeafPath, &'a Value>) {
    for (key, value) in tree {
        let path = at.child(key);
        match value {
            Value::Object(nested) => flatten_into(nested, &path, out),
            leaf => {
                out.insert(path, leaf);
            }
        }
    }
}

/// Write `value` at `path`, creating intermediate objects as needed.
pub fn insert_at(tree: &mut ConfigTree, path: &LeafPath, value: Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        return;
    };

    let mut node = tree;
    for segment in parents {
        let slot = node
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(ConfigTree::new()));
        if !slot.is_object() {
            *slot = Value::Object(ConfigTree::new());
        }
        let Value::Object(map) = slot else {
            return;
        };
        node = map;
    }
    node.insert(last.clone(), value);
}

/// Classify every differing leaf between the live config and its baseline.
pub fn classify(on_disk: &ConfigTree, baseline: &ConfigTree) -> Vec<Conflict> {
    let live = flatten(on_disk);
    let history = flatten(baseline);
    let mut conflicts = Vec::new();

    for (path, live_value) in &live {
        match history.get(path) {
            None => conflicts.push(Conflict {
                path: path.clone(),
                classification: Classification::Create,
                on_disk: Some((*live_value).clone()),
                baseline: None,
            }),
            Some(previous) if previous != live_value => conflicts.push(Conflict {
                path: path.clone(),
                classification: Classification::Overwrite,
                on_disk: Some((*live_value).clone()),
                baseline: Some((*previous).clone()),
            }),
            Some(_) => {}
        }
    }

    for (path, previous) in &history {
        if !live.contains_key(path) {
            conflicts.push(Conflict {
                path: path.clone(),
                classification: Classification::Remove,
                on_disk: None,
                baseline: Some((*previous).clone()),
            });
        }
    }

    conflicts.sort_by(|a, b| a.path.cmp(&b.path));
    conflicts
}

/// Fold one disposition into the outgoing buckets.
///
/// Taking the other side of a CREATE leaf has nothing to take and is a no-op.
/// Taking the other side of a REMOVE leaf is rejected.
pub fn fold_disposition(
    out: &mut TreeDiff,
    file: &str,
    conflict: &Conflict,
    disposition: Disposition,
) -> Result<(), EngineError> {
    match (conflict.classification, disposition) {
        (_, Disposition::Ignore) => {}
        (Classification::Create, Disposition::KeepOnDisk) => {
            if let Some(value) = &conflict.on_disk {
                insert_at(&mut out.create_on_missing, &conflict.path, value.clone());
            }
        }
        (Classification::Create, Disposition::TakeOther) => {}
        (Classification::Overwrite, Disposition::KeepOnDisk) => {
            if let Some(value) = &conflict.on_disk {
                insert_at(&mut out.overwrite, &conflict.path, value.clone());
            }
        }
        (Classification::Overwrite, Disposition::TakeOther) => {
            if let Some(value) = &conflict.baseline {
                insert_at(&mut out.overwrite, &conflict.path, value.clone());
            }
        }
        (Classification::Remove, Disposition::KeepOnDisk) => {
            insert_at(
                &mut out.remove,
                &conflict.path,
                Value::Object(ConfigTree::new()),
            );
        }
        (Classification::Remove, Disposition::TakeOther) => {
            return Err(EngineError::InvalidDisposition {
                file: file.to_string(),
                path: conflict.path.dotted(),
                classification: conflict.classification,
                disposition,
            });
        }
    }
    Ok(())
}

/// Whether a CREATE leaf sits where the baseline holds the other node kind:
/// below a baseline scalar, or in place of a baseline tree.
fn changes_kind(create: &LeafPath, conflicts: &[Conflict]) -> bool {
    conflicts.iter().any(|c| {
        c.classification == Classification::Remove
            && (c.path.is_ancestor_of(create) || create.is_ancestor_of(&c.path))
    })
}

/// Classify, ask the resolver about every leaf and build the resulting patch.
///
/// A kept CREATE leaf that changes the kind of a baseline node goes into the
/// overwrite bucket, since create-on-missing cannot replace a scalar with a
/// tree or the reverse. Kept REMOVE markers on the replaced node are then
/// dropped; the overwrite already replaces that node as a whole.
///
/// Returns `None` when nothing differs or every leaf was ignored.
pub fn resolve_patch<R: Resolver + ?Sized>(
    file: &str,
    on_disk: &ConfigTree,
    baseline: &ConfigTree,
    resolver: &mut R,
) -> Result<Option<Patch>, EngineError> {
    let conflicts = classify(on_disk, baseline);
    if conflicts.is_empty() {
        return Ok(None);
    }

    let mut decided = Vec::with_capacity(conflicts.len());
    for conflict in &conflicts {
        let disposition =
            resolver
                .resolve(file, conflict)
                .map_err(|source| EngineError::Resolver {
                    file: file.to_string(),
                    source,
                })?;
        decided.push((conflict, disposition));
    }

    let reshaped: Vec<&LeafPath> = decided
        .iter()
        .filter(|(c, d)| {
            c.classification == Classification::Create
                && *d == Disposition::KeepOnDisk
                && changes_kind(&c.path, &conflicts)
        })
        .map(|(c, _)| &c.path)
        .collect();

    let mut out = TreeDiff::default();
    for &(conflict, disposition) in &decided {
        if disposition == Disposition::KeepOnDisk {
            let related = |p: &&LeafPath| {
                p.is_ancestor_of(&conflict.path) || conflict.path.is_ancestor_of(p)
            };
            match conflict.classification {
                Classification::Create if reshaped.contains(&&conflict.path) => {
                    if let Some(value) = &conflict.on_disk {
                        insert_at(&mut out.overwrite, &conflict.path, value.clone());
                    }
                    continue;
                }
                Classification::Remove if reshaped.iter().any(related) => continue,
                _ => {}
            }
        }
        fold_disposition(&mut out, file, conflict, disposition)?;
    }

    if out.is_empty() {
        return Ok(None);
    }
    Ok(Some(out.into()))
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

    fn always(d: Disposition) -> impl FnMut(&str, &Conflict) -> Result<Disposition, ResolveError> {
        move |_: &str, _: &Conflict| Ok(d)
    }

    #[test]
    fn test_flatten_drops_nested_nodes() {
        let t = tree(json!({"a": {"b": 1, "c": {"d": [1]}}, "e": {}}));
        let flat = flatten(&t);
        let keys: Vec<String> = flat.keys().map(|p| p.dotted()).collect();
        assert_eq!(keys, vec!["a.b", "a.c.d"]);
    }

    #[test]
    fn test_insert_at_keeps_dotted_keys_intact() {
        let mut t = ConfigTree::new();
        let path = LeafPath::new(vec!["mod.id".to_string(), "enabled".to_string()]);
        insert_at(&mut t, &path, json!(true));
        assert_eq!(t, tree(json!({"mod.id": {"enabled": true}})));
    }

    #[test]
    fn test_classification_table() {
        let live = tree(json!({"new": 1, "same": 2, "changed": 3}));
        let baseline = tree(json!({"same": 2, "changed": 4, "gone": 5}));
        let conflicts = classify(&live, &baseline);
        let summary: Vec<(String, Classification)> = conflicts
            .iter()
            .map(|c| (c.path.dotted(), c.classification))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("changed".to_string(), Classification::Overwrite),
                ("gone".to_string(), Classification::Remove),
                ("new".to_string(), Classification::Create),
            ]
        );
    }

    #[test]
    fn test_create_keep_on_disk_writes_create_on_missing() {
        let patch = resolve_patch(
            "Mod/config.json",
            &tree(json!({"volume": 5})),
            &tree(json!({})),
            &mut always(Disposition::KeepOnDisk),
        )
        .unwrap()
        .unwrap();
        assert_eq!(patch.create_on_missing(), &tree(json!({"volume": 5})));
        assert!(patch.overwrite().is_empty());
        assert!(patch.remove().is_empty());
    }

    #[test]
    fn test_create_take_other_is_noop() {
        let patch = resolve_patch(
            "Mod/config.json",
            &tree(json!({"volume": 5})),
            &tree(json!({})),
            &mut always(Disposition::TakeOther),
        )
        .unwrap();
        assert!(patch.is_none());
    }

    #[test]
    fn test_overwrite_take_other_reasserts_baseline() {
        let patch = resolve_patch(
            "Mod/config.json",
            &tree(json!({"volume": 9})),
            &tree(json!({"volume": 5})),
            &mut always(Disposition::TakeOther),
        )
        .unwrap()
        .unwrap();
        assert_eq!(patch.overwrite(), &tree(json!({"volume": 5})));
    }

    #[test]
    fn test_overwrite_keep_on_disk_forces_live_value() {
        let patch = resolve_patch(
            "Mod/config.json",
            &tree(json!({"audio": {"volume": 9}})),
            &tree(json!({"audio": {"volume": 5}})),
            &mut always(Disposition::KeepOnDisk),
        )
        .unwrap()
        .unwrap();
        assert_eq!(patch.overwrite(), &tree(json!({"audio": {"volume": 9}})));
    }

    #[test]
    fn test_remove_keep_on_disk_writes_empty_marker() {
        let patch = resolve_patch(
            "Mod/config.json",
            &tree(json!({})),
            &tree(json!({"debug": true})),
            &mut always(Disposition::KeepOnDisk),
        )
        .unwrap()
        .unwrap();
        assert_eq!(patch.remove(), &tree(json!({"debug": {}})));
    }

    #[test]
    fn test_remove_take_other_is_rejected() {
        let err = resolve_patch(
            "Mod/config.json",
            &tree(json!({})),
            &tree(json!({"debug": true})),
            &mut always(Disposition::TakeOther),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidDisposition {
                classification: Classification::Remove,
                disposition: Disposition::TakeOther,
                ..
            }
        ));
    }

    #[test]
    fn test_ignore_everything_produces_no_patch() {
        let patch = resolve_patch(
            "Mod/config.json",
            &tree(json!({"a": 1, "b": 2})),
            &tree(json!({"b": 3, "c": 4})),
            &mut always(Disposition::Ignore),
        )
        .unwrap();
        assert!(patch.is_none());
    }

    #[test]
    fn test_resolver_sees_each_leaf_once_in_order() {
        let mut seen = Vec::new();
        let mut resolver = |file: &str, conflict: &Conflict| -> Result<Disposition, ResolveError> {
            seen.push(format!("{file}:{}", conflict.path));
            Ok(Disposition::Ignore)
        };
        resolve_patch(
            "M/config.json",
            &tree(json!({"z": 1, "a": {"b": 2}})),
            &tree(json!({"a": {"b": 3}, "m": 0})),
            &mut resolver,
        )
        .unwrap();
        assert_eq!(seen, vec!["M/config.json:a.b", "M/config.json:m", "M/config.json:z"]);
    }

    #[test]
    fn test_scalar_to_tree_goes_through_overwrite() {
        let live = tree(json!({"keys": {"up": "W", "down": "S"}, "volume": 5}));
        let baseline = tree(json!({"keys": "WASD", "volume": 5}));
        let patch = resolve_patch("M/config.json", &live, &baseline, &mut always(Disposition::KeepOnDisk))
            .unwrap()
            .unwrap();

        assert!(patch.create_on_missing().is_empty());
        assert!(patch.remove().is_empty());
        assert_eq!(patch.overwrite(), &tree(json!({"keys": {"up": "W", "down": "S"}})));
        assert_eq!(patch.apply(baseline).unwrap(), live);
    }

    #[test]
    fn test_tree_to_scalar_goes_through_overwrite() {
        let live = tree(json!({"keys": "WASD"}));
        let baseline = tree(json!({"keys": {"up": "W", "down": "S"}}));
        let patch = resolve_patch("M/config.json", &live, &baseline, &mut always(Disposition::KeepOnDisk))
            .unwrap()
            .unwrap();

        assert!(patch.remove().is_empty());
        assert_eq!(patch.overwrite(), &tree(json!({"keys": "WASD"})));
        assert_eq!(patch.apply(baseline).unwrap(), live);
    }

    #[test]
    fn test_kind_change_with_new_side_ignored_keeps_removal() {
        let mut resolver = |_: &str, c: &Conflict| -> Result<Disposition, ResolveError> {
            Ok(match c.classification {
                Classification::Create => Disposition::Ignore,
                _ => Disposition::KeepOnDisk,
            })
        };
        let patch = resolve_patch(
            "M/config.json",
            &tree(json!({"keys": {"up": "W"}})),
            &tree(json!({"keys": "WASD"})),
            &mut resolver,
        )
        .unwrap()
        .unwrap();
        assert_eq!(patch.remove(), &tree(json!({"keys": {}})));
        assert!(patch.overwrite().is_empty());
    }

    #[test]
    fn test_resolver_failure_is_wrapped() {
        let mut resolver = |_: &str, _: &Conflict| -> Result<Disposition, ResolveError> {
            Err("prompt closed".into())
        };
        let err = resolve_patch("M/config.json", &tree(json!({"a": 1})), &tree(json!({})), &mut resolver)
            .unwrap_err();
        assert!(matches!(err, EngineError::Resolver { .. }));
    }
}
