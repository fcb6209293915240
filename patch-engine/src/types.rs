//! Core types for the patch engine.
//!
//! A config document is modelled as a tree with two node kinds:
//! - **Tree**: a JSON object, mapping keys to further nodes
//! - **Leaf**: any other JSON value (string, number, bool, null, array)
//!
//! Arrays are never looked into; they compare and travel as opaque leaves.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One parsed config document. Keys keep the order they were read in.
pub type ConfigTree = Map<String, Value>;

/// Whether a value is a nested tree (JSON object).
pub fn is_tree(value: &Value) -> bool {
    matches!(value, Value::Object(_))
}

/// Whether two values have the same structural kind: both trees or both leaves.
pub fn same_kind(a: &Value, b: &Value) -> bool {
    is_tree(a) == is_tree(b)
}

/// The key sequence leading from a document root to a leaf.
///
/// Kept as segments rather than a joined string so keys that themselves
/// contain dots survive the round trip back into a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeafPath(Vec<String>);

impl LeafPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `other` lies strictly below this path.
    pub fn is_ancestor_of(&self, other: &LeafPath) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    /// Dotted form used for display and for remembered dispositions.
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for LeafPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

/// How a differing leaf relates to the recorded history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Present on disk, absent from the baseline.
    Create,
    /// Present on both sides with different values.
    Overwrite,
    /// Present in the baseline, missing on disk.
    Remove,
}

impl Classification {
    /// Dispositions the operator may pick for this kind of leaf.
    ///
    /// Taking the other side of a REMOVE leaf has no meaningful payload for
    /// the remove bucket, so it is not offered.
    pub fn allowed(&self) -> &'static [Disposition] {
        match self {
            Classification::Create | Classification::Overwrite => &[
                Disposition::KeepOnDisk,
                Disposition::TakeOther,
                Disposition::Ignore,
            ],
            Classification::Remove => &[Disposition::KeepOnDisk, Disposition::Ignore],
        }
    }

    pub fn accepts(&self, disposition: Disposition) -> bool {
        self.allowed().contains(&disposition)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Create => "CREATE",
            Classification::Overwrite => "OVERWRITE",
            Classification::Remove => "REMOVE",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operator's answer for one classified leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// The on-disk side becomes the recorded intent.
    KeepOnDisk,
    /// The baseline side is re-asserted.
    TakeOther,
    /// The leaf contributes nothing.
    Ignore,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::KeepOnDisk => write!(f, "keep on-disk value"),
            Disposition::TakeOther => write!(f, "take patch value"),
            Disposition::Ignore => write!(f, "ignore"),
        }
    }
}

/// A single leaf that differs between the live config and its baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub path: LeafPath,
    pub classification: Classification,
    /// Live value; `None` for REMOVE leaves.
    pub on_disk: Option<Value>,
    /// Baseline value; `None` for CREATE leaves.
    pub baseline: Option<Value>,
}

impl Conflict {
    pub fn on_disk_display(&self) -> String {
        display_value(self.on_disk.as_ref())
    }

    pub fn baseline_display(&self) -> String {
        display_value(self.baseline.as_ref())
    }
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "<absent>".to_string(),
    }
}

/// The three disjoint difference trees produced by a diff or a resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeDiff {
    pub create_on_missing: ConfigTree,
    pub overwrite: ConfigTree,
    pub remove: ConfigTree,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.create_on_missing.is_empty() && self.overwrite.is_empty() && self.remove.is_empty()
    }
}
