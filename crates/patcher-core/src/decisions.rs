//! Remembered dispositions.
//!
//! When the operator resolves a leaf, the choice is kept together with the
//! live value it was made for. The next create run against the same
//! config-mod folder offers that choice as the default, as long as the live
//! value has not changed in between.

use patch_engine::{Conflict, Disposition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const FOLDER_NAME: &str = "create_configs";
const EXTENSION: &str = "cc";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub direction: Disposition,
    /// Live value the decision was made for; `null` for removed leaves.
    pub value: serde_json::Value,
}

/// Decisions per config file, per dotted leaf path.
#[derive(Debug, Default)]
pub struct DecisionMemory {
    path: Option<PathBuf>,
    decisions: BTreeMap<String, BTreeMap<String, Decision>>,
}

impl DecisionMemory {
    /// Memory that is never persisted.
    pub fn ephemeral() -> Self {
        Self::default()
    }

    pub fn file_for(data_dir: &Path, folder_name: &str) -> PathBuf {
        data_dir
            .join(FOLDER_NAME)
            .join(format!("{}.{}", folder_name, EXTENSION))
    }

    /// Load the memory for one config-mod folder. A missing file starts an
    /// empty memory; an unreadable one does too, with a warning.
    pub fn load(data_dir: &Path, folder_name: &str) -> Self {
        let path = Self::file_for(data_dir, folder_name);
        let decisions = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Ignoring unreadable decision file {}",
                        path.display()
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Could not read decision file {}, starting empty",
                    path.display()
                );
                BTreeMap::new()
            }
        };
        Self {
            path: Some(path),
            decisions,
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string(&self.decisions)?)?;
        Ok(())
    }

    /// The remembered disposition for this leaf, if it still applies.
    pub fn default_for(&self, file: &str, conflict: &Conflict) -> Option<Disposition> {
        let decision = self.decisions.get(file)?.get(&conflict.path.dotted())?;
        let current = conflict.on_disk.clone().unwrap_or(serde_json::Value::Null);
        (decision.value == current && conflict.classification.accepts(decision.direction))
            .then_some(decision.direction)
    }

    pub fn record(&mut self, file: &str, conflict: &Conflict, direction: Disposition) {
        self.decisions.entry(file.to_string()).or_default().insert(
            conflict.path.dotted(),
            Decision {
                direction,
                value: conflict.on_disk.clone().unwrap_or(serde_json::Value::Null),
            },
        );
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patch_engine::{Classification, LeafPath};
    use serde_json::json;
    use tempfile::TempDir;

    fn conflict(value: serde_json::Value) -> Conflict {
        Conflict {
            path: LeafPath::default().child("audio").child("volume"),
            classification: Classification::Overwrite,
            on_disk: Some(value),
            baseline: Some(json!(5)),
        }
    }

    #[test]
    fn test_default_requires_same_live_value() {
        let mut memory = DecisionMemory::ephemeral();
        memory.record("ModA/config.json", &conflict(json!(9)), Disposition::TakeOther);

        assert_eq!(
            memory.default_for("ModA/config.json", &conflict(json!(9))),
            Some(Disposition::TakeOther)
        );
        assert_eq!(memory.default_for("ModA/config.json", &conflict(json!(8))), None);
        assert_eq!(memory.default_for("ModB/config.json", &conflict(json!(9))), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut memory = DecisionMemory::load(dir.path(), "Config - Main");
        assert!(memory.is_empty());
        memory.record("ModA/config.json", &conflict(json!(9)), Disposition::Ignore);
        memory.save().unwrap();

        let file = DecisionMemory::file_for(dir.path(), "Config - Main");
        assert!(file.ends_with("create_configs/Config - Main.cc"));

        let reloaded = DecisionMemory::load(dir.path(), "Config - Main");
        assert_eq!(
            reloaded.default_for("ModA/config.json", &conflict(json!(9))),
            Some(Disposition::Ignore)
        );
    }

    #[test]
    fn test_unreadable_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let file = DecisionMemory::file_for(dir.path(), "Config - Main");
        // A directory in place of the file fails to read as text
        std::fs::create_dir_all(&file).unwrap();
        assert!(DecisionMemory::load(dir.path(), "Config - Main").is_empty());

        let other = DecisionMemory::file_for(dir.path(), "Config - Alt");
        std::fs::write(&other, "not json").unwrap();
        assert!(DecisionMemory::load(dir.path(), "Config - Alt").is_empty());
    }

    #[test]
    fn test_remembered_choice_not_offered_if_classification_rejects_it() {
        let mut memory = DecisionMemory::ephemeral();
        let removed = Conflict {
            path: LeafPath::default().child("debug"),
            classification: Classification::Remove,
            on_disk: None,
            baseline: Some(json!(true)),
        };
        memory.record("ModA/config.json", &removed, Disposition::TakeOther);
        assert_eq!(memory.default_for("ModA/config.json", &removed), None);
    }
}
