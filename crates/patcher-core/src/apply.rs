use anyhow::Context;
use patch_engine::{ConfigTree, Patch};
use std::path::{Path, PathBuf};

use crate::backup::backup_folder;
use crate::create::read_config;
use crate::scan::key_to_path;
use crate::store::PatchStore;

/// What an apply run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Versions applied, in order. Empty when already up to date.
    pub applied: Vec<u32>,
    /// Version the target is at now; `None` when the store is empty.
    pub version: Option<u32>,
    pub backup: Option<PathBuf>,
}

/// Apply one patch to the config file at `path`.
///
/// A missing file starts out as `{}`; parent folders are created.
pub fn apply_to_file(path: &Path, patch: &Patch) -> anyhow::Result<()> {
    let current = read_config(path)?.unwrap_or_else(ConfigTree::new);
    let patched = patch
        .apply(current)
        .with_context(|| format!("Patch does not fit {}", path.display()))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(&patched)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Bring the config-mod folder `target` from `last_applied` up to the newest
/// version in `store`.
///
/// The whole chain is checked before anything is written. The folder is
/// zipped first, then versions are applied strictly in order.
///
/// If a version fails halfway, files already written stay written and the
/// returned error leaves the caller's progress where it was. Re-running then
/// replays those versions on top of partly patched files; restore from the
/// backup archive first if that matters.
pub fn apply_patches(
    target: &Path,
    store: &PatchStore,
    last_applied: Option<u32>,
) -> anyhow::Result<ApplyOutcome> {
    let chain = store.load()?;
    let max = chain.ensure_contiguous()?;
    let pending = chain.pending(last_applied)?;

    if pending.is_empty() {
        tracing::info!(version = ?max, "Already up to date");
        return Ok(ApplyOutcome {
            applied: Vec::new(),
            version: max,
            backup: None,
        });
    }

    let backup = backup_folder(target)?;

    let mut applied = Vec::with_capacity(pending.len());
    for (version, set) in pending {
        tracing::info!(version, files = set.len(), "Patching with version");
        for (file, patch) in set {
            let path = key_to_path(target, file);
            apply_to_file(&path, patch)
                .with_context(|| format!("Version {} failed on {}", version, file))?;
        }
        tracing::info!(version, "Patching version complete");
        applied.push(version);
    }

    Ok(ApplyOutcome {
        applied,
        version: max,
        backup,
    })
}
