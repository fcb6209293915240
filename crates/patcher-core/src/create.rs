use anyhow::Context;
use patch_engine::{diff_trees, resolve_patch, ConfigTree, PatchSet, Resolver};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::scan::{key_to_path, relative_key, scan_configs};
use crate::store::PatchStore;

/// What a create run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// No file differs from its baseline in a way the operator kept.
    NothingChanged,
    Created {
        version: u32,
        path: PathBuf,
        files: Vec<String>,
    },
}

/// Read a config document. A missing file is `None`; anything that is not a
/// JSON object is an error.
pub fn read_config(path: &Path) -> anyhow::Result<Option<ConfigTree>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let content = content.trim_start_matches('\u{feff}');
    let tree: ConfigTree = serde_json::from_str(content)
        .with_context(|| format!("{} is not a JSON object", path.display()))?;
    Ok(Some(tree))
}

/// Build the next patch version from the live configs under `configs_root`.
///
/// History is folded into one baseline per config path. Every config found on
/// disk, and every path history knows about, is compared against its
/// baseline; the resolver decides each differing leaf. If nothing remains the
/// store is left untouched.
pub fn create_patch<R: Resolver + ?Sized>(
    configs_root: &Path,
    store: &PatchStore,
    resolver: &mut R,
) -> anyhow::Result<CreateOutcome> {
    let chain = store.load()?;
    let version = chain.next_version()?;
    let baselines = chain.baselines()?;

    tracing::info!(
        root = %configs_root.display(),
        version,
        known = baselines.len(),
        "Creating patch"
    );

    let mut files: BTreeSet<String> = baselines.keys().cloned().collect();
    for path in scan_configs(configs_root) {
        if let Some(key) = relative_key(configs_root, &path) {
            files.insert(key);
        }
    }

    let empty = ConfigTree::new();
    let mut set = PatchSet::new();

    for file in &files {
        let path = key_to_path(configs_root, file);
        let Some(on_disk) = read_config(&path)? else {
            tracing::debug!(file = %file, "Config not on disk, nothing to compare");
            continue;
        };
        let baseline = baselines.get(file).unwrap_or(&empty);

        if diff_trees(&on_disk, baseline).is_empty() {
            tracing::debug!(file = %file, "Config matches its baseline");
            continue;
        }

        if let Some(patch) = resolve_patch(file, &on_disk, baseline, &mut *resolver)? {
            // The new version must fold onto history or every later run fails
            patch
                .apply(baseline.clone())
                .with_context(|| format!("New patch for {} does not fit its baseline", file))?;
            tracing::info!(file = %file, "Config patched");
            set.insert(file.clone(), patch);
        }
    }

    if set.is_empty() {
        tracing::info!("Nothing to patch");
        return Ok(CreateOutcome::NothingChanged);
    }

    let files: Vec<String> = set.keys().cloned().collect();
    let path = store.append(version, &set)?;
    Ok(CreateOutcome::Created {
        version,
        path,
        files,
    })
}
