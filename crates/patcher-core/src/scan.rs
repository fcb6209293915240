use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name that marks a mod's config document.
pub const CONFIG_FILENAME: &str = "config.json";

/// Find every config document under `root`.
///
/// Once a directory holds a `config.json` its subdirectories are not
/// searched; a mod keeps at most one config.
pub fn scan_configs(root: &Path) -> Vec<PathBuf> {
    let mut configs = Vec::new();
    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable path during config scan");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let candidate = entry.path().join(CONFIG_FILENAME);
        if candidate.is_file() {
            configs.push(candidate);
            walker.skip_current_dir();
        }
    }

    configs
}

/// Config path relative to `root`, with `/` separators on every platform.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Whether `key` stays inside the folder it is resolved against.
///
/// Rejects absolute keys, `.`/`..` segments and drive or stream prefixes.
pub fn is_contained_key(key: &str) -> bool {
    if key.starts_with(['/', '\\']) {
        return false;
    }
    let mut parts = key.split(['/', '\\']).filter(|part| !part.is_empty()).peekable();
    parts.peek().is_some() && parts.all(|part| part != "." && part != ".." && !part.contains(':'))
}

/// Resolve a relative key back to a path under `root`.
pub fn key_to_path(root: &Path, key: &str) -> PathBuf {
    key.split(['/', '\\'])
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

/// Directories directly inside `staging` whose name matches `pattern`.
pub fn find_config_mod_folders(staging: &Path, pattern: &Regex) -> std::io::Result<Vec<PathBuf>> {
    let mut folders = Vec::new();
    for entry in std::fs::read_dir(staging)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if pattern.is_match(&name) && entry.path().is_dir() {
            folders.push(entry.path());
        }
    }
    folders.sort();
    Ok(folders)
}
