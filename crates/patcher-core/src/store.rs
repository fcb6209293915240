use anyhow::Context;
use patch_engine::{PatchChain, PatchSet};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

use crate::scan::is_contained_key;

static UNIT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[vV](\d+)\.patch$").expect("unit name pattern is valid"));

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Patch version {version} already exists at '{path}'")]
    VersionExists { version: u32, path: PathBuf },

    #[error("Patch version {version} is stored twice: '{first}' and '{second}'")]
    DuplicateVersion {
        version: u32,
        first: String,
        second: String,
    },
}

/// Directory of version units, one `v<N>.patch` file per version.
///
/// Each unit maps config paths (relative to the configs root) to a patch in
/// its three-string wire form.
pub struct PatchStore {
    pub dir: PathBuf,
}

impl PatchStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn unit_filename(version: u32) -> String {
        format!("v{}.patch", version)
    }

    pub fn unit_path(&self, version: u32) -> PathBuf {
        self.dir.join(Self::unit_filename(version))
    }

    /// Version embedded in a unit filename, if the name matches.
    pub fn parse_unit_name(name: &str) -> Option<u32> {
        UNIT_NAME
            .captures(name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Load every readable unit into a chain.
    ///
    /// Units that do not match the naming pattern, cannot be read, do not
    /// parse or name a config outside the configs root are logged and left
    /// out. Two units for the same version are fatal. A missing directory is
    /// an empty chain.
    pub fn load(&self) -> anyhow::Result<PatchChain> {
        let mut chain = PatchChain::new();
        if !self.dir.is_dir() {
            tracing::info!(dir = %self.dir.display(), "Patch folder does not exist yet");
            return Ok(chain);
        }

        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list patch folder {}", self.dir.display()))?;

        let mut units: BTreeMap<u32, String> = BTreeMap::new();
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read patch folder entry");
                    continue;
                }
            };
            let filename = entry.file_name().to_string_lossy().into_owned();

            let Some(version) = Self::parse_unit_name(&filename) else {
                tracing::warn!(
                    "Skipping {}: patch files must match v<version>.patch",
                    filename
                );
                continue;
            };

            if let Some(other) = units.get(&version) {
                let (first, second) = if *other < filename {
                    (other.clone(), filename)
                } else {
                    (filename, other.clone())
                };
                return Err(StoreError::DuplicateVersion {
                    version,
                    first,
                    second,
                }
                .into());
            }
            units.insert(version, filename);
        }

        for (version, filename) in units {
            match Self::read_unit(&self.dir.join(&filename)) {
                Ok(set) => {
                    chain.insert(version, set);
                }
                Err(e) => {
                    tracing::error!("Failed to load patch {}: {:#}", filename, e);
                }
            }
        }

        tracing::debug!(count = chain.len(), "Loaded patch versions");
        Ok(chain)
    }

    fn read_unit(path: &Path) -> anyhow::Result<PatchSet> {
        let content = fs::read_to_string(path)?;
        let set: PatchSet = serde_json::from_str(&content)?;
        if let Some(key) = set.keys().find(|key| !is_contained_key(key)) {
            anyhow::bail!("config path '{}' points outside the config folder", key);
        }
        Ok(set)
    }

    /// Write a new version. Existing versions are never overwritten.
    /// Uses tmp+rename for atomicity.
    pub fn append(&self, version: u32, set: &PatchSet) -> anyhow::Result<PathBuf> {
        let path = self.unit_path(version);
        if path.exists() {
            return Err(StoreError::VersionExists { version, path }.into());
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create patch folder {}", self.dir.display()))?;

        let content = serde_json::to_string(set)?;
        let tmp = self.dir.join(format!(".{}.tmp", Self::unit_filename(version)));
        fs::write(&tmp, &content)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move {} into place", path.display()))?;

        tracing::info!(version, files = set.len(), "Patch version written");
        Ok(path)
    }
}
