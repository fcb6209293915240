use patch_engine::Resolver;
use std::path::{Path, PathBuf};

use crate::apply::{apply_patches, ApplyOutcome};
use crate::config::Settings;
use crate::create::{create_patch, CreateOutcome};
use crate::scan::find_config_mod_folders;
use crate::store::PatchStore;

/// Name of the scratch folder used when no config mod folder is chosen.
pub const TEMP_FOLDER_NAME: &str = "temp";

/// Trait for the surface that lets the operator pick the folder to work on.
pub trait FolderPicker {
    /// Return one of `candidates`, or `None` to use the scratch folder.
    fn choose_output_folder(&mut self, candidates: &[PathBuf]) -> anyhow::Result<Option<PathBuf>>;
}

/// Settings, data directory and patch store bundled for one run.
pub struct Patcher {
    data_dir: PathBuf,
    settings_path: PathBuf,
    pub settings: Settings,
}

impl Patcher {
    pub fn new(data_dir: impl AsRef<Path>, settings: Settings) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        Self {
            settings_path: Settings::path_in(&data_dir),
            data_dir,
            settings,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub fn store(&self) -> PatchStore {
        PatchStore::new(self.settings.patches_dir())
    }

    pub fn temp_folder(&self) -> PathBuf {
        self.data_dir.join(TEMP_FOLDER_NAME)
    }

    /// Config mod folders in the staging folder, sorted by path.
    pub fn candidate_folders(&self) -> Vec<PathBuf> {
        match find_config_mod_folders(&self.settings.staging_dir, &self.settings.config_mod_regex) {
            Ok(folders) => folders,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Could not list staging folder {}",
                    self.settings.staging_dir.display()
                );
                Vec::new()
            }
        }
    }

    /// Ask the picker for a folder, falling back to the scratch folder.
    pub fn select_folder<P: FolderPicker + ?Sized>(&self, picker: &mut P) -> anyhow::Result<PathBuf> {
        let candidates = self.candidate_folders();
        if let Some(folder) = picker.choose_output_folder(&candidates)? {
            return Ok(folder);
        }
        let temp = self.temp_folder();
        std::fs::create_dir_all(&temp)?;
        tracing::info!(folder = %temp.display(), "Using temporary folder");
        Ok(temp)
    }

    pub fn create<R: Resolver + ?Sized>(
        &self,
        configs_root: &Path,
        resolver: &mut R,
    ) -> anyhow::Result<CreateOutcome> {
        create_patch(configs_root, &self.store(), resolver)
    }

    /// Apply pending versions to `target`, then advance and save progress.
    ///
    /// Progress only moves once every pending version has been applied.
    pub fn apply(&mut self, target: &Path) -> anyhow::Result<ApplyOutcome> {
        let outcome = apply_patches(target, &self.store(), self.settings.patch_version)?;
        if outcome.version != self.settings.patch_version {
            self.settings.patch_version = outcome.version;
            self.save()?;
            tracing::info!(version = ?outcome.version, "Progress saved");
        }
        Ok(outcome)
    }

    /// Number of versions not yet applied, if the chain is consistent.
    pub fn pending_count(&self) -> anyhow::Result<usize> {
        let chain = self.store().load()?;
        Ok(chain.pending(self.settings.patch_version)?.len())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.settings.save(&self.settings_path)?;
        Ok(())
    }
}
