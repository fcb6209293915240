use patch_engine::{Conflict, Disposition, ResolveError, Resolver};
use patcher_core::{DecisionMemory, FolderPicker};
use std::path::PathBuf;

/// Asks the operator about every differing leaf.
pub struct DialoguerResolver {
    pub memory: DecisionMemory,
}

impl DialoguerResolver {
    pub fn new(memory: DecisionMemory) -> Self {
        Self { memory }
    }
}

impl Resolver for DialoguerResolver {
    fn resolve(&mut self, file: &str, conflict: &Conflict) -> Result<Disposition, ResolveError> {
        let allowed = conflict.classification.allowed();
        let default = self
            .memory
            .default_for(file, conflict)
            .unwrap_or(Disposition::KeepOnDisk);
        let default_idx = allowed.iter().position(|d| *d == default).unwrap_or(0);

        println!();
        println!("{} [{}]", file, conflict.classification);
        println!("  Key:     {}", conflict.path);
        println!("  On disk: {}", conflict.on_disk_display());
        println!("  Patch:   {}", conflict.baseline_display());

        let labels: Vec<String> = allowed.iter().map(|d| d.to_string()).collect();
        let idx = dialoguer::Select::new()
            .with_prompt("Which value goes into the patch?")
            .items(&labels)
            .default(default_idx)
            .interact()?;

        let choice = allowed[idx];
        tracing::debug!(file, path = %conflict.path, choice = %choice, "Leaf resolved");
        self.memory.record(file, conflict, choice);
        Ok(choice)
    }
}

/// Lets the operator pick one of the config mod folders.
pub struct DialoguerFolderPicker;

impl FolderPicker for DialoguerFolderPicker {
    fn choose_output_folder(&mut self, candidates: &[PathBuf]) -> anyhow::Result<Option<PathBuf>> {
        let mut items: Vec<String> = candidates
            .iter()
            .map(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| p.display().to_string())
            })
            .collect();
        items.push("Temporary folder".to_string());

        println!();
        let idx = dialoguer::Select::new()
            .with_prompt("Select the config mod folder")
            .items(&items)
            .default(0)
            .interact()?;

        Ok(candidates.get(idx).cloned())
    }
}
