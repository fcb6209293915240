mod prompt;

use clap::{Parser, Subcommand};
use patcher_core::config::{validate_game_dir, validate_staging_dir, Settings};
use patcher_core::logging::init_logging;
use patcher_core::{CreateOutcome, DecisionMemory, Patcher};
use prompt::{DialoguerFolderPicker, DialoguerResolver};
use regex::Regex;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "config-patcher",
    about = "Versioned patches for mod config files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the data directory (settings, logs, remembered choices)
    #[arg(long, default_value = ".config-patcher")]
    data_dir: PathBuf,

    /// Exit right away instead of waiting for Enter
    #[arg(long)]
    close: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run interactive setup wizard
    Setup,
    /// Show settings, known versions and pending versions
    Status,
    /// Create a new patch version from a config mod folder
    Create {
        /// Config mod folder to read; skips the folder picker
        #[arg(long)]
        folder: Option<PathBuf>,
    },
    /// Apply all pending versions to a config mod folder
    Apply {
        /// Config mod folder to patch; skips the folder picker
        #[arg(long)]
        folder: Option<PathBuf>,
    },
}

fn settings_path(cli: &Cli) -> PathBuf {
    Settings::path_in(&cli.data_dir)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(&cli.data_dir.join("logs"))?;

    let result = match &cli.command {
        Commands::Setup => cmd_setup(&cli).map(|_| ()),
        Commands::Status => cmd_status(&cli),
        Commands::Create { folder } => cmd_create(&cli, folder.as_deref()),
        Commands::Apply { folder } => cmd_apply(&cli, folder.as_deref()),
    };

    if let Err(e) = &result {
        tracing::error!(error = %format!("{:#}", e), "Command failed");
    }

    if !cli.close {
        println!();
        println!("Press Enter to exit...");
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
    }

    result
}

/// Load the settings, running the wizard first if there are none yet.
fn load_patcher(cli: &Cli) -> anyhow::Result<Patcher> {
    let path = settings_path(cli);
    let settings = if path.exists() {
        Settings::load(&path)?
    } else {
        println!("No settings found at {}.", path.display());
        cmd_setup(cli)?
    };
    Ok(Patcher::new(&cli.data_dir, settings))
}

fn pick_folder(patcher: &Patcher, folder: Option<&Path>) -> anyhow::Result<PathBuf> {
    match folder {
        Some(f) => Ok(f.to_path_buf()),
        None => patcher.select_folder(&mut DialoguerFolderPicker),
    }
}

fn cmd_setup(cli: &Cli) -> anyhow::Result<Settings> {
    std::fs::create_dir_all(&cli.data_dir)?;
    let path = settings_path(cli);
    let existing = Settings::load(&path).ok();

    println!();
    println!("Config Patcher - Setup Wizard");
    println!("=============================");
    println!();

    let game_default = existing
        .as_ref()
        .map(|s| s.game_dir.display().to_string())
        .unwrap_or_default();
    let game_dir: String = dialoguer::Input::new()
        .with_prompt("Full path to the Stardew Valley folder")
        .with_initial_text(game_default)
        .validate_with(|input: &String| -> Result<(), String> {
            match validate_game_dir(Path::new(input.trim())).into_iter().next() {
                Some(problem) => Err(problem),
                None => Ok(()),
            }
        })
        .interact_text()?;

    let staging_default = existing
        .as_ref()
        .map(|s| s.staging_dir.display().to_string())
        .unwrap_or_default();
    let staging_dir: String = dialoguer::Input::new()
        .with_prompt("Full path to the Vortex staging folder")
        .with_initial_text(staging_default)
        .validate_with(|input: &String| -> Result<(), String> {
            match validate_staging_dir(Path::new(input.trim())).into_iter().next() {
                Some(problem) => Err(problem),
                None => Ok(()),
            }
        })
        .interact_text()?;
    let staging_dir = PathBuf::from(staging_dir.trim());

    let regex_default = existing
        .as_ref()
        .map(|s| s.config_mod_regex.as_str().to_string())
        .unwrap_or_default();
    let config_mod_regex = loop {
        println!();
        let pattern: String = dialoguer::Input::new()
            .with_prompt("Regex matching config mod folders in the staging folder")
            .with_initial_text(regex_default.clone())
            .validate_with(|input: &String| -> Result<(), String> {
                Regex::new(input).map(|_| ()).map_err(|e| e.to_string())
            })
            .interact_text()?;
        let regex = Regex::new(&pattern)?;

        let matches =
            patcher_core::scan::find_config_mod_folders(&staging_dir, &regex).unwrap_or_default();
        println!("Matching folders:");
        if matches.is_empty() {
            println!("  (none)");
        }
        for m in &matches {
            if let Some(name) = m.file_name() {
                println!("  {}", name.to_string_lossy());
            }
        }

        if dialoguer::Confirm::new()
            .with_prompt("Use this regex?")
            .default(true)
            .interact()?
        {
            break regex;
        }
    };

    let mut settings = Settings::new(
        PathBuf::from(game_dir.trim()),
        staging_dir,
        config_mod_regex,
    );
    settings.patch_version = existing.and_then(|s| s.patch_version);
    settings.save(&path)?;
    tracing::info!(path = %path.display(), "Settings saved");

    println!();
    println!("Configuration saved to {}", path.display());
    println!();

    Ok(settings)
}

fn cmd_status(cli: &Cli) -> anyhow::Result<()> {
    println!("Config Patcher Status");
    println!("=====================");
    println!();

    let path = settings_path(cli);
    let settings = match Settings::load(&path) {
        Ok(s) => s,
        Err(e) => {
            println!("Configuration: Not usable ({})", e);
            println!("  Run 'config-patcher setup' to configure");
            return Ok(());
        }
    };

    println!("Configuration: {}", path.display());
    println!("  Game folder: {}", settings.game_dir.display());
    println!("  Staging folder: {}", settings.staging_dir.display());
    println!("  Config mod regex: {}", settings.config_mod_regex.as_str());
    match settings.patch_version {
        Some(v) => println!("  Last applied version: {}", v),
        None => println!("  Last applied version: none"),
    }

    let patcher = Patcher::new(&cli.data_dir, settings);
    let store = patcher.store();
    println!();
    println!("Patches: {}", store.dir.display());
    let chain = store.load()?;
    let versions: Vec<String> = chain.versions().map(|v| v.to_string()).collect();
    if versions.is_empty() {
        println!("  Versions: none");
    } else {
        println!("  Versions: {}", versions.join(", "));
    }
    match patcher.pending_count() {
        Ok(n) => println!("  Pending: {}", n),
        Err(e) => println!("  Pending: unknown ({})", e),
    }

    println!();
    println!("Config mod folders:");
    for folder in patcher.candidate_folders() {
        println!("  {}", folder.display());
    }

    Ok(())
}

fn cmd_create(cli: &Cli, folder: Option<&Path>) -> anyhow::Result<()> {
    let patcher = load_patcher(cli)?;
    let folder = pick_folder(&patcher, folder)?;
    if !folder.is_dir() {
        anyhow::bail!("{} is not a directory", folder.display());
    }

    let folder_name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let memory = if folder_name.is_empty() {
        DecisionMemory::ephemeral()
    } else {
        DecisionMemory::load(patcher.data_dir(), &folder_name)
    };
    let mut resolver = DialoguerResolver::new(memory);

    tracing::info!(folder = %folder.display(), "Create started");
    let outcome = patcher.create(&folder, &mut resolver)?;
    resolver.memory.save()?;

    println!();
    match outcome {
        CreateOutcome::NothingChanged => {
            println!("Nothing to patch, no new version written.");
        }
        CreateOutcome::Created {
            version,
            path,
            files,
        } => {
            println!("Created version {} at {}", version, path.display());
            for file in files {
                println!("  {}", file);
            }
        }
    }
    Ok(())
}

fn cmd_apply(cli: &Cli, folder: Option<&Path>) -> anyhow::Result<()> {
    let mut patcher = load_patcher(cli)?;
    let folder = pick_folder(&patcher, folder)?;

    tracing::info!(folder = %folder.display(), "Apply started");
    let outcome = patcher.apply(&folder)?;

    println!();
    if outcome.applied.is_empty() {
        println!("Already up to date.");
        return Ok(());
    }
    if let Some(backup) = &outcome.backup {
        println!("Backup written to {}", backup.display());
    }
    let applied: Vec<String> = outcome.applied.iter().map(|v| v.to_string()).collect();
    println!("Applied versions: {}", applied.join(", "));
    Ok(())
}
