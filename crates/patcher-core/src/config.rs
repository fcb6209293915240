use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

/// Name of the settings file inside the data directory.
pub const SETTINGS_FILENAME: &str = "config_patcher.config.jsonc";

/// Folder under the game directory that holds the version units.
pub const PATCH_FOLDER_NAME: &str = "Patches";

/// File that must exist in the game folder.
pub const GAME_EXECUTABLE: &str = "Stardew Valley.exe";

/// Marker file the mod manager drops into its staging folder.
pub const STAGING_MARKER: &str = "__vortex_staging_folder";

/// Value of `game` expected inside the staging marker.
pub const STAGING_GAME_ID: &str = "stardewvalley";

const TEMPLATE: &str = r#"{
    // Full path to the Stardew Valley folder
    "stardew_valley": {stardew_valley},
    // Full path to the staging folder of Vortex
    "staging": {staging},
    // Regex pattern to match for config mods in the staging folder
    "config_mod_regex": {config_mod_regex},
    // DO NOT EDIT THIS VALUE
    // AS THIS TRACKS THE CURRENT PATCH VERSION
    "patch_version": {patch_version}
}
"#;

static LINE_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*//.*$").expect("line comment pattern is valid")
});
static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)/\*.*?\*/").expect("block comment pattern is valid")
});

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write settings file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Invalid config mod regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("patch_version must be -1 or a non-negative version, got {0}")]
    InvalidVersion(i64),
}

/// Settings as they appear in the file.
#[derive(Debug, Deserialize)]
struct RawSettings {
    stardew_valley: PathBuf,
    staging: PathBuf,
    config_mod_regex: String,
    patch_version: i64,
}

/// Operator settings plus the apply progress.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Game folder; patches live in `<game_dir>/Patches`.
    pub game_dir: PathBuf,
    /// Mod manager staging folder holding the config mod folders.
    pub staging_dir: PathBuf,
    /// Selects config mod folders by name inside the staging folder.
    pub config_mod_regex: Regex,
    /// Highest version already applied, `None` if nothing was applied yet.
    pub patch_version: Option<u32>,
}

impl Settings {
    pub fn new(game_dir: PathBuf, staging_dir: PathBuf, config_mod_regex: Regex) -> Self {
        Self {
            game_dir,
            staging_dir,
            config_mod_regex,
            patch_version: None,
        }
    }

    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join(SETTINGS_FILENAME)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        let stripped = strip_comments(content);
        let raw: RawSettings = serde_json::from_str(&stripped)?;

        let config_mod_regex =
            Regex::new(&raw.config_mod_regex).map_err(|source| SettingsError::InvalidRegex {
                pattern: raw.config_mod_regex.clone(),
                source,
            })?;

        let patch_version = match raw.patch_version {
            -1 => None,
            v => Some(u32::try_from(v).map_err(|_| SettingsError::InvalidVersion(v))?),
        };

        Ok(Self {
            game_dir: raw.stardew_valley,
            staging_dir: raw.staging,
            config_mod_regex,
            patch_version,
        })
    }

    /// Render the settings file, comments included.
    pub fn render(&self) -> String {
        let version = self.patch_version.map_or(-1, i64::from);
        TEMPLATE
            .replace("{stardew_valley}", &json_string(&self.game_dir.to_string_lossy()))
            .replace("{staging}", &json_string(&self.staging_dir.to_string_lossy()))
            .replace("{config_mod_regex}", &json_string(self.config_mod_regex.as_str()))
            .replace("{patch_version}", &version.to_string())
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::WriteFile {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, self.render()).map_err(write_err)?;
        Ok(())
    }

    pub fn patches_dir(&self) -> PathBuf {
        self.game_dir.join(PATCH_FOLDER_NAME)
    }
}

/// JSON string literal; backslashes and quotes come out escaped.
fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Drop whole-line `//` comments and `/* */` blocks.
///
/// Trailing `//` after a value is left alone so paths and URLs inside strings
/// survive.
pub fn strip_comments(content: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(content, "");
    LINE_COMMENT.replace_all(&without_blocks, "").into_owned()
}

/// Problems with the game folder, empty if it looks right.
pub fn validate_game_dir(path: &Path) -> Vec<String> {
    if !path.is_dir() {
        return vec![format!("{} is not a directory.", path.display())];
    }
    if !path.join(GAME_EXECUTABLE).is_file() {
        return vec![format!(
            "{} does not contain the game executable ({}).",
            path.display(),
            GAME_EXECUTABLE
        )];
    }
    Vec::new()
}

/// Problems with the staging folder, empty if it looks right.
pub fn validate_staging_dir(path: &Path) -> Vec<String> {
    if !path.is_dir() {
        return vec![format!("{} is not a directory.", path.display())];
    }

    let marker = path.join(STAGING_MARKER);
    let content = match std::fs::read_to_string(&marker) {
        Ok(c) => c,
        Err(_) => {
            return vec![format!(
                "{} does not contain '{}'.",
                path.display(),
                STAGING_MARKER
            )];
        }
    };

    match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(serde_json::Value::Object(map)) => {
            let game = map.get("game").and_then(|g| g.as_str()).unwrap_or_default();
            if game == STAGING_GAME_ID {
                Vec::new()
            } else {
                vec![format!(
                    "{}'s {} names '{}' as the game, expected {}.",
                    path.display(),
                    STAGING_MARKER,
                    game,
                    STAGING_GAME_ID
                )]
            }
        }
        _ => vec![format!(
            "{}'s {} is not a JSON dictionary.",
            path.display(),
            STAGING_MARKER
        )],
    }
}
