//! Settings discovery, loading and serialization.

use super::BuildSettings;
use crate::error::ConfigError;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit settings file
pub const CONFIG_ENV_VAR: &str = "DIST_FORGE_CONFIG";

/// Settings file names probed in the current directory
const LOCAL_CANDIDATES: [&str; 2] = ["dist-forge.json", "dist-forge.toml"];

/// Get the global settings path: ~/.config/dist-forge/settings.json
pub fn get_global_settings_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::ValidationFailed("Cannot determine home directory".to_string())
    })?;

    Ok(home.join(".config/dist-forge").join("settings.json"))
}

/// Find the settings file to use, if any.
///
/// Order: `$DIST_FORGE_CONFIG`, `./dist-forge.json`, `./dist-forge.toml`,
/// `~/.config/dist-forge/settings.json`.
pub fn discover_settings_file() -> Result<Option<PathBuf>, ConfigError> {
    let explicit = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    let global = get_global_settings_path().ok();
    discover_settings_file_in(explicit, Path::new("."), global)
}

/// Discovery over explicit inputs: the env var value, the directory probed
/// for local candidates, and the global settings path.
pub fn discover_settings_file_in(
    explicit: Option<PathBuf>,
    local_dir: &Path,
    global: Option<PathBuf>,
) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(format!(
                "{} points to missing file: {}",
                CONFIG_ENV_VAR,
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    if let Some(local) = LOCAL_CANDIDATES
        .iter()
        .map(|name| local_dir.join(name))
        .find(|p| p.is_file())
    {
        return Ok(Some(local));
    }

    Ok(global.filter(|p| p.is_file()))
}

/// Load settings from the discovered file, or defaults when there is none.
///
/// Also returns the file the settings came from, so the caller can report it
/// once logging is up.
pub fn load_settings() -> Result<(BuildSettings, Option<PathBuf>), ConfigError> {
    let source = discover_settings_file()?;
    let settings = match source {
        Some(ref path) => load_settings_from_file(path)?,
        None => BuildSettings::default(),
    };
    validate_settings(&settings)?;
    Ok((settings, source))
}

/// Load settings from a JSON or TOML file.
pub fn load_settings_from_file(path: &Path) -> Result<BuildSettings, ConfigError> {
    let format = validate_config_path(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(format!(
                "Configuration file not found at: {}",
                path.display()
            ))
        } else {
            ConfigError::IoError(e)
        }
    })?;

    let settings: BuildSettings = match format {
        SettingsFormat::Json => serde_json::from_str(&content)?,
        SettingsFormat::Toml => toml::from_str(&content)?,
    };

    Ok(settings)
}

/// Save settings as pretty JSON.
pub fn save_settings_to_file(settings: &BuildSettings, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json_content = serde_json::to_string_pretty(settings)?;
    fs::write(path, json_content)?;

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingsFormat {
    Json,
    Toml,
}

/// Validate settings path (.json or .toml extension required).
fn validate_config_path(path: &Path) -> Result<SettingsFormat, ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Configuration path cannot be empty".to_string(),
        ));
    }

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(SettingsFormat::Json),
        Some("toml") => Ok(SettingsFormat::Toml),
        Some(ext) => Err(ConfigError::ValidationFailed(format!(
            "Configuration file must have .json or .toml extension, got .{}",
            ext
        ))),
        None => Err(ConfigError::ValidationFailed(
            "Configuration file must have .json or .toml extension".to_string(),
        )),
    }
}

/// Reject settings that cannot produce a meaningful run.
pub fn validate_settings(settings: &BuildSettings) -> Result<(), ConfigError> {
    if settings.toolchain_program.trim().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "toolchain_program cannot be empty".to_string(),
        ));
    }

    if settings.version_key.trim().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "version_key cannot be empty".to_string(),
        ));
    }

    for (name, path) in [
        ("metadata_file", &settings.metadata_file),
        ("output_root", &settings.output_root),
        ("dist_dir", &settings.dist_dir),
        ("log_dir", &settings.log_dir),
    ] {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(format!(
                "{} cannot be empty",
                name
            )));
        }
    }

    if settings.runtimes.is_empty() {
        return Err(ConfigError::ValidationFailed(
            "At least one runtime identifier is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = settings.runtimes.iter().find(|rid| !seen.insert(**rid)) {
        return Err(ConfigError::ValidationFailed(format!(
            "Runtime identifier listed twice: {}",
            dup
        )));
    }

    Ok(())
}
