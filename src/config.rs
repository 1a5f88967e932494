//! Configuration management

use log::{debug, warn};
use rupe_decoder::DecodeOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{AppError, AppResult};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Decoder strictness and addressing policy
    pub decode: DecodeOptions,
    /// What the dump prints
    pub display: DisplayConfig,
}

/// Display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub show_dos_header: bool,
    pub show_data_directories: bool,
    /// List directories whose address or size is zero
    pub show_empty_directories: bool,
    pub show_sections: bool,
    /// Print decoded characteristic flags under each section
    pub show_section_flags: bool,
    pub show_imports: bool,
    /// List each imported function, not just the DLL summary line
    pub show_import_functions: bool,
    /// Cap on functions listed per DLL (0 = no limit)
    pub max_functions_per_dll: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_dos_header: true,
            show_data_directories: true,
            show_empty_directories: false,
            show_sections: true,
            show_section_flags: true,
            show_imports: true,
            show_import_functions: true,
            max_functions_per_dll: 0,
        }
    }
}

/// Get the platform-specific config directory
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        // Linux: ~/.config/rupe
        dirs_next().map(|p| p.join("rupe"))
    }

    #[cfg(target_os = "macos")]
    {
        // macOS: ~/.config/rupe
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config/rupe"))
    }

    #[cfg(target_os = "windows")]
    {
        // Windows: %APPDATA%\rupe
        std::env::var("APPDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("rupe"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config/rupe"))
    }
}

#[cfg(target_os = "linux")]
fn dirs_next() -> Option<PathBuf> {
    // Check XDG_CONFIG_HOME first, then fall back to ~/.config
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
}

/// Get the config file path
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}

/// Default config file content with comments
pub fn default_config() -> String {
    String::from(
        r##"# rupe configuration

[decode]
# Fail when the file does not start with "MZ"
strict_signature = true

# Reject images declaring more sections than this
max_sections = 4096

# Read only as many data directories as the optional header declares
# (false = always read 16, zero-filled slots included)
honor_declared_directory_count = true

# How the import directory address is resolved:
#   "translated" - map the RVA through the section table
#   "direct"     - use the RVA as a raw file offset
import_addressing = "translated"

[display]
show_dos_header = true
show_data_directories = true
show_empty_directories = false
show_sections = true
show_section_flags = true
show_imports = true
show_import_functions = true

# Maximum functions listed per DLL (0 = all)
max_functions_per_dll = 0
"##,
    )
}

impl Config {
    /// Parse configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml_edit::de::from_str(content).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Load configuration from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        debug!("Loaded config from '{}'", path.display());
        Self::from_toml(&content)
    }

    /// Load configuration from the default location, falling back to defaults
    /// when it is missing or unreadable.
    pub fn load() -> Self {
        let Some(config_path) = config_file() else {
            warn!("Could not determine config directory");
            return Config::default();
        };

        if !config_path.exists() {
            debug!("No config at '{}', using defaults", config_path.display());
            return Config::default();
        }

        match Self::load_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}", e);
                warn!("Using default configuration");
                Config::default()
            }
        }
    }

    /// Write the commented default config to the default location unless a
    /// file is already there. Returns the path.
    pub fn init_default() -> AppResult<PathBuf> {
        let config_path = config_file()
            .ok_or_else(|| AppError::Config("could not determine config path".into()))?;

        if config_path.exists() {
            return Err(AppError::Config(format!(
                "'{}' already exists",
                config_path.display()
            )));
        }
        if let Some(dir) = config_path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&config_path, default_config())?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rupe_decoder::ImportAddressing;

    #[test]
    fn test_default_config_text_matches_defaults() {
        let parsed = Config::from_toml(&default_config()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let config = Config::from_toml(
            r#"
[decode]
import_addressing = "direct"

[display]
max_functions_per_dll = 20
"#,
        )
        .unwrap();
        assert_eq!(config.decode.import_addressing, ImportAddressing::Direct);
        assert!(config.decode.strict_signature);
        assert_eq!(config.decode.max_sections, 4096);
        assert_eq!(config.display.max_functions_per_dll, 20);
        assert!(config.display.show_imports);
    }

    #[test]
    fn test_empty_config() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_config() {
        let err = Config::from_toml("[decode]\nmax_sections = \"many\"\n").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_load_from_missing_path() {
        let path = std::env::temp_dir().join("rupe_no_such_config.toml");
        assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));
    }
}
