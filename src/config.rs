//! Configuration management for normalizr
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (normalizr.toml)
//! - Environment variables (NORMALIZR__*)
//!
//! ## Example config file (normalizr.toml):
//! ```toml
//! [definition]
//! default_id_attribute = "uuid"
//!
//! [normalize]
//! report_merge_conflicts = true
//!
//! [output]
//! format = "compact"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::normalize::NormalizeOptions;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizrConfig {
    /// Defaults applied while building definitions
    #[serde(default)]
    pub definition: DefinitionConfig,

    /// Normalize behavior
    #[serde(default)]
    pub normalize: NormalizeConfig,

    /// CLI output
    #[serde(default)]
    pub output: OutputConfig,
}

/// Definition defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionConfig {
    /// Id field for entities that do not name one
    #[serde(default = "default_id_attribute")]
    pub default_id_attribute: String,
}

/// Normalize settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Report merges that overwrite differing field values
    #[serde(default = "default_true")]
    pub report_merge_conflicts: bool,
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

// Default value functions
fn default_id_attribute() -> String {
    "id".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for DefinitionConfig {
    fn default() -> Self {
        Self {
            default_id_attribute: default_id_attribute(),
        }
    }
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            report_merge_conflicts: true,
        }
    }
}

impl NormalizrConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["normalizr.toml", ".normalizr.toml", "config/normalizr.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "normalizr") {
            let xdg_config = config_dir.config_dir().join("normalizr.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // NORMALIZR__NORMALIZE__REPORT_MERGE_CONFLICTS=false
        builder = builder.add_source(
            Environment::with_prefix("NORMALIZR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            report_merge_conflicts: self.normalize.report_merge_conflicts,
        }
    }

    /// Render `value` in the configured output format
    pub fn render(&self, value: &serde_json::Value) -> serde_json::Result<String> {
        match self.output.format {
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
            OutputFormat::Compact => serde_json::to_string(value),
        }
    }
}
