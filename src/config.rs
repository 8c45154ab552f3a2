//! Configuration management for the schema resolver
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (proto-schemas.toml)
//! - Environment variables (PROTO_SCHEMAS__*)
//!
//! ## Example config file (proto-schemas.toml):
//! ```toml
//! [resolver]
//! max_depth = 128
//! strict_pick = false
//!
//! [loader]
//! skip_prefixes = ["target/", ".git/", "node_modules/"]
//! extension = "json"
//!
//! [output]
//! format = "pretty"
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::loader::LoaderConfig;
use crate::resolver::ResolverConfig;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Resolver tunables
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Protocol loading
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
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

impl OutputFormat {
    /// Render a value as JSON in this format
    pub fn render<T: Serialize>(&self, value: &T) -> serde_json::Result<String> {
        match self {
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
            OutputFormat::Compact => serde_json::to_string(value),
        }
    }
}

const CONFIG_NAME: &str = "proto-schemas";

impl Settings {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering `config_path` over the default locations
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = [
            format!("{CONFIG_NAME}.toml"),
            format!(".{CONFIG_NAME}.toml"),
            format!("config/{CONFIG_NAME}.toml"),
        ];
        for location in config_locations {
            builder = builder.add_source(File::from(Path::new(&location)).required(false));
        }

        // XDG config directory
        if let Some(dirs) = directories::ProjectDirs::from("dev", "familiar", CONFIG_NAME) {
            let xdg_config = dirs.config_dir().join(format!("{CONFIG_NAME}.toml"));
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // PROTO_SCHEMAS__RESOLVER__MAX_DEPTH=64
        builder = builder.add_source(
            Environment::with_prefix("PROTO_SCHEMAS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("loader.skip_prefixes"),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let settings = Settings::default();
        assert_eq!(settings.resolver.max_depth, 128);
        assert!(!settings.resolver.strict_pick);
        assert_eq!(settings.loader.extension, "json");
        assert_eq!(settings.output.format, OutputFormat::Pretty);
    }

    #[test]
    fn test_serialize_config() {
        let toml_str = toml::to_string_pretty(&Settings::default()).unwrap();
        assert!(toml_str.contains("[resolver]"));
        assert!(toml_str.contains("[loader]"));
        assert!(toml_str.contains("[output]"));
    }

    #[test]
    fn test_save_then_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");

        let mut settings = Settings::default();
        settings.resolver.strict_pick = true;
        settings.resolver.max_depth = 32;
        settings.output.format = OutputFormat::Compact;
        settings.save(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.resolver, settings.resolver);
        assert_eq!(loaded.output.format, OutputFormat::Compact);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[output]\nformat = \"compact\"\n").unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.output.format, OutputFormat::Compact);
        assert_eq!(loaded.resolver, ResolverConfig::default());
        assert_eq!(loaded.loader, LoaderConfig::default());
    }

    #[test]
    fn test_missing_explicit_path_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Settings::load_from(Some(&dir.path().join("absent.toml"))),
            Err(SchemaError::Config(_))
        ));
    }

    #[test]
    fn test_save_into_missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no/such/dir/settings.toml");
        assert!(matches!(Settings::default().save(&path), Err(SchemaError::Io(_))));
    }

    #[test]
    fn test_output_format_render() {
        let value = serde_json::json!({ "a": 1 });
        assert_eq!(OutputFormat::Compact.render(&value).unwrap(), r#"{"a":1}"#);
        assert!(OutputFormat::Pretty.render(&value).unwrap().contains('\n'));
    }
}
