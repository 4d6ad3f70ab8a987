//! Generation settings, read from an optional YAML/JSON file and overridden by flags.

use anyhow::{Context, Result};
use clap::ValueEnum;
use convert_case::{Case, Casing};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::document::Info;
use crate::inspector::AccessorTable;

/// How field identifiers become property names when no rename applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum NamingStrategy {
    /// `user_id` -> `userId`
    #[default]
    #[serde(rename = "camelcase", alias = "camelCase")]
    #[value(name = "camelcase")]
    CamelCase,
    /// `user_id` stays `user_id`
    #[serde(rename = "snakecase", alias = "snake_case")]
    #[value(name = "snakecase")]
    SnakeCase,
    /// `user_id` -> `UserId`
    #[serde(rename = "pascalcase", alias = "PascalCase")]
    #[value(name = "pascalcase")]
    PascalCase,
}

impl NamingStrategy {
    pub fn apply(&self, field: &str) -> String {
        match self {
            NamingStrategy::CamelCase => field.to_case(Case::Camel),
            NamingStrategy::SnakeCase => field.to_case(Case::Snake),
            NamingStrategy::PascalCase => field.to_case(Case::Pascal),
        }
    }
}

/// Document info values that take precedence over general API annotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoOverrides {
    pub title: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub host: Option<String>,
    pub base_path: Option<String>,
}

impl InfoOverrides {
    /// Writes every set value into the document info, host and base path.
    pub fn apply(&self, info: &mut Info, host: &mut Option<String>, base_path: &mut Option<String>) {
        if let Some(title) = &self.title {
            info.title = title.clone();
        }
        if let Some(version) = &self.version {
            info.version = version.clone();
        }
        if let Some(description) = &self.description {
            info.description = Some(description.clone());
        }
        if let Some(value) = &self.host {
            *host = Some(value.clone());
        }
        if let Some(value) = &self.base_path {
            *base_path = Some(value.clone());
        }
    }
}

/// Settings for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub naming_strategy: NamingStrategy,
    /// Route mismatches and duplicate routes become errors instead of warnings
    pub strict: bool,
    /// Index types declared in dependency sources
    pub parse_dependency: bool,
    /// Collection format applied to array query parameters without their own
    pub collection_format_in_query: Option<String>,
    /// Skip operations whose types cannot be resolved instead of aborting
    pub keep_going: bool,
    pub info: InfoOverrides,
    /// Directory searched for `@Description.markdown` files
    pub markdown_dir: Option<PathBuf>,
    /// Replaces the default accessor table
    pub accessors: Option<AccessorTable>,
}

impl Config {
    /// Loads a config file; the format follows the extension (`.json` or YAML).
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        let config = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON config: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML config: {}", path.display()))?
        };
        Ok(config)
    }

    /// The accessor table in effect for this run.
    pub fn accessor_table(&self) -> AccessorTable {
        self.accessors.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// Helper function to create a temporary file with content
    fn create_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let file_path = dir.path().join(name);
        let mut file = fs::File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path
    }

    #[test]
    fn test_naming_strategies() {
        assert_eq!(NamingStrategy::CamelCase.apply("user_id"), "userId");
        assert_eq!(NamingStrategy::SnakeCase.apply("user_id"), "user_id");
        assert_eq!(NamingStrategy::PascalCase.apply("user_id"), "UserId");
        assert_eq!(NamingStrategy::CamelCase.apply("id"), "id");
    }

    #[test]
    fn test_load_yaml_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_file(
            &temp_dir,
            "swagger.yaml",
            r#"
naming_strategy: snakecase
strict: true
collection_format_in_query: multi
info:
  title: Pets
  version: "2.0"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.naming_strategy, NamingStrategy::SnakeCase);
        assert!(config.strict);
        assert!(!config.keep_going);
        assert_eq!(config.collection_format_in_query.as_deref(), Some("multi"));
        assert_eq!(config.info.title.as_deref(), Some("Pets"));
        assert_eq!(config.info.version.as_deref(), Some("2.0"));
    }

    #[test]
    fn test_load_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_file(
            &temp_dir,
            "swagger.json",
            r#"{"naming_strategy": "pascalcase", "keep_going": true}"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.naming_strategy, NamingStrategy::PascalCase);
        assert!(config.keep_going);
        assert!(config.accessors.is_none());
    }

    #[test]
    fn test_invalid_config_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_file(&temp_dir, "bad.yaml", "strict: [not, a, bool]");

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("bad.yaml"));
    }

    #[test]
    fn test_info_overrides() {
        let overrides = InfoOverrides {
            title: Some("Override".to_string()),
            host: Some("api.example.com".to_string()),
            ..Default::default()
        };
        let mut info = Info::default();
        let mut host = None;
        let mut base_path = Some("/v1".to_string());
        overrides.apply(&mut info, &mut host, &mut base_path);
        assert_eq!(info.title, "Override");
        assert_eq!(host.as_deref(), Some("api.example.com"));
        assert_eq!(base_path.as_deref(), Some("/v1"));
    }
}
