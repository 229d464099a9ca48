//! Configuration management
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. A TOML file: an explicit path, else `WFSCRIPT_CONFIG_PATH`, else
//!    `wfscript.toml` in the working directory when present
//! 3. `WFSCRIPT__SECTION__KEY` environment variables (`.env` files are
//!    loaded first)
//!
//! A built [`Config`] is never mutated; share it behind an `Arc`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::ide::{CompletionOptions, FormatOptions};

const CONFIG_PATH_VAR: &str = "WFSCRIPT_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "wfscript.toml";
const ENV_PREFIX: &str = "WFSCRIPT";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub workspace: WorkspaceConfig,
    pub completion: CompletionConfig,
    pub formatter: FormatOptions,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Reserved name of the generated-type document in every context
    pub generated_document_name: String,
    /// Upper bound on one generated-type provider call
    pub provider_timeout_ms: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            generated_document_name: "GeneratedTypes".to_string(),
            provider_timeout_ms: 5_000,
        }
    }
}

impl WorkspaceConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub max_items: usize,
    pub include_keywords: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        let defaults = CompletionOptions::default();
        Self {
            max_items: defaults.max_items,
            include_keywords: defaults.include_keywords,
        }
    }
}

impl From<&CompletionConfig> for CompletionOptions {
    fn from(config: &CompletionConfig) -> Self {
        CompletionOptions {
            max_items: config.max_items,
            include_keywords: config.include_keywords,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from the default sources
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    use_env: Option<bool>,
}

impl ConfigBuilder {
    /// Explicit config file; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Read `.env` and `WFSCRIPT__*` variables (default true)
    pub fn use_env(mut self, use_env: bool) -> Self {
        self.use_env = Some(use_env);
        self
    }

    pub fn build(self) -> Result<Config> {
        let use_env = self.use_env.unwrap_or(true);
        if use_env {
            // A missing .env file is fine
            let _ = dotenvy::dotenv();
        }

        let explicit = self.config_path.or_else(|| {
            if use_env {
                std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from)
            } else {
                None
            }
        });

        let mut builder = config::Config::builder();
        builder = match &explicit {
            Some(path) => builder.add_source(File::from(path.as_path()).format(FileFormat::Toml).required(true)),
            None => builder.add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false)),
        };
        if use_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: Config = builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .with_context(|| match &explicit {
                Some(path) => format!("Failed to load configuration from {}", path.display()),
                None => "Failed to load configuration".to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }
}

impl Config {
    fn validate(&self) -> Result<()> {
        if self.workspace.generated_document_name.trim().is_empty() {
            anyhow::bail!("workspace.generated_document_name must not be empty");
        }
        if self.workspace.provider_timeout_ms == 0 {
            anyhow::bail!("workspace.provider_timeout_ms must be greater than zero");
        }
        if self.formatter.indent_size == 0 || self.formatter.indent_size > 16 {
            anyhow::bail!("formatter.indent_size must be between 1 and 16");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("wfscript-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).expect("create temp config");
        file.write_all(contents.as_bytes()).expect("write temp config");
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.workspace.generated_document_name, "GeneratedTypes");
        assert_eq!(config.workspace.provider_timeout(), Duration::from_secs(5));
        assert_eq!(config.completion.max_items, 200);
        assert!(config.completion.include_keywords);
        assert_eq!(config.formatter.indent_size, 4);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = write_temp(
            "[completion]\nmax_items = 25\n\n[formatter]\nindent_size = 2\n",
        );
        let config = Config::builder()
            .config_path(Some(path.clone()))
            .use_env(false)
            .build()
            .expect("config loads");
        std::fs::remove_file(path).ok();

        assert_eq!(config.completion.max_items, 25);
        assert_eq!(config.formatter.indent_size, 2);
        // untouched sections keep their defaults
        assert_eq!(config.workspace.generated_document_name, "GeneratedTypes");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Config::builder()
            .config_path(Some(PathBuf::from("/nonexistent/wfscript.toml")))
            .use_env(false)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let path = write_temp("[formatter]\nindent_size = 0\n");
        let result = Config::builder()
            .config_path(Some(path.clone()))
            .use_env(false)
            .build();
        std::fs::remove_file(path).ok();

        let message = format!("{:#}", result.expect_err("invalid indent"));
        assert!(message.contains("indent_size"));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let text = config.to_toml().expect("serializes");
        assert!(text.contains("[workspace]"));
        assert!(text.contains("generated_document_name = \"GeneratedTypes\""));

        let parsed: Config = toml::from_str(&text).expect("parses back");
        assert_eq!(parsed, config);
    }
}
