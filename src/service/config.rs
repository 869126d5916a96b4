//! Configuration of the HTTP gateway, merged from defaults, an optional TOML
//! file and the environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::abe_policy::{DimensionBuilder, NamedPolicy};

/// Name of the configuration file looked up in the project directory.
pub const CONFIG_FILE_NAME: &str = "role-crypt.toml";

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Address the server listens on.
    pub bind_address: String,
    /// Answers cross-origin requests from any origin.
    pub cors_allow_all: bool,
    /// Bearer token of the administration routes, which are only served
    /// when it is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
    /// Attribute names keys can be issued for, with their allowed values.
    pub namespace: Vec<DimensionBuilder>,
    /// Policies clients may encrypt under, by identifier.
    pub policies: Vec<NamedPolicy>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            cors_allow_all: true,
            admin_token: None,
            namespace: vec![DimensionBuilder::new(
                "role",
                vec!["admin", "teacher", "student"],
            )],
            policies: vec![
                NamedPolicy::new("1", "(role:admin) or (role:teacher) or (role:student)"),
                NamedPolicy::new("2", "(role:teacher) or (role:student)"),
            ],
        }
    }
}

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    config_file: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    #[must_use]
    pub fn new() -> Self {
        Self {
            project_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            env_prefix: "ROLE_CRYPT".to_string(),
        }
    }

    /// Set the directory where `role-crypt.toml` is looked up
    #[must_use]
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Use the given configuration file, which must exist, instead of
    /// `role-crypt.toml`
    #[must_use]
    pub fn with_config_file(mut self, file: impl AsRef<Path>) -> Self {
        self.config_file = Some(file.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable prefix (default: "ROLE_CRYPT")
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<ServiceConfig> {
        let mut builder = config::Config::builder();

        // 1. Built-in defaults
        builder = builder.add_source(config::Config::try_from(&ServiceConfig::default())?);

        // 2. Configuration file
        if let Some(config_file) = self.config_file {
            if !config_file.exists() {
                anyhow::bail!("configuration file {} not found", config_file.display());
            }
            builder = builder.add_source(
                config::File::from(config_file)
                    .required(true)
                    .format(config::FileFormat::Toml),
            );
        } else {
            let project_config_file = self.project_dir.join(CONFIG_FILE_NAME);
            if project_config_file.exists() {
                builder = builder.add_source(
                    config::File::from(project_config_file)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        // 3. Environment variables (ROLE_CRYPT_*, `__` between nested keys)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
