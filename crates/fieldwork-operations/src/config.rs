use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;
use crate::error::OperationError;

pub const DEFAULT_CONFIG_FILE: &str = "fieldwork.toml";
pub const TOKEN_ENV_VAR: &str = "FIELDWORK_TOKEN";

/// Connection to the form service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub url: String,
    pub username: String,
    pub token: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "https://api.ona.io".to_string(),
            username: String::new(),
            token: None,
        }
    }
}

/// Account the scan form is shared with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub username: String,
    pub role: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            username: "agent".to_string(),
            role: "dataentry".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Where collects and their targets are persisted.
    pub data_dir: PathBuf,
    /// Where generated documents and exports are written.
    pub documents_dir: PathBuf,
}

impl StorageSettings {
    /// Where transition lock files live, next to the collects they guard.
    #[must_use]
    pub fn locks_dir(&self) -> PathBuf {
        self.data_dir.join("locks")
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            documents_dir: PathBuf::from("documents"),
        }
    }
}

/// XForm templates; the built-in ones are used when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormSettings {
    pub survey_template: Option<PathBuf>,
    pub scan_template: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub agent: AgentSettings,
    pub storage: StorageSettings,
    pub forms: FormSettings,
}

impl Settings {
    /// Parse settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::ConfigParse` if the text is not valid.
    pub fn from_toml(content: &str, origin: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|source| OperationError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load settings from `path`, falling back to defaults when the file
    /// does not exist, then apply the token override.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = if path.exists() {
            let content = fs::read_to_string(path).map_err(|source| OperationError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml(&content, path)?
        } else {
            Self::default()
        };
        settings.apply_token_override(std::env::var(TOKEN_ENV_VAR).ok());
        Ok(settings)
    }

    /// Replace the configured token with `token` when it is non-empty.
    pub fn apply_token_override(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.server.token = Some(token);
        }
    }

    /// # Errors
    ///
    /// Returns `OperationError::MissingToken` when no token is configured.
    pub fn token(&self) -> Result<&str> {
        self.server
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(OperationError::MissingToken)
    }
}
