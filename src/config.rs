//! Configuration management.
//!
//! [`Settings`] is the resolved runtime configuration. [`Config`] is what a
//! config file can set; it is discovered with `prefer` and parsed with serde.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::auth::{Identity, IdentityConfig, TokenRegistry};
use crate::extraction::ExtractionConfig;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "receiptscan.db";

/// Blob store subdirectory name.
const BLOBS_SUBDIR: &str = "blobs";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Root of the local blob store.
    pub blobs_dir: PathBuf,
    /// Base for public image URLs. `None` means the `file://` URL of `blobs_dir`.
    pub public_base_url: Option<String>,
    /// Extraction client settings.
    pub extraction: ExtractionConfig,
    /// Identity used by CLI commands.
    pub identity: IdentityConfig,
    /// Server-side bearer token table.
    pub tokens: HashMap<String, Identity>,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("receiptscan");

        Self {
            blobs_dir: data_dir.join(BLOBS_SUBDIR),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            public_base_url: None,
            extraction: ExtractionConfig::default(),
            identity: IdentityConfig::default().with_env_overrides(),
            tokens: HashMap::new(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            blobs_dir: data_dir.join(BLOBS_SUBDIR),
            data_dir,
            ..Default::default()
        }
    }

    /// Full path to the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    pub fn database_url(&self) -> String {
        format!("sqlite:{}", self.database_path().display())
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Base URL prepended to blob paths.
    pub fn public_base_url(&self) -> String {
        if let Some(ref url) = self.public_base_url {
            return url.clone();
        }
        let absolute = if self.blobs_dir.is_absolute() {
            self.blobs_dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("/"))
                .join(&self.blobs_dir)
        };
        match url::Url::from_directory_path(&absolute) {
            Ok(url) => url.to_string().trim_end_matches('/').to_string(),
            Err(()) => format!("file://{}", absolute.display()),
        }
    }

    /// Token table for the callable endpoint.
    pub fn token_registry(&self) -> TokenRegistry {
        TokenRegistry::new(self.tokens.clone())
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })?;
        fs::create_dir_all(&self.blobs_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create blobs directory '{}': {}",
                    self.blobs_dir.display(),
                    e
                ),
            )
        })?;
        Ok(())
    }
}

/// A token table entry in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub user_id: String,
    #[serde(default)]
    pub email: String,
}

/// Configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory. Relative paths resolve against the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Blob store directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blobs_dir: Option<String>,

    /// Base URL for stored image links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,

    #[serde(default, skip_serializing_if = "ExtractionConfig::is_default")]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    /// Bearer token to identity mapping for `serve`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tokens: HashMap<String, TokenEntry>,

    /// Path the config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover and load a `receiptscan` config file from the standard
    /// locations. Falls back to defaults when none is found.
    pub async fn load() -> Self {
        match prefer::load("receiptscan").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("{}", e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(_) => Self::default_with_env(),
        }
    }

    pub fn default_with_env() -> Self {
        Self {
            identity: IdentityConfig::default().with_env_overrides(),
            ..Default::default()
        }
    }

    /// Load configuration from a specific file. TOML for `.toml`, JSON otherwise.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        config.extraction = config.extraction.with_env_overrides();
        config.identity = config.identity.with_env_overrides();
        Ok(config)
    }

    /// Directory of the config file, if loaded from one.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.blobs_dir = settings.data_dir.join(BLOBS_SUBDIR);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref blobs_dir) = self.blobs_dir {
            settings.blobs_dir = self.resolve_path(blobs_dir, base_dir);
        }
        if let Some(ref url) = self.public_base_url {
            settings.public_base_url = Some(url.clone());
        }
        settings.extraction = self.extraction.clone();

        let identity = &self.identity;
        if identity.token.is_some() {
            settings.identity.token = identity.token.clone();
        }
        if identity.user_id.is_some() {
            settings.identity.user_id = identity.user_id.clone();
        }
        if identity.email.is_some() {
            settings.identity.email = identity.email.clone();
        }

        for (token, entry) in &self.tokens {
            settings.tokens.insert(
                token.clone(),
                Identity::new(entry.user_id.clone(), entry.email.clone()),
            );
        }
    }
}

/// Resolve `Settings` from the CLI overrides and whatever config is found.
///
/// Priority for the config file: `--config`, then a `receiptscan.toml` or
/// `receiptscan.json` inside `--data-dir`, then `prefer` discovery.
pub async fn load_settings(
    data_dir_override: Option<&Path>,
    config_path: Option<&Path>,
) -> (Settings, Config) {
    let config = load_file_config(data_dir_override, config_path).await;

    let mut settings = Settings::default();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = config.base_dir().unwrap_or_else(|| cwd.clone());
    config.apply_to_settings(&mut settings, &base_dir);

    // --data-dir beats the config file for data_dir and blobs_dir
    if let Some(data_dir) = data_dir_override {
        settings.data_dir = if data_dir.is_absolute() {
            data_dir.to_path_buf()
        } else {
            cwd.join(data_dir)
        };
        settings.blobs_dir = settings.data_dir.join(BLOBS_SUBDIR);
    }

    (settings, config)
}

async fn load_file_config(data_dir: Option<&Path>, config_path: Option<&Path>) -> Config {
    if let Some(path) = config_path {
        return match Config::load_from_path(path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}", e);
                Config::default_with_env()
            }
        };
    }

    if let Some(dir) = data_dir {
        for name in ["receiptscan.toml", "receiptscan.json"] {
            let candidate = dir.join(name);
            if candidate.is_file() {
                tracing::debug!("Found config in data dir: {}", candidate.display());
                if let Ok(config) = Config::load_from_path(&candidate).await {
                    return config;
                }
            }
        }
    }

    Config::load().await
}
