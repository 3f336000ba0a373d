// Local configuration files.
//
// Global config: `~/.vectorlink/config.toml`
// Vault config:  `<vault>/.vectorlink/vault.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::security::{ensure_owner_only_dir, ensure_owner_only_file};

/// Listing page size requested from the remote index.
pub const PAGE_SIZE: usize = 100;
/// Maximum number of hops walked when rebuilding a conversation.
pub const HISTORY_DEPTH: usize = 20;
/// Only records in this state take part in reconciliation.
pub const REMOTE_FILTER: &str = "completed";
/// Extension of the documents the index tracks.
pub const DOCUMENT_EXTENSION: &str = "md";

pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

const STATE_DIR: &str = ".vectorlink";

/// Root directory for global state: `~/.vectorlink/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(STATE_DIR))
}

/// Path to the global config file: `~/.vectorlink/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Per-vault state directory: `<vault>/.vectorlink/`. The scanner skips it.
pub fn vault_state_dir(vault_root: &Path) -> PathBuf {
    vault_root.join(STATE_DIR)
}

/// Path to the vault config file: `<vault>/.vectorlink/vault.toml`.
pub fn vault_config_path(vault_root: &Path) -> PathBuf {
    vault_state_dir(vault_root).join("vault.toml")
}

/// Path to the conversation store: `<vault>/.vectorlink/conversations.toml`.
pub fn conversations_path(vault_root: &Path) -> PathBuf {
    vault_state_dir(vault_root).join("conversations.toml")
}

/// Held while a sync runs: `<vault>/.vectorlink/sync.lock`.
pub fn sync_lock_path(vault_root: &Path) -> PathBuf {
    vault_state_dir(vault_root).join("sync.lock")
}

/// Held while the conversation store is edited:
/// `<vault>/.vectorlink/conversations.lock`.
pub fn conversations_lock_path(vault_root: &Path) -> PathBuf {
    vault_state_dir(vault_root).join("conversations.lock")
}

// ── Global config ──────────────────────────────────────────────────

/// Global configuration at `~/.vectorlink/config.toml`.
///
/// API keys are stored in the OS keychain or the environment, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Base URL of the index/responses API.
    pub api_base_url: String,
    /// Organization sent with every request, if any.
    pub organization_id: Option<String>,
    /// Project sent with every request, if any.
    pub project_id: Option<String>,
    /// Vault used when no `--vault` is given.
    pub vault_root: Option<PathBuf>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            organization_id: None,
            project_id: None,
            vault_root: None,
        }
    }
}

impl GlobalConfig {
    /// Load from `~/.vectorlink/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        read_toml(path)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = global_config_path().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ))
        })?;
        self.save_to(&path)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        write_toml(self, path)
    }
}

// ── Vault config ───────────────────────────────────────────────────

/// Per-vault configuration at `<vault>/.vectorlink/vault.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    /// Identifier of the remote index this vault syncs into.
    pub index_id: Option<String>,
}

impl VaultConfig {
    /// Load from `<vault>/.vectorlink/vault.toml`. Returns defaults if
    /// the file doesn't exist; a file that exists but does not parse is an
    /// error.
    pub fn load(vault_root: &Path) -> Result<Self, ConfigError> {
        match Self::load_from(&vault_config_path(vault_root)) {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        read_toml(path)
    }

    pub fn save(&self, vault_root: &Path) -> Result<(), ConfigError> {
        self.save_to(&vault_config_path(vault_root))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        write_toml(self, path)
    }

    /// The remote index id, or `MissingIndexId` when unset or blank.
    pub fn require_index_id(&self) -> Result<&str, ConfigError> {
        self.index_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingIndexId)
    }
}

// ── API settings ───────────────────────────────────────────────────

/// Everything an HTTP adapter needs to reach the remote API.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Url,
    pub api_key: String,
    pub organization_id: Option<String>,
    pub project_id: Option<String>,
}

impl ApiSettings {
    pub fn resolve(global: &GlobalConfig, api_key: Option<String>) -> Result<Self, ConfigError> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        let base_url = Url::parse(global.api_base_url.trim_end_matches('/'))
            .map_err(|e| ConfigError::InvalidBaseUrl(format!("{}: {e}", global.api_base_url)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl(format!(
                "{}: unsupported scheme",
                global.api_base_url
            )));
        }
        Ok(Self {
            base_url,
            api_key,
            organization_id: global.organization_id.clone(),
            project_id: global.project_id.clone(),
        })
    }
}

pub(crate) fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&contents).map_err(ConfigError::Parse)
}

pub(crate) fn write_toml<T: Serialize>(value: &T, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        ensure_owner_only_dir(parent)
            .map_err(|error| ConfigError::Io(std::io::Error::other(error.to_string())))?;
    }
    let contents = toml::to_string_pretty(value).map_err(ConfigError::Serialize)?;
    std::fs::write(path, contents).map_err(ConfigError::Io).and_then(|_| {
        ensure_owner_only_file(path)
            .map_err(|error| ConfigError::Io(std::io::Error::other(error.to_string())))
    })
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    MissingIndexId,
    MissingApiKey,
    InvalidBaseUrl(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
            Self::MissingIndexId => {
                write!(f, "remote index id is not set (add `index_id` to .vectorlink/vault.toml)")
            }
            Self::MissingApiKey => write!(
                f,
                "API key is not configured (set VECTORLINK_API_KEY or store it in the keychain)"
            ),
            Self::InvalidBaseUrl(detail) => write!(f, "invalid API base URL: {detail}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Serialize(e) => Some(e),
            _ => None,
        }
    }
}
