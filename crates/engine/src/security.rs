// Owner-only file permissions and API key storage.
//
// API keys never live in config files: they come from the environment or
// the OS keychain.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

const KEYRING_SERVICE: &str = "com.vectorlink.engine";
const API_KEY_ACCOUNT: &str = "api_key";

/// Environment variables consulted before the keychain, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["VECTORLINK_API_KEY", "OPENAI_API_KEY"];

pub fn ensure_owner_only_file(path: &Path) -> Result<()> {
    set_mode_if_needed(path, 0o600)
}

pub fn ensure_owner_only_dir(path: &Path) -> Result<()> {
    set_mode_if_needed(path, 0o700)
}

#[cfg(unix)]
fn set_mode_if_needed(path: &Path, wanted: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if !path.exists() {
        return Ok(());
    }

    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to read metadata for `{}`", path.display()))?;
    let mode = metadata.permissions().mode() & 0o777;
    if mode != wanted {
        fs::set_permissions(path, fs::Permissions::from_mode(wanted))
            .with_context(|| format!("failed to set owner-only mode on `{}`", path.display()))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_mode_if_needed(path: &Path, wanted: u32) -> Result<()> {
    let _ = (path, wanted);
    Ok(())
}

// ── API key ─────────────────────────────────────────────────────────

/// Resolve the API key from the environment, falling back to the keychain.
pub fn resolve_api_key() -> Result<Option<String>> {
    resolve_api_key_with(|name| std::env::var(name).ok(), &KeyringSecretStore)
}

pub fn store_api_key(value: &str) -> Result<()> {
    set_secret_with_store(&KeyringSecretStore, value)
}

pub fn delete_api_key() -> Result<()> {
    KeyringSecretStore
        .delete_secret(KEYRING_SERVICE, API_KEY_ACCOUNT)
        .context("failed to clear `api_key` from keychain")
}

fn resolve_api_key_with(
    env: impl Fn(&str) -> Option<String>,
    store: &dyn SecretStore,
) -> Result<Option<String>> {
    for name in API_KEY_ENV_VARS {
        if let Some(value) = env(name).filter(|v| !v.trim().is_empty()) {
            return Ok(Some(value));
        }
    }
    store
        .get_secret(KEYRING_SERVICE, API_KEY_ACCOUNT)
        .context("failed to read `api_key` from keychain")
}

trait SecretStore: Send + Sync {
    fn set_secret(&self, service: &str, account: &str, value: &str) -> Result<()>;
    fn get_secret(&self, service: &str, account: &str) -> Result<Option<String>>;
    fn delete_secret(&self, service: &str, account: &str) -> Result<()>;
}

struct KeyringSecretStore;

impl SecretStore for KeyringSecretStore {
    fn set_secret(&self, service: &str, account: &str, value: &str) -> Result<()> {
        let entry = keyring::Entry::new(service, account)
            .context("failed to initialize keychain entry")?;
        entry.set_password(value).context("failed to write keychain entry")?;
        Ok(())
    }

    fn get_secret(&self, service: &str, account: &str) -> Result<Option<String>> {
        let entry = keyring::Entry::new(service, account)
            .context("failed to initialize keychain entry")?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(error).context("failed to read keychain entry"),
        }
    }

    fn delete_secret(&self, service: &str, account: &str) -> Result<()> {
        let entry = keyring::Entry::new(service, account)
            .context("failed to initialize keychain entry")?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(error).context("failed to delete keychain entry"),
        }
    }
}

fn set_secret_with_store(store: &dyn SecretStore, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("api key must not be empty");
    }
    store
        .set_secret(KEYRING_SERVICE, API_KEY_ACCOUNT, value)
        .context("failed to persist `api_key` in keychain")
}
