// Shared command plumbing: vault resolution, API settings, runtime.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use vectorlink_engine::config::{ApiSettings, GlobalConfig};
use vectorlink_engine::security;

#[derive(Debug, Clone, Args)]
pub struct VaultArgs {
    /// Vault root (defaults to `vault_root` from the global config, then the
    /// current directory).
    #[arg(long, value_name = "PATH")]
    pub vault: Option<PathBuf>,
}

impl VaultArgs {
    pub fn resolve(&self, global: &GlobalConfig) -> anyhow::Result<PathBuf> {
        let root = match (&self.vault, &global.vault_root) {
            (Some(path), _) => path.clone(),
            (None, Some(path)) => path.clone(),
            (None, None) => std::env::current_dir().context("failed to read current directory")?,
        };
        check_vault_root(&root)?;
        Ok(root)
    }
}

fn check_vault_root(root: &Path) -> anyhow::Result<()> {
    let metadata = std::fs::metadata(root)
        .with_context(|| format!("vault `{}` is not accessible", root.display()))?;
    if !metadata.is_dir() {
        anyhow::bail!("vault `{}` is not a directory", root.display());
    }
    Ok(())
}

/// API settings from the global config plus the key from env/keychain.
pub fn api_settings(global: &GlobalConfig) -> anyhow::Result<ApiSettings> {
    let api_key = security::resolve_api_key()?;
    Ok(ApiSettings::resolve(global, api_key)?)
}

pub fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_vault_wins() {
        let explicit = TempDir::new().unwrap();
        let configured = TempDir::new().unwrap();
        let args = VaultArgs { vault: Some(explicit.path().to_path_buf()) };
        let global = GlobalConfig {
            vault_root: Some(configured.path().to_path_buf()),
            ..GlobalConfig::default()
        };
        assert_eq!(args.resolve(&global).unwrap(), explicit.path());
    }

    #[test]
    fn configured_vault_is_fallback() {
        let configured = TempDir::new().unwrap();
        let args = VaultArgs { vault: None };
        let global = GlobalConfig {
            vault_root: Some(configured.path().to_path_buf()),
            ..GlobalConfig::default()
        };
        assert_eq!(args.resolve(&global).unwrap(), configured.path());
    }

    #[test]
    fn missing_vault_is_error() {
        let dir = TempDir::new().unwrap();
        let args = VaultArgs { vault: Some(dir.path().join("missing")) };
        assert!(args.resolve(&GlobalConfig::default()).is_err());
    }

    #[test]
    fn block_on_runs_future() {
        assert_eq!(block_on(async { 41 + 1 }).unwrap(), 42);
    }
}
