// Reconciliation engine: scan → list → plan → execute, one run at a time.
//
// Runs are serialized within a process by the gate and across processes by
// an optional lock file.

pub mod executor;
pub mod plan;
pub mod status;

#[cfg(test)]
mod fake;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::{sync_lock_path, ApiSettings, ConfigError, VaultConfig};
use crate::lock::{LockError, VaultLock, LOCK_POLL_INTERVAL};
use crate::remote::{list_all_completed, ApiClient, HttpIndexClient, RemoteError, RemoteIndexClient};
use crate::scanner::{LocalCollection, ScanError, VaultScanner};

pub use executor::{execute, SyncAction, SyncFailure, SyncReport, SyncStage};
pub use plan::{plan, ReconciliationPlan};
pub use status::{sync_status, NoopObserver, SyncObserver, SyncStatus};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("a sync is already in progress")]
    InProgress,

    #[error("failed to lock vault: {0}")]
    Lock(#[from] LockError),

    #[error("failed to scan vault: {0}")]
    Scan(#[from] ScanError),

    #[error("failed to list remote index: {0}")]
    Listing(#[source] RemoteError),

    #[error("failed to set up remote client: {0}")]
    Client(#[source] RemoteError),
}

/// Drives reconciliation between a local collection and a remote index.
pub struct SyncEngine<L, C> {
    local: L,
    client: C,
    observer: Box<dyn SyncObserver>,
    gate: Mutex<()>,
    lock_path: Option<PathBuf>,
}

impl<L, C> SyncEngine<L, C>
where
    L: LocalCollection,
    C: RemoteIndexClient,
{
    pub fn new(local: L, client: C) -> Self {
        Self {
            local,
            client,
            observer: Box::new(NoopObserver),
            gate: Mutex::new(()),
            lock_path: None,
        }
    }

    pub fn with_observer(mut self, observer: impl SyncObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Also hold the lock file at `path` for every run, so engines in other
    /// processes that use the same file never run at the same time.
    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = Some(path.into());
        self
    }

    /// True while a run of this engine holds the gate.
    pub fn is_running(&self) -> bool {
        self.gate.try_lock().is_err()
    }

    /// Run a sync now, or fail with `InProgress` if one is already running.
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let _guard = self.gate.try_lock().map_err(|_| SyncError::InProgress)?;
        let _lock = match &self.lock_path {
            Some(path) => Some(VaultLock::try_acquire(path, "sync")?.ok_or(SyncError::InProgress)?),
            None => None,
        };
        self.run().await
    }

    /// Run a sync once any active run has finished.
    pub async fn sync_queued(&self) -> Result<SyncReport, SyncError> {
        let _guard = self.gate.lock().await;
        let _lock = match &self.lock_path {
            Some(path) => Some(VaultLock::acquire(path, "sync", LOCK_POLL_INTERVAL).await?),
            None => None,
        };
        self.run().await
    }

    /// Compare the vault against the index without changing anything.
    pub async fn refresh_status(&self) -> Result<Vec<(String, SyncStatus)>, SyncError> {
        let locals = self.local.list_documents()?;
        let remotes = list_all_completed(&self.client).await.map_err(SyncError::Listing)?;
        let statuses = sync_status(&locals, &remotes);
        for (path, status) in &statuses {
            self.observer.on_sync_status_changed(path, *status);
        }
        Ok(statuses)
    }

    async fn run(&self) -> Result<SyncReport, SyncError> {
        let locals = self.local.list_documents()?;
        let remotes = list_all_completed(&self.client).await.map_err(SyncError::Listing)?;
        let plan = plan(&locals, &remotes);
        info!(
            local = locals.len(),
            remote = remotes.len(),
            create = plan.to_create.len(),
            update = plan.to_update.len(),
            delete = plan.to_delete.len(),
            "sync planned"
        );

        let report = execute(plan, &self.local, &self.client, self.observer.as_ref()).await;
        info!(
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            failures = report.failures.len(),
            "sync finished"
        );
        Ok(report)
    }
}

impl SyncEngine<VaultScanner, HttpIndexClient> {
    /// Production engine for a vault, locked through
    /// `<vault>/.vectorlink/sync.lock`. Configuration is validated before any
    /// client is built, so a missing index id never reaches the network.
    pub fn for_vault(
        vault_root: &Path,
        vault: &VaultConfig,
        settings: ApiSettings,
    ) -> Result<Self, SyncError> {
        let index_id = vault.require_index_id()?.to_string();
        let api = ApiClient::new(settings).map_err(SyncError::Client)?;
        Ok(Self::new(VaultScanner::new(vault_root), HttpIndexClient::new(api, index_id))
            .with_lock_file(sync_lock_path(vault_root)))
    }
}
