// Reconciliation executor: applies a plan one item at a time.
//
// A failing item is recorded in the report and never stops the items after
// it. Updates register the replacement before removing the stale record, so
// a failed delete leaves a duplicate behind instead of losing the document.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};
use vectorlink_common::path::file_name;
use vectorlink_common::types::{LocalDocument, RecordAttributes, RemoteRecord};

use super::plan::ReconciliationPlan;
use super::status::{SyncObserver, SyncStatus};
use crate::remote::{RemoteError, RemoteIndexClient};
use crate::scanner::LocalCollection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

/// Step of an action that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Read,
    Upload,
    Register,
    DeleteRecord,
    DeleteBlob,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Read => "read",
            Self::Upload => "upload",
            Self::Register => "register",
            Self::DeleteRecord => "delete_record",
            Self::DeleteBlob => "delete_blob",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    /// Local path, or the record name for orphan deletions.
    pub path: String,
    pub action: SyncAction,
    pub stage: SyncStage,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of records that were created, replaced or removed.
    pub fn applied(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    fn fail(&mut self, path: &str, action: SyncAction, stage: SyncStage, reason: String) {
        warn!(path, action = ?action, stage = %stage, reason = %reason, "sync item failed");
        self.failures.push(SyncFailure { path: path.to_string(), action, stage, reason });
    }
}

type StepError = (SyncStage, String);

/// Apply `plan` strictly in order: creates, updates, deletes, then prunes.
pub async fn execute<L, C>(
    plan: ReconciliationPlan,
    local: &L,
    client: &C,
    observer: &dyn SyncObserver,
) -> SyncReport
where
    L: LocalCollection,
    C: RemoteIndexClient,
{
    let mut report = SyncReport::default();

    for doc in plan.to_create {
        match create_record(local, client, &doc).await {
            Ok(record) => {
                info!(path = %doc.path, external_id = %record.external_id, "created record");
                report.created += 1;
                observer.on_sync_status_changed(&doc.path, SyncStatus::Synced);
            }
            Err((stage, reason)) => {
                report.fail(&doc.path, SyncAction::Create, stage, reason);
                observer.on_sync_status_changed(&doc.path, SyncStatus::Failed);
            }
        }
    }

    for (doc, stale) in plan.to_update {
        let record = match create_record(local, client, &doc).await {
            Ok(record) => record,
            Err((stage, reason)) => {
                report.fail(&doc.path, SyncAction::Update, stage, reason);
                observer.on_sync_status_changed(&doc.path, SyncStatus::Failed);
                continue;
            }
        };
        match delete_record(client, &stale).await {
            Ok(blob_cleanup) => {
                info!(
                    path = %doc.path,
                    external_id = %record.external_id,
                    replaced = %stale.external_id,
                    "updated record"
                );
                report.updated += 1;
                if let Err((stage, reason)) = blob_cleanup {
                    report.fail(&doc.path, SyncAction::Update, stage, reason);
                }
                observer.on_sync_status_changed(&doc.path, SyncStatus::Synced);
            }
            Err((stage, reason)) => {
                report.fail(&doc.path, SyncAction::Update, stage, reason);
                observer.on_sync_status_changed(&doc.path, SyncStatus::Failed);
            }
        }
    }

    for orphan in plan.to_delete {
        match delete_record(client, &orphan).await {
            Ok(blob_cleanup) => {
                info!(name = %orphan.name, external_id = %orphan.external_id, "deleted orphan record");
                report.deleted += 1;
                if let Err((stage, reason)) = blob_cleanup {
                    report.fail(&orphan.name, SyncAction::Delete, stage, reason);
                }
                observer.on_sync_status_changed(&orphan.name, SyncStatus::Removed);
            }
            Err((stage, reason)) => {
                report.fail(&orphan.name, SyncAction::Delete, stage, reason);
                observer.on_sync_status_changed(&orphan.name, SyncStatus::Failed);
            }
        }
    }

    // The document keeps its other record, so its status does not change.
    for duplicate in plan.to_prune {
        match delete_record(client, &duplicate).await {
            Ok(blob_cleanup) => {
                info!(name = %duplicate.name, external_id = %duplicate.external_id, "pruned duplicate record");
                report.deleted += 1;
                if let Err((stage, reason)) = blob_cleanup {
                    report.fail(&duplicate.name, SyncAction::Delete, stage, reason);
                }
            }
            Err((stage, reason)) => report.fail(&duplicate.name, SyncAction::Delete, stage, reason),
        }
    }

    report
}

/// Upload the document and register it. A rejected registration removes
/// the uploaded blob again, best effort.
async fn create_record<L, C>(
    local: &L,
    client: &C,
    doc: &LocalDocument,
) -> Result<RemoteRecord, StepError>
where
    L: LocalCollection,
    C: RemoteIndexClient,
{
    let bytes = local.read_bytes(&doc.path).await.map_err(|e| (SyncStage::Read, e.to_string()))?;
    let blob_id = client
        .create_blob(bytes, file_name(&doc.path))
        .await
        .map_err(|e| (SyncStage::Upload, e.to_string()))?;

    let attributes = RecordAttributes { name: doc.path.clone(), updated_at: doc.last_modified };
    let outcome = match client.register_record(&blob_id, &attributes).await {
        Ok(record) if record.status.is_failed() => Err(format!(
            "registration reported status `{}`",
            record.status.as_str()
        )),
        Ok(record) => Ok(record),
        Err(error) => Err(error.to_string()),
    };

    match outcome {
        Ok(record) => Ok(record),
        Err(reason) => {
            if let Err(error) = remove_blob(client, &blob_id).await {
                warn!(path = %doc.path, blob_id = %blob_id, error = %error, "failed to remove unregistered blob");
            }
            Err((SyncStage::Register, reason))
        }
    }
}

/// Delete a record, then its blob.
///
/// The outer error means the record is still present and its blob was left
/// alone. The inner result reports blob cleanup after the record is gone.
async fn delete_record<C: RemoteIndexClient>(
    client: &C,
    record: &RemoteRecord,
) -> Result<Result<(), StepError>, StepError> {
    match client.delete_record(&record.external_id).await {
        Ok(true) => {}
        Ok(false) => {
            return Err((SyncStage::DeleteRecord, "remote did not confirm record deletion".into()))
        }
        Err(error) => return Err((SyncStage::DeleteRecord, error.to_string())),
    }
    Ok(remove_blob(client, &record.blob_id).await.map_err(|e| (SyncStage::DeleteBlob, e.to_string())))
}

async fn remove_blob<C: RemoteIndexClient>(client: &C, blob_id: &str) -> Result<(), RemoteError> {
    match client.delete_blob(blob_id).await? {
        true => Ok(()),
        false => Err(RemoteError::Rejected(format!("blob {blob_id} was not deleted"))),
    }
}
