// Per-document sync status, reported to UI collaborators through an observer.

use std::collections::HashMap;

use serde::Serialize;
use vectorlink_common::types::{LocalDocument, RecordStatus, RemoteRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// A completed record with the same name and timestamp exists.
    Synced,
    /// The document is missing from the index or its record is stale.
    OutOfSync,
    /// The last sync action for this document failed.
    Failed,
    /// The record was removed because no local document backs it.
    Removed,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::OutOfSync => "out_of_sync",
            Self::Failed => "failed",
            Self::Removed => "removed",
        }
    }
}

/// Receives status transitions as a sync progresses.
pub trait SyncObserver: Send + Sync {
    fn on_sync_status_changed(&self, path: &str, status: SyncStatus);
}

impl<F> SyncObserver for F
where
    F: Fn(&str, SyncStatus) + Send + Sync,
{
    fn on_sync_status_changed(&self, path: &str, status: SyncStatus) {
        self(path, status)
    }
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {
    fn on_sync_status_changed(&self, _path: &str, _status: SyncStatus) {}
}

/// Status of every local document against a full remote listing, in
/// `locals` order. A document is synced only when it has exactly one
/// completed record and that record carries its timestamp.
pub fn sync_status(locals: &[LocalDocument], remotes: &[RemoteRecord]) -> Vec<(String, SyncStatus)> {
    let mut by_name: HashMap<&str, Vec<&RemoteRecord>> = HashMap::new();
    for record in remotes.iter().filter(|r| r.status == RecordStatus::Completed) {
        by_name.entry(record.name.as_str()).or_default().push(record);
    }

    locals
        .iter()
        .map(|doc| {
            let status = match by_name.get(doc.path.as_str()).map(Vec::as_slice) {
                Some([record]) if record.updated_at == doc.last_modified => SyncStatus::Synced,
                _ => SyncStatus::OutOfSync,
            };
            (doc.path.clone(), status)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    fn local(path: &str, millis: i64) -> LocalDocument {
        LocalDocument { path: path.into(), last_modified: Utc.timestamp_millis_opt(millis).unwrap() }
    }

    fn remote(name: &str, millis: i64, status: RecordStatus) -> RemoteRecord {
        RemoteRecord {
            external_id: format!("file-{name}"),
            blob_id: format!("file-{name}"),
            name: name.into(),
            updated_at: Utc.timestamp_millis_opt(millis).unwrap(),
            status,
        }
    }

    #[test]
    fn status_per_document() {
        let locals = vec![local("a.md", 100), local("b.md", 200), local("c.md", 300)];
        let remotes = vec![
            remote("a.md", 100, RecordStatus::Completed),
            remote("b.md", 150, RecordStatus::Completed),
            remote("c.md", 300, RecordStatus::Pending),
        ];
        let statuses = sync_status(&locals, &remotes);
        assert_eq!(
            statuses,
            vec![
                ("a.md".to_string(), SyncStatus::Synced),
                ("b.md".to_string(), SyncStatus::OutOfSync),
                ("c.md".to_string(), SyncStatus::OutOfSync),
            ]
        );
    }

    #[test]
    fn duplicate_records_are_out_of_sync() {
        let locals = vec![local("a.md", 100)];
        let mut older = remote("a.md", 50, RecordStatus::Completed);
        older.external_id = "file-older".into();
        let remotes = vec![remote("a.md", 100, RecordStatus::Completed), older];
        assert_eq!(sync_status(&locals, &remotes), vec![("a.md".to_string(), SyncStatus::OutOfSync)]);
    }

    #[test]
    fn closure_observer_receives_updates() {
        let seen = Mutex::new(Vec::new());
        let observer = |path: &str, status: SyncStatus| {
            seen.lock().unwrap().push((path.to_string(), status));
        };
        observer.on_sync_status_changed("a.md", SyncStatus::Removed);
        assert_eq!(*seen.lock().unwrap(), vec![("a.md".to_string(), SyncStatus::Removed)]);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&SyncStatus::OutOfSync).unwrap(), "\"out_of_sync\"");
        assert_eq!(SyncStatus::OutOfSync.as_str(), "out_of_sync");
    }
}
