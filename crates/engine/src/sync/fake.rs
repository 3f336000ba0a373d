// In-memory collaborators for sync unit tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use vectorlink_common::types::{LocalDocument, RecordAttributes, RecordStatus, RemoteRecord};

use crate::remote::{RecordPage, RemoteError, RemoteIndexClient};
use crate::scanner::{LocalCollection, ScanError};

pub struct FakeVault {
    docs: Vec<LocalDocument>,
}

impl FakeVault {
    pub fn new(docs: &[(&str, i64)]) -> Self {
        let docs = docs
            .iter()
            .map(|(path, millis)| LocalDocument {
                path: path.to_string(),
                last_modified: Utc.timestamp_millis_opt(*millis).unwrap(),
            })
            .collect();
        Self { docs }
    }
}

impl LocalCollection for FakeVault {
    fn list_documents(&self) -> Result<Vec<LocalDocument>, ScanError> {
        Ok(self.docs.clone())
    }

    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>, ScanError> {
        if path.contains("unreadable") {
            return Err(ScanError::InvalidPath(path.to_string()));
        }
        Ok(format!("# {path}").into_bytes())
    }
}

#[derive(Default)]
struct State {
    records: Vec<RemoteRecord>,
    blobs: BTreeMap<String, String>,
    next_id: usize,
    mutations: usize,
    log: Vec<String>,
    fail_listing: bool,
    fail_upload: HashSet<String>,
    reject_register: HashSet<String>,
    fail_delete_record: HashSet<String>,
    fail_delete_blob: HashSet<String>,
}

/// Index whose records become `completed` as soon as they are registered.
#[derive(Clone, Default)]
pub struct FakeIndex {
    state: Arc<Mutex<State>>,
    list_delay: Option<Duration>,
}

impl FakeIndex {
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn seed(&self, name: &str, millis: i64) -> RemoteRecord {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("file-{}", state.next_id);
        state.blobs.insert(id.clone(), name.to_string());
        let record = RemoteRecord {
            external_id: id.clone(),
            blob_id: id,
            name: name.to_string(),
            updated_at: Utc.timestamp_millis_opt(millis).unwrap(),
            status: RecordStatus::Completed,
        };
        state.records.push(record.clone());
        record
    }

    pub fn records(&self) -> Vec<RemoteRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn blob_count(&self) -> usize {
        self.state.lock().unwrap().blobs.len()
    }

    pub fn mutation_count(&self) -> usize {
        self.state.lock().unwrap().mutations
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn fail_listing(&self) {
        self.state.lock().unwrap().fail_listing = true;
    }

    pub fn fail_upload(&self, filename: &str) {
        self.state.lock().unwrap().fail_upload.insert(filename.to_string());
    }

    pub fn reject_register(&self, name: &str) {
        self.state.lock().unwrap().reject_register.insert(name.to_string());
    }

    pub fn fail_delete_record(&self, id: &str) {
        self.state.lock().unwrap().fail_delete_record.insert(id.to_string());
    }

    pub fn fail_delete_blob(&self, id: &str) {
        self.state.lock().unwrap().fail_delete_blob.insert(id.to_string());
    }

    /// Let every injected failure succeed from now on.
    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_listing = false;
        state.fail_upload.clear();
        state.reject_register.clear();
        state.fail_delete_record.clear();
        state.fail_delete_blob.clear();
    }
}

impl RemoteIndexClient for FakeIndex {
    async fn list_page(
        &self,
        _cursor: Option<&str>,
        filter: &str,
    ) -> Result<RecordPage, RemoteError> {
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock().unwrap();
        if state.fail_listing {
            return Err(RemoteError::Status { code: 500, body: "listing unavailable".into() });
        }
        let items =
            state.records.iter().filter(|r| r.status.as_str() == filter).cloned().collect();
        Ok(RecordPage { items, next_cursor: None, has_more: false })
    }

    async fn create_blob(&self, _bytes: Vec<u8>, filename: &str) -> Result<String, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("create_blob:{filename}"));
        if state.fail_upload.contains(filename) {
            return Err(RemoteError::Transport(format!("upload of {filename} timed out")));
        }
        state.mutations += 1;
        state.next_id += 1;
        let id = format!("file-{}", state.next_id);
        state.blobs.insert(id.clone(), filename.to_string());
        Ok(id)
    }

    async fn register_record(
        &self,
        blob_id: &str,
        attributes: &RecordAttributes,
    ) -> Result<RemoteRecord, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("register:{}", attributes.name));
        state.mutations += 1;
        let status = if state.reject_register.contains(&attributes.name) {
            RecordStatus::Failed
        } else {
            RecordStatus::Completed
        };
        let record = RemoteRecord {
            external_id: blob_id.to_string(),
            blob_id: blob_id.to_string(),
            name: attributes.name.clone(),
            updated_at: attributes.updated_at,
            status,
        };
        state.records.push(record.clone());
        Ok(record)
    }

    async fn delete_record(&self, external_id: &str) -> Result<bool, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("delete_record:{external_id}"));
        if state.fail_delete_record.contains(external_id) {
            return Err(RemoteError::Status { code: 503, body: "busy".into() });
        }
        state.mutations += 1;
        let before = state.records.len();
        state.records.retain(|r| r.external_id != external_id);
        Ok(state.records.len() < before)
    }

    async fn delete_blob(&self, blob_id: &str) -> Result<bool, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("delete_blob:{blob_id}"));
        if state.fail_delete_blob.contains(blob_id) {
            return Err(RemoteError::Status { code: 503, body: "busy".into() });
        }
        state.mutations += 1;
        Ok(state.blobs.remove(blob_id).is_some())
    }
}
