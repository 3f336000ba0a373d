// Remote collaborators: the content index and the turn history store.
//
// Both are reached only through these traits; `http` holds the
// production adapters.

pub mod http;

use std::future::Future;

use thiserror::Error;
use tracing::{debug, warn};
use vectorlink_common::types::{InputMessage, RecordAttributes, RemoteRecord, Turn};

use crate::config::REMOTE_FILTER;

pub use http::{ApiClient, HttpIndexClient, HttpTurnClient};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("malformed remote response: {0}")]
    Decode(String),

    #[error("remote reported failure: {0}")]
    Rejected(String),
}

// ── Index client ────────────────────────────────────────────────────

/// One page of a remote index listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPage {
    pub items: Vec<RemoteRecord>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Operations on the remote content index.
pub trait RemoteIndexClient: Send + Sync {
    /// Fetch one page of records (`PAGE_SIZE` items) matching `filter`.
    fn list_page(
        &self,
        cursor: Option<&str>,
        filter: &str,
    ) -> impl Future<Output = Result<RecordPage, RemoteError>> + Send;

    /// Upload document bytes; returns the new blob id.
    fn create_blob(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> impl Future<Output = Result<String, RemoteError>> + Send;

    /// Attach an uploaded blob to the index as a named record.
    fn register_record(
        &self,
        blob_id: &str,
        attributes: &RecordAttributes,
    ) -> impl Future<Output = Result<RemoteRecord, RemoteError>> + Send;

    fn delete_record(
        &self,
        external_id: &str,
    ) -> impl Future<Output = Result<bool, RemoteError>> + Send;

    fn delete_blob(&self, blob_id: &str) -> impl Future<Output = Result<bool, RemoteError>> + Send;
}

/// Follow the listing cursor until the remote reports no more pages.
///
/// The cursor for the next page is the reported `next_cursor`, or the id of
/// the last item on the page when the remote omits it.
pub async fn list_all_completed<C: RemoteIndexClient>(
    client: &C,
) -> Result<Vec<RemoteRecord>, RemoteError> {
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = client.list_page(cursor.as_deref(), REMOTE_FILTER).await?;
        pages += 1;
        debug!(page = pages, items = page.items.len(), has_more = page.has_more, "listed index page");

        let next = page
            .next_cursor
            .clone()
            .or_else(|| page.items.last().map(|record| record.external_id.clone()));
        records.extend(page.items);

        if !page.has_more {
            break;
        }
        match next {
            Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
            _ => {
                warn!(page = pages, "index listing claims more pages but cursor did not advance");
                break;
            }
        }
    }

    Ok(records)
}

// ── Turn client ─────────────────────────────────────────────────────

/// Read access to the remote, backward-linked conversation history.
pub trait RemoteTurnClient: Send + Sync {
    fn retrieve_turn(&self, id: &str) -> impl Future<Output = Result<Turn, RemoteError>> + Send;

    /// Input messages that produced the turn `id`, oldest first.
    fn list_inputs_for_turn(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Vec<InputMessage>, RemoteError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::{Arc, Mutex};
    use vectorlink_common::types::RecordStatus;

    fn record(id: &str) -> RemoteRecord {
        RemoteRecord {
            external_id: id.into(),
            blob_id: id.into(),
            name: format!("{id}.md"),
            updated_at: Utc.timestamp_millis_opt(100).unwrap(),
            status: RecordStatus::Completed,
        }
    }

    /// Serves scripted pages and records the cursors it was asked for.
    struct PagedClient {
        pages: Mutex<Vec<RecordPage>>,
        cursors: Arc<Mutex<Vec<Option<String>>>>,
    }

    impl PagedClient {
        fn new(pages: Vec<RecordPage>) -> Self {
            Self { pages: Mutex::new(pages), cursors: Arc::new(Mutex::new(Vec::new())) }
        }
    }

    impl RemoteIndexClient for PagedClient {
        async fn list_page(
            &self,
            cursor: Option<&str>,
            filter: &str,
        ) -> Result<RecordPage, RemoteError> {
            assert_eq!(filter, "completed");
            self.cursors.lock().unwrap().push(cursor.map(str::to_string));
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                return Err(RemoteError::Transport("no more scripted pages".into()));
            }
            Ok(pages.remove(0))
        }

        async fn create_blob(&self, _: Vec<u8>, _: &str) -> Result<String, RemoteError> {
            unreachable!()
        }

        async fn register_record(
            &self,
            _: &str,
            _: &RecordAttributes,
        ) -> Result<RemoteRecord, RemoteError> {
            unreachable!()
        }

        async fn delete_record(&self, _: &str) -> Result<bool, RemoteError> {
            unreachable!()
        }

        async fn delete_blob(&self, _: &str) -> Result<bool, RemoteError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn single_page_listing() {
        let client = PagedClient::new(vec![RecordPage {
            items: vec![record("a"), record("b")],
            next_cursor: None,
            has_more: false,
        }]);
        let records = list_all_completed(&client).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(*client.cursors.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn follows_next_cursor_then_last_item() {
        let client = PagedClient::new(vec![
            RecordPage {
                items: vec![record("a")],
                next_cursor: Some("cursor-1".into()),
                has_more: true,
            },
            RecordPage { items: vec![record("b")], next_cursor: None, has_more: true },
            RecordPage { items: vec![record("c")], next_cursor: None, has_more: false },
        ]);

        let records = list_all_completed(&client).await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(
            *client.cursors.lock().unwrap(),
            vec![None, Some("cursor-1".to_string()), Some("b".to_string())]
        );
    }

    #[tokio::test]
    async fn stops_when_cursor_cannot_advance() {
        let client = PagedClient::new(vec![RecordPage {
            items: vec![],
            next_cursor: None,
            has_more: true,
        }]);
        let records = list_all_completed(&client).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn page_error_aborts_listing() {
        let client = PagedClient::new(vec![RecordPage {
            items: vec![record("a")],
            next_cursor: Some("next".into()),
            has_more: true,
        }]);
        let result = list_all_completed(&client).await;
        assert!(matches!(result, Err(RemoteError::Transport(_))));
    }
}
