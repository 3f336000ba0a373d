// HTTP adapters for an OpenAI-compatible vector store / responses API.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;
use vectorlink_common::types::{
    Annotation, InputMessage, RecordAttributes, RecordStatus, RemoteRecord, Role, SearchResult,
    Turn,
};

use super::{RecordPage, RemoteError, RemoteIndexClient, RemoteTurnClient};
use crate::config::{ApiSettings, PAGE_SIZE};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const UPLOAD_PURPOSE: &str = "user_data";
const SEARCH_RESULTS_INCLUDE: &str = "file_search_call.results";

/// Authenticated base client shared by both adapters.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    settings: ApiSettings,
}

impl ApiClient {
    pub fn new(settings: ApiSettings) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self { http, settings })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.settings.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Transport("API base URL cannot hold a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, RemoteError> {
        let mut req =
            self.http.request(method, self.endpoint(segments)?).bearer_auth(&self.settings.api_key);
        if let Some(org) = &self.settings.organization_id {
            req = req.header("OpenAI-Organization", org);
        }
        if let Some(project) = &self.settings.project_id {
            req = req.header("OpenAI-Project", project);
        }
        Ok(req)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, RemoteError> {
        let resp = req.send().await.map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Status { code: status.as_u16(), body });
        }
        let bytes = resp.bytes().await.map_err(|e| RemoteError::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

// ── Index adapter ───────────────────────────────────────────────────

/// Remote index backed by one vector store.
#[derive(Debug, Clone)]
pub struct HttpIndexClient {
    api: ApiClient,
    index_id: String,
}

impl HttpIndexClient {
    pub fn new(api: ApiClient, index_id: impl Into<String>) -> Self {
        Self { api, index_id: index_id.into() }
    }
}

impl RemoteIndexClient for HttpIndexClient {
    async fn list_page(
        &self,
        cursor: Option<&str>,
        filter: &str,
    ) -> Result<RecordPage, RemoteError> {
        let mut query = vec![("limit", PAGE_SIZE.to_string()), ("filter", filter.to_string())];
        if let Some(cursor) = cursor {
            query.push(("after", cursor.to_string()));
        }
        let req = self
            .api
            .request(Method::GET, &["vector_stores", self.index_id.as_str(), "files"])?
            .query(&query);
        let list: ListResponse<WireRecord> = self.api.send(req).await?;
        Ok(list.into_page())
    }

    async fn create_blob(&self, bytes: Vec<u8>, filename: &str) -> Result<String, RemoteError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("text/markdown")
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let form = reqwest::multipart::Form::new().text("purpose", UPLOAD_PURPOSE).part("file", part);
        let req = self.api.request(Method::POST, &["files"])?.multipart(form);
        let blob: WireBlob = self.api.send(req).await?;
        debug!(blob_id = %blob.id, filename, "uploaded blob");
        Ok(blob.id)
    }

    async fn register_record(
        &self,
        blob_id: &str,
        attributes: &RecordAttributes,
    ) -> Result<RemoteRecord, RemoteError> {
        let body = RegisterRequest {
            file_id: blob_id,
            attributes: WireAttributes {
                name: attributes.name.clone(),
                updated_at: attributes.updated_at.timestamp_millis(),
            },
        };
        let req = self
            .api
            .request(Method::POST, &["vector_stores", self.index_id.as_str(), "files"])?
            .json(&body);
        let wire: WireRecord = self.api.send(req).await?;
        wire.into_record()
            .ok_or_else(|| RemoteError::Decode("registered record is missing attributes".into()))
    }

    async fn delete_record(&self, external_id: &str) -> Result<bool, RemoteError> {
        let req = self
            .api
            .request(Method::DELETE, &["vector_stores", self.index_id.as_str(), "files", external_id])?;
        let resp: DeleteResponse = self.api.send(req).await?;
        Ok(resp.deleted)
    }

    async fn delete_blob(&self, blob_id: &str) -> Result<bool, RemoteError> {
        let req = self.api.request(Method::DELETE, &["files", blob_id])?;
        let resp: DeleteResponse = self.api.send(req).await?;
        Ok(resp.deleted)
    }
}

// ── Turn adapter ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HttpTurnClient {
    api: ApiClient,
}

impl HttpTurnClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl RemoteTurnClient for HttpTurnClient {
    async fn retrieve_turn(&self, id: &str) -> Result<Turn, RemoteError> {
        let req = self
            .api
            .request(Method::GET, &["responses", id])?
            .query(&[("include[]", SEARCH_RESULTS_INCLUDE)]);
        let wire: WireResponse = self.api.send(req).await?;
        Ok(wire.into_turn())
    }

    async fn list_inputs_for_turn(&self, id: &str) -> Result<Vec<InputMessage>, RemoteError> {
        let req = self
            .api
            .request(Method::GET, &["responses", id, "input_items"])?
            .query(&[("order", "asc")]);
        let list: ListResponse<InputItem> = self.api.send(req).await?;
        Ok(list.data.into_iter().filter_map(InputItem::into_message).collect())
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
    #[serde(default)]
    last_id: Option<String>,
    #[serde(default)]
    has_more: bool,
}

impl ListResponse<WireRecord> {
    fn into_page(self) -> RecordPage {
        let items = self
            .data
            .into_iter()
            .filter_map(|wire| {
                let id = wire.id.clone();
                let record = wire.into_record();
                if record.is_none() {
                    warn!(external_id = %id, "index record has no usable name/updated_at attributes");
                }
                record
            })
            .collect();
        RecordPage { items, next_cursor: self.last_id, has_more: self.has_more }
    }
}

#[derive(Debug, Deserialize)]
struct WireBlob {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    deleted: bool,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    file_id: &'a str,
    attributes: WireAttributes,
}

#[derive(Debug, Serialize)]
struct WireAttributes {
    name: String,
    updated_at: i64,
}

/// A vector store file. Its id is the id of the uploaded file behind it.
#[derive(Debug, Deserialize)]
struct WireRecord {
    id: String,
    status: RecordStatus,
    #[serde(default)]
    attributes: Option<BTreeMap<String, Value>>,
}

impl WireRecord {
    fn into_record(self) -> Option<RemoteRecord> {
        let attributes = self.attributes?;
        let name = attributes.get("name")?.as_str()?.to_string();
        let updated_at = attributes.get("updated_at").and_then(millis_to_datetime)?;
        Some(RemoteRecord {
            blob_id: self.id.clone(),
            external_id: self.id,
            name,
            updated_at,
            status: self.status,
        })
    }
}

/// Attribute timestamps are epoch milliseconds, as a number or numeric string.
fn millis_to_datetime(value: &Value) -> Option<DateTime<Utc>> {
    let millis = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    Utc.timestamp_millis_opt(millis).single()
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    id: String,
    #[serde(default)]
    previous_response_id: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    Message {
        role: Role,
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    FileSearchCall {
        #[serde(default)]
        results: Option<Vec<SearchResult>>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputContent {
    OutputText {
        text: String,
        #[serde(default)]
        annotations: Vec<Value>,
    },
    Refusal {
        refusal: String,
    },
    #[serde(other)]
    Other,
}

impl WireResponse {
    fn into_turn(self) -> Turn {
        let mut role = Role::Assistant;
        let mut content = String::new();
        let mut annotations = Vec::new();
        let mut search_results: Option<Vec<SearchResult>> = None;

        for item in self.output {
            match item {
                OutputItem::Message { role: r, content: parts } => {
                    role = r;
                    for part in parts {
                        match part {
                            OutputContent::OutputText { text, annotations: raw } => {
                                content.push_str(&text);
                                annotations.extend(raw.into_iter().filter_map(decode_annotation));
                            }
                            OutputContent::Refusal { refusal } => content.push_str(&refusal),
                            OutputContent::Other => {}
                        }
                    }
                }
                OutputItem::FileSearchCall { results } => {
                    if let Some(results) = results {
                        search_results.get_or_insert_with(Vec::new).extend(results);
                    }
                }
                OutputItem::Other => {}
            }
        }

        Turn {
            id: self.id,
            role,
            content,
            continuation_pointer: self.previous_response_id,
            annotations,
            search_results,
        }
    }
}

fn decode_annotation(raw: Value) -> Option<Annotation> {
    match serde_json::from_value(raw) {
        Ok(annotation) => Some(annotation),
        Err(error) => {
            debug!(error = %error, "dropping unrecognized annotation");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputItem {
    Message { role: Role, content: MessageContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<InputPart>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputPart {
    InputText { text: String },
    OutputText { text: String },
    #[serde(other)]
    Other,
}

impl InputItem {
    fn into_message(self) -> Option<InputMessage> {
        let Self::Message { role, content } = self else {
            return None;
        };
        let content = match content {
            MessageContent::Text(text) => text,
            MessageContent::Parts(parts) => parts
                .into_iter()
                .filter_map(|part| match part {
                    InputPart::InputText { text } | InputPart::OutputText { text } => Some(text),
                    InputPart::Other => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        };
        Some(InputMessage { role, content })
    }
}
