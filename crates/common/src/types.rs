// Core domain types shared across all VectorLink crates.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Vault side ──────────────────────────────────────────────────────

/// A markdown document found in the local vault.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalDocument {
    /// Normalized vault-relative path; unique within one scan.
    pub path: String,
    /// Last modification time, millisecond precision.
    pub last_modified: DateTime<Utc>,
}

// ── Remote index side ───────────────────────────────────────────────

/// Processing state of a record in the remote index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[serde(alias = "in_progress")]
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// True when the remote gave up on the record.
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}

/// Attributes attached to a record; `name` is the binding to a local path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordAttributes {
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

/// A record in the remote index, backed by one uploaded blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteRecord {
    pub external_id: String,
    pub blob_id: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
    pub status: RecordStatus,
}

// ── Conversations ───────────────────────────────────────────────────

/// A named conversation whose history lives remotely as a linked chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationState {
    pub id: String,
    pub name: String,
    /// Id of the newest turn; `None` for a conversation with no exchanges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_pointer: Option<String>,
    /// Conversation-specific prompt appended to the general one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_override: Option<String>,
}

/// Author of a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Developer,
}

/// Annotation attached to generated text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Annotation {
    FileCitation {
        file_id: String,
        filename: String,
        index: u64,
    },
    UrlCitation {
        url: String,
        title: String,
        start_index: u64,
        end_index: u64,
    },
    ContainerFileCitation {
        container_id: String,
        file_id: String,
        filename: String,
        start_index: u64,
        end_index: u64,
    },
    FilePath {
        file_id: String,
        index: u64,
    },
}

/// One hit from the remote index search that backed a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub file_id: String,
    pub filename: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// One model response, linked backward to its predecessor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub continuation_pointer: Option<String>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub search_results: Option<Vec<SearchResult>>,
}

/// The input message that produced a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputMessage {
    pub role: Role,
    pub content: String,
}

// ── Transcript ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    #[serde(rename = "input_item")]
    Input,
    #[serde(rename = "response_item")]
    Response,
}

/// A displayable message in a reconstructed conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptEntry {
    pub kind: EntryKind,
    /// Id of the turn this entry belongs to (inputs share their turn's id).
    pub turn_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_results: Option<Vec<SearchResult>>,
}

impl TranscriptEntry {
    pub fn from_input(turn_id: &str, input: InputMessage) -> Self {
        Self {
            kind: EntryKind::Input,
            turn_id: turn_id.to_string(),
            role: input.role,
            content: input.content,
            annotations: Vec::new(),
            search_results: None,
        }
    }

    pub fn from_turn(turn: Turn) -> Self {
        Self {
            kind: EntryKind::Response,
            turn_id: turn.id,
            role: turn.role,
            content: turn.content,
            annotations: turn.annotations,
            search_results: turn.search_results,
        }
    }
}

/// Ordered conversation history, oldest entry first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    pub conversation_id: String,
    pub entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self { conversation_id: conversation_id.into(), entries: Vec::new() }
    }

    /// Number of model turns (response entries) in the transcript.
    pub fn turn_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.kind == EntryKind::Response).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
