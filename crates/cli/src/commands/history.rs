// `vectorlink history`: reconstruct and print a conversation.

use clap::Args;
use serde::Serialize;
use vectorlink_common::types::{ConversationState, EntryKind, Role, Transcript, TranscriptEntry};
use vectorlink_engine::config::{GlobalConfig, HISTORY_DEPTH};
use vectorlink_engine::conversation::{ConversationError, ConversationStore};
use vectorlink_engine::history::{resolve_citation, HistorySession, WalkState};
use vectorlink_engine::remote::{ApiClient, HttpTurnClient, RemoteError};

use crate::context::{self, VaultArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[command(flatten)]
    vault: VaultArgs,

    /// Conversation id (defaults to the selected conversation).
    #[arg(long, value_name = "ID")]
    conversation: Option<String>,

    /// Maximum number of turns to walk back.
    #[arg(long, default_value_t = HISTORY_DEPTH)]
    depth: usize,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResult {
    pub conversation_id: String,
    pub name: String,
    pub state: &'static str,
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub turn_id: String,
    pub kind: EntryKind,
    pub role: Role,
    pub content: String,
    /// Document names the entry cites, in annotation order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

impl HistoryEntry {
    fn from_entry(entry: TranscriptEntry) -> Self {
        let results = entry.search_results.as_deref().unwrap_or_default();
        let mut sources: Vec<String> = Vec::new();
        for name in entry.annotations.iter().filter_map(|a| resolve_citation(a, results)) {
            if !sources.contains(&name) {
                sources.push(name);
            }
        }
        Self {
            turn_id: entry.turn_id,
            kind: entry.kind,
            role: entry.role,
            content: entry.content,
            sources,
        }
    }
}

fn history_result(
    conversation: &ConversationState,
    state: &'static str,
    transcript: Transcript,
) -> HistoryResult {
    HistoryResult {
        conversation_id: conversation.id.clone(),
        name: conversation.name.clone(),
        state,
        entries: transcript.entries.into_iter().map(HistoryEntry::from_entry).collect(),
    }
}

pub fn run(args: HistoryArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match context::block_on(load_history(&args)).and_then(|result| result) {
        Ok((result, None)) => {
            output::print_output(format, &result, format_human)?;
            Ok(())
        }
        Ok((partial, Some(error))) => {
            output::print_output(format, &partial, format_human)?;
            let error = anyhow::Error::new(error).context("history is incomplete");
            output::print_anyhow_error(format, &error);
            Err(error)
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

/// The result plus the error that cut the walk short, if any.
type Loaded = (HistoryResult, Option<RemoteError>);

async fn load_history(args: &HistoryArgs) -> anyhow::Result<Loaded> {
    let global = GlobalConfig::load();
    let root = args.vault.resolve(&global)?;
    let store = ConversationStore::load(&root)?;
    let conversation = match args.conversation.as_deref() {
        Some(id) => store.get(id).ok_or_else(|| ConversationError::NotFound(id.to_string()))?,
        None => store.selected(),
    };

    let client = HttpTurnClient::new(ApiClient::new(context::api_settings(&global)?)?);
    let session = HistorySession::new(client).with_max_depth(args.depth);
    let outcome = session.load(conversation).await;
    Ok(match outcome.state {
        WalkState::Completed => {
            (history_result(conversation, "completed", outcome.transcript), None)
        }
        WalkState::Cancelled => {
            (history_result(conversation, "cancelled", outcome.transcript), None)
        }
        WalkState::Failed(error) => {
            (history_result(conversation, "failed", outcome.transcript), Some(error))
        }
    })
}

fn format_human(result: &HistoryResult) -> String {
    let mut lines = vec![format!("{} ({})", result.name, result.conversation_id)];
    if result.entries.is_empty() {
        lines.push("  No messages yet.".into());
        return lines.join("\n");
    }
    for entry in &result.entries {
        lines.push(String::new());
        lines.push(format!("[{}]", role_label(entry.role)));
        lines.push(entry.content.clone());
        if !entry.sources.is_empty() {
            lines.push(format!("  sources: {}", entry.sources.join(", ")));
        }
    }
    lines.join("\n")
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
        Role::Developer => "developer",
    }
}
