// Conversation thread reconstruction.
//
// A conversation is stored remotely as a chain of turns, each pointing back
// to its predecessor. Walking the chain is sequential; within one hop the
// turn and its inputs are fetched together. Every walk carries a generation
// token, and a walk whose token went stale never writes the shared
// transcript.

pub mod citation;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vectorlink_common::types::{
    ConversationState, InputMessage, Role, Transcript, TranscriptEntry, Turn,
};

use crate::config::HISTORY_DEPTH;
use crate::remote::{RemoteError, RemoteTurnClient};

pub use citation::resolve_citation;

// ── Cancellation ────────────────────────────────────────────────────

/// Monotonic request counter. Starting a new request invalidates every
/// token handed out before it.
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request and return its token.
    pub fn advance(&self) -> CancelToken {
        let captured = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        CancelToken { generation: Arc::clone(&self.0), captured }
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    generation: Arc<AtomicU64>,
    captured: u64,
}

impl CancelToken {
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.captured
    }

    pub fn is_cancelled(&self) -> bool {
        !self.is_current()
    }
}

// ── Walk ────────────────────────────────────────────────────────────

/// How a walk ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WalkState {
    Completed,
    /// A newer request superseded this walk. Not an error.
    Cancelled,
    Failed(RemoteError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalkOutcome {
    pub state: WalkState,
    /// Hops assembled before the walk ended, oldest first.
    pub transcript: Transcript,
}

impl WalkOutcome {
    fn empty(conversation_id: &str) -> Self {
        Self { state: WalkState::Completed, transcript: Transcript::new(conversation_id) }
    }
}

/// Walk back from `head` for at most `max_depth` hops.
pub async fn reconstruct<C: RemoteTurnClient>(
    client: &C,
    conversation_id: &str,
    head: &str,
    max_depth: usize,
    token: &CancelToken,
) -> WalkOutcome {
    walk(client, conversation_id, head, max_depth, token, None).await
}

async fn walk<C: RemoteTurnClient>(
    client: &C,
    conversation_id: &str,
    head: &str,
    max_depth: usize,
    token: &CancelToken,
    slot: Option<&TranscriptSlot>,
) -> WalkOutcome {
    let mut hops: Vec<Vec<TranscriptEntry>> = Vec::new();
    let mut pointer = Some(head.to_string());
    let mut state = WalkState::Completed;

    while let Some(current) = pointer.take() {
        if hops.len() >= max_depth {
            debug!(conversation = conversation_id, max_depth, "history depth cap reached");
            break;
        }
        if token.is_cancelled() {
            state = WalkState::Cancelled;
            break;
        }

        debug!(conversation = conversation_id, hop = hops.len() + 1, pointer = %current, "fetching turn");
        let (turn, inputs) = match fetch_hop(client, &current).await {
            Ok(pair) => pair,
            Err(error) => {
                warn!(conversation = conversation_id, pointer = %current, error = %error, "history walk failed");
                state = WalkState::Failed(error);
                break;
            }
        };
        if token.is_cancelled() {
            state = WalkState::Cancelled;
            break;
        }

        pointer = turn.continuation_pointer.clone();
        let entries = hop_entries(turn, inputs);
        if let Some(slot) = slot {
            if !slot.prepend(token, &entries).await {
                state = WalkState::Cancelled;
                break;
            }
        }
        hops.push(entries);
    }

    if state == WalkState::Cancelled {
        debug!(conversation = conversation_id, hops = hops.len(), "history walk superseded");
    } else {
        info!(conversation = conversation_id, hops = hops.len(), "history walk finished");
    }

    let mut transcript = Transcript::new(conversation_id);
    transcript.entries = hops.into_iter().rev().flatten().collect();
    WalkOutcome { state, transcript }
}

async fn fetch_hop<C: RemoteTurnClient>(
    client: &C,
    pointer: &str,
) -> Result<(Turn, Vec<InputMessage>), RemoteError> {
    tokio::try_join!(client.retrieve_turn(pointer), client.list_inputs_for_turn(pointer))
}

/// The user message that prompted the turn, followed by the turn itself.
fn hop_entries(turn: Turn, inputs: Vec<InputMessage>) -> Vec<TranscriptEntry> {
    let prompt = inputs.into_iter().find(|input| input.role == Role::User);
    let mut entries = Vec::with_capacity(2);
    if let Some(prompt) = prompt {
        entries.push(TranscriptEntry::from_input(&turn.id, prompt));
    }
    entries.push(TranscriptEntry::from_turn(turn));
    entries
}

// ── Session ─────────────────────────────────────────────────────────

/// Shared transcript; every write first checks the writer's token under
/// the same lock.
#[derive(Debug, Default)]
struct TranscriptSlot {
    inner: Mutex<Transcript>,
}

impl TranscriptSlot {
    async fn reset(&self, token: &CancelToken, conversation_id: &str) -> bool {
        let mut transcript = self.inner.lock().await;
        if token.is_cancelled() {
            return false;
        }
        *transcript = Transcript::new(conversation_id);
        true
    }

    /// Hops arrive newest first, so each one goes in front of the others.
    async fn prepend(&self, token: &CancelToken, entries: &[TranscriptEntry]) -> bool {
        let mut transcript = self.inner.lock().await;
        if token.is_cancelled() {
            return false;
        }
        transcript.entries.splice(0..0, entries.iter().cloned());
        true
    }
}

/// History view for the selected conversation.
pub struct HistorySession<C> {
    client: C,
    generation: Generation,
    slot: TranscriptSlot,
    max_depth: usize,
}

impl<C: RemoteTurnClient> HistorySession<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            generation: Generation::new(),
            slot: TranscriptSlot::default(),
            max_depth: HISTORY_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Rebuild the shared transcript for `conversation`, superseding any
    /// walk still in flight.
    pub async fn load(&self, conversation: &ConversationState) -> WalkOutcome {
        let token = self.generation.advance();
        if !self.slot.reset(&token, &conversation.id).await {
            return WalkOutcome {
                state: WalkState::Cancelled,
                transcript: Transcript::new(&conversation.id),
            };
        }
        match conversation.head_pointer.as_deref() {
            None => WalkOutcome::empty(&conversation.id),
            Some(head) => {
                walk(&self.client, &conversation.id, head, self.max_depth, &token, Some(&self.slot))
                    .await
            }
        }
    }

    /// Invalidate any walk in flight without starting a new one. Hops it
    /// already published stay in the shared transcript.
    pub fn cancel(&self) {
        self.generation.advance();
    }

    /// Copy of the shared transcript.
    pub async fn snapshot(&self) -> Transcript {
        self.slot.inner.lock().await.clone()
    }
}
