use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vectorlink_common::types::{ConversationState, EntryKind, InputMessage, Role, Turn};
use vectorlink_engine::config::HISTORY_DEPTH;
use vectorlink_engine::conversation::ConversationStore;
use vectorlink_engine::history::{HistorySession, WalkState};
use vectorlink_engine::remote::{RemoteError, RemoteTurnClient};

/// Remote history holding several chains. Fetches for turns whose id starts
/// with a slow prefix take `delay`.
#[derive(Clone, Default)]
struct ScriptedHistory {
    turns: Arc<HashMap<String, Turn>>,
    fetched: Arc<Mutex<Vec<String>>>,
    slow_prefix: Option<String>,
    delay: Duration,
    broken: Option<String>,
}

impl ScriptedHistory {
    fn with_chains(chains: &[(&str, usize)]) -> Self {
        let mut turns = HashMap::new();
        for (prefix, len) in chains {
            for i in 1..=*len {
                let id = format!("{prefix}-{i:02}");
                turns.insert(
                    id.clone(),
                    Turn {
                        id,
                        role: Role::Assistant,
                        content: format!("{prefix} answer {i}"),
                        continuation_pointer: (i > 1).then(|| format!("{prefix}-{:02}", i - 1)),
                        annotations: vec![],
                        search_results: None,
                    },
                );
            }
        }
        Self { turns: Arc::new(turns), ..Self::default() }
    }

    fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    async fn pause_for(&self, id: &str) {
        if self.slow_prefix.as_deref().is_some_and(|prefix| id.starts_with(prefix)) {
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl RemoteTurnClient for ScriptedHistory {
    async fn retrieve_turn(&self, id: &str) -> Result<Turn, RemoteError> {
        self.fetched.lock().unwrap().push(id.to_string());
        self.pause_for(id).await;
        if self.broken.as_deref() == Some(id) {
            return Err(RemoteError::Status { code: 502, body: "bad gateway".into() });
        }
        self.turns
            .get(id)
            .cloned()
            .ok_or_else(|| RemoteError::Status { code: 404, body: id.to_string() })
    }

    async fn list_inputs_for_turn(&self, id: &str) -> Result<Vec<InputMessage>, RemoteError> {
        self.pause_for(id).await;
        let prefix = id.split('-').next().unwrap_or_default();
        let n = id.rsplit('-').next().unwrap_or_default();
        Ok(vec![InputMessage { role: Role::User, content: format!("{prefix} question {n}") }])
    }
}

fn conversation(id: &str, head: Option<&str>) -> ConversationState {
    ConversationState {
        id: id.to_string(),
        name: id.to_uppercase(),
        head_pointer: head.map(str::to_string),
        prompt_override: None,
    }
}

#[tokio::test]
async fn long_chain_is_capped_at_history_depth() {
    let remote = ScriptedHistory::with_chains(&[("x", 25)]);
    let session = HistorySession::new(remote.clone());

    let outcome = session.load(&conversation("x", Some("x-25"))).await;
    assert_eq!(outcome.state, WalkState::Completed);
    assert_eq!(outcome.transcript.turn_count(), HISTORY_DEPTH);
    assert_eq!(outcome.transcript.entries.len(), HISTORY_DEPTH * 2);

    // Oldest first: hop 20 back from the head is x-06.
    assert_eq!(outcome.transcript.entries[0].kind, EntryKind::Input);
    assert_eq!(outcome.transcript.entries[0].content, "x question 06");
    assert_eq!(outcome.transcript.entries[1].content, "x answer 6");
    assert_eq!(outcome.transcript.entries.last().unwrap().content, "x answer 25");

    let fetched = remote.fetched();
    assert_eq!(fetched.len(), HISTORY_DEPTH);
    assert!(!fetched.contains(&"x-05".to_string()));
}

#[tokio::test(start_paused = true)]
async fn switching_conversation_mid_walk_discards_old_walk() {
    let mut remote = ScriptedHistory::with_chains(&[("x", 5), ("y", 3)]);
    remote.slow_prefix = Some("x".into());
    remote.delay = Duration::from_secs(2);
    let session = HistorySession::new(remote.clone());

    let x = conversation("x", Some("x-05"));
    let y = conversation("y", Some("y-03"));
    let (x_outcome, y_outcome) = tokio::join!(session.load(&x), async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        session.load(&y).await
    });

    assert_eq!(x_outcome.state, WalkState::Cancelled);
    assert_eq!(y_outcome.state, WalkState::Completed);

    let shared = session.snapshot().await;
    assert_eq!(shared.conversation_id, "y");
    assert_eq!(shared.turn_count(), 3);
    assert!(shared.entries.iter().all(|entry| entry.turn_id.starts_with("y-")));
    assert_eq!(shared, y_outcome.transcript);

    // The superseded walk stopped after its in-flight hop.
    let x_fetches = remote.fetched().iter().filter(|id| id.starts_with("x-")).count();
    assert_eq!(x_fetches, 1);
}

#[tokio::test(start_paused = true)]
async fn reselecting_same_conversation_restarts_cleanly() {
    let mut remote = ScriptedHistory::with_chains(&[("x", 4)]);
    remote.slow_prefix = Some("x".into());
    remote.delay = Duration::from_secs(1);
    let session = HistorySession::new(remote);

    let x = conversation("x", Some("x-04"));
    let (first, second) = tokio::join!(session.load(&x), async {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        session.load(&x).await
    });

    assert_eq!(first.state, WalkState::Cancelled);
    assert_eq!(second.state, WalkState::Completed);
    let shared = session.snapshot().await;
    assert_eq!(shared.turn_count(), 4);
    assert_eq!(shared.entries.len(), 8);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_walk_and_keeps_published_hops() {
    let mut remote = ScriptedHistory::with_chains(&[("x", 4)]);
    remote.slow_prefix = Some("x".into());
    remote.delay = Duration::from_secs(1);
    let session = HistorySession::new(remote.clone());

    let x = conversation("x", Some("x-04"));
    let (outcome, at_cancel) = tokio::join!(session.load(&x), async {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        session.cancel();
        session.snapshot().await
    });

    assert_eq!(outcome.state, WalkState::Cancelled);
    assert_eq!(at_cancel.turn_count(), 1);
    assert_eq!(session.snapshot().await, at_cancel);
    assert_eq!(remote.fetched(), vec!["x-04".to_string(), "x-03".to_string()]);
}

#[tokio::test]
async fn network_failure_reports_failed_with_partial_history() {
    let mut remote = ScriptedHistory::with_chains(&[("x", 6)]);
    remote.broken = Some("x-03".into());
    let session = HistorySession::new(remote);

    let outcome = session.load(&conversation("x", Some("x-06"))).await;
    match &outcome.state {
        WalkState::Failed(RemoteError::Status { code, .. }) => assert_eq!(*code, 502),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(outcome.transcript.turn_count(), 3);
    assert_eq!(outcome.transcript.entries[1].content, "x answer 4");
    assert_eq!(session.snapshot().await, outcome.transcript);
}

#[tokio::test]
async fn selected_conversation_from_store_drives_the_walk() {
    let remote = ScriptedHistory::with_chains(&[("y", 2)]);
    let session = HistorySession::new(remote);

    let mut store = ConversationStore::default();
    let id = store.create("Research").unwrap().id.clone();
    store.advance_head(&id, None, "y-02").unwrap();

    let outcome = session.load(store.selected()).await;
    assert_eq!(outcome.transcript.conversation_id, id);
    assert_eq!(outcome.transcript.turn_count(), 2);

    store.select("default").unwrap();
    let outcome = session.load(store.selected()).await;
    assert!(outcome.transcript.is_empty());
    assert!(session.snapshot().await.is_empty());
}
