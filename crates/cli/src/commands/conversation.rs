// `vectorlink conversation`: list, create, rename, delete, select, head.

use clap::{Args, Subcommand};
use serde::Serialize;
use vectorlink_common::types::ConversationState;
use vectorlink_engine::config::{conversations_lock_path, GlobalConfig};
use vectorlink_engine::conversation::ConversationStore;
use vectorlink_engine::lock::{VaultLock, LOCK_POLL_INTERVAL};

use crate::context::{self, VaultArgs};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ConversationArgs {
    #[command(flatten)]
    vault: VaultArgs,

    /// Force JSON output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    action: ConversationAction,
}

#[derive(Debug, Subcommand)]
pub enum ConversationAction {
    /// List conversations; the selected one is marked
    List,
    /// Create a conversation and select it
    New {
        name: String,
    },
    /// Rename a conversation and set or clear its prompt override
    Rename {
        id: String,
        name: String,
        /// Prompt appended to the general one; pass "" to clear.
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Delete a conversation (the default one cannot be deleted)
    Delete {
        id: String,
    },
    /// Select the conversation used by `history`
    Select {
        id: String,
    },
    /// Point a conversation at a newer response
    Head {
        id: String,
        response_id: String,
        /// Head the conversation must currently have (defaults to its current head).
        #[arg(long)]
        expected: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationList {
    pub selected: String,
    pub conversations: Vec<ConversationState>,
}

impl ConversationList {
    fn from_store(store: &ConversationStore) -> Self {
        Self { selected: store.selected_id().to_string(), conversations: store.list().to_vec() }
    }
}

pub fn run(args: ConversationArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match apply(args.vault, args.action) {
        Ok(list) => {
            output::print_output(format, &list, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

fn apply(vault: VaultArgs, action: ConversationAction) -> anyhow::Result<ConversationList> {
    let root = vault.resolve(&GlobalConfig::load())?;
    // Edits load, change and save the whole store; other processes wait.
    let _lock = if matches!(action, ConversationAction::List) {
        None
    } else {
        let path = conversations_lock_path(&root);
        Some(context::block_on(VaultLock::acquire(&path, "conversation", LOCK_POLL_INTERVAL))??)
    };
    let mut store = ConversationStore::load(&root)?;
    let changed = match action {
        ConversationAction::List => false,
        ConversationAction::New { name } => {
            store.create(&name)?;
            true
        }
        ConversationAction::Rename { id, name, prompt } => {
            let prompt = match prompt {
                Some(prompt) => Some(prompt),
                None => store.get(&id).and_then(|c| c.prompt_override.clone()),
            };
            store.update(&id, &name, prompt)?;
            true
        }
        ConversationAction::Delete { id } => {
            store.delete(&id)?;
            true
        }
        ConversationAction::Select { id } => {
            store.select(&id)?;
            true
        }
        ConversationAction::Head { id, response_id, expected } => {
            let expected = match expected {
                Some(expected) => Some(expected),
                None => store.get(&id).and_then(|c| c.head_pointer.clone()),
            };
            store.advance_head(&id, expected.as_deref(), &response_id)?;
            true
        }
    };
    if changed {
        store.save()?;
    }
    Ok(ConversationList::from_store(&store))
}

fn format_human(list: &ConversationList) -> String {
    list.conversations
        .iter()
        .map(|c| {
            let marker = if c.id == list.selected { "*" } else { " " };
            let head = c.head_pointer.as_deref().unwrap_or("(empty)");
            format!("{marker} {:<36}  {}  {head}", c.id, c.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
