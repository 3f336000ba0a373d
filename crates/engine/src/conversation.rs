// Conversation list and selection, persisted per vault at
// `<vault>/.vectorlink/conversations.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;
use vectorlink_common::types::ConversationState;

use crate::config::{conversations_path, read_toml, write_toml, ConfigError};

pub const DEFAULT_CONVERSATION_ID: &str = "default";
const DEFAULT_CONVERSATION_NAME: &str = "Default";

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("conversation `{0}` not found")]
    NotFound(String),

    #[error("the default conversation cannot be deleted")]
    DefaultUndeletable,

    #[error("conversation name must not be empty")]
    EmptyName,

    #[error("conversation `{id}` head moved (expected {expected:?}, found {actual:?})")]
    HeadConflict { id: String, expected: Option<String>, actual: Option<String> },

    #[error(transparent)]
    Storage(#[from] ConfigError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    selected: String,
    #[serde(default)]
    conversations: Vec<ConversationState>,
}

/// Owned conversation state. Callers load it, mutate it, and save it back.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    path: Option<PathBuf>,
    selected: String,
    conversations: Vec<ConversationState>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self {
            path: None,
            selected: DEFAULT_CONVERSATION_ID.to_string(),
            conversations: vec![default_conversation()],
        }
    }
}

impl ConversationStore {
    /// Load the store of a vault, or a fresh one if none was saved yet.
    pub fn load(vault_root: &Path) -> Result<Self, ConversationError> {
        Self::load_from(&conversations_path(vault_root))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConversationError> {
        let mut store = if path.exists() {
            let file: StoreFile = read_toml(path)?;
            Self { path: None, selected: file.selected, conversations: file.conversations }
        } else {
            debug!(path = %path.display(), "no conversation store yet");
            Self::default()
        };
        store.path = Some(path.to_path_buf());
        store.repair();
        Ok(store)
    }

    /// Write back to the file this store was loaded from. In-memory stores
    /// are left alone.
    pub fn save(&self) -> Result<(), ConversationError> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConversationError> {
        let file =
            StoreFile { selected: self.selected.clone(), conversations: self.conversations.clone() };
        write_toml(&file, path)?;
        Ok(())
    }

    pub fn list(&self) -> &[ConversationState] {
        &self.conversations
    }

    pub fn get(&self, id: &str) -> Option<&ConversationState> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn selected_id(&self) -> &str {
        &self.selected
    }

    pub fn selected(&self) -> &ConversationState {
        self.get(&self.selected).unwrap_or(&self.conversations[0])
    }

    pub fn select(&mut self, id: &str) -> Result<(), ConversationError> {
        if self.get(id).is_none() {
            return Err(ConversationError::NotFound(id.to_string()));
        }
        self.selected = id.to_string();
        Ok(())
    }

    /// Add a conversation with a fresh id and select it.
    pub fn create(&mut self, name: &str) -> Result<&ConversationState, ConversationError> {
        let name = checked_name(name)?;
        let id = Uuid::new_v4().to_string();
        info!(conversation = %id, name, "created conversation");
        self.conversations.push(ConversationState {
            id: id.clone(),
            name: name.to_string(),
            head_pointer: None,
            prompt_override: None,
        });
        self.selected = id;
        Ok(self.selected())
    }

    pub fn update(
        &mut self,
        id: &str,
        name: &str,
        prompt_override: Option<String>,
    ) -> Result<(), ConversationError> {
        let name = checked_name(name)?.to_string();
        let conversation = self.get_mut(id)?;
        conversation.name = name;
        conversation.prompt_override = prompt_override.filter(|p| !p.trim().is_empty());
        Ok(())
    }

    /// Remove a conversation. Selection falls back to the first remaining one.
    pub fn delete(&mut self, id: &str) -> Result<ConversationState, ConversationError> {
        if id == DEFAULT_CONVERSATION_ID {
            return Err(ConversationError::DefaultUndeletable);
        }
        let index = self
            .conversations
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ConversationError::NotFound(id.to_string()))?;
        let removed = self.conversations.remove(index);
        if self.selected == id {
            self.selected = self.conversations[0].id.clone();
        }
        info!(conversation = %id, "deleted conversation");
        Ok(removed)
    }

    /// Move the head pointer only if it still equals `expected`.
    pub fn advance_head(
        &mut self,
        id: &str,
        expected: Option<&str>,
        new_head: &str,
    ) -> Result<(), ConversationError> {
        let conversation = self.get_mut(id)?;
        if conversation.head_pointer.as_deref() != expected {
            return Err(ConversationError::HeadConflict {
                id: id.to_string(),
                expected: expected.map(str::to_string),
                actual: conversation.head_pointer.clone(),
            });
        }
        conversation.head_pointer = Some(new_head.to_string());
        Ok(())
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut ConversationState, ConversationError> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ConversationError::NotFound(id.to_string()))
    }

    /// The default conversation always exists and the selection always
    /// names an existing conversation.
    fn repair(&mut self) {
        if self.get(DEFAULT_CONVERSATION_ID).is_none() {
            self.conversations.insert(0, default_conversation());
        }
        if self.get(&self.selected).is_none() {
            self.selected = self.conversations[0].id.clone();
        }
    }
}

fn default_conversation() -> ConversationState {
    ConversationState {
        id: DEFAULT_CONVERSATION_ID.to_string(),
        name: DEFAULT_CONVERSATION_NAME.to_string(),
        head_pointer: None,
        prompt_override: None,
    }
}

fn checked_name(name: &str) -> Result<&str, ConversationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ConversationError::EmptyName);
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_store_has_selected_default() {
        let store = ConversationStore::default();
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.selected().id, "default");
        assert_eq!(store.selected().name, "Default");
    }

    #[test]
    fn create_selects_new_conversation() {
        let mut store = ConversationStore::default();
        let id = store.create("  Research ").unwrap().id.clone();
        assert_eq!(store.selected_id(), id);
        assert_eq!(store.selected().name, "Research");
        assert_ne!(id, "default");
        assert!(matches!(store.create(" "), Err(ConversationError::EmptyName)));
    }

    #[test]
    fn update_sets_name_and_prompt() {
        let mut store = ConversationStore::default();
        store.update("default", "Main", Some("Answer in French.".into())).unwrap();
        assert_eq!(store.selected().name, "Main");
        assert_eq!(store.selected().prompt_override.as_deref(), Some("Answer in French."));

        store.update("default", "Main", Some("   ".into())).unwrap();
        assert!(store.selected().prompt_override.is_none());
        assert!(matches!(store.update("nope", "x", None), Err(ConversationError::NotFound(_))));
    }

    #[test]
    fn default_cannot_be_deleted() {
        let mut store = ConversationStore::default();
        assert!(matches!(store.delete("default"), Err(ConversationError::DefaultUndeletable)));
    }

    #[test]
    fn deleting_selected_falls_back_to_first() {
        let mut store = ConversationStore::default();
        let id = store.create("Scratch").unwrap().id.clone();
        let removed = store.delete(&id).unwrap();
        assert_eq!(removed.name, "Scratch");
        assert_eq!(store.selected_id(), "default");
        assert!(matches!(store.delete(&id), Err(ConversationError::NotFound(_))));
    }

    #[test]
    fn select_unknown_fails() {
        let mut store = ConversationStore::default();
        assert!(matches!(store.select("missing"), Err(ConversationError::NotFound(_))));
        assert_eq!(store.selected_id(), "default");
    }

    #[test]
    fn advance_head_is_compare_and_set() {
        let mut store = ConversationStore::default();
        store.advance_head("default", None, "resp_1").unwrap();
        store.advance_head("default", Some("resp_1"), "resp_2").unwrap();

        let conflict = store.advance_head("default", Some("resp_1"), "resp_3");
        match conflict {
            Err(ConversationError::HeadConflict { actual, .. }) => {
                assert_eq!(actual.as_deref(), Some("resp_2"));
            }
            other => panic!("expected head conflict, got {other:?}"),
        }
        assert_eq!(store.selected().head_pointer.as_deref(), Some("resp_2"));
    }

    #[test]
    fn save_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut store = ConversationStore::load(dir.path()).unwrap();
        let id = store.create("Work").unwrap().id.clone();
        store.advance_head(&id, None, "resp_9").unwrap();
        store.save().unwrap();

        let reloaded = ConversationStore::load(dir.path()).unwrap();
        assert_eq!(reloaded.list().len(), 2);
        assert_eq!(reloaded.selected_id(), id);
        assert_eq!(reloaded.selected().head_pointer.as_deref(), Some("resp_9"));
    }

    #[test]
    fn load_repairs_missing_default_and_dangling_selection() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conversations.toml");
        std::fs::write(
            &path,
            "selected = \"gone\"\n\n[[conversations]]\nid = \"abc\"\nname = \"Work\"\n",
        )
        .unwrap();

        let store = ConversationStore::load_from(&path).unwrap();
        assert_eq!(store.list()[0].id, "default");
        assert_eq!(store.list()[1].id, "abc");
        assert_eq!(store.selected_id(), "default");
    }
}
