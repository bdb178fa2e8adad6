//! Chat threads and the in-process store that owns them.
//!
//! Threads are keyed by id and hold an append-only list of messages plus the model the
//! thread currently talks to. Exactly one thread is active at a time. Nothing here
//! outlives the process.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::catalog::{self, ModelEntry};

/// Unique thread identifier (opaque string).
pub type ThreadId = String;

/// Title shown for a thread until its first user message arrives.
pub const DEFAULT_TITLE: &str = "New chat";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("thread not found: {0}")]
    NotFound(ThreadId),
}

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A single message in a thread. `model_used` is only set on assistant replies.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub model_used: Option<&'static ModelEntry>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            model_used: None,
        }
    }

    pub fn assistant(content: impl Into<String>, model: &'static ModelEntry) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            model_used: Some(model),
        }
    }
}

/// One conversation: id, title, ordered history and the model it is bound to.
#[derive(Debug, Clone)]
pub struct ChatThread {
    pub id: ThreadId,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub selected_model: &'static ModelEntry,
    /// Creation order within the store; breaks ties between equal timestamps.
    seq: u64,
}

impl ChatThread {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Owned table of threads plus the active pointer.
///
/// Mutated only by the single control flow that owns it (the REPL loop or the UI
/// update loop), so no locking is done here.
#[derive(Debug)]
pub struct SessionStore {
    threads: HashMap<ThreadId, ChatThread>,
    active: ThreadId,
    default_model: &'static ModelEntry,
    next_seq: u64,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Store with one empty thread using the catalog's default model.
    pub fn new() -> Self {
        Self::with_default_model(catalog::default_model())
    }

    /// Store with one empty thread; new threads get `default_model`.
    pub fn with_default_model(default_model: &'static ModelEntry) -> Self {
        let mut store = Self {
            threads: HashMap::new(),
            active: ThreadId::new(),
            default_model,
            next_seq: 0,
        };
        store.create_thread();
        store
    }

    /// Create an empty thread, make it active, and return its id.
    pub fn create_thread(&mut self) -> ThreadId {
        let id = format!("thread-{}", uuid::Uuid::new_v4());
        let thread = ChatThread {
            id: id.clone(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: Utc::now(),
            selected_model: self.default_model,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.threads.insert(id.clone(), thread);
        self.active = id.clone();
        log::debug!("session: created thread {}", id);
        id
    }

    /// Remove a thread. Unknown ids are ignored (double-clicks and stale UI rows are expected).
    /// If the active thread goes away, the most recent remaining thread becomes active, or a
    /// fresh one is created when none remain.
    pub fn delete_thread(&mut self, id: &str) {
        if self.threads.remove(id).is_none() {
            log::debug!("session: delete of unknown thread {} ignored", id);
            return;
        }
        log::debug!("session: deleted thread {}", id);
        if self.active != id {
            return;
        }
        let next = self.list_threads().first().map(|t| t.id.clone());
        match next {
            Some(next) => self.active = next,
            None => {
                self.create_thread();
            }
        }
    }

    pub fn set_active(&mut self, id: &str) -> Result<(), SessionError> {
        if !self.threads.contains_key(id) {
            return Err(SessionError::NotFound(id.to_string()));
        }
        self.active = id.to_string();
        Ok(())
    }

    /// All threads, most recently created first.
    pub fn list_threads(&self) -> Vec<&ChatThread> {
        let mut threads: Vec<&ChatThread> = self.threads.values().collect();
        threads.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        threads
    }

    /// The active thread. The store always holds it, so this cannot fail.
    pub fn active(&self) -> &ChatThread {
        &self.threads[&self.active]
    }

    pub fn active_id(&self) -> &str {
        &self.active
    }

    pub fn get(&self, id: &str) -> Option<&ChatThread> {
        self.threads.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut ChatThread> {
        self.threads.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn default_model(&self) -> &'static ModelEntry {
        self.default_model
    }

    /// Point one thread at a different catalog entry.
    pub fn set_thread_model(
        &mut self,
        id: &str,
        model: &'static ModelEntry,
    ) -> Result<(), SessionError> {
        let thread = self
            .threads
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        thread.selected_model = model;
        Ok(())
    }
}
