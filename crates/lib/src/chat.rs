//! Chat turn: append the user's message, call the completion service, append the reply.
//!
//! A turn runs in two phases so front ends that cannot block (the desktop UI) can run the
//! network call elsewhere: [`ChatController::begin_submit`] records the user message and
//! builds the request, [`ChatController::finish_submit`] records the outcome. The CLI just
//! calls [`ChatController::submit`], which does both around one awaited call.
//!
//! On failure the user message stays in the thread so it can be resubmitted by hand.

use crate::catalog::{self, ModelEntry};
use crate::llm::{ChatMessage, CompletionBackend, CompletionError, CompletionRequest};
use crate::session::{Message, Role, SessionError, SessionStore, ThreadId};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Titles longer than this many characters are cut and get an ellipsis.
pub const TITLE_MAX_CHARS: usize = 25;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("thread not found: {0}")]
    NotFound(ThreadId),
    #[error("a reply is still pending for thread {0}")]
    Busy(ThreadId),
    #[error("completion failed: {0}")]
    CompletionFailed(#[source] CompletionError),
}

impl From<SessionError> for ChatError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(id) => ChatError::NotFound(id),
        }
    }
}

/// What a submission did when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Input was blank; nothing was recorded.
    Ignored,
    /// The assistant replied with this text (already appended to the thread).
    Replied(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    AwaitingReply {
        thread_id: ThreadId,
    },
}

/// A turn whose user message is recorded and whose request is ready to send.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    thread_id: ThreadId,
    model: &'static ModelEntry,
    request: CompletionRequest,
}

impl PendingTurn {
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn model(&self) -> &'static ModelEntry {
        self.model
    }

    pub fn request(&self) -> &CompletionRequest {
        &self.request
    }

    /// Perform the completion call. Does not touch any thread state.
    pub async fn send<B>(&self, backend: &B) -> Result<String, CompletionError>
    where
        B: CompletionBackend + ?Sized,
    {
        backend.complete(&self.request).await
    }
}

/// Thread title derived from the first user message.
///
/// Exactly `TITLE_MAX_CHARS` characters are kept as-is; anything longer is cut to that
/// many characters (trailing whitespace dropped) and followed by `…`.
pub fn derive_title(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= TITLE_MAX_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}…", head.trim_end())
}

/// Drives request/response exchanges for threads in a [`SessionStore`].
pub struct ChatController<B> {
    backend: B,
    system_prompt: String,
    state: TurnState,
}

impl<B: CompletionBackend> ChatController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            state: TurnState::Idle,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    pub fn is_awaiting_reply(&self) -> bool {
        matches!(self.state, TurnState::AwaitingReply { .. })
    }

    /// Record the user's message on the active thread and build the outbound request.
    ///
    /// Returns `Ok(None)` for blank input. While another turn is outstanding, fails with
    /// `Busy` and records nothing.
    pub fn begin_submit(
        &mut self,
        store: &mut SessionStore,
        user_text: &str,
    ) -> Result<Option<PendingTurn>, ChatError> {
        if user_text.trim().is_empty() {
            log::debug!("chat: ignoring blank submission");
            return Ok(None);
        }
        if let TurnState::AwaitingReply { thread_id } = &self.state {
            return Err(ChatError::Busy(thread_id.clone()));
        }

        let thread_id = store.active_id().to_string();
        let thread = store
            .get_mut(&thread_id)
            .ok_or_else(|| ChatError::NotFound(thread_id.clone()))?;
        if thread.messages.is_empty() {
            thread.title = derive_title(user_text);
        }
        thread.messages.push(Message::user(user_text));

        let mut messages = Vec::with_capacity(thread.messages.len() + 1);
        messages.push(ChatMessage {
            role: Role::System,
            content: self.system_prompt.clone(),
        });
        messages.extend(thread.messages.iter().map(|m| ChatMessage {
            role: m.role,
            content: m.content.clone(),
        }));
        let model = thread.selected_model;
        let request = CompletionRequest {
            model: model.api_identifier.to_string(),
            messages,
        };

        log::info!(
            "chat: thread {} -> {} ({} messages)",
            thread_id,
            model.api_identifier,
            request.messages.len()
        );
        self.state = TurnState::AwaitingReply {
            thread_id: thread_id.clone(),
        };
        Ok(Some(PendingTurn {
            thread_id,
            model,
            request,
        }))
    }

    /// Record the outcome of a pending turn and return to idle.
    ///
    /// On success the reply is appended with the model that produced it. On failure nothing
    /// is removed; the error is handed back as `CompletionFailed`. If the thread was deleted
    /// while the call was in flight the reply is dropped and `NotFound` is returned.
    pub fn finish_submit(
        &mut self,
        store: &mut SessionStore,
        turn: PendingTurn,
        result: Result<String, CompletionError>,
    ) -> Result<String, ChatError> {
        self.state = TurnState::Idle;
        let content = match result {
            Ok(content) => content,
            Err(e) => {
                log::warn!("chat: completion for thread {} failed: {}", turn.thread_id, e);
                return Err(ChatError::CompletionFailed(e));
            }
        };
        let Some(thread) = store.get_mut(&turn.thread_id) else {
            log::warn!("chat: thread {} deleted before its reply arrived", turn.thread_id);
            return Err(ChatError::NotFound(turn.thread_id));
        };
        thread
            .messages
            .push(Message::assistant(content.clone(), turn.model));
        Ok(content)
    }

    /// One full turn against the active thread.
    pub async fn submit(
        &mut self,
        store: &mut SessionStore,
        user_text: &str,
    ) -> Result<SubmitOutcome, ChatError> {
        let Some(turn) = self.begin_submit(store, user_text)? else {
            return Ok(SubmitOutcome::Ignored);
        };
        let result = turn.send(&self.backend).await;
        self.finish_submit(store, turn, result)
            .map(SubmitOutcome::Replied)
    }

    /// Switch one thread to the catalog entry with this display name.
    pub fn set_model(
        &self,
        store: &mut SessionStore,
        thread_id: &str,
        display_name: &str,
    ) -> Result<(), ChatError> {
        let model = catalog::by_display_name(display_name)
            .ok_or_else(|| ChatError::UnknownModel(display_name.to_string()))?;
        store.set_thread_model(thread_id, model)?;
        log::info!("chat: thread {} now uses {}", thread_id, model.api_identifier);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Backend that records requests and answers from a script.
    struct ScriptedBackend {
        replies: Mutex<Vec<Result<String, CompletionError>>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<String, CompletionError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            self.seen.lock().unwrap().push(request.clone());
            self.replies.lock().unwrap().remove(0)
        }
    }

    fn server_error() -> CompletionError {
        CompletionError::Api {
            status: 500,
            body: "internal error".to_string(),
        }
    }

    #[test]
    fn derive_title_boundaries() {
        assert_eq!(derive_title("Hi"), "Hi");
        let exactly = "a".repeat(TITLE_MAX_CHARS);
        assert_eq!(derive_title(&exactly), exactly);
        let longer = "b".repeat(TITLE_MAX_CHARS + 1);
        assert_eq!(derive_title(&longer), format!("{}…", "b".repeat(TITLE_MAX_CHARS)));
        assert_eq!(
            derive_title("Hello there, how are you today?"),
            "Hello there, how are you…"
        );
    }

    #[test]
    fn derive_title_counts_characters_not_bytes() {
        let text = "é".repeat(30);
        let title = derive_title(&text);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 1);
        assert!(title.ends_with('…'));
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let mut store = SessionStore::new();
        let mut controller = ChatController::new(ScriptedBackend::new(vec![]));
        assert_eq!(controller.submit(&mut store, "").await.unwrap(), SubmitOutcome::Ignored);
        assert_eq!(
            controller.submit(&mut store, "   ").await.unwrap(),
            SubmitOutcome::Ignored
        );
        assert!(store.active().messages.is_empty());
        assert_eq!(store.active().title, crate::session::DEFAULT_TITLE);
        assert!(controller.backend().requests().is_empty());
    }

    #[tokio::test]
    async fn successful_turn_appends_user_and_assistant() {
        let mut store = SessionStore::new();
        let mut controller =
            ChatController::new(ScriptedBackend::new(vec![Ok("I'm well, thanks.".into())]));
        let outcome = controller
            .submit(&mut store, "Hello there, how are you today?")
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Replied("I'm well, thanks.".into()));

        let thread = store.active();
        assert_eq!(thread.title, "Hello there, how are you…");
        assert_eq!(thread.messages.len(), 2);
        assert_eq!(thread.messages[0], Message::user("Hello there, how are you today?"));
        assert_eq!(thread.messages[1].role, Role::Assistant);
        assert_eq!(thread.messages[1].model_used, Some(catalog::default_model()));
        assert_eq!(*controller.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn request_carries_system_prompt_history_and_model() {
        let mut store = SessionStore::new();
        let mut controller = ChatController::new(ScriptedBackend::new(vec![
            Ok("first reply".into()),
            Ok("second reply".into()),
        ]))
        .with_system_prompt("Be brief.");
        let id = store.active_id().to_string();
        controller.submit(&mut store, "one").await.unwrap();
        controller.set_model(&mut store, &id, "DeepSeek R1").unwrap();
        controller.submit(&mut store, "two").await.unwrap();

        let requests = controller.backend().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].model, "deepseek/deepseek-chat-v3-0324");
        let second = &requests[1];
        assert_eq!(second.model, "deepseek/deepseek-r1");
        let roles: Vec<Role> = second.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(second.messages[0].content, "Be brief.");
        assert_eq!(second.messages[2].content, "first reply");

        // Title is set once, from the first message only.
        assert_eq!(store.active().title, "one");
        let replies: Vec<_> = store
            .active()
            .messages
            .iter()
            .filter_map(|m| m.model_used.map(|e| e.display_name))
            .collect();
        assert_eq!(replies, vec!["DeepSeek V3", "DeepSeek R1"]);
    }

    #[tokio::test]
    async fn failed_completion_keeps_user_message() {
        let mut store = SessionStore::new();
        let mut controller = ChatController::new(ScriptedBackend::new(vec![Err(server_error())]));
        let err = controller.submit(&mut store, "are you there?").await.unwrap_err();
        match err {
            ChatError::CompletionFailed(cause) => assert_eq!(cause.status(), Some(500)),
            other => panic!("unexpected error: {:?}", other),
        }
        let thread = store.active();
        assert_eq!(thread.messages, vec![Message::user("are you there?")]);
        assert_eq!(thread.title, "are you there?");
        assert!(!controller.is_awaiting_reply());
    }

    #[tokio::test]
    async fn retry_after_failure_resends_history() {
        let mut store = SessionStore::new();
        let mut controller = ChatController::new(ScriptedBackend::new(vec![
            Err(server_error()),
            Ok("back online".into()),
        ]));
        assert!(controller.submit(&mut store, "ping").await.is_err());
        controller.submit(&mut store, "ping again").await.unwrap();
        let last = controller.backend().requests().pop().unwrap();
        let contents: Vec<&str> = last.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![DEFAULT_SYSTEM_PROMPT, "ping", "ping again"]);
        assert_eq!(store.active().messages.len(), 3);
    }

    #[test]
    fn second_submission_while_awaiting_is_busy() {
        let mut store = SessionStore::new();
        let mut controller = ChatController::new(ScriptedBackend::new(vec![]));
        let turn = controller.begin_submit(&mut store, "first").unwrap().unwrap();
        assert!(controller.is_awaiting_reply());
        assert!(matches!(
            controller.begin_submit(&mut store, "second"),
            Err(ChatError::Busy(_))
        ));
        assert_eq!(store.active().messages.len(), 1);

        controller
            .finish_submit(&mut store, turn, Ok("done".into()))
            .unwrap();
        assert!(!controller.is_awaiting_reply());
        assert_eq!(store.active().messages.len(), 2);
    }

    #[test]
    fn reply_for_deleted_thread_is_dropped() {
        let mut store = SessionStore::new();
        let mut controller = ChatController::new(ScriptedBackend::new(vec![]));
        let turn = controller.begin_submit(&mut store, "hello").unwrap().unwrap();
        let id = turn.thread_id().to_string();
        store.delete_thread(&id);
        let err = controller
            .finish_submit(&mut store, turn, Ok("late".into()))
            .unwrap_err();
        assert!(matches!(err, ChatError::NotFound(ref missing) if *missing == id));
        assert!(store.active().messages.is_empty());
        assert_eq!(*controller.state(), TurnState::Idle);
    }

    #[test]
    fn reply_lands_on_originating_thread_after_switch() {
        let mut store = SessionStore::new();
        let origin = store.active_id().to_string();
        let mut controller = ChatController::new(ScriptedBackend::new(vec![]));
        let turn = controller.begin_submit(&mut store, "question").unwrap().unwrap();
        let other = store.create_thread();
        controller
            .finish_submit(&mut store, turn, Ok("answer".into()))
            .unwrap();
        assert_eq!(store.get(&origin).unwrap().messages.len(), 2);
        assert!(store.get(&other).unwrap().messages.is_empty());
    }

    #[test]
    fn set_model_rejects_unknown_names() {
        let mut store = SessionStore::new();
        let controller = ChatController::new(ScriptedBackend::new(vec![]));
        let id = store.active_id().to_string();
        let err = controller
            .set_model(&mut store, &id, "UnknownName")
            .unwrap_err();
        assert!(matches!(err, ChatError::UnknownModel(_)));
        assert_eq!(store.active().selected_model, catalog::default_model());

        let err = controller
            .set_model(&mut store, "thread-missing", "DeepSeek R1")
            .unwrap_err();
        assert!(matches!(err, ChatError::NotFound(_)));
    }

    #[test]
    fn set_model_is_per_thread() {
        let mut store = SessionStore::new();
        let controller = ChatController::new(ScriptedBackend::new(vec![]));
        let first = store.active_id().to_string();
        let second = store.create_thread();
        controller
            .set_model(&mut store, &first, "Qwen3 235B")
            .unwrap();
        assert_eq!(
            store.get(&first).unwrap().selected_model.api_identifier,
            "qwen/qwen3-235b-a22b"
        );
        assert_eq!(
            store.get(&second).unwrap().selected_model,
            catalog::default_model()
        );
    }
}
