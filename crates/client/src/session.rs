//! Chat view state.
//!
//! A `ChatSession` owns everything the chat view shows: the rendered
//! messages, the active conversation id, the draft input, and whether a send
//! is in flight. Sending is split into `begin_submit` and `finish_submit` so a
//! caller can render the disabled-input window between them; `submit` runs
//! both around the API call.

use chrono::Utc;
use difychat_core::{
    build_transcript, ChatMessage, ChatResponse, ConversationId, ConversationTurn, HistoryQuery,
    Locale,
};
use tracing::warn;

use crate::{ChatApi, ClientError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Idle,
    Sending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank draft or a send already in flight; nothing was sent.
    Ignored,
    Replied,
    /// The send failed and the localized apology was appended instead.
    Fallback,
}

/// A send that has been started but not yet resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingSubmit {
    pub message: String,
    pub conversation_id: Option<ConversationId>,
}

pub struct ChatSession<A> {
    api: A,
    locale: Locale,
    messages: Vec<ChatMessage>,
    conversation_id: Option<ConversationId>,
    draft: String,
    phase: SessionPhase,
}

impl<A: ChatApi> ChatSession<A> {
    pub fn new(api: A, locale: Locale) -> Self {
        Self {
            api,
            locale,
            messages: Vec::new(),
            conversation_id: None,
            draft: String::new(),
            phase: SessionPhase::Idle,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn input_enabled(&self) -> bool {
        self.phase == SessionPhase::Idle
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Replaces the transcript with stored history, oldest first. On failure
    /// the current transcript is left as it was.
    pub async fn load_history(&mut self) -> Result<(), ClientError> {
        self.load_history_with(&HistoryQuery::default()).await
    }

    pub async fn load_history_with(&mut self, query: &HistoryQuery) -> Result<(), ClientError> {
        let records = self.api.fetch_history(query).await?;
        let turns: Vec<ConversationTurn> =
            records.into_iter().map(ConversationTurn::from).collect();
        let transcript = build_transcript(turns);

        self.messages = transcript.messages;
        self.conversation_id = transcript.conversation_id;
        Ok(())
    }

    pub fn begin_submit(&mut self) -> Option<PendingSubmit> {
        if self.phase == SessionPhase::Sending {
            return None;
        }
        let message = self.draft.trim();
        if message.is_empty() {
            return None;
        }

        let message = message.to_string();
        self.messages.push(ChatMessage::user(message.clone(), Some(Utc::now())));
        self.draft.clear();
        self.phase = SessionPhase::Sending;

        Some(PendingSubmit { message, conversation_id: self.conversation_id.clone() })
    }

    pub fn finish_submit(&mut self, result: Result<ChatResponse, ClientError>) -> SubmitOutcome {
        if self.phase != SessionPhase::Sending {
            return SubmitOutcome::Ignored;
        }
        self.phase = SessionPhase::Idle;

        match result {
            Ok(reply) => {
                self.messages.push(ChatMessage::assistant(reply.message, Some(reply.timestamp)));
                if let Some(id) = ConversationId::from_optional(Some(reply.conversation_id)) {
                    self.conversation_id = Some(id);
                }
                SubmitOutcome::Replied
            }
            Err(error) => {
                warn!(event_name = "client.chat.send.failed", error = %error, "chat send failed");
                self.messages
                    .push(ChatMessage::assistant(self.locale.fallback_message(), Some(Utc::now())));
                SubmitOutcome::Fallback
            }
        }
    }

    pub async fn submit(&mut self) -> SubmitOutcome {
        let Some(pending) = self.begin_submit() else {
            return SubmitOutcome::Ignored;
        };
        let result =
            self.api.send_message(&pending.message, pending.conversation_id.as_ref()).await;
        self.finish_submit(result)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use difychat_core::{
        ChatResponse, ConversationId, HistoryQuery, InstallLinkResponse, Locale, Role, TurnRecord,
    };

    use super::{ChatSession, SessionPhase, SubmitOutcome};
    use crate::{ChatApi, ClientError};

    #[derive(Default)]
    struct ScriptedApi {
        replies: Mutex<VecDeque<Result<ChatResponse, ClientError>>>,
        history: Mutex<Option<Result<Vec<TurnRecord>, ClientError>>>,
        sent: Mutex<Vec<(String, Option<String>)>>,
        send_calls: AtomicUsize,
    }

    impl ScriptedApi {
        fn with_reply(self, reply: Result<ChatResponse, ClientError>) -> Self {
            self.replies.lock().expect("lock").push_back(reply);
            self
        }

        fn with_history(self, history: Result<Vec<TurnRecord>, ClientError>) -> Self {
            *self.history.lock().expect("lock") = Some(history);
            self
        }

        fn send_calls(&self) -> usize {
            self.send_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatApi for ScriptedApi {
        async fn send_message(
            &self,
            message: &str,
            conversation_id: Option<&ConversationId>,
        ) -> Result<ChatResponse, ClientError> {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            self.sent
                .lock()
                .expect("lock")
                .push((message.to_string(), conversation_id.map(|id| id.0.clone())));
            self.replies
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Decode("no scripted reply".to_string())))
        }

        async fn fetch_history(
            &self,
            _query: &HistoryQuery,
        ) -> Result<Vec<TurnRecord>, ClientError> {
            self.history.lock().expect("lock").take().unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn fetch_install_link(&self) -> Result<InstallLinkResponse, ClientError> {
            Err(ClientError::Decode("not scripted".to_string()))
        }
    }

    fn reply(message: &str, conversation_id: &str) -> ChatResponse {
        ChatResponse {
            conversation_id: conversation_id.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        }
    }

    fn record(
        id: &str,
        user: &str,
        assistant: &str,
        offset_secs: i64,
        conversation: &str,
    ) -> TurnRecord {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single().expect("base time");
        TurnRecord {
            id: id.to_string(),
            user_message: user.to_string(),
            assistant_message: assistant.to_string(),
            timestamp: base + Duration::seconds(offset_secs),
            conversation_id: conversation.to_string(),
        }
    }

    fn contents<A: ChatApi>(session: &ChatSession<A>) -> Vec<String> {
        session.messages().iter().map(|message| message.content.clone()).collect()
    }

    #[tokio::test]
    async fn history_renders_in_ascending_order_and_adopts_last_conversation() {
        let api = ScriptedApi::default().with_history(Ok(vec![
            record("t2", "C", "D", 2, "x"),
            record("t1", "A", "B", 1, "x"),
        ]));
        let mut session = ChatSession::new(api, Locale::Ja);

        session.load_history().await.expect("history");

        assert_eq!(contents(&session), vec!["A", "B", "C", "D"]);
        assert_eq!(session.conversation_id(), Some(&ConversationId("x".to_string())));
        let timestamps: Vec<_> =
            session.messages().iter().filter_map(|message| message.timestamp).collect();
        assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[tokio::test]
    async fn empty_history_leaves_no_active_conversation() {
        let mut session = ChatSession::new(ScriptedApi::default(), Locale::Ja);

        session.load_history().await.expect("history");

        assert!(session.messages().is_empty());
        assert_eq!(session.conversation_id(), None);
    }

    #[tokio::test]
    async fn failed_history_load_keeps_existing_transcript() {
        let api = ScriptedApi::default()
            .with_reply(Ok(reply("hi", "c-1")))
            .with_history(Err(ClientError::Status { status: 503, detail: "down".to_string() }));
        let mut session = ChatSession::new(api, Locale::En);
        session.set_draft("hello");
        session.submit().await;

        let result = session.load_history().await;

        assert!(matches!(result, Err(ClientError::Status { status: 503, .. })));
        assert_eq!(contents(&session), vec!["hello", "hi"]);
    }

    #[tokio::test]
    async fn blank_draft_is_ignored_without_network_call() {
        let mut session = ChatSession::new(ScriptedApi::default(), Locale::Ja);

        session.set_draft("   \n\t");
        let outcome = session.submit().await;

        assert_eq!(outcome, SubmitOutcome::Ignored);
        assert_eq!(session.api().send_calls(), 0);
        assert!(session.messages().is_empty());
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn successful_send_appends_reply_and_adopts_conversation_id() {
        let api = ScriptedApi::default().with_reply(Ok(reply("hi there", "conv-new")));
        let mut session = ChatSession::new(api, Locale::Ja);

        session.set_draft("hello");
        let outcome = session.submit().await;

        assert_eq!(outcome, SubmitOutcome::Replied);
        assert_eq!(contents(&session), vec!["hello", "hi there"]);
        assert_eq!(session.messages()[0].role, Role::User);
        assert_eq!(session.messages()[1].role, Role::Assistant);
        assert_eq!(session.conversation_id(), Some(&ConversationId("conv-new".to_string())));
        assert_eq!(session.draft(), "");
        assert!(session.input_enabled());
    }

    #[tokio::test]
    async fn follow_up_sends_the_active_conversation_id() {
        let api = ScriptedApi::default()
            .with_reply(Ok(reply("first", "conv-1")))
            .with_reply(Ok(reply("second", "conv-1")));
        let mut session = ChatSession::new(api, Locale::Ja);

        session.set_draft("one");
        session.submit().await;
        session.set_draft("two");
        session.submit().await;

        let sent = session.api().sent.lock().expect("lock").clone();
        assert_eq!(
            sent,
            vec![("one".to_string(), None), ("two".to_string(), Some("conv-1".to_string()))]
        );
    }

    #[tokio::test]
    async fn input_is_disabled_while_sending() {
        let mut session = ChatSession::new(ScriptedApi::default(), Locale::Ja);
        session.set_draft("hello");

        let pending = session.begin_submit().expect("pending send");

        assert_eq!(pending.message, "hello");
        assert_eq!(session.phase(), SessionPhase::Sending);
        assert!(!session.input_enabled());
        assert_eq!(contents(&session), vec!["hello"]);

        session.set_draft("again");
        assert!(session.begin_submit().is_none());

        session.finish_submit(Ok(reply("hi", "c")));
        assert!(session.input_enabled());
    }

    #[tokio::test]
    async fn upstream_failure_appends_exactly_one_fallback_message() {
        let api = ScriptedApi::default()
            .with_reply(Err(ClientError::Status { status: 502, detail: "bad gateway".into() }));
        let mut session = ChatSession::new(api, Locale::Ja);

        session.set_draft("hello");
        let outcome = session.submit().await;

        assert_eq!(outcome, SubmitOutcome::Fallback);
        let assistant: Vec<_> =
            session.messages().iter().filter(|message| message.role == Role::Assistant).collect();
        assert_eq!(assistant.len(), 1);
        assert_eq!(assistant[0].content, Locale::Ja.fallback_message());
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.input_enabled());
    }

    #[tokio::test]
    async fn malformed_reply_takes_the_fallback_path() {
        let api = ScriptedApi::default()
            .with_reply(Err(ClientError::Decode("missing field `message`".to_string())));
        let mut session = ChatSession::new(api, Locale::En);

        session.set_draft("hello");
        session.submit().await;

        assert_eq!(
            contents(&session),
            vec!["hello", "Sorry, something went wrong. Please try again."]
        );
        assert_eq!(session.conversation_id(), None);
    }
}
