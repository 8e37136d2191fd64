use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::dialogue::DialogueManager;
use crate::session::{ConversationState, Session, SessionId};

const EMPTY_UTTERANCE_REPLY: &str = "I didn't catch that. Could you say it again?";

/// Session registry in front of the dialogue manager. Each session sits
/// behind its own lock, so turns of one session run one at a time while
/// different sessions proceed concurrently.
pub struct ChatRuntime {
    dialogue: Arc<DialogueManager>,
    sessions: Mutex<HashMap<SessionId, Arc<Mutex<Session>>>>,
}

impl ChatRuntime {
    pub fn new(dialogue: DialogueManager) -> Self {
        Self { dialogue: Arc::new(dialogue), sessions: Mutex::new(HashMap::new()) }
    }

    pub fn dialogue(&self) -> &DialogueManager {
        &self.dialogue
    }

    /// Runs one utterance for `session_id`, creating the session on first use.
    pub async fn process_turn(&self, session_id: &str, text: &str) -> String {
        let utterance = text.trim();
        if utterance.is_empty() {
            tracing::debug!(session_id, "ignored empty utterance");
            return EMPTY_UTTERANCE_REPLY.to_string();
        }

        let handle = self.session(session_id).await;
        let mut session = handle.lock().await;
        self.dialogue.handle_turn(&mut session, utterance).await
    }

    pub async fn session_state(&self, session_id: &str) -> Option<ConversationState> {
        let handle = self.sessions.lock().await.get(session_id).cloned()?;
        let state = handle.lock().await.state();
        Some(state)
    }

    /// Copy of the session as of the last completed turn.
    pub async fn snapshot(&self, session_id: &str) -> Option<Session> {
        let handle = self.sessions.lock().await.get(session_id).cloned()?;
        let session = handle.lock().await.clone();
        Some(session)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Forgets a session. Stored customers, orders and reservations remain.
    pub async fn end_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.lock().await.remove(session_id).is_some();
        if removed {
            tracing::info!(session_id, "session ended");
        }
        removed
    }

    async fn session(&self, session_id: &str) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::info!(session_id, "session started");
                Arc::new(Mutex::new(Session::new(session_id)))
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bistro_db::{connect_with_settings, migrations, CatalogSeed, SqlBookingEngine, SqlCatalog};

    use super::{ChatRuntime, EMPTY_UTTERANCE_REPLY};
    use crate::dialogue::{DialogueManager, DialogueSettings};
    use crate::llm::DisabledLlm;
    use crate::session::ConversationState;

    async fn runtime() -> ChatRuntime {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        CatalogSeed::load(&pool).await.expect("seed");
        let dialogue = DialogueManager::new(
            Arc::new(SqlBookingEngine::new(pool.clone())),
            Arc::new(SqlCatalog::new(pool)),
            Arc::new(DisabledLlm),
            DialogueSettings::default(),
        )
        .await
        .expect("dialogue manager");
        ChatRuntime::new(dialogue)
    }

    #[tokio::test]
    async fn sessions_are_created_on_first_turn_and_kept_apart() {
        let runtime = runtime().await;

        runtime.process_turn("alice", "hi").await;
        runtime.process_turn("alice", "my name is Alice").await;
        runtime.process_turn("bob", "hello").await;

        assert_eq!(runtime.session_count().await, 2);
        assert_eq!(runtime.session_state("alice").await, Some(ConversationState::AwaitingPhone));
        assert_eq!(runtime.session_state("bob").await, Some(ConversationState::AwaitingName));
        assert_eq!(runtime.session_state("carol").await, None);

        let alice = runtime.snapshot("alice").await.expect("alice session");
        let bob = runtime.snapshot("bob").await.expect("bob session");
        assert_ne!(alice.customer_id, bob.customer_id);
    }

    #[tokio::test]
    async fn concurrent_turns_of_one_session_are_serialized() {
        let runtime = runtime().await;

        let (first, second) = tokio::join!(
            runtime.process_turn("dana", "hi"),
            runtime.process_turn("dana", "what are your hours?"),
        );

        assert!(!first.is_empty());
        assert!(!second.is_empty());
        let session = runtime.snapshot("dana").await.expect("session");
        assert_eq!(session.history.len(), 4);
        assert!(session.customer_id.is_some());
    }

    #[tokio::test]
    async fn blank_input_does_not_touch_the_session() {
        let runtime = runtime().await;

        let reply = runtime.process_turn("dana", "   ").await;

        assert_eq!(reply, EMPTY_UTTERANCE_REPLY);
        assert_eq!(runtime.session_count().await, 0);
    }

    #[tokio::test]
    async fn ended_sessions_start_over() {
        let runtime = runtime().await;
        runtime.process_turn("dana", "hi").await;

        assert!(runtime.end_session("dana").await);
        assert!(!runtime.end_session("dana").await);

        runtime.process_turn("dana", "hi").await;
        assert_eq!(runtime.session_state("dana").await, Some(ConversationState::AwaitingName));
    }
}
