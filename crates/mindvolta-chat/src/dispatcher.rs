//! Dispatcher: central coordinator for one inbound message.
//!
//! Validates the text, persists the user message, classifies it, generates
//! and persists the agent reply, then hands the reply to the caller (pull)
//! or to the delivery scheduler (push).

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use mindvolta_core::config::ChatConfig;
use mindvolta_core::error::MindvoltaError;
use mindvolta_core::types::{Message, MessageClock, AGENT_SENTINEL};
use mindvolta_storage::ConversationStore;

use crate::classifier::classify;
use crate::delivery::DeliveryScheduler;
use crate::error::ChatError;
use crate::registry::ConnectionRegistry;
use crate::response::ResponseGenerator;
use crate::types::{Channel, Exchange};

/// Coordinates validation, persistence, classification and delivery.
pub struct Dispatcher {
    store: Arc<dyn ConversationStore>,
    generator: Arc<dyn ResponseGenerator>,
    scheduler: DeliveryScheduler,
    clock: MessageClock,
    config: ChatConfig,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        generator: Arc<dyn ResponseGenerator>,
        registry: Arc<ConnectionRegistry>,
        config: ChatConfig,
    ) -> Self {
        let scheduler =
            DeliveryScheduler::new(registry, Duration::from_millis(config.response_delay_ms));
        Self {
            store,
            generator,
            scheduler,
            clock: MessageClock::new(),
            config,
        }
    }

    /// Process one message from `user_id` arriving through `channel`.
    ///
    /// On success both messages are durably stored. For [`Channel::Push`]
    /// the agent message is also scheduled for broadcast; a scheduling
    /// failure is logged and does not fail the call.
    pub async fn handle(
        &self,
        user_id: &str,
        text: &str,
        channel: Channel,
    ) -> Result<Exchange, ChatError> {
        check_user(user_id)?;
        self.validate(text)?;

        let user_message = self
            .append(Message::from_user(user_id, text, self.clock.tick()))
            .await
            .map_err(|e| {
                error!(user = %user_id, "Failed to persist user message: {}", e);
                ChatError::from(e)
            })?;

        let category = classify(text);
        let reply = self.generator.generate(category).await;

        let agent_message = self
            .append(Message::from_agent(
                user_id,
                reply,
                category,
                self.clock.tick(),
            ))
            .await
            .map_err(|e| {
                error!(user = %user_id, "Failed to persist agent response: {}", e);
                ChatError::from(e)
            })?;

        debug!(
            user = %user_id,
            category = %category,
            channel = ?channel,
            "Message dispatched"
        );

        if channel == Channel::Push {
            if let Err(e) = self.scheduler.schedule(agent_message.clone()) {
                warn!(user = %user_id, message = %agent_message.id, "Could not schedule push delivery: {}", e);
            }
        }

        Ok(Exchange {
            requires_action: agent_message.requires_action,
            user_message,
            agent_message,
            category,
        })
    }

    /// Reject empty, whitespace-only or oversized text.
    pub fn validate(&self, text: &str) -> Result<(), ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.chars().count() > self.config.max_message_chars {
            return Err(ChatError::MessageTooLong(self.config.max_message_chars));
        }
        Ok(())
    }

    /// Most recent messages for `user_id`, oldest first.
    ///
    /// `limit` is clamped to `1..=history_limit`; `None` means the cap.
    pub async fn history(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, ChatError> {
        check_user(user_id)?;
        let cap = self.config.history_limit.max(1);
        let limit = limit.unwrap_or(cap).clamp(1, cap);

        let store = Arc::clone(&self.store);
        let owner = user_id.to_string();
        tokio::task::spawn_blocking(move || store.history(&owner, limit))
            .await
            .map_err(|e| MindvoltaError::Storage(format!("history task failed: {}", e)))
            .and_then(|result| result)
            .map_err(|e| {
                error!(user = %user_id, "Failed to load history: {}", e);
                ChatError::from(e)
            })
    }

    pub fn scheduler(&self) -> &DeliveryScheduler {
        &self.scheduler
    }

    async fn append(&self, message: Message) -> Result<Message, MindvoltaError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.append(message))
            .await
            .map_err(|e| MindvoltaError::Storage(format!("append task failed: {}", e)))?
    }

    /// Cancel pending push deliveries. Stored messages are unaffected.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}

/// The agent sentinel names the support agent and can never act as a user.
pub fn check_user(user_id: &str) -> Result<(), ChatError> {
    if user_id == AGENT_SENTINEL {
        return Err(ChatError::ReservedUser(user_id.to_string()));
    }
    Ok(())
}

/// Only the support agent can be addressed; a missing receiver means the agent.
pub fn check_receiver(receiver_id: Option<&str>) -> Result<(), ChatError> {
    match receiver_id {
        None => Ok(()),
        Some(id) if id == AGENT_SENTINEL => Ok(()),
        Some(other) => Err(ChatError::UnsupportedReceiver(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mindvolta_core::types::Category;
    use mindvolta_storage::{Database, SqliteConversationStore};
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use crate::response::StaticResponseCatalog;
    use crate::types::PushEvent;

    fn test_config(delay_ms: u64) -> ChatConfig {
        ChatConfig {
            response_delay_ms: delay_ms,
            ..ChatConfig::default()
        }
    }

    fn make_dispatcher_with(
        store: Arc<dyn ConversationStore>,
        registry: Arc<ConnectionRegistry>,
        delay_ms: u64,
    ) -> Dispatcher {
        Dispatcher::new(
            store,
            Arc::new(StaticResponseCatalog::default()),
            registry,
            test_config(delay_ms),
        )
    }

    fn make_dispatcher() -> Dispatcher {
        let store = SqliteConversationStore::new(Arc::new(Database::in_memory().unwrap()));
        make_dispatcher_with(Arc::new(store), Arc::new(ConnectionRegistry::new()), 20)
    }

    /// Store that fails every append after the first `ok_appends`.
    struct FlakyStore {
        inner: SqliteConversationStore,
        ok_appends: usize,
        appends: AtomicUsize,
    }

    impl FlakyStore {
        fn new(ok_appends: usize) -> Self {
            Self {
                inner: SqliteConversationStore::new(Arc::new(Database::in_memory().unwrap())),
                ok_appends,
                appends: AtomicUsize::new(0),
            }
        }
    }

    impl ConversationStore for FlakyStore {
        fn append(&self, message: Message) -> Result<Message, MindvoltaError> {
            if self.appends.fetch_add(1, Ordering::SeqCst) >= self.ok_appends {
                return Err(MindvoltaError::Storage("store unavailable".to_string()));
            }
            self.inner.append(message)
        }

        fn history(&self, user_id: &str, limit: usize) -> Result<Vec<Message>, MindvoltaError> {
            self.inner.history(user_id, limit)
        }
    }

    #[tokio::test]
    async fn test_pull_returns_both_messages() {
        let dispatcher = make_dispatcher();
        let exchange = dispatcher
            .handle("user-1", "I feel so anxious lately", Channel::Pull)
            .await
            .unwrap();

        assert_eq!(exchange.category, Category::Anxiety);
        assert!(!exchange.requires_action);
        assert_eq!(exchange.user_message.sender_id, "user-1");
        assert_eq!(exchange.user_message.receiver_id, AGENT_SENTINEL);
        assert!(!exchange.user_message.is_agent_response);
        assert_eq!(exchange.agent_message.sender_id, AGENT_SENTINEL);
        assert_eq!(exchange.agent_message.receiver_id, "user-1");
        assert!(exchange.agent_message.is_agent_response);
        assert!(exchange.agent_message.content.contains("breathing exercise"));
    }

    #[tokio::test]
    async fn test_history_grows_by_pair_in_order() {
        let dispatcher = make_dispatcher();
        let before = dispatcher.history("user-1", None).await.unwrap().len();

        let exchange = dispatcher.handle("user-1", "hi", Channel::Pull).await.unwrap();
        let history = dispatcher.history("user-1", None).await.unwrap();

        assert_eq!(history.len(), before + 2);
        assert_eq!(history[history.len() - 2], exchange.user_message);
        assert_eq!(history[history.len() - 1], exchange.agent_message);
        assert!(exchange.agent_message.created_at > exchange.user_message.created_at);
        assert_eq!(exchange.category, Category::Greeting);
    }

    #[tokio::test]
    async fn test_referral_requires_action() {
        let dispatcher = make_dispatcher();
        let exchange = dispatcher
            .handle("user-1", "I think I need to see a therapist", Channel::Pull)
            .await
            .unwrap();

        assert_eq!(exchange.category, Category::ProfessionalReferral);
        assert!(exchange.requires_action);
        assert!(exchange.agent_message.requires_action);
        assert!(exchange.agent_message.content.contains("Dr. Saheed"));
    }

    #[tokio::test]
    async fn test_requires_action_only_for_referral() {
        let dispatcher = make_dispatcher();
        for text in ["hi", "I am sad", "I am so happy", "I went for a walk", "panic"] {
            let exchange = dispatcher.handle("user-1", text, Channel::Pull).await.unwrap();
            assert!(!exchange.requires_action, "{text}");
            assert!(!exchange.agent_message.requires_action, "{text}");
        }
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_without_persisting() {
        let dispatcher = make_dispatcher();
        for text in ["", "   ", "\n\t"] {
            let err = dispatcher.handle("user-1", text, Channel::Pull).await.unwrap_err();
            assert!(matches!(err, ChatError::EmptyMessage));
        }
        assert!(dispatcher.history("user-1", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_message_is_rejected() {
        let dispatcher = make_dispatcher();
        let text = "a".repeat(2001);
        let err = dispatcher.handle("user-1", &text, Channel::Pull).await.unwrap_err();
        assert!(matches!(err, ChatError::MessageTooLong(2000)));
        assert!(dispatcher.history("user-1", None).await.unwrap().is_empty());

        // Limit counts characters, not bytes.
        let text = "é".repeat(2000);
        assert!(dispatcher.handle("user-1", &text, Channel::Pull).await.is_ok());
    }

    #[tokio::test]
    async fn test_user_append_failure_aborts_pipeline() {
        let store = Arc::new(FlakyStore::new(0));
        let dispatcher =
            make_dispatcher_with(store.clone(), Arc::new(ConnectionRegistry::new()), 0);

        let err = dispatcher.handle("user-1", "hi", Channel::Pull).await.unwrap_err();
        assert!(matches!(err, ChatError::Persistence(_)));
        assert_eq!(store.appends.load(Ordering::SeqCst), 1);
        assert!(store.inner.history("user-1", 100).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_agent_append_failure_is_persistence_error() {
        let store = Arc::new(FlakyStore::new(1));
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.join("user-1", Uuid::new_v4(), tx);
        let dispatcher = make_dispatcher_with(store.clone(), registry, 0);

        let err = dispatcher.handle("user-1", "hi", Channel::Push).await.unwrap_err();
        assert!(matches!(err, ChatError::Persistence(_)));
        assert_eq!(dispatcher.scheduler().pending_count(), 0);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_push_delivers_to_every_session() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let first = Uuid::new_v4();
        registry.join("user-1", first, tx1);
        registry.join("user-1", Uuid::new_v4(), tx2);

        let store = SqliteConversationStore::new(Arc::new(Database::in_memory().unwrap()));
        let dispatcher = make_dispatcher_with(Arc::new(store), registry.clone(), 50);

        let exchange = dispatcher.handle("user-1", "hello", Channel::Push).await.unwrap();
        assert!(dispatcher.scheduler().is_pending(exchange.agent_message.id));

        // Nothing is pushed before the delay; one session leaves early.
        assert!(rx1.try_recv().is_err());
        assert_eq!(registry.leave(first), Some("user-1".to_string()));

        let event = tokio::time::timeout(Duration::from_secs(2), rx2.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            PushEvent::ReceiveMessage(view) => {
                assert_eq!(view.id, exchange.agent_message.id);
                assert_eq!(view.category, Some(Category::Greeting));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx1.try_recv().is_err());

        // Still retrievable through pull.
        let history = dispatcher.history("user-1", None).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_push_without_sessions_still_persists() {
        let dispatcher = make_dispatcher();
        let exchange = dispatcher.handle("user-1", "hello", Channel::Push).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let history = dispatcher.history("user-1", None).await.unwrap();
        assert_eq!(history.last(), Some(&exchange.agent_message));
    }

    #[tokio::test]
    async fn test_pull_does_not_schedule() {
        let dispatcher = make_dispatcher();
        dispatcher.handle("user-1", "hello", Channel::Pull).await.unwrap();
        assert_eq!(dispatcher.scheduler().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_push_after_shutdown_still_succeeds() {
        let dispatcher = make_dispatcher();
        dispatcher.shutdown().await;

        let exchange = dispatcher.handle("user-1", "hello", Channel::Push).await.unwrap();
        assert_eq!(exchange.category, Category::Greeting);
        assert_eq!(dispatcher.scheduler().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_history_limit_is_clamped() {
        let dispatcher = make_dispatcher();
        for i in 0..60 {
            dispatcher
                .handle("user-1", &format!("note {}", i), Channel::Pull)
                .await
                .unwrap();
        }

        assert_eq!(dispatcher.history("user-1", None).await.unwrap().len(), 100);
        assert_eq!(dispatcher.history("user-1", Some(500)).await.unwrap().len(), 100);
        assert_eq!(dispatcher.history("user-1", Some(0)).await.unwrap().len(), 1);

        let last_two = dispatcher.history("user-1", Some(2)).await.unwrap();
        assert_eq!(last_two[0].content, "note 59");
        assert!(last_two[1].is_agent_response);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let dispatcher = make_dispatcher();
        dispatcher.handle("user-1", "hi", Channel::Pull).await.unwrap();
        dispatcher.handle("user-2", "I am sad", Channel::Pull).await.unwrap();

        let history = dispatcher.history("user-1", None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|m| m.involves("user-1")));
    }

    #[tokio::test]
    async fn test_agent_sentinel_cannot_act_as_user() {
        let dispatcher = make_dispatcher();
        dispatcher
            .handle("user-1", "I think I need to see a therapist", Channel::Pull)
            .await
            .unwrap();

        let err = dispatcher
            .handle(AGENT_SENTINEL, "hello", Channel::Pull)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ReservedUser(_)));
        assert!(err.is_validation());

        // Nothing is stored under the sentinel as sender.
        let history = dispatcher.history("user-1", None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history
            .iter()
            .all(|m| (m.sender_id == AGENT_SENTINEL) == m.is_agent_response));

        // And the sentinel cannot read everyone's agent replies.
        let err = dispatcher.history(AGENT_SENTINEL, None).await.unwrap_err();
        assert!(matches!(err, ChatError::ReservedUser(_)));
    }

    #[test]
    fn test_check_user() {
        assert!(check_user("user-1").is_ok());
        assert!(check_user("AI").is_ok());
        assert!(matches!(check_user("ai"), Err(ChatError::ReservedUser(_))));
    }

    #[test]
    fn test_check_receiver() {
        assert!(check_receiver(None).is_ok());
        assert!(check_receiver(Some("ai")).is_ok());
        let err = check_receiver(Some("user-2")).unwrap_err();
        assert!(matches!(err, ChatError::UnsupportedReceiver(ref id) if id == "user-2"));
    }
}
