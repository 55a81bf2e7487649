//! Error types for message dispatch.

use mindvolta_core::error::MindvoltaError;

/// Errors from the dispatch pipeline.
///
/// `EmptyMessage`, `MessageTooLong`, `UnsupportedReceiver` and `ReservedUser`
/// are validation failures raised before anything is persisted.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("unsupported receiver: {0}")]
    UnsupportedReceiver(String),
    #[error("user id is reserved: {0}")]
    ReservedUser(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("delivery error: {0}")]
    Delivery(String),
}

impl ChatError {
    /// Whether the input was rejected before reaching the store.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ChatError::EmptyMessage
                | ChatError::MessageTooLong(_)
                | ChatError::UnsupportedReceiver(_)
                | ChatError::ReservedUser(_)
        )
    }
}

impl From<MindvoltaError> for ChatError {
    fn from(err: MindvoltaError) -> Self {
        ChatError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(2000).to_string(),
            "message exceeds maximum length of 2000 characters"
        );
        assert_eq!(
            ChatError::UnsupportedReceiver("user-2".to_string()).to_string(),
            "unsupported receiver: user-2"
        );
        assert_eq!(
            ChatError::ReservedUser("ai".to_string()).to_string(),
            "user id is reserved: ai"
        );
        assert_eq!(
            ChatError::Persistence("disk full".to_string()).to_string(),
            "persistence error: disk full"
        );
        assert_eq!(
            ChatError::Delivery("no sessions".to_string()).to_string(),
            "delivery error: no sessions"
        );
    }

    #[test]
    fn test_validation_classification() {
        assert!(ChatError::EmptyMessage.is_validation());
        assert!(ChatError::MessageTooLong(1).is_validation());
        assert!(ChatError::UnsupportedReceiver("x".into()).is_validation());
        assert!(ChatError::ReservedUser("ai".into()).is_validation());
        assert!(!ChatError::Persistence("x".into()).is_validation());
        assert!(!ChatError::Delivery("x".into()).is_validation());
    }

    #[test]
    fn test_from_storage_error_is_persistence() {
        let err: ChatError = MindvoltaError::Storage("connection lost".to_string()).into();
        assert!(matches!(err, ChatError::Persistence(_)));
        assert!(err.to_string().contains("connection lost"));
    }
}
