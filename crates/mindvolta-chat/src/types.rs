//! Dispatch results and push-channel wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mindvolta_core::types::{Category, Message};

/// Entry point a message arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Request/response; both messages are returned to the caller.
    Pull,
    /// Connection-based; the agent reply is broadcast after a delay.
    Push,
}

/// Both sides of one processed message.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub user_message: Message,
    pub agent_message: Message,
    pub category: Category,
    pub requires_action: bool,
}

/// A message as presented to one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Uuid,
    pub text: String,
    pub is_from_user: bool,
    pub timestamp: DateTime<Utc>,
    pub requires_action: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

impl MessageView {
    /// Render `message` from `viewer`'s perspective.
    pub fn for_viewer(message: &Message, viewer: &str) -> Self {
        Self {
            id: message.id,
            text: message.content.clone(),
            is_from_user: message.sender_id == viewer,
            timestamp: message.created_at,
            requires_action: message.requires_action,
            category: message.category,
        }
    }
}

/// Server-to-client push frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    Joined {
        #[serde(rename = "connectionId")]
        connection_id: Uuid,
    },
    ReceiveMessage(MessageView),
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindvolta_core::types::now_millis;

    #[test]
    fn test_view_of_user_message() {
        let msg = Message::from_user("user-1", "hi", now_millis());
        let view = MessageView::for_viewer(&msg, "user-1");
        assert!(view.is_from_user);
        assert_eq!(view.text, "hi");
        assert!(view.category.is_none());

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["isFromUser"], true);
        assert_eq!(json["requiresAction"], false);
        assert!(json.get("category").is_none());
    }

    #[test]
    fn test_view_of_agent_message() {
        let msg = Message::from_agent(
            "user-1",
            "see a professional",
            Category::ProfessionalReferral,
            now_millis(),
        );
        let view = MessageView::for_viewer(&msg, "user-1");
        assert!(!view.is_from_user);
        assert!(view.requires_action);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["category"], "professional_referral");
        assert_eq!(json["requiresAction"], true);
    }

    #[test]
    fn test_push_event_wire_format() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(PushEvent::Joined { connection_id: id }).unwrap();
        assert_eq!(json["event"], "joined");
        assert_eq!(json["data"]["connectionId"], id.to_string());

        let json = serde_json::to_value(PushEvent::Error {
            message: "nope".to_string(),
        })
        .unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["data"]["message"], "nope");

        let msg = Message::from_user("user-1", "hello", now_millis());
        let json =
            serde_json::to_value(PushEvent::ReceiveMessage(MessageView::for_viewer(&msg, "user-1")))
                .unwrap();
        assert_eq!(json["event"], "receive_message");
        assert_eq!(json["data"]["text"], "hello");
    }
}
