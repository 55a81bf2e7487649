use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Participant id reserved for the automated support agent.
///
/// Never issued to a real user.
pub const AGENT_SENTINEL: &str = "ai";

// =============================================================================
// Enums
// =============================================================================

/// Intent category assigned to an inbound message.
///
/// Variants are listed in classification precedence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// The user asks for a therapist, doctor, or similar professional.
    ProfessionalReferral,
    Sadness,
    Anxiety,
    Greeting,
    Happiness,
    /// No rule matched.
    Default,
}

impl Category {
    /// All categories, highest precedence first.
    pub const ALL: [Category; 6] = [
        Category::ProfessionalReferral,
        Category::Sadness,
        Category::Anxiety,
        Category::Greeting,
        Category::Happiness,
        Category::Default,
    ];

    /// Stable snake_case name, used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ProfessionalReferral => "professional_referral",
            Category::Sadness => "sadness",
            Category::Anxiety => "anxiety",
            Category::Greeting => "greeting",
            Category::Happiness => "happiness",
            Category::Default => "default",
        }
    }

    /// Parse a name produced by [`Category::as_str`].
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Whether responses in this category carry an actionable referral affordance.
    pub fn requires_action(&self) -> bool {
        matches!(self, Category::ProfessionalReferral)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Message
// =============================================================================

/// A persisted chat message between a user and the support agent.
///
/// Created once, never mutated. `created_at` carries millisecond precision so
/// that it survives a round trip through storage unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub is_agent_response: bool,
    /// Classified category; present on agent responses only.
    pub category: Option<Category>,
    pub requires_action: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A message sent by `user_id` to the agent.
    pub fn from_user(user_id: &str, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            sender_id: user_id.to_string(),
            receiver_id: AGENT_SENTINEL.to_string(),
            is_agent_response: false,
            category: None,
            requires_action: false,
            created_at: truncate_millis(created_at),
        }
    }

    /// An agent response addressed to `user_id`.
    pub fn from_agent(
        user_id: &str,
        content: impl Into<String>,
        category: Category,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            sender_id: AGENT_SENTINEL.to_string(),
            receiver_id: user_id.to_string(),
            is_agent_response: true,
            category: Some(category),
            requires_action: category.requires_action(),
            created_at: truncate_millis(created_at),
        }
    }

    /// Whether `participant` is the sender or receiver of this message.
    pub fn involves(&self, participant: &str) -> bool {
        self.sender_id == participant || self.receiver_id == participant
    }
}

/// Current time truncated to millisecond precision.
pub fn now_millis() -> DateTime<Utc> {
    truncate_millis(Utc::now())
}

/// Issues strictly increasing millisecond timestamps.
///
/// Wall-clock time is used when it is ahead of the last stamp; otherwise the
/// last stamp plus one millisecond. Keeps a reply after its message and the
/// next message after that reply even when they land in the same millisecond.
#[derive(Debug, Default)]
pub struct MessageClock {
    last_ms: AtomicI64,
}

impl MessageClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) -> DateTime<Utc> {
        let now = now_millis().timestamp_millis();
        let previous = self
            .last_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        let stamp = now.max(previous + 1);
        DateTime::from_timestamp_millis(stamp).unwrap_or_else(now_millis)
    }
}

fn truncate_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}
