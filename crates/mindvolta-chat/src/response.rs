//! Response generation for classified messages.
//!
//! The catalog holds one fixed reply per category. Callers go through the
//! [`ResponseGenerator`] trait so a dynamic generator can replace it later.

use std::collections::HashMap;

use async_trait::async_trait;

use mindvolta_core::config::ReferralConfig;
use mindvolta_core::types::Category;

// =============================================================================
// ResponseGenerator trait
// =============================================================================

/// Produces reply text for a classified message. Infallible.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Reply text for `category`.
    async fn generate(&self, category: Category) -> String;
}

// =============================================================================
// StaticResponseCatalog
// =============================================================================

const GREETING: &str =
    "Hello! I'm here to help with your mental health journey. How are you feeling today?";

const SADNESS: &str = "I understand you're going through a difficult time. It's okay to feel sad, and I'm here to support you. Would you like to talk about what's bothering you?";

const ANXIETY: &str = "Anxiety can feel overwhelming, but there are ways to manage it. Let's start with a simple breathing exercise: Breathe in slowly for 4 counts, hold for 4, then breathe out for 4. Repeat this a few times. How are you feeling right now?";

const HAPPINESS: &str =
    "I'm so glad to hear you're feeling good today! What's bringing you joy?";

const FALLBACK: &str = "Thank you for sharing that with me. I'm here to listen and support you through your mental health journey. Can you tell me more about how you're feeling today?";

/// Fixed reply per category, with the referral contact filled in from config.
#[derive(Debug, Clone)]
pub struct StaticResponseCatalog {
    replies: HashMap<Category, String>,
}

impl StaticResponseCatalog {
    pub fn new(referral: &ReferralConfig) -> Self {
        let referral_text = format!(
            "I understand you'd like to speak with a professional. I recommend {}, a qualified psychiatrist at {}. He specializes in {}.",
            referral.name, referral.facility, referral.specialties
        );

        let replies = HashMap::from([
            (Category::ProfessionalReferral, referral_text),
            (Category::Sadness, SADNESS.to_string()),
            (Category::Anxiety, ANXIETY.to_string()),
            (Category::Greeting, GREETING.to_string()),
            (Category::Happiness, HAPPINESS.to_string()),
            (Category::Default, FALLBACK.to_string()),
        ]);

        Self { replies }
    }

    /// Synchronous lookup used by the trait impl.
    pub fn reply_for(&self, category: Category) -> &str {
        self.replies
            .get(&category)
            .map(String::as_str)
            .unwrap_or(FALLBACK)
    }
}

impl Default for StaticResponseCatalog {
    fn default() -> Self {
        Self::new(&ReferralConfig::default())
    }
}

#[async_trait]
impl ResponseGenerator for StaticResponseCatalog {
    async fn generate(&self, category: Category) -> String {
        self.reply_for(category).to_string()
    }
}
