//! Message dispatch for MindVolta support chat.
//!
//! Classifies inbound messages with a fixed rule table, produces a catalog
//! response, persists both sides of the exchange, and delivers the response
//! either directly (pull) or to every live session of the user after a short
//! simulated latency (push).

pub mod classifier;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod response;
pub mod types;

pub use classifier::classify;
pub use delivery::DeliveryScheduler;
pub use dispatcher::Dispatcher;
pub use error::ChatError;
pub use registry::{ConnectionId, ConnectionRegistry};
pub use response::{ResponseGenerator, StaticResponseCatalog};
pub use types::{Channel, Exchange, MessageView, PushEvent};
