//! Domain model for message transport.

mod content;
mod envelope;
mod message;

pub use content::MessageContent;
pub use envelope::{EnvelopeId, EnvelopeMetadata, MessageEnvelope, Routing};
pub use message::{AgentMessage, MessageMetadata, Priority};
