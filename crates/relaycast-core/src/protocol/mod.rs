//! Wire protocol: JSON envelopes, replies, and message status.
//!
//! Envelopes are lenient on decode (unknown fields ignored) so peers built
//! against newer schema revisions keep working; structural validation is the
//! pipeline's job, not serde's.

pub mod envelope;
pub mod status;

pub use envelope::{Ack, Body, Envelope, EnvelopeKind, ErrorReply};
pub use status::MessageStatus;
