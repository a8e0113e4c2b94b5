//! Live update channel.
//!
//! The builder publishes [`LiveEvent`]s through an [`Emitter`]; transports
//! subscribe to it. The WebSocket transport in [`ws`] forwards every event
//! as JSON to connected browsers.

mod emitter;
mod message;
pub mod ws;

pub use emitter::Emitter;
pub use message::LiveEvent;
