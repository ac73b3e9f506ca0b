//! Shared message pipeline, independent of the chat transport.
//!
//! The OneBot handler parses the inbound event and calls
//! `process_private_message`; everything from the guard checks to reply
//! delivery happens here, once.

pub mod context;
pub mod process;
pub mod slash;

pub use context::MessageContext;
pub use process::{process_private_message, Outcome};
