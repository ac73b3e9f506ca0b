pub mod cq;
pub mod error;
pub mod event;
pub mod handler;
pub mod send;

pub use error::ChannelError;
pub use event::{InboundEvent, PrivateMessage};
pub use send::OneBotSender;
