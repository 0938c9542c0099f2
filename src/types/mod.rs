//! Core types for roci-chat.

pub mod message;
pub mod session;
pub mod stream;

pub use message::*;
pub use session::*;
pub use stream::*;
