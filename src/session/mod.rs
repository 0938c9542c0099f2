//! Conversation persistence.

pub mod repository;
pub mod store;

pub use repository::{FileSessionRepository, InMemorySessionRepository, SessionRepository};
pub use store::SessionStore;
