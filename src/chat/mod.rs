//! Chat application: provider adapters, streaming client, REPL, persistence.

pub mod adapter;
pub mod cache;
pub mod client;
pub mod history;
pub mod prompt;
pub mod session;

pub use adapter::{Message, Provider, Role};
pub use cache::ResponseCache;
pub use client::{ChatClient, ChatError, ChatEvent};
pub use history::{ChatHistory, Interaction};
pub use session::ChatSession;
