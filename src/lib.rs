//! termchat: a terminal chat client for LLM APIs with retrieval-augmented
//! context.
//!
//! The retrieval engine (chunking, local embeddings, exact vector search)
//! lives in [`retrieval`]; the interactive application around it lives in
//! [`chat`] and [`ui`].

pub mod chat;
pub mod config;
pub mod logging;
pub mod retrieval;
pub mod ui;

pub use chat::{ChatClient, ChatSession, Provider};
pub use config::Settings;
pub use retrieval::{
    DocumentChunker, EmbeddingProvider, FastEmbedProvider, RetrievalService, SearchResult,
    TextChunk, VectorIndex,
};
