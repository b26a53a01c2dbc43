//! Chat history persistence.
//!
//! A bounded JSON log of prompt/response pairs, appended after each exchange
//! and rendered by the `/history` command.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One user/assistant exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub prompt: String,
    pub response: String,
    /// Seconds since UNIX_EPOCH.
    pub timestamp: u64,
}

/// Bounded persistent chat history.
#[derive(Debug)]
pub struct ChatHistory {
    path: PathBuf,
    max_items: usize,
    interactions: Vec<Interaction>,
}

impl ChatHistory {
    /// Load history from `path`, keeping at most `max_items` entries.
    pub fn load(path: impl Into<PathBuf>, max_items: usize) -> Self {
        let path = path.into();

        let mut interactions = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<Interaction>>(&content) {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(target: "chat", "discarding corrupt history file: {e}");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        if interactions.len() > max_items {
            interactions.drain(..interactions.len() - max_items);
        }

        Self {
            path,
            max_items,
            interactions,
        }
    }

    /// Record an exchange and persist.
    pub fn add_interaction(&mut self, prompt: impl Into<String>, response: impl Into<String>) {
        self.interactions.push(Interaction {
            prompt: prompt.into(),
            response: response.into(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        });

        if self.interactions.len() > self.max_items {
            let excess = self.interactions.len() - self.max_items;
            self.interactions.drain(..excess);
        }

        self.save();
    }

    /// The most recent `n` interactions, oldest first.
    pub fn recent(&self, n: usize) -> &[Interaction] {
        let start = self.interactions.len().saturating_sub(n);
        &self.interactions[start..]
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    fn save(&self) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(target: "chat", "cannot create history dir: {e}");
                return;
            }
        }

        match serde_json::to_string_pretty(&self.interactions) {
            Ok(content) => {
                if let Err(e) = std::fs::write(&self.path, content) {
                    tracing::warn!(target: "chat", "cannot write history file: {e}");
                }
            }
            Err(e) => tracing::warn!(target: "chat", "cannot serialize history: {e}"),
        }
    }
}
