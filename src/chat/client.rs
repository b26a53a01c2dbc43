//! Streaming HTTP client for chat completions.
//!
//! Sends one request per user turn and forwards content deltas to the caller
//! as they arrive. Network and timeout failures are retried with a fixed
//! delay; API-level rejections surface immediately with the server's message.

use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;

use super::adapter::{Message, Provider};
use crate::config::Settings;

/// Errors from a chat request.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("stream error: {0}")]
    Stream(String),
}

impl ChatError {
    /// Transient failures worth retrying; API rejections are not.
    fn is_retryable(&self) -> bool {
        matches!(self, ChatError::Network(_) | ChatError::Timeout)
    }
}

/// Events emitted while a response streams in.
#[derive(Debug)]
pub enum ChatEvent {
    /// A content fragment arrived.
    Delta(String),
    /// A transient failure occurred; the request will be retried.
    Retrying { attempt: u32, max: u32, error: String },
}

/// Chat-completions client bound to one provider and model.
pub struct ChatClient {
    http: reqwest::Client,
    provider: Provider,
    api_key: String,
    api_url: String,
    model: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl ChatClient {
    /// Build a client from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.api.timeout_secs))
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;

        Ok(Self {
            http,
            provider: settings.api.provider,
            api_key: settings.api.key.clone(),
            api_url: settings.api_url(),
            model: settings.api.model.clone(),
            max_retries: settings.api.max_retries.max(1),
            retry_delay: Duration::from_secs(settings.api.retry_delay_secs),
        })
    }

    /// Provider this client is bound to.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Model name sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether an API key is configured.
    pub fn has_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Send `messages` and stream the response.
    ///
    /// `on_event` receives each content delta in arrival order, plus retry
    /// notices. Returns the accumulated response text.
    pub async fn stream_chat(
        &self,
        messages: &[Message],
        on_event: &mut dyn FnMut(ChatEvent),
    ) -> Result<String, ChatError> {
        let mut attempt = 1;

        loop {
            match self.request_once(messages, on_event).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    tracing::warn!(
                        target: "chat",
                        "request failed (attempt {attempt}/{}): {e}",
                        self.max_retries
                    );
                    on_event(ChatEvent::Retrying {
                        attempt,
                        max: self.max_retries,
                        error: e.to_string(),
                    });
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_once(
        &self,
        messages: &[Message],
        on_event: &mut dyn FnMut(ChatEvent),
    ) -> Result<String, ChatError> {
        let body = self.provider.request_body(&self.model, messages, true);

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", self.provider.auth_header(&self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| "unknown error".to_string());

            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        // Accumulate bytes and drain complete lines as they arrive. A delta
        // can be split across network chunks, so framing happens here rather
        // than per-chunk.
        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut full_response = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(classify_reqwest_error)?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                let line = String::from_utf8_lossy(&line);

                if let Some(delta) = self.provider.parse_stream_line(line.trim()) {
                    full_response.push_str(&delta);
                    on_event(ChatEvent::Delta(delta));
                }
            }
        }

        // Trailing line without a newline terminator.
        if !buffer.is_empty() {
            let line = String::from_utf8_lossy(&buffer);
            if let Some(delta) = self.provider.parse_stream_line(line.trim()) {
                full_response.push_str(&delta);
                on_event(ChatEvent::Delta(delta));
            }
        }

        if full_response.is_empty() {
            return Err(ChatError::Stream(
                "response stream carried no content".to_string(),
            ));
        }

        Ok(full_response)
    }
}

/// Map reqwest failures onto the retryable taxonomy.
fn classify_reqwest_error(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::Timeout
    } else {
        ChatError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ChatError::Timeout.is_retryable());
        assert!(ChatError::Network("reset".to_string()).is_retryable());
        assert!(
            !ChatError::Api {
                status: 401,
                message: "bad key".to_string()
            }
            .is_retryable()
        );
        assert!(!ChatError::Stream("empty".to_string()).is_retryable());
    }

    #[test]
    fn test_client_from_settings() {
        let mut settings = Settings::default();
        settings.api.key = "k".to_string();
        settings.api.max_retries = 0;

        let client = ChatClient::from_settings(&settings).unwrap();
        assert!(client.has_key());
        assert_eq!(client.model(), "glm-4-flash");
        // Zero retries is clamped so every request runs at least once.
        assert_eq!(client.max_retries, 1);
    }
}
