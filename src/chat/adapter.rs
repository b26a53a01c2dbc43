//! Per-provider request formatting and stream parsing.
//!
//! Providers form a closed set selected once at startup from configuration.
//! All supported vendors speak an OpenAI-shaped chat-completions dialect;
//! they differ in auth header form, endpoint, and whether stream lines carry
//! the SSE `data: ` prefix.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// A chat message in the request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Supported LLM API vendors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Zhipu ChatGLM (open.bigmodel.cn)
    #[default]
    ChatGlm,
    /// Alibaba Qwen (dashscope compatible mode)
    Qwen,
    /// Meta Llama API
    Llama,
    /// SiliconFlow
    SiliconFlow,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Provider::ChatGlm => "chatglm",
            Provider::Qwen => "qwen",
            Provider::Llama => "llama",
            Provider::SiliconFlow => "siliconflow",
        };
        f.write_str(name)
    }
}

impl Provider {
    /// Default chat-completions endpoint for this vendor.
    pub fn default_url(&self) -> &'static str {
        match self {
            Provider::ChatGlm => "https://open.bigmodel.cn/api/paas/v4/chat/completions",
            Provider::Qwen => {
                "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions"
            }
            Provider::Llama => "https://api.llama-api.com/chat/completions",
            Provider::SiliconFlow => "https://api.siliconflow.cn/v1/chat/completions",
        }
    }

    /// Authorization header value for this vendor.
    ///
    /// ChatGLM takes the raw key; the others use bearer auth.
    pub fn auth_header(&self, api_key: &str) -> String {
        match self {
            Provider::ChatGlm => api_key.to_string(),
            Provider::Qwen | Provider::Llama | Provider::SiliconFlow => {
                format!("Bearer {api_key}")
            }
        }
    }

    /// Build the JSON request body.
    pub fn request_body(
        &self,
        model: &str,
        messages: &[Message],
        stream: bool,
    ) -> serde_json::Value {
        match self {
            Provider::Llama => json!({
                "model": model,
                "messages": messages,
                "stream": stream,
                "temperature": 0.7,
                "max_tokens": 4096,
            }),
            _ => json!({
                "model": model,
                "messages": messages,
                "stream": stream,
                "temperature": 0.7,
                "top_p": 0.7,
            }),
        }
    }

    /// Extract the content delta from one line of the streamed response.
    ///
    /// Returns `None` for keep-alives, terminators, and anything that does
    /// not parse; the stream loop just skips those lines.
    pub fn parse_stream_line(&self, line: &str) -> Option<String> {
        let payload = match self {
            // SSE framing: only `data: ` lines carry payloads.
            Provider::ChatGlm | Provider::Qwen | Provider::SiliconFlow => {
                line.strip_prefix("data: ")?
            }
            // Llama streams bare JSON lines.
            Provider::Llama => line,
        };

        if payload.trim() == "[DONE]" {
            return None;
        }

        let data: serde_json::Value = serde_json::from_str(payload).ok()?;
        let choice = data.get("choices")?.get(0)?;

        if !choice
            .get("finish_reason")
            .is_none_or(serde_json::Value::is_null)
        {
            return None;
        }

        let content = choice.get("delta")?.get("content")?.as_str()?;
        if content.is_empty() {
            None
        } else {
            Some(content.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_header_schemes() {
        assert_eq!(Provider::ChatGlm.auth_header("key123"), "key123");
        assert_eq!(Provider::Qwen.auth_header("key123"), "Bearer key123");
        assert_eq!(Provider::SiliconFlow.auth_header("key123"), "Bearer key123");
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![Message::system("be helpful"), Message::user("hello")];
        let body = Provider::ChatGlm.request_body("glm-4-flash", &messages, true);

        assert_eq!(body["model"], "glm-4-flash");
        assert_eq!(body["stream"], true);
        assert_eq!(body["top_p"], 0.7);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
    }

    #[test]
    fn test_llama_body_uses_max_tokens() {
        let body = Provider::Llama.request_body("llama3-70b", &[Message::user("hi")], true);
        assert_eq!(body["max_tokens"], 4096);
        assert!(body.get("top_p").is_none());
    }

    #[test]
    fn test_parse_sse_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(
            Provider::ChatGlm.parse_stream_line(line),
            Some("Hel".to_string())
        );
    }

    #[test]
    fn test_parse_skips_non_data_lines() {
        assert_eq!(Provider::ChatGlm.parse_stream_line(""), None);
        assert_eq!(Provider::ChatGlm.parse_stream_line(": keep-alive"), None);
        assert_eq!(
            Provider::ChatGlm.parse_stream_line(r#"{"choices":[{"delta":{"content":"x"}}]}"#),
            None,
            "payload without data: prefix is not an SSE event"
        );
    }

    #[test]
    fn test_parse_stops_at_finish_reason() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(Provider::ChatGlm.parse_stream_line(line), None);
        assert_eq!(Provider::ChatGlm.parse_stream_line("data: [DONE]"), None);
    }

    #[test]
    fn test_llama_parses_bare_json_lines() {
        let line = r#"{"choices":[{"delta":{"content":"world"},"finish_reason":null}]}"#;
        assert_eq!(
            Provider::Llama.parse_stream_line(line),
            Some("world".to_string())
        );
    }

    #[test]
    fn test_parse_garbage_returns_none() {
        assert_eq!(Provider::Qwen.parse_stream_line("data: {broken"), None);
        assert_eq!(Provider::Llama.parse_stream_line("not json at all"), None);
    }

    #[test]
    fn test_provider_serde_names() {
        let provider: Provider = serde_json::from_str("\"siliconflow\"").unwrap();
        assert_eq!(provider, Provider::SiliconFlow);
        assert_eq!(serde_json::to_string(&Provider::ChatGlm).unwrap(), "\"chatglm\"");
    }
}
