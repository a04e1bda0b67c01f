//! Chat wire types for the Ollama-style `/api/chat` endpoint
//!
//! The request carries a single user message with the prompt text and the
//! base64 screenshot attached via `images`; `format: "json"` nudges the
//! model toward machine-readable output, though the extractor still treats
//! the reply as free text.

use serde::{Deserialize, Serialize};

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender role (`user`, `assistant`, `system`)
    pub role: String,
    /// Message text
    pub content: String,
    /// Base64-encoded images attached to the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl ChatMessage {
    /// A user message with an attached screenshot.
    pub fn user_with_image(content: impl Into<String>, image_base64: String) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: content.into(),
            images: Some(vec![image_base64]),
        }
    }

    /// A plain user message.
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: content.into(),
            images: None,
        }
    }
}

/// Request body for a chat completion.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model to consult
    pub model: String,
    /// Conversation; always a single user message in this loop
    pub messages: Vec<ChatMessage>,
    /// Streaming is never used; one full response per call
    pub stream: bool,
    /// Response format hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ChatRequest {
    /// Build the one-shot vision request the loop sends each cycle.
    pub fn vision(model: impl Into<String>, prompt: impl Into<String>, image_base64: String) -> Self {
        ChatRequest {
            model: model.into(),
            messages: vec![ChatMessage::user_with_image(prompt, image_base64)],
            stream: false,
            format: Some("json".to_string()),
        }
    }
}

/// The oracle's reply envelope.
///
/// Every field is optional on purpose: envelope validation is the
/// extractor's job and produces a typed error, not a deserialization fault.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub done: Option<bool>,
}

/// The assistant message inside a [`RawResponse`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl RawResponse {
    /// Convenience constructor used widely in tests.
    pub fn with_content(content: impl Into<String>) -> Self {
        RawResponse {
            model: None,
            message: Some(ResponseMessage {
                role: Some("assistant".to_string()),
                content: Some(content.into()),
            }),
            done: Some(true),
        }
    }
}
