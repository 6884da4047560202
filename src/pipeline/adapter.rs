//! Model adapters: provider-specific request bodies and response fields.
//!
//! Providers disagree on two things only: how the prompt is laid out in the
//! request body and which field of the reply carries the generated text.
//! [`ModelAdapter`] captures both behind [`ModelAdapter::build_request`] and
//! [`ModelAdapter::extract_text`]; chunking, parsing and reconciliation never
//! look at which variant is in play.
//!
//! | Variant | Request body | Reply text | Auth |
//! |---------|--------------|------------|------|
//! | `ChatMessages` | `messages: [{role, content}]` | `choices[0].message.content` | bearer |
//! | `Prompt` | single `prompt` field | `response` (or `choices[0].text`) | bearer |
//! | `ContentParts` | `contents: [{parts: [{text}]}]` | `candidates[0].content.parts[*].text` | `x-goog-api-key` |

use crate::config::{ResolvedModel, SplitConfig};
use crate::error::SlidesError;
use crate::pipeline::chunk::Chunk;
use crate::prompts::{split_instruction, DEFAULT_SYSTEM_PROMPT};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// The three payload shapes spoken by supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelAdapter {
    /// OpenAI-style chat completions (also Mistral, Groq, vLLM, LiteLLM, ...).
    ChatMessages,
    /// Single prompt string, e.g. Ollama `/api/generate`.
    Prompt,
    /// Structured content parts, e.g. Gemini `generateContent`.
    ContentParts,
}

/// How the credential is attached to the HTTP request.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    None,
    Bearer(String),
    Header { name: &'static str, value: String },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::None => f.write_str("None"),
            Auth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Auth::Header { name, .. } => write!(f, "Header({name}: <redacted>)"),
        }
    }
}

/// A ready-to-send provider call.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Registry id, used in error messages.
    pub model: String,
    pub endpoint: String,
    pub auth: Auth,
    pub body: Value,
}

impl ModelAdapter {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelAdapter::ChatMessages => "chat_messages",
            ModelAdapter::Prompt => "prompt",
            ModelAdapter::ContentParts => "content_parts",
        }
    }

    /// Build the provider request asking for `sections` sections of `chunk`.
    pub fn build_request(
        &self,
        chunk: &Chunk,
        sections: usize,
        model: &ResolvedModel,
        config: &SplitConfig,
    ) -> ProviderRequest {
        let system = config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        let instruction =
            split_instruction(chunk.prompt_context(), chunk.prompt_text(), sections);

        let body = match self {
            ModelAdapter::ChatMessages => {
                let mut body = json!({
                    "model": model.upstream_model,
                    "messages": [
                        { "role": "system", "content": system },
                        { "role": "user", "content": instruction },
                    ],
                    "max_tokens": config.max_tokens,
                    "response_format": { "type": "json_object" },
                });
                insert_temperature(&mut body, "temperature", config.temperature);
                body
            }
            ModelAdapter::Prompt => {
                let mut options = json!({ "num_predict": config.max_tokens });
                insert_temperature(&mut options, "temperature", config.temperature);
                json!({
                    "model": model.upstream_model,
                    "system": system,
                    "prompt": instruction,
                    "format": "json",
                    "stream": false,
                    "options": options,
                })
            }
            ModelAdapter::ContentParts => {
                let mut generation = json!({
                    "maxOutputTokens": config.max_tokens,
                    "responseMimeType": "application/json",
                });
                insert_temperature(&mut generation, "temperature", config.temperature);
                json!({
                    "systemInstruction": { "parts": [{ "text": system }] },
                    "contents": [{ "role": "user", "parts": [{ "text": instruction }] }],
                    "generationConfig": generation,
                })
            }
        };

        ProviderRequest {
            model: model.id.clone(),
            endpoint: model.endpoint.clone(),
            auth: self.auth(model.credential.as_deref()),
            body,
        }
    }

    /// Pull the generated text out of a raw provider reply body.
    pub fn extract_text(&self, raw_body: &str) -> Result<String, SlidesError> {
        let json: Value = serde_json::from_str(raw_body)
            .map_err(|e| SlidesError::malformed(format!("provider reply is not JSON: {e}"), raw_body))?;

        let text = match self {
            ModelAdapter::ChatMessages => extract_chat_text(&json),
            ModelAdapter::Prompt => json
                .get("response")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    json.pointer("/choices/0/text")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                }),
            ModelAdapter::ContentParts => extract_parts_text(&json),
        };

        text.ok_or_else(|| {
            SlidesError::malformed(
                format!("{} reply has no text field", self.as_str()),
                raw_body,
            )
        })
    }

    fn auth(&self, credential: Option<&str>) -> Auth {
        match (self, credential) {
            (_, None) => Auth::None,
            (ModelAdapter::ContentParts, Some(key)) => Auth::Header {
                name: "x-goog-api-key",
                value: key.to_string(),
            },
            (_, Some(key)) => Auth::Bearer(key.to_string()),
        }
    }
}

impl fmt::Display for ModelAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn insert_temperature(target: &mut Value, key: &str, temperature: Option<f32>) {
    if let (Some(t), Some(obj)) = (temperature, target.as_object_mut()) {
        obj.insert(key.to_string(), json!(t));
    }
}

fn extract_chat_text(json: &Value) -> Option<String> {
    match json.pointer("/choices/0/message/content")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => join_text_parts(parts),
        _ => None,
    }
}

fn extract_parts_text(json: &Value) -> Option<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)?;
    join_text_parts(parts)
}

fn join_text_parts(parts: &[Value]) -> Option<String> {
    let texts: Vec<&str> = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.concat())
    }
}
