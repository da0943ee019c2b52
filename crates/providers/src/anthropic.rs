//! Anthropic-native adapter.
//!
//! Implements the Anthropic Messages API, including the Anthropic-specific
//! message structure where system messages go in a separate top-level
//! `system` field rather than as a message role.

use crate::util::{from_reqwest, resolve_api_key};
use crate::traits::{ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider};
use gw_domain::config::ProviderConfig;
use gw_domain::error::{Error, Result};
use gw_domain::message::{Message, Role};
use gw_domain::stream::{BoxStream, StreamEvent, Usage};
use serde_json::Value;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// An LLM provider adapter for the Anthropic Messages API.
pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        let default_model = cfg
            .models
            .first()
            .map(|m| m.name.clone())
            .unwrap_or_else(|| "claude-sonnet-4-20250514".into());

        let base_url = cfg
            .base_url
            .clone()
            .or_else(|| cfg.kind.default_base_url().map(str::to_string))
            .ok_or_else(|| Error::ProviderMisconfigured {
                provider_id: cfg.id.clone(),
                message: "no base_url configured".into(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    fn build_messages_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let model = req.model.clone().unwrap_or_else(|| self.default_model.clone());

        let mut system_parts: Vec<String> = Vec::new();
        let mut api_messages: Vec<Value> = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => system_parts.push(msg.content.clone()),
                Role::User => api_messages.push(serde_json::json!({
                    "role": "user",
                    "content": msg.content,
                })),
                Role::Assistant => api_messages.push(serde_json::json!({
                    "role": "assistant",
                    "content": msg.content,
                })),
            }
        }

        let mut body = serde_json::json!({
            "model": model,
            "messages": api_messages,
            "stream": stream,
        });

        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body["max_tokens"] = serde_json::json!(req.max_tokens.unwrap_or(4096));

        body
    }
}

fn parse_anthropic_response(body: &Value) -> Result<ChatResponse> {
    let content_arr = body.get("content").and_then(|v| v.as_array()).cloned().unwrap_or_default();

    let text: String = content_arr
        .iter()
        .filter(|b| b.get("type").and_then(|v| v.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|v| v.as_str()))
        .collect();

    let model = body.get("model").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();

    let finish_reason = body.get("stop_reason").and_then(|v| v.as_str()).map(|s| match s {
        "end_turn" => "stop".to_string(),
        other => other.to_string(),
    });

    let usage = body.get("usage").and_then(parse_anthropic_usage);

    Ok(ChatResponse { content: text, usage, model, finish_reason })
}

fn parse_anthropic_usage(v: &Value) -> Option<Usage> {
    let input = v.get("input_tokens")?.as_u64()? as u32;
    let output = v.get("output_tokens")?.as_u64()? as u32;
    Some(Usage::new(input, output))
}

/// Internal state accumulated across an Anthropic SSE stream.
struct StreamState {
    usage: Option<Usage>,
    done_emitted: bool,
}

impl StreamState {
    fn new() -> Self {
        Self { usage: None, done_emitted: false }
    }
}

fn parse_anthropic_sse(data: &str, state: &mut StreamState) -> Vec<Result<StreamEvent>> {
    let mut events = Vec::new();

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            events.push(Err(Error::Json(e)));
            return events;
        }
    };

    let event_type = v.get("type").and_then(|v| v.as_str()).unwrap_or("");

    match event_type {
        "message_start" => {
            if let Some(msg) = v.get("message") {
                state.usage = msg.get("usage").and_then(parse_anthropic_usage);
            }
        }
        "content_block_delta" => {
            if let Some(delta) = v.get("delta") {
                if delta.get("type").and_then(|v| v.as_str()) == Some("text_delta") {
                    if let Some(text) = delta.get("text").and_then(|v| v.as_str()) {
                        if !text.is_empty() {
                            events.push(Ok(StreamEvent::Token { text: text.to_string() }));
                        }
                    }
                }
            }
        }
        "message_delta" => {
            if let Some(output) = v
                .get("usage")
                .and_then(|u| u.get("output_tokens"))
                .and_then(|v| v.as_u64())
            {
                if let Some(ref mut u) = state.usage {
                    *u = Usage::new(u.prompt_tokens, output as u32);
                }
            }
            let stop_reason = v
                .get("delta")
                .and_then(|d| d.get("stop_reason"))
                .and_then(|v| v.as_str())
                .map(|s| match s {
                    "end_turn" => "stop".to_string(),
                    other => other.to_string(),
                });
            if stop_reason.is_some() {
                state.done_emitted = true;
                events.push(Ok(StreamEvent::Done { usage: state.usage, finish_reason: stop_reason }));
            }
        }
        "message_stop" => {
            if !state.done_emitted {
                state.done_emitted = true;
                events.push(Ok(StreamEvent::Done { usage: state.usage, finish_reason: Some("stop".into()) }));
            }
        }
        "error" => {
            let msg = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            events.push(Ok(StreamEvent::Error { message: msg.to_string() }));
        }
        _ => {}
    }

    events
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(&req, false);

        tracing::debug!(provider = %self.id, url = %url, "anthropic chat request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::UpstreamCallFailed {
                provider_id: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_anthropic_response(&resp_json)
    }

    async fn chat_stream(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(&req, true);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %url, "anthropic stream request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::UpstreamStreamFailed {
                provider_id,
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        let mut state = StreamState::new();
        Ok(crate::sse::sse_response_stream(resp, move |data| parse_anthropic_sse(data, &mut state)))
    }

    async fn embeddings(&self, _req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        Err(Error::Provider {
            provider: self.id.clone(),
            message: "Anthropic does not provide an embeddings API; use an OpenAI-compatible \
                      or Google provider for embeddings"
                .into(),
        })
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_usage_sums_total() {
        let v = serde_json::json!({"input_tokens": 5, "output_tokens": 7});
        let u = parse_anthropic_usage(&v).unwrap();
        assert_eq!(u.total_tokens, 12);
    }

    #[test]
    fn parse_response_joins_text_blocks() {
        let body = serde_json::json!({
            "model": "claude-sonnet-4-20250514",
            "content": [{"type": "text", "text": "hel"}, {"type": "text", "text": "lo"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1, "output_tokens": 2},
        });
        let resp = parse_anthropic_response(&body).unwrap();
        assert_eq!(resp.content, "hello");
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn sse_text_delta_yields_token() {
        let mut state = StreamState::new();
        let data = r#"{"type":"content_block_delta","delta":{"type":"text_delta","text":"hi"}}"#;
        let events = parse_anthropic_sse(data, &mut state);
        match events.into_iter().next().unwrap().unwrap() {
            StreamEvent::Token { text } => assert_eq!(text, "hi"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn sse_message_stop_emits_done_once() {
        let mut state = StreamState::new();
        state.done_emitted = true;
        let events = parse_anthropic_sse(r#"{"type":"message_stop"}"#, &mut state);
        assert!(events.is_empty());
    }
}
