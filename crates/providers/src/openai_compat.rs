//! OpenAI-wire-compatible adapter.
//!
//! Works with OpenAI itself and with every configured provider kind whose
//! wire format follows the OpenAI chat completions contract: Azure OpenAI,
//! Groq, Mistral, DeepSeek, xAI, Perplexity, TogetherAI, OpenRouter, Ollama,
//! Qwen, Claude Code/Gemini CLI/Copilot gateways presented as OpenAI-shaped
//! endpoints, and any generic `openai-compatible` host.

use crate::auth::AuthRotator;
use crate::traits::{ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider};
use crate::util::from_reqwest;
use gw_domain::config::{ProviderConfig, ProviderKind};
use gw_domain::error::{Error, Result};
use gw_domain::message::Message;
use gw_domain::stream::{BoxStream, StreamEvent, Usage};
use serde_json::Value;
use std::sync::Arc;

/// An LLM provider adapter for any OpenAI-wire-compatible API endpoint.
///
/// Azure OpenAI uses the same wire body but a different URL pattern
/// (`/openai/deployments/{deployment}/chat/completions`) and auth header
/// (`api-key` instead of `Authorization: Bearer`).
pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    auth: Arc<AuthRotator>,
    auth_header: String,
    auth_prefix: String,
    default_model: String,
    client: reqwest::Client,
    azure: Option<AzureRoute>,
}

struct AzureRoute {
    resource: String,
    deployment: String,
    api_version: String,
}

impl OpenAiCompatProvider {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let is_azure = cfg.kind == ProviderKind::Azure;
        let auth = Arc::new(AuthRotator::from_auth_config(&cfg.auth)?);

        let auth_header = cfg.auth.header.clone().unwrap_or_else(|| {
            if is_azure { "api-key".into() } else { "Authorization".into() }
        });
        let auth_prefix = cfg.auth.prefix.clone().unwrap_or_else(|| {
            if is_azure { String::new() } else { "Bearer ".into() }
        });

        let default_model = cfg
            .models
            .first()
            .map(|m| m.name.clone())
            .unwrap_or_else(|| "gpt-4o".into());

        let base_url = cfg
            .base_url
            .clone()
            .or_else(|| cfg.kind.default_base_url().map(str::to_string))
            .ok_or_else(|| Error::ProviderMisconfigured {
                provider_id: cfg.id.clone(),
                message: "no base_url configured and this kind has no default".into(),
            })?;

        let azure = if is_azure {
            let resource = cfg.azure_resource.clone().ok_or_else(|| Error::ProviderMisconfigured {
                provider_id: cfg.id.clone(),
                message: "azure provider requires azure_resource".into(),
            })?;
            let deployment = cfg
                .azure_deployment
                .clone()
                .unwrap_or_else(|| default_model.clone());
            let api_version = cfg.azure_api_version.clone().unwrap_or_else(|| "2024-10-21".into());
            Some(AzureRoute { resource, deployment, api_version })
        } else {
            None
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            auth_header,
            auth_prefix,
            default_model,
            client,
            azure,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let entry = self.auth.next_key();
        let header_value = format!("{}{}", self.auth_prefix, entry.key);
        self.client
            .post(url)
            .header(&self.auth_header, &header_value)
            .header("Content-Type", "application/json")
    }

    fn effective_model(&self, req: &ChatRequest) -> String {
        req.model.clone().unwrap_or_else(|| self.default_model.clone())
    }

    fn chat_url(&self, req: &ChatRequest) -> String {
        match &self.azure {
            Some(az) => format!(
                "https://{}.openai.azure.com/openai/deployments/{}/chat/completions?api-version={}",
                az.resource, az.deployment, az.api_version
            ),
            None => {
                let _ = req;
                format!("{}/chat/completions", self.base_url)
            }
        }
    }

    fn build_chat_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();

        let mut body = serde_json::json!({
            "messages": messages,
            "stream": stream,
        });

        // Azure embeds the deployment (model) name in the URL, so it is
        // omitted from the body. Everyone else puts it in the body.
        if self.azure.is_none() {
            body["model"] = Value::String(self.effective_model(req));
        }

        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        if req.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        body
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    serde_json::json!({
        "role": msg.role,
        "content": msg.content,
    })
}

fn parse_chat_response(body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: "openai_compat".into(),
            message: "no choices in response".into(),
        })?;

    let message = choice.get("message").ok_or_else(|| Error::Provider {
        provider: "openai_compat".into(),
        message: "no message in choice".into(),
    })?;

    let content = message.get("content").and_then(|v| v.as_str()).unwrap_or("").to_string();

    let finish_reason = choice.get("finish_reason").and_then(|v| v.as_str()).map(String::from);

    let model = body.get("model").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();

    let usage = body.get("usage").and_then(parse_openai_usage);

    Ok(ChatResponse { content, usage, model, finish_reason })
}

fn parse_openai_usage(v: &Value) -> Option<Usage> {
    Some(Usage::new(
        v.get("prompt_tokens")?.as_u64()? as u32,
        v.get("completion_tokens")?.as_u64()? as u32,
    ))
}

fn parse_sse_data(data: &str) -> Option<Result<StreamEvent>> {
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return Some(Err(Error::Json(e))),
    };

    let choice = v.get("choices").and_then(|c| c.as_array()).and_then(|a| a.first());

    // Usage-only chunk (stream_options.include_usage).
    if choice.is_none() {
        if let Some(usage) = v.get("usage").and_then(parse_openai_usage) {
            return Some(Ok(StreamEvent::Done { usage: Some(usage), finish_reason: None }));
        }
        return None;
    }
    let choice = choice?;
    let delta = choice.get("delta").unwrap_or(&Value::Null);

    if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        let usage = v.get("usage").and_then(parse_openai_usage);
        return Some(Ok(StreamEvent::Done { usage, finish_reason: Some(fr.to_string()) }));
    }

    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            return Some(Ok(StreamEvent::Token { text: text.to_string() }));
        }
    }

    None
}

fn parse_sse_data_vec(data: &str) -> Vec<Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        return vec![Ok(StreamEvent::Done { usage: None, finish_reason: Some("stop".into()) })];
    }
    match parse_sse_data(data) {
        Some(event) => vec![event],
        None => Vec::new(),
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let url = self.chat_url(&req);
        let body = self.build_chat_body(&req, false);

        tracing::debug!(provider = %self.id, url = %url, "openai_compat chat request");

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
        parse_chat_response(&resp_json)
    }

    async fn chat_stream(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = self.chat_url(&req);
        let body = self.build_chat_body(&req, true);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %url, "openai_compat stream request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::UpstreamStreamFailed {
                provider_id,
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        Ok(crate::sse::sse_response_stream(resp, parse_sse_data_vec))
    }

    async fn embeddings(&self, req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        let model = req.model.unwrap_or_else(|| "text-embedding-3-small".into());

        let url = match &self.azure {
            Some(az) => format!(
                "https://{}.openai.azure.com/openai/deployments/{}/embeddings?api-version={}",
                az.resource, az.deployment, az.api_version
            ),
            None => format!("{}/embeddings", self.base_url),
        };

        let body = if self.azure.is_some() {
            serde_json::json!({ "input": req.input })
        } else {
            serde_json::json!({ "model": model, "input": req.input })
        };

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
        let data = resp_json.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
            Error::Provider {
                provider: self.id.clone(),
                message: "missing 'data' array in embeddings response".into(),
            }
        })?;

        let embeddings: Vec<Vec<f32>> = data
            .iter()
            .filter_map(|item| {
                let embedding = item.get("embedding")?.as_array()?;
                Some(embedding.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect())
            })
            .collect();

        Ok(EmbeddingsResponse { embeddings })
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_usage_only_chunk_yields_done() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":4,"total_tokens":7}}"#;
        let events = parse_sse_data_vec(data);
        assert_eq!(events.len(), 1);
        match events.into_iter().next().unwrap().unwrap() {
            StreamEvent::Done { usage, .. } => assert_eq!(usage.unwrap().total_tokens, 7),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parse_content_delta_yields_token() {
        let data = r#"{"choices":[{"delta":{"content":"hi"}}]}"#;
        let events = parse_sse_data_vec(data);
        match events.into_iter().next().unwrap().unwrap() {
            StreamEvent::Token { text } => assert_eq!(text, "hi"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn done_sentinel_yields_done_with_stop() {
        let events = parse_sse_data_vec("[DONE]");
        match events.into_iter().next().unwrap().unwrap() {
            StreamEvent::Done { finish_reason, .. } => assert_eq!(finish_reason.as_deref(), Some("stop")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn msg_to_openai_preserves_role_and_content() {
        let msg = Message::user("hello");
        let v = msg_to_openai(&msg);
        assert_eq!(v["role"], "user");
        assert_eq!(v["content"], "hello");
    }
}
