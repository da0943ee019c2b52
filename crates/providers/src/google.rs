//! Google Gemini adapter.
//!
//! Implements the Gemini `generateContent` and `streamGenerateContent` APIs.
//! Serves both `ProviderKind::Google` (API key passed as a `key=` query
//! parameter against the public Generative Language API) and
//! `ProviderKind::GoogleVertex` (Vertex AI, bearer-token auth via
//! `Authorization: Bearer`, no query-string key).

use crate::auth::AuthRotator;
use crate::util::from_reqwest;
use crate::traits::{ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider};
use gw_domain::config::{ProviderConfig, ProviderKind};
use gw_domain::error::{Error, Result};
use gw_domain::message::{Message, Role};
use gw_domain::stream::{BoxStream, StreamEvent, Usage};
use serde_json::Value;
use std::sync::Arc;

/// An LLM provider adapter for the Google Gemini family of APIs.
pub struct GoogleProvider {
    id: String,
    base_url: String,
    auth: Arc<AuthRotator>,
    default_model: String,
    client: reqwest::Client,
    /// Vertex AI authenticates with a bearer token header instead of a
    /// `key=` query parameter.
    vertex: bool,
}

impl GoogleProvider {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let auth = Arc::new(AuthRotator::from_auth_config(&cfg.auth)?);
        let default_model = cfg
            .models
            .first()
            .map(|m| m.name.clone())
            .unwrap_or_else(|| "gemini-2.0-flash".into());

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
            auth,
            default_model,
            client,
            vertex: cfg.kind == ProviderKind::GoogleVertex,
        })
    }

    fn generate_url(&self, model: &str, key: &str) -> String {
        if self.vertex {
            format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
        } else {
            format!("{}/v1beta/models/{}:generateContent?key={}", self.base_url, model, key)
        }
    }

    fn stream_url(&self, model: &str, key: &str) -> String {
        if self.vertex {
            format!("{}/v1beta/models/{}:streamGenerateContent?alt=sse", self.base_url, model)
        } else {
            format!(
                "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
                self.base_url, model, key
            )
        }
    }

    fn post(&self, url: &str, key: &str) -> reqwest::RequestBuilder {
        let req = self.client.post(url).header("Content-Type", "application/json");
        if self.vertex {
            req.header("Authorization", format!("Bearer {key}"))
        } else {
            req
        }
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let mut contents: Vec<Value> = Vec::new();
        let mut system_instruction: Option<Value> = None;

        for msg in &req.messages {
            match msg.role {
                Role::System => {
                    system_instruction = Some(serde_json::json!({ "parts": [{"text": msg.content}] }));
                }
                Role::User => contents.push(serde_json::json!({
                    "role": "user",
                    "parts": [{"text": msg.content}],
                })),
                Role::Assistant => contents.push(serde_json::json!({
                    "role": "model",
                    "parts": [{"text": msg.content}],
                })),
            }
        }

        let mut body = serde_json::json!({ "contents": contents });
        if let Some(si) = system_instruction {
            body["systemInstruction"] = si;
        }

        let mut gen_config = serde_json::json!({});
        if let Some(temp) = req.temperature {
            gen_config["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            gen_config["maxOutputTokens"] = serde_json::json!(max);
        }
        if req.json_mode {
            gen_config["responseMimeType"] = serde_json::json!("application/json");
        }
        if gen_config.as_object().is_some_and(|o| !o.is_empty()) {
            body["generationConfig"] = gen_config;
        }

        body
    }
}

fn parse_gemini_response(body: &Value, model: &str) -> Result<ChatResponse> {
    let candidate = body
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider { provider: "google".into(), message: "no candidates in response".into() })?;

    let text: String = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .into_iter()
        .flatten()
        .filter_map(|p| p.get("text").and_then(|v| v.as_str()))
        .collect();

    let finish_reason = candidate.get("finishReason").and_then(|v| v.as_str()).map(|s| match s {
        "STOP" => "stop".to_string(),
        "MAX_TOKENS" => "length".to_string(),
        other => other.to_lowercase(),
    });

    let usage = body.get("usageMetadata").and_then(parse_gemini_usage);

    Ok(ChatResponse { content: text, usage, model: model.to_string(), finish_reason })
}

fn parse_gemini_usage(v: &Value) -> Option<Usage> {
    let prompt = v.get("promptTokenCount")?.as_u64()? as u32;
    let completion = v.get("candidatesTokenCount").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    Some(Usage::new(prompt, completion))
}

fn parse_gemini_sse_data(data: &str) -> Vec<Result<StreamEvent>> {
    let mut events = Vec::new();

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            events.push(Err(Error::Json(e)));
            return events;
        }
    };

    let candidate = match v.get("candidates").and_then(|c| c.as_array()).and_then(|a| a.first()) {
        Some(c) => c,
        None => return events,
    };

    if let Some(parts) = candidate.get("content").and_then(|c| c.get("parts")).and_then(|p| p.as_array()) {
        for part in parts {
            if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    events.push(Ok(StreamEvent::Token { text: text.to_string() }));
                }
            }
        }
    }

    if let Some(fr) = candidate.get("finishReason").and_then(|v| v.as_str()) {
        let finish_reason = match fr {
            "STOP" => "stop".to_string(),
            "MAX_TOKENS" => "length".to_string(),
            other => other.to_lowercase(),
        };
        let usage = v.get("usageMetadata").and_then(parse_gemini_usage);
        events.push(Ok(StreamEvent::Done { usage, finish_reason: Some(finish_reason) }));
    }

    events
}

fn redact_url_key(url: &str) -> String {
    if let Some(idx) = url.find("key=") {
        let prefix = &url[..idx + 4];
        let rest = &url[idx + 4..];
        let end = rest.find('&').unwrap_or(rest.len());
        format!("{prefix}[REDACTED]{}", &rest[end..])
    } else {
        url.to_string()
    }
}

#[async_trait::async_trait]
impl LlmProvider for GoogleProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let model = req.model.clone().unwrap_or_else(|| self.default_model.clone());
        let entry = self.auth.next_key();
        let url = self.generate_url(&model, &entry.key);
        let body = self.build_body(&req);

        tracing::debug!(provider = %self.id, url = %redact_url_key(&url), "google chat request");

        let resp = self.post(&url, &entry.key).json(&body).send().await.map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::UpstreamCallFailed {
                provider_id: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_gemini_response(&resp_json, &model)
    }

    async fn chat_stream(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let model = req.model.clone().unwrap_or_else(|| self.default_model.clone());
        let entry = self.auth.next_key();
        let url = self.stream_url(&model, &entry.key);
        let body = self.build_body(&req);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %redact_url_key(&url), "google stream request");

        let resp = self.post(&url, &entry.key).json(&body).send().await.map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::UpstreamStreamFailed {
                provider_id,
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        Ok(crate::sse::sse_response_stream(resp, move |data| parse_gemini_sse_data(data)))
    }

    async fn embeddings(&self, req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        let model = req.model.clone().unwrap_or_else(|| "text-embedding-004".into());
        let entry = self.auth.next_key();
        let url = if self.vertex {
            format!("{}/v1beta/models/{}:batchEmbedContents", self.base_url, model)
        } else {
            format!("{}/v1beta/models/{}:batchEmbedContents?key={}", self.base_url, model, entry.key)
        };

        let requests: Vec<Value> = req
            .input
            .iter()
            .map(|text| serde_json::json!({
                "model": format!("models/{}", model),
                "content": { "parts": [{"text": text}] }
            }))
            .collect();

        let body = serde_json::json!({ "requests": requests });

        let resp = self.post(&url, &entry.key).json(&body).send().await.map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::UpstreamCallFailed {
                provider_id: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        let embed_arr = resp_json.get("embeddings").and_then(|e| e.as_array()).ok_or_else(|| {
            Error::Provider { provider: self.id.clone(), message: "missing 'embeddings' array in response".into() }
        })?;

        let embeddings: Vec<Vec<f32>> = embed_arr
            .iter()
            .filter_map(|item| {
                let values = item.get("values")?.as_array()?;
                Some(values.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect())
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
    fn redact_url_key_hides_key_value() {
        let url = "https://x/v1beta/models/m:generateContent?key=supersecret&alt=sse";
        assert_eq!(redact_url_key(url), "https://x/v1beta/models/m:generateContent?key=[REDACTED]&alt=sse");
    }

    #[test]
    fn parse_response_extracts_text_and_usage() {
        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "hi"}]}, "finishReason": "STOP"}],
            "usageMetadata": {"promptTokenCount": 2, "candidatesTokenCount": 1},
        });
        let resp = parse_gemini_response(&body, "gemini-2.0-flash").unwrap();
        assert_eq!(resp.content, "hi");
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.unwrap().total_tokens, 3);
    }

    #[test]
    fn sse_stop_yields_done_with_finish_reason() {
        let data = r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#;
        let events = parse_gemini_sse_data(data);
        match events.into_iter().next().unwrap().unwrap() {
            StreamEvent::Done { finish_reason, .. } => assert_eq!(finish_reason.as_deref(), Some("length")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
