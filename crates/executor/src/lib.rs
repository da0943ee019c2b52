//! `Executor`: drives a single request end-to-end through the chosen
//! `(Provider, Model)` and translates to the OpenAI chat-completion wire
//! format, both non-streaming and SSE.
//!
//! Routing (`gw-router`) and adapter dispatch (`gw-providers::Dispatcher`)
//! are already done by the time a request reaches here; this crate only
//! owns cost accounting and wire translation.

use std::sync::Arc;

use chrono::Utc;
use gw_domain::config::Pricing;
use gw_domain::error::Result;
use gw_domain::message::Message;
use gw_domain::stream::{BoxStream, StreamEvent, Usage};
use gw_providers::{ChatRequest, Dispatcher};
use gw_pricing::PriceCatalog;
use gw_router::Router;
use gw_usage::{CallUsage, UsageManager};
use serde::Serialize;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A client-facing `/v1/chat/completions` request, already parsed from
/// JSON by the gateway's HTTP layer.
#[derive(Debug, Clone)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: WireUsage,
}

#[derive(Debug, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
    pub logprobs: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMessage {
    pub role: &'static str,
    pub content: String,
    pub refusal: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WireUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<Usage> for WireUsage {
    fn from(u: Usage) -> Self {
        Self { prompt_tokens: u.prompt_tokens, completion_tokens: u.completion_tokens, total_tokens: u.total_tokens }
    }
}

#[derive(Debug, Serialize)]
struct Chunk {
    id: String,
    object: &'static str,
    created: i64,
    model: String,
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Serialize)]
struct ChunkChoice {
    index: u32,
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Serialize, Default)]
struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

fn sse_frame(value: &impl Serialize) -> String {
    format!("data: {}\n\n", serde_json::to_string(value).expect("wire types always serialize"))
}

const DONE_FRAME: &str = "data: [DONE]\n\n";

fn build_initial_chunk(id: &str, created: i64, model: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        object: "chat.completion.chunk",
        created,
        model: model.to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta { role: Some("assistant"), content: None },
            finish_reason: None,
        }],
    }
}

fn build_content_chunk(id: &str, created: i64, model: &str, fragment: String) -> Chunk {
    Chunk {
        id: id.to_string(),
        object: "chat.completion.chunk",
        created,
        model: model.to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta { role: None, content: Some(fragment) },
            finish_reason: None,
        }],
    }
}

fn build_final_chunk(id: &str, created: i64, model: &str, finish_reason: Option<String>) -> Chunk {
    Chunk {
        id: id.to_string(),
        object: "chat.completion.chunk",
        created,
        model: model.to_string(),
        choices: vec![ChunkChoice { index: 0, delta: ChunkDelta::default(), finish_reason }],
    }
}

/// `calculateCost(Provider, Model, usage)`. Unknown pricing costs 0 but is
/// flagged `cost_known = false` for observability; a flat `costPerRequest`
/// overrides the per-token formula.
fn calculate_cost(pricing: Option<Pricing>, usage: CallUsage) -> (f64, bool) {
    let Some(pricing) = pricing else { return (0.0, false) };
    if let Some(flat) = pricing.cost_per_request {
        return (flat, true);
    }
    let input_rate = pricing.input_cost_per_million_tokens.unwrap_or(0.0);
    let output_rate = pricing.output_cost_per_million_tokens.unwrap_or(0.0);
    let cost = usage.prompt_tokens as f64 * input_rate / 1e6 + usage.completion_tokens as f64 * output_rate / 1e6;
    (cost, true)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Executor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Executor {
    router: Arc<Router>,
    dispatcher: Arc<Dispatcher>,
    usage: Arc<UsageManager>,
    pricing: Arc<PriceCatalog>,
}

impl Executor {
    pub fn new(router: Arc<Router>, dispatcher: Arc<Dispatcher>, usage: Arc<UsageManager>, pricing: Arc<PriceCatalog>) -> Self {
        Self { router, dispatcher, usage, pricing }
    }

    fn price_for(&self, provider_id: &str, model_name: &str) -> Option<Pricing> {
        let cfg = self.dispatcher.provider_config(provider_id)?;
        let model = cfg.models.iter().find(|m| m.name == model_name)?;
        self.pricing.price_for(cfg.kind, model)
    }

    /// Non-streaming `/v1/chat/completions`.
    pub async fn execute(&self, req: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let candidate = self.router.select(&req.model)?;
        let adapter = self.dispatcher.get_or_build(&candidate.provider_id)?;

        let provider_req = ChatRequest {
            messages: req.messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            json_mode: false,
            model: Some(candidate.model.name.clone()),
        };

        let resp = adapter.chat(provider_req).await?;
        let usage = resp.usage.unwrap_or_default();
        let call_usage = CallUsage { prompt_tokens: usage.prompt_tokens as u64, completion_tokens: usage.completion_tokens as u64 };

        let pricing = self.price_for(&candidate.provider_id, &candidate.model.name);
        let (cost_usd, cost_known) = calculate_cost(pricing, call_usage);
        if !cost_known {
            tracing::warn!(
                provider_id = %candidate.provider_id,
                model = %candidate.model.name,
                "pricing unknown, billing as zero"
            );
        }
        self.usage.consume(&candidate.provider_id, &candidate.model.name, call_usage, cost_usd);

        Ok(ChatCompletionResponse {
            id: format!("chatcmpl-{}", Utc::now().timestamp_millis()),
            object: "chat.completion",
            created: Utc::now().timestamp(),
            model: candidate.model.client_facing_name().to_string(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage { role: "assistant", content: resp.content, refusal: None },
                finish_reason: resp.finish_reason,
                logprobs: None,
            }],
            usage: usage.into(),
        })
    }

    /// Streaming `/v1/chat/completions`: returns a stream of already-framed
    /// `data: ...\n\n` strings, ending with `data: [DONE]\n\n`. The caller
    /// (gw-gateway) is responsible for the raw chunked-body HTTP response —
    /// this stream never raises after the first frame so headers, once
    /// sent, are never contradicted.
    pub async fn execute_stream(&self, req: ChatCompletionRequest) -> Result<BoxStream<'static, String>> {
        let candidate = self.router.select(&req.model)?;
        let adapter = self.dispatcher.get_or_build(&candidate.provider_id)?;

        let provider_req = ChatRequest {
            messages: req.messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            json_mode: false,
            model: Some(candidate.model.name.clone()),
        };

        let mut events = adapter.chat_stream(provider_req).await?;

        let completion_id = format!("chatcmpl-{}", Utc::now().timestamp_millis());
        let created = Utc::now().timestamp();
        let model = candidate.model.client_facing_name().to_string();
        let provider_id = candidate.provider_id.clone();
        let model_name = candidate.model.name.clone();
        let pricing = self.price_for(&provider_id, &model_name);
        let usage_manager = self.usage.clone();

        use futures_util::StreamExt;
        let stream = async_stream::stream! {
            yield sse_frame(&build_initial_chunk(&completion_id, created, &model));

            loop {
                match events.next().await {
                    Some(Ok(StreamEvent::Token { text })) => {
                        yield sse_frame(&build_content_chunk(&completion_id, created, &model, text));
                    }
                    Some(Ok(StreamEvent::Done { usage, finish_reason })) => {
                        yield sse_frame(&build_final_chunk(&completion_id, created, &model, finish_reason));
                        let usage = usage.unwrap_or_default();
                        let call_usage = CallUsage {
                            prompt_tokens: usage.prompt_tokens as u64,
                            completion_tokens: usage.completion_tokens as u64,
                        };
                        let (cost_usd, cost_known) = calculate_cost(pricing, call_usage);
                        if !cost_known {
                            tracing::warn!(
                                provider_id = %provider_id,
                                model = %model_name,
                                "pricing unknown, billing as zero"
                            );
                        }
                        usage_manager.consume(&provider_id, &model_name, call_usage, cost_usd);
                        yield DONE_FRAME.to_string();
                        break;
                    }
                    Some(Ok(StreamEvent::Error { message })) => {
                        tracing::warn!(provider_id = %provider_id, error = %message, "upstream stream failed mid-flight");
                        yield sse_frame(&serde_json::json!({"error": "Streaming failed"}));
                        yield DONE_FRAME.to_string();
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(provider_id = %provider_id, error = %e, "upstream stream failed mid-flight");
                        yield sse_frame(&serde_json::json!({"error": "Streaming failed"}));
                        yield DONE_FRAME.to_string();
                        break;
                    }
                    None => {
                        // Stream ended without an explicit Done event.
                        yield sse_frame(&build_final_chunk(&completion_id, created, &model, Some("stop".into())));
                        yield DONE_FRAME.to_string();
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_pricing_costs_zero_but_unknown() {
        let (cost, known) = calculate_cost(None, CallUsage { prompt_tokens: 100, completion_tokens: 50 });
        assert_eq!(cost, 0.0);
        assert!(!known);
    }

    #[test]
    fn flat_cost_per_request_overrides_token_formula() {
        let pricing = Pricing { input_cost_per_million_tokens: Some(1000.0), output_cost_per_million_tokens: Some(1000.0), cost_per_request: Some(0.002) };
        let (cost, known) = calculate_cost(Some(pricing), CallUsage { prompt_tokens: 1, completion_tokens: 1 });
        assert_eq!(cost, 0.002);
        assert!(known);
    }

    #[test]
    fn token_formula_computes_from_both_rates() {
        let pricing = Pricing { input_cost_per_million_tokens: Some(2.0), output_cost_per_million_tokens: Some(10.0), cost_per_request: None };
        let (cost, known) = calculate_cost(Some(pricing), CallUsage { prompt_tokens: 1_000_000, completion_tokens: 500_000 });
        assert!(known);
        assert!((cost - 7.0).abs() < 1e-9);
    }

    #[test]
    fn initial_chunk_carries_role_with_no_content() {
        let chunk = build_initial_chunk("chatcmpl-1", 0, "gpt-4o");
        let v = serde_json::to_value(&chunk).unwrap();
        assert_eq!(v["choices"][0]["delta"]["role"], "assistant");
        assert!(v["choices"][0]["delta"].get("content").is_none());
    }

    #[test]
    fn content_chunk_omits_role() {
        let chunk = build_content_chunk("chatcmpl-1", 0, "gpt-4o", "hi".into());
        let v = serde_json::to_value(&chunk).unwrap();
        assert!(v["choices"][0]["delta"].get("role").is_none());
        assert_eq!(v["choices"][0]["delta"]["content"], "hi");
    }

    #[test]
    fn final_chunk_carries_finish_reason_and_empty_delta() {
        let chunk = build_final_chunk("chatcmpl-1", 0, "gpt-4o", Some("stop".into()));
        let v = serde_json::to_value(&chunk).unwrap();
        assert_eq!(v["choices"][0]["finish_reason"], "stop");
        assert!(v["choices"][0]["delta"].get("role").is_none());
        assert!(v["choices"][0]["delta"].get("content").is_none());
    }

    #[test]
    fn sse_frame_wraps_with_data_prefix_and_blank_line() {
        let frame = sse_frame(&serde_json::json!({"a": 1}));
        assert_eq!(frame, "data: {\"a\":1}\n\n");
    }

    #[test]
    fn response_message_serializes_null_refusal() {
        let msg = ResponseMessage { role: "assistant", content: "hi".into(), refusal: None };
        let v = serde_json::to_value(&msg).unwrap();
        assert!(v["refusal"].is_null());
    }
}
