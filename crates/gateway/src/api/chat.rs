//! `POST /v1/chat/completions` — the core OpenAI-compatible route.
//!
//! Parses the request, hands it to `gw_executor::Executor`, and translates
//! the result (or error) to the wire shapes in spec.md §6–7. Streaming
//! responses are written as a raw chunked body rather than axum's `Sse`
//! wrapper, since the wire contract calls for `Content-Type: text/plain;
//! charset=utf-8` + `Transfer-Encoding: chunked`, not `text/event-stream`.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use futures_util::StreamExt;
use serde::Deserialize;

use gw_domain::error::Error;
use gw_domain::message::Message;
use gw_executor::ChatCompletionRequest;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatCompletionsBody {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

pub async fn chat_completions(
    State(state): State<AppState>,
    Json(body): Json<ChatCompletionsBody>,
) -> Response {
    let req = ChatCompletionRequest {
        model: body.model,
        messages: body.messages,
        temperature: body.temperature,
        max_tokens: body.max_tokens,
        stream: body.stream,
    };

    if req.stream {
        stream_response(&state, req).await
    } else {
        blocking_response(&state, req).await
    }
}

async fn blocking_response(state: &AppState, req: ChatCompletionRequest) -> Response {
    match state.executor.execute(req).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn stream_response(state: &AppState, req: ChatCompletionRequest) -> Response {
    let frames = match state.executor.execute_stream(req).await {
        Ok(frames) => frames,
        Err(e) => return error_response(&e),
    };

    let body = Body::from_stream(frames.map(|frame| Ok::<_, std::convert::Infallible>(frame)));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::TRANSFER_ENCODING, "chunked")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(body)
        .expect("well-formed static headers")
}

/// Map `gw_domain::error::Error` to the HTTP status + body shapes in
/// spec.md §7. Errors here are all pre-dispatch (router/dispatcher), since
/// post-dispatch failures are folded into the stream/response itself by
/// `gw-executor`.
fn error_response(err: &Error) -> Response {
    let (status, message) = match err {
        Error::NoProviderForModel(model) => (
            StatusCode::NOT_FOUND,
            format!("No configured provider found for model: {model}"),
        ),
        Error::AllProvidersRateLimited(_) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        Error::ProviderMisconfigured { .. } | Error::ProviderUnsupported { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    };

    tracing::warn!(status = %status, error = %err, "chat/completions failed pre-dispatch");

    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
