//! `GET /v1/models` and `GET /v1/models/readiness`.

use std::collections::BTreeSet;

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use chrono::Utc;

use crate::state::AppState;

/// `GET /v1/models` — union of all configured `mappedName ?? name`, OpenAI
/// `list` shape.
pub async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    let created = Utc::now().timestamp();
    let names: BTreeSet<String> = state
        .dispatcher
        .all_provider_configs()
        .iter()
        .flat_map(|cfg| cfg.models.iter())
        .map(|m| m.client_facing_name().to_string())
        .collect();

    let data: Vec<_> = names
        .into_iter()
        .map(|id| {
            serde_json::json!({
                "id": id,
                "object": "model",
                "created": created,
                "owned_by": "ai",
            })
        })
        .collect();

    Json(serde_json::json!({ "object": "list", "data": data }))
}

/// `GET /v1/models/readiness` — configured models plus Dispatcher init
/// errors, for dashboards/health probes. Public (no auth): the whole point
/// is to be probeable before a caller has credentials sorted out.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let names: BTreeSet<String> = state
        .dispatcher
        .all_provider_configs()
        .iter()
        .flat_map(|cfg| cfg.models.iter())
        .map(|m| m.client_facing_name().to_string())
        .collect();

    let init_errors: Vec<_> = state
        .dispatcher
        .init_errors()
        .into_iter()
        .map(|e| {
            serde_json::json!({
                "provider_id": e.provider_id,
                "kind": e.kind,
                "error": e.error,
            })
        })
        .collect();

    Json(serde_json::json!({
        "models": names,
        "providers_configured": state.dispatcher.len(),
        "init_errors": init_errors,
    }))
}
