use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single completed call's accounting record, as consumed by
/// `gw_usage::UsageManager::consume` and exposed via `snapshot()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub provider_id: String,
    pub model_name: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// `0.0` and pricing-unknown are indistinguishable on this field alone;
    /// `cost_known` disambiguates for observability (§7 PricingUnknown).
    pub cost_usd: f64,
    pub cost_known: bool,
    pub timestamp_utc: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(
        provider_id: impl Into<String>,
        model_name: impl Into<String>,
        prompt_tokens: u64,
        completion_tokens: u64,
        cost_usd: f64,
        cost_known: bool,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_name: model_name.into(),
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            cost_usd,
            cost_known,
            timestamp_utc: Utc::now(),
        }
    }

    /// Cost expressed in integer points, `1 USD = 10_000 points`, rounded
    /// to the nearest point (preserves four decimal places of precision).
    pub fn cost_points(&self) -> u64 {
        (self.cost_usd * 10_000.0).round().max(0.0) as u64
    }
}
