//! `UsageManager`: owns the nine per-provider sliding-window limiters.

use std::collections::HashMap;

use chrono::Utc;
use gw_domain::config::GatewayConfig;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::limiter::{usd_to_points, LimiterKind, LimiterState};

type LimiterKey = (String, LimiterKind);

/// Read-only view of one limiter, for `snapshot()`.
#[derive(Debug, Clone, Serialize)]
pub struct LimiterSnapshot {
    pub provider_id: String,
    pub kind: LimiterKind,
    pub points: u64,
    pub duration_secs: u64,
    pub consumed: u64,
}

/// Normalized usage counts consumed by a single completed call. Field
/// names accept either `{promptTokens,completionTokens}` or
/// `{inputTokens,outputTokens}` at the adapter boundary — by the time it
/// reaches `UsageManager` it has already been normalized to this shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl CallUsage {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Owns every provider's limiters. `isUnderLimit` and `consume` each
/// acquire only the one limiter they touch — there is no cross-limiter
/// transaction, matching the spec's tolerated overshoot-by-N-in-flight.
pub struct UsageManager {
    limiters: RwLock<HashMap<LimiterKey, Mutex<LimiterState>>>,
}

impl UsageManager {
    pub fn new() -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        let manager = Self::new();
        manager.reconcile(config);
        manager
    }

    /// `isUnderLimit(providerId, modelName)`: false if any request-based or
    /// token-based counter for this provider is at capacity. Cost limiters
    /// are never consulted here — per-call cost is unknown pre-flight.
    ///
    /// `model_name` is accepted for forward compatibility with per-model
    /// limiters but is currently unused: only provider-wide limits are
    /// enforced (see DESIGN.md).
    pub fn is_under_limit(&self, provider_id: &str, _model_name: &str) -> bool {
        let now = Utc::now().timestamp();
        let limiters = self.limiters.read();
        for kind in LimiterKind::ALL {
            if !(kind.is_request() || kind.is_token()) {
                continue;
            }
            if let Some(limiter) = limiters.get(&(provider_id.to_string(), kind)) {
                if !limiter.lock().is_under(now) {
                    return false;
                }
            }
        }
        true
    }

    /// `consume(providerId, modelName, usage, costUSD)`: increments every
    /// configured limiter for this provider. Always succeeds; an overshoot
    /// is logged but the counts are still persisted — the call already hit
    /// the provider.
    pub fn consume(&self, provider_id: &str, _model_name: &str, usage: CallUsage, cost_usd: f64) {
        let now = Utc::now().timestamp();
        let cost_points = usd_to_points(cost_usd.max(0.0));
        let limiters = self.limiters.read();
        for kind in LimiterKind::ALL {
            let Some(limiter) = limiters.get(&(provider_id.to_string(), kind)) else {
                continue;
            };
            let n = if kind.is_request() {
                1
            } else if kind.is_token() {
                usage.total_tokens()
            } else {
                cost_points
            };
            let overshot = limiter.lock().consume(now, n);
            if overshot {
                tracing::warn!(
                    provider_id,
                    limit_type = ?kind,
                    "usage limiter exceeded capacity (post-hoc, still recorded)"
                );
            }
        }
    }

    pub fn snapshot(&self) -> Vec<LimiterSnapshot> {
        let limiters = self.limiters.read();
        let mut out: Vec<LimiterSnapshot> = limiters
            .iter()
            .map(|((provider_id, kind), state)| {
                let state = state.lock();
                LimiterSnapshot {
                    provider_id: provider_id.clone(),
                    kind: *kind,
                    points: state.points,
                    duration_secs: state.duration_secs,
                    consumed: state.consumed,
                }
            })
            .collect();
        out.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        out
    }

    /// Reconcile limiters against a freshly loaded config: create new,
    /// delete orphaned (vanished provider ids, or dimensions no longer
    /// configured), preserve unchanged `(providerId, limitType, points,
    /// duration)` identity so a reload never resets a live counter.
    pub fn reconcile(&self, config: &GatewayConfig) {
        let now = Utc::now().timestamp();
        let mut wanted: HashMap<LimiterKey, (u64, u64)> = HashMap::new();
        for provider in &config.providers {
            let Some(limits) = &provider.limits else { continue };
            for kind in LimiterKind::ALL {
                if let Some(points) = kind.points_from(limits) {
                    wanted.insert((provider.id.clone(), kind), (points, kind.duration_secs()));
                }
            }
        }

        let mut limiters = self.limiters.write();
        limiters.retain(|key, _| wanted.contains_key(key));
        for (key, (points, duration)) in wanted {
            match limiters.get(&key) {
                Some(existing) if existing.lock().same_identity(points, duration) => {
                    // Unchanged identity: preserve the running counter.
                }
                _ => {
                    limiters.insert(key, Mutex::new(LimiterState::new(points, duration, now)));
                }
            }
        }
    }
}

impl Default for UsageManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_domain::config::{AuthConfig, Limits, ModelConfig, ProviderConfig, ProviderKind};

    fn provider(id: &str, limits: Limits) -> ProviderConfig {
        ProviderConfig {
            id: id.into(),
            kind: ProviderKind::OpenaiCompatible,
            base_url: Some("http://localhost:11434".into()),
            auth: AuthConfig::default(),
            azure_resource: None,
            azure_deployment: None,
            azure_api_version: None,
            aws_region: None,
            models: vec![ModelConfig {
                name: "m1".into(),
                mapped_name: None,
                pricing: None,
                limits: None,
            }],
            limits: Some(limits),
        }
    }

    #[test]
    fn no_limits_configured_always_under() {
        let manager = UsageManager::new();
        assert!(manager.is_under_limit("p1", "m1"));
    }

    #[test]
    fn request_limiter_trips_after_capacity() {
        let config = GatewayConfig {
            providers: vec![provider(
                "p1",
                Limits {
                    requests_per_minute: Some(1),
                    ..Limits::default()
                },
            )],
            ..GatewayConfig::default()
        };
        let manager = UsageManager::from_config(&config);
        assert!(manager.is_under_limit("p1", "m1"));
        manager.consume("p1", "m1", CallUsage::default(), 0.0);
        assert!(!manager.is_under_limit("p1", "m1"));
    }

    #[test]
    fn cost_limiter_not_checked_preflight() {
        let config = GatewayConfig {
            providers: vec![provider(
                "p1",
                Limits {
                    cost_per_minute: Some(0.01),
                    ..Limits::default()
                },
            )],
            ..GatewayConfig::default()
        };
        let manager = UsageManager::from_config(&config);
        manager.consume("p1", "m1", CallUsage::default(), 100.0);
        // Cost limiter is blown way over capacity, but is_under_limit only
        // consults request/token dimensions.
        assert!(manager.is_under_limit("p1", "m1"));
    }

    #[test]
    fn consume_overshoot_is_persisted_not_rejected() {
        let config = GatewayConfig {
            providers: vec![provider(
                "p1",
                Limits {
                    tokens_per_minute: Some(10),
                    ..Limits::default()
                },
            )],
            ..GatewayConfig::default()
        };
        let manager = UsageManager::from_config(&config);
        manager.consume(
            "p1",
            "m1",
            CallUsage {
                prompt_tokens: 8,
                completion_tokens: 8,
            },
            0.0,
        );
        let snap = manager.snapshot();
        let tpm = snap
            .iter()
            .find(|s| s.kind == LimiterKind::TokensPerMinute)
            .unwrap();
        assert_eq!(tpm.consumed, 16);
    }

    #[test]
    fn reconcile_drops_vanished_providers() {
        let config = GatewayConfig {
            providers: vec![provider(
                "p1",
                Limits {
                    requests_per_minute: Some(5),
                    ..Limits::default()
                },
            )],
            ..GatewayConfig::default()
        };
        let manager = UsageManager::from_config(&config);
        assert_eq!(manager.snapshot().len(), 1);

        let empty = GatewayConfig::default();
        manager.reconcile(&empty);
        assert!(manager.snapshot().is_empty());
    }

    #[test]
    fn reconcile_preserves_unchanged_identity() {
        let config = GatewayConfig {
            providers: vec![provider(
                "p1",
                Limits {
                    requests_per_minute: Some(5),
                    ..Limits::default()
                },
            )],
            ..GatewayConfig::default()
        };
        let manager = UsageManager::from_config(&config);
        manager.consume("p1", "m1", CallUsage::default(), 0.0);

        manager.reconcile(&config); // same (points, duration) — preserved
        let snap = manager.snapshot();
        assert_eq!(snap[0].consumed, 1);
    }

    #[test]
    fn reconcile_resets_when_points_change() {
        let config = GatewayConfig {
            providers: vec![provider(
                "p1",
                Limits {
                    requests_per_minute: Some(5),
                    ..Limits::default()
                },
            )],
            ..GatewayConfig::default()
        };
        let manager = UsageManager::from_config(&config);
        manager.consume("p1", "m1", CallUsage::default(), 0.0);

        let changed = GatewayConfig {
            providers: vec![provider(
                "p1",
                Limits {
                    requests_per_minute: Some(50),
                    ..Limits::default()
                },
            )],
            ..GatewayConfig::default()
        };
        manager.reconcile(&changed);
        let snap = manager.snapshot();
        assert_eq!(snap[0].consumed, 0);
        assert_eq!(snap[0].points, 50);
    }
}
