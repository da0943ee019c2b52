//! Dispatcher: builds and caches one adapter instance per configured
//! provider.
//!
//! Adapter construction is lazy and keyed by `(provider_id, kind)` — a
//! provider is only built the first time something actually calls it. A
//! `warm_start` pass exercises that same lazy path for every configured
//! provider immediately at boot (and again after a config reload) purely so
//! `ProviderInitError`s are available for `/v1/models/readiness` without
//! waiting for a request to hit a broken provider first.

use std::collections::HashMap;
use std::sync::Arc;

use gw_domain::config::{GatewayConfig, LlmStartupPolicy, ProviderConfig, ProviderKind};
use gw_domain::error::{Error, Result};
use parking_lot::RwLock;

use crate::anthropic::AnthropicProvider;
use crate::bedrock::BedrockProvider;
use crate::google::GoogleProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;

/// Records a provider that failed to initialize.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub kind: String,
    /// Error message with any potential secrets masked.
    pub error: String,
}

/// Mask substrings that look like API keys or bearer tokens in an error
/// message. Prevents raw secrets from leaking into logs, readiness
/// endpoints, or dashboards.
pub(crate) fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_string()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

fn build_adapter(cfg: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    match cfg.kind {
        ProviderKind::Anthropic => {
            AnthropicProvider::from_config(cfg).map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
        }
        ProviderKind::Google | ProviderKind::GoogleVertex => {
            GoogleProvider::from_config(cfg).map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
        }
        ProviderKind::Bedrock => {
            BedrockProvider::from_config(cfg).map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
        }
        _ if cfg.kind.is_openai_wire_compatible() => {
            OpenAiCompatProvider::from_config(cfg).map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
        }
        other => Err(Error::ProviderUnsupported {
            provider_id: cfg.id.clone(),
            kind: other.as_str().to_string(),
            message: "no adapter implements this provider kind".into(),
        }),
    }
}

/// Builds and caches `LlmProvider` adapters from a `GatewayConfig`.
pub struct Dispatcher {
    configs: RwLock<HashMap<String, ProviderConfig>>,
    cache: RwLock<HashMap<String, Arc<dyn LlmProvider>>>,
    init_errors: RwLock<Vec<ProviderInitError>>,
}

impl Dispatcher {
    /// Build a dispatcher from the gateway config and eagerly warm every
    /// configured provider once, so init failures surface before the first
    /// request rather than on it.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let dispatcher = Self {
            configs: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
            init_errors: RwLock::new(Vec::new()),
        };
        dispatcher.reload(config)?;
        Ok(dispatcher)
    }

    /// Replace the configured provider set, clear the adapter cache, and
    /// re-run `warm_start`. Per-provider auth/env resolution is re-done from
    /// scratch; nothing from the old cache survives a reload.
    pub fn reload(&self, config: &GatewayConfig) -> Result<()> {
        let mut configs = HashMap::new();
        for pc in &config.providers {
            configs.insert(pc.id.clone(), pc.clone());
        }
        *self.configs.write() = configs;
        self.cache.write().clear();
        self.warm_start(config.startup_policy)
    }

    /// Lazily build (or fetch from cache) the adapter for `provider_id`.
    pub fn get_or_build(&self, provider_id: &str) -> Result<Arc<dyn LlmProvider>> {
        if let Some(existing) = self.cache.read().get(provider_id).cloned() {
            return Ok(existing);
        }

        let cfg = self
            .configs
            .read()
            .get(provider_id)
            .cloned()
            .ok_or_else(|| Error::ProviderMisconfigured {
                provider_id: provider_id.to_string(),
                message: "no such provider configured".into(),
            })?;

        let adapter = build_adapter(&cfg)?;
        self.cache.write().insert(provider_id.to_string(), adapter.clone());
        Ok(adapter)
    }

    /// Exercise `get_or_build` for every configured provider, recording
    /// failures rather than propagating them — except when the startup
    /// policy is `require_one` and every single provider failed.
    fn warm_start(&self, startup_policy: LlmStartupPolicy) -> Result<()> {
        let ids: Vec<String> = self.configs.read().keys().cloned().collect();
        let mut errors = Vec::new();
        let mut succeeded = 0usize;

        for id in &ids {
            match self.get_or_build(id) {
                Ok(_) => {
                    succeeded += 1;
                    tracing::info!(provider_id = %id, "initialized LLM provider");
                }
                Err(e) => {
                    let safe_error = mask_secrets(&e.to_string());
                    let kind = self
                        .configs
                        .read()
                        .get(id)
                        .map(|c| c.kind.as_str().to_string())
                        .unwrap_or_default();
                    tracing::warn!(
                        provider_id = %id,
                        kind = %kind,
                        error = %safe_error,
                        "failed to initialize LLM provider, skipping"
                    );
                    errors.push(ProviderInitError { provider_id: id.clone(), kind, error: safe_error });
                }
            }
        }

        *self.init_errors.write() = errors;

        if succeeded == 0 && !ids.is_empty() && startup_policy == LlmStartupPolicy::RequireOne {
            return Err(Error::Config(
                "all configured LLM providers failed to initialize (startup_policy = require_one)".into(),
            ));
        }
        Ok(())
    }

    /// Look up a provider's config (used by the router to read its models
    /// and limits without going through adapter construction).
    pub fn provider_config(&self, provider_id: &str) -> Option<ProviderConfig> {
        self.configs.read().get(provider_id).cloned()
    }

    /// All configured provider configs, for the router's candidate scan.
    pub fn all_provider_configs(&self) -> Vec<ProviderConfig> {
        self.configs.read().values().cloned().collect()
    }

    /// Provider initialization errors from the most recent warm start.
    pub fn init_errors(&self) -> Vec<ProviderInitError> {
        self.init_errors.read().clone()
    }

    pub fn len(&self) -> usize {
        self.configs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_secrets_masks_long_alnum_tokens() {
        let msg = "auth failed for key sk-abcdefghijklmnopqrstuvwxyz123456";
        let masked = mask_secrets(msg);
        assert!(!masked.contains("abcdefghijklmnopqrstuvwxyz123456"));
        assert!(masked.contains("..."));
    }

    #[test]
    fn mask_secrets_leaves_short_words_alone() {
        let msg = "HTTP 401 - unauthorized";
        assert_eq!(mask_secrets(msg), msg);
    }

    #[test]
    fn unknown_provider_is_misconfigured() {
        let config = GatewayConfig::default();
        let dispatcher = Dispatcher::from_config(&config).unwrap();
        let err = dispatcher.get_or_build("nope").unwrap_err();
        assert!(err.to_string().contains("no such provider"));
    }

    #[test]
    fn allow_none_boots_with_zero_providers() {
        let config = GatewayConfig { providers: vec![], ..GatewayConfig::default() };
        assert!(Dispatcher::from_config(&config).is_ok());
    }
}
