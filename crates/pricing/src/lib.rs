//! `PriceCatalog`: in-memory `$/Mtok` pricing lookup, populated once at
//! startup from an external pricing-data endpoint (best-effort; a failed
//! fetch leaves the catalog empty rather than failing the boot).

use std::collections::HashMap;
use std::time::Duration;

use gw_domain::config::{ModelConfig, Pricing, ProviderKind};
use serde::Deserialize;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// One row of the upstream pricing feed before provider-type normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub input_cost_per_million_tokens: Option<f64>,
    #[serde(default)]
    pub output_cost_per_million_tokens: Option<f64>,
    #[serde(default)]
    pub cost_per_request: Option<f64>,
}

/// Per-`(providerType, modelName)` pricing, with per-model override support.
#[derive(Debug, Clone, Default)]
pub struct PriceCatalog {
    entries: HashMap<(ProviderKind, String), Pricing>,
}

impl PriceCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut map = HashMap::new();
        for entry in entries {
            let kind = normalize_provider_type(&entry.provider);
            map.insert(
                (kind, entry.model.clone()),
                Pricing {
                    input_cost_per_million_tokens: entry.input_cost_per_million_tokens,
                    output_cost_per_million_tokens: entry.output_cost_per_million_tokens,
                    cost_per_request: entry.cost_per_request,
                },
            );
        }
        Self { entries: map }
    }

    /// Fetch a catalog from `url` with a 10-second timeout. On any failure
    /// (network error, non-2xx, malformed body) returns an empty catalog
    /// and logs a warning — the engine still runs, just without catalog
    /// pricing (per-model overrides still work).
    pub async fn fetch(url: &str) -> Self {
        match Self::try_fetch(url).await {
            Ok(catalog) => catalog,
            Err(err) => {
                tracing::warn!(url, error = %err, "price catalog fetch failed, starting empty");
                Self::empty()
            }
        }
    }

    async fn try_fetch(url: &str) -> Result<Self, gw_domain::Error> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| gw_domain::Error::Http(e.to_string()))?;
        let resp = client
            .get(url)
            .send()
            .await
            .map_err(|e| gw_domain::Error::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| gw_domain::Error::Http(e.to_string()))?;
        let entries: Vec<CatalogEntry> = resp
            .json()
            .await
            .map_err(|e| gw_domain::Error::Http(e.to_string()))?;
        Ok(Self::from_entries(entries))
    }

    /// `priceFor(providerType, model)`: override first, then exact-match
    /// catalog lookup, else unknown. No prefix/substring matching.
    pub fn price_for(&self, provider_kind: ProviderKind, model: &ModelConfig) -> Option<Pricing> {
        if let Some(pricing) = &model.pricing {
            return Some(*pricing);
        }
        self.entries.get(&(provider_kind, model.name.clone())).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fixed mapping table normalizing upstream catalog provider-name casing
/// and long-tail aliases onto the gateway's closed `ProviderKind` set.
fn normalize_provider_type(raw: &str) -> ProviderKind {
    match raw.to_ascii_lowercase().as_str() {
        "openai" => ProviderKind::Openai,
        "anthropic" => ProviderKind::Anthropic,
        "google" | "gemini" | "vertex_ai" | "vertex_ai-language-models" => ProviderKind::Google,
        "google-vertex" | "vertexai" => ProviderKind::GoogleVertex,
        "azure" | "azure_ai" => ProviderKind::Azure,
        "aws" | "bedrock" | "aws_bedrock" => ProviderKind::Bedrock,
        "groq" => ProviderKind::Groq,
        "mistral" | "mistralai" => ProviderKind::Mistral,
        "deepseek" => ProviderKind::Deepseek,
        "x" | "xai" => ProviderKind::Xai,
        "perplexity" => ProviderKind::Perplexity,
        "togetherai" | "together_ai" | "together" => ProviderKind::Togetherai,
        "openrouter" => ProviderKind::Openrouter,
        "ollama" => ProviderKind::Ollama,
        "qwen" | "dashscope" => ProviderKind::Qwen,
        "claude-code" | "claude_code" => ProviderKind::ClaudeCode,
        "gemini-cli" | "gemini_cli" => ProviderKind::GeminiCli,
        "copilot" | "github_copilot" => ProviderKind::Copilot,
        // Long-tail providers with no dedicated adapter all fold to the
        // generic OpenAI-wire-compatible kind, same as the source's
        // heuristic table.
        _ => ProviderKind::OpenaiCompatible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(provider: &str, model: &str, input: f64, output: f64) -> CatalogEntry {
        CatalogEntry {
            provider: provider.into(),
            model: model.into(),
            input_cost_per_million_tokens: Some(input),
            output_cost_per_million_tokens: Some(output),
            cost_per_request: None,
        }
    }

    fn model(name: &str, pricing: Option<Pricing>) -> ModelConfig {
        ModelConfig {
            name: name.into(),
            mapped_name: None,
            pricing,
            limits: None,
        }
    }

    #[test]
    fn normalizes_anthropic_casing() {
        assert_eq!(normalize_provider_type("ANTHROPIC"), ProviderKind::Anthropic);
    }

    #[test]
    fn normalizes_x_to_xai() {
        assert_eq!(normalize_provider_type("X"), ProviderKind::Xai);
    }

    #[test]
    fn normalizes_aws_to_bedrock() {
        assert_eq!(normalize_provider_type("AWS"), ProviderKind::Bedrock);
    }

    #[test]
    fn unknown_provider_folds_to_openai_compatible() {
        assert_eq!(normalize_provider_type("some-long-tail-host"), ProviderKind::OpenaiCompatible);
    }

    #[test]
    fn exact_match_lookup_succeeds() {
        let catalog = PriceCatalog::from_entries([entry("openai", "gpt-4o", 2.5, 10.0)]);
        let m = model("gpt-4o", None);
        let p = catalog.price_for(ProviderKind::Openai, &m).unwrap();
        assert_eq!(p.input_cost_per_million_tokens, Some(2.5));
    }

    #[test]
    fn no_prefix_matching() {
        let catalog = PriceCatalog::from_entries([entry("openai", "gpt-4o", 2.5, 10.0)]);
        let m = model("gpt-4o-mini", None);
        assert!(catalog.price_for(ProviderKind::Openai, &m).is_none());
    }

    #[test]
    fn model_override_wins_over_catalog() {
        let catalog = PriceCatalog::from_entries([entry("openai", "gpt-4o", 2.5, 10.0)]);
        let m = model(
            "gpt-4o",
            Some(Pricing {
                input_cost_per_million_tokens: Some(0.0),
                output_cost_per_million_tokens: Some(0.0),
                cost_per_request: None,
            }),
        );
        let p = catalog.price_for(ProviderKind::Openai, &m).unwrap();
        assert!(p.is_zero_cost());
    }

    #[test]
    fn empty_object_override_is_known_and_empty() {
        let catalog = PriceCatalog::empty();
        let m = model("anything", Some(Pricing::default()));
        let p = catalog.price_for(ProviderKind::Openai, &m).unwrap();
        assert!(p.is_zero_cost());
    }

    #[test]
    fn unknown_model_returns_none() {
        let catalog = PriceCatalog::empty();
        let m = model("anything", None);
        assert!(catalog.price_for(ProviderKind::Openai, &m).is_none());
    }
}
