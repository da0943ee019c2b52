use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider kinds
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The closed set of upstream LLM provider kinds the gateway understands.
///
/// Adding a new kind means adding a variant here and a factory arm in
/// `gw_providers::dispatcher` — unsupported kinds are unrepresentable
/// rather than runtime-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Openai,
    Anthropic,
    Google,
    GoogleVertex,
    Azure,
    Bedrock,
    Groq,
    Mistral,
    Deepseek,
    Xai,
    Perplexity,
    Togetherai,
    Openrouter,
    Ollama,
    Qwen,
    OpenaiCompatible,
    ClaudeCode,
    GeminiCli,
    Copilot,
    Custom,
}

impl ProviderKind {
    /// Short tag used in log fields and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::GoogleVertex => "google-vertex",
            ProviderKind::Azure => "azure",
            ProviderKind::Bedrock => "bedrock",
            ProviderKind::Groq => "groq",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Deepseek => "deepseek",
            ProviderKind::Xai => "xai",
            ProviderKind::Perplexity => "perplexity",
            ProviderKind::Togetherai => "togetherai",
            ProviderKind::Openrouter => "openrouter",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Qwen => "qwen",
            ProviderKind::OpenaiCompatible => "openai-compatible",
            ProviderKind::ClaudeCode => "claude-code",
            ProviderKind::GeminiCli => "gemini-cli",
            ProviderKind::Copilot => "copilot",
            ProviderKind::Custom => "custom",
        }
    }

    /// Most provider kinds in this closed set speak an OpenAI-wire-compatible
    /// chat-completions API and differ only in base URL / auth header; these
    /// route through the same adapter with a per-kind default base URL.
    pub fn is_openai_wire_compatible(&self) -> bool {
        !matches!(
            self,
            ProviderKind::Anthropic
                | ProviderKind::Google
                | ProviderKind::GoogleVertex
                | ProviderKind::Bedrock
        )
    }

    /// Default base URL for kinds that have one fixed, documented endpoint.
    /// Kinds without a fixed endpoint (openai-compatible, custom, azure,
    /// ollama, claude-code, gemini-cli, copilot) require `base_url` in config.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Openai => Some("https://api.openai.com/v1"),
            ProviderKind::Anthropic => Some("https://api.anthropic.com"),
            ProviderKind::Google => Some("https://generativelanguage.googleapis.com/v1beta"),
            ProviderKind::Groq => Some("https://api.groq.com/openai/v1"),
            ProviderKind::Mistral => Some("https://api.mistral.ai/v1"),
            ProviderKind::Deepseek => Some("https://api.deepseek.com/v1"),
            ProviderKind::Xai => Some("https://api.x.ai/v1"),
            ProviderKind::Perplexity => Some("https://api.perplexity.ai"),
            ProviderKind::Togetherai => Some("https://api.together.xyz/v1"),
            ProviderKind::Openrouter => Some("https://openrouter.ai/api/v1"),
            ProviderKind::Qwen => Some("https://dashscope.aliyuncs.com/compatible-mode/v1"),
            _ => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Auth
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Bearer/header API key (most providers).
    ApiKey,
    /// API key sent as a query parameter (some Google endpoints).
    QueryParam,
    /// A pre-obtained OAuth access token, supplied via `env`/`key` — no
    /// device-code flow is performed by the gateway itself.
    OauthToken,
    /// AWS SigV4 request signing (Bedrock); `key`/`env` hold the access key,
    /// `keys[0]` (if present) the secret key.
    AwsSigv4,
    /// No credentials required (local endpoints such as Ollama).
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: Option<AuthMode>,
    /// Environment variable to read the credential from.
    #[serde(default)]
    pub env: Option<String>,
    /// Credential given directly in config (discouraged, but supported).
    #[serde(default)]
    pub key: Option<String>,
    /// Environment variable names for a pool of keys to round-robin across
    /// (see `gw_providers::auth::AuthRotator`).
    #[serde(default)]
    pub keys: Vec<String>,
    /// Header name to send the credential under. Defaults per provider kind
    /// when unset (`Authorization` for most, `x-api-key` for Anthropic).
    #[serde(default)]
    pub header: Option<String>,
    /// Value prefix before the credential, e.g. `"Bearer "`.
    #[serde(default)]
    pub prefix: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Up to nine optional positive limits: `{requests,tokens,cost} x
/// {per_minute,per_hour,per_day}`. Absent fields mean "no limiter for that
/// dimension" — `gw_usage::UsageManager` only builds limiters for fields
/// that are `Some`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default)]
    pub requests_per_minute: Option<u64>,
    #[serde(default)]
    pub requests_per_hour: Option<u64>,
    #[serde(default)]
    pub requests_per_day: Option<u64>,
    #[serde(default)]
    pub tokens_per_minute: Option<u64>,
    #[serde(default)]
    pub tokens_per_hour: Option<u64>,
    #[serde(default)]
    pub tokens_per_day: Option<u64>,
    /// USD.
    #[serde(default)]
    pub cost_per_minute: Option<f64>,
    #[serde(default)]
    pub cost_per_hour: Option<f64>,
    #[serde(default)]
    pub cost_per_day: Option<f64>,
}

impl Limits {
    pub fn is_empty(&self) -> bool {
        self.requests_per_minute.is_none()
            && self.requests_per_hour.is_none()
            && self.requests_per_day.is_none()
            && self.tokens_per_minute.is_none()
            && self.tokens_per_hour.is_none()
            && self.tokens_per_day.is_none()
            && self.cost_per_minute.is_none()
            && self.cost_per_hour.is_none()
            && self.cost_per_day.is_none()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pricing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    pub input_cost_per_million_tokens: Option<f64>,
    #[serde(default)]
    pub output_cost_per_million_tokens: Option<f64>,
    /// Flat per-call cost; overrides token-based calculation when set.
    #[serde(default)]
    pub cost_per_request: Option<f64>,
}

impl Pricing {
    /// True iff every defined price field is exactly 0. An empty `Pricing`
    /// (all fields `None`) is vacuously zero-cost — "known and empty".
    pub fn is_zero_cost(&self) -> bool {
        self.input_cost_per_million_tokens.unwrap_or(0.0) == 0.0
            && self.output_cost_per_million_tokens.unwrap_or(0.0) == 0.0
            && self.cost_per_request.unwrap_or(0.0) == 0.0
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model / Provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// The identifier the provider expects.
    pub name: String,
    /// The identifier clients use; falls back to `name` when unset.
    #[serde(default)]
    pub mapped_name: Option<String>,
    #[serde(default)]
    pub pricing: Option<Pricing>,
    /// Additive per-model limits, scoped by provider+model. Parsed and
    /// stored but not enforced — see DESIGN.md (per-model enforcement is
    /// an open question the spec defers as a future extension).
    #[serde(default)]
    pub limits: Option<Limits>,
}

impl ModelConfig {
    /// The client-facing name: `mapped_name`, falling back to `name`.
    pub fn client_facing_name(&self) -> &str {
        self.mapped_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique across the loaded config. At most 32 characters.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Azure: the Azure OpenAI resource name.
    #[serde(default)]
    pub azure_resource: Option<String>,
    /// Azure: the deployment name (maps to the wire `model` path segment).
    #[serde(default)]
    pub azure_deployment: Option<String>,
    /// Azure: API version query parameter.
    #[serde(default)]
    pub azure_api_version: Option<String>,
    /// Bedrock: AWS region.
    #[serde(default)]
    pub aws_region: Option<String>,
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub limits: Option<Limits>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Startup policy & top-level gateway config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Governs what happens at startup when provider adapters fail to
/// initialize. Does not affect per-request routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmStartupPolicy {
    /// Boot even if every provider fails to initialize; LLM routes then
    /// return 503 until the config is fixed and reloaded.
    #[default]
    AllowNone,
    /// Abort startup unless at least one provider initializes successfully.
    RequireOne,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub startup_policy: LlmStartupPolicy,
    /// Endpoint the price catalog fetches `$/Mtok` data from at startup.
    /// `None` means the catalog starts (and stays) empty unless every price
    /// comes from a per-model override.
    #[serde(default)]
    pub pricing_endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_facing_name_falls_back_to_name() {
        let m = ModelConfig {
            name: "gpt-4o".into(),
            mapped_name: None,
            pricing: None,
            limits: None,
        };
        assert_eq!(m.client_facing_name(), "gpt-4o");
    }

    #[test]
    fn client_facing_name_uses_mapped_name() {
        let m = ModelConfig {
            name: "google/gemini-2.5-flash".into(),
            mapped_name: Some("gemini-2.5-flash".into()),
            pricing: None,
            limits: None,
        };
        assert_eq!(m.client_facing_name(), "gemini-2.5-flash");
    }

    #[test]
    fn empty_pricing_is_zero_cost() {
        assert!(Pricing::default().is_zero_cost());
    }

    #[test]
    fn explicit_zero_pricing_is_zero_cost() {
        let p = Pricing {
            input_cost_per_million_tokens: Some(0.0),
            output_cost_per_million_tokens: Some(0.0),
            cost_per_request: None,
        };
        assert!(p.is_zero_cost());
    }

    #[test]
    fn nonzero_pricing_is_not_zero_cost() {
        let p = Pricing {
            input_cost_per_million_tokens: Some(1.0),
            output_cost_per_million_tokens: Some(1.0),
            cost_per_request: None,
        };
        assert!(!p.is_zero_cost());
    }

    #[test]
    fn provider_kind_kebab_case_round_trips() {
        let v = serde_json::to_value(ProviderKind::GoogleVertex).unwrap();
        assert_eq!(v, serde_json::json!("google-vertex"));
        let back: ProviderKind = serde_json::from_value(v).unwrap();
        assert_eq!(back, ProviderKind::GoogleVertex);
    }
}
