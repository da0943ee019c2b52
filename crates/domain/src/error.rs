/// Shared error type used across all gateway crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    /// No configured provider exposes the requested model (mapped or literal name).
    #[error("no provider serves model \"{0}\"")]
    NoProviderForModel(String),

    /// Every candidate provider for the requested model is currently over its
    /// request or token limiter.
    #[error("all providers for model \"{0}\" are rate limited")]
    AllProvidersRateLimited(String),

    /// A provider entry in config could not be turned into an adapter: bad
    /// auth, missing required fields for its kind, malformed base_url, ...
    #[error("provider {provider_id} misconfigured: {message}")]
    ProviderMisconfigured { provider_id: String, message: String },

    /// A provider kind is recognized but this build has no adapter for it
    /// (or the adapter is a stub, see `gw_providers::bedrock`).
    #[error("provider {provider_id} ({kind}) is not supported: {message}")]
    ProviderUnsupported {
        provider_id: String,
        kind: String,
        message: String,
    },

    /// The upstream call itself failed (network, non-2xx, malformed body).
    #[error("upstream call to {provider_id} failed: {message}")]
    UpstreamCallFailed { provider_id: String, message: String },

    /// The upstream SSE stream failed after it had already started.
    #[error("upstream stream from {provider_id} failed: {message}")]
    UpstreamStreamFailed { provider_id: String, message: String },

    /// No price entry (catalog or override) exists for a provider/model pair
    /// that the Executor needs to cost.
    #[error("no pricing known for provider {provider_id} model \"{model}\"")]
    PricingUnknown { provider_id: String, model: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Severity level for a configuration validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue, returned by `Config::validate`.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}
