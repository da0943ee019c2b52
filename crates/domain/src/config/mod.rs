mod provider;
mod server;

pub use provider::*;
pub use server::*;
pub use crate::error::{ConfigIssue, ConfigSeverity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good. Errors indicate the
    /// config cannot be used as-is; warnings are advisory.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.gateway.providers.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "gateway.providers".into(),
                message: "no LLM providers configured".into(),
            });
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (i, provider) in self.gateway.providers.iter().enumerate() {
            self.validate_provider(i, provider, &mut seen_ids, &mut issues);
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        issues
    }

    fn validate_provider<'a>(
        &self,
        i: usize,
        provider: &'a ProviderConfig,
        seen_ids: &mut HashSet<&'a str>,
        issues: &mut Vec<ConfigIssue>,
    ) {
        if provider.id.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: format!("gateway.providers[{i}].id"),
                message: "provider id must not be empty".into(),
            });
        } else if provider.id.len() > 32 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: format!("gateway.providers[{i}].id"),
                message: format!(
                    "provider id \"{}\" is longer than 32 characters",
                    provider.id
                ),
            });
        }

        if !provider.id.is_empty() && !seen_ids.insert(&provider.id) {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: format!("gateway.providers[{i}].id"),
                message: format!("duplicate provider id \"{}\"", provider.id),
            });
        }

        if provider.models.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: format!("gateway.providers[{i}].models"),
                message: format!("provider \"{}\" has no models configured", provider.id),
            });
        }

        let base_url = provider
            .base_url
            .as_deref()
            .or_else(|| provider.kind.default_base_url());
        match base_url {
            None => {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("gateway.providers[{i}].base_url"),
                    message: format!(
                        "provider \"{}\" ({}) has no base_url and no default for its kind",
                        provider.id,
                        provider.kind.as_str()
                    ),
                });
            }
            Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("gateway.providers[{i}].base_url"),
                    message: format!("base_url must start with http:// or https:// (got \"{url}\")"),
                });
            }
            _ => {}
        }

        if provider.kind == ProviderKind::Azure
            && (provider.azure_resource.is_none() || provider.azure_deployment.is_none())
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: format!("gateway.providers[{i}]"),
                message: "azure provider requires azure_resource and azure_deployment".into(),
            });
        }

        self.validate_limits(&format!("gateway.providers[{i}].limits"), &provider.limits, issues);
        for (mi, model) in provider.models.iter().enumerate() {
            self.validate_limits(
                &format!("gateway.providers[{i}].models[{mi}].limits"),
                &model.limits,
                issues,
            );
            if let Some(pricing) = &model.pricing {
                self.validate_pricing(
                    &format!("gateway.providers[{i}].models[{mi}].pricing"),
                    pricing,
                    issues,
                );
            }
        }
    }

    fn validate_limits(&self, field: &str, limits: &Option<Limits>, issues: &mut Vec<ConfigIssue>) {
        let Some(limits) = limits else { return };
        let checks: [(&str, Option<f64>); 9] = [
            ("requests_per_minute", limits.requests_per_minute.map(|v| v as f64)),
            ("requests_per_hour", limits.requests_per_hour.map(|v| v as f64)),
            ("requests_per_day", limits.requests_per_day.map(|v| v as f64)),
            ("tokens_per_minute", limits.tokens_per_minute.map(|v| v as f64)),
            ("tokens_per_hour", limits.tokens_per_hour.map(|v| v as f64)),
            ("tokens_per_day", limits.tokens_per_day.map(|v| v as f64)),
            ("cost_per_minute", limits.cost_per_minute),
            ("cost_per_hour", limits.cost_per_hour),
            ("cost_per_day", limits.cost_per_day),
        ];
        for (name, value) in checks {
            if let Some(v) = value {
                if v <= 0.0 {
                    issues.push(ConfigIssue {
                        severity: ConfigSeverity::Error,
                        field: format!("{field}.{name}"),
                        message: format!("limit must be a positive number (got {v})"),
                    });
                }
            }
        }
    }

    fn validate_pricing(&self, field: &str, pricing: &Pricing, issues: &mut Vec<ConfigIssue>) {
        for (name, value) in [
            ("input_cost_per_million_tokens", pricing.input_cost_per_million_tokens),
            ("output_cost_per_million_tokens", pricing.output_cost_per_million_tokens),
            ("cost_per_request", pricing.cost_per_request),
        ] {
            if let Some(v) = value {
                if v < 0.0 {
                    issues.push(ConfigIssue {
                        severity: ConfigSeverity::Error,
                        field: format!("{field}.{name}"),
                        message: format!("price must not be negative (got {v})"),
                    });
                }
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            server: ServerConfig {
                port: 3210,
                host: "127.0.0.1".into(),
                ..ServerConfig::default()
            },
            gateway: GatewayConfig {
                providers: vec![ProviderConfig {
                    id: "openai".into(),
                    kind: ProviderKind::Openai,
                    base_url: None,
                    auth: AuthConfig {
                        mode: Some(AuthMode::ApiKey),
                        env: Some("OPENAI_API_KEY".into()),
                        ..AuthConfig::default()
                    },
                    azure_resource: None,
                    azure_deployment: None,
                    azure_api_version: None,
                    aws_region: None,
                    models: vec![ModelConfig {
                        name: "gpt-4o-mini".into(),
                        mapped_name: None,
                        pricing: None,
                        limits: None,
                    }],
                    limits: None,
                }],
                ..GatewayConfig::default()
            },
        }
    }

    fn errors_of(issues: &[ConfigIssue]) -> Vec<&ConfigIssue> {
        issues.iter().filter(|i| i.severity == ConfigSeverity::Error).collect()
    }

    #[test]
    fn valid_config_has_no_errors() {
        let issues = valid_config().validate();
        assert!(errors_of(&issues).is_empty(), "unexpected errors: {:?}", errors_of(&issues));
    }

    #[test]
    fn server_port_zero_is_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.field == "server.port"));
    }

    #[test]
    fn empty_providers_is_warning_not_error() {
        let mut cfg = valid_config();
        cfg.gateway.providers.clear();
        let issues = cfg.validate();
        assert!(errors_of(&issues).is_empty());
        assert!(issues
            .iter()
            .any(|i| i.field == "gateway.providers" && i.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn duplicate_provider_id_is_error() {
        let mut cfg = valid_config();
        let dup = cfg.gateway.providers[0].clone();
        cfg.gateway.providers.push(dup);
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.message.contains("duplicate provider id")));
    }

    #[test]
    fn provider_without_models_is_error() {
        let mut cfg = valid_config();
        cfg.gateway.providers[0].models.clear();
        let issues = cfg.validate();
        assert!(errors_of(&issues).iter().any(|i| i.field.ends_with(".models")));
    }

    #[test]
    fn custom_provider_without_base_url_is_error() {
        let mut cfg = valid_config();
        cfg.gateway.providers[0].kind = ProviderKind::Custom;
        cfg.gateway.providers[0].base_url = None;
        let issues = cfg.validate();
        assert!(errors_of(&issues).iter().any(|i| i.field.ends_with(".base_url")));
    }

    #[test]
    fn negative_limit_is_error() {
        let mut cfg = valid_config();
        cfg.gateway.providers[0].limits = Some(Limits {
            requests_per_minute: Some(0),
            ..Limits::default()
        });
        let issues = cfg.validate();
        assert!(errors_of(&issues)
            .iter()
            .any(|i| i.field.ends_with("requests_per_minute")));
    }

    #[test]
    fn negative_pricing_is_error() {
        let mut cfg = valid_config();
        cfg.gateway.providers[0].models[0].pricing = Some(Pricing {
            input_cost_per_million_tokens: Some(-1.0),
            ..Pricing::default()
        });
        let issues = cfg.validate();
        assert!(errors_of(&issues)
            .iter()
            .any(|i| i.field.ends_with("input_cost_per_million_tokens")));
    }

    #[test]
    fn azure_without_resource_is_error() {
        let mut cfg = valid_config();
        cfg.gateway.providers[0].kind = ProviderKind::Azure;
        cfg.gateway.providers[0].base_url = Some("https://example.openai.azure.com".into());
        let issues = cfg.validate();
        assert!(errors_of(&issues).iter().any(|i| i.message.contains("azure_resource")));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let cfg = valid_config();
        let s = toml::to_string(&cfg).expect("serialize");
        let back: Config = toml::from_str(&s).expect("deserialize");
        assert_eq!(back.gateway.providers.len(), 1);
        assert_eq!(back.gateway.providers[0].id, "openai");
    }
}
