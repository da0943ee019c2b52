//! AWS Bedrock stub adapter.
//!
//! Native Bedrock SigV4 authentication requires the `aws-sigv4` and
//! `aws-credential-types` crates, which add significant dependency weight.
//! This stub registers the `bedrock` provider kind so the config option is
//! recognized and validated, but every runtime method returns an actionable
//! error directing users to Bedrock's OpenAI-compatible endpoint instead.
//!
//! Users who need Bedrock today can configure:
//! ```toml
//! [[providers]]
//! id = "bedrock"
//! type = "openai-compatible"
//! base_url = "https://bedrock-runtime.us-east-1.amazonaws.com/v1"
//! ```
//! with IAM auth configured externally (e.g. IAM Roles Anywhere, credential
//! helper, or `aws-vault`).

use crate::traits::{ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider};
use gw_domain::config::ProviderConfig;
use gw_domain::error::{Error, Result};
use gw_domain::stream::{BoxStream, StreamEvent};

const STUB_MSG: &str = "\
AWS Bedrock native SigV4 auth is not yet implemented (requires the \
aws-sdk-bedrockruntime crate). Use type = \"openai-compatible\" with Bedrock's \
OpenAI-compatible endpoint instead: \
base_url = \"https://bedrock-runtime.<region>.amazonaws.com/v1\" \
and configure IAM credentials externally.";

/// Stub LLM provider for AWS Bedrock.
///
/// All runtime methods return an error with guidance on how to use Bedrock
/// via the OpenAI-compatible gateway. The provider is registered
/// successfully so configuration validation passes and the kind is
/// discoverable.
pub struct BedrockProvider {
    id: String,
}

impl BedrockProvider {
    /// Always succeeds so the provider appears in the dispatcher's
    /// init-error bookkeeping as "initialized", not "failed" — the stub
    /// itself is not a misconfiguration.
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        tracing::warn!(
            provider_id = %cfg.id,
            "AWS Bedrock provider registered as a stub — native SigV4 auth \
             not yet implemented. Use type = \"openai-compatible\" with Bedrock's \
             OpenAI-compatible endpoint for now."
        );
        Ok(Self { id: cfg.id.clone() })
    }

    fn stub_error(&self) -> Error {
        Error::Provider { provider: self.id.clone(), message: STUB_MSG.into() }
    }
}

#[async_trait::async_trait]
impl LlmProvider for BedrockProvider {
    async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse> {
        Err(self.stub_error())
    }

    async fn chat_stream(&self, _req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        Err(self.stub_error())
    }

    async fn embeddings(&self, _req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        Err(self.stub_error())
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}
