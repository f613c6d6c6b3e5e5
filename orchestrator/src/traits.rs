//! Trait definitions with mockall annotations for testing
//!
//! These are the seams of the orchestrator: backend providers, the local
//! fallback path, and the generator the pre-generation scheduler drives.

use async_trait::async_trait;
use shared::{ProviderFailure, ProviderId};

use crate::error::{FallbackError, OrchestratorResult};
use crate::types::{Fingerprint, GenerationRequest, GenerationResult, Payload, PromptPayload};

/// Successful output of a single backend call
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOutput {
    pub payload: Payload,
    /// Provider-reported quality, 0-100
    pub quality_score: Option<u8>,
}

/// Backend image provider capability.
///
/// Implementations only talk to their backend. Timeouts, load accounting and
/// metrics are handled by [`crate::core::ProviderAdapter`] and the registry.
#[mockall::automock]
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Stable provider identifier
    fn id(&self) -> &ProviderId;

    /// Produce an image for the prompt
    async fn generate(&self, prompt: &PromptPayload) -> Result<ProviderOutput, ProviderFailure>;

    /// Lightweight liveness probe
    async fn health_check(&self) -> bool;
}

/// Last-resort local generation path
#[mockall::automock]
pub trait FallbackGenerator: Send + Sync {
    /// Must not depend on any external provider
    fn generate(&self, request: &GenerationRequest) -> Result<Payload, FallbackError>;
}

/// Anything that can turn a request into a result, as seen by background callers
#[mockall::automock]
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Run a request through cache, dedup, racing and fallback
    async fn generate(&self, request: GenerationRequest) -> OrchestratorResult<GenerationResult>;

    /// Whether the fingerprint is cached or currently being generated
    fn is_known(&self, fingerprint: &Fingerprint) -> bool;
}
