//! Multi-provider share-image generation orchestrator
//!
//! Turns a content item into a share image by racing interchangeable
//! backend providers, deduplicating concurrent identical requests, caching
//! results and falling back to a local renderer when every provider fails.

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{OrchestratorConfig, ProviderConfig, ResponseFormat};
pub use core::{ProviderRegistry, ProviderSettings, ResultCache, ScoringWeights, SelectionPolicy};
pub use error::{FallbackError, OrchestratorError, OrchestratorResult};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use traits::{FallbackGenerator, ImageGenerator, ImageProvider, ProviderOutput};
pub use types::{Fingerprint, GenerationRequest, GenerationResult, Payload, PromptPayload, ProviderDescriptor};
