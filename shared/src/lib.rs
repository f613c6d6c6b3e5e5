//! Shared types for the share-image generation system
//!
//! Contains the contract types exchanged with collaborators (Content Source,
//! Visibility Signal, Observability), the shared error type, and logging
//! setup used by every binary in the workspace.

pub mod errors;
pub mod logging;
pub mod messages;
pub mod types;

pub use errors::*;
pub use messages::{
    CacheStatus, ContentItem, PerformanceStatus, ProviderStatusEntry, SemanticPayload, StatusSnapshot,
    VisibilitySignal,
};
pub use types::*;
