//! Core generation machinery
//!
//! Provider bookkeeping, selection, result caching and in-flight
//! deduplication. Nothing here performs network I/O directly; backends are
//! reached through the [`ImageProvider`](crate::traits::ImageProvider) trait.

pub mod adapter;
pub mod cache;
pub mod dedup;
pub mod metrics;
pub mod registry;
pub mod selection;

pub use adapter::ProviderAdapter;
pub use cache::{CacheEntry, ResultCache};
pub use dedup::{InFlightDeduplicator, Resolution};
pub use metrics::PerformanceStats;
pub use registry::{LoadGuard, ProviderRegistry, ProviderSettings};
pub use selection::{ScoringWeights, SelectionPolicy};
