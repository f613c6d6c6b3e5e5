//! Service implementations
//!
//! Production implementations of the orchestrator's seams and its
//! background loops: the HTTP provider, the local fallback, the
//! pre-generation scheduler and the health monitor.

pub mod fallback;
pub mod health;
pub mod http_provider;
pub mod scheduler;

#[cfg(test)]
mod tests;

pub use fallback::LocalFallbackGenerator;
pub use health::HealthMonitor;
pub use http_provider::HttpImageProvider;
pub use scheduler::{PreGenerationScheduler, ScheduleOutcome, SchedulerSettings};
