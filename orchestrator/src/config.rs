//! Orchestrator configuration
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. an optional JSON file (`--config`)
//! 3. `.env` in the working directory or a parent, then process environment
//!    (`SHAREGEN_CACHE_TTL_MS`, `SHAREGEN_HEALTH_INTERVAL_MS`,
//!    `SHAREGEN_SCHEDULER_MAX_CONCURRENT`)
//!
//! Provider API keys are never stored in the file; each provider names the
//! environment variable that holds its key.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::component_debug;
use url::Url;

use crate::core::cache::DEFAULT_CACHE_TTL;
use crate::core::registry::{ProviderSettings, DEFAULT_EMA_ALPHA};
use crate::core::ScoringWeights;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::orchestrator::{OrchestratorSettings, DEFAULT_FALLBACK_QUALITY};
use crate::services::scheduler::SchedulerSettings;

const COMPONENT: &str = "config";

pub const ENV_CACHE_TTL_MS: &str = "SHAREGEN_CACHE_TTL_MS";
pub const ENV_HEALTH_INTERVAL_MS: &str = "SHAREGEN_HEALTH_INTERVAL_MS";
pub const ENV_SCHEDULER_MAX_CONCURRENT: &str = "SHAREGEN_SCHEDULER_MAX_CONCURRENT";

/// How a provider's HTTP response carries the image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// The body is the image; content type from the response header
    Binary,
    /// JSON body with an image URL at `pointer` (RFC 6901)
    JsonUrl { pointer: String },
    /// JSON body with base64 image data at `pointer`
    JsonBase64 {
        pointer: String,
        #[serde(default = "default_content_type")]
        content_type: String,
    },
}

impl Default for ResponseFormat {
    fn default() -> Self {
        Self::Binary
    }
}

fn default_content_type() -> String {
    "image/png".to_string()
}

/// One configured backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub endpoint: String,
    /// Probed by the health monitor; without one the provider is never marked down by probes
    #[serde(default)]
    pub health_endpoint: Option<String>,
    /// Environment variable holding the bearer token
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub response: ResponseFormat,
    /// JSON pointer to a 0-100 quality value in the response
    #[serde(default)]
    pub quality_pointer: Option<String>,
    /// Quality assumed when the response carries none
    #[serde(default)]
    pub base_quality: Option<u8>,
}

fn default_priority() -> u32 {
    ProviderSettings::default().priority
}

fn default_max_concurrent() -> u32 {
    ProviderSettings::default().max_concurrent
}

fn default_timeout_ms() -> u64 {
    ProviderSettings::default().timeout.as_millis() as u64
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            endpoint: endpoint.into(),
            health_endpoint: None,
            api_key_env: None,
            priority: default_priority(),
            max_concurrent: default_max_concurrent(),
            timeout_ms: default_timeout_ms(),
            response: ResponseFormat::default(),
            quality_pointer: None,
            base_quality: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Registry settings for this provider
    pub fn settings(&self) -> ProviderSettings {
        let name = if self.name.is_empty() { &self.id } else { &self.name };
        ProviderSettings::new(name.clone())
            .with_priority(self.priority)
            .with_max_concurrent(self.max_concurrent)
            .with_timeout(self.timeout())
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> OrchestratorResult<Option<String>> {
        match &self.api_key_env {
            None => Ok(None),
            Some(var) => std::env::var(var).map(Some).map_err(|_| {
                OrchestratorError::config(
                    format!("providers.{}.api_key_env", self.id),
                    format!("environment variable {var} is not set"),
                )
            }),
        }
    }

    fn validate(&self) -> OrchestratorResult<()> {
        let field = |name: &str| format!("providers.{}.{}", self.id, name);

        if self.id.trim().is_empty() {
            return Err(OrchestratorError::config("providers.id", "must not be empty"));
        }
        Url::parse(&self.endpoint).map_err(|e| OrchestratorError::config(field("endpoint"), e.to_string()))?;
        if let Some(health) = &self.health_endpoint {
            Url::parse(health).map_err(|e| OrchestratorError::config(field("health_endpoint"), e.to_string()))?;
        }
        if self.max_concurrent == 0 {
            return Err(OrchestratorError::config(field("max_concurrent"), "must be at least 1"));
        }
        if self.timeout_ms == 0 {
            return Err(OrchestratorError::config(field("timeout_ms"), "must be non-zero"));
        }
        if matches!(self.base_quality, Some(q) if q > 100) {
            return Err(OrchestratorError::config(field("base_quality"), "must be within 0-100"));
        }
        Ok(())
    }
}

/// Complete orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub cache_ttl_ms: u64,
    pub health_check_interval_ms: u64,
    pub fallback_quality: u8,
    pub ema_alpha: f64,
    pub scoring: ScoringWeights,
    pub scheduler: SchedulerSettings,
    pub providers: Vec<ProviderConfig>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: DEFAULT_CACHE_TTL.as_millis() as u64,
            health_check_interval_ms: 30_000,
            fallback_quality: DEFAULT_FALLBACK_QUALITY,
            ema_alpha: DEFAULT_EMA_ALPHA,
            scoring: ScoringWeights::default(),
            scheduler: SchedulerSettings::default(),
            providers: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Load defaults, the optional file, `.env` and environment overrides, then validate
    pub fn load(path: Option<&Path>) -> OrchestratorResult<Self> {
        // a missing .env is fine
        let _ = dotenv::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        component_debug!(
            COMPONENT,
            providers = config.providers.len(),
            cache_ttl_ms = config.cache_ttl_ms,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> OrchestratorResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> OrchestratorResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<L>(&mut self, lookup: L) -> OrchestratorResult<()>
    where
        L: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_CACHE_TTL_MS) {
            self.cache_ttl_ms = parse_override(ENV_CACHE_TTL_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_HEALTH_INTERVAL_MS) {
            self.health_check_interval_ms = parse_override(ENV_HEALTH_INTERVAL_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_SCHEDULER_MAX_CONCURRENT) {
            self.scheduler.max_concurrent = parse_override(ENV_SCHEDULER_MAX_CONCURRENT, &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.providers.is_empty() {
            return Err(OrchestratorError::config("providers", "at least one provider is required"));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            provider.validate()?;
            if !seen.insert(provider.id.as_str()) {
                return Err(OrchestratorError::config(
                    format!("providers.{}", provider.id),
                    "duplicate provider id",
                ));
            }
        }

        if self.cache_ttl_ms == 0 {
            return Err(OrchestratorError::config("cache_ttl_ms", "must be non-zero"));
        }
        if self.health_check_interval_ms == 0 {
            return Err(OrchestratorError::config("health_check_interval_ms", "must be non-zero"));
        }
        if !(1..=100).contains(&self.fallback_quality) {
            return Err(OrchestratorError::config("fallback_quality", "must be within 1-100"));
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(OrchestratorError::config("ema_alpha", "must be within (0, 1]"));
        }
        self.scheduler.validate()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            fallback_quality: self.fallback_quality,
        }
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> OrchestratorResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| OrchestratorError::config(key, format!("invalid value '{value}'")))
}
