//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::SharedError;

/// Stable identifier of the underlying content item
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ContentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier for a backend image provider
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Identifier reported for results produced by the local fallback path
    pub const FALLBACK: &'static str = "local-fallback";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn fallback() -> Self {
        Self(Self::FALLBACK.to_string())
    }

    pub fn is_fallback(&self) -> bool {
        self.0 == Self::FALLBACK
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Visual style of a share image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Default,
    Minimal,
    Vibrant,
    Dark,
    Classic,
}

impl ImageStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStyle::Default => "default",
            ImageStyle::Minimal => "minimal",
            ImageStyle::Vibrant => "vibrant",
            ImageStyle::Dark => "dark",
            ImageStyle::Classic => "classic",
        }
    }
}

impl fmt::Display for ImageStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageStyle {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(ImageStyle::Default),
            "minimal" => Ok(ImageStyle::Minimal),
            "vibrant" => Ok(ImageStyle::Vibrant),
            "dark" => Ok(ImageStyle::Dark),
            "classic" => Ok(ImageStyle::Classic),
            _ => Err(SharedError::InvalidValue {
                field: "style".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Request priority, which decides how many providers are raced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// Number of providers raced for a request of this priority
    pub fn race_width(&self) -> usize {
        match self {
            Priority::Low | Priority::Normal => 1,
            Priority::High => 2,
            Priority::Urgent => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(SharedError::InvalidValue {
                field: "priority".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Output dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1350,
        }
    }
}

/// Failure reasons for a single provider call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderFailure {
    /// Authentication failed (invalid API key)
    AuthenticationFailed,
    /// Rate limit exceeded
    RateLimitExceeded,
    /// Response could not be interpreted as an image
    InvalidResponse(String),
    /// Network/connection error
    NetworkError(String),
    /// Server error from provider
    ServerError(String),
    /// Service temporarily unavailable
    ServiceUnavailable,
    /// The call exceeded the adapter's own deadline
    Timeout { after_ms: u64 },
    /// Provider already serving `max_concurrent` calls
    AtCapacity,
}

impl ProviderFailure {
    /// Whether this failure reflects on the provider's health
    pub fn counts_against_provider(&self) -> bool {
        !matches!(self, ProviderFailure::AtCapacity)
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderFailure::AuthenticationFailed => write!(f, "authentication failed"),
            ProviderFailure::RateLimitExceeded => write!(f, "rate limit exceeded"),
            ProviderFailure::InvalidResponse(msg) => write!(f, "invalid response: {msg}"),
            ProviderFailure::NetworkError(msg) => write!(f, "network error: {msg}"),
            ProviderFailure::ServerError(msg) => write!(f, "server error: {msg}"),
            ProviderFailure::ServiceUnavailable => write!(f, "service unavailable"),
            ProviderFailure::Timeout { after_ms } => write!(f, "timed out after {after_ms}ms"),
            ProviderFailure::AtCapacity => write!(f, "provider at capacity"),
        }
    }
}
