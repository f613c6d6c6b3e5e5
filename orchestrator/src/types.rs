//! Orchestrator data types: requests, fingerprints, results and provider snapshots

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use shared::{ContentId, ContentItem, ImageSize, ImageStyle, Priority, ProviderFailure, ProviderId, SemanticPayload};

/// Immutable generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub content_id: ContentId,
    pub payload: SemanticPayload,
    pub style: ImageStyle,
    pub priority: Priority,
    pub size: ImageSize,
}

impl GenerationRequest {
    pub fn new(content_id: impl Into<ContentId>, payload: SemanticPayload) -> Self {
        Self {
            content_id: content_id.into(),
            payload,
            style: ImageStyle::default(),
            priority: Priority::default(),
            size: ImageSize::default(),
        }
    }

    pub fn with_style(mut self, style: ImageStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_size(mut self, size: ImageSize) -> Self {
        self.size = size;
        self
    }

    /// Cache and dedup key for this request
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(&self.content_id, self.style, self.size)
    }
}

impl From<ContentItem> for GenerationRequest {
    fn from(item: ContentItem) -> Self {
        let style = item.style_or_default();
        let priority = item.priority_or_default();
        Self {
            content_id: item.content_id,
            payload: item.payload,
            style,
            priority,
            size: ImageSize::default(),
        }
    }
}

/// Deterministic SHA-256 digest of everything that affects the output image.
///
/// Priority and the semantic payload are deliberately excluded: a request
/// for the same content in the same style is the same image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(content_id: &ContentId, style: ImageStyle, size: ImageSize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content_id.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(style.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(format!("{}x{}", size.width, size.height).as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque image payload handed to the Renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Payload {
    Bytes { content_type: String, data: Vec<u8> },
    Url { url: String },
}

impl Payload {
    pub fn bytes(content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Payload::Bytes {
            content_type: content_type.into(),
            data,
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Payload::Url { url: url.into() }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Bytes { data, .. } => data.len(),
            Payload::Url { url } => url.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one generation, from a provider or from the fallback path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    pub payload: Option<Payload>,
    pub provider_id: ProviderId,
    pub response_time_ms: u64,
    /// 0-100
    pub quality_score: u8,
    pub error: Option<ProviderFailure>,
    pub from_fallback: bool,
}

impl GenerationResult {
    pub fn success(provider_id: ProviderId, payload: Payload, response_time: Duration, quality_score: u8) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            provider_id,
            response_time_ms: response_time.as_millis() as u64,
            quality_score: quality_score.min(100),
            error: None,
            from_fallback: false,
        }
    }

    pub fn failure(provider_id: ProviderId, error: ProviderFailure, response_time: Duration) -> Self {
        Self {
            success: false,
            payload: None,
            provider_id,
            response_time_ms: response_time.as_millis() as u64,
            quality_score: 0,
            error: Some(error),
            from_fallback: false,
        }
    }

    pub fn fallback(payload: Payload, response_time: Duration, quality_score: u8) -> Self {
        Self {
            from_fallback: true,
            ..Self::success(ProviderId::fallback(), payload, response_time, quality_score.max(1))
        }
    }
}

/// Provider-facing prompt derived from a request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptPayload {
    pub prompt: String,
    pub content_id: ContentId,
    pub title: String,
    pub summary: String,
    pub category: String,
    pub source: String,
    pub style: ImageStyle,
    pub width: u32,
    pub height: u32,
}

impl From<&GenerationRequest> for PromptPayload {
    fn from(request: &GenerationRequest) -> Self {
        let payload = &request.payload;
        let mut prompt = format!("Share card in {} style for \"{}\"", request.style, payload.title);
        if !payload.category.is_empty() {
            prompt.push_str(&format!(" ({})", payload.category));
        }
        if !payload.summary.is_empty() {
            prompt.push_str(&format!(": {}", payload.summary));
        }

        Self {
            prompt,
            content_id: request.content_id.clone(),
            title: payload.title.clone(),
            summary: payload.summary.clone(),
            category: payload.category.clone(),
            source: payload.source.clone(),
            style: request.style,
            width: request.size.width,
            height: request.size.height,
        }
    }
}

/// Point-in-time copy of a provider's registry entry
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub name: String,
    /// Static tie-break, lower is preferred
    pub priority: u32,
    pub max_concurrent: u32,
    pub timeout: Duration,
    pub is_active: bool,
    pub current_load: u32,
    pub success_rate: f64,
    pub avg_response_time_ms: f64,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub last_error: Option<String>,
}

impl ProviderDescriptor {
    pub fn has_capacity(&self) -> bool {
        self.current_load < self.max_concurrent
    }
}
