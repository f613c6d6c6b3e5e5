//! Messages exchanged with collaborators of the generation orchestrator
//!
//! Inbound: [`ContentItem`] from the Content Source and [`VisibilitySignal`]
//! from the on-screen visibility tracker. Outbound: [`StatusSnapshot`] for
//! observability polling. The wire format is camelCase JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{SharedError, SharedResult};
use crate::types::{ContentId, ImageStyle, Priority, ProviderId};

/// Semantic input for a share image. Opaque to the orchestrator beyond hashing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticPayload {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// Content Source → Orchestrator request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    #[serde(rename = "contentID", alias = "contentId")]
    pub content_id: ContentId,
    #[serde(flatten)]
    pub payload: SemanticPayload,
    #[serde(default)]
    pub style: Option<ImageStyle>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl ContentItem {
    pub fn new(content_id: impl Into<ContentId>, payload: SemanticPayload) -> Self {
        Self {
            content_id: content_id.into(),
            payload,
            style: None,
            priority: None,
        }
    }

    pub fn from_json(json: &str) -> SharedResult<Self> {
        serde_json::from_str(json).map_err(|e| SharedError::DeserializationError {
            message: e.to_string(),
        })
    }

    /// Style with the documented default applied
    pub fn style_or_default(&self) -> ImageStyle {
        self.style.unwrap_or_default()
    }

    /// Priority with the documented default applied
    pub fn priority_or_default(&self) -> Priority {
        self.priority.unwrap_or_default()
    }
}

/// Visibility Signal → Pre-generation Scheduler trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilitySignal {
    #[serde(rename = "contentID", alias = "contentId")]
    pub content_id: ContentId,
    #[serde(flatten)]
    pub payload: SemanticPayload,
}

/// Per-provider entry of the status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatusEntry {
    pub id: ProviderId,
    pub name: String,
    pub is_active: bool,
    pub current_load: u32,
    pub success_rate: f64,
    pub avg_response_time_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub size: usize,
    pub in_flight: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStatus {
    pub total_requests: u64,
    pub average_time_ms: f64,
    pub success_rate: f64,
    pub cache_hits: u64,
    pub fallbacks: u64,
}

/// Orchestrator → Observability snapshot, produced on demand
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub providers: Vec<ProviderStatusEntry>,
    pub cache: CacheStatus,
    pub performance: PerformanceStatus,
}

impl StatusSnapshot {
    pub fn to_json(&self) -> SharedResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SharedError::SerializationError {
            message: e.to_string(),
        })
    }
}
