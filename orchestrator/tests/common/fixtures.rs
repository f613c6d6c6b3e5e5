//! Test fixtures and data for orchestrator tests

use chrono::{TimeZone, Utc};
use shared::SemanticPayload;

use orchestrator::GenerationRequest;

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Standard content identifiers
    pub const CONTENT_1: &'static str = "post-1001";
    pub const CONTENT_2: &'static str = "post-1002";
    pub const CONTENT_3: &'static str = "post-1003";

    /// Standard provider identifiers
    pub const ALPHA: &'static str = "alpha";
    pub const BETA: &'static str = "beta";
    pub const GAMMA: &'static str = "gamma";
    pub const DELTA: &'static str = "delta";

    pub const IMAGE_URL: &'static str = "https://cdn.example.com/share/post-1001.png";

    /// Semantic payload of an ordinary news item
    pub fn payload() -> SemanticPayload {
        SemanticPayload {
            title: "City council approves new bike lanes".to_string(),
            summary: "Twelve kilometres of protected lanes will open next spring.".to_string(),
            category: "local".to_string(),
            source: "Metro Daily".to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).single(),
        }
    }

    /// Payload with nothing the fallback could render
    pub fn empty_payload() -> SemanticPayload {
        SemanticPayload {
            category: "local".to_string(),
            ..Default::default()
        }
    }

    pub fn request(content_id: &str) -> GenerationRequest {
        GenerationRequest::new(content_id, Self::payload())
    }

    /// Inbound content item JSON without the optional style and priority
    pub fn content_item_json() -> &'static str {
        r#"{
            "contentID": "post-1001",
            "title": "City council approves new bike lanes",
            "summary": "Twelve kilometres of protected lanes will open next spring.",
            "category": "local",
            "source": "Metro Daily",
            "publishedAt": "2024-05-01T08:30:00Z"
        }"#
    }
}
