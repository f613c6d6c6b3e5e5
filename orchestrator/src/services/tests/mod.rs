//! Service-specific tests
//!
//! Each service has its own test file with dedicated fixtures and helpers.

mod scheduler;

// Common test utilities for services
pub mod common {
    use shared::SemanticPayload;

    use crate::types::GenerationRequest;

    /// Request with a title, summary and category filled in
    pub fn test_request(content_id: &str) -> GenerationRequest {
        GenerationRequest::new(
            content_id,
            SemanticPayload {
                title: format!("Story {content_id}"),
                summary: "Something happened".to_string(),
                category: "tech".to_string(),
                source: "Daily Wire Service".to_string(),
                published_at: None,
            },
        )
    }
}
