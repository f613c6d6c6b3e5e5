//! HTTP image provider
//!
//! POSTs the prompt as JSON to the configured endpoint and reads the image
//! back in one of the configured response shapes.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde_json::Value;
use shared::{ProviderFailure, ProviderId};
use url::Url;

use crate::config::{ProviderConfig, ResponseFormat};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{ImageProvider, ProviderOutput};
use crate::types::{Payload, PromptPayload};

pub struct HttpImageProvider {
    id: ProviderId,
    client: Client,
    endpoint: Url,
    health_endpoint: Option<Url>,
    api_key: Option<String>,
    response: ResponseFormat,
    quality_pointer: Option<String>,
    base_quality: Option<u8>,
}

impl HttpImageProvider {
    pub fn new(id: impl Into<ProviderId>, endpoint: Url) -> Self {
        Self {
            id: id.into(),
            client: Client::new(),
            endpoint,
            health_endpoint: None,
            api_key: None,
            response: ResponseFormat::Binary,
            quality_pointer: None,
            base_quality: None,
        }
    }

    /// Build from configuration, reading the API key from the environment
    pub fn from_config(config: &ProviderConfig) -> OrchestratorResult<Self> {
        let field = |name: &str| format!("providers.{}.{}", config.id, name);

        let endpoint =
            Url::parse(&config.endpoint).map_err(|e| OrchestratorError::config(field("endpoint"), e.to_string()))?;
        let health_endpoint = config
            .health_endpoint
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| OrchestratorError::config(field("health_endpoint"), e.to_string()))?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| OrchestratorError::config(field("client"), e.to_string()))?;

        Ok(Self {
            id: ProviderId::new(config.id.clone()),
            client,
            endpoint,
            health_endpoint,
            api_key: config.api_key()?,
            response: config.response.clone(),
            quality_pointer: config.quality_pointer.clone(),
            base_quality: config.base_quality,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_health_endpoint(mut self, url: Url) -> Self {
        self.health_endpoint = Some(url);
        self
    }

    pub fn with_response_format(mut self, response: ResponseFormat) -> Self {
        self.response = response;
        self
    }

    pub fn with_quality(mut self, pointer: Option<String>, base_quality: Option<u8>) -> Self {
        self.quality_pointer = pointer;
        self.base_quality = base_quality;
        self
    }

    fn check_status(response: &Response) -> Result<(), ProviderFailure> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(match status.as_u16() {
            401 => ProviderFailure::AuthenticationFailed,
            429 => ProviderFailure::RateLimitExceeded,
            503 => ProviderFailure::ServiceUnavailable,
            _ => ProviderFailure::ServerError(status.to_string()),
        })
    }

    async fn read_json(response: Response) -> Result<Value, ProviderFailure> {
        response
            .json()
            .await
            .map_err(|e| ProviderFailure::InvalidResponse(format!("Failed to parse response: {e}")))
    }

    fn quality_from(&self, body: Option<&Value>) -> Option<u8> {
        let reported = match (&self.quality_pointer, body) {
            (Some(pointer), Some(body)) => body.pointer(pointer).and_then(|v| v.as_f64()),
            _ => None,
        };
        reported
            .map(|q| q.clamp(0.0, 100.0).round() as u8)
            .or(self.base_quality)
    }
}

fn string_at<'a>(body: &'a Value, pointer: &str) -> Result<&'a str, ProviderFailure> {
    body.pointer(pointer)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderFailure::InvalidResponse(format!("No string at {pointer}")))
}

#[async_trait]
impl ImageProvider for HttpImageProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn generate(&self, prompt: &PromptPayload) -> Result<ProviderOutput, ProviderFailure> {
        let mut request = self.client.post(self.endpoint.clone()).json(prompt);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderFailure::NetworkError(e.to_string()))?;
        Self::check_status(&response)?;

        match &self.response {
            ResponseFormat::Binary => {
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ProviderFailure::NetworkError(e.to_string()))?;
                if bytes.is_empty() {
                    return Err(ProviderFailure::InvalidResponse("Empty image body".to_string()));
                }
                Ok(ProviderOutput {
                    payload: Payload::bytes(content_type, bytes.to_vec()),
                    quality_score: self.quality_from(None),
                })
            }
            ResponseFormat::JsonUrl { pointer } => {
                let body = Self::read_json(response).await?;
                let url = string_at(&body, pointer)?;
                Ok(ProviderOutput {
                    payload: Payload::url(url),
                    quality_score: self.quality_from(Some(&body)),
                })
            }
            ResponseFormat::JsonBase64 { pointer, content_type } => {
                let body = Self::read_json(response).await?;
                let data = STANDARD
                    .decode(string_at(&body, pointer)?)
                    .map_err(|e| ProviderFailure::InvalidResponse(format!("Invalid base64 image: {e}")))?;
                Ok(ProviderOutput {
                    payload: Payload::bytes(content_type.clone(), data),
                    quality_score: self.quality_from(Some(&body)),
                })
            }
        }
    }

    /// GET the health endpoint. Without one the provider is assumed live and
    /// only call outcomes affect its standing.
    async fn health_check(&self) -> bool {
        let Some(url) = self.health_endpoint.clone() else {
            return true;
        };
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        matches!(request.send().await, Ok(response) if response.status().is_success())
    }
}
