//! Main entry point for the orchestrator binary
//!
//! Loads configuration, registers the configured HTTP providers and
//! generates one share image for the content item given on the command line.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use orchestrator::services::{HealthMonitor, HttpImageProvider, LocalFallbackGenerator};
use orchestrator::{
    GenerationRequest, ImageProvider, Orchestrator, OrchestratorConfig, OrchestratorResult, Payload, ProviderRegistry,
    ResultCache, SelectionPolicy,
};
use shared::{component_debug, component_info, logging, ImageStyle, Priority, SemanticPayload};

const COMPONENT: &str = "main";

/// Generate a share image through the configured providers
#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Races image providers to produce a share image for one content item")]
pub struct Args {
    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Stable identifier of the content item
    #[arg(long)]
    pub content_id: String,

    #[arg(long)]
    pub title: String,

    #[arg(long, default_value = "")]
    pub summary: String,

    #[arg(long, default_value = "")]
    pub category: String,

    #[arg(long, default_value = "")]
    pub source: String,

    /// default, minimal, vibrant, dark or classic
    #[arg(long, default_value = "default")]
    pub style: ImageStyle,

    /// low, normal, high or urgent
    #[arg(long, default_value = "normal")]
    pub priority: Priority,
}

#[tokio::main]
async fn main() -> OrchestratorResult<()> {
    let args = Args::parse();
    logging::init_tracing(Some(&args.log_level));
    logging::log_startup(COMPONENT, "share-image orchestrator");

    let config = OrchestratorConfig::load(args.config.as_deref())?;

    let mut registry = ProviderRegistry::new().with_ema_alpha(config.ema_alpha);
    for provider_config in &config.providers {
        let provider: Arc<dyn ImageProvider> = Arc::new(HttpImageProvider::from_config(provider_config)?);
        registry.register(provider, provider_config.settings())?;
        component_debug!(COMPONENT, provider = %provider_config.id, endpoint = %provider_config.endpoint, "Provider registered");
    }
    let registry = Arc::new(registry);
    let cache = Arc::new(ResultCache::new(config.cache_ttl()));

    let orchestrator = Orchestrator::new(
        registry.clone(),
        SelectionPolicy::new(config.scoring.clone()),
        cache.clone(),
        LocalFallbackGenerator::new(),
        config.orchestrator_settings(),
    )?;

    let cancel = CancellationToken::new();
    let monitor = HealthMonitor::new(registry, cache, config.health_check_interval());
    let health = tokio::spawn({
        let cancel = cancel.clone();
        async move { monitor.run(cancel).await }
    });

    let request = GenerationRequest::new(
        args.content_id.as_str(),
        SemanticPayload {
            title: args.title.clone(),
            summary: args.summary.clone(),
            category: args.category.clone(),
            source: args.source.clone(),
            published_at: None,
        },
    )
    .with_style(args.style)
    .with_priority(args.priority);

    let outcome = orchestrator.generate(request).await;

    cancel.cancel();
    let _ = health.await;
    orchestrator.shutdown().await;
    logging::log_shutdown(COMPONENT, "generation finished");

    match outcome {
        Ok(result) => {
            let payload = match &result.payload {
                Some(Payload::Url { url }) => url.clone(),
                Some(Payload::Bytes { content_type, data }) => format!("{} bytes of {}", data.len(), content_type),
                None => "no payload".to_string(),
            };
            component_info!(
                COMPONENT,
                provider = %result.provider_id,
                quality = result.quality_score,
                response_time_ms = result.response_time_ms,
                from_fallback = result.from_fallback,
                "Share image ready: {}",
                payload
            );
            println!("{}", orchestrator.status().to_json()?);
            logging::log_success(COMPONENT, "Share image generated");
            Ok(())
        }
        Err(e) => {
            logging::log_error(COMPONENT, "share image generation", &e);
            println!("{}", orchestrator.status().to_json()?);
            Err(e)
        }
    }
}
