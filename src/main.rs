//! Completion proxy server

use chat_relay::api::{create_router, AppState};
use chat_relay::llm::{CompletionProvider, LlmConfig, LoggingProvider, OpenAiCompatProvider};
use chat_relay::proxy::CompletionProxy;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_relay=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let port: u16 = std::env::var("CHAT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let llm_config = LlmConfig::from_env();
    let provider: Arc<dyn CompletionProvider> =
        Arc::new(LoggingProvider::new(Arc::new(OpenAiCompatProvider::new(&llm_config)?)));

    if llm_config.has_credential() {
        tracing::info!(
            model = %llm_config.model,
            base_url = %llm_config.base_url,
            chunk_timeout_secs = ?llm_config.chunk_timeout.map(|t| t.as_secs()),
            "Completion provider configured"
        );
    } else {
        tracing::warn!("No provider credential configured. Set OPENROUTER_API_KEY.");
    }

    let proxy = CompletionProxy::new(provider, llm_config.params.clone(), llm_config.chunk_timeout);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // SSE responses are excluded by the default compression predicate
    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(AppState::new(proxy))
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Chat relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
