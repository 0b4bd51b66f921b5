//! GraphRAG API Gateway
//!
//! The HTTP entry point for conversational question answering.
//! Handles:
//! - Session lifecycle and document store selection
//! - Streaming chat over server-sent events
//! - Rate limiting
//! - Observability (logging, metrics)

mod handlers;
mod middleware;
mod state;

use anyhow::Context;
use axum::{
    extract::Request,
    middleware::{from_fn, Next},
    routing::{delete, get, post, put},
    Router,
};
use graphrag_common::{config::AppConfig, embeddings::create_embedder, metrics};
use graphrag_context::{create_language_model, PipelineSettings, RagAgent};
use graphrag_search::{create_reranker, FlowiseClient, Neo4jGraphSearch, VectorStore};
use metrics_exporter_prometheus::PrometheusBuilder;
use state::{AppState, SessionRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How often idle sessions are swept
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config);

    info!("Starting GraphRAG API Gateway v{}", graphrag_common::VERSION);

    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        metrics::register_metrics();
        info!(%addr, "Metrics exporter listening");
    }

    let config = Arc::new(config);
    let state = build_state(config.clone())?;
    spawn_session_sweeper(state.sessions.clone());

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host/server.port")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wire the external collaborators into the query pipeline
fn build_state(config: Arc<AppConfig>) -> anyhow::Result<AppState> {
    let embedder = create_embedder(&config.embedding)?;
    info!(model = embedder.model_name(), "Embedding provider configured");

    let graph = Arc::new(Neo4jGraphSearch::new(&config.graph, embedder)?);
    let flowise = Arc::new(FlowiseClient::new(&config.vector_store)?);
    if !flowise.has_chatflow() && config.pipeline.chatflow_fallback {
        warn!("No chatflow configured, queries without a document store will use graph evidence only");
    }

    let reranker = create_reranker(&config.reranker)?;
    let llm = create_language_model(&config.llm)?;

    let agent = RagAgent::new(
        graph,
        flowise.clone(),
        reranker,
        llm,
        PipelineSettings::from_config(&config),
    );

    let ttl = chrono::Duration::minutes(config.server.session_ttl_minutes);

    Ok(AppState {
        config,
        agent: Arc::new(agent),
        catalog: flowise,
        sessions: Arc::new(SessionRegistry::new(ttl)),
    })
}

fn spawn_session_sweeper(sessions: Arc<SessionRegistry>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sessions.expire_idle(chrono::Utc::now()).await;
        }
    });
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api_routes = Router::new()
        // Store catalog
        .route("/stores", get(handlers::stores::list_stores))

        // Session endpoints
        .route("/sessions", post(handlers::sessions::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::sessions::get_session).delete(handlers::sessions::delete_session),
        )
        .route("/sessions/{id}/history", delete(handlers::sessions::clear_history))
        .route("/sessions/{id}/stores", put(handlers::sessions::select_stores))

        // Streaming chat
        .route("/sessions/{id}/chat", post(handlers::chat::chat));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(&state.config.rate_limit);
        let limit = state.config.rate_limit.requests_per_second;
        api_routes = api_routes.layer(from_fn(move |request: Request, next: Next| {
            middleware::rate_limit::rate_limit_middleware(request, next, limiter.clone(), limit)
        }));
    }

    // Health endpoints are never rate limited
    let api_routes = api_routes
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready));

    // Compose the app
    Router::new()
        .nest("/v1", api_routes)
        .layer(from_fn(middleware::metrics::track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
