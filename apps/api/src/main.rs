mod answer_client;
mod config;
mod errors;
mod interview;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::answer_client::McpAnswerClient;
use crate::config::Config;
use crate::interview::evaluator::RandomEvaluator;
use crate::interview::questions::StaticQuestions;
use crate::interview::registry::SessionRegistry;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the digital twin client
    let provider = McpAnswerClient::new(
        config.answer_provider_url.clone(),
        config.answer_provider_tool.clone(),
        config.answer_provider_timeout,
    )?;
    match config.answer_provider_timeout {
        Some(timeout) => info!(
            "Answer provider: {} (tool: {}, timeout: {}s)",
            provider.endpoint(),
            config.answer_provider_tool,
            timeout.as_secs()
        ),
        None => info!(
            "Answer provider: {} (tool: {}, no timeout)",
            provider.endpoint(),
            config.answer_provider_tool
        ),
    }

    // Initialize evaluator (seeded when EVALUATOR_SEED is set, for reproducible runs)
    let evaluator = match config.evaluator_seed {
        Some(seed) => {
            info!("Evaluator seeded with {seed}");
            RandomEvaluator::seeded(seed)
        }
        None => RandomEvaluator::from_entropy(),
    };

    let pacing = config.pacing();
    info!(
        "Pacing: think={}ms settle={}ms evaluation={}ms",
        pacing.think.as_millis(),
        pacing.settle.as_millis(),
        pacing.evaluation.as_millis()
    );

    // Build app state
    let state = AppState {
        sessions: SessionRegistry::new(Arc::new(provider), Arc::new(evaluator), pacing),
        questions: Arc::new(StaticQuestions::default()),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to the interview front-end origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
