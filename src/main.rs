// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use quiz_engine::config::Config;
use quiz_engine::engine::deadline::spawn_expiry_sweeper;
use quiz_engine::state::AppState;
use quiz_engine::utils::seed::seed_quizzes;
use quiz_engine::{db, routes};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (and .env, if present)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "quiz-engine.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Connect with retry and run migrations
    let pool = db::connect(&config.database_url).await?;

    let state = AppState::new(pool, config.clone());

    // Seed quizzes
    if let Some(path) = &config.quiz_seed_path {
        let count = seed_quizzes(state.engine.question_bank().as_ref(), path).await?;
        tracing::info!("Loaded {} quizzes from {}", count, path.display());
    }

    if config.expiry_sweep_seconds > 0 {
        spawn_expiry_sweeper(
            Arc::clone(&state.deadlines),
            Duration::from_secs(config.expiry_sweep_seconds),
        );
    }

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    // Start the server
    axum::serve(listener, app).await?;
    Ok(())
}
