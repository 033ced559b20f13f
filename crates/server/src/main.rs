use std::sync::Arc;

use anyhow::Context;
use finsight_extract::ChatCompletionGenerator;
use finsight_server::config::Settings;
use finsight_server::{build_pipeline, open_database, router, telemetry, AppState};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    telemetry::init_tracing(settings.server.log_format)
        .context("Failed to initialise logging")?;

    let db = open_database(&settings.database)
        .await
        .with_context(|| format!("Failed to open database {}", settings.database.path.display()))?;

    if settings.llm.api_key.is_none() {
        warn!("no LLM API key configured; generation requests will likely be rejected");
    }
    let generator = ChatCompletionGenerator::new(settings.llm.clone())
        .context("Failed to create generation backend")?;

    let pipeline = build_pipeline(&settings, db.clone(), Arc::new(generator));
    let app = router(AppState {
        pipeline: Arc::new(pipeline),
        db,
    });

    let listener = tokio::net::TcpListener::bind(&settings.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", settings.server.bind))?;
    info!(
        bind = %settings.server.bind,
        mode = ?settings.categories.mode,
        model = %settings.llm.model,
        "finsight server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}
