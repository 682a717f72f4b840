use std::{path::PathBuf, sync::Arc};

use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use moodflix::{
    api::{create_router, AppState},
    config::Config,
    services::{Catalog, Embedder, FastEmbedder},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Model loading may download weights, keep it off the async workers
    let model_config = config.clone();
    let embedder = tokio::task::spawn_blocking(move || {
        FastEmbedder::new(
            &model_config.model_name,
            model_config.max_seq_length,
            model_config.model_cache_dir.map(PathBuf::from),
        )
    })
    .await??;

    let catalog = Catalog::load(
        &config.catalog_csv,
        &config.embeddings_path,
        config.embeddings_key.as_deref(),
    )
    .await?;
    catalog.ensure_dimension(embedder.dimension())?;

    tracing::info!(
        movies = catalog.movie_count(),
        dimension = catalog.dimension(),
        model = embedder.model_name(),
        "Catalog ready"
    );

    let state = AppState::new(Arc::new(embedder), Arc::new(catalog))
        .with_strip_non_alpha(config.strip_non_alpha);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %config.bind_addr(), "Server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
