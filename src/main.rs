use hybrid_rec_api::{
    api::{create_router, AppState},
    config::Config,
    data::{Artifacts, Catalog},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hybrid_rec_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Artifacts and catalog are loaded once and shared read-only
    let artifacts = Artifacts::load(&config.artifacts_dir)?;
    let catalog = Catalog::load(
        &config.movies_csv,
        config.images_csv.as_deref(),
        &config.ratings_csv,
        &artifacts.mapping,
    )?;

    let addr = config.bind_addr();
    let state = AppState::new(config, artifacts, catalog)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
