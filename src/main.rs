use curtail::{
    config::{AppConfig, StoreBackend},
    keepalive,
    store::{file::FileStore, sqlite::SqliteStore, LinkStore},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (ignore error if file is absent — env vars may already be set)
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "curtail=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env()?;
    tracing::info!("Starting curtail on {}:{}", config.host, config.port);
    tracing::info!("Base URL: {}", config.base_url);

    // Open the selected backend. A database that won't open or migrate is
    // fatal: the process must not serve traffic without a working store.
    let store: Arc<dyn LinkStore> = match config.backend {
        StoreBackend::Sqlite => {
            let store = SqliteStore::connect(&config.database_url).await?;
            tracing::info!("sqlite store ready at {}", config.database_url);
            Arc::new(store)
        }
        StoreBackend::File => {
            let store = FileStore::open(&config.store_file).await?;
            tracing::info!("file store ready at {}", config.store_file);
            Arc::new(store)
        }
    };

    if let Some(url) = config.keepalive_url.clone() {
        tracing::info!("keep-alive ping enabled for {url}");
        keepalive::spawn(url, config.keepalive_interval_secs);
    }

    let bind_addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState { store, config });
    let app = curtail::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
