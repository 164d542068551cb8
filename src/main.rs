use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use app_forge_server::{
    config::{Config, StoreBackend},
    create_app,
    database::{Database, MemoryStore, ProjectStore, UserStore},
    handlers::AppState,
    services::GeminiClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("app_forge_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let (users, projects): (Arc<dyn UserStore>, Arc<dyn ProjectStore>) = match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory store");
            let store = Arc::new(MemoryStore::new());
            let users: Arc<dyn UserStore> = store.clone();
            let projects: Arc<dyn ProjectStore> = store;
            (users, projects)
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres store")?;
            let database = Database::connect(url).await?;
            database.migrate().await?;
            tracing::info!("connected to postgres store");
            let database = Arc::new(database);
            let users: Arc<dyn UserStore> = database.clone();
            let projects: Arc<dyn ProjectStore> = database;
            (users, projects)
        }
    };

    let model_client = Arc::new(GeminiClient::new(&config)?);
    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, users, projects, model_client)?
        .with_metrics_handle(metrics_handle);
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
