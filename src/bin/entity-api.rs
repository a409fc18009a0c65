//! Server: loads the service map, picks Postgres or in-memory storage and serves the API.

use entity_api::{
    api_router, ensure_tables, load_from_path, resolve, ApiRepository, AppState, MemoryRepository,
    PgRepository, Settings,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("entity_api=info")),
        )
        .init();

    let config = load_from_path(&settings.config_path).await?;
    let model = resolve(&config, settings.environment)?;
    tracing::info!(
        services = ?model.service_names(),
        environment = ?settings.environment,
        "configuration loaded"
    );

    let repo: Arc<dyn ApiRepository> = match &settings.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await?;
            if settings.create_schema {
                ensure_tables(&pool, &model).await?;
            }
            Arc::new(PgRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, entities are kept in memory");
            Arc::new(MemoryRepository::new())
        }
    };

    let state = AppState::new(repo, model);
    let app = api_router(state, settings.body_limit);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
