use std::sync::Arc;

use core_nlsql::{Catalog, Config, Generator, Ollama, PgQueryRunner, Pipeline, get_db_pool, setup_logging};

use api_nlsql::routes::{self, AppState};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    setup_logging("api_nlsql=debug,core_nlsql=debug,tower_http=debug");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1)
        }
    };

    let pool = match get_db_pool(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Cannot connect to database: {}", e);
            std::process::exit(1)
        }
    };

    let catalog: Arc<dyn Catalog> = Arc::new(pool.clone());
    let generator: Arc<dyn Generator> = Arc::new(Ollama::from_config(&config));
    tracing::info!("Generating with model '{}' at {}", config.model, config.generation_url);

    let pipeline = Pipeline::new(catalog, generator, config.catalog_timeout, config.generation_timeout);
    let runner = Arc::new(PgQueryRunner::new(pool, config.query_timeout));
    let app = routes::router().with_state(AppState::new(pipeline, runner));

    let listener = match tokio::net::TcpListener::bind(config.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", config.bind_address, e);
            std::process::exit(1)
        }
    };
    tracing::info!("Listening on {}", config.bind_address);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1)
    }
}
