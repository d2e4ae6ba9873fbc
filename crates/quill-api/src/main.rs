use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quill_api::{auth::JwtIdentityProvider, build_router, config::Config, state::AppState};
use quill_llm::ClientFactory;
use quill_persist::MongoPersistenceClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("Starting quill API server");
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        dev_mode = config.server.dev_mode,
        "Config loaded"
    );

    tracing::info!(provider = ?config.llm.provider, model = %config.llm.model, "Initializing completion client");
    let completion = ClientFactory::create_client(config.llm.provider_config(&config.llm_api_key))?;

    tracing::info!("Connecting to MongoDB");
    let mongo = Arc::new(
        MongoPersistenceClient::connect(&config.mongodb_uri, &config.mongodb.database).await?,
    );
    tracing::info!(database = %config.mongodb.database, "MongoDB connected");

    let identity = Arc::new(JwtIdentityProvider::new(&config.jwt_secret));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(
        config,
        mongo.clone(),
        mongo,
        identity,
        completion,
    )?);

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("API docs: http://{}/api/docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
