use axum::serve;
use tokio::net::TcpListener;
use wmis_registry::config::AppConfig;
use wmis_registry::{build_app, Alerts, ElasticsearchIndex, PostgresStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with explicit filter to suppress sqlx and http client debug logs
    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .filter_module("reqwest", LevelFilter::Warn)
        .parse_default_env()
        .init();

    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: server={}:{}, application={}",
        config.server.host,
        config.server.port,
        config.application.name
    );

    log::info!("Connecting to PostgreSQL...");
    let database_url = config.database_url()?;
    let postgres_store = PostgresStore::new(&database_url, config.max_connections()).await?;

    log::info!("Running database migrations...");
    postgres_store.migrate().await?;

    let search_url = config.search_url();
    log::info!("Mirroring writes into search cluster at {}", search_url);
    let index = ElasticsearchIndex::new(&search_url, config.search.index_prefix.clone())?;

    let alerts = Alerts::new(&config.application.name)?;

    run_server(build_app(postgres_store, index, alerts), &config).await?;

    Ok(())
}

async fn run_server(app: axum::Router, config: &AppConfig) -> anyhow::Result<()> {
    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("WMIS registry running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
