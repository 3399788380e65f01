use anyhow::{Context, Result};
use wmis_registry::config::AppConfig;
use wmis_registry::search::reindex;
use wmis_registry::{Application, ElasticsearchIndex, Instance, PostgresStore, WmisComponent};

/// Rebuild every search index from the database.
///
/// Writes from the API are mirrored best-effort, so an index can fall behind
/// the database after a cluster outage. Running this brings it back in line.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .filter_module("sqlx", log::LevelFilter::Warn)
        .filter_module("reqwest", log::LevelFilter::Warn)
        .init();

    let config = AppConfig::load()?;
    let database_url = config.database_url()?;
    let store = PostgresStore::new(&database_url, config.max_connections())
        .await
        .context("Failed to connect to database")?;
    let index = ElasticsearchIndex::new(&config.search_url(), config.search.index_prefix.clone())?;

    println!("Connected. Rebuilding search indices...");

    let applications = reindex::<Application, _, _>(&store, &index).await?;
    let instances = reindex::<Instance, _, _>(&store, &index).await?;
    let components = reindex::<WmisComponent, _, _>(&store, &index).await?;

    println!(
        "Reindex completed: {} applications, {} instances, {} components",
        applications, instances, components
    );

    Ok(())
}
