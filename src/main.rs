use lending_indexer::datasource::{AlloyContractReader, ContractReader};
use lending_indexer::{config::Config, db::init_db, EventRouter, FeedRunner, Repository};
use std::sync::Arc;
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let reader: Arc<dyn ContractReader> =
        Arc::new(AlloyContractReader::connect(&config.rpc_url, config.rpc_timeout)?);
    let router = EventRouter::new(repo, reader, config.default_reserve_factor);
    let runner = FeedRunner::new(router, config.max_in_flight);

    tracing::info!(
        "Indexing events from stdin (rpc timeout {:?}, max in flight {})",
        config.rpc_timeout,
        config.max_in_flight
    );

    let stats = runner.run_lines(BufReader::new(tokio::io::stdin())).await?;
    tracing::info!(
        "Feed finished: {} events, {} snapshots written, {} skipped",
        stats.events,
        stats.snapshots_written,
        stats.snapshots_skipped
    );
    Ok(())
}
