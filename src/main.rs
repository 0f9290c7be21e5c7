use object_store::aws::AmazonS3Builder;
use object_store::ObjectStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use userdata_aggregator::aggregator::UserDataAggregator;
use userdata_aggregator::config::{Config, StorageConfig};
use userdata_aggregator::{http_server, logging, AggregatorError, Result};

/// Builds the object-store client for the configured bucket. Credentials
/// come from the usual AWS environment variables.
fn build_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    let mut builder = AmazonS3Builder::from_env()
        .with_region(config.region.clone())
        .with_bucket_name(config.bucket.clone())
        .with_allow_http(config.allow_http);

    if let Some(endpoint) = &config.endpoint {
        builder = builder.with_endpoint(endpoint.clone());
    }

    let store = builder
        .build()
        .map_err(|e| AggregatorError::StorageError(format!("Failed to build S3 client: {}", e)))?;
    Ok(Arc::new(store))
}

async fn run() -> Result<()> {
    let config = Config::from_args()?;
    logging::init(&config.logging.level);

    info!(
        "Starting userdata-aggregator {} (built {})",
        env!("BUILD_VERSION"),
        env!("BUILD_TIMESTAMP")
    );
    info!(
        "Source bucket {:?}, prefix {:?}, output key {:?}",
        config.storage.bucket, config.aggregator.source_prefix, config.aggregator.output_key
    );

    let store = build_store(&config.storage)?;
    let aggregator = Arc::new(UserDataAggregator::new(store, config.aggregator.clone()));

    let addr: SocketAddr = format!("{}:{}", config.server.bind_address, config.server.port)
        .parse()
        .map_err(|e| {
            AggregatorError::ConfigError(format!(
                "Invalid bind address {}:{}: {}",
                config.server.bind_address, config.server.port, e
            ))
        })?;

    tokio::select! {
        result = http_server::serve(addr, aggregator) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // The failure may predate logging setup, so stderr directly.
        eprintln!("Fatal: {}", e);
        std::process::exit(1);
    }
}
