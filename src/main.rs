//! stylelens - Visual Product Search Service
//!
//! Accepts a photo upload, localizes clothing/accessory regions through the
//! detection service, scores each region against the catalog facet
//! vocabulary through the scorer service, and queries the storefront catalog
//! with progressive facet relaxation to produce shoppable recommendations.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stylelens::config::AppConfig;
use stylelens::pipeline::SearchPipeline;
use stylelens::services::{
    load_class_vocabulary, CatalogClient, DetectionClient, ScorerClient, VocabularyStore,
};
use stylelens::AppState;

#[derive(Debug, Parser)]
#[command(name = "stylelens", version, about = "Visual product search service")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "STYLELENS_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting stylelens visual search service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.listen.port = port;
    }

    let classes = load_class_vocabulary(&config.paths.categories_file)?;
    info!(
        classes = classes.len(),
        file = %config.paths.categories_file.display(),
        "Detection class vocabulary loaded"
    );

    let detector = Arc::new(DetectionClient::new(
        config.endpoints.detection_url.clone(),
        classes,
    ));
    let scorer = Arc::new(ScorerClient::new(config.endpoints.scorer_url.clone()));
    let catalog = Arc::new(CatalogClient::new(
        config.endpoints.catalog_graphql_url.clone(),
    ));
    let vocabulary = VocabularyStore::new(
        config.paths.facets_dir.clone(),
        &config.excluded_facets,
    );

    let pipeline = Arc::new(SearchPipeline::new(
        detector,
        scorer,
        catalog,
        vocabulary,
        config.tuning,
    ));

    let addr = format!("{}:{}", config.listen.host, config.listen.port);
    let state = AppState::new(Arc::new(config), pipeline);
    let app = stylelens::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}");
    info!("Health check: http://{addr}/health");

    axum::serve(listener, app).await?;

    Ok(())
}
