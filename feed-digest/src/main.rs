use clap::Parser;
use feed_digest::{
    build_oracle, Args, Fetcher, FingerprintStore, NotificationSink, Oracle, PipelineBuilder, RunOutcome, WebhookSink,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("feed_digest={},info", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("Starting daily digest job");

    let config = args.to_pipeline_config();
    info!("Configured feed sources: {}", config.sources.len());

    let oracle: Arc<dyn Oracle> = match build_oracle(args.llm_provider, &args.oracle_credentials()) {
        Ok(oracle) => Arc::from(oracle),
        Err(e) => {
            error!("Oracle setup failed: {}", e);
            std::process::exit(1);
        }
    };

    let sink: Option<Arc<dyn NotificationSink>> = match args.webhook_url() {
        Some(url) => Some(Arc::new(WebhookSink::new(url, config.delivery.timeout)?)),
        None => None,
    };

    let pipeline = PipelineBuilder::new(config.clone())
        .source(Arc::new(Fetcher::new(config.fetch.clone())?))
        .oracle(oracle)
        .sink(sink)
        .store(FingerprintStore::new(&args.sent_hashes_file))
        .build()?;

    match pipeline.run().await {
        Ok(RunOutcome::NoCandidates) => info!("No new content, exiting"),
        Ok(RunOutcome::NoneScored) => info!("No high-scoring content, exiting"),
        Ok(RunOutcome::Completed { delivery, new_fingerprints }) => {
            info!(?delivery, new_fingerprints, "Daily digest job finished");
        }
        Err(e) => {
            error!("Digest run aborted: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
