use crate::aggregator;
use crate::config::PipelineConfig;
use crate::delivery::{self, DeliveryOutcome};
use crate::digest;
use crate::oracle::Oracle;
use crate::scoring;
use crate::state::FingerprintStore;
use crate::traits::{FeedSource, NotificationSink};
use crate::types::{DigestError, Result};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// How a run ended when no fatal error occurred.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Fetch stage produced nothing fresh.
    NoCandidates,
    /// Scoring returned no usable entries.
    NoneScored,
    Completed {
        delivery: DeliveryOutcome,
        new_fingerprints: usize,
    },
}

/// Runs fetch → aggregate → score → synthesize → deliver → persist, in order.
///
/// Fingerprints of the scored top-K are persisted once the run completes,
/// whatever the delivery outcome. A fatal oracle error returns before the
/// store is written.
pub struct DigestPipeline {
    config: PipelineConfig,
    source: Arc<dyn FeedSource>,
    scoring_oracle: Arc<dyn Oracle>,
    synthesis_oracle: Arc<dyn Oracle>,
    sink: Option<Arc<dyn NotificationSink>>,
    store: FingerprintStore,
}

impl DigestPipeline {
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[instrument(skip_all, fields(run_id = %Uuid::new_v4()))]
    pub async fn run(&self) -> Result<RunOutcome> {
        info!("Starting digest run with {} sources", self.config.sources.len());

        let known = self.store.load().await?;
        info!("Loaded {} known fingerprints", known.len());

        let batches = aggregator::fetch_batches(
            self.source.as_ref(),
            &self.config.sources,
            &known,
            self.config.window,
            self.config.concurrency,
            self.config.fetch_timeout(),
        )
        .await;
        let candidates = aggregator::aggregate(batches, self.config.max_candidates);
        if candidates.is_empty() {
            info!(stage = "fetch", "No new entries, nothing to do");
            return Ok(RunOutcome::NoCandidates);
        }

        let top = scoring::score(self.scoring_oracle.as_ref(), &candidates, self.config.top_k).await?;
        if top.is_empty() {
            info!(stage = "score", "No entries survived scoring, nothing to do");
            return Ok(RunOutcome::NoneScored);
        }

        let digest = digest::synthesize(self.synthesis_oracle.as_ref(), &top).await?;
        match serde_json::to_string_pretty(&digest) {
            Ok(rendered) => info!("Digest:\n{}", rendered),
            Err(e) => warn!("Could not render digest for logging: {}", e),
        }

        let delivery = delivery::deliver(
            self.sink.as_deref(),
            &digest,
            self.config.secret.as_deref(),
            &self.config.delivery,
        )
        .await;
        if !delivery.is_success() {
            warn!(stage = "deliver", "Digest was not delivered, fingerprints are still recorded");
        }

        let new_fingerprints = self
            .store
            .merge_and_save(known, top.iter().map(|entry| entry.fingerprint().to_string()))
            .await?;
        info!("Recorded {} new fingerprints", new_fingerprints);

        Ok(RunOutcome::Completed {
            delivery,
            new_fingerprints,
        })
    }
}

/// Pipeline builder for easier configuration
pub struct PipelineBuilder {
    config: PipelineConfig,
    source: Option<Arc<dyn FeedSource>>,
    scoring_oracle: Option<Arc<dyn Oracle>>,
    synthesis_oracle: Option<Arc<dyn Oracle>>,
    sink: Option<Arc<dyn NotificationSink>>,
    store: Option<FingerprintStore>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            source: None,
            scoring_oracle: None,
            synthesis_oracle: None,
            sink: None,
            store: None,
        }
    }

    pub fn source(mut self, source: Arc<dyn FeedSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Use one oracle for both scoring and synthesis.
    pub fn oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.scoring_oracle = Some(oracle.clone());
        self.synthesis_oracle = Some(oracle);
        self
    }

    pub fn scoring_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.scoring_oracle = Some(oracle);
        self
    }

    pub fn synthesis_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.synthesis_oracle = Some(oracle);
        self
    }

    pub fn sink(mut self, sink: Option<Arc<dyn NotificationSink>>) -> Self {
        self.sink = sink;
        self
    }

    pub fn store(mut self, store: FingerprintStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<DigestPipeline> {
        let missing = |what: &str| DigestError::Config(format!("pipeline is missing a {}", what));

        Ok(DigestPipeline {
            source: self.source.ok_or_else(|| missing("feed source"))?,
            scoring_oracle: self.scoring_oracle.ok_or_else(|| missing("scoring oracle"))?,
            synthesis_oracle: self.synthesis_oracle.ok_or_else(|| missing("synthesis oracle"))?,
            store: self.store.ok_or_else(|| missing("fingerprint store"))?,
            sink: self.sink,
            config: self.config,
        })
    }
}
