use crate::parser::FeedParser;
use crate::traits::FeedSource;
use crate::types::{CandidateEntry, DigestError, FingerprintSet, Result};
use crate::utils::url::extract_host;
use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt};
use std::time::Duration as StdDuration;
use tracing::{info, warn};

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_MAX_CANDIDATES: usize = 60;

/// Fetches every source with at most `concurrency` requests in flight.
///
/// Each source is isolated: a network, timeout or parse failure is logged and
/// contributes an empty batch. Batches come back in completion order, so the
/// order across sources is not stable between runs.
pub async fn fetch_batches(
    source: &dyn FeedSource,
    urls: &[String],
    known: &FingerprintSet,
    window: Duration,
    concurrency: usize,
    fetch_timeout: StdDuration,
) -> Vec<Vec<CandidateEntry>> {
    if urls.is_empty() {
        warn!("No feed sources configured");
        return Vec::new();
    }

    info!("Fetching {} feed sources (concurrency {})", urls.len(), concurrency);

    stream::iter(urls.iter().map(|url| async move {
        let host = extract_host(url).unwrap_or_else(|| url.clone());
        match fetch_source(source, url, known, window, fetch_timeout).await {
            Ok(candidates) => {
                info!("Source {} contributed {} candidates", host, candidates.len());
                candidates
            }
            Err(e) => {
                warn!(source = %url, "Skipping source {}: {}", host, e);
                Vec::new()
            }
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await
}

/// Fetch every source and flatten the batches.
pub async fn fetch_all(
    source: &dyn FeedSource,
    urls: &[String],
    known: &FingerprintSet,
    window: Duration,
    concurrency: usize,
    fetch_timeout: StdDuration,
) -> Vec<CandidateEntry> {
    fetch_batches(source, urls, known, window, concurrency, fetch_timeout)
        .await
        .into_iter()
        .flatten()
        .collect()
}

async fn fetch_source(
    source: &dyn FeedSource,
    url: &str,
    known: &FingerprintSet,
    window: Duration,
    fetch_timeout: StdDuration,
) -> Result<Vec<CandidateEntry>> {
    let document = tokio::time::timeout(fetch_timeout, source.fetch_document(url))
        .await
        .map_err(|_| DigestError::Timeout {
            seconds: fetch_timeout.as_secs(),
        })??;

    let parsed = FeedParser::parse_feed(&document).map_err(|e| DigestError::Source {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    // Window is evaluated against the time this source finished, not run start.
    Ok(FeedParser::select_candidates(&parsed, known, Utc::now(), window))
}

/// Merge per-source batches and cap the total by plain truncation.
///
/// All dispatched fetches always run to completion; the cap is applied after
/// the fact, never by cancelling in-flight work.
pub fn aggregate(batches: Vec<Vec<CandidateEntry>>, max_candidates: usize) -> Vec<CandidateEntry> {
    let mut merged: Vec<CandidateEntry> = batches.into_iter().flatten().collect();

    if merged.len() > max_candidates {
        info!("Truncating candidates: {} -> {}", merged.len(), max_candidates);
        merged.truncate(max_candidates);
    }

    info!("Collected {} candidates", merged.len());
    merged
}
