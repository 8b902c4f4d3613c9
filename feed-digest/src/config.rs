//! Runtime configuration.
//!
//! Every option can come from the command line or the environment (a `.env`
//! file is loaded first by the binary). The parsed `Args` are turned into an
//! immutable `PipelineConfig` that the pipeline owns for the whole run.

use crate::aggregator::{DEFAULT_CONCURRENCY, DEFAULT_MAX_CANDIDATES};
use crate::delivery::DeliveryConfig;
use crate::oracle::{OracleCredentials, OracleProvider, DEFAULT_OPENAI_MODEL, DEFAULT_QWEN_MODEL};
use crate::scoring::DEFAULT_TOP_K;
use crate::types::{DigestError, FetchConfig, Result};
use crate::utils::url;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_WINDOW_HOURS: i64 = 48;

/// Feed digest - fetch, score, summarize and deliver fresh feed entries
#[derive(Parser, Debug, Clone)]
#[command(name = "feed-digest")]
#[command(about = "Builds a scored daily digest from feed sources and posts it to a webhook")]
pub struct Args {
    /// Feed URLs, one per line
    #[arg(long, env = "RSS_URLS", default_value = "")]
    pub rss_urls: String,

    /// File holding fingerprints of already scored entries
    #[arg(long, env = "SENT_HASHES_FILE", default_value = "data/sent_hashes.txt")]
    pub sent_hashes_file: PathBuf,

    /// Oracle provider used for both scoring and synthesis
    #[arg(long, env = "LLM_PROVIDER", value_enum, ignore_case = true, default_value_t = OracleProvider::Openai)]
    pub llm_provider: OracleProvider,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_OPENAI_MODEL)]
    pub openai_model: String,

    #[arg(long, env = "DASHSCOPE_API_KEY", hide_env_values = true)]
    pub dashscope_api_key: Option<String>,

    #[arg(long, env = "QWEN_MODEL", default_value = DEFAULT_QWEN_MODEL)]
    pub qwen_model: String,

    #[arg(long, env = "ARK_API_KEY", hide_env_values = true)]
    pub ark_api_key: Option<String>,

    #[arg(long, env = "ARK_MODEL")]
    pub ark_model: Option<String>,

    /// Webhook endpoint; delivery is skipped when unset
    #[arg(long, env = "FEISHU_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Webhook signing secret
    #[arg(long, env = "FEISHU_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    /// Upper bound on candidates sent to scoring
    #[arg(long, env = "MAX_CANDIDATES", default_value_t = DEFAULT_MAX_CANDIDATES)]
    pub max_candidates: usize,

    /// Entries kept after scoring
    #[arg(long, env = "TOP_N", default_value_t = DEFAULT_TOP_K)]
    pub top_n: usize,

    /// Recency window in hours
    #[arg(long, env = "HOURS_WINDOW", default_value_t = DEFAULT_WINDOW_HOURS)]
    pub hours_window: i64,

    /// Concurrent feed fetches
    #[arg(long, env = "MAX_WORKERS", default_value_t = DEFAULT_CONCURRENCY)]
    pub max_workers: usize,

    /// Per-feed fetch timeout in seconds
    #[arg(long, env = "RSS_TIMEOUT", default_value_t = 10)]
    pub rss_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(DigestError::Config("MAX_WORKERS must be at least 1".to_string()));
        }
        if self.top_n == 0 {
            return Err(DigestError::Config("TOP_N must be at least 1".to_string()));
        }
        if self.max_candidates == 0 {
            return Err(DigestError::Config("MAX_CANDIDATES must be at least 1".to_string()));
        }
        if self.hours_window <= 0 {
            return Err(DigestError::Config("HOURS_WINDOW must be positive".to_string()));
        }
        Ok(())
    }

    pub fn sources(&self) -> Vec<String> {
        url::parse_source_list(&self.rss_urls)
            .into_iter()
            .filter(|source| {
                let valid = url::is_valid_feed_url(source);
                if !valid {
                    warn!("Ignoring invalid feed URL: {}", source);
                }
                valid
            })
            .collect()
    }

    pub fn oracle_credentials(&self) -> OracleCredentials {
        OracleCredentials {
            openai_api_key: self.openai_api_key.clone(),
            openai_model: self.openai_model.clone(),
            dashscope_api_key: self.dashscope_api_key.clone(),
            qwen_model: self.qwen_model.clone(),
            ark_api_key: self.ark_api_key.clone(),
            ark_model: self.ark_model.clone(),
        }
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            sources: self.sources(),
            concurrency: self.max_workers,
            window: chrono::Duration::hours(self.hours_window),
            max_candidates: self.max_candidates,
            top_k: self.top_n,
            fetch: FetchConfig {
                timeout_seconds: self.rss_timeout,
                ..FetchConfig::default()
            },
            delivery: DeliveryConfig::default(),
            secret: self.webhook_secret.clone().filter(|s| !s.is_empty()),
        }
    }
}

/// Everything one run needs, fixed at construction.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sources: Vec<String>,
    pub concurrency: usize,
    pub window: chrono::Duration,
    pub max_candidates: usize,
    pub top_k: usize,
    pub fetch: FetchConfig,
    pub delivery: DeliveryConfig,
    pub secret: Option<String>,
}

impl PipelineConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_seconds)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            window: chrono::Duration::hours(DEFAULT_WINDOW_HOURS),
            max_candidates: DEFAULT_MAX_CANDIDATES,
            top_k: DEFAULT_TOP_K,
            fetch: FetchConfig::default(),
            delivery: DeliveryConfig::default(),
            secret: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["feed-digest"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_map_to_pipeline_config() {
        let args = parse(&[
            "--rss-urls",
            "https://a.example/feed\n\nnot a url\nhttps://b.example/rss",
            "--max-candidates",
            "60",
            "--top-n",
            "3",
            "--hours-window",
            "48",
            "--max-workers",
            "5",
            "--rss-timeout",
            "10",
            "--webhook-secret",
            "s3cret",
        ]);
        args.validate().unwrap();

        let config = args.to_pipeline_config();

        assert_eq!(
            config.sources,
            vec!["https://a.example/feed".to_string(), "https://b.example/rss".to_string()]
        );
        assert_eq!(config.max_candidates, 60);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.window, chrono::Duration::hours(48));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(config.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.delivery.max_attempts, 3);
    }

    #[test]
    fn provider_names_are_case_insensitive() {
        let args = parse(&["--llm-provider", "ARK", "--max-candidates", "1", "--top-n", "1", "--max-workers", "1", "--hours-window", "1"]);
        assert_eq!(args.llm_provider, OracleProvider::Ark);
    }

    #[test]
    fn zero_bounds_are_rejected() {
        let args = parse(&["--max-workers", "0", "--top-n", "3", "--max-candidates", "60", "--hours-window", "48"]);
        assert!(matches!(args.validate(), Err(DigestError::Config(_))));
    }

    #[test]
    fn blank_webhook_url_means_no_sink() {
        let args = parse(&["--webhook-url", "  ", "--top-n", "3", "--max-candidates", "60", "--max-workers", "5", "--hours-window", "48"]);
        assert_eq!(args.webhook_url(), None);
    }
}
