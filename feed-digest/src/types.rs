use chrono::{DateTime, Utc};
// Use the interfaces crate for core types
pub use interfaces::defs::{CandidateEntry, Digest, DigestItem, FingerprintSet, ScoredEntry};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Feed-Digest/1.0".to_string(),
            timeout_seconds: 10,
            max_retries: 0,
            retry_delay_seconds: 2,
            max_feed_size_mb: 10,
            max_redirects: 5,
        }
    }
}

#[derive(Debug)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<ParsedEntry>,
}

#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub link: String,
    pub title: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Timestamp text as the feed wrote it
    pub published_raw: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Source {url} failed: {reason}")]
    Source { url: String, reason: String },

    #[error("{stage} oracle failed: {reason}")]
    Oracle { stage: String, reason: String },

    #[error("Delivery failed: {reason}")]
    Delivery { reason: String },

    #[error("Feed size exceeds limit: {size_mb}MB")]
    FeedTooLarge { size_mb: usize },

    #[error("Timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DigestError {
    pub fn oracle(stage: &str, reason: impl Into<String>) -> Self {
        Self::Oracle {
            stage: stage.to_string(),
            reason: reason.into(),
        }
    }

    /// Oracle failures abort the run; everything else is absorbed by its stage.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Oracle { .. } | Self::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, DigestError>;
