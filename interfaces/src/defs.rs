use std::collections::HashSet;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Hex SHA-256 digests of links that were already scored in earlier runs.
pub type FingerprintSet = HashSet<String>;

/// One fresh feed entry that survived dedup and recency filtering.
///
/// `link` is the business key; `fingerprint` is derived from it and never
/// recomputed downstream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published_at: DateTime<Utc>,
    /// Publish time in the feed's own notation, shown to the oracle as-is.
    pub published_raw: String,
    pub fingerprint: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    #[serde(flatten)]
    pub entry: CandidateEntry,
    // Opaque oracle score, no range is assumed.
    pub score: f64,
    pub reason: String,
}

impl ScoredEntry {
    pub fn link(&self) -> &str {
        &self.entry.link
    }

    pub fn fingerprint(&self) -> &str {
        &self.entry.fingerprint
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DigestItem {
    pub title: String,
    pub publish_date: String,
    pub source_type: String,
    pub source_name: String,
    pub erp_relevance: String,
    pub summary: String,
    pub key_facts: String,
    pub implementation_method: String,
    pub exploration_direction: String,
    pub link: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    /// Civil date (`YYYY-MM-DD`) the digest was produced for.
    pub date: String,
    pub theme: String,
    pub items: Vec<DigestItem>,
}

// Object style note:
// Every value in here lives for a single run. The pipeline owns them and
// hands them from stage to stage by value; only the fingerprint set is ever
// written to disk.
