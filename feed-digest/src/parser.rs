use crate::types::{CandidateEntry, DigestError, FingerprintSet, ParsedEntry, ParsedFeed, Result};
use crate::utils::{fingerprint, text, time};
use chrono::{DateTime, Duration, Utc};
use feed_rs::parser;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info};

pub const MAX_SUMMARY_CHARS: usize = 500;

/// Stand-in instant for a timestamp element whose text could not be parsed.
///
/// feed-rs reports both "absent" and "unparseable" as `None`; mapping the
/// latter here keeps the two apart so a broken `published` is not silently
/// replaced by `updated`.
const UNPARSEABLE: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

/// Source text of every timestamp in one document, keyed by the instant it parsed to.
type RawStamps = Rc<RefCell<HashMap<DateTime<Utc>, String>>>;

pub struct FeedParser;

impl FeedParser {
    /// Parse an RSS/Atom/JSON feed document. Entries keep document order.
    pub fn parse_feed(content: &str) -> Result<ParsedFeed> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let stamps: RawStamps = Rc::default();
        let recorder = Rc::clone(&stamps);
        let feed = parser::Builder::new()
            .timestamp_parser(move |raw: &str| {
                let instant = time::parse_timestamp(raw).unwrap_or(UNPARSEABLE);
                recorder
                    .borrow_mut()
                    .entry(instant)
                    .or_insert_with(|| raw.trim().to_string());
                Some(instant)
            })
            .build()
            .parse(content.as_bytes())
            .map_err(|e| DigestError::Parse(format!("Failed to parse feed: {}", e)))?;

        let stamps = stamps.borrow();
        let title = feed.title.map(|t| t.content);
        let entries: Vec<ParsedEntry> = feed
            .entries
            .into_iter()
            .filter_map(|entry| Self::parse_entry(entry, &stamps))
            .collect();

        info!("Parsed feed with {} entries", entries.len());
        Ok(ParsedFeed { title, entries })
    }

    fn parse_entry(entry: feed_rs::model::Entry, stamps: &HashMap<DateTime<Utc>, String>) -> Option<ParsedEntry> {
        // No link, no business key.
        let link = entry
            .links
            .first()
            .map(|l| l.href.trim().to_string())
            .filter(|href| !href.is_empty())?;

        let title = entry.title.map(|t| t.content).unwrap_or_default();

        let summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default();

        // `updated` only stands in when there is no `published` element at all.
        let published_at = entry.published.or(entry.updated).filter(|instant| *instant != UNPARSEABLE);
        if published_at.is_none() {
            debug!("No usable publish time for {}", link);
        }
        let published_raw = published_at.and_then(|instant| stamps.get(&instant).cloned());

        Some(ParsedEntry {
            link,
            title,
            summary,
            published_at,
            published_raw,
        })
    }

    /// Turn parsed entries into candidates: drop anything already known,
    /// undated, or outside the trailing `window` ending at `now`.
    pub fn select_candidates(
        parsed: &ParsedFeed,
        known: &FingerprintSet,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Vec<CandidateEntry> {
        let mut candidates = Vec::new();

        for entry in &parsed.entries {
            let link_fingerprint = fingerprint(&entry.link);
            if known.contains(&link_fingerprint) {
                debug!("Skipping already scored entry: {}", entry.link);
                continue;
            }

            let Some(published_at) = entry.published_at else {
                debug!("Skipping undated entry: {}", entry.link);
                continue;
            };
            if !time::is_within_window(published_at, now, window) {
                continue;
            }

            candidates.push(CandidateEntry {
                title: entry.title.clone(),
                link: entry.link.clone(),
                summary: text::truncate_with_ellipsis(&entry.summary, MAX_SUMMARY_CHARS),
                published_raw: entry
                    .published_raw
                    .clone()
                    .unwrap_or_else(|| published_at.to_rfc3339()),
                published_at,
                fingerprint: link_fingerprint,
            });
        }

        candidates
    }
}
