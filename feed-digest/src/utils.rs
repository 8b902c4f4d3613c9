use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a link, the dedup key persisted between runs.
pub fn fingerprint(link: &str) -> String {
    hex::encode(Sha256::digest(link.as_bytes()))
}

/// Text processing utilities
pub mod text {
    pub const ELLIPSIS: &str = "...";

    /// Keep the first `max_chars` characters and mark the cut with `...`.
    /// Counts chars, not bytes, so multi-byte titles never split mid-codepoint.
    pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
            None => text.to_string(),
        }
    }

    /// Hard cut without a marker.
    pub fn take_chars(text: &str, max_chars: usize) -> String {
        text.chars().take(max_chars).collect()
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// Extract host from URL, for log fields
    pub fn extract_host(url_str: &str) -> Option<String> {
        Url::parse(url_str)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.to_string()))
    }

    /// Validate feed URL format
    pub fn is_valid_feed_url(url_str: &str) -> bool {
        if let Ok(url) = Url::parse(url_str) {
            url.scheme() == "http" || url.scheme() == "https"
        } else {
            false
        }
    }

    /// Split a newline-separated source list, dropping blank lines.
    pub fn parse_source_list(raw: &str) -> Vec<String> {
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Time utilities
pub mod time {
    use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Offset, Utc};

    const DIGEST_UTC_OFFSET_SECS: i32 = 8 * 3600;

    /// Zone-less layouts seen in the wild, read as UTC.
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%a, %d %b %Y %H:%M:%S",
        "%d %b %Y %H:%M:%S",
    ];

    /// Parse a feed timestamp. RFC 3339 and RFC 2822 keep their offset;
    /// stamps without a zone are taken as UTC.
    pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
        let text = text.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(text).or_else(|_| DateTime::parse_from_rfc2822(text)) {
            return Some(dt.with_timezone(&Utc));
        }

        let bare = text.trim_end_matches(" UTC").trim_end_matches(" GMT");
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(bare, format).ok())
            .map(|naive| naive.and_utc())
    }

    /// True when `published` lies inside the trailing window ending at `now`.
    /// The lower edge is inclusive. Entries dated in the future count as recent.
    pub fn is_within_window(published: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
        now.signed_duration_since(published) <= window
    }

    /// Civil date (UTC+8) a digest is labelled with.
    pub fn digest_date(now: DateTime<Utc>) -> String {
        let offset = FixedOffset::east_opt(DIGEST_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
        now.with_timezone(&offset).format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn fingerprint_is_stable_sha256_hex() {
        assert_eq!(
            fingerprint("https://example.com/a"),
            fingerprint("https://example.com/a")
        );
        // sha256("abc")
        assert_eq!(
            fingerprint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(fingerprint("https://example.com/a"), fingerprint("https://example.com/b"));
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(text::truncate_with_ellipsis("short", 10), "short");
        assert_eq!(text::truncate_with_ellipsis("abcdef", 3), "abc...");
        assert_eq!(text::truncate_with_ellipsis("日报日报日报", 2), "日报...");
        assert_eq!(text::truncate_with_ellipsis("exact", 5), "exact");
        assert_eq!(text::take_chars("日报日报", 3), "日报日");
    }

    #[test]
    fn recency_window_is_inclusive_at_lower_edge() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let window = Duration::hours(48);

        assert!(time::is_within_window(now - window, now, window));
        assert!(!time::is_within_window(now - window - Duration::seconds(1), now, window));
        assert!(time::is_within_window(now + Duration::hours(1), now, window));
    }

    #[test]
    fn zone_less_timestamps_are_utc() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 10, 10, 0, 0).unwrap();

        for raw in [
            "Fri, 10 May 2024 10:00:00",
            "2024-05-10T10:00:00",
            "2024-05-10 10:00:00",
            "2024-05-10T10:00:00.000",
            "10 May 2024 10:00:00",
            "Fri, 10 May 2024 10:00:00 UTC",
        ] {
            assert_eq!(time::parse_timestamp(raw), Some(expected), "{}", raw);
        }
    }

    #[test]
    fn zoned_timestamps_keep_their_offset() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 10, 10, 0, 0).unwrap();

        assert_eq!(time::parse_timestamp("Fri, 10 May 2024 10:00:00 GMT"), Some(expected));
        assert_eq!(time::parse_timestamp("Fri, 10 May 2024 18:00:00 +0800"), Some(expected));
        assert_eq!(time::parse_timestamp("2024-05-10T12:00:00+02:00"), Some(expected));
        assert_eq!(time::parse_timestamp(" 2024-05-10T10:00:00Z "), Some(expected));
        assert_eq!(time::parse_timestamp("sometime last week"), None);
    }

    #[test]
    fn digest_date_uses_utc_plus_eight() {
        let late_utc = Utc.with_ymd_and_hms(2024, 5, 10, 17, 30, 0).unwrap();
        assert_eq!(time::digest_date(late_utc), "2024-05-11");

        let early_utc = Utc.with_ymd_and_hms(2024, 5, 10, 1, 0, 0).unwrap();
        assert_eq!(time::digest_date(early_utc), "2024-05-10");
    }

    #[test]
    fn source_list_skips_blank_lines() {
        let raw = "https://a.example/feed\n\n   \n  https://b.example/rss  \n";
        assert_eq!(
            url::parse_source_list(raw),
            vec!["https://a.example/feed".to_string(), "https://b.example/rss".to_string()]
        );
        assert!(url::is_valid_feed_url("https://a.example/feed"));
        assert!(!url::is_valid_feed_url("ftp://a.example/feed"));
        assert_eq!(url::extract_host("https://a.example/feed"), Some("a.example".to_string()));
    }
}
