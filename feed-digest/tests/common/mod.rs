use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_digest::{DigestError, Oracle, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Oracle that returns a fixed JSON value, or fails, and counts its calls.
pub struct ScriptedOracle {
    response: Option<Value>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn returning(response: Value) -> Self {
        Self {
            response: Some(response),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    fn name(&self) -> String {
        "scripted".to_string()
    }

    async fn call_json(&self, _system_prompt: &str, _user_prompt: &str) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .ok_or_else(|| DigestError::oracle("scripted", "unable to produce JSON"))
    }
}

/// Minimal RSS 2.0 document with one item per `(title, link, published)`.
pub fn rss_feed(items: &[(&str, &str, DateTime<Utc>)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link, published)| {
            format!(
                "<item><title>{}</title><link>{}</link><description>About {}</description><pubDate>{}</pubDate></item>",
                title,
                link,
                title,
                published.to_rfc2822()
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Fixture</title><link>https://example.com</link><description>fixture feed</description>{}</channel></rss>"#,
        body
    )
}
