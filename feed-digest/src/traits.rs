use crate::types::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Something that can hand back a raw feed document for a URL (RSS, Atom, JSON Feed).
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the document body
    async fn fetch_document(&self, url: &str) -> Result<String>;
}

/// Webhook endpoint that renders the digest card for end users.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn endpoint(&self) -> &str;

    /// POST one signed payload. `Ok` only when the sink acknowledged it.
    async fn post(&self, payload: &Value) -> Result<()>;
}
