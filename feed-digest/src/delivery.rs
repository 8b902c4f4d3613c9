use crate::traits::NotificationSink;
use crate::types::{Digest, DigestError, DigestItem, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::{json, Value};
use sha2::Sha256;
use std::time::Duration;
use tracing::{error, info, warn};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub max_attempts: u32,
    /// First pause between attempts, doubled after each failure
    pub base_delay: Duration,
    pub timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    /// No sink configured
    Skipped,
    Failed { attempts: u32, reason: String },
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Webhook signature: HMAC-SHA256 keyed by `"{timestamp}\n{secret}"` over an
/// empty message, base64 encoded.
pub fn sign(timestamp: i64, secret: &str) -> Result<String> {
    let string_to_sign = format!("{}\n{}", timestamp, secret);
    let mac = HmacSha256::new_from_slice(string_to_sign.as_bytes())
        .map_err(|e| DigestError::Delivery { reason: e.to_string() })?;
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Interactive card: theme block, then one section per item in a fixed field order.
pub fn render_card(digest: &Digest) -> Value {
    let mut elements = vec![json!({
        "tag": "div",
        "text": {"tag": "lark_md", "content": format!("**📌 Theme of the day: {}**", digest.theme)},
    })];

    for (idx, item) in digest.items.iter().enumerate() {
        elements.push(json!({"tag": "hr"}));
        elements.push(json!({
            "tag": "div",
            "text": {"tag": "lark_md", "content": render_item(idx + 1, item)},
        }));
    }

    json!({
        "config": {"wide_screen_mode": true},
        "header": {
            "title": {"tag": "plain_text", "content": format!("📰 AI Daily | {}", digest.date)},
            "template": "blue",
        },
        "elements": elements,
    })
}

fn render_item(position: usize, item: &DigestItem) -> String {
    let mut md = format!("**{}. [{}]({})**\n", position, item.title, item.link);
    md.push_str(&format!(
        "**Published:** {} | **Source:** {} ({}) | **ERP relevance:** {}\n",
        item.publish_date, item.source_type, item.source_name, item.erp_relevance
    ));
    md.push_str(&format!("**Summary:** {}\n\n", item.summary));
    md.push_str("**Insights:**\n");
    md.push_str(&format!("🔹 **Key facts:** {}\n", item.key_facts));
    md.push_str(&format!("🔹 **Implementation:** {}\n", item.implementation_method));
    md.push_str(&format!("🔹 **Exploration:** {}\n\n", item.exploration_direction));
    md.push_str(&format!("**Link:** {}", item.link));
    md
}

/// Full webhook body. Without a secret the signature is left empty.
pub fn build_payload(digest: &Digest, secret: Option<&str>, timestamp: i64) -> Result<Value> {
    let sign = match secret.filter(|s| !s.is_empty()) {
        Some(secret) => sign(timestamp, secret)?,
        None => String::new(),
    };

    Ok(json!({
        "timestamp": timestamp.to_string(),
        "sign": sign,
        "msg_type": "interactive",
        "card": render_card(digest),
    }))
}

/// Pauses between delivery attempts: `base_delay`, doubling, no jitter.
/// Yields one fewer pause than there are attempts.
pub fn retry_delays(config: &DeliveryConfig) -> impl Iterator<Item = Duration> {
    let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
        current_interval: config.base_delay,
        initial_interval: config.base_delay,
        randomization_factor: 0.0,
        multiplier: 2.0,
        max_interval: config.base_delay * 8,
        max_elapsed_time: None,
        ..Default::default()
    };
    let pauses = config.max_attempts.max(1) as usize - 1;

    std::iter::from_fn(move || backoff.next_backoff()).take(pauses)
}

/// POST the digest with bounded retries. Never returns an error: a final
/// failure is logged and reported as `DeliveryOutcome::Failed`.
pub async fn deliver(
    sink: Option<&dyn NotificationSink>,
    digest: &Digest,
    secret: Option<&str>,
    config: &DeliveryConfig,
) -> DeliveryOutcome {
    let Some(sink) = sink else {
        warn!("No webhook endpoint configured, skipping delivery");
        return DeliveryOutcome::Skipped;
    };

    let payload = match build_payload(digest, secret, chrono::Utc::now().timestamp()) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Could not build webhook payload: {}", e);
            return DeliveryOutcome::Failed {
                attempts: 0,
                reason: e.to_string(),
            };
        }
    };

    let max_attempts = config.max_attempts.max(1);
    let mut delays = retry_delays(config);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        match sink.post(&payload).await {
            Ok(()) => {
                info!("Digest delivered to {} (attempt {})", sink.endpoint(), attempt);
                return DeliveryOutcome::Delivered { attempts: attempt };
            }
            Err(e) => {
                warn!("Delivery attempt {}/{} failed: {}", attempt, max_attempts, e);
                last_error = e.to_string();
                if let Some(delay) = delays.next() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    error!("Delivery failed after {} attempts: {}", max_attempts, last_error);
    DeliveryOutcome::Failed {
        attempts: max_attempts,
        reason: last_error,
    }
}

/// Custom-bot webhook that acknowledges with `{"code": 0}`.
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn post(&self, payload: &Value) -> Result<()> {
        let response = self.client.post(&self.url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::Delivery {
                reason: format!("HTTP {}", status),
            });
        }

        let body: Value = response.json().await?;
        // Older deployments answer with `StatusCode` instead of `code`.
        let code = body
            .get("code")
            .or_else(|| body.get("StatusCode"))
            .and_then(Value::as_i64);

        match code {
            Some(0) => Ok(()),
            _ => Err(DigestError::Delivery {
                reason: format!("webhook rejected payload: {}", body),
            }),
        }
    }
}
