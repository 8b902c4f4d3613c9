use crate::types::{DigestError, Result};
use async_trait::async_trait;
use clap::ValueEnum;
use reqwest::Client;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const QWEN_ENDPOINT: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";
pub const ARK_ENDPOINT: &str = "https://ark.cn-beijing.volces.com/api/v3/responses";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-2024-08-06";
pub const DEFAULT_QWEN_MODEL: &str = "qwen-plus";

const CHAT_TIMEOUT: Duration = Duration::from_secs(60);
const ARK_TIMEOUT: Duration = Duration::from_secs(120);
const ARK_ATTEMPTS: u32 = 3;
const ARK_RETRY_PAUSE: Duration = Duration::from_secs(2);

/// A model endpoint that turns a prompt pair into a JSON value.
///
/// Any failure (transport, HTTP status, missing content, non-JSON content)
/// comes back as `DigestError::Oracle`; callers treat it as fatal for the run.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Provider name, for logs
    fn name(&self) -> String;

    async fn call_json(&self, system_prompt: &str, user_prompt: &str) -> Result<Value>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OracleProvider {
    #[default]
    Openai,
    Qwen,
    Ark,
}

impl fmt::Display for OracleProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Openai => "openai",
            Self::Qwen => "qwen",
            Self::Ark => "ark",
        };
        f.write_str(name)
    }
}

/// Credentials and model names for every provider; only the selected one is checked.
#[derive(Clone, Debug, Default)]
pub struct OracleCredentials {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub dashscope_api_key: Option<String>,
    pub qwen_model: String,
    pub ark_api_key: Option<String>,
    pub ark_model: Option<String>,
}

/// Map a provider name to a constructed oracle.
pub fn build_oracle(provider: OracleProvider, credentials: &OracleCredentials) -> Result<Box<dyn Oracle>> {
    info!("Using LLM provider: {}", provider);

    let oracle: Box<dyn Oracle> = match provider {
        OracleProvider::Openai => {
            let key = require(&credentials.openai_api_key, "OPENAI_API_KEY")?;
            Box::new(OpenAiOracle::new(key, credentials.openai_model.clone())?)
        }
        OracleProvider::Qwen => {
            let key = require(&credentials.dashscope_api_key, "DASHSCOPE_API_KEY")?;
            Box::new(QwenOracle::new(key, credentials.qwen_model.clone())?)
        }
        OracleProvider::Ark => {
            let key = require(&credentials.ark_api_key, "ARK_API_KEY")?;
            let model = require(&credentials.ark_model, "ARK_MODEL")?;
            Box::new(ArkOracle::new(key, model)?)
        }
    };
    Ok(oracle)
}

fn require(value: &Option<String>, name: &str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DigestError::Config(format!("{} is not configured", name)))
}

fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

fn oracle_err(provider: &str, reason: impl fmt::Display) -> DigestError {
    DigestError::oracle(provider, reason.to_string())
}

/// Pull a JSON value out of model output.
///
/// Tolerates a `<简报>` wrapper and markdown code fences around the payload.
pub fn extract_json(content: &str) -> Option<Value> {
    let cleaned = content.replace("<简报>", "").replace("</简报>", "");
    let cleaned = cleaned.trim();

    if let Ok(value) = serde_json::from_str(cleaned) {
        return Some(value);
    }

    let fenced = if let Some((_, rest)) = cleaned.split_once("```json") {
        rest.split("```").next()
    } else {
        cleaned.split("```").nth(1)
    };
    fenced.and_then(|body| serde_json::from_str(body.trim()).ok())
}

/// Chat-completions style transport shared by the OpenAI and DashScope adapters.
struct ChatCompletions {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl ChatCompletions {
    async fn complete(&self, provider: &str, messages: Value) -> Result<Value> {
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "response_format": {"type": "json_object"},
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| oracle_err(provider, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("{} response body: {}", provider, body);
            return Err(oracle_err(provider, format!("HTTP {}", status)));
        }

        let data: Value = response.json().await.map_err(|e| oracle_err(provider, e))?;
        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| oracle_err(provider, "response has no message content"))?;

        extract_json(content).ok_or_else(|| {
            error!("{} returned non-JSON content: {}", provider, content);
            oracle_err(provider, "message content is not JSON")
        })
    }
}

pub struct OpenAiOracle {
    inner: ChatCompletions,
}

impl OpenAiOracle {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Ok(Self {
            inner: ChatCompletions {
                client: http_client(CHAT_TIMEOUT)?,
                api_key,
                model,
                endpoint: OPENAI_ENDPOINT.to_string(),
            },
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.inner.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    fn name(&self) -> String {
        format!("openai ({})", self.inner.model)
    }

    async fn call_json(&self, system_prompt: &str, user_prompt: &str) -> Result<Value> {
        let messages = json!([
            {"role": "system", "content": system_prompt},
            {"role": "user", "content": user_prompt},
        ]);
        self.inner.complete("openai", messages).await
    }
}

/// DashScope compatible mode. The system prompt is folded into the user turn.
pub struct QwenOracle {
    inner: ChatCompletions,
}

impl QwenOracle {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Ok(Self {
            inner: ChatCompletions {
                client: http_client(CHAT_TIMEOUT)?,
                api_key,
                model,
                endpoint: QWEN_ENDPOINT.to_string(),
            },
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.inner.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Oracle for QwenOracle {
    fn name(&self) -> String {
        format!("qwen ({})", self.inner.model)
    }

    async fn call_json(&self, system_prompt: &str, user_prompt: &str) -> Result<Value> {
        let combined = format!("{}\n\n{}", system_prompt, user_prompt);
        let messages = json!([{"role": "user", "content": combined}]);
        self.inner.complete("qwen", messages).await
    }
}

/// Volcengine Ark responses API.
pub struct ArkOracle {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    retry_pause: Duration,
}

impl ArkOracle {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Ok(Self {
            client: http_client(ARK_TIMEOUT)?,
            api_key,
            model,
            endpoint: ARK_ENDPOINT.to_string(),
            retry_pause: ARK_RETRY_PAUSE,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    fn output_text(data: &Value) -> Option<&str> {
        data["output"]
            .as_array()?
            .iter()
            .filter(|item| item["type"] == "message" && item["role"] == "assistant")
            .flat_map(|item| item["content"].as_array().into_iter().flatten())
            .filter(|part| part["type"] == "output_text")
            .filter_map(|part| part["text"].as_str())
            .find(|text| !text.is_empty())
    }
}

#[async_trait]
impl Oracle for ArkOracle {
    fn name(&self) -> String {
        format!("ark ({})", self.model)
    }

    async fn call_json(&self, system_prompt: &str, user_prompt: &str) -> Result<Value> {
        let payload = json!({
            "model": self.model,
            "input": [
                {"role": "system", "content": [{"type": "input_text", "text": system_prompt}]},
                {"role": "user", "content": [{"type": "input_text", "text": user_prompt}]},
            ],
        });

        let mut last_error = None;
        for attempt in 1..=ARK_ATTEMPTS {
            let sent = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                // Only transport-level failures are worth another attempt.
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!("Ark call failed (attempt {}/{}): {}", attempt, ARK_ATTEMPTS, e);
                    last_error = Some(e.to_string());
                    if attempt < ARK_ATTEMPTS {
                        tokio::time::sleep(self.retry_pause).await;
                    }
                    continue;
                }
                Err(e) => return Err(oracle_err("ark", e)),
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                debug!("ark response body: {}", body);
                return Err(oracle_err("ark", format!("HTTP {}", status)));
            }

            let data: Value = response.json().await.map_err(|e| oracle_err("ark", e))?;
            let content = Self::output_text(&data)
                .ok_or_else(|| oracle_err("ark", "response contained no output_text"))?;

            return extract_json(content).ok_or_else(|| {
                error!("ark returned non-JSON content: {}", content);
                oracle_err("ark", "output text is not JSON")
            });
        }

        Err(oracle_err(
            "ark",
            format!(
                "failed after {} attempts: {}",
                ARK_ATTEMPTS,
                last_error.unwrap_or_else(|| "unknown error".to_string())
            ),
        ))
    }
}
