use reqwest::Client;
use anyhow::{Result, anyhow, Context};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::Credentials;

/// 一次 chat completion 请求：一条 system + 一条 user
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub model: String,
    pub content: String,
    pub usage: TokenUsage,
}

impl ChatCompletion {
    pub fn cost_usd(&self) -> f64 {
        cost_usd(&self.model, self.usage)
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion>;
}

/// (input, output) 每 token 美元价
fn price_per_token(model: &str) -> (f64, f64) {
    match model {
        "gpt-4o" => (2.5 / 1_000_000.0, 10.0 / 1_000_000.0),
        // gpt-4o-mini，也是未知模型的兜底价
        _ => (0.15 / 1_000_000.0, 0.6 / 1_000_000.0),
    }
}

pub fn cost_usd(model: &str, usage: TokenUsage) -> f64 {
    let (input, output) = price_per_token(model);
    usage.prompt_tokens as f64 * input + usage.completion_tokens as f64 * output
}

/// 去掉推理模型的 <think> 段和 markdown 代码围栏
pub fn strip_code_fences(raw: &str) -> String {
    let mut clean = raw.to_string();
    if let Some(start) = clean.find("<think>") {
        if let Some(end) = clean.find("</think>") {
            if end > start {
                clean = format!("{}{}", &clean[..start], &clean[end + "</think>".len()..]);
            }
        }
    }
    clean.replace("```json", "").replace("```", "").trim().to_string()
}

#[derive(Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI 兼容的 /chat/completions 客户端。单次请求，不重试。
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(client: Client, credentials: &Credentials) -> Self {
        Self {
            client,
            api_key: credentials.openai_api_key.clone(),
            base_url: credentials.openai_base_url.clone(),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": request.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user}
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        debug!("LLM request -> {} ({} chars prompt)", request.model, request.user.len());

        let resp = self.client.post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{} network error", request.model))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            warn!("⚠️ {} API Error [{}]: {}", request.model, status, err);
            return Err(anyhow!("{} API Error [{}]: {}", request.model, status, err));
        }

        let parsed: CompletionBody = resp.json().await
            .with_context(|| format!("{} returned an unreadable body", request.model))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(ChatCompletion {
            model: request.model,
            content,
            usage: parsed.usage,
        })
    }
}
