use std::env;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    pub summary_model: String,
    pub analysis_model: String,
    pub translate_model: String,
    pub max_tokens_summary: u32,
    pub max_tokens_analysis: u32,
    pub max_tokens_translate: u32,
    pub temperature: f64,
    pub translate_temperature: f64,
    /// 新闻数达到这个值就换成 analysis_model 做摘要
    pub high_volume_threshold: usize,
    /// 只做告警，不会中断流水线
    pub daily_cost_limit_usd: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_description_len: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummaryConfig {
    pub news_limit: i64,
    pub snippet_len: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SelectorConfig {
    pub pick_count: usize,
    pub headlines_per_stock: usize,
    /// None 或 <= 0 = 不限时间窗口
    pub lookback_hours: Option<i64>,
    pub extended_prompt: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    pub server: ServerConfig,
    pub ai: AiConfig,
    pub fetch: FetchConfig,
    pub summary: SummaryConfig,
    pub selector: SelectorConfig,
}

impl PipelineConfig {
    /// 默认值 -> pipeline_config.toml (可选) -> NEWSDESK__* 环境变量
    pub fn load() -> Result<Self> {
        let settings = Self::builder()?
            .add_source(File::with_name("pipeline_config").required(false))
            .add_source(Environment::with_prefix("NEWSDESK").separator("__"))
            .build()?;

        let cfg: PipelineConfig = settings.try_deserialize().context("Invalid pipeline config")?;
        Ok(cfg)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let b = Config::builder()
            .set_default("server.bind_addr", "0.0.0.0:8080")?
            .set_default("ai.summary_model", "gpt-4o-mini")?
            .set_default("ai.analysis_model", "gpt-4o")?
            .set_default("ai.translate_model", "gpt-4o-mini")?
            .set_default("ai.max_tokens_summary", 500)?
            .set_default("ai.max_tokens_analysis", 1500)?
            .set_default("ai.max_tokens_translate", 1500)?
            .set_default("ai.temperature", 0.3)?
            .set_default("ai.translate_temperature", 0.2)?
            .set_default("ai.high_volume_threshold", 10)?
            .set_default("ai.daily_cost_limit_usd", 3.0)?
            .set_default("fetch.timeout_secs", 10)?
            .set_default("fetch.user_agent", "StockNewsBot/1.0")?
            .set_default("fetch.max_description_len", 500)?
            .set_default("summary.news_limit", 10)?
            .set_default("summary.snippet_len", 300)?
            .set_default("selector.pick_count", 3)?
            .set_default("selector.headlines_per_stock", 5)?
            .set_default("selector.lookback_hours", 24)?
            .set_default("selector.extended_prompt", false)?;
        Ok(b)
    }

    #[cfg(test)]
    pub fn defaults() -> Self {
        Self::builder()
            .and_then(|b| Ok(b.build()?))
            .and_then(|c| Ok(c.try_deserialize()?))
            .expect("built-in defaults must deserialize")
    }
}

/// 外部服务凭证，只从环境变量读。缺失即启动失败，不发任何网络请求。
#[derive(Clone)]
pub struct Credentials {
    pub database_url: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub cron_secret: Option<String>,
}

impl Credentials {
    pub fn from_env(require_cron_secret: bool) -> Result<Self> {
        let mut missing = Vec::new();
        let database_url = env::var("DATABASE_URL").unwrap_or_default();
        let openai_api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        let cron_secret = env::var("CRON_SECRET").ok().filter(|s| !s.is_empty());

        if database_url.is_empty() { missing.push("DATABASE_URL"); }
        if openai_api_key.is_empty() { missing.push("OPENAI_API_KEY"); }
        if require_cron_secret && cron_secret.is_none() { missing.push("CRON_SECRET"); }

        if !missing.is_empty() {
            anyhow::bail!("Missing required environment variables: {}", missing.join(", "));
        }

        Ok(Self {
            database_url,
            openai_api_key,
            openai_base_url: env::var("OPENAI_BASE_URL").unwrap_or("https://api.openai.com/v1".to_string()),
            cron_secret,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_base_url", &self.openai_base_url)
            .field("cron_secret", &self.cron_secret.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}
