use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::database::models::UsageLogEntry;
use crate::database::Repository;
use crate::modules::brain::llm::{cost_usd, TokenUsage};

const SERVICE: &str = "openai";

/// api_usage_log 的记账员。一次运行内累计花费，超过日上限只告警。
pub struct UsageLogger {
    repo: Arc<dyn Repository>,
    daily_cost_limit_usd: f64,
    run_total_usd: f64,
}

impl UsageLogger {
    pub fn new(repo: Arc<dyn Repository>, daily_cost_limit_usd: f64) -> Self {
        Self { repo, daily_cost_limit_usd, run_total_usd: 0.0 }
    }

    /// stage 形如 "summaries:KOSPI"，最终 endpoint = "<model>:<stage>"。零 token 的批次不记。
    pub async fn record(&mut self, model: &str, stage: &str, usage: TokenUsage) -> Result<()> {
        if usage.total_tokens == 0 {
            return Ok(());
        }
        self.record_cost(model, stage, usage.total_tokens as i64, cost_usd(model, usage)).await
    }

    /// 已经算好价格的批次 (比如按条汇总的摘要)
    pub async fn record_cost(&mut self, model: &str, stage: &str, tokens: i64, cost: f64) -> Result<()> {
        let entry = UsageLogEntry {
            service: SERVICE.to_string(),
            endpoint: format!("{}:{}", model, stage),
            tokens_used: tokens,
            cost_usd: cost,
        };
        self.repo.append_usage(std::slice::from_ref(&entry)).await?;

        let before = self.run_total_usd;
        self.run_total_usd += cost;
        info!("💸 {} {} tokens, ${:.6} (run total ${:.4})", entry.endpoint, tokens, cost, self.run_total_usd);

        if before <= self.daily_cost_limit_usd && self.run_total_usd > self.daily_cost_limit_usd {
            warn!(
                "⚠️ Run cost ${:.4} exceeded the daily limit ${:.2}, continuing anyway",
                self.run_total_usd, self.daily_cost_limit_usd
            );
        }
        Ok(())
    }

    pub fn run_total_usd(&self) -> f64 {
        self.run_total_usd
    }
}
