use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::usage::UsageLogger;
use crate::config::PipelineConfig;
use crate::database::models::{InsertOutcome, StockRow};
use crate::database::Repository;
use crate::modules::brain::llm::{LanguageModel, TokenUsage};
use crate::modules::brain::translator::NewsText;
use crate::modules::brain::{Selector, Summarizer, Translator};
use crate::modules::perception::{FeedPlan, FeedSource, Instrument, Language, Market, NewsFetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Ok,
    Error,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub detail: Value,
}

impl StepResult {
    fn ok(step: impl Into<String>, detail: Value) -> Self {
        Self { step: step.into(), status: StepStatus::Ok, detail }
    }

    fn error(step: impl Into<String>, err: &anyhow::Error) -> Self {
        Self { step: step.into(), status: StepStatus::Error, detail: Value::String(format!("{:#}", err)) }
    }

    fn skipped(step: impl Into<String>, reason: &str) -> Self {
        Self { step: step.into(), status: StepStatus::Skipped, detail: Value::String(reason.to_string()) }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub results: Vec<StepResult>,
}

impl RunReport {
    fn push(&mut self, result: StepResult) {
        self.results.push(result);
    }

    /// 只有选股失败算致命，决定 HTTP 500 / 进程退出码
    pub fn has_critical_failure(&self) -> bool {
        self.results
            .iter()
            .any(|r| r.status == StepStatus::Error && r.step.starts_with("potential_analysis:"))
    }

    #[cfg(test)]
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.step == name)
    }
}

#[derive(Default)]
struct FetchTally {
    inserted: u64,
    skipped: u64,
    translate_usage: TokenUsage,
}

/// 每日流水线：抓取 -> 翻译 -> 入库 -> 逐市场摘要 -> 选股 -> 记账。
/// HTTP 触发和命令行触发走的是同一个 run。
pub struct DailyPipeline {
    repo: Arc<dyn Repository>,
    catalog: Vec<Instrument>,
    fetcher: NewsFetcher,
    translator: Translator,
    summarizer: Summarizer,
    selector: Selector,
    news_limit: i64,
    lookback_hours: Option<i64>,
    translate_model: String,
    daily_cost_limit_usd: f64,
}

impl DailyPipeline {
    pub fn new(
        repo: Arc<dyn Repository>,
        llm: Arc<dyn LanguageModel>,
        feed: Arc<dyn FeedSource>,
        cfg: &PipelineConfig,
        catalog: Vec<Instrument>,
    ) -> Self {
        Self {
            repo,
            catalog,
            fetcher: NewsFetcher::new(feed, cfg.fetch.max_description_len),
            translator: Translator::new(llm.clone(), &cfg.ai),
            summarizer: Summarizer::new(llm.clone(), cfg),
            selector: Selector::new(llm, cfg),
            news_limit: cfg.summary.news_limit,
            lookback_hours: cfg.selector.lookback_hours,
            translate_model: cfg.ai.translate_model.clone(),
            daily_cost_limit_usd: cfg.ai.daily_cost_limit_usd,
        }
    }

    /// now 决定运行日期和选股的新闻窗口
    pub async fn run(&self, now: DateTime<Utc>) -> RunReport {
        let today = now.date_naive();
        info!("🚀 Daily pipeline started for {}", today);
        let mut report = RunReport::default();
        let mut usage = UsageLogger::new(self.repo.clone(), self.daily_cost_limit_usd);

        self.fetch_stage(&mut report, &mut usage).await;

        for market in Market::ALL {
            self.analyze_market(market, now, &mut report, &mut usage).await;
        }

        let errors = report.results.iter().filter(|r| r.status == StepStatus::Error).count();
        info!(
            "🏁 Daily pipeline finished: {} steps, {} errors, ${:.4} spent",
            report.results.len(),
            errors,
            usage.run_total_usd()
        );
        report
    }

    // ---------------------------------------------------------------- 1. 抓取

    async fn fetch_stage(&self, report: &mut RunReport, usage: &mut UsageLogger) {
        info!("📰 [Fetch] {} instruments", self.catalog.len());
        let mut tally = FetchTally::default();

        for instrument in &self.catalog {
            for plan in instrument.market.feed_plan() {
                if let Err(e) = self.fetch_batch(instrument, plan, &mut tally).await {
                    warn!("⚠️ Fetch failed for {} ({}): {:#}", instrument.name_ko, plan.language, e);
                    report.push(StepResult::error(format!("fetch:{}:{}", instrument.code, plan.language), &e));
                }
            }
        }

        if let Err(e) = usage.record(&self.translate_model, "translate", tally.translate_usage).await {
            warn!("Failed to log translation usage: {:#}", e);
        }

        info!("📰 [Fetch] inserted {}, skipped {}", tally.inserted, tally.skipped);
        report.push(StepResult::ok(
            "fetch_news",
            json!({ "total_inserted": tally.inserted, "total_skipped": tally.skipped }),
        ));
    }

    async fn fetch_batch(&self, instrument: &Instrument, plan: &FeedPlan, tally: &mut FetchTally) -> Result<()> {
        let mut batch = self.fetcher.collect(instrument, plan).await?;

        if plan.translate && !batch.is_empty() {
            let texts: Vec<NewsText> = batch
                .iter()
                .map(|n| NewsText { title: n.title.clone(), description: n.description.clone() })
                .collect();
            let outcome = self.translator.translate(&texts).await;
            tally.translate_usage.add(outcome.usage);

            // 整批替换或整批保留原文
            if let Some(translated) = outcome.texts {
                for (news, text) in batch.iter_mut().zip(translated) {
                    news.title = text.title;
                    news.description = text.description;
                    news.language = Language::Ko;
                }
            }
        }

        for news in &batch {
            match self.repo.insert_news(news).await.context("Failed to store news")? {
                InsertOutcome::Inserted => tally.inserted += 1,
                InsertOutcome::Skipped => tally.skipped += 1,
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------- 2. 分析

    async fn analyze_market(&self, market: Market, now: DateTime<Utc>, report: &mut RunReport, usage: &mut UsageLogger) {
        let today = now.date_naive();
        let stocks = match self.repo.tracked_stocks(market).await {
            Ok(s) => s,
            Err(e) => {
                error!("❌ [{}] Failed to load tracked stocks: {:#}", market, e);
                report.push(StepResult::error(format!("analysis:{}", market), &e));
                return;
            }
        };

        if stocks.is_empty() {
            report.push(StepResult::skipped(format!("analysis:{}", market), "No stocks found"));
            return;
        }

        info!("🧠 [{}] Summarizing {} stocks", market, stocks.len());
        // model -> (tokens, cost)
        let mut summary_costs: BTreeMap<String, (i64, f64)> = BTreeMap::new();

        for stock in &stocks {
            let step = format!("summary:{}:{}", market, stock.code);
            match self.summarize_stock(stock, today).await {
                Ok((model, tokens, cost, detail)) => {
                    if tokens > 0 {
                        let entry = summary_costs.entry(model).or_insert((0, 0.0));
                        entry.0 += tokens;
                        entry.1 += cost;
                    }
                    report.push(StepResult::ok(step, detail));
                }
                Err(e) => {
                    warn!("⚠️ [{}] Summary failed for {}: {:#}", market, stock.code, e);
                    report.push(StepResult::error(step, &e));
                }
            }
        }

        for (model, (tokens, cost)) in &summary_costs {
            if let Err(e) = usage.record_cost(model, &format!("summaries:{}", market), *tokens, *cost).await {
                warn!("Failed to log summary usage: {:#}", e);
            }
        }

        let step = format!("potential_analysis:{}", market);
        match self.select_stage(market, &stocks, now, usage).await {
            Ok(detail) => report.push(StepResult::ok(step, detail)),
            Err(e) => {
                error!("❌ [{}] Potential analysis failed: {:#}", market, e);
                report.push(StepResult::error(step, &e));
            }
        }
    }

    async fn summarize_stock(&self, stock: &StockRow, today: NaiveDate) -> Result<(String, i64, f64, Value)> {
        let news = self.repo.recent_news(&stock.code, self.news_limit).await?;
        let s = self.summarizer.summarize(stock, &news, today).await?;
        self.repo.upsert_summary(&s).await.context("Failed to store summary")?;

        let detail = json!({
            "sentiment": s.sentiment,
            "model": s.model,
            "tokens": s.token_usage,
            "cost": format!("${:.6}", s.cost_usd),
        });
        Ok((s.model, s.token_usage, s.cost_usd, detail))
    }

    async fn select_stage(&self, market: Market, stocks: &[StockRow], now: DateTime<Utc>, usage: &mut UsageLogger) -> Result<Value> {
        let since = selection_window(self.lookback_hours, now);
        let news = self.repo.market_news(market, since).await?;

        let outcome = self.selector.select(market, stocks, &news, now.date_naive()).await?;
        let analysis = &outcome.analysis;

        self.repo.replace_high_potential(market, &analysis.selected_stocks).await
            .context("Failed to update high-potential flags")?;
        self.repo.upsert_market_analysis(analysis).await
            .context("Failed to store market analysis")?;

        let completion = &outcome.completion;
        if let Err(e) = usage.record(&completion.model, &format!("analysis:{}", market), completion.usage).await {
            warn!("Failed to log analysis usage: {:#}", e);
        }

        Ok(json!({
            "selected": analysis.selected_stocks,
            "summary": analysis.analysis_summary,
            "tokens": completion.usage.total_tokens,
            "cost": format!("${:.6}", completion.cost_usd()),
        }))
    }
}

/// 选股只看 since 之后的新闻。None 或 <= 0 不限
fn selection_window(lookback_hours: Option<i64>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    lookback_hours.filter(|h| *h > 0).map(|h| now - Duration::hours(h))
}
