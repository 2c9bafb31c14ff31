use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use super::llm::{strip_code_fences, ChatRequest, LanguageModel};
use crate::config::PipelineConfig;
use crate::database::models::{NewsRecord, Sentiment, StockRow, Summary};
use crate::modules::perception::news::truncate_chars;
use crate::modules::perception::Market;

fn system_prompt(market: Market) -> String {
    format!(
        r#"당신은 {}입니다.
주어진 뉴스 기사들을 분석하여 다음 JSON 형식으로 요약하세요:
{{
  "summary": "한국어로 된 3-5문장 요약",
  "key_points": ["핵심 포인트 1", "핵심 포인트 2", "핵심 포인트 3"],
  "sentiment": "positive" | "negative" | "neutral"
}}
반드시 유효한 JSON만 출력하세요."#,
        market.analyst_label()
    )
}

#[derive(Deserialize)]
struct RawSummary {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    key_points: Option<Vec<String>>,
    #[serde(default)]
    sentiment: Option<String>,
}

/// 模型输出解析结果 (text, key_points, sentiment)
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSummary {
    pub text: String,
    pub key_points: Vec<String>,
    pub sentiment: Sentiment,
}

/// 宽松解析：不是合法 JSON 时原文当摘要，key_points 为空，情绪 neutral。永不失败。
pub fn parse_summary(raw: &str) -> ParsedSummary {
    match serde_json::from_str::<RawSummary>(&strip_code_fences(raw)) {
        Ok(parsed) => ParsedSummary {
            text: parsed.summary.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| raw.to_string()),
            key_points: parsed.key_points.unwrap_or_default(),
            sentiment: parsed.sentiment.as_deref().map(Sentiment::from_label).unwrap_or_default(),
        },
        Err(_) => ParsedSummary {
            text: raw.to_string(),
            key_points: vec![],
            sentiment: Sentiment::Neutral,
        },
    }
}

pub struct Summarizer {
    llm: Arc<dyn LanguageModel>,
    summary_model: String,
    analysis_model: String,
    max_tokens: u32,
    temperature: f64,
    high_volume_threshold: usize,
    snippet_len: usize,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LanguageModel>, cfg: &PipelineConfig) -> Self {
        Self {
            llm,
            summary_model: cfg.ai.summary_model.clone(),
            analysis_model: cfg.ai.analysis_model.clone(),
            max_tokens: cfg.ai.max_tokens_summary,
            temperature: cfg.ai.temperature,
            high_volume_threshold: cfg.ai.high_volume_threshold,
            snippet_len: cfg.summary.snippet_len,
        }
    }

    /// 新闻量大的日子换更强的模型
    pub fn pick_model(&self, news_count: usize) -> &str {
        if news_count >= self.high_volume_threshold {
            &self.analysis_model
        } else {
            &self.summary_model
        }
    }

    fn build_prompt(&self, stock: &StockRow, news: &[NewsRecord]) -> String {
        let news_text = news
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let desc = a.description.as_deref().unwrap_or("");
                format!("[{}] {}\n{}", i + 1, a.title, truncate_chars(desc, self.snippet_len))
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!("종목: {} ({})\n\n최근 뉴스 {}건:\n{}", stock.name_ko, stock.code, news.len(), news_text)
    }

    /// news 需已按时间倒序、已截到上限。没有新闻也会产出一条占位摘要。
    /// 只有模型请求本身失败才返回 Err。
    pub async fn summarize(&self, stock: &StockRow, news: &[NewsRecord], date: NaiveDate) -> Result<Summary> {
        if news.is_empty() {
            return Ok(Summary {
                stock_code: stock.code.clone(),
                date,
                summary_text: format!("{}에 대한 최근 뉴스가 없습니다.", stock.name_ko),
                key_points: vec![],
                sentiment: Sentiment::Neutral,
                model: self.summary_model.clone(),
                token_usage: 0,
                cost_usd: 0.0,
                created_at: None,
            });
        }

        let model = self.pick_model(news.len()).to_string();
        let request = ChatRequest {
            model: model.clone(),
            system: system_prompt(stock.market),
            user: self.build_prompt(stock, news),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let completion = self.llm.complete(request).await
            .with_context(|| format!("Summary request failed for {}", stock.code))?;
        let cost = completion.cost_usd();
        let parsed = parse_summary(&completion.content);

        info!("    📝 {} ({}): {} via {} (${:.6})", stock.name_ko, stock.code, parsed.sentiment, model, cost);

        Ok(Summary {
            stock_code: stock.code.clone(),
            date,
            summary_text: parsed.text,
            key_points: parsed.key_points,
            sentiment: parsed.sentiment,
            model,
            token_usage: completion.usage.total_tokens as i64,
            cost_usd: cost,
            created_at: None,
        })
    }
}
