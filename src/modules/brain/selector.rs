use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use super::llm::{strip_code_fences, ChatCompletion, ChatRequest, LanguageModel};
use crate::config::PipelineConfig;
use crate::database::models::{MarketAnalysis, NewsRecord, SelectedStock, StockRow};
use crate::modules::perception::Market;

fn system_prompt(market: Market, pick_count: usize, extended: bool) -> String {
    let pick_shape = if extended {
        r#"{"code": "종목코드", "name_ko": "종목명", "score": 85, "reason": "선정 이유 2-3문장", "crowd_psychology": "투자자 심리 분석 1-2문장", "historical_pattern": "유사한 과거 패턴 1-2문장"}"#
    } else {
        r#"{"code": "종목코드", "name_ko": "종목명", "score": 85, "reason": "선정 이유 2-3문장"}"#
    };
    format!(
        r#"당신은 {} 분석 전문가입니다.
주어진 종목별 최근 뉴스를 분석하여 점수(0-100)를 매기고, 가장 유망한 {}개 종목을 선정하세요.
다음 JSON 형식으로만 출력하세요:
{{
  "selected_stocks": [
    {}
  ],
  "analysis_summary": "오늘의 종합 시장 분석 (한국어 3-5문장)"
}}"#,
        market.venue_label(),
        pick_count,
        pick_shape
    )
}

/// 单个标的在 prompt 里的新闻摘要块
struct StockDigest<'a> {
    stock: &'a StockRow,
    total: usize,
    headlines: Vec<&'a str>,
}

impl fmt::Display for StockDigest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})\n뉴스 {}건:\n", self.stock.code, self.stock.name_ko, self.stock.sector, self.total)?;
        if self.headlines.is_empty() {
            return f.write_str("뉴스 없음");
        }
        let lines: Vec<String> = self.headlines.iter().map(|h| format!("- {}", h)).collect();
        f.write_str(&lines.join("\n"))
    }
}

#[derive(Deserialize)]
struct RawPick {
    code: String,
    #[serde(default)]
    name_ko: Option<String>,
    score: f64,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    crowd_psychology: Option<String>,
    #[serde(default)]
    historical_pattern: Option<String>,
}

#[derive(Deserialize)]
struct RawSelection {
    #[serde(default)]
    selected_stocks: Vec<RawPick>,
    #[serde(default)]
    analysis_summary: Option<String>,
}

/// 严格解析。去围栏后仍不是合法 JSON 直接报错，不做任何兜底选择。
/// 文本字段为 null 时按空串处理。
pub fn parse_selection(raw: &str, stocks: &[StockRow], pick_count: usize) -> Result<(Vec<SelectedStock>, String)> {
    let parsed: RawSelection = serde_json::from_str(&strip_code_fences(raw))
        .map_err(|e| anyhow!("Selection output is not valid JSON: {}", e))?;

    let mut picks: Vec<SelectedStock> = Vec::new();
    for pick in parsed.selected_stocks {
        let code = pick.code.trim().to_string();
        let Some(stock) = stocks.iter().find(|s| s.code == code) else {
            warn!("Model picked unknown code '{}', dropped", code);
            continue;
        };
        if picks.iter().any(|p| p.code == code) {
            continue;
        }
        picks.push(SelectedStock {
            name_ko: pick.name_ko.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| stock.name_ko.clone()),
            code,
            score: pick.score.round().clamp(0.0, 100.0) as i32,
            reason: pick.reason.unwrap_or_default(),
            crowd_psychology: pick.crowd_psychology,
            historical_pattern: pick.historical_pattern,
        });
    }
    picks.truncate(pick_count);

    Ok((picks, parsed.analysis_summary.unwrap_or_default()))
}

pub struct SelectionOutcome {
    pub analysis: MarketAnalysis,
    pub completion: ChatCompletion,
}

pub struct Selector {
    llm: Arc<dyn LanguageModel>,
    model: String,
    max_tokens: u32,
    temperature: f64,
    pick_count: usize,
    headlines_per_stock: usize,
    extended_prompt: bool,
}

impl Selector {
    pub fn new(llm: Arc<dyn LanguageModel>, cfg: &PipelineConfig) -> Self {
        Self {
            llm,
            model: cfg.ai.analysis_model.clone(),
            max_tokens: cfg.ai.max_tokens_analysis,
            temperature: cfg.ai.temperature,
            pick_count: cfg.selector.pick_count,
            headlines_per_stock: cfg.selector.headlines_per_stock,
            extended_prompt: cfg.selector.extended_prompt,
        }
    }

    /// news 为该市场窗口内的新闻，按时间倒序
    pub fn build_prompt(&self, market: Market, stocks: &[StockRow], news: &[NewsRecord]) -> String {
        let digests: Vec<String> = stocks
            .iter()
            .map(|stock| {
                let own: Vec<&NewsRecord> = news.iter().filter(|n| n.stock_code == stock.code).collect();
                StockDigest {
                    stock,
                    total: own.len(),
                    headlines: own.iter().take(self.headlines_per_stock).map(|n| n.title.as_str()).collect(),
                }
                .to_string()
            })
            .collect();

        format!("오늘의 {} 주요 종목 뉴스:\n\n{}", market, digests.join("\n\n"))
    }

    /// 只负责调用模型并解析，不写库
    pub async fn select(&self, market: Market, stocks: &[StockRow], news: &[NewsRecord], date: NaiveDate) -> Result<SelectionOutcome> {
        let request = ChatRequest {
            model: self.model.clone(),
            system: system_prompt(market, self.pick_count, self.extended_prompt),
            user: self.build_prompt(market, stocks, news),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let completion = self.llm.complete(request).await
            .with_context(|| format!("Selection request failed for {}", market))?;

        let (picks, summary) = parse_selection(&completion.content, stocks, self.pick_count)
            .with_context(|| format!("Selection for {} rejected", market))?;

        info!("  🎯 [{}] Model selected {:?} (${:.6})", market, picks.iter().map(|p| &p.code).collect::<Vec<_>>(), completion.cost_usd());

        Ok(SelectionOutcome {
            analysis: MarketAnalysis {
                analysis_date: date,
                market,
                selected_stocks: picks,
                analysis_summary: summary,
                created_at: None,
            },
            completion,
        })
    }
}
