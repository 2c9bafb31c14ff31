use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modules::perception::{Language, Market};

/// stocks 表的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockRow {
    pub code: String,
    pub name_ko: String,
    pub name_en: String,
    pub sector: String,
    pub market: Market,
    pub is_top_10: bool,
    pub is_high_potential: bool,
    pub potential_score: Option<i32>,
    pub last_price: Option<f64>,
    pub price_change_pct: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 待插入的新闻 (Fetcher 产出)
#[derive(Debug, Clone, PartialEq)]
pub struct NewNews {
    pub stock_code: String,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub source: String,
    pub language: Language,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsRecord {
    pub id: Uuid,
    pub stock_code: String,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub source: String,
    pub language: String,
    pub sentiment: Option<String>,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// URL 已存在，原记录保持不动
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    /// 模型给出的标签不认识就当 neutral
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }
}

impl FromStr for Sentiment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(anyhow::anyhow!("Unknown sentiment: {}", other)),
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ai_summaries 表，(stock_code, date) 唯一
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub stock_code: String,
    pub date: NaiveDate,
    pub summary_text: String,
    pub key_points: Vec<String>,
    #[serde(rename = "sentiment_overall")]
    pub sentiment: Sentiment,
    pub model: String,
    pub token_usage: i64,
    pub cost_usd: f64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedStock {
    pub code: String,
    #[serde(default)]
    pub name_ko: String,
    pub score: i32,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crowd_psychology: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_pattern: Option<String>,
}

/// daily_analysis 表，(analysis_date, market) 唯一
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketAnalysis {
    pub analysis_date: NaiveDate,
    pub market: Market,
    pub selected_stocks: Vec<SelectedStock>,
    pub analysis_summary: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// api_usage_log，只追加
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageLogEntry {
    pub service: String,
    pub endpoint: String,
    pub tokens_used: i64,
    pub cost_usd: f64,
}
