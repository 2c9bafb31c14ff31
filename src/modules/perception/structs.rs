use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 交易市场。KOSPI 为本土主市场，NASDAQ 为海外次市场。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Kospi,
    Nasdaq,
}

impl Market {
    pub const ALL: [Market; 2] = [Market::Kospi, Market::Nasdaq];

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Kospi => "KOSPI",
            Market::Nasdaq => "NASDAQ",
        }
    }

    /// 每个市场抓哪些语言的 feed、取几条、要不要翻译
    pub fn feed_plan(&self) -> &'static [FeedPlan] {
        const KOSPI_PLAN: [FeedPlan; 2] = [
            FeedPlan { language: Language::Ko, max_items: 5, translate: false },
            FeedPlan { language: Language::En, max_items: 3, translate: false },
        ];
        const NASDAQ_PLAN: [FeedPlan; 1] = [
            FeedPlan { language: Language::En, max_items: 5, translate: true },
        ];
        match self {
            Market::Kospi => &KOSPI_PLAN,
            Market::Nasdaq => &NASDAQ_PLAN,
        }
    }

    /// Summarizer system prompt 里的分析师身份
    pub fn analyst_label(&self) -> &'static str {
        match self {
            Market::Kospi => "한국 주식 뉴스 분석 전문가",
            Market::Nasdaq => "미국 주식 뉴스 분석 전문가",
        }
    }

    pub fn venue_label(&self) -> &'static str {
        match self {
            Market::Kospi => "한국 주식시장(KOSPI)",
            Market::Nasdaq => "미국 주식시장(NASDAQ)",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "KOSPI" => Ok(Market::Kospi),
            "NASDAQ" => Ok(Market::Nasdaq),
            other => Err(anyhow!("Unknown market: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ko,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Ko => "ko",
            Language::En => "en",
        }
    }

    /// Google News 的 (hl, gl, ceid) 三元组
    pub fn locale(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            Language::Ko => ("ko", "KR", "KR:ko"),
            Language::En => ("en", "US", "US:en"),
        }
    }

    pub fn source_name(&self) -> &'static str {
        match self {
            Language::Ko => "Google News KR",
            Language::En => "Google News EN",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "ko" => Ok(Language::Ko),
            "en" => Ok(Language::En),
            other => Err(anyhow!("Unknown language tag: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedPlan {
    pub language: Language,
    pub max_items: usize,
    pub translate: bool,
}

/// 静态配置的标的 (编译期目录，启动时写入 stocks 表)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instrument {
    pub code: &'static str,
    pub name_ko: &'static str,
    pub name_en: &'static str,
    pub sector: &'static str,
    pub market: Market,
    pub keywords_ko: &'static [&'static str],
    pub keywords_en: &'static [&'static str],
}

impl Instrument {
    /// [注意] 只用每种语言的第一个关键词，后面的保留在配置里但不查询
    pub fn primary_keyword(&self, language: Language) -> Option<&'static str> {
        let list = match language {
            Language::Ko => self.keywords_ko,
            Language::En => self.keywords_en,
        };
        list.first().copied()
    }
}

/// RSS 里解析出来的一条原始 item，字段都可能缺失
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub snippet: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}
