//! 测试用的内存替身：feed、模型、仓储

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::database::models::{
    InsertOutcome, MarketAnalysis, NewNews, NewsRecord, SelectedStock, StockRow, Summary, UsageLogEntry,
};
use crate::database::Repository;
use crate::modules::brain::llm::{ChatCompletion, ChatRequest, LanguageModel, TokenUsage};
use crate::modules::perception::feed::FeedSource;
use crate::modules::perception::{FeedItem, Instrument, Market};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap()
}

/// is_top_10 = true，名字固定为 "테스트 <code>"
pub fn stock_row(code: &str, market: Market) -> StockRow {
    StockRow {
        code: code.to_string(),
        name_ko: format!("테스트 {}", code),
        name_en: format!("Test {}", code),
        sector: "IT".to_string(),
        market,
        is_top_10: true,
        is_high_potential: false,
        potential_score: None,
        last_price: None,
        price_change_pct: None,
        created_at: base_time(),
        updated_at: base_time(),
    }
}

/// i 越大越旧
pub fn news_record(code: &str, i: usize) -> NewsRecord {
    let published = base_time() - Duration::minutes(i as i64 * 10);
    NewsRecord {
        id: Uuid::new_v4(),
        stock_code: code.to_string(),
        title: format!("headline {} {}", code, i),
        description: Some(format!("body of {} news {}", code, i)),
        url: format!("https://example.com/{}/{}", code, i),
        source: "Google News EN".to_string(),
        language: "en".to_string(),
        sentiment: None,
        published_at: published,
        created_at: published,
    }
}

// ---------------------------------------------------------------- feed

#[derive(Default)]
pub struct StaticFeed {
    responses: HashMap<String, std::result::Result<Vec<FeedItem>, String>>,
    requested: Mutex<Vec<String>>,
}

impl StaticFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(mut self, url: &str, items: Vec<FeedItem>) -> Self {
        self.responses.insert(url.to_string(), Ok(items));
        self
    }

    pub fn with_error(mut self, url: &str, message: &str) -> Self {
        self.responses.insert(url.to_string(), Err(message.to_string()));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>> {
        self.requested.lock().unwrap().push(url.to_string());
        match self.responses.get(url) {
            Some(Ok(items)) => Ok(items.clone()),
            Some(Err(msg)) => Err(anyhow!("{}", msg)),
            None => Ok(vec![]),
        }
    }
}

// ---------------------------------------------------------------- model

pub const SCRIPTED_USAGE: TokenUsage = TokenUsage { prompt_tokens: 100, completion_tokens: 50, total_tokens: 150 };

/// 按顺序吐出预设回复；脚本用完后所有请求都失败
#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, content: &str) -> Self {
        self.script.lock().unwrap().push_back(Ok(content.to_string()));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.script.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(ChatCompletion { model: request.model, content, usage: SCRIPTED_USAGE }),
            Some(Err(msg)) => Err(anyhow!("{}", msg)),
            None => Err(anyhow!("no scripted reply left")),
        }
    }
}

// ---------------------------------------------------------------- repository

#[derive(Default)]
struct Tables {
    stocks: Vec<StockRow>,
    news: Vec<NewsRecord>,
    summaries: Vec<Summary>,
    analyses: Vec<MarketAnalysis>,
    usage: Vec<UsageLogEntry>,
}

/// 行为对齐 PgRepository 的内存实现
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stocks(self, stocks: Vec<StockRow>) -> Self {
        self.tables.lock().unwrap().stocks.extend(stocks);
        self
    }

    pub fn with_news(self, news: Vec<NewsRecord>) -> Self {
        self.tables.lock().unwrap().news.extend(news);
        self
    }

    pub fn stocks(&self) -> Vec<StockRow> {
        self.tables.lock().unwrap().stocks.clone()
    }

    pub fn news(&self) -> Vec<NewsRecord> {
        self.tables.lock().unwrap().news.clone()
    }

    pub fn summaries(&self) -> Vec<Summary> {
        self.tables.lock().unwrap().summaries.clone()
    }

    pub fn analyses(&self) -> Vec<MarketAnalysis> {
        self.tables.lock().unwrap().analyses.clone()
    }

    pub fn usage(&self) -> Vec<UsageLogEntry> {
        self.tables.lock().unwrap().usage.clone()
    }

    pub fn flagged(&self, market: Market) -> Vec<(String, Option<i32>)> {
        let mut flagged: Vec<_> = self
            .tables
            .lock()
            .unwrap()
            .stocks
            .iter()
            .filter(|s| s.market == market && s.is_high_potential)
            .map(|s| (s.code.clone(), s.potential_score))
            .collect();
        flagged.sort();
        flagged
    }
}

fn newest_first(news: &mut [NewsRecord]) {
    news.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn seed_instruments(&self, instruments: &[Instrument]) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        for inst in instruments {
            let idx = match t.stocks.iter().position(|s| s.code == inst.code) {
                Some(idx) => idx,
                None => {
                    t.stocks.push(stock_row(inst.code, inst.market));
                    t.stocks.len() - 1
                }
            };
            let row = &mut t.stocks[idx];
            row.name_ko = inst.name_ko.to_string();
            row.name_en = inst.name_en.to_string();
            row.sector = inst.sector.to_string();
            row.market = inst.market;
        }
        Ok(())
    }

    async fn insert_news(&self, news: &NewNews) -> Result<InsertOutcome> {
        let mut t = self.tables.lock().unwrap();
        if t.news.iter().any(|n| n.url == news.url) {
            return Ok(InsertOutcome::Skipped);
        }
        t.news.push(NewsRecord {
            id: Uuid::new_v4(),
            stock_code: news.stock_code.clone(),
            title: news.title.clone(),
            description: news.description.clone(),
            url: news.url.clone(),
            source: news.source.clone(),
            language: news.language.as_str().to_string(),
            sentiment: None,
            published_at: news.published_at,
            created_at: Utc::now(),
        });
        Ok(InsertOutcome::Inserted)
    }

    async fn recent_news(&self, stock_code: &str, limit: i64) -> Result<Vec<NewsRecord>> {
        let mut news: Vec<_> = self.news().into_iter().filter(|n| n.stock_code == stock_code).collect();
        newest_first(&mut news);
        news.truncate(limit.max(0) as usize);
        Ok(news)
    }

    async fn market_news(&self, market: Market, since: Option<DateTime<Utc>>) -> Result<Vec<NewsRecord>> {
        let t = self.tables.lock().unwrap();
        let mut news: Vec<_> = t
            .news
            .iter()
            .filter(|n| t.stocks.iter().any(|s| s.code == n.stock_code && s.market == market))
            .filter(|n| since.map_or(true, |since| n.published_at >= since))
            .cloned()
            .collect();
        newest_first(&mut news);
        Ok(news)
    }

    async fn tracked_stocks(&self, market: Market) -> Result<Vec<StockRow>> {
        let mut rows: Vec<_> = self.stocks().into_iter().filter(|s| s.is_top_10 && s.market == market).collect();
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(rows)
    }

    async fn upsert_summary(&self, summary: &Summary) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        let mut stored = summary.clone();
        stored.created_at = Some(Utc::now());
        match t.summaries.iter().position(|s| s.stock_code == summary.stock_code && s.date == summary.date) {
            Some(idx) => t.summaries[idx] = stored,
            None => t.summaries.push(stored),
        }
        Ok(())
    }

    async fn replace_high_potential(&self, market: Market, picks: &[SelectedStock]) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        for row in t.stocks.iter_mut().filter(|s| s.market == market) {
            row.is_high_potential = false;
            row.potential_score = None;
        }
        for pick in picks {
            if let Some(row) = t.stocks.iter_mut().find(|s| s.code == pick.code && s.market == market) {
                row.is_high_potential = true;
                row.potential_score = Some(pick.score);
            }
        }
        Ok(())
    }

    async fn upsert_market_analysis(&self, analysis: &MarketAnalysis) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        let mut stored = analysis.clone();
        stored.created_at = Some(Utc::now());
        match t
            .analyses
            .iter()
            .position(|a| a.market == analysis.market && a.analysis_date == analysis.analysis_date)
        {
            Some(idx) => t.analyses[idx] = stored,
            None => t.analyses.push(stored),
        }
        Ok(())
    }

    async fn append_usage(&self, entries: &[UsageLogEntry]) -> Result<()> {
        self.tables.lock().unwrap().usage.extend_from_slice(entries);
        Ok(())
    }

    async fn news_page(&self, offset: i64, limit: i64) -> Result<(Vec<NewsRecord>, i64)> {
        let mut news = self.news();
        let total = news.len() as i64;
        newest_first(&mut news);
        let page = news.into_iter().skip(offset.max(0) as usize).take(limit.max(0) as usize).collect();
        Ok((page, total))
    }

    async fn find_stock(&self, code: &str) -> Result<Option<StockRow>> {
        Ok(self.stocks().into_iter().find(|s| s.code == code))
    }

    async fn latest_summary(&self, stock_code: &str) -> Result<Option<Summary>> {
        Ok(self.summaries().into_iter().filter(|s| s.stock_code == stock_code).max_by_key(|s| s.date))
    }

    async fn news_count(&self, stock_code: &str) -> Result<i64> {
        Ok(self.news().iter().filter(|n| n.stock_code == stock_code).count() as i64)
    }

    async fn listed_stocks(&self, market: Option<Market>) -> Result<Vec<StockRow>> {
        let mut rows: Vec<_> = self
            .stocks()
            .into_iter()
            .filter(|s| s.is_top_10 || s.is_high_potential)
            .filter(|s| market.map_or(true, |m| s.market == m))
            .collect();
        rows.sort_by(|a, b| b.is_high_potential.cmp(&a.is_high_potential).then(a.code.cmp(&b.code)));
        Ok(rows)
    }

    async fn summaries_on(&self, date: NaiveDate) -> Result<Vec<Summary>> {
        Ok(self.summaries().into_iter().filter(|s| s.date == date).collect())
    }

    async fn latest_market_analysis(&self, market: Market) -> Result<Option<MarketAnalysis>> {
        Ok(self.analyses().into_iter().filter(|a| a.market == market).max_by_key(|a| a.analysis_date))
    }
}
