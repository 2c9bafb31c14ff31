use serde::{Deserialize, Serialize};

use crate::database::models::{NewsRecord, StockRow, Summary};
use crate::modules::action::pipeline::StepResult;

pub const DEFAULT_PAGE_SIZE: i64 = 30;
pub const MAX_PAGE_SIZE: i64 = 100;
/// (page - 1) * limit 不会溢出
pub const MAX_PAGE: i64 = 1_000_000;

/// GET /api/news 的查询参数。保留原始字符串，解析不了就走默认值。
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    /// (page, limit)，page 从 1 开始
    pub fn resolve(&self) -> (i64, i64) {
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
            .min(MAX_PAGE);
        let limit = self
            .limit
            .as_deref()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, limit)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MarketQuery {
    pub market: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewsPage {
    pub articles: Vec<NewsRecord>,
    pub total: i64,
    pub page: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct StockWithSummary {
    #[serde(flatten)]
    pub stock: StockRow,
    pub latest_summary: Option<Summary>,
}

#[derive(Debug, Serialize)]
pub struct StockDetail {
    #[serde(flatten)]
    pub stock: StockRow,
    pub latest_summary: Option<Summary>,
    pub news_count: i64,
}

#[derive(Debug, Serialize)]
pub struct CronResponse {
    pub success: bool,
    pub results: Vec<StepResult>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
