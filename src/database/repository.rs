use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::debug;

use super::models::{
    InsertOutcome, MarketAnalysis, NewNews, NewsRecord, SelectedStock, Sentiment, StockRow, Summary,
    UsageLogEntry,
};
use crate::modules::perception::{Instrument, Market};

/// 五张表的读写入口。流水线各阶段和 HTTP 读接口都只依赖这个 trait。
#[async_trait]
pub trait Repository: Send + Sync {
    /// 写入/刷新静态标的目录，不动 is_top_10 / 高潜力标记
    async fn seed_instruments(&self, instruments: &[Instrument]) -> Result<()>;

    /// insert-ignore：URL 冲突时原记录不变，返回 Skipped
    async fn insert_news(&self, news: &NewNews) -> Result<InsertOutcome>;
    async fn recent_news(&self, stock_code: &str, limit: i64) -> Result<Vec<NewsRecord>>;
    async fn market_news(&self, market: Market, since: Option<DateTime<Utc>>) -> Result<Vec<NewsRecord>>;

    async fn tracked_stocks(&self, market: Market) -> Result<Vec<StockRow>>;
    async fn upsert_summary(&self, summary: &Summary) -> Result<()>;

    /// 先清空该市场全部高潜力标记，再标记本次选中的。整体替换，不做合并。
    async fn replace_high_potential(&self, market: Market, picks: &[SelectedStock]) -> Result<()>;
    async fn upsert_market_analysis(&self, analysis: &MarketAnalysis) -> Result<()>;
    async fn append_usage(&self, entries: &[UsageLogEntry]) -> Result<()>;

    // --- 读接口 ---
    async fn news_page(&self, offset: i64, limit: i64) -> Result<(Vec<NewsRecord>, i64)>;
    async fn find_stock(&self, code: &str) -> Result<Option<StockRow>>;
    async fn latest_summary(&self, stock_code: &str) -> Result<Option<Summary>>;
    async fn news_count(&self, stock_code: &str) -> Result<i64>;
    async fn listed_stocks(&self, market: Option<Market>) -> Result<Vec<StockRow>>;
    async fn summaries_on(&self, date: NaiveDate) -> Result<Vec<Summary>>;
    async fn latest_market_analysis(&self, market: Market) -> Result<Option<MarketAnalysis>>;
}

pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const STOCK_COLUMNS: &str = "code, name_ko, name_en, sector, market, is_top_10, is_high_potential, \
     potential_score, last_price, price_change_pct, created_at, updated_at";

const NEWS_COLUMNS: &str = "n.id, n.stock_code, n.title, n.description, n.url, n.source, n.language, \
     n.sentiment, n.published_at, n.created_at";

const SUMMARY_COLUMNS: &str = "stock_code, summary_text, key_points, sentiment_overall, model, \
     token_usage, cost_usd, date, created_at";

fn stock_from_row(row: &PgRow) -> Result<StockRow> {
    let market: String = row.try_get("market")?;
    Ok(StockRow {
        code: row.try_get("code")?,
        name_ko: row.try_get("name_ko")?,
        name_en: row.try_get("name_en")?,
        sector: row.try_get("sector")?,
        market: market.parse()?,
        is_top_10: row.try_get("is_top_10")?,
        is_high_potential: row.try_get("is_high_potential")?,
        potential_score: row.try_get("potential_score")?,
        last_price: row.try_get("last_price")?,
        price_change_pct: row.try_get("price_change_pct")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn news_from_row(row: &PgRow) -> Result<NewsRecord> {
    Ok(NewsRecord {
        id: row.try_get("id")?,
        stock_code: row.try_get("stock_code")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        url: row.try_get("url")?,
        source: row.try_get("source")?,
        language: row.try_get("language")?,
        sentiment: row.try_get("sentiment")?,
        published_at: row.try_get("published_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn summary_from_row(row: &PgRow) -> Result<Summary> {
    let key_points: Json<Vec<String>> = row.try_get("key_points")?;
    let sentiment: String = row.try_get("sentiment_overall")?;
    let token_usage: Option<i64> = row.try_get("token_usage")?;
    let cost_usd: Option<f64> = row.try_get("cost_usd")?;
    Ok(Summary {
        stock_code: row.try_get("stock_code")?,
        date: row.try_get("date")?,
        summary_text: row.try_get("summary_text")?,
        key_points: key_points.0,
        sentiment: Sentiment::from_label(&sentiment),
        model: row.try_get("model")?,
        token_usage: token_usage.unwrap_or(0),
        cost_usd: cost_usd.unwrap_or(0.0),
        created_at: row.try_get("created_at")?,
    })
}

fn analysis_from_row(row: &PgRow) -> Result<MarketAnalysis> {
    let market: String = row.try_get("market")?;
    let selected: Json<Vec<SelectedStock>> = row.try_get("selected_stocks")?;
    Ok(MarketAnalysis {
        analysis_date: row.try_get("analysis_date")?,
        market: market.parse()?,
        selected_stocks: selected.0,
        analysis_summary: row.try_get("analysis_summary")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Repository for PgRepository {
    async fn seed_instruments(&self, instruments: &[Instrument]) -> Result<()> {
        for inst in instruments {
            sqlx::query(
                "INSERT INTO stocks (code, name_ko, name_en, sector, market) VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (code) DO UPDATE SET
                    name_ko = EXCLUDED.name_ko,
                    name_en = EXCLUDED.name_en,
                    sector = EXCLUDED.sector,
                    market = EXCLUDED.market,
                    updated_at = NOW()"
            )
            .bind(inst.code)
            .bind(inst.name_ko)
            .bind(inst.name_en)
            .bind(inst.sector)
            .bind(inst.market.as_str())
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn insert_news(&self, news: &NewNews) -> Result<InsertOutcome> {
        let result = sqlx::query(
            "INSERT INTO news_articles (stock_code, title, description, url, source, language, published_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (url) DO NOTHING"
        )
        .bind(&news.stock_code)
        .bind(&news.title)
        .bind(&news.description)
        .bind(&news.url)
        .bind(&news.source)
        .bind(news.language.as_str())
        .bind(news.published_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!("Duplicate url skipped: {}", news.url);
            Ok(InsertOutcome::Skipped)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn recent_news(&self, stock_code: &str, limit: i64) -> Result<Vec<NewsRecord>> {
        let sql = format!(
            "SELECT {} FROM news_articles n WHERE n.stock_code = $1 ORDER BY n.published_at DESC LIMIT $2",
            NEWS_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(stock_code)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(news_from_row).collect()
    }

    async fn market_news(&self, market: Market, since: Option<DateTime<Utc>>) -> Result<Vec<NewsRecord>> {
        let sql = format!(
            "SELECT {} FROM news_articles n JOIN stocks s ON s.code = n.stock_code
             WHERE s.market = $1 AND ($2::timestamptz IS NULL OR n.published_at >= $2)
             ORDER BY n.published_at DESC",
            NEWS_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(market.as_str())
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(news_from_row).collect()
    }

    async fn tracked_stocks(&self, market: Market) -> Result<Vec<StockRow>> {
        let sql = format!(
            "SELECT {} FROM stocks WHERE is_top_10 = TRUE AND market = $1 ORDER BY code",
            STOCK_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(market.as_str()).fetch_all(&self.pool).await?;
        rows.iter().map(stock_from_row).collect()
    }

    async fn upsert_summary(&self, summary: &Summary) -> Result<()> {
        sqlx::query(
            "INSERT INTO ai_summaries
                (stock_code, summary_text, key_points, sentiment_overall, model, token_usage, cost_usd, date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (stock_code, date) DO UPDATE SET
                summary_text = EXCLUDED.summary_text,
                key_points = EXCLUDED.key_points,
                sentiment_overall = EXCLUDED.sentiment_overall,
                model = EXCLUDED.model,
                token_usage = EXCLUDED.token_usage,
                cost_usd = EXCLUDED.cost_usd,
                created_at = NOW()"
        )
        .bind(&summary.stock_code)
        .bind(&summary.summary_text)
        .bind(Json(&summary.key_points))
        .bind(summary.sentiment.as_str())
        .bind(&summary.model)
        .bind(summary.token_usage)
        .bind(summary.cost_usd)
        .bind(summary.date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_high_potential(&self, market: Market, picks: &[SelectedStock]) -> Result<()> {
        // 两步之间没有事务：中途崩溃时下一次运行会整体覆盖
        sqlx::query(
            "UPDATE stocks SET is_high_potential = FALSE, potential_score = NULL, updated_at = NOW()
             WHERE is_high_potential = TRUE AND market = $1"
        )
        .bind(market.as_str())
        .execute(&self.pool)
        .await?;

        for pick in picks {
            sqlx::query(
                "UPDATE stocks SET is_high_potential = TRUE, potential_score = $1, updated_at = NOW()
                 WHERE code = $2 AND market = $3"
            )
            .bind(pick.score)
            .bind(&pick.code)
            .bind(market.as_str())
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn upsert_market_analysis(&self, analysis: &MarketAnalysis) -> Result<()> {
        sqlx::query(
            "INSERT INTO daily_analysis (analysis_date, market, selected_stocks, analysis_summary)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (analysis_date, market) DO UPDATE SET
                selected_stocks = EXCLUDED.selected_stocks,
                analysis_summary = EXCLUDED.analysis_summary,
                created_at = NOW()"
        )
        .bind(analysis.analysis_date)
        .bind(analysis.market.as_str())
        .bind(Json(&analysis.selected_stocks))
        .bind(&analysis.analysis_summary)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_usage(&self, entries: &[UsageLogEntry]) -> Result<()> {
        for entry in entries {
            sqlx::query(
                "INSERT INTO api_usage_log (service, endpoint, tokens_used, cost_usd) VALUES ($1, $2, $3, $4)"
            )
            .bind(&entry.service)
            .bind(&entry.endpoint)
            .bind(entry.tokens_used)
            .bind(entry.cost_usd)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn news_page(&self, offset: i64, limit: i64) -> Result<(Vec<NewsRecord>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news_articles")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM news_articles n ORDER BY n.published_at DESC OFFSET $1 LIMIT $2",
            NEWS_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        let articles = rows.iter().map(news_from_row).collect::<Result<Vec<_>>>()?;
        Ok((articles, total))
    }

    async fn find_stock(&self, code: &str) -> Result<Option<StockRow>> {
        let sql = format!("SELECT {} FROM stocks WHERE code = $1", STOCK_COLUMNS);
        let row = sqlx::query(&sql).bind(code).fetch_optional(&self.pool).await?;
        row.as_ref().map(stock_from_row).transpose()
    }

    async fn latest_summary(&self, stock_code: &str) -> Result<Option<Summary>> {
        let sql = format!(
            "SELECT {} FROM ai_summaries WHERE stock_code = $1 ORDER BY date DESC LIMIT 1",
            SUMMARY_COLUMNS
        );
        let row = sqlx::query(&sql).bind(stock_code).fetch_optional(&self.pool).await?;
        row.as_ref().map(summary_from_row).transpose()
    }

    async fn news_count(&self, stock_code: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news_articles WHERE stock_code = $1")
            .bind(stock_code)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn listed_stocks(&self, market: Option<Market>) -> Result<Vec<StockRow>> {
        let sql = format!(
            "SELECT {} FROM stocks
             WHERE (is_top_10 = TRUE OR is_high_potential = TRUE)
               AND ($1::text IS NULL OR market = $1)
             ORDER BY is_high_potential DESC, code ASC",
            STOCK_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(market.map(|m| m.as_str()))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(stock_from_row).collect()
    }

    async fn summaries_on(&self, date: NaiveDate) -> Result<Vec<Summary>> {
        let sql = format!("SELECT {} FROM ai_summaries WHERE date = $1", SUMMARY_COLUMNS);
        let rows = sqlx::query(&sql).bind(date).fetch_all(&self.pool).await?;
        rows.iter().map(summary_from_row).collect()
    }

    async fn latest_market_analysis(&self, market: Market) -> Result<Option<MarketAnalysis>> {
        let row = sqlx::query(
            "SELECT analysis_date, market, selected_stocks, analysis_summary, created_at
             FROM daily_analysis WHERE market = $1 ORDER BY analysis_date DESC LIMIT 1"
        )
        .bind(market.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(analysis_from_row).transpose()
    }
}
