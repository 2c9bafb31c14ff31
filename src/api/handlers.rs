use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use tracing::{info, warn};

use super::dto::*;
use super::error::ApiError;
use super::state::AppState;
use crate::database::models::MarketAnalysis;
use crate::modules::perception::Market;

fn authorized(headers: &HeaderMap, secret: &str) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map_or(false, |token| token == secret)
}

fn parse_market(raw: Option<&str>) -> Result<Option<Market>, ApiError> {
    match raw.map(str::trim).filter(|m| !m.is_empty()) {
        None => Ok(None),
        Some(m) => m.parse().map(Some).map_err(|_| ApiError::BadRequest(format!("Unknown market: {}", m))),
    }
}

/// GET|POST /api/cron - 跑一次完整流水线。选股失败时返回 500，body 相同。
pub async fn cron(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response, ApiError> {
    if !authorized(&headers, &state.cron_secret) {
        warn!("🔒 Rejected cron trigger with a bad or missing token");
        return Err(ApiError::Unauthorized);
    }

    info!("⏰ Cron trigger accepted");
    let report = state.pipeline.run(Utc::now()).await;
    let critical = report.has_critical_failure();
    let status = if critical { StatusCode::INTERNAL_SERVER_ERROR } else { StatusCode::OK };

    Ok((status, Json(CronResponse { success: !critical, results: report.results })).into_response())
}

/// GET /api/news?page=&limit=
pub async fn list_news(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<NewsPage>, ApiError> {
    let (page, limit) = query.resolve();
    let (articles, total) = state
        .repo
        .news_page((page - 1) * limit, limit)
        .await
        .map_err(|e| ApiError::fetch_failed("news", e))?;

    Ok(Json(NewsPage {
        articles,
        total,
        page,
        total_pages: (total + limit - 1) / limit,
    }))
}

/// GET /api/stocks?market= - 跟踪中或高潜力的标的，附当天摘要
pub async fn list_stocks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MarketQuery>,
) -> Result<Json<Vec<StockWithSummary>>, ApiError> {
    let market = parse_market(query.market.as_deref())?;

    let stocks = state.repo.listed_stocks(market).await.map_err(|e| ApiError::fetch_failed("stocks", e))?;
    let mut summaries: HashMap<String, _> = state
        .repo
        .summaries_on(Utc::now().date_naive())
        .await
        .map_err(|e| ApiError::fetch_failed("stocks", e))?
        .into_iter()
        .map(|s| (s.stock_code.clone(), s))
        .collect();

    let rows = stocks
        .into_iter()
        .map(|stock| {
            let latest_summary = summaries.remove(&stock.code);
            StockWithSummary { stock, latest_summary }
        })
        .collect();

    Ok(Json(rows))
}

/// GET /api/stocks/:code
pub async fn stock_detail(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<StockDetail>, ApiError> {
    let stock = state
        .repo
        .find_stock(&code)
        .await
        .map_err(|e| ApiError::fetch_failed("stock", e))?
        .ok_or_else(|| ApiError::NotFound("Stock not found".into()))?;

    let latest_summary = state.repo.latest_summary(&code).await.map_err(|e| ApiError::fetch_failed("stock", e))?;
    let news_count = state.repo.news_count(&code).await.map_err(|e| ApiError::fetch_failed("stock", e))?;

    Ok(Json(StockDetail { stock, latest_summary, news_count }))
}

/// GET /api/analysis?market= (默认 KOSPI)
pub async fn latest_analysis(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MarketQuery>,
) -> Result<Json<MarketAnalysis>, ApiError> {
    let market = parse_market(query.market.as_deref())?.unwrap_or(Market::Kospi);

    state
        .repo
        .latest_market_analysis(market)
        .await
        .map_err(|e| ApiError::fetch_failed("analysis", e))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Analysis not found".into()))
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::database::models::{Sentiment, Summary};
    use crate::database::Repository;
    use crate::modules::action::DailyPipeline;
    use crate::modules::perception::Instrument;
    use crate::testing::{news_record, stock_row, MemoryRepository, ScriptedModel, StaticFeed};
    use axum::http::HeaderValue;
    use serde_json::Value;

    const SECRET: &str = "s3cret";

    fn app(repo: Arc<MemoryRepository>, model: ScriptedModel, catalog: Vec<Instrument>) -> Arc<AppState> {
        let mut cfg = PipelineConfig::defaults();
        cfg.selector.lookback_hours = None;
        let pipeline = DailyPipeline::new(repo.clone(), Arc::new(model), Arc::new(StaticFeed::new()), &cfg, catalog);
        AppState::new(repo, pipeline, SECRET.to_string())
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token)).unwrap());
        headers
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn cron_requires_the_bearer_secret() {
        let state = app(Arc::new(MemoryRepository::new()), ScriptedModel::new(), vec![]);

        let resp = cron(State(state.clone()), HeaderMap::new()).await.unwrap_err().into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["error"], "Unauthorized");

        let resp = cron(State(state.clone()), bearer("wrong")).await.unwrap_err().into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let mut raw = HeaderMap::new();
        raw.insert(AUTHORIZATION, HeaderValue::from_static(SECRET));
        let resp = cron(State(state.clone()), raw).await.unwrap_err().into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = cron(State(state), bearer(SECRET)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["results"][0]["step"], "fetch_news");
        assert_eq!(body["results"][1]["status"], "skipped");
    }

    #[tokio::test]
    async fn cron_reports_selector_failures_as_500() {
        const K1: Instrument = Instrument {
            code: "K1",
            name_ko: "케이원",
            name_en: "K One",
            sector: "IT",
            market: Market::Kospi,
            keywords_ko: &["케이원"],
            keywords_en: &[],
        };
        let repo = Arc::new(MemoryRepository::new());
        repo.seed_instruments(&[K1]).await.unwrap();
        let state = app(repo, ScriptedModel::new().fail("upstream 500"), vec![K1]);

        let resp = cron(State(state), bearer(SECRET)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        let steps: Vec<_> = body["results"].as_array().unwrap().iter().map(|r| r["step"].clone()).collect();
        assert!(steps.contains(&Value::from("potential_analysis:KOSPI")));
    }

    #[tokio::test]
    async fn news_is_paged_newest_first() {
        let news: Vec<_> = (0..35).map(|i| news_record("A", i)).collect();
        let state = app(Arc::new(MemoryRepository::new().with_news(news)), ScriptedModel::new(), vec![]);

        let query = PageQuery { page: Some("2".into()), limit: None };
        let Json(page) = list_news(State(state.clone()), Query(query)).await.unwrap();
        assert_eq!(page.total, 35);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.articles.len(), 5);
        assert_eq!(page.articles[0].title, "headline A 30");

        let Json(first) = list_news(State(state.clone()), Query(PageQuery::default())).await.unwrap();
        assert_eq!(first.page, 1);
        assert_eq!(first.articles[0].title, "headline A 0");

        let huge = PageQuery { page: Some(i64::MAX.to_string()), limit: Some("100".into()) };
        let Json(beyond) = list_news(State(state), Query(huge)).await.unwrap();
        assert_eq!(beyond.page, MAX_PAGE);
        assert!(beyond.articles.is_empty());
        assert_eq!(beyond.total, 35);
    }

    #[tokio::test]
    async fn stocks_list_puts_high_potential_first_with_todays_summary() {
        let mut flagged = stock_row("B", Market::Kospi);
        flagged.is_high_potential = true;
        let mut untracked = stock_row("C", Market::Kospi);
        untracked.is_top_10 = false;
        let repo = Arc::new(MemoryRepository::new().with_stocks(vec![
            stock_row("A", Market::Kospi),
            flagged,
            untracked,
            stock_row("N", Market::Nasdaq),
        ]));
        repo.upsert_summary(&Summary {
            stock_code: "A".into(),
            date: Utc::now().date_naive(),
            summary_text: "오늘 요약".into(),
            key_points: vec![],
            sentiment: Sentiment::Neutral,
            model: "gpt-4o-mini".into(),
            token_usage: 0,
            cost_usd: 0.0,
            created_at: None,
        })
        .await
        .unwrap();
        let state = app(repo, ScriptedModel::new(), vec![]);

        let query = MarketQuery { market: Some("kospi".into()) };
        let Json(rows) = list_stocks(State(state.clone()), Query(query)).await.unwrap();
        let codes: Vec<_> = rows.iter().map(|r| r.stock.code.as_str()).collect();
        assert_eq!(codes, vec!["B", "A"]);
        assert_eq!(rows[1].latest_summary.as_ref().unwrap().summary_text, "오늘 요약");
        assert!(rows[0].latest_summary.is_none());

        let bad = MarketQuery { market: Some("NYSE".into()) };
        let resp = list_stocks(State(state), Query(bad)).await.unwrap_err().into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_stock_is_404() {
        let repo = Arc::new(
            MemoryRepository::new()
                .with_stocks(vec![stock_row("A", Market::Nasdaq)])
                .with_news(vec![news_record("A", 0), news_record("A", 1)]),
        );
        let state = app(repo, ScriptedModel::new(), vec![]);

        let Json(detail) = stock_detail(State(state.clone()), Path("A".into())).await.unwrap();
        assert_eq!(detail.news_count, 2);
        assert!(detail.latest_summary.is_none());

        let resp = stock_detail(State(state), Path("ZZZ".into())).await.unwrap_err().into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["error"], "Stock not found");
    }
}
