mod api;
mod config;
mod database;
mod modules;
mod utils;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::instruments::all_instruments;
use crate::config::{Credentials, PipelineConfig};
use crate::database::{init_database, PgRepository, Repository};
use crate::modules::action::DailyPipeline;
use crate::modules::brain::OpenAiClient;
use crate::modules::perception::GoogleNewsFeed;
use crate::utils::http_client::HttpClientFactory;

#[derive(Parser, Debug)]
#[command(name = "stock_newsdesk")]
#[command(about = "Daily stock news ingestion, summarization and selection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 启动 HTTP 服务 (cron 触发 + 只读接口)
    Serve {
        /// 覆盖配置里的 server.bind_addr
        #[arg(long, env = "NEWSDESK_BIND")]
        bind: Option<String>,
    },
    /// 跑一次流水线，打印结果 JSON。选股失败时退出码为 1
    RunOnce,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    info!("Starting Stock Newsdesk v{}...", env!("CARGO_PKG_VERSION"));

    // 1. 配置 + 凭证，任何一项缺失都在联网前退出
    let cfg = PipelineConfig::load()?;
    let credentials = Credentials::from_env(matches!(cli.command, Command::Serve { .. }))?;

    // 2. 数据库
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&credentials.database_url)
        .await
        .map_err(|e| {
            error!("CRITICAL: DB Connection Failed! Is Postgres running?");
            e
        })?;

    init_database(&pool).await?;

    let repo: Arc<dyn Repository> = Arc::new(PgRepository::new(pool));
    let catalog: Vec<_> = all_instruments().copied().collect();
    repo.seed_instruments(&catalog).await.context("Failed to seed instruments")?;
    info!("📋 {} instruments in catalog", catalog.len());

    // 3. 外部服务
    let feed_client = HttpClientFactory::create_feed(&cfg.fetch)?;
    let llm_client = HttpClientFactory::create_llm()?;
    let feed = Arc::new(GoogleNewsFeed::new(feed_client));
    let llm = Arc::new(OpenAiClient::new(llm_client, &credentials));

    let pipeline = DailyPipeline::new(repo.clone(), llm, feed, &cfg, catalog);

    match cli.command {
        Command::Serve { bind } => {
            let addr = bind.unwrap_or_else(|| cfg.server.bind_addr.clone());
            let cron_secret = credentials.cron_secret.clone().unwrap_or_default();
            let state = api::AppState::new(repo, pipeline, cron_secret);
            let app = api::router(state);

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("🌍 Listening on {}", addr);
            axum::serve(listener, app).await?;
        }
        Command::RunOnce => {
            let report = pipeline.run(Utc::now()).await;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if report.has_critical_failure() {
                error!("❌ Potential analysis failed, exiting with status 1");
                std::process::exit(1);
            }
            info!("✅ Run complete");
        }
    }

    Ok(())
}
